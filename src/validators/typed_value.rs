//! Typed field values
//!
//! A [`TypedValue`] is one parsed field value together with the datatype
//! that governed it. Equality follows type derivation: values of
//! different but comparable numeric types compare by their decimal form,
//! and a single-item list equals its unwrapped item.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use once_cell::unsync::OnceCell;
use rust_decimal::Decimal;

use super::datatypes::{Datatype, XsdValue};

/// A field value with its governing datatype
#[derive(Debug, Clone)]
pub struct TypedValue {
    value: XsdValue,
    lexical: String,
    datatype: Arc<Datatype>,
    dimension: usize,
    is_list: bool,
    /// Decimal form, computed on first use
    decimals: OnceCell<Option<Vec<Decimal>>>,
}

pub(crate) fn hash_one<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

impl TypedValue {
    /// Wrap a parsed value
    ///
    /// A value of a union type is governed by the member type that
    /// accepted it.
    pub fn new(value: XsdValue, lexical: impl Into<String>, datatype: Arc<Datatype>) -> Self {
        let (value, datatype) = match value {
            XsdValue::Atomic(atomic) if datatype.is_union() => (*atomic.value, atomic.datatype),
            value => (value, datatype),
        };
        let is_list = datatype.is_list() && matches!(value.unwrap_atomic(), XsdValue::List(_));
        let dimension = value.dimension();
        Self {
            value,
            lexical: lexical.into(),
            datatype,
            dimension,
            is_list,
            decimals: OnceCell::new(),
        }
    }

    /// The parsed value
    pub fn value(&self) -> &XsdValue {
        &self.value
    }

    /// The lexical form, used in messages
    pub fn lexical(&self) -> &str {
        &self.lexical
    }

    /// The governing datatype
    pub fn datatype(&self) -> &Arc<Datatype> {
        &self.datatype
    }

    /// 1 for scalars, the item count for lists, the octet count for binaries
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Whether the value is a list
    pub fn is_list(&self) -> bool {
        self.is_list
    }

    /// Decimal form, for values of decimal-derived types
    pub fn decimals(&self) -> Option<&[Decimal]> {
        self.decimals
            .get_or_init(|| {
                if !self.datatype.is_decimal() {
                    return None;
                }
                match self.value.unwrap_atomic() {
                    XsdValue::List(items) => items.iter().map(XsdValue::as_decimal).collect(),
                    value => value.as_decimal().map(|d| vec![d]),
                }
            })
            .as_deref()
    }

    fn list_items(&self) -> Option<&[XsdValue]> {
        match self.value.unwrap_atomic() {
            XsdValue::List(items) if self.is_list => Some(items),
            _ => None,
        }
    }

    /// Type-aware value equality
    pub fn equals(&self, other: &TypedValue) -> bool {
        if self.dimension != other.dimension {
            return false;
        }

        if !self.datatype.same_type(&other.datatype) {
            if !self.datatype.is_comparable(&other.datatype) {
                return false;
            }
            if let (Some(a), Some(b)) = (self.decimals(), other.decimals()) {
                return a == b;
            }
        }

        match (self.list_items(), other.list_items()) {
            (Some(a), Some(b)) => a == b,
            (Some(a), None) => a.len() == 1 && a[0] == other.value,
            (None, Some(b)) => b.len() == 1 && self.value == b[0],
            (None, None) => self.value == other.value,
        }
    }

    /// Additive hash over the value's items; consistent with [`equals`](Self::equals)
    pub fn hash_code(&self) -> u64 {
        if let Some(decimals) = self.decimals() {
            return decimals.iter().fold(0u64, |acc, d| {
                acc.wrapping_add(hash_one(&XsdValue::Decimal(*d)))
            });
        }
        match self.value.unwrap_atomic() {
            XsdValue::List(items) => items
                .iter()
                .fold(0u64, |acc, item| acc.wrapping_add(hash_one(item))),
            value => hash_one(value),
        }
    }
}

impl PartialEq for TypedValue {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl Eq for TypedValue {}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lexical)
    }
}
