//! Key sequences
//!
//! A [`KeySequence`] holds the field values collected for one selector
//! match. It is the unit stored in key, unique and keyref tables.

use std::fmt;
use std::hash::{Hash, Hasher};

use once_cell::unsync::OnceCell;

use super::typed_value::TypedValue;
use crate::locations::SourcePosition;

/// Field values of one selected node, one slot per field
///
/// Slots are write-once, and must not be filled after the sequence has
/// been hashed.
#[derive(Debug, Clone)]
pub struct KeySequence {
    values: Vec<Option<TypedValue>>,
    hash: OnceCell<u64>,
    position: SourcePosition,
}

impl KeySequence {
    /// Create an empty sequence with `field_count` slots
    pub fn new(field_count: usize, position: SourcePosition) -> Self {
        Self {
            values: vec![None; field_count],
            hash: OnceCell::new(),
            position,
        }
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the sequence has no slots
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value in a slot
    pub fn get(&self, column: usize) -> Option<&TypedValue> {
        self.values.get(column).and_then(Option::as_ref)
    }

    /// Whether a slot holds a value
    pub fn is_filled(&self, column: usize) -> bool {
        self.get(column).is_some()
    }

    /// Fill an empty slot
    ///
    /// # Panics
    ///
    /// If the slot is already filled or the sequence has been hashed.
    pub fn fill(&mut self, column: usize, value: TypedValue) {
        assert!(
            self.hash.get().is_none(),
            "key sequence modified after its hash was computed"
        );
        assert!(
            self.values[column].is_none(),
            "key sequence slot {} filled twice",
            column
        );
        self.values[column] = Some(value);
    }

    /// Whether every slot holds a value
    pub fn is_qualified(&self) -> bool {
        self.values.iter().all(Option::is_some)
    }

    /// Position of the selected node
    pub fn position(&self) -> SourcePosition {
        self.position
    }

    /// Memoized additive hash of the filled slots
    pub fn hash_code(&self) -> u64 {
        *self.hash.get_or_init(|| {
            self.values
                .iter()
                .flatten()
                .fold(0u64, |acc, value| acc.wrapping_add(value.hash_code()))
        })
    }
}

impl PartialEq for KeySequence {
    fn eq(&self, other: &Self) -> bool {
        self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(a, b)| match (a, b) {
                    (Some(a), Some(b)) => a.equals(b),
                    (None, None) => true,
                    _ => false,
                })
    }
}

impl Eq for KeySequence {}

impl Hash for KeySequence {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_code());
    }
}

impl fmt::Display for KeySequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for value in self.values.iter().flatten() {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{}", value)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces::NamespaceContext;
    use crate::validators::datatypes::{Datatype, TypeCode};
    use indexmap::IndexSet;
    use proptest::prelude::*;

    fn typed(code: TypeCode, lexical: &str) -> TypedValue {
        let datatype = Datatype::builtin(code);
        let value = datatype.parse_value(lexical, &NamespaceContext::new()).unwrap();
        TypedValue::new(value, lexical, datatype)
    }

    fn sequence(values: &[(TypeCode, &str)]) -> KeySequence {
        let mut ks = KeySequence::new(values.len(), SourcePosition::default());
        for (column, (code, lexical)) in values.iter().enumerate() {
            ks.fill(column, typed(*code, lexical));
        }
        ks
    }

    #[test]
    fn test_qualification() {
        let mut ks = KeySequence::new(2, SourcePosition::new(1, 1));
        assert!(!ks.is_qualified());

        ks.fill(0, typed(TypeCode::Int, "1"));
        assert!(ks.is_filled(0));
        assert!(!ks.is_filled(1));
        assert!(!ks.is_qualified());

        ks.fill(1, typed(TypeCode::String, "a"));
        assert!(ks.is_qualified());
        assert_eq!(ks.to_string(), "1 a");
    }

    #[test]
    #[should_panic(expected = "filled twice")]
    fn test_double_fill_panics() {
        let mut ks = KeySequence::new(1, SourcePosition::default());
        ks.fill(0, typed(TypeCode::Int, "1"));
        ks.fill(0, typed(TypeCode::Int, "2"));
    }

    #[test]
    #[should_panic(expected = "after its hash")]
    fn test_fill_after_hash_panics() {
        let mut ks = KeySequence::new(2, SourcePosition::default());
        ks.fill(0, typed(TypeCode::Int, "1"));
        ks.hash_code();
        ks.fill(1, typed(TypeCode::Int, "2"));
    }

    #[test]
    fn test_cross_type_equality_in_set() {
        let mut table = IndexSet::new();
        assert!(table.insert(sequence(&[(TypeCode::Int, "3"), (TypeCode::String, "x")])));
        assert!(!table.insert(sequence(&[(TypeCode::Decimal, "3.00"), (TypeCode::Token, "x")])));
        assert!(table.insert(sequence(&[(TypeCode::Decimal, "3.5"), (TypeCode::String, "x")])));
        assert_eq!(table.len(), 2);
    }

    proptest! {
        #[test]
        fn prop_value_equal_sequences_collapse(values in proptest::collection::vec(-500i64..500, 1..40)) {
            let mut table = IndexSet::new();
            let mut duplicates = 0;
            for (i, n) in values.iter().enumerate() {
                let ks = if i % 2 == 0 {
                    sequence(&[(TypeCode::Long, &n.to_string())])
                } else {
                    sequence(&[(TypeCode::Decimal, &format!("{}.0", n))])
                };
                if !table.insert(ks) {
                    duplicates += 1;
                }
            }

            let distinct: std::collections::HashSet<_> = values.iter().collect();
            prop_assert_eq!(table.len(), distinct.len());
            prop_assert_eq!(duplicates, values.len() - distinct.len());
        }
    }
}
