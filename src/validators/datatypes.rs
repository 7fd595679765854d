//! XSD simple datatypes and their values
//!
//! This module defines the built-in simple types, user-derived
//! restrictions/lists/unions, and the parsed value space used when
//! comparing identity-constraint keys.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use base64::Engine;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::names::{is_valid_name, is_valid_ncname, is_valid_nmtoken, validate_qname};
use crate::namespaces::{NamespaceContext, QName};
use crate::XSD_NAMESPACE;

// =============================================================================
// Type codes
// =============================================================================

/// Built-in XSD 1.0 simple types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeCode {
    /// xs:anySimpleType
    AnySimpleType,
    /// xs:anyAtomicType
    AnyAtomicType,
    /// xs:string
    String,
    /// xs:normalizedString
    NormalizedString,
    /// xs:token
    Token,
    /// xs:language
    Language,
    /// xs:NMTOKEN
    NmToken,
    /// xs:Name
    Name,
    /// xs:NCName
    NcName,
    /// xs:ID
    Id,
    /// xs:IDREF
    IdRef,
    /// xs:ENTITY
    Entity,
    /// xs:boolean
    Boolean,
    /// xs:decimal
    Decimal,
    /// xs:integer
    Integer,
    /// xs:nonPositiveInteger
    NonPositiveInteger,
    /// xs:negativeInteger
    NegativeInteger,
    /// xs:long
    Long,
    /// xs:int
    Int,
    /// xs:short
    Short,
    /// xs:byte
    Byte,
    /// xs:nonNegativeInteger
    NonNegativeInteger,
    /// xs:unsignedLong
    UnsignedLong,
    /// xs:unsignedInt
    UnsignedInt,
    /// xs:unsignedShort
    UnsignedShort,
    /// xs:unsignedByte
    UnsignedByte,
    /// xs:positiveInteger
    PositiveInteger,
    /// xs:float
    Float,
    /// xs:double
    Double,
    /// xs:duration
    Duration,
    /// xs:dateTime
    DateTime,
    /// xs:time
    Time,
    /// xs:date
    Date,
    /// xs:gYearMonth
    GYearMonth,
    /// xs:gYear
    GYear,
    /// xs:gMonthDay
    GMonthDay,
    /// xs:gDay
    GDay,
    /// xs:gMonth
    GMonth,
    /// xs:hexBinary
    HexBinary,
    /// xs:base64Binary
    Base64Binary,
    /// xs:anyURI
    AnyUri,
    /// xs:QName
    QName,
    /// xs:NOTATION
    Notation,
}

impl TypeCode {
    /// All built-in type codes, bases before derived types
    pub const ALL: [TypeCode; 43] = [
        TypeCode::AnySimpleType,
        TypeCode::AnyAtomicType,
        TypeCode::String,
        TypeCode::NormalizedString,
        TypeCode::Token,
        TypeCode::Language,
        TypeCode::NmToken,
        TypeCode::Name,
        TypeCode::NcName,
        TypeCode::Id,
        TypeCode::IdRef,
        TypeCode::Entity,
        TypeCode::Boolean,
        TypeCode::Decimal,
        TypeCode::Integer,
        TypeCode::NonPositiveInteger,
        TypeCode::NegativeInteger,
        TypeCode::Long,
        TypeCode::Int,
        TypeCode::Short,
        TypeCode::Byte,
        TypeCode::NonNegativeInteger,
        TypeCode::UnsignedLong,
        TypeCode::UnsignedInt,
        TypeCode::UnsignedShort,
        TypeCode::UnsignedByte,
        TypeCode::PositiveInteger,
        TypeCode::Float,
        TypeCode::Double,
        TypeCode::Duration,
        TypeCode::DateTime,
        TypeCode::Time,
        TypeCode::Date,
        TypeCode::GYearMonth,
        TypeCode::GYear,
        TypeCode::GMonthDay,
        TypeCode::GDay,
        TypeCode::GMonth,
        TypeCode::HexBinary,
        TypeCode::Base64Binary,
        TypeCode::AnyUri,
        TypeCode::QName,
        TypeCode::Notation,
    ];

    /// Local name of the type in the XSD namespace
    pub fn name(&self) -> &'static str {
        match self {
            TypeCode::AnySimpleType => "anySimpleType",
            TypeCode::AnyAtomicType => "anyAtomicType",
            TypeCode::String => "string",
            TypeCode::NormalizedString => "normalizedString",
            TypeCode::Token => "token",
            TypeCode::Language => "language",
            TypeCode::NmToken => "NMTOKEN",
            TypeCode::Name => "Name",
            TypeCode::NcName => "NCName",
            TypeCode::Id => "ID",
            TypeCode::IdRef => "IDREF",
            TypeCode::Entity => "ENTITY",
            TypeCode::Boolean => "boolean",
            TypeCode::Decimal => "decimal",
            TypeCode::Integer => "integer",
            TypeCode::NonPositiveInteger => "nonPositiveInteger",
            TypeCode::NegativeInteger => "negativeInteger",
            TypeCode::Long => "long",
            TypeCode::Int => "int",
            TypeCode::Short => "short",
            TypeCode::Byte => "byte",
            TypeCode::NonNegativeInteger => "nonNegativeInteger",
            TypeCode::UnsignedLong => "unsignedLong",
            TypeCode::UnsignedInt => "unsignedInt",
            TypeCode::UnsignedShort => "unsignedShort",
            TypeCode::UnsignedByte => "unsignedByte",
            TypeCode::PositiveInteger => "positiveInteger",
            TypeCode::Float => "float",
            TypeCode::Double => "double",
            TypeCode::Duration => "duration",
            TypeCode::DateTime => "dateTime",
            TypeCode::Time => "time",
            TypeCode::Date => "date",
            TypeCode::GYearMonth => "gYearMonth",
            TypeCode::GYear => "gYear",
            TypeCode::GMonthDay => "gMonthDay",
            TypeCode::GDay => "gDay",
            TypeCode::GMonth => "gMonth",
            TypeCode::HexBinary => "hexBinary",
            TypeCode::Base64Binary => "base64Binary",
            TypeCode::AnyUri => "anyURI",
            TypeCode::QName => "QName",
            TypeCode::Notation => "NOTATION",
        }
    }

    /// Look up a built-in type by local name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|code| code.name() == name)
    }

    /// Direct base type, `None` for anySimpleType
    pub fn base(&self) -> Option<TypeCode> {
        use TypeCode::*;
        match self {
            AnySimpleType => None,
            AnyAtomicType => Some(AnySimpleType),
            NormalizedString => Some(String),
            Token => Some(NormalizedString),
            Language | NmToken | Name => Some(Token),
            NcName => Some(Name),
            Id | IdRef | Entity => Some(NcName),
            Integer => Some(Decimal),
            NonPositiveInteger | Long | NonNegativeInteger => Some(Integer),
            NegativeInteger => Some(NonPositiveInteger),
            Int => Some(Long),
            Short => Some(Int),
            Byte => Some(Short),
            UnsignedLong | PositiveInteger => Some(NonNegativeInteger),
            UnsignedInt => Some(UnsignedLong),
            UnsignedShort => Some(UnsignedInt),
            UnsignedByte => Some(UnsignedShort),
            _ => Some(AnyAtomicType),
        }
    }

    /// The primitive type this type is derived from
    pub fn primitive(&self) -> TypeCode {
        let mut code = *self;
        while let Some(base) = code.base() {
            if base == TypeCode::AnyAtomicType || base == TypeCode::AnySimpleType {
                break;
            }
            code = base;
        }
        code
    }

    /// Whether this type is `other` or derived from it
    pub fn is_derived_from(&self, other: TypeCode) -> bool {
        let mut code = Some(*self);
        while let Some(current) = code {
            if current == other {
                return true;
            }
            code = current.base();
        }
        false
    }

    /// Whether values of this type have a decimal form
    pub fn is_decimal(&self) -> bool {
        self.is_derived_from(TypeCode::Decimal)
    }

    /// Whether this is a binary type
    pub fn is_binary(&self) -> bool {
        matches!(self, TypeCode::HexBinary | TypeCode::Base64Binary)
    }

    /// White space handling fixed for the built-in type
    pub fn white_space(&self) -> WhiteSpace {
        match self {
            TypeCode::String | TypeCode::AnySimpleType | TypeCode::AnyAtomicType => {
                WhiteSpace::Preserve
            }
            TypeCode::NormalizedString => WhiteSpace::Replace,
            _ => WhiteSpace::Collapse,
        }
    }

    /// Inclusive integer bounds for integer-derived types
    fn integer_bounds(&self) -> (Option<i128>, Option<i128>) {
        use TypeCode::*;
        match self {
            NonPositiveInteger => (None, Some(0)),
            NegativeInteger => (None, Some(-1)),
            Long => (Some(i64::MIN as i128), Some(i64::MAX as i128)),
            Int => (Some(i32::MIN as i128), Some(i32::MAX as i128)),
            Short => (Some(i16::MIN as i128), Some(i16::MAX as i128)),
            Byte => (Some(i8::MIN as i128), Some(i8::MAX as i128)),
            NonNegativeInteger => (Some(0), None),
            UnsignedLong => (Some(0), Some(u64::MAX as i128)),
            UnsignedInt => (Some(0), Some(u32::MAX as i128)),
            UnsignedShort => (Some(0), Some(u16::MAX as i128)),
            UnsignedByte => (Some(0), Some(u8::MAX as i128)),
            PositiveInteger => (Some(1), None),
            _ => (None, None),
        }
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "xs:{}", self.name())
    }
}

/// White space handling modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhiteSpace {
    /// Preserve all white space
    Preserve,
    /// Replace tabs and newlines with spaces
    Replace,
    /// Replace and collapse multiple spaces
    Collapse,
}

impl WhiteSpace {
    /// Normalize a string according to this white space mode
    pub fn normalize(&self, s: &str) -> String {
        match self {
            WhiteSpace::Preserve => s.to_string(),
            WhiteSpace::Replace => s.replace(['\t', '\n', '\r'], " "),
            WhiteSpace::Collapse => s.split_ascii_whitespace().collect::<Vec<_>>().join(" "),
        }
    }
}

// =============================================================================
// Datatypes
// =============================================================================

/// Simple type variety
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variety {
    /// Atomic values
    Atomic,
    /// Whitespace-separated lists of an item type
    List,
    /// Values of one of several member types
    Union,
}

/// A simple type definition
#[derive(Debug, Clone, PartialEq)]
pub struct Datatype {
    /// Type name (None for anonymous types)
    pub name: Option<QName>,
    /// Built-in code; a list reports its item's code, a union anyAtomicType
    pub type_code: TypeCode,
    /// Variety
    pub variety: Variety,
    /// Base type (None for anySimpleType)
    pub base: Option<Arc<Datatype>>,
    /// Item type for lists
    pub item_type: Option<Arc<Datatype>>,
    /// Member types for unions
    pub member_types: Vec<Arc<Datatype>>,
    /// White space handling
    pub white_space: WhiteSpace,
}

lazy_static::lazy_static! {
    /// Registry of all built-in XSD simple types
    static ref BUILTIN_TYPES: HashMap<TypeCode, Arc<Datatype>> = {
        let mut types: HashMap<TypeCode, Arc<Datatype>> = HashMap::new();
        for code in TypeCode::ALL {
            let base = code.base().and_then(|b| types.get(&b).cloned());
            types.insert(
                code,
                Arc::new(Datatype {
                    name: Some(QName::namespaced(XSD_NAMESPACE, code.name())),
                    type_code: code,
                    variety: Variety::Atomic,
                    base,
                    item_type: None,
                    member_types: Vec::new(),
                    white_space: code.white_space(),
                }),
            );
        }
        types
    };

    /// Built-in list types
    static ref BUILTIN_LISTS: HashMap<&'static str, Arc<Datatype>> = {
        let mut lists = HashMap::new();
        for (name, item) in [
            ("NMTOKENS", TypeCode::NmToken),
            ("IDREFS", TypeCode::IdRef),
            ("ENTITIES", TypeCode::Entity),
        ] {
            let list = Datatype::list(
                Some(QName::namespaced(XSD_NAMESPACE, name)),
                Datatype::builtin(item),
            );
            lists.insert(name, Arc::new(list));
        }
        lists
    };
}

impl Datatype {
    /// Get a built-in atomic type
    pub fn builtin(code: TypeCode) -> Arc<Datatype> {
        BUILTIN_TYPES[&code].clone()
    }

    /// Look up a built-in type (atomic or list) by local name
    pub fn builtin_by_name(name: &str) -> Option<Arc<Datatype>> {
        TypeCode::from_name(name)
            .map(Self::builtin)
            .or_else(|| BUILTIN_LISTS.get(name).cloned())
    }

    /// Derive a type by restriction
    pub fn restriction(name: Option<QName>, base: Arc<Datatype>) -> Datatype {
        Datatype {
            name,
            type_code: base.type_code,
            variety: base.variety,
            item_type: base.item_type.clone(),
            member_types: base.member_types.clone(),
            white_space: base.white_space,
            base: Some(base),
        }
    }

    /// Define a list type
    pub fn list(name: Option<QName>, item_type: Arc<Datatype>) -> Datatype {
        Datatype {
            name,
            type_code: item_type.type_code,
            variety: Variety::List,
            base: Some(Self::builtin(TypeCode::AnySimpleType)),
            item_type: Some(item_type),
            member_types: Vec::new(),
            white_space: WhiteSpace::Collapse,
        }
    }

    /// Define a union type
    pub fn union(name: Option<QName>, member_types: Vec<Arc<Datatype>>) -> Datatype {
        Datatype {
            name,
            type_code: TypeCode::AnyAtomicType,
            variety: Variety::Union,
            base: Some(Self::builtin(TypeCode::AnySimpleType)),
            item_type: None,
            member_types,
            white_space: WhiteSpace::Collapse,
        }
    }

    /// Whether this is a list type
    pub fn is_list(&self) -> bool {
        self.variety == Variety::List
    }

    /// Whether this is a union type
    pub fn is_union(&self) -> bool {
        self.variety == Variety::Union
    }

    /// Whether this is a binary type
    pub fn is_binary(&self) -> bool {
        self.variety == Variety::Atomic && self.type_code.is_binary()
    }

    /// Whether values (or list items) of this type have a decimal form
    pub fn is_decimal(&self) -> bool {
        self.variety != Variety::Union && self.type_code.is_decimal()
    }

    /// Whether this type is `other`, derived from it, or a member of it
    pub fn is_derived_from(&self, other: &Datatype) -> bool {
        if self.same_type(other) {
            return true;
        }
        if other.is_union() && other.member_types.iter().any(|m| self.is_derived_from(m)) {
            return true;
        }
        let mut current = self.base.as_deref();
        while let Some(base) = current {
            if base.same_type(other) {
                return true;
            }
            current = base.base.as_deref();
        }
        false
    }

    /// Whether values of the two types may be compared for equality
    pub fn is_comparable(&self, other: &Datatype) -> bool {
        self.type_code == other.type_code
            || self.type_code.primitive() == other.type_code.primitive()
            || self.is_derived_from(other)
            || other.is_derived_from(self)
    }

    /// Identity or structural equality
    pub fn same_type(&self, other: &Datatype) -> bool {
        std::ptr::eq(self, other) || self == other
    }

    /// Parse a lexical value into the value space of this type
    pub fn parse_value(&self, lexical: &str, namespaces: &NamespaceContext) -> Result<XsdValue> {
        match self.variety {
            Variety::List => {
                let item_type = self.item_type.as_ref().ok_or_else(|| {
                    Error::Type(format!("list type {} has no item type", self))
                })?;
                lexical
                    .split_ascii_whitespace()
                    .map(|item| item_type.parse_value(item, namespaces))
                    .collect::<Result<Vec<_>>>()
                    .map(XsdValue::List)
            }
            Variety::Union => {
                for member in &self.member_types {
                    if let Ok(value) = member.parse_value(lexical, namespaces) {
                        return Ok(match value {
                            XsdValue::Atomic(_) => value,
                            value => XsdValue::Atomic(AtomicValue {
                                datatype: member.clone(),
                                value: Box::new(value),
                            }),
                        });
                    }
                }
                Err(Error::Value(format!(
                    "'{}' is not valid for any member of {}",
                    lexical, self
                )))
            }
            Variety::Atomic => {
                let normalized = self.white_space.normalize(lexical);
                parse_atomic(self.type_code, &normalized, namespaces)
            }
        }
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) if name.namespace.as_deref() == Some(XSD_NAMESPACE) => {
                write!(f, "xs:{}", name.local_name)
            }
            Some(name) => write!(f, "{}", name),
            None => write!(f, "anonymous {:?} type", self.variety),
        }
    }
}

// =============================================================================
// Values
// =============================================================================

/// A point in time, normalized to UTC when a timezone was given
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp {
    /// Date and time
    pub value: NaiveDateTime,
    /// Whether the lexical value carried a timezone
    pub timezone: bool,
}

/// A value of a union member, tagged with the member type
#[derive(Debug, Clone)]
pub struct AtomicValue {
    /// The member type that accepted the value
    pub datatype: Arc<Datatype>,
    /// The parsed value
    pub value: Box<XsdValue>,
}

/// A parsed simple-type value
#[derive(Debug, Clone)]
pub enum XsdValue {
    /// String-derived types and anySimpleType
    String(String),
    /// xs:boolean
    Boolean(bool),
    /// xs:decimal, and integers beyond the i64 range
    Decimal(Decimal),
    /// Integers beyond the decimal range, as canonical digits
    BigInteger(String),
    /// Integer-derived types
    Integer(i64),
    /// xs:float
    Float(f32),
    /// xs:double
    Double(f64),
    /// xs:duration
    Duration {
        /// Total months
        months: i64,
        /// Total seconds
        seconds: Decimal,
    },
    /// xs:dateTime
    DateTime(Timestamp),
    /// xs:date, as the instant the day starts
    Date(Timestamp),
    /// xs:time, on the 1972-12-31 reference date
    Time(Timestamp),
    /// gYearMonth, gYear, gMonthDay, gDay and gMonth, with missing
    /// components taken from the 1972-01-01 reference date
    Gregorian(TypeCode, Timestamp),
    /// hexBinary and base64Binary octets
    Binary(Vec<u8>),
    /// xs:anyURI
    AnyUri(String),
    /// xs:QName
    QName(QName),
    /// xs:NOTATION
    Notation(QName),
    /// List type values
    List(Vec<XsdValue>),
    /// Union member value
    Atomic(AtomicValue),
}

impl XsdValue {
    /// The value with any union-member wrapper removed
    pub fn unwrap_atomic(&self) -> &XsdValue {
        match self {
            XsdValue::Atomic(atomic) => atomic.value.unwrap_atomic(),
            value => value,
        }
    }

    /// Decimal form of a numeric value
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self.unwrap_atomic() {
            XsdValue::Decimal(d) => Some(*d),
            XsdValue::Integer(i) => Some(Decimal::from(*i)),
            _ => None,
        }
    }

    /// Number of octets, list items, or 1
    pub fn dimension(&self) -> usize {
        match self.unwrap_atomic() {
            XsdValue::List(items) => items.len(),
            XsdValue::Binary(bytes) => bytes.len(),
            _ => 1,
        }
    }
}

impl PartialEq for XsdValue {
    fn eq(&self, other: &Self) -> bool {
        use XsdValue::*;
        match (self.unwrap_atomic(), other.unwrap_atomic()) {
            (String(a), String(b)) | (AnyUri(a), AnyUri(b)) => a == b,
            (Boolean(a), Boolean(b)) => a == b,
            (Decimal(a), Decimal(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (BigInteger(a), BigInteger(b)) => a == b,
            (Float(a), Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Double(a), Double(b)) => a == b || (a.is_nan() && b.is_nan()),
            (
                Duration {
                    months: m1,
                    seconds: s1,
                },
                Duration {
                    months: m2,
                    seconds: s2,
                },
            ) => m1 == m2 && s1 == s2,
            (DateTime(a), DateTime(b)) | (Date(a), Date(b)) | (Time(a), Time(b)) => a == b,
            (Gregorian(c1, a), Gregorian(c2, b)) => c1 == c2 && a == b,
            (Binary(a), Binary(b)) => a == b,
            (QName(a), QName(b)) | (Notation(a), Notation(b)) => a == b,
            (List(a), List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for XsdValue {}

/// Hash a decimal so that numerically equal values hash alike
pub(crate) fn hash_decimal<H: Hasher>(value: &Decimal, state: &mut H) {
    let normalized = value.normalize();
    normalized.mantissa().hash(state);
    normalized.scale().hash(state);
}

impl Hash for XsdValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        use XsdValue::*;
        match self.unwrap_atomic() {
            String(s) => (0u8, s).hash(state),
            Boolean(b) => (1u8, b).hash(state),
            Decimal(d) => {
                2u8.hash(state);
                hash_decimal(d, state);
            }
            Integer(i) => {
                2u8.hash(state);
                hash_decimal(&rust_decimal::Decimal::from(*i), state);
            }
            BigInteger(digits) => (15u8, digits).hash(state),
            Float(f) => {
                3u8.hash(state);
                let bits = if f.is_nan() {
                    f32::NAN.to_bits()
                } else if *f == 0.0 {
                    0
                } else {
                    f.to_bits()
                };
                bits.hash(state);
            }
            Double(f) => {
                4u8.hash(state);
                let bits = if f.is_nan() {
                    f64::NAN.to_bits()
                } else if *f == 0.0 {
                    0
                } else {
                    f.to_bits()
                };
                bits.hash(state);
            }
            Duration { months, seconds } => {
                5u8.hash(state);
                months.hash(state);
                hash_decimal(seconds, state);
            }
            DateTime(t) => (6u8, t).hash(state),
            Date(t) => (7u8, t).hash(state),
            Time(t) => (8u8, t).hash(state),
            Gregorian(code, t) => (9u8, code, t).hash(state),
            Binary(bytes) => (10u8, bytes).hash(state),
            AnyUri(s) => (11u8, s).hash(state),
            QName(q) => (12u8, q).hash(state),
            Notation(q) => (13u8, q).hash(state),
            List(items) => {
                14u8.hash(state);
                items.hash(state);
            }
            Atomic(_) => unreachable!("unwrap_atomic never returns a union member wrapper"),
        }
    }
}

// =============================================================================
// Lexical parsing
// =============================================================================

const TZ: &str = r"(Z|[+-]\d{2}:\d{2})?";

static DECIMAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)$").unwrap());

static INTEGER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+$").unwrap());

static FLOAT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?|-?INF|NaN)$").unwrap()
});

static LANGUAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z]{1,8}(-[a-zA-Z0-9]{1,8})*$").unwrap());

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(-)?P(?:(\d+)Y)?(?:(\d+)M)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d+)?)S)?)?$",
    )
    .unwrap()
});

static DATE_TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(-?\d{{4,}})-(\d{{2}})-(\d{{2}})T(\d{{2}}):(\d{{2}}):(\d{{2}})(\.\d+)?{TZ}$"
    ))
    .unwrap()
});

static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^(-?\d{{4,}})-(\d{{2}})-(\d{{2}}){TZ}$")).unwrap()
});

static TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^(\d{{2}}):(\d{{2}}):(\d{{2}})(\.\d+)?{TZ}$")).unwrap()
});

static GREGORIAN_RES: Lazy<HashMap<TypeCode, Regex>> = Lazy::new(|| {
    let month = r"(0[1-9]|1[0-2])";
    let day = r"(0[1-9]|[12]\d|3[01])";
    [
        (TypeCode::GYearMonth, format!(r"^(-?\d{{4,}})-{month}{TZ}$")),
        (TypeCode::GYear, format!(r"^(-?\d{{4,}}){TZ}$")),
        (TypeCode::GMonthDay, format!(r"^--{month}-{day}{TZ}$")),
        (TypeCode::GDay, format!(r"^---{day}{TZ}$")),
        (TypeCode::GMonth, format!(r"^--{month}{TZ}$")),
    ]
    .into_iter()
    .map(|(code, pattern)| (code, Regex::new(&pattern).unwrap()))
    .collect()
});

fn invalid(code: TypeCode, value: &str) -> Error {
    Error::Value(format!("'{}' is not a valid {}", value, code))
}

fn parse_atomic(code: TypeCode, value: &str, namespaces: &NamespaceContext) -> Result<XsdValue> {
    use TypeCode as T;

    match code {
        T::AnySimpleType | T::AnyAtomicType | T::String | T::NormalizedString | T::Token => {
            Ok(XsdValue::String(value.to_string()))
        }
        T::Language if LANGUAGE_RE.is_match(value) => Ok(XsdValue::String(value.to_string())),
        T::NmToken if is_valid_nmtoken(value) => Ok(XsdValue::String(value.to_string())),
        T::Name if is_valid_name(value) => Ok(XsdValue::String(value.to_string())),
        T::NcName | T::Id | T::IdRef | T::Entity if is_valid_ncname(value) => {
            Ok(XsdValue::String(value.to_string()))
        }
        T::Boolean => match value {
            "true" | "1" => Ok(XsdValue::Boolean(true)),
            "false" | "0" => Ok(XsdValue::Boolean(false)),
            _ => Err(invalid(code, value)),
        },
        T::Decimal if DECIMAL_RE.is_match(value) => Decimal::from_str(value.trim_start_matches('+'))
            .map(XsdValue::Decimal)
            .map_err(|_| invalid(code, value)),
        _ if code.is_decimal() => parse_integer(code, value),
        T::Float if FLOAT_RE.is_match(value) => Ok(XsdValue::Float(parse_float(value) as f32)),
        T::Double if FLOAT_RE.is_match(value) => Ok(XsdValue::Double(parse_float(value))),
        T::Duration => parse_duration(value),
        T::DateTime => parse_date_time(value),
        T::Date => parse_date(value),
        T::Time => parse_time(value),
        T::GYearMonth | T::GYear | T::GMonthDay | T::GDay | T::GMonth => {
            parse_gregorian(code, value)
        }
        T::HexBinary => decode_hex(value)
            .map(XsdValue::Binary)
            .ok_or_else(|| invalid(code, value)),
        T::Base64Binary => {
            let compact: String = value.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            base64::engine::general_purpose::STANDARD
                .decode(compact)
                .map(XsdValue::Binary)
                .map_err(|_| invalid(code, value))
        }
        T::AnyUri => Ok(XsdValue::AnyUri(value.to_string())),
        T::QName | T::Notation => {
            validate_qname(value)?;
            let qname = namespaces.resolve(value)?;
            Ok(if code == T::QName {
                XsdValue::QName(qname)
            } else {
                XsdValue::Notation(qname)
            })
        }
        _ => Err(invalid(code, value)),
    }
}

fn parse_integer(code: TypeCode, value: &str) -> Result<XsdValue> {
    if !INTEGER_RE.is_match(value) {
        return Err(invalid(code, value));
    }

    let (min, max) = code.integer_bounds();
    let out_of_range = || Error::Value(format!("'{}' is out of range for {}", value, code));
    let n = match value.parse::<i128>() {
        Ok(n) => n,
        // Beyond i128 only an unbounded side can hold the value
        Err(_) => {
            let bounded = if value.starts_with('-') { min } else { max };
            if bounded.is_some() {
                return Err(out_of_range());
            }
            return Ok(big_integer(value));
        }
    };
    if min.is_some_and(|m| n < m) || max.is_some_and(|m| n > m) {
        return Err(out_of_range());
    }
    Ok(match i64::try_from(n) {
        Ok(n) => XsdValue::Integer(n),
        Err(_) => big_integer(&n.to_string()),
    })
}

/// An integer beyond the i64 range: a decimal when it fits, digits otherwise
fn big_integer(value: &str) -> XsdValue {
    match Decimal::from_str(value.trim_start_matches('+')) {
        Ok(decimal) => XsdValue::Decimal(decimal),
        Err(_) => XsdValue::BigInteger(canonical_integer(value)),
    }
}

/// Sign and digits without leading zeros
fn canonical_integer(value: &str) -> String {
    let (negative, digits) = match value.as_bytes().first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    };
    let digits = digits.trim_start_matches('0');
    match (negative, digits.is_empty()) {
        (_, true) => "0".to_string(),
        (true, false) => format!("-{}", digits),
        (false, false) => digits.to_string(),
    }
}

fn parse_float(value: &str) -> f64 {
    match value {
        "INF" => f64::INFINITY,
        "-INF" => f64::NEG_INFINITY,
        "NaN" => f64::NAN,
        // FLOAT_RE admits only Rust-parsable forms here
        other => other.parse().unwrap_or(f64::NAN),
    }
}

fn decode_hex(value: &str) -> Option<Vec<u8>> {
    if value.len() % 2 != 0 || !value.is_ascii() {
        return None;
    }
    (0..value.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&value[i..i + 2], 16).ok())
        .collect()
}

fn parse_duration(value: &str) -> Result<XsdValue> {
    let invalid = || invalid(TypeCode::Duration, value);
    let caps = DURATION_RE.captures(value).ok_or_else(invalid)?;
    if value.ends_with('P') || value.ends_with('T') {
        return Err(invalid());
    }

    let number = |i: usize| -> Result<i64> {
        caps.get(i)
            .map_or(Ok(0), |m| m.as_str().parse::<i64>().map_err(|_| invalid()))
    };
    let years = number(2)?;
    let months = number(3)?;
    let days = number(4)?;
    let hours = number(5)?;
    let minutes = number(6)?;
    let secs = match caps.get(7) {
        Some(m) => Decimal::from_str(m.as_str()).map_err(|_| invalid())?,
        None => Decimal::ZERO,
    };

    let total_months = years
        .checked_mul(12)
        .and_then(|y| y.checked_add(months))
        .ok_or_else(invalid)?;
    let whole_seconds = days
        .checked_mul(86_400)
        .and_then(|d| hours.checked_mul(3_600).and_then(|h| d.checked_add(h)))
        .and_then(|s| minutes.checked_mul(60).and_then(|m| s.checked_add(m)))
        .ok_or_else(invalid)?;
    let total_seconds = Decimal::from(whole_seconds)
        .checked_add(secs)
        .ok_or_else(invalid)?;

    Ok(if caps.get(1).is_some() {
        XsdValue::Duration {
            months: -total_months,
            seconds: -total_seconds,
        }
    } else {
        XsdValue::Duration {
            months: total_months,
            seconds: total_seconds,
        }
    })
}

/// Timezone offset in minutes
fn parse_offset(tz: Option<&str>) -> Option<Option<i64>> {
    let tz = match tz {
        None => return Some(None),
        Some("Z") => return Some(Some(0)),
        Some(tz) => tz,
    };
    let sign = if tz.starts_with('-') { -1 } else { 1 };
    let hours: i64 = tz[1..3].parse().ok()?;
    let minutes: i64 = tz[4..6].parse().ok()?;
    if hours > 14 || minutes > 59 || (hours == 14 && minutes != 0) {
        return None;
    }
    Some(Some(sign * (hours * 60 + minutes)))
}

/// Time of day, and whether it was `24:00:00` (start of the next day)
fn parse_clock(hour: &str, minute: &str, second: &str, fraction: Option<&str>) -> Option<(NaiveTime, bool)> {
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    let second: u32 = second.parse().ok()?;
    let digits = fraction.map(|f| &f[1..]).unwrap_or("");
    let nanos: u32 = if digits.is_empty() {
        0
    } else {
        let truncated: String = digits.chars().chain(std::iter::repeat('0')).take(9).collect();
        truncated.parse().ok()?
    };

    if hour == 24 {
        return (minute == 0 && second == 0 && nanos == 0).then(|| (NaiveTime::MIN, true));
    }
    NaiveTime::from_hms_nano_opt(hour, minute, second, nanos).map(|t| (t, false))
}

fn make_date(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    let year: i32 = year.parse().ok()?;
    if year == 0 {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
}

fn make_timestamp(
    date: NaiveDate,
    time: NaiveTime,
    next_day: bool,
    offset: Option<i64>,
) -> Option<Timestamp> {
    let mut value = NaiveDateTime::new(date, time);
    if next_day {
        value = value.checked_add_signed(TimeDelta::try_days(1)?)?;
    }
    if let Some(offset) = offset {
        value = value.checked_sub_signed(TimeDelta::try_minutes(offset)?)?;
    }
    Some(Timestamp {
        value,
        timezone: offset.is_some(),
    })
}

fn parse_date_time(value: &str) -> Result<XsdValue> {
    let caps = DATE_TIME_RE
        .captures(value)
        .ok_or_else(|| invalid(TypeCode::DateTime, value))?;
    (|| {
        let date = make_date(&caps[1], &caps[2], &caps[3])?;
        let (time, next_day) =
            parse_clock(&caps[4], &caps[5], &caps[6], caps.get(7).map(|m| m.as_str()))?;
        let offset = parse_offset(caps.get(8).map(|m| m.as_str()))?;
        make_timestamp(date, time, next_day, offset)
    })()
    .map(XsdValue::DateTime)
    .ok_or_else(|| invalid(TypeCode::DateTime, value))
}

fn parse_date(value: &str) -> Result<XsdValue> {
    let caps = DATE_RE
        .captures(value)
        .ok_or_else(|| invalid(TypeCode::Date, value))?;
    (|| {
        let date = make_date(&caps[1], &caps[2], &caps[3])?;
        let offset = parse_offset(caps.get(4).map(|m| m.as_str()))?;
        make_timestamp(date, NaiveTime::MIN, false, offset)
    })()
    .map(XsdValue::Date)
    .ok_or_else(|| invalid(TypeCode::Date, value))
}

fn parse_time(value: &str) -> Result<XsdValue> {
    let caps = TIME_RE
        .captures(value)
        .ok_or_else(|| invalid(TypeCode::Time, value))?;
    (|| {
        let reference = NaiveDate::from_ymd_opt(1972, 12, 31)?;
        // 24:00:00 is the same time of day as 00:00:00
        let (time, _) =
            parse_clock(&caps[1], &caps[2], &caps[3], caps.get(4).map(|m| m.as_str()))?;
        let offset = parse_offset(caps.get(5).map(|m| m.as_str()))?;
        make_timestamp(reference, time, false, offset)
    })()
    .map(XsdValue::Time)
    .ok_or_else(|| invalid(TypeCode::Time, value))
}

fn parse_gregorian(code: TypeCode, value: &str) -> Result<XsdValue> {
    const YEAR: &str = "1972";
    let caps = GREGORIAN_RES[&code]
        .captures(value)
        .ok_or_else(|| invalid(code, value))?;
    let group = |i: usize| caps.get(i).map(|m| m.as_str());
    (|| {
        let (year, month, day) = match code {
            TypeCode::GYearMonth => (group(1)?, group(2)?, "01"),
            TypeCode::GYear => (group(1)?, "01", "01"),
            TypeCode::GMonthDay => (YEAR, group(1)?, group(2)?),
            TypeCode::GDay => (YEAR, "01", group(1)?),
            _ => (YEAR, group(1)?, "01"),
        };
        let date = make_date(year, month, day)?;
        // The timezone is always the last group
        let offset = parse_offset(group(caps.len() - 1))?;
        make_timestamp(date, NaiveTime::MIN, false, offset)
    })()
    .map(|timestamp| XsdValue::Gregorian(code, timestamp))
    .ok_or_else(|| invalid(code, value))
}
