//! XML Schema validators
//!
//! This module contains the identity-constraint validation logic:
//! datatypes and typed values, constraint declarations, the runtime
//! constraint state, the streaming validator and the document driver.

// Values
pub mod datatypes;
pub mod typed_value;
pub mod key_sequence;

// Declarations
pub mod identities;
pub mod elements;
pub mod schemas;

// Validation
pub mod exceptions;
pub mod constraints;
pub mod validation;
pub mod document_validation;

// Re-exports
pub use constraints::{
    ConstraintStruct, FieldState, KeyrefHandle, KeyrefTable, KeyrefTarget, LocatedActiveAxis,
    SelectorActiveAxis,
};
pub use datatypes::{Datatype, TypeCode, Variety, WhiteSpace, XsdValue};
pub use document_validation::{validate_identities, validate_identities_with_sink};
pub use elements::{ValueConstraint, ValueConstraintKind, XsdElement};
pub use exceptions::{CallbackSink, IdentityErrorKind, Severity, ValidationEvent, ValidationEventSink};
pub use identities::{
    CompiledIdentityConstraint, IdentityBuilder, IdentityConstraintKind, XsdField, XsdIdentity,
    XsdSelector,
};
pub use key_sequence::KeySequence;
pub use schemas::{FormDefault, XsdSchema};
pub use typed_value::TypedValue;
pub use validation::{ElementStart, IdentityValidator, SimpleContent, ValidationSettings};
