//! Identity-constraint validation events
//!
//! Violations found while streaming a document are not `Err`s: they are
//! collected as [`ValidationEvent`]s and handed to a
//! [`ValidationEventSink`], and the traversal continues.

use std::fmt;

use serde::Serialize;

use crate::locations::SourcePosition;

/// Severity of a validation event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The document is invalid
    Error,
    /// Informational; the document is not judged invalid
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Kind of identity-constraint violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdentityErrorKind {
    /// A key field selected no value
    MissingKey,
    /// A key or unique value occurred twice in the same scope
    DuplicateKey,
    /// A field selected more than one node
    FieldCardinality,
    /// A field selected an element without simple content
    FieldSimpleTypeExpected,
    /// A keyref value has no matching key or unique value
    UnresolvedKeyref,
    /// The constraint a keyref refers to is not in scope
    RefNotInScope,
    /// An attribute or element value is not valid for its type
    InvalidValue,
    /// An element has no declaration
    UndeclaredElement,
}

impl IdentityErrorKind {
    /// Stable identifier of the kind
    pub fn code(&self) -> &'static str {
        match self {
            IdentityErrorKind::MissingKey => "missing-key",
            IdentityErrorKind::DuplicateKey => "duplicate-key",
            IdentityErrorKind::FieldCardinality => "field-cardinality",
            IdentityErrorKind::FieldSimpleTypeExpected => "field-simple-type-expected",
            IdentityErrorKind::UnresolvedKeyref => "unresolved-keyref",
            IdentityErrorKind::RefNotInScope => "ref-not-in-scope",
            IdentityErrorKind::InvalidValue => "invalid-value",
            IdentityErrorKind::UndeclaredElement => "undeclared-element",
        }
    }
}

impl fmt::Display for IdentityErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One reported violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationEvent {
    /// Severity
    pub severity: Severity,
    /// Kind of violation
    pub kind: IdentityErrorKind,
    /// Human-readable message
    pub message: String,
    /// Name of the constraint involved, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
    /// Position of the offending node, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<SourcePosition>,
}

impl ValidationEvent {
    /// Create an error event
    pub fn error(kind: IdentityErrorKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            message: message.into(),
            constraint: None,
            position: None,
        }
    }

    /// Create a warning event
    pub fn warning(kind: IdentityErrorKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(kind, message)
        }
    }

    /// Set the constraint name
    pub fn with_constraint(mut self, name: impl Into<String>) -> Self {
        self.constraint = Some(name.into());
        self
    }

    /// Set the source position
    pub fn with_position(mut self, position: SourcePosition) -> Self {
        if position.is_known() {
            self.position = Some(position);
        }
        self
    }

    /// Whether this event makes the document invalid
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ValidationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(position) = &self.position {
            write!(f, "{}: ", position)?;
        }
        write!(f, "{} [{}]: {}", self.severity, self.kind, self.message)
    }
}

/// Receiver of validation events
pub trait ValidationEventSink {
    /// Handle one event
    fn report(&mut self, event: ValidationEvent);
}

impl ValidationEventSink for Vec<ValidationEvent> {
    fn report(&mut self, event: ValidationEvent) {
        self.push(event);
    }
}

/// Adapts a closure into a [`ValidationEventSink`]
pub struct CallbackSink<F: FnMut(ValidationEvent)>(pub F);

impl<F: FnMut(ValidationEvent)> ValidationEventSink for CallbackSink<F> {
    fn report(&mut self, event: ValidationEvent) {
        (self.0)(event)
    }
}
