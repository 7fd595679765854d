//! XSD Identity Constraints
//!
//! This module declares identity constraints for XML Schema:
//! - xs:unique - Ensures values are unique within scope
//! - xs:key - Like unique, but all field values must be present
//! - xs:keyref - References a key/unique constraint (foreign key)
//!
//! Declarations are compiled into [`CompiledIdentityConstraint`]s, whose
//! selector and field paths drive the streaming identity validator.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::{ParseError, Result};
use crate::namespaces::{NamespaceContext, QName};
use crate::xpath::{CompiledPath, IdentityXPathParser};

/// XPath selector for identity constraints.
/// The selector identifies which elements are subject to the constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XsdSelector {
    /// The XPath expression
    pub xpath: String,
    /// XPath default namespace
    pub xpath_default_namespace: Option<String>,
}

impl XsdSelector {
    /// Create a new selector with the given XPath expression
    pub fn new(xpath: impl Into<String>) -> Self {
        Self {
            xpath: xpath.into(),
            xpath_default_namespace: None,
        }
    }

    /// Create a selector with default namespace
    pub fn with_default_namespace(xpath: impl Into<String>, ns: impl Into<String>) -> Self {
        Self {
            xpath: xpath.into(),
            xpath_default_namespace: Some(ns.into()),
        }
    }

    /// Compile the selector expression
    pub fn compile(&self, namespaces: &NamespaceContext) -> Result<Arc<CompiledPath>> {
        let path = IdentityXPathParser::selector()
            .with_default_namespace(self.xpath_default_namespace.clone())
            .compile(&self.xpath, namespaces)?;
        Ok(Arc::new(path))
    }
}

/// XPath field selector for identity constraints.
/// Fields identify which values form the key within selected elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XsdField {
    /// The XPath expression
    pub xpath: String,
    /// XPath default namespace
    pub xpath_default_namespace: Option<String>,
}

impl XsdField {
    /// Create a new field with the given XPath expression
    pub fn new(xpath: impl Into<String>) -> Self {
        Self {
            xpath: xpath.into(),
            xpath_default_namespace: None,
        }
    }

    /// Create a field with default namespace
    pub fn with_default_namespace(xpath: impl Into<String>, ns: impl Into<String>) -> Self {
        Self {
            xpath: xpath.into(),
            xpath_default_namespace: Some(ns.into()),
        }
    }

    /// Compile the field expression
    pub fn compile(&self, namespaces: &NamespaceContext) -> Result<Arc<CompiledPath>> {
        let path = IdentityXPathParser::field()
            .with_default_namespace(self.xpath_default_namespace.clone())
            .compile(&self.xpath, namespaces)?;
        Ok(Arc::new(path))
    }
}

/// Type of identity constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityConstraintKind {
    /// xs:unique - values must be unique, but fields can be missing
    Unique,
    /// xs:key - values must be unique AND all fields must be present
    Key,
    /// xs:keyref - references a key or unique constraint
    Keyref,
}

impl fmt::Display for IdentityConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityConstraintKind::Unique => write!(f, "unique"),
            IdentityConstraintKind::Key => write!(f, "key"),
            IdentityConstraintKind::Keyref => write!(f, "keyref"),
        }
    }
}

/// An identity constraint declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XsdIdentity {
    /// Constraint name
    pub name: QName,
    /// Kind of constraint
    pub kind: IdentityConstraintKind,
    /// XPath selector
    pub selector: XsdSelector,
    /// XPath fields
    pub fields: Vec<XsdField>,
    /// Reference to another constraint (for keyref)
    pub refer: Option<QName>,
}

impl XsdIdentity {
    /// Create a new identity constraint
    pub fn new(name: QName, kind: IdentityConstraintKind, selector: XsdSelector) -> Self {
        Self {
            name,
            kind,
            selector,
            fields: Vec::new(),
            refer: None,
        }
    }

    /// Create a key constraint
    pub fn key(name: QName, selector: XsdSelector) -> Self {
        Self::new(name, IdentityConstraintKind::Key, selector)
    }

    /// Create a keyref constraint
    pub fn keyref(name: QName, selector: XsdSelector, refer: QName) -> Self {
        let mut identity = Self::new(name, IdentityConstraintKind::Keyref, selector);
        identity.refer = Some(refer);
        identity
    }

    /// Add a field to this constraint
    pub fn add_field(&mut self, field: XsdField) {
        self.fields.push(field);
    }

    /// Add multiple fields
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = XsdField>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Check if this is a key constraint
    pub fn is_key(&self) -> bool {
        matches!(self.kind, IdentityConstraintKind::Key)
    }

    /// Check if this is a keyref constraint
    pub fn is_keyref(&self) -> bool {
        matches!(self.kind, IdentityConstraintKind::Keyref)
    }

    /// Check the declaration and compile its selector and fields
    pub fn compile(&self, namespaces: &NamespaceContext) -> Result<CompiledIdentityConstraint> {
        if self.fields.is_empty() {
            return Err(ParseError::new(format!(
                "identity constraint '{}' must have at least one field",
                self.name
            ))
            .into());
        }
        if self.is_keyref() && self.refer.is_none() {
            return Err(ParseError::new(format!(
                "keyref '{}' must have a 'refer' attribute",
                self.name
            ))
            .into());
        }

        let selector = self.selector.compile(namespaces).map_err(|e| {
            ParseError::new(format!("invalid selector of '{}': {}", self.name, e))
                .with_source(self.selector.xpath.clone())
        })?;
        let fields = self
            .fields
            .iter()
            .map(|field| {
                field.compile(namespaces).map_err(|e| {
                    ParseError::new(format!("invalid field of '{}': {}", self.name, e))
                        .with_source(field.xpath.clone())
                        .into()
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CompiledIdentityConstraint {
            name: self.name.clone(),
            kind: self.kind,
            selector,
            fields,
            refer: self.refer.clone(),
        })
    }
}

/// A compiled identity constraint, shared by every scope it opens in
#[derive(Debug, Clone)]
pub struct CompiledIdentityConstraint {
    /// Constraint name
    pub name: QName,
    /// Kind of constraint
    pub kind: IdentityConstraintKind,
    /// Compiled selector
    pub selector: Arc<CompiledPath>,
    /// Compiled fields, in key order
    pub fields: Vec<Arc<CompiledPath>>,
    /// Referenced key/unique (keyref only)
    pub refer: Option<QName>,
}

impl CompiledIdentityConstraint {
    /// Number of fields
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Source expression of a field
    pub fn field_expression(&self, column: usize) -> &str {
        self.fields
            .get(column)
            .map(|path| path.expression())
            .unwrap_or("")
    }
}

/// Builder for identity constraints
#[derive(Debug)]
pub struct IdentityBuilder {
    name: Option<QName>,
    kind: IdentityConstraintKind,
    selector: Option<String>,
    fields: Vec<String>,
    refer: Option<QName>,
    xpath_default_namespace: Option<String>,
}

impl IdentityBuilder {
    fn new(kind: IdentityConstraintKind) -> Self {
        Self {
            name: None,
            kind,
            selector: None,
            fields: Vec::new(),
            refer: None,
            xpath_default_namespace: None,
        }
    }

    /// Create a builder for a unique constraint
    pub fn unique() -> Self {
        Self::new(IdentityConstraintKind::Unique)
    }

    /// Create a builder for a key constraint
    pub fn key() -> Self {
        Self::new(IdentityConstraintKind::Key)
    }

    /// Create a builder for a keyref constraint
    pub fn keyref() -> Self {
        Self::new(IdentityConstraintKind::Keyref)
    }

    /// Set the constraint name
    pub fn name(mut self, name: QName) -> Self {
        self.name = Some(name);
        self
    }

    /// Set the selector
    pub fn selector(mut self, xpath: impl Into<String>) -> Self {
        self.selector = Some(xpath.into());
        self
    }

    /// Add a field
    pub fn field(mut self, xpath: impl Into<String>) -> Self {
        self.fields.push(xpath.into());
        self
    }

    /// Set the refer attribute (for keyref)
    pub fn refer(mut self, refer: QName) -> Self {
        self.refer = Some(refer);
        self
    }

    /// Set the namespace of unprefixed names in selector and fields
    pub fn xpath_default_namespace(mut self, ns: impl Into<String>) -> Self {
        self.xpath_default_namespace = Some(ns.into());
        self
    }

    /// Build the identity constraint
    pub fn build(self) -> std::result::Result<XsdIdentity, ParseError> {
        let name = self
            .name
            .ok_or_else(|| ParseError::new("identity constraint must have a name"))?;

        let selector = self
            .selector
            .ok_or_else(|| ParseError::new("identity constraint must have a selector"))?;

        if self.fields.is_empty() {
            return Err(ParseError::new(
                "identity constraint must have at least one field",
            ));
        }

        if self.kind == IdentityConstraintKind::Keyref && self.refer.is_none() {
            return Err(ParseError::new("keyref must have a 'refer' attribute"));
        }

        let default_ns = self.xpath_default_namespace;
        let mut identity = XsdIdentity::new(
            name,
            self.kind,
            XsdSelector {
                xpath: selector,
                xpath_default_namespace: default_ns.clone(),
            },
        );
        identity.fields = self
            .fields
            .into_iter()
            .map(|xpath| XsdField {
                xpath,
                xpath_default_namespace: default_ns.clone(),
            })
            .collect();
        identity.refer = self.refer;

        Ok(identity)
    }
}
