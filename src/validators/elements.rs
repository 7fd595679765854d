//! XSD Element Declarations
//!
//! The element model keeps what the identity validator needs: the
//! simple type of the element content (if any), nillability, attribute
//! types, default and fixed values, local child declarations and
//! compiled identity constraints.
//!
//! Reference: https://www.w3.org/TR/xmlschema-1/#cElement_Declarations

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::Result;
use crate::namespaces::{NamespaceContext, QName};

use super::datatypes::{Datatype, XsdValue};
use super::identities::CompiledIdentityConstraint;

/// Whether a value constraint is a default or a fixed value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueConstraintKind {
    /// `default`
    Default,
    /// `fixed`
    Fixed,
}

/// A default or fixed value, parsed with the declared type
#[derive(Debug, Clone)]
pub struct ValueConstraint {
    /// Default or fixed
    pub kind: ValueConstraintKind,
    /// White-space normalized lexical form
    pub lexical: String,
    /// Parsed value
    pub value: XsdValue,
}

impl ValueConstraint {
    /// Parse a value constraint; QName values resolve against `namespaces`
    pub fn new(
        kind: ValueConstraintKind,
        lexical: &str,
        datatype: &Datatype,
        namespaces: &NamespaceContext,
    ) -> Result<Self> {
        let lexical = datatype.white_space.normalize(lexical);
        let value = datatype.parse_value(&lexical, namespaces)?;
        Ok(Self {
            kind,
            lexical,
            value,
        })
    }

    /// Check if this is a fixed value
    pub fn is_fixed(&self) -> bool {
        self.kind == ValueConstraintKind::Fixed
    }
}

/// An element declaration
#[derive(Debug, Clone)]
pub struct XsdElement {
    /// Element name
    pub name: QName,
    /// Simple type of the content; `None` for element-only or empty content
    pub datatype: Option<Arc<Datatype>>,
    /// Whether `xsi:nil` is allowed
    pub nillable: bool,
    /// Default or fixed value of the content
    pub value_constraint: Option<ValueConstraint>,
    /// Declared attributes with their types
    pub attributes: IndexMap<QName, Arc<Datatype>>,
    /// Default or fixed values of declared attributes
    pub attribute_values: IndexMap<QName, ValueConstraint>,
    /// Local child element declarations
    pub children: IndexMap<QName, Arc<XsdElement>>,
    /// Identity constraints scoped to this element
    pub identities: Vec<Arc<CompiledIdentityConstraint>>,
}

impl XsdElement {
    /// Create an element with element-only content
    pub fn new(name: QName) -> Self {
        Self {
            name,
            datatype: None,
            nillable: false,
            value_constraint: None,
            attributes: IndexMap::new(),
            attribute_values: IndexMap::new(),
            children: IndexMap::new(),
            identities: Vec::new(),
        }
    }

    /// Create an element with simple content
    pub fn simple(name: QName, datatype: Arc<Datatype>) -> Self {
        let mut element = Self::new(name);
        element.datatype = Some(datatype);
        element
    }

    /// Set nillability
    pub fn with_nillable(mut self, nillable: bool) -> Self {
        self.nillable = nillable;
        self
    }

    /// Declare an attribute
    pub fn with_attribute(mut self, name: QName, datatype: Arc<Datatype>) -> Self {
        self.attributes.insert(name, datatype);
        self
    }

    /// Set the default or fixed value of the content
    pub fn with_value_constraint(mut self, constraint: ValueConstraint) -> Self {
        self.value_constraint = Some(constraint);
        self
    }

    /// Set the default or fixed value of a declared attribute
    pub fn with_attribute_value(mut self, name: QName, constraint: ValueConstraint) -> Self {
        self.attribute_values.insert(name, constraint);
        self
    }

    /// Declare a local child element
    pub fn with_child(mut self, child: XsdElement) -> Self {
        self.children.insert(child.name.clone(), Arc::new(child));
        self
    }

    /// Attach an identity constraint
    pub fn with_identity(mut self, identity: CompiledIdentityConstraint) -> Self {
        self.identities.push(Arc::new(identity));
        self
    }

    /// Check if the element has simple content
    pub fn has_simple_content(&self) -> bool {
        self.datatype.is_some()
    }

    /// Look up a local child declaration
    pub fn child(&self, name: &QName) -> Option<&Arc<XsdElement>> {
        self.children.get(name)
    }

    /// Look up an attribute type
    pub fn attribute_type(&self, name: &QName) -> Option<&Arc<Datatype>> {
        self.attributes.get(name)
    }

    /// Attributes with a default or fixed value that are not in `present`
    pub fn defaulted_attributes<'a>(
        &'a self,
        present: &'a [QName],
    ) -> impl Iterator<Item = (&'a QName, &'a Arc<Datatype>, &'a ValueConstraint)> + 'a {
        self.attribute_values
            .iter()
            .filter(move |(name, _)| !present.contains(name))
            .filter_map(move |(name, constraint)| {
                self.attributes
                    .get(name)
                    .map(|datatype| (name, datatype, constraint))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::datatypes::TypeCode;

    #[test]
    fn test_element_builders() {
        let element = XsdElement::new(QName::local("root"))
            .with_attribute(QName::local("id"), Datatype::builtin(TypeCode::Int))
            .with_child(XsdElement::simple(
                QName::local("code"),
                Datatype::builtin(TypeCode::String),
            ))
            .with_nillable(true);

        assert!(!element.has_simple_content());
        assert!(element.nillable);
        assert!(element.attribute_type(&QName::local("id")).is_some());
        assert!(element.attribute_type(&QName::local("code")).is_none());

        let child = element.child(&QName::local("code")).unwrap();
        assert!(child.has_simple_content());
        assert!(child.children.is_empty());
    }

    #[test]
    fn test_defaulted_attributes() {
        let int = Datatype::builtin(TypeCode::Int);
        let ns = NamespaceContext::new();
        let element = XsdElement::new(QName::local("item"))
            .with_attribute(QName::local("id"), int.clone())
            .with_attribute(QName::local("rank"), int.clone())
            .with_attribute(QName::local("note"), Datatype::builtin(TypeCode::String))
            .with_attribute_value(
                QName::local("id"),
                ValueConstraint::new(ValueConstraintKind::Default, " 7 ", &int, &ns).unwrap(),
            )
            .with_attribute_value(
                QName::local("rank"),
                ValueConstraint::new(ValueConstraintKind::Fixed, "1", &int, &ns).unwrap(),
            );

        let defaults: Vec<_> = element.defaulted_attributes(&[]).collect();
        assert_eq!(defaults.len(), 2);
        assert_eq!(defaults[0].0, &QName::local("id"));
        assert_eq!(defaults[0].2.lexical, "7");
        assert_eq!(defaults[0].2.value, XsdValue::Integer(7));
        assert!(defaults[1].2.is_fixed());

        let present = [QName::local("id")];
        let defaults: Vec<_> = element.defaulted_attributes(&present).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].0, &QName::local("rank"));

        assert!(ValueConstraint::new(ValueConstraintKind::Default, "x", &int, &ns).is_err());
    }
}
