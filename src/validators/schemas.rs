//! Schema model
//!
//! An [`XsdSchema`] holds the global element declarations used to drive
//! identity validation. Schemas are built programmatically or loaded
//! from a JSON description:
//!
//! ```json
//! {
//!   "targetNamespace": "urn:shop",
//!   "elementFormDefault": "qualified",
//!   "namespaces": { "s": "urn:shop" },
//!   "simpleTypes": [ { "name": "sku", "restriction": "xs:token" } ],
//!   "elements": [
//!     {
//!       "name": "shop",
//!       "children": [ {
//!         "name": "item",
//!         "attributes": { "sku": "sku", "qty": { "type": "xs:int", "default": "1" } }
//!       } ],
//!       "identities": [
//!         { "kind": "key", "name": "itemKey", "selector": "s:item", "fields": ["@sku"] }
//!       ]
//!     }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{Error, ParseError, Result};
use crate::loaders::Loader;
use crate::names::validate_ncname;
use crate::namespaces::{NamespaceContext, QName};
use crate::XSD_NAMESPACE;

use super::datatypes::Datatype;
use super::elements::{ValueConstraint, ValueConstraintKind, XsdElement};
use super::identities::{
    CompiledIdentityConstraint, IdentityConstraintKind, XsdField, XsdIdentity, XsdSelector,
};

/// Form default for local elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormDefault {
    /// Unqualified (default)
    #[default]
    Unqualified,
    /// Qualified
    Qualified,
}

impl FormDefault {
    /// Check if qualified
    pub fn is_qualified(&self) -> bool {
        matches!(self, Self::Qualified)
    }
}

impl fmt::Display for FormDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Qualified => write!(f, "qualified"),
            Self::Unqualified => write!(f, "unqualified"),
        }
    }
}

/// A schema: global element declarations of one target namespace
#[derive(Debug, Clone, Default)]
pub struct XsdSchema {
    /// Target namespace
    pub target_namespace: Option<String>,
    /// Global element declarations
    elements: IndexMap<QName, Arc<XsdElement>>,
}

impl XsdSchema {
    /// Create an empty schema
    pub fn new(target_namespace: Option<String>) -> Self {
        Self {
            target_namespace,
            elements: IndexMap::new(),
        }
    }

    /// Add a global element declaration
    pub fn add_element(&mut self, element: XsdElement) {
        self.elements.insert(element.name.clone(), Arc::new(element));
    }

    /// Look up a global element declaration
    pub fn lookup_element(&self, qname: &QName) -> Option<&Arc<XsdElement>> {
        self.elements.get(qname)
    }

    /// Iterate over global element declarations
    pub fn elements(&self) -> impl Iterator<Item = &Arc<XsdElement>> {
        self.elements.values()
    }

    /// Number of global element declarations
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Load a schema from a JSON model file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = Loader::new().load(path)?;
        Self::from_json(&text)
    }

    /// Build a schema from a JSON model
    pub fn from_json(text: &str) -> Result<Self> {
        let model: SchemaModel = serde_json::from_str(text)?;
        ModelBuilder::new(&model).build(&model)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SchemaModel {
    #[serde(default)]
    target_namespace: Option<String>,
    #[serde(default)]
    element_form_default: FormDefault,
    #[serde(default)]
    namespaces: BTreeMap<String, String>,
    #[serde(default)]
    simple_types: Vec<SimpleTypeModel>,
    elements: Vec<ElementModel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SimpleTypeModel {
    name: String,
    #[serde(default)]
    restriction: Option<String>,
    #[serde(default)]
    list: Option<String>,
    #[serde(default)]
    union: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ElementModel {
    name: String,
    #[serde(default, rename = "type")]
    type_name: Option<String>,
    #[serde(default)]
    nillable: bool,
    #[serde(default)]
    default: Option<String>,
    #[serde(default)]
    fixed: Option<String>,
    #[serde(default)]
    attributes: BTreeMap<String, AttributeModel>,
    #[serde(default)]
    children: Vec<ElementModel>,
    #[serde(default)]
    identities: Vec<IdentityModel>,
}

/// An attribute type name, or a declaration with a default or fixed value
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AttributeModel {
    Type(String),
    Declaration(AttributeDeclarationModel),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct AttributeDeclarationModel {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    default: Option<String>,
    #[serde(default)]
    fixed: Option<String>,
}

impl AttributeModel {
    fn type_name(&self) -> &str {
        match self {
            Self::Type(type_name) => type_name,
            Self::Declaration(declaration) => &declaration.type_name,
        }
    }

    fn values(&self) -> (Option<&String>, Option<&String>) {
        match self {
            Self::Type(_) => (None, None),
            Self::Declaration(declaration) => {
                (declaration.default.as_ref(), declaration.fixed.as_ref())
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct IdentityModel {
    kind: IdentityConstraintKind,
    name: String,
    selector: String,
    fields: Vec<String>,
    #[serde(default)]
    refer: Option<String>,
    #[serde(default)]
    xpath_default_namespace: Option<String>,
}

struct ModelBuilder {
    namespaces: NamespaceContext,
    target_namespace: Option<String>,
    element_form: FormDefault,
    types: HashMap<String, Arc<Datatype>>,
    constraints: HashMap<QName, IdentityConstraintKind>,
    keyrefs: Vec<(QName, QName)>,
}

impl ModelBuilder {
    fn new(model: &SchemaModel) -> Self {
        let mut namespaces = NamespaceContext::new();
        for (prefix, uri) in &model.namespaces {
            namespaces.add_prefix(prefix.as_str(), uri.as_str());
        }
        Self {
            namespaces,
            target_namespace: model.target_namespace.clone().filter(|ns| !ns.is_empty()),
            element_form: model.element_form_default,
            types: HashMap::new(),
            constraints: HashMap::new(),
            keyrefs: Vec::new(),
        }
    }

    fn build(mut self, model: &SchemaModel) -> Result<XsdSchema> {
        for simple_type in &model.simple_types {
            let datatype = self.simple_type(simple_type)?;
            self.types
                .insert(simple_type.name.clone(), Arc::new(datatype));
        }

        let mut schema = XsdSchema::new(self.target_namespace.clone());
        for element in &model.elements {
            let element = self.element(element, true)?;
            if schema.lookup_element(&element.name).is_some() {
                return Err(ParseError::new(format!(
                    "duplicate global element '{}'",
                    element.name
                ))
                .into());
            }
            schema.add_element(element);
        }

        for (keyref, refer) in &self.keyrefs {
            match self.constraints.get(refer) {
                Some(IdentityConstraintKind::Key) | Some(IdentityConstraintKind::Unique) => {}
                Some(IdentityConstraintKind::Keyref) => {
                    return Err(ParseError::new(format!(
                        "keyref '{}' refers to keyref '{}'",
                        keyref, refer
                    ))
                    .into())
                }
                None => {
                    return Err(ParseError::new(format!(
                        "keyref '{}' refers to undeclared constraint '{}'",
                        keyref, refer
                    ))
                    .into())
                }
            }
        }

        log::debug!(
            "schema model loaded: {} global element(s), {} identity constraint(s)",
            schema.element_count(),
            self.constraints.len()
        );
        Ok(schema)
    }

    fn simple_type(&self, model: &SimpleTypeModel) -> Result<Datatype> {
        validate_ncname(&model.name)?;
        if self.types.contains_key(&model.name) {
            return Err(ParseError::new(format!("duplicate simple type '{}'", model.name)).into());
        }
        let name = Some(QName::new(self.target_namespace.clone(), model.name.as_str()));

        match (&model.restriction, &model.list, model.union.is_empty()) {
            (Some(base), None, true) => Ok(Datatype::restriction(name, self.resolve_type(base)?)),
            (None, Some(item), true) => {
                let item_type = self.resolve_type(item)?;
                if item_type.is_list() {
                    return Err(Error::Type(format!(
                        "list type '{}' cannot have list item type '{}'",
                        model.name, item
                    )));
                }
                Ok(Datatype::list(name, item_type))
            }
            (None, None, false) => {
                let members = model
                    .union
                    .iter()
                    .map(|member| self.resolve_type(member))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Datatype::union(name, members))
            }
            _ => Err(ParseError::new(format!(
                "simple type '{}' must have exactly one of restriction, list or union",
                model.name
            ))
            .into()),
        }
    }

    /// Resolve a type reference: a built-in (`xs:` prefix) or a declared simple type
    fn resolve_type(&self, reference: &str) -> Result<Arc<Datatype>> {
        let (prefix, local) = match reference.split_once(':') {
            Some((prefix, local)) => (Some(prefix), local),
            None => (None, reference),
        };
        let builtin = match prefix {
            Some(prefix) => self
                .namespaces
                .get_namespace(prefix)
                .map_or(prefix == "xs" || prefix == "xsd", |ns| ns == XSD_NAMESPACE),
            None => false,
        };

        if builtin {
            Datatype::builtin_by_name(local)
                .ok_or_else(|| Error::Type(format!("unknown built-in type '{}'", reference)))
        } else {
            self.types
                .get(local)
                .cloned()
                .ok_or_else(|| Error::Type(format!("unknown simple type '{}'", reference)))
        }
    }

    fn element(&mut self, model: &ElementModel, global: bool) -> Result<XsdElement> {
        validate_ncname(&model.name)?;
        let namespace = if global || self.element_form.is_qualified() {
            self.target_namespace.clone()
        } else {
            None
        };
        let mut element = XsdElement::new(QName::new(namespace, model.name.as_str()))
            .with_nillable(model.nillable);

        if let Some(type_name) = &model.type_name {
            element.datatype = Some(self.resolve_type(type_name)?);
            if !model.children.is_empty() {
                return Err(ParseError::new(format!(
                    "element '{}' has simple content and child elements",
                    model.name
                ))
                .into());
            }
        }

        let (default, fixed) = (model.default.as_ref(), model.fixed.as_ref());
        match element.datatype.clone() {
            Some(datatype) => {
                element.value_constraint =
                    self.value_constraint(&model.name, default, fixed, &datatype)?;
            }
            None if default.is_some() || fixed.is_some() => {
                return Err(ParseError::new(format!(
                    "element '{}' has a default or fixed value but no simple content",
                    model.name
                ))
                .into());
            }
            None => {}
        }

        for (name, attribute) in &model.attributes {
            let qname = self.namespaces.resolve_attribute(name)?;
            let datatype = self.resolve_type(attribute.type_name())?;
            let (default, fixed) = attribute.values();
            if let Some(constraint) = self.value_constraint(name, default, fixed, &datatype)? {
                element = element.with_attribute_value(qname.clone(), constraint);
            }
            element = element.with_attribute(qname, datatype);
        }

        for child in &model.children {
            let child = self.element(child, false)?;
            if element.child(&child.name).is_some() {
                return Err(ParseError::new(format!(
                    "duplicate child element '{}' in '{}'",
                    child.name, model.name
                ))
                .into());
            }
            element = element.with_child(child);
        }

        for identity in &model.identities {
            let compiled = self.identity(identity)?;
            element = element.with_identity(compiled);
        }

        Ok(element)
    }

    fn value_constraint(
        &self,
        owner: &str,
        default: Option<&String>,
        fixed: Option<&String>,
        datatype: &Datatype,
    ) -> Result<Option<ValueConstraint>> {
        let (kind, lexical) = match (default, fixed) {
            (None, None) => return Ok(None),
            (Some(value), None) => (ValueConstraintKind::Default, value),
            (None, Some(value)) => (ValueConstraintKind::Fixed, value),
            (Some(_), Some(_)) => {
                return Err(ParseError::new(format!(
                    "'default' and 'fixed' are mutually exclusive on '{}'",
                    owner
                ))
                .into())
            }
        };
        ValueConstraint::new(kind, lexical, datatype, &self.namespaces).map(Some)
    }

    fn identity(&mut self, model: &IdentityModel) -> Result<CompiledIdentityConstraint> {
        validate_ncname(&model.name)?;
        let name = QName::new(self.target_namespace.clone(), model.name.as_str());
        if self.constraints.insert(name.clone(), model.kind).is_some() {
            return Err(ParseError::new(format!(
                "duplicate identity constraint '{}'",
                name
            ))
            .into());
        }

        let selector = XsdSelector {
            xpath: model.selector.clone(),
            xpath_default_namespace: model.xpath_default_namespace.clone(),
        };
        let mut identity = XsdIdentity::new(name.clone(), model.kind, selector).with_fields(
            model.fields.iter().map(|xpath| XsdField {
                xpath: xpath.clone(),
                xpath_default_namespace: model.xpath_default_namespace.clone(),
            }),
        );

        match (&model.refer, model.kind) {
            (Some(refer), IdentityConstraintKind::Keyref) => {
                let refer = if refer.contains(':') {
                    self.namespaces.resolve(refer)?
                } else {
                    QName::new(self.target_namespace.clone(), refer.as_str())
                };
                self.keyrefs.push((name, refer.clone()));
                identity.refer = Some(refer);
            }
            (Some(_), _) => {
                return Err(ParseError::new(format!(
                    "'refer' is only allowed on keyref, not on '{}'",
                    model.name
                ))
                .into())
            }
            (None, _) => {}
        }

        identity.compile(&self.namespaces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::datatypes::TypeCode;
    use crate::xpath::NameTest;

    const SHOP: &str = r#"{
        "targetNamespace": "urn:shop",
        "elementFormDefault": "qualified",
        "namespaces": { "s": "urn:shop" },
        "simpleTypes": [
            { "name": "sku", "restriction": "xs:token" },
            { "name": "skus", "list": "sku" },
            { "name": "ref", "union": ["xs:int", "sku"] }
        ],
        "elements": [
            {
                "name": "shop",
                "children": [
                    { "name": "item", "attributes": {
                        "sku": "sku",
                        "price": "xs:decimal",
                        "qty": { "type": "xs:int", "default": "1" }
                    } },
                    { "name": "order", "type": "skus", "nillable": true },
                    { "name": "note", "type": "xs:string", "fixed": "none" }
                ],
                "identities": [
                    { "kind": "key", "name": "itemKey", "selector": "s:item", "fields": ["@sku"] },
                    { "kind": "keyref", "name": "orderRef", "refer": "itemKey",
                      "selector": "s:order", "fields": ["."] }
                ]
            }
        ]
    }"#;

    #[test]
    fn test_from_json() {
        let schema = XsdSchema::from_json(SHOP).unwrap();
        assert_eq!(schema.target_namespace.as_deref(), Some("urn:shop"));
        assert_eq!(schema.element_count(), 1);

        let shop = schema
            .lookup_element(&QName::namespaced("urn:shop", "shop"))
            .unwrap();
        assert_eq!(shop.identities.len(), 2);
        assert_eq!(shop.identities[0].name, QName::namespaced("urn:shop", "itemKey"));
        assert_eq!(
            shop.identities[1].refer,
            Some(QName::namespaced("urn:shop", "itemKey"))
        );
        assert_eq!(
            shop.identities[0].selector.alternatives[0].steps,
            vec![NameTest::Name(QName::namespaced("urn:shop", "item"))]
        );

        let item = shop.child(&QName::namespaced("urn:shop", "item")).unwrap();
        let sku = item.attribute_type(&QName::local("sku")).unwrap();
        assert!(sku.is_derived_from(&Datatype::builtin(TypeCode::Token)));

        let qty = item.attribute_values.get(&QName::local("qty")).unwrap();
        assert_eq!(qty.kind, ValueConstraintKind::Default);
        assert!(item.attribute_type(&QName::local("qty")).is_some());
        assert!(item.attribute_values.get(&QName::local("sku")).is_none());

        let order = shop.child(&QName::namespaced("urn:shop", "order")).unwrap();
        assert!(order.nillable);
        assert!(order.datatype.as_ref().unwrap().is_list());

        let note = shop.child(&QName::namespaced("urn:shop", "note")).unwrap();
        assert!(note.value_constraint.as_ref().unwrap().is_fixed());
    }

    #[test]
    fn test_unqualified_locals() {
        let schema = XsdSchema::from_json(
            r#"{ "targetNamespace": "urn:a",
                 "elements": [ { "name": "root", "children": [ { "name": "leaf", "type": "xs:int" } ] } ] }"#,
        )
        .unwrap();
        let root = schema.lookup_element(&QName::namespaced("urn:a", "root")).unwrap();
        assert!(root.child(&QName::local("leaf")).is_some());
    }

    #[test]
    fn test_model_errors() {
        let cases = [
            r#"{ "elements": [ { "name": "a", "type": "xs:nothing" } ] }"#,
            r#"{ "elements": [ { "name": "a", "type": "undeclared" } ] }"#,
            r#"{ "elements": [ { "name": "1a" } ] }"#,
            r#"{ "elements": [ { "name": "a" }, { "name": "a" } ] }"#,
            r#"{ "simpleTypes": [ { "name": "t", "restriction": "xs:int", "list": "xs:int" } ], "elements": [] }"#,
            r#"{ "elements": [ { "name": "a", "identities": [
                { "kind": "keyref", "name": "r", "refer": "missing", "selector": "b", "fields": ["@c"] } ] } ] }"#,
            r#"{ "elements": [ { "name": "a", "identities": [
                { "kind": "key", "name": "k", "selector": "b", "fields": [] } ] } ] }"#,
            r#"{ "elements": [ { "name": "a", "identities": [
                { "kind": "key", "name": "k", "selector": "b", "fields": ["@c"] },
                { "kind": "unique", "name": "k", "selector": "b", "fields": ["@d"] } ] } ] }"#,
            r#"{ "elements": [ { "name": "a", "identities": [
                { "kind": "key", "name": "k", "selector": "@b", "fields": ["@c"] } ] } ] }"#,
            r#"{ "elements": [ { "name": "a", "unknown": true } ] }"#,
            r#"{ "elements": [ { "name": "a", "default": "x" } ] }"#,
            r#"{ "elements": [ { "name": "a", "type": "xs:int", "default": "x" } ] }"#,
            r#"{ "elements": [ { "name": "a", "type": "xs:int", "default": "1", "fixed": "1" } ] }"#,
            r#"{ "elements": [ { "name": "a", "attributes": { "b": { "type": "xs:int", "fixed": "z" } } } ] }"#,
            r#"{ "elements": [ { "name": "a", "attributes": { "b": { "type": "xs:int", "other": "1" } } } ] }"#,
        ];
        for case in cases {
            assert!(XsdSchema::from_json(case).is_err(), "accepted: {}", case);
        }
    }

    #[test]
    fn test_json_syntax_error() {
        assert!(matches!(
            XsdSchema::from_json("{ not json"),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, SHOP).unwrap();
        let schema = XsdSchema::from_file(&path).unwrap();
        assert_eq!(schema.elements().count(), 1);
    }
}
