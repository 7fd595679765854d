//! Document Validation
//!
//! Streams an XML document with `quick-xml` and drives an
//! [`IdentityValidator`] with it. Element declarations are resolved
//! against the schema (local child declarations first, then global
//! ones), attribute values and simple element content are parsed with
//! their declared datatypes, and every start tag gets a line/column
//! position for the events it causes. Absent attributes and empty
//! elements take their declared default or fixed value.

use std::sync::Arc;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::locations::{LineIndex, SourcePosition};
use crate::namespaces::{NamespaceContext, QName};
use crate::XSI_NAMESPACE;

use super::datatypes::{Datatype, XsdValue};
use super::elements::XsdElement;
use super::exceptions::{IdentityErrorKind, ValidationEvent, ValidationEventSink};
use super::schemas::XsdSchema;
use super::validation::{ElementStart, IdentityValidator, SimpleContent, ValidationSettings};

/// Check the identity constraints of a document, collecting the events
pub fn validate_identities(
    schema: &XsdSchema,
    xml: &str,
    settings: &ValidationSettings,
) -> Result<Vec<ValidationEvent>> {
    validate_identities_with_sink(schema, xml, settings, Vec::new())
}

/// Check the identity constraints of a document, reporting to `sink`
///
/// Returns the sink. Malformed XML and exceeded limits abort the run
/// with an error; constraint violations never do.
pub fn validate_identities_with_sink<S: ValidationEventSink>(
    schema: &XsdSchema,
    xml: &str,
    settings: &ValidationSettings,
    sink: S,
) -> Result<S> {
    settings.limits.check_xml_size(xml.len())?;

    let mut driver = DocumentDriver {
        schema,
        limits: settings.limits.clone(),
        validator: IdentityValidator::new(settings.clone(), sink),
        lines: LineIndex::new(xml),
        scopes: vec![NamespaceContext::new()],
        open: Vec::new(),
        seen_root: false,
        skip: false,
    };

    let mut reader = Reader::from_str(xml);
    reader.expand_empty_elements(true);

    loop {
        let offset = reader.buffer_position();
        match reader.read_event()? {
            Event::Start(start) => driver.start(&reader, &start, offset)?,
            Event::End(_) => driver.end()?,
            Event::Text(text) => driver.text(&text.unescape()?),
            Event::CData(cdata) => {
                let bytes = cdata.into_inner();
                driver.text(&reader.decoder().decode(&bytes)?);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !driver.open.is_empty() {
        return Err(Error::Xml("unexpected end of document".to_string()));
    }
    if !driver.seen_root {
        return Err(Error::Xml("document has no root element".to_string()));
    }
    Ok(driver.validator.into_sink())
}

/// An open element
struct OpenElement {
    name: QName,
    decl: Option<Arc<XsdElement>>,
    nil: bool,
    text: String,
    position: SourcePosition,
    pushed_scope: bool,
}

struct DocumentDriver<'a, S: ValidationEventSink> {
    schema: &'a XsdSchema,
    limits: Limits,
    validator: IdentityValidator<S>,
    lines: LineIndex,
    /// Namespace scopes; a new one is pushed by elements declaring prefixes
    scopes: Vec<NamespaceContext>,
    open: Vec<OpenElement>,
    seen_root: bool,
    /// Set when the root element is undeclared
    skip: bool,
}

impl<'a, S: ValidationEventSink> DocumentDriver<'a, S> {
    fn namespaces(&self) -> &NamespaceContext {
        // The root scope is never popped
        &self.scopes[self.scopes.len() - 1]
    }

    fn start(&mut self, reader: &Reader<&[u8]>, start: &BytesStart<'_>, offset: usize) -> Result<()> {
        if self.open.is_empty() && self.seen_root {
            return Err(Error::Xml("more than one root element".to_string()));
        }
        self.seen_root = true;
        self.limits.check_xml_depth(self.open.len() + 1)?;
        let position = self.lines.position(offset);

        let decoder = reader.decoder();
        let raw_name = decoder.decode(start.name().as_ref())?.into_owned();
        let mut attributes = Vec::new();
        let mut declarations = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(quick_xml::Error::from)?;
            let key = decoder.decode(attribute.key.as_ref())?.into_owned();
            let value = attribute.unescape_value()?.into_owned();
            if key == "xmlns" || key.starts_with("xmlns:") {
                declarations.push((key, value));
            } else {
                attributes.push((key, value));
            }
        }
        self.limits.check_attributes(attributes.len())?;
        self.limits.check_namespaces(declarations.len())?;

        let pushed_scope = !declarations.is_empty();
        if pushed_scope {
            let mut scope = self.namespaces().clone();
            for (key, uri) in declarations {
                match key.strip_prefix("xmlns:") {
                    Some(prefix) => scope.add_prefix(prefix, uri),
                    None => scope.set_default_namespace(uri),
                }
            }
            self.scopes.push(scope);
        }

        let name = self.namespaces().resolve(&raw_name)?;
        let mut resolved = Vec::with_capacity(attributes.len());
        for (key, value) in attributes {
            resolved.push((self.namespaces().resolve_attribute(&key)?, value));
        }

        let decl = self.lookup_declaration(&name, position);
        let nil = resolved.iter().any(|(key, value)| {
            key.matches("nil", Some(XSI_NAMESPACE)) && matches!(value.trim(), "true" | "1")
        });

        if !self.skip {
            let (nillable, identities) = match &decl {
                Some(decl) => (decl.nillable, decl.identities.as_slice()),
                None => (false, &[][..]),
            };
            self.validator.start_element(ElementStart {
                name: &name,
                nillable,
                nil,
                identities,
                position,
            });

            if let Some(decl) = &decl {
                for (key, value) in &resolved {
                    if key.namespace.as_deref() == Some(XSI_NAMESPACE) {
                        continue;
                    }
                    let Some(datatype) = decl.attribute_type(key) else {
                        continue;
                    };
                    let lexical = datatype.white_space.normalize(value);
                    if let Some(parsed) = self.parse(datatype, &lexical, "attribute", key, position) {
                        self.validator.attribute(key, &parsed, &lexical, datatype);
                    }
                }

                let present: Vec<QName> = resolved.iter().map(|(key, _)| key.clone()).collect();
                for (key, datatype, default) in decl.defaulted_attributes(&present) {
                    self.validator
                        .attribute(key, &default.value, &default.lexical, datatype);
                }
            }
        }

        self.open.push(OpenElement {
            name,
            nil: nil && decl.as_ref().is_some_and(|d| d.nillable),
            decl,
            text: String::new(),
            position,
            pushed_scope,
        });
        Ok(())
    }

    fn lookup_declaration(&mut self, name: &QName, position: SourcePosition) -> Option<Arc<XsdElement>> {
        match self.open.last() {
            None => {
                let decl = self.schema.lookup_element(name).cloned();
                if decl.is_none() {
                    self.skip = true;
                    self.validator.report(
                        ValidationEvent::warning(
                            IdentityErrorKind::UndeclaredElement,
                            format!("no global declaration for root element '{}'", name),
                        )
                        .with_position(position),
                    );
                }
                decl
            }
            Some(parent) => parent
                .decl
                .as_ref()
                .and_then(|decl| decl.child(name))
                .or_else(|| self.schema.lookup_element(name))
                .cloned(),
        }
    }

    fn parse(
        &mut self,
        datatype: &Arc<Datatype>,
        lexical: &str,
        what: &str,
        name: &QName,
        position: SourcePosition,
    ) -> Option<XsdValue> {
        match datatype.parse_value(lexical, &self.scopes[self.scopes.len() - 1]) {
            Ok(value) => Some(value),
            Err(err) => {
                self.validator.report(
                    ValidationEvent::error(
                        IdentityErrorKind::InvalidValue,
                        format!(
                            "invalid value '{}' of {} '{}' for type {}: {}",
                            lexical, what, name, datatype, err
                        ),
                    )
                    .with_position(position),
                );
                None
            }
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(element) = self.open.last_mut() {
            element.text.push_str(text);
        }
    }

    fn end(&mut self) -> Result<()> {
        let element = self
            .open
            .pop()
            .ok_or_else(|| Error::Xml("unexpected end tag".to_string()))?;

        if !self.skip {
            let decl = element.decl.as_deref();
            match decl.and_then(|decl| decl.datatype.as_ref()) {
                Some(datatype) => {
                    let default = decl
                        .and_then(|decl| decl.value_constraint.as_ref())
                        .filter(|_| !element.nil && element.text.is_empty());
                    let (lexical, value) = match default {
                        Some(default) => (default.lexical.clone(), Some(default.value.clone())),
                        None => {
                            let lexical = datatype.white_space.normalize(&element.text);
                            let value = if element.nil || lexical.is_empty() {
                                None
                            } else {
                                self.parse(
                                    datatype,
                                    &lexical,
                                    "element",
                                    &element.name,
                                    element.position,
                                )
                            };
                            (lexical, value)
                        }
                    };
                    self.validator.end_element(Some(SimpleContent {
                        datatype,
                        value: value.as_ref(),
                        lexical: &lexical,
                    }));
                }
                None => self.validator.end_element(None),
            }
        }

        if element.pushed_scope {
            self.scopes.pop();
        }
        Ok(())
    }
}
