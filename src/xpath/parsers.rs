//! XPath parser for identity constraints
//!
//! Identity constraints use a restricted subset of XPath (XSD 1.0
//! §3.11.6):
//!
//! ```text
//! Selector  ::= Path ( '|' Path )*
//! Path      ::= ('.//')? Step ( '/' Step )*
//! Field     ::= FieldPath ( '|' FieldPath )*
//! FieldPath ::= ('.//')? ( Step '/' )* ( Step | '@' NameTest )
//! Step      ::= '.' | NameTest
//! NameTest  ::= QName | '*' | NCName ':' '*'
//! ```
//!
//! `child::` and `attribute::` are accepted as long forms of the
//! abbreviated axes.

use std::fmt;

use super::selectors::{CompiledPath, NameTest, PathAlternative, MAX_PATH_STEPS};
use crate::names::is_valid_ncname;
use crate::namespaces::{NamespaceContext, QName};

/// XPath parse error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XPathParseError {
    /// Unknown or disallowed axis name
    UnknownAxis(String),
    /// Invalid syntax
    InvalidSyntax(String),
    /// Unexpected end of expression
    UnexpectedEnd,
    /// Prefix not bound in the namespace context
    UnknownPrefix(String),
}

impl fmt::Display for XPathParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownAxis(axis) => write!(f, "Unknown XPath axis: {}", axis),
            Self::InvalidSyntax(msg) => write!(f, "Invalid XPath syntax: {}", msg),
            Self::UnexpectedEnd => write!(f, "Unexpected end of XPath expression"),
            Self::UnknownPrefix(prefix) => write!(f, "Unknown namespace prefix: {}", prefix),
        }
    }
}

impl std::error::Error for XPathParseError {}

/// Parser for identity constraint XPath (xs:selector, xs:field)
#[derive(Debug, Clone)]
pub struct IdentityXPathParser {
    /// Whether to allow a trailing attribute step
    allow_attributes: bool,
    /// Namespace of unprefixed element names (xpathDefaultNamespace)
    default_namespace: Option<String>,
}

impl Default for IdentityXPathParser {
    fn default() -> Self {
        Self::selector()
    }
}

impl IdentityXPathParser {
    /// Create a parser for selector expressions
    pub fn selector() -> Self {
        Self {
            allow_attributes: false,
            default_namespace: None,
        }
    }

    /// Create a parser for field expressions (allows attributes)
    pub fn field() -> Self {
        Self {
            allow_attributes: true,
            default_namespace: None,
        }
    }

    /// Set the namespace applied to unprefixed element name tests
    pub fn with_default_namespace(mut self, namespace: Option<impl Into<String>>) -> Self {
        self.default_namespace = namespace.map(Into::into).filter(|ns: &String| !ns.is_empty());
        self
    }

    /// Compile an expression, resolving prefixes against `namespaces`
    pub fn compile(
        &self,
        xpath: &str,
        namespaces: &NamespaceContext,
    ) -> Result<CompiledPath, XPathParseError> {
        if xpath.trim().is_empty() {
            return Err(XPathParseError::InvalidSyntax("empty expression".to_string()));
        }

        let alternatives = xpath
            .split('|')
            .map(|branch| self.compile_branch(branch.trim(), namespaces))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CompiledPath {
            expression: xpath.trim().to_string(),
            alternatives,
        })
    }

    fn compile_branch(
        &self,
        branch: &str,
        namespaces: &NamespaceContext,
    ) -> Result<PathAlternative, XPathParseError> {
        if branch.is_empty() {
            return Err(XPathParseError::UnexpectedEnd);
        }

        let tokens: Vec<&str> = branch.split('/').map(str::trim).collect();
        if tokens[0].is_empty() {
            return Err(XPathParseError::InvalidSyntax(format!(
                "absolute path not allowed: '{}'",
                branch
            )));
        }

        let mut rest = &tokens[..];
        let descendant = tokens.len() >= 3 && tokens[0] == "." && tokens[1].is_empty();
        if descendant {
            rest = &tokens[2..];
        }

        let mut steps = Vec::new();
        let mut attribute = None;
        for (i, token) in rest.iter().enumerate() {
            let last = i + 1 == rest.len();
            if token.is_empty() {
                return Err(if last {
                    XPathParseError::UnexpectedEnd
                } else {
                    XPathParseError::InvalidSyntax(format!(
                        "'//' is only allowed at the start of '{}'",
                        branch
                    ))
                });
            }
            if attribute.is_some() {
                return Err(XPathParseError::InvalidSyntax(format!(
                    "attribute step must be the last step of '{}'",
                    branch
                )));
            }

            match parse_axis(token)? {
                (StepAxis::SelfNode, _) => {}
                (StepAxis::Child, name) => steps.push(self.name_test(name, namespaces, false)?),
                (StepAxis::Attribute, name) => {
                    if !self.allow_attributes {
                        return Err(XPathParseError::InvalidSyntax(format!(
                            "attribute step not allowed in selector '{}'",
                            branch
                        )));
                    }
                    attribute = Some(self.name_test(name, namespaces, true)?);
                }
            }
        }

        if steps.len() > MAX_PATH_STEPS {
            return Err(XPathParseError::InvalidSyntax(format!(
                "path '{}' has more than {} steps",
                branch, MAX_PATH_STEPS
            )));
        }

        Ok(PathAlternative {
            descendant,
            steps,
            attribute,
        })
    }

    fn name_test(
        &self,
        name: &str,
        namespaces: &NamespaceContext,
        is_attribute: bool,
    ) -> Result<NameTest, XPathParseError> {
        if name == "*" {
            return Ok(NameTest::Any);
        }

        match name.split_once(':') {
            Some((prefix, local)) => {
                if !is_valid_ncname(prefix) {
                    return Err(XPathParseError::InvalidSyntax(format!(
                        "Invalid NCName: {}",
                        prefix
                    )));
                }
                let uri = namespaces
                    .get_namespace(prefix)
                    .ok_or_else(|| XPathParseError::UnknownPrefix(prefix.to_string()))?;
                if local == "*" {
                    Ok(NameTest::Namespace(uri.to_string()))
                } else if is_valid_ncname(local) {
                    Ok(NameTest::Name(QName::namespaced(uri, local)))
                } else {
                    Err(XPathParseError::InvalidSyntax(format!("Invalid NCName: {}", local)))
                }
            }
            None if is_valid_ncname(name) => {
                let namespace = if is_attribute {
                    None
                } else {
                    self.default_namespace.clone()
                };
                Ok(NameTest::Name(QName::new(namespace, name)))
            }
            None => Err(XPathParseError::InvalidSyntax(format!("Invalid NCName: {}", name))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepAxis {
    SelfNode,
    Child,
    Attribute,
}

fn parse_axis(token: &str) -> Result<(StepAxis, &str), XPathParseError> {
    if token == "." || token == "self::node()" {
        return Ok((StepAxis::SelfNode, token));
    }
    if let Some(name) = token.strip_prefix('@') {
        return Ok((StepAxis::Attribute, name.trim()));
    }
    match token.split_once("::") {
        Some((axis, name)) => match axis.trim() {
            "child" => Ok((StepAxis::Child, name.trim())),
            "attribute" => Ok((StepAxis::Attribute, name.trim())),
            other => Err(XPathParseError::UnknownAxis(other.to_string())),
        },
        None => Ok((StepAxis::Child, token)),
    }
}
