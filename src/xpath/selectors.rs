//! Compiled selector and field paths
//!
//! The restricted XPath subset allowed in `xs:selector` and `xs:field`
//! compiles to a set of alternatives, each a chain of child name tests,
//! optionally anchored anywhere below the context (`.//`) and optionally
//! ending with an attribute test.

use std::fmt;

use crate::namespaces::QName;

/// Maximum number of element steps in one path alternative
pub const MAX_PATH_STEPS: usize = 63;

/// A name test in a path step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameTest {
    /// An expanded name
    Name(QName),
    /// `*`
    Any,
    /// `prefix:*`, holding the resolved namespace URI
    Namespace(String),
}

impl NameTest {
    /// Check whether a node name passes this test
    pub fn matches(&self, name: &QName) -> bool {
        match self {
            NameTest::Name(qname) => qname == name,
            NameTest::Any => true,
            NameTest::Namespace(uri) => name.namespace.as_deref() == Some(uri.as_str()),
        }
    }
}

impl fmt::Display for NameTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameTest::Name(qname) => write!(f, "{}", qname),
            NameTest::Any => write!(f, "*"),
            NameTest::Namespace(uri) => write!(f, "{{{}}}*", uri),
        }
    }
}

/// One `|`-separated branch of a compiled path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathAlternative {
    /// Whether the path starts with `.//`
    pub descendant: bool,
    /// Child steps, self steps (`.`) removed
    pub steps: Vec<NameTest>,
    /// Trailing attribute test (fields only)
    pub attribute: Option<NameTest>,
}

impl PathAlternative {
    /// Whether this branch selects attributes rather than elements
    pub fn selects_attribute(&self) -> bool {
        self.attribute.is_some()
    }
}

/// A compiled selector or field expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPath {
    /// The source expression
    pub expression: String,
    /// The union branches
    pub alternatives: Vec<PathAlternative>,
}

impl CompiledPath {
    /// Get the source expression
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Whether any branch ends with an attribute test
    pub fn has_attribute_step(&self) -> bool {
        self.alternatives.iter().any(PathAlternative::selects_attribute)
    }

    /// Whether any branch starts with `.//`
    pub fn is_descendant(&self) -> bool {
        self.alternatives.iter().any(|alt| alt.descendant)
    }
}

impl fmt::Display for CompiledPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expression)
    }
}
