//! Incremental path matching over a streaming traversal
//!
//! An [`ActiveAxis`] follows one compiled path through start/end element
//! events. The first element it sees is its context (depth 0); it stops
//! reacting once that context element has closed, until it is reset.

use std::sync::Arc;

use super::selectors::CompiledPath;
use crate::namespaces::QName;

/// A stateful matcher for one compiled selector or field path
///
/// Each open element keeps one bitmask per path alternative: bit `n` is
/// set when the first `n` steps of that alternative have matched on the
/// way down to the element.
#[derive(Debug, Clone)]
pub struct ActiveAxis {
    path: Arc<CompiledPath>,
    /// Per-level states, `alternatives.len()` entries per level
    states: Vec<u64>,
    /// Per-level element match flags
    matches: Vec<bool>,
    /// Number of open levels
    depth: usize,
    /// Set once the context element has closed
    closed: bool,
}

impl ActiveAxis {
    /// Create a fresh axis for a path
    pub fn new(path: Arc<CompiledPath>) -> Self {
        Self {
            path,
            states: Vec::new(),
            matches: Vec::new(),
            depth: 0,
            closed: false,
        }
    }

    /// The compiled path
    pub fn path(&self) -> &Arc<CompiledPath> {
        &self.path
    }

    /// Make the axis fresh again, keeping its buffers
    pub fn reset(&mut self) {
        self.depth = 0;
        self.closed = false;
    }

    /// Whether the axis still reacts to events
    pub fn is_active(&self) -> bool {
        !self.closed
    }

    /// Depth of the current element relative to the context element
    pub fn current_depth(&self) -> Option<usize> {
        self.depth.checked_sub(1)
    }

    /// Advance to a child element; returns whether it is selected
    pub fn move_to_start_element(&mut self, name: &QName) -> bool {
        if self.closed {
            return false;
        }

        let width = self.path.alternatives.len();
        let base = self.depth * width;
        if self.states.len() < base + width {
            self.states.resize(base + width, 0);
        }

        let mut matched = false;
        for (i, alt) in self.path.alternatives.iter().enumerate() {
            let state = if self.depth == 0 {
                1
            } else {
                let parent = self.states[base - width + i];
                let mut next = if alt.descendant { 1 } else { 0 };
                for (step, test) in alt.steps.iter().enumerate() {
                    if parent & (1u64 << step) != 0 && test.matches(name) {
                        next |= 1u64 << (step + 1);
                    }
                }
                next
            };
            self.states[base + i] = state;

            if alt.attribute.is_none() && state & (1u64 << alt.steps.len()) != 0 {
                matched = true;
            }
        }

        if self.matches.len() > self.depth {
            self.matches[self.depth] = matched;
        } else {
            self.matches.push(matched);
        }
        self.depth += 1;
        matched
    }

    /// Check an attribute of the current element
    pub fn move_to_attribute(&self, name: &QName) -> bool {
        if self.closed || self.depth == 0 {
            return false;
        }

        let width = self.path.alternatives.len();
        let base = (self.depth - 1) * width;
        self.path.alternatives.iter().enumerate().any(|(i, alt)| {
            alt.attribute.as_ref().is_some_and(|test| {
                self.states[base + i] & (1u64 << alt.steps.len()) != 0 && test.matches(name)
            })
        })
    }

    /// Leave the current element; returns whether it was selected
    pub fn end_element(&mut self) -> bool {
        if self.closed || self.depth == 0 {
            return false;
        }

        self.depth -= 1;
        if self.depth == 0 {
            self.closed = true;
        }
        self.matches[self.depth]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces::NamespaceContext;
    use crate::xpath::IdentityXPathParser;

    fn selector(expr: &str) -> ActiveAxis {
        let path = IdentityXPathParser::selector()
            .compile(expr, &NamespaceContext::new())
            .unwrap();
        ActiveAxis::new(Arc::new(path))
    }

    fn field(expr: &str) -> ActiveAxis {
        let path = IdentityXPathParser::field()
            .compile(expr, &NamespaceContext::new())
            .unwrap();
        ActiveAxis::new(Arc::new(path))
    }

    fn name(local: &str) -> QName {
        QName::local(local)
    }

    #[test]
    fn test_child_path() {
        let mut axis = selector("item");

        assert!(!axis.move_to_start_element(&name("root")));
        assert_eq!(axis.current_depth(), Some(0));
        assert!(axis.move_to_start_element(&name("item")));
        assert_eq!(axis.current_depth(), Some(1));
        assert!(!axis.move_to_start_element(&name("item")));
        assert!(!axis.end_element());
        assert!(axis.end_element());
        assert!(!axis.move_to_start_element(&name("other")));
        assert!(!axis.end_element());
        assert!(!axis.end_element());
        assert!(!axis.is_active());
    }

    #[test]
    fn test_descendant_path() {
        let mut axis = selector(".//item");

        assert!(!axis.move_to_start_element(&name("root")));
        assert!(!axis.move_to_start_element(&name("group")));
        assert!(axis.move_to_start_element(&name("item")));
        assert!(axis.move_to_start_element(&name("item")));
        assert!(axis.end_element());
        assert!(axis.end_element());
        assert!(!axis.end_element());
    }

    #[test]
    fn test_multi_step_and_wildcard() {
        let mut axis = selector("*/b");

        axis.move_to_start_element(&name("root"));
        assert!(!axis.move_to_start_element(&name("a")));
        assert!(axis.move_to_start_element(&name("b")));
        axis.end_element();
        assert!(!axis.move_to_start_element(&name("c")));
        assert!(!axis.move_to_start_element(&name("b")));
    }

    #[test]
    fn test_self_matches_context() {
        let mut axis = field(".");

        assert!(axis.move_to_start_element(&name("item")));
        assert!(!axis.move_to_start_element(&name("child")));
        assert!(!axis.end_element());
        assert!(axis.end_element());
    }

    #[test]
    fn test_attribute_field() {
        let mut axis = field("@id | sub/@code");

        axis.move_to_start_element(&name("item"));
        assert!(axis.move_to_attribute(&name("id")));
        assert!(!axis.move_to_attribute(&name("code")));

        assert!(!axis.move_to_start_element(&name("sub")));
        assert!(axis.move_to_attribute(&name("code")));
        assert!(!axis.move_to_attribute(&name("id")));
        axis.end_element();

        assert!(axis.move_to_attribute(&name("id")));
    }

    #[test]
    fn test_dormant_after_context_closes() {
        let mut axis = field("@id");

        axis.move_to_start_element(&name("item"));
        axis.end_element();
        assert!(!axis.is_active());
        assert!(!axis.move_to_start_element(&name("item")));
        assert!(!axis.move_to_attribute(&name("id")));
        assert_eq!(axis.current_depth(), None);

        axis.reset();
        assert!(axis.is_active());
        axis.move_to_start_element(&name("item"));
        assert!(axis.move_to_attribute(&name("id")));
    }
}
