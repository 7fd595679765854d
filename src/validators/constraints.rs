//! Runtime state of identity constraints
//!
//! One [`ConstraintStruct`] exists per constraint declaration per open
//! scope. It owns the selector matcher, the field matchers of every
//! in-flight selector match, and the tables of completed key sequences.

use std::sync::Arc;

use indexmap::IndexSet;

use super::identities::{CompiledIdentityConstraint, IdentityConstraintKind};
use super::key_sequence::KeySequence;
use crate::locations::SourcePosition;
use crate::namespaces::QName;
use crate::xpath::{ActiveAxis, CompiledPath};

/// Progress of a field matcher toward filling its slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldState {
    /// Nothing selected yet
    Unmatched,
    /// An element was selected; its value arrives at its end tag
    AwaitingValue,
    /// The slot was filled (or the selected element has closed)
    Filled,
}

/// A field matcher bound to one column of one selector slot
#[derive(Debug, Clone)]
pub struct LocatedActiveAxis {
    axis: ActiveAxis,
    slot: usize,
    column: usize,
    state: FieldState,
}

impl LocatedActiveAxis {
    /// Create a fresh field matcher
    pub fn new(path: Arc<CompiledPath>, slot: usize, column: usize) -> Self {
        Self {
            axis: ActiveAxis::new(path),
            slot,
            column,
            state: FieldState::Unmatched,
        }
    }

    /// Reuse this matcher for a new key sequence in the same slot
    pub fn reactivate(&mut self) {
        self.axis.reset();
        self.state = FieldState::Unmatched;
    }

    /// Selector slot holding the target key sequence
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Column of the key sequence this field fills
    pub fn column(&self) -> usize {
        self.column
    }

    /// Current state
    pub fn state(&self) -> FieldState {
        self.state
    }

    /// Whether the underlying matcher still follows the traversal
    pub fn is_active(&self) -> bool {
        self.axis.is_active()
    }

    /// Advance to an element; a selected element awaits its value
    pub fn move_to_start_element(&mut self, name: &QName) -> bool {
        let matched = self.axis.move_to_start_element(name);
        if matched {
            self.state = FieldState::AwaitingValue;
        }
        matched
    }

    /// Check an attribute; a selected attribute fills the slot at once
    pub fn move_to_attribute(&mut self, name: &QName) -> bool {
        let matched = self.axis.move_to_attribute(name);
        if matched {
            self.state = FieldState::Filled;
        }
        matched
    }

    /// Leave an element; returns whether its value is due for the slot
    pub fn end_element(&mut self) -> bool {
        let matched = self.axis.end_element();
        if matched && self.state == FieldState::AwaitingValue {
            self.state = FieldState::Filled;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone)]
struct KsSlot {
    ks: Option<KeySequence>,
    /// Depth of the selected element, relative to the scope element
    depth: usize,
}

/// The selector matcher with its stack of in-flight key sequences
///
/// Slot `s` owns the field matchers `fields[s * n .. (s + 1) * n]` of
/// the owning [`ConstraintStruct`], `n` being the field count. Slots
/// above the stack top are vacated and their field matchers dormant.
#[derive(Debug, Clone)]
pub struct SelectorActiveAxis {
    axis: ActiveAxis,
    slots: Vec<KsSlot>,
    top: usize,
}

impl SelectorActiveAxis {
    /// Create a fresh selector matcher
    pub fn new(path: Arc<CompiledPath>) -> Self {
        Self {
            axis: ActiveAxis::new(path),
            slots: Vec::new(),
            top: 0,
        }
    }

    /// Advance to an element; returns whether it is selected
    pub fn move_to_start_element(&mut self, name: &QName) -> bool {
        self.axis.move_to_start_element(name)
    }

    /// Open a key sequence for the element just selected
    ///
    /// A vacated slot is reused, reactivating its field matchers when
    /// `reuse` is set and replacing them with fresh ones otherwise.
    /// Returns the slot index.
    ///
    /// # Panics
    ///
    /// If the selector is not positioned on an element.
    pub fn push_ks(
        &mut self,
        fields: &mut Vec<LocatedActiveAxis>,
        field_paths: &[Arc<CompiledPath>],
        position: SourcePosition,
        reuse: bool,
    ) -> usize {
        let depth = self
            .axis
            .current_depth()
            .expect("push_ks called outside the selector scope");
        let field_count = field_paths.len();
        let ks = KeySequence::new(field_count, position);
        let slot = self.top;

        if slot < self.slots.len() {
            self.slots[slot] = KsSlot { ks: Some(ks), depth };
            let owned = &mut fields[slot * field_count..(slot + 1) * field_count];
            if reuse {
                owned.iter_mut().for_each(LocatedActiveAxis::reactivate);
            } else {
                for (column, field) in owned.iter_mut().enumerate() {
                    *field = LocatedActiveAxis::new(field_paths[column].clone(), slot, column);
                }
            }
        } else {
            self.slots.push(KsSlot { ks: Some(ks), depth });
            fields.extend(
                field_paths
                    .iter()
                    .enumerate()
                    .map(|(column, path)| LocatedActiveAxis::new(path.clone(), slot, column)),
            );
        }

        self.top += 1;
        slot
    }

    /// Leave an element; returns whether the top key sequence's scope closes
    pub fn end_element(&mut self) -> bool {
        let closing = self.top > 0 && self.axis.current_depth() == Some(self.slots[self.top - 1].depth);
        self.axis.end_element();
        closing
    }

    /// Take the top key sequence off the stack
    ///
    /// # Panics
    ///
    /// If no key sequence is in flight.
    pub fn pop_ks(&mut self) -> KeySequence {
        assert!(self.top > 0, "pop_ks called on an empty selector stack");
        self.top -= 1;
        self.slots[self.top]
            .ks
            .take()
            .expect("in-flight selector slot without a key sequence")
    }

    /// The key sequence of an in-flight slot
    pub fn key_sequence_mut(&mut self, slot: usize) -> &mut KeySequence {
        self.slots[slot]
            .ks
            .as_mut()
            .expect("field bound to a vacated selector slot")
    }

    /// Number of in-flight key sequences
    pub fn in_flight(&self) -> usize {
        self.top
    }

    /// Number of slots ever allocated
    pub fn allocated_slots(&self) -> usize {
        self.slots.len()
    }
}

/// Pending keyref values, kept by the key or unique they refer to
#[derive(Debug, Clone)]
pub struct KeyrefTable {
    /// Name of the keyref constraint
    pub keyref: QName,
    /// Distinct qualified keyref values, in first-seen order
    pub entries: IndexSet<KeySequence>,
}

/// Address of a keyref table inside the validation stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyrefHandle {
    /// Frame index of the referenced constraint
    pub frame: usize,
    /// Index of the referenced constraint in the frame
    pub constraint: usize,
    /// Index of the table in the referenced constraint
    pub table: usize,
}

/// Where a constraint's completed key sequences go when it is a keyref
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyrefTarget {
    /// Key or unique constraint
    NotKeyref,
    /// Keyref bound to a table of the referenced constraint
    Bound(KeyrefHandle),
    /// Keyref whose referenced constraint is not in scope
    Unresolved,
}

/// Runtime record of one constraint in one scope
#[derive(Debug, Clone)]
pub struct ConstraintStruct {
    /// The compiled declaration
    pub constraint: Arc<CompiledIdentityConstraint>,
    /// Selector matcher and in-flight key sequences
    pub selector: SelectorActiveAxis,
    /// Field matchers of all slots, slot-major
    pub fields: Vec<LocatedActiveAxis>,
    /// Completed qualified key sequences (key/unique)
    pub qualified: IndexSet<KeySequence>,
    /// Keyref tables bound to this key/unique
    pub keyref_tables: Vec<KeyrefTable>,
    /// Keyref binding
    pub target: KeyrefTarget,
}

impl ConstraintStruct {
    /// Instantiate a constraint for a newly opened scope
    pub fn new(constraint: Arc<CompiledIdentityConstraint>) -> Self {
        let selector = SelectorActiveAxis::new(constraint.selector.clone());
        Self {
            constraint,
            selector,
            fields: Vec::new(),
            qualified: IndexSet::new(),
            keyref_tables: Vec::new(),
            target: KeyrefTarget::NotKeyref,
        }
    }

    /// Constraint name
    pub fn name(&self) -> &QName {
        &self.constraint.name
    }

    /// Constraint kind
    pub fn kind(&self) -> IdentityConstraintKind {
        self.constraint.kind
    }

    /// Whether keyrefs may bind to this constraint
    pub fn is_referenceable(&self) -> bool {
        self.kind() != IdentityConstraintKind::Keyref
    }

    /// Index of the table for a keyref name, creating it if needed
    pub fn keyref_table_index(&mut self, keyref: &QName) -> usize {
        if let Some(index) = self.keyref_tables.iter().position(|t| &t.keyref == keyref) {
            return index;
        }
        self.keyref_tables.push(KeyrefTable {
            keyref: keyref.clone(),
            entries: IndexSet::new(),
        });
        self.keyref_tables.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces::NamespaceContext;
    use crate::validators::identities::IdentityBuilder;

    fn constraint(selector: &str, fields: &[&str]) -> Arc<CompiledIdentityConstraint> {
        let mut builder = IdentityBuilder::key()
            .name(QName::local("k"))
            .selector(selector);
        for field in fields {
            builder = builder.field(*field);
        }
        Arc::new(builder.build().unwrap().compile(&NamespaceContext::new()).unwrap())
    }

    fn name(local: &str) -> QName {
        QName::local(local)
    }

    #[test]
    fn test_field_state_transitions() {
        let c = constraint("item", &["code"]);
        let mut field = LocatedActiveAxis::new(c.fields[0].clone(), 0, 0);
        assert_eq!(field.state(), FieldState::Unmatched);

        field.move_to_start_element(&name("item"));
        assert_eq!(field.state(), FieldState::Unmatched);
        assert!(field.move_to_start_element(&name("code")));
        assert_eq!(field.state(), FieldState::AwaitingValue);
        assert!(field.end_element());
        assert_eq!(field.state(), FieldState::Filled);
        assert!(!field.end_element());
        assert!(!field.is_active());

        field.reactivate();
        assert_eq!(field.state(), FieldState::Unmatched);
        assert!(field.is_active());
    }

    #[test]
    fn test_selector_push_pop_reuses_slots() {
        let c = constraint("item", &["@a", "@b"]);
        let mut cs = ConstraintStruct::new(c.clone());

        cs.selector.move_to_start_element(&name("root"));
        for round in 0..3 {
            assert!(cs.selector.move_to_start_element(&name("item")));
            let slot = cs.selector.push_ks(
                &mut cs.fields,
                &c.fields,
                SourcePosition::new(round + 1, 1),
                true,
            );
            assert_eq!(slot, 0);
            assert_eq!(cs.selector.in_flight(), 1);
            assert!(cs.selector.end_element());
            let ks = cs.selector.pop_ks();
            assert_eq!(ks.position().line, round + 1);
            assert_eq!(ks.len(), 2);
        }

        assert_eq!(cs.selector.allocated_slots(), 1);
        assert_eq!(cs.fields.len(), 2);
        assert_eq!(cs.fields[1].column(), 1);
    }

    #[test]
    fn test_nested_matches_use_stacked_slots() {
        let c = constraint(".//item", &["@id"]);
        let mut cs = ConstraintStruct::new(c.clone());

        cs.selector.move_to_start_element(&name("root"));
        assert!(cs.selector.move_to_start_element(&name("item")));
        cs.selector.push_ks(&mut cs.fields, &c.fields, SourcePosition::new(2, 1), true);
        assert!(cs.selector.move_to_start_element(&name("item")));
        let inner = cs.selector.push_ks(&mut cs.fields, &c.fields, SourcePosition::new(3, 1), true);
        assert_eq!(inner, 1);
        assert_eq!(cs.fields.len(), 2);

        assert!(cs.selector.end_element());
        assert_eq!(cs.selector.pop_ks().position().line, 3);
        assert!(cs.selector.end_element());
        assert_eq!(cs.selector.pop_ks().position().line, 2);
        assert!(!cs.selector.end_element());
    }

    #[test]
    fn test_push_without_reuse_replaces_fields() {
        let c = constraint("item", &["@id"]);
        let mut cs = ConstraintStruct::new(c.clone());

        cs.selector.move_to_start_element(&name("root"));
        cs.selector.move_to_start_element(&name("item"));
        cs.selector.push_ks(&mut cs.fields, &c.fields, SourcePosition::default(), false);
        cs.fields[0].move_to_start_element(&name("item"));
        cs.fields[0].end_element();
        cs.selector.end_element();
        cs.selector.pop_ks();
        assert!(!cs.fields[0].is_active());

        cs.selector.move_to_start_element(&name("item"));
        cs.selector.push_ks(&mut cs.fields, &c.fields, SourcePosition::default(), false);
        assert!(cs.fields[0].is_active());
        assert_eq!(cs.fields.len(), 1);
    }

    #[test]
    #[should_panic(expected = "empty selector stack")]
    fn test_pop_empty_stack_panics() {
        let c = constraint("item", &["@id"]);
        let mut cs = ConstraintStruct::new(c);
        cs.selector.pop_ks();
    }

    #[test]
    fn test_keyref_table_index() {
        let mut cs = ConstraintStruct::new(constraint("item", &["@id"]));
        assert_eq!(cs.keyref_table_index(&name("r1")), 0);
        assert_eq!(cs.keyref_table_index(&name("r2")), 1);
        assert_eq!(cs.keyref_table_index(&name("r1")), 0);
        assert!(cs.is_referenceable());
    }
}
