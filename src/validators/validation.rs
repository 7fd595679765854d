//! Identity-constraint validation
//!
//! [`IdentityValidator`] is driven one node at a time by a document
//! traversal: `start_element`, then `attribute` for each attribute of
//! that element, then (after its content) `end_element`. It keeps one
//! frame per open element; frames of elements that declare identity
//! constraints hold a [`ConstraintStruct`] per declaration.
//!
//! Violations are reported to a [`ValidationEventSink`] and never stop
//! the traversal.

use std::sync::Arc;

use super::constraints::{ConstraintStruct, KeyrefHandle, KeyrefTarget};
use super::datatypes::{Datatype, XsdValue};
use super::exceptions::{IdentityErrorKind, ValidationEvent, ValidationEventSink};
use super::identities::{CompiledIdentityConstraint, IdentityConstraintKind};
use super::key_sequence::KeySequence;
use super::typed_value::TypedValue;
use crate::limits::Limits;
use crate::locations::SourcePosition;
use crate::namespaces::QName;

/// Validation settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationSettings {
    /// Whether to check identity constraints
    pub check_identities: bool,
    /// Whether vacated selector slots reuse their field matchers
    pub reuse_axes: bool,
    /// Resource limits applied by the document driver
    pub limits: Limits,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            check_identities: true,
            reuse_axes: true,
            limits: Limits::default(),
        }
    }
}

impl ValidationSettings {
    /// Create settings with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable identity constraint checking
    pub fn with_identity_check(mut self, enabled: bool) -> Self {
        self.check_identities = enabled;
        self
    }

    /// Enable or disable field matcher reuse
    pub fn with_axis_reuse(mut self, enabled: bool) -> Self {
        self.reuse_axes = enabled;
        self
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}

/// An element start as seen by the validator
#[derive(Debug, Clone, Copy)]
pub struct ElementStart<'a> {
    /// Expanded element name
    pub name: &'a QName,
    /// Whether the declaration is nillable
    pub nillable: bool,
    /// Whether the instance carries `xsi:nil="true"`
    pub nil: bool,
    /// Identity constraints declared on the element
    pub identities: &'a [Arc<CompiledIdentityConstraint>],
    /// Position of the start tag
    pub position: SourcePosition,
}

/// Committed simple content of a closing element
#[derive(Debug, Clone, Copy)]
pub struct SimpleContent<'a> {
    /// The element's simple type
    pub datatype: &'a Arc<Datatype>,
    /// Parsed value; `None` when the content was not valid
    pub value: Option<&'a XsdValue>,
    /// Normalized lexical content
    pub lexical: &'a str,
}

/// One open element
#[derive(Debug)]
struct ValidationState {
    name: QName,
    nillable: bool,
    nil: bool,
    position: SourcePosition,
    constraints: Vec<ConstraintStruct>,
}

/// Streaming identity-constraint validator
#[derive(Debug)]
pub struct IdentityValidator<S: ValidationEventSink> {
    settings: ValidationSettings,
    frames: Vec<ValidationState>,
    /// Lowest frame holding constraints
    start_id_constraint: Option<usize>,
    sink: S,
}

impl<S: ValidationEventSink> IdentityValidator<S> {
    /// Create a validator reporting to `sink`
    pub fn new(settings: ValidationSettings, sink: S) -> Self {
        Self {
            settings,
            frames: Vec::new(),
            start_id_constraint: None,
            sink,
        }
    }

    /// Number of open elements
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Whether any open element declares constraints
    pub fn has_active_constraints(&self) -> bool {
        self.start_id_constraint.is_some()
    }

    /// The event sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the validator, returning its sink
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Report an event found outside the identity engine
    pub fn report(&mut self, event: ValidationEvent) {
        emit(&mut self.sink, event);
    }

    /// Process an element start
    pub fn start_element(&mut self, start: ElementStart<'_>) {
        self.frames.push(ValidationState {
            name: start.name.clone(),
            nillable: start.nillable,
            nil: start.nillable && start.nil,
            position: start.position,
            constraints: Vec::new(),
        });

        if !self.settings.check_identities {
            return;
        }
        if !start.identities.is_empty() {
            self.add_identity_constraints(start.identities);
        }
        if self.start_id_constraint.is_some() {
            self.element_identity_constraints(start.name, start.position);
        }
    }

    fn add_identity_constraints(&mut self, identities: &[Arc<CompiledIdentityConstraint>]) {
        let frame = self.frames.len() - 1;
        self.frames[frame].constraints = identities
            .iter()
            .cloned()
            .map(ConstraintStruct::new)
            .collect();

        for (index, constraint) in identities.iter().enumerate() {
            if constraint.kind != IdentityConstraintKind::Keyref {
                continue;
            }
            let target = self.resolve_keyref(constraint);
            self.frames[frame].constraints[index].target = target;
        }

        if self.start_id_constraint.is_none() {
            self.start_id_constraint = Some(frame);
        }
        log::trace!(
            "{} identity constraint(s) opened on '{}'",
            identities.len(),
            self.frames[frame].name
        );
    }

    /// Bind a keyref to the innermost open key/unique with the referenced name
    fn resolve_keyref(&mut self, keyref: &CompiledIdentityConstraint) -> KeyrefTarget {
        if let Some(refer) = &keyref.refer {
            for frame in (0..self.frames.len()).rev() {
                let found = self.frames[frame]
                    .constraints
                    .iter()
                    .position(|cs| cs.is_referenceable() && cs.name() == refer);
                if let Some(constraint) = found {
                    let table = self.frames[frame].constraints[constraint]
                        .keyref_table_index(&keyref.name);
                    log::trace!(
                        "keyref '{}' bound to '{}' in frame {}",
                        keyref.name,
                        refer,
                        frame
                    );
                    return KeyrefTarget::Bound(KeyrefHandle {
                        frame,
                        constraint,
                        table,
                    });
                }
            }
        }

        let position = self.current_position();
        let refer = keyref
            .refer
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        emit(
            &mut self.sink,
            ValidationEvent::error(
                IdentityErrorKind::RefNotInScope,
                format!(
                    "keyref '{}' cannot find the referenced key or unique '{}' in scope",
                    keyref.name, refer
                ),
            )
            .with_constraint(keyref.name.to_string())
            .with_position(position),
        );
        KeyrefTarget::Unresolved
    }

    fn element_identity_constraints(&mut self, name: &QName, position: SourcePosition) {
        let Some(start) = self.start_id_constraint else {
            return;
        };
        let reuse = self.settings.reuse_axes;

        for frame in &mut self.frames[start..] {
            for cs in &mut frame.constraints {
                let ConstraintStruct {
                    constraint,
                    selector,
                    fields,
                    ..
                } = cs;

                if selector.move_to_start_element(name) {
                    let slot = selector.push_ks(fields, &constraint.fields, position, reuse);
                    log::trace!(
                        "selector of '{}' matched '{}' at {} (slot {})",
                        constraint.name,
                        name,
                        position,
                        slot
                    );
                }

                for field in fields.iter_mut() {
                    if field.move_to_start_element(name) {
                        log::trace!(
                            "field '{}' of '{}' matched element '{}'",
                            constraint.field_expression(field.column()),
                            constraint.name,
                            name
                        );
                    }
                }
            }
        }
    }

    /// Process an attribute of the element just started
    pub fn attribute(
        &mut self,
        name: &QName,
        value: &XsdValue,
        lexical: &str,
        datatype: &Arc<Datatype>,
    ) {
        let Some(start) = self.start_id_constraint else {
            return;
        };
        let position = self.current_position();

        for frame in &mut self.frames[start..] {
            for cs in &mut frame.constraints {
                let ConstraintStruct {
                    constraint,
                    selector,
                    fields,
                    ..
                } = cs;

                for field in fields.iter_mut() {
                    if !field.move_to_attribute(name) {
                        continue;
                    }
                    let ks = selector.key_sequence_mut(field.slot());
                    if ks.is_filled(field.column()) {
                        emit(
                            &mut self.sink,
                            cardinality_event(constraint, field.column(), position),
                        );
                    } else {
                        log::trace!(
                            "field '{}' of '{}' filled from @{} = '{}'",
                            constraint.field_expression(field.column()),
                            constraint.name,
                            name,
                            lexical
                        );
                        ks.fill(
                            field.column(),
                            TypedValue::new(value.clone(), lexical, datatype.clone()),
                        );
                    }
                }
            }
        }
    }

    /// Process an element end; `content` is `None` for elements without
    /// simple content
    ///
    /// # Panics
    ///
    /// If no element is open.
    pub fn end_element(&mut self, content: Option<SimpleContent<'_>>) {
        assert!(!self.frames.is_empty(), "end_element called with no open element");

        if let Some(start) = self.start_id_constraint {
            let top = self.frames.len() - 1;
            let nil = self.frames[top].nil;
            let position = self.frames[top].position;
            let mut keyref_inserts: Vec<(KeyrefHandle, KeySequence)> = Vec::new();

            for frame in self.frames[start..].iter_mut().rev() {
                for cs in &mut frame.constraints {
                    let ConstraintStruct {
                        constraint,
                        selector,
                        fields,
                        qualified,
                        target,
                        ..
                    } = cs;

                    for field in fields.iter_mut() {
                        if !field.end_element() || nil {
                            continue;
                        }
                        let column = field.column();
                        match content {
                            None => emit(
                                &mut self.sink,
                                ValidationEvent::error(
                                    IdentityErrorKind::FieldSimpleTypeExpected,
                                    format!(
                                        "field '{}' of '{}' must select an element with simple content",
                                        constraint.field_expression(column),
                                        constraint.name
                                    ),
                                )
                                .with_constraint(constraint.name.to_string())
                                .with_position(position),
                            ),
                            Some(SimpleContent {
                                datatype,
                                value: Some(value),
                                lexical,
                            }) if !lexical.is_empty() => {
                                let ks = selector.key_sequence_mut(field.slot());
                                if ks.is_filled(column) {
                                    emit(
                                        &mut self.sink,
                                        cardinality_event(constraint, column, position),
                                    );
                                } else {
                                    log::trace!(
                                        "field '{}' of '{}' filled from element content '{}'",
                                        constraint.field_expression(column),
                                        constraint.name,
                                        lexical
                                    );
                                    ks.fill(
                                        column,
                                        TypedValue::new(value.clone(), lexical, datatype.clone()),
                                    );
                                }
                            }
                            Some(_) => {}
                        }
                    }

                    if !selector.end_element() {
                        continue;
                    }
                    let ks = selector.pop_ks();
                    match constraint.kind {
                        IdentityConstraintKind::Key | IdentityConstraintKind::Unique => {
                            if !ks.is_qualified() {
                                if constraint.kind == IdentityConstraintKind::Key {
                                    emit(
                                        &mut self.sink,
                                        ValidationEvent::error(
                                            IdentityErrorKind::MissingKey,
                                            format!(
                                                "missing key field value for '{}'",
                                                constraint.name
                                            ),
                                        )
                                        .with_constraint(constraint.name.to_string())
                                        .with_position(ks.position()),
                                    );
                                }
                            } else if qualified.contains(&ks) {
                                emit(
                                    &mut self.sink,
                                    ValidationEvent::error(
                                        IdentityErrorKind::DuplicateKey,
                                        format!(
                                            "duplicate key sequence '{}' for the {} constraint '{}'",
                                            ks, constraint.kind, constraint.name
                                        ),
                                    )
                                    .with_constraint(constraint.name.to_string())
                                    .with_position(ks.position()),
                                );
                            } else {
                                log::debug!("'{}' registered '{}'", constraint.name, ks);
                                qualified.insert(ks);
                            }
                        }
                        IdentityConstraintKind::Keyref => {
                            if let KeyrefTarget::Bound(handle) = target {
                                if ks.is_qualified() {
                                    keyref_inserts.push((*handle, ks));
                                }
                            }
                        }
                    }
                }
            }

            for (handle, ks) in keyref_inserts {
                let table = &mut self.frames[handle.frame].constraints[handle.constraint]
                    .keyref_tables[handle.table];
                log::debug!("keyref '{}' registered '{}'", table.keyref, ks);
                table.entries.insert(ks);
            }

            self.check_keyrefs(top);

            if start == top {
                self.start_id_constraint = None;
            }
        }

        if let Some(frame) = self.frames.pop() {
            log::trace!("closed '{}' (nillable: {})", frame.name, frame.nillable);
        }
    }

    /// Check the keyref tables bound to the constraints of a closing frame
    fn check_keyrefs(&mut self, frame: usize) {
        let frame = &self.frames[frame];
        for cs in &frame.constraints {
            for table in &cs.keyref_tables {
                for ks in table.entries.iter().filter(|ks| !cs.qualified.contains(*ks)) {
                    emit(
                        &mut self.sink,
                        ValidationEvent::error(
                            IdentityErrorKind::UnresolvedKeyref,
                            format!(
                                "key sequence '{}' of keyref '{}' does not refer to any value of '{}'",
                                ks,
                                table.keyref,
                                cs.name()
                            ),
                        )
                        .with_constraint(table.keyref.to_string())
                        .with_position(ks.position()),
                    );
                }
            }
        }
    }

    fn current_position(&self) -> SourcePosition {
        self.frames
            .last()
            .map(|frame| frame.position)
            .unwrap_or_default()
    }
}

fn emit<S: ValidationEventSink>(sink: &mut S, event: ValidationEvent) {
    log::debug!("validation event: {}", event);
    sink.report(event);
}

fn cardinality_event(
    constraint: &CompiledIdentityConstraint,
    column: usize,
    position: SourcePosition,
) -> ValidationEvent {
    ValidationEvent::error(
        IdentityErrorKind::FieldCardinality,
        format!(
            "field '{}' of '{}' selects more than one value",
            constraint.field_expression(column),
            constraint.name
        ),
    )
    .with_constraint(constraint.name.to_string())
    .with_position(position)
}
