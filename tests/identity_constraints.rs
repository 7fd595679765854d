//! Identity constraint integration tests
//!
//! Each test loads a JSON schema model, streams a document through the
//! validator and checks the reported events.

use pretty_assertions::assert_eq;
use xmlschema_identity::validators::{
    validate_identities, validate_identities_with_sink, CallbackSink, IdentityErrorKind,
    ValidationEvent, ValidationSettings, XsdSchema,
};

fn run(model: &str, xml: &str) -> Vec<ValidationEvent> {
    let schema = XsdSchema::from_json(model).expect("invalid schema model");
    validate_identities(&schema, xml, &ValidationSettings::default()).expect("validation failed")
}

fn kinds(events: &[ValidationEvent]) -> Vec<IdentityErrorKind> {
    events.iter().map(|e| e.kind).collect()
}

const KEY_AND_KEYREF: &str = r#"{
    "elements": [
        {
            "name": "root",
            "children": [
                { "name": "item", "attributes": { "id": "xs:int" } },
                { "name": "use", "attributes": { "ref": "xs:int" } }
            ],
            "identities": [
                { "kind": "key", "name": "K1", "selector": "item", "fields": ["@id"] },
                { "kind": "keyref", "name": "R1", "refer": "K1", "selector": "use", "fields": ["@ref"] }
            ]
        }
    ]
}"#;

// ============================================================================
// Key / unique
// ============================================================================

#[test]
fn test_duplicate_key_reported_once() {
    let events = run(
        KEY_AND_KEYREF,
        r#"<root><item id="1"/><item id="1"/></root>"#,
    );

    assert_eq!(kinds(&events), vec![IdentityErrorKind::DuplicateKey]);
    assert_eq!(events[0].constraint.as_deref(), Some("K1"));
    assert!(events[0].is_error());
    assert!(events[0].message.contains("'1'"));
}

#[test]
fn test_missing_key_field() {
    let events = run(
        KEY_AND_KEYREF,
        r#"<root><item id="1"/><item/><item id="2"/></root>"#,
    );
    assert_eq!(kinds(&events), vec![IdentityErrorKind::MissingKey]);
}

#[test]
fn test_unique_skips_unqualified_sequences() {
    let model = r#"{
        "elements": [ {
            "name": "root",
            "children": [ { "name": "item", "attributes": { "code": "xs:string" } } ],
            "identities": [ { "kind": "unique", "name": "U1", "selector": "item", "fields": ["@code"] } ]
        } ]
    }"#;

    assert!(run(model, "<root><item/><item/></root>").is_empty());

    let events = run(
        model,
        r#"<root><item/><item code="a"/><item code="b"/><item code="a"/></root>"#,
    );
    assert_eq!(kinds(&events), vec![IdentityErrorKind::DuplicateKey]);
}

#[test]
fn test_multi_field_key() {
    let model = r#"{
        "elements": [ {
            "name": "root",
            "children": [ { "name": "item", "attributes": { "a": "xs:int", "b": "xs:string" } } ],
            "identities": [ { "kind": "key", "name": "K", "selector": "item", "fields": ["@a", "@b"] } ]
        } ]
    }"#;

    let events = run(
        model,
        r#"<root><item a="1" b="x"/><item a="1" b="y"/><item b="x" a="01"/></root>"#,
    );
    assert_eq!(kinds(&events), vec![IdentityErrorKind::DuplicateKey]);
    assert!(events[0].message.contains("'01 x'"));
}

#[test]
fn test_cross_type_decimal_values_collide() {
    let model = r#"{
        "elements": [ {
            "name": "root",
            "children": [
                { "name": "item", "attributes": { "n": "xs:int" } },
                { "name": "entry", "attributes": { "n": "xs:decimal" } }
            ],
            "identities": [ { "kind": "unique", "name": "U", "selector": "item | entry", "fields": ["@n"] } ]
        } ]
    }"#;

    let events = run(model, r#"<root><item n="3"/><entry n="3.50"/><entry n="3.0"/></root>"#);
    assert_eq!(kinds(&events), vec![IdentityErrorKind::DuplicateKey]);
}

#[test]
fn test_date_time_family_values_compare_by_value() {
    let model = r#"{
        "elements": [ {
            "name": "root",
            "children": [ { "name": "item", "attributes": { "y": "xs:gYear", "t": "xs:time" } } ],
            "identities": [
                { "kind": "unique", "name": "UY", "selector": "item", "fields": ["@y"] },
                { "kind": "unique", "name": "UT", "selector": "item", "fields": ["@t"] }
            ]
        } ]
    }"#;

    let events = run(
        model,
        r#"<root><item y="2001Z" t="24:00:00"/><item y="2001+00:00" t="00:00:00"/></root>"#,
    );
    assert_eq!(
        kinds(&events),
        vec![IdentityErrorKind::DuplicateKey, IdentityErrorKind::DuplicateKey]
    );
    assert_eq!(events[0].constraint.as_deref(), Some("UY"));
    assert_eq!(events[1].constraint.as_deref(), Some("UT"));

    let events = run(
        model,
        r#"<root><item y="2001" t="12:00:00"/><item y="2001Z" t="12:00:00Z"/></root>"#,
    );
    assert!(events.is_empty());
}

#[test]
fn test_descendant_selector_nested_matches() {
    let model = r#"{
        "elements": [
            {
                "name": "root",
                "identities": [ { "kind": "key", "name": "K", "selector": ".//item", "fields": ["@id"] } ]
            },
            { "name": "item", "attributes": { "id": "xs:int" } }
        ]
    }"#;

    let xml = "<root>\n<item id=\"1\">\n<item id=\"2\"/>\n<item id=\"1\"/>\n</item>\n</root>";
    let events = run(model, xml);
    assert_eq!(kinds(&events), vec![IdentityErrorKind::DuplicateKey]);
    assert_eq!(events[0].position.map(|p| p.line), Some(2));
}

// ============================================================================
// Keyref
// ============================================================================

#[test]
fn test_unresolved_keyref() {
    let events = run(
        KEY_AND_KEYREF,
        r#"<root><item id="1"/><item id="2"/><use ref="1"/><use ref="3"/></root>"#,
    );

    assert_eq!(kinds(&events), vec![IdentityErrorKind::UnresolvedKeyref]);
    assert_eq!(events[0].constraint.as_deref(), Some("R1"));
    assert!(events[0].message.contains("'3'"));
}

#[test]
fn test_keyref_before_key_in_document_order() {
    let events = run(
        KEY_AND_KEYREF,
        r#"<root><use ref="2"/><use ref="1"/><use ref="2"/><item id="1"/><item id="2"/></root>"#,
    );
    assert!(events.is_empty(), "unexpected events: {:?}", events);
}

#[test]
fn test_unresolved_keyrefs_in_first_seen_order() {
    let events = run(
        KEY_AND_KEYREF,
        r#"<root><use ref="9"/><use ref="7"/><use ref="9"/><item id="1"/></root>"#,
    );

    assert_eq!(
        kinds(&events),
        vec![
            IdentityErrorKind::UnresolvedKeyref,
            IdentityErrorKind::UnresolvedKeyref
        ]
    );
    assert!(events[0].message.contains("'9'"));
    assert!(events[1].message.contains("'7'"));
}

#[test]
fn test_keyref_binds_innermost_scope() {
    let model = r#"{
        "elements": [ {
            "name": "section",
            "children": [
                { "name": "item", "attributes": { "id": "xs:int" } },
                { "name": "use", "attributes": { "ref": "xs:int" } }
            ],
            "identities": [
                { "kind": "key", "name": "K", "selector": "item", "fields": ["@id"] },
                { "kind": "keyref", "name": "R", "refer": "K", "selector": "use", "fields": ["@ref"] }
            ]
        } ]
    }"#;

    // The inner section is resolved through the global declaration
    let events = run(
        model,
        r#"<section><item id="1"/><section><use ref="1"/></section><use ref="1"/></section>"#,
    );
    assert_eq!(kinds(&events), vec![IdentityErrorKind::UnresolvedKeyref]);

    let events = run(
        model,
        r#"<section><item id="1"/><section><item id="1"/><use ref="1"/></section></section>"#,
    );
    assert!(events.is_empty(), "unexpected events: {:?}", events);
}

#[test]
fn test_keyref_to_constraint_out_of_scope() {
    let model = r#"{
        "elements": [ {
            "name": "root",
            "children": [
                {
                    "name": "a",
                    "children": [ { "name": "item", "attributes": { "id": "xs:int" } } ],
                    "identities": [ { "kind": "key", "name": "K", "selector": "item", "fields": ["@id"] } ]
                },
                {
                    "name": "b",
                    "children": [ { "name": "use", "attributes": { "ref": "xs:int" } } ],
                    "identities": [
                        { "kind": "keyref", "name": "R", "refer": "K", "selector": "use", "fields": ["@ref"] }
                    ]
                }
            ]
        } ]
    }"#;

    let events = run(
        model,
        r#"<root><a><item id="1"/></a><b><use ref="1"/><use ref="2"/></b></root>"#,
    );
    assert_eq!(kinds(&events), vec![IdentityErrorKind::RefNotInScope]);
    assert_eq!(events[0].constraint.as_deref(), Some("R"));
}

#[test]
fn test_union_key_matches_decimal_keyref() {
    let model = r#"{
        "simpleTypes": [ { "name": "IntOrName", "union": ["xs:int", "xs:NCName"] } ],
        "elements": [ {
            "name": "root",
            "children": [
                { "name": "item", "attributes": { "id": "IntOrName" } },
                { "name": "use", "attributes": { "ref": "xs:decimal" } }
            ],
            "identities": [
                { "kind": "key", "name": "K", "selector": "item", "fields": ["@id"] },
                { "kind": "keyref", "name": "R", "refer": "K", "selector": "use", "fields": ["@ref"] }
            ]
        } ]
    }"#;

    assert!(run(model, r#"<root><item id="7"/><use ref="7.0"/></root>"#).is_empty());
    assert!(run(model, r#"<root><item id="seven"/><item id="7"/><use ref="7"/></root>"#).is_empty());

    let events = run(model, r#"<root><item id="seven"/><use ref="8"/></root>"#);
    assert_eq!(kinds(&events), vec![IdentityErrorKind::UnresolvedKeyref]);
}

#[test]
fn test_keyref_to_unique() {
    let model = r#"{
        "elements": [ {
            "name": "root",
            "children": [
                { "name": "item", "attributes": { "code": "xs:token" } },
                { "name": "use", "attributes": { "code": "xs:string" } }
            ],
            "identities": [
                { "kind": "unique", "name": "U", "selector": "item", "fields": ["@code"] },
                { "kind": "keyref", "name": "R", "refer": "U", "selector": "use", "fields": ["@code"] }
            ]
        } ]
    }"#;

    let events = run(
        model,
        r#"<root><item code="a"/><item/><use code="a"/><use/><use code="b"/></root>"#,
    );
    assert_eq!(kinds(&events), vec![IdentityErrorKind::UnresolvedKeyref]);
    assert!(events[0].message.contains("'b'"));
}

// ============================================================================
// Fields
// ============================================================================

const ELEMENT_FIELDS: &str = r#"{
    "elements": [ {
        "name": "root",
        "children": [ {
            "name": "item",
            "attributes": { "a": "xs:int", "b": "xs:int" },
            "children": [
                { "name": "code", "type": "xs:int", "nillable": true },
                { "name": "info", "children": [ { "name": "text", "type": "xs:string" } ] }
            ]
        } ],
        "identities": [
            { "kind": "key", "name": "ByCode", "selector": "item", "fields": ["code"] },
            { "kind": "unique", "name": "ByAttr", "selector": "item", "fields": ["@a | @b"] },
            { "kind": "unique", "name": "ByInfo", "selector": "item", "fields": ["info"] }
        ]
    } ]
}"#;

#[test]
fn test_element_field_values() {
    let events = run(
        ELEMENT_FIELDS,
        "<root><item><code> 7 </code></item><item><code>07</code></item></root>",
    );
    assert_eq!(kinds(&events), vec![IdentityErrorKind::DuplicateKey]);
    assert_eq!(events[0].constraint.as_deref(), Some("ByCode"));
}

#[test]
fn test_field_selects_more_than_one_node() {
    let events = run(
        ELEMENT_FIELDS,
        r#"<root><item a="1" b="2"><code>1</code></item><item><code>2</code><code>3</code></item></root>"#,
    );
    assert_eq!(
        kinds(&events),
        vec![
            IdentityErrorKind::FieldCardinality,
            IdentityErrorKind::FieldCardinality
        ]
    );
    assert_eq!(events[0].constraint.as_deref(), Some("ByAttr"));
    assert_eq!(events[1].constraint.as_deref(), Some("ByCode"));
}

#[test]
fn test_field_on_element_without_simple_content() {
    let events = run(
        ELEMENT_FIELDS,
        "<root><item><code>1</code><info><text>x</text></info></item></root>",
    );
    assert_eq!(kinds(&events), vec![IdentityErrorKind::FieldSimpleTypeExpected]);
    assert_eq!(events[0].constraint.as_deref(), Some("ByInfo"));
}

#[test]
fn test_nilled_and_empty_fields_stay_unfilled() {
    let xml = r#"<root xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
        <item><code xsi:nil="true"/></item>
        <item><code></code></item>
    </root>"#;
    let events = run(ELEMENT_FIELDS, xml);
    assert_eq!(
        kinds(&events),
        vec![IdentityErrorKind::MissingKey, IdentityErrorKind::MissingKey]
    );
}

#[test]
fn test_invalid_field_value() {
    let events = run(ELEMENT_FIELDS, "<root><item><code>seven</code></item></root>");
    assert_eq!(
        kinds(&events),
        vec![IdentityErrorKind::InvalidValue, IdentityErrorKind::MissingKey]
    );
}

#[test]
fn test_default_values_fill_key_fields() {
    let model = r#"{
        "elements": [ {
            "name": "root",
            "children": [
                { "name": "item", "attributes": { "id": { "type": "xs:int", "default": "1" } } },
                { "name": "entry", "type": "xs:int", "default": "2" },
                { "name": "use", "attributes": { "ref": "xs:int" } }
            ],
            "identities": [
                { "kind": "key", "name": "K", "selector": "item", "fields": ["@id"] },
                { "kind": "key", "name": "KE", "selector": "entry", "fields": ["."] },
                { "kind": "keyref", "name": "R", "refer": "K", "selector": "use", "fields": ["@ref"] }
            ]
        } ]
    }"#;

    assert!(run(model, r#"<root><item/><entry/><use ref="1"/></root>"#).is_empty());

    let events = run(model, r#"<root><item/><item id="1"/><entry>2</entry><entry/></root>"#);
    assert_eq!(
        kinds(&events),
        vec![IdentityErrorKind::DuplicateKey, IdentityErrorKind::DuplicateKey]
    );
    assert_eq!(events[0].constraint.as_deref(), Some("K"));
    assert_eq!(events[1].constraint.as_deref(), Some("KE"));
}

// ============================================================================
// Namespaces and settings
// ============================================================================

#[test]
fn test_namespaced_document() {
    let model = r#"{
        "targetNamespace": "urn:shop",
        "elementFormDefault": "qualified",
        "namespaces": { "s": "urn:shop" },
        "simpleTypes": [ { "name": "sku", "restriction": "xs:token" } ],
        "elements": [ {
            "name": "shop",
            "children": [ { "name": "item", "attributes": { "sku": "sku" } } ],
            "identities": [ { "kind": "key", "name": "itemKey", "selector": "s:item", "fields": ["@sku"] } ]
        } ]
    }"#;

    let xml = r#"<shop xmlns="urn:shop"><item sku="a1"/><x:item xmlns:x="urn:shop" sku=" a1 "/></shop>"#;
    let events = run(model, xml);
    assert_eq!(kinds(&events), vec![IdentityErrorKind::DuplicateKey]);
    assert_eq!(events[0].constraint.as_deref(), Some("{urn:shop}itemKey"));

    // Unqualified items are not selected
    let xml = r#"<s:shop xmlns:s="urn:shop"><item sku="a1"/><item sku="a1"/></s:shop>"#;
    assert!(run(model, xml).is_empty());
}

#[test]
fn test_identity_check_disabled() {
    let schema = XsdSchema::from_json(KEY_AND_KEYREF).unwrap();
    let settings = ValidationSettings::default().with_identity_check(false);
    let events = validate_identities(
        &schema,
        r#"<root><item id="1"/><item id="1"/><use ref="5"/></root>"#,
        &settings,
    )
    .unwrap();
    assert!(events.is_empty());
}

#[test]
fn test_callback_sink() {
    let schema = XsdSchema::from_json(KEY_AND_KEYREF).unwrap();
    let mut codes = Vec::new();
    validate_identities_with_sink(
        &schema,
        r#"<root><item id="1"/><item id="1"/><use ref="5"/></root>"#,
        &ValidationSettings::default(),
        CallbackSink(|event: ValidationEvent| codes.push(event.kind.code())),
    )
    .unwrap();
    assert_eq!(codes, vec!["duplicate-key", "unresolved-keyref"]);
}
