//! Field matcher reuse
//!
//! Reusing the field matchers of vacated selector slots must not change
//! what the validator reports.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use xmlschema_identity::validators::{
    validate_identities, IdentityErrorKind, ValidationEvent, ValidationSettings, XsdSchema,
};

const MODEL: &str = r#"{
    "elements": [
        {
            "name": "section",
            "attributes": { "id": "xs:int" },
            "identities": [
                { "kind": "key", "name": "K", "selector": ".//item", "fields": ["@id"] },
                { "kind": "unique", "name": "U", "selector": "item | section", "fields": ["@id | code"] },
                { "kind": "keyref", "name": "R", "refer": "K", "selector": ".//use", "fields": ["@ref"] }
            ]
        },
        {
            "name": "item",
            "attributes": { "id": "xs:int" },
            "children": [ { "name": "code", "type": "xs:decimal" } ]
        },
        { "name": "use", "attributes": { "ref": "xs:int" } }
    ]
}"#;

#[derive(Debug, Clone)]
enum Node {
    Item(Option<u8>, Option<u8>, Vec<Node>),
    Use(u8),
    Section(Option<u8>, Vec<Node>),
}

fn node() -> impl Strategy<Value = Node> {
    let leaf = prop_oneof![
        (proptest::option::of(0u8..4), proptest::option::of(0u8..4))
            .prop_map(|(id, code)| Node::Item(id, code, Vec::new())),
        (0u8..4).prop_map(Node::Use),
    ];
    leaf.prop_recursive(4, 48, 5, |inner| {
        prop_oneof![
            (
                proptest::option::of(0u8..4),
                proptest::collection::vec(inner.clone(), 0..5)
            )
                .prop_map(|(id, children)| Node::Section(id, children)),
            (
                proptest::option::of(0u8..4),
                proptest::option::of(0u8..4),
                proptest::collection::vec(inner, 0..4)
            )
                .prop_map(|(id, code, children)| Node::Item(id, code, children)),
        ]
    })
}

fn id_attribute(name: &str, value: Option<u8>) -> String {
    value
        .map(|v| format!(" {}=\"{}\"", name, v))
        .unwrap_or_default()
}

fn render(node: &Node, out: &mut String) {
    match node {
        Node::Item(id, code, children) => {
            out.push_str(&format!("<item{}>", id_attribute("id", *id)));
            if let Some(code) = code {
                out.push_str(&format!("<code>{}.0</code>", code));
            }
            children.iter().for_each(|child| render(child, out));
            out.push_str("</item>\n");
        }
        Node::Use(reference) => out.push_str(&format!("<use ref=\"{}\"/>\n", reference)),
        Node::Section(id, children) => {
            out.push_str(&format!("<section{}>\n", id_attribute("id", *id)));
            children.iter().for_each(|child| render(child, out));
            out.push_str("</section>\n");
        }
    }
}

fn document(children: &[Node]) -> String {
    let mut xml = String::new();
    render(&Node::Section(None, children.to_vec()), &mut xml);
    xml
}

fn events(xml: &str, reuse: bool) -> Vec<ValidationEvent> {
    let schema = XsdSchema::from_json(MODEL).unwrap();
    let settings = ValidationSettings::default().with_axis_reuse(reuse);
    validate_identities(&schema, xml, &settings).unwrap()
}

#[test]
fn test_reuse_matches_fresh_allocation() {
    let xml = r#"<section>
        <item id="1"><item id="2"><code>1</code></item></item>
        <item id="2"/>
        <item/>
        <item id="4"><code>4</code></item>
        <section id="3"><item id="1"/><use ref="1"/><use ref="2"/></section>
        <use ref="3"/>
    </section>"#;

    let reused = events(xml, true);
    let fresh = events(xml, false);
    assert_eq!(reused, fresh);

    let kinds: Vec<_> = reused.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            IdentityErrorKind::DuplicateKey,
            IdentityErrorKind::MissingKey,
            IdentityErrorKind::FieldCardinality,
            IdentityErrorKind::DuplicateKey,
            IdentityErrorKind::UnresolvedKeyref,
            IdentityErrorKind::UnresolvedKeyref,
        ]
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_reuse_does_not_change_events(children in proptest::collection::vec(node(), 0..6)) {
        let xml = document(&children);
        prop_assert_eq!(events(&xml, true), events(&xml, false));
    }
}
