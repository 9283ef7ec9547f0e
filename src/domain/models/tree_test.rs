use anyhow::Result;

use super::NodeSpec;
use super::Selector;

fn submit_button() -> NodeSpec {
    return NodeSpec::element("div")
        .with_class("anysphere-icon-button")
        .with_class("small")
        .with_attr("data-mode", "agent")
        .with_attr("data-outlined", "true");
}

#[test]
fn it_matches_classes_among_many() {
    let node = submit_button();
    assert!(Selector::class("anysphere-icon-button").matches(&node));
    assert!(Selector::class("small").matches(&node));
    assert!(!Selector::class("anysphere").matches(&node));
}

#[test]
fn it_matches_compound_selectors() {
    let node = submit_button();
    let selector = Selector::All(vec![
        Selector::tag("div"),
        Selector::class("anysphere-icon-button"),
        Selector::attr_eq("data-mode", "agent"),
    ]);
    assert!(selector.matches(&node));

    let wrong_mode = Selector::All(vec![
        Selector::tag("div"),
        Selector::attr_eq("data-mode", "chat"),
    ]);
    assert!(!wrong_mode.matches(&node));
}

#[test]
fn it_matches_selector_lists() {
    let node = NodeSpec::element("section").with_attr("contenteditable", "true");
    let selector = Selector::Any(vec![
        Selector::class("aislash-editor-input"),
        Selector::attr_eq("contenteditable", "true"),
    ]);
    assert!(selector.matches(&node));
    assert!(!selector.matches(&NodeSpec::text("contenteditable")));
}

#[test]
fn it_renders_css() {
    let selector = Selector::All(vec![
        Selector::class("anysphere-icon-button"),
        Selector::attr_eq("data-mode", "agent"),
        Selector::tag("div"),
    ]);
    insta::assert_snapshot!(selector.to_string(), @r###"div.anysphere-icon-button[data-mode="agent"]"###);

    let list = Selector::Any(vec![Selector::class("a"), Selector::attr("data-b")]);
    insta::assert_snapshot!(list.to_string(), @".a, [data-b]");
}

#[test]
fn it_deserializes_snapshots() -> Result<()> {
    let json = r#"{"kind":"element","tag":"div","attributes":{"data-message-index":"3"},"children":[{"kind":"text","text":"hi"}]}"#;
    let spec: NodeSpec = serde_json::from_str(json)?;

    assert_eq!(spec.attribute("data-message-index"), Some("3"));
    assert_eq!(
        spec,
        NodeSpec::element("div")
            .with_attr("data-message-index", "3")
            .with_text("hi")
    );
    return Ok(());
}
