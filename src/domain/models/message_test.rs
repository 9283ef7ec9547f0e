use super::CodeBlock;
use super::Message;

#[test]
fn it_executes_new() {
    let msg = Message::new("42", "Hello");
    assert_eq!(msg.sequence_key, "42");
    assert_eq!(msg.text, "Hello");
    assert!(msg.id.is_none());
    assert!(msg.is_assistant);
    assert!(!msg.completed);
    assert!(!msg.has_code_blocks());
}

#[test]
fn it_formats_relay_text_with_code_blocks() {
    let mut msg = Message::new("42", "Here you go.");
    msg.code_blocks = vec![
        CodeBlock::new("main.py", "print(1)"),
        CodeBlock::new("untitled", "a\n---\nb"),
    ];

    insta::assert_snapshot!(msg.relay_text(), @r###"
    Here you go.

    [CODE: main.py]
    print(1)

    [CODE: untitled]
    a
    ---
    b
    "###);
}

#[test]
fn it_formats_relay_text_for_empty_messages() {
    let msg = Message::new("42", "");
    assert!(msg.is_empty());
    assert_eq!(msg.relay_text(), "(empty)");
}

#[test]
fn it_changes_signature_when_code_grows() {
    let mut msg = Message::new("1", "text");
    let empty = msg.signature(8);

    msg.code_blocks = vec![CodeBlock::new("a.rs", "fn main() {}")];
    let first = msg.signature(8);
    assert_ne!(empty, first);

    msg.code_blocks = vec![CodeBlock::new("a.rs", "fn main() { run(); }")];
    let second = msg.signature(8);
    assert_ne!(first, second);

    assert_eq!(second, msg.clone().signature(8));
}

#[test]
fn it_compares_content_only() {
    let mut first = Message::new("1", "same");
    let mut second = Message::new("1", "same");
    first.timestamp = 1;
    second.timestamp = 2;
    second.completed = true;
    assert!(first.same_content(&second));

    second.code_blocks.push(CodeBlock::new("untitled", "x"));
    assert!(!first.same_content(&second));
}
