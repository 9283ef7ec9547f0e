/// Assistant message container as rendered by the Cursor composer, in the JSON shape the
/// page snapshots use.
pub fn assistant_container_fixture() -> &'static str {
    return r#"
{
  "kind": "element",
  "tag": "div",
  "attributes": {"data-message-index": "42", "id": "bubble-42"},
  "children": [
    {
      "kind": "element",
      "tag": "div",
      "attributes": {"class": "anysphere-markdown-container-root"},
      "children": [
        {
          "kind": "element",
          "tag": "section",
          "attributes": {
            "class": "markdown-section",
            "data-markdown-raw": "Use &lt;b&gt; for &quot;bold&quot; &amp; more."
          },
          "children": [{"kind": "text", "text": "Use <b> for \"bold\" & more."}]
        },
        {
          "kind": "element",
          "tag": "section",
          "attributes": {"class": "markdown-section"},
          "children": [
            {
              "kind": "element",
              "tag": "div",
              "attributes": {"class": "markdown-code-outer-container"},
              "children": [
                {
                  "kind": "element",
                  "tag": "div",
                  "attributes": {"class": "view-lines"},
                  "children": [
                    {
                      "kind": "element",
                      "tag": "div",
                      "attributes": {"class": "view-line"},
                      "children": [{"kind": "text", "text": "let x = 1;"}]
                    },
                    {
                      "kind": "element",
                      "tag": "div",
                      "attributes": {"class": "view-line"},
                      "children": [{"kind": "text", "text": "let\u00a0y = 2;"}]
                    }
                  ]
                }
              ]
            }
          ]
        },
        {
          "kind": "element",
          "tag": "section",
          "attributes": {"class": "markdown-section", "data-markdown-raw": "   "},
          "children": [
            {"kind": "element", "tag": "span", "children": [{"kind": "text", "text": "Done"}]},
            {"kind": "text", "text": "."}
          ]
        }
      ]
    },
    {
      "kind": "element",
      "tag": "div",
      "attributes": {"class": "composer-code-block-container"},
      "children": [
        {
          "kind": "element",
          "tag": "span",
          "attributes": {"class": "composer-code-block-filename"},
          "children": [{"kind": "text", "text": " main.rs "}]
        },
        {
          "kind": "element",
          "tag": "div",
          "attributes": {"class": "monaco-editor"},
          "children": [
            {
              "kind": "element",
              "tag": "div",
              "attributes": {"class": "view-lines"},
              "children": [
                {
                  "kind": "element",
                  "tag": "div",
                  "attributes": {"class": "view-line"},
                  "children": [{"kind": "text", "text": "fn main() {"}]
                },
                {
                  "kind": "element",
                  "tag": "div",
                  "attributes": {"class": "view-line"},
                  "children": [{"kind": "text", "text": "\u00a0\u00a0\u00a0\u00a0println!(\"hi\");"}]
                },
                {
                  "kind": "element",
                  "tag": "div",
                  "attributes": {"class": "view-line"},
                  "children": [{"kind": "text", "text": "\u00a0"}]
                },
                {
                  "kind": "element",
                  "tag": "div",
                  "attributes": {"class": "view-line"},
                  "children": [{"kind": "text", "text": "}"}]
                }
              ]
            }
          ]
        }
      ]
    }
  ]
}
"#
    .trim();
}

/// User message container, which keeps an editable copy of the prompt.
pub fn user_container_fixture() -> &'static str {
    return r#"
{
  "kind": "element",
  "tag": "div",
  "attributes": {"data-message-index": "41"},
  "children": [
    {
      "kind": "element",
      "tag": "div",
      "attributes": {"class": "aislash-editor-input", "contenteditable": "true"},
      "children": [{"kind": "text", "text": "How do I print in Rust?"}]
    }
  ]
}
"#
    .trim();
}

/// Page snapshot holding two containers, as returned by the DevTools mirror script.
pub fn page_snapshot_fixture() -> &'static str {
    return r#"
[
  {
    "kind": "element",
    "tag": "div",
    "attributes": {"data-message-index": "1"},
    "children": [
      {
        "kind": "element",
        "tag": "div",
        "attributes": {"class": "aislash-editor-input", "contenteditable": "true"},
        "children": [{"kind": "text", "text": "hello"}]
      }
    ]
  },
  {
    "kind": "element",
    "tag": "div",
    "attributes": {"data-message-index": "2"},
    "children": [
      {
        "kind": "element",
        "tag": "div",
        "attributes": {"class": "anysphere-markdown-container-root"},
        "children": [
          {
            "kind": "element",
            "tag": "div",
            "attributes": {"class": "markdown-section", "data-markdown-raw": "Hi there!"},
            "children": [{"kind": "text", "text": "Hi there!"}]
          }
        ]
      }
    ]
  }
]
"#
    .trim();
}
