#[cfg(test)]
#[path = "echo_test.rs"]
mod tests;

use std::sync::Arc;

use anyhow::Result;

use super::memory::Document;
use super::memory::MemorySurface;
use crate::domain::models::Host;
use crate::domain::models::HostMarkup;
use crate::domain::models::HostName;
use crate::domain::models::NodeSpec;
use crate::domain::models::Tree;

fn escape(text: &str) -> String {
    return text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;");
}

/// Prompt input and submit control, shaped like the Cursor composer.
pub fn composer() -> NodeSpec {
    return NodeSpec::element("div")
        .with_class("composer")
        .with_child(
            NodeSpec::element("div")
                .with_class("aislash-editor-input")
                .with_attr("contenteditable", "true"),
        )
        .with_child(
            NodeSpec::element("div")
                .with_class("anysphere-icon-button")
                .with_attr("data-mode", "agent")
                .with_attr("data-outlined", "true"),
        );
}

pub fn user_bubble(key_attribute: &str, index: usize, prompt: &str) -> NodeSpec {
    return NodeSpec::element("div")
        .with_attr(key_attribute, &index.to_string())
        .with_child(
            NodeSpec::element("div")
                .with_attr("contenteditable", "true")
                .with_text(prompt),
        );
}

pub fn assistant_bubble(key_attribute: &str, index: usize, text: &str) -> NodeSpec {
    return NodeSpec::element("div")
        .with_attr(key_attribute, &index.to_string())
        .with_attr("id", &format!("echo-{index}"))
        .with_child(
            NodeSpec::element("div")
                .with_class("anysphere-markdown-container-root")
                .with_child(
                    NodeSpec::element("section")
                        .with_class("markdown-section")
                        .with_attr("data-markdown-raw", &escape(text))
                        .with_text(text),
                ),
        );
}

/// In-memory host whose assistant answers every submitted prompt with the prompt itself.
pub fn build(markup: HostMarkup) -> Result<Host> {
    let document = Arc::new(Document::default());
    let conversation = document.append(
        document.root(),
        NodeSpec::element("div").with_class("conversation"),
    )?;
    document.append(document.root(), composer())?;

    let container = markup.container.clone();
    let key_attribute = markup.key_attribute.to_string();
    let surface = MemorySurface::new(document.clone(), markup).with_submit_hook(Box::new(
        move |document: &Document, prompt: &str| -> Result<()> {
            let index = document.query_all(conversation, &container)?.len();
            document.append_many(
                conversation,
                vec![
                    user_bubble(&key_attribute, index, prompt),
                    assistant_bubble(&key_attribute, index + 1, prompt),
                ],
            )?;

            tracing::debug!(index, "Echoed prompt");
            return Ok(());
        },
    ));

    return Ok(Host::new(HostName::Echo, document, Arc::new(surface)));
}
