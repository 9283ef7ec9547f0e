#[cfg(test)]
#[path = "extractor_test.rs"]
mod tests;

use anyhow::Result;

use super::entities;
use crate::domain::models::CodeBlock;
use crate::domain::models::HostMarkup;
use crate::domain::models::Message;
use crate::domain::models::NodeId;
use crate::domain::models::Tree;

/// Reads message records out of host containers. Extraction never fails, access errors
/// degrade to the container's visible text.
#[derive(Clone, Debug, Default)]
pub struct MessageExtractor {
    markup: HostMarkup,
}

fn trimmed_text(tree: &dyn Tree, node: NodeId) -> String {
    return tree
        .inner_text(node)
        .map(|e| return e.trim().to_string())
        .unwrap_or_default();
}

impl MessageExtractor {
    pub fn new(markup: HostMarkup) -> MessageExtractor {
        return MessageExtractor { markup };
    }

    pub fn markup(&self) -> &HostMarkup {
        return &self.markup;
    }

    pub fn extract(&self, tree: &dyn Tree, container: NodeId) -> Message {
        let key = self.sequence_key(tree, container).unwrap_or_default();

        let text = self.text(tree, container).unwrap_or_else(|err| {
            tracing::debug!(key, err = ?err, "Falling back to visible text of container");
            return trimmed_text(tree, container);
        });

        let code_blocks = self.code_blocks(tree, container).unwrap_or_else(|err| {
            tracing::debug!(key, err = ?err, "Failed to read code blocks of container");
            return vec![];
        });

        let mut message = Message::new(&key, &text);
        message.id = tree.attribute(container, "id").ok().flatten();
        message.code_blocks = code_blocks;
        message.is_assistant = self.is_assistant(tree, container);

        return message;
    }

    pub fn sequence_key(&self, tree: &dyn Tree, container: NodeId) -> Option<String> {
        return tree
            .attribute(container, &self.markup.key_attribute)
            .ok()
            .flatten();
    }

    /// Rendered content present and no editable surface inside.
    pub fn is_assistant(&self, tree: &dyn Tree, container: NodeId) -> bool {
        return self.classify(tree, container).unwrap_or(false);
    }

    fn classify(&self, tree: &dyn Tree, container: NodeId) -> Result<bool> {
        let rendered = tree.query(container, &self.markup.rendered_content)?;
        let editable = tree.query(container, &self.markup.editable)?;
        return Ok(rendered.is_some() && editable.is_none());
    }

    pub fn code_container_count(&self, tree: &dyn Tree, container: NodeId) -> usize {
        return tree
            .query_all(container, &self.markup.code_container)
            .map(|e| return e.len())
            .unwrap_or(0);
    }

    /// The message container enclosing `node`, if any.
    pub fn container_of(&self, tree: &dyn Tree, node: NodeId) -> Option<NodeId> {
        return tree.closest(node, &self.markup.container).ok().flatten();
    }

    fn text(&self, tree: &dyn Tree, container: NodeId) -> Result<String> {
        let scope = tree
            .query(container, &self.markup.markdown_root)?
            .unwrap_or(container);
        let sections = tree.query_all(scope, &self.markup.section)?;
        if sections.is_empty() {
            return Ok(tree.inner_text(container)?.trim().to_string());
        }

        let text = sections
            .iter()
            .map(|section| return self.section_text(tree, *section))
            .filter(|e| return !e.is_empty())
            .collect::<Vec<String>>()
            .join("\n\n");

        return Ok(text.trim().to_string());
    }

    fn section_text(&self, tree: &dyn Tree, section: NodeId) -> String {
        return self.read_section(tree, section).unwrap_or_else(|err| {
            tracing::debug!(err = ?err, "Falling back to visible text of section");
            return trimmed_text(tree, section);
        });
    }

    /// Raw markdown source when present, then editor lines of embedded code, then the
    /// rendered text.
    fn read_section(&self, tree: &dyn Tree, section: NodeId) -> Result<String> {
        if let Some(raw) = tree.attribute(section, &self.markup.raw_attribute)? {
            let raw = raw.trim();
            if !raw.is_empty() {
                return Ok(entities::decode(raw));
            }
        }

        if let Some(code) = tree.query(section, &self.markup.section_code)? {
            let lines = self.view_lines(tree, code)?;
            if !lines.is_empty() {
                return Ok(lines.join("\n"));
            }
            return Ok(tree.inner_text(code)?.trim().to_string());
        }

        return Ok(tree.inner_text(section)?.trim().to_string());
    }

    /// Editor lines under `scope` in document order, with non-breaking spaces normalized.
    fn view_lines(&self, tree: &dyn Tree, scope: NodeId) -> Result<Vec<String>> {
        let mut ids: Vec<NodeId> = vec![];
        for lines in tree.query_all(scope, &self.markup.view_lines)? {
            for line in tree.query_all(lines, &self.markup.view_line)? {
                if !ids.contains(&line) {
                    ids.push(line);
                }
            }
        }

        let mut res = vec![];
        for id in ids {
            res.push(tree.inner_text(id)?.replace('\u{a0}', " "));
        }

        return Ok(res);
    }

    pub fn code_blocks(&self, tree: &dyn Tree, container: NodeId) -> Result<Vec<CodeBlock>> {
        let mut res = vec![];

        for block in tree.query_all(container, &self.markup.code_container)? {
            let mut filename = match tree.query(block, &self.markup.code_filename)? {
                Some(label) => tree.text_content(label)?.trim().to_string(),
                None => "".to_string(),
            };
            if filename.is_empty() {
                filename = "untitled".to_string();
            }

            let mut panes = tree.query_all(block, &self.markup.editor_pane)?;
            if panes.is_empty() {
                panes.push(block);
            }

            let mut pane_codes = vec![];
            for pane in panes {
                let code = self
                    .view_lines(tree, pane)?
                    .into_iter()
                    .filter(|e| return !e.trim().is_empty())
                    .collect::<Vec<String>>()
                    .join("\n");
                if !code.is_empty() {
                    pane_codes.push(code);
                }
            }

            // Still rendering, picked up again once the lines arrive.
            if pane_codes.is_empty() {
                continue;
            }

            res.push(CodeBlock::new(&filename, &pane_codes.join("\n---\n")));
        }

        return Ok(res);
    }
}
