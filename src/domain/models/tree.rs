#[cfg(test)]
#[path = "tree_test.rs"]
mod tests;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use serde_derive::Deserialize;
use serde_derive::Serialize;
use tokio::sync::mpsc;

pub type NodeId = usize;

/// Minimal view of an element that a `Selector` can be matched against.
pub trait ElementLike {
    fn tag(&self) -> &str;
    fn attribute(&self, name: &str) -> Option<&str>;

    fn has_class(&self, class: &str) -> bool {
        return self
            .attribute("class")
            .map(|classes| return classes.split_whitespace().any(|e| return e == class))
            .unwrap_or(false);
    }
}

/// Structured subset of CSS selectors used by the host markup contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    Tag(String),
    Class(String),
    Attr(String),
    AttrEq(String, String),
    /// Compound selector, every part must match the same element.
    All(Vec<Selector>),
    /// Selector list, any part may match.
    Any(Vec<Selector>),
}

impl Selector {
    pub fn tag(name: &str) -> Selector {
        return Selector::Tag(name.to_string());
    }

    pub fn class(name: &str) -> Selector {
        return Selector::Class(name.to_string());
    }

    pub fn attr(name: &str) -> Selector {
        return Selector::Attr(name.to_string());
    }

    pub fn attr_eq(name: &str, value: &str) -> Selector {
        return Selector::AttrEq(name.to_string(), value.to_string());
    }

    pub fn matches(&self, element: &dyn ElementLike) -> bool {
        match self {
            Selector::Tag(name) => return element.tag().eq_ignore_ascii_case(name),
            Selector::Class(name) => return element.has_class(name),
            Selector::Attr(name) => return element.attribute(name).is_some(),
            Selector::AttrEq(name, value) => {
                return element.attribute(name) == Some(value.as_str());
            }
            Selector::All(parts) => return parts.iter().all(|e| return e.matches(element)),
            Selector::Any(parts) => return parts.iter().any(|e| return e.matches(element)),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Selector::Tag(name) => return write!(f, "{name}"),
            Selector::Class(name) => return write!(f, ".{name}"),
            Selector::Attr(name) => return write!(f, "[{name}]"),
            Selector::AttrEq(name, value) => return write!(f, "[{name}=\"{value}\"]"),
            Selector::All(parts) => {
                // Tags have to lead a compound selector.
                let mut sorted = parts.iter().collect::<Vec<&Selector>>();
                sorted.sort_by_key(|e| return !matches!(e, Selector::Tag(_)));
                for part in sorted {
                    write!(f, "{part}")?;
                }
                return Ok(());
            }
            Selector::Any(parts) => {
                let res = parts
                    .iter()
                    .map(|e| return e.to_string())
                    .collect::<Vec<String>>()
                    .join(", ");
                return write!(f, "{res}");
            }
        }
    }
}

/// Serializable description of a subtree, used to build synthetic documents and to
/// carry snapshots of a remote page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeSpec {
    Element {
        tag: String,
        #[serde(default)]
        attributes: BTreeMap<String, String>,
        #[serde(default)]
        children: Vec<NodeSpec>,
    },
    Text {
        text: String,
    },
}

impl NodeSpec {
    pub fn element(tag: &str) -> NodeSpec {
        return NodeSpec::Element {
            tag: tag.to_string(),
            attributes: BTreeMap::new(),
            children: vec![],
        };
    }

    pub fn text(text: &str) -> NodeSpec {
        return NodeSpec::Text {
            text: text.to_string(),
        };
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> NodeSpec {
        if let NodeSpec::Element { attributes, .. } = &mut self {
            attributes.insert(name.to_string(), value.to_string());
        }
        return self;
    }

    pub fn with_class(mut self, class: &str) -> NodeSpec {
        if let NodeSpec::Element { attributes, .. } = &mut self {
            let classes = attributes.entry("class".to_string()).or_default();
            if !classes.is_empty() {
                classes.push(' ');
            }
            classes.push_str(class);
        }
        return self;
    }

    pub fn with_child(mut self, child: NodeSpec) -> NodeSpec {
        if let NodeSpec::Element { children, .. } = &mut self {
            children.push(child);
        }
        return self;
    }

    pub fn with_text(self, text: &str) -> NodeSpec {
        return self.with_child(NodeSpec::text(text));
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        match self {
            NodeSpec::Element { attributes, .. } => {
                return attributes.get(name).map(|e| return e.as_str());
            }
            NodeSpec::Text { .. } => return None,
        }
    }
}

impl ElementLike for NodeSpec {
    fn tag(&self) -> &str {
        match self {
            NodeSpec::Element { tag, .. } => return tag,
            NodeSpec::Text { .. } => return "#text",
        }
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        return NodeSpec::attribute(self, name);
    }
}

/// One notification of structural insertions. `inserted` holds the roots of every
/// subtree added by a single host operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MutationBatch {
    pub inserted: Vec<NodeId>,
}

/// Read access to a host's live document, plus a subscription to structural changes.
pub trait Tree: Send + Sync {
    fn root(&self) -> NodeId;

    /// Every insertion batch from now on is delivered to the returned receiver until it
    /// is dropped.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<MutationBatch>;

    fn matches(&self, node: NodeId, selector: &Selector) -> Result<bool>;

    /// Descendants of `scope` (excluding `scope`) matching `selector`, in document order.
    fn query_all(&self, scope: NodeId, selector: &Selector) -> Result<Vec<NodeId>>;

    /// Nearest inclusive ancestor of `node` matching `selector`.
    fn closest(&self, node: NodeId, selector: &Selector) -> Result<Option<NodeId>>;

    fn attribute(&self, node: NodeId, name: &str) -> Result<Option<String>>;

    /// Rendered text, block level elements separated by line breaks.
    fn inner_text(&self, node: NodeId) -> Result<String>;

    fn text_content(&self, node: NodeId) -> Result<String>;

    fn query(&self, scope: NodeId, selector: &Selector) -> Result<Option<NodeId>> {
        return Ok(self.query_all(scope, selector)?.first().copied());
    }
}

pub type TreeRef = Arc<dyn Tree>;
