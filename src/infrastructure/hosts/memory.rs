#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::domain::models::ElementLike;
use crate::domain::models::HostMarkup;
use crate::domain::models::InputEdit;
use crate::domain::models::MutationBatch;
use crate::domain::models::NodeId;
use crate::domain::models::NodeSpec;
use crate::domain::models::Selector;
use crate::domain::models::TextSurfaceDriver;
use crate::domain::models::Tree;

const BLOCK_TAGS: [&str; 15] = [
    "div", "p", "section", "pre", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6",
    "tr", "blockquote",
];

enum NodeData {
    Element {
        tag: String,
        attributes: BTreeMap<String, String>,
    },
    Text(String),
}

struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl ElementLike for Node {
    fn tag(&self) -> &str {
        match &self.data {
            NodeData::Element { tag, .. } => return tag,
            NodeData::Text(_) => return "#text",
        }
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        match &self.data {
            NodeData::Element { attributes, .. } => {
                return attributes.get(name).map(|e| return e.as_str());
            }
            NodeData::Text(_) => return None,
        }
    }
}

/// Node slots. Slots of detached subtrees are freed and handed out again to later
/// insertions.
struct Arena {
    slots: Vec<Option<Node>>,
    free: Vec<NodeId>,
}

impl Arena {
    fn get(&self, id: NodeId) -> Result<&Node> {
        match self.slots.get(id) {
            Some(Some(node)) => return Ok(node),
            Some(None) => bail!(format!("Node {id} is detached")),
            None => bail!(format!("Node {id} does not exist")),
        }
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        match self.slots.get_mut(id) {
            Some(Some(node)) => return Ok(node),
            Some(None) => bail!(format!("Node {id} is detached")),
            None => bail!(format!("Node {id} does not exist")),
        }
    }

    fn children(&self, id: NodeId) -> Vec<NodeId> {
        return self
            .get(id)
            .map(|e| return e.children.clone())
            .unwrap_or_default();
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.slots[id] = Some(node);
            return id;
        }

        self.slots.push(Some(node));
        return self.slots.len() - 1;
    }

    fn build(&mut self, parent: NodeId, spec: NodeSpec) -> NodeId {
        match spec {
            NodeSpec::Element {
                tag,
                attributes,
                children,
            } => {
                let id = self.alloc(Node {
                    data: NodeData::Element { tag, attributes },
                    parent: Some(parent),
                    children: vec![],
                });
                let child_ids = children
                    .into_iter()
                    .map(|child| return self.build(id, child))
                    .collect::<Vec<NodeId>>();
                if let Some(Some(node)) = self.slots.get_mut(id) {
                    node.children = child_ids;
                }
                return id;
            }
            NodeSpec::Text { text } => {
                return self.alloc(Node {
                    data: NodeData::Text(text),
                    parent: Some(parent),
                    children: vec![],
                });
            }
        }
    }

    fn detach(&mut self, id: NodeId) {
        let node = match self.slots.get_mut(id).and_then(|e| return e.take()) {
            Some(node) => node,
            None => return,
        };

        self.free.push(id);
        for child in node.children {
            self.detach(child);
        }
    }

    fn descendants(&self, id: NodeId, res: &mut Vec<NodeId>) {
        for child in self.children(id) {
            res.push(child);
            self.descendants(child, res);
        }
    }

    fn render_text(&self, id: NodeId, res: &mut String) {
        let node = match self.get(id) {
            Ok(node) => node,
            Err(_) => return,
        };
        let tag = match &node.data {
            NodeData::Text(text) => {
                res.push_str(text);
                return;
            }
            NodeData::Element { tag, .. } => tag.to_lowercase(),
        };

        if tag == "br" {
            res.push('\n');
            return;
        }

        let block = BLOCK_TAGS.contains(&tag.as_str());
        if block && !res.is_empty() && !res.ends_with('\n') {
            res.push('\n');
        }
        for child in node.children.iter() {
            self.render_text(*child, res);
        }
        if block && !res.is_empty() && !res.ends_with('\n') {
            res.push('\n');
        }
    }

    fn collect_text(&self, id: NodeId, res: &mut String) {
        let node = match self.get(id) {
            Ok(node) => node,
            Err(_) => return,
        };
        if let NodeData::Text(text) = &node.data {
            res.push_str(text);
        }
        for child in node.children.iter() {
            self.collect_text(*child, res);
        }
    }
}

/// Arena backed document implementing `Tree`. Access to a detached node is an error
/// until its slot is taken by a later insertion.
pub struct Document {
    nodes: RwLock<Arena>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<MutationBatch>>>,
}

impl Default for Document {
    fn default() -> Document {
        let root = Node {
            data: NodeData::Element {
                tag: "body".to_string(),
                attributes: BTreeMap::new(),
            },
            parent: None,
            children: vec![],
        };

        return Document {
            nodes: RwLock::new(Arena {
                slots: vec![Some(root)],
                free: vec![],
            }),
            subscribers: Mutex::new(vec![]),
        };
    }
}

impl Document {
    fn notify(&self, inserted: Vec<NodeId>) {
        if inserted.is_empty() {
            return;
        }

        let batch = MutationBatch { inserted };
        self.subscribers
            .lock()
            .retain(|tx| return tx.send(batch.clone()).is_ok());
    }

    pub fn append(&self, parent: NodeId, spec: NodeSpec) -> Result<NodeId> {
        let ids = self.append_many(parent, vec![spec])?;
        match ids.first() {
            Some(id) => return Ok(*id),
            None => bail!("Nothing was appended"),
        }
    }

    /// Appends every subtree under `parent`, reported to subscribers as one batch.
    pub fn append_many(&self, parent: NodeId, specs: Vec<NodeSpec>) -> Result<Vec<NodeId>> {
        let ids = {
            let mut nodes = self.nodes.write();
            nodes.get(parent)?;

            let ids = specs
                .into_iter()
                .map(|spec| return nodes.build(parent, spec))
                .collect::<Vec<NodeId>>();
            nodes.get_mut(parent)?.children.extend(ids.iter().copied());
            ids
        };

        self.notify(ids.clone());
        return Ok(ids);
    }

    /// Swaps all children of `node` for freshly built subtrees.
    pub fn replace_children(&self, node: NodeId, specs: Vec<NodeSpec>) -> Result<Vec<NodeId>> {
        {
            let mut nodes = self.nodes.write();
            let children = std::mem::take(&mut nodes.get_mut(node)?.children);
            for child in children {
                nodes.detach(child);
            }
        }

        return self.append_many(node, specs);
    }

    pub fn remove(&self, node: NodeId) -> Result<()> {
        let mut nodes = self.nodes.write();
        let parent = match nodes.get(node)?.parent {
            Some(parent) => parent,
            None => bail!("The document root cannot be removed"),
        };
        nodes.get_mut(parent)?.children.retain(|e| return *e != node);
        nodes.detach(node);

        return Ok(());
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<()> {
        let mut nodes = self.nodes.write();
        match &mut nodes.get_mut(node)?.data {
            NodeData::Element { attributes, .. } => {
                attributes.insert(name.to_string(), value.to_string());
            }
            NodeData::Text(_) => bail!(format!("Node {node} is a text node")),
        }

        return Ok(());
    }

    /// First attached node carrying `name="value"`, in document order.
    pub fn find_by_attribute(&self, name: &str, value: &str) -> Option<NodeId> {
        let nodes = self.nodes.read();
        let mut all = vec![self.root()];
        nodes.descendants(self.root(), &mut all);
        return all
            .into_iter()
            .find(|id| {
                return nodes
                    .get(*id)
                    .map(|e| return e.attribute(name) == Some(value))
                    .unwrap_or(false);
            });
    }

    /// Number of attached nodes, the root included.
    pub fn node_count(&self) -> usize {
        let nodes = self.nodes.read();
        return nodes.slots.len() - nodes.free.len();
    }

    /// Number of slots the arena holds, attached or free.
    pub fn capacity(&self) -> usize {
        return self.nodes.read().slots.len();
    }
}

impl Tree for Document {
    fn root(&self) -> NodeId {
        return 0;
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<MutationBatch> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        return rx;
    }

    fn matches(&self, node: NodeId, selector: &Selector) -> Result<bool> {
        let nodes = self.nodes.read();
        let node = nodes.get(node)?;
        if let NodeData::Text(_) = node.data {
            return Ok(false);
        }

        return Ok(selector.matches(node));
    }

    fn query_all(&self, scope: NodeId, selector: &Selector) -> Result<Vec<NodeId>> {
        let nodes = self.nodes.read();
        nodes.get(scope)?;

        let mut all = vec![];
        nodes.descendants(scope, &mut all);
        let res = all
            .into_iter()
            .filter(|id| {
                return match nodes.get(*id) {
                    Ok(node) => {
                        matches!(node.data, NodeData::Element { .. }) && selector.matches(node)
                    }
                    Err(_) => false,
                };
            })
            .collect::<Vec<NodeId>>();

        return Ok(res);
    }

    fn closest(&self, node: NodeId, selector: &Selector) -> Result<Option<NodeId>> {
        let nodes = self.nodes.read();
        nodes.get(node)?;

        let mut current = Some(node);
        while let Some(id) = current {
            let candidate = nodes.get(id)?;
            if matches!(candidate.data, NodeData::Element { .. }) && selector.matches(candidate) {
                return Ok(Some(id));
            }
            current = candidate.parent;
        }

        return Ok(None);
    }

    fn attribute(&self, node: NodeId, name: &str) -> Result<Option<String>> {
        let nodes = self.nodes.read();
        let node = nodes.get(node)?;
        return Ok(node.attribute(name).map(|e| return e.to_string()));
    }

    fn inner_text(&self, node: NodeId) -> Result<String> {
        let nodes = self.nodes.read();
        nodes.get(node)?;

        let mut res = String::new();
        nodes.render_text(node, &mut res);
        return Ok(res.trim_matches('\n').to_string());
    }

    fn text_content(&self, node: NodeId) -> Result<String> {
        let nodes = self.nodes.read();
        nodes.get(node)?;

        let mut res = String::new();
        nodes.collect_text(node, &mut res);
        return Ok(res);
    }
}

pub type SubmitHook = Box<dyn Fn(&Document, &str) -> Result<()> + Send + Sync>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SurfaceState {
    pub focused: bool,
    pub selected: bool,
    pub content: String,
    pub edits: Vec<InputEdit>,
    pub submissions: Vec<String>,
}

/// Prompt surface over a `Document`. Edits are applied to the prompt input node the way
/// the host's editor would apply them.
pub struct MemorySurface {
    document: Arc<Document>,
    markup: HostMarkup,
    state: Mutex<SurfaceState>,
    on_submit: Option<SubmitHook>,
}

impl MemorySurface {
    pub fn new(document: Arc<Document>, markup: HostMarkup) -> MemorySurface {
        return MemorySurface {
            document,
            markup,
            state: Mutex::new(SurfaceState::default()),
            on_submit: None,
        };
    }

    pub fn with_submit_hook(mut self, hook: SubmitHook) -> MemorySurface {
        self.on_submit = Some(hook);
        return self;
    }

    pub fn state(&self) -> SurfaceState {
        return self.state.lock().clone();
    }

    fn input(&self) -> Result<NodeId> {
        let root = self.document.root();
        if let Some(input) = self.document.query(root, &self.markup.prompt_input)? {
            return Ok(input);
        }

        bail!("Could not find prompt input surface");
    }
}

#[async_trait]
impl TextSurfaceDriver for MemorySurface {
    #[allow(clippy::implicit_return)]
    async fn focus(&self) -> Result<()> {
        self.input()?;
        self.state.lock().focused = true;
        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn select_all(&self) -> Result<()> {
        self.input()?;
        self.state.lock().selected = true;
        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn dispatch_edit(&self, edit: InputEdit) -> Result<()> {
        let input = self.input()?;
        let content = {
            let mut state = self.state.lock();
            if !state.focused {
                bail!("Prompt input surface is not focused");
            }

            match &edit {
                InputEdit::DeleteContent => {
                    if state.selected {
                        state.content.clear();
                        state.selected = false;
                    }
                }
                InputEdit::InsertText(text) => {
                    if state.selected {
                        state.content.clear();
                        state.selected = false;
                    }
                    state.content.push_str(text);
                }
            }
            state.edits.push(edit);
            state.content.to_string()
        };

        self.document
            .replace_children(input, vec![NodeSpec::text(&content)])?;
        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn submit(&self) -> Result<()> {
        let root = self.document.root();
        if self
            .document
            .query(root, &self.markup.submit_control)?
            .is_none()
        {
            bail!("Could not find submit control");
        }

        let input = self.input()?;
        let content = {
            let mut state = self.state.lock();
            let content = std::mem::take(&mut state.content);
            state.submissions.push(content.to_string());
            content
        };
        self.document.replace_children(input, vec![])?;

        if let Some(hook) = &self.on_submit {
            hook(self.document.as_ref(), content.as_str())?;
        }

        return Ok(());
    }
}
