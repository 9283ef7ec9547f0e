use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;
use tokio::task::JoinHandle;

use super::SurfaceDriverBox;
use super::TreeRef;

#[derive(Clone, Debug, PartialEq, Eq, EnumIter, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum HostName {
    Chrome,
    Echo,
}

impl HostName {
    pub fn parse(text: String) -> Option<HostName> {
        return HostName::iter().find(|e| return e.to_string() == text);
    }
}

/// The application the agent is attached to: its document and its prompt surface.
pub struct Host {
    pub name: HostName,
    pub tree: TreeRef,
    pub surface: SurfaceDriverBox,
    tasks: Vec<JoinHandle<()>>,
}

impl Host {
    pub fn new(name: HostName, tree: TreeRef, surface: SurfaceDriverBox) -> Host {
        return Host {
            name,
            tree,
            surface,
            tasks: vec![],
        };
    }

    /// Keeps a background task (page mirroring, protocol handlers) alive for as long as
    /// the host is.
    pub fn with_task(mut self, task: JoinHandle<()>) -> Host {
        self.tasks.push(task);
        return self;
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        for task in self.tasks.iter() {
            task.abort();
        }
    }
}
