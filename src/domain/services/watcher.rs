#[cfg(test)]
#[path = "watcher_test.rs"]
mod tests;

use std::collections::HashSet;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::models::Event;
use crate::domain::models::NodeId;
use crate::domain::models::Selector;
use crate::domain::models::Tree;
use crate::domain::models::TreeRef;
use crate::domain::models::WatchKind;

/// Subscribes to insertion batches of a `Tree` and reports the inserted nodes (or their
/// descendants) matching each registered selector as `Event::Inserted`.
#[derive(Default)]
pub struct MutationWatcher {
    watches: Vec<(WatchKind, Selector)>,
    observers: Vec<JoinHandle<()>>,
}

impl MutationWatcher {
    pub fn on_inserted(mut self, kind: WatchKind, selector: Selector) -> MutationWatcher {
        self.watches.push((kind, selector));
        return self;
    }

    /// Starts one observer per registered watch. Any previous observers are dropped first.
    pub fn connect(&mut self, tree: TreeRef, tx: mpsc::UnboundedSender<Event>) {
        self.disconnect();

        for (kind, selector) in self.watches.iter().cloned() {
            // Subscribe before spawning so nothing inserted after connect is missed.
            let mut batches = tree.subscribe();
            let tree = tree.clone();
            let tx = tx.clone();

            self.observers.push(tokio::spawn(async move {
                while let Some(batch) = batches.recv().await {
                    let matched = MutationWatcher::matching(tree.as_ref(), &batch.inserted, &selector);
                    if matched.is_empty() {
                        continue;
                    }

                    tracing::trace!(?kind, count = matched.len(), "Observed insertions");
                    if tx.send(Event::Inserted(kind, matched)).is_err() {
                        return;
                    }
                }
            }));
        }
    }

    pub fn is_connected(&self) -> bool {
        return !self.observers.is_empty();
    }

    pub fn disconnect(&mut self) {
        for observer in self.observers.drain(..) {
            observer.abort();
        }
    }

    /// Every node in `inserted` or below it that matches `selector`, once, in batch order.
    pub fn matching(tree: &dyn Tree, inserted: &[NodeId], selector: &Selector) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut res = vec![];

        for node in inserted {
            if tree.matches(*node, selector).unwrap_or(false) && seen.insert(*node) {
                res.push(*node);
            }

            for descendant in tree.query_all(*node, selector).unwrap_or_default() {
                if seen.insert(descendant) {
                    res.push(descendant);
                }
            }
        }

        return res;
    }
}

impl Drop for MutationWatcher {
    fn drop(&mut self) {
        self.disconnect();
    }
}
