use serde_json::Value;
use tokio::sync::mpsc;

use crate::domain::models::Connection;
use crate::domain::models::Connector;
use crate::domain::models::Event;

/// The far end of one connection opened through `LoopbackConnector`.
pub struct Peer {
    pub url: String,
    pub generation: u64,
    pub frames: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<Event>,
}

impl Peer {
    pub fn open(&self) {
        let _ = self.events.send(Event::SocketOpened(self.generation));
    }

    pub fn push(&self, frame: &str) {
        let _ = self
            .events
            .send(Event::SocketFrame(self.generation, frame.to_string()));
    }

    pub fn close(&self) {
        let _ = self.events.send(Event::SocketClosed(self.generation));
    }

    /// Next frame written by the agent, parsed as JSON.
    pub fn next_frame(&mut self) -> Option<Value> {
        let text = self.frames.try_recv().ok()?;
        return serde_json::from_str(&text).ok();
    }
}

/// In-process connector handing every opened connection to the receiver returned by
/// `new`.
pub struct LoopbackConnector {
    peers: mpsc::UnboundedSender<Peer>,
}

impl LoopbackConnector {
    pub fn new() -> (LoopbackConnector, mpsc::UnboundedReceiver<Peer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        return (LoopbackConnector { peers: tx }, rx);
    }
}

impl Connector for LoopbackConnector {
    fn open(&self, url: &str, generation: u64, events: mpsc::UnboundedSender<Event>) -> Connection {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = self.peers.send(Peer {
            url: url.to_string(),
            generation,
            frames: rx,
            events,
        });

        return Connection {
            outbound: tx,
            task: None,
        };
    }
}
