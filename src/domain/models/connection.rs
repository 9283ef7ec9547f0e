use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::Event;

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// A live socket. Frames queued on `outbound` are written in order; dropping the sender
/// closes the socket.
pub struct Connection {
    pub outbound: mpsc::UnboundedSender<String>,
    pub task: Option<JoinHandle<()>>,
}

impl Connection {
    pub fn close(self) {
        // The writer observes the dropped sender and closes the socket gracefully.
        drop(self.outbound);
    }
}

pub trait Connector: Send + Sync {
    /// Starts connecting to `url`. Progress is reported on `events` as
    /// `SocketOpened`, `SocketFrame` and `SocketClosed`, all tagged with `generation`.
    fn open(&self, url: &str, generation: u64, events: mpsc::UnboundedSender<Event>) -> Connection;
}

pub type ConnectorBox = Box<dyn Connector>;
