use super::NodeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchKind {
    MessageContainer,
    CodeRenderer,
}

/// Everything the agent reacts to. Timers, sockets, injections and tree observers only
/// ever talk to the agent through these.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Inserted(WatchKind, Vec<NodeId>),
    CompletionPoll(String),
    SocketOpened(u64),
    SocketFrame(u64, String),
    SocketClosed(u64),
    ReconnectDue,
    PromptInjected(String),
    PromptInjectionFailed(String, String),
    PromptTimedOut(String),
}
