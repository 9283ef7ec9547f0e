#[cfg(test)]
#[path = "agent_test.rs"]
mod tests;

use std::collections::HashMap;
use std::collections::HashSet;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use super::CompletionDetector;
use super::FinalizedMessages;
use super::MessageExtractor;
use super::MutationWatcher;
use super::PendingPrompts;
use super::PollOutcome;
use super::PromptInjector;
use super::RelayTransport;
use crate::domain::models::AgentSettings;
use crate::domain::models::ConnectionState;
use crate::domain::models::ConnectorBox;
use crate::domain::models::Event;
use crate::domain::models::Host;
use crate::domain::models::HostMarkup;
use crate::domain::models::Inbound;
use crate::domain::models::Message;
use crate::domain::models::NodeId;
use crate::domain::models::Outbound;
use crate::domain::models::PendingPrompt;
use crate::domain::models::ResponseEnvelope;
use crate::domain::models::WatchKind;

pub const TIMEOUT_REASON: &str = "Response timeout";

/// Owns every piece of coordination state and processes events one at a time, so nothing
/// here needs locking. `start` and `stop` bound the lifetime of watchers, timers and the
/// socket.
pub struct RelayAgent {
    settings: AgentSettings,
    host: Host,
    extractor: MessageExtractor,
    injector: PromptInjector,
    detector: CompletionDetector,
    watcher: MutationWatcher,
    transport: RelayTransport,
    pending: PendingPrompts,
    finalized: FinalizedMessages,
    /// Every sequence key observed, assistant or not.
    seen: HashSet<String>,
    containers: HashMap<String, NodeId>,
    /// Client message id each finalized key was sent under.
    replies: HashMap<String, String>,
    injections: Vec<JoinHandle<()>>,
    running: bool,
    tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl RelayAgent {
    pub fn new(
        settings: AgentSettings,
        host: Host,
        markup: HostMarkup,
        connector: ConnectorBox,
    ) -> RelayAgent {
        let (tx, rx) = mpsc::unbounded_channel::<Event>();

        let watcher = MutationWatcher::default()
            .on_inserted(WatchKind::MessageContainer, markup.container.clone())
            .on_inserted(WatchKind::CodeRenderer, markup.code_renderer.clone());
        let detector = CompletionDetector::new(
            settings.poll_interval,
            settings.stability_threshold,
            tx.clone(),
        );
        let transport = RelayTransport::new(&settings, connector, tx.clone());
        let injector = PromptInjector::new(host.surface.clone(), settings.settle_delay);

        return RelayAgent {
            settings,
            host,
            extractor: MessageExtractor::new(markup),
            injector,
            detector,
            watcher,
            transport,
            pending: PendingPrompts::default(),
            finalized: FinalizedMessages::default(),
            seen: HashSet::new(),
            containers: HashMap::new(),
            replies: HashMap::new(),
            injections: vec![],
            running: false,
            tx,
            rx,
        };
    }

    pub fn is_running(&self) -> bool {
        return self.running;
    }

    pub fn finalized(&self) -> &FinalizedMessages {
        return &self.finalized;
    }

    pub fn pending(&self) -> &PendingPrompts {
        return &self.pending;
    }

    pub fn is_polling(&self, key: &str) -> bool {
        return self.detector.is_tracking(key);
    }

    pub fn connection_state(&self) -> ConnectionState {
        return self.transport.state();
    }

    /// Tears down anything a previous start left behind, records the containers already on
    /// the page and connects to the relay server.
    pub fn start(&mut self) {
        self.stop();
        self.seen.clear();
        self.containers.clear();
        self.replies.clear();
        self.finalized = FinalizedMessages::default();
        self.running = true;

        self.watcher.connect(self.host.tree.clone(), self.tx.clone());
        self.initial_scan();

        tracing::info!(
            host = %self.host.name,
            session_id = self.transport.session_id(),
            enabled = self.settings.enabled,
            "Relay agent started"
        );
        self.transport.connect();
    }

    /// Disconnects the watchers, closes the socket without reconnecting and drops every
    /// timer and pending prompt. Safe to call at any time.
    pub fn stop(&mut self) {
        self.watcher.disconnect();
        self.transport.shutdown();
        self.detector.clear();
        self.pending.clear();
        for injection in self.injections.drain(..) {
            injection.abort();
        }

        if self.running {
            tracing::info!("Relay agent stopped");
        }
        self.running = false;
    }

    fn initial_scan(&mut self) {
        let tree = self.host.tree.clone();
        let containers = match tree.query_all(tree.root(), &self.extractor.markup().container) {
            Ok(containers) => containers,
            Err(err) => {
                tracing::warn!(err = ?err, "Failed to scan for existing containers");
                return;
            }
        };

        let total = containers.len();
        for node in containers {
            let key = match self.extractor.sequence_key(tree.as_ref(), node) {
                Some(key) => key,
                None => continue,
            };
            self.seen.insert(key.to_string());
            self.containers.insert(key, node);

            let mut message = self.extractor.extract(tree.as_ref(), node);
            if message.is_assistant {
                message.completed = true;
                self.finalized.upsert(message);
            }
        }

        tracing::info!(
            assistant = self.finalized.len(),
            total,
            "Found existing messages"
        );
    }

    pub async fn next_event(&mut self) -> Option<Event> {
        return self.rx.recv().await;
    }

    /// Runs until `cancel` fires, then tears everything down.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        self.start();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = self.rx.recv() => {
                    match event {
                        Some(event) => {
                            if let Err(err) = self.handle(event) {
                                tracing::warn!(err = ?err, "Failed to handle event");
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        self.stop();
        return Ok(());
    }

    pub fn handle(&mut self, event: Event) -> Result<()> {
        if !self.running {
            return Ok(());
        }

        match event {
            Event::Inserted(WatchKind::MessageContainer, nodes) => self.on_containers(nodes),
            Event::Inserted(WatchKind::CodeRenderer, nodes) => self.on_code_renderers(nodes)?,
            Event::CompletionPoll(key) => self.on_poll(&key)?,
            Event::SocketOpened(generation) => self.transport.handle_opened(generation)?,
            Event::SocketFrame(generation, text) => {
                if let Some(inbound) = self.transport.parse(generation, &text) {
                    self.on_inbound(inbound)?;
                }
            }
            Event::SocketClosed(generation) => self.transport.handle_closed(generation),
            Event::ReconnectDue => self.transport.handle_reconnect_due(),
            Event::PromptInjected(client_msg_id) => self.on_injected(&client_msg_id),
            Event::PromptInjectionFailed(client_msg_id, reason) => {
                self.fail_prompt(&client_msg_id, &reason)?;
            }
            Event::PromptTimedOut(client_msg_id) => {
                self.fail_prompt(&client_msg_id, TIMEOUT_REASON)?;
            }
        }

        return Ok(());
    }

    fn on_containers(&mut self, nodes: Vec<NodeId>) {
        let tree = self.host.tree.clone();

        for node in nodes {
            let key = match self.extractor.sequence_key(tree.as_ref(), node) {
                Some(key) => key,
                None => continue,
            };

            // Re-rendered containers replace the node polling reads from.
            self.containers.insert(key.to_string(), node);
            if !self.seen.insert(key.to_string()) {
                continue;
            }

            if !self.extractor.is_assistant(tree.as_ref(), node) {
                tracing::debug!(key, "Skipping non-assistant container");
                continue;
            }

            if let Some(client_msg_id) = self.pending.claim_oldest_unclaimed(&key) {
                tracing::debug!(key, client_msg_id, "Container claimed pending prompt");
            }

            tracing::info!(key, "Watching assistant message");
            self.detector.track(&key);
        }
    }

    fn on_poll(&mut self, key: &str) -> Result<()> {
        let node = match self.containers.get(key) {
            Some(node) => *node,
            None => {
                self.detector.untrack(key);
                return Ok(());
            }
        };

        let tree = self.host.tree.clone();
        let message = self.extractor.extract(tree.as_ref(), node);
        let code_containers = self.extractor.code_container_count(tree.as_ref(), node);

        if self.detector.observe(key, &message, code_containers) == PollOutcome::Settled {
            self.finalize(message)?;
        }

        return Ok(());
    }

    fn finalize(&mut self, mut message: Message) -> Result<()> {
        message.completed = true;
        let key = message.sequence_key.to_string();

        if !message.is_assistant {
            let released = self.pending.release(&key);
            tracing::debug!(
                key,
                released,
                "Completed message is not from the assistant, not relaying"
            );
            self.finalized.upsert(message);
            return Ok(());
        }

        let client_msg_id = match self.pending.take_for_message(&key) {
            Some(prompt) => {
                tracing::info!(
                    key,
                    client_msg_id = prompt.client_msg_id,
                    elapsed_ms = prompt.start_time.elapsed().as_millis() as u64,
                    "Resolved pending prompt"
                );
                prompt.client_msg_id.to_string()
            }
            None => key.to_string(),
        };

        tracing::info!(
            key,
            client_msg_id,
            code_blocks = message.code_blocks.len(),
            "Message finalized"
        );
        self.relay(message, &client_msg_id)?;

        return Ok(());
    }

    fn relay(&mut self, message: Message, client_msg_id: &str) -> Result<()> {
        let key = message.sequence_key.to_string();
        let envelope =
            ResponseEnvelope::from_message(self.transport.session_id(), client_msg_id, &message);

        self.replies.insert(key.to_string(), client_msg_id.to_string());
        self.finalized.upsert(message);
        if !self.transport.send(&Outbound::Response(envelope))? {
            tracing::debug!(key, "Not connected, message was not relayed");
        }

        return Ok(());
    }

    fn on_code_renderers(&mut self, nodes: Vec<NodeId>) -> Result<()> {
        let tree = self.host.tree.clone();

        let mut containers = vec![];
        for node in nodes {
            if let Some(container) = self.extractor.container_of(tree.as_ref(), node) {
                if !containers.contains(&container) {
                    containers.push(container);
                }
            }
        }

        for container in containers {
            let key = match self.extractor.sequence_key(tree.as_ref(), container) {
                Some(key) => key,
                None => continue,
            };
            if self.detector.is_tracking(&key) {
                continue;
            }

            let previous = match self.finalized.get(&key) {
                Some(previous) => previous,
                None => continue,
            };

            let mut message = self.extractor.extract(tree.as_ref(), container);
            message.completed = true;
            if message.same_content(previous) {
                continue;
            }

            if !message.is_assistant {
                self.finalized.upsert(message);
                continue;
            }

            let client_msg_id = self
                .replies
                .get(&key)
                .cloned()
                .unwrap_or_else(|| return key.to_string());
            tracing::info!(key, client_msg_id, "Code rendered after finalization, relaying again");
            self.relay(message, &client_msg_id)?;
        }

        return Ok(());
    }

    fn on_inbound(&mut self, inbound: Inbound) -> Result<()> {
        match inbound {
            Inbound::Prompt {
                client_msg_id,
                prompt,
            } => self.on_prompt(client_msg_id, prompt),
            Inbound::Ping { ts } => {
                self.transport.send(&Outbound::Pong { ts })?;
            }
            Inbound::Message { data } => {
                tracing::info!(data = %data, "Message from relay server");
            }
            Inbound::Error { error, details } => {
                tracing::warn!(error = ?error, details = ?details, "Error from relay server");
            }
        }

        return Ok(());
    }

    fn on_prompt(&mut self, client_msg_id: String, prompt: String) {
        if self.pending.contains(&client_msg_id) {
            tracing::warn!(client_msg_id, "Prompt is already pending, ignoring duplicate");
            return;
        }

        tracing::info!(client_msg_id, prompt, "Received prompt");

        self.pending.register(PendingPrompt::new(
            &client_msg_id,
            &prompt,
            self.settings.prompt_timeout,
        ));

        self.injections.retain(|e| return !e.is_finished());
        let injector = self.injector.clone();
        let tx = self.tx.clone();
        self.injections.push(tokio::spawn(async move {
            let event = match injector.inject(&prompt).await {
                Ok(()) => Event::PromptInjected(client_msg_id),
                Err(err) => Event::PromptInjectionFailed(client_msg_id, err.to_string()),
            };
            let _ = tx.send(event);
        }));
    }

    /// The response deadline runs from the moment the host accepted the prompt.
    fn on_injected(&mut self, client_msg_id: &str) {
        let timeout = self.settings.prompt_timeout;
        let prompt = match self.pending.get_mut(client_msg_id) {
            Some(prompt) => prompt,
            None => return,
        };

        let tx = self.tx.clone();
        let timer_id = client_msg_id.to_string();
        prompt.arm(
            timeout,
            tokio::spawn(async move {
                time::sleep(timeout).await;
                let _ = tx.send(Event::PromptTimedOut(timer_id));
            }),
        );

        tracing::info!(
            client_msg_id,
            timeout_ms = timeout.as_millis() as u64,
            "Prompt submitted to host"
        );
    }

    /// Answers a prompt that is still pending with an error envelope.
    fn fail_prompt(&mut self, client_msg_id: &str, reason: &str) -> Result<()> {
        let prompt = match self.pending.take(client_msg_id) {
            Some(prompt) => prompt,
            None => return Ok(()),
        };

        tracing::warn!(
            client_msg_id,
            reason,
            prompt = prompt.prompt_text,
            overdue = time::Instant::now() >= prompt.timeout_at,
            "Prompt failed"
        );
        let envelope = ResponseEnvelope::error(self.transport.session_id(), client_msg_id, reason);
        self.transport.send(&Outbound::Response(envelope))?;

        return Ok(());
    }
}

impl Drop for RelayAgent {
    fn drop(&mut self) {
        self.stop();
    }
}
