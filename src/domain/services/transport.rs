#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;

use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;

use crate::domain::models::AgentSettings;
use crate::domain::models::Connection;
use crate::domain::models::ConnectionState;
use crate::domain::models::ConnectorBox;
use crate::domain::models::Event;
use crate::domain::models::Inbound;
use crate::domain::models::Message;
use crate::domain::models::Outbound;
use crate::domain::models::ResponseEnvelope;

pub const STARTUP_ID: &str = "startup";

/// Owns the single socket to the relay server. Every connection attempt gets a new
/// generation and events of older generations are ignored, so closing a socket on purpose
/// never schedules a reconnect.
pub struct RelayTransport {
    url: String,
    session_id: String,
    enabled: bool,
    reconnect_delay: Duration,
    connector: ConnectorBox,
    tx: mpsc::UnboundedSender<Event>,
    state: ConnectionState,
    generation: u64,
    connection: Option<Connection>,
    reconnect: Option<JoinHandle<()>>,
}

impl RelayTransport {
    pub fn new(
        settings: &AgentSettings,
        connector: ConnectorBox,
        tx: mpsc::UnboundedSender<Event>,
    ) -> RelayTransport {
        return RelayTransport {
            url: settings.server_url.to_string(),
            session_id: settings.session_id.to_string(),
            enabled: settings.enabled,
            reconnect_delay: settings.reconnect_delay,
            connector,
            tx,
            state: ConnectionState::Disconnected,
            generation: 0,
            connection: None,
            reconnect: None,
        };
    }

    pub fn endpoint(&self) -> String {
        return format!("{}/ws/{}", self.url.trim_end_matches('/'), self.session_id);
    }

    pub fn session_id(&self) -> &str {
        return &self.session_id;
    }

    pub fn state(&self) -> ConnectionState {
        return self.state;
    }

    pub fn generation(&self) -> u64 {
        return self.generation;
    }

    pub fn is_reconnect_scheduled(&self) -> bool {
        return self
            .reconnect
            .as_ref()
            .map(|e| return !e.is_finished())
            .unwrap_or(false);
    }

    fn drop_connection(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
    }

    pub fn connect(&mut self) {
        if !self.enabled {
            tracing::debug!("Relay is disabled, not connecting");
            return;
        }

        self.drop_connection();
        self.generation += 1;
        self.state = ConnectionState::Connecting;

        let url = self.endpoint();
        tracing::info!(url, generation = self.generation, "Connecting to relay server");
        self.connection = Some(self.connector.open(&url, self.generation, self.tx.clone()));
    }

    pub fn handle_opened(&mut self, generation: u64) -> Result<()> {
        if generation != self.generation {
            return Ok(());
        }

        self.state = ConnectionState::Connected;
        tracing::info!(generation, "Connected to relay server");

        let mut notice = Message::new(STARTUP_ID, "Cursor relay connected");
        notice.id = Some(STARTUP_ID.to_string());
        let envelope = ResponseEnvelope::from_message(&self.session_id, STARTUP_ID, &notice);
        self.send(&Outbound::Response(envelope))?;

        return Ok(());
    }

    pub fn handle_closed(&mut self, generation: u64) {
        if generation != self.generation {
            return;
        }

        tracing::warn!(generation, "Relay connection closed");
        self.state = ConnectionState::Disconnected;
        self.drop_connection();
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        if !self.enabled || self.is_reconnect_scheduled() {
            return;
        }

        let tx = self.tx.clone();
        let delay = self.reconnect_delay;
        tracing::info!(delay_ms = delay.as_millis() as u64, "Scheduling reconnect");
        self.reconnect = Some(tokio::spawn(async move {
            time::sleep(delay).await;
            let _ = tx.send(Event::ReconnectDue);
        }));
    }

    pub fn handle_reconnect_due(&mut self) {
        self.reconnect = None;
        if self.state == ConnectionState::Disconnected {
            self.connect();
        }
    }

    /// Writes `frame` when connected. Nothing is buffered, `false` means the frame was
    /// dropped.
    pub fn send(&mut self, frame: &Outbound) -> Result<bool> {
        if self.state != ConnectionState::Connected {
            tracing::debug!(state = %self.state, "Not connected, dropping frame");
            return Ok(false);
        }

        let text = serde_json::to_string(frame)?;
        if let Some(connection) = &self.connection {
            if connection.outbound.send(text).is_ok() {
                return Ok(true);
            }
        }

        tracing::warn!("Relay writer is gone, dropping frame");
        return Ok(false);
    }

    /// Parses a frame of the current connection. Frames of superseded connections,
    /// malformed JSON and unknown frame types are dropped.
    pub fn parse(&self, generation: u64, text: &str) -> Option<Inbound> {
        if generation != self.generation {
            return None;
        }

        match serde_json::from_str::<Inbound>(text) {
            Ok(inbound) => return Some(inbound),
            Err(err) => {
                tracing::warn!(err = %err, "Ignoring unreadable frame from relay server");
                return None;
            }
        }
    }

    /// Closes the socket without reconnecting and cancels any pending reconnect.
    pub fn shutdown(&mut self) {
        self.generation += 1;
        if let Some(reconnect) = self.reconnect.take() {
            reconnect.abort();
        }
        self.drop_connection();
        self.state = ConnectionState::Disconnected;
    }
}

impl Drop for RelayTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}
