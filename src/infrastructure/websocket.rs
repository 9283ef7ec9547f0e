#[cfg(test)]
#[path = "websocket_test.rs"]
mod tests;

use anyhow::Result;
use futures::SinkExt;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::domain::models::Connection;
use crate::domain::models::Connector;
use crate::domain::models::Event;

/// Text frame websocket connector. The socket lives in one task that forwards queued
/// frames and reports everything it reads.
#[derive(Default)]
pub struct WebSocketConnector {}

async fn run(
    url: &str,
    generation: u64,
    events: &mpsc::UnboundedSender<Event>,
    outbound: &mut mpsc::UnboundedReceiver<String>,
) -> Result<()> {
    let (stream, _) = connect_async(url).await?;
    let _ = events.send(Event::SocketOpened(generation));
    let (mut sink, mut stream) = stream.split();

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                match frame {
                    Some(text) => sink.send(WsMessage::Text(text)).await?,
                    None => {
                        sink.close().await?;
                        return Ok(());
                    }
                }
            }
            next = stream.next() => {
                match next {
                    Some(Ok(WsMessage::Text(text))) => {
                        let _ = events.send(Event::SocketFrame(generation, text));
                    }
                    Some(Ok(WsMessage::Binary(bytes))) => {
                        if let Ok(text) = String::from_utf8(bytes) {
                            let _ = events.send(Event::SocketFrame(generation, text));
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => return Ok(()),
                    Some(Ok(_)) => {}
                    Some(Err(err)) => return Err(err.into()),
                }
            }
        }
    }
}

impl Connector for WebSocketConnector {
    fn open(&self, url: &str, generation: u64, events: mpsc::UnboundedSender<Event>) -> Connection {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let url = url.to_string();

        let task = tokio::spawn(async move {
            if let Err(err) = run(&url, generation, &events, &mut rx).await {
                tracing::warn!(url, generation, err = %err, "Relay socket failed");
            }
            let _ = events.send(Event::SocketClosed(generation));
        });

        return Connection {
            outbound: tx,
            task: Some(task),
        };
    }
}
