use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use anyhow::Result;
use serde_json::json;
use serde_json::Value;
use test_utils::assistant_container_fixture;
use test_utils::user_container_fixture;
use tokio::sync::mpsc;
use tokio::time;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::RelayAgent;
use crate::domain::models::AgentSettings;
use crate::domain::models::ConnectionState;
use crate::domain::models::Host;
use crate::domain::models::HostMarkup;
use crate::domain::models::HostName;
use crate::domain::models::NodeId;
use crate::domain::models::NodeSpec;
use crate::domain::models::Tree;
use crate::infrastructure::hosts::echo;
use crate::infrastructure::hosts::memory::Document;
use crate::infrastructure::hosts::memory::MemorySurface;
use crate::infrastructure::loopback::LoopbackConnector;
use crate::infrastructure::loopback::Peer;

struct Harness {
    agent: RelayAgent,
    peers: mpsc::UnboundedReceiver<Peer>,
}

fn harness(host: Host) -> Harness {
    let (connector, peers) = LoopbackConnector::new();
    let agent = RelayAgent::new(
        AgentSettings::default(),
        host,
        HostMarkup::default(),
        Box::new(connector),
    );
    return Harness { agent, peers };
}

/// A document with a composer whose submissions go nowhere.
fn silent_host(composer: NodeSpec) -> Result<(Host, Arc<Document>, Arc<MemorySurface>)> {
    let document = Arc::new(Document::default());
    document.append(document.root(), composer)?;
    let surface = Arc::new(MemorySurface::new(document.clone(), HostMarkup::default()));
    let host = Host::new(HostName::Echo, document.clone(), surface.clone());
    return Ok((host, document, surface));
}

async fn pump_once(agent: &mut RelayAgent) -> Result<()> {
    if let Some(event) = agent.next_event().await {
        agent.handle(event)?;
    }
    return Ok(());
}

async fn pump_for(agent: &mut RelayAgent, duration: Duration) -> Result<()> {
    let deadline = Instant::now() + duration;
    loop {
        tokio::select! {
            event = agent.next_event() => {
                if let Some(event) = event {
                    agent.handle(event)?;
                }
            }
            _ = time::sleep_until(deadline) => return Ok(()),
        }
    }
}

async fn pump_until_frame(agent: &mut RelayAgent, peer: &mut Peer, max: Duration) -> Result<Value> {
    let deadline = Instant::now() + max;
    loop {
        if let Some(frame) = peer.next_frame() {
            return Ok(frame);
        }

        tokio::select! {
            event = agent.next_event() => {
                if let Some(event) = event {
                    agent.handle(event)?;
                }
            }
            _ = time::sleep_until(deadline) => bail!("No frame was sent"),
        }
    }
}

async fn connect(harness: &mut Harness) -> Result<Peer> {
    harness.agent.start();
    let mut peer = harness.peers.try_recv()?;
    peer.open();
    pump_once(&mut harness.agent).await?;

    let startup = peer.next_frame();
    assert_eq!(startup.map(|e| return e["client_msg_id"].clone()), Some(json!("startup")));
    return Ok(peer);
}

fn prompt_frame(client_msg_id: &str, prompt: &str) -> String {
    return json!({"type": "prompt", "client_msg_id": client_msg_id, "prompt": prompt}).to_string();
}

fn assistant(key: &str, text: &str) -> NodeSpec {
    return NodeSpec::element("div")
        .with_attr("data-message-index", key)
        .with_child(
            NodeSpec::element("div")
                .with_class("anysphere-markdown-container-root")
                .with_child(NodeSpec::element("div").with_class("markdown-section").with_text(text)),
        );
}

fn editor(lines: &[&str]) -> NodeSpec {
    let mut view_lines = NodeSpec::element("div").with_class("view-lines");
    for line in lines {
        view_lines =
            view_lines.with_child(NodeSpec::element("div").with_class("view-line").with_text(line));
    }
    return NodeSpec::element("div")
        .with_class("monaco-editor")
        .with_child(view_lines);
}

fn code_block(panes: Vec<NodeSpec>) -> NodeSpec {
    let mut block = NodeSpec::element("div").with_class("composer-code-block-container");
    for pane in panes {
        block = block.with_child(pane);
    }
    return block;
}

fn code_block_of(document: &Document, container: NodeId) -> Result<NodeId> {
    let markup = HostMarkup::default();
    match document.query(container, &markup.code_container)? {
        Some(block) => return Ok(block),
        None => bail!("Container has no code block"),
    }
}

#[tokio::test(start_paused = true)]
async fn it_answers_prompts_with_the_finalized_response() -> Result<()> {
    let mut harness = harness(echo::build(HostMarkup::default())?);
    let mut peer = connect(&mut harness).await?;
    let agent = &mut harness.agent;

    peer.push(&prompt_frame("c1", "hello"));
    let start = Instant::now();
    let frame = pump_until_frame(agent, &mut peer, Duration::from_secs(10)).await?;

    // Settle delay, then one poll to record the content and one to confirm it.
    assert_eq!(start.elapsed(), Duration::from_millis(4500));
    assert_eq!(
        frame,
        json!({
            "type": "response",
            "session_id": "cursor-desktop-session",
            "client_msg_id": "c1",
            "text": "hello",
            "metadata": {
                "source_id": "echo-1",
                "source_index": "1",
                "timestamp": frame["metadata"]["timestamp"].clone(),
                "has_code_blocks": false,
                "code_blocks": []
            }
        })
    );

    assert!(agent.pending().is_empty());
    assert!(!agent.is_polling("1"));
    assert_eq!(agent.finalized().get("1").map(|e| return e.completed), Some(true));
    assert!(!agent.finalized().contains("0"));

    pump_for(agent, Duration::from_secs(200)).await?;
    assert_eq!(peer.next_frame(), None);
    return Ok(());
}

#[tokio::test(start_paused = true)]
async fn it_replies_to_pings() -> Result<()> {
    let mut harness = harness(echo::build(HostMarkup::default())?);
    let mut peer = connect(&mut harness).await?;

    peer.push(r#"{"type":"ping","ts":1234}"#);
    pump_once(&mut harness.agent).await?;
    assert_eq!(peer.next_frame(), Some(json!({"type": "pong", "ts": 1234})));

    peer.push("not json");
    peer.push(r#"{"type":"message","data":{"hello":"world"}}"#);
    peer.push(r#"{"type":"error","error":"Invalid JSON","details":"line 1"}"#);
    pump_for(&mut harness.agent, Duration::from_millis(10)).await?;
    assert_eq!(peer.next_frame(), None);
    return Ok(());
}

#[tokio::test(start_paused = true)]
async fn it_reports_injection_failures() -> Result<()> {
    let (host, _document, surface) = silent_host(
        NodeSpec::element("div")
            .with_class("aislash-editor-input")
            .with_attr("contenteditable", "true"),
    )?;
    let mut harness = harness(host);
    let mut peer = connect(&mut harness).await?;

    peer.push(&prompt_frame("c2", "hello"));
    let frame = pump_until_frame(&mut harness.agent, &mut peer, Duration::from_secs(10)).await?;
    assert_eq!(
        frame,
        json!({
            "type": "response",
            "session_id": "cursor-desktop-session",
            "client_msg_id": "c2",
            "text": "Error: Could not find submit control",
            "metadata": {"error": true}
        })
    );
    assert!(harness.agent.pending().is_empty());
    assert!(surface.state().submissions.is_empty());
    return Ok(());
}

#[tokio::test(start_paused = true)]
async fn it_times_out_unanswered_prompts() -> Result<()> {
    let (host, _document, surface) = silent_host(echo::composer())?;
    let mut harness = harness(host);
    let mut peer = connect(&mut harness).await?;

    peer.push(&prompt_frame("c3", "anyone there?"));
    let start = Instant::now();
    let frame = pump_until_frame(&mut harness.agent, &mut peer, Duration::from_secs(300)).await?;

    // The deadline starts once the prompt was submitted, after the settle delay.
    assert_eq!(start.elapsed(), Duration::from_millis(120500));
    assert_eq!(frame["client_msg_id"], "c3");
    assert_eq!(frame["text"], "Error: Response timeout");
    assert_eq!(frame["metadata"], json!({"error": true}));
    assert!(harness.agent.pending().is_empty());
    assert_eq!(surface.state().submissions, vec!["anyone there?".to_string()]);
    return Ok(());
}

#[tokio::test(start_paused = true)]
async fn it_ignores_duplicate_prompts() -> Result<()> {
    let (host, _document, surface) = silent_host(echo::composer())?;
    let mut harness = harness(host);
    let peer = connect(&mut harness).await?;

    peer.push(&prompt_frame("c4", "once"));
    peer.push(&prompt_frame("c4", "once"));
    pump_for(&mut harness.agent, Duration::from_secs(1)).await?;

    assert_eq!(harness.agent.pending().len(), 1);
    assert_eq!(surface.state().submissions.len(), 1);
    return Ok(());
}

#[tokio::test(start_paused = true)]
async fn it_records_existing_messages_without_relaying() -> Result<()> {
    let (host, document, _surface) = silent_host(echo::composer())?;
    for fixture in [user_container_fixture(), assistant_container_fixture()] {
        document.append(document.root(), serde_json::from_str::<NodeSpec>(fixture)?)?;
    }

    let mut harness = harness(host);
    let mut peer = connect(&mut harness).await?;
    let agent = &mut harness.agent;

    assert_eq!(agent.finalized().len(), 1);
    assert_eq!(agent.finalized().get("42").map(|e| return e.completed), Some(true));
    assert!(!agent.is_polling("42"));

    pump_for(agent, Duration::from_secs(10)).await?;
    assert_eq!(peer.next_frame(), None);
    return Ok(());
}

#[tokio::test(start_paused = true)]
async fn it_waits_for_code_blocks_to_render() -> Result<()> {
    let (host, document, _surface) = silent_host(echo::composer())?;
    let mut harness = harness(host);
    let mut peer = connect(&mut harness).await?;
    let agent = &mut harness.agent;

    let container = document.append(
        document.root(),
        assistant("42", "Hello").with_child(code_block(vec![editor(&[]), editor(&[])])),
    )?;

    pump_for(agent, Duration::from_millis(4100)).await?;
    assert!(agent.is_polling("42"));
    assert_eq!(peer.next_frame(), None);

    document.replace_children(
        code_block_of(&document, container)?,
        vec![editor(&["print(1)"]), editor(&["print(2)"])],
    )?;
    pump_for(agent, Duration::from_millis(2000)).await?;
    assert_eq!(peer.next_frame(), None);

    let frame = pump_until_frame(agent, &mut peer, Duration::from_secs(10)).await?;
    assert_eq!(frame["client_msg_id"], "42");
    assert_eq!(
        frame["text"],
        "Hello\n\n[CODE: untitled]\nprint(1)\n---\nprint(2)"
    );
    assert_eq!(
        frame["metadata"]["code_blocks"],
        json!([{"filename": "untitled", "code": "print(1)\n---\nprint(2)"}])
    );
    assert_eq!(frame["metadata"]["has_code_blocks"], true);
    return Ok(());
}

#[tokio::test(start_paused = true)]
async fn it_relays_again_when_code_renders_late() -> Result<()> {
    let (host, document, _surface) = silent_host(echo::composer())?;
    let mut harness = harness(host);
    let mut peer = connect(&mut harness).await?;
    let agent = &mut harness.agent;

    let container = document.append(document.root(), assistant("8", "Here you go"))?;
    let frame = pump_until_frame(agent, &mut peer, Duration::from_secs(10)).await?;
    assert_eq!(frame["metadata"]["has_code_blocks"], false);

    document.append(container, code_block(vec![editor(&["fn main() {}"])]))?;
    let frame = pump_until_frame(agent, &mut peer, Duration::from_secs(1)).await?;
    assert_eq!(frame["client_msg_id"], "8");
    assert_eq!(frame["metadata"]["code_blocks"][0]["code"], "fn main() {}");
    assert_eq!(agent.finalized().len(), 1);

    // Rendering the same content again is not relayed twice.
    document.replace_children(
        code_block_of(&document, container)?,
        vec![editor(&["fn main() {}"])],
    )?;
    pump_for(agent, Duration::from_secs(1)).await?;
    assert_eq!(peer.next_frame(), None);
    return Ok(());
}

#[tokio::test(start_paused = true)]
async fn it_does_not_resolve_prompts_with_user_messages() -> Result<()> {
    let (host, document, _surface) = silent_host(echo::composer())?;
    let mut harness = harness(host);
    let mut peer = connect(&mut harness).await?;
    let agent = &mut harness.agent;

    peer.push(&prompt_frame("c5", "hi"));
    pump_for(agent, Duration::from_millis(1000)).await?;

    let container = document.append(document.root(), assistant("5", "streaming"))?;
    pump_for(agent, Duration::from_millis(100)).await?;
    assert!(agent.is_polling("5"));

    document.append(
        container,
        NodeSpec::element("div").with_attr("contenteditable", "true"),
    )?;
    pump_for(agent, Duration::from_millis(5000)).await?;

    assert!(!agent.is_polling("5"));
    assert_eq!(
        agent.finalized().get("5").map(|e| return (e.completed, e.is_assistant)),
        Some((true, false))
    );
    assert!(agent.pending().contains("c5"));
    assert_eq!(peer.next_frame(), None);
    return Ok(());
}

#[tokio::test(start_paused = true)]
async fn it_hands_prompts_of_user_messages_to_the_next_reply() -> Result<()> {
    let (host, document, _surface) = silent_host(echo::composer())?;
    let mut harness = harness(host);
    let mut peer = connect(&mut harness).await?;
    let agent = &mut harness.agent;

    peer.push(&prompt_frame("c5", "hi"));
    pump_for(agent, Duration::from_millis(1000)).await?;

    let container = document.append(document.root(), assistant("5", "streaming"))?;
    pump_for(agent, Duration::from_millis(100)).await?;
    document.append(
        container,
        NodeSpec::element("div").with_attr("contenteditable", "true"),
    )?;
    pump_for(agent, Duration::from_millis(5000)).await?;
    assert_eq!(peer.next_frame(), None);
    assert_eq!(
        agent.pending().get("c5").map(|e| return e.claimed_by.clone()),
        Some(None)
    );

    document.append(document.root(), assistant("6", "the real answer"))?;
    let frame = pump_until_frame(agent, &mut peer, Duration::from_secs(10)).await?;
    assert_eq!(frame["client_msg_id"], "c5");
    assert_eq!(frame["text"], "the real answer");
    assert!(agent.pending().is_empty());

    pump_for(agent, Duration::from_secs(200)).await?;
    assert_eq!(peer.next_frame(), None);
    return Ok(());
}

#[tokio::test(start_paused = true)]
async fn it_reconnects_after_the_socket_closes() -> Result<()> {
    let mut harness = harness(echo::build(HostMarkup::default())?);
    let peer = connect(&mut harness).await?;

    peer.close();
    pump_once(&mut harness.agent).await?;
    assert_eq!(harness.agent.connection_state(), ConnectionState::Disconnected);

    pump_for(&mut harness.agent, Duration::from_millis(5001)).await?;
    let mut next = harness.peers.try_recv()?;
    assert_eq!(next.generation, peer.generation + 1);
    assert!(harness.peers.try_recv().is_err());

    next.open();
    pump_once(&mut harness.agent).await?;
    assert_eq!(next.next_frame().map(|e| return e["client_msg_id"].clone()), Some(json!("startup")));
    return Ok(());
}

#[tokio::test(start_paused = true)]
async fn it_tears_everything_down_on_stop() -> Result<()> {
    let (host, document, _surface) = silent_host(echo::composer())?;
    let mut harness = harness(host);
    let mut peer = connect(&mut harness).await?;

    document.append(document.root(), assistant("3", "partial"))?;
    peer.push(&prompt_frame("c6", "hi"));
    pump_for(&mut harness.agent, Duration::from_millis(100)).await?;
    assert!(harness.agent.is_polling("3"));
    assert_eq!(harness.agent.pending().len(), 1);

    harness.agent.stop();
    harness.agent.stop();
    assert!(!harness.agent.is_running());
    assert!(!harness.agent.is_polling("3"));
    assert!(harness.agent.pending().is_empty());
    assert_eq!(harness.agent.connection_state(), ConnectionState::Disconnected);

    peer.close();
    document.append(document.root(), assistant("4", "late"))?;
    pump_for(&mut harness.agent, Duration::from_secs(200)).await?;
    assert_eq!(peer.next_frame(), None);
    assert!(harness.peers.try_recv().is_err());
    assert!(!harness.agent.is_polling("4"));
    return Ok(());
}

#[tokio::test(start_paused = true)]
async fn it_replaces_the_previous_instance_on_restart() -> Result<()> {
    let mut harness = harness(echo::build(HostMarkup::default())?);
    let first = connect(&mut harness).await?;

    harness.agent.start();
    let second = harness.peers.try_recv()?;
    assert!(second.generation > first.generation);

    first.close();
    pump_for(&mut harness.agent, Duration::from_secs(10)).await?;
    assert!(harness.peers.try_recv().is_err());
    assert_eq!(harness.agent.connection_state(), ConnectionState::Connecting);
    return Ok(());
}

#[tokio::test(start_paused = true)]
async fn it_stops_when_cancelled() -> Result<()> {
    let mut harness = harness(echo::build(HostMarkup::default())?);
    let cancel = CancellationToken::new();
    cancel.cancel();

    harness.agent.run(cancel).await?;
    assert!(!harness.agent.is_running());
    assert!(harness.peers.try_recv().is_ok());
    assert_eq!(harness.agent.connection_state(), ConnectionState::Disconnected);
    return Ok(());
}
