//! Live log following over WebSocket.
//!
//! A follower first receives the job's log backlog, then every new line as
//! it is appended, and finally a `finished` frame carrying the terminal
//! status, after which the server closes the socket.

use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use super::api::SharedState;
use super::jobs::{JobEvent, JobStatus};

/// How often to send WebSocket Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long to wait for a Pong response before considering the connection dead.
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsFrame<'a> {
    Log { line: &'a str },
    Finished { status: JobStatus },
    NotFound,
}

impl WsFrame<'_> {
    pub fn to_message(&self) -> Option<Message> {
        match serde_json::to_string(self) {
            Ok(json) => Some(Message::Text(json.into())),
            Err(e) => {
                warn!(error = %e, "failed to encode WebSocket frame");
                None
            }
        }
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| follow_job(socket, state, job_id))
}

type Sender = SplitSink<WebSocket, Message>;

async fn send(sender: &mut Sender, frame: WsFrame<'_>) -> bool {
    match frame.to_message() {
        Some(msg) => sender.send(msg).await.is_ok(),
        None => true,
    }
}

async fn follow_job(socket: WebSocket, state: SharedState, job_id: String) {
    let (mut sender, mut receiver) = socket.split();

    let subscription = match Uuid::parse_str(&job_id) {
        Ok(id) => state
            .manager
            .store()
            .subscribe(id)
            .await
            .map(|sub| (id, sub)),
        Err(_) => None,
    };
    let Some((id, sub)) = subscription else {
        send(&mut sender, WsFrame::NotFound).await;
        let _ = sender.send(Message::Close(None)).await;
        return;
    };
    debug!(job_id = %id, backlog = sub.backlog.len(), "follower attached");

    for line in &sub.backlog {
        if !send(&mut sender, WsFrame::Log { line }).await {
            return;
        }
    }
    if let Some(status) = sub.finished {
        send(&mut sender, WsFrame::Finished { status }).await;
        let _ = sender.send(Message::Close(None)).await;
        return;
    }

    let mut events = sub.events;
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    // The first tick completes immediately.
    ping_interval.tick().await;

    let mut last_pong = Instant::now();
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            // ── Periodic ping ───────────────────────────────────────
            _ = ping_interval.tick() => {
                if awaiting_pong && last_pong.elapsed() > PONG_TIMEOUT {
                    break;
                }
                if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }

            // ── Job events ──────────────────────────────────────────
            result = events.recv() => {
                match result {
                    Ok(event) if event.job_id() != id => continue,
                    Ok(JobEvent::Log { line, .. }) => {
                        if !send(&mut sender, WsFrame::Log { line: &line }).await {
                            break;
                        }
                    }
                    Ok(JobEvent::Finished { status, .. }) => {
                        send(&mut sender, WsFrame::Finished { status }).await;
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(job_id = %id, skipped, "follower lagged; lines dropped");
                        // The finished event may have been among the skipped ones.
                        let status = state.manager.store().get(id).await.map(|r| r.status);
                        if let Some(status) = status.filter(|s| s.is_terminal()) {
                            send(&mut sender, WsFrame::Finished { status }).await;
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            // ── Client messages ─────────────────────────────────────
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                        awaiting_pong = false;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
    debug!(job_id = %id, "follower detached");
}
