use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use painter::{Phase, Progress};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::api::{AppState, Painter};
use crate::protocol::FromPage;

/// The in-page shim's connection: calls go out, replies, intercepted
/// requests and focus changes come back.
pub async fn handle_page_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Channel for calls headed to the page
    let (tx, mut rx) = mpsc::channel::<String>(256);
    let generation = state.painter.surface().connect(tx);
    tracing::info!("Page connected ({})", generation);

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    let painter = state.painter.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            if let Message::Text(text) = msg {
                handle_page_message(&text, &painter);
            }
        }
    });

    tokio::spawn(restore_session(state.clone()));

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    state.painter.surface().disconnect(generation);
    tracing::info!("Page disconnected ({})", generation);
}

fn handle_page_message(text: &str, painter: &Painter) {
    let msg: FromPage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::warn!("Unparsable page message: {}", e);
            return;
        }
    };

    match msg {
        FromPage::Reply { id, ok, error } => {
            let reply = match error {
                Some(failure) => Err(failure),
                None => Ok(ok.unwrap_or_default()),
            };
            painter.surface().resolve(id, reply);
        }
        FromPage::Intercepted { url, body } => {
            painter.correlator().observe(&url, &body);
        }
        FromPage::Focus { focused } => painter.focus().set_focused(focused),
    }
}

/// Pick up where a previous run left off once a page is there to read the
/// palette from. A session already in memory wins over the stored one.
async fn restore_session(state: AppState) {
    if state.painter.to_record().await.is_some() {
        return;
    }
    let Some(record) = state.store.load().await else {
        return;
    };
    match state.painter.restore(record).await {
        Ok(summary) => tracing::info!(
            "Restored {}x{} session from {}",
            summary.width,
            summary.height,
            state.store.name()
        ),
        Err(e) => tracing::warn!("Stored session not restored: {}", e),
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSnapshot {
    pub status: String,
    pub phase: Phase,
    pub progress: Progress,
    pub percent: u8,
}

pub fn status_snapshot(painter: &Painter) -> StatusSnapshot {
    let progress = painter.progress();
    StatusSnapshot {
        status: painter.status(),
        phase: painter.phase(),
        percent: progress.percent(),
        progress,
    }
}

/// Operator feed: one snapshot on connect and one per status change.
pub async fn handle_status_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut status_rx = state.painter.subscribe_status();
    let painter = state.painter.clone();

    let send_task = tokio::spawn(async move {
        loop {
            let snapshot = match serde_json::to_string(&status_snapshot(&painter)) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("Failed to encode status: {}", e);
                    break;
                }
            };
            if ws_sender.send(Message::Text(snapshot.into())).await.is_err() {
                break;
            }
            if status_rx.changed().await.is_err() {
                break;
            }
        }
    });

    // Drain until the operator goes away
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }
}
