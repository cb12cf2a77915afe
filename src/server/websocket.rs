/// WebSocket stream of event log entries

use axum::{
    extract::ws::{Message, WebSocket},
    extract::{Query, State, WebSocketUpgrade},
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::time::{interval, Duration};

use super::handlers::AppState;
use crate::core::EventStore;
use crate::utils::DEFAULT_EVENT_LIMIT;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Deserialize)]
pub struct StreamQuery {
    /// Start after this event id; defaults to the current end of the log
    since: Option<i64>,
}

/// WebSocket handler for real-time event streaming
pub async fn ws_events_handler(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let events = state.desk.read().await.events().clone();
    ws.on_upgrade(move |socket| handle_events_websocket(socket, events, query.since))
}

async fn handle_events_websocket(socket: WebSocket, events: EventStore, since: Option<i64>) {
    let (mut sender, mut receiver) = socket.split();

    let mut last_id = match since {
        Some(id) => id,
        None => match events.last_id().await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(error = %e, "event stream could not read the log");
                return;
            }
        },
    };
    let mut interval = interval(POLL_INTERVAL);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let batch = match events.poll_events_since(last_id, None, DEFAULT_EVENT_LIMIT).await {
                    Ok(batch) => batch,
                    Err(e) => {
                        tracing::warn!(error = %e, "event stream poll failed");
                        continue;
                    }
                };
                let Some(last) = batch.last() else {
                    continue;
                };
                last_id = last.id;

                if let Ok(json) = serde_json::to_string(&batch) {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    _ => {}
                }
            }
        }
    }
    tracing::debug!(last_id, "event stream closed");
}
