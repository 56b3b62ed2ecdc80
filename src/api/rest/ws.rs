//! Live ride tracking: subscribers get the dispatch event stream over a
//! WebSocket, optionally filtered to one ride. Unsubscribing is closing the
//! socket.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::AppState;

#[derive(Deserialize)]
pub struct WsParams {
    pub ride_id: Option<Uuid>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params.ride_id))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, ride_filter: Option<Uuid>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.events_tx.subscribe();

    info!(ride_id = ?ride_filter, "event stream subscriber connected");

    let send_task = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            if ride_filter.is_some_and(|ride_id| event.ride_id() != ride_id) {
                continue;
            }

            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize dispatch event for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!("event stream subscriber disconnected");
}
