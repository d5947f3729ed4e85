//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::PlayerId;
use crate::util::rate_limit::PlayerRateLimiter;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = state.sessions.open();
    info!(conn_id = %conn_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    let broadcast_rx = state.room.subscribe();
    let (direct_tx, direct_rx) = mpsc::channel(8);

    let writer_handle = tokio::spawn(run_writer(conn_id, ws_sink, broadcast_rx, direct_rx));

    let player = run_reader(conn_id, ws_stream, &state, direct_tx).await;

    state.sessions.close(&conn_id);
    if let Some(player_id) = player {
        release_player(&state, player_id).await;
    }

    writer_handle.abort();
    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Writer task: direct replies and room broadcasts -> WebSocket
async fn run_writer(
    conn_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut broadcast_rx: broadcast::Receiver<Arc<ServerMsg>>,
    mut direct_rx: mpsc::Receiver<ServerMsg>,
) {
    loop {
        let sent = tokio::select! {
            // a welcome must not queue behind snapshots
            biased;
            Some(msg) = direct_rx.recv() => send_msg(&mut ws_sink, &msg).await,
            res = broadcast_rx.recv() => match res {
                Ok(msg) => send_msg(&mut ws_sink, &msg).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(conn_id = %conn_id, lagged_count = n, "Client lagged, skipping {} messages", n);
                    // Continue - don't disconnect for lag
                    Ok(())
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(conn_id = %conn_id, "Broadcast channel closed");
                    break;
                }
            },
        };

        if let Err(e) = sent {
            debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
            break;
        }
    }
}

/// Reader loop: WebSocket -> room. Returns the player this connection ended up controlling.
async fn run_reader(
    conn_id: Uuid,
    mut ws_stream: SplitStream<WebSocket>,
    state: &AppState,
    direct_tx: mpsc::Sender<ServerMsg>,
) -> Option<PlayerId> {
    let rate_limiter = PlayerRateLimiter::new(state.config.input_rate_limit);
    let mut player: Option<PlayerId> = None;

    while let Some(result) = ws_stream.next().await {
        let text = match result {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(_)) => {
                debug!(conn_id = %conn_id, "Received binary message, ignoring");
                continue;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => {
                debug!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                debug!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        };

        if handle_text(conn_id, &text, state, &rate_limiter, &mut player, &direct_tx)
            .await
            .is_break()
        {
            break;
        }
    }

    player
}

/// Apply one inbound text frame.
///
/// Over-rate and malformed frames are dropped without a reply. Only a
/// stopped room or a gone writer ends the connection.
async fn handle_text(
    conn_id: Uuid,
    text: &str,
    state: &AppState,
    rate_limiter: &PlayerRateLimiter,
    player: &mut Option<PlayerId>,
    direct_tx: &mpsc::Sender<ServerMsg>,
) -> ControlFlow<()> {
    if !rate_limiter.check_input() {
        debug!(conn_id = %conn_id, "Rate limited message");
        return ControlFlow::Continue(());
    }

    let msg = match ClientMsg::decode(text) {
        Ok(msg) => msg,
        Err(e) => {
            debug!(conn_id = %conn_id, error = %e, "Dropping malformed client message");
            return ControlFlow::Continue(());
        }
    };

    match msg {
        ClientMsg::Join { player_id, name } => {
            let Some(ack) = state.room.join(player_id, name).await else {
                debug!(conn_id = %conn_id, "Room stopped");
                return ControlFlow::Break(());
            };
            state.sessions.bind(conn_id, ack.player_id);
            if let Some(previous) = player.replace(ack.player_id) {
                if previous != ack.player_id {
                    release_player(state, previous).await;
                }
            }

            let welcome = ServerMsg::Welcome {
                player_id: ack.player_id,
                state: ack.state,
            };
            if direct_tx.send(welcome).await.is_err() {
                return ControlFlow::Break(());
            }
        }
        ClientMsg::Input(input) => match *player {
            Some(player_id) => state.room.send_input(player_id, input.into()),
            None => debug!(conn_id = %conn_id, "Input before join, ignoring"),
        },
        ClientMsg::Reset => {
            info!(conn_id = %conn_id, player_id = ?player, "Reset requested");
            state.room.reset().await;
        }
    }
    ControlFlow::Continue(())
}

/// Mark `player_id` disconnected unless a newer connection has resumed it
async fn release_player(state: &AppState, player_id: PlayerId) {
    if state.sessions.is_bound(player_id) {
        debug!(player_id = %player_id, "Player resumed on another connection, keeping it");
        return;
    }
    state.room.disconnect(player_id).await;
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json)).await.map_err(|e| e.to_string())
}
