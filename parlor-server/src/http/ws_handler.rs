use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Extension;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use parlor_core::{Role, RoomId, UserId, Visibility};

use crate::http::AppState;
use crate::room::{Member, Room};
use crate::transport::{ConnectionEvent, Outbound, peer_channel};

#[derive(Debug, Deserialize)]
pub struct JoinParams {
    /// Room to join; absent means create a fresh one.
    pub room: Option<String>,
    /// Room name, used on creation only.
    pub name: Option<String>,
    pub visibility: Option<Visibility>,
    /// Profile data the upstream session layer resolved for the caller.
    pub display_name: Option<String>,
    pub image: Option<String>,
}

/// Transport attach point. The socket stands in for the signaling
/// collaborator: ordered reliable frames in both directions plus
/// connection-state transitions.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<JoinParams>,
    State(app): State<AppState>,
    Extension(user): Extension<UserId>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, user, params, app))
}

async fn handle_socket(socket: WebSocket, user: UserId, params: JoinParams, app: AppState) {
    let peer_id = Uuid::new_v4().to_string();

    let (room, was_admin) = match &params.room {
        Some(id) => {
            let id = RoomId::from(id.as_str());

            let Ok(room) = app.repository.get(&id).await else {
                info!("user {} tried to join unknown room {}", user, id);
                return;
            };

            if !app.auth.can_join(&id, user).await {
                info!("user {} may not join room {}", user, id);
                return;
            }

            let was_admin = room.was_admin_on_disconnect(user).await;
            (room, was_admin)
        }
        None => {
            let room = Room::new(
                RoomId::generate(),
                params.name.as_deref().unwrap_or(""),
                user,
                params.visibility.unwrap_or(Visibility::Public),
                Arc::clone(&app.minis),
                Arc::clone(&app.hooks),
                Arc::clone(&app.bus),
                Arc::clone(&app.election),
            );

            app.repository.set(Arc::clone(&room)).await;
            info!("user {} created room {}", user, room.id());

            (room, false)
        }
    };

    let role = if was_admin {
        // Admins who dropped out resume their role on reconnect.
        Role::Admin
    } else {
        Role::Listener
    };

    let (sink, mut outbound) = peer_channel();
    let (event_tx, event_rx) = mpsc::channel(64);

    let member = Member::new(
        user,
        params.display_name.as_deref().unwrap_or(""),
        params.image.as_deref().unwrap_or(""),
        role,
        &peer_id,
        sink,
    );

    let (mut ws_tx, mut ws_rx) = socket.split();

    let send_task = tokio::spawn(async move {
        while let Some(out) = outbound.recv().await {
            match out {
                Outbound::Frame(data) => {
                    if ws_tx.send(Message::Binary(data)).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        // A websocket is connected the moment the upgrade completes.
        if event_tx.send(ConnectionEvent::Connected).await.is_err() {
            return;
        }

        while let Some(msg) = ws_rx.next().await {
            match msg {
                Ok(Message::Binary(data)) => {
                    if event_tx.send(ConnectionEvent::Message(data)).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("websocket error for user {}: {}", user, e);
                    let _ = event_tx.send(ConnectionEvent::Failed).await;
                    return;
                }
            }
        }

        let _ = event_tx.send(ConnectionEvent::Closed).await;
    });

    // Suspends for the lifetime of this member's connection.
    room.handle(member, event_rx).await;

    send_task.abort();
    recv_task.abort();

    let remaining = room.peer_count().await;
    info!(
        "peer {} detached from room {}, {} member(s) remain",
        peer_id,
        room.id(),
        remaining
    );

    if remaining == 0 {
        app.repository.remove(room.id()).await;
    }
}
