use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use std::sync::Arc;

use parlor_core::{RoomId, RoomState, UserId};

use crate::http::{AppState, ws_handler};
use crate::room::ConnectionState;

/// Read-only listing surface plus the transport attach point.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/rooms", get(list_rooms))
        .route("/v1/rooms/{id}", get(get_room))
        .route("/v1/ws", get(ws_handler))
        .layer(middleware::from_fn(require_user))
        .with_state(state)
}

/// The upstream session layer authenticates callers and forwards the
/// user id in `x-user-id`; here it only gets lifted into an extension.
async fn require_user(mut request: Request, next: Next) -> Response {
    let user = request
        .headers()
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<i64>().ok());

    let Some(user) = user else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    request.extensions_mut().insert(UserId(user));
    next.run(request).await
}

/// Rooms the caller may see: open-state and joinable under the access
/// policy.
async fn list_rooms(
    State(app): State<AppState>,
    Extension(user): Extension<UserId>,
) -> Json<Vec<RoomState>> {
    let mut candidates = Vec::new();
    app.repository
        .map(|room| candidates.push(Arc::clone(room)))
        .await;

    let mut rooms = Vec::new();
    for room in candidates {
        if room.connection_state().await == ConnectionState::Closed {
            continue;
        }

        if !app.auth.can_join(room.id(), user).await {
            continue;
        }

        rooms.push(room.snapshot().await);
    }

    Json(rooms)
}

/// Nonexistent rooms and rooms the caller may not join get the same
/// 404, so private rooms do not leak their existence.
async fn get_room(
    Path(id): Path<String>,
    State(app): State<AppState>,
    Extension(user): Extension<UserId>,
) -> Result<Json<RoomState>, StatusCode> {
    let id = RoomId::from(id);

    let room = app
        .repository
        .get(&id)
        .await
        .map_err(|_| StatusCode::NOT_FOUND)?;

    if !app.auth.can_join(&id, user).await {
        return Err(StatusCode::NOT_FOUND);
    }

    Ok(Json(room.snapshot().await))
}
