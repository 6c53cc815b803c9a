use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use tower::ServiceExt;

use parlor_core::{RoomId, RoomState, UserId, Visibility};
use parlor_server::http::{AppState, router};
use parlor_server::room::{Auth, ChannelBus, ElectionPolicy, LowestId, Repository, Room};

use crate::init_tracing;
use crate::utils::{RecordingHooks, TestPeer, test_minis};

fn test_state() -> (AppState, Arc<Repository>) {
    let repository = Arc::new(Repository::new());
    let auth = Arc::new(Auth::new(Arc::clone(&repository)));
    let (bus, _facts) = ChannelBus::new();
    let election: Arc<dyn ElectionPolicy> = Arc::new(LowestId);

    let state = AppState {
        repository: Arc::clone(&repository),
        auth,
        minis: test_minis(),
        hooks: Arc::new(RecordingHooks::new()),
        bus,
        election,
    };

    (state, repository)
}

fn make_room(state: &AppState, id: &str, owner: UserId, visibility: Visibility) -> Arc<Room> {
    Room::new(
        RoomId::from(id),
        "den",
        owner,
        visibility,
        Arc::clone(&state.minis),
        Arc::clone(&state.hooks),
        Arc::clone(&state.bus),
        Arc::clone(&state.election),
    )
}

fn get(uri: &str, user: Option<i64>) -> Request<Body> {
    let mut request = Request::builder().uri(uri);
    if let Some(user) = user {
        request = request.header("x-user-id", user.to_string());
    }
    request.body(Body::empty()).unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn missing_user_header_is_unauthorized() {
    init_tracing();

    let (state, _repository) = test_state();

    let (status, _) = send(router(state.clone()), get("/v1/rooms", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(router(state), get("/v1/rooms/whatever", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn absent_and_unauthorized_rooms_look_the_same() {
    init_tracing();

    let (state, repository) = test_state();

    let private = make_room(&state, "hideout", UserId(1), Visibility::Private);
    repository.set(Arc::clone(&private)).await;

    // A private room the caller may not join and a room that does not
    // exist must be indistinguishable.
    let (status, stranger_body) =
        send(router(state.clone()), get("/v1/rooms/hideout", Some(2))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, missing_body) =
        send(router(state.clone()), get("/v1/rooms/missing", Some(2))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(stranger_body, missing_body);

    // The invited creator sees it.
    let (status, _) = send(router(state), get("/v1/rooms/hideout", Some(1))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn listing_excludes_closed_and_unjoinable_rooms() {
    init_tracing();

    let (state, repository) = test_state();

    let open = make_room(&state, "open", UserId(1), Visibility::Public);
    repository.set(Arc::clone(&open)).await;
    let _member = TestPeer::join(&open, UserId(1), "ana").await;

    // Never had a connected member, so it stays in closed state.
    let idle = make_room(&state, "idle", UserId(2), Visibility::Public);
    repository.set(idle).await;

    let hidden = make_room(&state, "hidden", UserId(3), Visibility::Private);
    repository.set(Arc::clone(&hidden)).await;
    let _insider = TestPeer::join(&hidden, UserId(3), "cy").await;

    let (status, body) = send(router(state), get("/v1/rooms", Some(9))).await;
    assert_eq!(status, StatusCode::OK);

    let rooms: Vec<RoomState> = serde_json::from_slice(&body).unwrap();
    let ids: Vec<&str> = rooms.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["open"]);
}
