use parlor_core::{Command, EventPayload, Role, UserId, Visibility};
use parlor_server::room::{ConnectionState, RoomFact};

use crate::init_tracing;
use crate::utils::{HookCall, TestPeer, eventually, test_room};

#[tokio::test]
async fn fresh_room_promotes_first_member_to_admin() {
    init_tracing();

    let owner = UserId(1);
    let (room, hooks, _facts) = test_room("den", owner, Visibility::Public);

    assert_eq!(room.connection_state().await, ConnectionState::Closed);

    let _peer = TestPeer::join(&room, owner, "ana").await;

    assert!(
        eventually(|| {
            let room = room.clone();
            async move { room.connection_state().await == ConnectionState::Open }
        })
        .await
    );

    let snapshot = room.snapshot().await;
    assert_eq!(snapshot.members.len(), 1);
    assert_eq!(snapshot.members[0].role, Role::Admin);

    assert!(
        eventually(|| {
            let hooks = hooks.clone();
            async move { hooks.has_join(owner).await }
        })
        .await
    );

    let calls = hooks.calls().await;
    assert!(
        calls
            .iter()
            .any(|c| matches!(c, HookCall::Join { is_new: true, .. }))
    );
}

#[tokio::test]
async fn duplicate_join_closes_new_connection_and_keeps_state() {
    init_tracing();

    let owner = UserId(1);
    let (room, _hooks, _facts) = test_room("den", owner, Visibility::Public);

    let _first = TestPeer::join(&room, owner, "ana").await;

    let mut second = TestPeer::attach(&room, owner, "ana-again").await;
    assert!(second.got_close().await, "second connection must be closed");

    assert_eq!(room.peer_count().await, 1);
    let snapshot = room.snapshot().await;
    assert_eq!(snapshot.members[0].display_name, "ana");
}

#[tokio::test]
async fn admin_disconnect_elects_exactly_one_new_admin() {
    init_tracing();

    let (room, hooks, _facts) = test_room("den", UserId(1), Visibility::Public);

    let admin = TestPeer::join(&room, UserId(1), "ana").await;
    let _two = TestPeer::join(&room, UserId(2), "bo").await;
    let mut three = TestPeer::join(&room, UserId(3), "cy").await;

    admin.close().await;

    assert!(
        eventually(|| {
            let room = room.clone();
            async move { room.peer_count().await == 2 }
        })
        .await
    );

    assert!(room.was_admin_on_disconnect(UserId(1)).await);

    // LowestId policy makes user 2 the deterministic winner.
    assert!(
        eventually(|| {
            let room = room.clone();
            async move {
                let snapshot = room.snapshot().await;
                let admins: Vec<_> = snapshot
                    .members
                    .iter()
                    .filter(|m| m.role == Role::Admin)
                    .collect();
                admins.len() == 1 && admins[0].id == UserId(2)
            }
        })
        .await
    );

    let added = three
        .wait_for(|e| matches!(e.payload, EventPayload::AddedAdmin { .. }))
        .await
        .expect("election must be broadcast");
    assert_eq!(added.from, UserId(1));
    assert!(matches!(added.payload, EventPayload::AddedAdmin { id } if id == UserId(2)));

    assert!(hooks.has_disconnect(UserId(1)).await);
}

#[tokio::test]
async fn invite_in_private_room_is_admin_gated() {
    init_tracing();

    let (room, hooks, _facts) = test_room("den", UserId(1), Visibility::Private);

    let admin = TestPeer::join(&room, UserId(1), "ana").await;
    room.invite_user(UserId(1), UserId(2)).await;
    let listener = TestPeer::join(&room, UserId(2), "bo").await;

    // Non-admin invite in a private room: silently dropped.
    listener.send(Command::InviteUser { id: UserId(4) }).await;

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert!(!room.is_invited(UserId(4)).await);

    // The same command from the admin goes through.
    admin.send(Command::InviteUser { id: UserId(4) }).await;

    assert!(
        eventually(|| {
            let room = room.clone();
            async move { room.is_invited(UserId(4)).await }
        })
        .await
    );

    let invites = hooks.invites().await;
    assert_eq!(invites.len(), 2);
    assert!(
        invites
            .iter()
            .any(|(_, from, to)| *from == UserId(1) && *to == UserId(4))
    );
}

#[tokio::test]
async fn second_pin_is_a_no_op() {
    init_tracing();

    let (room, _hooks, _facts) = test_room("den", UserId(1), Visibility::Public);

    let admin = TestPeer::join(&room, UserId(1), "ana").await;
    let mut listener = TestPeer::join(&room, UserId(2), "bo").await;

    admin
        .send(Command::PinLink {
            link: "https://x".to_owned(),
        })
        .await;
    admin
        .send(Command::PinLink {
            link: "https://y".to_owned(),
        })
        .await;

    assert!(
        eventually(|| {
            let room = room.clone();
            async move { room.snapshot().await.link == "https://x" }
        })
        .await
    );

    let pins: Vec<_> = listener
        .drain()
        .await
        .into_iter()
        .filter(|e| matches!(e.payload, EventPayload::PinnedLink { .. }))
        .collect();
    assert_eq!(pins.len(), 1, "only the first pin may broadcast");
}

#[tokio::test]
async fn link_and_mini_are_mutually_exclusive() {
    init_tracing();

    let (room, _hooks, _facts) = test_room("den", UserId(1), Visibility::Public);
    let admin = TestPeer::join(&room, UserId(1), "ana").await;

    admin
        .send(Command::OpenMini {
            id: 1,
            slug: String::new(),
        })
        .await;

    assert!(
        eventually(|| {
            let room = room.clone();
            async move { room.snapshot().await.mini.is_some() }
        })
        .await
    );

    // A pin while a mini is open must not land.
    admin
        .send(Command::PinLink {
            link: "https://x".to_owned(),
        })
        .await;
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let snapshot = room.snapshot().await;
    assert!(snapshot.link.is_empty());
    assert!(snapshot.mini.is_some());

    // And the other way around: close the mini, pin, then try to open.
    admin.send(Command::CloseMini).await;
    admin
        .send(Command::PinLink {
            link: "https://x".to_owned(),
        })
        .await;
    admin
        .send(Command::OpenMini {
            id: 2,
            slug: String::new(),
        })
        .await;
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let snapshot = room.snapshot().await;
    assert_eq!(snapshot.link, "https://x");
    assert!(snapshot.mini.is_none());
}

#[tokio::test]
async fn going_private_invites_current_members() {
    init_tracing();

    let (room, _hooks, _facts) = test_room("den", UserId(1), Visibility::Public);

    let admin = TestPeer::join(&room, UserId(1), "ana").await;
    let _two = TestPeer::join(&room, UserId(2), "bo").await;
    let _three = TestPeer::join(&room, UserId(3), "cy").await;

    admin
        .send(Command::VisibilityUpdate {
            visibility: Visibility::Private,
        })
        .await;

    assert!(
        eventually(|| {
            let room = room.clone();
            async move {
                room.visibility().await == Visibility::Private
                    && room.is_invited(UserId(2)).await
                    && room.is_invited(UserId(3)).await
            }
        })
        .await
    );
}

#[tokio::test]
async fn kicked_member_gets_disconnected() {
    init_tracing();

    let (room, _hooks, _facts) = test_room("den", UserId(1), Visibility::Public);

    let admin = TestPeer::join(&room, UserId(1), "ana").await;
    let mut target = TestPeer::join(&room, UserId(2), "bo").await;

    admin.send(Command::KickUser { id: UserId(2) }).await;

    assert!(target.got_close().await, "kicked member must be closed");
    assert!(room.is_kicked(UserId(2)).await);
}

#[tokio::test]
async fn rename_truncates_to_limit() {
    init_tracing();

    let (room, _hooks, _facts) = test_room("den", UserId(1), Visibility::Public);
    let admin = TestPeer::join(&room, UserId(1), "ana").await;
    let mut listener = TestPeer::join(&room, UserId(2), "bo").await;

    let long = "n".repeat(300);
    admin.send(Command::RenameRoom { name: long }).await;

    let renamed = listener
        .wait_for(|e| matches!(e.payload, EventPayload::RenamedRoom { .. }))
        .await
        .expect("rename must broadcast");

    let EventPayload::RenamedRoom { name } = renamed.payload else {
        unreachable!();
    };
    assert_eq!(name.len(), 128);
    assert_eq!(room.name().await.len(), 128);
}

#[tokio::test]
async fn broadcast_excludes_the_sender() {
    init_tracing();

    let (room, _hooks, _facts) = test_room("den", UserId(1), Visibility::Public);

    let mut admin = TestPeer::join(&room, UserId(1), "ana").await;
    let mut listener = TestPeer::join(&room, UserId(2), "bo").await;

    // Settle join events first.
    admin.drain().await;
    listener.drain().await;

    listener
        .send(Command::Reaction {
            emoji: "🎉".to_owned(),
        })
        .await;

    let reacted = admin
        .wait_for(|e| matches!(e.payload, EventPayload::Reacted { .. }))
        .await
        .expect("other members must hear the reaction");
    assert_eq!(reacted.from, UserId(2));

    let own: Vec<_> = listener
        .drain()
        .await
        .into_iter()
        .filter(|e| matches!(e.payload, EventPayload::Reacted { .. }))
        .collect();
    assert!(own.is_empty(), "sender must not hear its own event");
}

#[tokio::test]
async fn admin_invite_accept_flow_promotes_member() {
    init_tracing();

    let (room, _hooks, _facts) = test_room("den", UserId(1), Visibility::Public);

    let admin = TestPeer::join(&room, UserId(1), "ana").await;
    let mut listener = TestPeer::join(&room, UserId(2), "bo").await;

    // Accept without a pending invite: dropped.
    listener.send(Command::AcceptAdmin).await;
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let snapshot = room.snapshot().await;
    let bo = snapshot.members.iter().find(|m| m.id == UserId(2)).unwrap();
    assert_eq!(bo.role, Role::Listener);

    admin.send(Command::InviteAdmin { id: UserId(2) }).await;

    let invited = listener
        .wait_for(|e| matches!(e.payload, EventPayload::InvitedAdmin { .. }))
        .await
        .expect("invite must be unicast to the target");
    assert_eq!(invited.from, UserId(1));

    listener.send(Command::AcceptAdmin).await;

    assert!(
        eventually(|| {
            let room = room.clone();
            async move {
                room.snapshot()
                    .await
                    .members
                    .iter()
                    .any(|m| m.id == UserId(2) && m.role == Role::Admin)
            }
        })
        .await
    );
}

#[tokio::test]
async fn remove_admin_reasserts_the_caller_not_the_target() {
    init_tracing();

    let (room, _hooks, _facts) = test_room("den", UserId(1), Visibility::Public);

    let mut admin = TestPeer::join(&room, UserId(1), "ana").await;
    let listener = TestPeer::join(&room, UserId(2), "bo").await;

    // Promote user 2 so both hold admin.
    admin.send(Command::InviteAdmin { id: UserId(2) }).await;
    listener.send(Command::AcceptAdmin).await;

    assert!(
        eventually(|| {
            let room = room.clone();
            async move {
                room.snapshot()
                    .await
                    .members
                    .iter()
                    .any(|m| m.id == UserId(2) && m.role == Role::Admin)
            }
        })
        .await
    );

    // Historical quirk: the named target keeps its role; the caller's
    // own admin status is re-asserted and the broadcast names the
    // target.
    listener.send(Command::RemoveAdmin { id: UserId(1) }).await;

    let removed = admin
        .wait_for(|e| matches!(e.payload, EventPayload::RemovedAdmin { .. }))
        .await
        .expect("removal must broadcast");
    assert_eq!(removed.from, UserId(2));
    assert!(matches!(removed.payload, EventPayload::RemovedAdmin { id } if id == UserId(1)));

    let snapshot = room.snapshot().await;
    for member in &snapshot.members {
        assert_eq!(member.role, Role::Admin, "both members stay admin");
    }
}

#[tokio::test]
async fn mute_update_and_admin_mute_request() {
    init_tracing();

    let (room, _hooks, _facts) = test_room("den", UserId(1), Visibility::Public);

    let mut admin = TestPeer::join(&room, UserId(1), "ana").await;
    let mut listener = TestPeer::join(&room, UserId(2), "bo").await;

    listener.send(Command::MuteUpdate { muted: false }).await;

    let updated = admin
        .wait_for(|e| matches!(e.payload, EventPayload::MuteUpdated { .. }))
        .await
        .expect("mute update must broadcast");
    assert!(matches!(
        updated.payload,
        EventPayload::MuteUpdated { is_muted: false }
    ));

    assert!(
        eventually(|| {
            let room = room.clone();
            async move {
                room.snapshot()
                    .await
                    .members
                    .iter()
                    .any(|m| m.id == UserId(2) && !m.muted)
            }
        })
        .await
    );

    admin.send(Command::MuteUser { id: UserId(2) }).await;

    let muted = listener
        .wait_for(|e| matches!(e.payload, EventPayload::MutedByAdmin { .. }))
        .await
        .expect("admin mute must reach the target");
    assert_eq!(muted.from, UserId(1));
}

#[tokio::test]
async fn request_mini_answers_admins_only() {
    init_tracing();

    let (room, _hooks, _facts) = test_room("den", UserId(1), Visibility::Public);

    let mut admin = TestPeer::join(&room, UserId(1), "ana").await;
    let mut listener = TestPeer::join(&room, UserId(2), "bo").await;
    let mut other = TestPeer::join(&room, UserId(3), "cy").await;

    admin.drain().await;
    listener.drain().await;
    other.drain().await;

    listener.send(Command::RequestMini { id: 2 }).await;

    let requested = admin
        .wait_for(|e| matches!(e.payload, EventPayload::RequestedMini { .. }))
        .await
        .expect("admins must receive the request");
    let EventPayload::RequestedMini { mini } = requested.payload else {
        unreachable!();
    };
    assert_eq!(mini.slug, "trivia");

    let leaked: Vec<_> = other
        .drain()
        .await
        .into_iter()
        .filter(|e| matches!(e.payload, EventPayload::RequestedMini { .. }))
        .collect();
    assert!(leaked.is_empty(), "non-admins must not receive the answer");
}

#[tokio::test]
async fn link_share_publishes_a_fact() {
    init_tracing();

    let (room, _hooks, mut facts) = test_room("den", UserId(1), Visibility::Public);

    let mut admin = TestPeer::join(&room, UserId(1), "ana").await;
    let listener = TestPeer::join(&room, UserId(2), "bo").await;

    listener
        .send(Command::LinkShare {
            link: "https://example.com".to_owned(),
        })
        .await;

    let shared = admin
        .wait_for(|e| matches!(e.payload, EventPayload::LinkShared { .. }))
        .await
        .expect("link share must broadcast");
    assert_eq!(shared.from, UserId(2));

    let fact = facts.recv().await.expect("fact must be published");
    assert_eq!(
        fact,
        RoomFact::LinkShared {
            user: UserId(2),
            room: room.id().clone(),
        }
    );
}

#[tokio::test]
async fn dead_channel_during_broadcast_disconnects_the_member() {
    init_tracing();

    let (room, hooks, _facts) = test_room("den", UserId(1), Visibility::Public);

    let admin = TestPeer::join(&room, UserId(1), "ana").await;
    let mut listener = TestPeer::join(&room, UserId(2), "bo").await;

    // Kill the listener's transport without an orderly close.
    listener.kill_transport();

    // Any broadcast now discovers the dead channel.
    admin
        .send(Command::Reaction {
            emoji: "👋".to_owned(),
        })
        .await;

    assert!(
        eventually(|| {
            let room = room.clone();
            async move { room.peer_count().await == 1 }
        })
        .await,
        "member with a dead channel must be removed"
    );

    assert!(
        eventually(|| {
            let hooks = hooks.clone();
            async move { hooks.has_disconnect(UserId(2)).await }
        })
        .await
    );
}
