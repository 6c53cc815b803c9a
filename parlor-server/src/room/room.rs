use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};

use parlor_core::{
    Command, Event, EventPayload, Role, RoomId, RoomState, UserId, Visibility, wire,
};

use crate::minis::MiniLookup;
use crate::room::election::ElectionPolicy;
use crate::room::hooks::{FactBus, RoomFact, RoomHooks};
use crate::room::member::Member;
use crate::transport::{ConnectionEvent, Outbound, PeerSink};

/// Longest room name the protocol stores; longer input is truncated at
/// a char boundary.
pub const ROOM_NAME_LIMIT: usize = 128;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ConnectionState {
    /// No member has reached connected state yet.
    Closed,
    /// At least one member connected at some point. Never reverts.
    Open,
}

/// Every mutable field of a room sits behind one lock. The lock is
/// never held across an await on I/O; state is read or copied under it,
/// then released before any delivery proceeds.
struct State {
    name: String,
    visibility: Visibility,
    connection: ConnectionState,

    members: HashMap<UserId, Member>,

    invited: HashSet<UserId>,
    kicked: HashSet<UserId>,
    admin_invites: HashSet<UserId>,

    /// Users that held the admin role when they disconnected.
    admins_on_disconnected: HashSet<UserId>,

    link: String,
    mini: Option<parlor_core::MiniProfile>,

    peer_to_member: HashMap<String, UserId>,
}

/// One live session: membership, roles, invite/kick lists, pinned
/// content and the command/event protocol over the room data channel.
pub struct Room {
    id: RoomId,
    state: RwLock<State>,

    minis: Arc<dyn MiniLookup>,
    hooks: Arc<dyn RoomHooks>,
    bus: Arc<dyn FactBus>,
    election: Arc<dyn ElectionPolicy>,
}

impl Room {
    pub fn new(
        id: RoomId,
        name: &str,
        owner: UserId,
        visibility: Visibility,
        minis: Arc<dyn MiniLookup>,
        hooks: Arc<dyn RoomHooks>,
        bus: Arc<dyn FactBus>,
        election: Arc<dyn ElectionPolicy>,
    ) -> Arc<Self> {
        let mut invited = HashSet::new();
        // The creator can always get into their own private room.
        invited.insert(owner);

        Arc::new(Self {
            id,
            state: RwLock::new(State {
                name: trim_room_name(name),
                visibility,
                connection: ConnectionState::Closed,
                members: HashMap::new(),
                invited,
                kicked: HashSet::new(),
                admin_invites: HashSet::new(),
                admins_on_disconnected: HashSet::new(),
                link: String::new(),
                mini: None,
                peer_to_member: HashMap::new(),
            }),
            minis,
            hooks,
            bus,
            election,
        })
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub async fn name(&self) -> String {
        self.state.read().await.name.clone()
    }

    pub async fn visibility(&self) -> Visibility {
        self.state.read().await.visibility
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.state.read().await.connection
    }

    pub async fn peer_count(&self) -> usize {
        self.state.read().await.members.len()
    }

    pub async fn is_kicked(&self, id: UserId) -> bool {
        self.state.read().await.kicked.contains(&id)
    }

    pub async fn is_invited(&self, id: UserId) -> bool {
        self.state.read().await.invited.contains(&id)
    }

    pub async fn was_admin_on_disconnect(&self, id: UserId) -> bool {
        self.state.read().await.admins_on_disconnected.contains(&id)
    }

    /// Read-only snapshot for the query and listing surfaces.
    pub async fn snapshot(&self) -> RoomState {
        let state = self.state.read().await;

        RoomState {
            id: self.id.clone(),
            name: state.name.clone(),
            visibility: state.visibility,
            members: state.members.values().map(Member::to_state).collect(),
            link: state.link.clone(),
            mini: state.mini.clone(),
        }
    }

    /// Entry point when a transport attaches. Registers the member and
    /// consumes its connection events until the connection ends; the
    /// caller's task is suspended for the member's whole lifetime.
    pub async fn handle(
        self: &Arc<Self>,
        member: Member,
        mut events: mpsc::Receiver<ConnectionEvent>,
    ) {
        let id = member.id();
        let peer = member.peer_id().to_owned();

        let is_new = {
            let mut state = self.state.write().await;

            state.peer_to_member.insert(peer.clone(), id);

            let is_new = state.connection == ConnectionState::Closed;

            if state.members.contains_key(&id) {
                drop(state);
                warn!("user {} already in room {}, closing new connection", id, self.id);
                member.close();
                return;
            }

            state.admins_on_disconnected.remove(&id);

            let mut member = member;
            if is_new {
                // First member of a fresh room starts as its admin.
                member.set_role(Role::Admin);
            }
            state.members.insert(id, member);

            is_new
        };

        while let Some(event) = events.recv().await {
            match event {
                ConnectionEvent::Connected => self.on_connected(id, is_new).await,
                ConnectionEvent::Message(data) => self.on_message(&peer, data).await,
                ConnectionEvent::Closed | ConnectionEvent::Failed => {
                    self.disconnect(id).await;
                    return;
                }
            }
        }

        // End of stream from the transport counts as an orderly close.
        self.disconnect(id).await;
    }

    async fn on_connected(self: &Arc<Self>, id: UserId, is_new: bool) {
        let snapshot = {
            let state = self.state.read().await;
            let Some(member) = state.members.get(&id) else {
                return;
            };
            if member.is_connected() {
                return;
            }
            member.to_state()
        };

        self.hooks.on_join(self, &snapshot, is_new).await;

        {
            let mut state = self.state.write().await;
            state.connection = ConnectionState::Open;
            if let Some(member) = state.members.get_mut(&id) {
                member.mark_connected();
            }
        }

        self.notify(Event {
            from: id,
            payload: EventPayload::Joined { user: snapshot },
        })
        .await;
    }

    /// Resolve an inbound frame to a member and dispatch the command.
    /// Unknown senders and malformed frames are dropped.
    async fn on_message(self: &Arc<Self>, peer: &str, data: Bytes) {
        let command = match wire::decode::<Command>(&data) {
            Ok(command) => command,
            Err(e) => {
                warn!("dropping undecodable command in room {}: {}", self.id, e);
                return;
            }
        };

        let from = { self.state.read().await.peer_to_member.get(peer).copied() };
        let Some(from) = from else {
            return;
        };

        self.dispatch(from, command).await;
    }

    async fn dispatch(self: &Arc<Self>, from: UserId, command: Command) {
        match command {
            Command::MuteUpdate { muted } => self.on_mute_update(from, muted).await,
            Command::Reaction { emoji } => self.on_reaction(from, emoji).await,
            Command::LinkShare { link } => self.on_link_share(from, link).await,
            Command::InviteAdmin { id } => self.on_invite_admin(from, id).await,
            Command::AcceptAdmin => self.on_accept_admin(from).await,
            Command::RemoveAdmin { id } => self.on_remove_admin(from, id).await,
            Command::RenameRoom { name } => self.on_rename_room(from, &name).await,
            Command::InviteUser { id } => self.on_invite_user(from, id).await,
            Command::KickUser { id } => self.on_kick_user(from, id).await,
            Command::MuteUser { id } => self.on_mute_user(from, id).await,
            Command::RecordScreen => self.on_record_screen(from).await,
            Command::VisibilityUpdate { visibility } => {
                self.on_visibility_update(from, visibility).await
            }
            Command::PinLink { link } => self.on_pin_link(from, link).await,
            Command::UnpinLink => self.on_unpin_link(from).await,
            Command::OpenMini { id, slug } => self.on_open_mini(from, id, &slug).await,
            Command::CloseMini => self.on_close_mini(from).await,
            Command::RequestMini { id } => self.on_request_mini(from, id).await,
        }
    }

    async fn on_mute_update(self: &Arc<Self>, from: UserId, muted: bool) {
        {
            let mut state = self.state.write().await;
            let Some(member) = state.members.get_mut(&from) else {
                debug!("member {} not found in room {}", from, self.id);
                return;
            };

            if muted {
                member.mute();
            } else {
                member.unmute();
            }
        }

        self.notify(Event {
            from,
            payload: EventPayload::MuteUpdated { is_muted: muted },
        })
        .await;
    }

    async fn on_reaction(self: &Arc<Self>, from: UserId, emoji: String) {
        self.notify(Event {
            from,
            payload: EventPayload::Reacted { emoji },
        })
        .await;
    }

    async fn on_link_share(self: &Arc<Self>, from: UserId, link: String) {
        self.bus.publish(RoomFact::LinkShared {
            user: from,
            room: self.id.clone(),
        });

        self.notify(Event {
            from,
            payload: EventPayload::LinkShared { link },
        })
        .await;
    }

    async fn on_invite_admin(self: &Arc<Self>, from: UserId, target: UserId) {
        if !self.is_admin(from).await {
            return;
        }

        {
            let mut state = self.state.write().await;
            if !state.members.contains_key(&target) {
                return;
            }
            state.admin_invites.insert(target);
        }

        self.unicast(
            target,
            &Event {
                from,
                payload: EventPayload::InvitedAdmin { id: target },
            },
        )
        .await;
    }

    async fn on_accept_admin(self: &Arc<Self>, from: UserId) {
        {
            let mut state = self.state.write().await;
            if !state.admin_invites.remove(&from) {
                return;
            }

            let Some(member) = state.members.get_mut(&from) else {
                return;
            };
            member.set_role(Role::Admin);
        }

        self.notify(Event {
            from,
            payload: EventPayload::AddedAdmin { id: from },
        })
        .await;
    }

    /// Historical protocol quirk, kept on purpose: the payload names a
    /// target, but the handler re-asserts the caller's own admin role
    /// and the broadcast attributes the named target.
    async fn on_remove_admin(self: &Arc<Self>, from: UserId, target: UserId) {
        if !self.is_admin(from).await {
            return;
        }

        {
            let mut state = self.state.write().await;
            state.admins_on_disconnected.remove(&from);

            let Some(member) = state.members.get_mut(&from) else {
                debug!("member {} not found in room {}", from, self.id);
                return;
            };
            member.set_role(Role::Admin);
        }

        self.notify(Event {
            from,
            payload: EventPayload::RemovedAdmin { id: target },
        })
        .await;
    }

    async fn on_rename_room(self: &Arc<Self>, from: UserId, name: &str) {
        if !self.is_admin(from).await {
            return;
        }

        let name = trim_room_name(name);
        {
            let mut state = self.state.write().await;
            state.name = name.clone();
        }

        self.notify(Event {
            from,
            payload: EventPayload::RenamedRoom { name },
        })
        .await;
    }

    async fn on_invite_user(self: &Arc<Self>, from: UserId, target: UserId) {
        let visibility = self.visibility().await;
        if visibility == Visibility::Private && !self.is_admin(from).await {
            return;
        }

        self.invite_user(from, target).await;
    }

    /// Mark a user invited and fire the invite callback. Also used by
    /// surfaces outside the command protocol.
    pub async fn invite_user(&self, from: UserId, target: UserId) {
        {
            let mut state = self.state.write().await;
            state.invited.insert(target);
        }

        self.hooks.on_invite(&self.id, from, target).await;
    }

    async fn on_kick_user(self: &Arc<Self>, from: UserId, target: UserId) {
        if !self.is_admin(from).await {
            return;
        }

        let member_sink = {
            let mut state = self.state.write().await;
            let Some(member) = state.members.get(&target) else {
                return;
            };
            let sink = member.sink();
            state.kicked.insert(target);
            sink
        };

        // No broadcast: the kicked member simply gets disconnected and
        // the transport reports it like any other close.
        let _ = member_sink.send(Outbound::Close);
    }

    async fn on_mute_user(self: &Arc<Self>, from: UserId, target: UserId) {
        if !self.is_admin(from).await {
            return;
        }

        if !self.is_member(target).await {
            return;
        }

        self.unicast(
            target,
            &Event {
                from,
                payload: EventPayload::MutedByAdmin { id: target },
            },
        )
        .await;
    }

    async fn on_record_screen(self: &Arc<Self>, from: UserId) {
        self.notify(Event {
            from,
            payload: EventPayload::RecordedScreen,
        })
        .await;
    }

    async fn on_visibility_update(self: &Arc<Self>, from: UserId, visibility: Visibility) {
        if !self.is_admin(from).await {
            return;
        }

        {
            let mut state = self.state.write().await;
            state.visibility = visibility;

            // Everyone already inside stays welcome after a switch to
            // private.
            let present: Vec<UserId> = state.members.keys().copied().collect();
            state.invited.extend(present);
        }

        self.notify(Event {
            from,
            payload: EventPayload::VisibilityUpdated { visibility },
        })
        .await;
    }

    async fn on_pin_link(self: &Arc<Self>, from: UserId, link: String) {
        if !self.is_admin(from).await {
            return;
        }

        {
            let mut state = self.state.write().await;
            // A pinned link and an open mini are mutually exclusive,
            // and a pinned link is never silently replaced.
            if state.mini.is_some() || !state.link.is_empty() {
                return;
            }
            state.link = link.clone();
        }

        self.notify(Event {
            from,
            payload: EventPayload::PinnedLink { link },
        })
        .await;
    }

    async fn on_unpin_link(self: &Arc<Self>, from: UserId) {
        if !self.is_admin(from).await {
            return;
        }

        {
            let mut state = self.state.write().await;
            state.link.clear();
        }

        self.notify(Event {
            from,
            payload: EventPayload::UnpinnedLink,
        })
        .await;
    }

    async fn on_open_mini(self: &Arc<Self>, from: UserId, id: i64, slug: &str) {
        if !self.is_admin(from).await {
            return;
        }

        {
            let state = self.state.read().await;
            if !state.link.is_empty() {
                return;
            }
        }

        self.bus.publish(RoomFact::MiniOpened {
            user: from,
            mini: id,
            room: self.id.clone(),
        });

        let mini = if id != 0 {
            self.minis.get_with_id(id).await
        } else if !slug.is_empty() {
            self.minis.get_with_slug(slug).await
        } else {
            return;
        };

        let mini = match mini {
            Ok(mini) => mini,
            Err(e) => {
                warn!("failed to resolve mini in room {}: {}", self.id, e);
                return;
            }
        };

        {
            let mut state = self.state.write().await;
            if !state.link.is_empty() {
                // A link got pinned while the lookup was in flight.
                return;
            }
            state.mini = Some(mini.clone());
        }

        self.notify(Event {
            from,
            payload: EventPayload::OpenedMini { mini },
        })
        .await;
    }

    async fn on_close_mini(self: &Arc<Self>, from: UserId) {
        if !self.is_admin(from).await {
            return;
        }

        {
            let mut state = self.state.write().await;
            state.mini = None;
        }

        self.notify(Event {
            from,
            payload: EventPayload::ClosedMini,
        })
        .await;
    }

    /// Any member may ask for a mini descriptor; the answer goes to the
    /// room's admins only.
    async fn on_request_mini(self: &Arc<Self>, from: UserId, id: i64) {
        if id == 0 {
            return;
        }

        let mini = match self.minis.get_with_id(id).await {
            Ok(mini) => mini,
            Err(e) => {
                warn!("failed to get mini {}: {}", id, e);
                return;
            }
        };

        let event = Event {
            from,
            payload: EventPayload::RequestedMini { mini },
        };

        let data = match wire::encode(&event) {
            Ok(data) => data,
            Err(e) => {
                warn!("failed to encode event: {}", e);
                return;
            }
        };

        let admins: Vec<(UserId, PeerSink)> = {
            let state = self.state.read().await;
            state
                .members
                .values()
                .filter(|m| m.role() == Role::Admin)
                .map(|m| (m.id(), m.sink()))
                .collect()
        };

        for (admin, sink) in admins {
            if sink.send(Outbound::Frame(data.clone())).is_err() {
                warn!("failed to notify admin {}", admin);
            }
        }
    }

    async fn is_admin(&self, id: UserId) -> bool {
        let state = self.state.read().await;
        state
            .members
            .get(&id)
            .is_some_and(|m| m.role() == Role::Admin)
    }

    async fn is_member(&self, id: UserId) -> bool {
        self.state.read().await.members.contains_key(&id)
    }

    /// Serialize one event and deliver it to every current member
    /// except the sender. Members whose transport channel is gone are
    /// put through the disconnect procedure.
    async fn notify(self: &Arc<Self>, event: Event) {
        let mut dead = self.deliver(&event).await;
        while let Some(id) = dead.pop() {
            dead.extend(self.run_disconnect(id).await);
        }
    }

    /// Delivery pass: copy the membership snapshot (ids plus sinks)
    /// under the read lock, release, then send. Returns members whose
    /// channel turned out closed.
    async fn deliver(&self, event: &Event) -> Vec<UserId> {
        let data = match wire::encode(event) {
            Ok(data) => data,
            Err(e) => {
                warn!("failed to encode event: {}", e);
                return Vec::new();
            }
        };

        let targets: Vec<(UserId, PeerSink)> = {
            let state = self.state.read().await;
            state
                .members
                .iter()
                .filter(|(id, _)| **id != event.from)
                .map(|(id, m)| (*id, m.sink()))
                .collect()
        };

        let mut dead = Vec::new();
        for (id, sink) in targets {
            if sink.send(Outbound::Frame(data.clone())).is_err() {
                dead.push(id);
            }
        }

        dead
    }

    /// Serialize one event for a single recipient. Failures are logged
    /// and swallowed; unicasts never trigger the disconnect procedure.
    async fn unicast(&self, to: UserId, event: &Event) {
        let data = match wire::encode(event) {
            Ok(data) => data,
            Err(e) => {
                warn!("failed to encode event: {}", e);
                return;
            }
        };

        let sink = {
            let state = self.state.read().await;
            state.members.get(&to).map(Member::sink)
        };

        let Some(sink) = sink else {
            return;
        };

        if sink.send(Outbound::Frame(data)).is_err() {
            warn!("failed to notify {}", to);
        }
    }

    /// Disconnect procedure, at most once per member. Closed channels
    /// discovered while broadcasting `Left` are drained the same way.
    pub(crate) async fn disconnect(self: &Arc<Self>, id: UserId) {
        let mut dead = self.run_disconnect(id).await;
        while let Some(next) = dead.pop() {
            dead.extend(self.run_disconnect(next).await);
        }
    }

    async fn run_disconnect(self: &Arc<Self>, id: UserId) -> Vec<UserId> {
        let member = {
            let mut state = self.state.write().await;
            let Some(member) = state.members.remove(&id) else {
                // Already gone; the procedure ran for this member.
                return Vec::new();
            };

            if member.role() == Role::Admin {
                state.admins_on_disconnected.insert(id);
            }

            state.peer_to_member.retain(|_, owner| *owner != id);

            member
        };

        info!("user {} disconnected from room {}", id, self.id);
        member.close();

        let dead = self
            .deliver(&Event {
                from: id,
                payload: EventPayload::Left,
            })
            .await;

        self.elect_admin(id).await;

        self.hooks.on_disconnected(&self.id, &member.to_state()).await;

        dead
    }

    /// Promote one remaining member when no admin is left. The
    /// broadcast is fired on its own task so the disconnect procedure
    /// never waits on delivery.
    async fn elect_admin(self: &Arc<Self>, previous: UserId) {
        let winner = {
            let mut state = self.state.write().await;

            let has_admin = state.members.values().any(|m| m.role() == Role::Admin);
            if has_admin {
                return;
            }

            let candidates: Vec<UserId> = state.members.keys().copied().collect();
            let Some(winner) = self.election.pick(&candidates) else {
                return;
            };

            if let Some(member) = state.members.get_mut(&winner) {
                member.set_role(Role::Admin);
            }

            winner
        };

        tokio::spawn(Self::notify_task(
            Arc::clone(self),
            Event {
                from: previous,
                payload: EventPayload::AddedAdmin { id: winner },
            },
        ));
    }

    /// Boxed so the spawned broadcast does not feed the compiler's
    /// auto-trait inference back through notify -> disconnect ->
    /// election.
    fn notify_task(self: Arc<Self>, event: Event) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move { self.notify(event).await })
    }
}

fn trim_room_name(name: &str) -> String {
    let name = name.trim();
    match name.char_indices().nth(ROOM_NAME_LIMIT) {
        Some((idx, _)) => name[..idx].to_owned(),
        None => name.to_owned(),
    }
}
