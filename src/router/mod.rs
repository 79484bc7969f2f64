//! The event router: sole owner and sole mutator of the world.
//!
//! Everything that can change state arrives here as a [`RouterEvent`] -
//! IRC lines, upstream events, API completions, timer fires - and is
//! applied one at a time. I/O tasks on both sides are dumb pipes, so
//! between two events the world is never observed half-mutated and no
//! locking is needed anywhere.
//!
//! API calls initiated here run as spawned tasks whose completions come
//! back as events tagged with the session generation; a completion from a
//! torn-down session is discarded without looking at it.

mod events;
mod gateway;
mod irc;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use sha2::{Digest, Sha256};
use slackirc_proto::{Command, Message, Response, irc_eq};
use subtle::ConstantTimeEq;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::state::{ChannelKind, GATEWAY_NICK, World};
use crate::upstream::api::{self, Api};
use crate::upstream::events::{RtmEvent, Snapshot, UserInfo};
use crate::upstream::rtm::RtmHandle;

/// The server name clients see in prefixes and numerics.
pub const SERVER_NAME: &str = "localhost";

/// NAMES replies are chunked this many nicks per 353 line.
const NAMES_CHUNK: usize = 8;

/// Read-mark debounce window.
const MARK_DEBOUNCE: std::time::Duration = std::time::Duration::from_secs(5);

/// Largest file replayed inline, for both `file_share` and `cat`.
pub const MAX_FILE_BYTES: u64 = 65_536;

/// Where a fetched file's content should land.
#[derive(Debug, Clone)]
pub enum FileOrigin {
    /// Replay to one client as a framed NOTICE block (`X cat`).
    Cat { client: u64 },
    /// Emit inline as a message from `author` (a `file_share` subtype).
    Share {
        channel: Option<String>,
        author: String,
    },
}

/// Completions of spawned API calls.
#[derive(Debug)]
pub enum ApiDone {
    /// `users.info` came back for a stubbed user.
    UserFetched { user: UserInfo },
    UserFetchFailed { user_id: String, reason: String },
    /// `im.open` yielded a DM conduit.
    DmOpened { user_id: String, dm_id: String },
    DmOpenFailed { user_id: String, reason: String },
    FileFetched {
        origin: FileOrigin,
        file_id: String,
        body: String,
    },
    FileFetchFailed {
        origin: FileOrigin,
        file_id: String,
        reason: String,
    },
    /// A fire-and-forget call failed while the session stayed live.
    CallFailed { method: String, reason: String },
}

/// Everything the router reacts to.
#[derive(Debug)]
pub enum RouterEvent {
    ClientConnected {
        id: u64,
        tx: mpsc::UnboundedSender<Message>,
    },
    ClientLine {
        id: u64,
        msg: Message,
    },
    ClientClosed {
        id: u64,
    },
    SessionUp {
        generation: u64,
        snapshot: Snapshot,
        rtm: RtmHandle,
    },
    SessionDown {
        generation: u64,
        reason: String,
    },
    Rtm {
        generation: u64,
        event: RtmEvent,
    },
    Api {
        generation: u64,
        done: ApiDone,
    },
    MarkFlush {
        generation: u64,
    },
}

/// Per-client protocol state. Lives with the router, not the socket task,
/// because welcome and eviction are world decisions.
#[derive(Debug)]
pub struct Client {
    tx: mpsc::UnboundedSender<Message>,
    nick: Option<String>,
    user: Option<String>,
    realname: Option<String>,
    pass: Option<String>,
    /// Password accepted (or none required) and NICK+USER seen.
    authed: bool,
    /// Welcomed; implies the session was live at welcome time.
    ready: bool,
}

impl Client {
    fn new(tx: mpsc::UnboundedSender<Message>) -> Client {
        Client {
            tx,
            nick: None,
            user: None,
            realname: None,
            pass: None,
            authed: false,
            ready: false,
        }
    }

    fn nick_or_star(&self) -> &str {
        self.nick.as_deref().unwrap_or("*")
    }
}

/// A live upstream session as the router sees it.
struct Live {
    generation: u64,
    rtm: RtmHandle,
}

pub struct Router {
    world: World,
    clients: HashMap<u64, Client>,
    live: Option<Live>,
    api: Arc<dyn Api>,
    /// Self-sender: spawned tasks complete by posting events here.
    tx: mpsc::UnboundedSender<RouterEvent>,
    /// Teardown requests toward the session task.
    teardown_tx: mpsc::Sender<String>,
    mark_queue: HashMap<String, String>,
    mark_timer_armed: bool,
    password_digest: Option<[u8; 32]>,
    debug_dump: Arc<AtomicBool>,
    /// Unix time of gateway startup, for the 329 numeric.
    started_at: i64,
}

impl Router {
    pub fn new(
        config: &Config,
        api: Arc<dyn Api>,
        tx: mpsc::UnboundedSender<RouterEvent>,
        teardown_tx: mpsc::Sender<String>,
        debug_dump: Arc<AtomicBool>,
    ) -> Router {
        Router {
            world: World::new(),
            clients: HashMap::new(),
            live: None,
            api,
            tx,
            teardown_tx,
            mark_queue: HashMap::new(),
            mark_timer_armed: false,
            password_digest: config
                .password
                .as_deref()
                .map(|p| Sha256::digest(p.as_bytes()).into()),
            debug_dump,
            started_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Drive the router until every sender is gone.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<RouterEvent>) {
        while let Some(event) = rx.recv().await {
            self.apply(event);
        }
    }

    /// Apply one event. Atomic with respect to the world: no awaits.
    pub fn apply(&mut self, event: RouterEvent) {
        match event {
            RouterEvent::ClientConnected { id, tx } => {
                self.clients.insert(id, Client::new(tx));
            }
            RouterEvent::ClientLine { id, msg } => self.dispatch_irc(id, msg),
            RouterEvent::ClientClosed { id } => {
                self.clients.remove(&id);
            }
            RouterEvent::SessionUp {
                generation,
                snapshot,
                rtm,
            } => self.session_up(generation, snapshot, rtm),
            RouterEvent::SessionDown { generation, reason } => {
                self.session_down(generation, &reason)
            }
            RouterEvent::Rtm { generation, event } => {
                if self.is_current(generation) {
                    self.apply_rtm(event);
                }
            }
            RouterEvent::Api { generation, done } => {
                if self.is_current(generation) {
                    self.apply_api(done);
                }
            }
            RouterEvent::MarkFlush { generation } => {
                if self.is_current(generation) {
                    self.flush_marks();
                }
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.live.as_ref().is_some_and(|l| l.generation == generation)
    }

    fn generation(&self) -> u64 {
        self.live.as_ref().map(|l| l.generation).unwrap_or(0)
    }

    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------

    fn session_up(&mut self, generation: u64, snapshot: Snapshot, rtm: RtmHandle) {
        info!(generation, "Adopting session");
        self.live = Some(Live { generation, rtm });

        self.world.self_id = Some(snapshot.self_info.id.clone());
        self.world
            .update_user(&snapshot.self_info.id, &snapshot.self_info.name, None, None);

        for user in &snapshot.users {
            if user.deleted {
                continue;
            }
            self.world.update_user(
                &user.id,
                &user.name,
                user.real_name.as_deref(),
                user.presence.as_deref().map(crate::state::Presence::from_api),
            );
        }
        for bot in &snapshot.bots {
            if bot.deleted {
                continue;
            }
            self.world.update_user(&bot.id, &bot.name, None, None);
        }

        let mut stubbed = Vec::new();
        for chan in &snapshot.channels {
            if chan.is_archived || !chan.is_member {
                continue;
            }
            let update = self.world.update_channel(
                ChannelKind::Public,
                &chan.id,
                &chan.name,
                Some(chan.topic_value()),
                &chan.members,
            );
            stubbed.extend(update.stubbed);
        }
        for group in &snapshot.groups {
            if group.is_archived {
                continue;
            }
            let update = self.world.update_channel(
                ChannelKind::Group,
                &group.id,
                &group.name,
                Some(group.topic_value()),
                &group.members,
            );
            stubbed.extend(update.stubbed);
        }
        for im in &snapshot.ims {
            self.world.stub_user(&im.user);
            self.world.set_dm_open(&im.user, &im.id);
        }
        for user_id in stubbed {
            self.spawn_users_info(user_id);
        }

        // Welcome everyone who authed while we were waiting for the RTM.
        let waiting: Vec<u64> = self
            .clients
            .iter()
            .filter(|(_, c)| c.authed && !c.ready)
            .map(|(id, _)| *id)
            .collect();
        for id in waiting {
            self.welcome(id);
        }
    }

    fn session_down(&mut self, generation: u64, reason: &str) {
        if !self.is_current(generation) {
            debug!(generation, "Stale session teardown, ignoring");
            return;
        }
        warn!(generation, reason, "Session down, evicting clients");

        // Order matters: tell the authed clients why, then drop everyone.
        let authed: Vec<u64> = self
            .clients
            .iter()
            .filter(|(_, c)| c.authed)
            .map(|(id, _)| *id)
            .collect();
        for id in authed {
            self.server_notice(id, reason);
        }

        self.live = None;
        self.world.clear();
        self.mark_queue.clear();
        // The armed debounce timer still fires, but its generation no
        // longer matches and it falls on the floor.
        self.mark_timer_armed = false;
        self.clients.clear();
    }

    // ------------------------------------------------------------------
    // Registration and welcome
    // ------------------------------------------------------------------

    /// Re-check registration after NICK/USER/PASS. Rejects on bad
    /// password, then either welcomes (session live) or parks the client.
    fn try_register(&mut self, id: u64) {
        let Some(client) = self.clients.get(&id) else {
            return;
        };
        if client.authed || client.nick.is_none() || client.user.is_none() {
            return;
        }

        if let Some(expected) = &self.password_digest {
            let Some(pass) = client.pass.as_deref() else {
                return; // PASS not seen yet; keep waiting.
            };
            let got: [u8; 32] = Sha256::digest(pass.as_bytes()).into();
            if got[..].ct_eq(&expected[..]).unwrap_u8() != 1 {
                warn!(client = id, "Bad password");
                self.send(id, Message::from_command(Command::ERROR(
                    "Closing Link: Bad password".to_string(),
                )));
                self.clients.remove(&id);
                return;
            }
        }

        if let Some(client) = self.clients.get_mut(&id) {
            client.authed = true;
        }
        info!(client = id, "Client authed");

        if self.live.is_some() {
            self.welcome(id);
        } else {
            let notice = Message::from_server(
                SERVER_NAME,
                Command::NOTICE("*".to_string(), "Waiting for RTM connection".to_string()),
            );
            self.send(id, notice);
        }
    }

    /// Send the welcome burst and replay the world to one authed client.
    fn welcome(&mut self, id: u64) {
        let Some(client) = self.clients.get(&id) else {
            return;
        };
        let nick = client.nick_or_star().to_string();

        // The chosen nick may have appeared in the snapshot while this
        // client waited. Self is fine: wire output substitutes anyway.
        if let Some(owner) = self.world.user_by_nick(&nick)
            && !self.world.is_self(&owner.id)
        {
            self.reply(
                id,
                Response::ERR_NICKNAMEINUSE,
                vec![nick.clone(), "Nickname is already in use".to_string()],
            );
            self.send(id, Message::from_command(Command::ERROR(
                "Closing Link: Nick already in use".to_string(),
            )));
            self.clients.remove(&id);
            return;
        }

        self.reply(
            id,
            Response::RPL_WELCOME,
            vec![format!("Welcome to the Slack gateway, {}", nick)],
        );
        self.reply(
            id,
            Response::RPL_YOURHOST,
            vec![format!(
                "Your host is {}, running slackirc {}",
                SERVER_NAME,
                env!("CARGO_PKG_VERSION")
            )],
        );
        self.reply(
            id,
            Response::RPL_CREATED,
            vec!["This server bridges a Slack RTM session".to_string()],
        );
        self.reply(
            id,
            Response::RPL_MOTD,
            vec![format!("- Message the {} user for gateway commands", GATEWAY_NICK)],
        );
        self.reply(id, Response::RPL_ENDOFMOTD, vec!["End of /MOTD command.".to_string()]);

        if let Some(client) = self.clients.get_mut(&id) {
            client.ready = true;
        }

        // Replay: one JOIN + topic + NAMES per channel self is in.
        let channels: Vec<String> = self
            .world
            .channels()
            .filter(|c| self.self_is_in(c))
            .map(|c| c.id.clone())
            .collect();
        for chan_id in channels {
            self.replay_channel(id, &chan_id);
        }

        let away = self
            .world
            .self_user()
            .map(|u| u.presence == crate::state::Presence::Away)
            .unwrap_or(false);
        self.send_away_numeric(id, away);
    }

    fn self_is_in(&self, channel: &crate::state::Channel) -> bool {
        match self.world.self_id.as_deref() {
            // Group membership is implied: self never appears in a group's
            // stored member set.
            Some(self_id) => {
                channel.kind == ChannelKind::Group || channel.members.contains(self_id)
            }
            None => false,
        }
    }

    fn replay_channel(&self, id: u64, chan_id: &str) {
        let Some(client) = self.clients.get(&id) else {
            return;
        };
        let Some(channel) = self.world.channel(chan_id) else {
            return;
        };
        let nick = client.nick_or_star().to_string();
        let irc_name = channel.irc_name();

        let self_id = self.world.self_id.clone().unwrap_or_default();
        self.send(
            id,
            Message::from_user(&nick, &self_id, SERVER_NAME, Command::JOIN(irc_name.clone())),
        );
        self.reply(
            id,
            Response::RPL_TOPIC,
            vec![irc_name.clone(), channel.topic.clone()],
        );
        self.send_names(id, chan_id);
    }

    /// Chunked 353 lines plus the 366 terminator.
    fn send_names(&self, id: u64, chan_id: &str) {
        let Some(client) = self.clients.get(&id) else {
            return;
        };
        let Some(channel) = self.world.channel(chan_id) else {
            return;
        };
        let client_nick = client.nick_or_star().to_string();
        let irc_name = channel.irc_name();

        let mut names: Vec<String> = channel
            .members
            .iter()
            .filter_map(|uid| {
                if self.world.is_self(uid) {
                    Some(client_nick.clone())
                } else {
                    self.world.user(uid).map(|u| u.nick.clone())
                }
            })
            .collect();
        if channel.kind == ChannelKind::Group {
            names.push(client_nick.clone());
        }
        names.sort();

        for chunk in names.chunks(NAMES_CHUNK) {
            self.reply(
                id,
                Response::RPL_NAMREPLY,
                vec!["=".to_string(), irc_name.clone(), chunk.join(" ")],
            );
        }
        self.reply(
            id,
            Response::RPL_ENDOFNAMES,
            vec![irc_name, "End of /NAMES list".to_string()],
        );
    }

    fn send_away_numeric(&self, id: u64, away: bool) {
        if away {
            self.reply(
                id,
                Response::RPL_NOWAWAY,
                vec!["You have been marked as being away".to_string()],
            );
        } else {
            self.reply(
                id,
                Response::RPL_UNAWAY,
                vec!["You are no longer marked as being away".to_string()],
            );
        }
    }

    // ------------------------------------------------------------------
    // Output helpers
    // ------------------------------------------------------------------

    fn send(&self, id: u64, msg: Message) {
        if let Some(client) = self.clients.get(&id) {
            let _ = client.tx.send(msg);
        }
    }

    /// Numeric reply; the client's nick is prepended as the first arg.
    fn reply(&self, id: u64, response: Response, mut args: Vec<String>) {
        let Some(client) = self.clients.get(&id) else {
            return;
        };
        args.insert(0, client.nick_or_star().to_string());
        self.send(
            id,
            Message::from_server(SERVER_NAME, Command::Response(response, args)),
        );
    }

    /// Server NOTICE addressed to the client's nick.
    fn server_notice(&self, id: u64, text: &str) {
        let Some(client) = self.clients.get(&id) else {
            return;
        };
        let target = client.nick_or_star().to_string();
        self.send(
            id,
            Message::from_server(SERVER_NAME, Command::NOTICE(target, text.to_string())),
        );
    }

    /// NOTICE from the gateway pseudo-user.
    fn gateway_notice(&self, id: u64, text: &str) {
        let Some(client) = self.clients.get(&id) else {
            return;
        };
        let target = client.nick_or_star().to_string();
        self.send(
            id,
            Message::from_user(
                GATEWAY_NICK,
                GATEWAY_NICK,
                SERVER_NAME,
                Command::NOTICE(target, text.to_string()),
            ),
        );
    }

    /// Broadcast a server NOTICE to every authed client.
    fn broadcast_notice(&self, text: &str) {
        let ids: Vec<u64> = self
            .clients
            .iter()
            .filter(|(_, c)| c.authed)
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            self.server_notice(id, text);
        }
    }

    /// Ready clients, snapshot of ids.
    fn ready_clients(&self) -> Vec<u64> {
        self.clients
            .iter()
            .filter(|(_, c)| c.ready)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Build a `nick!id@host` prefix for `user_id` as seen by one client
    /// (self is shown under that client's chosen nick).
    fn prefixed(&self, client_id: u64, user_id: &str, command: Command) -> Option<Message> {
        let client = self.clients.get(&client_id)?;
        let nick = if self.world.is_self(user_id) {
            client.nick_or_star().to_string()
        } else {
            self.world.user(user_id)?.nick.clone()
        };
        Some(Message::from_user(&nick, user_id, SERVER_NAME, command))
    }

    /// Fan a user-sourced command out to every ready client.
    fn broadcast_from_user(&self, user_id: &str, command: Command) {
        for id in self.ready_clients() {
            if let Some(msg) = self.prefixed(id, user_id, command.clone()) {
                self.send(id, msg);
            }
        }
    }

    /// A rename line has to carry the old nick as its source; the world
    /// already holds the new one.
    fn broadcast_nick_change(&self, user_id: &str, old: &str, new: &str) {
        for id in self.ready_clients() {
            self.send(
                id,
                Message::from_user(old, user_id, SERVER_NAME, Command::NICK(new.to_string())),
            );
        }
    }

    // ------------------------------------------------------------------
    // Spawned API work
    // ------------------------------------------------------------------

    /// Fire a call whose only interesting outcome is failure.
    fn spawn_call(&self, method: &str, args: Vec<(String, String)>) {
        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        let generation = self.generation();
        let method = method.to_string();
        tokio::spawn(async move {
            let borrowed: Vec<(&str, &str)> =
                args.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
            if let Err(e) = api.call(&method, &borrowed).await {
                let _ = tx.send(RouterEvent::Api {
                    generation,
                    done: ApiDone::CallFailed {
                        method,
                        reason: e.reason(),
                    },
                });
            }
        });
    }

    fn spawn_users_info(&self, user_id: String) {
        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        let generation = self.generation();
        tokio::spawn(async move {
            let done = match api::users_info(api.as_ref(), &user_id).await {
                Ok(user) => ApiDone::UserFetched { user },
                Err(e) => ApiDone::UserFetchFailed {
                    user_id,
                    reason: e.reason(),
                },
            };
            let _ = tx.send(RouterEvent::Api { generation, done });
        });
    }

    fn spawn_im_open(&self, user_id: String) {
        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        let generation = self.generation();
        tokio::spawn(async move {
            let done = match api::im_open(api.as_ref(), &user_id).await {
                Ok(dm_id) => ApiDone::DmOpened { user_id, dm_id },
                Err(e) => ApiDone::DmOpenFailed {
                    user_id,
                    reason: e.reason(),
                },
            };
            let _ = tx.send(RouterEvent::Api { generation, done });
        });
    }

    /// Fetch a file's content, refusing anything over [`MAX_FILE_BYTES`].
    fn spawn_file_fetch(&self, file_id: String, origin: FileOrigin) {
        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        let generation = self.generation();
        tokio::spawn(async move {
            let done = fetch_file(api.as_ref(), &file_id, origin).await;
            let _ = tx.send(RouterEvent::Api { generation, done });
        });
    }

    /// Record a timestamp to acknowledge later; one debounced flush
    /// covers every channel touched in the window.
    fn schedule_mark(&mut self, channel_id: &str, ts: &str) {
        self.mark_queue
            .insert(channel_id.to_string(), ts.to_string());
        if self.mark_timer_armed {
            return;
        }
        self.mark_timer_armed = true;
        let tx = self.tx.clone();
        let generation = self.generation();
        tokio::spawn(async move {
            tokio::time::sleep(MARK_DEBOUNCE).await;
            let _ = tx.send(RouterEvent::MarkFlush { generation });
        });
    }

    /// Issue one `.mark` per queued channel with its last-written
    /// timestamp, then clear the queue.
    fn flush_marks(&mut self) {
        self.mark_timer_armed = false;
        let queue = std::mem::take(&mut self.mark_queue);
        for (channel_id, ts) in queue {
            let Some(channel) = self.world.channel(&channel_id) else {
                continue;
            };
            let method = format!("{}.mark", channel.kind.api_family());
            self.spawn_call(&method, vec![
                ("channel".to_string(), channel_id),
                ("ts".to_string(), ts),
            ]);
        }
    }

    // ------------------------------------------------------------------
    // Outbound messaging
    // ------------------------------------------------------------------

    /// Deliver text to a user, opening the DM conduit on demand.
    ///
    /// The text is already in wire form. While the conduit is absent or
    /// pending, bodies queue on the user and flush FIFO once it opens.
    fn send_to_user(&mut self, user_id: &str, text: String) {
        use crate::state::DmState;

        let Some(user) = self.world.user(user_id) else {
            return;
        };
        match &user.dm {
            DmState::Open(dm_id) => {
                let dm_id = dm_id.clone();
                if let Some(live) = &self.live {
                    live.rtm.send_message(&dm_id, &text);
                }
            }
            DmState::Pending => {
                if let Some(user) = self.world.user_mut(user_id) {
                    user.tx_queue.push_back(text);
                }
            }
            DmState::Absent => {
                if let Some(user) = self.world.user_mut(user_id) {
                    user.tx_queue.push_back(text);
                }
                self.world.set_dm_pending(user_id);
                self.spawn_im_open(user_id.to_string());
            }
        }
    }

    // ------------------------------------------------------------------
    // API completions
    // ------------------------------------------------------------------

    fn apply_api(&mut self, done: ApiDone) {
        match done {
            ApiDone::UserFetched { user } => {
                // Deferred fill-in: only applies while the user is still a
                // stub. A later event that already supplied real
                // attributes wins.
                let still_stub = self.world.user(&user.id).is_some_and(|u| u.stub);
                if !still_stub {
                    return;
                }
                let change = self.world.update_user(
                    &user.id,
                    &user.name,
                    user.real_name.as_deref(),
                    user.presence.as_deref().map(crate::state::Presence::from_api),
                );
                if let Some(change) = change {
                    self.broadcast_nick_change(&change.user_id, &change.old, &change.new);
                }
            }
            ApiDone::UserFetchFailed { user_id, reason } => {
                debug!(user = %user_id, reason = %reason, "users.info failed, keeping stub");
            }
            ApiDone::DmOpened { user_id, dm_id } => self.dm_opened(&user_id, &dm_id),
            ApiDone::DmOpenFailed { user_id, reason } => {
                let queued = self.world.clear_dm(&user_id);
                let nick = self
                    .world
                    .user(&user_id)
                    .map(|u| u.nick.clone())
                    .unwrap_or_else(|| user_id.clone());
                for body in queued {
                    self.broadcast_notice(&format!(
                        "Could not deliver to {} ({}): {}",
                        nick, reason, body
                    ));
                }
            }
            ApiDone::FileFetched {
                origin,
                file_id,
                body,
            } => self.file_fetched(origin, &file_id, &body),
            ApiDone::FileFetchFailed {
                origin,
                file_id,
                reason,
            } => match origin {
                FileOrigin::Cat { client } => {
                    self.gateway_notice(client, &format!("cat {}: {}", file_id, reason));
                }
                FileOrigin::Share { .. } => {
                    debug!(file = %file_id, reason = %reason, "file_share body suppressed");
                }
            },
            ApiDone::CallFailed { method, reason } => {
                warn!(method = %method, reason = %reason, "API call failed");
                self.broadcast_notice(&format!("API error: {}", reason));
            }
        }
    }

    /// Bind the DM and flush the queue in order.
    fn dm_opened(&mut self, user_id: &str, dm_id: &str) {
        let queued = self.world.set_dm_open(user_id, dm_id);
        if let Some(live) = &self.live {
            for body in queued {
                live.rtm.send_message(dm_id, &body);
            }
        }
    }

    fn file_fetched(&mut self, origin: FileOrigin, file_id: &str, body: &str) {
        match origin {
            FileOrigin::Cat { client } => {
                self.gateway_notice(client, &format!("---- BEGIN {} ----", file_id));
                for line in body.split('\n') {
                    self.gateway_notice(client, line);
                }
                self.gateway_notice(client, &format!("---- END {} ----", file_id));
            }
            FileOrigin::Share { channel, author } => {
                let marked = format!(
                    "{}{}",
                    crate::translate::subtype_marker(&format!(">{}", file_id)),
                    body
                );
                self.emit_message(channel.as_deref(), &author, &marked);
            }
        }
    }

    /// Emit message text to every ready client, translated per recipient
    /// and split one PRIVMSG per line.
    fn emit_message(&self, channel_id: Option<&str>, author_id: &str, text: &str) {
        let target_channel =
            channel_id.and_then(|c| self.world.channel(c)).map(|c| c.irc_name());

        for id in self.ready_clients() {
            let Some(client) = self.clients.get(&id) else {
                continue;
            };
            let rendered =
                crate::translate::inbound(&self.world, client.nick_or_star(), text);
            let target = match &target_channel {
                Some(name) => name.clone(),
                None => client.nick_or_star().to_string(),
            };
            for line in rendered.split('\n') {
                if let Some(msg) = self.prefixed(
                    id,
                    author_id,
                    Command::PRIVMSG(target.clone(), line.to_string()),
                ) {
                    self.send(id, msg);
                }
            }
        }
    }

    /// Resolve an author id the router has never seen: stub it and owe a
    /// `users.info`.
    fn note_unknown_user(&mut self, user_id: &str) {
        if self.world.stub_user(user_id) {
            self.spawn_users_info(user_id.to_string());
        }
    }

    /// Request a session teardown (gateway `disconnect`).
    fn request_teardown(&self, reason: &str) {
        let _ = self.teardown_tx.try_send(reason.to_string());
    }

    /// The gateway pseudo-user answers to `x` under folding.
    fn is_gateway_nick(name: &str) -> bool {
        irc_eq(name, GATEWAY_NICK)
    }
}

/// Fetch one file's body, enforcing the size cap from metadata before
/// downloading.
async fn fetch_file(api: &dyn Api, file_id: &str, origin: FileOrigin) -> ApiDone {
    let fail = |origin, reason: String| ApiDone::FileFetchFailed {
        origin,
        file_id: file_id.to_string(),
        reason,
    };

    let info = match api::files_info(api, file_id).await {
        Ok(info) => info,
        Err(e) => return fail(origin, e.reason()),
    };
    if info.size > MAX_FILE_BYTES {
        return fail(origin, format!("file exceeds {} bytes", MAX_FILE_BYTES));
    }
    let Some(url) = info.url_private else {
        return fail(origin, "file has no content url".to_string());
    };
    match api.download(&url).await {
        Ok(bytes) => ApiDone::FileFetched {
            origin,
            file_id: file_id.to_string(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
        },
        Err(e) => fail(origin, e.reason()),
    }
}
