//! The world: primary entity tables plus their inverse indices.
//!
//! Users and channels reference each other by id only; membership lives as
//! id sets on both sides and every mutator here maintains the two sides
//! together. Secondary indices (folded nick, folded channel name, DM id)
//! are updated in lockstep with the primary maps so lookups never see a
//! stale entry.

use std::collections::{HashMap, VecDeque};

use slackirc_proto::irc_to_lower;

use super::channel::{Channel, ChannelKind};
use super::names::arbitrate;
use super::user::{DmState, Presence, User};

/// A nick reassignment produced by re-arbitration; the router broadcasts
/// it as an IRC NICK line.
#[derive(Debug, Clone, PartialEq)]
pub struct NickChange {
    pub user_id: String,
    pub old: String,
    pub new: String,
}

/// Result of folding a channel snapshot into the world.
#[derive(Debug, Default)]
pub struct ChannelUpdate {
    /// The channel did not exist before.
    pub created: bool,
    /// Users stubbed into existence for membership links; the router owes
    /// each of these a `users.info` call.
    pub stubbed: Vec<String>,
    /// Member ids added (beyond self) relative to the previous state.
    pub joined: Vec<String>,
    /// Member ids removed relative to the previous state.
    pub parted: Vec<String>,
}

/// In-memory model of the upstream workspace.
#[derive(Debug, Default)]
pub struct World {
    users: HashMap<String, User>,
    channels: HashMap<String, Channel>,
    users_by_name: HashMap<String, String>,
    channels_by_name: HashMap<String, String>,
    users_by_dm: HashMap<String, String>,
    /// The local identity's user id. Set by the bootstrap snapshot.
    pub self_id: Option<String>,
}

impl World {
    pub fn new() -> World {
        World::default()
    }

    /// Discard everything. Used on session teardown; both entity tables
    /// and all indices drop together so no dangling reference survives.
    pub fn clear(&mut self) {
        self.users.clear();
        self.channels.clear();
        self.users_by_name.clear();
        self.channels_by_name.clear();
        self.users_by_dm.clear();
        self.self_id = None;
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.channels.is_empty()
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.get(id)
    }

    pub fn user_mut(&mut self, id: &str) -> Option<&mut User> {
        self.users.get_mut(id)
    }

    pub fn channel(&self, id: &str) -> Option<&Channel> {
        self.channels.get(id)
    }

    pub fn channel_mut(&mut self, id: &str) -> Option<&mut Channel> {
        self.channels.get_mut(id)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    /// Look up a user by nick under case folding.
    pub fn user_by_nick(&self, nick: &str) -> Option<&User> {
        let id = self.users_by_name.get(&irc_to_lower(nick))?;
        self.users.get(id)
    }

    /// Look up a channel by its name (without the `#` sigil), folded.
    pub fn channel_by_name(&self, name: &str) -> Option<&Channel> {
        let id = self.channels_by_name.get(&irc_to_lower(name))?;
        self.channels.get(id)
    }

    /// Resolve a DM channel id to its user.
    pub fn user_by_dm(&self, dm_id: &str) -> Option<&User> {
        let id = self.users_by_dm.get(dm_id)?;
        self.users.get(id)
    }

    pub fn is_self(&self, user_id: &str) -> bool {
        self.self_id.as_deref() == Some(user_id)
    }

    /// The self user, when the snapshot has arrived.
    pub fn self_user(&self) -> Option<&User> {
        self.users.get(self.self_id.as_deref()?)
    }

    /// Apply a user snapshot.
    ///
    /// An existing user is re-arbitrated against the current map (its own
    /// entry removed first); a changed nick is reported so the router can
    /// broadcast it. A new user is created with an arbitrated nick and no
    /// memberships.
    pub fn update_user(
        &mut self,
        id: &str,
        proposed: &str,
        realname: Option<&str>,
        presence: Option<Presence>,
    ) -> Option<NickChange> {
        if self.users.contains_key(id) {
            let old_nick = self.users[id].nick.clone();
            self.users_by_name.remove(&irc_to_lower(&old_nick));
            let nick = arbitrate(proposed, |n| self.users_by_name.contains_key(n));
            self.users_by_name.insert(irc_to_lower(&nick), id.to_string());

            let user = self.users.get_mut(id).unwrap_or_else(|| unreachable!());
            user.nick = nick.clone();
            user.stub = false;
            if let Some(realname) = realname {
                user.realname = realname.to_string();
            }
            if let Some(presence) = presence {
                user.presence = presence;
            }

            if nick != old_nick {
                return Some(NickChange {
                    user_id: id.to_string(),
                    old: old_nick,
                    new: nick,
                });
            }
            return None;
        }

        let nick = arbitrate(proposed, |n| self.users_by_name.contains_key(n));
        let mut user = User::new(id.to_string(), nick.clone(), String::new());
        if let Some(realname) = realname {
            user.realname = realname.to_string();
        }
        if let Some(presence) = presence {
            user.presence = presence;
        }
        self.users_by_name.insert(irc_to_lower(&nick), id.to_string());
        self.users.insert(id.to_string(), user);
        None
    }

    /// Create a placeholder user whose nick derives from its id.
    ///
    /// Returns true when the stub was created; the caller then owes the
    /// upstream a `users.info` call to fill in real attributes.
    pub fn stub_user(&mut self, id: &str) -> bool {
        if self.users.contains_key(id) {
            return false;
        }
        self.update_user(id, id, None, None);
        if let Some(user) = self.users.get_mut(id) {
            user.stub = true;
        }
        true
    }

    /// Apply a channel snapshot.
    ///
    /// The name is arbitrated only on first creation so existing client
    /// references stay stable; topic and kind are always replaced, and the
    /// membership set is reconciled bidirectionally. For groups, self is
    /// excluded from the stored membership.
    pub fn update_channel(
        &mut self,
        kind: ChannelKind,
        id: &str,
        proposed: &str,
        topic: Option<&str>,
        members: &[String],
    ) -> ChannelUpdate {
        let mut update = ChannelUpdate::default();

        let mut wanted: Vec<String> = members.to_vec();
        if kind == ChannelKind::Group
            && let Some(self_id) = self.self_id.clone()
        {
            wanted.retain(|m| *m != self_id);
        }

        if !self.channels.contains_key(id) {
            let proposed = match kind {
                ChannelKind::Public => proposed.to_string(),
                ChannelKind::Group => format!("+{}", proposed),
            };
            let name = arbitrate(&proposed, |n| self.channels_by_name.contains_key(n));
            self.channels_by_name.insert(irc_to_lower(&name), id.to_string());
            self.channels.insert(
                id.to_string(),
                Channel {
                    id: id.to_string(),
                    name,
                    kind,
                    topic: String::new(),
                    members: Default::default(),
                },
            );
            update.created = true;
        }

        {
            let channel = self.channels.get_mut(id).unwrap_or_else(|| unreachable!());
            channel.kind = kind;
            if let Some(topic) = topic {
                channel.topic = topic.to_string();
            }
        }

        let current: Vec<String> = self.channels[id].members.iter().cloned().collect();
        for member in &current {
            if !wanted.contains(member) && self.part(id, member) {
                update.parted.push(member.clone());
            }
        }
        for member in &wanted {
            if self.stub_user(member) {
                update.stubbed.push(member.clone());
            }
            if self.join(id, member) {
                update.joined.push(member.clone());
            }
        }

        update
    }

    /// Remove a channel, dropping the membership link from every member.
    pub fn delete_channel(&mut self, id: &str) -> Option<Channel> {
        let channel = self.channels.remove(id)?;
        self.channels_by_name.remove(&irc_to_lower(&channel.name));
        for member in &channel.members {
            if let Some(user) = self.users.get_mut(member) {
                user.channels.remove(id);
            }
        }
        Some(channel)
    }

    /// Insert the bidirectional membership link. Idempotent: returns false
    /// when the user was already a member, and the broadcaster uses that
    /// to suppress duplicate JOIN lines.
    pub fn join(&mut self, channel_id: &str, user_id: &str) -> bool {
        let (Some(channel), Some(user)) =
            (self.channels.get_mut(channel_id), self.users.get_mut(user_id))
        else {
            return false;
        };
        let changed = channel.members.insert(user_id.to_string());
        user.channels.insert(channel_id.to_string());
        changed
    }

    /// Remove the bidirectional membership link. Idempotent.
    pub fn part(&mut self, channel_id: &str, user_id: &str) -> bool {
        let (Some(channel), Some(user)) =
            (self.channels.get_mut(channel_id), self.users.get_mut(user_id))
        else {
            return false;
        };
        let changed = channel.members.remove(user_id);
        user.channels.remove(channel_id);
        changed
    }

    /// Mark a DM as opening. Returns false if the user is unknown.
    pub fn set_dm_pending(&mut self, user_id: &str) -> bool {
        match self.users.get_mut(user_id) {
            Some(user) => {
                user.dm = DmState::Pending;
                true
            }
            None => false,
        }
    }

    /// Bind an open DM to a user and hand back the queued bodies for the
    /// router to flush in FIFO order.
    pub fn set_dm_open(&mut self, user_id: &str, dm_id: &str) -> VecDeque<String> {
        let Some(user) = self.users.get_mut(user_id) else {
            return VecDeque::new();
        };
        user.dm = DmState::Open(dm_id.to_string());
        self.users_by_dm.insert(dm_id.to_string(), user_id.to_string());
        std::mem::take(&mut user.tx_queue)
    }

    /// Drop the DM binding; any still-queued bodies come back to the
    /// caller (delivery failed, they become NOTICEs).
    pub fn clear_dm(&mut self, user_id: &str) -> VecDeque<String> {
        let Some(user) = self.users.get_mut(user_id) else {
            return VecDeque::new();
        };
        if let DmState::Open(dm_id) = &user.dm {
            self.users_by_dm.remove(dm_id);
        }
        user.dm = DmState::Absent;
        std::mem::take(&mut user.tx_queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_with_self() -> World {
        let mut world = World::new();
        world.update_user("U1", "me", Some("Local Identity"), None);
        world.self_id = Some("U1".to_string());
        world
    }

    /// Invariants 1 and 2: bidirectional membership, inverse indices.
    fn assert_consistent(world: &World) {
        for user in world.users.values() {
            for chan_id in &user.channels {
                assert!(
                    world.channels[chan_id].members.contains(&user.id),
                    "user {} thinks it is in {} but the channel disagrees",
                    user.id,
                    chan_id
                );
            }
            assert_eq!(
                world.users_by_name.get(&irc_to_lower(&user.nick)),
                Some(&user.id)
            );
            if let DmState::Open(dm) = &user.dm {
                assert_eq!(world.users_by_dm.get(dm), Some(&user.id));
            }
        }
        for channel in world.channels.values() {
            for member in &channel.members {
                assert!(world.users[member].channels.contains(&channel.id));
            }
            assert_eq!(
                world.channels_by_name.get(&irc_to_lower(&channel.name)),
                Some(&channel.id)
            );
        }
    }

    #[test]
    fn snapshot_membership_is_bidirectional() {
        let mut world = world_with_self();
        let update = world.update_channel(
            ChannelKind::Public,
            "C1",
            "general",
            Some("the topic"),
            &["U1".into(), "U2".into()],
        );
        assert!(update.created);
        assert_eq!(update.stubbed, vec!["U2".to_string()]);
        assert_consistent(&world);
        assert!(world.user("U2").unwrap().channels.contains("C1"));
    }

    #[test]
    fn groups_exclude_self_from_membership() {
        let mut world = world_with_self();
        world.update_channel(
            ChannelKind::Group,
            "G1",
            "team",
            None,
            &["U1".into(), "U2".into()],
        );
        let group = world.channel("G1").unwrap();
        assert_eq!(group.name, "+team");
        assert!(!group.members.contains("U1"));
        assert!(group.members.contains("U2"));
        assert_consistent(&world);
    }

    #[test]
    fn join_and_part_are_idempotent() {
        let mut world = world_with_self();
        world.update_channel(ChannelKind::Public, "C1", "general", None, &[]);
        assert!(world.join("C1", "U1"));
        assert!(!world.join("C1", "U1"));
        assert!(world.part("C1", "U1"));
        assert!(!world.part("C1", "U1"));
        assert_consistent(&world);
    }

    #[test]
    fn channel_names_stay_stable_across_updates() {
        let mut world = world_with_self();
        world.update_channel(ChannelKind::Public, "C1", "general", None, &[]);
        world.update_channel(ChannelKind::Public, "C1", "renamed", Some("t"), &[]);
        assert_eq!(world.channel("C1").unwrap().name, "general");
        assert_eq!(world.channel("C1").unwrap().topic, "t");
    }

    #[test]
    fn update_reconciles_departed_members() {
        let mut world = world_with_self();
        world.update_channel(ChannelKind::Public, "C1", "general", None, &["U2".into(), "U3".into()]);
        let update = world.update_channel(ChannelKind::Public, "C1", "general", None, &["U2".into()]);
        assert_eq!(update.parted, vec!["U3".to_string()]);
        assert!(!world.user("U3").unwrap().channels.contains("C1"));
        assert_consistent(&world);
    }

    #[test]
    fn renaming_user_rearbitrates_against_current_map() {
        let mut world = world_with_self();
        world.update_user("U2", "bob", None, None);
        world.update_user("U3", "carol", None, None);
        // carol renames to bob upstream; arbitration must suffix
        let change = world.update_user("U3", "bob", None, None).unwrap();
        assert_eq!(change.old, "carol");
        assert_eq!(change.new, "bob1");
        assert_consistent(&world);
    }

    #[test]
    fn rename_to_same_folded_name_is_silent() {
        let mut world = world_with_self();
        world.update_user("U2", "bob", None, None);
        assert!(world.update_user("U2", "bob", Some("Bob"), None).is_none());
        assert_eq!(world.user("U2").unwrap().realname, "Bob");
    }

    #[test]
    fn delete_channel_unlinks_every_member() {
        let mut world = world_with_self();
        world.update_channel(ChannelKind::Public, "C1", "general", None, &["U1".into(), "U2".into()]);
        let gone = world.delete_channel("C1").unwrap();
        assert_eq!(gone.id, "C1");
        assert!(world.channel_by_name("general").is_none());
        assert!(world.user("U2").unwrap().channels.is_empty());
        assert_consistent(&world);
    }

    #[test]
    fn dm_open_drains_queue_and_indexes() {
        let mut world = world_with_self();
        world.update_user("U2", "bob", None, None);
        world.set_dm_pending("U2");
        world.user_mut("U2").unwrap().tx_queue.push_back("hi".into());
        world.user_mut("U2").unwrap().tx_queue.push_back("there".into());

        let drained = world.set_dm_open("U2", "D1");
        assert_eq!(drained, VecDeque::from(["hi".to_string(), "there".to_string()]));
        assert!(world.user("U2").unwrap().tx_queue.is_empty());
        assert_eq!(world.user_by_dm("D1").unwrap().id, "U2");
        assert_consistent(&world);

        let leftover = world.clear_dm("U2");
        assert!(leftover.is_empty());
        assert!(world.user_by_dm("D1").is_none());
        assert_eq!(world.user("U2").unwrap().dm, DmState::Absent);
    }

    #[test]
    fn clear_empties_every_table() {
        let mut world = world_with_self();
        world.update_channel(ChannelKind::Public, "C1", "general", None, &["U2".into()]);
        world.set_dm_open("U2", "D1");
        world.clear();
        assert!(world.is_empty());
        assert!(world.self_id.is_none());
        assert!(world.user_by_nick("me").is_none());
        assert!(world.channel_by_name("general").is_none());
        assert!(world.user_by_dm("D1").is_none());
    }
}
