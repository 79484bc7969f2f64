//! Channel entities.

use std::collections::HashSet;

/// The two upstream channel families. They carry the same data but live in
/// parallel API namespaces with different membership primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Public,
    Group,
}

impl ChannelKind {
    /// API namespace prefix: `channels.*` or `groups.*`.
    pub fn api_family(self) -> &'static str {
        match self {
            ChannelKind::Public => "channels",
            ChannelKind::Group => "groups",
        }
    }

    /// The method that makes self a member.
    pub fn join_method(self) -> &'static str {
        match self {
            ChannelKind::Public => "channels.join",
            ChannelKind::Group => "groups.open",
        }
    }

    /// The method that removes self from membership.
    pub fn leave_method(self) -> &'static str {
        match self {
            ChannelKind::Public => "channels.leave",
            ChannelKind::Group => "groups.close",
        }
    }

    /// MODE reply: groups present as invite-only on top of private.
    pub fn mode_string(self) -> &'static str {
        match self {
            ChannelKind::Public => "+p",
            ChannelKind::Group => "+ip",
        }
    }
}

/// A public channel or private group.
#[derive(Debug, Clone)]
pub struct Channel {
    /// Opaque upstream identifier. Immutable.
    pub id: String,
    /// Arbitrated IRC name, without the `#` sigil. Group names carry a
    /// leading `+` applied before arbitration, so `#+team` is a group.
    pub name: String,
    pub kind: ChannelKind,
    pub topic: String,
    /// Ids of member users. Kept bidirectionally consistent with
    /// `User::channels` by the world mutators.
    pub members: HashSet<String>,
}

impl Channel {
    /// Display form with the IRC sigil.
    pub fn irc_name(&self) -> String {
        format!("#{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_families_map_to_membership_primitives() {
        assert_eq!(ChannelKind::Public.join_method(), "channels.join");
        assert_eq!(ChannelKind::Public.leave_method(), "channels.leave");
        assert_eq!(ChannelKind::Group.join_method(), "groups.open");
        assert_eq!(ChannelKind::Group.leave_method(), "groups.close");
    }
}
