//! User entities.

use std::collections::HashSet;
use std::collections::VecDeque;

/// Upstream presence, projected onto IRC here/gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Active,
    Away,
}

impl Presence {
    /// Parse the upstream presence string; anything unknown counts as active.
    pub fn from_api(s: &str) -> Presence {
        if s == "away" { Presence::Away } else { Presence::Active }
    }

    /// WHO flag: `H` for here, `G` for gone.
    pub fn who_flag(self) -> &'static str {
        match self {
            Presence::Active => "H",
            Presence::Away => "G",
        }
    }
}

/// The direct-message conduit to a user.
///
/// `Pending` means an `im.open` call is in flight; messages queue on the
/// user until the open completes one way or the other.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DmState {
    #[default]
    Absent,
    Pending,
    Open(String),
}

/// A remote user, bot, or the local identity.
#[derive(Debug, Clone)]
pub struct User {
    /// Opaque upstream identifier. Immutable.
    pub id: String,
    /// Arbitrated IRC nick, unique under case folding.
    pub nick: String,
    pub realname: String,
    pub presence: Presence,
    /// Ids of channels this user is in. Kept bidirectionally consistent
    /// with `Channel::members` by the world mutators.
    pub channels: HashSet<String>,
    pub dm: DmState,
    /// Outbound DM bodies waiting for the DM to open. Drained FIFO the
    /// moment `dm` becomes `Open`.
    pub tx_queue: VecDeque<String>,
    /// Placeholder created from a bare id; a deferred `users.info` may
    /// still fill in real attributes, but only while this is set.
    pub stub: bool,
}

impl User {
    /// A freshly-arbitrated user with no memberships.
    pub fn new(id: String, nick: String, realname: String) -> User {
        User {
            id,
            nick,
            realname,
            presence: Presence::Active,
            channels: HashSet::new(),
            dm: DmState::Absent,
            tx_queue: VecDeque::new(),
            stub: false,
        }
    }
}
