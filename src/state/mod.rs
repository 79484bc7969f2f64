//! The gateway's in-memory world: users, channels, DMs, and the indices
//! that keep IRC names and upstream identifiers in lockstep.
//!
//! The world is pure state. It is owned and mutated by exactly one task
//! (the router); nothing in here spawns, locks, or performs I/O.

mod channel;
mod names;
mod user;
mod world;

pub use channel::{Channel, ChannelKind};
pub use names::{GATEWAY_NICK, arbitrate, sanitize_name};
pub use user::{DmState, Presence, User};
pub use world::{NickChange, World};
