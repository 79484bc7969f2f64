//! slackirc-proto - the IRC protocol subset spoken by the slackirc gateway.
//!
//! This crate covers exactly what a loopback gateway needs: RFC 1459 case
//! mapping, message parsing and encoding with argument sanitisation, the
//! command vocabulary common clients emit, and the numeric replies the
//! gateway sends back. Anything outside that vocabulary round-trips through
//! [`Command::Raw`].

pub mod casemap;
pub mod command;
pub mod error;
#[cfg(feature = "tokio")]
pub mod line;
pub mod message;
pub mod response;

pub use casemap::{irc_eq, irc_to_lower};
pub use command::Command;
pub use error::ProtocolError;
#[cfg(feature = "tokio")]
pub use line::LineCodec;
pub use message::{Message, Prefix};
pub use response::Response;
