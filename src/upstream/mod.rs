//! Upstream side of the bridge: the request/response Web API, the
//! persistent real-time event stream, and the session lifecycle that ties
//! them together.

pub mod api;
pub mod events;
pub mod rtm;
pub mod session;

pub use api::{Api, WebApi};
pub use rtm::RtmHandle;
