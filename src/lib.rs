//! slackirc - a local IRC gateway to a Slack-style real-time chat API.
//!
//! One upstream identity, any number of loopback IRC clients. The world
//! model is owned by a single router task; the network and upstream
//! modules are I/O pipes feeding it events.

pub mod config;
pub mod error;
pub mod network;
pub mod router;
pub mod state;
pub mod translate;
pub mod upstream;
