//! Gateway control commands, addressed to the `X` pseudo-user.
//!
//! `PRIVMSG X :<command> [args]` drives the parts of the upstream that
//! have no IRC verb: creating and archiving channels, replaying files,
//! dropping the session. Replies come back as NOTICEs from `X`.

use std::sync::atomic::Ordering;

use crate::state::DmState;

use super::{FileOrigin, Router};

const USAGE: &[&str] = &[
    "commands: newgroup <name> | newchan <name> | archive <channel> | close <channel>",
    "          cat <file-id> | delim <nick> | disconnect | debug_dump [0|1] | debug_dump_state",
];

impl Router {
    /// Dispatch one control command. The text splits on runs of spaces,
    /// like an IRC line body.
    pub(super) fn dispatch_gateway(&mut self, id: u64, text: &str) {
        let mut words = text.split(' ').filter(|w| !w.is_empty());
        let Some(command) = words.next() else {
            self.usage(id);
            return;
        };
        let arg = words.next();

        match (command, arg) {
            ("newgroup", Some(name)) => {
                self.spawn_call("groups.create", vec![("name".to_string(), name.to_string())]);
                self.gateway_notice(id, &format!("creating group {}", name));
            }
            ("newchan", Some(name)) => {
                self.spawn_call(
                    "channels.create",
                    vec![("name".to_string(), name.to_string())],
                );
                self.gateway_notice(id, &format!("creating channel {}", name));
            }
            ("archive", Some(name)) => self.archive(id, name),
            ("close", Some(name)) => self.close(id, name),
            ("cat", Some(file_id)) => {
                self.spawn_file_fetch(file_id.to_string(), FileOrigin::Cat { client: id });
            }
            ("delim", Some(nick)) => self.delim(id, nick),
            ("disconnect", _) => {
                self.gateway_notice(id, "tearing down the RTM session");
                self.request_teardown("disconnect requested");
            }
            ("debug_dump", Some(flag)) => {
                let on = flag == "1";
                self.debug_dump.store(on, Ordering::Relaxed);
                self.gateway_notice(id, if on { "wire dump on" } else { "wire dump off" });
            }
            ("debug_dump", None) => {
                let on = self.debug_dump.load(Ordering::Relaxed);
                self.gateway_notice(id, if on { "wire dump is on" } else { "wire dump is off" });
            }
            ("debug_dump_state", _) => self.dump_state(id),
            _ => self.usage(id),
        }
    }

    fn usage(&self, id: u64) {
        for line in USAGE {
            self.gateway_notice(id, line);
        }
    }

    fn archive(&mut self, id: u64, name: &str) {
        let Some(channel) = self.world.channel_by_name(name.trim_start_matches('#')) else {
            self.gateway_notice(id, &format!("unknown channel {}", name));
            return;
        };
        let method = format!("{}.archive", channel.kind.api_family());
        let chan_id = channel.id.clone();
        self.spawn_call(&method, vec![("channel".to_string(), chan_id)]);
    }

    fn close(&mut self, id: u64, name: &str) {
        let Some(channel) = self.world.channel_by_name(name.trim_start_matches('#')) else {
            self.gateway_notice(id, &format!("unknown channel {}", name));
            return;
        };
        let method = channel.kind.leave_method().to_string();
        let chan_id = channel.id.clone();
        self.spawn_call(&method, vec![("channel".to_string(), chan_id)]);
    }

    /// Close the DM conduit to a user.
    fn delim(&mut self, id: u64, nick: &str) {
        let Some(user) = self.world.user_by_nick(nick) else {
            self.gateway_notice(id, &format!("unknown nick {}", nick));
            return;
        };
        match &user.dm {
            DmState::Open(dm_id) => {
                let dm_id = dm_id.clone();
                self.spawn_call("im.close", vec![("channel".to_string(), dm_id)]);
            }
            _ => self.gateway_notice(id, &format!("no open dm with {}", nick)),
        }
    }

    fn dump_state(&self, id: u64) {
        let generation = self.generation();
        self.gateway_notice(
            id,
            &format!(
                "session generation {} ({})",
                generation,
                if self.live.is_some() { "live" } else { "down" }
            ),
        );
        self.gateway_notice(
            id,
            &format!(
                "self {}",
                self.world.self_id.as_deref().unwrap_or("(unset)")
            ),
        );
        self.gateway_notice(
            id,
            &format!(
                "{} users, {} channels, {} clients, {} queued marks",
                self.world.users().count(),
                self.world.channels().count(),
                self.clients.len(),
                self.mark_queue.len()
            ),
        );
        for channel in self.world.channels() {
            self.gateway_notice(
                id,
                &format!(
                    "  {} {} [{:?}] {} members",
                    channel.id,
                    channel.irc_name(),
                    channel.kind,
                    channel.members.len()
                ),
            );
        }
    }
}
