//! IRC command dispatch.
//!
//! Commands arrive already parsed; this table validates them against the
//! world and either answers locally or turns them into upstream calls.
//! Before welcome only the registration commands are honored; everything
//! else is dropped on the floor, which is what a client probing too early
//! deserves.

use slackirc_proto::{Command, Message, Response};
use tracing::debug;

use crate::state::ChannelKind;
use crate::translate;

use super::{Router, SERVER_NAME};

impl Router {
    pub(super) fn dispatch_irc(&mut self, id: u64, msg: Message) {
        let Some(client) = self.clients.get(&id) else {
            return;
        };
        let ready = client.ready;

        match msg.command {
            Command::NICK(nick) => self.cmd_nick(id, nick),
            Command::PASS(pass) => {
                if let Some(client) = self.clients.get_mut(&id)
                    && !client.authed
                {
                    client.pass = Some(pass);
                    self.try_register(id);
                }
            }
            Command::USER(username, _, _, realname) => {
                if let Some(client) = self.clients.get_mut(&id)
                    && !client.authed
                {
                    client.user = Some(username);
                    client.realname = Some(realname);
                    self.try_register(id);
                }
            }
            Command::PING(token) => {
                self.send(id, Message::from_server(SERVER_NAME, Command::PONG(token)));
            }
            Command::QUIT(_) => {
                debug!(client = id, "Client quit");
                self.clients.remove(&id);
            }

            // World commands require a welcomed client.
            _ if !ready => {}

            Command::AWAY(message) => {
                let presence = if message.is_some() { "away" } else { "auto" };
                self.spawn_call(
                    "users.setPresence",
                    vec![("presence".to_string(), presence.to_string())],
                );
            }
            Command::JOIN(target) => self.cmd_join(id, &target),
            Command::PART(target, _) => self.cmd_part(id, &target),
            Command::INVITE(nicks, target) => self.cmd_invite_kick(id, &nicks, &target, "invite"),
            Command::KICK(target, nicks, _) => self.cmd_invite_kick(id, &nicks, &target, "kick"),
            Command::MODE(target, args) => self.cmd_mode(id, &target, &args),
            Command::TOPIC(target, topic) => self.cmd_topic(id, &target, topic),
            Command::NAMES(Some(target)) => {
                if let Some(channel) = self.world.channel_by_name(strip_sigil(&target)) {
                    let chan_id = channel.id.clone();
                    self.send_names(id, &chan_id);
                } else {
                    self.reply(
                        id,
                        Response::RPL_ENDOFNAMES,
                        vec![target, "End of /NAMES list".to_string()],
                    );
                }
            }
            Command::NAMES(None) => {}
            Command::WHO(target) => self.cmd_who(id, target.as_deref()),
            Command::WHOIS(nick) => self.cmd_whois(id, &nick),
            Command::LIST => self.cmd_list(id),
            Command::MOTD => {
                self.reply(
                    id,
                    Response::RPL_MOTD,
                    vec![format!(
                        "- Message the {} user for gateway commands",
                        crate::state::GATEWAY_NICK
                    )],
                );
                self.reply(
                    id,
                    Response::RPL_ENDOFMOTD,
                    vec!["End of /MOTD command.".to_string()],
                );
            }
            Command::PRIVMSG(target, text) => self.cmd_privmsg(id, &target, &text),

            // NOTICE, numerics, raw garbage: not ours to answer.
            _ => {}
        }
    }

    fn cmd_nick(&mut self, id: u64, nick: String) {
        let Some(client) = self.clients.get(&id) else {
            return;
        };
        if !client.ready {
            let authed = client.authed;
            if let Some(client) = self.clients.get_mut(&id) {
                client.nick = Some(nick);
            }
            if !authed {
                self.try_register(id);
            }
            return;
        }

        // Post-welcome rename. Only the self projection changes, and only
        // for this client; other attached clients keep their own nicks.
        if let Some(owner) = self.world.user_by_nick(&nick)
            && !self.world.is_self(&owner.id)
        {
            self.reply(
                id,
                Response::ERR_NICKNAMEINUSE,
                vec![nick, "Nickname is already in use".to_string()],
            );
            return;
        }

        let old = client.nick_or_star().to_string();
        let self_id = self.world.self_id.clone().unwrap_or_default();
        self.send(
            id,
            Message::from_user(&old, &self_id, SERVER_NAME, Command::NICK(nick.clone())),
        );
        if let Some(client) = self.clients.get_mut(&id) {
            client.nick = Some(nick);
        }
    }

    fn cmd_join(&mut self, id: u64, target: &str) {
        let name = strip_sigil(target);
        let Some(channel) = self.world.channel_by_name(name) else {
            self.no_such_nick(id, target);
            return;
        };
        let (chan_id, kind, is_member) = (
            channel.id.clone(),
            channel.kind,
            self.self_is_in(channel),
        );

        match kind {
            // Groups reopen optimistically; the upstream event that
            // follows finds nothing left to change.
            ChannelKind::Group => {
                self.spawn_call(
                    kind.join_method(),
                    vec![("channel".to_string(), chan_id.clone())],
                );
                if let Some(self_id) = self.world.self_id.clone() {
                    let irc_name = self
                        .world
                        .channel(&chan_id)
                        .map(|c| c.irc_name())
                        .unwrap_or_default();
                    self.broadcast_from_user(&self_id, Command::JOIN(irc_name));
                }
            }
            ChannelKind::Public => {
                if is_member {
                    return;
                }
                let name = self
                    .world
                    .channel(&chan_id)
                    .map(|c| c.name.clone())
                    .unwrap_or_default();
                self.spawn_call(kind.join_method(), vec![("name".to_string(), name)]);
            }
        }
    }

    fn cmd_part(&mut self, id: u64, target: &str) {
        let name = strip_sigil(target);
        let Some(channel) = self.world.channel_by_name(name) else {
            self.no_such_nick(id, target);
            return;
        };
        let (chan_id, kind, is_member) = (
            channel.id.clone(),
            channel.kind,
            self.self_is_in(channel),
        );
        if !is_member {
            return;
        }

        match kind {
            // Symmetric to JOIN: the group disappears from the projection
            // now, and the later group_left event finds nothing to do.
            ChannelKind::Group => {
                self.spawn_call(
                    kind.leave_method(),
                    vec![("channel".to_string(), chan_id.clone())],
                );
                if let Some(self_id) = self.world.self_id.clone() {
                    let irc_name = self
                        .world
                        .channel(&chan_id)
                        .map(|c| c.irc_name())
                        .unwrap_or_default();
                    self.broadcast_from_user(&self_id, Command::PART(irc_name, None));
                }
                self.world.delete_channel(&chan_id);
            }
            ChannelKind::Public => {
                self.spawn_call(
                    kind.leave_method(),
                    vec![("channel".to_string(), chan_id)],
                );
            }
        }
    }

    /// INVITE and KICK share a shape: per comma-split nick, one API call.
    /// Failures name the nick the client typed, never an upstream id.
    fn cmd_invite_kick(&mut self, id: u64, nicks: &str, target: &str, verb: &str) {
        let Some(channel) = self.world.channel_by_name(strip_sigil(target)) else {
            self.reply(
                id,
                Response::ERR_NOSUCHCHANNEL,
                vec![target.to_string(), "No such channel".to_string()],
            );
            return;
        };
        let (chan_id, family) = (channel.id.clone(), channel.kind.api_family());

        for nick in nicks.split(',').filter(|n| !n.is_empty()) {
            let Some(user) = self.world.user_by_nick(nick) else {
                self.no_such_nick(id, nick);
                continue;
            };
            let user_id = user.id.clone();
            self.spawn_call(
                &format!("{}.{}", family, verb),
                vec![
                    ("channel".to_string(), chan_id.clone()),
                    ("user".to_string(), user_id),
                ],
            );
        }
    }

    fn cmd_mode(&mut self, id: u64, target: &str, args: &[String]) {
        if target.starts_with('#') {
            let Some(channel) = self.world.channel_by_name(strip_sigil(target)) else {
                self.reply(
                    id,
                    Response::ERR_NOSUCHCHANNEL,
                    vec![target.to_string(), "No such channel".to_string()],
                );
                return;
            };
            let irc_name = channel.irc_name();
            let modes = channel.kind.mode_string().to_string();

            if args.first().is_some_and(|a| a.contains('b')) {
                self.reply(
                    id,
                    Response::RPL_ENDOFBANLIST,
                    vec![irc_name, "End of channel ban list".to_string()],
                );
                return;
            }
            self.reply(id, Response::RPL_CHANNELMODEIS, vec![irc_name.clone(), modes]);
            self.reply(
                id,
                Response::RPL_CREATIONTIME,
                vec![irc_name, self.started_at.to_string()],
            );
            return;
        }

        let Some(client) = self.clients.get(&id) else {
            return;
        };
        if slackirc_proto::irc_eq(target, client.nick_or_star()) {
            self.reply(id, Response::RPL_UMODEIS, vec!["+i".to_string()]);
        }
    }

    fn cmd_topic(&mut self, id: u64, target: &str, topic: Option<String>) {
        let Some(channel) = self.world.channel_by_name(strip_sigil(target)) else {
            self.reply(
                id,
                Response::ERR_NOSUCHCHANNEL,
                vec![target.to_string(), "No such channel".to_string()],
            );
            return;
        };
        match topic {
            Some(topic) => {
                // The topic-change broadcast follows from the upstream
                // event, same as any other mutation.
                let method = format!("{}.setTopic", channel.kind.api_family());
                let chan_id = channel.id.clone();
                let wire_topic = translate::outbound(&self.world, &topic);
                self.spawn_call(
                    &method,
                    vec![
                        ("channel".to_string(), chan_id),
                        ("topic".to_string(), wire_topic),
                    ],
                );
            }
            None => {
                let args = vec![channel.irc_name(), channel.topic.clone()];
                self.reply(id, Response::RPL_TOPIC, args);
            }
        }
    }

    fn cmd_who(&mut self, id: u64, target: Option<&str>) {
        if let Some(target) = target
            && let Some(channel) = self.world.channel_by_name(strip_sigil(target))
        {
            let Some(client) = self.clients.get(&id) else {
                return;
            };
            let client_nick = client.nick_or_star().to_string();
            let irc_name = channel.irc_name();

            let mut rows: Vec<(String, String, &'static str, String)> = Vec::new();
            for uid in &channel.members {
                let Some(user) = self.world.user(uid) else {
                    continue;
                };
                let nick = if self.world.is_self(uid) {
                    client_nick.clone()
                } else {
                    user.nick.clone()
                };
                rows.push((
                    uid.clone(),
                    nick,
                    user.presence.who_flag(),
                    user.realname.clone(),
                ));
            }
            if channel.kind == ChannelKind::Group
                && let Some(me) = self.world.self_user()
            {
                rows.push((
                    me.id.clone(),
                    client_nick.clone(),
                    me.presence.who_flag(),
                    me.realname.clone(),
                ));
            }

            for (uid, nick, flag, realname) in rows {
                self.reply(
                    id,
                    Response::RPL_WHOREPLY,
                    vec![
                        irc_name.clone(),
                        uid,
                        SERVER_NAME.to_string(),
                        SERVER_NAME.to_string(),
                        nick,
                        flag.to_string(),
                        format!("0 {}", realname),
                    ],
                );
            }
        }
        self.reply(
            id,
            Response::RPL_ENDOFWHO,
            vec![
                target.unwrap_or("*").to_string(),
                "End of /WHO list".to_string(),
            ],
        );
    }

    fn cmd_whois(&mut self, id: u64, nick: &str) {
        if Router::is_gateway_nick(nick) {
            let x = crate::state::GATEWAY_NICK;
            self.reply(
                id,
                Response::RPL_WHOISUSER,
                vec![
                    x.to_string(),
                    x.to_string(),
                    SERVER_NAME.to_string(),
                    "*".to_string(),
                    "Gateway control".to_string(),
                ],
            );
            self.reply(
                id,
                Response::RPL_WHOISSERVER,
                vec![
                    x.to_string(),
                    SERVER_NAME.to_string(),
                    "Slack gateway".to_string(),
                ],
            );
            self.reply(
                id,
                Response::RPL_ENDOFWHOIS,
                vec![x.to_string(), "End of /WHOIS list".to_string()],
            );
            return;
        }

        // The client's own nick shadows the self user.
        let own_nick = self
            .clients
            .get(&id)
            .is_some_and(|c| slackirc_proto::irc_eq(c.nick_or_star(), nick));
        let user = if own_nick {
            self.world.self_user()
        } else {
            self.world.user_by_nick(nick)
        };
        let Some(user) = user else {
            self.no_such_nick(id, nick);
            self.reply(
                id,
                Response::RPL_ENDOFWHOIS,
                vec![nick.to_string(), "End of /WHOIS list".to_string()],
            );
            return;
        };

        let (uid, mut realname, away, channels) = (
            user.id.clone(),
            user.realname.clone(),
            user.presence == crate::state::Presence::Away,
            user.channels.clone(),
        );
        if own_nick
            && let Some(client_realname) =
                self.clients.get(&id).and_then(|c| c.realname.clone())
        {
            realname = client_realname;
        }
        self.reply(
            id,
            Response::RPL_WHOISUSER,
            vec![
                nick.to_string(),
                uid,
                SERVER_NAME.to_string(),
                "*".to_string(),
                realname,
            ],
        );
        self.reply(
            id,
            Response::RPL_WHOISSERVER,
            vec![
                nick.to_string(),
                SERVER_NAME.to_string(),
                "Slack gateway".to_string(),
            ],
        );
        if away {
            self.reply(
                id,
                Response::RPL_AWAY,
                vec![nick.to_string(), "Away".to_string()],
            );
        }
        let names: Vec<String> = channels
            .iter()
            .filter_map(|c| self.world.channel(c).map(|c| c.irc_name()))
            .collect();
        if !names.is_empty() {
            self.reply(
                id,
                Response::RPL_WHOISCHANNELS,
                vec![nick.to_string(), names.join(" ")],
            );
        }
        self.reply(
            id,
            Response::RPL_ENDOFWHOIS,
            vec![nick.to_string(), "End of /WHOIS list".to_string()],
        );
    }

    fn cmd_list(&mut self, id: u64) {
        self.reply(
            id,
            Response::RPL_LISTSTART,
            vec!["Channel".to_string(), "Users Name".to_string()],
        );
        let rows: Vec<(String, usize, String)> = self
            .world
            .channels()
            .map(|c| {
                let implied_self = (c.kind == ChannelKind::Group) as usize;
                (c.irc_name(), c.members.len() + implied_self, c.topic.clone())
            })
            .collect();
        for (name, count, topic) in rows {
            self.reply(
                id,
                Response::RPL_LIST,
                vec![name, count.to_string(), topic],
            );
        }
        self.reply(id, Response::RPL_LISTEND, vec!["End of /LIST".to_string()]);
    }

    fn cmd_privmsg(&mut self, id: u64, target: &str, text: &str) {
        if Router::is_gateway_nick(target) {
            self.dispatch_gateway(id, text);
            return;
        }

        if target.starts_with('#') {
            let Some(channel) = self.world.channel_by_name(strip_sigil(target)) else {
                self.reply(
                    id,
                    Response::ERR_NOSUCHCHANNEL,
                    vec![target.to_string(), "No such channel".to_string()],
                );
                return;
            };
            let chan_id = channel.id.clone();
            let wire = translate::outbound(&self.world, text);
            if let Some(live) = &self.live {
                live.rtm.send_message(&chan_id, &wire);
            }
            return;
        }

        let Some(user) = self.world.user_by_nick(target) else {
            self.no_such_nick(id, target);
            return;
        };
        let user_id = user.id.clone();
        let wire = translate::outbound(&self.world, text);
        self.send_to_user(&user_id, wire);
    }

    fn no_such_nick(&self, id: u64, name: &str) {
        self.reply(
            id,
            Response::ERR_NOSUCHNICK,
            vec![name.to_string(), "No such nick/channel".to_string()],
        );
    }
}

/// Drop a leading `#` if present; channel names are stored bare.
fn strip_sigil(target: &str) -> &str {
    target.strip_prefix('#').unwrap_or(target)
}
