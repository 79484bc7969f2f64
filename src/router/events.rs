//! Application of upstream events to the world.
//!
//! Each event mutates the world first and notifies clients only when the
//! mutation actually changed something, so replays and optimistic updates
//! from the command side never produce duplicate IRC lines.

use slackirc_proto::Command;
use tracing::debug;

use crate::state::{ChannelKind, Presence};
use crate::translate;
use crate::upstream::events::{ChannelInfo, MessageEvent, RtmEvent};

use super::{FileOrigin, Router};

impl Router {
    pub(super) fn apply_rtm(&mut self, event: RtmEvent) {
        match event {
            RtmEvent::Hello => debug!("RTM hello"),

            RtmEvent::Message(msg) => self.rtm_message(msg),

            RtmEvent::PresenceChange { user, presence } => {
                self.presence_change(&user, &presence);
            }
            RtmEvent::ManualPresenceChange { presence } => {
                if let Some(self_id) = self.world.self_id.clone() {
                    self.presence_change(&self_id, &presence);
                }
            }

            RtmEvent::ImOpen { user, channel } => self.dm_opened(&user, &channel),
            RtmEvent::ImClose { user, .. } => {
                self.world.clear_dm(&user);
            }

            RtmEvent::ChannelJoined { channel } => {
                self.self_joined(ChannelKind::Public, channel);
            }
            RtmEvent::GroupJoined { channel } => {
                self.self_joined(ChannelKind::Group, channel);
            }

            RtmEvent::ChannelLeft { channel } => {
                let Some(self_id) = self.world.self_id.clone() else {
                    return;
                };
                if self.world.part(&channel, &self_id) {
                    self.broadcast_self_part(&channel);
                }
            }
            RtmEvent::GroupLeft { channel } => {
                // Group membership is implied by presence in the world, so
                // "state changed" means the group is still there. A PART
                // command already removed it optimistically.
                if self.world.channel(&channel).is_some() {
                    self.broadcast_self_part(&channel);
                    self.world.delete_channel(&channel);
                }
            }

            RtmEvent::ChannelArchive { channel } | RtmEvent::GroupArchive { channel } => {
                let was_in = self
                    .world
                    .channel(&channel)
                    .is_some_and(|c| self.self_is_in(c));
                if was_in {
                    self.broadcast_self_part(&channel);
                }
                self.world.delete_channel(&channel);
            }

            RtmEvent::MemberJoinedChannel { user, channel } => {
                self.note_unknown_user(&user);
                if self.world.join(&channel, &user)
                    && let Some(name) = self.world.channel(&channel).map(|c| c.irc_name())
                {
                    self.broadcast_from_user(&user, Command::JOIN(name));
                }
            }
            RtmEvent::MemberLeftChannel { user, channel } => {
                if self.world.part(&channel, &user)
                    && let Some(name) = self.world.channel(&channel).map(|c| c.irc_name())
                {
                    self.broadcast_from_user(&user, Command::PART(name, None));
                }
            }

            // The RTM socket's own ping counter already consumed this.
            RtmEvent::Pong { .. } => debug!("RTM pong (router)"),

            RtmEvent::Error { error } => {
                self.broadcast_notice(&format!("RTM error: {}", error.msg));
            }

            RtmEvent::Unknown => {}
        }
    }

    fn presence_change(&mut self, user_id: &str, presence: &str) {
        let presence = Presence::from_api(presence);
        let Some(user) = self.world.user_mut(user_id) else {
            return;
        };
        let changed = user.presence != presence;
        user.presence = presence;

        if changed && self.world.is_self(user_id) {
            for id in self.ready_clients() {
                self.send_away_numeric(id, presence == Presence::Away);
            }
        }
    }

    /// channel_joined / group_joined: fold the snapshot in and announce
    /// the self JOIN when membership actually appeared.
    fn self_joined(&mut self, kind: ChannelKind, info: ChannelInfo) {
        let self_id = self.world.self_id.clone().unwrap_or_default();
        let update = self.world.update_channel(
            kind,
            &info.id,
            &info.name,
            Some(info.topic_value()),
            &info.members,
        );
        for user_id in update.stubbed {
            self.spawn_users_info(user_id);
        }

        let newly_in = update.created || update.joined.iter().any(|u| *u == self_id);
        if newly_in
            && let Some(name) = self.world.channel(&info.id).map(|c| c.irc_name())
        {
            self.broadcast_from_user(&self_id, Command::JOIN(name));
        }
    }

    fn broadcast_self_part(&self, channel_id: &str) {
        let (Some(self_id), Some(name)) = (
            self.world.self_id.clone(),
            self.world.channel(channel_id).map(|c| c.irc_name()),
        ) else {
            return;
        };
        self.broadcast_from_user(&self_id, Command::PART(name, None));
    }

    fn rtm_message(&mut self, msg: MessageEvent) {
        let Some(author) = msg.author().map(str::to_string) else {
            debug!("Message event with no author, ignoring");
            return;
        };
        self.note_unknown_user(&author);

        let known_channel = msg
            .channel
            .as_deref()
            .filter(|c| self.world.channel(c).is_some())
            .map(str::to_string);

        if let Some(chan_id) = known_channel {
            match msg.subtype.as_deref() {
                Some("channel_topic") | Some("group_topic") => {
                    self.topic_changed(&chan_id, &author, msg.topic.as_deref().unwrap_or(""));
                }
                _ => {
                    let body = compose_body(&msg);
                    self.emit_message(Some(&chan_id), &author, &body);
                    if let Some(ts) = &msg.ts {
                        self.schedule_mark(&chan_id, ts);
                    }
                    self.maybe_fetch_shared_file(&msg, Some(chan_id), &author);
                }
            }
        } else {
            // No (known) channel: a direct message from the author.
            let body = compose_body(&msg);
            self.emit_message(None, &author, &body);
            self.maybe_fetch_shared_file(&msg, None, &author);
        }
    }

    fn topic_changed(&mut self, chan_id: &str, author: &str, topic: &str) {
        if let Some(channel) = self.world.channel_mut(chan_id) {
            channel.topic = topic.to_string();
        }
        let Some(irc_name) = self.world.channel(chan_id).map(|c| c.irc_name()) else {
            return;
        };
        for id in self.ready_clients() {
            let Some(client) = self.clients.get(&id) else {
                continue;
            };
            let rendered = translate::inbound(&self.world, client.nick_or_star(), topic);
            if let Some(out) = self.prefixed(
                id,
                author,
                Command::TOPIC(irc_name.clone(), Some(rendered)),
            ) {
                self.send(id, out);
            }
        }
    }

    /// `file_share` carries the file body as a follow-up message with a
    /// `>file_id` subtype marker once the fetch completes.
    fn maybe_fetch_shared_file(
        &mut self,
        msg: &MessageEvent,
        channel: Option<String>,
        author: &str,
    ) {
        if msg.subtype.as_deref() == Some("file_share")
            && let Some(file) = &msg.file
        {
            self.spawn_file_fetch(
                file.id.clone(),
                FileOrigin::Share {
                    channel,
                    author: author.to_string(),
                },
            );
        }
    }
}

/// Body text plus flattened attachments, each attachment on its own line,
/// with the subtype marker prepended when present.
fn compose_body(msg: &MessageEvent) -> String {
    let mut body = msg.text.clone().unwrap_or_default();
    for attachment in &msg.attachments {
        let flat = translate::flatten_attachment(
            attachment.title.as_deref(),
            attachment.text.as_deref(),
            attachment.title_link.as_deref(),
        );
        if flat.is_empty() {
            continue;
        }
        if !body.is_empty() {
            body.push('\n');
        }
        body.push_str(&flat);
    }
    match &msg.subtype {
        Some(subtype) => format!("{}{}", translate::subtype_marker(subtype), body),
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_prepends_subtype_and_appends_attachments() {
        let msg = MessageEvent {
            text: Some("body".to_string()),
            subtype: Some("me_message".to_string()),
            attachments: vec![crate::upstream::events::Attachment {
                title: Some("t".to_string()),
                text: Some("x".to_string()),
                title_link: Some("l".to_string()),
            }],
            ..Default::default()
        };
        assert_eq!(compose_body(&msg), "\u{2}[me_message]\u{2} body\nt x l");
    }

    #[test]
    fn compose_plain_message_is_untouched() {
        let msg = MessageEvent {
            text: Some("hello".to_string()),
            ..Default::default()
        };
        assert_eq!(compose_body(&msg), "hello");
    }
}
