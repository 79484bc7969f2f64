//! Typed upstream payloads.
//!
//! Every frame on the event stream is a JSON object with a `type` field;
//! they parse into [`RtmEvent`] with unknown types mapping to an ignored
//! variant, so one unrecognized or half-formed frame can never kill the
//! session. The bootstrap snapshot types live here too.

use serde::Deserialize;

/// The local identity, from the bootstrap snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct SelfInfo {
    pub id: String,
    pub name: String,
}

/// A user record, from the snapshot or `users.info`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub presence: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

/// A bot record. Bots are projected as users.
#[derive(Debug, Clone, Deserialize)]
pub struct BotInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopicInfo {
    #[serde(default)]
    pub value: String,
}

/// A channel or group record.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_member: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub topic: Option<TopicInfo>,
    #[serde(default)]
    pub members: Vec<String>,
}

impl ChannelInfo {
    pub fn topic_value(&self) -> &str {
        self.topic.as_ref().map(|t| t.value.as_str()).unwrap_or("")
    }
}

/// A direct-message conduit record.
#[derive(Debug, Clone, Deserialize)]
pub struct ImInfo {
    pub id: String,
    pub user: String,
}

/// The `rtm.start` response: stream URL plus the full workspace snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct Snapshot {
    pub url: String,
    #[serde(rename = "self")]
    pub self_info: SelfInfo,
    #[serde(default)]
    pub users: Vec<UserInfo>,
    #[serde(default)]
    pub channels: Vec<ChannelInfo>,
    #[serde(default)]
    pub groups: Vec<ChannelInfo>,
    #[serde(default)]
    pub ims: Vec<ImInfo>,
    #[serde(default)]
    pub bots: Vec<BotInfo>,
}

/// File metadata from `files.info`.
#[derive(Debug, Clone, Deserialize)]
pub struct FileInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub url_private: Option<String>,
}

/// An attachment hanging off a message event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Attachment {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub title_link: Option<String>,
}

/// A comment reference inside a message event (file comments carry the
/// author here instead of in `user`).
#[derive(Debug, Clone, Deserialize)]
pub struct CommentInfo {
    pub user: String,
}

/// A file reference inside a `file_share` message.
#[derive(Debug, Clone, Deserialize)]
pub struct FileRef {
    pub id: String,
}

/// The `message` event payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageEvent {
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub comment: Option<CommentInfo>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    /// New topic value, on `channel_topic` / `group_topic` subtypes.
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub file: Option<FileRef>,
}

impl MessageEvent {
    /// Resolve the author id: `user`, then `comment.user`, then `bot_id`.
    pub fn author(&self) -> Option<&str> {
        self.user
            .as_deref()
            .or_else(|| self.comment.as_ref().map(|c| c.user.as_str()))
            .or(self.bot_id.as_deref())
    }
}

/// An error frame's detail object.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub msg: String,
}

/// One frame from the event stream.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RtmEvent {
    Hello,
    Message(MessageEvent),
    PresenceChange {
        user: String,
        presence: String,
    },
    /// Self changed its own presence; the payload carries no user id.
    ManualPresenceChange {
        presence: String,
    },
    ImOpen {
        user: String,
        channel: String,
    },
    ImClose {
        user: String,
        channel: String,
    },
    ChannelJoined {
        channel: ChannelInfo,
    },
    GroupJoined {
        channel: ChannelInfo,
    },
    ChannelLeft {
        channel: String,
    },
    GroupLeft {
        channel: String,
    },
    ChannelArchive {
        channel: String,
    },
    GroupArchive {
        channel: String,
    },
    MemberJoinedChannel {
        user: String,
        channel: String,
    },
    MemberLeftChannel {
        user: String,
        channel: String,
    },
    Pong {
        #[serde(default)]
        reply_to: Option<u64>,
    },
    Error {
        error: ErrorDetail,
    },
    /// Anything else on the stream. Ignored.
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_events_parse() {
        let event: RtmEvent = serde_json::from_str(
            r#"{"type":"message","channel":"C1","user":"U1","text":"hi","ts":"1.0"}"#,
        )
        .unwrap();
        let RtmEvent::Message(msg) = event else {
            panic!("expected message event");
        };
        assert_eq!(msg.channel.as_deref(), Some("C1"));
        assert_eq!(msg.author(), Some("U1"));
        assert_eq!(msg.text.as_deref(), Some("hi"));
    }

    #[test]
    fn author_resolution_order() {
        let msg: MessageEvent = serde_json::from_str(
            r#"{"comment":{"user":"U_C"},"bot_id":"B1"}"#,
        )
        .unwrap();
        assert_eq!(msg.author(), Some("U_C"));

        let msg: MessageEvent = serde_json::from_str(r#"{"bot_id":"B1"}"#).unwrap();
        assert_eq!(msg.author(), Some("B1"));
    }

    #[test]
    fn unknown_event_types_map_to_unknown() {
        let event: RtmEvent =
            serde_json::from_str(r#"{"type":"reaction_added","user":"U1"}"#).unwrap();
        assert!(matches!(event, RtmEvent::Unknown));
    }

    #[test]
    fn snapshot_parses_with_self_rename() {
        let snapshot: Snapshot = serde_json::from_str(
            r#"{
                "url": "wss://example/ws",
                "self": {"id": "U1", "name": "me"},
                "users": [{"id": "U2", "name": "bob"}],
                "channels": [{"id": "C1", "name": "general", "is_member": true,
                              "topic": {"value": "hello"}, "members": ["U1", "U2"]}],
                "ims": [{"id": "D1", "user": "U2"}]
            }"#,
        )
        .unwrap();
        assert_eq!(snapshot.self_info.id, "U1");
        assert_eq!(snapshot.channels[0].topic_value(), "hello");
        assert_eq!(snapshot.ims[0].id, "D1");
        assert!(snapshot.groups.is_empty());
    }

    #[test]
    fn pong_frames_carry_reply_to() {
        let event: RtmEvent = serde_json::from_str(r#"{"type":"pong","reply_to":7}"#).unwrap();
        assert!(matches!(event, RtmEvent::Pong { reply_to: Some(7) }));
    }
}
