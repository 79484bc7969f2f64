//! IRC message model: parsing and wire encoding.
//!
//! Inbound lines are split on runs of spaces; a token beginning with `:`
//! starts the trailing argument, which runs to end-of-line. Outbound
//! encoding sanitises middle arguments down to single clean tokens (empty
//! ones become `*`) and maps line breaks out of the trailing argument, so a
//! hostile upstream string can never break message framing.

use std::fmt;
use std::str::FromStr;

use crate::command::Command;
use crate::error::ProtocolError;

/// The source of a message.
#[derive(Clone, Debug, PartialEq)]
pub enum Prefix {
    /// A server origin, e.g. `:localhost`.
    Server(String),
    /// A user origin, e.g. `:nick!user@host`.
    User {
        /// Nickname part.
        nick: String,
        /// Username part.
        user: String,
        /// Host part.
        host: String,
    },
}

impl Prefix {
    /// Parse a prefix token (without the leading `:`).
    pub fn parse(token: &str) -> Prefix {
        if let Some((nick, rest)) = token.split_once('!') {
            let (user, host) = rest.split_once('@').unwrap_or((rest, ""));
            Prefix::User {
                nick: nick.to_string(),
                user: user.to_string(),
                host: host.to_string(),
            }
        } else {
            Prefix::Server(token.to_string())
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::Server(name) => f.write_str(name),
            Prefix::User { nick, user, host } => write!(f, "{}!{}@{}", nick, user, host),
        }
    }
}

/// A complete IRC message.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    /// Optional source.
    pub prefix: Option<Prefix>,
    /// The command and its parameters.
    pub command: Command,
}

impl Message {
    /// Construct a message with no prefix.
    pub fn from_command(command: Command) -> Message {
        Message { prefix: None, command }
    }

    /// Construct a message with a server prefix.
    pub fn from_server(server: &str, command: Command) -> Message {
        Message {
            prefix: Some(Prefix::Server(server.to_string())),
            command,
        }
    }

    /// Construct a message with a `nick!user@host` prefix.
    pub fn from_user(nick: &str, user: &str, host: &str, command: Command) -> Message {
        Message {
            prefix: Some(Prefix::User {
                nick: nick.to_string(),
                user: user.to_string(),
                host: host.to_string(),
            }),
            command,
        }
    }
}

impl From<Command> for Message {
    fn from(command: Command) -> Message {
        Message::from_command(command)
    }
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Message, ProtocolError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut rest = line.trim_start_matches(' ');
        if rest.is_empty() {
            return Err(ProtocolError::EmptyMessage);
        }

        let prefix = if let Some(after) = rest.strip_prefix(':') {
            let (token, tail) = split_token(after);
            if token.is_empty() {
                return Err(ProtocolError::MalformedPrefix(line.to_string()));
            }
            rest = tail;
            Some(Prefix::parse(token))
        } else {
            None
        };

        let (word, mut tail) = split_token(rest);
        if word.is_empty() {
            return Err(ProtocolError::EmptyMessage);
        }

        let mut args: Vec<String> = Vec::new();
        loop {
            if tail.is_empty() {
                break;
            }
            if let Some(trailing) = tail.strip_prefix(':') {
                args.push(trailing.to_string());
                break;
            }
            let (token, next) = split_token(tail);
            args.push(token.to_string());
            tail = next;
        }

        Ok(Message {
            prefix,
            command: Command::new(&word.to_ascii_uppercase(), args),
        })
    }
}

/// Take one token off the front, skipping the run of spaces after it.
fn split_token(s: &str) -> (&str, &str) {
    match s.find(' ') {
        Some(idx) => (&s[..idx], s[idx..].trim_start_matches(' ')),
        None => (s, ""),
    }
}

/// Clean a middle argument down to a single safe token.
///
/// Strips TAB, CR, LF, NUL, space and any leading `:`; an argument left
/// empty is replaced with `*` so the line stays parseable.
fn sanitize_middle(arg: &str) -> String {
    let cleaned: String = arg
        .chars()
        .filter(|c| !matches!(c, '\t' | '\r' | '\n' | '\0' | ' '))
        .collect();
    let cleaned = cleaned.trim_start_matches(':');
    if cleaned.is_empty() {
        "*".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Clean a trailing argument: line breaks and NUL become spaces.
fn sanitize_trailing(arg: &str) -> String {
    arg.chars()
        .map(|c| if matches!(c, '\r' | '\n' | '\0') { ' ' } else { c })
        .collect()
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, ":{} ", prefix)?;
        }
        let (word, middle, trailing) = self.command.to_parts();
        f.write_str(&word)?;
        for arg in middle {
            write!(f, " {}", sanitize_middle(arg))?;
        }
        if let Some(trailing) = trailing {
            write!(f, " :{}", sanitize_trailing(trailing))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::Response;

    fn parse(line: &str) -> Message {
        line.parse().expect("line should parse")
    }

    #[test]
    fn parses_command_and_args() {
        let msg = parse("PRIVMSG #general :hello <@bob> & bye\r\n");
        assert_eq!(msg.prefix, None);
        assert_eq!(
            msg.command,
            Command::PRIVMSG("#general".into(), "hello <@bob> & bye".into())
        );
    }

    #[test]
    fn splits_on_runs_of_spaces() {
        let msg = parse("USER a   0  *  :Alice Liddell");
        assert_eq!(
            msg.command,
            Command::USER("a".into(), "0".into(), "*".into(), "Alice Liddell".into())
        );
    }

    #[test]
    fn command_word_is_case_insensitive() {
        let msg = parse("privmsg bob :hi");
        assert_eq!(msg.command, Command::PRIVMSG("bob".into(), "hi".into()));
    }

    #[test]
    fn parses_prefixes() {
        let msg = parse(":alice!U123@localhost PART #general");
        assert_eq!(
            msg.prefix,
            Some(Prefix::User {
                nick: "alice".into(),
                user: "U123".into(),
                host: "localhost".into(),
            })
        );

        let msg = parse(":localhost PING :token");
        assert_eq!(msg.prefix, Some(Prefix::Server("localhost".into())));
    }

    #[test]
    fn empty_lines_are_rejected() {
        assert!("".parse::<Message>().is_err());
        assert!("   ".parse::<Message>().is_err());
    }

    #[test]
    fn encodes_with_trailing_colon() {
        let msg = Message::from_server(
            "localhost",
            Command::Response(
                Response::RPL_TOPIC,
                vec!["alice".into(), "#general".into(), "topic with spaces".into()],
            ),
        );
        assert_eq!(msg.to_string(), ":localhost 332 alice #general :topic with spaces");
    }

    #[test]
    fn middle_args_are_sanitised() {
        let msg = Message::from_command(Command::JOIN("#ge n\neral".into()));
        assert_eq!(msg.to_string(), "JOIN #general");

        let msg = Message::from_command(Command::NICK("".into()));
        assert_eq!(msg.to_string(), "NICK *");
    }

    #[test]
    fn trailing_newlines_cannot_split_frames() {
        let msg = Message::from_command(Command::PRIVMSG(
            "#general".into(),
            "line one\nQUIT :injected".into(),
        ));
        assert_eq!(msg.to_string(), "PRIVMSG #general :line one QUIT :injected");
    }

    #[test]
    fn round_trips_a_notice() {
        let original = Message::from_user(
            "X",
            "X",
            "localhost",
            Command::NOTICE("alice".into(), "archived #dead".into()),
        );
        let reparsed: Message = original.to_string().parse().unwrap();
        assert_eq!(reparsed, original);
    }
}
