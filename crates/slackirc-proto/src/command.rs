//! IRC command types.
//!
//! Typed variants cover the vocabulary common clients send at a gateway and
//! the commands the gateway emits back. Everything else is preserved in
//! [`Command::Raw`] so the dispatcher can ignore it without losing the line.

use crate::response::Response;

/// An IRC command with its parameters.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// `NICK nickname`
    NICK(String),
    /// `PASS password`
    PASS(String),
    /// `USER username mode unused :realname`
    USER(String, String, String, String),
    /// `AWAY [:message]`
    AWAY(Option<String>),
    /// `PING token`
    PING(String),
    /// `PONG :token`
    PONG(String),
    /// `JOIN channel`
    JOIN(String),
    /// `PART channel [:message]`
    PART(String, Option<String>),
    /// `INVITE nickname channel`
    INVITE(String, String),
    /// `KICK channel nicks [:comment]`
    KICK(String, String, Option<String>),
    /// `MODE target [args...]`
    MODE(String, Vec<String>),
    /// `TOPIC channel [:topic]`
    TOPIC(String, Option<String>),
    /// `NAMES [channel]`
    NAMES(Option<String>),
    /// `WHO [mask]`
    WHO(Option<String>),
    /// `WHOIS nickname`
    WHOIS(String),
    /// `LIST`
    LIST,
    /// `MOTD`
    MOTD,
    /// `PRIVMSG target :text`
    PRIVMSG(String, String),
    /// `NOTICE target :text`
    NOTICE(String, String),
    /// `QUIT [:message]`
    QUIT(Option<String>),
    /// `ERROR :reason` - sent by the gateway before closing a connection.
    ERROR(String),
    /// A numeric reply with its arguments; the final argument is trailing.
    Response(Response, Vec<String>),
    /// Anything not in the vocabulary above.
    Raw(String, Vec<String>),
}

fn opt(args: &[String], idx: usize) -> Option<String> {
    args.get(idx).cloned()
}

impl Command {
    /// Build a command from an upcased command word and its arguments.
    ///
    /// Never fails: commands with missing required arguments, and unknown
    /// commands, become [`Command::Raw`] and are left to the dispatcher.
    pub fn new(word: &str, args: Vec<String>) -> Command {
        let raw = || Command::Raw(word.to_string(), args.clone());
        match word {
            "NICK" => match args.first() {
                Some(n) if !n.is_empty() => Command::NICK(n.clone()),
                _ => raw(),
            },
            "PASS" => match args.first() {
                Some(p) => Command::PASS(p.clone()),
                None => raw(),
            },
            "USER" => match (args.first(), args.get(3)) {
                (Some(u), Some(r)) => Command::USER(
                    u.clone(),
                    args[1].clone(),
                    args[2].clone(),
                    r.clone(),
                ),
                (Some(u), None) => Command::USER(
                    u.clone(),
                    opt(&args, 1).unwrap_or_default(),
                    opt(&args, 2).unwrap_or_default(),
                    String::new(),
                ),
                _ => raw(),
            },
            "AWAY" => Command::AWAY(opt(&args, 0).filter(|m| !m.is_empty())),
            "PING" => Command::PING(opt(&args, 0).unwrap_or_default()),
            "PONG" => Command::PONG(opt(&args, 0).unwrap_or_default()),
            "JOIN" => match args.first() {
                Some(c) if !c.is_empty() => Command::JOIN(c.clone()),
                _ => raw(),
            },
            "PART" => match args.first() {
                Some(c) if !c.is_empty() => Command::PART(c.clone(), opt(&args, 1)),
                _ => raw(),
            },
            "INVITE" => match (args.first(), args.get(1)) {
                (Some(n), Some(c)) => Command::INVITE(n.clone(), c.clone()),
                _ => raw(),
            },
            "KICK" => match (args.first(), args.get(1)) {
                (Some(c), Some(n)) => Command::KICK(c.clone(), n.clone(), opt(&args, 2)),
                _ => raw(),
            },
            "MODE" => match args.first() {
                Some(t) => Command::MODE(t.clone(), args[1..].to_vec()),
                None => raw(),
            },
            "TOPIC" => match args.first() {
                Some(c) => Command::TOPIC(c.clone(), opt(&args, 1)),
                None => raw(),
            },
            "NAMES" => Command::NAMES(opt(&args, 0)),
            "WHO" => Command::WHO(opt(&args, 0)),
            "WHOIS" => match args.first() {
                Some(n) => Command::WHOIS(n.clone()),
                None => raw(),
            },
            "LIST" => Command::LIST,
            "MOTD" => Command::MOTD,
            "PRIVMSG" => match (args.first(), args.get(1)) {
                (Some(t), Some(m)) => Command::PRIVMSG(t.clone(), m.clone()),
                _ => raw(),
            },
            "NOTICE" => match (args.first(), args.get(1)) {
                (Some(t), Some(m)) => Command::NOTICE(t.clone(), m.clone()),
                _ => raw(),
            },
            "QUIT" => Command::QUIT(opt(&args, 0)),
            "ERROR" => Command::ERROR(opt(&args, 0).unwrap_or_default()),
            _ => raw(),
        }
    }

    /// Decompose into wire parts: command word, middle arguments, trailing.
    ///
    /// The trailing argument is the one the encoder prefixes with `:` and
    /// allows spaces in; middle arguments are sanitised to single tokens.
    pub fn to_parts(&self) -> (String, Vec<&str>, Option<&str>) {
        use Command::*;
        match self {
            NICK(n) => ("NICK".into(), vec![n.as_str()], None),
            PASS(p) => ("PASS".into(), vec![p.as_str()], None),
            USER(u, m, x, r) => (
                "USER".into(),
                vec![u.as_str(), m.as_str(), x.as_str()],
                Some(r.as_str()),
            ),
            AWAY(Some(m)) => ("AWAY".into(), vec![], Some(m.as_str())),
            AWAY(None) => ("AWAY".into(), vec![], None),
            PING(t) => ("PING".into(), vec![], Some(t.as_str())),
            PONG(t) => ("PONG".into(), vec![], Some(t.as_str())),
            JOIN(c) => ("JOIN".into(), vec![c.as_str()], None),
            PART(c, Some(m)) => ("PART".into(), vec![c.as_str()], Some(m.as_str())),
            PART(c, None) => ("PART".into(), vec![c.as_str()], None),
            INVITE(n, c) => ("INVITE".into(), vec![n.as_str(), c.as_str()], None),
            KICK(c, n, Some(m)) => ("KICK".into(), vec![c.as_str(), n.as_str()], Some(m.as_str())),
            KICK(c, n, None) => ("KICK".into(), vec![c.as_str(), n.as_str()], None),
            MODE(t, args) => {
                let mut v = vec![t.as_str()];
                v.extend(args.iter().map(|a| a.as_str()));
                ("MODE".into(), v, None)
            }
            TOPIC(c, Some(t)) => ("TOPIC".into(), vec![c.as_str()], Some(t.as_str())),
            TOPIC(c, None) => ("TOPIC".into(), vec![c.as_str()], None),
            NAMES(Some(c)) => ("NAMES".into(), vec![c.as_str()], None),
            NAMES(None) => ("NAMES".into(), vec![], None),
            WHO(Some(m)) => ("WHO".into(), vec![m.as_str()], None),
            WHO(None) => ("WHO".into(), vec![], None),
            WHOIS(n) => ("WHOIS".into(), vec![n.as_str()], None),
            LIST => ("LIST".into(), vec![], None),
            MOTD => ("MOTD".into(), vec![], None),
            PRIVMSG(t, m) => ("PRIVMSG".into(), vec![t.as_str()], Some(m.as_str())),
            NOTICE(t, m) => ("NOTICE".into(), vec![t.as_str()], Some(m.as_str())),
            QUIT(Some(m)) => ("QUIT".into(), vec![], Some(m.as_str())),
            QUIT(None) => ("QUIT".into(), vec![], None),
            ERROR(m) => ("ERROR".into(), vec![], Some(m.as_str())),
            Response(code, args) => {
                let (middle, trailing) = match args.split_last() {
                    Some((last, rest)) => {
                        (rest.iter().map(|a| a.as_str()).collect(), Some(last.as_str()))
                    }
                    None => (vec![], None),
                };
                (code.to_string(), middle, trailing)
            }
            Raw(word, args) => {
                (word.clone(), args.iter().map(|a| a.as_str()).collect(), None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_commands_parse_into_variants() {
        assert_eq!(
            Command::new("NICK", vec!["alice".into()]),
            Command::NICK("alice".into())
        );
        assert_eq!(
            Command::new("PRIVMSG", vec!["#general".into(), "hi there".into()]),
            Command::PRIVMSG("#general".into(), "hi there".into())
        );
        assert_eq!(Command::new("LIST", vec![]), Command::LIST);
    }

    #[test]
    fn short_or_unknown_commands_become_raw() {
        assert!(matches!(Command::new("PRIVMSG", vec!["bob".into()]), Command::Raw(..)));
        assert!(matches!(
            Command::new("CAP", vec!["LS".into(), "302".into()]),
            Command::Raw(..)
        ));
    }

    #[test]
    fn response_splits_off_trailing() {
        let cmd = Command::Response(
            Response::RPL_TOPIC,
            vec!["alice".into(), "#general".into(), "the topic".into()],
        );
        let (word, middle, trailing) = cmd.to_parts();
        assert_eq!(word, "332");
        assert_eq!(middle, vec!["alice", "#general"]);
        assert_eq!(trailing, Some("the topic"));
    }
}
