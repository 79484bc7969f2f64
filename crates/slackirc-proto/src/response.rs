//! Numeric replies.
//!
//! Only the numerics the gateway actually emits are represented. The set is
//! intentionally small: a loopback gateway answers common clients, it does
//! not chase full RFC coverage.

/// Numeric reply codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
#[repr(u16)]
pub enum Response {
    RPL_WELCOME = 1,
    RPL_YOURHOST = 2,
    RPL_CREATED = 3,
    RPL_UMODEIS = 221,
    RPL_AWAY = 301,
    RPL_UNAWAY = 305,
    RPL_NOWAWAY = 306,
    RPL_WHOISUSER = 311,
    RPL_WHOISSERVER = 312,
    RPL_ENDOFWHO = 315,
    RPL_ENDOFWHOIS = 318,
    RPL_WHOISCHANNELS = 319,
    RPL_LISTSTART = 321,
    RPL_LIST = 322,
    RPL_LISTEND = 323,
    RPL_CHANNELMODEIS = 324,
    RPL_CREATIONTIME = 329,
    RPL_TOPIC = 332,
    RPL_WHOREPLY = 352,
    RPL_NAMREPLY = 353,
    RPL_ENDOFNAMES = 366,
    RPL_ENDOFBANLIST = 368,
    RPL_MOTD = 372,
    RPL_ENDOFMOTD = 376,
    ERR_NOSUCHNICK = 401,
    ERR_NOSUCHCHANNEL = 403,
    ERR_NICKNAMEINUSE = 433,
}

impl Response {
    /// The three-digit wire code.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Whether this numeric reports an error condition.
    pub fn is_error(self) -> bool {
        self.code() >= 400
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:03}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_render_zero_padded() {
        assert_eq!(Response::RPL_WELCOME.to_string(), "001");
        assert_eq!(Response::RPL_UMODEIS.to_string(), "221");
        assert_eq!(Response::ERR_NOSUCHNICK.to_string(), "401");
    }

    #[test]
    fn error_classification() {
        assert!(Response::ERR_NICKNAMEINUSE.is_error());
        assert!(!Response::RPL_TOPIC.is_error());
    }
}
