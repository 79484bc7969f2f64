//! Configuration loading.
//!
//! The config file is one `key=value` per line. Lines whose key is not made
//! of `[-_0-9a-zA-Z]` characters (comments, blanks, prose) are ignored, as
//! are keys the gateway does not know.

use std::path::PathBuf;

use tracing::debug;

use crate::error::ConfigError;

/// Default IRC listener port.
pub const DEFAULT_PORT: u16 = 6667;

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Upstream API credential.
    pub slack_token: String,
    /// Optional IRC server password. When unset, PASS is not required.
    pub password: Option<String>,
    /// TCP port for the loopback listener.
    pub port: u16,
    /// Unix stream socket path; overrides `port` when set.
    pub unix_socket: Option<PathBuf>,
    /// Wire-level logging of raw frames and lines.
    pub debug_dump: bool,
}

impl Config {
    /// Load and validate a config file.
    pub fn load(path: &str) -> Result<Config, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_string(),
            source,
        })?;
        Config::parse(&text)
    }

    fn parse(text: &str) -> Result<Config, ConfigError> {
        let mut slack_token = None;
        let mut password = None;
        let mut port = DEFAULT_PORT;
        let mut unix_socket = None;
        let mut debug_dump = false;

        for line in text.lines() {
            let Some((key, value)) = recognize(line) else {
                continue;
            };
            match key {
                "slack_token" => slack_token = Some(value.to_string()),
                "password" => password = Some(value.to_string()),
                "port" => {
                    port = value.parse().map_err(|_| ConfigError::InvalidValue {
                        key: "port",
                        value: value.to_string(),
                    })?;
                }
                "unix_socket" => unix_socket = Some(PathBuf::from(value)),
                "debug_dump" => debug_dump = value == "1",
                other => debug!(key = %other, "Ignoring unknown config key"),
            }
        }

        let slack_token = slack_token
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingKey("slack_token"))?;

        Ok(Config {
            slack_token,
            password,
            port,
            unix_socket,
            debug_dump,
        })
    }
}

/// Match a `key=value` line. The key must be `[-_0-9a-zA-Z]+`; anything
/// else is not a config line.
fn recognize(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    if key.is_empty() {
        return None;
    }
    if key
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        Some((key, value))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_file() {
        let cfg = Config::parse(
            "# gateway config\n\
             slack_token=xoxp-1234\n\
             password=secret\n\
             port=7000\n\
             debug_dump=1\n",
        )
        .unwrap();
        assert_eq!(cfg.slack_token, "xoxp-1234");
        assert_eq!(cfg.password.as_deref(), Some("secret"));
        assert_eq!(cfg.port, 7000);
        assert!(cfg.debug_dump);
        assert!(cfg.unix_socket.is_none());
    }

    #[test]
    fn unrecognized_lines_are_ignored() {
        let cfg = Config::parse(
            "just some prose\n\
             ; comment=nope? no, the key has ';' in it\n\
             =value-without-key\n\
             slack_token=tok\n",
        )
        .unwrap();
        assert_eq!(cfg.slack_token, "tok");
        assert_eq!(cfg.port, DEFAULT_PORT);
    }

    #[test]
    fn missing_token_is_fatal() {
        assert!(matches!(
            Config::parse("port=6667\n"),
            Err(ConfigError::MissingKey("slack_token"))
        ));
    }

    #[test]
    fn bad_port_is_fatal() {
        assert!(matches!(
            Config::parse("slack_token=tok\nport=not-a-port\n"),
            Err(ConfigError::InvalidValue { key: "port", .. })
        ));
    }

    #[test]
    fn unix_socket_overrides_port_binding() {
        let cfg = Config::parse("slack_token=tok\nunix_socket=/tmp/slackirc.sock\n").unwrap();
        assert_eq!(
            cfg.unix_socket.as_deref(),
            Some(std::path::Path::new("/tmp/slackirc.sock"))
        );
    }

    #[test]
    fn load_reads_a_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slackirc.conf");
        std::fs::write(&path, "slack_token=tok\nport=7001\n").unwrap();
        let cfg = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.port, 7001);
    }

    #[test]
    fn load_of_a_missing_file_is_fatal() {
        assert!(matches!(
            Config::load("/nonexistent/slackirc.conf"),
            Err(ConfigError::Unreadable { .. })
        ));
    }
}
