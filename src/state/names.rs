//! Name arbitration.
//!
//! Remote display names are free text; IRC names are not. The arbiter turns
//! a proposed remote name into an IRC-legal name that is unique under
//! RFC 1459 folding within its map and never collides with the reserved
//! gateway nick.

use slackirc_proto::irc_to_lower;

/// The gateway pseudo-user. Reserved under case folding, so arbitration of
/// a remote user literally named `x` yields `x1`.
pub const GATEWAY_NICK: &str = "X";

/// Bytes that would break IRC tokenisation or targeting if they appeared
/// in a name.
fn is_illegal(b: u8) -> bool {
    matches!(b, b'#' | b' ' | b',' | b'<' | b'>' | b'!' | b'\0' | b'\r' | b'\n' | b':')
}

/// Replace illegal bytes with `_`. An empty result becomes the fallback
/// base `_` so arbitration always has something to suffix.
pub fn sanitize_name(proposed: &str) -> String {
    if proposed.is_empty() {
        return "_".to_string();
    }
    let bytes: Vec<u8> = proposed
        .bytes()
        .map(|b| if is_illegal(b) { b'_' } else { b })
        .collect();
    // Only ASCII bytes are rewritten, so valid UTF-8 stays valid.
    String::from_utf8(bytes)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Pick a free name for `proposed`.
///
/// `is_taken` is consulted with folded candidates. The sanitised name is
/// used as-is when free; otherwise decimal suffixes `1, 2, 3, …` are tried
/// in order, so the result is deterministic for a given map.
pub fn arbitrate<F>(proposed: &str, is_taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    let base = sanitize_name(proposed);
    let reserved = irc_to_lower(GATEWAY_NICK);

    let free = |candidate: &str| {
        let folded = irc_to_lower(candidate);
        folded != reserved && !is_taken(&folded)
    };

    if free(&base) {
        return base;
    }
    let mut n = 1u64;
    loop {
        let candidate = format!("{}{}", base, n);
        if free(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
