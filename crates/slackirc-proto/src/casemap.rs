//! RFC 1459 case mapping.
//!
//! IRC name comparison is case-insensitive with four extra equivalences
//! inherited from the Scandinavian origin of the protocol: `[`/`{`, `]`/`}`,
//! `\`/`|` and `~`/`^`. Every name index in the gateway is keyed by the
//! folded form produced here.

/// Fold a single byte to its RFC 1459 lowercase form.
#[inline]
pub const fn fold_byte(b: u8) -> u8 {
    match b {
        b'A'..=b'Z' => b + 32,
        b'[' => b'{',
        b']' => b'}',
        b'\\' => b'|',
        b'~' => b'^',
        _ => b,
    }
}

/// Fold a string to its RFC 1459 lowercase form.
///
/// Only ASCII is affected; multi-byte UTF-8 sequences pass through intact.
pub fn irc_to_lower(s: &str) -> String {
    let mut out = s.as_bytes().to_vec();
    for b in &mut out {
        *b = fold_byte(*b);
    }
    // Folding only rewrites ASCII bytes, so the result is still valid UTF-8.
    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Compare two strings under RFC 1459 folding.
pub fn irc_eq(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a.bytes()
            .zip(b.bytes())
            .all(|(x, y)| fold_byte(x) == fold_byte(y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn folds_ascii_and_brackets() {
        assert_eq!(irc_to_lower("FOO"), "foo");
        assert_eq!(irc_to_lower("foo["), "foo{");
        assert_eq!(irc_to_lower("Nick\\Away~"), "nick|away^");
        assert_eq!(irc_to_lower("#General]"), "#general}");
    }

    #[test]
    fn equality_covers_the_spec_boundaries() {
        assert!(irc_eq("foo", "FOO"));
        assert!(irc_eq("foo", "Foo"));
        assert!(irc_eq("foo[", "FOO{"));
        assert!(irc_eq("a|b", "A\\B"));
        assert!(!irc_eq("foo", "bar"));
        assert!(!irc_eq("foo", "fooo"));
    }

    proptest! {
        #[test]
        fn folding_is_idempotent(s in "\\PC{0,32}") {
            let once = irc_to_lower(&s);
            prop_assert_eq!(irc_to_lower(&once), once);
        }

        #[test]
        fn eq_matches_folded_compare(a in "[ -~]{0,16}", b in "[ -~]{0,16}") {
            prop_assert_eq!(irc_eq(&a, &b), irc_to_lower(&a) == irc_to_lower(&b));
        }
    }
}
