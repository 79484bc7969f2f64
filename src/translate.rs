//! Identifier translation and escaping between the two wire formats.
//!
//! The upstream encodes messages as HTML-ish text with `<@id>` / `<#id>`
//! references; IRC users type plain text with `<@nick>` / `<#name>`.
//! Outbound text is escaped first and the escaped reference forms are then
//! rewritten to ids; inbound text has ids rewritten to names first and
//! entities unescaped last, so the two directions compose to identity for
//! known entities.

use crate::state::World;

/// HTML-escape `&`, `<`, `>`, `"` - in that order, so later replacements
/// never double-escape the ampersands they introduce.
fn escape_entities(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn unescape_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

/// Translate an IRC-typed message body into upstream text.
///
/// `&lt;@nick&gt;` becomes `<@id>` and `&lt;#name&gt;` becomes `<#id>`
/// when the entity is known; unknown references pass through escaped and
/// untranslated.
pub fn outbound(world: &World, text: &str) -> String {
    let escaped = escape_entities(text);
    let mut out = String::with_capacity(escaped.len());
    let mut rest = escaped.as_str();

    while let Some(start) = rest.find("&lt;") {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match rewrite_reference(world, tail) {
            Some((replacement, consumed)) => {
                out.push_str(&replacement);
                rest = &tail[consumed..];
            }
            None => {
                out.push_str("&lt;");
                rest = &tail["&lt;".len()..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Try to rewrite one `&lt;@nick&gt;` / `&lt;#name&gt;` reference at the
/// start of `tail`. Returns the upstream form and the escaped length
/// consumed.
fn rewrite_reference(world: &World, tail: &str) -> Option<(String, usize)> {
    let inner = tail.strip_prefix("&lt;")?;
    let sigil = inner.chars().next()?;
    if sigil != '@' && sigil != '#' {
        return None;
    }
    let body_end = inner.find("&gt;")?;
    let name = &inner[1..body_end];
    let consumed = "&lt;".len() + body_end + "&gt;".len();

    let id = match sigil {
        '@' => world.user_by_nick(name).map(|u| u.id.clone()),
        _ => world.channel_by_name(name).map(|c| c.id.clone()),
    }?;
    Some((format!("<{}{}>", sigil, id), consumed))
}

/// Translate upstream text for one recipient client.
///
/// `self_nick` is that client's own chosen nick; it substitutes for the
/// self id so every viewer sees themself under the name they picked.
pub fn inbound(world: &World, self_nick: &str, text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match resolve_reference(world, self_nick, tail) {
            Some((replacement, consumed)) => {
                out.push_str(&replacement);
                rest = &tail[consumed..];
            }
            None => {
                out.push('<');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    unescape_entities(&out)
}

/// Resolve one `<@id>` / `<#id>` reference at the start of `tail` to its
/// IRC name form.
fn resolve_reference(world: &World, self_nick: &str, tail: &str) -> Option<(String, usize)> {
    let inner = tail.strip_prefix('<')?;
    let sigil = inner.chars().next()?;
    if sigil != '@' && sigil != '#' {
        return None;
    }
    let body_end = inner.find('>')?;
    let id = &inner[1..body_end];
    let consumed = 1 + body_end + 1;

    let name = match sigil {
        '@' if world.is_self(id) => Some(self_nick.to_string()),
        '@' => world.user(id).map(|u| u.nick.clone()),
        _ => world.channel(id).map(|c| c.name.clone()),
    }?;
    Some((format!("<{}{}>", sigil, name), consumed))
}

/// Flatten one attachment the way the wire shows them: title, text and
/// link joined by single spaces, skipping absent pieces.
pub fn flatten_attachment(title: Option<&str>, text: Option<&str>, link: Option<&str>) -> String {
    [title, text, link]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Bold-bracketed subtype marker prepended to non-plain messages.
pub fn subtype_marker(subtype: &str) -> String {
    format!("\u{2}[{}]\u{2} ", subtype)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ChannelKind, World};

    fn sample_world() -> World {
        let mut world = World::new();
        world.update_user("U1", "me", None, None);
        world.self_id = Some("U1".to_string());
        world.update_user("U_BOB", "bob", None, None);
        world.update_channel(ChannelKind::Public, "C1", "general", None, &[]);
        world
    }

    #[test]
    fn outbound_escapes_then_translates() {
        let world = sample_world();
        assert_eq!(
            outbound(&world, "hello <@bob> & bye"),
            "hello <@U_BOB> &amp; bye"
        );
        assert_eq!(
            outbound(&world, "see <#general> \"now\""),
            "see <#C1> &quot;now&quot;"
        );
    }

    #[test]
    fn unknown_references_pass_through_escaped() {
        let world = sample_world();
        assert_eq!(outbound(&world, "<@nobody> hi"), "&lt;@nobody&gt; hi");
    }

    #[test]
    fn inbound_translates_then_unescapes() {
        let world = sample_world();
        assert_eq!(
            inbound(&world, "alice", "hello <@U_BOB> &amp; bye"),
            "hello <@bob> & bye"
        );
        assert_eq!(inbound(&world, "alice", "in <#C1> &lt;tag&gt;"), "in <#general> <tag>");
    }

    #[test]
    fn self_id_becomes_the_recipients_nick() {
        let world = sample_world();
        assert_eq!(inbound(&world, "alice", "<@U1> said"), "<@alice> said");
        assert_eq!(inbound(&world, "al1ce", "<@U1> said"), "<@al1ce> said");
    }

    #[test]
    fn round_trip_for_known_entities() {
        let world = sample_world();
        let typed = "hello <@bob> in <#general> & \"quotes\" <tags>";
        let wire = outbound(&world, typed);
        assert_eq!(inbound(&world, "alice", &wire), typed);
    }

    #[test]
    fn unknown_ids_stay_raw_inbound() {
        let world = sample_world();
        assert_eq!(inbound(&world, "alice", "<@U_GONE> hi"), "<@U_GONE> hi");
    }

    #[test]
    fn attachment_flattening_skips_missing_parts() {
        assert_eq!(
            flatten_attachment(Some("title"), Some("text"), Some("http://x")),
            "title text http://x"
        );
        assert_eq!(flatten_attachment(None, Some("text"), None), "text");
        assert_eq!(flatten_attachment(Some("t"), None, Some("l")), "t l");
    }

    #[test]
    fn subtype_markers_are_bold_bracketed() {
        assert_eq!(subtype_marker("me_message"), "\u{2}[me_message]\u{2} ");
    }
}
