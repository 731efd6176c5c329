//! Message match predicates, shared by [`flux_handle`](../flux_handle)'s
//! `recv` and the reactor's dispatcher (spec §4.3, §4.4).

use flux_types::{Matchtag, MsgType};

use crate::Message;

/// A glob supporting `*`, `?`, and `[...]` bracket classes, matched against a
/// message's topic string. `None` matches any topic, including untopicked
/// messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicGlob(Option<String>);

impl TopicGlob {
    pub fn any() -> Self {
        Self(None)
    }

    pub fn new(pattern: impl Into<String>) -> Self {
        Self(Some(pattern.into()))
    }

    pub fn matches(&self, topic: Option<&str>) -> bool {
        match (&self.0, topic) {
            (None, _) => true,
            (Some(pat), Some(topic)) => glob_match(pat.as_bytes(), topic.as_bytes()),
            (Some(_), None) => false,
        }
    }
}

/// Shell-style glob match: `*` matches any run (incl. empty), `?` matches
/// exactly one byte, `[...]` matches one byte from a bracket class
/// (`[!...]`/`[^...]` negates).
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    glob_match_at(pattern, text)
}

fn glob_match_at(pattern: &[u8], text: &[u8]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some(b'*') => {
            glob_match_at(&pattern[1..], text)
                || (!text.is_empty() && glob_match_at(pattern, &text[1..]))
        }
        Some(b'?') => !text.is_empty() && glob_match_at(&pattern[1..], &text[1..]),
        Some(b'[') => {
            let Some(close) = pattern.iter().position(|&b| b == b']').filter(|&i| i > 0) else {
                return !text.is_empty() && pattern[0] == text[0] && glob_match_at(&pattern[1..], &text[1..]);
            };
            if text.is_empty() {
                return false;
            }
            let mut class = &pattern[1..close];
            let negate = matches!(class.first(), Some(b'!') | Some(b'^'));
            if negate {
                class = &class[1..];
            }
            let hit = class.contains(&text[0]);
            if hit == negate {
                return false;
            }
            glob_match_at(&pattern[close + 1..], &text[1..])
        }
        Some(&c) => !text.is_empty() && text[0] == c && glob_match_at(&pattern[1..], &text[1..]),
    }
}

/// A predicate over a message's type, topic, and matchtag (spec §4.3 `recv`,
/// §4.4 dispatcher registration).
#[derive(Debug, Clone)]
pub struct MatchSpec {
    type_mask: u8,
    topic: TopicGlob,
    matchtag: Option<Matchtag>,
}

impl MatchSpec {
    pub fn any() -> Self {
        Self {
            type_mask: 0xff,
            topic: TopicGlob::any(),
            matchtag: None,
        }
    }

    pub fn with_type_mask(mut self, mask: u8) -> Self {
        self.type_mask = mask;
        self
    }

    pub fn with_topic(mut self, glob: TopicGlob) -> Self {
        self.topic = glob;
        self
    }

    pub fn with_matchtag(mut self, tag: Matchtag) -> Self {
        self.matchtag = Some(tag);
        self
    }

    pub fn matches_type(&self, t: MsgType) -> bool {
        self.type_mask & t.as_u8() != 0
    }

    pub fn matches(&self, msg: &Message) -> bool {
        self.matches_type(msg.msg_type())
            && self.topic.matches(msg.topic())
            && self.matchtag.map_or(true, |mt| mt == msg.matchtag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_types::UserId;

    fn topic_msg(topic: &str) -> Message {
        let mut m = Message::new(MsgType::Request);
        m.set_topic(topic);
        m
    }

    #[test]
    fn star_matches_any_suffix() {
        let g = TopicGlob::new("job.*");
        assert!(g.matches(Some("job.submit")));
        assert!(g.matches(Some("job.")));
        assert!(!g.matches(Some("node.submit")));
    }

    #[test]
    fn question_mark_matches_one_char() {
        let g = TopicGlob::new("job.?");
        assert!(g.matches(Some("job.1")));
        assert!(!g.matches(Some("job.12")));
    }

    #[test]
    fn bracket_class_matches_one_of() {
        let g = TopicGlob::new("job.[ab]");
        assert!(g.matches(Some("job.a")));
        assert!(g.matches(Some("job.b")));
        assert!(!g.matches(Some("job.c")));
    }

    #[test]
    fn negated_bracket_class() {
        let g = TopicGlob::new("job.[!ab]");
        assert!(g.matches(Some("job.c")));
        assert!(!g.matches(Some("job.a")));
    }

    #[test]
    fn type_mask_restricts_match() {
        let spec = MatchSpec::any().with_type_mask(MsgType::Response.as_u8());
        assert!(!spec.matches(&topic_msg("x")));
        let mut resp = Message::new(MsgType::Response);
        resp.set_userid(UserId::new(1));
        assert!(spec.matches(&resp));
    }

    #[test]
    fn matchtag_must_match_exactly() {
        let mut m = topic_msg("x");
        m.set_matchtag(Matchtag::new(5));
        let spec = MatchSpec::any().with_matchtag(Matchtag::new(5));
        assert!(spec.matches(&m));
        let spec_other = MatchSpec::any().with_matchtag(Matchtag::new(6));
        assert!(!spec_other.matches(&m));
    }
}
