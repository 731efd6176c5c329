//! Reference-counted message handle (spec §3, §9).
//!
//! `Message` is immutable value data; `SharedMessage` is the `Arc`-backed
//! handle every connector, msglist, and dispatcher actually passes around.
//! `incref`/`decref` degenerate into `Clone`/`Drop`; mutating a
//! multiply-referenced message clones first, via [`SharedMessage::make_mut`].

use std::ops::Deref;
use std::sync::Arc;

use crate::Message;

/// An `Arc<Message>` with the copy-on-write mutation path spec §9 calls for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedMessage(Arc<Message>);

impl SharedMessage {
    pub fn new(msg: Message) -> Self {
        Self(Arc::new(msg))
    }

    /// Returns a mutable reference, cloning the underlying `Message` first
    /// if another `SharedMessage` holds the same `Arc` (refcount > 1).
    pub fn make_mut(&mut self) -> &mut Message {
        Arc::make_mut(&mut self.0)
    }

    /// Number of live references to this message, mirroring the original's
    /// manual refcount inspection (test/debug use only).
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl From<Message> for SharedMessage {
    fn from(msg: Message) -> Self {
        Self::new(msg)
    }
}

impl Deref for SharedMessage {
    type Target = Message;
    fn deref(&self) -> &Message {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_types::MsgType;

    #[test]
    fn make_mut_clones_when_shared() {
        let shared = SharedMessage::new(Message::new(MsgType::Request));
        let mut other = shared.clone();
        assert_eq!(shared.ref_count(), 2);

        other.make_mut().set_topic("foo.bar");
        assert_eq!(shared.ref_count(), 1, "clone-on-write detaches the clone");
        assert_eq!(shared.topic(), None);
        assert_eq!(other.topic(), Some("foo.bar"));
    }

    #[test]
    fn make_mut_mutates_in_place_when_unique() {
        let mut shared = SharedMessage::new(Message::new(MsgType::Request));
        shared.make_mut().set_topic("foo.bar");
        assert_eq!(shared.topic(), Some("foo.bar"));
    }
}
