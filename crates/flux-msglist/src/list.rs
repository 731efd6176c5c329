//! The `Msglist` primitive itself (spec §3, §4.2).

use std::collections::VecDeque;
use std::os::fd::RawFd;

use flux_types::{FluxError, FluxResult, PollEvents};
use flux_wire::SharedMessage;

use crate::readiness::{self, ReadinessFd};

/// An fd-pollable FIFO of reference-counted messages.
///
/// `POLLOUT` is always set (a msglist never refuses pushes); `POLLIN` is set
/// iff the list is non-empty; `POLLERR` is set if the list's internal
/// readiness signal failed to raise/clear (mirrors the original's eventfd
/// failure path, where the failure mode is OS resource exhaustion rather
/// than Rust allocation failure).
pub struct Msglist {
    items: VecDeque<SharedMessage>,
    pollevents: PollEvents,
    cursor: Option<usize>,
    fd: Option<Box<dyn ReadinessFd>>,
}

impl Default for Msglist {
    fn default() -> Self {
        Self::new()
    }
}

impl Msglist {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
            pollevents: PollEvents::POLLOUT,
            cursor: None,
            fd: None,
        }
    }

    /// Appends a message to the back of the list.
    pub fn append(&mut self, msg: SharedMessage) -> FluxResult<()> {
        self.items.push_back(msg);
        self.raise_pollin()
    }

    /// Prepends a message to the front of the list.
    pub fn push(&mut self, msg: SharedMessage) -> FluxResult<()> {
        self.items.push_front(msg);
        self.raise_pollin()
    }

    /// Pops the front of the list.
    pub fn pop(&mut self) -> Option<SharedMessage> {
        let item = self.items.pop_front();
        if item.is_some() {
            self.cursor = self.cursor.map(|c| c.saturating_sub(1));
            self.lower_pollin_if_empty();
        }
        item
    }

    /// Resets the cursor to the front of the list and returns it.
    pub fn first(&mut self) -> Option<&SharedMessage> {
        self.cursor = Some(0);
        self.items.front()
    }

    /// Advances the cursor and returns the item it now points to.
    pub fn next(&mut self) -> Option<&SharedMessage> {
        let idx = self.cursor.map_or(0, |c| c + 1);
        self.cursor = Some(idx);
        self.items.get(idx)
    }

    /// Returns the item at the back of the list without removing it.
    pub fn last(&self) -> Option<&SharedMessage> {
        self.items.back()
    }

    /// Removes the item the cursor currently points to. The cursor is left
    /// pointing at the item that shifted into its slot (if any), so a
    /// `first()`/`next()`/`delete()` loop can remove while iterating.
    pub fn delete(&mut self) {
        if let Some(idx) = self.cursor {
            if idx < self.items.len() {
                self.items.remove(idx);
                self.lower_pollin_if_empty();
            }
        }
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the current pollevents bitset, disarming the internal
    /// readiness fd in the process (mirrors `msglist_pollevents`'s
    /// `clear_event` call: the caller has now observed the state).
    pub fn pollevents(&mut self) -> PollEvents {
        if let Some(fd) = self.fd.as_mut() {
            if fd.clear().is_err() {
                self.pollevents.insert(PollEvents::POLLERR);
            }
        }
        self.pollevents
    }

    /// Lazily allocates and returns the fd that becomes readable whenever
    /// pollevents transitions (spec §4.2).
    pub fn pollfd(&mut self) -> FluxResult<RawFd> {
        if self.fd.is_none() {
            let fd = readiness::create().map_err(FluxError::Io)?;
            self.fd = Some(fd);
            if !self.pollevents.is_empty() {
                self.raise_now()?;
            }
        }
        Ok(self.fd.as_ref().expect("just inserted").raw_fd())
    }

    fn raise_pollin(&mut self) -> FluxResult<()> {
        if !self.pollevents.contains(PollEvents::POLLIN) {
            self.pollevents.insert(PollEvents::POLLIN);
            self.raise_now()?;
        }
        Ok(())
    }

    fn lower_pollin_if_empty(&mut self) {
        if self.items.is_empty() {
            self.pollevents.remove(PollEvents::POLLIN);
        }
    }

    fn raise_now(&mut self) -> FluxResult<()> {
        if let Some(fd) = self.fd.as_mut() {
            if fd.raise().is_err() {
                self.pollevents.insert(PollEvents::POLLERR);
                return Err(FluxError::NoMemory);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_types::MsgType;
    use flux_wire::Message;

    fn msg() -> SharedMessage {
        SharedMessage::new(Message::new(MsgType::Event))
    }

    #[test]
    fn starts_empty_with_pollout_only() {
        let mut l = Msglist::new();
        assert_eq!(l.pollevents(), PollEvents::POLLOUT);
    }

    #[test]
    fn push_then_pop_roundtrips() {
        let mut l = Msglist::new();
        let m = msg();
        l.push(m.clone()).unwrap();
        assert_eq!(l.pop(), Some(m));
    }

    #[test]
    fn pollin_tracks_emptiness() {
        let mut l = Msglist::new();
        l.append(msg()).unwrap();
        assert!(l.pollevents().contains(PollEvents::POLLIN));
        l.pop();
        assert!(!l.pollevents().contains(PollEvents::POLLIN));
    }

    #[test]
    fn append_preserves_fifo_order() {
        let mut l = Msglist::new();
        let (a, b) = (msg(), msg());
        l.append(a.clone()).unwrap();
        l.append(b.clone()).unwrap();
        assert_eq!(l.pop(), Some(a));
        assert_eq!(l.pop(), Some(b));
    }

    #[test]
    fn push_prepends() {
        let mut l = Msglist::new();
        let (a, b) = (msg(), msg());
        l.append(a.clone()).unwrap();
        l.push(b.clone()).unwrap();
        assert_eq!(l.pop(), Some(b));
        assert_eq!(l.pop(), Some(a));
    }

    #[test]
    fn cursor_delete_removes_current_item() {
        let mut l = Msglist::new();
        for _ in 0..3 {
            l.append(msg()).unwrap();
        }
        assert!(l.first().is_some());
        l.delete(); // remove index 0
        assert_eq!(l.count(), 2);
        // cursor still at 0, now pointing at the former index-1 item
        assert!(l.items.front().is_some());
    }

    #[test]
    fn count_matches_pushes_minus_pops() {
        let mut l = Msglist::new();
        l.append(msg()).unwrap();
        l.append(msg()).unwrap();
        assert_eq!(l.count(), 2);
        l.pop();
        assert_eq!(l.count(), 1);
    }
}
