//! A future synchronized with the heartbeat (grounded on the original's
//! `src/common/libflux/sync.c`). Fulfills once per `heartbeat.pulse`
//! event, at most once per `minimum` wall-clock gap, and never twice for
//! the same sequence number.
//!
//! Events are broadcast to every matching handler, not routed first-match
//! like requests (spec §4.4), so a non-reactive `get`+`reset` loop would
//! otherwise refire on the same message repeatedly — the sequence-number
//! check is what the original calls out as the reason this can't just be
//! `Future::create_streaming` over the raw event.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use flux_reactor::{Reactor, WatcherId};
use flux_types::{FluxResult, MsgType};
use flux_wire::{MatchSpec, TopicGlob};

use crate::state::Future;

struct SyncState {
    seq: Cell<u32>,
    count: Cell<u32>,
    last: Cell<Option<Instant>>,
    minimum: Duration,
}

/// A streaming future fulfilled on every qualifying heartbeat pulse.
pub struct SyncFuture {
    inner: Future<()>,
}

impl SyncFuture {
    pub fn get(&self, reactor: &mut Reactor) -> FluxResult<()> {
        self.inner.get(reactor)
    }

    pub fn wait_for(&self, reactor: &mut Reactor, timeout: Duration) -> FluxResult<()> {
        self.inner.wait_for(reactor, Some(timeout))
    }

    pub fn then(&self, reactor: &mut Reactor, cb: impl FnMut(&mut Reactor, &SyncFuture) + 'static) {
        let mut cb = cb;
        self.inner.then(reactor, None, move |r, inner_fut| {
            cb(r, &SyncFuture { inner: inner_fut.clone() });
        });
    }

    /// Rearms for the next pulse (spec §4.5 `future_reset`).
    pub fn reset(&self) {
        self.inner.reset();
    }

    pub fn destroy(&self, reactor: &mut Reactor) {
        self.inner.destroy(reactor);
    }
}

/// Creates a sync future subscribed to `heartbeat.pulse` on `handle_watcher`
/// (spec's supplemented sync future, grounded on `flux_sync_create`).
/// `minimum` of `Duration::ZERO` disables gap suppression, fulfilling on
/// every new sequence number.
pub fn sync_create(handle_watcher: WatcherId, minimum: Duration) -> SyncFuture {
    let state = Rc::new(SyncState {
        seq: Cell::new(0),
        count: Cell::new(0),
        last: Cell::new(None),
        minimum,
    });

    let inner = Future::create_streaming(move |r: &mut Reactor, f: &Future<()>| {
        let fut = f.clone();
        if let Some(h) = r.message_watcher_handle_mut(handle_watcher) {
            let _ = h.event_subscribe("heartbeat.pulse");
        }

        r.msg_handler_create(
            MatchSpec::any()
                .with_type_mask(MsgType::Event.as_u8())
                .with_topic(TopicGlob::new("heartbeat.pulse")),
            false,
            Box::new(move |rr, msg| {
                let seq = msg.seq();
                let now = rr.now();

                if state.count.get() > 0 {
                    if seq <= state.seq.get() {
                        return;
                    }
                    if state.minimum > Duration::ZERO {
                        if let Some(last) = state.last.get() {
                            if now.saturating_duration_since(last) < state.minimum {
                                return;
                            }
                        }
                    }
                }

                state.seq.set(seq);
                state.count.set(state.count.get() + 1);
                state.last.set(Some(now));
                fut.fulfill(rr, ());
            }),
        );
    });

    SyncFuture { inner }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_handle::flux_open_loop;
    use flux_reactor::RunFlags;
    use flux_types::{RoleMask, UserId};
    use flux_wire::{Message, SharedMessage};

    fn pulse(seq: u32) -> SharedMessage {
        let mut m = Message::new(MsgType::Event);
        m.set_topic("heartbeat.pulse");
        m.set_seq(seq);
        m.set_userid(UserId::new(1));
        m.set_rolemask(RoleMask::OWNER);
        SharedMessage::new(m)
    }

    #[test]
    fn fulfills_once_per_new_sequence_number() {
        let mut reactor = Reactor::new().unwrap();
        let watcher = reactor.message_watcher_create(flux_open_loop()).unwrap();
        let sync = sync_create(watcher, Duration::ZERO);
        sync.then(&mut reactor, |_, _| {});

        if let Some(h) = reactor.message_watcher_handle_mut(watcher) {
            h.send(pulse(1), Default::default()).unwrap();
        }
        reactor.run(RunFlags { once: true }).unwrap();
        assert!(sync.get(&mut reactor).is_ok());
    }

    #[test]
    fn stale_or_repeated_sequence_is_ignored() {
        let mut reactor = Reactor::new().unwrap();
        let watcher = reactor.message_watcher_create(flux_open_loop()).unwrap();
        let sync = sync_create(watcher, Duration::ZERO);

        if let Some(h) = reactor.message_watcher_handle_mut(watcher) {
            h.send(pulse(1), Default::default()).unwrap();
        }
        reactor.run(RunFlags { once: true }).unwrap();
        sync.get(&mut reactor).unwrap();
        sync.reset();

        if let Some(h) = reactor.message_watcher_handle_mut(watcher) {
            h.send(pulse(1), Default::default()).unwrap();
        }
        reactor.run(RunFlags { once: true }).unwrap();
        assert!(sync.wait_for(&mut reactor, Duration::from_millis(10)).is_err());
    }
}
