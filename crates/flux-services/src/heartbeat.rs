//! Heartbeat publisher (spec §4.6 ambient stack, grounded on the
//! original's `src/modules/heartbeat/heartbeat.c`): a rank-0-only
//! repeating timer publishes `heartbeat.pulse` events with a
//! monotonically increasing `seq`; every other rank only ever subscribes
//! via [`crate::sync`]/`flux_sync_create`.

use std::time::Duration;

use flux_handle::{Handle, OpFlags};
use flux_reactor::{Reactor, WatcherId};
use flux_types::{FluxResult, MsgType, RoleMask, UserId};
use flux_wire::{Message, SharedMessage};

pub const DEFAULT_PERIOD: Duration = Duration::from_millis(2000);

/// Runs on rank 0 only; parses the `rank` attribute off `handle` and
/// returns `Ok(None)` without starting anything on every other rank.
pub fn heartbeat_start(
    reactor: &mut Reactor,
    handle_watcher: WatcherId,
    period: Duration,
) -> FluxResult<Option<WatcherId>> {
    let rank: u32 = {
        let handle = reactor
            .message_watcher_handle_mut(handle_watcher)
            .ok_or_else(|| flux_types::FluxError::NotFound("handle watcher".into()))?;
        handle.attr_get("rank")?.parse().unwrap_or(0)
    };
    if rank != 0 {
        return Ok(None);
    }

    let seq = std::rc::Rc::new(std::cell::Cell::new(0u32));
    let timer = reactor.timer_watcher_create(
        Duration::ZERO,
        Some(period),
        true,
        Box::new(move |r| {
            if let Some(handle) = r.message_watcher_handle_mut(handle_watcher) {
                let next = seq.get();
                seq.set(next + 1);
                if let Err(e) = publish_pulse(handle, next) {
                    tracing::warn!(error = %e, seq = next, "error publishing heartbeat");
                }
            }
        }),
    );
    Ok(Some(timer))
}

fn publish_pulse(handle: &mut Handle, seq: u32) -> FluxResult<()> {
    let mut event = Message::new(MsgType::Event);
    event.set_topic("heartbeat.pulse");
    event.set_seq(seq);
    event.set_userid(UserId::new(0));
    event.set_rolemask(RoleMask::OWNER);
    handle.send(SharedMessage::new(event), OpFlags::default())
}

/// The supplemented `heartbeat.stats-get` request handler (spec §4.6):
/// responds with the configured period as a JSON payload.
pub fn stats_get_response(request: &Message, period: Duration) -> Message {
    let mut response = Message::derive_response(request, 0);
    response.set_payload(
        Message::pack().float("period", period.as_secs_f64()).build(),
        true,
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_handle::flux_open_loop;
    use flux_reactor::RunFlags;
    use flux_wire::MatchSpec;

    #[test]
    fn rank_zero_publishes_pulses_with_increasing_seq() {
        let mut reactor = Reactor::new().unwrap();
        let watcher = reactor.message_watcher_create(flux_open_loop()).unwrap();
        if let Some(h) = reactor.message_watcher_handle_mut(watcher) {
            h.attr_set_cacheonly("rank", "0");
        }

        let started = heartbeat_start(&mut reactor, watcher, Duration::from_millis(5)).unwrap();
        assert!(started.is_some());

        reactor.run(RunFlags { once: true }).unwrap();
        std::thread::sleep(Duration::from_millis(10));
        reactor.now_update();
        reactor.run(RunFlags { once: true }).unwrap();

        let handle = reactor.message_watcher_handle_mut(watcher).unwrap();
        let first = handle.recv(&MatchSpec::any(), OpFlags::default()).unwrap();
        assert_eq!(first.seq(), 0);
    }

    #[test]
    fn non_rank_zero_does_not_start_a_timer() {
        let mut reactor = Reactor::new().unwrap();
        let watcher = reactor.message_watcher_create(flux_open_loop()).unwrap();
        if let Some(h) = reactor.message_watcher_handle_mut(watcher) {
            h.attr_set_cacheonly("rank", "3");
        }
        let started = heartbeat_start(&mut reactor, watcher, Duration::from_millis(5)).unwrap();
        assert!(started.is_none());
    }

    #[test]
    fn stats_get_responds_with_configured_period() {
        let mut req = Message::new(MsgType::Request);
        req.set_topic("heartbeat.stats-get");
        let resp = stats_get_response(&req, Duration::from_millis(500));
        let payload: serde_json::Value = resp.unpack().unwrap();
        assert_eq!(payload["period"], 0.5);
    }
}
