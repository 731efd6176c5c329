//! Timer watcher: one-shot after `after` seconds, or repeating every
//! `repeat` seconds if `repeat > 0` (spec §4.4).

use std::time::{Duration, Instant};

use super::meta::WatcherMeta;
use crate::Reactor;

pub struct TimerWatcher {
    pub(crate) meta: WatcherMeta,
    pub(crate) deadline: Instant,
    pub(crate) repeat: Option<Duration>,
    pub(crate) callback: Box<dyn FnMut(&mut Reactor)>,
}

impl TimerWatcher {
    pub fn reset(&mut self, now: Instant, after: Duration, repeat: Option<Duration>) {
        self.deadline = now + after;
        self.repeat = repeat;
        self.meta.active = true;
    }
}
