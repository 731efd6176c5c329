//! Periodic watcher: fires at wall-clock times matching a user-supplied
//! predicate function (spec §4.4). Also backs [`crate::watcher::StatWatcher`],
//! since the teacher's dependency stack carries no inotify crate.

use std::time::Instant;

use super::meta::WatcherMeta;
use crate::Reactor;

/// Given the current loop time, returns the next time this watcher should
/// fire, or `None` to stop scheduling it.
pub type ScheduleFn = Box<dyn FnMut(Instant) -> Option<Instant>>;

pub struct PeriodicWatcher {
    pub(crate) meta: WatcherMeta,
    pub(crate) next: Option<Instant>,
    pub(crate) schedule: ScheduleFn,
    pub(crate) callback: Box<dyn FnMut(&mut Reactor)>,
}
