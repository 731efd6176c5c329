//! Prepare / check / idle watchers: fire at loop top, loop bottom, and when
//! no other watcher is pending, respectively (spec §4.4). Idle watchers
//! prevent the loop from blocking.

use super::meta::WatcherMeta;
use crate::Reactor;

pub struct HousekeepingWatcher {
    pub(crate) meta: WatcherMeta,
    pub(crate) callback: Box<dyn FnMut(&mut Reactor)>,
}
