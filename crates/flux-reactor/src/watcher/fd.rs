//! Fd watcher: fires with the union of requested events that are ready
//! (spec §4.4).

use std::os::fd::RawFd;

use flux_types::PollEvents;

use super::meta::WatcherMeta;
use crate::Reactor;

pub struct FdWatcher {
    pub(crate) meta: WatcherMeta,
    pub(crate) fd: RawFd,
    pub(crate) requested: PollEvents,
    pub(crate) callback: Box<dyn FnMut(&mut Reactor, PollEvents)>,
}
