//! Message watcher: backed by a handle's pollfd; drains every message
//! queued on the handle per wakeup, dispatching each through the
//! reactor's [`crate::Dispatcher`] (spec §4.4).

use flux_handle::Handle;

use super::meta::WatcherMeta;

pub struct MessageWatcher {
    pub(crate) meta: WatcherMeta,
    pub(crate) handle: Handle,
}
