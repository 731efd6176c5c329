//! Signal watcher: fires on delivery of a POSIX signal; multiple deliveries
//! may coalesce (spec §4.4). Built on `signal-hook-mio`, the only
//! signal-to-mio bridge in the teacher's dependency stack.

use super::meta::WatcherMeta;
use crate::Reactor;

#[cfg(unix)]
pub struct SignalWatcher {
    pub(crate) meta: WatcherMeta,
    pub(crate) signum: i32,
    pub(crate) signals: signal_hook_mio::v1_0::Signals,
    pub(crate) callback: Box<dyn FnMut(&mut Reactor, i32)>,
}

#[cfg(unix)]
impl SignalWatcher {
    pub fn new(
        signum: i32,
        callback: Box<dyn FnMut(&mut Reactor, i32)>,
    ) -> std::io::Result<Self> {
        let signals = signal_hook_mio::v1_0::Signals::new([signum])?;
        Ok(Self {
            meta: WatcherMeta::new(true),
            signum,
            signals,
            callback,
        })
    }
}
