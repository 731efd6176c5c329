//! Child watcher: fires when a specific child process exits, driven by a
//! shared `SIGCHLD` signal watcher plus `waitpid(..., WNOHANG)` (spec §4.4,
//! unix-only).

use super::meta::WatcherMeta;
use crate::Reactor;

#[cfg(unix)]
pub struct ChildWatcher {
    pub(crate) meta: WatcherMeta,
    pub(crate) pid: libc::pid_t,
    pub(crate) callback: Box<dyn FnMut(&mut Reactor, i32)>,
}

/// Reaps any exited children among the registered set, invoking and
/// deactivating the matching watcher. Called whenever `SIGCHLD` is
/// delivered (spec §4.4: child watchers piggyback on the signal watcher
/// rather than each owning their own fd).
#[cfg(unix)]
pub fn reap_ready(pid: libc::pid_t) -> Option<i32> {
    let mut status: libc::c_int = 0;
    // SAFETY: `pid` and `&mut status` are a valid target/out-param pair for
    // `waitpid`; `WNOHANG` guarantees this never blocks.
    let rc = unsafe { libc::waitpid(pid, &mut status, libc::WNOHANG) };
    if rc == pid {
        Some(status)
    } else {
        None
    }
}
