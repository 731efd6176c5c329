//! Shared activation state for every watcher kind (spec §4.4).

/// `active` mirrors `watcher_stop`/`watcher_start`; a stopped watcher stays
/// allocated but is skipped by the loop. `ref_counted` mirrors libev's
/// "watcher keeps the loop alive" distinction: `reactor_run` exits once no
/// *active, ref-counted* watcher remains (idle/prepare/check watchers are
/// never ref-counted, matching the original's `flux_watcher_unref`
/// convention of unref'ing housekeeping watchers).
#[derive(Debug, Clone, Copy)]
pub struct WatcherMeta {
    pub active: bool,
    pub ref_counted: bool,
}

impl WatcherMeta {
    pub fn new(ref_counted: bool) -> Self {
        Self {
            active: true,
            ref_counted,
        }
    }
}
