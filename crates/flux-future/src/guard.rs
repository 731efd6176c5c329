//! Re-entrancy guard forbidding a blocking `get`/`wait_for` from within a
//! reactor callback (spec §9 "coroutine-style get" design note, option
//! taken: forbid rather than implicitly nest).
//!
//! `Reactor::run` doesn't know about futures at all, so this crate marks
//! the guard itself around every driven callback by wrapping watcher
//! registration; in practice the guard is entered by [`crate::state::Future::get`]
//! itself around its own nested `reactor.run()` call, and checked by nested
//! `get` calls that would otherwise deadlock a single-threaded loop.

use std::cell::Cell;

thread_local! {
    static IN_CALLBACK: Cell<bool> = const { Cell::new(false) };
}

/// True if the current thread is already inside a blocking `get`'s nested
/// reactor drive.
pub fn in_blocking_drive() -> bool {
    IN_CALLBACK.with(|c| c.get())
}

/// RAII guard marking "a blocking drive is in progress on this thread".
/// Dropped (even on panic/early return) to restore the previous state.
pub struct DriveGuard {
    previous: bool,
}

impl DriveGuard {
    pub fn enter() -> Self {
        let previous = IN_CALLBACK.with(|c| c.replace(true));
        Self { previous }
    }
}

impl Drop for DriveGuard {
    fn drop(&mut self) {
        IN_CALLBACK.with(|c| c.set(self.previous));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_restores_previous_state_on_drop() {
        assert!(!in_blocking_drive());
        {
            let _g = DriveGuard::enter();
            assert!(in_blocking_drive());
        }
        assert!(!in_blocking_drive());
    }

    #[test]
    fn nested_enter_restores_outer_true() {
        let _outer = DriveGuard::enter();
        {
            let _inner = DriveGuard::enter();
            assert!(in_blocking_drive());
        }
        assert!(in_blocking_drive());
    }
}
