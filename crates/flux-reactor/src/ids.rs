//! Watcher identity (spec §4.4 "Cancellation"). A `WatcherId` stands in for
//! the original's `void *` watcher pointer: `reactor.stop(id)` deactivates
//! without deallocating, `reactor.destroy(id)` deallocates, and `destroy`
//! implies `stop`.

pub type WatcherId = usize;

#[derive(Default)]
pub struct IdGen(usize);

impl IdGen {
    pub fn next(&mut self) -> WatcherId {
        self.0 += 1;
        self.0
    }
}
