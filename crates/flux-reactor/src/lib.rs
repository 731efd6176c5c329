//! Single-threaded cooperative event loop and message dispatcher for the
//! Flux broker core (spec §4.4).

pub mod dispatch;
pub mod ids;
mod reactor;
pub mod watcher;

pub use dispatch::{default_exclusive, Dispatcher, MatchtagClaimFn, MsgHandlerFn};
pub use ids::WatcherId;
pub use reactor::{Reactor, RunFlags};
pub use watcher::{BufferReadMode, StatSnapshot};
