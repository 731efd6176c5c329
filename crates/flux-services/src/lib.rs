//! Services layered on the Flux broker core (spec §4.6): heartbeat
//! publishing, RFC-6 disconnect/cancel, and eventlog.

mod disconnect;
mod eventlog;
mod heartbeat;

pub use disconnect::{msglist_cancel, msglist_disconnect};
pub use eventlog::{append, decode, iter, EventlogEntry};
pub use heartbeat::{heartbeat_start, stats_get_response, DEFAULT_PERIOD};
