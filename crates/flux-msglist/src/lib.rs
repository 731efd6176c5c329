//! Fd-pollable message FIFO (spec §3, §4.2).
//!
//! Grounded on the original's `src/common/libutil/msglist.c`: a plain
//! doubly-linked list of refcounted messages plus a lazily-allocated
//! readiness fd, with a stateful cursor for `first`/`next`/`delete` loops.

mod list;
mod readiness;

pub use list::Msglist;
pub use readiness::ReadinessFd;
