pub mod buffer;
pub mod child;
pub mod fd;
pub mod housekeeping;
pub mod message;
pub mod meta;
pub mod periodic;
#[cfg(unix)]
pub mod signal;
pub mod stat;
pub mod timer;

pub use buffer::{BufferReadMode, BufferReadWatcher, BufferWriteWatcher};
pub use fd::FdWatcher;
pub use housekeeping::HousekeepingWatcher;
pub use message::MessageWatcher;
pub use periodic::PeriodicWatcher;
#[cfg(unix)]
pub use signal::SignalWatcher;
pub use stat::{StatSnapshot, StatWatcher};
pub use timer::TimerWatcher;
#[cfg(unix)]
pub use child::ChildWatcher;
