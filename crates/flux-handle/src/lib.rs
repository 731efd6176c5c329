//! Pluggable connector handle for the Flux broker core (spec §3, §4.3).

pub mod attr;
pub mod connector;
mod flags;
mod framing;
mod handle;
mod matchtag;
mod ops;
mod uri;

pub use attr::{AttrCache, AttrEntry};
pub use flags::{OpFlags, OpenFlags};
pub use handle::{flux_open, flux_open_loop, FatalFn, Handle};
pub use matchtag::MatchtagPool;
pub use ops::HandleOps;
pub use uri::Target;

pub use flux_wire::{MatchSpec, TopicGlob};
