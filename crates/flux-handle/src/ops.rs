//! The connector vtable (spec §3 "an implementation vtable"), named after
//! kimberlite-io's `IoBackend` trait.

use std::os::fd::RawFd;

use flux_types::{FluxResult, PollEvents};
use flux_wire::SharedMessage;

use crate::flags::OpFlags;

/// A connector backing a [`crate::Handle`]: `loop://`, `fd://N`,
/// `local://PATH`, or `tcp://host:port` (spec §4.3).
pub trait HandleOps: Send {
    /// Transmits a message. Credential defaulting has already been applied
    /// by the owning [`crate::Handle`].
    fn send(&mut self, msg: SharedMessage, flags: OpFlags) -> FluxResult<()>;

    /// Receives the next message, or `Err(FluxError::WouldBlock)` if none is
    /// ready. Connectors do not implement matching themselves; the handle
    /// layer requeues non-matching messages (spec §4.3).
    fn recv(&mut self, flags: OpFlags) -> FluxResult<SharedMessage>;

    /// An fd readable when `recv` would return a message, or on connector
    /// error.
    fn pollfd(&mut self) -> FluxResult<RawFd>;

    fn pollevents(&mut self) -> FluxResult<PollEvents>;

    /// Broker-scoped attribute fetch, bypassing the handle's cache.
    fn getattr(&mut self, name: &str) -> FluxResult<String>;

    /// Broker-scoped attribute write-through.
    fn setattr(&mut self, name: &str, value: &str) -> FluxResult<()>;

    fn event_subscribe(&mut self, topic_glob: &str) -> FluxResult<()>;

    fn event_unsubscribe(&mut self, topic_glob: &str) -> FluxResult<()>;

    /// Releases the connector's underlying fd/socket. Idempotent.
    fn close(&mut self);
}
