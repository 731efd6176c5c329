//! Flags accepted by [`crate::flux_open`] and [`crate::Handle::send`]/`recv`
//! (spec §4.3).

/// Flags passed to [`crate::flux_open`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenFlags {
    /// Log every message sent and received through this handle.
    pub trace: bool,
    /// Never block in `send`/`recv`; fail `EWOULDBLOCK` instead.
    pub nonblock: bool,
    /// Request RPCs on this handle default to streaming semantics.
    pub rpc_streaming: bool,
    /// Request RPCs on this handle default to no-response semantics.
    pub rpc_nresponse: bool,
}

impl OpenFlags {
    pub fn nonblocking() -> Self {
        Self {
            nonblock: true,
            ..Self::default()
        }
    }
}

/// Flags passed to an individual [`crate::Handle::send`]/`recv` call,
/// overriding the handle's defaults for that one operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpFlags {
    pub nonblock: bool,
}
