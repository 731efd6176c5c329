//! # Flux
//!
//! A single-threaded, cooperative broker core: messages flow through a
//! reactor-driven dispatcher, correlated by matchtag, and consumed either
//! as blocking RPCs or composable futures.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                             flux                                │
//! │  ┌────────┐   ┌─────────┐   ┌─────────┐   ┌────────┐  ┌──────┐ │
//! │  │Message │ → │ Msglist │ → │ Handle  │ → │Reactor │→ │Future│ │
//! │  │(wire)  │   │ (fifo)  │   │(connector)│  │(+dispatch)│(+rpc)│ │
//! │  └────────┘   └─────────┘   └─────────┘   └────────┘  └──────┘ │
//! │                                                  ↓               │
//! │                                            flux-services         │
//! │                                    (heartbeat, disconnect, log)  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```ignore
//! use flux::{flux_open_loop, rpc, Reactor, RpcFlags, MatchSpec};
//!
//! let mut reactor = Reactor::new()?;
//! let watcher = reactor.message_watcher_create(flux_open_loop())?;
//! let fut = rpc(watcher, "foo.bar", NodeId::Any, RpcFlags::default(), None);
//! let payload = fut.get(&mut reactor)?;
//! ```

// Re-export field-level types, credentials, and the error taxonomy.
pub use flux_types::{
    authorize, Matchtag, MsgFlags, MsgType, NodeId, PollEvents, RoleMask, UserId,
};
pub use flux_types::{FluxError, FluxResult};

// Re-export the message/wire layer.
pub use flux_wire::{AuxMap, ControlType, Message, MatchSpec, PayloadBuilder, SharedMessage, TopicGlob, WireError};

// Re-export the msglist fifo.
pub use flux_msglist::{Msglist, ReadinessFd};

// Re-export the handle/connector layer.
pub use flux_handle::{flux_open, flux_open_loop, AttrCache, AttrEntry, FatalFn, Handle, MatchtagPool, OpFlags, OpenFlags, Target};
pub use flux_handle::connector;

// Re-export the reactor and dispatcher.
pub use flux_reactor::{default_exclusive, BufferReadMode, Dispatcher, MatchtagClaimFn, MsgHandlerFn, Reactor, RunFlags, StatSnapshot, WatcherId};

// Re-export futures and RPC.
pub use flux_future::{rpc, sync_create, wait_all, wait_any, in_blocking_drive, Future, RpcFlags, RpcFuture, SyncFuture};

// Re-export the services layer.
pub use flux_services::{
    append as eventlog_append, decode as eventlog_decode, heartbeat_start, iter as eventlog_iter,
    msglist_cancel, msglist_disconnect, stats_get_response, EventlogEntry, DEFAULT_PERIOD,
};
