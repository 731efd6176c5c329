//! Composable futures and RPC plumbing for the Flux broker core (spec
//! §4.5, §9's resolved "coroutine-style get" question).

mod composite;
mod guard;
mod rpc;
mod state;
mod sync;

pub use composite::{wait_all, wait_any};
pub use guard::in_blocking_drive;
pub use rpc::{rpc, RpcFlags, RpcFuture};
pub use state::Future;
pub use sync::{sync_create, SyncFuture};
