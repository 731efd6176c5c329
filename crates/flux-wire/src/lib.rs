//! On-wire message encoding for the Flux broker core (spec §3, §4.1, §6).

mod aux;
mod error;
mod matchspec;
mod message;
mod pack;
mod shared;
mod wire;

pub use aux::AuxMap;
pub use error::WireError;
pub use matchspec::{MatchSpec, TopicGlob};
pub use message::{ControlType, Message};
pub use pack::PayloadBuilder;
pub use shared::SharedMessage;

pub use flux_types::{Matchtag, MsgFlags, MsgType, NodeId, RoleMask, UserId};
