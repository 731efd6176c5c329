//! Core type definitions for the Flux broker core.
//!
//! This crate contains the types shared by every layer above it:
//! - Message framing primitives ([`MsgType`], [`MsgFlags`])
//! - Routing and identity ([`NodeId`], [`Matchtag`])
//! - Credentials ([`UserId`], [`RoleMask`])
//! - The error taxonomy ([`FluxError`], [`FluxResult`])

use std::fmt;

mod error;

pub use error::{FluxError, FluxResult};

/// A minimal hand-rolled bitflags macro.
///
/// The teacher workspace does not carry a `bitflags` dependency for any of
/// the crates this core is grounded on, so the header's flag bitset is
/// expressed as a thin newtype over an integer with the same ergonomics
/// (`contains`, `insert`, `remove`, `|`) rather than pulling in a new crate
/// for a handful of constants.
macro_rules! bitflags_like {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $ty:ty {
            $(const $variant:ident = $value:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
        pub struct $name($ty);

        impl $name {
            $(pub const $variant: $name = $name($value);)*

            pub const fn empty() -> Self {
                Self(0)
            }

            pub const fn bits(self) -> $ty {
                self.0
            }

            pub const fn from_bits_truncate(bits: $ty) -> Self {
                Self(bits)
            }

            pub fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            pub fn insert(&mut self, other: Self) {
                self.0 |= other.0;
            }

            pub fn remove(&mut self, other: Self) {
                self.0 &= !other.0;
            }

            pub fn set(&mut self, other: Self, value: bool) {
                if value {
                    self.insert(other);
                } else {
                    self.remove(other);
                }
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }
    };
}

/// The discriminant carried in every message's wire header.
///
/// Packed into 4 bits on the wire (spec §6); `Control` is a core-internal
/// addition not part of the original four types used for connector
/// handshakes and is never delivered to application message handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MsgType {
    Request = 0x1,
    Response = 0x2,
    Event = 0x4,
    Keepalive = 0x8,
    Control = 0x9,
}

impl MsgType {
    /// Reconstructs a type from its wire discriminant.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x1 => Some(Self::Request),
            0x2 => Some(Self::Response),
            0x4 => Some(Self::Event),
            0x8 => Some(Self::Keepalive),
            0x9 => Some(Self::Control),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Long-form name, used in `tracing` fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Response => "response",
            Self::Event => "event",
            Self::Keepalive => "keepalive",
            Self::Control => "control",
        }
    }

    /// Single-letter form, used in compact trace logs.
    pub fn short_str(self) -> &'static str {
        match self {
            Self::Request => "R",
            Self::Response => "r",
            Self::Event => "e",
            Self::Keepalive => "k",
            Self::Control => "c",
        }
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags_like! {
    /// Flag bits carried in a message's wire header.
    pub struct MsgFlags: u16 {
        const TOPIC               = 0x0001;
        const PAYLOAD              = 0x0002;
        const PAYLOAD_IS_JSON      = 0x0004;
        const HAS_ROUTE_STACK      = 0x0008;
        const ROUTE_AWAY_FROM_SENDER = 0x0010;
        const PRIVATE              = 0x0020;
        const STREAMING            = 0x0040;
        const NO_RESPONSE          = 0x0080;
    }
}

/// Destination broker rank, `ANY`, or `UPSTREAM` (route away from sender).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    Rank(u32),
    Any,
    Upstream,
}

impl NodeId {
    const WIRE_ANY: u32 = u32::MAX;
    const WIRE_UPSTREAM: u32 = u32::MAX - 1;

    pub fn to_wire(self) -> u32 {
        match self {
            Self::Rank(r) => r,
            Self::Any => Self::WIRE_ANY,
            Self::Upstream => Self::WIRE_UPSTREAM,
        }
    }

    pub fn from_wire(v: u32) -> Self {
        match v {
            Self::WIRE_ANY => Self::Any,
            Self::WIRE_UPSTREAM => Self::Upstream,
            r => Self::Rank(r),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rank(r) => write!(f, "{r}"),
            Self::Any => f.write_str("any"),
            Self::Upstream => f.write_str("upstream"),
        }
    }
}

/// 32-bit request/response correlation tag. Zero means "no tag".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Matchtag(u32);

impl Matchtag {
    pub const NONE: Matchtag = Matchtag(0);

    /// Matchtags above this value are reserved for streaming RPCs (spec §4.5).
    pub const STREAMING_BASE: u32 = 0x8000_0000;

    pub const fn new(v: u32) -> Self {
        Self(v)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    pub const fn is_streaming(self) -> bool {
        self.0 >= Self::STREAMING_BASE
    }
}

impl fmt::Display for Matchtag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sender's user id. `UNKNOWN` is the sentinel a handle replaces with its
/// own default credentials before sending (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UserId(u32);

impl UserId {
    pub const UNKNOWN: UserId = UserId(u32::MAX);

    pub const fn new(v: u32) -> Self {
        Self(v)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub const fn is_unknown(self) -> bool {
        self.0 == Self::UNKNOWN.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

bitflags_like! {
    /// Sender's role bitset. `flux_msg_authorize` succeeds iff `OWNER` is
    /// set or the caller's uid matches the message's `userid`.
    pub struct RoleMask: u32 {
        const NONE  = 0x0000;
        const OWNER = 0x0001;
        const USER  = 0x0002;
    }
}

bitflags_like! {
    /// Readiness bits shared by [`crate`]'s consumers: msglists, handles,
    /// and the reactor's fd watchers all report the same `POLLIN` /
    /// `POLLOUT` / `POLLERR` vocabulary (spec §3 msglist, §4.3 handle, §4.4
    /// reactor fd watcher).
    pub struct PollEvents: u8 {
        const POLLIN  = 0x1;
        const POLLOUT = 0x2;
        const POLLERR = 0x4;
    }
}

/// Checks the authorization rule from spec §3: a caller may act on a
/// message iff it has the `OWNER` role, or its uid matches the message's
/// sender uid.
pub fn authorize(msg_userid: UserId, msg_role: RoleMask, caller_uid: UserId) -> bool {
    msg_role.contains(RoleMask::OWNER) || msg_userid == caller_uid
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn msgtype_roundtrips_through_wire_discriminant() {
        for t in [
            MsgType::Request,
            MsgType::Response,
            MsgType::Event,
            MsgType::Keepalive,
            MsgType::Control,
        ] {
            assert_eq!(MsgType::from_u8(t.as_u8()), Some(t));
        }
    }

    #[test]
    fn nodeid_any_and_upstream_roundtrip() {
        assert_eq!(NodeId::from_wire(NodeId::Any.to_wire()), NodeId::Any);
        assert_eq!(
            NodeId::from_wire(NodeId::Upstream.to_wire()),
            NodeId::Upstream
        );
        assert_eq!(NodeId::from_wire(7), NodeId::Rank(7));
    }

    #[test_case(RoleMask::OWNER, UserId::new(1), UserId::new(2), true; "owner authorizes regardless of uid")]
    #[test_case(RoleMask::USER, UserId::new(1), UserId::new(1), true; "matching uid authorizes")]
    #[test_case(RoleMask::USER, UserId::new(1), UserId::new(2), false; "mismatched uid denied")]
    fn authorize_matches_spec_rule(role: RoleMask, msg_uid: UserId, caller: UserId, want: bool) {
        assert_eq!(authorize(msg_uid, role, caller), want);
    }

    #[test]
    fn matchtag_streaming_range() {
        assert!(!Matchtag::new(1).is_streaming());
        assert!(Matchtag::new(Matchtag::STREAMING_BASE).is_streaming());
        assert!(Matchtag::NONE.is_none());
    }
}
