//! The message type and its field-level operations (spec §3, §4.1).

use bytes::Bytes;
use flux_types::{Matchtag, MsgFlags, MsgType, NodeId, RoleMask, UserId};

use crate::aux::AuxMap;
use crate::pack::PayloadBuilder;
use crate::WireError;

/// A control-frame subtype, used for connector handshakes (spec §3
/// `control_type`/`control_status`).
pub type ControlType = u32;

/// A single message (spec §3).
///
/// `Message` is the value type; it is never shared directly. Producers and
/// consumers pass around [`SharedMessage`] (an `Arc<Message>`), matching the
/// "reference-counted, immutable once shared" contract in spec §3 and §9.
#[derive(Debug, Clone)]
pub struct Message {
    msg_type: MsgType,
    flags: MsgFlags,
    topic: Option<String>,
    payload: Option<Bytes>,
    matchtag: Matchtag,
    nodeid: NodeId,
    errnum: i32,
    userid: UserId,
    rolemask: RoleMask,
    seq: u32,
    control_type: ControlType,
    control_status: i32,
    route_stack: Vec<Bytes>,
    /// Scratch space for in-process annotation. Not serialized, not part of
    /// equality, and reset to empty on every clone (copy-on-write never
    /// needs to preserve a holder's private annotations).
    aux: AuxMap,
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.msg_type == other.msg_type
            && self.flags == other.flags
            && self.topic == other.topic
            && self.payload == other.payload
            && self.matchtag == other.matchtag
            && self.nodeid == other.nodeid
            && self.errnum == other.errnum
            && self.userid == other.userid
            && self.rolemask == other.rolemask
            && self.seq == other.seq
            && self.control_type == other.control_type
            && self.control_status == other.control_status
            && self.route_stack == other.route_stack
    }
}

impl Eq for Message {}

impl Message {
    /// Creates a new message of the given type, applying the type-specific
    /// defaults spec §4.1 requires: requests default `nodeid` to `Any`;
    /// responses default `errnum` to 0.
    pub fn new(msg_type: MsgType) -> Self {
        let nodeid = if msg_type == MsgType::Request {
            NodeId::Any
        } else {
            NodeId::Rank(0)
        };
        Self {
            msg_type,
            flags: MsgFlags::empty(),
            topic: None,
            payload: None,
            matchtag: Matchtag::NONE,
            nodeid,
            errnum: 0,
            userid: UserId::UNKNOWN,
            rolemask: RoleMask::NONE,
            seq: 0,
            control_type: 0,
            control_status: 0,
            route_stack: Vec::new(),
            aux: AuxMap::new(),
        }
    }

    pub fn msg_type(&self) -> MsgType {
        self.msg_type
    }

    /// Re-types the message, applying the same set-time defaults as `new`.
    pub fn set_type(&mut self, msg_type: MsgType) {
        self.msg_type = msg_type;
        match msg_type {
            MsgType::Request => self.nodeid = NodeId::Any,
            MsgType::Response => self.errnum = 0,
            _ => {}
        }
    }

    pub fn flags(&self) -> MsgFlags {
        self.flags
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn set_topic(&mut self, topic: impl Into<String>) {
        self.topic = Some(topic.into());
        self.flags.insert(MsgFlags::TOPIC);
    }

    pub fn clear_topic(&mut self) {
        self.topic = None;
        self.flags.remove(MsgFlags::TOPIC);
    }

    pub fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    /// Sets the payload. Setting a payload after clearing one toggles the
    /// `PAYLOAD` flag (spec §4.1 invariant).
    pub fn set_payload(&mut self, payload: Bytes, is_json: bool) {
        self.payload = Some(payload);
        self.flags.insert(MsgFlags::PAYLOAD);
        self.flags.set(MsgFlags::PAYLOAD_IS_JSON, is_json);
    }

    pub fn clear_payload(&mut self) {
        self.payload = None;
        self.flags.remove(MsgFlags::PAYLOAD);
        self.flags.remove(MsgFlags::PAYLOAD_IS_JSON);
    }

    /// Starts a typed JSON payload builder (spec §9: replaces the variadic
    /// pack/unpack string form).
    pub fn pack() -> PayloadBuilder {
        PayloadBuilder::new()
    }

    /// Decodes the JSON payload into `T`.
    pub fn unpack<T: serde::de::DeserializeOwned>(&self) -> Result<T, WireError> {
        let payload = self.payload.as_deref().unwrap_or(b"{}");
        Ok(serde_json::from_slice(payload)?)
    }

    pub fn matchtag(&self) -> Matchtag {
        self.matchtag
    }

    pub fn set_matchtag(&mut self, tag: Matchtag) {
        self.matchtag = tag;
    }

    pub fn nodeid(&self) -> NodeId {
        self.nodeid
    }

    pub fn set_nodeid(&mut self, nodeid: NodeId) {
        self.nodeid = nodeid;
        if nodeid == NodeId::Upstream {
            self.flags.insert(MsgFlags::ROUTE_AWAY_FROM_SENDER);
        }
    }

    pub fn errnum(&self) -> i32 {
        self.errnum
    }

    pub fn set_errnum(&mut self, errnum: i32) {
        self.errnum = errnum;
    }

    pub fn userid(&self) -> UserId {
        self.userid
    }

    pub fn set_userid(&mut self, userid: UserId) {
        self.userid = userid;
    }

    pub fn rolemask(&self) -> RoleMask {
        self.rolemask
    }

    pub fn set_rolemask(&mut self, rolemask: RoleMask) {
        self.rolemask = rolemask;
    }

    pub fn seq(&self) -> u32 {
        self.seq
    }

    pub fn set_seq(&mut self, seq: u32) {
        self.seq = seq;
    }

    pub fn control(&self) -> (ControlType, i32) {
        (self.control_type, self.control_status)
    }

    pub fn set_control(&mut self, control_type: ControlType, control_status: i32) {
        self.control_type = control_type;
        self.control_status = control_status;
    }

    /// `flux_msg_authorize`: succeeds iff `OWNER` is set or the caller's uid
    /// matches the sender's (spec §3).
    pub fn authorize(&self, caller_uid: UserId) -> bool {
        flux_types::authorize(self.userid, self.rolemask, caller_uid)
    }

    // -- Route stack -------------------------------------------------------

    /// Pushes a nil delimiter and sets `HAS_ROUTE_STACK`. No-op if already
    /// enabled (spec §4.1).
    pub fn enable_route(&mut self) {
        self.flags.insert(MsgFlags::HAS_ROUTE_STACK);
    }

    /// Strips all route frames and clears `HAS_ROUTE_STACK`. No-op if
    /// already clear.
    pub fn clear_route(&mut self) {
        self.route_stack.clear();
        self.flags.remove(MsgFlags::HAS_ROUTE_STACK);
    }

    /// Pushes a route frame (mimics a dealer-to-router hop).
    pub fn push_route(&mut self, id: impl Into<Bytes>) {
        if !self.flags.contains(MsgFlags::HAS_ROUTE_STACK) {
            self.enable_route();
        }
        self.route_stack.push(id.into());
    }

    /// Pops a route frame (mimics a router-to-dealer hop).
    pub fn pop_route(&mut self) -> Option<Bytes> {
        self.route_stack.pop()
    }

    /// The frame closest to the delimiter: for requests, the sender; for
    /// responses, the recipient.
    pub fn route_first(&self) -> Option<&Bytes> {
        self.route_stack.first()
    }

    /// The frame farthest from the delimiter: for requests, the last hop;
    /// for responses, the next hop.
    pub fn route_last(&self) -> Option<&Bytes> {
        self.route_stack.last()
    }

    pub fn route_count(&self) -> usize {
        self.route_stack.len()
    }

    pub(crate) fn route_stack(&self) -> &[Bytes] {
        &self.route_stack
    }

    pub(crate) fn set_route_stack(&mut self, stack: Vec<Bytes>) {
        self.route_stack = stack;
    }

    /// Used only by the wire decoder to restore flag bits (e.g. `PRIVATE`,
    /// `STREAMING`, `NO_RESPONSE`) that have no dedicated setter.
    pub(crate) fn set_flags_raw(&mut self, flags: MsgFlags) {
        self.flags = flags;
    }

    // -- Aux -----------------------------------------------------------

    pub fn aux(&self) -> &AuxMap {
        &self.aux
    }

    pub fn aux_mut(&mut self) -> &mut AuxMap {
        &mut self.aux
    }

    /// Derives a response from a request (spec §4.1): copies the route
    /// stack verbatim, flips the type to `Response`, zeroes the
    /// credentials, and sets `errnum`.
    pub fn derive_response(request: &Message, errnum: i32) -> Message {
        let mut response = Message::new(MsgType::Response);
        response.matchtag = request.matchtag;
        response.flags = request.flags;
        response.flags.remove(MsgFlags::PAYLOAD);
        response.flags.remove(MsgFlags::PAYLOAD_IS_JSON);
        if let Some(topic) = &request.topic {
            response.topic = Some(topic.clone());
        }
        response.route_stack = request.route_stack.clone();
        response.userid = UserId::UNKNOWN;
        response.rolemask = RoleMask::NONE;
        response.errnum = errnum;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_request_defaults_nodeid_any() {
        let m = Message::new(MsgType::Request);
        assert_eq!(m.nodeid(), NodeId::Any);
    }

    #[test]
    fn new_response_defaults_errnum_zero() {
        let m = Message::new(MsgType::Response);
        assert_eq!(m.errnum(), 0);
    }

    #[test]
    fn enable_then_clear_route_is_identity() {
        let mut m = Message::new(MsgType::Request);
        m.push_route(Bytes::from_static(b"a"));
        m.enable_route();
        m.clear_route();
        assert_eq!(m.route_count(), 0);
        assert!(!m.flags().contains(MsgFlags::HAS_ROUTE_STACK));
    }

    #[test]
    fn derive_response_preserves_route_stack_order() {
        let mut req = Message::new(MsgType::Request);
        req.push_route(Bytes::from_static(b"a"));
        req.push_route(Bytes::from_static(b"b"));

        let resp = Message::derive_response(&req, 0);
        assert_eq!(resp.msg_type(), MsgType::Response);
        assert_eq!(resp.route_stack(), req.route_stack());
    }

    #[test]
    fn derive_response_clears_credentials() {
        let mut req = Message::new(MsgType::Request);
        req.set_userid(UserId::new(42));
        req.set_rolemask(RoleMask::OWNER);

        let resp = Message::derive_response(&req, 7);
        assert_eq!(resp.userid(), UserId::UNKNOWN);
        assert_eq!(resp.rolemask(), RoleMask::NONE);
        assert_eq!(resp.errnum(), 7);
    }

    #[test]
    fn pop_route_after_derive_drains_stack() {
        let mut req = Message::new(MsgType::Request);
        req.push_route(Bytes::from_static(b"a"));
        req.push_route(Bytes::from_static(b"b"));

        let mut resp = Message::derive_response(&req, 0);
        assert_eq!(resp.pop_route(), Some(Bytes::from_static(b"b")));
        assert_eq!(resp.pop_route(), Some(Bytes::from_static(b"a")));
        assert_eq!(resp.route_count(), 0);
    }

    #[test]
    fn authorize_owner_bypasses_uid_check() {
        let mut m = Message::new(MsgType::Request);
        m.set_userid(UserId::new(1));
        m.set_rolemask(RoleMask::OWNER);
        assert!(m.authorize(UserId::new(999)));
    }
}
