//! Byte-for-byte wire encoding (spec §6).
//!
//! Every integer field is network byte order, in this fixed order: type
//! discriminant (1 byte), flags (u16), matchtag (u32), nodeid (u32), errnum
//! (u32), seq (u32), userid (u32), rolemask (u32). Then, when their flag
//! bits are set: the route stack (a sequence of length-prefixed frames
//! terminated by a zero-length frame standing in for the nil delimiter),
//! the topic (length-prefixed utf-8), and the payload (length-prefixed
//! bytes) — in that order.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use flux_types::{Matchtag, MsgFlags, MsgType, NodeId, RoleMask, UserId};

use crate::message::Message;
use crate::WireError;

const HEADER_LEN: usize = 1 + 2 + 4 + 4 + 4 + 4 + 4 + 4;

impl Message {
    /// Serializes this message to its wire form.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + 64);

        buf.put_u8(self.msg_type().as_u8());
        buf.put_u16(self.flags().bits());
        buf.put_u32(self.matchtag().get());
        buf.put_u32(self.nodeid().to_wire());
        #[allow(clippy::cast_sign_loss)]
        buf.put_u32(self.errnum() as u32);
        buf.put_u32(self.seq());
        buf.put_u32(self.userid().get());
        buf.put_u32(self.rolemask().bits());

        if self.flags().contains(MsgFlags::HAS_ROUTE_STACK) {
            for frame in self.route_stack() {
                put_frame(&mut buf, frame);
            }
            buf.put_u32(0); // nil delimiter
        }
        if self.flags().contains(MsgFlags::TOPIC) {
            put_frame(&mut buf, self.topic().unwrap_or("").as_bytes());
        }
        if self.flags().contains(MsgFlags::PAYLOAD) {
            put_frame(&mut buf, self.payload().map(|b| b.as_ref()).unwrap_or(&[]));
        }

        buf.freeze()
    }

    /// Parses a message from its wire form.
    ///
    /// Validates the type discriminant, the flag bits, and that a route
    /// stack (if present) is terminated by its nil delimiter (spec §4.1).
    pub fn decode(mut bytes: impl Buf) -> Result<Message, WireError> {
        if bytes.remaining() < HEADER_LEN {
            return Err(WireError::Truncated {
                wanted: HEADER_LEN,
                had: bytes.remaining(),
            });
        }

        let type_byte = bytes.get_u8();
        let msg_type =
            MsgType::from_u8(type_byte).ok_or(WireError::BadDiscriminant(type_byte))?;
        let flags = MsgFlags::from_bits_truncate(bytes.get_u16());
        let matchtag = Matchtag::new(bytes.get_u32());
        let nodeid = NodeId::from_wire(bytes.get_u32());
        #[allow(clippy::cast_possible_wrap)]
        let errnum = bytes.get_u32() as i32;
        let seq = bytes.get_u32();
        let userid = UserId::new(bytes.get_u32());
        let rolemask = RoleMask::from_bits_truncate(bytes.get_u32());

        let mut msg = Message::new(msg_type);
        msg.set_matchtag(matchtag);
        msg.set_nodeid(nodeid);
        msg.set_errnum(errnum);
        msg.set_seq(seq);
        msg.set_userid(userid);
        msg.set_rolemask(rolemask);
        msg.set_flags_raw(flags);

        if flags.contains(MsgFlags::HAS_ROUTE_STACK) {
            let mut stack = Vec::new();
            loop {
                let frame = get_frame(&mut bytes)?;
                if frame.is_empty() {
                    break;
                }
                stack.push(frame);
            }
            msg.enable_route();
            msg.set_route_stack(stack);
        }
        if flags.contains(MsgFlags::TOPIC) {
            let frame = get_frame(&mut bytes)?;
            let topic = std::str::from_utf8(&frame).map_err(WireError::BadTopicUtf8)?;
            msg.set_topic(topic.to_string());
        }
        if flags.contains(MsgFlags::PAYLOAD) {
            let frame = get_frame(&mut bytes)?;
            msg.set_payload(frame, flags.contains(MsgFlags::PAYLOAD_IS_JSON));
        }

        Ok(msg)
    }
}

fn put_frame(buf: &mut BytesMut, data: &[u8]) {
    buf.put_u32(data.len() as u32);
    buf.put_slice(data);
}

fn get_frame(bytes: &mut impl Buf) -> Result<Bytes, WireError> {
    if bytes.remaining() < 4 {
        return Err(WireError::Truncated {
            wanted: 4,
            had: bytes.remaining(),
        });
    }
    let len = bytes.get_u32() as usize;
    if bytes.remaining() < len {
        return Err(WireError::Truncated {
            wanted: len,
            had: bytes.remaining(),
        });
    }
    Ok(bytes.copy_to_bytes(len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encode_decode_roundtrips_plain_request() {
        let mut m = Message::new(MsgType::Request);
        m.set_topic("foo.bar");
        m.set_payload(Bytes::from_static(b"hi"), false);

        let encoded = m.encode();
        let decoded = Message::decode(encoded.clone()).unwrap();
        assert_eq!(m, decoded);
    }

    #[test]
    fn encode_decode_roundtrips_route_stack() {
        let mut m = Message::new(MsgType::Request);
        m.push_route(Bytes::from_static(b"a"));
        m.push_route(Bytes::from_static(b"b"));
        m.set_topic("svc.op");

        let decoded = Message::decode(m.encode()).unwrap();
        assert_eq!(m, decoded);
        assert_eq!(decoded.route_count(), 2);
    }

    #[test]
    fn decode_rejects_bad_discriminant() {
        let mut buf = BytesMut::new();
        buf.put_u8(0xFF);
        buf.put_bytes(0, HEADER_LEN - 1);
        assert!(matches!(
            Message::decode(buf.freeze()),
            Err(WireError::BadDiscriminant(0xFF))
        ));
    }

    #[test]
    fn decode_rejects_truncated_header() {
        let buf = Bytes::from_static(&[0x01, 0x00]);
        assert!(matches!(
            Message::decode(buf),
            Err(WireError::Truncated { .. })
        ));
    }

    proptest! {
        #[test]
        fn roundtrip_holds_for_arbitrary_topic_and_payload(
            topic in "[a-z]{1,16}(\\.[a-z]{1,16}){0,3}",
            payload in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let mut m = Message::new(MsgType::Event);
            m.set_topic(topic);
            m.set_payload(Bytes::from(payload), false);
            m.set_seq(42);

            let decoded = Message::decode(m.encode()).unwrap();
            prop_assert_eq!(m, decoded);
        }
    }
}
