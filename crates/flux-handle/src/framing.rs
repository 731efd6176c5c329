//! Length-prefixed framing shared by the `fd`, `local`, and `tcp` connectors
//! (spec §4.3: "every message is framed with a length prefix and the same
//! encoding as the wire protocol"). Grounded on kimberlite-server's
//! `Connection::read`/`try_decode_request` buffering loop.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use flux_wire::{Message, WireError};

const LEN_PREFIX: usize = 4;

/// Prepends a `u32` big-endian length prefix to an encoded message.
pub fn encode_frame(msg: &Message) -> Bytes {
    let body = msg.encode();
    let mut buf = BytesMut::with_capacity(LEN_PREFIX + body.len());
    buf.put_u32(body.len() as u32);
    buf.extend_from_slice(&body);
    buf.freeze()
}

/// Pulls one complete frame out of an accumulation buffer, if present.
/// Leaves `buf` untouched (aside from the consumed bytes) so callers can
/// call this repeatedly as more bytes arrive.
pub fn try_decode_frame(buf: &mut BytesMut) -> Result<Option<Message>, WireError> {
    if buf.remaining() < LEN_PREFIX {
        return Ok(None);
    }
    let len = u32::from_be_bytes(buf[..LEN_PREFIX].try_into().unwrap()) as usize;
    if buf.remaining() < LEN_PREFIX + len {
        return Ok(None);
    }
    buf.advance(LEN_PREFIX);
    let frame = buf.copy_to_bytes(len);
    Message::decode(frame).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_types::MsgType;

    #[test]
    fn partial_frame_yields_none() {
        let mut m = Message::new(MsgType::Event);
        m.set_topic("x.y");
        let full = encode_frame(&m);

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&full[..full.len() - 1]);
        assert_eq!(try_decode_frame(&mut buf).unwrap(), None);
    }

    #[test]
    fn complete_frame_decodes_and_drains_buffer() {
        let mut m = Message::new(MsgType::Event);
        m.set_topic("x.y");
        let full = encode_frame(&m);

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&full);
        let decoded = try_decode_frame(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, m);
        assert!(buf.is_empty());
    }

    #[test]
    fn two_back_to_back_frames_decode_in_order() {
        let mut a = Message::new(MsgType::Event);
        a.set_topic("a");
        let mut b = Message::new(MsgType::Event);
        b.set_topic("b");

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&encode_frame(&a));
        buf.extend_from_slice(&encode_frame(&b));

        assert_eq!(try_decode_frame(&mut buf).unwrap().unwrap(), a);
        assert_eq!(try_decode_frame(&mut buf).unwrap().unwrap(), b);
        assert_eq!(try_decode_frame(&mut buf).unwrap(), None);
    }
}
