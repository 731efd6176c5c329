//! Generic length-prefixed stream connector shared by `fd://`, `local://`,
//! and `tcp://` (spec §4.3). Grounded on kimberlite-server's `Connection`:
//! a read buffer that's filled until `WouldBlock`, a write buffer that's
//! drained the same way, and frames pulled out as they complete.

use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, RawFd};

use bytes::{Bytes, BytesMut};

use flux_types::{FluxError, FluxResult, PollEvents};
use flux_wire::SharedMessage;

use crate::flags::OpFlags;
use crate::framing;
use crate::ops::HandleOps;

/// One-byte handshake both peers exchange before the first framed message
/// (spec §4.3: "peers exchange a one-byte handshake on open").
const HANDSHAKE_BYTE: u8 = 0x1;

/// A connector over any duplex byte stream (`File`, `UnixStream`,
/// `TcpStream`) that frames messages with [`framing`].
pub struct StreamConnector<S> {
    stream: S,
    read_buf: BytesMut,
    write_buf: BytesMut,
    handshake_sent: bool,
    handshake_received: bool,
}

impl<S: Read + Write + AsRawFd> StreamConnector<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(4096),
            write_buf: BytesMut::with_capacity(4096),
            handshake_sent: false,
            handshake_received: false,
        }
    }

    fn fill_read_buf(&mut self) -> FluxResult<()> {
        let mut tmp = [0u8; 4096];
        loop {
            match self.stream.read(&mut tmp) {
                Ok(0) => return Ok(()),
                Ok(n) => self.read_buf.extend_from_slice(&tmp[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(FluxError::Io(e)),
            }
        }
    }

    fn drain_write_buf(&mut self) -> FluxResult<()> {
        while !self.write_buf.is_empty() {
            match self.stream.write(&self.write_buf) {
                Ok(0) => {
                    return Err(FluxError::Io(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "connector write returned zero",
                    )))
                }
                Ok(n) => {
                    let _ = self.write_buf.split_to(n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(FluxError::Io(e)),
            }
        }
        Ok(())
    }

    fn ensure_handshake_sent(&mut self) -> FluxResult<()> {
        if !self.handshake_sent {
            self.write_buf.extend_from_slice(&[HANDSHAKE_BYTE]);
            self.handshake_sent = true;
            self.drain_write_buf()?;
        }
        Ok(())
    }

    fn consume_handshake_if_present(&mut self) {
        if !self.handshake_received && !self.read_buf.is_empty() {
            let _ = self.read_buf.split_to(1);
            self.handshake_received = true;
        }
    }
}

impl<S: Read + Write + AsRawFd + Send> HandleOps for StreamConnector<S> {
    /// Enqueues the frame and attempts to flush it. The underlying fd is
    /// always OS-nonblocking, so this never blocks the caller; a partially
    /// flushed write stays queued and is retried on the next `send`/`recv`/
    /// `pollevents` call. Unlike the original's fixed-size ZMQ high-water
    /// mark, the write buffer here grows unbounded, so `flags` is currently
    /// unused — a blocking caller is handled by [`crate::Handle`] spinning
    /// on `WouldBlock`, which this connector never returns for `send`.
    fn send(&mut self, msg: SharedMessage, _flags: OpFlags) -> FluxResult<()> {
        self.ensure_handshake_sent()?;
        let frame: Bytes = framing::encode_frame(&msg);
        self.write_buf.extend_from_slice(&frame);
        self.drain_write_buf()
    }

    fn recv(&mut self, _flags: OpFlags) -> FluxResult<SharedMessage> {
        self.ensure_handshake_sent()?;
        self.fill_read_buf()?;
        self.consume_handshake_if_present();

        match framing::try_decode_frame(&mut self.read_buf)? {
            Some(msg) => Ok(SharedMessage::new(msg)),
            None => Err(FluxError::WouldBlock),
        }
    }

    fn pollfd(&mut self) -> FluxResult<RawFd> {
        Ok(self.stream.as_raw_fd())
    }

    fn pollevents(&mut self) -> FluxResult<PollEvents> {
        self.fill_read_buf()?;
        self.consume_handshake_if_present();
        let mut events = PollEvents::POLLOUT;
        if !self.read_buf.is_empty() {
            events.insert(PollEvents::POLLIN);
        }
        Ok(events)
    }

    fn getattr(&mut self, name: &str) -> FluxResult<String> {
        Err(FluxError::NotFound(format!(
            "attribute {name} not available without a broker round-trip"
        )))
    }

    fn setattr(&mut self, _name: &str, _value: &str) -> FluxResult<()> {
        Err(FluxError::NoSuchService("attr_set over a raw stream connector".to_string()))
    }

    fn event_subscribe(&mut self, topic_glob: &str) -> FluxResult<()> {
        tracing::debug!(topic_glob, "event_subscribe is a broker-side no-op on a raw stream");
        Ok(())
    }

    fn event_unsubscribe(&mut self, topic_glob: &str) -> FluxResult<()> {
        tracing::debug!(topic_glob, "event_unsubscribe is a broker-side no-op on a raw stream");
        Ok(())
    }

    fn close(&mut self) {
        let _ = self.drain_write_buf();
    }
}
