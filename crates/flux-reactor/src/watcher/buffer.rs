//! Buffer-read / buffer-write watchers: fd plus an internal byte buffer
//! (spec §4.4). Grounded on kimberlite-server's `Connection::read`/`write`
//! buffering loop (`connection.rs`).

use std::io::{self, Read, Write};
use std::os::fd::RawFd;

use bytes::{Buf, BytesMut};

use super::meta::WatcherMeta;
use crate::Reactor;

/// Read watcher fires with either a complete line (if line mode) or up to a
/// chunk size of bytes; an empty read signals EOF and the callback is
/// invoked with zero bytes (spec §4.4).
pub enum BufferReadMode {
    Line,
    Chunk(usize),
}

pub struct BufferReadWatcher {
    pub(crate) meta: WatcherMeta,
    pub(crate) fd: RawFd,
    pub(crate) mode: BufferReadMode,
    pub(crate) buf: BytesMut,
    pub(crate) eof: bool,
    pub(crate) callback: Box<dyn FnMut(&mut Reactor, &[u8])>,
}

impl BufferReadWatcher {
    /// Reads as much as is available without blocking, then extracts
    /// whatever complete units (lines or chunks) the mode calls for.
    pub(crate) fn pump(&mut self, file: &mut std::fs::File) -> io::Result<Vec<Vec<u8>>> {
        let mut tmp = [0u8; 4096];
        loop {
            match file.read(&mut tmp) {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(n) => self.buf.extend_from_slice(&tmp[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }
        Ok(self.drain_ready_units())
    }

    fn drain_ready_units(&mut self) -> Vec<Vec<u8>> {
        let mut units = Vec::new();
        match self.mode {
            BufferReadMode::Line => {
                while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                    let mut line = self.buf.split_to(pos + 1);
                    line.truncate(line.len() - 1);
                    units.push(line.to_vec());
                }
            }
            BufferReadMode::Chunk(size) => {
                while self.buf.remaining() >= size {
                    units.push(self.buf.split_to(size).to_vec());
                }
            }
        }
        units
    }
}

pub struct BufferWriteWatcher {
    pub(crate) meta: WatcherMeta,
    pub(crate) fd: RawFd,
    pub(crate) buf: BytesMut,
    pub(crate) callback: Box<dyn FnMut(&mut Reactor)>,
}

impl BufferWriteWatcher {
    pub(crate) fn pump(&mut self, file: &mut std::fs::File) -> io::Result<()> {
        while !self.buf.is_empty() {
            match file.write(&self.buf) {
                Ok(0) => return Err(io::Error::new(io::ErrorKind::WriteZero, "zero write")),
                Ok(n) => {
                    let _ = self.buf.split_to(n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Drains and closes the fd (spec §4.4 `close()`).
    pub(crate) fn close(&mut self, file: &mut std::fs::File) {
        let _ = self.pump(file);
    }
}
