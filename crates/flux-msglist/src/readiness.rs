//! The eventfd-backed readiness signal behind [`crate::Msglist::pollfd`].
//!
//! Grounded directly on the original's `src/common/libutil/msglist.c`:
//! `raise_event`/`clear_event` write/read a single `u64` to/from a
//! nonblocking `eventfd`, so the fd is readable exactly when the list's
//! pollevents have a bit set that the fd hasn't yet signaled.

use std::io;
use std::os::fd::RawFd;

/// Platform hook for the msglist's pollable fd. Lazily allocated (spec §4.2:
/// `pollfd()` is lazily allocated), level-triggered from the caller's
/// perspective even though the underlying primitive is edge-triggered
/// internally (`raise`/`clear` track the one-shot `1` write manually).
pub trait ReadinessFd: Send {
    fn raw_fd(&self) -> RawFd;
    /// Arms the fd as readable. Idempotent.
    fn raise(&mut self) -> io::Result<()>;
    /// Disarms the fd. Idempotent; swallows `EAGAIN`/`EWOULDBLOCK` the way
    /// the original's `clear_event` does (the fd may already be clear).
    fn clear(&mut self) -> io::Result<()>;
}

#[cfg(unix)]
mod unix_eventfd {
    use super::ReadinessFd;
    use std::io;
    use std::os::fd::RawFd;

    pub struct EventFd {
        fd: RawFd,
        armed: bool,
    }

    impl EventFd {
        pub fn new() -> io::Result<Self> {
            // SAFETY: `eventfd(2)` with `EFD_NONBLOCK` has no preconditions
            // beyond the two integer arguments supplied here.
            let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK) };
            if fd < 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(Self { fd, armed: false })
        }
    }

    impl ReadinessFd for EventFd {
        fn raw_fd(&self) -> RawFd {
            self.fd
        }

        fn raise(&mut self) -> io::Result<()> {
            if self.armed {
                return Ok(());
            }
            let val: u64 = 1;
            // SAFETY: `fd` is a valid, open eventfd owned by this struct;
            // `val` is a correctly sized buffer for the eventfd write protocol.
            let n = unsafe {
                libc::write(
                    self.fd,
                    std::ptr::addr_of!(val).cast(),
                    std::mem::size_of::<u64>(),
                )
            };
            if n < 0 {
                return Err(io::Error::last_os_error());
            }
            self.armed = true;
            Ok(())
        }

        fn clear(&mut self) -> io::Result<()> {
            if !self.armed {
                return Ok(());
            }
            let mut val: u64 = 0;
            // SAFETY: same fd/buffer contract as `raise`.
            let n = unsafe {
                libc::read(
                    self.fd,
                    std::ptr::addr_of_mut!(val).cast(),
                    std::mem::size_of::<u64>(),
                )
            };
            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() != io::ErrorKind::WouldBlock {
                    return Err(err);
                }
            }
            self.armed = false;
            Ok(())
        }
    }

    impl Drop for EventFd {
        fn drop(&mut self) {
            if self.fd >= 0 {
                // SAFETY: `fd` is owned exclusively by this struct.
                unsafe {
                    libc::close(self.fd);
                }
            }
        }
    }
}

#[cfg(unix)]
pub fn create() -> io::Result<Box<dyn ReadinessFd>> {
    Ok(Box::new(unix_eventfd::EventFd::new()?))
}

#[cfg(not(unix))]
pub fn create() -> io::Result<Box<dyn ReadinessFd>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "msglist pollfd requires a unix eventfd backend",
    ))
}
