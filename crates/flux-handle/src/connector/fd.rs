//! `fd://N` connector: a pre-connected, already-open file descriptor used
//! bidirectionally for both send and recv (spec §4.3).

use std::fs::File;
use std::os::fd::{FromRawFd, OwnedFd, RawFd};

use flux_types::FluxResult;

use crate::connector::stream::StreamConnector;

pub fn open(fd: RawFd) -> FluxResult<StreamConnector<File>> {
    // SAFETY: the caller (`flux_open("fd://N", ...)`) asserts `fd` is a
    // valid, open, and exclusively owned descriptor.
    let owned = unsafe { OwnedFd::from_raw_fd(fd) };
    set_nonblocking(&owned)?;
    Ok(StreamConnector::new(File::from(owned)))
}

#[cfg(unix)]
fn set_nonblocking(fd: &OwnedFd) -> FluxResult<()> {
    use std::os::fd::AsRawFd;
    // SAFETY: `fd` is a valid, open descriptor for the duration of this call.
    let flags = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_GETFL) };
    if flags < 0 {
        return Err(flux_types::FluxError::Io(std::io::Error::last_os_error()));
    }
    // SAFETY: same contract as above.
    let rc = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(flux_types::FluxError::Io(std::io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_nonblocking(_fd: &OwnedFd) -> FluxResult<()> {
    Err(flux_types::FluxError::Io(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "fd:// connector requires unix",
    )))
}
