//! The error taxonomy shared by every layer (spec §7).

use thiserror::Error;

/// Result alias used throughout the workspace.
pub type FluxResult<T> = Result<T, FluxError>;

/// Every operation that can fail returns one of these kinds, mirroring the
/// POSIX errno set spec.md §7 enumerates. There is no null-pointer-and-errno
/// convention here: callers get a typed `Result`.
#[derive(Debug, Error)]
pub enum FluxError {
    /// `EINVAL` — bad argument.
    #[error("invalid argument: {0}")]
    Invalid(String),

    /// `ENOENT` — missing attribute, handler, or future.
    #[error("not found: {0}")]
    NotFound(String),

    /// `EEXIST` — duplicate registration.
    #[error("already exists: {0}")]
    Exists(String),

    /// `EPROTO` — malformed message.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// `EAGAIN` / `EWOULDBLOCK` — would block in nonblocking mode.
    #[error("would block")]
    WouldBlock,

    /// `ENODATA` — stream end.
    #[error("no data")]
    NoData,

    /// `ENOSYS` — no such service.
    #[error("no such service: {0}")]
    NoSuchService(String),

    /// `EPERM` — authorization failed.
    #[error("permission denied")]
    PermissionDenied,

    /// `ETIMEDOUT` — future timeout.
    #[error("timed out")]
    TimedOut,

    /// `ENOMEM` — allocation failure.
    #[error("out of memory")]
    NoMemory,

    /// `EOVERFLOW` — bounded collection full.
    #[error("overflow: {0}")]
    Overflow(String),

    /// Ambient escape hatch for connector I/O failures; every teacher error
    /// enum (e.g. `ServerError::Io`) carries one of these.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

// `#[derive(Clone)]` doesn't reach through `io::Error`, which isn't `Clone`
// itself; reconstruct it from its kind and message instead. Needed so
// `FluxResult<T>` can flow through `Future<T>`'s `Clone` bound (composite
// futures store a `Vec<FluxResult<T>>`).
impl Clone for FluxError {
    fn clone(&self) -> Self {
        match self {
            Self::Invalid(s) => Self::Invalid(s.clone()),
            Self::NotFound(s) => Self::NotFound(s.clone()),
            Self::Exists(s) => Self::Exists(s.clone()),
            Self::Protocol(s) => Self::Protocol(s.clone()),
            Self::WouldBlock => Self::WouldBlock,
            Self::NoData => Self::NoData,
            Self::NoSuchService(s) => Self::NoSuchService(s.clone()),
            Self::PermissionDenied => Self::PermissionDenied,
            Self::TimedOut => Self::TimedOut,
            Self::NoMemory => Self::NoMemory,
            Self::Overflow(s) => Self::Overflow(s.clone()),
            Self::Io(e) => Self::Io(std::io::Error::new(e.kind(), e.to_string())),
        }
    }
}

impl FluxError {
    /// Short errno-like tag, used in `tracing` fields and wire-level error
    /// responses (spec §3 `errnum`).
    pub fn as_errno_str(&self) -> &'static str {
        match self {
            Self::Invalid(_) => "EINVAL",
            Self::NotFound(_) => "ENOENT",
            Self::Exists(_) => "EEXIST",
            Self::Protocol(_) => "EPROTO",
            Self::WouldBlock => "EAGAIN",
            Self::NoData => "ENODATA",
            Self::NoSuchService(_) => "ENOSYS",
            Self::PermissionDenied => "EPERM",
            Self::TimedOut => "ETIMEDOUT",
            Self::NoMemory => "ENOMEM",
            Self::Overflow(_) => "EOVERFLOW",
            Self::Io(_) => "EIO",
        }
    }

    /// Maps to a conventional errno integer, used when encoding a response's
    /// `errnum` field on the wire.
    pub fn as_errno(&self) -> i32 {
        match self {
            Self::Invalid(_) => libc_errno::EINVAL,
            Self::NotFound(_) => libc_errno::ENOENT,
            Self::Exists(_) => libc_errno::EEXIST,
            Self::Protocol(_) => libc_errno::EPROTO,
            Self::WouldBlock => libc_errno::EAGAIN,
            Self::NoData => libc_errno::ENODATA,
            Self::NoSuchService(_) => libc_errno::ENOSYS,
            Self::PermissionDenied => libc_errno::EPERM,
            Self::TimedOut => libc_errno::ETIMEDOUT,
            Self::NoMemory => libc_errno::ENOMEM,
            Self::Overflow(_) => libc_errno::EOVERFLOW,
            Self::Io(_) => libc_errno::EIO,
        }
    }

    /// Reconstructs an error from a response's `errnum` and optional
    /// human-readable description (spec §7: the description is informational
    /// only, never the basis for programmatic decisions).
    pub fn from_errno(errnum: i32, desc: Option<&str>) -> Self {
        let msg = |default: &str| desc.unwrap_or(default).to_string();
        match errnum {
            libc_errno::EINVAL => Self::Invalid(msg("invalid argument")),
            libc_errno::ENOENT => Self::NotFound(msg("not found")),
            libc_errno::EEXIST => Self::Exists(msg("already exists")),
            libc_errno::EPROTO => Self::Protocol(msg("protocol error")),
            libc_errno::EAGAIN => Self::WouldBlock,
            libc_errno::ENODATA => Self::NoData,
            libc_errno::ENOSYS => Self::NoSuchService(msg("no such service")),
            libc_errno::EPERM => Self::PermissionDenied,
            libc_errno::ETIMEDOUT => Self::TimedOut,
            libc_errno::ENOMEM => Self::NoMemory,
            libc_errno::EOVERFLOW => Self::Overflow(msg("overflow")),
            _ => Self::Protocol(msg("unknown error")),
        }
    }
}

/// Errno constants, kept local so this crate does not need to depend on
/// `libc` just for a handful of integers (the wire encoding only needs
/// their numeric value, never OS-level syscalls).
#[allow(dead_code)]
mod libc_errno {
    pub const EPERM: i32 = 1;
    pub const ENOENT: i32 = 2;
    pub const EIO: i32 = 5;
    pub const EAGAIN: i32 = 11;
    pub const ENOMEM: i32 = 12;
    pub const EEXIST: i32 = 17;
    pub const EINVAL: i32 = 22;
    pub const ENOSYS: i32 = 38;
    pub const ENODATA: i32 = 61;
    pub const EPROTO: i32 = 71;
    pub const EOVERFLOW: i32 = 75;
    pub const ETIMEDOUT: i32 = 110;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_roundtrips_through_from_errno() {
        let err = FluxError::NoData;
        let errnum = err.as_errno();
        assert!(matches!(
            FluxError::from_errno(errnum, None),
            FluxError::NoData
        ));
    }

    #[test]
    fn permission_denied_has_no_payload() {
        assert_eq!(FluxError::PermissionDenied.as_errno_str(), "EPERM");
    }
}
