//! `local://PATH` connector: a UNIX-domain stream socket, framed the same
//! way as `fd://` (spec §4.3).

use std::os::unix::net::UnixStream;
use std::path::Path;

use flux_types::{FluxError, FluxResult};

use crate::connector::stream::StreamConnector;

pub fn connect(path: &Path) -> FluxResult<StreamConnector<UnixStream>> {
    let stream = UnixStream::connect(path).map_err(FluxError::Io)?;
    stream.set_nonblocking(true).map_err(FluxError::Io)?;
    Ok(StreamConnector::new(stream))
}

/// Derives the default socket path for a rank, as `flux_open`'s
/// `FLUX_TMPDIR`/`TMPDIR` fallback describes (spec §6).
pub fn default_path(tmpdir: &Path, rank: u32) -> std::path::PathBuf {
    tmpdir.join(format!("local-{rank}"))
}
