//! `tcp://host:port` connector, framed the same way as `fd://`/`local://`
//! (spec §4.3).

use std::net::TcpStream;

use flux_types::{FluxError, FluxResult};

use crate::connector::stream::StreamConnector;

pub fn connect(host: &str, port: u16) -> FluxResult<StreamConnector<TcpStream>> {
    let stream = TcpStream::connect((host, port)).map_err(FluxError::Io)?;
    stream.set_nodelay(true).map_err(FluxError::Io)?;
    stream.set_nonblocking(true).map_err(FluxError::Io)?;
    Ok(StreamConnector::new(stream))
}
