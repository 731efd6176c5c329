//! Connector selection by URI scheme, plus the `FLUX_URI`/`FLUX_TMPDIR`
//! environment fallback (spec §4.3, §6).

use std::env;
use std::path::PathBuf;

use flux_types::FluxError;

/// A parsed connector target, selected by URI scheme.
pub enum Target {
    Loop,
    Fd(i32),
    Local(PathBuf),
    Tcp { host: String, port: u16 },
}

/// Resolves the URI a caller passed to `flux_open`, falling back to
/// `FLUX_URI` if `uri` is `None`, and finally to a `local://` path derived
/// from `FLUX_TMPDIR`/`TMPDIR` if neither is set (spec §6).
pub fn resolve(uri: Option<&str>) -> Result<Target, FluxError> {
    if let Some(uri) = uri {
        return parse(uri);
    }
    if let Ok(uri) = env::var("FLUX_URI") {
        return parse(&uri);
    }
    let tmpdir = env::var("FLUX_TMPDIR")
        .or_else(|_| env::var("TMPDIR"))
        .unwrap_or_else(|_| "/tmp".to_string());
    Ok(Target::Local(
        crate::connector::local::default_path(&PathBuf::from(tmpdir), 0),
    ))
}

fn parse(uri: &str) -> Result<Target, FluxError> {
    if uri == "loop://" || uri == "loop" {
        return Ok(Target::Loop);
    }
    if let Some(rest) = uri.strip_prefix("fd://") {
        let fd = rest
            .parse::<i32>()
            .map_err(|_| FluxError::Invalid(format!("bad fd:// uri: {uri}")))?;
        return Ok(Target::Fd(fd));
    }
    if let Some(rest) = uri.strip_prefix("local://") {
        return Ok(Target::Local(PathBuf::from(rest)));
    }
    if let Some(rest) = uri.strip_prefix("tcp://") {
        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| FluxError::Invalid(format!("bad tcp:// uri: {uri}")))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| FluxError::Invalid(format!("bad tcp:// port: {uri}")))?;
        return Ok(Target::Tcp {
            host: host.to_string(),
            port,
        });
    }
    Err(FluxError::Invalid(format!("unrecognized connector uri: {uri}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tcp_uri() {
        match parse("tcp://localhost:8080").unwrap() {
            Target::Tcp { host, port } => {
                assert_eq!(host, "localhost");
                assert_eq!(port, 8080);
            }
            _ => panic!("expected tcp target"),
        }
    }

    #[test]
    fn parses_fd_uri() {
        match parse("fd://7").unwrap() {
            Target::Fd(fd) => assert_eq!(fd, 7),
            _ => panic!("expected fd target"),
        }
    }

    #[test]
    fn parses_local_uri() {
        match parse("local:///tmp/flux/local-0").unwrap() {
            Target::Local(path) => assert_eq!(path, PathBuf::from("/tmp/flux/local-0")),
            _ => panic!("expected local target"),
        }
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert!(parse("carrier-pigeon://nowhere").is_err());
    }
}
