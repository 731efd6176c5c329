//! `loop://` connector: a single in-process [`Msglist`], grounded directly
//! on `src/connectors/loop/loop.c`.

use std::os::fd::RawFd;

use flux_msglist::Msglist;
use flux_types::{FluxError, FluxResult, PollEvents};
use flux_wire::SharedMessage;

use crate::flags::OpFlags;
use crate::ops::HandleOps;

/// Single-process loopback connector: `send` appends, `recv` pops. Used for
/// testing and single-process harnesses (spec §4.3).
pub struct LoopConnector {
    list: Msglist,
}

impl LoopConnector {
    pub fn new() -> Self {
        Self {
            list: Msglist::new(),
        }
    }
}

impl Default for LoopConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleOps for LoopConnector {
    fn send(&mut self, msg: SharedMessage, _flags: OpFlags) -> FluxResult<()> {
        self.list.append(msg)
    }

    fn recv(&mut self, _flags: OpFlags) -> FluxResult<SharedMessage> {
        self.list.pop().ok_or(FluxError::WouldBlock)
    }

    fn pollfd(&mut self) -> FluxResult<RawFd> {
        self.list.pollfd()
    }

    fn pollevents(&mut self) -> FluxResult<PollEvents> {
        Ok(self.list.pollevents())
    }

    /// Fakes `rank=0`/`size=1`/`tbon.fanout=2`, exactly as the original's
    /// `loop_getattr` does, since a loopback connector has no real TBON
    /// topology to report.
    fn getattr(&mut self, name: &str) -> FluxResult<String> {
        match name {
            "rank" => Ok("0".to_string()),
            "size" => Ok("1".to_string()),
            "tbon.fanout" => Ok("2".to_string()),
            other => Err(FluxError::NotFound(other.to_string())),
        }
    }

    fn setattr(&mut self, name: &str, _value: &str) -> FluxResult<()> {
        Err(FluxError::Invalid(format!(
            "attribute {name} is immutable on the loop connector"
        )))
    }

    fn event_subscribe(&mut self, _topic_glob: &str) -> FluxResult<()> {
        // A single-process loopback has no upstream to subscribe through;
        // every event appended locally is already "subscribed".
        Ok(())
    }

    fn event_unsubscribe(&mut self, _topic_glob: &str) -> FluxResult<()> {
        Ok(())
    }

    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_types::MsgType;
    use flux_wire::Message;

    #[test]
    fn send_then_recv_roundtrips() {
        let mut c = LoopConnector::new();
        let msg = SharedMessage::new(Message::new(MsgType::Event));
        c.send(msg.clone(), OpFlags::default()).unwrap();
        assert_eq!(c.recv(OpFlags::default()).unwrap(), msg);
    }

    #[test]
    fn recv_on_empty_list_would_block() {
        let mut c = LoopConnector::new();
        assert!(matches!(
            c.recv(OpFlags::default()),
            Err(FluxError::WouldBlock)
        ));
    }

    #[test]
    fn fakes_single_rank_topology() {
        let mut c = LoopConnector::new();
        assert_eq!(c.getattr("rank").unwrap(), "0");
        assert_eq!(c.getattr("size").unwrap(), "1");
    }
}
