//! RFC-6-style disconnect/cancel helpers (spec §4.4, §4.6), grounded on
//! the original's `src/common/libflux/disconnect.c`.

use flux_handle::Handle;
use flux_handle::OpFlags;
use flux_msglist::Msglist;
use flux_types::{FluxResult, Matchtag};
use flux_wire::{Message, SharedMessage};

#[derive(serde::Deserialize)]
struct CancelPayload {
    matchtag: u32,
}

/// Authorization rule shared by disconnect and cancel (spec §4.4): the
/// incoming message's own credentials decide whether it may act on
/// `stored` — owner role acts on anything, a plain user only on requests
/// bearing its own userid. Mirrors `flux_disconnect_match`'s cred check,
/// minus the route comparison (done by the caller, which also needs the
/// un-authorized item for logging).
fn same_sender(stored: &Message, incoming: &Message) -> bool {
    stored.route_first() == incoming.route_first()
}

fn disconnect_match(incoming: &Message, stored: &Message) -> bool {
    same_sender(stored, incoming) && incoming.authorize(stored.userid())
}

/// Removes every entry in `list` whose first-hop sender and credentials
/// authorize `disconnect` to act on it (spec §4.6 `msglist_disconnect`).
/// Returns the number of entries removed.
pub fn msglist_disconnect(list: &mut Msglist, disconnect: &Message) -> usize {
    let mut removed = 0;
    loop {
        let mut item = list.first();
        let mut hit = false;
        while let Some(msg) = item {
            if disconnect_match(disconnect, msg) {
                hit = true;
                break;
            }
            item = list.next();
        }
        if hit {
            list.delete();
            removed += 1;
        } else {
            break;
        }
    }
    removed
}

/// Responds `ENODATA` to, and removes, the single entry in `list` whose
/// sender/credentials match `cancel` and whose matchtag equals `cancel`'s
/// JSON-packed `matchtag` field (spec §4.4, §4.6 `msglist_cancel`). Stops
/// at the first hit. Returns whether an entry was found.
pub fn msglist_cancel(handle: &mut Handle, list: &mut Msglist, cancel: &Message) -> FluxResult<bool> {
    let wanted: CancelPayload = cancel.unpack()?;
    let wanted_tag = Matchtag::new(wanted.matchtag);

    let mut item = list.first();
    while let Some(msg) = item {
        if disconnect_match(cancel, msg) && msg.matchtag() == wanted_tag {
            let response = Message::derive_response(msg, flux_types::FluxError::NoData.as_errno());
            handle.send(SharedMessage::new(response), OpFlags::default())?;
            list.delete();
            return Ok(true);
        }
        item = list.next();
    }
    tracing::debug!(matchtag = wanted.matchtag, "cancel: no matching outstanding request");
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_handle::flux_open_loop;
    use flux_types::{RoleMask, UserId};
    use flux_wire::Message;
    use test_case::test_case;

    fn tagged_request(sender: u8, userid: u32) -> SharedMessage {
        let mut m = Message::new(flux_types::MsgType::Request);
        m.set_topic("svc.op");
        m.enable_route();
        m.push_route(vec![sender]);
        m.set_userid(UserId::new(userid));
        SharedMessage::new(m)
    }

    fn disconnect_from(sender: u8, userid: u32, rolemask: RoleMask) -> Message {
        let mut m = Message::new(flux_types::MsgType::Request);
        m.set_topic("sys.disconnect");
        m.enable_route();
        m.push_route(vec![sender]);
        m.set_userid(UserId::new(userid));
        m.set_rolemask(rolemask);
        m
    }

    #[test_case(0, 0, RoleMask::USER, 1; "owner-matching userid removes its own request")]
    #[test_case(4, 5, RoleMask::USER, 0; "mismatched userid, no owner role: no removal")]
    #[test_case(4, 5, RoleMask::OWNER, 1; "owner role removes regardless of userid")]
    fn disconnect_authorization_matrix(sender: u8, userid: u32, rolemask: RoleMask, expected_removed: usize) {
        let mut list = Msglist::new();
        for i in 0..8u8 {
            list.append(tagged_request(i, i as u32)).unwrap();
        }
        let disconnect = disconnect_from(sender, userid, rolemask);
        assert_eq!(msglist_disconnect(&mut list, &disconnect), expected_removed);
    }

    #[test]
    fn cancel_sends_enodata_and_removes_exactly_one() {
        let mut list = Msglist::new();
        for i in 0..7u32 {
            let mut m = Message::new(flux_types::MsgType::Request);
            m.set_topic("svc.streaming-op");
            m.enable_route();
            m.push_route(vec![i as u8]);
            m.set_userid(UserId::new(i));
            m.set_matchtag(Matchtag::new(i));
            list.append(SharedMessage::new(m)).unwrap();
        }

        let mut cancel = Message::new(flux_types::MsgType::Request);
        cancel.set_topic("sys.cancel");
        cancel.enable_route();
        cancel.push_route(vec![3u8]);
        cancel.set_userid(UserId::new(3));
        cancel.set_rolemask(RoleMask::USER);
        cancel.set_payload(
            bytes::Bytes::from(serde_json::to_vec(&serde_json::json!({"matchtag": 3})).unwrap()),
            true,
        );

        let mut handle = flux_open_loop();
        let found = msglist_cancel(&mut handle, &mut list, &cancel).unwrap();
        assert!(found);
        assert_eq!(list.count(), 6);

        let resp = handle
            .recv(&flux_wire::MatchSpec::any(), OpFlags::default())
            .unwrap();
        assert_eq!(resp.matchtag(), Matchtag::new(3));
        assert_eq!(resp.errnum(), flux_types::FluxError::NoData.as_errno());
    }
}
