//! Integration coverage for the six concrete scenarios spelled out as
//! test-suite seeds (spec §8).

use std::time::Duration;

use flux::{
    flux_open_loop, msglist_cancel, msglist_disconnect, rpc, sync_create, Message, MsgType,
    Msglist, NodeId, PollEvents, Reactor, RoleMask, RpcFlags, RunFlags, SharedMessage, UserId,
};

fn echo_responder(reactor: &mut Reactor, watcher: flux::WatcherId, reply: &'static str) {
    reactor.msg_handler_create(
        flux::MatchSpec::any().with_type_mask(MsgType::Request.as_u8()),
        true,
        Box::new(move |r, req| {
            let mut resp = Message::derive_response(req, 0);
            resp.set_payload(bytes::Bytes::from_static(reply.as_bytes()), false);
            if let Some(h) = r.message_watcher_handle_mut(watcher) {
                let _ = h.send(SharedMessage::new(resp), Default::default());
            }
        }),
    );
}

/// Scenario 1: request/response happy path over `loop://`.
#[test]
fn request_response_happy_path() {
    let mut reactor = Reactor::new().unwrap();
    let watcher = reactor.message_watcher_create(flux_open_loop()).unwrap();
    echo_responder(&mut reactor, watcher, "hi");

    let fut = rpc(watcher, "foo.bar", NodeId::Any, RpcFlags::default(), None);
    let payload = fut.wait_for(&mut reactor, Duration::from_millis(100)).unwrap();
    assert_eq!(&payload[..], b"hi");
}

/// Scenario 2: route stack preservation through `derive_response`.
#[test]
fn route_stack_preservation() {
    let mut req = Message::new(MsgType::Request);
    req.enable_route();
    req.push_route(b"a".to_vec());
    req.push_route(b"b".to_vec());

    let mut resp = Message::derive_response(&req, 0);
    assert_eq!(resp.pop_route().as_deref(), Some(&b"b"[..]));
    assert_eq!(resp.pop_route().as_deref(), Some(&b"a"[..]));
    assert_eq!(resp.route_count(), 0);
}

/// Scenario 3: msglist edge-trigger pollevents/pollfd.
#[test]
fn msglist_edge_trigger() {
    let mut list = Msglist::new();
    assert_eq!(list.pollevents(), PollEvents::POLLOUT);

    list.append(SharedMessage::new(Message::new(MsgType::Event))).unwrap();
    assert!(list.pollevents().contains(PollEvents::POLLIN));
    assert!(fd_is_readable(list.pollfd().unwrap()));

    list.pop();
    assert_eq!(list.pollevents(), PollEvents::POLLOUT);
    assert!(!fd_is_readable(list.pollfd().unwrap()));
}

fn fd_is_readable(fd: std::os::fd::RawFd) -> bool {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    // SAFETY: `pfd` is a single, correctly initialized `pollfd` entry and
    // `1` matches the slice length passed in.
    let rc = unsafe { libc::poll(&mut pfd, 1, 0) };
    rc > 0 && (pfd.revents & libc::POLLIN) != 0
}

/// Scenario 4: heartbeat-sync gating. Drives the same blocking
/// `wait_for`+`reset` loop the supported streaming-consumption pattern
/// uses (spec §4.5), counting how many pulses actually fulfill the future.
fn count_fulfillments(seqs: &[u32]) -> u32 {
    let mut reactor = Reactor::new().unwrap();
    let watcher = reactor.message_watcher_create(flux_open_loop()).unwrap();
    let sync = sync_create(watcher, Duration::ZERO);
    sync.then(&mut reactor, |_, _| {});

    let mut fired = 0;
    for &seq in seqs {
        publish_pulse(&mut reactor, watcher, seq);
        reactor.run(RunFlags { once: true }).unwrap();
        if sync.wait_for(&mut reactor, Duration::from_millis(10)).is_ok() {
            fired += 1;
        }
        sync.reset();
    }
    fired
}

#[test]
fn heartbeat_sync_gating() {
    assert_eq!(count_fulfillments(&[0, 1, 2, 3]), 4);
}

#[test]
fn heartbeat_sync_ignores_duplicate_sequence() {
    assert_eq!(count_fulfillments(&[0, 0, 1, 2]), 3);
}

fn publish_pulse(reactor: &mut Reactor, watcher: flux::WatcherId, seq: u32) {
    let mut m = Message::new(MsgType::Event);
    m.set_topic("heartbeat.pulse");
    m.set_seq(seq);
    m.set_userid(UserId::new(1));
    m.set_rolemask(RoleMask::OWNER);
    if let Some(h) = reactor.message_watcher_handle_mut(watcher) {
        let _ = h.send(SharedMessage::new(m), Default::default());
    }
}

/// Scenario 5: disconnect authorization.
#[test]
fn disconnect_authorization() {
    let mut list = Msglist::new();
    for i in 0..8u8 {
        let mut m = Message::new(MsgType::Request);
        m.enable_route();
        m.push_route(vec![i]);
        m.set_userid(UserId::new(i as u32));
        list.append(SharedMessage::new(m)).unwrap();
    }

    let disconnect_from = |sender: u8, userid: u32, role: RoleMask| {
        let mut m = Message::new(MsgType::Request);
        m.enable_route();
        m.push_route(vec![sender]);
        m.set_userid(UserId::new(userid));
        m.set_rolemask(role);
        m
    };

    assert_eq!(msglist_disconnect(&mut list, &disconnect_from(0, 0, RoleMask::USER)), 1);
    assert_eq!(msglist_disconnect(&mut list, &disconnect_from(4, 5, RoleMask::USER)), 0);
    assert_eq!(msglist_disconnect(&mut list, &disconnect_from(4, 5, RoleMask::OWNER)), 1);
}

/// Scenario 6: cancel with streaming.
#[test]
fn cancel_with_streaming() {
    let mut list = Msglist::new();
    for i in 0..7u32 {
        let mut m = Message::new(MsgType::Request);
        m.enable_route();
        m.push_route(vec![i as u8]);
        m.set_userid(UserId::new(i));
        m.set_matchtag(flux::Matchtag::new(i));
        list.append(SharedMessage::new(m)).unwrap();
    }

    let mut cancel = Message::new(MsgType::Request);
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

    let resp = handle.recv(&flux::MatchSpec::any(), Default::default()).unwrap();
    assert_eq!(resp.matchtag(), flux::Matchtag::new(3));
    assert_eq!(resp.errnum(), flux::FluxError::NoData.as_errno());
}
