//! RPC futures (spec §4.5 "RPC future"): a request is sent once at
//! `init_cb` time, and responses carrying the allocated matchtag are
//! routed straight to this future via [`flux_reactor::Dispatcher::claim_matchtag`],
//! bypassing the general handler list.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use bytes::Bytes;
use flux_reactor::{Reactor, WatcherId};
use flux_types::{FluxError, FluxResult, Matchtag, NodeId};
use flux_wire::{Message, SharedMessage};

use crate::state::Future;

/// Request shaping (spec §4.5): `streaming` keeps the matchtag claimed
/// across multiple responses until one arrives with `ENODATA`;
/// `nresponse` sends the request and fulfills immediately without
/// allocating a matchtag or waiting for a reply at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct RpcFlags {
    pub streaming: bool,
    pub nresponse: bool,
}

/// A future over an RPC's response payload. Wraps a `Future<Bytes>` with
/// the matchtag/handle bookkeeping needed to release the claim.
pub struct RpcFuture {
    inner: Future<Bytes>,
    handle_watcher: WatcherId,
    matchtag: Rc<Cell<Matchtag>>,
    streaming: bool,
    owns_drop_warning: bool,
}

impl RpcFuture {
    /// Blocking get of the (decoded) response payload (spec §4.5
    /// `future_get`/`rpc_get`).
    pub fn get(&self, reactor: &mut Reactor) -> FluxResult<Bytes> {
        self.inner.get(reactor)
    }

    pub fn wait_for(&self, reactor: &mut Reactor, timeout: Duration) -> FluxResult<Bytes> {
        self.inner.wait_for(reactor, Some(timeout))
    }

    /// Decodes the response payload as JSON (spec §4.5 `rpc_get_unpack`).
    pub fn unpack<T: serde::de::DeserializeOwned>(&self, reactor: &mut Reactor) -> FluxResult<T> {
        let payload = self.get(reactor)?;
        serde_json::from_slice(&payload).map_err(|e| FluxError::Protocol(e.to_string()))
    }

    /// Registers a reactive continuation for the next response (spec
    /// §4.5 `future_then`). For a streaming RPC this fires once per
    /// chunk only if re-registered after each call; the supported pattern
    /// for consuming every chunk of a streaming RPC is the blocking
    /// `get`/[`RpcFuture::reset`] loop the original's callers use, since
    /// re-arming a one-shot `then` automatically on every chunk would
    /// require the continuation slot to survive its own firing, which
    /// would break `Future<T>`'s single-shot contract used everywhere
    /// else.
    pub fn then(&self, reactor: &mut Reactor, mut cb: impl FnMut(&mut Reactor, &RpcFuture) + 'static) {
        let handle_watcher = self.handle_watcher;
        let matchtag = Rc::clone(&self.matchtag);
        let streaming = self.streaming;
        self.inner.then(reactor, None, move |r, inner_fut| {
            let wrapper = RpcFuture {
                inner: inner_fut.clone(),
                handle_watcher,
                matchtag: Rc::clone(&matchtag),
                streaming,
                owns_drop_warning: false,
            };
            cb(r, &wrapper);
        });
    }

    /// Streaming only: rearms for the next chunk (spec §4.5
    /// `future_reset`).
    pub fn reset(&self) {
        self.inner.reset();
    }

    /// Releases the claimed matchtag and returns it to the handle's pool,
    /// unconditionally (spec §9's resolved Open Question). `Drop` alone
    /// cannot do this safely since it has no access to `&mut Reactor`;
    /// callers that may abandon a streaming RPC before its natural
    /// termination should call this explicitly.
    pub fn destroy(&self, reactor: &mut Reactor) {
        let tag = self.matchtag.get();
        if !tag.is_none() {
            reactor.dispatcher_mut().release_matchtag(tag);
            if let Some(h) = reactor.message_watcher_handle_mut(self.handle_watcher) {
                h.matchtag_free(tag);
            }
            self.matchtag.set(Matchtag::NONE);
        }
        self.inner.destroy(reactor);
    }
}

impl Drop for RpcFuture {
    fn drop(&mut self) {
        if self.owns_drop_warning && !self.matchtag.get().is_none() {
            tracing::debug!(
                "RpcFuture dropped with its matchtag still claimed; call destroy(reactor) \
                 first to release it promptly instead of leaking it until the handle closes"
            );
        }
    }
}

/// Issues an RPC (spec §4.5 `rpc`): sends the request from within the
/// returned future's `init_cb`, i.e. lazily, the first time it is
/// attached via [`RpcFuture::then`]/[`RpcFuture::get`].
pub fn rpc(
    handle_watcher: WatcherId,
    topic: impl Into<String>,
    nodeid: NodeId,
    flags: RpcFlags,
    payload: Option<Bytes>,
) -> RpcFuture {
    let topic = topic.into();
    let matchtag_cell: Rc<Cell<Matchtag>> = Rc::new(Cell::new(Matchtag::NONE));
    let mt = Rc::clone(&matchtag_cell);

    let inner = Future::create(move |r: &mut Reactor, f: &Future<Bytes>| {
        let fut = f.clone();
        let Some(handle) = r.message_watcher_handle_mut(handle_watcher) else {
            fut.fulfill_error(r, FluxError::NotFound("rpc: handle watcher not registered".into()));
            return;
        };

        if flags.nresponse {
            let mut msg = Message::new(flux_types::MsgType::Request);
            msg.set_topic(topic.clone());
            msg.set_nodeid(nodeid);
            if let Some(p) = payload.clone() {
                msg.set_payload(p, true);
            }
            match handle.send(SharedMessage::new(msg), Default::default()) {
                Ok(()) => fut.fulfill(r, Bytes::new()),
                Err(e) => fut.fulfill_error(r, e),
            }
            return;
        }

        let tag = match handle.matchtag_alloc(flags.streaming) {
            Ok(t) => t,
            Err(e) => {
                fut.fulfill_error(r, e);
                return;
            }
        };

        let mut msg = Message::new(flux_types::MsgType::Request);
        msg.set_topic(topic.clone());
        msg.set_nodeid(nodeid);
        msg.set_matchtag(tag);
        if let Some(p) = payload.clone() {
            msg.set_payload(p, true);
        }

        if let Err(e) = handle.send(SharedMessage::new(msg), Default::default()) {
            handle.matchtag_free(tag);
            fut.fulfill_error(r, e);
            return;
        }

        mt.set(tag);
        let streaming = flags.streaming;
        let claim_fut = fut.clone();
        r.dispatcher_mut().claim_matchtag(
            tag,
            Box::new(move |rr: &mut Reactor, msg: &SharedMessage| {
                let errnum = msg.errnum();
                if errnum == 0 {
                    let payload = msg.payload().cloned().unwrap_or_default();
                    claim_fut.fulfill(rr, payload);
                } else {
                    claim_fut.fulfill_error(rr, FluxError::from_errno(errnum, None));
                }

                let terminal = !streaming || errnum == FluxError::NoData.as_errno();
                if streaming && !terminal {
                    claim_fut.reset();
                }
                if terminal {
                    if let Some(h) = rr.message_watcher_handle_mut(handle_watcher) {
                        h.matchtag_free(tag);
                    }
                }
                !terminal
            }),
        );
    });

    RpcFuture {
        inner,
        handle_watcher,
        matchtag: matchtag_cell,
        streaming: flags.streaming,
        owns_drop_warning: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_handle::flux_open_loop;
    use flux_types::MsgType;
    use flux_wire::MatchSpec;

    fn echo_responder(reactor: &mut Reactor, handle_watcher: WatcherId) {
        reactor.msg_handler_create(
            MatchSpec::any().with_type_mask(MsgType::Request.as_u8()),
            true,
            Box::new(move |r, req| {
                let resp = Message::derive_response(req, 0);
                if let Some(h) = r.message_watcher_handle_mut(handle_watcher) {
                    let _ = h.send(SharedMessage::new(resp), Default::default());
                }
            }),
        );
    }

    #[test]
    fn simple_rpc_round_trips_over_a_loop_handle() {
        let mut reactor = Reactor::new().unwrap();
        let watcher = reactor.message_watcher_create(flux_open_loop()).unwrap();
        echo_responder(&mut reactor, watcher);

        let fut = rpc(watcher, "test.echo", NodeId::Any, RpcFlags::default(), None);
        let payload = fut.get(&mut reactor).unwrap();
        assert_eq!(payload, Bytes::new());
    }

    #[test]
    fn nresponse_rpc_fulfills_without_a_reply() {
        let mut reactor = Reactor::new().unwrap();
        let watcher = reactor.message_watcher_create(flux_open_loop()).unwrap();

        let fut = rpc(
            watcher,
            "test.fire-and-forget",
            NodeId::Any,
            RpcFlags { nresponse: true, ..Default::default() },
            None,
        );
        assert_eq!(fut.get(&mut reactor).unwrap(), Bytes::new());
    }

    #[test]
    fn error_response_becomes_a_flux_error() {
        let mut reactor = Reactor::new().unwrap();
        let watcher = reactor.message_watcher_create(flux_open_loop()).unwrap();
        reactor.msg_handler_create(
            MatchSpec::any().with_type_mask(MsgType::Request.as_u8()),
            true,
            Box::new(move |r, req| {
                let resp = Message::derive_response(req, FluxError::NotFound(String::new()).as_errno());
                if let Some(h) = r.message_watcher_handle_mut(watcher) {
                    let _ = h.send(SharedMessage::new(resp), Default::default());
                }
            }),
        );

        let fut = rpc(watcher, "test.missing", NodeId::Any, RpcFlags::default(), None);
        assert!(matches!(fut.get(&mut reactor), Err(FluxError::NotFound(_))));
    }

    #[test]
    fn destroy_releases_the_matchtag_claim() {
        let mut reactor = Reactor::new().unwrap();
        let watcher = reactor.message_watcher_create(flux_open_loop()).unwrap();

        let fut = rpc(watcher, "test.never-replies", NodeId::Any, RpcFlags::default(), None);
        fut.then(&mut reactor, |_, _| {});
        let tag = fut.matchtag.get();
        assert!(!tag.is_none());
        assert!(reactor.dispatcher_mut().has_claim(tag));
        fut.destroy(&mut reactor);
        assert!(!reactor.dispatcher_mut().has_claim(tag));
    }
}
