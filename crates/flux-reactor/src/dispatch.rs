//! Message dispatcher (spec §4.4). Installed lazily the first message a
//! reactor's [`crate::watcher::MessageWatcher`] receives; in this rewrite it
//! is simply constructed eagerly and does nothing until handlers are
//! registered, which has the same observable effect.

use std::collections::HashMap;

use flux_types::{Matchtag, MsgType};
use flux_wire::{MatchSpec, SharedMessage};

use crate::ids::{IdGen, WatcherId};
use crate::Reactor;

/// Callback invoked with exactly one received message.
pub type MsgHandlerFn = Box<dyn FnMut(&mut Reactor, &SharedMessage)>;

/// A claimed matchtag routes every response carrying it directly to this
/// callback instead of the general handler list (spec §4.4: "Responses
/// carrying a registered matchtag are routed directly to that RPC
/// future"). Returns `true` to keep the claim alive for further responses
/// (streaming RPCs), `false` to release it after this call.
pub type MatchtagClaimFn = Box<dyn FnMut(&mut Reactor, &SharedMessage) -> bool>;

struct HandlerEntry {
    id: WatcherId,
    spec: MatchSpec,
    exclusive: bool,
    active: bool,
    callback: MsgHandlerFn,
}

/// Returns the default exclusivity for a freshly registered handler of
/// `msg_type`, per spec §4.4: exclusive is the default for responses
/// (and requests, which a single service instance handles); broadcast is
/// the default for events.
pub fn default_exclusive(msg_type: MsgType) -> bool {
    !matches!(msg_type, MsgType::Event)
}

/// Routes messages to registered handlers by type mask / topic glob /
/// matchtag, honoring per-handler exclusivity (spec §4.4).
#[derive(Default)]
pub struct Dispatcher {
    handlers: Vec<HandlerEntry>,
    claims: HashMap<Matchtag, MatchtagClaimFn>,
    ids: IdGen,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler. List-order sensitive: earlier registrations win
    /// ties when `exclusive` is set.
    pub fn register(&mut self, spec: MatchSpec, exclusive: bool, callback: MsgHandlerFn) -> WatcherId {
        let id = self.ids.next();
        self.handlers.push(HandlerEntry {
            id,
            spec,
            exclusive,
            active: true,
            callback,
        });
        id
    }

    pub fn stop(&mut self, id: WatcherId) {
        if let Some(h) = self.handlers.iter_mut().find(|h| h.id == id) {
            h.active = false;
        }
    }

    pub fn start(&mut self, id: WatcherId) {
        if let Some(h) = self.handlers.iter_mut().find(|h| h.id == id) {
            h.active = true;
        }
    }

    pub fn destroy(&mut self, id: WatcherId) {
        self.handlers.retain(|h| h.id != id);
    }

    /// Claims a matchtag so future responses carrying it bypass the general
    /// handler list (used by `flux-future`'s `RpcFuture`).
    pub fn claim_matchtag(&mut self, tag: Matchtag, callback: MatchtagClaimFn) {
        self.claims.insert(tag, callback);
    }

    pub fn release_matchtag(&mut self, tag: Matchtag) {
        self.claims.remove(&tag);
    }

    pub fn has_claim(&self, tag: Matchtag) -> bool {
        self.claims.contains_key(&tag)
    }

    /// Routes one message. Responses with a claimed matchtag go straight to
    /// the claim; everything else walks the handler list, stopping at the
    /// first match if that handler is exclusive.
    pub(crate) fn dispatch(reactor: &mut Reactor, msg: SharedMessage) {
        if msg.msg_type() == MsgType::Response && !msg.matchtag().is_none() {
            let tag = msg.matchtag();
            if let Some(mut claim) = reactor.dispatcher.claims.remove(&tag) {
                let keep = claim(reactor, &msg);
                if keep {
                    reactor.dispatcher.claims.insert(tag, claim);
                }
                return;
            }
        }

        let ids: Vec<WatcherId> = reactor
            .dispatcher
            .handlers
            .iter()
            .filter(|h| h.active && h.spec.matches(&msg))
            .map(|h| h.id)
            .collect();

        for id in ids {
            let Some(pos) = reactor.dispatcher.handlers.iter().position(|h| h.id == id) else {
                continue;
            };
            let mut entry = reactor.dispatcher.handlers.remove(pos);
            (entry.callback)(reactor, &msg);
            let exclusive = entry.exclusive;
            reactor.dispatcher.handlers.insert(pos.min(reactor.dispatcher.handlers.len()), entry);
            if exclusive {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_types::MsgType;

    #[test]
    fn default_exclusive_matches_spec_defaults() {
        assert!(default_exclusive(MsgType::Response));
        assert!(default_exclusive(MsgType::Request));
        assert!(!default_exclusive(MsgType::Event));
    }
}
