//! The public [`Handle`] (spec §3, §4.3): owns a connector, credential
//! defaults, the attribute cache, an aux map, and a fatal-error callback.

use std::collections::VecDeque;
use std::os::fd::RawFd;
use std::thread;
use std::time::Duration;

use flux_types::{FluxError, FluxResult, PollEvents, RoleMask, UserId};
use flux_wire::{AuxMap, MatchSpec, SharedMessage};

use crate::attr::AttrCache;
use crate::connector::{fd, local, loopback::LoopConnector, tcp};
use crate::flags::{OpFlags, OpenFlags};
use crate::matchtag::MatchtagPool;
use crate::ops::HandleOps;
use crate::uri::{self, Target};

/// Callback invoked when a connector reports an unrecoverable error (spec
/// §4.3 `fatal_set`). The default terminates the process, matching the
/// original's `flux_fatal` behavior.
pub type FatalFn = Box<dyn FnMut(&FluxError) + Send>;

fn default_fatal(err: &FluxError) {
    tracing::error!(%err, "fatal handle error, exiting");
    std::process::exit(1);
}

/// A concrete connection to a broker or peer (spec §3 "Handle").
pub struct Handle {
    ops: Box<dyn HandleOps>,
    open_flags: OpenFlags,
    default_userid: UserId,
    default_rolemask: RoleMask,
    attrs: AttrCache,
    aux: AuxMap,
    fatal: FatalFn,
    deferred: VecDeque<SharedMessage>,
    matchtags: MatchtagPool,
}

impl Handle {
    fn new(ops: Box<dyn HandleOps>, open_flags: OpenFlags) -> Self {
        Self {
            ops,
            open_flags,
            default_userid: current_uid(),
            default_rolemask: RoleMask::OWNER,
            attrs: AttrCache::new(),
            aux: AuxMap::new(),
            fatal: Box::new(default_fatal),
            deferred: VecDeque::new(),
            matchtags: MatchtagPool::new(),
        }
    }

    /// Allocates a matchtag for an outgoing RPC (spec §4.5). `streaming`
    /// selects the reserved streaming range.
    pub fn matchtag_alloc(&mut self, streaming: bool) -> FluxResult<flux_types::Matchtag> {
        self.matchtags.alloc(streaming)
    }

    /// Returns a matchtag to the handle's pool.
    pub fn matchtag_free(&mut self, tag: flux_types::Matchtag) {
        self.matchtags.free(tag);
    }

    /// Sends a message, applying default credentials if the caller left
    /// `userid`/`rolemask` unset (spec §4.3).
    pub fn send(&mut self, mut msg: SharedMessage, op_flags: OpFlags) -> FluxResult<()> {
        {
            let m = msg.make_mut();
            if m.userid().is_unknown() {
                m.set_userid(self.default_userid);
            }
            if m.rolemask() == RoleMask::NONE {
                m.set_rolemask(self.default_rolemask);
            }
        }
        if self.open_flags.trace {
            tracing::trace!(topic = msg.topic(), msg_type = %msg.msg_type(), "send");
        }
        let flags = self.merge_flags(op_flags);
        match self.ops.send(msg, flags) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.maybe_fatal(&e);
                Err(e)
            }
        }
    }

    /// Receives one message matching `spec`. Non-matching messages are
    /// requeued in arrival order and re-checked on the next call (spec
    /// §4.3: "messages that do not match are requeued in order").
    pub fn recv(&mut self, spec: &MatchSpec, op_flags: OpFlags) -> FluxResult<SharedMessage> {
        if let Some(pos) = self.deferred.iter().position(|m| spec.matches(m)) {
            return Ok(self.deferred.remove(pos).expect("position just found"));
        }

        let flags = self.merge_flags(op_flags);
        loop {
            match self.ops.recv(flags) {
                Ok(msg) => {
                    if self.open_flags.trace {
                        tracing::trace!(topic = msg.topic(), msg_type = %msg.msg_type(), "recv");
                    }
                    if spec.matches(&msg) {
                        return Ok(msg);
                    }
                    self.deferred.push_back(msg);
                }
                Err(FluxError::WouldBlock) => {
                    if flags.nonblock {
                        return Err(FluxError::WouldBlock);
                    }
                    // Simplified blocking fallback: a caller driving this
                    // handle through the reactor never takes this branch,
                    // since the reactor's MessageWatcher only calls `recv`
                    // once the handle's pollfd is already readable.
                    thread::sleep(Duration::from_millis(1));
                }
                Err(e) => {
                    self.maybe_fatal(&e);
                    return Err(e);
                }
            }
        }
    }

    pub fn pollfd(&mut self) -> FluxResult<RawFd> {
        self.ops.pollfd()
    }

    pub fn pollevents(&mut self) -> FluxResult<PollEvents> {
        self.ops.pollevents()
    }

    pub fn event_subscribe(&mut self, topic_glob: &str) -> FluxResult<()> {
        self.ops.event_subscribe(topic_glob)
    }

    pub fn event_unsubscribe(&mut self, topic_glob: &str) -> FluxResult<()> {
        self.ops.event_unsubscribe(topic_glob)
    }

    /// Reads a broker attribute, serving from cache if the cached entry is
    /// immutable (spec §9).
    pub fn attr_get(&mut self, name: &str) -> FluxResult<String> {
        if let Some(cached) = self.attrs.get_cached(name) {
            return Ok(cached.to_string());
        }
        let value = self.ops.getattr(name)?;
        self.attrs.set(name, value.clone(), false);
        Ok(value)
    }

    /// Writes an attribute through the connector, then updates the cache.
    pub fn attr_set(&mut self, name: &str, value: &str) -> FluxResult<()> {
        self.ops.setattr(name, value)?;
        self.attrs.set(name, value, false);
        Ok(())
    }

    /// Test hook: installs a cache entry without touching the connector.
    pub fn attr_set_cacheonly(&mut self, name: &str, value: &str) {
        self.attrs.set(name, value, false);
    }

    pub fn attr_cache_iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, e)| (k, e.value.as_str()))
    }

    pub fn aux_set<T: Send + Sync + 'static>(&mut self, value: T) {
        self.aux.set(value);
    }

    pub fn aux_get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.aux.get::<T>()
    }

    /// Registers the callback invoked when a connector reports an
    /// unrecoverable error. Overwrites any previous callback.
    pub fn fatal_set(&mut self, cb: FatalFn) {
        self.fatal = cb;
    }

    pub fn close(&mut self) {
        self.ops.close();
    }

    fn merge_flags(&self, op_flags: OpFlags) -> OpFlags {
        OpFlags {
            nonblock: op_flags.nonblock || self.open_flags.nonblock,
        }
    }

    fn maybe_fatal(&mut self, err: &FluxError) {
        if matches!(err, FluxError::Io(_)) {
            (self.fatal)(err);
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(unix)]
fn current_uid() -> UserId {
    // SAFETY: `getuid` has no preconditions.
    UserId::new(unsafe { libc::getuid() })
}

#[cfg(not(unix))]
fn current_uid() -> UserId {
    UserId::UNKNOWN
}

/// Opens a handle, selecting a connector by URI scheme or, if `uri` is
/// `None`, by the `FLUX_URI` environment fallback (spec §4.3, §6).
pub fn flux_open(uri: Option<&str>, flags: OpenFlags) -> FluxResult<Handle> {
    let target = uri::resolve(uri)?;
    let ops: Box<dyn HandleOps> = match target {
        Target::Loop => Box::new(LoopConnector::new()),
        Target::Fd(raw) => Box::new(fd::open(raw)?),
        Target::Local(path) => Box::new(local::connect(&path)?),
        Target::Tcp { host, port } => Box::new(tcp::connect(&host, port)?),
    };
    Ok(Handle::new(ops, flags))
}

/// Convenience constructor used by tests and single-process harnesses.
pub fn flux_open_loop() -> Handle {
    Handle::new(Box::new(LoopConnector::new()), OpenFlags::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_types::MsgType;
    use flux_wire::Message;

    fn req(topic: &str) -> SharedMessage {
        let mut m = Message::new(MsgType::Request);
        m.set_topic(topic);
        SharedMessage::new(m)
    }

    #[test]
    fn send_applies_default_credentials() {
        let mut h = flux_open_loop();
        h.send(req("a.b"), OpFlags::default()).unwrap();
        let got = h.recv(&MatchSpec::any(), OpFlags::default()).unwrap();
        assert!(!got.userid().is_unknown());
        assert_eq!(got.rolemask(), RoleMask::OWNER);
    }

    #[test]
    fn non_matching_messages_are_requeued_in_order() {
        let mut h = flux_open_loop();
        h.send(req("a.one"), OpFlags::default()).unwrap();
        h.send(req("b.two"), OpFlags::default()).unwrap();

        let spec = MatchSpec::any().with_topic(flux_wire::TopicGlob::new("b.*"));
        let got = h.recv(&spec, OpFlags::default()).unwrap();
        assert_eq!(got.topic(), Some("b.two"));

        let rest = h
            .recv(&MatchSpec::any(), OpFlags::default())
            .unwrap();
        assert_eq!(rest.topic(), Some("a.one"));
    }

    #[test]
    fn recv_nonblock_on_empty_handle_would_block() {
        let mut h = flux_open_loop();
        assert!(matches!(
            h.recv(&MatchSpec::any(), OpFlags { nonblock: true }),
            Err(FluxError::WouldBlock)
        ));
    }

    #[test]
    fn attr_get_fakes_loop_topology() {
        let mut h = flux_open_loop();
        assert_eq!(h.attr_get("rank").unwrap(), "0");
        assert_eq!(h.attr_get("rank").unwrap(), "0"); // served from cache second time
    }

    #[test]
    fn attr_set_cacheonly_bypasses_connector() {
        let mut h = flux_open_loop();
        h.attr_set_cacheonly("custom", "7");
        assert_eq!(h.attr_get("custom").unwrap(), "7");
    }
}
