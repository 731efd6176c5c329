//! Single-threaded cooperative event loop (spec §4.4, §5).
//!
//! Ordering within one iteration: prepare → I/O poll with a computed
//! timeout → fd/signal/timer/periodic callbacks → check → idle. Idle
//! watchers being active forces the next poll to be non-blocking. A
//! watcher started by a callback mid-iteration runs starting next
//! iteration, since it's simply inserted into the same maps this iteration
//! already finished walking.

use std::collections::HashMap;
use std::io;
use std::os::fd::RawFd;
use std::path::Path;
use std::time::{Duration, Instant};

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};

use flux_handle::Handle;
use flux_types::{FluxError, FluxResult, PollEvents};
use flux_wire::MatchSpec;

use crate::dispatch::{Dispatcher, MsgHandlerFn};
use crate::ids::{IdGen, WatcherId};
use crate::watcher::buffer::{BufferReadMode, BufferReadWatcher, BufferWriteWatcher};
use crate::watcher::fd::FdWatcher;
use crate::watcher::housekeeping::HousekeepingWatcher;
use crate::watcher::message::MessageWatcher;
use crate::watcher::periodic::{PeriodicWatcher, ScheduleFn};
use crate::watcher::stat::{StatSnapshot, StatWatcher};
use crate::watcher::timer::TimerWatcher;
#[cfg(unix)]
use crate::watcher::{child, child::ChildWatcher, signal::SignalWatcher};

/// `reactor_run` flags (spec §4.4).
#[derive(Debug, Clone, Copy, Default)]
pub struct RunFlags {
    /// Run exactly one iteration then return, even if watchers remain.
    pub once: bool,
}

fn poll_events_to_interest(events: PollEvents) -> Interest {
    match (
        events.contains(PollEvents::POLLIN),
        events.contains(PollEvents::POLLOUT),
    ) {
        (true, true) => Interest::READABLE.add(Interest::WRITABLE),
        (true, false) => Interest::READABLE,
        (false, true) => Interest::WRITABLE,
        (false, false) => Interest::READABLE,
    }
}

fn ready_to_poll_events(ev: &mio::event::Event) -> PollEvents {
    let mut pe = PollEvents::empty();
    if ev.is_readable() {
        pe.insert(PollEvents::POLLIN);
    }
    if ev.is_writable() {
        pe.insert(PollEvents::POLLOUT);
    }
    if ev.is_error() {
        pe.insert(PollEvents::POLLERR);
    }
    pe
}

pub struct Reactor {
    poll: Poll,
    events_buf: Events,
    ids: IdGen,
    now: Instant,
    stop: Option<i32>,

    fds: HashMap<WatcherId, FdWatcher>,
    timers: HashMap<WatcherId, TimerWatcher>,
    periodics: HashMap<WatcherId, PeriodicWatcher>,
    prepare: HashMap<WatcherId, HousekeepingWatcher>,
    check: HashMap<WatcherId, HousekeepingWatcher>,
    idle: HashMap<WatcherId, HousekeepingWatcher>,
    messages: HashMap<WatcherId, MessageWatcher>,
    buf_reads: HashMap<WatcherId, (BufferReadWatcher, std::fs::File)>,
    buf_writes: HashMap<WatcherId, (BufferWriteWatcher, std::fs::File)>,
    stats: HashMap<WatcherId, StatWatcher>,
    stat_driver: Option<WatcherId>,

    #[cfg(unix)]
    signals: HashMap<WatcherId, SignalWatcher>,
    #[cfg(unix)]
    children: HashMap<WatcherId, ChildWatcher>,
    #[cfg(unix)]
    sigchld_watcher: Option<WatcherId>,

    pub(crate) dispatcher: Dispatcher,
}

impl Reactor {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events_buf: Events::with_capacity(256),
            ids: IdGen::default(),
            now: Instant::now(),
            stop: None,
            fds: HashMap::new(),
            timers: HashMap::new(),
            periodics: HashMap::new(),
            prepare: HashMap::new(),
            check: HashMap::new(),
            idle: HashMap::new(),
            messages: HashMap::new(),
            buf_reads: HashMap::new(),
            buf_writes: HashMap::new(),
            stats: HashMap::new(),
            stat_driver: None,
            #[cfg(unix)]
            signals: HashMap::new(),
            #[cfg(unix)]
            children: HashMap::new(),
            #[cfg(unix)]
            sigchld_watcher: None,
            dispatcher: Dispatcher::new(),
        })
    }

    /// The cached loop timestamp, updated at loop top (spec §4.4
    /// `reactor_now`).
    pub fn now(&self) -> Instant {
        self.now
    }

    /// Forces an immediate refresh of the cached loop timestamp.
    pub fn now_update(&mut self) {
        self.now = Instant::now();
    }

    pub fn stop(&mut self) {
        self.stop = Some(0);
    }

    pub fn stop_error(&mut self, code: i32) {
        self.stop = Some(code);
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    // -- fd --------------------------------------------------------------

    pub fn fd_watcher_create(
        &mut self,
        fd: RawFd,
        requested: PollEvents,
        ref_counted: bool,
        callback: Box<dyn FnMut(&mut Reactor, PollEvents)>,
    ) -> FluxResult<WatcherId> {
        let id = self.ids.next();
        self.poll
            .registry()
            .register(&mut SourceFd(&fd), Token(id), poll_events_to_interest(requested))
            .map_err(FluxError::Io)?;
        self.fds.insert(
            id,
            FdWatcher {
                meta: crate::watcher::meta::WatcherMeta::new(ref_counted),
                fd,
                requested,
                callback,
            },
        );
        Ok(id)
    }

    pub fn fd_watcher_stop(&mut self, id: WatcherId) {
        if let Some(w) = self.fds.get_mut(&id) {
            w.meta.active = false;
        }
    }

    pub fn fd_watcher_destroy(&mut self, id: WatcherId) {
        if let Some(w) = self.fds.remove(&id) {
            let _ = self.poll.registry().deregister(&mut SourceFd(&w.fd));
        }
    }

    // -- timer -------------------------------------------------------------

    pub fn timer_watcher_create(
        &mut self,
        after: Duration,
        repeat: Option<Duration>,
        ref_counted: bool,
        callback: Box<dyn FnMut(&mut Reactor)>,
    ) -> WatcherId {
        let id = self.ids.next();
        self.timers.insert(
            id,
            TimerWatcher {
                meta: crate::watcher::meta::WatcherMeta::new(ref_counted),
                deadline: self.now + after,
                repeat,
                callback,
            },
        );
        id
    }

    pub fn timer_reset(&mut self, id: WatcherId, after: Duration, repeat: Option<Duration>) {
        if let Some(w) = self.timers.get_mut(&id) {
            w.reset(self.now, after, repeat);
        }
    }

    pub fn timer_watcher_stop(&mut self, id: WatcherId) {
        if let Some(w) = self.timers.get_mut(&id) {
            w.meta.active = false;
        }
    }

    pub fn timer_watcher_destroy(&mut self, id: WatcherId) {
        self.timers.remove(&id);
    }

    // -- periodic ------------------------------------------------------------

    pub fn periodic_watcher_create(
        &mut self,
        ref_counted: bool,
        schedule: ScheduleFn,
        callback: Box<dyn FnMut(&mut Reactor)>,
    ) -> WatcherId {
        let id = self.ids.next();
        let mut schedule = schedule;
        let next = schedule(self.now);
        self.periodics.insert(
            id,
            PeriodicWatcher {
                meta: crate::watcher::meta::WatcherMeta::new(ref_counted),
                next,
                schedule,
                callback,
            },
        );
        id
    }

    pub fn periodic_watcher_destroy(&mut self, id: WatcherId) {
        self.periodics.remove(&id);
    }

    // -- prepare / check / idle ---------------------------------------------

    pub fn prepare_watcher_create(&mut self, callback: Box<dyn FnMut(&mut Reactor)>) -> WatcherId {
        let id = self.ids.next();
        self.prepare.insert(
            id,
            HousekeepingWatcher {
                meta: crate::watcher::meta::WatcherMeta::new(false),
                callback,
            },
        );
        id
    }

    pub fn check_watcher_create(&mut self, callback: Box<dyn FnMut(&mut Reactor)>) -> WatcherId {
        let id = self.ids.next();
        self.check.insert(
            id,
            HousekeepingWatcher {
                meta: crate::watcher::meta::WatcherMeta::new(false),
                callback,
            },
        );
        id
    }

    pub fn idle_watcher_create(&mut self, callback: Box<dyn FnMut(&mut Reactor)>) -> WatcherId {
        let id = self.ids.next();
        self.idle.insert(
            id,
            HousekeepingWatcher {
                meta: crate::watcher::meta::WatcherMeta::new(false),
                callback,
            },
        );
        id
    }

    // -- message -------------------------------------------------------------

    pub fn message_watcher_create(&mut self, mut handle: Handle) -> FluxResult<WatcherId> {
        let id = self.ids.next();
        let fd = handle.pollfd()?;
        self.poll
            .registry()
            .register(&mut SourceFd(&fd), Token(id), Interest::READABLE)
            .map_err(FluxError::Io)?;
        self.messages.insert(
            id,
            MessageWatcher {
                meta: crate::watcher::meta::WatcherMeta::new(true),
                handle,
            },
        );
        Ok(id)
    }

    pub fn message_watcher_handle_mut(&mut self, id: WatcherId) -> Option<&mut Handle> {
        self.messages.get_mut(&id).map(|w| &mut w.handle)
    }

    pub fn msg_handler_create(
        &mut self,
        spec: MatchSpec,
        exclusive: bool,
        callback: MsgHandlerFn,
    ) -> WatcherId {
        self.dispatcher.register(spec, exclusive, callback)
    }

    // -- stat ------------------------------------------------------------

    pub fn stat_watcher_create(
        &mut self,
        path: impl AsRef<Path>,
        callback: Box<dyn FnMut(&mut Reactor, StatSnapshot, StatSnapshot)>,
    ) -> WatcherId {
        let id = self.ids.next();
        self.stats.insert(
            id,
            StatWatcher {
                meta: crate::watcher::meta::WatcherMeta::new(true),
                path: path.as_ref().to_path_buf(),
                last: StatSnapshot::default(),
                callback,
            },
        );
        if self.stat_driver.is_none() {
            self.stat_driver = Some(self.periodic_watcher_create(
                false,
                Box::new(|now| Some(now + Duration::from_millis(250))),
                Box::new(Reactor::poll_stat_watchers),
            ));
        }
        id
    }

    fn poll_stat_watchers(&mut self) {
        let ids: Vec<WatcherId> = self.stats.keys().copied().collect();
        for id in ids {
            let Some(mut w) = self.stats.remove(&id) else {
                continue;
            };
            if w.meta.active {
                if let Some((prev, current)) = w.poll_once() {
                    (w.callback)(self, prev, current);
                }
            }
            self.stats.insert(id, w);
        }
    }

    // -- signal / child (unix) ------------------------------------------------

    #[cfg(unix)]
    pub fn signal_watcher_create(
        &mut self,
        signum: i32,
        callback: Box<dyn FnMut(&mut Reactor, i32)>,
    ) -> FluxResult<WatcherId> {
        let id = self.ids.next();
        let mut watcher = SignalWatcher::new(signum, callback).map_err(FluxError::Io)?;
        self.poll
            .registry()
            .register(&mut watcher.signals, Token(id), Interest::READABLE)
            .map_err(FluxError::Io)?;
        self.signals.insert(id, watcher);
        Ok(id)
    }

    #[cfg(unix)]
    pub fn child_watcher_create(
        &mut self,
        pid: libc::pid_t,
        callback: Box<dyn FnMut(&mut Reactor, i32)>,
    ) -> FluxResult<WatcherId> {
        if self.sigchld_watcher.is_none() {
            let w = self.signal_watcher_create(
                libc::SIGCHLD,
                Box::new(|reactor: &mut Reactor, _signum| reactor.reap_ready_children()),
            )?;
            self.sigchld_watcher = Some(w);
        }
        let id = self.ids.next();
        self.children.insert(
            id,
            ChildWatcher {
                meta: crate::watcher::meta::WatcherMeta::new(true),
                pid,
                callback,
            },
        );
        Ok(id)
    }

    #[cfg(unix)]
    fn reap_ready_children(&mut self) {
        let ids: Vec<WatcherId> = self.children.keys().copied().collect();
        for id in ids {
            let Some(cw) = self.children.remove(&id) else {
                continue;
            };
            match child::reap_ready(cw.pid) {
                Some(status) => {
                    let mut cw = cw;
                    (cw.callback)(self, status);
                }
                None => {
                    self.children.insert(id, cw);
                }
            }
        }
    }

    // -- buffer read/write -------------------------------------------------

    pub fn buffer_read_watcher_create(
        &mut self,
        fd: RawFd,
        file: std::fs::File,
        mode: BufferReadMode,
        callback: Box<dyn FnMut(&mut Reactor, &[u8])>,
    ) -> FluxResult<WatcherId> {
        let id = self.ids.next();
        self.poll
            .registry()
            .register(&mut SourceFd(&fd), Token(id), Interest::READABLE)
            .map_err(FluxError::Io)?;
        self.buf_reads.insert(
            id,
            (
                BufferReadWatcher {
                    meta: crate::watcher::meta::WatcherMeta::new(true),
                    fd,
                    mode,
                    buf: bytes::BytesMut::new(),
                    eof: false,
                    callback,
                },
                file,
            ),
        );
        Ok(id)
    }

    pub fn buffer_write_watcher_create(
        &mut self,
        fd: RawFd,
        file: std::fs::File,
        callback: Box<dyn FnMut(&mut Reactor)>,
    ) -> FluxResult<WatcherId> {
        let id = self.ids.next();
        self.poll
            .registry()
            .register(&mut SourceFd(&fd), Token(id), Interest::WRITABLE)
            .map_err(FluxError::Io)?;
        self.buf_writes.insert(
            id,
            (
                BufferWriteWatcher {
                    meta: crate::watcher::meta::WatcherMeta::new(true),
                    fd,
                    buf: bytes::BytesMut::new(),
                    callback,
                },
                file,
            ),
        );
        Ok(id)
    }

    /// Queues bytes for a buffer-write watcher to drain.
    pub fn buffer_write_enqueue(&mut self, id: WatcherId, data: &[u8]) {
        if let Some((w, _)) = self.buf_writes.get_mut(&id) {
            w.buf.extend_from_slice(data);
        }
    }

    pub fn buffer_write_close(&mut self, id: WatcherId) {
        if let Some((mut w, mut file)) = self.buf_writes.remove(&id) {
            w.close(&mut file);
            let _ = self.poll.registry().deregister(&mut SourceFd(&w.fd));
        }
    }

    // -- run ---------------------------------------------------------------

    pub fn run(&mut self, flags: RunFlags) -> FluxResult<i32> {
        self.stop = None;
        loop {
            self.now_update();
            self.fire_housekeeping_prepare();

            if let Some(code) = self.stop {
                return Ok(code);
            }
            if !self.has_active_ref_counted_watcher() {
                return Ok(0);
            }

            let timeout = if self.has_active_idle() {
                Some(Duration::ZERO)
            } else {
                self.compute_timeout()
            };

            self.poll.poll(&mut self.events_buf, timeout).map_err(FluxError::Io)?;
            self.now_update();

            self.dispatch_timers();
            self.dispatch_periodics();
            self.dispatch_io_events();

            self.fire_housekeeping_check();
            self.fire_housekeeping_idle();

            if let Some(code) = self.stop {
                return Ok(code);
            }
            if flags.once {
                return Ok(0);
            }
        }
    }

    fn has_active_ref_counted_watcher(&self) -> bool {
        self.fds.values().any(|w| w.meta.active && w.meta.ref_counted)
            || self.timers.values().any(|w| w.meta.active && w.meta.ref_counted)
            || self.periodics.values().any(|w| w.meta.active && w.meta.ref_counted)
            || self.messages.values().any(|w| w.meta.active && w.meta.ref_counted)
            || self.stats.values().any(|w| w.meta.active && w.meta.ref_counted)
            || self.buf_reads.values().any(|(w, _)| w.meta.active && w.meta.ref_counted)
            || self.buf_writes.values().any(|(w, _)| w.meta.active && w.meta.ref_counted)
            || self.unix_has_active_ref_counted()
    }

    #[cfg(unix)]
    fn unix_has_active_ref_counted(&self) -> bool {
        self.signals.values().any(|w| w.meta.active && w.meta.ref_counted)
            || self.children.values().any(|w| w.meta.active && w.meta.ref_counted)
    }

    #[cfg(not(unix))]
    fn unix_has_active_ref_counted(&self) -> bool {
        false
    }

    fn has_active_idle(&self) -> bool {
        self.idle.values().any(|w| w.meta.active)
    }

    fn compute_timeout(&self) -> Option<Duration> {
        let mut min: Option<Duration> = None;
        let consider = |min: &mut Option<Duration>, deadline: Instant, now: Instant| {
            let d = deadline.saturating_duration_since(now);
            *min = Some(min.map_or(d, |m| m.min(d)));
        };
        for w in self.timers.values().filter(|w| w.meta.active) {
            consider(&mut min, w.deadline, self.now);
        }
        for w in self.periodics.values().filter(|w| w.meta.active) {
            if let Some(next) = w.next {
                consider(&mut min, next, self.now);
            }
        }
        min.or(Some(Duration::from_secs(60)))
    }

    fn fire_housekeeping_prepare(&mut self) {
        self.fire_housekeeping_set(Phase::Prepare);
    }

    fn fire_housekeeping_check(&mut self) {
        self.fire_housekeeping_set(Phase::Check);
    }

    fn fire_housekeeping_idle(&mut self) {
        self.fire_housekeeping_set(Phase::Idle);
    }

    fn fire_housekeeping_set(&mut self, phase: Phase) {
        let ids: Vec<WatcherId> = match phase {
            Phase::Prepare => self.prepare.keys().copied().collect(),
            Phase::Check => self.check.keys().copied().collect(),
            Phase::Idle => self.idle.keys().copied().collect(),
        };
        for id in ids {
            let map = match phase {
                Phase::Prepare => &mut self.prepare,
                Phase::Check => &mut self.check,
                Phase::Idle => &mut self.idle,
            };
            let Some(mut w) = map.remove(&id) else {
                continue;
            };
            if w.meta.active {
                (w.callback)(self);
            }
            let map = match phase {
                Phase::Prepare => &mut self.prepare,
                Phase::Check => &mut self.check,
                Phase::Idle => &mut self.idle,
            };
            map.insert(id, w);
        }
    }

    fn dispatch_timers(&mut self) {
        let ids: Vec<WatcherId> = self.timers.keys().copied().collect();
        for id in ids {
            let Some(mut w) = self.timers.remove(&id) else {
                continue;
            };
            if w.meta.active && w.deadline <= self.now {
                (w.callback)(self);
                match w.repeat {
                    Some(period) if period > Duration::ZERO => {
                        w.deadline = self.now + period;
                    }
                    _ => w.meta.active = false,
                }
            }
            self.timers.insert(id, w);
        }
    }

    fn dispatch_periodics(&mut self) {
        let ids: Vec<WatcherId> = self.periodics.keys().copied().collect();
        for id in ids {
            let Some(mut w) = self.periodics.remove(&id) else {
                continue;
            };
            if w.meta.active {
                if let Some(next) = w.next {
                    if next <= self.now {
                        (w.callback)(self);
                        w.next = (w.schedule)(self.now);
                    }
                }
            }
            self.periodics.insert(id, w);
        }
    }

    fn dispatch_io_events(&mut self) {
        let ready: Vec<(usize, PollEvents)> = self
            .events_buf
            .iter()
            .map(|ev| (ev.token().0, ready_to_poll_events(ev)))
            .collect();

        for (token, pe) in ready {
            if let Some(mut w) = self.fds.remove(&token) {
                if w.meta.active {
                    (w.callback)(self, pe);
                }
                self.fds.insert(token, w);
                continue;
            }
            if self.messages.contains_key(&token) {
                self.dispatch_message(token);
                continue;
            }
            #[cfg(unix)]
            if self.signals.contains_key(&token) {
                self.dispatch_signal(token);
                continue;
            }
            if self.buf_reads.contains_key(&token) {
                self.dispatch_buffer_read(token);
                continue;
            }
            if self.buf_writes.contains_key(&token) {
                self.dispatch_buffer_write(token);
            }
        }
    }

    /// Drains every message currently queued on the handle, not just one:
    /// mio registers the message watcher's fd edge-triggered, but a
    /// `recv` only pops a single message, so leaving any behind after this
    /// wakeup would starve them until some unrelated event happened to
    /// re-poll. Re-reading `pollevents` once the handle is empty disarms
    /// its readiness signal (spec §4.2 `msglist_pollevents`'s `clear_event`
    /// call) so the next `append` raises a fresh edge instead of a write
    /// onto an fd mio already considers readable.
    fn dispatch_message(&mut self, id: WatcherId) {
        let Some(mut w) = self.messages.remove(&id) else {
            return;
        };
        let mut received = Vec::new();
        if w.meta.active {
            loop {
                match w.handle.recv(&MatchSpec::any(), flux_handle::OpFlags { nonblock: true }) {
                    Ok(msg) => received.push(msg),
                    Err(FluxError::WouldBlock) => break,
                    Err(e) => {
                        tracing::warn!(%e, "message watcher recv error");
                        break;
                    }
                }
            }
            let _ = w.handle.pollevents();
        }
        self.messages.insert(id, w);
        for msg in received {
            crate::dispatch::Dispatcher::dispatch(self, msg);
        }
    }

    #[cfg(unix)]
    fn dispatch_signal(&mut self, id: WatcherId) {
        let Some(mut w) = self.signals.remove(&id) else {
            return;
        };
        if w.meta.active {
            let pending: Vec<i32> = w.signals.pending().collect();
            for signum in pending {
                (w.callback)(self, signum);
            }
        }
        self.signals.insert(id, w);
    }

    fn dispatch_buffer_read(&mut self, id: WatcherId) {
        let Some((mut w, mut file)) = self.buf_reads.remove(&id) else {
            return;
        };
        if w.meta.active {
            match w.pump(&mut file) {
                Ok(units) => {
                    for unit in &units {
                        (w.callback)(self, unit);
                    }
                    if w.eof {
                        (w.callback)(self, &[]);
                        w.meta.active = false;
                    }
                }
                Err(e) => tracing::warn!(%e, "buffer read watcher error"),
            }
        }
        self.buf_reads.insert(id, (w, file));
    }

    fn dispatch_buffer_write(&mut self, id: WatcherId) {
        let Some((mut w, mut file)) = self.buf_writes.remove(&id) else {
            return;
        };
        if w.meta.active {
            match w.pump(&mut file) {
                Ok(()) => {
                    if w.buf.is_empty() {
                        (w.callback)(self);
                    }
                }
                Err(e) => tracing::warn!(%e, "buffer write watcher error"),
            }
        }
        self.buf_writes.insert(id, (w, file));
    }
}

enum Phase {
    Prepare,
    Check,
    Idle,
}
