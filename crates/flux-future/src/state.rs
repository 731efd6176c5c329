//! The future state machine (spec §4.5): `created → init-armed →
//! fulfilled(ok|err) → (reset, streaming only) → ...`.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use flux_reactor::{Reactor, RunFlags, WatcherId};
use flux_types::{FluxError, FluxResult};

use crate::guard::{in_blocking_drive, DriveGuard};

type InitCb<T> = Box<dyn FnOnce(&mut Reactor, &Future<T>)>;
type ThenCb<T> = Box<dyn FnMut(&mut Reactor, &Future<T>)>;

enum State<T> {
    Created,
    InitArmed,
    FulfilledOk(T),
    FulfilledErr(FluxError),
}

struct Inner<T> {
    state: State<T>,
    init_cb: Option<InitCb<T>>,
    then_cb: Option<ThenCb<T>>,
    timeout_id: Option<WatcherId>,
    streaming: bool,
}

/// A single-threaded, reference-counted future (spec §4.5). Cheap to
/// clone: every clone shares the same underlying state, the way the
/// original's refcounted `flux_future_t *` does — there is no `Send` bound
/// here since the whole core is single-threaded cooperative (spec §5).
pub struct Future<T>(Rc<RefCell<Inner<T>>>);

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Future(Rc::clone(&self.0))
    }
}

impl<T: 'static> Future<T> {
    /// Allocates an unfulfilled future. `init_cb` runs the first time the
    /// future is attached to a reactor via [`Future::then`] or
    /// [`Future::get`]/[`Future::wait_for`] (spec §4.5 `future_create`).
    pub fn create(init_cb: impl FnOnce(&mut Reactor, &Future<T>) + 'static) -> Self {
        Future(Rc::new(RefCell::new(Inner {
            state: State::Created,
            init_cb: Some(Box::new(init_cb)),
            then_cb: None,
            timeout_id: None,
            streaming: false,
        })))
    }

    /// Like [`Future::create`], but marks the future streaming: `reset` is
    /// permitted once fulfilled (spec §4.5 diagram).
    pub fn create_streaming(init_cb: impl FnOnce(&mut Reactor, &Future<T>) + 'static) -> Self {
        let f = Self::create(init_cb);
        f.0.borrow_mut().streaming = true;
        f
    }

    fn is_fulfilled(&self) -> bool {
        matches!(self.0.borrow().state, State::FulfilledOk(_) | State::FulfilledErr(_))
    }

    /// Runs `init_cb` exactly once, on first attach.
    fn ensure_armed(&self, reactor: &mut Reactor) {
        let cb = self.0.borrow_mut().init_cb.take();
        if let Some(cb) = cb {
            if matches!(self.0.borrow().state, State::Created) {
                self.0.borrow_mut().state = State::InitArmed;
            }
            cb(reactor, self);
        }
    }

    /// Arms a reactive continuation (spec §4.5 `future_then`). If already
    /// fulfilled, `cb` is scheduled via the reactor rather than invoked
    /// synchronously. `timeout` of `None` disables the timeout; otherwise
    /// expiry fulfills the future with `ETIMEDOUT` unless it is already
    /// fulfilled.
    pub fn then(
        &self,
        reactor: &mut Reactor,
        timeout: Option<Duration>,
        cb: impl FnMut(&mut Reactor, &Future<T>) + 'static,
    ) {
        self.ensure_armed(reactor);

        if self.is_fulfilled() {
            let fut = self.clone();
            let mut cb = cb;
            reactor.timer_watcher_create(Duration::ZERO, None, false, Box::new(move |r| cb(r, &fut)));
            return;
        }

        self.0.borrow_mut().then_cb = Some(Box::new(cb));
        if let Some(t) = timeout {
            let fut = self.clone();
            let id = reactor.timer_watcher_create(t, None, true, Box::new(move |r| fut.expire(r)));
            self.0.borrow_mut().timeout_id = Some(id);
        }
    }

    fn expire(&self, reactor: &mut Reactor) {
        if !self.is_fulfilled() {
            self.fulfill_error(reactor, FluxError::TimedOut);
        }
    }

    fn cancel_timeout(&self, reactor: &mut Reactor) {
        let id = self.0.borrow_mut().timeout_id.take();
        if let Some(id) = id {
            reactor.timer_watcher_destroy(id);
        }
    }

    /// Producer-side: fulfills with a value (spec §4.5 `future_fulfill`).
    pub fn fulfill(&self, reactor: &mut Reactor, value: T) {
        self.0.borrow_mut().state = State::FulfilledOk(value);
        self.cancel_timeout(reactor);
        self.invoke_then(reactor);
    }

    /// Producer-side: fulfills with an error (spec §4.5
    /// `future_fulfill_error`).
    pub fn fulfill_error(&self, reactor: &mut Reactor, err: FluxError) {
        self.0.borrow_mut().state = State::FulfilledErr(err);
        self.cancel_timeout(reactor);
        self.invoke_then(reactor);
    }

    fn invoke_then(&self, reactor: &mut Reactor) {
        let cb = self.0.borrow_mut().then_cb.take();
        if let Some(mut cb) = cb {
            cb(reactor, self);
        }
    }

    /// Streaming only: returns to `init-armed` without detaching
    /// continuations or re-running `init_cb` (spec §4.5 `future_reset`).
    /// A no-op on a non-streaming future.
    pub fn reset(&self) {
        let mut inner = self.0.borrow_mut();
        if inner.streaming {
            inner.state = State::InitArmed;
        }
    }

    /// Blocking get (spec §4.5 `future_get`): returns immediately if
    /// already fulfilled (even from within a reactor callback — no actual
    /// blocking is needed), otherwise drives a nested, non-blocking reactor
    /// loop until fulfilled. Blocking from within a reactor callback is
    /// forbidden (spec §9's resolved "coroutine-style get" question):
    /// returns `FluxError::Invalid` rather than deadlocking the
    /// single-threaded loop.
    pub fn get(&self, reactor: &mut Reactor) -> FluxResult<T>
    where
        T: Clone,
    {
        self.wait_for(reactor, None)
    }

    /// As [`Future::get`], bounded by an optional wall-clock timeout.
    pub fn wait_for(&self, reactor: &mut Reactor, timeout: Option<Duration>) -> FluxResult<T>
    where
        T: Clone,
    {
        self.ensure_armed(reactor);
        if let Some(result) = self.take_if_fulfilled() {
            return result;
        }

        if in_blocking_drive() {
            return Err(FluxError::Invalid(
                "blocking future get/wait_for called from within a reactor callback".into(),
            ));
        }

        let deadline = timeout.map(|t| Instant::now() + t);
        let _guard = DriveGuard::enter();

        loop {
            if let Some(result) = self.take_if_fulfilled() {
                return result;
            }
            if let Some(d) = deadline {
                if Instant::now() >= d {
                    return Err(FluxError::TimedOut);
                }
            }
            reactor.run(RunFlags { once: true })?;
        }
    }

    pub(crate) fn take_if_fulfilled(&self) -> Option<FluxResult<T>>
    where
        T: Clone,
    {
        match self.0.borrow().state {
            State::FulfilledOk(ref v) => Some(Ok(v.clone())),
            State::FulfilledErr(ref e) => Some(Err(e.clone())),
            _ => None,
        }
    }

    /// Releases continuations and the pending timeout watcher; does not
    /// touch the user data held by an already-fulfilled future (spec §4.5
    /// `future_destroy`: "caller is expected to have consumed it").
    pub fn destroy(&self, reactor: &mut Reactor) {
        self.cancel_timeout(reactor);
        self.0.borrow_mut().then_cb = None;
    }
}
