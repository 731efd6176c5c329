//! Futures-of-futures (spec §4.5 design notes: "composite futures are
//! themselves futures, built from `then` continuations on their
//! children — no separate machinery"). Both helpers attach a one-shot
//! `then` to each child the first time the composite is armed.

use std::cell::RefCell;
use std::rc::Rc;

use flux_reactor::Reactor;
use flux_types::FluxResult;

use crate::state::Future;

/// Resolves once every child has resolved (ok or error), carrying each
/// child's result in input order.
pub fn wait_all<T: Clone + 'static>(children: Vec<Future<T>>) -> Future<Vec<FluxResult<T>>> {
    let count = children.len();
    Future::create(move |reactor: &mut Reactor, composite: &Future<Vec<FluxResult<T>>>| {
        if count == 0 {
            composite.fulfill(reactor, Vec::new());
            return;
        }

        let results: Rc<RefCell<Vec<Option<FluxResult<T>>>>> =
            Rc::new(RefCell::new((0..count).map(|_| None).collect()));
        let remaining = Rc::new(RefCell::new(count));

        for (idx, child) in children.into_iter().enumerate() {
            let results = Rc::clone(&results);
            let remaining = Rc::clone(&remaining);
            let composite = composite.clone();
            child.then(reactor, None, move |r, c| {
                results.borrow_mut()[idx] = c.take_if_fulfilled();
                *remaining.borrow_mut() -= 1;
                if *remaining.borrow() == 0 {
                    let out = results
                        .borrow_mut()
                        .iter_mut()
                        .map(|slot| slot.take().expect("every slot filled when remaining hits zero"))
                        .collect();
                    composite.fulfill(r, out);
                }
            });
        }
    })
}

/// Resolves as soon as the first child resolves, carrying that child's
/// index and result. The remaining children are left attached but their
/// results are discarded.
pub fn wait_any<T: Clone + 'static>(children: Vec<Future<T>>) -> Future<(usize, FluxResult<T>)> {
    let count = children.len();
    Future::create(move |reactor: &mut Reactor, composite: &Future<(usize, FluxResult<T>)>| {
        if count == 0 {
            composite.fulfill_error(reactor, flux_types::FluxError::Invalid("wait_any on an empty set".into()));
            return;
        }

        let settled = Rc::new(RefCell::new(false));

        for (idx, child) in children.into_iter().enumerate() {
            let settled = Rc::clone(&settled);
            let composite = composite.clone();
            child.then(reactor, None, move |r, c| {
                if *settled.borrow() {
                    return;
                }
                *settled.borrow_mut() = true;
                let result = c.take_if_fulfilled().expect("then fires only once fulfilled");
                composite.fulfill(r, (idx, result));
            });
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_reactor::RunFlags;

    #[test]
    fn wait_all_collects_every_child_in_order() {
        let mut reactor = Reactor::new().unwrap();
        let a: Future<i32> = Future::create(|r, f| f.fulfill(r, 1));
        let b: Future<i32> = Future::create(|r, f| f.fulfill(r, 2));
        let composite = wait_all(vec![a, b]);
        let out = composite.get(&mut reactor).unwrap();
        assert_eq!(
            out.into_iter().map(|r| r.unwrap()).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn wait_any_resolves_on_first_fulfillment() {
        let mut reactor = Reactor::new().unwrap();
        let fast: Future<i32> = Future::create(|r, f| f.fulfill(r, 42));
        let slow: Future<i32> = Future::create(|_, _| {});
        let composite = wait_any(vec![slow, fast]);
        let (idx, result) = composite.get(&mut reactor).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn wait_all_on_empty_set_resolves_immediately() {
        let mut reactor = Reactor::new().unwrap();
        let composite: Future<Vec<FluxResult<i32>>> = wait_all(Vec::new());
        assert_eq!(composite.get(&mut reactor).unwrap(), Vec::new());
    }

    #[test]
    fn drives_once_per_reactor_tick() {
        let mut reactor = Reactor::new().unwrap();
        let a: Future<i32> = Future::create(|r, f| f.fulfill(r, 1));
        a.then(&mut reactor, None, |_, _| {});
        reactor.run(RunFlags { once: true }).unwrap();
    }
}
