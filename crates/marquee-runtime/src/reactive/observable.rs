#![forbid(unsafe_code)]

//! Shared value with change notification and a version counter.
//!
//! The stage publishes derived state (current view, step index, selection
//! summary) through [`Observable`]s so a render surface can either poll
//! [`Observable::version`] once per frame or register a callback with
//! [`Observable::watch`].
//!
//! Values live in `Rc<RefCell<..>>`: an observable belongs to the stage
//! thread and is not `Send`.
//!
//! # Failure Modes
//!
//! - **Watcher leak**: callbacks stay registered for as long as their
//!   [`Watch`] guard lives. Dead entries are pruned on the next change.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::trace;

type Callback<T> = Rc<dyn Fn(&T)>;
type WeakCallback<T> = Weak<dyn Fn(&T)>;

struct Inner<T> {
    value: T,
    version: u64,
    watchers: Vec<WeakCallback<T>>,
}

/// A version-tracked value. Clones share the same state.
///
/// # Invariants
///
/// 1. `version` grows by exactly 1 per value-changing write.
/// 2. Writing an equal value changes nothing and notifies no one.
/// 3. Watchers run in registration order, after the borrow is released,
///    so a watcher may read the observable it is watching.
pub struct Observable<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("watchers", &inner.watchers.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                value,
                version: 0,
                watchers: Vec::new(),
            })),
        }
    }

    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Replace the value. Returns `true` if it changed.
    pub fn set(&self, value: T) -> bool {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return false;
            }
            inner.value = value;
            inner.version += 1;
        }
        self.notify();
        true
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Call `callback` with each new value until the returned guard drops.
    pub fn watch(&self, callback: impl Fn(&T) + 'static) -> Watch {
        let strong: Callback<T> = Rc::new(callback);
        self.inner.borrow_mut().watchers.push(Rc::downgrade(&strong));
        Watch {
            _guard: Box::new(strong),
        }
    }

    fn notify(&self) {
        let (callbacks, value, version) = {
            let mut inner = self.inner.borrow_mut();
            inner.watchers.retain(|w| w.strong_count() > 0);
            let live: Vec<Callback<T>> = inner.watchers.iter().filter_map(Weak::upgrade).collect();
            (live, inner.value.clone(), inner.version)
        };
        trace!(version, watchers = callbacks.len(), "observable changed");
        for cb in callbacks {
            cb(&value);
        }
    }
}

/// Keeps a watcher registered. Drop to unsubscribe.
#[must_use = "dropping a Watch unsubscribes immediately"]
pub struct Watch {
    _guard: Box<dyn std::any::Any>,
}

impl std::fmt::Debug for Watch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Watch")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn equal_write_is_silent() {
        let obs = Observable::new(3);
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let _w = obs.watch(move |_| h.set(h.get() + 1));

        assert!(!obs.set(3));
        assert_eq!(obs.version(), 0);
        assert_eq!(hits.get(), 0);

        assert!(obs.set(4));
        assert_eq!(obs.version(), 1);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn watchers_see_new_value_in_order() {
        let obs = Observable::new(String::from("loading"));
        let log = Rc::new(RefCell::new(Vec::new()));
        let l1 = Rc::clone(&log);
        let l2 = Rc::clone(&log);
        let _a = obs.watch(move |v: &String| l1.borrow_mut().push(format!("a:{v}")));
        let _b = obs.watch(move |v: &String| l2.borrow_mut().push(format!("b:{v}")));

        obs.set("main".into());
        assert_eq!(*log.borrow(), vec!["a:main", "b:main"]);
    }

    #[test]
    fn dropped_watch_stops_callbacks_and_is_pruned() {
        let obs = Observable::new(0u8);
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let w = obs.watch(move |_| h.set(h.get() + 1));
        obs.set(1);
        drop(w);
        obs.set(2);
        assert_eq!(hits.get(), 1);
        assert!(format!("{obs:?}").contains("watchers: 0"), "{obs:?}");
    }

    #[test]
    fn watcher_may_read_the_observable() {
        let obs = Observable::new(1);
        let seen = Rc::new(Cell::new(0));
        let (o, s) = (obs.clone(), Rc::clone(&seen));
        let _w = obs.watch(move |_| s.set(o.get()));
        obs.set(7);
        assert_eq!(seen.get(), 7);
    }

    #[test]
    fn clones_share_state() {
        let a = Observable::new(false);
        let b = a.clone();
        b.set(true);
        assert!(a.get());
        assert_eq!(a.version(), 1);
    }
}
