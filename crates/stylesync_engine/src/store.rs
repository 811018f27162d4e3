//! Observable value stores. A store holds the current snapshot behind an `Rc` and notifies
//! every subscriber with the full snapshot on each write; it never sends deltas.

use crate::model::{Declarations, EphemeralDeclaration, Instances, Snapshot, StyleSourceSelections};
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::fmt::{Debug, Formatter};
use std::rc::{Rc, Weak};
use stylesync_css::media::Breakpoint;
use stylesync_shared::node::InstanceId;

type Subscriber<T> = Rc<dyn Fn(&T)>;

struct StoreInner<T> {
    value: RefCell<Rc<T>>,
    subscribers: RefCell<IndexMap<u64, Subscriber<T>>>,
    next_id: Cell<u64>,
}

pub struct Store<T> {
    inner: Rc<StoreInner<T>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Default + 'static> Default for Store<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: 'static> Store<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                value: RefCell::new(Rc::new(value)),
                subscribers: RefCell::new(IndexMap::new()),
                next_id: Cell::new(0),
            }),
        }
    }

    /// Current snapshot
    pub fn get(&self) -> Rc<T> {
        self.inner.value.borrow().clone()
    }

    /// Replaces the snapshot and notifies subscribers in subscription order
    pub fn set(&self, value: T) {
        let value = Rc::new(value);
        *self.inner.value.borrow_mut() = value.clone();

        // Subscribers may subscribe, unsubscribe or write other stores while running
        let subscribers: Vec<_> = self.inner.subscribers.borrow().values().cloned().collect();
        for subscriber in subscribers {
            subscriber(&value);
        }
    }

    /// Writes a modified copy of the current snapshot
    pub fn update(&self, f: impl FnOnce(&mut T))
    where
        T: Clone,
    {
        let mut value = self.get().as_ref().clone();
        f(&mut value);
        self.set(value);
    }

    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .subscribers
            .borrow_mut()
            .insert(id, Rc::new(callback));

        let weak: Weak<StoreInner<T>> = Rc::downgrade(&self.inner);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.subscribers.borrow_mut().shift_remove(&id);
                }
            })),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }
}

impl<T: Debug> Debug for Store<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("value", &self.inner.value.borrow())
            .field("subscribers", &self.inner.subscribers.borrow().len())
            .finish()
    }
}

/// Handle returned by [`Store::subscribe`]. Dropping it keeps the subscription alive;
/// call [`Subscription::unsubscribe`] to detach.
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Subscription")
    }
}

/// Every store the engine reads from. Clones share the same stores.
#[derive(Clone, Default, Debug)]
pub struct StyleStores {
    pub declarations: Store<Declarations>,
    /// Breakpoints in authoring order; the engine sorts them into cascade order
    pub breakpoints: Store<Vec<Breakpoint>>,
    pub selections: Store<StyleSourceSelections>,
    pub instances: Store<Instances>,
    pub root_instance_id: Store<Option<InstanceId>>,
    /// Uncommitted preview declarations, empty when no preview runs
    pub ephemeral: Store<Vec<EphemeralDeclaration>>,
    pub selected_instance: Store<Option<InstanceId>>,
    pub selected_state: Store<Option<String>>,
}

impl StyleStores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            declarations: Store::new(snapshot.declarations.clone()),
            breakpoints: Store::new(snapshot.breakpoints.clone()),
            selections: Store::new(snapshot.selections.clone()),
            instances: Store::new(snapshot.instances()),
            root_instance_id: Store::new(snapshot.root_instance_id.clone()),
            ..Default::default()
        }
    }
}
