//! Observable arrays.
//!
//! An [`ObservableArray`] records each mutation as a [`Splice`] once an
//! [`ArrayObserver`] is attached to it. The observer batches splices and
//! delivers them through the update queue, one notification per drain.

use crate::notifier::Notifier;
use crate::observable::Observable;
use crate::subscriber::{ChangeArgs, Subscriber, SubscriberSet};
use crate::updates::{queue_callable, Callable};
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::rc::{Rc, Weak};
use trellis_core::{Result, Value};

/// One contiguous change: `removed` items were replaced by `added` at `index`.
#[derive(Clone, Debug, PartialEq)]
pub struct Splice {
    pub index: usize,
    pub removed: Vec<Value>,
    pub added: Vec<Value>,
}

impl Splice {
    pub fn new(index: usize, removed: Vec<Value>, added: Vec<Value>) -> Self {
        Self {
            index,
            removed,
            added,
        }
    }

    #[inline]
    pub fn added_count(&self) -> usize {
        self.added.len()
    }
}

/// A shared vector whose mutations can be observed.
pub struct ObservableArray {
    items: RefCell<Vec<Value>>,
    observer: RefCell<Option<Rc<ArrayObserver>>>,
    self_ref: Weak<ObservableArray>,
}

impl ObservableArray {
    pub fn new() -> Rc<Self> {
        Self::from_vec(Vec::new())
    }

    pub fn from_vec(items: Vec<Value>) -> Rc<Self> {
        Rc::new_cyclic(|self_ref| Self {
            items: RefCell::new(items),
            observer: RefCell::new(None),
            self_ref: self_ref.clone(),
        })
    }

    /// Returns this array as a binding value.
    pub fn to_value(&self) -> Value {
        self.self_ref
            .upgrade()
            .map(Value::from_rc)
            .unwrap_or(Value::Null)
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.borrow().get(index).cloned()
    }

    /// Returns a snapshot of the items.
    pub fn to_vec(&self) -> Vec<Value> {
        self.items.borrow().clone()
    }

    pub(crate) fn observer(&self) -> Option<Rc<ArrayObserver>> {
        self.observer.borrow().clone()
    }

    pub(crate) fn observer_or_create<F>(&self, create: F) -> Rc<ArrayObserver>
    where
        F: FnOnce() -> Rc<ArrayObserver>,
    {
        if let Some(observer) = self.observer() {
            return observer;
        }
        let observer = create();
        *self.observer.borrow_mut() = Some(observer.clone());
        observer
    }

    fn record(&self, splice: Splice) {
        if let Some(observer) = self.observer() {
            observer.add_splice(splice);
        }
    }

    pub fn push(&self, item: impl Into<Value>) {
        let item = item.into();
        let index = {
            let mut items = self.items.borrow_mut();
            items.push(item.clone());
            items.len() - 1
        };
        self.record(Splice::new(index, Vec::new(), vec![item]));
    }

    pub fn pop(&self) -> Option<Value> {
        let (index, item) = {
            let mut items = self.items.borrow_mut();
            let item = items.pop()?;
            (items.len(), item)
        };
        self.record(Splice::new(index, vec![item.clone()], Vec::new()));
        Some(item)
    }

    pub fn shift(&self) -> Option<Value> {
        if self.is_empty() {
            return None;
        }
        self.splice(0, 1, Vec::new()).into_iter().next()
    }

    pub fn unshift(&self, item: impl Into<Value>) {
        self.splice(0, 0, vec![item.into()]);
    }

    pub fn insert(&self, index: usize, item: impl Into<Value>) {
        self.splice(index, 0, vec![item.into()]);
    }

    pub fn remove(&self, index: usize) -> Option<Value> {
        if index >= self.len() {
            return None;
        }
        self.splice(index, 1, Vec::new()).into_iter().next()
    }

    /// Replaces the item at `index`.
    pub fn set(&self, index: usize, item: impl Into<Value>) {
        if index < self.len() {
            self.splice(index, 1, vec![item.into()]);
        }
    }

    /// Removes `delete_count` items at `start`, inserts `insert` there and
    /// returns the removed items. Out-of-range arguments are clamped.
    pub fn splice(&self, start: usize, delete_count: usize, insert: Vec<Value>) -> Vec<Value> {
        let (start, removed) = {
            let mut items = self.items.borrow_mut();
            let start = start.min(items.len());
            let end = start.saturating_add(delete_count).min(items.len());
            let removed: Vec<Value> = items.splice(start..end, insert.iter().cloned()).collect();
            (start, removed)
        };
        if !removed.is_empty() || !insert.is_empty() {
            self.record(Splice::new(start, removed.clone(), insert));
        }
        removed
    }

    /// Replaces every item.
    pub fn replace_all(&self, items: Vec<Value>) {
        let len = self.len();
        self.splice(0, len, items);
    }

    pub fn clear(&self) {
        self.replace_all(Vec::new());
    }

    pub fn reverse(&self) {
        self.reset_with(|items| items.reverse());
    }

    pub fn sort_by<F>(&self, compare: F)
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        self.reset_with(|items| items.sort_by(compare));
    }

    /// Reorders in place and records the whole array as replaced.
    fn reset_with<F>(&self, reorder: F)
    where
        F: FnOnce(&mut Vec<Value>),
    {
        let (old, new) = {
            let mut items = self.items.borrow_mut();
            let old = items.clone();
            reorder(&mut items);
            (old, items.clone())
        };
        if !old.is_empty() {
            self.record(Splice::new(0, old, new));
        }
    }
}

impl std::fmt::Debug for ObservableArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.items.borrow().iter()).finish()
    }
}

/// Batches an array's splices and notifies subscribers once per drain.
pub struct ArrayObserver {
    subscribers: SubscriberSet,
    splices: RefCell<Vec<Splice>>,
    needs_queue: Cell<bool>,
    self_ref: Weak<ArrayObserver>,
}

impl ArrayObserver {
    /// Creates an observer for `array`. Installed as the factory by
    /// [`enable_array_observation`].
    pub fn create(array: &Rc<ObservableArray>) -> Rc<ArrayObserver> {
        let source = Value::from_rc(array.clone());
        Rc::new_cyclic(|self_ref| ArrayObserver {
            subscribers: SubscriberSet::new(&source),
            splices: RefCell::new(Vec::new()),
            needs_queue: Cell::new(true),
            self_ref: self_ref.clone(),
        })
    }

    fn add_splice(&self, splice: Splice) {
        self.splices.borrow_mut().push(splice);
        if self.needs_queue.get() {
            self.needs_queue.set(false);
            if let Some(this) = self.self_ref.upgrade() {
                queue_callable(this);
            }
        }
    }

    /// Delivers the recorded splices now.
    pub fn flush(&self) {
        self.needs_queue.set(true);
        let splices = std::mem::take(&mut *self.splices.borrow_mut());
        if splices.is_empty() {
            return;
        }
        tracing::trace!(count = splices.len(), "flushing array splices");
        self.subscribers
            .notify(&ChangeArgs::Splices(Rc::from(splices)));
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl Callable for ArrayObserver {
    fn call(&self) -> Result<()> {
        self.flush();
        Ok(())
    }
}

impl Notifier for ArrayObserver {
    fn subscribe(&self, subscriber: &Rc<dyn Subscriber>, _property: Option<&str>) {
        self.subscribers.subscribe(subscriber);
    }

    fn unsubscribe(&self, subscriber: &Rc<dyn Subscriber>, _property: Option<&str>) {
        self.subscribers.unsubscribe(subscriber);
    }

    fn notify(&self, args: &ChangeArgs) {
        self.subscribers.notify(args);
    }
}

/// Allows arrays to be observed. Calling it again has no effect.
pub fn enable_array_observation() {
    if !Observable::has_array_observer_factory() {
        tracing::debug!("array observation enabled");
        Observable::set_array_observer_factory(ArrayObserver::create);
    }
}
