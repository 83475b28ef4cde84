//! Subscribers and the compact subscriber set.

use crate::array::Splice;
use crate::binding_observer::ObserverId;
use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use trellis_core::Value;

/// Describes what changed in a notification.
#[derive(Clone, Debug)]
pub enum ChangeArgs {
    /// A named property of the source changed.
    Property(Rc<str>),
    /// An observable array was mutated.
    Splices(Rc<[Splice]>),
    /// A binding observer's dependencies changed.
    Binding(ObserverId),
}

impl ChangeArgs {
    pub fn property(name: &str) -> Self {
        ChangeArgs::Property(Rc::from(name))
    }

    /// Returns the property name for property changes.
    pub fn property_name(&self) -> Option<&str> {
        match self {
            ChangeArgs::Property(name) => Some(name),
            _ => None,
        }
    }

    pub fn splices(&self) -> Option<&[Splice]> {
        match self {
            ChangeArgs::Splices(splices) => Some(splices),
            _ => None,
        }
    }
}

/// Receives change notifications.
pub trait Subscriber {
    fn handle_change(&self, source: &Value, args: &ChangeArgs);
}

#[inline]
fn addr(subscriber: &Rc<dyn Subscriber>) -> *const () {
    Rc::as_ptr(subscriber) as *const ()
}

enum Storage {
    Inline {
        sub1: Option<Rc<dyn Subscriber>>,
        sub2: Option<Rc<dyn Subscriber>>,
    },
    Spilled(Vec<Rc<dyn Subscriber>>),
}

/// A set of subscribers.
///
/// Up to two subscribers are stored inline. The third subscription moves
/// the set to vector storage, and it stays there for the rest of its life.
/// Subscribers are held until they unsubscribe.
pub struct SubscriberSet {
    source: Option<Weak<dyn Any>>,
    storage: RefCell<Storage>,
}

impl SubscriberSet {
    /// Creates a set that reports `source` to its subscribers.
    pub fn new(source: &Value) -> Self {
        Self {
            source: source.as_object().map(Rc::downgrade),
            storage: RefCell::new(Storage::Inline {
                sub1: None,
                sub2: None,
            }),
        }
    }

    /// Creates a set that reports a null source.
    pub fn detached() -> Self {
        Self::new(&Value::Null)
    }

    /// The source object, if it is still alive.
    pub fn source(&self) -> Value {
        self.source
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Value::Object)
            .unwrap_or(Value::Null)
    }

    /// Returns true once the set has moved to vector storage.
    pub fn is_spilled(&self) -> bool {
        matches!(*self.storage.borrow(), Storage::Spilled(_))
    }

    pub fn len(&self) -> usize {
        match &*self.storage.borrow() {
            Storage::Inline { sub1, sub2 } => sub1.is_some() as usize + sub2.is_some() as usize,
            Storage::Spilled(subs) => subs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has(&self, subscriber: &Rc<dyn Subscriber>) -> bool {
        let target = addr(subscriber);
        let matches = |s: &Rc<dyn Subscriber>| addr(s) == target;
        match &*self.storage.borrow() {
            Storage::Inline { sub1, sub2 } => {
                sub1.as_ref().map_or(false, matches) || sub2.as_ref().map_or(false, matches)
            }
            Storage::Spilled(subs) => subs.iter().any(matches),
        }
    }

    /// Adds a subscriber. Subscribing twice is a no-op.
    pub fn subscribe(&self, subscriber: &Rc<dyn Subscriber>) {
        if self.has(subscriber) {
            return;
        }
        let mut storage = self.storage.borrow_mut();
        match &mut *storage {
            Storage::Inline { sub1, sub2 } => {
                if sub1.is_none() {
                    *sub1 = Some(subscriber.clone());
                } else if sub2.is_none() {
                    *sub2 = Some(subscriber.clone());
                } else {
                    let mut subs = Vec::with_capacity(4);
                    subs.extend(sub1.take());
                    subs.extend(sub2.take());
                    subs.push(subscriber.clone());
                    *storage = Storage::Spilled(subs);
                }
            }
            Storage::Spilled(subs) => subs.push(subscriber.clone()),
        }
    }

    /// Removes a subscriber. Removing an absent subscriber is a no-op.
    pub fn unsubscribe(&self, subscriber: &Rc<dyn Subscriber>) {
        let target = addr(subscriber);
        // Dropped after the borrow ends, in case the drop reenters the set.
        let removed;
        {
            let mut storage = self.storage.borrow_mut();
            removed = match &mut *storage {
                Storage::Inline { sub1, sub2 } => {
                    if sub1.as_ref().map_or(false, |s| addr(s) == target) {
                        sub1.take()
                    } else if sub2.as_ref().map_or(false, |s| addr(s) == target) {
                        sub2.take()
                    } else {
                        None
                    }
                }
                Storage::Spilled(subs) => subs
                    .iter()
                    .position(|s| addr(s) == target)
                    .map(|index| subs.remove(index)),
            };
        }
        drop(removed);
    }

    /// Notifies every subscriber.
    ///
    /// Subscribers are snapshotted first, so they may subscribe or
    /// unsubscribe while being notified.
    pub fn notify(&self, args: &ChangeArgs) {
        let subscribers: Vec<Rc<dyn Subscriber>> = match &*self.storage.borrow() {
            Storage::Inline { sub1, sub2 } => sub1.iter().chain(sub2.iter()).cloned().collect(),
            Storage::Spilled(subs) => subs.clone(),
        };
        if subscribers.is_empty() {
            return;
        }

        let source = self.source();
        for subscriber in subscribers {
            subscriber.handle_change(&source, args);
        }
    }
}

impl std::fmt::Debug for SubscriberSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberSet")
            .field("len", &self.len())
            .field("spilled", &self.is_spilled())
            .finish()
    }
}
