//! Per-object change notifiers and the identity-keyed notifier registry.

use crate::subscriber::{ChangeArgs, Subscriber, SubscriberSet};
use hashbrown::HashMap;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use trellis_core::Value;

/// Fans out change notifications for one source object.
pub trait Notifier {
    /// Subscribes to one property, or to every change when `property` is None.
    fn subscribe(&self, subscriber: &Rc<dyn Subscriber>, property: Option<&str>);

    fn unsubscribe(&self, subscriber: &Rc<dyn Subscriber>, property: Option<&str>);

    fn notify(&self, args: &ChangeArgs);
}

/// The notifier used for plain observable objects.
///
/// Keeps one subscriber set per watched property plus a set for
/// subscribers interested in every property.
pub struct PropertyChangeNotifier {
    any: SubscriberSet,
    properties: RefCell<HashMap<Rc<str>, Rc<SubscriberSet>>>,
}

impl PropertyChangeNotifier {
    pub fn new(source: &Value) -> Self {
        Self {
            any: SubscriberSet::new(source),
            properties: RefCell::new(HashMap::new()),
        }
    }

    fn property_set(&self, property: &str) -> Rc<SubscriberSet> {
        let mut properties = self.properties.borrow_mut();
        if let Some(set) = properties.get(property) {
            return set.clone();
        }
        let set = Rc::new(SubscriberSet::new(&self.any.source()));
        properties.insert(Rc::from(property), set.clone());
        set
    }

    /// Number of properties with a subscriber set.
    pub fn watched_property_count(&self) -> usize {
        self.properties.borrow().len()
    }
}

impl Notifier for PropertyChangeNotifier {
    fn subscribe(&self, subscriber: &Rc<dyn Subscriber>, property: Option<&str>) {
        match property {
            Some(name) => self.property_set(name).subscribe(subscriber),
            None => self.any.subscribe(subscriber),
        }
    }

    fn unsubscribe(&self, subscriber: &Rc<dyn Subscriber>, property: Option<&str>) {
        match property {
            Some(name) => {
                let set = self.properties.borrow().get(name).cloned();
                if let Some(set) = set {
                    set.unsubscribe(subscriber);
                }
            }
            None => self.any.unsubscribe(subscriber),
        }
    }

    fn notify(&self, args: &ChangeArgs) {
        if let Some(name) = args.property_name() {
            let set = self.properties.borrow().get(name).cloned();
            if let Some(set) = set {
                set.notify(args);
            }
        }
        self.any.notify(args);
    }
}

struct RegistryEntry {
    key: Weak<dyn Any>,
    notifier: Rc<dyn Notifier>,
}

const MIN_SWEEP_THRESHOLD: usize = 64;

thread_local! {
    static NOTIFIERS: RefCell<HashMap<usize, RegistryEntry>> = RefCell::new(HashMap::new());
    static SWEEP_THRESHOLD: Cell<usize> = const { Cell::new(MIN_SWEEP_THRESHOLD) };
}

#[inline]
fn identity(object: &Rc<dyn Any>) -> usize {
    Rc::as_ptr(object) as *const () as usize
}

/// Returns the registered notifier for `object`, creating it with `create`.
pub(crate) fn notifier_for<F>(object: &Rc<dyn Any>, create: F) -> Rc<dyn Notifier>
where
    F: FnOnce() -> Rc<dyn Notifier>,
{
    let key = identity(object);
    if let Some(existing) = lookup(object) {
        return existing;
    }

    let notifier = create();
    NOTIFIERS.with(|registry| {
        let mut registry = registry.borrow_mut();
        registry.insert(
            key,
            RegistryEntry {
                key: Rc::downgrade(object),
                notifier: notifier.clone(),
            },
        );
        if registry.len() >= SWEEP_THRESHOLD.with(Cell::get) {
            sweep(&mut registry);
        }
    });
    notifier
}

/// Returns the notifier for `object` if one was created.
pub(crate) fn lookup(object: &Rc<dyn Any>) -> Option<Rc<dyn Notifier>> {
    let key = identity(object);
    NOTIFIERS.with(|registry| {
        registry
            .borrow()
            .get(&key)
            .filter(|entry| entry.key.strong_count() > 0)
            .map(|entry| entry.notifier.clone())
    })
}

fn sweep(registry: &mut HashMap<usize, RegistryEntry>) {
    let before = registry.len();
    registry.retain(|_, entry| entry.key.strong_count() > 0);
    let after = registry.len();
    SWEEP_THRESHOLD.with(|t| t.set((after * 2).max(MIN_SWEEP_THRESHOLD)));
    tracing::trace!(removed = before - after, live = after, "swept notifier registry");
}

/// Drops registry entries whose source object is gone.
pub fn cleanup_notifiers() {
    NOTIFIERS.with(|registry| sweep(&mut registry.borrow_mut()));
}

/// Number of registry entries, including entries not yet swept.
pub fn notifier_count() -> usize {
    NOTIFIERS.with(|registry| registry.borrow().len())
}
