//! Bindings and the observer that tracks their dependencies.

use crate::context::ExecutionContext;
use crate::model::get_property;
use crate::notifier::Notifier;
use crate::observable::{swap_watcher, Observable};
use crate::subscriber::{ChangeArgs, Subscriber, SubscriberSet};
use crate::updates::{queue_callable, Callable};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use trellis_core::{Result, Value};

/// Identifies a binding observer in change notifications.
pub type ObserverId = u64;

type BindingFn = dyn Fn(&Value, &ExecutionContext) -> Value;

/// A function from a source and context to a value.
///
/// A volatile binding may read different properties on each evaluation,
/// so its dependencies are collected from scratch every time.
#[derive(Clone)]
pub struct Binding {
    func: Rc<BindingFn>,
    volatile: bool,
}

impl Binding {
    pub fn new<F, R>(func: F) -> Self
    where
        F: Fn(&Value, &ExecutionContext) -> R + 'static,
        R: Into<Value>,
    {
        Self {
            func: Rc::new(move |source, context| func(source, context).into()),
            volatile: false,
        }
    }

    /// Creates a binding whose dependencies are re-collected on every evaluation.
    pub fn volatile<F, R>(func: F) -> Self
    where
        F: Fn(&Value, &ExecutionContext) -> R + 'static,
        R: Into<Value>,
    {
        Self::new(func).with_volatile(true)
    }

    /// A binding that always yields `value`.
    pub fn constant(value: impl Into<Value>) -> Self {
        let value = value.into();
        Self::new(move |_, _| value.clone())
    }

    pub fn with_volatile(mut self, volatile: bool) -> Self {
        self.volatile = volatile;
        self
    }

    #[inline]
    pub fn is_volatile(&self) -> bool {
        self.volatile
    }

    /// Evaluates without dependency tracking.
    pub fn evaluate(&self, source: &Value, context: &ExecutionContext) -> Value {
        (self.func)(source, context)
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("volatile", &self.volatile)
            .finish_non_exhaustive()
    }
}

/// Shorthand for [`Binding::new`].
pub fn bind<F, R>(func: F) -> Binding
where
    F: Fn(&Value, &ExecutionContext) -> R + 'static,
    R: Into<Value>,
{
    Binding::new(func)
}

/// Creates a [`Binding`] from a closure, marking it volatile when its
/// source text contains `:`, `&&`, `||` or `if`.
///
/// ```rust
/// use trellis_observable::{binding, ValueExt};
///
/// let plain = binding!(|x, _| x.prop("name"));
/// assert!(!plain.is_volatile());
///
/// let branching = binding!(|x, _| if x.prop("ok").is_truthy() { "yes" } else { "no" });
/// assert!(branching.is_volatile());
/// ```
#[macro_export]
macro_rules! binding {
    ($($body:tt)+) => {
        $crate::Binding::new($($body)+)
            .with_volatile($crate::Observable::is_volatile_binding(stringify!($($body)+)))
    };
}

struct Record {
    source: Value,
    property: Rc<str>,
    notifier: Rc<dyn Notifier>,
}

thread_local! {
    static NEXT_ID: Cell<ObserverId> = const { Cell::new(1) };
}

/// Evaluates a binding and watches every observable property it reads.
///
/// When a dependency changes the observer queues itself once; when the
/// queue reaches it, it tells its own subscribers to observe again.
pub struct BindingObserver {
    id: ObserverId,
    binding: Binding,
    subscribers: SubscriberSet,
    records: RefCell<Vec<Record>>,
    needs_refresh: Cell<bool>,
    needs_queue: Cell<bool>,
    self_ref: Weak<BindingObserver>,
}

impl BindingObserver {
    pub fn new(binding: Binding) -> Rc<Self> {
        let id = NEXT_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            id
        });
        Rc::new_cyclic(|self_ref| Self {
            id,
            binding,
            subscribers: SubscriberSet::detached(),
            records: RefCell::new(Vec::new()),
            needs_refresh: Cell::new(true),
            needs_queue: Cell::new(true),
            self_ref: self_ref.clone(),
        })
    }

    pub fn id(&self) -> ObserverId {
        self.id
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn is_volatile(&self) -> bool {
        self.binding.is_volatile()
    }

    pub fn subscribe(&self, subscriber: &Rc<dyn Subscriber>) {
        self.subscribers.subscribe(subscriber);
    }

    pub fn unsubscribe(&self, subscriber: &Rc<dyn Subscriber>) {
        self.subscribers.unsubscribe(subscriber);
    }

    /// Evaluates the binding, collecting dependencies if a refresh is due.
    pub fn observe(&self, source: &Value, context: &ExecutionContext) -> Value {
        let refreshing = self.needs_refresh.get();
        if refreshing && !self.records.borrow().is_empty() {
            self.disconnect();
        }

        let watcher = if refreshing { self.self_ref.upgrade() } else { None };
        let previous = swap_watcher(watcher);
        self.needs_refresh.set(self.binding.is_volatile());
        let result = self.binding.evaluate(source, context);
        swap_watcher(previous);
        result
    }

    /// Records a read of `property` on `source` and subscribes to it.
    pub(crate) fn watch(&self, source: &Value, property: &str) {
        let notifier = match Observable::get_notifier(source) {
            Ok(notifier) => notifier,
            Err(error) => {
                tracing::warn!(%error, property, "skipping untrackable dependency");
                return;
            }
        };

        if let Some(this) = self.self_ref.upgrade() {
            let subscriber: Rc<dyn Subscriber> = this;
            notifier.subscribe(&subscriber, Some(property));
        }

        let previous = self
            .records
            .borrow()
            .last()
            .map(|r| (r.source.clone(), r.property.clone()));
        if let Some((previous_source, previous_property)) = previous {
            if !self.needs_refresh.get() {
                // Read the previous link with tracking off. If it yields the
                // object just read from, the chain can change shape.
                let outer = swap_watcher(None);
                let previous_value = get_property(&previous_source, &previous_property);
                swap_watcher(outer);
                if previous_value.same(source) {
                    self.needs_refresh.set(true);
                }
            }
        }

        self.records.borrow_mut().push(Record {
            source: source.clone(),
            property: Rc::from(property),
            notifier,
        });
    }

    /// Unsubscribes from every dependency and forces a refresh on the next observe.
    pub fn disconnect(&self) {
        let records = std::mem::take(&mut *self.records.borrow_mut());
        if let Some(this) = self.self_ref.upgrade() {
            let subscriber: Rc<dyn Subscriber> = this;
            for record in &records {
                record
                    .notifier
                    .unsubscribe(&subscriber, Some(&record.property));
            }
        }
        self.needs_refresh.set(true);
        self.needs_queue.set(true);
    }

    /// The dependencies collected by the most recent refresh.
    pub fn dependencies(&self) -> Vec<(Value, Rc<str>)> {
        self.records
            .borrow()
            .iter()
            .map(|r| (r.source.clone(), r.property.clone()))
            .collect()
    }

    /// Returns true if the next observe will re-collect dependencies.
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh.get()
    }
}

impl Subscriber for BindingObserver {
    fn handle_change(&self, _source: &Value, _args: &ChangeArgs) {
        if self.needs_queue.get() {
            self.needs_queue.set(false);
            if let Some(this) = self.self_ref.upgrade() {
                queue_callable(this);
            }
        }
    }
}

impl Callable for BindingObserver {
    fn call(&self) -> Result<()> {
        if !self.records.borrow().is_empty() {
            self.needs_queue.set(true);
            self.subscribers.notify(&ChangeArgs::Binding(self.id));
        }
        Ok(())
    }
}

impl fmt::Debug for BindingObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingObserver")
            .field("id", &self.id)
            .field("volatile", &self.binding.volatile)
            .field("dependencies", &self.records.borrow().len())
            .finish()
    }
}
