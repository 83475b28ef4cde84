#![forbid(unsafe_code)]

//! Trellis Observable - Change notification and dependency tracking.
//!
//! This crate provides the reactive half of Trellis:
//!
//! - `updates`: A FIFO task queue drained once per frame (or on demand)
//! - `SubscriberSet` / `Notifier`: Per-object, per-property change fan-out
//!   with a weakly keyed notifier registry
//! - `BindingObserver`: Evaluates a binding while recording every observable
//!   property it reads, then queues itself when any of them changes
//! - `Model` / `ModelClass`: Objects with observable accessors
//! - `ObservableArray`: Vectors whose mutations are delivered as splices
//!
//! # Example
//!
//! ```rust
//! use trellis_observable::{
//!     bind, default_context, process_updates, Model, ModelClass, Observable, ValueExt,
//! };
//!
//! let class = ModelClass::with_properties("Person", None, &["name"]);
//! let person = Model::with_fields(&class, [("name", "Ada")]).to_value();
//!
//! let observer = Observable::binding(bind(|x, _| x.prop("name")), None);
//! let context = default_context();
//! assert_eq!(observer.observe(&person, &context).to_text(), "Ada");
//!
//! person.set_prop("name", "Grace");
//! process_updates();
//! assert_eq!(observer.observe(&person, &context).to_text(), "Grace");
//! ```

mod array;
mod binding_observer;
mod context;
mod model;
mod notifier;
mod observable;
mod subscriber;
pub mod updates;

pub use array::{enable_array_observation, ArrayObserver, ObservableArray, Splice};
pub use binding_observer::{bind, Binding, BindingObserver, ObserverId};
pub use context::{current_event, default_context, set_current_event, ExecutionContext};
pub use model::{
    get_property, Accessor, ChangedCallback, DefaultObservableAccessor, Model, ModelClass,
    ValueExt,
};
pub use notifier::{cleanup_notifiers, notifier_count, Notifier, PropertyChangeNotifier};
pub use observable::{ArrayObserverFactory, Observable};
pub use subscriber::{ChangeArgs, Subscriber, SubscriberSet};
pub use updates::{
    next_update, pending_update_count, process_updates, queue_callable, queue_update,
    set_update_host, set_update_mode, take_pending_errors, throw_first_error, Callable,
    ManualHost, Task, UpdateHost, UpdateMode,
};

pub use trellis_core::{Error, Result, Value};
