//! The `Observable` facade: notifier lookup, dependency tracking and
//! property definition.

use crate::array::{ArrayObserver, ObservableArray};
use crate::binding_observer::{Binding, BindingObserver};
use crate::model::{Accessor, DefaultObservableAccessor, ModelClass};
use crate::notifier::{self, Notifier, PropertyChangeNotifier};
use crate::subscriber::{ChangeArgs, Subscriber};
use regex_lite::Regex;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::OnceLock;
use trellis_core::{Error, Result, Value};

/// Creates the notifier for an observed array.
pub type ArrayObserverFactory = fn(&Rc<ObservableArray>) -> Rc<ArrayObserver>;

thread_local! {
    static WATCHER: RefCell<Option<Rc<BindingObserver>>> = const { RefCell::new(None) };
    static ARRAY_OBSERVER_FACTORY: Cell<Option<ArrayObserverFactory>> = const { Cell::new(None) };
}

/// Installs `watcher` as the current watcher and returns the previous one.
pub(crate) fn swap_watcher(watcher: Option<Rc<BindingObserver>>) -> Option<Rc<BindingObserver>> {
    WATCHER.with(|current| std::mem::replace(&mut *current.borrow_mut(), watcher))
}

fn current_watcher() -> Option<Rc<BindingObserver>> {
    WATCHER.with(|current| current.borrow().clone())
}

fn volatile_regex() -> Option<&'static Regex> {
    static VOLATILE: OnceLock<Option<Regex>> = OnceLock::new();
    VOLATILE
        .get_or_init(|| Regex::new(r"(:|&&|\|\||if)").ok())
        .as_ref()
}

/// Entry points of the change-notification system.
pub struct Observable;

impl Observable {
    /// Installs the factory used to observe arrays.
    pub fn set_array_observer_factory(factory: ArrayObserverFactory) {
        ARRAY_OBSERVER_FACTORY.with(|f| f.set(Some(factory)));
    }

    pub fn has_array_observer_factory() -> bool {
        ARRAY_OBSERVER_FACTORY.with(|f| f.get().is_some())
    }

    /// Returns the notifier for `source`, creating it on first use.
    pub fn get_notifier(source: &Value) -> Result<Rc<dyn Notifier>> {
        let object = source
            .as_object()
            .ok_or_else(|| Error::not_observable(source.kind()))?;

        if let Some(array) = source.downcast::<ObservableArray>() {
            let factory = ARRAY_OBSERVER_FACTORY
                .with(Cell::get)
                .ok_or(Error::ArrayObservationDisabled)?;
            let observer = array.observer_or_create(|| factory(&array));
            return Ok(observer);
        }

        Ok(notifier::notifier_for(object, || {
            Rc::new(PropertyChangeNotifier::new(source))
        }))
    }

    /// Records a read of `property` on `source` with the current watcher.
    pub fn track(source: &Value, property: &str) {
        if let Some(watcher) = current_watcher() {
            watcher.watch(source, property);
        }
    }

    /// Notifies subscribers that `property` of `source` changed.
    ///
    /// Sources that were never observed have no subscribers and are skipped.
    pub fn notify(source: &Value, property: &str) {
        let Some(object) = source.as_object() else {
            tracing::warn!(kind = source.kind(), property, "cannot notify on a non-object source");
            return;
        };

        let existing: Option<Rc<dyn Notifier>> = match source.downcast::<ObservableArray>() {
            Some(array) => array.observer().map(|o| o as Rc<dyn Notifier>),
            None => notifier::lookup(object),
        };
        if let Some(notifier) = existing {
            notifier.notify(&ChangeArgs::property(property));
        }
    }

    /// Defines an observable property named `name` on `class`.
    pub fn define_property(class: &Rc<ModelClass>, name: &str) {
        Self::define_accessor(class, Rc::new(DefaultObservableAccessor::new(name)));
    }

    /// Adds `accessor` to the accessors of `class`.
    pub fn define_accessor(class: &Rc<ModelClass>, accessor: Rc<dyn Accessor>) {
        Self::get_accessors(class);
        class.push_accessor(accessor);
    }

    /// Returns the accessors of `class`, including inherited ones.
    ///
    /// The first call copies the nearest ancestor's resolved list and
    /// memoizes it on the class.
    pub fn get_accessors(class: &Rc<ModelClass>) -> Vec<Rc<dyn Accessor>> {
        if let Some(resolved) = class.resolved_accessors() {
            return resolved;
        }

        let mut ancestor = class.parent();
        let mut inherited = None;
        while let Some(current) = ancestor {
            if let Some(resolved) = current.resolved_accessors() {
                inherited = Some(resolved);
                break;
            }
            ancestor = current.parent();
        }

        let accessors = inherited.unwrap_or_default();
        class.set_resolved_accessors(accessors.clone());
        accessors
    }

    /// Creates an observer for `binding`, optionally subscribing `initial_subscriber`.
    pub fn binding(
        binding: Binding,
        initial_subscriber: Option<&Rc<dyn Subscriber>>,
    ) -> Rc<BindingObserver> {
        let observer = BindingObserver::new(binding);
        if let Some(subscriber) = initial_subscriber {
            observer.subscribe(subscriber);
        }
        observer
    }

    /// Guesses whether a binding's dependencies can change between
    /// evaluations from its source text.
    pub fn is_volatile_binding(source_text: &str) -> bool {
        volatile_regex().map_or(true, |re| re.is_match(source_text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Model, ValueExt};
    use std::cell::Cell;

    struct Count(Cell<usize>);

    impl Subscriber for Count {
        fn handle_change(&self, _source: &Value, _args: &ChangeArgs) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_get_notifier_rejects_primitives() {
        assert!(matches!(
            Observable::get_notifier(&Value::from(3)),
            Err(Error::NotObservable { kind: "number" })
        ));
    }

    #[test]
    fn test_get_notifier_is_stable() {
        let source = Value::object(());
        let a = Observable::get_notifier(&source).unwrap();
        let b = Observable::get_notifier(&source).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_manual_notify() {
        let source = Value::object(());
        let count = Rc::new(Count(Cell::new(0)));
        let subscriber: Rc<dyn Subscriber> = count.clone();
        Observable::get_notifier(&source)
            .unwrap()
            .subscribe(&subscriber, Some("size"));

        Observable::notify(&source, "size");
        Observable::notify(&source, "other");
        assert_eq!(count.0.get(), 1);
    }

    #[test]
    fn test_volatile_heuristic() {
        assert!(Observable::is_volatile_binding("x.a && x.b"));
        assert!(Observable::is_volatile_binding("if x.ok { 1 } else { 2 }"));
        assert!(Observable::is_volatile_binding("x.a || x.b"));
        assert!(!Observable::is_volatile_binding("| x, _ | x.prop(\"name\")"));
    }

    #[test]
    fn test_accessors_inherited_and_memoized() {
        let base = ModelClass::new("Base", None);
        Observable::define_property(&base, "id");
        let derived = ModelClass::new("Derived", Some(base.clone()));
        Observable::define_property(&derived, "label");

        let names: Vec<String> = Observable::get_accessors(&derived)
            .iter()
            .map(|a| a.name().to_string())
            .collect();
        assert_eq!(names, ["id", "label"]);
        assert_eq!(Observable::get_accessors(&base).len(), 1);

        // Resolution happened once; later base additions are not inherited.
        Observable::define_property(&base, "late");
        assert_eq!(Observable::get_accessors(&derived).len(), 2);
    }

    #[test]
    fn test_defined_property_notifies() {
        let class = ModelClass::new("Person", None);
        Observable::define_property(&class, "name");
        let person = Model::new(&class).to_value();

        let count = Rc::new(Count(Cell::new(0)));
        let subscriber: Rc<dyn Subscriber> = count.clone();
        Observable::get_notifier(&person)
            .unwrap()
            .subscribe(&subscriber, Some("name"));

        person.set_prop("name", "Ada");
        person.set_prop("name", "Ada");
        assert_eq!(count.0.get(), 1);
        assert_eq!(person.prop("name"), Value::from("Ada"));
    }
}
