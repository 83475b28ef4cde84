//! Observable models.
//!
//! A [`ModelClass`] describes a type: its name, an optional parent class,
//! its observable accessors and its `<name>Changed` callbacks. A [`Model`]
//! is an instance holding field values. Reads through an accessor are
//! tracked by the current watcher; writes notify subscribers.

use crate::array::ObservableArray;
use crate::observable::Observable;
use hashbrown::HashMap;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use trellis_core::Value;

/// Called with the model, the old value and the new value after a change.
pub type ChangedCallback = Rc<dyn Fn(&Model, &Value, &Value)>;

/// Reads and writes one observable property of a model.
pub trait Accessor {
    fn name(&self) -> &str;
    fn get_value(&self, source: &Model) -> Value;
    fn set_value(&self, source: &Model, value: Value);
}

/// Stores the value in the model's fields, tracks reads and notifies on change.
pub struct DefaultObservableAccessor {
    name: Rc<str>,
}

impl DefaultObservableAccessor {
    pub fn new(name: &str) -> Self {
        Self {
            name: Rc::from(name),
        }
    }
}

impl Accessor for DefaultObservableAccessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_value(&self, source: &Model) -> Value {
        Observable::track(&source.to_value(), &self.name);
        source.field(&self.name)
    }

    fn set_value(&self, source: &Model, value: Value) {
        let old = source.field(&self.name);
        if old.same(&value) {
            return;
        }
        source.set_field(&self.name, value.clone());
        if let Some(callback) = source.class().changed_callback(&self.name) {
            callback(source, &old, &value);
        }
        Observable::notify(&source.to_value(), &self.name);
    }
}

/// Describes a model type.
pub struct ModelClass {
    name: String,
    parent: Option<Rc<ModelClass>>,
    accessors: RefCell<Option<Vec<Rc<dyn Accessor>>>>,
    callbacks: RefCell<HashMap<String, ChangedCallback>>,
}

impl ModelClass {
    pub fn new(name: &str, parent: Option<Rc<ModelClass>>) -> Rc<Self> {
        Rc::new(Self {
            name: name.to_string(),
            parent,
            accessors: RefCell::new(None),
            callbacks: RefCell::new(HashMap::new()),
        })
    }

    /// Creates a class and defines an observable property for each name.
    pub fn with_properties(name: &str, parent: Option<Rc<ModelClass>>, properties: &[&str]) -> Rc<Self> {
        let class = Self::new(name, parent);
        for property in properties {
            Observable::define_property(&class, property);
        }
        class
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<Rc<ModelClass>> {
        self.parent.clone()
    }

    pub(crate) fn resolved_accessors(&self) -> Option<Vec<Rc<dyn Accessor>>> {
        self.accessors.borrow().clone()
    }

    pub(crate) fn set_resolved_accessors(&self, accessors: Vec<Rc<dyn Accessor>>) {
        *self.accessors.borrow_mut() = Some(accessors);
    }

    pub(crate) fn push_accessor(&self, accessor: Rc<dyn Accessor>) {
        self.accessors
            .borrow_mut()
            .get_or_insert_with(Vec::new)
            .push(accessor);
    }

    /// Finds an accessor by name, searching the resolved list in place.
    fn accessor(self: &Rc<Self>, name: &str) -> Option<Rc<dyn Accessor>> {
        if self.accessors.borrow().is_none() {
            Observable::get_accessors(self);
        }
        self.accessors
            .borrow()
            .as_ref()?
            .iter()
            .find(|a| a.name() == name)
            .cloned()
    }

    /// Registers the `<property>Changed` callback.
    pub fn on_changed<F>(&self, property: &str, callback: F)
    where
        F: Fn(&Model, &Value, &Value) + 'static,
    {
        self.callbacks
            .borrow_mut()
            .insert(property.to_string(), Rc::new(callback));
    }

    /// Finds the changed callback for `property` on this class or an ancestor.
    pub fn changed_callback(&self, property: &str) -> Option<ChangedCallback> {
        if let Some(callback) = self.callbacks.borrow().get(property) {
            return Some(callback.clone());
        }
        self.parent
            .as_ref()
            .and_then(|parent| parent.changed_callback(property))
    }
}

impl std::fmt::Debug for ModelClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelClass").field("name", &self.name).finish()
    }
}

/// An instance of a [`ModelClass`].
pub struct Model {
    class: Rc<ModelClass>,
    fields: RefCell<HashMap<Rc<str>, Value>>,
    self_ref: Weak<Model>,
}

impl Model {
    pub fn new(class: &Rc<ModelClass>) -> Rc<Self> {
        Rc::new_cyclic(|self_ref| Self {
            class: class.clone(),
            fields: RefCell::new(HashMap::new()),
            self_ref: self_ref.clone(),
        })
    }

    /// Creates an instance with initial field values. No notifications are sent.
    pub fn with_fields<I, K, V>(class: &Rc<ModelClass>, fields: I) -> Rc<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let model = Self::new(class);
        for (name, value) in fields {
            model.set_field(name.as_ref(), value.into());
        }
        model
    }

    pub fn class(&self) -> &Rc<ModelClass> {
        &self.class
    }

    pub fn to_value(&self) -> Value {
        self.self_ref
            .upgrade()
            .map(Value::from_rc)
            .unwrap_or(Value::Null)
    }

    /// Reads a property. Observable properties are tracked.
    pub fn get(&self, name: &str) -> Value {
        match self.class.accessor(name) {
            Some(accessor) => accessor.get_value(self),
            None => self.field(name),
        }
    }

    /// Writes a property. Observable properties notify on change.
    pub fn set(&self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.class.accessor(name) {
            Some(accessor) => accessor.set_value(self, value),
            None => self.set_field(name, value),
        }
    }

    /// Reads the stored value without tracking.
    pub fn field(&self, name: &str) -> Value {
        self.fields.borrow().get(name).cloned().unwrap_or(Value::Null)
    }

    /// Stores a value without notifying.
    pub fn set_field(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(Rc::from(name), value);
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("class", &self.class.name)
            .field("fields", &self.fields.borrow())
            .finish()
    }
}

/// Reads a property of any binding source without tracking.
pub fn get_property(source: &Value, name: &str) -> Value {
    if let Some(model) = source.downcast_ref::<Model>() {
        return model.field(name);
    }
    if let Some(array) = source.downcast_ref::<ObservableArray>() {
        if name == "length" {
            return Value::from(array.len());
        }
    }
    Value::Null
}

/// Property access on binding values.
pub trait ValueExt {
    /// Reads a property, tracking observable reads.
    fn prop(&self, name: &str) -> Value;

    /// Writes a property, notifying observable changes.
    fn set_prop(&self, name: &str, value: impl Into<Value>);

    fn as_model(&self) -> Option<Rc<Model>>;

    fn as_array(&self) -> Option<Rc<ObservableArray>>;
}

impl ValueExt for Value {
    fn prop(&self, name: &str) -> Value {
        match self.downcast_ref::<Model>() {
            Some(model) => model.get(name),
            None => get_property(self, name),
        }
    }

    fn set_prop(&self, name: &str, value: impl Into<Value>) {
        match self.downcast_ref::<Model>() {
            Some(model) => model.set(name, value),
            None => tracing::warn!(kind = self.kind(), name, "cannot set a property on this value"),
        }
    }

    fn as_model(&self) -> Option<Rc<Model>> {
        self.downcast::<Model>()
    }

    fn as_array(&self) -> Option<Rc<ObservableArray>> {
        self.downcast::<ObservableArray>()
    }
}
