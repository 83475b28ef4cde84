//! Execution context passed to every binding evaluation.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use trellis_core::Value;

thread_local! {
    static CURRENT_EVENT: RefCell<Value> = const { RefCell::new(Value::Null) };
    static DEFAULT_CONTEXT: Rc<ExecutionContext> = Rc::new(ExecutionContext::new());
}

/// Sets the event visible to bindings through [`ExecutionContext::event`].
pub fn set_current_event(event: Value) {
    CURRENT_EVENT.with(|current| *current.borrow_mut() = event);
}

pub fn current_event() -> Value {
    CURRENT_EVENT.with(|current| current.borrow().clone())
}

/// The shared context used for top-level renders.
pub fn default_context() -> Rc<ExecutionContext> {
    DEFAULT_CONTEXT.with(Rc::clone)
}

/// Positional and scope information for a view.
///
/// Repeated views get a child context carrying their index, the total
/// length and the parent source they were rendered from.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    index: Cell<usize>,
    length: Cell<usize>,
    parent: RefCell<Value>,
    parent_context: RefCell<Option<Rc<ExecutionContext>>>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context nested under `parent_context`.
    pub fn child(parent: Value, parent_context: Rc<ExecutionContext>) -> Self {
        let context = Self::new();
        *context.parent.borrow_mut() = parent;
        *context.parent_context.borrow_mut() = Some(parent_context);
        context
    }

    pub fn index(&self) -> usize {
        self.index.get()
    }

    pub fn length(&self) -> usize {
        self.length.get()
    }

    /// The source of the enclosing view.
    pub fn parent(&self) -> Value {
        self.parent.borrow().clone()
    }

    pub fn parent_context(&self) -> Option<Rc<ExecutionContext>> {
        self.parent_context.borrow().clone()
    }

    pub fn set_parent(&self, parent: Value, parent_context: Option<Rc<ExecutionContext>>) {
        *self.parent.borrow_mut() = parent;
        *self.parent_context.borrow_mut() = parent_context;
    }

    /// The event being handled, or Null outside event bindings.
    pub fn event(&self) -> Value {
        current_event()
    }

    pub fn is_even(&self) -> bool {
        self.index() % 2 == 0
    }

    pub fn is_odd(&self) -> bool {
        !self.is_even()
    }

    pub fn is_first(&self) -> bool {
        self.index() == 0
    }

    pub fn is_in_middle(&self) -> bool {
        self.index() > 0 && self.index() + 1 < self.length()
    }

    pub fn is_last(&self) -> bool {
        self.index() + 1 == self.length()
    }

    pub fn update_position(&self, index: usize, length: usize) {
        self.index.set(index);
        self.length.set(length);
    }
}
