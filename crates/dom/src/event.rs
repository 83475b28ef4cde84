//! Events and listener dispatch.

use crate::node::Node;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use trellis_core::Value;

/// Receives events dispatched at a node.
pub trait EventListener {
    fn handle_event(&self, event: &Event);
}

impl<F: Fn(&Event)> EventListener for F {
    fn handle_event(&self, event: &Event) {
        self(event)
    }
}

pub(crate) struct Listener {
    pub(crate) event_type: String,
    pub(crate) callback: Rc<dyn EventListener>,
}

impl Listener {
    pub(crate) fn new(event_type: &str, callback: Rc<dyn EventListener>) -> Self {
        Self {
            event_type: event_type.to_string(),
            callback,
        }
    }

    pub(crate) fn is(&self, other: &Rc<dyn EventListener>) -> bool {
        Rc::as_ptr(&self.callback) as *const () == Rc::as_ptr(other) as *const ()
    }
}

struct EventData {
    event_type: String,
    bubbles: bool,
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
    target: RefCell<Option<Node>>,
    current_target: RefCell<Option<Node>>,
    detail: Value,
}

/// A dispatched event. Cloning shares the same event state.
#[derive(Clone)]
pub struct Event(Rc<EventData>);

impl Event {
    /// Creates a non-bubbling event.
    pub fn new(event_type: &str) -> Self {
        Self::build(event_type, false, Value::Null)
    }

    /// Creates a bubbling event.
    pub fn bubbling(event_type: &str) -> Self {
        Self::build(event_type, true, Value::Null)
    }

    /// Creates a bubbling custom event carrying `detail`.
    pub fn custom(event_type: &str, detail: Value) -> Self {
        Self::build(event_type, true, detail)
    }

    fn build(event_type: &str, bubbles: bool, detail: Value) -> Self {
        Event(Rc::new(EventData {
            event_type: event_type.to_string(),
            bubbles,
            default_prevented: Cell::new(false),
            propagation_stopped: Cell::new(false),
            target: RefCell::new(None),
            current_target: RefCell::new(None),
            detail,
        }))
    }

    pub fn event_type(&self) -> &str {
        &self.0.event_type
    }

    pub fn bubbles(&self) -> bool {
        self.0.bubbles
    }

    pub fn detail(&self) -> &Value {
        &self.0.detail
    }

    pub fn target(&self) -> Option<Node> {
        self.0.target.borrow().clone()
    }

    pub fn current_target(&self) -> Option<Node> {
        self.0.current_target.borrow().clone()
    }

    pub fn prevent_default(&self) {
        self.0.default_prevented.set(true);
    }

    pub fn default_prevented(&self) -> bool {
        self.0.default_prevented.get()
    }

    pub fn stop_propagation(&self) {
        self.0.propagation_stopped.set(true);
    }

    /// Wraps the event as a binding value.
    pub fn to_value(&self) -> Value {
        Value::object(self.clone())
    }
}

impl core::fmt::Debug for Event {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Event")
            .field("type", &self.0.event_type)
            .field("bubbles", &self.0.bubbles)
            .field("default_prevented", &self.0.default_prevented.get())
            .finish()
    }
}

pub(crate) fn dispatch(target: &Node, event: &Event) -> bool {
    *event.0.target.borrow_mut() = Some(target.clone());

    let mut path = Vec::new();
    path.push(target.clone());
    if event.bubbles() {
        let mut current = target.parent_node();
        while let Some(node) = current {
            current = node.parent_node();
            path.push(node);
        }
    }

    for node in path {
        // Snapshot so listeners can add or remove listeners while running.
        let listeners: Vec<Rc<dyn EventListener>> = node
            .data_ref()
            .listeners
            .borrow()
            .iter()
            .filter(|l| l.event_type == event.event_type())
            .map(|l| l.callback.clone())
            .collect();

        if listeners.is_empty() {
            continue;
        }

        *event.0.current_target.borrow_mut() = Some(node.clone());
        for listener in listeners {
            listener.handle_event(event);
        }
        if event.0.propagation_stopped.get() {
            break;
        }
    }

    *event.0.current_target.borrow_mut() = None;
    !event.default_prevented()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_bubbles_to_parent() {
        let parent = Node::element("div");
        let child = Node::element("button");
        parent.append_child(&child).unwrap();

        let hits = Rc::new(Cell::new(0));
        let hits_clone = hits.clone();
        parent.add_event_listener(
            "click",
            Rc::new(move |_: &Event| hits_clone.set(hits_clone.get() + 1)),
        );

        assert!(child.dispatch_event(&Event::bubbling("click")));
        assert_eq!(hits.get(), 1);

        child.dispatch_event(&Event::new("click"));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_prevent_default_reported() {
        let el = Node::element("a");
        el.add_event_listener("click", Rc::new(|e: &Event| e.prevent_default()));
        assert!(!el.dispatch_event(&Event::bubbling("click")));
    }

    #[test]
    fn test_remove_listener() {
        let el = Node::element("div");
        let listener: Rc<dyn EventListener> = Rc::new(|_: &Event| {});
        el.add_event_listener("input", listener.clone());
        el.add_event_listener("input", listener.clone());
        assert_eq!(el.listener_count("input"), 1);

        el.remove_event_listener("input", &listener);
        assert_eq!(el.listener_count("input"), 0);
    }

    #[test]
    fn test_event_target_and_detail() {
        let el = Node::element("div");
        let seen = Rc::new(RefCell::new(None));
        let seen_clone = seen.clone();
        el.add_event_listener(
            "change",
            Rc::new(move |e: &Event| {
                *seen_clone.borrow_mut() = e.detail().as_f64();
                assert_eq!(e.target(), e.current_target());
            }),
        );
        el.dispatch_event(&Event::custom("change", Value::from(7)));
        assert_eq!(*seen.borrow(), Some(7.0));
    }
}
