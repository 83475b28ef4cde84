//! The behavior behind binding directives.

use crate::directive::{Behavior, BindingDirective, BindingTarget};
use crate::policy::create_html;
use crate::template::ViewTemplate;
use crate::view::HtmlView;
use hashbrown::HashMap;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use trellis_core::Value;
use trellis_dom::{Event, EventListener, Node};
use trellis_observable::{
    set_current_event, Binding, BindingObserver, ChangeArgs, ExecutionContext, Observable,
    Subscriber,
};

#[derive(Default)]
struct Composed {
    view: Option<Rc<HtmlView>>,
    template: Option<Rc<ViewTemplate>>,
}

#[derive(Default)]
struct ClassVersions {
    versions: HashMap<String, u32>,
    version: u32,
}

/// Forwards events to a binding behavior. Removing the listener on unbind
/// releases the behavior.
struct EventHandler(Rc<BindingBehavior>);

impl EventListener for EventHandler {
    fn handle_event(&self, event: &Event) {
        self.0.handle_event(event);
    }
}

/// Keeps one target node in sync with a binding.
///
/// Event bindings evaluate the binding on dispatch instead of observing it.
pub struct BindingBehavior {
    target: Node,
    binding: Binding,
    target_kind: BindingTarget,
    source: RefCell<Option<Value>>,
    context: RefCell<Option<Rc<ExecutionContext>>>,
    observer: RefCell<Option<Rc<BindingObserver>>>,
    listener: RefCell<Option<Rc<dyn EventListener>>>,
    classes: RefCell<ClassVersions>,
    composed: RefCell<Composed>,
    bound: Cell<bool>,
    self_ref: Weak<BindingBehavior>,
}

impl BindingBehavior {
    pub fn new(target: &Node, directive: &BindingDirective) -> Rc<Self> {
        Rc::new_cyclic(|self_ref| Self {
            target: target.clone(),
            binding: directive.binding().clone(),
            target_kind: directive.target().clone(),
            source: RefCell::new(None),
            context: RefCell::new(None),
            observer: RefCell::new(None),
            listener: RefCell::new(None),
            classes: RefCell::new(ClassVersions::default()),
            composed: RefCell::new(Composed::default()),
            bound: Cell::new(false),
            self_ref: self_ref.clone(),
        })
    }

    pub fn target(&self) -> &Node {
        &self.target
    }

    pub fn target_kind(&self) -> &BindingTarget {
        &self.target_kind
    }

    pub fn is_bound(&self) -> bool {
        self.bound.get()
    }

    /// The view currently composed into a content target, if any.
    pub fn composed_view(&self) -> Option<Rc<HtmlView>> {
        self.composed.borrow().view.clone()
    }

    fn ensure_observer(&self) -> Option<Rc<BindingObserver>> {
        if let Some(observer) = self.observer.borrow().as_ref() {
            return Some(observer.clone());
        }
        let this = self.self_ref.upgrade()?;
        let subscriber: Rc<dyn Subscriber> = this;
        let observer = Observable::binding(self.binding.clone(), Some(&subscriber));
        *self.observer.borrow_mut() = Some(observer.clone());
        Some(observer)
    }

    fn scope(&self) -> Option<(Value, Rc<ExecutionContext>)> {
        let source = self.source.borrow().clone()?;
        let context = self.context.borrow().clone()?;
        Some((source, context))
    }

    fn refresh(&self) {
        let (Some((source, context)), Some(observer)) = (self.scope(), self.ensure_observer())
        else {
            return;
        };
        let value = observer.observe(&source, &context);
        self.update_target(value, &source, &context);
    }

    fn update_target(&self, value: Value, source: &Value, context: &Rc<ExecutionContext>) {
        match &self.target_kind {
            BindingTarget::Attribute(name) => {
                if value.is_null() {
                    self.target.remove_attribute(name);
                } else {
                    self.target.set_attribute(name, &value.to_text());
                }
            }
            BindingTarget::BooleanAttribute(name) => {
                if value.is_truthy() {
                    self.target.set_attribute(name, "");
                } else {
                    self.target.remove_attribute(name);
                }
            }
            BindingTarget::Property(name) => {
                let value = if &**name == "innerHTML" {
                    Value::from(create_html(&value.to_text()))
                } else {
                    value
                };
                self.target.set_property(name, value);
            }
            BindingTarget::Class => self.update_classes(&value),
            BindingTarget::Content => self.update_content(value, source, context),
            BindingTarget::Event(_) => {}
        }
    }

    /// Adds the classes named in `value` and removes the ones added by the
    /// previous update that are no longer named.
    fn update_classes(&self, value: &Value) {
        let mut classes = self.classes.borrow_mut();
        let version = classes.version;

        let text = value.to_text();
        for name in text.split_whitespace() {
            classes.versions.insert(name.to_string(), version);
            self.target.class_add(name);
        }

        classes.version = version + 1;
        if version == 0 {
            return;
        }

        let stale = version - 1;
        classes.versions.retain(|name, seen| {
            if *seen == stale {
                self.target.class_remove(name);
                false
            } else {
                true
            }
        });
    }

    fn update_content(&self, value: Value, source: &Value, context: &Rc<ExecutionContext>) {
        let Some(template) = value.downcast::<ViewTemplate>() else {
            self.release_composed();
            self.target.set_data(&value.to_text());
            return;
        };

        self.target.set_data("");
        let (current, current_template) = {
            let composed = self.composed.borrow();
            (composed.view.clone(), composed.template.clone())
        };

        let view = match current {
            Some(view)
                if current_template
                    .as_ref()
                    .map_or(false, |t| Rc::ptr_eq(t, &template)) =>
            {
                view
            }
            Some(view) => {
                if view.is_composed() {
                    view.remove();
                    view.unbind();
                }
                template.create(None)
            }
            None => template.create(None),
        };

        if !view.is_composed() {
            view.set_composed(true);
            view.bind(source, context);
            if let Err(error) = view.insert_before(&self.target) {
                tracing::warn!(%error, "failed to insert composed view");
            }
            let mut composed = self.composed.borrow_mut();
            composed.view = Some(view);
            composed.template = Some(template);
        } else if view.needs_bind_only() {
            view.set_needs_bind_only(false);
            view.bind(source, context);
        }
    }

    fn release_composed(&self) {
        let Some(view) = self.composed_view() else {
            return;
        };
        if view.is_composed() {
            view.set_composed(false);
            view.remove();
            if view.needs_bind_only() {
                view.set_needs_bind_only(false);
            } else {
                view.unbind();
            }
        }
    }

    fn handle_event(&self, event: &Event) {
        let Some((source, context)) = self.scope() else {
            return;
        };
        set_current_event(event.to_value());
        let result = self.binding.evaluate(&source, &context);
        set_current_event(Value::Null);
        if result.as_bool() != Some(true) {
            event.prevent_default();
        }
    }
}

impl Behavior for BindingBehavior {
    fn bind(&self, source: &Value, context: &Rc<ExecutionContext>) {
        *self.source.borrow_mut() = Some(source.clone());
        *self.context.borrow_mut() = Some(context.clone());
        self.bound.set(true);

        if let BindingTarget::Event(name) = &self.target_kind {
            if self.listener.borrow().is_none() {
                let Some(this) = self.self_ref.upgrade() else {
                    return;
                };
                let listener: Rc<dyn EventListener> = Rc::new(EventHandler(this));
                self.target.add_event_listener(name, listener.clone());
                *self.listener.borrow_mut() = Some(listener);
            }
            return;
        }

        self.refresh();
    }

    fn unbind(&self, _source: &Value) {
        if let BindingTarget::Event(name) = &self.target_kind {
            if let Some(listener) = self.listener.borrow_mut().take() {
                self.target.remove_event_listener(name, &listener);
            }
        } else {
            // The observer holds this behavior; the next bind makes a new one.
            let observer = self.observer.borrow_mut().take();
            if let Some(observer) = observer {
                observer.disconnect();
            }
        }

        *self.source.borrow_mut() = None;
        *self.context.borrow_mut() = None;
        self.bound.set(false);

        if self.target_kind == BindingTarget::Content {
            if let Some(view) = self.composed_view() {
                if view.is_composed() {
                    view.unbind();
                    view.set_needs_bind_only(true);
                }
            }
        }
    }
}

impl Subscriber for BindingBehavior {
    fn handle_change(&self, _source: &Value, _args: &ChangeArgs) {
        self.refresh();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_observable::{
        bind, default_context, process_updates, Model, ModelClass, ValueExt,
    };

    fn person(name: &str) -> Value {
        let class = ModelClass::with_properties("Person", None, &["name", "ready", "classes"]);
        Model::with_fields(
            &class,
            [
                ("name", Value::from(name)),
                ("ready", Value::from(false)),
                ("classes", Value::from("a b")),
            ],
        )
        .to_value()
    }

    fn behavior(target: &Node, name: Option<&str>, binding: Binding) -> Rc<BindingBehavior> {
        let directive = BindingDirective::new(binding);
        let directive = match name {
            Some(name) => directive.with_target_name(name),
            None => directive,
        };
        BindingBehavior::new(target, &directive)
    }

    #[test]
    fn test_attribute_update_and_removal() {
        let source = person("Ada");
        let element = Node::element("div");
        let b = behavior(&element, Some("title"), bind(|x, _| x.prop("name")));
        b.bind(&source, &default_context());
        assert_eq!(element.get_attribute("title").as_deref(), Some("Ada"));

        source.set_prop("name", Value::Null);
        process_updates();
        assert!(!element.has_attribute("title"));
    }

    #[test]
    fn test_boolean_attribute() {
        let source = person("Ada");
        let element = Node::element("button");
        let b = behavior(&element, Some("?disabled"), bind(|x, _| x.prop("ready")));
        b.bind(&source, &default_context());
        assert!(!element.has_attribute("disabled"));

        source.set_prop("ready", true);
        process_updates();
        assert_eq!(element.get_attribute("disabled").as_deref(), Some(""));
    }

    #[test]
    fn test_class_versioning() {
        let source = person("Ada");
        let element = Node::element("div");
        element.class_add("static");
        let b = behavior(&element, Some("class"), bind(|x, _| x.prop("classes")));
        b.bind(&source, &default_context());
        assert!(element.class_contains("a") && element.class_contains("b"));

        source.set_prop("classes", "b c");
        process_updates();
        assert!(!element.class_contains("a"));
        assert!(element.class_contains("b") && element.class_contains("c"));
        assert!(element.class_contains("static"));
    }

    #[test]
    fn test_property_and_inner_html() {
        let source = person("<b>Ada</b>");
        let element = Node::element("div");
        let b = behavior(&element, Some(":innerHTML"), bind(|x, _| x.prop("name")));
        b.bind(&source, &default_context());
        assert_eq!(element.inner_html(), "<b>Ada</b>");

        let input = Node::element("input");
        let b = behavior(&input, Some(":value"), bind(|x, _| x.prop("name")));
        b.bind(&source, &default_context());
        assert_eq!(input.get_property("value").to_text(), "<b>Ada</b>");
    }

    #[test]
    fn test_content_text() {
        let source = person("Ada");
        let text = Node::text(" ");
        let b = behavior(&text, None, bind(|x, _| x.prop("name")));
        b.bind(&source, &default_context());
        assert_eq!(text.data().as_deref(), Some("Ada"));

        source.set_prop("name", Value::Null);
        process_updates();
        assert_eq!(text.data().as_deref(), Some(""));
    }

    #[test]
    fn test_event_prevents_default_unless_true() {
        let source = person("Ada");
        let element = Node::element("button");
        let seen = Rc::new(Cell::new(false));
        let seen_clone = seen.clone();
        let b = behavior(
            &element,
            Some("@click"),
            bind(move |_, c| {
                seen_clone.set(c.event().is::<Event>());
                Value::Null
            }),
        );
        b.bind(&source, &default_context());
        assert_eq!(element.listener_count("click"), 1);

        let event = Event::new("click");
        assert!(!element.dispatch_event(&event));
        assert!(event.default_prevented());
        assert!(seen.get());
        assert!(trellis_observable::current_event().is_null());

        let keep = behavior(&element, Some("@keep"), Binding::constant(true));
        keep.bind(&source, &default_context());
        let event = Event::new("keep");
        assert!(element.dispatch_event(&event));

        b.unbind(&source);
        assert_eq!(element.listener_count("click"), 0);
    }

    #[test]
    fn test_unbind_stops_updates() {
        let source = person("Ada");
        let element = Node::element("div");
        let b = behavior(&element, Some("title"), bind(|x, _| x.prop("name")));
        b.bind(&source, &default_context());
        b.unbind(&source);
        assert!(!b.is_bound());

        source.set_prop("name", "Grace");
        process_updates();
        assert_eq!(element.get_attribute("title").as_deref(), Some("Ada"));
    }
}
