//! List rendering driven by observable arrays.

use crate::directive::{Behavior, HtmlDirective};
use crate::template::ViewTemplate;
use crate::view::HtmlView;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use trellis_core::Value;
use trellis_dom::Node;
use trellis_observable::{
    enable_array_observation, Binding, BindingObserver, ChangeArgs, ExecutionContext, Notifier,
    Observable, ObservableArray, Splice, Subscriber, ValueExt,
};

/// Options for [`repeat_with`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RepeatOptions {
    /// Give each view its own context carrying its index and the length.
    pub positioning: bool,
    /// Reuse views removed by a mutation for items added by it.
    pub recycle: bool,
}

impl Default for RepeatOptions {
    fn default() -> Self {
        Self {
            positioning: false,
            recycle: true,
        }
    }
}

/// Renders one view per array item at a block placeholder.
#[derive(Clone, Debug)]
pub struct RepeatDirective {
    items: Binding,
    template: Binding,
    options: RepeatOptions,
}

impl RepeatDirective {
    /// Creating a repeat directive enables array observation.
    pub fn new(items: Binding, template: Binding, options: RepeatOptions) -> Self {
        enable_array_observation();
        Self {
            items,
            template,
            options,
        }
    }

    pub fn options(&self) -> RepeatOptions {
        self.options
    }

    pub fn create_behavior(&self, location: &Node) -> Rc<dyn Behavior> {
        RepeatBehavior::new(location, self)
    }
}

/// Repeats `template` for every item of the array `items` yields.
pub fn repeat(items: Binding, template: &Rc<ViewTemplate>) -> HtmlDirective {
    repeat_with(
        items,
        Binding::constant(template.to_value()),
        RepeatOptions::default(),
    )
}

/// Repeats the template `template` yields, with explicit options.
pub fn repeat_with(items: Binding, template: Binding, options: RepeatOptions) -> HtmlDirective {
    HtmlDirective::Repeat(RepeatDirective::new(items, template, options))
}

#[derive(Clone)]
struct Scope {
    source: Value,
    context: Rc<ExecutionContext>,
    child_context: Rc<ExecutionContext>,
}

/// Live only while bound. Each observer holds the behavior as a subscriber.
#[derive(Clone)]
struct Observers {
    items: Rc<BindingObserver>,
    template: Rc<BindingObserver>,
}

#[derive(Default)]
struct RepeatState {
    scope: Option<Scope>,
    items: Option<Rc<ObservableArray>>,
    notifier: Option<Rc<dyn Notifier>>,
    template: Option<Rc<ViewTemplate>>,
    views: Vec<Rc<HtmlView>>,
}

/// Keeps the views before a location node in step with an array.
///
/// Splices are applied one at a time, in the order they were recorded.
pub struct RepeatBehavior {
    location: Node,
    options: RepeatOptions,
    items: Binding,
    template: Binding,
    observers: RefCell<Option<Observers>>,
    state: RefCell<RepeatState>,
    self_ref: Weak<RepeatBehavior>,
}

impl RepeatBehavior {
    pub fn new(location: &Node, directive: &RepeatDirective) -> Rc<Self> {
        Rc::new_cyclic(|self_ref| Self {
            location: location.clone(),
            options: directive.options,
            items: directive.items.clone(),
            template: directive.template.clone(),
            observers: RefCell::new(None),
            state: RefCell::new(RepeatState::default()),
            self_ref: self_ref.clone(),
        })
    }

    /// The views currently rendered, in item order.
    pub fn views(&self) -> Vec<Rc<HtmlView>> {
        self.state.borrow().views.clone()
    }

    fn subscriber(&self) -> Option<Rc<dyn Subscriber>> {
        let this = self.self_ref.upgrade()?;
        Some(this)
    }

    fn scope(&self) -> Option<Scope> {
        self.state.borrow().scope.clone()
    }

    fn ensure_observers(&self) -> Option<Observers> {
        if let Some(observers) = self.observers.borrow().as_ref() {
            return Some(observers.clone());
        }
        let subscriber = self.subscriber()?;
        let observers = Observers {
            items: Observable::binding(self.items.clone(), Some(&subscriber)),
            template: Observable::binding(self.template.clone(), Some(&subscriber)),
        };
        *self.observers.borrow_mut() = Some(observers.clone());
        Some(observers)
    }

    fn observe_items(&self, items: Value, force: bool) {
        let array = items.as_array();
        if array.is_none() && !items.is_null() {
            tracing::warn!(kind = items.kind(), "repeat items are not an observable array");
        }

        let notifier = array.as_ref().and_then(|array| {
            Observable::get_notifier(&array.to_value())
                .map_err(|error| tracing::warn!(%error, "cannot observe repeat items"))
                .ok()
        });

        let previous = {
            let mut state = self.state.borrow_mut();
            state.items = array;
            std::mem::replace(&mut state.notifier, notifier.clone())
        };

        let Some(subscriber) = self.subscriber() else {
            return;
        };
        let changed = match (&previous, &notifier) {
            (Some(a), Some(b)) => !Rc::ptr_eq(a, b),
            (None, None) => false,
            _ => true,
        };
        if changed {
            if let Some(previous) = &previous {
                previous.unsubscribe(&subscriber, None);
            }
        }
        if changed || force {
            if let Some(notifier) = &notifier {
                notifier.subscribe(&subscriber, None);
            }
        }
    }

    fn observe_template(&self, observer: &BindingObserver, scope: &Scope) {
        let template = observer.observe(&scope.source, &scope.context);
        let template = template.downcast::<ViewTemplate>();
        if template.is_none() {
            tracing::warn!("repeat template binding did not yield a template");
        }
        self.state.borrow_mut().template = template;
    }

    fn bind_view(
        &self,
        view: &HtmlView,
        item: &Value,
        index: usize,
        length: usize,
        scope: &Scope,
    ) {
        if self.options.positioning {
            let context = Rc::new(ExecutionContext::child(
                scope.source.clone(),
                scope.context.clone(),
            ));
            context.update_position(index, length);
            view.bind(item, &context);
        } else {
            view.bind(item, &scope.child_context);
        }
    }

    fn update_positions(&self, views: &[Rc<HtmlView>]) {
        if !self.options.positioning {
            return;
        }
        let length = views.len();
        for (index, view) in views.iter().enumerate() {
            if let Some(context) = view.context() {
                context.update_position(index, length);
            }
        }
    }

    fn refresh_all_views(&self, template_changed: bool) {
        let (scope, items, template, mut views) = {
            let mut state = self.state.borrow_mut();
            let Some(scope) = state.scope.clone() else {
                return;
            };
            (
                scope,
                state.items.clone(),
                state.template.clone(),
                std::mem::take(&mut state.views),
            )
        };
        let items = items.map(|array| array.to_vec()).unwrap_or_default();
        let length = items.len();

        let Some(template) = template else {
            HtmlView::dispose_contiguous_batch(&views);
            return;
        };

        if template_changed || !self.options.recycle {
            HtmlView::dispose_contiguous_batch(&views);
            views.clear();
        }

        for (index, item) in items.iter().enumerate() {
            if let Some(view) = views.get(index) {
                self.bind_view(view, item, index, length, &scope);
            } else {
                let view = template.create(None);
                self.bind_view(&view, item, index, length, &scope);
                self.insert(&view, &self.location);
                views.push(view);
            }
        }
        if views.len() > length {
            for view in views.split_off(length) {
                view.dispose();
            }
        }

        self.update_positions(&views);
        tracing::trace!(views = views.len(), template_changed, "repeat refreshed");
        self.state.borrow_mut().views = views;
    }

    fn update_views(&self, splices: &[Splice]) {
        let (scope, items, template, mut views) = {
            let mut state = self.state.borrow_mut();
            let Some(scope) = state.scope.clone() else {
                return;
            };
            (
                scope,
                state.items.clone(),
                state.template.clone(),
                std::mem::take(&mut state.views),
            )
        };
        let (Some(items), Some(template)) = (items, template) else {
            self.state.borrow_mut().views = views;
            return;
        };

        // Splices recorded before this behavior subscribed are already
        // reflected in the views; fall back to a full refresh.
        let expected = splices.iter().fold(views.len() as isize, |len, splice| {
            len - splice.removed.len() as isize + splice.added.len() as isize
        });
        if expected != items.len() as isize {
            self.state.borrow_mut().views = views;
            self.refresh_all_views(false);
            return;
        }

        let length = items.len();
        let mut leftover: Vec<Rc<HtmlView>> = Vec::new();
        let mut leftover_index = 0;

        for splice in splices {
            let start = splice.index.min(views.len());
            let end = (start + splice.removed.len()).min(views.len());
            let removed: Vec<Rc<HtmlView>> = views.drain(start..end).collect();
            let mut available = leftover.len() - leftover_index + removed.len();
            let mut removed_index = 0;

            for (offset, item) in splice.added.iter().enumerate() {
                let index = start + offset;
                let location = views
                    .get(index)
                    .map(|neighbor| neighbor.first_child().clone())
                    .unwrap_or_else(|| self.location.clone());

                let view = if self.options.recycle && available > 0 {
                    available -= 1;
                    if removed_index < removed.len() {
                        removed_index += 1;
                        removed[removed_index - 1].clone()
                    } else {
                        leftover_index += 1;
                        leftover[leftover_index - 1].clone()
                    }
                } else {
                    template.create(None)
                };

                views.insert(index, view.clone());
                self.bind_view(&view, item, index, length, &scope);
                self.insert(&view, &location);
            }

            leftover.extend(removed.into_iter().skip(removed_index));
        }

        for view in &leftover[leftover_index..] {
            view.dispose();
        }

        self.update_positions(&views);
        self.state.borrow_mut().views = views;
    }

    fn insert(&self, view: &HtmlView, location: &Node) {
        if let Err(error) = view.insert_before(location) {
            tracing::warn!(%error, "failed to insert repeated view");
        }
    }
}

impl Behavior for RepeatBehavior {
    fn bind(&self, source: &Value, context: &Rc<ExecutionContext>) {
        let scope = Scope {
            source: source.clone(),
            context: context.clone(),
            child_context: Rc::new(ExecutionContext::child(source.clone(), context.clone())),
        };
        self.state.borrow_mut().scope = Some(scope.clone());

        let Some(observers) = self.ensure_observers() else {
            return;
        };
        let items = observers.items.observe(source, context);
        self.observe_template(&observers.template, &scope);
        self.observe_items(items, true);
        self.refresh_all_views(false);
    }

    fn unbind(&self, _source: &Value) {
        let (notifier, views) = {
            let mut state = self.state.borrow_mut();
            state.scope = None;
            state.items = None;
            (state.notifier.take(), state.views.clone())
        };
        if let (Some(notifier), Some(subscriber)) = (notifier, self.subscriber()) {
            notifier.unsubscribe(&subscriber, None);
        }
        for view in &views {
            view.unbind();
        }
        let observers = self.observers.borrow_mut().take();
        if let Some(observers) = observers {
            observers.items.disconnect();
            observers.template.disconnect();
        }
    }
}

impl Subscriber for RepeatBehavior {
    fn handle_change(&self, _source: &Value, args: &ChangeArgs) {
        let Some(scope) = self.scope() else {
            return;
        };
        let Some(observers) = self.observers.borrow().clone() else {
            return;
        };
        match args {
            ChangeArgs::Binding(id) if *id == observers.items.id() => {
                let items = observers.items.observe(&scope.source, &scope.context);
                self.observe_items(items, false);
                self.refresh_all_views(false);
            }
            ChangeArgs::Binding(id) if *id == observers.template.id() => {
                self.observe_template(&observers.template, &scope);
                self.refresh_all_views(true);
            }
            ChangeArgs::Splices(splices) => self.update_views(splices),
            _ => {}
        }
    }
}

impl fmt::Debug for RepeatBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("RepeatBehavior")
            .field("options", &self.options)
            .field("bound", &state.scope.is_some())
            .field("views", &state.views.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html;
    use trellis_observable::{bind, process_updates, Model, ModelClass};

    fn list_items(node: &Node, out: &mut Vec<String>) {
        for child in node.child_nodes() {
            if child.tag_name() == Some("li") {
                out.push(child.text_content());
            } else {
                list_items(&child, out);
            }
        }
    }

    fn rendered(host: &Node) -> Vec<String> {
        let mut out = Vec::new();
        list_items(host, &mut out);
        out
    }

    fn li_nodes(host: &Node) -> Vec<Node> {
        fn walk(node: &Node, out: &mut Vec<Node>) {
            for child in node.child_nodes() {
                if child.tag_name() == Some("li") {
                    out.push(child);
                } else {
                    walk(&child, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(host, &mut out);
        out
    }

    fn list_model(items: &[&str]) -> (Value, Rc<ObservableArray>) {
        let array = ObservableArray::from_vec(items.iter().map(|s| Value::from(*s)).collect());
        let class = ModelClass::with_properties("List", None, &["items"]);
        let model = Model::with_fields(&class, [("items", array.to_value())]).to_value();
        (model, array)
    }

    fn render_list(source: &Value, options: RepeatOptions) -> Node {
        let item = html!("<li>" { bind(|x, _| x.clone()) } "</li>");
        let list = html!("<ul>" {
            repeat_with(
                bind(|x, _| x.prop("items")),
                Binding::constant(item.to_value()),
                options,
            )
        } "</ul>");
        let host = Node::element("div");
        list.render(source, &host, None).unwrap();
        host
    }

    #[test]
    fn test_renders_items() {
        let (source, _) = list_model(&["a", "b", "c"]);
        let host = render_list(&source, RepeatOptions::default());
        assert_eq!(rendered(&host), ["a", "b", "c"]);
    }

    #[test]
    fn test_splices_keep_untouched_views() {
        let (source, array) = list_model(&["a", "b", "c"]);
        let host = render_list(&source, RepeatOptions::default());
        let before = li_nodes(&host);

        array.push("d");
        array.remove(1);
        array.unshift("z");
        process_updates();

        assert_eq!(rendered(&host), ["z", "a", "c", "d"]);
        let after = li_nodes(&host);
        assert!(after[1].ptr_eq(&before[0]));
        assert!(after[2].ptr_eq(&before[2]));
    }

    #[test]
    fn test_recycle_reuses_removed_view() {
        let (source, array) = list_model(&["a", "b"]);
        let host = render_list(&source, RepeatOptions::default());
        let before = li_nodes(&host);

        array.set(0, "x");
        process_updates();

        assert_eq!(rendered(&host), ["x", "b"]);
        assert!(li_nodes(&host)[0].ptr_eq(&before[0]));
    }

    #[test]
    fn test_without_recycle_creates_new_views() {
        let options = RepeatOptions {
            positioning: false,
            recycle: false,
        };
        let (source, array) = list_model(&["a", "b"]);
        let host = render_list(&source, options);
        let before = li_nodes(&host);

        array.set(0, "x");
        process_updates();

        assert_eq!(rendered(&host), ["x", "b"]);
        assert!(!li_nodes(&host)[0].ptr_eq(&before[0]));
        assert!(li_nodes(&host)[1].ptr_eq(&before[1]));
    }

    #[test]
    fn test_positioning_context() {
        let (source, array) = list_model(&["a", "b", "c"]);
        let item = html!("<li>" { bind(|x, c| format!("{}:{}/{}", x, c.index(), c.length())) } "</li>");
        let directive = RepeatDirective::new(
            bind(|x, _| x.prop("items")),
            Binding::constant(item.to_value()),
            RepeatOptions {
                positioning: true,
                recycle: true,
            },
        );

        let host = Node::element("ul");
        let location = Node::comment("");
        host.append_child(&location).unwrap();
        let behavior = RepeatBehavior::new(&location, &directive);
        behavior.bind(&source, &trellis_observable::default_context());
        assert_eq!(rendered(&host), ["a:0/3", "b:1/3", "c:2/3"]);

        array.shift();
        process_updates();
        let positions: Vec<_> = behavior
            .views()
            .iter()
            .filter_map(|view| view.context())
            .map(|context| (context.index(), context.length(), context.is_last()))
            .collect();
        assert_eq!(positions, [(0, 2, false), (1, 2, true)]);
        assert!(behavior.views()[0].context().unwrap().parent().same(&source));
    }

    #[test]
    fn test_replacing_the_array_refreshes() {
        let (source, _) = list_model(&["a", "b"]);
        let host = render_list(&source, RepeatOptions::default());

        let next = ObservableArray::from_vec(vec![Value::from("q")]);
        source.set_prop("items", next.to_value());
        process_updates();
        assert_eq!(rendered(&host), ["q"]);

        next.push("r");
        process_updates();
        assert_eq!(rendered(&host), ["q", "r"]);
    }

    #[test]
    fn test_template_change_recreates_views() {
        let (source, _) = list_model(&["a", "b"]);
        let class = ModelClass::with_properties("Shape", None, &["fancy"]);
        let shape = Model::with_fields(&class, [("fancy", false)]).to_value();

        let plain = html!("<li>" { bind(|x, _| x.clone()) } "</li>");
        let fancy = html!("<li>*" { bind(|x, _| x.clone()) } "</li>");
        let (plain_value, fancy_value) = (plain.to_value(), fancy.to_value());
        let shape_clone = shape.clone();
        let list = html!("<ul>" {
            repeat_with(
                bind(|x, _| x.prop("items")),
                Binding::volatile(move |_, _| {
                    if shape_clone.prop("fancy").is_truthy() {
                        fancy_value.clone()
                    } else {
                        plain_value.clone()
                    }
                }),
                RepeatOptions::default(),
            )
        } "</ul>");
        let host = Node::element("div");
        list.render(&source, &host, None).unwrap();
        let before = li_nodes(&host);

        shape.set_prop("fancy", true);
        process_updates();
        assert_eq!(rendered(&host), ["*a", "*b"]);
        assert!(!li_nodes(&host)[0].ptr_eq(&before[0]));
    }

    #[test]
    fn test_unbind_stops_tracking() {
        let (source, array) = list_model(&["a"]);
        let item = html!("<li>" { bind(|x, _| x.clone()) } "</li>");
        let list = html!("<ul>" { repeat(bind(|x, _| x.prop("items")), &item) } "</ul>");
        let host = Node::element("div");
        let view = list.render(&source, &host, None).unwrap();

        view.unbind();
        array.push("b");
        process_updates();
        assert_eq!(rendered(&host), ["a"]);

        view.bind(&source, &trellis_observable::default_context());
        assert_eq!(rendered(&host), ["a", "b"]);
    }

    #[test]
    fn test_null_items_render_nothing() {
        let class = ModelClass::with_properties("List", None, &["items"]);
        let source = Model::new(&class).to_value();
        let host = render_list(&source, RepeatOptions::default());
        assert!(rendered(&host).is_empty());

        source.set_prop("items", ObservableArray::from_vec(vec![Value::from("a")]).to_value());
        process_updates();
        assert_eq!(rendered(&host), ["a"]);
    }
}
