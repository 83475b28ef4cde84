//! Views: the nodes and behaviors created from one template instance.

use crate::directive::Behavior;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use trellis_core::{Error, Result, Value};
use trellis_dom::{Node, Range};
use trellis_observable::ExecutionContext;

/// A run of sibling nodes plus the behaviors bound into them.
///
/// While detached, the nodes live in the view's own fragment. Inserting
/// moves them out; [`remove`](HtmlView::remove) moves them back. The first
/// and last node delimit the view wherever it is inserted.
pub struct HtmlView {
    fragment: Node,
    first_child: Node,
    last_child: Node,
    behaviors: Vec<Rc<dyn Behavior>>,
    source: RefCell<Option<Value>>,
    context: RefCell<Option<Rc<ExecutionContext>>>,
    composed: Cell<bool>,
    needs_bind_only: Cell<bool>,
}

impl HtmlView {
    pub fn new(fragment: Node, behaviors: Vec<Rc<dyn Behavior>>) -> Rc<Self> {
        let first_child = match fragment.first_child() {
            Some(child) => child,
            None => {
                let anchor = Node::comment("");
                // Appending a fresh comment to a fragment cannot fail.
                let _ = fragment.append_child(&anchor);
                anchor
            }
        };
        let last_child = fragment
            .last_child()
            .unwrap_or_else(|| first_child.clone());

        Rc::new(Self {
            fragment,
            first_child,
            last_child,
            behaviors,
            source: RefCell::new(None),
            context: RefCell::new(None),
            composed: Cell::new(false),
            needs_bind_only: Cell::new(false),
        })
    }

    pub fn first_child(&self) -> &Node {
        &self.first_child
    }

    pub fn last_child(&self) -> &Node {
        &self.last_child
    }

    pub fn fragment(&self) -> &Node {
        &self.fragment
    }

    pub fn behavior_count(&self) -> usize {
        self.behaviors.len()
    }

    /// The source the view is bound to.
    pub fn source(&self) -> Option<Value> {
        self.source.borrow().clone()
    }

    pub fn context(&self) -> Option<Rc<ExecutionContext>> {
        self.context.borrow().clone()
    }

    pub fn is_composed(&self) -> bool {
        self.composed.get()
    }

    pub fn set_composed(&self, composed: bool) {
        self.composed.set(composed);
    }

    pub fn needs_bind_only(&self) -> bool {
        self.needs_bind_only.get()
    }

    pub fn set_needs_bind_only(&self, value: bool) {
        self.needs_bind_only.set(value);
    }

    /// The nodes of the view in order.
    pub fn nodes(&self) -> Vec<Node> {
        let mut nodes = vec![self.first_child.clone()];
        let mut current = self.first_child.clone();
        while !current.ptr_eq(&self.last_child) {
            match current.next_sibling() {
                Some(next) => {
                    nodes.push(next.clone());
                    current = next;
                }
                None => break,
            }
        }
        nodes
    }

    /// Appends the view's nodes to `node`.
    pub fn append_to(&self, node: &Node) -> Result<()> {
        node.append_child(&self.fragment)
    }

    /// Inserts the view's nodes before `node`.
    ///
    /// An already inserted view is moved; moving it to where it already
    /// is does nothing.
    pub fn insert_before(&self, node: &Node) -> Result<()> {
        let parent = node
            .parent_node()
            .ok_or_else(|| Error::hierarchy_request("reference node has no parent"))?;

        if self.fragment.has_child_nodes() {
            return parent.insert_before(&self.fragment, Some(node));
        }

        if node
            .previous_sibling()
            .map_or(false, |previous| previous.ptr_eq(&self.last_child))
        {
            return Ok(());
        }

        for current in self.nodes() {
            parent.insert_before(&current, Some(node))?;
        }
        Ok(())
    }

    /// Moves the view's nodes back into its fragment.
    pub fn remove(&self) {
        for current in self.nodes() {
            // Appending a sibling run to the owning fragment cannot fail.
            let _ = self.fragment.append_child(&current);
        }
    }

    /// Removes the view's nodes and unbinds its behaviors. The view cannot
    /// be reused afterwards.
    pub fn dispose(&self) {
        for current in self.nodes() {
            current.remove();
        }
        self.unbind_behaviors();
        tracing::trace!(behaviors = self.behaviors.len(), "view disposed");
    }

    /// Binds every behavior to `source`. Binding the current source again
    /// does nothing; a different source unbinds first.
    pub fn bind(&self, source: &Value, context: &Rc<ExecutionContext>) {
        let previous = self.source.borrow().clone();
        if let Some(previous) = &previous {
            if previous.same(source) {
                return;
            }
        }

        *self.source.borrow_mut() = Some(source.clone());
        *self.context.borrow_mut() = Some(context.clone());

        for behavior in &self.behaviors {
            if let Some(previous) = &previous {
                behavior.unbind(previous);
            }
            behavior.bind(source, context);
        }
    }

    /// Unbinds every behavior. Does nothing when the view is not bound.
    pub fn unbind(&self) {
        if self.source.borrow().is_none() {
            return;
        }
        self.unbind_behaviors();
        *self.source.borrow_mut() = None;
    }

    fn unbind_behaviors(&self) {
        let source = self.source.borrow().clone().unwrap_or(Value::Null);
        for behavior in &self.behaviors {
            behavior.unbind(&source);
        }
    }

    /// Disposes adjacent views with a single range deletion.
    ///
    /// `views` must be contiguous siblings in order. If they are not, each
    /// view is removed on its own.
    pub fn dispose_contiguous_batch(views: &[Rc<HtmlView>]) {
        let (Some(first), Some(last)) = (views.first(), views.last()) else {
            return;
        };

        let mut range = Range::new();
        let deleted = range
            .set_start_before(first.first_child())
            .and_then(|_| range.set_end_after(last.last_child()))
            .and_then(|_| range.delete_contents());

        if let Err(error) = deleted {
            tracing::warn!(%error, count = views.len(), "batch dispose fell back to per-view removal");
            for view in views {
                for current in view.nodes() {
                    current.remove();
                }
            }
        }

        for view in views {
            view.unbind_behaviors();
        }
        tracing::trace!(count = views.len(), "views disposed in batch");
    }
}

impl fmt::Debug for HtmlView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtmlView")
            .field("behaviors", &self.behaviors.len())
            .field("bound", &self.source.borrow().is_some())
            .field("composed", &self.composed.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_observable::default_context;

    #[derive(Default)]
    struct Tally {
        binds: Cell<usize>,
        unbinds: Cell<usize>,
    }

    impl Behavior for Tally {
        fn bind(&self, _source: &Value, _context: &Rc<ExecutionContext>) {
            self.binds.set(self.binds.get() + 1);
        }

        fn unbind(&self, _source: &Value) {
            self.unbinds.set(self.unbinds.get() + 1);
        }
    }

    fn view(html: &str) -> (Rc<HtmlView>, Rc<Tally>) {
        let tally = Rc::new(Tally::default());
        let behaviors: Vec<Rc<dyn Behavior>> = vec![tally.clone()];
        (HtmlView::new(Node::parse(html), behaviors), tally)
    }

    #[test]
    fn test_insert_remove_reinsert() {
        let host = Node::element("div");
        let anchor = Node::comment("anchor");
        host.append_child(&anchor).unwrap();

        let (view, _) = view("<b>1</b><i>2</i>");
        view.insert_before(&anchor).unwrap();
        assert_eq!(host.inner_html(), "<b>1</b><i>2</i><!--anchor-->");
        assert!(!view.fragment().has_child_nodes());

        // Same position again is a no-op.
        view.insert_before(&anchor).unwrap();
        assert_eq!(host.inner_html(), "<b>1</b><i>2</i><!--anchor-->");

        view.remove();
        assert_eq!(host.inner_html(), "<!--anchor-->");
        assert_eq!(view.fragment().child_count(), 2);

        view.append_to(&host).unwrap();
        assert_eq!(host.inner_html(), "<!--anchor--><b>1</b><i>2</i>");

        // Move an inserted view in front of the anchor.
        view.insert_before(&anchor).unwrap();
        assert_eq!(host.inner_html(), "<b>1</b><i>2</i><!--anchor-->");
    }

    #[test]
    fn test_insert_requires_parent() {
        let (view, _) = view("<b></b>");
        assert!(view.insert_before(&Node::element("p")).is_err());
    }

    #[test]
    fn test_bind_same_source_is_noop() {
        let (view, tally) = view("<b></b>");
        let context = default_context();
        let source = Value::object(1u8);

        view.bind(&source, &context);
        view.bind(&source, &context);
        assert_eq!(tally.binds.get(), 1);
        assert_eq!(tally.unbinds.get(), 0);

        view.bind(&Value::object(2u8), &context);
        assert_eq!(tally.binds.get(), 2);
        assert_eq!(tally.unbinds.get(), 1);

        view.unbind();
        view.unbind();
        assert_eq!(tally.unbinds.get(), 2);
        assert!(view.source().is_none());
    }

    #[test]
    fn test_dispose_removes_and_unbinds() {
        let host = Node::element("div");
        let (view, tally) = view("<b>1</b>text");
        view.append_to(&host).unwrap();
        view.bind(&Value::from("x"), &default_context());

        view.dispose();
        assert_eq!(host.child_count(), 0);
        assert_eq!(tally.unbinds.get(), 1);
    }

    #[test]
    fn test_empty_fragment_gets_anchor() {
        let view = HtmlView::new(Node::fragment(), Vec::new());
        assert!(view.first_child().is_comment());
        assert!(view.first_child().ptr_eq(view.last_child()));
    }

    #[test]
    fn test_dispose_contiguous_batch() {
        let host = Node::element("ul");
        let views: Vec<_> = (0..3)
            .map(|i| view(&format!("<li>{i}</li>")))
            .collect();
        let tail = Node::element("footer");
        for (view, _) in &views {
            view.append_to(&host).unwrap();
            view.bind(&Value::object(()), &default_context());
        }
        host.append_child(&tail).unwrap();

        let batch: Vec<_> = views.iter().map(|(v, _)| v.clone()).collect();
        HtmlView::dispose_contiguous_batch(&batch);

        assert_eq!(host.inner_html(), "<footer></footer>");
        for (_, tally) in &views {
            assert_eq!(tally.unbinds.get(), 1);
        }
    }
}
