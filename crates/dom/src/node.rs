//! Node tree implementation.
//!
//! Nodes are shared handles (`Rc`) to interior-mutable node data. A child is
//! owned by its parent's child list; the parent link is weak so detached
//! subtrees are freed as soon as the last handle goes away. Each node also
//! caches its position among its siblings, so sibling lookups do not scan.

use crate::event::{Event, EventListener, Listener};
use crate::parser::parse_fragment;
use crate::serialize;
use alloc::rc::{Rc, Weak};
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;
use hashbrown::HashMap;
use trellis_core::{Error, Result, Value};

/// The DOM node type constants exposed through [`Node::node_type`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum NodeType {
    Element = 1,
    Text = 3,
    Comment = 8,
    DocumentFragment = 11,
}

/// A single element attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

pub(crate) struct ElementData {
    tag: String,
    attributes: RefCell<Vec<Attribute>>,
    properties: RefCell<HashMap<String, Value>>,
    /// Content fragment of `<template>` elements.
    content: Option<Node>,
}

pub(crate) enum NodeKind {
    Element(ElementData),
    Text(RefCell<String>),
    Comment(RefCell<String>),
    Fragment,
}

pub(crate) struct NodeData {
    kind: NodeKind,
    parent: RefCell<Weak<NodeData>>,
    /// Position in the parent's child list, updated by every mutation.
    index: Cell<usize>,
    children: RefCell<Vec<Node>>,
    pub(crate) listeners: RefCell<Vec<Listener>>,
}

/// A handle to a node in the tree. Cloning the handle does not clone the node.
#[derive(Clone)]
pub struct Node(Rc<NodeData>);

/// Elements that never have children.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Returns true if the tag name is a void element.
pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

fn reindex_from(children: &[Node], start: usize) {
    for (index, child) in children.iter().enumerate().skip(start) {
        child.0.index.set(index);
    }
}

impl Node {
    fn from_kind(kind: NodeKind) -> Self {
        Node(Rc::new(NodeData {
            kind,
            parent: RefCell::new(Weak::new()),
            index: Cell::new(0),
            children: RefCell::new(Vec::new()),
            listeners: RefCell::new(Vec::new()),
        }))
    }

    /// Creates an element. Tag names are stored lowercase.
    pub fn element(tag: &str) -> Self {
        let tag = tag.to_ascii_lowercase();
        let content = if tag == "template" {
            Some(Node::fragment())
        } else {
            None
        };
        Self::from_kind(NodeKind::Element(ElementData {
            tag,
            attributes: RefCell::new(Vec::new()),
            properties: RefCell::new(HashMap::new()),
            content,
        }))
    }

    /// Creates a text node.
    pub fn text(data: &str) -> Self {
        Self::from_kind(NodeKind::Text(RefCell::new(data.to_string())))
    }

    /// Creates a comment node.
    pub fn comment(data: &str) -> Self {
        Self::from_kind(NodeKind::Comment(RefCell::new(data.to_string())))
    }

    /// Creates an empty document fragment.
    pub fn fragment() -> Self {
        Self::from_kind(NodeKind::Fragment)
    }

    /// Parses an HTML string into a new fragment.
    pub fn parse(html: &str) -> Self {
        parse_fragment(html)
    }

    /// Returns true if both handles refer to the same node.
    #[inline]
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Returns the node's address, stable for its lifetime.
    #[inline]
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub(crate) fn data_ref(&self) -> &NodeData {
        &self.0
    }

    pub fn node_type(&self) -> NodeType {
        match self.0.kind {
            NodeKind::Element(_) => NodeType::Element,
            NodeKind::Text(_) => NodeType::Text,
            NodeKind::Comment(_) => NodeType::Comment,
            NodeKind::Fragment => NodeType::DocumentFragment,
        }
    }

    #[inline]
    pub fn is_element(&self) -> bool {
        matches!(self.0.kind, NodeKind::Element(_))
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self.0.kind, NodeKind::Text(_))
    }

    #[inline]
    pub fn is_comment(&self) -> bool {
        matches!(self.0.kind, NodeKind::Comment(_))
    }

    #[inline]
    pub fn is_fragment(&self) -> bool {
        matches!(self.0.kind, NodeKind::Fragment)
    }

    fn element_data(&self) -> Option<&ElementData> {
        match &self.0.kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    /// Returns the lowercase tag name of an element.
    pub fn tag_name(&self) -> Option<&str> {
        self.element_data().map(|data| data.tag.as_str())
    }

    /// Returns the content fragment of a `<template>` element.
    pub fn template_content(&self) -> Option<Node> {
        self.element_data().and_then(|data| data.content.clone())
    }

    /// Returns the character data of a text or comment node.
    pub fn data(&self) -> Option<String> {
        match &self.0.kind {
            NodeKind::Text(data) | NodeKind::Comment(data) => Some(data.borrow().clone()),
            _ => None,
        }
    }

    /// Replaces the character data of a text or comment node.
    pub fn set_data(&self, value: &str) {
        if let NodeKind::Text(data) | NodeKind::Comment(data) = &self.0.kind {
            let mut data = data.borrow_mut();
            data.clear();
            data.push_str(value);
        }
    }

    // ==================== Tree navigation ====================

    pub fn parent_node(&self) -> Option<Node> {
        self.0.parent.borrow().upgrade().map(Node)
    }

    /// Returns a snapshot of the child list.
    pub fn child_nodes(&self) -> Vec<Node> {
        self.0.children.borrow().clone()
    }

    pub fn child_count(&self) -> usize {
        self.0.children.borrow().len()
    }

    pub fn has_child_nodes(&self) -> bool {
        !self.0.children.borrow().is_empty()
    }

    pub fn first_child(&self) -> Option<Node> {
        self.0.children.borrow().first().cloned()
    }

    pub fn last_child(&self) -> Option<Node> {
        self.0.children.borrow().last().cloned()
    }

    /// Returns the first child that is an element.
    pub fn first_element_child(&self) -> Option<Node> {
        self.0.children.borrow().iter().find(|c| c.is_element()).cloned()
    }

    fn index_of_child(&self, child: &Node) -> Option<usize> {
        let children = self.0.children.borrow();
        let hint = child.0.index.get();
        match children.get(hint) {
            Some(c) if c.ptr_eq(child) => Some(hint),
            _ => children.iter().position(|c| c.ptr_eq(child)),
        }
    }

    /// Position of this node in its parent's child list.
    pub fn index_in_parent(&self) -> Option<usize> {
        self.parent_node().and_then(|parent| parent.index_of_child(self))
    }

    pub fn next_sibling(&self) -> Option<Node> {
        let parent = self.parent_node()?;
        let index = parent.index_of_child(self)?;
        let sibling = parent.0.children.borrow().get(index + 1).cloned();
        sibling
    }

    pub fn previous_sibling(&self) -> Option<Node> {
        let parent = self.parent_node()?;
        let index = parent.index_of_child(self)?.checked_sub(1)?;
        let sibling = parent.0.children.borrow().get(index).cloned();
        sibling
    }

    /// Returns true if `other` is this node or one of its descendants.
    pub fn contains(&self, other: &Node) -> bool {
        let mut current = Some(other.clone());
        while let Some(node) = current {
            if node.ptr_eq(self) {
                return true;
            }
            current = node.parent_node();
        }
        false
    }

    // ==================== Tree mutation ====================

    fn can_have_children(&self) -> bool {
        matches!(self.0.kind, NodeKind::Element(_) | NodeKind::Fragment)
    }

    /// Appends a child. Appending a fragment moves all of its children.
    pub fn append_child(&self, child: &Node) -> Result<()> {
        self.insert_before(child, None)
    }

    /// Inserts `new_child` before `reference`, or at the end when `reference` is None.
    ///
    /// Inserting a fragment moves its children and leaves it empty.
    pub fn insert_before(&self, new_child: &Node, reference: Option<&Node>) -> Result<()> {
        if !self.can_have_children() {
            return Err(Error::hierarchy_request("node cannot have children"));
        }
        if let Some(reference) = reference {
            if self.index_of_child(reference).is_none() {
                return Err(Error::hierarchy_request(
                    "reference node is not a child of this node",
                ));
            }
        }

        if new_child.is_fragment() {
            let moved = core::mem::take(&mut *new_child.0.children.borrow_mut());
            for child in &moved {
                *child.0.parent.borrow_mut() = Weak::new();
            }
            for child in &moved {
                self.insert_single(child, reference)?;
            }
            return Ok(());
        }

        self.insert_single(new_child, reference)
    }

    fn insert_single(&self, new_child: &Node, reference: Option<&Node>) -> Result<()> {
        if new_child.contains(self) {
            return Err(Error::hierarchy_request(
                "the new child is an ancestor of the parent",
            ));
        }

        // Inserting a node before itself keeps its position.
        let reference = match reference {
            Some(r) if r.ptr_eq(new_child) => new_child.next_sibling(),
            Some(r) => Some(r.clone()),
            None => None,
        };

        new_child.remove();

        let index = match &reference {
            Some(r) => self
                .index_of_child(r)
                .ok_or_else(|| Error::hierarchy_request("reference node moved during insert"))?,
            None => self.child_count(),
        };
        let mut children = self.0.children.borrow_mut();
        children.insert(index, new_child.clone());
        reindex_from(&children, index);
        *new_child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
        Ok(())
    }

    /// Removes `child` from this node.
    pub fn remove_child(&self, child: &Node) -> Result<()> {
        let index = self
            .index_of_child(child)
            .ok_or_else(|| Error::hierarchy_request("node to remove is not a child"))?;
        let mut children = self.0.children.borrow_mut();
        children.remove(index);
        reindex_from(&children, index);
        drop(children);
        *child.0.parent.borrow_mut() = Weak::new();
        Ok(())
    }

    /// Detaches this node from its parent, if any.
    pub fn remove(&self) {
        if let Some(parent) = self.parent_node() {
            if let Some(index) = parent.index_of_child(self) {
                let mut children = parent.0.children.borrow_mut();
                children.remove(index);
                reindex_from(&children, index);
            }
        }
        *self.0.parent.borrow_mut() = Weak::new();
    }

    /// Removes the children in `start..end` and returns them.
    pub(crate) fn remove_children_range(&self, start: usize, end: usize) -> Vec<Node> {
        let removed = {
            let mut children = self.0.children.borrow_mut();
            let removed: Vec<Node> = children.drain(start..end).collect();
            reindex_from(&children, start);
            removed
        };
        for child in &removed {
            *child.0.parent.borrow_mut() = Weak::new();
        }
        removed
    }

    /// Removes every child.
    pub fn remove_all_children(&self) {
        let len = self.child_count();
        self.remove_children_range(0, len);
    }

    // ==================== Text ====================

    /// Concatenated text of all descendant text nodes; character data for
    /// text and comment nodes.
    pub fn text_content(&self) -> String {
        match &self.0.kind {
            NodeKind::Text(data) | NodeKind::Comment(data) => data.borrow().clone(),
            _ => {
                let mut out = String::new();
                collect_text(self, &mut out);
                out
            }
        }
    }

    /// Replaces the children with a single text node, or sets character data.
    pub fn set_text_content(&self, value: &str) {
        match &self.0.kind {
            NodeKind::Text(_) | NodeKind::Comment(_) => self.set_data(value),
            _ => {
                self.remove_all_children();
                if !value.is_empty() {
                    let text = Node::text(value);
                    text.0.index.set(0);
                    self.0.children.borrow_mut().push(text.clone());
                    *text.0.parent.borrow_mut() = Rc::downgrade(&self.0);
                }
            }
        }
    }

    // ==================== Attributes ====================

    pub fn attributes(&self) -> Vec<Attribute> {
        self.element_data()
            .map(|data| data.attributes.borrow().clone())
            .unwrap_or_default()
    }

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        let data = self.element_data()?;
        let attributes = data.attributes.borrow();
        attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.clone())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.element_data()
            .map(|data| data.attributes.borrow().iter().any(|a| a.name == name))
            .unwrap_or(false)
    }

    /// Sets an attribute, keeping its position if it already exists.
    pub fn set_attribute(&self, name: &str, value: &str) {
        if let Some(data) = self.element_data() {
            let mut attributes = data.attributes.borrow_mut();
            match attributes.iter_mut().find(|a| a.name == name) {
                Some(existing) => existing.value = value.to_string(),
                None => attributes.push(Attribute::new(name, value)),
            }
        }
    }

    pub fn remove_attribute(&self, name: &str) {
        if let Some(data) = self.element_data() {
            data.attributes.borrow_mut().retain(|a| a.name != name);
        }
    }

    // ==================== Class list ====================

    /// Returns the whitespace-separated class tokens.
    pub fn class_names(&self) -> Vec<String> {
        self.get_attribute("class")
            .map(|c| c.split_whitespace().map(String::from).collect())
            .unwrap_or_default()
    }

    pub fn class_contains(&self, token: &str) -> bool {
        self.class_names().iter().any(|c| c == token)
    }

    pub fn class_add(&self, token: &str) {
        let mut names = self.class_names();
        if !names.iter().any(|c| c == token) {
            names.push(token.to_string());
            self.set_attribute("class", &names.join(" "));
        }
    }

    pub fn class_remove(&self, token: &str) {
        let mut names = self.class_names();
        let before = names.len();
        names.retain(|c| c != token);
        if names.len() != before {
            self.set_attribute("class", &names.join(" "));
        }
    }

    // ==================== Properties ====================

    /// Reads an element property. `innerHTML` and `textContent` reflect the tree.
    pub fn get_property(&self, name: &str) -> Value {
        match name {
            "innerHTML" => Value::from(self.inner_html()),
            "textContent" => Value::from(self.text_content()),
            _ => self
                .element_data()
                .and_then(|data| data.properties.borrow().get(name).cloned())
                .unwrap_or(Value::Null),
        }
    }

    /// Writes an element property. `innerHTML` and `textContent` rewrite the tree.
    pub fn set_property(&self, name: &str, value: Value) {
        match name {
            "innerHTML" => self.set_inner_html(&value.to_text()),
            "textContent" => self.set_text_content(&value.to_text()),
            _ => {
                if let Some(data) = self.element_data() {
                    data.properties.borrow_mut().insert(name.to_string(), value);
                }
            }
        }
    }

    // ==================== HTML ====================

    /// Serializes the children of this node (or of a template's content).
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        match self.template_content() {
            Some(content) => serialize::serialize_children(&content, &mut out),
            None => serialize::serialize_children(self, &mut out),
        }
        out
    }

    /// Serializes this node including itself.
    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        serialize::serialize_node(self, &mut out);
        out
    }

    /// Replaces the children (or a template's content) with parsed HTML.
    pub fn set_inner_html(&self, html: &str) {
        let target = self.template_content().unwrap_or_else(|| self.clone());
        if !target.can_have_children() {
            return;
        }
        target.remove_all_children();
        let parsed = parse_fragment(html);
        // A fragment insert into an element or fragment cannot fail.
        let _ = target.append_child(&parsed);
    }

    // ==================== Cloning ====================

    /// Clones the node. Attributes and template content are copied;
    /// properties and event listeners are not.
    pub fn clone_node(&self, deep: bool) -> Node {
        let copy = match &self.0.kind {
            NodeKind::Element(data) => {
                let element = Node::element(&data.tag);
                if let Some(copy_data) = element.element_data() {
                    *copy_data.attributes.borrow_mut() = data.attributes.borrow().clone();
                    if deep {
                        if let (Some(source), Some(target)) = (&data.content, &copy_data.content) {
                            for child in source.child_nodes() {
                                let cloned = child.clone_node(true);
                                let _ = target.append_child(&cloned);
                            }
                        }
                    }
                }
                element
            }
            NodeKind::Text(data) => Node::text(&data.borrow()),
            NodeKind::Comment(data) => Node::comment(&data.borrow()),
            NodeKind::Fragment => Node::fragment(),
        };

        if deep {
            for child in self.child_nodes() {
                let cloned = child.clone_node(true);
                let mut children = copy.0.children.borrow_mut();
                cloned.0.index.set(children.len());
                children.push(cloned.clone());
                drop(children);
                *cloned.0.parent.borrow_mut() = Rc::downgrade(&copy.0);
            }
        }
        copy
    }

    // ==================== Events ====================

    /// Registers a listener. Registering the same listener twice for one type is a no-op.
    pub fn add_event_listener(&self, event_type: &str, listener: Rc<dyn EventListener>) {
        let mut listeners = self.0.listeners.borrow_mut();
        let exists = listeners
            .iter()
            .any(|l| l.event_type == event_type && l.is(&listener));
        if !exists {
            listeners.push(Listener::new(event_type, listener));
        }
    }

    pub fn remove_event_listener(&self, event_type: &str, listener: &Rc<dyn EventListener>) {
        self.0
            .listeners
            .borrow_mut()
            .retain(|l| !(l.event_type == event_type && l.is(listener)));
    }

    /// Number of listeners registered for a type.
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.0
            .listeners
            .borrow()
            .iter()
            .filter(|l| l.event_type == event_type)
            .count()
    }

    /// Dispatches an event at this node, bubbling to ancestors when the event bubbles.
    ///
    /// Returns false if a listener called `prevent_default`.
    pub fn dispatch_event(&self, event: &Event) -> bool {
        crate::event::dispatch(self, event)
    }
}

fn collect_text(node: &Node, out: &mut String) {
    for child in node.0.children.borrow().iter() {
        match &child.0.kind {
            NodeKind::Text(data) => out.push_str(&data.borrow()),
            NodeKind::Element(_) | NodeKind::Fragment => collect_text(child, out),
            NodeKind::Comment(_) => {}
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            NodeKind::Element(data) => write!(f, "Element(<{}>)", data.tag),
            NodeKind::Text(data) => write!(f, "Text({:?})", data.borrow()),
            NodeKind::Comment(data) => write!(f, "Comment({:?})", data.borrow()),
            NodeKind::Fragment => write!(f, "Fragment({} children)", self.child_count()),
        }
    }
}
