//! Pre-order tree walker.

use crate::node::{Node, NodeType};

pub const SHOW_ELEMENT: u32 = 0x1;
pub const SHOW_TEXT: u32 = 0x4;
pub const SHOW_COMMENT: u32 = 0x80;

/// Walks the descendants of a root in document order.
///
/// The walk is live: nodes inserted after the current node are visited and
/// the current node may be replaced or removed before advancing, as long as
/// the caller repositions it with [`TreeWalker::set_current_node`].
pub struct TreeWalker {
    root: Node,
    current: Node,
    what_to_show: u32,
}

impl TreeWalker {
    pub fn new(root: &Node, what_to_show: u32) -> Self {
        Self {
            root: root.clone(),
            current: root.clone(),
            what_to_show,
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn current_node(&self) -> &Node {
        &self.current
    }

    pub fn set_current_node(&mut self, node: &Node) {
        self.current = node.clone();
    }

    fn accepts(&self, node: &Node) -> bool {
        let mask = match node.node_type() {
            NodeType::Element => SHOW_ELEMENT,
            NodeType::Text => SHOW_TEXT,
            NodeType::Comment => SHOW_COMMENT,
            NodeType::DocumentFragment => 0,
        };
        self.what_to_show & mask != 0
    }

    /// Advances to the next shown node, or returns None at the end.
    pub fn next_node(&mut self) -> Option<Node> {
        let mut node = self.current.clone();
        loop {
            if let Some(child) = node.first_child() {
                node = child;
            } else {
                loop {
                    if node.ptr_eq(&self.root) {
                        return None;
                    }
                    if let Some(sibling) = node.next_sibling() {
                        node = sibling;
                        break;
                    }
                    node = node.parent_node()?;
                }
            }

            if self.accepts(&node) {
                self.current = node.clone();
                return Some(node);
            }
        }
    }
}
