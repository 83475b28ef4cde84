//! Contiguous sibling ranges.

use crate::node::Node;
use alloc::vec::Vec;
use trellis_core::{Error, Result};

/// A boundary point: a container node and a child offset.
#[derive(Clone, Debug)]
struct Boundary {
    container: Node,
    offset: usize,
}

/// A range over the children of a single parent.
#[derive(Clone, Debug, Default)]
pub struct Range {
    start: Option<Boundary>,
    end: Option<Boundary>,
}

impl Range {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the range just before `node`.
    pub fn set_start_before(&mut self, node: &Node) -> Result<()> {
        self.start = Some(boundary(node, 0)?);
        Ok(())
    }

    /// Ends the range just after `node`.
    pub fn set_end_after(&mut self, node: &Node) -> Result<()> {
        self.end = Some(boundary(node, 1)?);
        Ok(())
    }

    /// Removes every node between the boundaries and returns them in order.
    ///
    /// Both boundaries must share one container.
    pub fn delete_contents(&mut self) -> Result<Vec<Node>> {
        let (start, end) = match (&self.start, &self.end) {
            (Some(start), Some(end)) => (start, end),
            _ => return Err(Error::invalid_operation("range boundaries are not set")),
        };
        if !start.container.ptr_eq(&end.container) {
            return Err(Error::hierarchy_request(
                "range boundaries have different containers",
            ));
        }
        let container = start.container.clone();
        let len = container.child_count();
        let from = start.offset.min(len);
        let to = end.offset.min(len);
        if from >= to {
            return Ok(Vec::new());
        }

        let removed = container.remove_children_range(from, to);
        let collapsed = Boundary {
            container,
            offset: from,
        };
        self.start = Some(collapsed.clone());
        self.end = Some(collapsed);
        Ok(removed)
    }
}

fn boundary(node: &Node, delta: usize) -> Result<Boundary> {
    let container = node
        .parent_node()
        .ok_or_else(|| Error::invalid_operation("range boundary node has no parent"))?;
    let offset = node
        .index_in_parent()
        .ok_or_else(|| Error::invalid_operation("range boundary node is detached"))?;
    Ok(Boundary {
        container,
        offset: offset + delta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_fragment;

    #[test]
    fn test_delete_contiguous_children() {
        let frag = parse_fragment("<a></a><b></b><i></i><u></u>");
        let children = frag.child_nodes();

        let mut range = Range::new();
        range.set_start_before(&children[1]).unwrap();
        range.set_end_after(&children[2]).unwrap();
        let removed = range.delete_contents().unwrap();

        assert_eq!(removed.len(), 2);
        assert_eq!(frag.outer_html(), "<a></a><u></u>");
        assert!(removed[0].parent_node().is_none());
    }

    #[test]
    fn test_delete_across_parents_fails() {
        let frag = parse_fragment("<div><a></a></div><b></b>");
        let div = frag.first_child().unwrap();
        let a = div.first_child().unwrap();
        let b = frag.last_child().unwrap();

        let mut range = Range::new();
        range.set_start_before(&a).unwrap();
        range.set_end_after(&b).unwrap();
        assert!(matches!(
            range.delete_contents(),
            Err(Error::HierarchyRequest { .. })
        ));
    }

    #[test]
    fn test_detached_boundary_fails() {
        let mut range = Range::new();
        assert!(range.set_start_before(&Node::text("x")).is_err());
    }
}
