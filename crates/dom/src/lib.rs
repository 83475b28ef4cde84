//! Trellis DOM - An in-memory document tree for Trellis templates.
//!
//! This crate provides the host tree that compiled templates are cloned into
//! and that views mutate:
//!
//! - `Node`: Shared handles to elements, text, comments and fragments
//! - `parse_fragment`: A lenient HTML fragment parser
//! - `TreeWalker`: Live pre-order traversal used by the template compiler
//! - `Range`: Removal of contiguous sibling runs
//! - `Event`: Listener registration and bubbling dispatch
//!
//! # Example
//!
//! ```rust
//! use trellis_dom::Node;
//!
//! let fragment = Node::parse("<p class=\"greeting\">Hello</p>");
//! let p = fragment.first_child().unwrap();
//! assert_eq!(p.get_attribute("class").as_deref(), Some("greeting"));
//! assert_eq!(p.text_content(), "Hello");
//! ```

#![no_std]

extern crate alloc;

mod event;
mod node;
mod parser;
mod range;
mod serialize;
mod walker;

pub use event::{Event, EventListener};
pub use node::{is_void_element, Attribute, Node, NodeType};
pub use parser::{decode_entities, parse_fragment};
pub use range::Range;
pub use walker::{TreeWalker, SHOW_COMMENT, SHOW_ELEMENT, SHOW_TEXT};
