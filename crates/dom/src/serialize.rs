//! HTML serialization.

use crate::node::{is_void_element, Node, NodeType};
use alloc::string::String;

/// Elements whose text children are written without escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub(crate) fn serialize_children(node: &Node, out: &mut String) {
    let raw = node
        .tag_name()
        .map(|tag| RAW_TEXT_ELEMENTS.contains(&tag))
        .unwrap_or(false);
    for child in node.child_nodes() {
        if raw && child.is_text() {
            out.push_str(&child.text_content());
        } else {
            serialize_node(&child, out);
        }
    }
}

pub(crate) fn serialize_node(node: &Node, out: &mut String) {
    match node.node_type() {
        NodeType::Element => {
            let tag = node.tag_name().unwrap_or_default();
            out.push('<');
            out.push_str(tag);
            for attr in node.attributes() {
                out.push(' ');
                out.push_str(&attr.name);
                if !attr.value.is_empty() {
                    out.push_str("=\"");
                    escape_attribute(&attr.value, out);
                    out.push('"');
                }
            }
            out.push('>');
            if is_void_element(tag) {
                return;
            }
            match node.template_content() {
                Some(content) => serialize_children(&content, out),
                None => serialize_children(node, out),
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        NodeType::Text => escape_text(&node.text_content(), out),
        NodeType::Comment => {
            out.push_str("<!--");
            out.push_str(&node.text_content());
            out.push_str("-->");
        }
        NodeType::DocumentFragment => serialize_children(node, out),
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

fn escape_attribute(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}
