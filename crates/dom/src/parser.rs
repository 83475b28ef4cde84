//! Lenient HTML fragment parser.
//!
//! Supports the subset of HTML that templates produce:
//! - elements with quoted, unquoted and valueless attributes
//! - comments (`<!-- ... -->`); doctypes and processing instructions are skipped
//! - void elements and raw text elements (`script`, `style`, `textarea`, `title`)
//! - `<template>` children, which are placed in the template's content fragment
//! - the common named entities and numeric character references
//!
//! Malformed input never fails: stray close tags are ignored and unclosed
//! elements are closed at the end of input.

use crate::node::{is_void_element, Node};
use alloc::string::{String, ToString};
use alloc::vec::Vec;

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Elements whose raw text still has entities decoded.
const ESCAPABLE_RAW_TEXT_ELEMENTS: &[&str] = &["textarea", "title"];

/// Parses `html` into a new document fragment.
pub fn parse_fragment(html: &str) -> Node {
    let root = Node::fragment();
    let mut parser = Parser::new(html);
    parser.parse_into(&root);
    root
}

/// Parser state.
struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn parse_into(&mut self, root: &Node) {
        // Stack of open elements; the root fragment is always at the bottom.
        let mut open: Vec<Node> = Vec::new();
        open.push(root.clone());

        while self.pos < self.input.len() {
            let rest = self.rest();
            if rest.starts_with("<!--") {
                let data = self.parse_comment();
                append(current(&open), &Node::comment(&data));
            } else if rest.starts_with("</") {
                let tag = self.parse_end_tag();
                if let Some(depth) = open
                    .iter()
                    .rposition(|n| n.tag_name() == Some(tag.as_str()))
                {
                    if depth > 0 {
                        open.truncate(depth);
                    }
                }
            } else if rest.starts_with("<!") || rest.starts_with("<?") {
                self.skip_past('>');
            } else if rest.starts_with('<')
                && rest[1..].chars().next().map_or(false, |c| c.is_ascii_alphabetic())
            {
                let (element, self_closing) = self.parse_start_tag();
                let tag = element.tag_name().unwrap_or_default().to_string();
                append(current(&open), &element);

                if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) {
                    let text = self.parse_raw_text(&tag);
                    if !text.is_empty() {
                        let text = if ESCAPABLE_RAW_TEXT_ELEMENTS.contains(&tag.as_str()) {
                            decode_entities(&text)
                        } else {
                            text
                        };
                        append(&element, &Node::text(&text));
                    }
                } else if !self_closing && !is_void_element(&tag) {
                    open.push(element);
                }
            } else {
                let text = self.parse_text();
                append_text(current(&open), &decode_entities(&text));
            }
        }
    }

    fn parse_comment(&mut self) -> String {
        self.pos += "<!--".len();
        match self.rest().find("-->") {
            Some(end) => {
                let data = self.rest()[..end].to_string();
                self.pos += end + "-->".len();
                data
            }
            None => {
                let data = self.rest().to_string();
                self.pos = self.input.len();
                data
            }
        }
    }

    fn parse_end_tag(&mut self) -> String {
        self.pos += "</".len();
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '>' || c.is_whitespace() {
                break;
            }
            self.advance();
        }
        let tag = self.input[start..self.pos].to_ascii_lowercase();
        self.skip_past('>');
        tag
    }

    fn skip_past(&mut self, delimiter: char) {
        match self.rest().find(delimiter) {
            Some(end) => self.pos += end + delimiter.len_utf8(),
            None => self.pos = self.input.len(),
        }
    }

    fn parse_raw_name(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == '>' || c == '/' || c == '=' {
                break;
            }
            self.advance();
        }
        let input = self.input;
        &input[start..self.pos]
    }

    fn parse_name(&mut self) -> String {
        self.parse_raw_name().to_ascii_lowercase()
    }

    /// Attribute names are case-insensitive, except those starting with a
    /// binding sigil, which name properties and events as written.
    fn parse_attribute_name(&mut self) -> String {
        let name = self.parse_raw_name();
        if name.starts_with([':', '@', '?']) {
            name.to_string()
        } else {
            name.to_ascii_lowercase()
        }
    }

    /// Parses `<tag attr=value ...>` and reports whether it ended with `/>`.
    fn parse_start_tag(&mut self) -> (Node, bool) {
        self.advance();
        let tag = self.parse_name();
        let element = Node::element(&tag);
        let mut self_closing = false;

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => break,
                Some('>') => {
                    self.advance();
                    break;
                }
                Some('/') => {
                    self.advance();
                    if self.peek() == Some('>') {
                        self.advance();
                        self_closing = true;
                        break;
                    }
                }
                Some(_) => {
                    let name = self.parse_attribute_name();
                    if name.is_empty() {
                        // A lone '=' with no name.
                        self.advance();
                        continue;
                    }
                    self.skip_whitespace();
                    let value = if self.peek() == Some('=') {
                        self.advance();
                        self.skip_whitespace();
                        self.parse_attribute_value()
                    } else {
                        String::new()
                    };
                    // The first occurrence of a duplicated attribute wins.
                    if !element.has_attribute(&name) {
                        element.set_attribute(&name, &decode_entities(&value));
                    }
                }
            }
        }

        (element, self_closing)
    }

    fn parse_attribute_value(&mut self) -> String {
        match self.peek() {
            Some(quote) if quote == '"' || quote == '\'' => {
                self.advance();
                let start = self.pos;
                match self.rest().find(quote) {
                    Some(end) => {
                        self.pos += end + 1;
                        self.input[start..start + end].to_string()
                    }
                    None => {
                        self.pos = self.input.len();
                        self.input[start..].to_string()
                    }
                }
            }
            _ => {
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if c.is_whitespace() || c == '>' {
                        break;
                    }
                    self.advance();
                }
                self.input[start..self.pos].to_string()
            }
        }
    }

    /// Reads text up to the matching close tag of a raw text element.
    fn parse_raw_text(&mut self, tag: &str) -> String {
        let start = self.pos;
        let lower = self.rest().to_ascii_lowercase();
        let close = alloc::format!("</{}", tag);
        match lower.find(&close) {
            Some(end) => {
                self.pos = start + end;
                let text = self.input[start..self.pos].to_string();
                self.parse_end_tag();
                text
            }
            None => {
                self.pos = self.input.len();
                self.input[start..].to_string()
            }
        }
    }

    fn parse_text(&mut self) -> String {
        let start = self.pos;
        // A '<' that does not open a tag is literal text.
        if self.peek() == Some('<') {
            self.advance();
        }
        match self.rest().find('<') {
            Some(end) => self.pos += end,
            None => self.pos = self.input.len(),
        }
        self.input[start..self.pos].to_string()
    }
}

fn current(open: &[Node]) -> &Node {
    &open[open.len() - 1]
}

fn insertion_target(parent: &Node) -> Node {
    parent.template_content().unwrap_or_else(|| parent.clone())
}

fn append(parent: &Node, child: &Node) {
    // Parent is always an element or fragment, which accept children.
    let _ = insertion_target(parent).append_child(child);
}

/// Appends text, merging with a preceding text node.
fn append_text(parent: &Node, text: &str) {
    let target = insertion_target(parent);
    if let Some(last) = target.last_child() {
        if last.is_text() {
            let mut data = last.text_content();
            data.push_str(text);
            last.set_data(&data);
            return;
        }
    }
    let _ = target.append_child(&Node::text(text));
}

/// Decodes the common named entities and numeric character references.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        match rest.find(';') {
            Some(semi) if semi <= 10 => {
                let entity = &rest[1..semi];
                match decode_entity(entity) {
                    Some(c) => {
                        out.push(c);
                        rest = &rest[semi + 1..];
                    }
                    None => {
                        out.push('&');
                        rest = &rest[1..];
                    }
                }
            }
            _ => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let digits = entity.strip_prefix('#')?;
            let code = match digits.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => digits.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}
