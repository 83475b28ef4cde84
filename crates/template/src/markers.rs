//! Placeholder markers embedded in template HTML.
//!
//! Every directive is replaced in the template source by a placeholder
//! carrying its index. The marker prefix is random per thread so that
//! literal template text never collides with a placeholder.

use std::rc::Rc;

const MARKER_PREFIX: &str = "fast-";
const MARKER_LEN: usize = 6;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

thread_local! {
    static MARKER: Rc<str> = generate_marker();
}

fn generate_marker() -> Rc<str> {
    let mut marker = String::with_capacity(MARKER_PREFIX.len() + MARKER_LEN);
    marker.push_str(MARKER_PREFIX);
    for _ in 0..MARKER_LEN {
        marker.push(BASE36[fastrand::usize(..BASE36.len())] as char);
    }
    Rc::from(marker)
}

/// The marker for this thread, e.g. `fast-k3x9qa`.
pub fn marker() -> Rc<str> {
    MARKER.with(Rc::clone)
}

/// Placeholder for a directive in text or an attribute value: `marker{index}`.
pub fn interpolation_placeholder(index: usize) -> String {
    format!("{}{{{}}}", marker(), index)
}

/// Placeholder attribute for an attached behavior: `name="marker{index}"`.
pub fn custom_attribute_placeholder(name: &str, index: usize) -> String {
    format!("{}=\"{}\"", name, interpolation_placeholder(index))
}

/// Placeholder comment for a block directive: `<!--marker:index-->`.
pub fn block_placeholder(index: usize) -> String {
    format!("<!--{}:{}-->", marker(), index)
}

/// A piece of interpolated text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentPart {
    Literal(String),
    Directive(usize),
}

/// Splits `value` around interpolation placeholders.
///
/// Returns None when `value` contains no placeholder. Empty literals are
/// dropped.
pub fn parse_interpolation(value: &str) -> Option<Vec<ContentPart>> {
    let start = format!("{}{{", marker());
    let mut pieces = value.split(start.as_str());
    let first = pieces.next()?;

    let mut parts = Vec::new();
    let mut found = false;
    push_literal(&mut parts, first);

    for piece in pieces {
        found = true;
        let directive = piece.find('}').and_then(|end| {
            let index = piece[..end].trim().parse::<usize>().ok()?;
            Some((index, &piece[end + 1..]))
        });
        match directive {
            Some((index, rest)) => {
                parts.push(ContentPart::Directive(index));
                push_literal(&mut parts, rest);
            }
            // Not a placeholder after all; keep the text as written.
            None => {
                push_literal(&mut parts, &start);
                push_literal(&mut parts, piece);
            }
        }
    }

    found.then_some(parts)
}

fn push_literal(parts: &mut Vec<ContentPart>, text: &str) {
    if text.is_empty() {
        return;
    }
    match parts.last_mut() {
        Some(ContentPart::Literal(last)) => last.push_str(text),
        _ => parts.push(ContentPart::Literal(text.to_string())),
    }
}

/// Returns the directive index of a block placeholder comment's data.
pub fn parse_block_placeholder(data: &str) -> Option<usize> {
    let marker = marker();
    data.strip_prefix(&*marker)?
        .strip_prefix(':')?
        .trim()
        .parse()
        .ok()
}

/// Returns true if comment data starts with this thread's marker.
pub fn is_marker(data: &str) -> bool {
    data.starts_with(&*marker())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_shape() {
        let marker = marker();
        assert!(marker.starts_with("fast-"));
        assert_eq!(marker.len(), 11);
        assert!(marker[5..]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_eq!(marker, super::marker());
    }

    #[test]
    fn test_placeholders() {
        let m = marker();
        assert_eq!(interpolation_placeholder(3), format!("{m}{{3}}"));
        assert_eq!(
            custom_attribute_placeholder("fast-ref", 1),
            format!("fast-ref=\"{m}{{1}}\"")
        );
        assert_eq!(block_placeholder(7), format!("<!--{m}:7-->"));
    }

    #[test]
    fn test_parse_interpolation() {
        assert_eq!(parse_interpolation("plain text"), None);

        let value = format!(
            "Hello {} and {}!",
            interpolation_placeholder(0),
            interpolation_placeholder(1)
        );
        assert_eq!(
            parse_interpolation(&value),
            Some(vec![
                ContentPart::Literal("Hello ".into()),
                ContentPart::Directive(0),
                ContentPart::Literal(" and ".into()),
                ContentPart::Directive(1),
                ContentPart::Literal("!".into()),
            ])
        );

        let only = interpolation_placeholder(4);
        assert_eq!(
            parse_interpolation(&only),
            Some(vec![ContentPart::Directive(4)])
        );
    }

    #[test]
    fn test_parse_interpolation_keeps_malformed_markers() {
        let m = marker();
        let value = format!("a{m}{{x}}b{}{m}{{7", interpolation_placeholder(2));
        assert_eq!(
            parse_interpolation(&value),
            Some(vec![
                ContentPart::Literal(format!("a{m}{{x}}b")),
                ContentPart::Directive(2),
                ContentPart::Literal(format!("{m}{{7")),
            ])
        );
    }

    #[test]
    fn test_parse_block_placeholder() {
        let m = marker();
        assert_eq!(parse_block_placeholder(&format!("{m}:12")), Some(12));
        assert_eq!(parse_block_placeholder("fast-zzzzzz:1x"), None);
        assert_eq!(parse_block_placeholder("other"), None);
        assert!(is_marker(&format!("{m}:0")));
        assert!(!is_marker("comment"));
    }
}
