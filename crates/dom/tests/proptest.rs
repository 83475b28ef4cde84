//! Property-based tests for trellis-dom using proptest.

use proptest::prelude::*;
use trellis_dom::{parse_fragment, Node};

fn build_tree(parent: &Node, shape: &[(usize, String, String)]) {
    const TAGS: [&str; 4] = ["div", "span", "p", "b"];
    for (i, (tag, attr, text)) in shape.iter().enumerate() {
        let el = Node::element(TAGS[*tag % TAGS.len()]);
        if i % 2 == 0 {
            el.set_attribute("title", attr);
        }
        el.append_child(&Node::text(text)).unwrap();
        parent.append_child(&el).unwrap();
    }
}

proptest! {
    /// Parsing arbitrary input never panics and always yields a fragment.
    #[test]
    fn parse_never_panics(input in ".{0,200}") {
        let frag = parse_fragment(&input);
        prop_assert!(frag.is_fragment());
        let _ = frag.outer_html();
    }

    /// Serialized trees parse back to the same markup.
    #[test]
    fn serialize_parse_is_stable(
        shape in prop::collection::vec((0usize..4, "[a-z &<>\"]{0,8}", "[a-z &<>]{0,8}"), 0..8)
    ) {
        let root = Node::fragment();
        build_tree(&root, &shape);
        let html = root.outer_html();
        let reparsed = parse_fragment(&html);
        prop_assert_eq!(reparsed.outer_html(), html);
        prop_assert_eq!(reparsed.text_content(), root.text_content());
    }

    /// Text survives escaping and entity decoding.
    #[test]
    fn text_round_trips(text in "[a-zA-Z0-9 &<>;#]{1,40}") {
        let p = Node::element("p");
        p.append_child(&Node::text(&text)).unwrap();
        let reparsed = parse_fragment(&p.outer_html());
        prop_assert_eq!(reparsed.text_content(), text);
    }
}
