//! Compiles template HTML into a fragment and behavior factories.
//!
//! Compilation walks the parsed fragment once in document order, counting
//! every element, text and comment node. Each placeholder found becomes a
//! [`BehaviorFactory`] holding the walk index of its node, so creating a
//! view only needs to clone the fragment and walk it again.

use crate::directive::{BehaviorFactory, BindingDirective, HtmlDirective};
use crate::markers::{self, ContentPart};
use crate::policy::create_html;
use std::cell::RefCell;
use std::rc::Rc;
use trellis_dom::{parse_fragment, Node, TreeWalker, SHOW_COMMENT, SHOW_ELEMENT, SHOW_TEXT};
use trellis_observable::Binding;

/// Elements, text and comments.
pub(crate) const TEMPLATE_WALK: u32 = SHOW_ELEMENT | SHOW_TEXT | SHOW_COMMENT;

/// The output of compiling a template.
#[derive(Debug)]
pub struct CompilationResult {
    /// The fragment every view is cloned from.
    pub fragment: Node,
    /// Factories for nodes inside the fragment, in walk order.
    pub view_behavior_factories: Vec<BehaviorFactory>,
    /// Factories for the host element the view is rendered into.
    pub host_behavior_factories: Vec<BehaviorFactory>,
    /// Walk index of the fragment's first node: -1 when a stabilizing
    /// comment was inserted ahead of it, 0 otherwise.
    pub target_offset: isize,
}

#[derive(Default)]
struct CompilationContext {
    directives: Vec<Rc<HtmlDirective>>,
    factories: Vec<BehaviorFactory>,
    target_index: isize,
}

thread_local! {
    static CONTEXT_POOL: RefCell<Option<CompilationContext>> = const { RefCell::new(None) };
}

impl CompilationContext {
    fn borrow(directives: &[Rc<HtmlDirective>]) -> Self {
        let mut context = CONTEXT_POOL
            .with(|pool| pool.borrow_mut().take())
            .unwrap_or_default();
        context.directives.extend(directives.iter().cloned());
        context.reset();
        context
    }

    fn release(mut self) {
        self.directives.clear();
        self.factories.clear();
        CONTEXT_POOL.with(|pool| *pool.borrow_mut() = Some(self));
    }

    fn reset(&mut self) {
        self.target_index = -1;
    }

    fn take_factories(&mut self) -> Vec<BehaviorFactory> {
        std::mem::take(&mut self.factories)
    }

    fn directive(&self, index: usize) -> Option<Rc<HtmlDirective>> {
        let directive = self.directives.get(index).cloned();
        if directive.is_none() {
            tracing::warn!(index, "placeholder refers to a missing directive");
        }
        directive
    }

    fn add_factory(&mut self, directive: Rc<HtmlDirective>) {
        self.factories.push(BehaviorFactory {
            target_index: self.target_index,
            directive,
        });
    }

    fn capture_content_binding(&mut self, index: usize) {
        let Some(directive) = self.directive(index) else {
            return;
        };
        match directive.as_binding() {
            Some(binding) => {
                let content = HtmlDirective::Binding(binding.at_content());
                self.add_factory(Rc::new(content));
            }
            None => tracing::warn!(index, "only bindings can target text content"),
        }
    }

    /// Combines the parts of an attribute value into one directive.
    ///
    /// A value that is a single placeholder keeps its directive. Mixed
    /// values become one binding that concatenates the text of every part.
    fn aggregate(&self, parts: Vec<ContentPart>, attribute: &str) -> Option<Rc<HtmlDirective>> {
        if let [ContentPart::Directive(index)] = parts.as_slice() {
            let directive = self.directive(*index)?;
            return match directive.as_binding() {
                Some(binding) if binding.target_name().is_none() => Some(Rc::new(
                    HtmlDirective::Binding(binding.clone().with_target_name(attribute)),
                )),
                _ => Some(directive),
            };
        }

        let mut target_name: Option<String> = None;
        let mut volatile = false;
        let mut pieces: Vec<Binding> = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                ContentPart::Literal(text) => pieces.push(Binding::constant(text)),
                ContentPart::Directive(index) => {
                    let Some(directive) = self.directive(index) else {
                        continue;
                    };
                    match directive.as_binding() {
                        Some(binding) => {
                            if let Some(name) = binding.target_name() {
                                target_name = Some(name.to_string());
                            }
                            volatile |= binding.binding().is_volatile();
                            pieces.push(binding.binding().clone());
                        }
                        None => tracing::warn!(
                            index,
                            attribute,
                            "skipping non-binding directive in attribute value"
                        ),
                    }
                }
            }
        }

        if pieces.is_empty() {
            return None;
        }

        let binding = Binding::new(move |source, context| {
            let mut output = String::new();
            for piece in &pieces {
                output.push_str(&piece.evaluate(source, context).to_text());
            }
            output
        })
        .with_volatile(volatile);

        let name = target_name.unwrap_or_else(|| attribute.to_string());
        Some(Rc::new(HtmlDirective::Binding(
            BindingDirective::new(binding).with_target_name(&name),
        )))
    }
}

fn compile_attributes(context: &mut CompilationContext, node: &Node, include_basic_values: bool) {
    for attribute in node.attributes() {
        let directive = match markers::parse_interpolation(&attribute.value) {
            Some(parts) => context.aggregate(parts, &attribute.name),
            None if include_basic_values => Some(Rc::new(HtmlDirective::Binding(
                BindingDirective::new(Binding::constant(attribute.value.as_str()))
                    .with_target_name(&attribute.name),
            ))),
            None => None,
        };

        if let Some(directive) = directive {
            node.remove_attribute(&attribute.name);
            context.add_factory(directive);
        }
    }
}

/// Splits a text node around its placeholders. Each binding gets its own
/// text node; literals between them keep theirs.
fn compile_content(context: &mut CompilationContext, node: &Node, walker: &mut TreeWalker) {
    let Some(parts) = markers::parse_interpolation(&node.text_content()) else {
        return;
    };
    if parts.is_empty() {
        node.set_data("");
        return;
    }

    let mut last = node.clone();
    for (i, part) in parts.iter().enumerate() {
        let current = if i == 0 {
            node.clone()
        } else {
            let text = Node::text("");
            let inserted = last.parent_node().map(|parent| {
                let next = last.next_sibling();
                parent.insert_before(&text, next.as_ref())
            });
            if !matches!(inserted, Some(Ok(()))) {
                tracing::warn!("cannot split a detached text node");
                break;
            }
            text
        };

        match part {
            ContentPart::Literal(text) => current.set_data(text),
            ContentPart::Directive(index) => {
                current.set_data(" ");
                context.capture_content_binding(*index);
            }
        }

        context.target_index += 1;
        if !current.ptr_eq(node) {
            walker.next_node();
        }
        last = current;
    }
    context.target_index -= 1;
}

/// Parses and compiles `html` with its `directives`.
///
/// When the first element of the parsed HTML is a `<template>`, its
/// content is compiled and its attributes become host behaviors.
pub fn compile_template(html: &str, directives: &[Rc<HtmlDirective>]) -> CompilationResult {
    let parsed = parse_fragment(&create_html(html));
    let host_template = parsed
        .first_element_child()
        .filter(|element| element.tag_name() == Some("template"));

    let mut context = CompilationContext::borrow(directives);

    let (fragment, host_behavior_factories) = match host_template {
        Some(template) => {
            compile_attributes(&mut context, &template, true);
            let factories = context.take_factories();
            context.reset();
            let content = template.template_content().unwrap_or_else(Node::fragment);
            (content, factories)
        }
        None => (parsed, Vec::new()),
    };

    let mut walker = TreeWalker::new(&fragment, TEMPLATE_WALK);
    while let Some(node) = walker.next_node() {
        context.target_index += 1;
        if node.is_element() {
            compile_attributes(&mut context, &node, false);
        } else if node.is_text() {
            compile_content(&mut context, &node, &mut walker);
        } else if node.is_comment() {
            let index = node
                .data()
                .as_deref()
                .and_then(markers::parse_block_placeholder);
            if let Some(directive) = index.and_then(|index| context.directive(index)) {
                context.add_factory(directive);
            }
        }
    }

    let starts_with_marker = fragment
        .first_child()
        .filter(Node::is_comment)
        .and_then(|first| first.data())
        .map_or(false, |data| markers::is_marker(&data));

    let mut target_offset = 0;
    if starts_with_marker || (fragment.child_count() == 1 && !directives.is_empty()) {
        let first = fragment.first_child();
        // Inserting a fresh comment into a fragment cannot fail.
        let _ = fragment.insert_before(&Node::comment(""), first.as_ref());
        target_offset = -1;
    }
    if !fragment.has_child_nodes() {
        let _ = fragment.append_child(&Node::comment(""));
    }

    let view_behavior_factories = context.take_factories();
    context.release();

    tracing::trace!(
        view_factories = view_behavior_factories.len(),
        host_factories = host_behavior_factories.len(),
        target_offset,
        "template compiled"
    );

    CompilationResult {
        fragment,
        view_behavior_factories,
        host_behavior_factories,
        target_offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::{block_placeholder, interpolation_placeholder};
    use crate::repeat::RepeatDirective;
    use trellis_core::Value;
    use trellis_observable::bind;

    fn binding(name: Option<&str>) -> Rc<HtmlDirective> {
        let directive = BindingDirective::new(bind(|_, _| "x"));
        let directive = match name {
            Some(name) => directive.with_target_name(name),
            None => directive,
        };
        Rc::new(HtmlDirective::Binding(directive))
    }

    #[test]
    fn test_plain_html_has_no_factories() {
        let result = compile_template("<p>hello</p>", &[]);
        assert!(result.view_behavior_factories.is_empty());
        assert!(result.host_behavior_factories.is_empty());
        assert_eq!(result.target_offset, 0);
        assert_eq!(result.fragment.inner_html(), "<p>hello</p>");
    }

    #[test]
    fn test_text_is_split_per_binding() {
        let html = format!(
            "<p>Hi {} and {}</p>",
            interpolation_placeholder(0),
            interpolation_placeholder(1)
        );
        let result = compile_template(&html, &[binding(None), binding(None)]);
        let p = result.fragment.child_nodes()[1].clone();
        let texts: Vec<_> = p.child_nodes().iter().filter_map(|n| n.data()).collect();
        assert_eq!(texts, vec!["Hi ", " ", " and ", " "]);

        // Walk order: comment(-1), p(0), "Hi "(1), binding(2), " and "(3), binding(4)
        let indexes: Vec<_> = result
            .view_behavior_factories
            .iter()
            .map(|f| f.target_index)
            .collect();
        assert_eq!(indexes, vec![2, 4]);
        assert_eq!(result.target_offset, -1);
    }

    #[test]
    fn test_attribute_bindings_are_removed() {
        let html = format!(
            "<div title=\"{}\"></div><span class=\"a {} b\"></span>",
            interpolation_placeholder(0),
            interpolation_placeholder(1)
        );
        let result = compile_template(&html, &[binding(Some("title")), binding(None)]);
        let children = result.fragment.child_nodes();
        assert!(!children[0].has_attribute("title"));
        assert!(!children[1].has_attribute("class"));

        let factories = &result.view_behavior_factories;
        assert_eq!(factories.len(), 2);
        assert_eq!(factories[0].target_index, 0);
        assert_eq!(factories[1].target_index, 1);
        let aggregate = factories[1].directive.as_binding().unwrap();
        assert_eq!(aggregate.target_name(), Some("class"));
    }

    #[test]
    fn test_host_template_attributes() {
        let html = format!(
            "<template role=\"list\" @click=\"{}\"><li>x</li></template>",
            interpolation_placeholder(0)
        );
        let result = compile_template(&html, &[binding(Some("@click"))]);
        assert_eq!(result.host_behavior_factories.len(), 2);
        assert_eq!(result.fragment.inner_html(), "<!----><li>x</li>");
        assert!(result.view_behavior_factories.is_empty());
    }

    #[test]
    fn test_block_marker_gets_stabilizing_comment() {
        let html = format!("{}<p></p>", block_placeholder(0));
        let repeat = Rc::new(HtmlDirective::Repeat(RepeatDirective::new(
            bind(|_, _| Value::Null),
            bind(|_, _| Value::Null),
            Default::default(),
        )));
        let result = compile_template(&html, &[repeat]);
        assert_eq!(result.target_offset, -1);
        assert_eq!(result.fragment.child_count(), 3);
        assert_eq!(result.view_behavior_factories.len(), 1);
        assert_eq!(result.view_behavior_factories[0].target_index, 0);
    }

    #[test]
    fn test_empty_template_gets_comment() {
        let result = compile_template("", &[]);
        assert_eq!(result.fragment.child_count(), 1);
        assert!(result.fragment.first_child().unwrap().is_comment());
    }

    #[test]
    fn test_context_pool_is_reused() {
        compile_template("<p></p>", &[binding(None)]);
        let pooled = CONTEXT_POOL.with(|pool| pool.borrow().is_some());
        assert!(pooled);
        let result = compile_template(&interpolation_placeholder(0), &[binding(None)]);
        assert_eq!(result.view_behavior_factories.len(), 1);
    }
}
