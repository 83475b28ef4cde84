//! Directives placed in templates and the behaviors they create.
//!
//! A directive is a compile-time description: it knows how to write a
//! placeholder into the template source and how to create a [`Behavior`]
//! for the node the placeholder resolved to. Behaviors are per-view and
//! carry the runtime state.

use crate::binding::BindingBehavior;
use crate::markers;
use crate::repeat::RepeatDirective;
use std::fmt;
use std::rc::Rc;
use trellis_core::Value;
use trellis_dom::Node;
use trellis_observable::{Binding, ExecutionContext};

/// Per-view runtime attached to one target node.
pub trait Behavior {
    /// Connects the behavior to a source.
    fn bind(&self, source: &Value, context: &Rc<ExecutionContext>);

    /// Disconnects the behavior from the source it was bound to.
    fn unbind(&self, source: &Value);
}

/// Creates an attached behavior for a target element and the directive's options.
pub type AttachedBehaviorFactory = dyn Fn(&Node, &Value) -> Rc<dyn Behavior>;

/// What a binding writes to, derived from its attribute name.
///
/// `:name` is a property, `?name` a boolean attribute, `@name` an event,
/// `class` the class list, any other name an attribute. A binding that is
/// not in an attribute writes text or a nested view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindingTarget {
    Content,
    Attribute(Rc<str>),
    BooleanAttribute(Rc<str>),
    Property(Rc<str>),
    Event(Rc<str>),
    Class,
}

impl BindingTarget {
    pub fn parse(name: &str) -> Self {
        let mut chars = name.chars();
        match chars.next() {
            Some(':') => BindingTarget::Property(Rc::from(chars.as_str())),
            Some('?') => BindingTarget::BooleanAttribute(Rc::from(chars.as_str())),
            Some('@') => BindingTarget::Event(Rc::from(chars.as_str())),
            _ if name == "class" => BindingTarget::Class,
            _ => BindingTarget::Attribute(Rc::from(name)),
        }
    }

    /// The target name without its sigil.
    pub fn name(&self) -> Option<&str> {
        match self {
            BindingTarget::Content => None,
            BindingTarget::Class => Some("class"),
            BindingTarget::Attribute(name)
            | BindingTarget::BooleanAttribute(name)
            | BindingTarget::Property(name)
            | BindingTarget::Event(name) => Some(name),
        }
    }
}

/// A directive that evaluates a binding and writes the result to its target.
#[derive(Clone, Debug)]
pub struct BindingDirective {
    binding: Binding,
    target: BindingTarget,
    target_name: Option<Rc<str>>,
}

impl BindingDirective {
    /// Creates a directive with no target name yet. It targets content
    /// until [`with_target_name`](Self::with_target_name) is applied.
    pub fn new(binding: Binding) -> Self {
        Self {
            binding,
            target: BindingTarget::Content,
            target_name: None,
        }
    }

    pub fn with_target_name(mut self, name: &str) -> Self {
        self.target = BindingTarget::parse(name);
        self.target_name = Some(Rc::from(name));
        self
    }

    /// Returns a copy that writes to a text node.
    pub fn at_content(&self) -> Self {
        Self {
            binding: self.binding.clone(),
            target: BindingTarget::Content,
            target_name: self.target_name.clone(),
        }
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn target(&self) -> &BindingTarget {
        &self.target
    }

    /// The name as written in the template, sigil included.
    pub fn target_name(&self) -> Option<&str> {
        self.target_name.as_deref()
    }
}

/// A directive that attaches a custom behavior to an element through a
/// placeholder attribute.
#[derive(Clone)]
pub struct AttachedBehaviorDirective {
    name: Rc<str>,
    options: Value,
    factory: Rc<AttachedBehaviorFactory>,
}

impl AttachedBehaviorDirective {
    pub fn new<F>(name: &str, options: Value, factory: F) -> Self
    where
        F: Fn(&Node, &Value) -> Rc<dyn Behavior> + 'static,
    {
        Self {
            name: Rc::from(name.to_ascii_lowercase()),
            options,
            factory: Rc::new(factory),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &Value {
        &self.options
    }
}

impl fmt::Debug for AttachedBehaviorDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachedBehaviorDirective")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Any directive a template can hold.
#[derive(Clone, Debug)]
pub enum HtmlDirective {
    Binding(BindingDirective),
    Attached(AttachedBehaviorDirective),
    Repeat(RepeatDirective),
}

impl HtmlDirective {
    /// Writes the placeholder for the directive at `index`.
    pub fn create_placeholder(&self, index: usize) -> String {
        match self {
            HtmlDirective::Binding(_) => markers::interpolation_placeholder(index),
            HtmlDirective::Attached(directive) => {
                markers::custom_attribute_placeholder(directive.name(), index)
            }
            HtmlDirective::Repeat(_) => markers::block_placeholder(index),
        }
    }

    /// Creates the behavior for the node the placeholder resolved to.
    pub fn create_behavior(&self, target: &Node) -> Rc<dyn Behavior> {
        match self {
            HtmlDirective::Binding(directive) => BindingBehavior::new(target, directive),
            HtmlDirective::Attached(directive) => (directive.factory)(target, &directive.options),
            HtmlDirective::Repeat(directive) => directive.create_behavior(target),
        }
    }

    pub fn as_binding(&self) -> Option<&BindingDirective> {
        match self {
            HtmlDirective::Binding(directive) => Some(directive),
            _ => None,
        }
    }
}

impl From<BindingDirective> for HtmlDirective {
    fn from(directive: BindingDirective) -> Self {
        HtmlDirective::Binding(directive)
    }
}

impl From<AttachedBehaviorDirective> for HtmlDirective {
    fn from(directive: AttachedBehaviorDirective) -> Self {
        HtmlDirective::Attached(directive)
    }
}

impl From<RepeatDirective> for HtmlDirective {
    fn from(directive: RepeatDirective) -> Self {
        HtmlDirective::Repeat(directive)
    }
}

/// A directive paired with the walk index of the node it targets.
///
/// Index -1 is the stabilizing comment inserted ahead of the first node;
/// host factories ignore the index.
#[derive(Clone, Debug)]
pub struct BehaviorFactory {
    pub target_index: isize,
    pub directive: Rc<HtmlDirective>,
}

impl BehaviorFactory {
    pub fn create_behavior(&self, target: &Node) -> Rc<dyn Behavior> {
        self.directive.create_behavior(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_sigils() {
        assert_eq!(
            BindingTarget::parse(":innerHTML"),
            BindingTarget::Property(Rc::from("innerHTML"))
        );
        assert_eq!(
            BindingTarget::parse("?disabled"),
            BindingTarget::BooleanAttribute(Rc::from("disabled"))
        );
        assert_eq!(
            BindingTarget::parse("@click"),
            BindingTarget::Event(Rc::from("click"))
        );
        assert_eq!(BindingTarget::parse("class"), BindingTarget::Class);
        assert_eq!(
            BindingTarget::parse("title"),
            BindingTarget::Attribute(Rc::from("title"))
        );
        assert_eq!(BindingTarget::parse("@click").name(), Some("click"));
        assert_eq!(BindingTarget::Content.name(), None);
    }

    #[test]
    fn test_binding_directive_targets() {
        let directive = BindingDirective::new(Binding::constant("x"));
        assert_eq!(directive.target(), &BindingTarget::Content);
        assert_eq!(directive.target_name(), None);

        let directive = directive.with_target_name("?hidden");
        assert_eq!(directive.target_name(), Some("?hidden"));
        assert_eq!(
            directive.target(),
            &BindingTarget::BooleanAttribute(Rc::from("hidden"))
        );

        let content = directive.at_content();
        assert_eq!(content.target(), &BindingTarget::Content);
    }

    #[test]
    fn test_placeholders_by_kind() {
        let m = markers::marker();
        let binding = HtmlDirective::from(BindingDirective::new(Binding::constant(1)));
        assert_eq!(binding.create_placeholder(2), format!("{m}{{2}}"));

        struct Inert;
        impl Behavior for Inert {
            fn bind(&self, _source: &Value, _context: &Rc<ExecutionContext>) {}
            fn unbind(&self, _source: &Value) {}
        }
        let attached = HtmlDirective::from(AttachedBehaviorDirective::new(
            "My-Behavior",
            Value::Null,
            |_, _| Rc::new(Inert) as Rc<dyn Behavior>,
        ));
        assert_eq!(
            attached.create_placeholder(0),
            format!("my-behavior=\"{m}{{0}}\"")
        );
    }
}
