#![forbid(unsafe_code)]

//! Trellis Template - HTML templates compiled into reactive views.
//!
//! This crate provides the rendering half of Trellis:
//!
//! - `html!` / `ViewTemplate`: Template source with directives in place of
//!   dynamic values, compiled once and cloned per view
//! - `HtmlView`: The nodes and behaviors of one template instance
//! - `BindingBehavior`: Attribute, boolean attribute, property, class, event
//!   and content targets kept in sync through binding observers
//! - `when` / `repeat` / `element_ref`: Conditional content, arrays and
//!   element references
//!
//! # Example
//!
//! ```rust
//! use trellis_dom::Node;
//! use trellis_observable::{bind, process_updates, Model, ModelClass, ValueExt};
//! use trellis_template::html;
//!
//! let class = ModelClass::with_properties("Person", None, &["name"]);
//! let person = Model::with_fields(&class, [("name", "Ada")]).to_value();
//!
//! let template = html!("<span>" { bind(|x, _| x.prop("name")) } "</span>");
//! let host = Node::element("div");
//! template.render(&person, &host, None).unwrap();
//! assert_eq!(host.text_content(), "Ada");
//!
//! person.set_prop("name", "Grace");
//! process_updates();
//! assert_eq!(host.text_content(), "Grace");
//! ```

mod binding;
mod compiler;
mod directive;
mod markers;
mod policy;
mod reference;
mod repeat;
mod template;
mod view;
mod when;

pub use binding::BindingBehavior;
pub use compiler::{compile_template, CompilationResult};
pub use directive::{
    AttachedBehaviorDirective, AttachedBehaviorFactory, Behavior, BehaviorFactory,
    BindingDirective, BindingTarget, HtmlDirective,
};
pub use markers::{
    block_placeholder, custom_attribute_placeholder, interpolation_placeholder, marker,
};
pub use policy::{create_html, set_html_policy, HtmlPolicy};
pub use reference::{element_ref, RefBehavior, REF_ATTRIBUTE};
pub use repeat::{repeat, repeat_with, RepeatBehavior, RepeatDirective, RepeatOptions};
pub use template::{last_attribute_name, TemplatePart, ViewTemplate};
pub use view::HtmlView;
pub use when::{when, when_with};

pub use trellis_core::{Error, Result, Value};
