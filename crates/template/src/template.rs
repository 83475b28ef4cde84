//! View templates and the `html!` macro.

use crate::compiler::{compile_template, CompilationResult, TEMPLATE_WALK};
use crate::directive::{Behavior, BindingDirective, HtmlDirective};
use crate::view::HtmlView;
use regex_lite::Regex;
use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;
use std::sync::OnceLock;
use trellis_core::Value;
use trellis_dom::{Node, TreeWalker};
use trellis_observable::{default_context, Binding};

/// Matches an unfinished attribute at the end of a template string and
/// captures its name, so a binding that follows can target it.
fn last_attribute_name_regex() -> Option<&'static Regex> {
    static REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    REGEX
        .get_or_init(|| {
            Regex::new(
                r#"([ \x09\x0a\x0c\x0d])([^\x00-\x1F\x7F-\x9F "'>=/]+)([ \x09\x0a\x0c\x0d]*=[ \x09\x0a\x0c\x0d]*(?:[^ \x09\x0a\x0c\x0d"'`<>=]*|"[^"]*|'[^']*))$"#,
            )
            .ok()
        })
        .as_ref()
}

/// Returns the attribute a binding placed after `html` would be the value of.
pub fn last_attribute_name(html: &str) -> Option<&str> {
    last_attribute_name_regex()?
        .captures(html)?
        .get(2)
        .map(|name| name.as_str())
}

/// One piece of a template built with [`html!`](crate::html).
#[derive(Clone, Debug)]
pub enum TemplatePart {
    /// Literal template source.
    Html(String),
    /// A value written into the source as text.
    Static(Value),
    /// A binding, targeting the attribute it is the value of or else content.
    Binding(Binding),
    /// A nested template rendered as content.
    Template(Rc<ViewTemplate>),
    Directive(HtmlDirective),
}

impl From<Binding> for TemplatePart {
    fn from(binding: Binding) -> Self {
        TemplatePart::Binding(binding)
    }
}

impl From<Rc<ViewTemplate>> for TemplatePart {
    fn from(template: Rc<ViewTemplate>) -> Self {
        TemplatePart::Template(template)
    }
}

impl From<&Rc<ViewTemplate>> for TemplatePart {
    fn from(template: &Rc<ViewTemplate>) -> Self {
        TemplatePart::Template(template.clone())
    }
}

impl From<HtmlDirective> for TemplatePart {
    fn from(directive: HtmlDirective) -> Self {
        TemplatePart::Directive(directive)
    }
}

impl From<Value> for TemplatePart {
    fn from(value: Value) -> Self {
        TemplatePart::Static(value)
    }
}

impl From<&str> for TemplatePart {
    fn from(text: &str) -> Self {
        TemplatePart::Static(Value::from(text))
    }
}

impl From<String> for TemplatePart {
    fn from(text: String) -> Self {
        TemplatePart::Static(Value::from(text))
    }
}

/// A compiled-on-demand template that creates views.
///
/// The HTML and directives are compiled the first time a view is created;
/// every later view clones the compiled fragment.
pub struct ViewTemplate {
    html: String,
    directives: Vec<Rc<HtmlDirective>>,
    compiled: OnceCell<CompilationResult>,
}

impl ViewTemplate {
    /// Creates a template from HTML that already contains the directives'
    /// placeholders.
    pub fn new(html: impl Into<String>, directives: Vec<HtmlDirective>) -> Rc<Self> {
        Rc::new(Self {
            html: html.into(),
            directives: directives.into_iter().map(Rc::new).collect(),
            compiled: OnceCell::new(),
        })
    }

    /// Builds a template from literal source interleaved with values,
    /// writing a placeholder for every directive.
    pub fn from_parts(parts: Vec<TemplatePart>) -> Rc<Self> {
        let mut html = String::new();
        let mut directives: Vec<HtmlDirective> = Vec::new();
        // Source written since the previous value; bindings target the
        // attribute it leaves open.
        let mut preceding = String::new();

        for part in parts {
            let directive = match part {
                TemplatePart::Html(text) => {
                    html.push_str(&text);
                    preceding.push_str(&text);
                    continue;
                }
                TemplatePart::Static(value) => {
                    html.push_str(&value.to_text());
                    preceding.clear();
                    continue;
                }
                TemplatePart::Binding(binding) => {
                    HtmlDirective::Binding(BindingDirective::new(binding))
                }
                TemplatePart::Template(template) => HtmlDirective::Binding(BindingDirective::new(
                    Binding::constant(template.to_value()),
                )),
                TemplatePart::Directive(directive) => directive,
            };

            let directive = match directive {
                HtmlDirective::Binding(binding) => match last_attribute_name(&preceding) {
                    Some(name) => HtmlDirective::Binding(binding.with_target_name(name)),
                    None => HtmlDirective::Binding(binding),
                },
                other => other,
            };

            html.push_str(&directive.create_placeholder(directives.len()));
            directives.push(directive);
            preceding.clear();
        }

        Self::new(html, directives)
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn directives(&self) -> &[Rc<HtmlDirective>] {
        &self.directives
    }

    /// Wraps the template as a binding value for content composition.
    pub fn to_value(self: &Rc<Self>) -> Value {
        Value::from_rc(self.clone())
    }

    fn compiled(&self) -> &CompilationResult {
        self.compiled
            .get_or_init(|| compile_template(&self.html, &self.directives))
    }

    /// Creates an unbound view. Host behaviors target `host_binding_target`.
    pub fn create(&self, host_binding_target: Option<&Node>) -> Rc<HtmlView> {
        let compiled = self.compiled();
        let fragment = compiled.fragment.clone_node(true);
        let mut behaviors: Vec<Rc<dyn Behavior>> = Vec::with_capacity(
            compiled.view_behavior_factories.len() + compiled.host_behavior_factories.len(),
        );

        let mut walker = TreeWalker::new(&fragment, TEMPLATE_WALK);
        let mut target_index = compiled.target_offset;
        let mut node = walker.next_node();
        for factory in &compiled.view_behavior_factories {
            while let Some(current) = &node {
                if target_index == factory.target_index {
                    behaviors.push(factory.create_behavior(current));
                    break;
                }
                node = walker.next_node();
                target_index += 1;
            }
        }

        if !compiled.host_behavior_factories.is_empty() {
            match host_binding_target {
                Some(host) => {
                    for factory in &compiled.host_behavior_factories {
                        behaviors.push(factory.create_behavior(host));
                    }
                }
                None => tracing::warn!(
                    count = compiled.host_behavior_factories.len(),
                    "no host target; skipping host behaviors"
                ),
            }
        }

        tracing::trace!(behaviors = behaviors.len(), "view created");
        HtmlView::new(fragment, behaviors)
    }

    /// Creates a view, binds it to `source` and appends it to `host`.
    ///
    /// Host behaviors target `host_binding_target`, or `host` when None.
    pub fn render(
        &self,
        source: &Value,
        host: &Node,
        host_binding_target: Option<&Node>,
    ) -> trellis_core::Result<Rc<HtmlView>> {
        let view = self.create(Some(host_binding_target.unwrap_or(host)));
        view.bind(source, &default_context());
        view.append_to(host)?;
        Ok(view)
    }
}

impl fmt::Debug for ViewTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewTemplate")
            .field("html", &self.html)
            .field("directives", &self.directives.len())
            .field("compiled", &self.compiled.get().is_some())
            .finish()
    }
}

/// Builds a [`ViewTemplate`] from string literals and `{ value }` parts.
///
/// A value directly after an attribute's `=` binds that attribute; the
/// sigils `:`, `?` and `@` select a property, a boolean attribute or an
/// event. Anywhere else a binding renders text or a nested template.
///
/// ```rust
/// use trellis_dom::Node;
/// use trellis_observable::{bind, Model, ModelClass, ValueExt};
/// use trellis_template::html;
///
/// let class = ModelClass::with_properties("Person", None, &["name"]);
/// let person = Model::with_fields(&class, [("name", "Ada")]).to_value();
///
/// let template = html!("<p title=\"" { bind(|x, _| x.prop("name")) } "\">Hi "
///     { bind(|x, _| x.prop("name")) } "</p>");
///
/// let host = Node::element("div");
/// template.render(&person, &host, None).unwrap();
/// assert_eq!(host.inner_html(), "<!----><p title=\"Ada\">Hi Ada</p>");
/// ```
#[macro_export]
macro_rules! html {
    ($($part:tt)*) => {{
        #[allow(unused_mut)]
        let mut parts: ::std::vec::Vec<$crate::TemplatePart> = ::std::vec::Vec::new();
        $crate::__html_parts!(parts; $($part)*);
        $crate::ViewTemplate::from_parts(parts)
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __html_parts {
    ($parts:ident;) => {};
    ($parts:ident; $html:literal $($rest:tt)*) => {
        $parts.push($crate::TemplatePart::Html(::std::string::String::from($html)));
        $crate::__html_parts!($parts; $($rest)*);
    };
    ($parts:ident; { $value:expr } $($rest:tt)*) => {
        $parts.push($crate::TemplatePart::from($value));
        $crate::__html_parts!($parts; $($rest)*);
    };
}
