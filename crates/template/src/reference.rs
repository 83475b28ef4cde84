//! Element references.

use crate::directive::{AttachedBehaviorDirective, Behavior, HtmlDirective};
use std::rc::Rc;
use trellis_core::Value;
use trellis_dom::Node;
use trellis_observable::{ExecutionContext, ValueExt};

/// Attribute name of the reference placeholder.
pub const REF_ATTRIBUTE: &str = "fast-ref";

/// Assigns its target element to a property of the source on bind.
pub struct RefBehavior {
    target: Node,
    property: String,
}

impl RefBehavior {
    pub fn new(target: &Node, property: &str) -> Self {
        Self {
            target: target.clone(),
            property: property.to_string(),
        }
    }
}

impl Behavior for RefBehavior {
    fn bind(&self, source: &Value, _context: &Rc<ExecutionContext>) {
        source.set_prop(&self.property, Value::object(self.target.clone()));
    }

    fn unbind(&self, _source: &Value) {}
}

/// A directive that stores the element it is placed on into `property`.
///
/// Use it inside a start tag: `html!("<input " { element_ref("input") } ">")`.
pub fn element_ref(property: &str) -> HtmlDirective {
    HtmlDirective::Attached(AttachedBehaviorDirective::new(
        REF_ATTRIBUTE,
        Value::from(property),
        |target, options| Rc::new(RefBehavior::new(target, &options.to_text())) as Rc<dyn Behavior>,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html;
    use trellis_observable::{Model, ModelClass};

    #[test]
    fn test_ref_assigns_element() {
        let class = ModelClass::with_properties("Form", None, &["input"]);
        let form = Model::new(&class).to_value();

        let template = html!("<label><input " { element_ref("input") } "></label>");
        let host = Node::element("div");
        template.render(&form, &host, None).unwrap();

        let input = form.prop("input");
        let node = input.downcast_ref::<Node>().unwrap();
        assert_eq!(node.tag_name(), Some("input"));
        assert!(!node.has_attribute(REF_ATTRIBUTE));
        assert!(host.contains(node));
    }
}
