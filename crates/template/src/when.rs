//! Conditional rendering.

use crate::template::ViewTemplate;
use std::rc::Rc;
use trellis_core::Value;
use trellis_observable::Binding;

/// A binding that yields `template` while `condition` is truthy and Null
/// otherwise. Placed as content, it composes and removes the view.
///
/// The result is volatile: the dependencies read depend on the branch.
pub fn when(condition: Binding, template: &Rc<ViewTemplate>) -> Binding {
    let template = template.to_value();
    Binding::volatile(move |source, context| {
        if condition.evaluate(source, context).is_truthy() {
            template.clone()
        } else {
            Value::Null
        }
    })
}

/// Like [`when`], with the template chosen by a binding.
pub fn when_with(condition: Binding, template: Binding) -> Binding {
    Binding::volatile(move |source, context| {
        if condition.evaluate(source, context).is_truthy() {
            template.evaluate(source, context)
        } else {
            Value::Null
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html;
    use trellis_dom::Node;
    use trellis_observable::{bind, process_updates, Model, ModelClass, ValueExt};

    #[test]
    fn test_when_toggles_view() {
        let class = ModelClass::with_properties("Toggle", None, &["shown", "label"]);
        let source = Model::with_fields(
            &class,
            [("shown", Value::from(true)), ("label", Value::from("on"))],
        )
        .to_value();

        let inner = html!("<em>" { bind(|x, _| x.prop("label")) } "</em>");
        let condition = when(bind(|x, _| x.prop("shown")), &inner);
        assert!(condition.is_volatile());

        let outer = html!("<p>" { condition } "</p>");
        let host = Node::element("div");
        outer.render(&source, &host, None).unwrap();
        assert_eq!(host.inner_html(), "<!----><p><!----><em>on</em></p>");

        source.set_prop("shown", false);
        process_updates();
        assert_eq!(host.inner_html(), "<!----><p></p>");

        source.set_prop("shown", true);
        source.set_prop("label", "again");
        process_updates();
        assert_eq!(host.inner_html(), "<!----><p><!----><em>again</em></p>");
    }

    #[test]
    fn test_when_with_binding() {
        let yes = html!("<b>yes</b>");
        let yes_value = yes.to_value();
        let binding = when_with(bind(|x, _| x.clone()), bind(move |_, _| yes_value.clone()));
        let context = trellis_observable::default_context();
        assert!(binding.evaluate(&Value::from(1), &context).same(&yes.to_value()));
        assert!(binding.evaluate(&Value::from(0), &context).is_null());
    }
}
