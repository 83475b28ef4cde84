//! The HTML policy applied to template source and `:innerHTML` bindings.

use std::cell::RefCell;
use std::rc::Rc;
use trellis_core::{Error, Result};

/// Transforms HTML strings before they are parsed into the tree.
pub trait HtmlPolicy {
    fn create_html(&self, html: &str) -> String;
}

impl<F> HtmlPolicy for F
where
    F: Fn(&str) -> String,
{
    fn create_html(&self, html: &str) -> String {
        self(html)
    }
}

thread_local! {
    static POLICY: RefCell<Option<Rc<dyn HtmlPolicy>>> = const { RefCell::new(None) };
}

/// Installs the HTML policy. It can only be set once per thread.
pub fn set_html_policy(policy: Rc<dyn HtmlPolicy>) -> Result<()> {
    POLICY.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_some() {
            return Err(Error::PolicyAlreadySet);
        }
        tracing::debug!("html policy installed");
        *slot = Some(policy);
        Ok(())
    })
}

/// Runs `html` through the installed policy, or returns it unchanged.
pub fn create_html(html: &str) -> String {
    let policy = POLICY.with(|slot| slot.borrow().clone());
    match policy {
        Some(policy) => policy.create_html(html),
        None => html.to_string(),
    }
}
