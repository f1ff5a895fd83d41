//! HTML templates for the chat page, rendered with Handlebars. Values
//! are HTML escaped by default which matters here since the page
//! displays model output verbatim.

use std::fmt;

use handlebars::Handlebars;

#[derive(Debug)]
pub enum Page {
    Index,
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

const INDEX_PAGE: &str = include_str!("templates/index.hbs");

pub fn templates() -> Handlebars<'static> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    registry
        .register_template_string(&Page::Index.to_string(), INDEX_PAGE)
        .expect("Failed to register template");
    registry
}
