//! Markdown rendering module.
//!
//! Post bodies are stored as raw markdown and rendered to HTML at read time.
//! The transform is pure and deterministic, so views can be rebuilt at any
//! point from the stored body.

use pulldown_cmark::{html, Options, Parser};

/// Render markdown to an HTML fragment.
pub fn markdown_to_html(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);

    let parser = Parser::new_ext(text, options);
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}
