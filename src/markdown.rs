//! Markdown to HTML conversion for post bodies, plus the HTML escaping used
//! when post metadata is dropped into templates.

use pulldown_cmark::escape::escape_html;
use pulldown_cmark::{html, Event, Options, Parser};

/// Converts a GitHub-flavoured Markdown `markdown` body into HTML. Tables,
/// strikethrough, task lists and footnotes are enabled, and every single
/// line break inside a paragraph becomes a `<br />`.
pub fn to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);

    let events = Parser::new_ext(markdown, options).map(convert);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events);
    out
}

fn convert(ev: Event<'_>) -> Event<'_> {
    match ev {
        Event::SoftBreak => Event::HardBreak,
        _ => ev,
    }
}

/// Escapes `text` for use in HTML text or a double-quoted attribute.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // writing into a `String` can't fail
    let _ = escape_html(&mut out, text);
    out
}
