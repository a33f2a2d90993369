//! Conversions from posts and query results into [`gtmpl::Value`]s for the
//! templates. Metadata strings are HTML-escaped here because the templates
//! print values verbatim; only `content` (already rendered Markdown) is
//! passed through raw. Numbers are handed over as strings.

use gtmpl::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::markdown::escape;
use crate::post::Post;
use crate::query::Pagination;

/// The number of tags shown on a post card.
pub const CARD_TAG_COUNT: usize = 3;

/// The number of post links previewed on a category card.
pub const PREVIEW_COUNT: usize = 3;

/// Builds a [`Value::Object`] from key/value pairs.
pub fn object<'a>(fields: impl IntoIterator<Item = (&'a str, Value)>) -> Value {
    let m: HashMap<String, Value> = fields
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect();
    Value::Object(m)
}

/// An escaped string value.
pub fn text(s: &str) -> Value {
    Value::String(escape(s))
}

/// The path of the `page`th blog list page. Page one is `/blog` itself.
pub fn list_page_url(page: i64) -> String {
    match page {
        1 => String::from("/blog"),
        _ => format!("/blog/page/{}", page),
    }
}

pub fn category_url(category: &str) -> String {
    format!("/category/{}", urlencoding::encode(category))
}

pub fn tag_url(tag: &str) -> String {
    format!("/tag/{}", urlencoding::encode(tag))
}

/// The font size, in `rem`, of a tag in the tag cloud.
pub fn tag_size(count: usize) -> f64 {
    (count as f64 / 3.0).max(0.8).min(2.0)
}

fn tag(name: &str) -> Value {
    object([("name", text(name)), ("url", text(&tag_url(name)))])
}

fn category_fields(post: &Post) -> [(&'static str, Value); 3] {
    let category = post.category.as_deref().unwrap_or("");
    [
        ("has_category", Value::Bool(post.category.is_some())),
        ("category", text(category)),
        ("category_url", text(&category_url(category))),
    ]
}

/// The full post, as the post page sees it.
pub fn post(post: &Post, date_format: &str) -> Value {
    let mut fields = vec![
        ("title", text(&post.title)),
        ("slug", text(&post.slug)),
        ("url", text(&post.url())),
        ("date", text(&post.formatted_date(date_format))),
        ("date_iso", text(&post.iso_date())),
        ("excerpt", text(&post.excerpt)),
        ("has_tags", Value::Bool(!post.tags.is_empty())),
        ("tags", Value::Array(post.tags.iter().map(|t| tag(t)).collect())),
        ("reading_time", Value::String(post.reading_time.to_string())),
        ("content", Value::String(post.rendered_content.clone())),
    ];
    fields.extend(category_fields(post));
    object(fields)
}

/// The short form of a post used on list cards: no body, at most
/// [`CARD_TAG_COUNT`] tags.
pub fn summary(post: &Post, date_format: &str) -> Value {
    let tags: Vec<Value> = post.tags.iter().take(CARD_TAG_COUNT).map(|t| tag(t)).collect();
    let mut fields = vec![
        ("title", text(&post.title)),
        ("url", text(&post.url())),
        ("date", text(&post.formatted_date(date_format))),
        ("date_iso", text(&post.iso_date())),
        ("excerpt", text(&post.excerpt)),
        ("has_tags", Value::Bool(!tags.is_empty())),
        ("tags", Value::Array(tags)),
        ("reading_time", Value::String(post.reading_time.to_string())),
    ];
    fields.extend(category_fields(post));
    object(fields)
}

pub fn summaries(posts: &[Arc<Post>], date_format: &str) -> Value {
    Value::Array(posts.iter().map(|p| summary(p, date_format)).collect())
}

/// A category or tag on an overview page. `previews` are the first posts
/// filed under it.
pub fn term(name: &str, url: &str, count: usize, previews: &[Arc<Post>]) -> Value {
    let previews: Vec<Value> = previews
        .iter()
        .take(PREVIEW_COUNT)
        .map(|p| object([("title", text(&p.title)), ("url", text(&p.url()))]))
        .collect();
    object([
        ("name", text(name)),
        ("url", text(url)),
        ("count", Value::String(count.to_string())),
        ("size", Value::String(tag_size(count).to_string())),
        ("previews", Value::Array(previews)),
    ])
}

/// The pager below a list. `url_for` maps a page number to its path.
pub fn pagination<T>(page: &Pagination<'_, T>, url_for: impl Fn(i64) -> String) -> Value {
    let current = page.current_page;
    object([
        ("current", Value::String(current.to_string())),
        ("total", Value::String(page.total_pages.to_string())),
        ("has_prev", Value::Bool(page.has_prev)),
        ("has_next", Value::Bool(page.has_next)),
        ("prev_url", text(&url_for(current.saturating_sub(1)))),
        ("next_url", text(&url_for(current.saturating_add(1)))),
    ])
}
