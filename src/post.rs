//! Defines the [`Post`] type and the logic for turning a single source
//! document into one. A source document looks like this:
//!
//! ```md
//! ---
//! title: Hello, world!
//! slug: hello-world
//! date: 2024-04-16
//! category: Notes
//! tags: [greet, intro]
//! excerpt: A first post.
//! ---
//! # Hello
//!
//! World
//! ```
//!
//! `title`, `slug` and `date` are required; everything else has a default.
//! Parsing does no I/O: the caller hands over the file name and contents.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;

use crate::markdown;

/// The pattern used by [`Post::formatted_date`] callers that don't care,
/// i.e. `2024年4月16日`.
pub const DEFAULT_DATE_FORMAT: &str = "%Y年%-m月%-d日";

const WORDS_PER_MINUTE: usize = 200;

/// A published article. Built once per source file by [`Post::parse`] and
/// never modified afterwards; the repository shares posts behind `Arc`s.
#[derive(Clone, Debug, PartialEq)]
pub struct Post {
    /// The URL-safe identifier of the post. Unique within a snapshot.
    pub slug: String,

    /// The title of the post.
    pub title: String,

    /// The publication date. Date-only values are midnight; values with an
    /// offset are normalised to UTC.
    pub date: NaiveDateTime,

    /// The category, if any. Empty strings in the frontmatter become `None`.
    pub category: Option<String>,

    /// Tags in authoring order. Duplicates are kept.
    pub tags: Vec<String>,

    /// The author-supplied summary.
    pub excerpt: String,

    /// The Markdown body as it appears in the source file.
    pub raw_content: String,

    /// The HTML rendered from [`Post::raw_content`].
    pub rendered_content: String,

    /// Estimated reading time in whole minutes, never below one.
    pub reading_time: usize,

    /// Name of the file the post was read from.
    pub source_filename: String,
}

/// The typed frontmatter block. Optional fields accept both a missing key
/// and an explicit `null`.
#[derive(Deserialize, Debug, Clone)]
pub struct Frontmatter {
    pub title: String,
    pub slug: String,
    pub date: String,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub tags: Option<Vec<String>>,

    #[serde(default)]
    pub excerpt: Option<String>,
}

impl Post {
    /// Parses a post from the contents of a source file. `source_filename`
    /// is only recorded for reference.
    pub fn parse(source_filename: &str, input: &str) -> Result<Post> {
        let (yaml, body) = split_frontmatter(input)?;
        let frontmatter: Frontmatter = serde_yaml::from_str(yaml)?;
        Post::from_parts(frontmatter, body, source_filename)
    }

    /// Builds a post from already separated frontmatter and body.
    pub fn from_parts(
        frontmatter: Frontmatter,
        body: &str,
        source_filename: &str,
    ) -> Result<Post> {
        validate_slug(&frontmatter.slug)?;
        Ok(Post {
            date: parse_date(&frontmatter.date)?,
            slug: frontmatter.slug,
            title: frontmatter.title,
            category: frontmatter.category.filter(|c| !c.is_empty()),
            tags: frontmatter.tags.unwrap_or_default(),
            excerpt: frontmatter.excerpt.unwrap_or_default(),
            rendered_content: markdown::to_html(body),
            reading_time: reading_time(body),
            raw_content: body.to_owned(),
            source_filename: source_filename.to_owned(),
        })
    }

    /// The canonical path of the post page.
    pub fn url(&self) -> String {
        format!("/blog/{}", self.slug)
    }

    /// Renders the date with a strftime-style `pattern`, e.g.
    /// [`DEFAULT_DATE_FORMAT`].
    pub fn formatted_date(&self, pattern: &str) -> String {
        self.date.format(pattern).to_string()
    }

    /// The date as `YYYY-MM-DD`, for `datetime` attributes.
    pub fn iso_date(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// Splits a source document into its YAML frontmatter and Markdown body. The
/// frontmatter must be fenced by `---` lines, the first of which opens the
/// file.
fn split_frontmatter(input: &str) -> Result<(&str, &str)> {
    const FENCE: &str = "---";

    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let mut lines = input.split_inclusive('\n');
    let opening = match lines.next() {
        Some(line) if line.trim_end() == FENCE => line,
        _ => return Err(Error::FrontmatterMissingStartFence),
    };

    let yaml_start = opening.len();
    let mut offset = yaml_start;
    for line in lines {
        if line.trim_end() == FENCE {
            return Ok((&input[yaml_start..offset], &input[offset + line.len()..]));
        }
        offset += line.len();
    }
    Err(Error::FrontmatterMissingEndFence)
}

/// Parses an ISO-8601 date (`2024-01-01`), a naive datetime
/// (`2024-01-01T09:30:00`) or a datetime with an offset or `Z`, seconds
/// optional (`2024-01-01T09:30+09:00`).
pub fn parse_date(input: &str) -> Result<NaiveDateTime> {
    let s = input.trim();
    if let Ok(date_time) = DateTime::parse_from_rfc3339(s) {
        return Ok(date_time.naive_utc());
    }
    if let Ok(date_time) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M%:z") {
        return Ok(date_time.naive_utc());
    }
    if let Some(utc) = s.strip_suffix(|c| c == 'Z' || c == 'z') {
        if let Ok(date_time) = NaiveDateTime::parse_from_str(utc, "%Y-%m-%dT%H:%M") {
            return Ok(date_time);
        }
    }
    for pattern in &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(date_time) = NaiveDateTime::parse_from_str(s, pattern) {
            return Ok(date_time);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| Error::InvalidDate(input.to_owned()))
}

fn validate_slug(slug: &str) -> Result<()> {
    let invalid = slug.is_empty()
        || slug == "."
        || slug == ".."
        || slug.contains(|c: char| matches!(c, '/' | '\\' | '?' | '#') || c.is_whitespace());
    match invalid {
        true => Err(Error::InvalidSlug(slug.to_owned())),
        false => Ok(()),
    }
}

/// Minutes needed to read `body` at 200 words per minute, rounded up.
pub fn reading_time(body: &str) -> usize {
    let words = body.split_whitespace().count();
    ((words + WORDS_PER_MINUTE - 1) / WORDS_PER_MINUTE).max(1)
}

/// Represents the result of a [`Post`]-parse operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error parsing a [`Post`] from a source document.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when a source file doesn't open with a `---` line.
    #[error("post must begin with `---`")]
    FrontmatterMissingStartFence,

    /// Returned when the opening fence was found but the closing one wasn't.
    #[error("missing closing `---`")]
    FrontmatterMissingEndFence,

    /// Returned when the frontmatter isn't valid YAML or lacks a required
    /// field.
    #[error("frontmatter: {0}")]
    DeserializeYaml(#[from] serde_yaml::Error),

    /// Returned when the `date` field isn't an ISO-8601 date or datetime.
    #[error("invalid date `{0}`")]
    InvalidDate(String),

    /// Returned when the `slug` can't be used as a single URL path segment.
    #[error("invalid slug `{0}`")]
    InvalidSlug(String),
}
