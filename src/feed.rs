//! Support for creating Atom feeds from a list of posts.

use crate::config::Author;
use crate::post::Post;
use atom_syndication::{Entry, Error as AtomError, Feed, FixedDateTime, Link, Person};
use chrono::{NaiveDateTime, TimeZone, Utc};
use std::sync::Arc;
use url::Url;

/// Bundled configuration for creating a feed.
pub struct FeedConfig {
    pub title: String,
    pub description: String,
    pub author: Option<Author>,
    pub site_url: Url,
}

/// Creates the feed for `posts` (newest first) and serializes it.
pub fn feed_xml(config: &FeedConfig, posts: &[Arc<Post>]) -> Result<Vec<u8>> {
    Ok(feed(config, posts)?.write_to(Vec::new())?)
}

/// Builds a feed from some configuration ([`FeedConfig`]) and a list of
/// [`Post`]s. The feed's `updated` stamp is the newest post's date, so the
/// output only changes when the posts do.
pub fn feed(config: &FeedConfig, posts: &[Arc<Post>]) -> Result<Feed> {
    let updated = match posts.first() {
        Some(post) => utc(&post.date),
        None => Utc::now().into(),
    };

    Ok(Feed {
        entries: feed_entries(config, posts)?,
        title: config.title.clone().into(),
        subtitle: match config.description.is_empty() {
            true => None,
            false => Some(config.description.clone().into()),
        },
        id: config.site_url.to_string(),
        updated,
        authors: author_to_people(&config.author),
        links: vec![alternate(config.site_url.to_string())],
        ..Default::default()
    })
}

fn feed_entries(config: &FeedConfig, posts: &[Arc<Post>]) -> Result<Vec<Entry>> {
    let mut entries: Vec<Entry> = Vec::with_capacity(posts.len());

    for post in posts {
        let url = config.site_url.join(&format!("blog/{}", post.slug))?;
        let date = utc(&post.date);

        entries.push(Entry {
            id: url.to_string(),
            title: post.title.clone().into(),
            updated: date,
            published: Some(date),
            authors: author_to_people(&config.author),
            links: vec![alternate(url.to_string())],
            summary: match post.excerpt.is_empty() {
                true => None,
                false => Some(post.excerpt.clone().into()),
            },
            ..Default::default()
        })
    }
    Ok(entries)
}

// Post dates are stored normalised to UTC.
fn utc(date: &NaiveDateTime) -> FixedDateTime {
    Utc.from_utc_datetime(date).into()
}

fn alternate(href: String) -> Link {
    Link {
        href,
        rel: "alternate".to_owned(),
        ..Default::default()
    }
}

fn author_to_people(author: &Option<Author>) -> Vec<Person> {
    match author {
        Some(author) => vec![Person {
            name: author.name.clone(),
            email: author.email.clone(),
            uri: None,
        }],
        None => Vec::new(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem creating a feed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when the feed can't be serialized.
    #[error("writing feed: {0}")]
    Atom(#[from] AtomError),

    /// Returned when a post URL can't be built on top of the site URL.
    #[error("building post URL: {0}")]
    Url(#[from] url::ParseError),
}

#[cfg(test)]
mod test {
    use super::*;

    fn config() -> FeedConfig {
        FeedConfig {
            title: String::from("Test Blog"),
            description: String::new(),
            author: Some(Author {
                name: String::from("Alice"),
                email: None,
            }),
            site_url: Url::parse("https://example.org/").unwrap(),
        }
    }

    fn post(slug: &str, date: &str, excerpt: &str) -> Arc<Post> {
        Arc::new(
            Post::parse(
                "x.md",
                &format!("---\ntitle: T {slug}\nslug: {slug}\ndate: {date}\nexcerpt: \"{excerpt}\"\n---\nbody\n"),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_feed_entries() {
        let posts = vec![post("b", "2024-02-01", "second"), post("a", "2024-01-01", "")];
        let feed = feed(&config(), &posts).unwrap();

        assert_eq!(2, feed.entries.len());
        assert_eq!("https://example.org/blog/b", feed.entries[0].id);
        assert_eq!("2024-02-01T00:00:00+00:00", feed.updated.to_rfc3339());
        assert_eq!(feed.updated, feed.entries[0].updated);
        assert!(feed.entries[0].summary.is_some());
        assert!(feed.entries[1].summary.is_none());
        assert_eq!("Alice", feed.authors[0].name);
        assert_eq!("alternate", feed.entries[1].links[0].rel);
    }

    #[test]
    fn test_feed_xml() {
        let xml = feed_xml(&config(), &[post("a", "2024-01-01", "first post")]).unwrap();
        let xml = String::from_utf8(xml).unwrap();
        assert!(xml.contains("<feed"), "{}", xml);
        assert!(xml.contains(">first post</summary>"), "{}", xml);
        assert!(xml.contains("https://example.org/blog/a"), "{}", xml);
    }
}
