//! Route resolution and response building, independent of any HTTP server.
//! [`crate::serve`] feeds request targets in here; [`crate::export`] walks
//! every route and writes the bodies to disk.

use serde::Serialize;
use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::feed::{self, FeedConfig};
use crate::post::Post;
use crate::query;
use crate::render::{self, Renderer, Templates};
use crate::repository::PostRepository;

/// The stylesheet served when the static directory doesn't provide one.
pub const DEFAULT_STYLESHEET: &str = include_str!("../static/style.css");

pub const HTML: &str = "text/html; charset=utf-8";
pub const JSON: &str = "application/json; charset=utf-8";
pub const ATOM: &str = "application/atom+xml; charset=utf-8";
pub const TEXT: &str = "text/plain; charset=utf-8";

const POST_NOT_FOUND: &str = "記事が見つかりません";
const PAGE_NOT_FOUND: &str = "ページが見つかりません";

/// A resolved request target.
#[derive(Clone, Debug, PartialEq)]
pub enum Route {
    Home,

    /// The paginated list of all posts.
    Blog { page: i64 },

    /// A single post, by slug.
    Post(String),
    Category(String),
    Tag(String),
    Categories,
    Tags,

    /// Search results; an empty query renders the search form alone.
    Search(String),
    ApiPosts,
    Feed,

    /// A file below the static directory, as a `/`-separated relative path.
    Static(String),
    NotFound,
}

impl Route {
    /// Resolves a request target such as `/tag/web?x=1`. Path segments are
    /// percent-decoded individually, so `%2F` inside a tag name doesn't
    /// split it.
    pub fn parse(target: &str) -> Route {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };

        let mut segments: Vec<String> = Vec::new();
        for raw in path.split('/').filter(|s| !s.is_empty()) {
            match urlencoding::decode(raw) {
                Ok(segment) => segments.push(segment.into_owned()),
                Err(_) => return Route::NotFound,
            }
        }

        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        match segments.as_slice() {
            [] => Route::Home,
            ["blog"] => Route::Blog {
                page: query_param(query, "page")
                    .and_then(|p| p.trim().parse().ok())
                    .unwrap_or(1),
            },
            ["blog", "page", n] => match n.parse() {
                Ok(page) => Route::Blog { page },
                Err(_) => Route::NotFound,
            },
            ["blog", slug] => Route::Post(slug.to_string()),
            ["category", name] => Route::Category(name.to_string()),
            ["tag", name] => Route::Tag(name.to_string()),
            ["categories"] => Route::Categories,
            ["tags"] => Route::Tags,
            ["search"] => Route::Search(query_param(query, "q").unwrap_or_default()),
            ["api", "posts"] => Route::ApiPosts,
            ["feed.atom"] => Route::Feed,
            ["static", rest @ ..] if !rest.is_empty() && rest.iter().all(|s| is_safe_component(s)) => {
                Route::Static(rest.join("/"))
            }
            _ => Route::NotFound,
        }
    }
}

/// Whether `name` can be used as a single file or directory name without
/// escaping its parent.
pub fn is_safe_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(|c: char| matches!(c, '/' | '\\' | '\0'))
}

// Form-encoded: `+` is a space.
fn query_param(query: &str, key: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.replace('+', " "))
        .and_then(|v| urlencoding::decode(&v).ok().map(|d| d.into_owned()))
}

/// A rendered response.
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Response {
    pub fn ok(content_type: &'static str, body: Vec<u8>) -> Response {
        Response {
            status: 200,
            content_type,
            body,
        }
    }

    fn html(status: u16, body: String) -> Response {
        Response {
            status,
            content_type: HTML,
            body: body.into_bytes(),
        }
    }

    pub fn is_html(&self) -> bool {
        self.content_type == HTML
    }
}

/// One entry of `/api/posts`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiPost<'a> {
    title: &'a str,
    slug: &'a str,
    date: String,
    category: Option<&'a str>,
    tags: &'a [String],
    excerpt: &'a str,
    reading_time: usize,
    url: String,
}

impl<'a> From<&'a Post> for ApiPost<'a> {
    fn from(post: &'a Post) -> ApiPost<'a> {
        ApiPost {
            title: &post.title,
            slug: &post.slug,
            date: post.date.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            category: post.category.as_deref(),
            tags: &post.tags,
            excerpt: &post.excerpt,
            reading_time: post.reading_time,
            url: post.url(),
        }
    }
}

#[derive(Serialize)]
struct ApiPosts<'a> {
    posts: Vec<ApiPost<'a>>,
}

/// The blog: configuration, the shared post repository and the renderer.
pub struct Site {
    config: Config,
    repository: Arc<PostRepository>,
    renderer: Renderer,
}

impl Site {
    pub fn new(config: Config, repository: Arc<PostRepository>, renderer: Renderer) -> Site {
        Site {
            config,
            repository,
            renderer,
        }
    }

    /// Builds the repository and renderer that `config` describes.
    pub fn from_config(config: Config) -> Result<Site> {
        let templates = Templates::load(config.theme_directory.as_deref())?;
        let renderer = Renderer::new(templates, &config.title, &config.description);
        let repository = Arc::new(PostRepository::new(
            &config.posts_directory,
            config.load_mode,
        ));
        Ok(Site::new(config, repository, renderer))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn repository(&self) -> &Arc<PostRepository> {
        &self.repository
    }

    /// Resolves and renders `target`. Failures become a plain 500 response
    /// and are logged.
    pub fn respond(&self, target: &str) -> Response {
        let route = Route::parse(target);
        match self.render(&route) {
            Ok(response) => response,
            Err(e) => {
                log::error!("rendering `{}`: {}", target, e);
                Response {
                    status: 500,
                    content_type: TEXT,
                    body: "エラーが発生しました".as_bytes().to_vec(),
                }
            }
        }
    }

    pub fn render(&self, route: &Route) -> Result<Response> {
        let snapshot = self.repository.load_all();
        let posts = snapshot.posts();
        let r = &self.renderer;

        let response = match route {
            Route::Home => Response::html(
                200,
                r.home(posts, self.config.home_post_count, self.config.home_tag_count)?,
            ),
            Route::Blog { page } => {
                Response::html(200, r.blog(posts, *page, self.config.page_size)?)
            }
            Route::Post(slug) => match snapshot.get(slug) {
                Some(post) => Response::html(200, r.post(post)?),
                None => self.not_found(POST_NOT_FOUND)?,
            },
            Route::Category(name) => {
                Response::html(200, r.category(name, &query::by_category(posts, name))?)
            }
            Route::Tag(name) => Response::html(200, r.tag(name, &query::by_tag(posts, name))?),
            Route::Categories => Response::html(200, r.categories(posts)?),
            Route::Tags => Response::html(200, r.tags(posts)?),
            Route::Search(query) => {
                Response::html(200, r.search(query, &query::search(posts, query))?)
            }
            Route::ApiPosts => Response::ok(JSON, api_posts(posts)?),
            Route::Feed => Response::ok(ATOM, feed::feed_xml(&self.feed_config(), posts)?),
            Route::Static(path) => self.static_file(path)?,
            Route::NotFound => self.not_found(PAGE_NOT_FOUND)?,
        };
        Ok(response)
    }

    /// The 404 page.
    pub fn not_found(&self, message: &str) -> Result<Response> {
        Ok(Response::html(404, self.renderer.not_found(message)?))
    }

    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            title: self.config.title.clone(),
            description: self.config.description.clone(),
            author: self.config.author.clone(),
            site_url: self.config.site_url.clone(),
        }
    }

    fn static_file(&self, path: &str) -> Result<Response> {
        let file = self.config.static_directory.join(path);
        match std::fs::read(&file) {
            Ok(body) => Ok(Response::ok(guess_content_type(&file), body)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => match path {
                "style.css" => Ok(Response::ok(
                    guess_content_type(&file),
                    DEFAULT_STYLESHEET.as_bytes().to_vec(),
                )),
                _ => self.not_found(PAGE_NOT_FOUND),
            },
            // a directory, most likely
            Err(_) if file.is_dir() => self.not_found(PAGE_NOT_FOUND),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

/// Serializes the `/api/posts` listing.
pub fn api_posts(posts: &[Arc<Post>]) -> Result<Vec<u8>> {
    let listing = ApiPosts {
        posts: posts.iter().map(|p| ApiPost::from(&**p)).collect(),
    };
    Ok(serde_json::to_vec(&listing)?)
}

/// Guess MIME content type from file extension.
pub fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html" | "htm") => HTML,
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => JSON,
        Some("xml") => "application/xml; charset=utf-8",
        Some("atom") => ATOM,

        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("ico") => "image/x-icon",

        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",

        Some("pdf") => "application/pdf",
        Some("txt") => TEXT,
        Some("md") => "text/markdown; charset=utf-8",

        _ => "application/octet-stream",
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A failure while producing a response.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Render(#[from] render::Error),

    #[error(transparent)]
    Feed(#[from] feed::Error),

    #[error("serializing posts: {0}")]
    Json(#[from] serde_json::Error),

    #[error("reading static file: {0}")]
    Io(#[from] io::Error),
}
