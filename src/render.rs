//! Renders pages to HTML with [`gtmpl`] templates. Every page is rendered in
//! two passes: the page's own template produces the body, which is then
//! wrapped by `layout.html`.
//!
//! The templates ship inside the binary. A theme directory can replace any of
//! them file by file (`layout.html`, `home.html`, `cards.html`, `list.html`,
//! `post.html`, `categories.html`, `tags.html`, `search.html`,
//! `not_found.html`).

use gtmpl::{Context, Template, Value};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::post::{Post, DEFAULT_DATE_FORMAT};
use crate::query;
use crate::value::{self, object, text};

struct Page {
    name: &'static str,
    template: Template,
}

impl Page {
    /// Parses `{theme}/{name}.html` if it exists, else the built-in source.
    fn load(name: &'static str, builtin: &str, theme: Option<&Path>) -> Result<Page> {
        let file_name = format!("{}.html", name);
        let source = match theme.map(|dir| dir.join(&file_name)) {
            Some(path) if path.is_file() => {
                log::debug!("using theme template `{}`", path.display());
                std::fs::read_to_string(&path)
                    .map_err(|source| Error::OpenTemplateFile { path, source })?
            }
            _ => builtin.to_owned(),
        };

        let mut template = Template::default();
        template
            .parse(source)
            .map_err(|e| Error::ParseTemplate {
                name,
                message: e.to_string(),
            })?;
        Ok(Page { name, template })
    }

    fn render(&self, value: Value) -> Result<String> {
        let context = Context::from(value).map_err(|e| self.execute_error(e.to_string()))?;
        let mut out: Vec<u8> = Vec::new();
        self.template
            .execute(&mut out, &context)
            .map_err(|e| self.execute_error(e.to_string()))?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    fn execute_error(&self, message: String) -> Error {
        Error::ExecuteTemplate {
            name: self.name,
            message,
        }
    }
}

/// The parsed set of page templates.
pub struct Templates {
    layout: Page,
    home: Page,
    cards: Page,
    list: Page,
    post: Page,
    categories: Page,
    tags: Page,
    search: Page,
    not_found: Page,
}

impl Templates {
    /// The templates compiled into the binary.
    pub fn builtin() -> Result<Templates> {
        Templates::load(None)
    }

    /// Loads the templates, preferring files found in `theme_directory`.
    pub fn load(theme_directory: Option<&Path>) -> Result<Templates> {
        let theme = theme_directory;
        Ok(Templates {
            layout: Page::load("layout", include_str!("../templates/layout.html"), theme)?,
            home: Page::load("home", include_str!("../templates/home.html"), theme)?,
            cards: Page::load("cards", include_str!("../templates/cards.html"), theme)?,
            list: Page::load("list", include_str!("../templates/list.html"), theme)?,
            post: Page::load("post", include_str!("../templates/post.html"), theme)?,
            categories: Page::load(
                "categories",
                include_str!("../templates/categories.html"),
                theme,
            )?,
            tags: Page::load("tags", include_str!("../templates/tags.html"), theme)?,
            search: Page::load("search", include_str!("../templates/search.html"), theme)?,
            not_found: Page::load(
                "not_found",
                include_str!("../templates/not_found.html"),
                theme,
            )?,
        })
    }
}

/// Head metadata for the layout.
struct PageMeta {
    /// Shown before the site title in `<title>`. `None` for the home page.
    title: Option<String>,
    description: String,

    /// Adds the Open Graph article tags.
    article: bool,
}

impl PageMeta {
    fn new(title: impl Into<String>, description: impl Into<String>) -> PageMeta {
        PageMeta {
            title: Some(title.into()),
            description: description.into(),
            article: false,
        }
    }
}

/// Turns posts and query results into complete HTML documents.
pub struct Renderer {
    templates: Templates,
    site_title: String,
    description: String,
    date_format: String,
}

impl Renderer {
    pub fn new(
        templates: Templates,
        site_title: impl Into<String>,
        description: impl Into<String>,
    ) -> Renderer {
        Renderer {
            templates,
            site_title: site_title.into(),
            description: description.into(),
            date_format: DEFAULT_DATE_FORMAT.to_owned(),
        }
    }

    /// Overrides the strftime pattern used for displayed dates.
    pub fn with_date_format(mut self, pattern: impl Into<String>) -> Renderer {
        self.date_format = pattern.into();
        self
    }

    /// The home page: site stats, the `post_count` newest posts, every
    /// category and the first `tag_count` tags.
    pub fn home(&self, posts: &[Arc<Post>], post_count: usize, tag_count: usize) -> Result<String> {
        let categories = query::categories(posts);
        let tags = query::tags(posts);
        let recent = &posts[..post_count.min(posts.len())];

        let link = |name: &String, url: String| object([("name", text(name)), ("url", text(&url))]);
        let body = self.templates.home.render(object([
            ("site_title", text(&self.site_title)),
            ("description", text(&self.description)),
            ("post_count", Value::String(posts.len().to_string())),
            ("category_count", Value::String(categories.len().to_string())),
            ("tag_count", Value::String(tags.len().to_string())),
            ("cards", Value::String(self.cards(recent)?)),
            (
                "categories",
                Value::Array(
                    categories
                        .iter()
                        .map(|c| link(c, value::category_url(c)))
                        .collect(),
                ),
            ),
            (
                "tags",
                Value::Array(
                    tags.iter()
                        .take(tag_count)
                        .map(|t| link(t, value::tag_url(t)))
                        .collect(),
                ),
            ),
        ]))?;

        self.wrap(
            PageMeta {
                title: None,
                description: self.description.clone(),
                article: false,
            },
            body,
        )
    }

    /// Page `page` of the full blog list.
    pub fn blog(&self, posts: &[Arc<Post>], page: i64, page_size: usize) -> Result<String> {
        let pagination = query::paginate(posts, page, page_size);
        let pager = value::pagination(&pagination, value::list_page_url);
        self.list(
            PageMeta::new("ブログ一覧", format!("{}の記事一覧", self.site_title)),
            "ブログ記事",
            pagination.items,
            Some(pager),
        )
    }

    /// Posts filed under `category`.
    pub fn category(&self, category: &str, posts: &[Arc<Post>]) -> Result<String> {
        let heading = format!("カテゴリ: {}", category);
        self.list(
            PageMeta::new(heading.clone(), format!("{}に関する記事一覧", category)),
            &heading,
            posts,
            None,
        )
    }

    /// Posts carrying `tag`.
    pub fn tag(&self, tag: &str, posts: &[Arc<Post>]) -> Result<String> {
        self.list(
            PageMeta::new(format!("タグ: {}", tag), format!("{}タグの記事一覧", tag)),
            &format!("タグ: #{}", tag),
            posts,
            None,
        )
    }

    pub fn post(&self, post: &Post) -> Result<String> {
        let body = self.templates.post.render(value::post(post, &self.date_format))?;
        self.wrap(
            PageMeta {
                title: Some(post.title.clone()),
                description: post.excerpt.clone(),
                article: true,
            },
            body,
        )
    }

    /// The category overview: one card per category with its post count and
    /// a few post links.
    pub fn categories(&self, posts: &[Arc<Post>]) -> Result<String> {
        let cards: Vec<Value> = query::count_by_category(posts)
            .iter()
            .map(|(name, count)| {
                let filed = query::by_category(posts, name);
                value::term(name, &value::category_url(name), *count, &filed)
            })
            .collect();
        let body = self
            .templates
            .categories
            .render(object([("categories", Value::Array(cards))]))?;
        self.wrap(PageMeta::new("カテゴリ一覧", "ブログのカテゴリ別記事一覧"), body)
    }

    /// The tag cloud, each tag sized by how many posts carry it.
    pub fn tags(&self, posts: &[Arc<Post>]) -> Result<String> {
        let cloud: Vec<Value> = query::count_by_tag(posts)
            .iter()
            .map(|(name, count)| value::term(name, &value::tag_url(name), *count, &[]))
            .collect();
        let body = self
            .templates
            .tags
            .render(object([("tags", Value::Array(cloud))]))?;
        self.wrap(PageMeta::new("タグ一覧", "ブログ記事のタグクラウド"), body)
    }

    /// The search page. With an empty `query` it shows search tips instead
    /// of results.
    pub fn search(&self, query: &str, results: &[Arc<Post>]) -> Result<String> {
        let has_query = !query.is_empty();
        let body = self.templates.search.render(object([
            ("query", text(query)),
            ("has_query", Value::Bool(has_query)),
            ("count", Value::String(results.len().to_string())),
            ("cards", Value::String(self.cards(results)?)),
        ]))?;
        let title = match has_query {
            true => format!("検索: {}", query),
            false => String::from("記事検索"),
        };
        self.wrap(PageMeta::new(title, "ブログ記事を検索"), body)
    }

    pub fn not_found(&self, message: &str) -> Result<String> {
        let body = self
            .templates
            .not_found
            .render(object([("message", text(message))]))?;
        self.wrap(PageMeta::new("404", message), body)
    }

    fn list(
        &self,
        meta: PageMeta,
        heading: &str,
        posts: &[Arc<Post>],
        pagination: Option<Value>,
    ) -> Result<String> {
        let body = self.templates.list.render(object([
            ("heading", text(heading)),
            ("subtitle", text(&self.description)),
            ("cards", Value::String(self.cards(posts)?)),
            ("paginated", Value::Bool(pagination.is_some())),
            ("pagination", pagination.unwrap_or_else(|| object([]))),
        ]))?;
        self.wrap(meta, body)
    }

    fn cards(&self, posts: &[Arc<Post>]) -> Result<String> {
        self.templates.cards.render(object([
            ("has_posts", Value::Bool(!posts.is_empty())),
            ("posts", value::summaries(posts, &self.date_format)),
        ]))
    }

    fn wrap(&self, meta: PageMeta, content: String) -> Result<String> {
        let page_title = match &meta.title {
            Some(title) => format!("{} | {}", title, self.site_title),
            None => self.site_title.clone(),
        };
        self.templates.layout.render(object([
            ("page_title", text(&page_title)),
            ("site_title", text(&self.site_title)),
            ("description", text(&meta.description)),
            ("article", Value::Bool(meta.article)),
            ("og_title", text(meta.title.as_deref().unwrap_or(&self.site_title))),
            ("content", Value::String(content)),
        ]))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A problem loading or executing a template.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A theme template file exists but couldn't be read.
    #[error("opening template file `{}`: {source}", path.display())]
    OpenTemplateFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A template has a syntax error.
    #[error("parsing template `{name}`: {message}")]
    ParseTemplate { name: &'static str, message: String },

    /// A template failed while rendering, e.g. on a missing field.
    #[error("executing template `{name}`: {message}")]
    ExecuteTemplate { name: &'static str, message: String },
}
