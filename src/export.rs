//! Exports the [`export_site`] function which pre-renders every route of a
//! [`Site`] into a directory of static files that any file server or CDN can
//! host:
//!
//! ```text
//! {out}/index.html
//! {out}/blog/index.html                 {out}/blog/page/{n}/index.html
//! {out}/blog/{slug}/index.html
//! {out}/category/{name}/index.html      {out}/categories/index.html
//! {out}/tag/{name}/index.html           {out}/tags/index.html
//! {out}/search/index.html               {out}/404.html
//! {out}/api/posts.json                  {out}/feed.atom
//! {out}/static/...
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::query;
use crate::site::{self, is_safe_component, Route, Site, DEFAULT_STYLESHEET};

/// What an export wrote.
#[derive(Debug, Default, PartialEq)]
pub struct ExportSummary {
    /// Rendered pages and data files.
    pub pages: usize,

    /// Files copied from the static directory.
    pub static_files: usize,

    /// Categories and tags whose names can't be used as a directory name.
    pub skipped: Vec<String>,
}

/// Renders `site` into `output`. The output directory is deleted first so
/// pages of removed posts don't linger.
pub fn export_site(site: &Site, output: &Path) -> Result<ExportSummary> {
    let snapshot = site.repository().load_all();
    let posts = snapshot.posts();
    let mut summary = ExportSummary::default();

    rmdir(output)?;

    let mut pages: Vec<(Route, PathBuf)> = vec![
        (Route::Home, PathBuf::from("index.html")),
        (Route::Blog { page: 1 }, Path::new("blog").join("index.html")),
        (Route::Categories, Path::new("categories").join("index.html")),
        (Route::Tags, Path::new("tags").join("index.html")),
        (Route::Search(String::new()), Path::new("search").join("index.html")),
        (Route::NotFound, PathBuf::from("404.html")),
        (Route::ApiPosts, Path::new("api").join("posts.json")),
        (Route::Feed, PathBuf::from("feed.atom")),
    ];

    let total_pages = query::paginate(posts, 1, site.config().page_size).total_pages;
    for page in 2..=total_pages {
        let dir = Path::new("blog").join("page").join(page.to_string());
        pages.push((Route::Blog { page: page as i64 }, dir.join("index.html")));
    }

    for post in posts {
        // slugs are validated when posts are parsed
        let dir = Path::new("blog").join(&post.slug);
        pages.push((Route::Post(post.slug.clone()), dir.join("index.html")));
    }

    let categories = query::categories(posts).into_iter().map(|c| ("category", c));
    let tags = query::tags(posts).into_iter().map(|t| ("tag", t));
    for (kind, name) in categories.chain(tags) {
        if !is_safe_component(&name) {
            log::warn!("skipping {} `{}`: not usable as a directory name", kind, name);
            summary.skipped.push(name);
            continue;
        }
        let route = match kind {
            "category" => Route::Category(name.clone()),
            _ => Route::Tag(name.clone()),
        };
        pages.push((route, Path::new(kind).join(&name).join("index.html")));
    }

    for (route, relative) in &pages {
        let response = site.render(route)?;
        write_file(&output.join(relative), &response.body)?;
        log::debug!("wrote {}", relative.display());
    }
    summary.pages = pages.len();

    let static_output = output.join("static");
    summary.static_files = copy_dir(&site.config().static_directory, &static_output)?;
    let stylesheet = static_output.join("style.css");
    if !stylesheet.exists() {
        write_file(&stylesheet, DEFAULT_STYLESHEET.as_bytes())?;
    }

    log::info!(
        "exported {} pages and {} static files to `{}`",
        summary.pages,
        summary.static_files,
        output.display()
    );
    Ok(summary)
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|source| Error::Io {
            path: dir.to_owned(),
            source,
        })?;
    }
    fs::write(path, contents).map_err(|source| Error::Io {
        path: path.to_owned(),
        source,
    })
}

/// Copies the tree below `src` into `dst`, returning the number of files.
/// A missing `src` copies nothing.
fn copy_dir(src: &Path, dst: &Path) -> Result<usize> {
    if !src.is_dir() {
        log::debug!("no static directory at `{}`", src.display());
        return Ok(0);
    }

    let mut copied = 0;
    for entry in WalkDir::new(src) {
        let entry = entry?;
        let relative = match entry.path().strip_prefix(src) {
            Ok(relative) => relative,
            Err(_) => continue,
        };
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|source| Error::Io {
                path: target.clone(),
                source,
            })?;
        } else {
            fs::copy(entry.path(), &target).map_err(|source| Error::Io {
                path: target.clone(),
                source,
            })?;
            copied += 1;
        }
    }
    Ok(copied)
}

fn rmdir(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(x) => Ok(x),
        Err(e) => match e.kind() {
            io::ErrorKind::NotFound => Ok(()),
            _ => Err(Error::Clean {
                path: dir.to_owned(),
                source: e,
            }),
        },
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// The error type for exporting a site.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned for I/O problems while cleaning the output directory.
    #[error("cleaning directory `{}`: {source}", path.display())]
    Clean {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Returned for I/O problems writing an output file.
    #[error("writing `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Returned when walking the static directory fails.
    #[error("walking static directory: {0}")]
    Walk(#[from] walkdir::Error),

    /// Returned when a page fails to render.
    #[error("rendering page: {0}")]
    Render(#[from] site::Error),
}
