//! Loads posts from a source directory and caches them for the lifetime of
//! the repository (or until [`PostRepository::clear_cache`]).
//!
//! ```text
//!   load_all() ──► cached snapshot? ──yes──► Arc<Snapshot> (lock-free)
//!                        │ no
//!                        ▼
//!                  take load gate ──► re-check ──► scan directory once
//! ```
//!
//! Concurrent callers that miss the cache queue on the load gate, so a cold
//! start triggers exactly one directory scan. The snapshot itself is
//! immutable and shared through an `Arc`; the query functions in
//! [`crate::query`] run against it without further locking.

use std::collections::HashMap;
use std::fs::{read_dir, read_to_string};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use serde::Deserialize;

use crate::post::{self, Post};
use crate::query;

const MARKDOWN_EXTENSIONS: [&str; 2] = ["md", "markdown"];

/// How a load reacts to a source file that can't be read or parsed.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    /// Any failing file discards the whole batch: the snapshot is empty.
    #[default]
    Strict,

    /// Failing files are skipped; the remaining posts load normally.
    Lenient,
}

/// An immutable, date-sorted view of every post in the source directory.
#[derive(Debug, Default)]
pub struct Snapshot {
    posts: Vec<Arc<Post>>,
    by_slug: HashMap<String, Arc<Post>>,
    warnings: Vec<LoadError>,
}

impl Snapshot {
    /// Sorts `posts` by date (most recent first) and indexes them by slug.
    /// The sort is stable, so posts sharing a date keep their input order.
    fn index(mut posts: Vec<Post>, mode: LoadMode, warnings: &mut Vec<LoadError>) -> Result<Snapshot> {
        posts.sort_by(|a, b| b.date.cmp(&a.date));

        let mut snapshot = Snapshot {
            posts: Vec::with_capacity(posts.len()),
            by_slug: HashMap::with_capacity(posts.len()),
            warnings: Vec::new(),
        };
        for post in posts {
            if snapshot.by_slug.contains_key(&post.slug) {
                let err = LoadError::DuplicateSlug {
                    slug: post.slug.clone(),
                    file: post.source_filename.clone(),
                };
                match mode {
                    LoadMode::Strict => return Err(err),
                    LoadMode::Lenient => {
                        log::warn!("skipping post: {}", err);
                        warnings.push(err);
                        continue;
                    }
                }
            }
            let post = Arc::new(post);
            snapshot.by_slug.insert(post.slug.clone(), Arc::clone(&post));
            snapshot.posts.push(post);
        }
        Ok(snapshot)
    }

    /// All posts, most recent first.
    pub fn posts(&self) -> &[Arc<Post>] {
        &self.posts
    }

    /// Looks up a post by slug.
    pub fn get(&self, slug: &str) -> Option<&Arc<Post>> {
        self.by_slug.get(slug)
    }

    /// Problems met while loading. In [`LoadMode::Strict`] a non-empty list
    /// means the snapshot is empty.
    pub fn warnings(&self) -> &[LoadError] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

/// Reads posts from `source_directory` on first use and serves them from
/// memory afterwards.
pub struct PostRepository {
    source_directory: PathBuf,
    mode: LoadMode,
    snapshot: ArcSwapOption<Snapshot>,
    load_gate: Mutex<()>,
    scans: AtomicUsize,
}

impl PostRepository {
    pub fn new(source_directory: impl Into<PathBuf>, mode: LoadMode) -> PostRepository {
        PostRepository {
            source_directory: source_directory.into(),
            mode,
            snapshot: ArcSwapOption::empty(),
            load_gate: Mutex::new(()),
            scans: AtomicUsize::new(0),
        }
    }

    pub fn source_directory(&self) -> &Path {
        &self.source_directory
    }

    pub fn mode(&self) -> LoadMode {
        self.mode
    }

    /// Returns the cached snapshot, scanning the source directory first if
    /// nothing is cached. Never fails: load problems produce an empty (strict)
    /// or partial (lenient) snapshot and are listed in
    /// [`Snapshot::warnings`].
    pub fn load_all(&self) -> Arc<Snapshot> {
        if let Some(snapshot) = self.snapshot.load_full() {
            log::debug!("post cache hit");
            return snapshot;
        }

        let _gate = self.load_gate.lock();
        // another caller may have finished loading while we waited
        if let Some(snapshot) = self.snapshot.load_full() {
            log::debug!("post cache filled by a concurrent load");
            return snapshot;
        }

        let snapshot = Arc::new(self.scan());
        self.snapshot.store(Some(Arc::clone(&snapshot)));
        snapshot
    }

    /// Drops the cached snapshot. The next read scans the directory again.
    pub fn clear_cache(&self) {
        let _gate = self.load_gate.lock();
        self.snapshot.store(None);
        log::debug!("post cache cleared");
    }

    /// The number of directory scans performed so far.
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    /// Looks up a post by slug; `None` means there is no such post.
    pub fn get_by_slug(&self, slug: &str) -> Option<Arc<Post>> {
        self.load_all().get(slug).cloned()
    }

    pub fn by_category(&self, category: &str) -> Vec<Arc<Post>> {
        query::by_category(self.load_all().posts(), category)
    }

    pub fn by_tag(&self, tag: &str) -> Vec<Arc<Post>> {
        query::by_tag(self.load_all().posts(), tag)
    }

    pub fn categories(&self) -> Vec<String> {
        query::categories(self.load_all().posts())
    }

    pub fn tags(&self) -> Vec<String> {
        query::tags(self.load_all().posts())
    }

    pub fn search(&self, query: &str) -> Vec<Arc<Post>> {
        query::search(self.load_all().posts(), query)
    }

    fn scan(&self) -> Snapshot {
        self.scans.fetch_add(1, Ordering::SeqCst);

        let mut warnings = Vec::new();
        let result = self
            .read_posts(&mut warnings)
            .and_then(|posts| Snapshot::index(posts, self.mode, &mut warnings));
        let mut snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(err) => {
                log::error!(
                    "loading posts from `{}`: {}",
                    self.source_directory.display(),
                    err
                );
                warnings.push(err);
                Snapshot::default()
            }
        };
        snapshot.warnings = warnings;

        log::info!(
            "loaded {} posts from `{}` ({} warnings)",
            snapshot.len(),
            self.source_directory.display(),
            snapshot.warnings.len()
        );
        snapshot
    }

    /// Parses every Markdown file directly inside the source directory, in
    /// file-name order.
    fn read_posts(&self, warnings: &mut Vec<LoadError>) -> Result<Vec<Post>> {
        let dir = &self.source_directory;
        let read_dir_error = |source| LoadError::ReadDir {
            path: dir.to_owned(),
            source,
        };

        let mut files = Vec::new();
        for result in read_dir(dir).map_err(read_dir_error)? {
            let entry = result.map_err(read_dir_error)?;
            let path = entry.path();
            if path.is_file() && is_markdown(&path) {
                files.push((entry.file_name().to_string_lossy().into_owned(), path));
            }
        }
        files.sort();

        let mut posts = Vec::with_capacity(files.len());
        for (file_name, path) in files {
            match load_file(&file_name, &path) {
                Ok(post) => posts.push(post),
                Err(err) => match self.mode {
                    LoadMode::Strict => return Err(err),
                    LoadMode::Lenient => {
                        log::warn!("skipping post: {}", err);
                        warnings.push(err);
                    }
                },
            }
        }
        Ok(posts)
    }
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| MARKDOWN_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

fn load_file(file_name: &str, path: &Path) -> Result<Post> {
    let contents = read_to_string(path).map_err(|source| LoadError::Io {
        file: file_name.to_owned(),
        source,
    })?;
    Post::parse(file_name, &contents).map_err(|source| LoadError::Parse {
        file: file_name.to_owned(),
        source,
    })
}

type Result<T> = std::result::Result<T, LoadError>;

/// A problem met while loading the source directory.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The source directory is missing or can't be listed.
    #[error("reading directory `{}`: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A source file couldn't be read.
    #[error("reading `{file}`: {source}")]
    Io {
        file: String,
        #[source]
        source: io::Error,
    },

    /// A source file couldn't be parsed into a post.
    #[error("parsing `{file}`: {source}")]
    Parse {
        file: String,
        #[source]
        source: post::Error,
    },

    /// Two posts share a slug; `file` is the one that lost.
    #[error("duplicate slug `{slug}` in `{file}`")]
    DuplicateSlug { slug: String, file: String },
}

impl LoadError {
    /// The source file the problem belongs to, if it is about a single file.
    pub fn file(&self) -> Option<&str> {
        match self {
            LoadError::ReadDir { .. } => None,
            LoadError::Io { file, .. }
            | LoadError::Parse { file, .. }
            | LoadError::DuplicateSlug { file, .. } => Some(file),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use std::sync::Barrier;
    use tempfile::TempDir;

    fn write_post(dir: &Path, file: &str, slug: &str, date: &str, tags: &str) {
        fs::write(
            dir.join(file),
            format!(
                "---\ntitle: Post {slug}\nslug: {slug}\ndate: {date}\ntags: {tags}\n---\nbody of {slug}\n"
            ),
        )
        .unwrap();
    }

    fn fixture() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        write_post(dir.path(), "a.md", "a", "2024-01-01", "[x]");
        write_post(dir.path(), "b.md", "b", "2024-02-01", "[y]");
        dir
    }

    fn slugs(posts: &[Arc<Post>]) -> Vec<&str> {
        posts.iter().map(|p| p.slug.as_str()).collect()
    }

    #[test]
    fn test_load_all_sorts_by_date_descending() {
        let dir = fixture();
        let repo = PostRepository::new(dir.path(), LoadMode::Strict);
        let snapshot = repo.load_all();
        assert_eq!(vec!["b", "a"], slugs(snapshot.posts()));
        assert!(snapshot.warnings().is_empty());
    }

    #[test]
    fn test_equal_dates_keep_file_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for (file, slug) in &[("3.md", "three"), ("1.md", "one"), ("2.md", "two")] {
            write_post(dir.path(), file, slug, "2024-05-05", "[]");
        }
        write_post(dir.path(), "0.md", "newest", "2024-06-01", "[]");

        for _ in 0..3 {
            let repo = PostRepository::new(dir.path(), LoadMode::Strict);
            assert_eq!(vec!["newest", "one", "two", "three"], slugs(repo.load_all().posts()));
        }
    }

    #[test]
    fn test_ignores_other_files_and_subdirectories() {
        let dir = fixture();
        fs::write(dir.path().join("notes.txt"), "not a post").unwrap();
        fs::create_dir(dir.path().join("drafts.md")).unwrap();
        write_post(dir.path(), "c.markdown", "c", "2023-01-01", "[]");

        let repo = PostRepository::new(dir.path(), LoadMode::Strict);
        assert_eq!(vec!["b", "a", "c"], slugs(repo.load_all().posts()));
    }

    #[test]
    fn test_results_are_cached_until_cleared() {
        let dir = fixture();
        let repo = PostRepository::new(dir.path(), LoadMode::Strict);
        assert_eq!(2, repo.load_all().len());

        write_post(dir.path(), "c.md", "c", "2024-03-01", "[]");
        assert_eq!(2, repo.load_all().len());
        assert_eq!(1, repo.scan_count());

        repo.clear_cache();
        assert_eq!(3, repo.load_all().len());
        assert_eq!(2, repo.scan_count());
    }

    #[test]
    fn test_get_by_slug() {
        let dir = fixture();
        let repo = PostRepository::new(dir.path(), LoadMode::Strict);
        assert_eq!("Post a", repo.get_by_slug("a").unwrap().title);
        assert!(repo.get_by_slug("missing").is_none());
        for post in repo.load_all().posts() {
            assert!(Arc::ptr_eq(post, &repo.get_by_slug(&post.slug).unwrap()));
        }
    }

    #[test]
    fn test_missing_directory_yields_empty_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let repo = PostRepository::new(dir.path().join("nope"), LoadMode::Lenient);
        let snapshot = repo.load_all();
        assert!(snapshot.is_empty());
        assert!(matches!(snapshot.warnings(), [LoadError::ReadDir { .. }]));
        assert!(repo.get_by_slug("a").is_none());
    }

    #[test]
    fn test_strict_mode_discards_batch_on_bad_file() {
        let dir = fixture();
        fs::write(dir.path().join("broken.md"), "no frontmatter here").unwrap();

        let repo = PostRepository::new(dir.path(), LoadMode::Strict);
        let snapshot = repo.load_all();
        assert!(snapshot.is_empty());
        assert_eq!(1, snapshot.warnings().len());
        assert_eq!(Some("broken.md"), snapshot.warnings()[0].file());
    }

    #[test]
    fn test_lenient_mode_skips_bad_file() {
        let dir = fixture();
        fs::write(dir.path().join("broken.md"), "---\ntitle: x\n---\n").unwrap();

        let repo = PostRepository::new(dir.path(), LoadMode::Lenient);
        let snapshot = repo.load_all();
        assert_eq!(vec!["b", "a"], slugs(snapshot.posts()));
        assert!(matches!(
            snapshot.warnings(),
            [LoadError::Parse { file, .. }] if file == "broken.md"
        ));
    }

    #[test]
    fn test_duplicate_slugs() {
        let dir = fixture();
        write_post(dir.path(), "z.md", "a", "2024-03-01", "[]");

        let strict = PostRepository::new(dir.path(), LoadMode::Strict);
        assert!(strict.load_all().is_empty());

        let lenient = PostRepository::new(dir.path(), LoadMode::Lenient);
        let snapshot = lenient.load_all();
        // the newer post wins the slug
        assert_eq!(vec!["a", "b"], slugs(snapshot.posts()));
        assert_eq!("z.md", snapshot.get("a").unwrap().source_filename);
        assert!(matches!(
            snapshot.warnings(),
            [LoadError::DuplicateSlug { file, .. }] if file == "a.md"
        ));
    }

    #[test]
    fn test_concurrent_cold_start_scans_once() {
        let dir = fixture();
        let repo = PostRepository::new(dir.path(), LoadMode::Strict);
        let barrier = Barrier::new(8);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    barrier.wait();
                    assert_eq!(2, repo.load_all().len());
                });
            }
        });
        assert_eq!(1, repo.scan_count());
    }

    #[test]
    fn test_repository_queries() {
        let dir = fixture();
        let repo = PostRepository::new(dir.path(), LoadMode::Strict);
        assert_eq!(vec!["y", "x"], repo.tags());
        assert_eq!(vec!["a"], slugs(&repo.by_tag("x")));
        assert!(repo.categories().is_empty());
        assert!(repo.by_category("none").is_empty());
        assert_eq!(vec!["b"], slugs(&repo.search("OF B")));
    }
}
