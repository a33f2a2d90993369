//! Loads the project file (`kiroku.yaml`) and resolves it into a [`Config`].
//! Every key is optional:
//!
//! ```yaml
//! title: My Blog
//! description: Notes on the web
//! site_url: https://blog.example.org/
//! author:
//!   name: Alice
//! posts_directory: posts
//! page_size: 5
//! load_mode: lenient
//! serve:
//!   port: 8080
//! ```
//!
//! Relative paths resolve against the directory holding the project file.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use url::Url;

use crate::repository::LoadMode;

/// The name of the project file searched for by [`Config::from_directory`].
pub const PROJECT_FILE: &str = "kiroku.yaml";

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Author {
    pub name: String,

    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Serve {
    pub interface: String,
    pub port: u16,
    pub workers: usize,
}

impl Default for Serve {
    fn default() -> Self {
        Serve {
            interface: String::from("127.0.0.1"),
            port: 3000,
            workers: 4,
        }
    }
}

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Project {
    title: String,
    description: String,
    site_url: String,
    author: Option<Author>,
    posts_directory: PathBuf,
    static_directory: PathBuf,
    output_directory: PathBuf,
    theme_directory: Option<PathBuf>,
    page_size: usize,
    home_post_count: usize,
    home_tag_count: usize,
    load_mode: LoadMode,
    serve: Serve,
}

impl Default for Project {
    fn default() -> Self {
        Project {
            title: String::from("Kiroku"),
            description: String::from("Markdownで書いたブログ"),
            site_url: String::from("http://localhost:3000/"),
            author: None,
            posts_directory: PathBuf::from("posts"),
            static_directory: PathBuf::from("static"),
            output_directory: PathBuf::from("dist"),
            theme_directory: None,
            page_size: 5,
            home_post_count: 5,
            home_tag_count: 10,
            load_mode: LoadMode::Strict,
            serve: Serve::default(),
        }
    }
}

/// The resolved site configuration. All paths are joined onto the project
/// root.
#[derive(Clone, Debug)]
pub struct Config {
    pub title: String,
    pub description: String,
    pub site_url: Url,
    pub author: Option<Author>,
    pub posts_directory: PathBuf,
    pub static_directory: PathBuf,
    pub output_directory: PathBuf,
    pub theme_directory: Option<PathBuf>,
    pub page_size: usize,
    pub home_post_count: usize,
    pub home_tag_count: usize,
    pub load_mode: LoadMode,
    pub serve: Serve,
}

impl Config {
    /// Searches `dir` and its ancestors for a [`PROJECT_FILE`]. Without one,
    /// the defaults apply relative to `dir`.
    pub fn from_directory(dir: &Path) -> Result<Config> {
        for candidate in dir.ancestors() {
            let path = candidate.join(PROJECT_FILE);
            if path.is_file() {
                return Config::from_project_file(&path);
            }
        }
        log::info!("no `{}` found; using defaults", PROJECT_FILE);
        Config::resolve(Project::default(), dir)
    }

    /// Loads the configuration from a specific project file.
    pub fn from_project_file(path: &Path) -> Result<Config> {
        let file = File::open(path)
            .with_context(|| format!("Opening project file `{}`", path.display()))?;
        let project: Project = serde_yaml::from_reader(file)
            .with_context(|| format!("Loading configuration from `{}`", path.display()))?;
        let root = path.parent().ok_or_else(|| {
            anyhow!(
                "Can't get parent directory for provided project file path '{}'",
                path.display()
            )
        })?;
        log::debug!("loaded project file `{}`", path.display());
        Config::resolve(project, root)
    }

    /// The configuration used when no project file exists, rooted at `root`.
    pub fn with_root(root: &Path) -> Result<Config> {
        Config::resolve(Project::default(), root)
    }

    fn resolve(project: Project, root: &Path) -> Result<Config> {
        let mut site_url = Url::parse(&project.site_url)
            .with_context(|| format!("Parsing site_url `{}`", project.site_url))?;
        // `Url::join` treats the last segment as a file unless it ends in `/`
        if !site_url.path().ends_with('/') {
            let path = format!("{}/", site_url.path());
            site_url.set_path(&path);
        }

        Ok(Config {
            title: project.title,
            description: project.description,
            site_url,
            author: project.author,
            posts_directory: root.join(project.posts_directory),
            static_directory: root.join(project.static_directory),
            output_directory: root.join(project.output_directory),
            theme_directory: project.theme_directory.map(|dir| root.join(dir)),
            page_size: project.page_size.max(1),
            home_post_count: project.home_post_count,
            home_tag_count: project.home_tag_count,
            load_mode: project.load_mode,
            serve: project.serve,
        })
    }
}
