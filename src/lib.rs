//! The library code for the `kiroku` blog engine. Posts are Markdown files
//! with a YAML frontmatter block; everything else is derived from them:
//!
//! 1. Parsing a source document into a [`post::Post`] ([`post`],
//!    [`markdown`])
//! 2. Loading and caching every post of a directory ([`repository`])
//! 3. Querying the cached posts: categories, tags, pages and search
//!    ([`query`])
//! 4. Rendering pages with templates ([`render`], [`value`])
//! 5. Delivering them, either live over HTTP ([`serve`]) or as static files
//!    ([`export`]), both through the route table in [`site`]
//!
//! The repository is the only stateful piece. It is built once and shared
//! behind an `Arc`; a cold start scans the directory exactly once no matter
//! how many threads ask for posts at the same time.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod config;
pub mod export;
pub mod feed;
pub mod markdown;
pub mod post;
pub mod query;
pub mod render;
pub mod repository;
pub mod serve;
pub mod site;
pub mod value;
