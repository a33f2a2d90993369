//! Pure queries over a date-sorted slice of posts: filtering by category or
//! tag, collecting distinct categories and tags, pagination and search.
//! Every function preserves the order of its input.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::post::Post;

/// Posts whose category is exactly `category`.
pub fn by_category(posts: &[Arc<Post>], category: &str) -> Vec<Arc<Post>> {
    posts
        .iter()
        .filter(|post| post.category.as_deref() == Some(category))
        .cloned()
        .collect()
}

/// Posts carrying `tag` (exact match).
pub fn by_tag(posts: &[Arc<Post>], tag: &str) -> Vec<Arc<Post>> {
    posts
        .iter()
        .filter(|post| post.tags.iter().any(|t| t == tag))
        .cloned()
        .collect()
}

/// Distinct categories in order of first appearance.
pub fn categories(posts: &[Arc<Post>]) -> Vec<String> {
    first_seen(posts.iter().filter_map(|post| post.category.as_deref()))
}

/// Distinct tags in order of first appearance.
pub fn tags(posts: &[Arc<Post>]) -> Vec<String> {
    first_seen(posts.iter().flat_map(|post| post.tags.iter().map(String::as_str)))
}

/// Each distinct category with the number of posts in it, in order of first
/// appearance.
pub fn count_by_category(posts: &[Arc<Post>]) -> Vec<(String, usize)> {
    counted(posts.iter().filter_map(|post| post.category.as_deref()))
}

/// Each distinct tag with the number of posts carrying it, in order of first
/// appearance. A post listing a tag twice counts once.
pub fn count_by_tag(posts: &[Arc<Post>]) -> Vec<(String, usize)> {
    counted(posts.iter().flat_map(|post| {
        let mut seen = HashSet::new();
        post.tags
            .iter()
            .map(String::as_str)
            .filter(move |tag| seen.insert(*tag))
    }))
}

fn first_seen<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .filter(|name| seen.insert(*name))
        .map(str::to_owned)
        .collect()
}

fn counted<'a>(names: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut order: Vec<(String, usize)> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for name in names {
        match positions.get(name) {
            Some(&i) => order[i].1 += 1,
            None => {
                positions.insert(name, order.len());
                order.push((name.to_owned(), 1));
            }
        }
    }
    order
}

/// One page of a list of items.
#[derive(Debug, PartialEq)]
pub struct Pagination<'a, T> {
    /// The items on the requested page. Empty when the page is out of range.
    pub items: &'a [T],

    /// `ceil(total / page_size)`.
    pub total_pages: usize,

    /// The page that was asked for, not clamped.
    pub current_page: i64,

    pub has_next: bool,
    pub has_prev: bool,
}

/// Returns page `page` (1-based) of `items`, `page_size` items per page.
/// Pages below one or past the end are empty rather than errors. A
/// `page_size` of zero is treated as one.
pub fn paginate<T>(items: &[T], page: i64, page_size: usize) -> Pagination<'_, T> {
    let size = page_size.max(1);
    let len = items.len();
    let total_pages = len.div_ceil(size);

    let size_i = i64::try_from(size).unwrap_or(i64::MAX);
    let len_i = i64::try_from(len).unwrap_or(i64::MAX);
    let end = page.saturating_mul(size_i);
    let start = page.saturating_sub(1).saturating_mul(size_i);

    let page_items = match page >= 1 && start < len_i {
        true => {
            // `start` is in `0..len` here, so both bounds fit in usize
            let start = start as usize;
            &items[start..len.min(start.saturating_add(size))]
        }
        false => &items[..0],
    };

    Pagination {
        items: page_items,
        total_pages,
        current_page: page,
        has_next: end < len_i,
        has_prev: page > 1,
    }
}

/// Case-insensitive substring search over title, excerpt, body and tags. An
/// empty query matches nothing.
pub fn search(posts: &[Arc<Post>], query: &str) -> Vec<Arc<Post>> {
    if query.is_empty() {
        return Vec::new();
    }
    let needle = query.to_lowercase();
    posts
        .iter()
        .filter(|post| matches(post, &needle))
        .cloned()
        .collect()
}

fn matches(post: &Post, needle: &str) -> bool {
    post.title.to_lowercase().contains(needle)
        || post.excerpt.to_lowercase().contains(needle)
        || post.raw_content.to_lowercase().contains(needle)
        || post.tags.iter().any(|tag| tag.to_lowercase().contains(needle))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::post::Frontmatter;

    fn post(slug: &str, date: &str, category: Option<&str>, tags: &[&str], body: &str) -> Arc<Post> {
        let frontmatter = Frontmatter {
            title: format!("Title {}", slug.to_uppercase()),
            slug: slug.to_owned(),
            date: date.to_owned(),
            category: category.map(str::to_owned),
            tags: Some(tags.iter().map(|t| t.to_string()).collect()),
            excerpt: Some(format!("excerpt for {}", slug)),
        };
        Arc::new(Post::from_parts(frontmatter, body, &format!("{}.md", slug)).unwrap())
    }

    // already sorted most recent first, as the repository hands them out
    fn posts() -> Vec<Arc<Post>> {
        vec![
            post("d", "2024-04-01", Some("Rust"), &["web", "Hono"], "Building with Hono"),
            post("c", "2024-03-01", Some("Life"), &["diary"], "A quiet day"),
            post("b", "2024-02-01", Some("Rust"), &["web"], "Ownership"),
            post("a", "2024-01-01", None, &["diary", "diary"], "Nothing much"),
        ]
    }

    fn slugs(posts: &[Arc<Post>]) -> Vec<&str> {
        posts.iter().map(|p| p.slug.as_str()).collect()
    }

    #[test]
    fn test_by_category() {
        let posts = posts();
        assert_eq!(vec!["d", "b"], slugs(&by_category(&posts, "Rust")));
        assert!(by_category(&posts, "rust").is_empty());
        assert!(by_category(&posts, "").is_empty());
    }

    #[test]
    fn test_categories_partition_posts() {
        let posts = posts();
        let mut covered: Vec<&str> = Vec::new();
        let parts: Vec<Vec<Arc<Post>>> = categories(&posts)
            .iter()
            .map(|c| by_category(&posts, c))
            .collect();
        for part in &parts {
            covered.extend(slugs(part));
        }
        covered.sort_unstable();
        assert_eq!(vec!["b", "c", "d"], covered);
    }

    #[test]
    fn test_by_tag() {
        let posts = posts();
        assert_eq!(vec!["d", "b"], slugs(&by_tag(&posts, "web")));
        assert!(by_tag(&posts, "hono").is_empty());
    }

    #[test]
    fn test_distinct_in_first_seen_order() {
        let posts = posts();
        assert_eq!(vec!["Rust", "Life"], categories(&posts));
        assert_eq!(vec!["web", "Hono", "diary"], tags(&posts));
    }

    #[test]
    fn test_counts() {
        let posts = posts();
        assert_eq!(
            vec![("Rust".to_owned(), 2), ("Life".to_owned(), 1)],
            count_by_category(&posts)
        );
        assert_eq!(
            vec![("web".to_owned(), 2), ("Hono".to_owned(), 1), ("diary".to_owned(), 2)],
            count_by_tag(&posts)
        );
    }

    #[test]
    fn test_paginate_properties() {
        let items: Vec<u32> = (0..12).collect();
        for page in -2..6 {
            let p = paginate(&items, page, 5);
            assert!(p.items.len() <= 5);
            assert_eq!(3, p.total_pages);
            assert_eq!(page, p.current_page);
            assert_eq!(page * 5 < 12, p.has_next, "page {}", page);
            assert_eq!(page > 1, p.has_prev, "page {}", page);
        }
        assert_eq!(&[5u32, 6, 7, 8, 9], paginate(&items, 2, 5).items);
        assert_eq!(&[10u32, 11], paginate(&items, 3, 5).items);
        assert!(paginate(&items, 4, 5).items.is_empty());
        assert!(paginate(&items, 0, 5).items.is_empty());
        assert!(paginate(&items, -1, 5).items.is_empty());
    }

    #[test]
    fn test_paginate_edges() {
        let empty: Vec<u32> = Vec::new();
        let p = paginate(&empty, 1, 5);
        assert_eq!(0, p.total_pages);
        assert!(!p.has_next);
        assert!(!p.has_prev);

        let items = [1, 2, 3];
        assert_eq!(&[2], paginate(&items, 2, 0).items);
        assert!(paginate(&items, i64::MAX, 5).items.is_empty());
        assert!(paginate(&items, i64::MIN, 5).items.is_empty());

        let whole = paginate(&items, 1, usize::MAX);
        assert_eq!(&[1, 2, 3], whole.items);
        assert_eq!(1, whole.total_pages);
        assert!(!whole.has_next);
        assert!(paginate(&items, 2, usize::MAX).items.is_empty());
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let posts = posts();
        assert_eq!(slugs(&search(&posts, "Hono")), slugs(&search(&posts, "hono")));
        assert_eq!(vec!["d"], slugs(&search(&posts, "HONO")));
    }

    #[test]
    fn test_search_fields() {
        let posts = posts();
        assert_eq!(vec!["c"], slugs(&search(&posts, "title c")));
        assert_eq!(vec!["b"], slugs(&search(&posts, "EXCERPT FOR B")));
        assert_eq!(vec!["b"], slugs(&search(&posts, "ownership")));
        assert_eq!(vec!["c", "a"], slugs(&search(&posts, "iar")));
        assert!(search(&posts, "zzz").is_empty());
    }

    #[test]
    fn test_empty_search_matches_nothing() {
        assert!(search(&posts(), "").is_empty());
    }

    #[test]
    fn test_scenario() {
        let p2 = post("b", "2024-02-01", None, &["y"], "");
        let p1 = post("a", "2024-01-01", None, &["x"], "");
        let sorted = vec![p2, p1];
        assert_eq!(vec!["y", "x"], tags(&sorted));
        assert_eq!(vec!["a"], slugs(&by_tag(&sorted, "x")));

        let page = paginate(&sorted, 1, 1);
        assert_eq!(vec!["b"], slugs(page.items));
        assert_eq!(2, page.total_pages);
        assert!(page.has_next);
        assert!(!page.has_prev);
    }
}
