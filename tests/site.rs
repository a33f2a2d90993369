use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use kiroku::config::{Config, PROJECT_FILE};
use kiroku::export::export_site;
use kiroku::site::{Route, Site};

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn project(root: &Path) {
    write(
        &root.join(PROJECT_FILE),
        "title: Integration\nsite_url: https://blog.example.org/\npage_size: 1\nload_mode: lenient\n",
    );
    write(
        &root.join("posts/one.md"),
        "---\ntitle: One\nslug: one\ndate: 2024-01-01\ncategory: Notes\ntags: [x]\n---\nfirst post about Hono\n",
    );
    write(
        &root.join("posts/two.md"),
        "---\ntitle: Two\nslug: two\ndate: 2024-02-01\ntags: [y]\n---\nsecond post\n",
    );
    write(&root.join("posts/broken.md"), "---\ntitle: no end fence\n");
    write(&root.join("posts/notes.txt"), "ignored");
}

#[test]
fn serves_and_exports_the_same_pages() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    project(root);

    let site = Site::from_config(Config::from_directory(root).unwrap()).unwrap();

    let snapshot = site.repository().load_all();
    let slugs: Vec<&str> = snapshot.posts().iter().map(|p| p.slug.as_str()).collect();
    assert_eq!(vec!["two", "one"], slugs);
    assert_eq!(1, snapshot.warnings().len());
    assert_eq!(Some("broken.md"), snapshot.warnings()[0].file());

    let page_two = site.respond("/blog?page=2");
    assert_eq!(200, page_two.status);
    let page_two = String::from_utf8(page_two.body).unwrap();
    assert!(page_two.contains("/blog/one") && !page_two.contains("/blog/two\""));

    let out = root.join("dist");
    export_site(&site, &out).unwrap();
    let exported = fs::read(out.join("blog/page/2/index.html")).unwrap();
    assert_eq!(site.render(&Route::Blog { page: 2 }).unwrap().body, exported);

    let feed = fs::read_to_string(out.join("feed.atom")).unwrap();
    assert!(feed.contains("https://blog.example.org/blog/one"));

    // everything above was served from a single scan
    assert_eq!(1, site.repository().scan_count());
}

#[test]
fn concurrent_requests_share_one_load() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    project(root);

    let site = Arc::new(Site::from_config(Config::from_directory(root).unwrap()).unwrap());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let site = Arc::clone(&site);
            thread::spawn(move || {
                let target = match i % 2 {
                    0 => "/blog/one",
                    _ => "/search?q=hono",
                };
                site.respond(target).status
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(200, handle.join().unwrap());
    }
    assert_eq!(1, site.repository().scan_count());
}

#[test]
fn cleared_cache_picks_up_new_posts() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    project(root);
    let site = Site::from_config(Config::from_directory(root).unwrap()).unwrap();

    assert_eq!(404, site.respond("/blog/three").status);
    write(
        &root.join("posts/three.md"),
        "---\ntitle: Three\nslug: three\ndate: 2024-03-01\n---\n",
    );
    assert_eq!(404, site.respond("/blog/three").status);

    site.repository().clear_cache();
    assert_eq!(200, site.respond("/blog/three").status);
    assert_eq!(2, site.repository().scan_count());
}
