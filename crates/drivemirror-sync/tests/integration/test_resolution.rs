//! Resolution and materialization against a hydrated mirror

use std::sync::Arc;

use drivemirror_core::domain::{LabelPath, NodeKind, RemoteItem};
use drivemirror_core::ports::InMemoryRemoteStore;
use drivemirror_sync::{Materializer, Resolution, Uploader};

use crate::common::{self, id, lp};

/// Builds a store with nested directories, files and a homonymous
/// file/directory pair, returning it with every label-path it contains
fn populated_store() -> (InMemoryRemoteStore, Vec<(&'static str, &'static str)>) {
    let store = common::empty_store();
    let seeds = [
        RemoteItem::directory(id("docs"), "docs", Some(id("root"))),
        RemoteItem::directory(id("docs-2024"), "2024", Some(id("docs"))),
        RemoteItem::file(id("report"), "report.pdf", id("docs-2024"), "application/pdf"),
        RemoteItem::directory(id("docs-2023"), "2023", Some(id("docs"))),
        RemoteItem::file(id("old"), "old.txt", id("docs-2023"), "text/plain"),
        RemoteItem::directory(id("photos"), "photos", Some(id("root"))),
        RemoteItem::directory(id("trip"), "trip", Some(id("photos"))),
        RemoteItem::file(id("beach"), "beach.jpg", id("trip"), "image/jpeg"),
        RemoteItem::file(id("readme"), "README", id("root"), "text/plain"),
    ];
    for item in seeds {
        store.seed(item).unwrap();
    }

    let paths = vec![
        ("docs", "docs"),
        ("docs/2024", "docs-2024"),
        ("docs/2024/report.pdf", "report"),
        ("docs/2023", "docs-2023"),
        ("docs/2023/old.txt", "old"),
        ("photos", "photos"),
        ("photos/trip", "trip"),
        ("photos/trip/beach.jpg", "beach"),
        ("README", "readme"),
    ];
    (store, paths)
}

#[tokio::test]
async fn test_every_label_path_resolves_to_its_node() {
    let (store, paths) = populated_store();
    let store = Arc::new(store);
    let tree = common::mirror(&store).await;

    for (path, expected) in paths {
        match tree.resolve(&lp(path)) {
            Resolution::Found(node) => assert_eq!(node.item.id, id(expected), "path {path}"),
            Resolution::NotFound(_) => panic!("{path} should resolve"),
        }
    }
}

#[tokio::test]
async fn test_absent_label_paths_are_not_found() {
    let (store, _) = populated_store();
    let store = Arc::new(store);
    let tree = common::mirror(&store).await;

    for path in [
        "doc",
        "docs/2025",
        "docs/2024/report.pdf.bak",
        "photos/beach.jpg",
        "README/inner",
        "Docs",
    ] {
        assert!(!tree.resolve(&lp(path)).is_found(), "{path} should not resolve");
    }
}

#[tokio::test]
async fn test_materialize_existing_path_creates_nothing() {
    let (store, _) = populated_store();
    let store = Arc::new(store);
    let tree = common::mirror(&store).await;
    let materializer = Materializer::new(tree);

    let item = materializer.materialize(&lp("photos/trip")).await.unwrap();

    assert_eq!(item.id, id("trip"));
    assert!(store.inserted().is_empty());
}

#[tokio::test]
async fn test_chain_for_file_path_creates_two_directories_in_order() {
    let store = Arc::new(common::empty_store());
    let tree = common::mirror(&store).await;
    let materializer = Materializer::new(Arc::clone(&tree));

    let parent = materializer
        .materialize_parent_of(&lp("a/b/c"))
        .await
        .unwrap();

    let inserted = store.inserted();
    assert_eq!(inserted.len(), 2);
    assert_eq!((inserted[0].label.as_str(), inserted[0].kind), ("a", NodeKind::Directory));
    assert_eq!(inserted[0].parent_id, Some(id("root")));
    assert_eq!((inserted[1].label.as_str(), inserted[1].kind), ("b", NodeKind::Directory));
    assert_eq!(inserted[1].parent_id, Some(inserted[0].id.clone()));
    assert_eq!(parent, inserted[1]);

    // Both are now part of the mirror
    assert_eq!(tree.resolve(&lp("a")).found(), Some(&inserted[0]));
    assert_eq!(tree.resolve(&lp("a/b")).found(), Some(&inserted[1]));
}

#[tokio::test]
async fn test_upload_then_resolve_round_trip() {
    let store = Arc::new(common::empty_store());
    let tree = common::mirror(&store).await;
    let materializer = Materializer::new(Arc::clone(&tree));
    let uploader = Uploader::new(Arc::clone(&tree));

    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("c.txt");
    std::fs::write(&local, b"content").unwrap();

    let parent = materializer.materialize(&lp("a/b")).await.unwrap();
    let uploaded = uploader.upload(&local, &parent).await.unwrap();

    match tree.resolve(&lp("a/b/c.txt")) {
        Resolution::Found(node) => {
            assert_eq!(node.item, uploaded);
            assert_eq!(node.label_path, lp("a/b/c.txt"));
        }
        Resolution::NotFound(_) => panic!("uploaded file should resolve"),
    }
}

#[tokio::test]
async fn test_incomplete_mirror_still_resolves_fetched_branches() {
    let (store, _) = populated_store();
    store.fail_list_of(&id("photos"));
    let store = Arc::new(store);
    let tree = common::mirror(&store).await;

    assert!(tree.resolve(&lp("docs/2024/report.pdf")).is_found());
    assert!(tree.resolve(&lp("photos")).is_found());
    match tree.resolve(&lp("photos/trip")) {
        Resolution::NotFound(ancestor) => {
            assert_eq!(ancestor.item.id, id("photos"));
            assert_eq!(ancestor.label_path, lp("photos"));
        }
        Resolution::Found(_) => panic!("unfetched branch should not resolve"),
    }
    assert_eq!(tree.resolve(&LabelPath::root()).found().map(|i| i.id.clone()), Some(id("root")));
}
