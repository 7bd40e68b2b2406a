//! Dispatch of local creation events

use drivemirror_core::domain::NodeKind;
use drivemirror_sync::{ChangeEvent, DispatchOutcome};

use crate::common::{self, id, lp, Fixture};

#[tokio::test]
async fn test_report_in_new_directories_end_to_end() {
    let fx = Fixture::new(common::empty_store()).await;

    let event = fx.created("docs/2024/report.pdf", b"%PDF-1.7 report");
    let outcome = fx.dispatcher.dispatch(event).await.unwrap();

    let inserted = fx.store.inserted();
    assert_eq!(inserted.len(), 3);

    let (docs, year, report) = (&inserted[0], &inserted[1], &inserted[2]);
    assert_eq!((docs.label.as_str(), docs.kind), ("docs", NodeKind::Directory));
    assert_eq!(docs.parent_id, Some(id("root")));
    assert_eq!((year.label.as_str(), year.kind), ("2024", NodeKind::Directory));
    assert_eq!(year.parent_id, Some(docs.id.clone()));
    assert_eq!((report.label.as_str(), report.kind), ("report.pdf", NodeKind::File));
    assert_eq!(report.parent_id, Some(year.id.clone()));
    assert_eq!(report.content_type.as_deref(), Some("application/pdf"));
    assert_eq!(
        fx.store.content_of(&report.id),
        Some(b"%PDF-1.7 report".to_vec())
    );

    assert_eq!(outcome, DispatchOutcome::Uploaded(report.clone()));
    assert!(fx.tree.resolve(&lp("docs/2024/report.pdf")).is_found());
}

#[tokio::test]
async fn test_file_colliding_with_remote_directory_is_skipped() {
    let store = common::empty_store();
    let notes = store.seed_directory(&id("root"), "notes").unwrap();
    let fx = Fixture::new(store).await;
    let nodes_before = fx.tree.len();

    let event = fx.created("notes", b"plain file");
    let outcome = fx.dispatcher.dispatch(event).await.unwrap();

    assert_eq!(outcome, DispatchOutcome::SkippedDirectoryCollision(notes));
    assert!(fx.store.inserted().is_empty());
    assert_eq!(fx.tree.len(), nodes_before);
}

#[tokio::test]
async fn test_second_creation_of_same_file_is_already_present() {
    let fx = Fixture::new(common::empty_store()).await;

    let first = fx
        .dispatcher
        .dispatch(fx.created("a/b.txt", b"one"))
        .await
        .unwrap();
    let second = fx
        .dispatcher
        .dispatch(ChangeEvent::Created(fx.dir.path().join("a/b.txt")))
        .await
        .unwrap();

    let DispatchOutcome::Uploaded(uploaded) = first else {
        panic!("first dispatch should upload");
    };
    assert_eq!(second, DispatchOutcome::AlreadyPresent(uploaded));
    assert_eq!(fx.store.inserted().len(), 2);
}

#[tokio::test]
async fn test_existing_remote_directories_are_reused() {
    let store = common::empty_store();
    let docs = store.seed_directory(&id("root"), "docs").unwrap();
    let fx = Fixture::new(store).await;

    fx.dispatcher
        .dispatch(fx.created("docs/new/a.txt", b"a"))
        .await
        .unwrap();

    let inserted = fx.store.inserted();
    assert_eq!(inserted.len(), 2);
    assert_eq!(inserted[0].label, "new");
    assert_eq!(inserted[0].parent_id, Some(docs.id));
}

#[tokio::test]
async fn test_remote_failure_surfaces_as_error() {
    let store = common::empty_store();
    store.fail_inserts_under(&id("root"));
    let fx = Fixture::new(store).await;

    let err = fx
        .dispatcher
        .dispatch(fx.created("docs/a.txt", b"a"))
        .await
        .unwrap_err();

    assert!(err.is_remote());
    assert!(!fx.tree.resolve(&lp("docs")).is_found());
}

#[tokio::test]
async fn test_directory_creation_event_creates_nothing() {
    let fx = Fixture::new(common::empty_store()).await;
    let path = fx.dir.path().join("empty-dir");
    std::fs::create_dir(&path).unwrap();

    let outcome = fx
        .dispatcher
        .dispatch(ChangeEvent::CreatedDirectory(path))
        .await
        .unwrap();

    assert!(matches!(outcome, DispatchOutcome::Deferred(_)));
    assert!(fx.store.inserted().is_empty());
}

#[tokio::test]
async fn test_directory_moved_in_with_content_is_uploaded() {
    let fx = Fixture::new(common::empty_store()).await;
    fx.write("album/one.jpg", b"1");
    fx.write("album/raw/two.jpg", b"2");
    let album = fx.dir.path().join("album");

    let outcome = fx
        .dispatcher
        .dispatch(ChangeEvent::CreatedDirectory(album.clone()))
        .await
        .unwrap();
    assert!(matches!(outcome, DispatchOutcome::Deferred(_)));

    let (tx, mut rx) = tokio::sync::mpsc::channel(16);
    drivemirror_sync::scan::scan_new_directory(&album, &tx)
        .await
        .unwrap();
    drop(tx);
    while let Some(event) = rx.recv().await {
        let outcome = fx.dispatcher.dispatch(event).await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::Uploaded(_)));
    }

    assert!(fx.tree.resolve(&lp("album/one.jpg")).is_found());
    assert!(fx.tree.resolve(&lp("album/raw/two.jpg")).is_found());
    assert_eq!(fx.store.inserted().len(), 4);
}
