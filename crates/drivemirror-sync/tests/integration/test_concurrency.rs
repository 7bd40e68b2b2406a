//! Concurrent dispatch of events sharing missing ancestors

use std::time::Duration;

use drivemirror_core::domain::NodeKind;
use drivemirror_core::ports::InMemoryRemoteStore;
use drivemirror_sync::DispatchOutcome;

use crate::common::{id, lp, Fixture};

fn slow_store() -> InMemoryRemoteStore {
    InMemoryRemoteStore::new(id("root")).with_insert_delay(Duration::from_millis(50))
}

#[tokio::test]
async fn test_siblings_in_missing_directory_create_it_once() {
    let fx = Fixture::new(slow_store()).await;
    let a = fx.created("x/a.txt", b"a");
    let b = fx.created("x/b.txt", b"b");

    let (ra, rb) = tokio::join!(fx.dispatcher.dispatch(a), fx.dispatcher.dispatch(b));
    assert!(matches!(ra.unwrap(), DispatchOutcome::Uploaded(_)));
    assert!(matches!(rb.unwrap(), DispatchOutcome::Uploaded(_)));

    let directories: Vec<_> = fx
        .store
        .inserted()
        .into_iter()
        .filter(|i| i.kind == NodeKind::Directory)
        .collect();
    assert_eq!(directories.len(), 1);
    assert_eq!(directories[0].label, "x");

    let x = fx.tree.resolve(&lp("x")).found().cloned().unwrap();
    let children = fx.tree.children_of(&x.id).unwrap();
    assert_eq!(children.len(), 2);
}

#[tokio::test]
async fn test_spawned_dispatches_share_deep_chain() {
    let fx = Fixture::new(slow_store()).await;
    let events: Vec<_> = (0..8)
        .map(|n| fx.created(&format!("deep/er/file-{n}.txt"), b"n"))
        .collect();

    let handles: Vec<_> = events
        .into_iter()
        .map(|event| {
            let dispatcher = fx.dispatcher.clone();
            tokio::spawn(async move { dispatcher.dispatch(event).await })
        })
        .collect();
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert!(matches!(outcome, DispatchOutcome::Uploaded(_)));
    }

    let inserted = fx.store.inserted();
    let labels: Vec<_> = inserted
        .iter()
        .filter(|i| i.kind == NodeKind::Directory)
        .map(|i| i.label.as_str())
        .collect();
    assert_eq!(labels, vec!["deep", "er"]);
    assert_eq!(inserted.len(), 10);
}

#[tokio::test]
async fn test_different_directories_proceed_independently() {
    let fx = Fixture::new(slow_store()).await;
    let a = fx.created("left/a.txt", b"a");
    let b = fx.created("right/b.txt", b"b");

    let (ra, rb) = tokio::join!(fx.dispatcher.dispatch(a), fx.dispatcher.dispatch(b));
    ra.unwrap();
    rb.unwrap();

    assert!(fx.tree.resolve(&lp("left/a.txt")).is_found());
    assert!(fx.tree.resolve(&lp("right/b.txt")).is_found());
    assert_eq!(fx.store.inserted().len(), 4);
}

#[tokio::test]
async fn test_same_file_dispatched_twice_uploads_once() {
    let fx = Fixture::new(slow_store()).await;
    let path = fx.write("new/report.pdf", b"%PDF");

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let dispatcher = fx.dispatcher.clone();
            let event = drivemirror_sync::ChangeEvent::Created(path.clone());
            tokio::spawn(async move { dispatcher.dispatch(event).await })
        })
        .collect();

    let mut uploaded = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            DispatchOutcome::Uploaded(_) => uploaded += 1,
            DispatchOutcome::AlreadyPresent(item) => assert_eq!(item.label, "report.pdf"),
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!(uploaded, 1);

    let files: Vec<_> = fx
        .store
        .inserted()
        .into_iter()
        .filter(|i| i.kind == NodeKind::File)
        .collect();
    assert_eq!(files.len(), 1);
    assert_eq!(fx.dispatcher.uploads_in_progress(), 0);
}
