//! Single-document listener lifecycle.
//!
//! Scenario:
//!
//! 1. Listen to `rooms/eros`, which does not exist yet.
//! 2. The server confirms the target without documents.
//! 3. The document is created, modified, then deleted, each followed by a
//!    consistent point.
//!
//! Expected Result:
//!
//! - The first snapshot is delivered although it is empty.
//! - Each later snapshot carries exactly one change (added, modified,
//!   removed) with matching indexes.
//! - Consistent points without changes deliver nothing.

use listen_watch::ChangeType;
use listen_watch::DocumentKey;
use listen_watch::WatchTarget;

use crate::common::*;

#[tokio::test(start_paused = true)]
async fn test_document_listener_lifecycle() {
    enable_logger();
    let mut ctx = TestContext::new();
    let mut listener = ctx.listen(WatchTarget::document(DocumentKey::new("rooms/eros").unwrap()));

    let (stream, request) = ctx.accept().await;
    assert!(resume_token(&request).is_empty());

    send_all(&stream, vec![added(), current(), consistent_at(1)]);
    let snapshot = listener.next_snapshot().await;
    assert!(snapshot.is_empty());
    assert!(snapshot.doc_changes().is_empty());

    // nothing changed
    send_all(&stream, vec![consistent_at(2)]);

    send_all(&stream, vec![upserted("rooms/eros", 3), consistent_at(3)]);
    let snapshot = listener.next_snapshot().await;
    assert_eq!(snapshot.read_time().seconds, 3);
    assert_eq!(paths(&snapshot), vec!["rooms/eros"]);
    let change = &snapshot.doc_changes()[0];
    assert_eq!(change.kind, ChangeType::Added);
    assert_eq!((change.old_index, change.new_index), (None, Some(0)));
    assert_eq!(change.document.read_time().map(|t| t.seconds), Some(3));

    send_all(&stream, vec![upserted("rooms/eros", 4), consistent_at(4)]);
    let snapshot = listener.next_snapshot().await;
    let change = &snapshot.doc_changes()[0];
    assert_eq!(change.kind, ChangeType::Modified);
    assert_eq!(change.document.update_time().seconds, 4);

    send_all(&stream, vec![deleted("rooms/eros"), consistent_at(5)]);
    let snapshot = listener.next_snapshot().await;
    assert!(snapshot.is_empty());
    let change = &snapshot.doc_changes()[0];
    assert_eq!(change.kind, ChangeType::Removed);
    assert_eq!((change.old_index, change.new_index), (Some(0), None));

    // the empty consistent point at 2 produced no snapshot
    assert!(listener.snapshots.try_recv().is_err());
    assert!(listener.subscription.is_active());
}
