//! Query listener ordering and server-initiated reset.
//!
//! Scenario:
//!
//! 1. Listen to a query over `rooms` ordered by update time, newest first.
//! 2. Deliver three rooms, then bump the oldest one to the newest.
//! 3. The server resets the target and re-sends a subset of the rooms.
//!
//! Expected Result:
//!
//! - Documents are always listed in query order, ties broken by key.
//! - The bump is one modification that moves from the last index to the first.
//! - After the reset only the re-sent rooms remain; the others are reported
//!   as removed before any addition.

use std::cmp::Reverse;

use listen_watch::proto::target::TargetType;
use listen_watch::ChangeType;
use listen_watch::DocumentComparator;
use listen_watch::WatchTarget;

use crate::common::*;

#[tokio::test(start_paused = true)]
async fn test_query_listener_orders_and_resets() {
    enable_logger();
    let mut ctx = TestContext::new();
    let comparator = DocumentComparator::with_order(|a, b| Reverse(a.update_time()).cmp(&Reverse(b.update_time())));
    let target = WatchTarget::query("", b"\x12\x07\x12\x05rooms".to_vec()).with_comparator(comparator);
    let mut listener = ctx.listen(target);

    let (stream, request) = ctx.accept().await;
    match request.added_target().and_then(|t| t.target_type.as_ref()) {
        Some(TargetType::Query(query)) => assert_eq!(query.parent, DOCUMENTS_ROOT),
        other => panic!("expected a query target, got {:?}", other),
    }

    send_all(
        &stream,
        vec![
            added(),
            upserted("rooms/a", 10),
            upserted("rooms/b", 20),
            upserted("rooms/c", 30),
            current(),
            consistent_at(30),
        ],
    );
    let snapshot = listener.next_snapshot().await;
    assert_eq!(paths(&snapshot), vec!["rooms/c", "rooms/b", "rooms/a"]);
    let new_indexes: Vec<_> = snapshot.doc_changes().iter().map(|c| c.new_index).collect();
    assert_eq!(new_indexes, vec![Some(0), Some(1), Some(2)]);

    send_all(&stream, vec![upserted("rooms/a", 40), consistent_at(40)]);
    let snapshot = listener.next_snapshot().await;
    assert_eq!(paths(&snapshot), vec!["rooms/a", "rooms/c", "rooms/b"]);
    let change = &snapshot.doc_changes()[0];
    assert_eq!(change.kind, ChangeType::Modified);
    assert_eq!((change.old_index, change.new_index), (Some(2), Some(0)));

    send_all(
        &stream,
        vec![
            reset(),
            upserted("rooms/a", 40),
            upserted("rooms/d", 50),
            current(),
            consistent_at(50),
        ],
    );
    let snapshot = listener.next_snapshot().await;
    assert_eq!(paths(&snapshot), vec!["rooms/d", "rooms/a"]);
    let summary: Vec<_> = snapshot
        .doc_changes()
        .iter()
        .map(|c| (c.kind, c.document.key().path().to_string()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (ChangeType::Removed, "rooms/c".to_string()),
            (ChangeType::Removed, "rooms/b".to_string()),
            (ChangeType::Added, "rooms/d".to_string()),
        ]
    );
}
