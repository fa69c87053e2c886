//! Stream recovery.
//!
//! Scenario A: the stream drops after a consistent point. The listener
//! re-opens immediately with the last resume token and the server continues
//! from there.
//!
//! Scenario B: an existence filter disagrees with the client's count. The
//! listener forgets its token, opens a fresh stream, and the next snapshot
//! reconciles the full result set against what was delivered.
//!
//! Scenario C: the server revokes the target. The error reaches `on_error`
//! once and the subscription ends.

use listen_watch::ChangeType;
use listen_watch::DocumentKey;
use listen_watch::WatchTarget;
use tonic::Code;
use tonic::Status;

use crate::common::*;

fn rooms() -> WatchTarget {
    WatchTarget::query("", b"rooms".to_vec())
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_resumes_from_last_token() {
    enable_logger();
    let mut ctx = TestContext::new();
    let mut listener = ctx.listen(rooms());

    let (mut stream, _) = ctx.accept().await;
    send_all(&stream, vec![added(), upserted("rooms/a", 1), current(), consistent_at(1)]);
    assert_eq!(listener.next_snapshot().await.size(), 1);

    // changes after the last consistent point are lost with the stream
    send_all(&stream, vec![upserted("rooms/lost", 2)]);
    stream.fail(Status::unavailable("connection reset"));

    let (stream, request) = ctx.accept().await;
    assert_eq!(resume_token(&request), token(1));
    send_all(&stream, vec![added(), upserted("rooms/b", 3), current(), consistent_at(3)]);

    let snapshot = listener.next_snapshot().await;
    assert_eq!(paths(&snapshot), vec!["rooms/a", "rooms/b"]);
    assert_eq!(snapshot.doc_changes().len(), 1);
    assert_eq!(snapshot.doc_changes()[0].kind, ChangeType::Added);
    assert!(listener.errors.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_existence_filter_mismatch_resyncs() {
    enable_logger();
    let mut ctx = TestContext::new();
    let mut listener = ctx.listen(rooms());

    let (mut stream, _) = ctx.accept().await;
    send_all(
        &stream,
        vec![added(), upserted("rooms/a", 1), upserted("rooms/b", 1), current(), consistent_at(1)],
    );
    assert_eq!(listener.next_snapshot().await.size(), 2);

    // rooms/a was deleted while the client missed it
    send_all(&stream, vec![filter(1)]);
    stream.closed().await;

    let (stream, request) = ctx.accept().await;
    assert!(resume_token(&request).is_empty());
    send_all(&stream, vec![added(), upserted("rooms/b", 1), current(), consistent_at(2)]);

    let snapshot = listener.next_snapshot().await;
    assert_eq!(paths(&snapshot), vec!["rooms/b"]);
    let kinds: Vec<_> = snapshot.doc_changes().iter().map(|c| c.kind).collect();
    assert_eq!(kinds, vec![ChangeType::Removed]);
    assert_eq!(snapshot.doc_changes()[0].document.key().path(), "rooms/a");
}

#[tokio::test(start_paused = true)]
async fn test_target_removal_ends_subscription() {
    enable_logger();
    let mut ctx = TestContext::new();
    let mut listener = ctx.listen(WatchTarget::document(DocumentKey::new("rooms/secret").unwrap()));

    let (stream, _) = ctx.accept().await;
    send_all(
        &stream,
        vec![listen_watch::proto::ListenResponse::target_removed(
            listen_watch::WATCH_TARGET_ID,
            Some(listen_watch::proto::Status {
                code: Code::PermissionDenied as i32,
                message: "missing or insufficient permissions".to_string(),
            }),
        )],
    );

    let e = listener.next_error().await;
    assert_eq!(e.code(), Some(Code::PermissionDenied));
    assert!(!e.is_retryable());
    assert!(listener.snapshots.recv().await.is_none());
    assert!(!listener.subscription.is_active());
    assert_eq!(ctx.watch.active_subscriptions(), 0);
}
