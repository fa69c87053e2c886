//! Shared fixtures for unit tests: logger setup, settings tuned for paused
//! time, and builders for Listen protocol messages.
use once_cell::sync::Lazy;
use tracing_subscriber::EnvFilter;

use crate::constants::WATCH_TARGET_ID;
use crate::document::DocumentKey;
use crate::document::DocumentSnapshot;
use crate::proto::Document;
use crate::proto::ListenResponse;
use crate::proto::TargetChangeType;
use crate::proto::Timestamp;
use crate::BackoffPolicy;
use crate::Settings;

pub(crate) const DOCUMENTS_ROOT: &str = "projects/demo-project/databases/(default)/documents";

static LOGGER_INIT: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub(crate) fn enable_logger() {
    Lazy::force(&LOGGER_INIT);
}

/// Defaults with deterministic, short backoff: 100ms doubling up to 1s, no jitter
pub(crate) fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.retry.stream = BackoffPolicy {
        max_retries: 0,
        timeout_ms: 1000,
        base_delay_ms: 100,
        max_delay_ms: 1000,
        multiplier: 2.0,
        jitter_factor: 0.0,
    };
    settings
}

pub(crate) fn key(path: &str) -> DocumentKey {
    DocumentKey::new(path).unwrap()
}

pub(crate) fn wire_doc(
    path: &str,
    update_seconds: i64,
) -> Document {
    Document {
        name: format!("{}/{}", DOCUMENTS_ROOT, path),
        fields: vec![],
        create_time: Some(Timestamp::new(1, 0)),
        update_time: Some(Timestamp::new(update_seconds, 0)),
    }
}

pub(crate) fn doc(
    path: &str,
    update_seconds: i64,
) -> DocumentSnapshot {
    DocumentSnapshot::from_proto(wire_doc(path, update_seconds)).unwrap()
}

// -
// Server messages for the watch target

pub(crate) fn target_added() -> ListenResponse {
    ListenResponse::target_change(TargetChangeType::Add, vec![WATCH_TARGET_ID])
}

pub(crate) fn target_current() -> ListenResponse {
    ListenResponse::target_change(TargetChangeType::Current, vec![WATCH_TARGET_ID])
}

pub(crate) fn target_reset() -> ListenResponse {
    ListenResponse::target_change(TargetChangeType::Reset, vec![WATCH_TARGET_ID])
}

/// Global NO_CHANGE at `seconds`, carrying resume token `token-{seconds}`
pub(crate) fn consistent_at(seconds: i64) -> ListenResponse {
    ListenResponse::global_snapshot(Timestamp::new(seconds, 0), format!("token-{seconds}").into_bytes())
}

pub(crate) fn doc_upserted(
    path: &str,
    update_seconds: i64,
) -> ListenResponse {
    ListenResponse::document_changed(wire_doc(path, update_seconds), vec![WATCH_TARGET_ID], vec![])
}

pub(crate) fn doc_left_target(path: &str) -> ListenResponse {
    ListenResponse::document_changed(wire_doc(path, 1), vec![], vec![WATCH_TARGET_ID])
}

pub(crate) fn doc_deleted(path: &str) -> ListenResponse {
    ListenResponse::document_deleted(format!("{}/{}", DOCUMENTS_ROOT, path))
}

pub(crate) fn doc_removed(path: &str) -> ListenResponse {
    ListenResponse::document_removed(format!("{}/{}", DOCUMENTS_ROOT, path), vec![WATCH_TARGET_ID])
}

pub(crate) fn existence_filter(count: i32) -> ListenResponse {
    ListenResponse::existence_filter(WATCH_TARGET_ID, count)
}

pub(crate) fn paths(docs: impl IntoIterator<Item = DocumentSnapshot>) -> Vec<String> {
    docs.into_iter().map(|d| d.key().path().to_string()).collect()
}
