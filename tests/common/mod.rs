use std::sync::Arc;
use std::time::Duration;

use listen_watch::local_listen_channel;
use listen_watch::proto::Document;
use listen_watch::proto::ListenRequest;
use listen_watch::proto::ListenResponse;
use listen_watch::proto::TargetChangeType;
use listen_watch::proto::Timestamp;
use listen_watch::BackoffPolicy;
use listen_watch::Error;
use listen_watch::LocalListenServer;
use listen_watch::QuerySnapshot;
use listen_watch::ServerStream;
use listen_watch::Settings;
use listen_watch::Subscription;
use listen_watch::Watch;
use listen_watch::WatchTarget;
use listen_watch::WATCH_TARGET_ID;
use tokio::sync::mpsc;
use tokio::time::timeout;

pub const DOCUMENTS_ROOT: &str = "projects/demo-project/databases/(default)/documents";

/// Upper bound for any single wait in paused time
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(600);

/// A watch over the in-process transport, with deterministic backoff:
/// 100ms doubling up to 1s, no jitter, unlimited retries.
pub struct TestContext {
    pub watch: Watch,
    pub server: LocalListenServer,
}

impl TestContext {
    pub fn new() -> Self {
        let mut settings = Settings::default();
        settings.retry.stream = BackoffPolicy {
            max_retries: 0,
            timeout_ms: 1000,
            base_delay_ms: 100,
            max_delay_ms: 1000,
            multiplier: 2.0,
            jitter_factor: 0.0,
        };
        let (transport, server) = local_listen_channel();

        Self {
            watch: Watch::new(Arc::new(transport), Arc::new(settings)),
            server,
        }
    }

    pub fn listen(
        &self,
        target: WatchTarget,
    ) -> Listener {
        let (snapshot_tx, snapshots) = mpsc::unbounded_channel();
        let (error_tx, errors) = mpsc::unbounded_channel();
        let subscription = self.watch.on_snapshot(
            target,
            move |snapshot| {
                let _ = snapshot_tx.send(snapshot);
            },
            move |e| {
                let _ = error_tx.send(e);
            },
        );

        Listener {
            subscription,
            snapshots,
            errors,
        }
    }

    /// Next stream opened by a subscription, together with its add-target request
    pub async fn accept(&mut self) -> (ServerStream, ListenRequest) {
        let mut stream = timeout(WAIT_TIMEOUT, self.server.accept())
            .await
            .expect("no stream opened")
            .expect("transport dropped");
        let request = stream.request().await.expect("stream opened without a request");
        (stream, request)
    }
}

pub struct Listener {
    pub subscription: Subscription,
    pub snapshots: mpsc::UnboundedReceiver<QuerySnapshot>,
    pub errors: mpsc::UnboundedReceiver<Error>,
}

impl Listener {
    pub async fn next_snapshot(&mut self) -> QuerySnapshot {
        timeout(WAIT_TIMEOUT, self.snapshots.recv())
            .await
            .expect("no snapshot delivered")
            .expect("subscription ended")
    }

    pub async fn next_error(&mut self) -> Error {
        timeout(WAIT_TIMEOUT, self.errors.recv())
            .await
            .expect("no error delivered")
            .expect("subscription ended without error")
    }
}

pub fn enable_logger() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// -
// Server messages

pub fn document(
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

pub fn added() -> ListenResponse {
    ListenResponse::target_change(TargetChangeType::Add, vec![WATCH_TARGET_ID])
}

pub fn current() -> ListenResponse {
    ListenResponse::target_change(TargetChangeType::Current, vec![WATCH_TARGET_ID])
}

pub fn reset() -> ListenResponse {
    ListenResponse::target_change(TargetChangeType::Reset, vec![WATCH_TARGET_ID])
}

pub fn consistent_at(seconds: i64) -> ListenResponse {
    ListenResponse::global_snapshot(Timestamp::new(seconds, 0), token(seconds))
}

pub fn token(seconds: i64) -> Vec<u8> {
    format!("resume-{seconds}").into_bytes()
}

pub fn upserted(
    path: &str,
    update_seconds: i64,
) -> ListenResponse {
    ListenResponse::document_changed(document(path, update_seconds), vec![WATCH_TARGET_ID], vec![])
}

pub fn deleted(path: &str) -> ListenResponse {
    ListenResponse::document_deleted(format!("{}/{}", DOCUMENTS_ROOT, path))
}

pub fn filter(count: i32) -> ListenResponse {
    ListenResponse::existence_filter(WATCH_TARGET_ID, count)
}

pub fn send_all(
    stream: &ServerStream,
    responses: Vec<ListenResponse>,
) {
    for response in responses {
        assert!(stream.send(response), "client hung up");
    }
}

pub fn resume_token(request: &ListenRequest) -> Vec<u8> {
    request
        .added_target()
        .map(|target| target.resume_token.clone())
        .unwrap_or_default()
}

pub fn paths(snapshot: &QuerySnapshot) -> Vec<String> {
    snapshot.docs().map(|doc| doc.key().path().to_string()).collect()
}
