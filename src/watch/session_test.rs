use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tonic::async_trait;
use tonic::Code;
use tonic::Status;

use super::event::QuerySnapshot;
use super::event::WatchEvent;
use super::session::SessionState;
use super::session::StreamSession;
use super::WatchTarget;
use crate::network::local_listen_channel;
use crate::network::ListenStream;
use crate::network::ListenTransport;
use crate::network::MockListenTransport;
use crate::proto::ListenRequest;
use crate::test_utils::*;
use crate::Error;
use crate::Result;
use crate::Settings;
use crate::StreamError;

struct Harness {
    states: mpsc::UnboundedReceiver<SessionState>,
    events: mpsc::UnboundedReceiver<WatchEvent>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Harness {
    fn spawn(
        transport: Arc<dyn ListenTransport>,
        settings: Settings,
    ) -> Self {
        enable_logger();
        let (event_tx, events) = mpsc::unbounded_channel();
        let (state_tx, states) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let mut session = StreamSession::new(
            7,
            WatchTarget::document(key("c/a")),
            transport,
            Arc::new(settings),
            event_tx,
            cancel.clone(),
        );
        session.register_state_listener(state_tx);

        Self {
            states,
            events,
            cancel,
            handle: tokio::spawn(session.run()),
        }
    }

    async fn next_snapshot(&mut self) -> QuerySnapshot {
        match self.events.recv().await {
            Some(WatchEvent::Snapshot(snapshot)) => snapshot,
            other => panic!("expected a snapshot, got {:?}", other),
        }
    }

    async fn next_error(&mut self) -> Error {
        match self.events.recv().await {
            Some(WatchEvent::Error(e)) => e,
            other => panic!("expected an error, got {:?}", other),
        }
    }

    fn transitions(&mut self) -> Vec<SessionState> {
        let mut states = vec![];
        while let Ok(state) = self.states.try_recv() {
            states.push(state);
        }
        states
    }
}

/// Never completes an open
struct StalledTransport {
    opens: AtomicUsize,
}

#[async_trait]
impl ListenTransport for StalledTransport {
    async fn open(
        &self,
        _request: ListenRequest,
    ) -> Result<ListenStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

fn resume_token_of(request: &ListenRequest) -> Vec<u8> {
    request.added_target().map(|t| t.resume_token.clone()).unwrap_or_default()
}

#[tokio::test(start_paused = true)]
async fn reconnect_delay_should_grow_exponentially() {
    let (transport, mut server) = local_listen_channel();
    let mut harness = Harness::spawn(Arc::new(transport), test_settings());
    let start = Instant::now();

    let mut opened_at = vec![];
    for _ in 0..5 {
        let mut stream = server.accept().await.unwrap();
        opened_at.push(start.elapsed().as_millis());
        stream.fail(Status::unavailable("down"));
    }

    assert_eq!(opened_at, vec![0, 200, 600, 1400, 2400]);
    assert_eq!(
        &harness.transitions()[..4],
        &[
            SessionState::Connecting,
            SessionState::Streaming,
            SessionState::Reconnecting,
            SessionState::Connecting
        ]
    );
    harness.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn delay_should_be_capped_at_ceiling() {
    let (transport, mut server) = local_listen_channel();
    let harness = Harness::spawn(Arc::new(transport), test_settings());

    let mut last = Instant::now();
    let mut gaps = vec![];
    for _ in 0..7 {
        let mut stream = server.accept().await.unwrap();
        gaps.push(last.elapsed().as_millis());
        last = Instant::now();
        stream.fail(Status::internal("boom"));
    }

    assert_eq!(gaps, vec![0, 200, 400, 800, 1000, 1000, 1000]);
    harness.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn first_open_should_send_target_without_resume_token() {
    let (transport, mut server) = local_listen_channel();
    let harness = Harness::spawn(Arc::new(transport), test_settings());

    let mut stream = server.accept().await.unwrap();
    let request = stream.request().await.unwrap();

    assert_eq!(request.database, "projects/demo-project/databases/(default)");
    let target = request.added_target().unwrap();
    assert_eq!(target.target_id, crate::WATCH_TARGET_ID);
    assert!(target.resume_token.is_empty());
    harness.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn snapshots_should_flow_to_events() {
    let (transport, mut server) = local_listen_channel();
    let mut harness = Harness::spawn(Arc::new(transport), test_settings());

    let stream = server.accept().await.unwrap();
    stream.send(target_added());
    stream.send(doc_upserted("c/a", 1));
    stream.send(target_current());
    stream.send(consistent_at(1));

    let snapshot = harness.next_snapshot().await;
    assert_eq!(paths(snapshot.to_vec()), vec!["c/a"]);
    harness.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn resume_token_should_be_sent_on_reconnect_without_delay() {
    let (transport, mut server) = local_listen_channel();
    let mut harness = Harness::spawn(Arc::new(transport), test_settings());
    let start = Instant::now();

    let mut stream = server.accept().await.unwrap();
    stream.send(target_added());
    stream.send(target_current());
    stream.send(consistent_at(1));
    harness.next_snapshot().await;
    stream.fail(Status::unavailable("restart"));

    let mut stream = server.accept().await.unwrap();
    let request = stream.request().await.unwrap();
    assert_eq!(resume_token_of(&request), b"token-1".to_vec());
    // progress was acknowledged, so the retry is immediate
    assert_eq!(start.elapsed().as_millis(), 0);
    harness.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn clean_end_of_stream_should_reconnect() {
    let (transport, mut server) = local_listen_channel();
    let harness = Harness::spawn(Arc::new(transport), test_settings());

    let mut stream = server.accept().await.unwrap();
    stream.close();

    assert!(server.accept().await.is_some());
    harness.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn idle_stream_should_be_replaced() {
    let (transport, mut server) = local_listen_channel();
    let mut settings = test_settings();
    settings.watch.idle_timeout_ms = 5000;
    let mut harness = Harness::spawn(Arc::new(transport), settings);
    let start = Instant::now();

    let mut stream = server.accept().await.unwrap();
    stream.request().await.unwrap();
    stream.closed().await;
    assert_eq!(start.elapsed().as_millis(), 5000);

    server.accept().await.unwrap();
    assert_eq!(start.elapsed().as_millis(), 5200);
    assert_eq!(
        harness.transitions(),
        vec![
            SessionState::Connecting,
            SessionState::Streaming,
            SessionState::Reconnecting,
            SessionState::Connecting,
            SessionState::Streaming
        ]
    );
    harness.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn messages_should_keep_stream_from_idling() {
    let (transport, mut server) = local_listen_channel();
    let mut settings = test_settings();
    settings.watch.idle_timeout_ms = 5000;
    let mut harness = Harness::spawn(Arc::new(transport), settings);

    let stream = server.accept().await.unwrap();
    stream.send(target_added());
    for _ in 0..3 {
        tokio::time::sleep(std::time::Duration::from_millis(4000)).await;
        stream.send(target_current());
    }
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    assert_eq!(
        harness.transitions(),
        vec![SessionState::Connecting, SessionState::Streaming]
    );
    harness.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn resource_exhausted_should_back_off_to_ceiling() {
    let (transport, mut server) = local_listen_channel();
    let harness = Harness::spawn(Arc::new(transport), test_settings());
    let start = Instant::now();

    let mut stream = server.accept().await.unwrap();
    stream.fail(Status::resource_exhausted("quota"));
    let mut stream = server.accept().await.unwrap();
    assert_eq!(start.elapsed().as_millis(), 1000);

    // stays at the ceiling until the server acknowledges progress
    stream.fail(Status::unavailable("down"));
    server.accept().await.unwrap();
    assert_eq!(start.elapsed().as_millis(), 2000);
    harness.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn permanent_error_should_close_session() {
    let (transport, mut server) = local_listen_channel();
    let mut harness = Harness::spawn(Arc::new(transport), test_settings());

    let mut stream = server.accept().await.unwrap();
    stream.fail(Status::permission_denied("no access"));

    let e = harness.next_error().await;
    assert_eq!(e.code(), Some(Code::PermissionDenied));
    (&mut harness.handle).await.unwrap();
    assert_eq!(harness.transitions().last(), Some(&SessionState::Closed));
    // the session released the transport without retrying
    assert!(server.accept().await.is_none());
    assert!(harness.events.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn target_removal_should_close_session() {
    let (transport, mut server) = local_listen_channel();
    let mut harness = Harness::spawn(Arc::new(transport), test_settings());

    let stream = server.accept().await.unwrap();
    stream.send(target_added());
    stream.send(crate::proto::ListenResponse::target_removed(crate::WATCH_TARGET_ID, None));

    let e = harness.next_error().await;
    assert!(matches!(
        e,
        Error::Stream(StreamError::TargetRemoved {
            code: Code::Internal,
            ..
        })
    ));
    (&mut harness.handle).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn protocol_violation_should_close_session() {
    let (transport, mut server) = local_listen_channel();
    let mut harness = Harness::spawn(Arc::new(transport), test_settings());

    let stream = server.accept().await.unwrap();
    stream.send(crate::proto::ListenResponse::target_change(
        crate::proto::TargetChangeType::Add,
        vec![99],
    ));

    assert!(matches!(harness.next_error().await, Error::Protocol(_)));
    (&mut harness.handle).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn retry_budget_should_end_session() {
    let (transport, server) = local_listen_channel();
    let mut settings = test_settings();
    settings.retry.stream.max_retries = 2;
    for _ in 0..3 {
        server.fail_next_open(Status::unavailable("down"));
    }
    let mut harness = Harness::spawn(Arc::new(transport), settings);
    let start = Instant::now();

    let e = harness.next_error().await;

    assert!(matches!(e, Error::Stream(StreamError::RetriesExhausted(2))));
    assert_eq!(start.elapsed().as_millis(), 600);
    (&mut harness.handle).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn open_should_time_out() {
    let transport = Arc::new(StalledTransport {
        opens: AtomicUsize::new(0),
    });
    let mut settings = test_settings();
    settings.retry.stream.max_retries = 1;
    let mut harness = Harness::spawn(transport.clone(), settings);
    let start = Instant::now();

    let e = harness.next_error().await;

    assert!(matches!(e, Error::Stream(StreamError::RetriesExhausted(1))));
    // two opens of 1000ms each, separated by one 200ms delay
    assert_eq!(start.elapsed().as_millis(), 2200);
    assert_eq!(transport.opens.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn existence_filter_mismatch_should_restart_without_token() {
    let (transport, mut server) = local_listen_channel();
    let mut harness = Harness::spawn(Arc::new(transport), test_settings());

    let mut stream = server.accept().await.unwrap();
    stream.send(target_added());
    stream.send(doc_upserted("c/a", 1));
    stream.send(target_current());
    stream.send(consistent_at(1));
    harness.next_snapshot().await;
    stream.send(existence_filter(3));
    stream.closed().await;

    let mut stream = server.accept().await.unwrap();
    assert!(resume_token_of(&stream.request().await.unwrap()).is_empty());
    stream.send(target_added());
    stream.send(doc_upserted("c/b", 1));
    stream.send(target_current());
    stream.send(consistent_at(2));

    let snapshot = harness.next_snapshot().await;
    assert_eq!(paths(snapshot.to_vec()), vec!["c/b"]);
    let kinds: Vec<_> = snapshot.doc_changes().iter().map(|c| c.kind).collect();
    assert_eq!(kinds, vec![super::ChangeType::Removed, super::ChangeType::Added]);
    harness.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn changes_before_failure_should_be_dropped() {
    let (transport, mut server) = local_listen_channel();
    let mut harness = Harness::spawn(Arc::new(transport), test_settings());

    let mut stream = server.accept().await.unwrap();
    stream.send(target_added());
    stream.send(doc_upserted("c/lost", 1));
    stream.fail(Status::unavailable("down"));

    let stream = server.accept().await.unwrap();
    stream.send(target_added());
    stream.send(target_current());
    stream.send(consistent_at(1));

    assert!(harness.next_snapshot().await.is_empty());
    harness.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn cancel_should_end_stream_and_session() {
    let (transport, mut server) = local_listen_channel();
    let mut harness = Harness::spawn(Arc::new(transport), test_settings());

    let mut stream = server.accept().await.unwrap();
    stream.send(target_added());
    stream.send(target_current());
    stream.send(consistent_at(1));
    harness.next_snapshot().await;

    harness.cancel.cancel();
    stream.closed().await;
    (&mut harness.handle).await.unwrap();

    assert_eq!(harness.transitions().last(), Some(&SessionState::Closed));
    // no terminal error is reported for a local cancel
    assert!(harness.events.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn cancel_during_backoff_should_not_open() {
    let (transport, mut server) = local_listen_channel();
    let mut harness = Harness::spawn(Arc::new(transport), test_settings());

    let mut stream = server.accept().await.unwrap();
    stream.fail(Status::unavailable("down"));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    harness.cancel.cancel();
    (&mut harness.handle).await.unwrap();

    assert!(server.accept().await.is_none());
}

#[tokio::test]
async fn rejected_open_should_not_be_retried() {
    let mut transport = MockListenTransport::new();
    transport
        .expect_open()
        .times(1)
        .returning(|_| Err(Status::invalid_argument("bad target").into()));
    let mut harness = Harness::spawn(Arc::new(transport), test_settings());

    let e = harness.next_error().await;

    assert_eq!(e.code(), Some(Code::InvalidArgument));
    (&mut harness.handle).await.unwrap();
}
