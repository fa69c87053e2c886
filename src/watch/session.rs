use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep_until;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tonic::Code;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::event::WatchEvent;
use super::idle_timer::IdleTimer;
use super::reconciler::WatchState;
use super::target::WatchTarget;
use crate::constants::WATCH_TARGET_ID;
use crate::metrics::DOCUMENT_CHANGES;
use crate::metrics::EXISTENCE_FILTER_MISMATCHES;
use crate::metrics::LISTEN_STREAMS_OPENED;
use crate::metrics::LISTEN_STREAM_ERRORS;
use crate::metrics::SNAPSHOTS_DELIVERED;
use crate::network::ListenStream;
use crate::network::ListenTransport;
use crate::proto::ListenRequest;
use crate::utils::backoff::ExponentialBackoff;
use crate::Error;
use crate::Result;
use crate::Settings;
use crate::StreamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// Waiting out the backoff delay, then opening a stream
    Connecting,
    Streaming,
    /// A stream failed with a retryable error
    Reconnecting,
    Closed,
}

/// How a stream stopped without failing
enum StreamExit {
    Cancelled,
    /// Local state was reset; a brand-new stream is required
    Resync,
}

/// Drives one subscription's listen streams until cancelled or a terminal
/// error.
///
/// Owns at most one open stream at a time. Every server message is applied
/// to the [`WatchState`] in arrival order; snapshots and the terminal error
/// leave through `events`.
pub(crate) struct StreamSession {
    subscription_id: u64,
    target: WatchTarget,
    transport: Arc<dyn ListenTransport>,
    settings: Arc<Settings>,

    state: SessionState,
    watch: WatchState,
    backoff: ExponentialBackoff,
    idle_timer: IdleTimer,

    events: mpsc::UnboundedSender<WatchEvent>,
    cancel: CancellationToken,

    // For unit test
    #[cfg(test)]
    test_state_listener: Vec<mpsc::UnboundedSender<SessionState>>,
}

impl StreamSession {
    pub(crate) fn new(
        subscription_id: u64,
        target: WatchTarget,
        transport: Arc<dyn ListenTransport>,
        settings: Arc<Settings>,
        events: mpsc::UnboundedSender<WatchEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let watch = WatchState::new(WATCH_TARGET_ID, target.comparator());
        let backoff = ExponentialBackoff::new(settings.retry.stream);
        let idle_timer = IdleTimer::new(settings.watch.idle_timeout());

        Self {
            subscription_id,
            target,
            transport,
            settings,
            state: SessionState::Idle,
            watch,
            backoff,
            idle_timer,
            events,
            cancel,
            #[cfg(test)]
            test_state_listener: Vec::new(),
        }
    }

    pub(crate) async fn run(mut self) {
        info!(subscription_id = self.subscription_id, "listen session started");
        self.set_state(SessionState::Connecting);

        loop {
            let exit = match self.open_stream().await {
                Ok(Some(stream)) => {
                    LISTEN_STREAMS_OPENED.inc();
                    self.set_state(SessionState::Streaming);
                    self.consume(stream).await
                }
                Ok(None) => Ok(StreamExit::Cancelled),
                Err(e) => Err(e),
            };

            match exit {
                Ok(StreamExit::Cancelled) => break,
                Ok(StreamExit::Resync) => {
                    EXISTENCE_FILTER_MISMATCHES.inc();
                    self.set_state(SessionState::Connecting);
                }
                Err(e) => {
                    if !self.recover(e) {
                        break;
                    }
                }
            }
        }

        self.set_state(SessionState::Closed);
        info!(subscription_id = self.subscription_id, "listen session closed");
    }

    /// Waits out the backoff delay and opens a stream registering the target.
    ///
    /// Returns `Ok(None)` when cancelled first.
    async fn open_stream(&mut self) -> Result<Option<ListenStream>> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(None),
            _ = self.backoff.backoff_and_wait() => {}
        }

        let request = ListenRequest::add_target(
            self.settings.database.formatted_name(),
            self.target
                .to_proto(&self.settings.database, WATCH_TARGET_ID, self.watch.resume_token()),
        );
        let open_timeout = Duration::from_millis(self.backoff.policy().timeout_ms);
        debug!(
            subscription_id = self.subscription_id,
            resuming = self.watch.resume_token().is_some(),
            "opening listen stream"
        );

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Ok(None),
            result = timeout(open_timeout, self.transport.open(request)) => match result {
                Ok(Ok(stream)) => Ok(Some(stream)),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(StreamError::Status {
                    code: Code::DeadlineExceeded,
                    message: format!("listen stream did not open within {:?}", open_timeout),
                }
                .into()),
            },
        }
    }

    /// Reads `stream` until it fails, the session is cancelled or a resync
    /// is required.
    async fn consume(
        &mut self,
        mut stream: ListenStream,
    ) -> Result<StreamExit> {
        self.idle_timer.reset();

        loop {
            let item = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                _ = sleep_until(self.idle_timer.deadline()) => {
                    stream.end();
                    return Err(StreamError::Idle(self.idle_timer.timeout()).into());
                }
                item = stream.next() => Some(item),
            };

            // Messages arriving after deactivation are dropped unprocessed
            let Some(item) = item.filter(|_| !self.cancel.is_cancelled()) else {
                stream.end();
                return Ok(StreamExit::Cancelled);
            };

            let response = match item {
                Some(Ok(response)) => response,
                Some(Err(e)) => return Err(e),
                None => return Err(StreamError::Ended.into()),
            };
            self.idle_timer.reset();

            let outcome = self.watch.handle_response(response)?;
            if outcome.reset_backoff {
                self.backoff.reset();
            }
            if let Some(snapshot) = outcome.snapshot {
                SNAPSHOTS_DELIVERED.inc();
                for change in snapshot.doc_changes() {
                    DOCUMENT_CHANGES.with_label_values(&[change.kind.as_str()]).inc();
                }
                debug!(
                    subscription_id = self.subscription_id,
                    read_time = %snapshot.read_time(),
                    size = snapshot.size(),
                    changes = snapshot.doc_changes().len(),
                    "snapshot ready"
                );
                if self.events.send(WatchEvent::Snapshot(snapshot)).is_err() {
                    stream.end();
                    return Ok(StreamExit::Cancelled);
                }
            }
            if outcome.resync {
                stream.end();
                return Ok(StreamExit::Resync);
            }
        }
    }

    /// Decides whether `e` ends the session. Returns `true` when the session
    /// should open a new stream.
    fn recover(
        &mut self,
        e: Error,
    ) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        if !e.is_retryable() {
            LISTEN_STREAM_ERRORS.with_label_values(&["permanent"]).inc();
            self.close_with_error(e);
            return false;
        }

        LISTEN_STREAM_ERRORS.with_label_values(&["transient"]).inc();
        self.set_state(SessionState::Reconnecting);
        warn!(
            subscription_id = self.subscription_id,
            code = ?e.code(),
            failures = self.backoff.failures(),
            "listen stream failed, reconnecting: {}", e
        );

        if e.is_resource_exhausted() {
            self.backoff.reset_to_max();
        }
        self.watch.clear_pending();

        if let Err(exhausted) = self.backoff.record_failure() {
            self.close_with_error(exhausted);
            return false;
        }
        self.set_state(SessionState::Connecting);
        true
    }

    fn close_with_error(
        &mut self,
        e: Error,
    ) {
        error!(
            subscription_id = self.subscription_id,
            code = ?e.code(),
            "listen session failed: {}", e
        );
        // Receiver is gone when the subscriber already unsubscribed
        let _ = self.events.send(WatchEvent::Error(e));
    }

    fn set_state(
        &mut self,
        state: SessionState,
    ) {
        if self.state == state {
            return;
        }
        debug!(
            subscription_id = self.subscription_id,
            from = ?self.state,
            to = ?state,
            "session state transition"
        );
        self.state = state;

        #[cfg(test)]
        self.notify_state_transition(state);
    }

    #[cfg(test)]
    pub(crate) fn register_state_listener(
        &mut self,
        tx: mpsc::UnboundedSender<SessionState>,
    ) {
        self.test_state_listener.push(tx);
    }

    #[cfg(test)]
    fn notify_state_transition(
        &self,
        state: SessionState,
    ) {
        for tx in &self.test_state_listener {
            let _ = tx.send(state);
        }
    }
}
