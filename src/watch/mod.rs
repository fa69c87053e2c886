//! Live query snapshots over the Listen protocol
//!
//! ```text
//! Watch::on_snapshot()
//!   ├─ StreamSession task: open → read → WatchState::handle_response
//!   │        │  (reconnects with backoff on retryable failures)
//!   │        └─ WatchEvent ──(unbounded mpsc)──┐
//!   └─ dispatcher task: ◄──────────────────────┘
//!        holds the active gate around on_next(QuerySnapshot) / on_error(Error)
//! ```
//!
//! Each subscription owns its session and dispatcher tasks. Protocol handling
//! for one subscription is strictly sequential; subscriptions share nothing
//! but the transport.

mod change_map;
mod event;
mod idle_timer;
mod reconciler;
mod session;
mod subscription;
mod target;

pub use change_map::*;
pub use event::ChangeType;
pub use event::DocumentChange;
pub use event::QuerySnapshot;
pub use session::SessionState;
pub use subscription::*;
pub use target::*;

#[cfg(test)]
mod session_test;

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;

use self::event::WatchEvent;
use self::session::StreamSession;
use self::subscription::ActiveGate;
use crate::metrics::ACTIVE_SUBSCRIPTIONS;
use crate::network::GrpcListenTransport;
use crate::network::ListenTransport;
use crate::Error;
use crate::Result;
use crate::Settings;

struct SubscriptionEntry {
    gate: ActiveGate,
    cancel: CancellationToken,
}

pub(crate) struct WatchInner {
    transport: Arc<dyn ListenTransport>,
    settings: Arc<Settings>,
    registry: DashMap<u64, SubscriptionEntry>,
    next_id: AtomicU64,
    /// Parent of every subscription token
    shutdown: CancellationToken,
}

impl WatchInner {
    /// Deactivates and forgets subscription `id`, waiting for a callback
    /// running on another thread. Returns `false` when it was already released.
    pub(crate) fn release(
        &self,
        id: u64,
    ) -> bool {
        match self.registry.remove(&id) {
            Some((_, entry)) => {
                entry.gate.close();
                entry.cancel.cancel();
                ACTIVE_SUBSCRIPTIONS.dec();
                true
            }
            None => false,
        }
    }
}

/// Entry point for listening to documents and queries.
///
/// Cloning is cheap; clones share subscriptions and shutdown.
#[derive(Clone)]
pub struct Watch {
    inner: Arc<WatchInner>,
}

impl Watch {
    pub fn new(
        transport: Arc<dyn ListenTransport>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            inner: Arc::new(WatchInner {
                transport,
                settings,
                registry: DashMap::new(),
                next_id: AtomicU64::new(1),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Watch over a lazily connected gRPC channel built from `settings`.
    /// Must be called from within a tokio runtime.
    pub fn connect(settings: Settings) -> Result<Self> {
        let transport = GrpcListenTransport::connect_lazy(&settings.network, &settings.database)?;
        Ok(Self::new(Arc::new(transport), Arc::new(settings)))
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// Starts listening to `target`.
    ///
    /// `on_next` receives every snapshot in read-time order. `on_error` runs
    /// at most once, with the error that ended the subscription; no callback
    /// runs after it. Must be called from within a tokio runtime.
    pub fn on_snapshot<N, E>(
        &self,
        target: WatchTarget,
        on_next: N,
        on_error: E,
    ) -> Subscription
    where
        N: FnMut(QuerySnapshot) + Send + 'static,
        E: FnOnce(Error) + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let gate = ActiveGate::new();
        let cancel = self.inner.shutdown.child_token();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        self.inner.registry.insert(
            id,
            SubscriptionEntry {
                gate: gate.clone(),
                cancel: cancel.clone(),
            },
        );
        ACTIVE_SUBSCRIPTIONS.inc();
        debug!(subscription_id = id, ?target, "subscribing");

        let session = StreamSession::new(
            id,
            target,
            self.inner.transport.clone(),
            self.inner.settings.clone(),
            event_tx,
            cancel.clone(),
        );
        tokio::spawn(session.run());
        tokio::spawn(dispatch(
            id,
            self.inner.clone(),
            event_rx,
            gate.clone(),
            cancel.clone(),
            on_next,
            on_error,
        ));

        Subscription::new(id, gate, cancel, self.inner.clone())
    }

    pub fn active_subscriptions(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Stops every subscription created by this watch, and any created later.
    pub fn shutdown(&self) {
        info!(subscriptions = self.inner.registry.len(), "shutting down watch");
        self.inner.shutdown.cancel();

        let ids: Vec<u64> = self.inner.registry.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            self.inner.release(id);
        }
    }
}

/// Forwards session events to the subscriber's callbacks until the
/// subscription ends, then drops the callbacks.
async fn dispatch<N, E>(
    id: u64,
    inner: Arc<WatchInner>,
    mut events: mpsc::UnboundedReceiver<WatchEvent>,
    gate: ActiveGate,
    cancel: CancellationToken,
    mut on_next: N,
    on_error: E,
) where
    N: FnMut(QuerySnapshot) + Send + 'static,
    E: FnOnce(Error) + Send + 'static,
{
    let mut on_error = Some(on_error);

    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = events.recv() => event,
        };

        match event {
            Some(WatchEvent::Snapshot(snapshot)) => {
                if cancel.is_cancelled() || gate.run_if_open(|| on_next(snapshot)).is_none() {
                    break;
                }
            }
            Some(WatchEvent::Error(e)) => {
                if !cancel.is_cancelled() {
                    if let Some(on_error) = on_error.take() {
                        gate.close_with(|| on_error(e));
                    }
                }
                break;
            }
            None => break,
        }
    }

    cancel.cancel();
    inner.release(id);
    debug!(subscription_id = id, "dispatcher stopped");
}
