use std::env;

use listen_watch::gather_metrics;
use listen_watch::register_custom_metrics;
use listen_watch::DocumentKey;
use listen_watch::Error;
use listen_watch::Result;
use listen_watch::Settings;
use listen_watch::Watch;
use listen_watch::WatchTarget;
use listen_watch::REGISTRY;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::mpsc;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Listens to one document and logs every snapshot until interrupted.
///
/// Usage: `listen-watch <document-path>`, e.g. `listen-watch rooms/eros`.
/// Settings come from `LISTEN_CONFIG_PATH` and `LISTEN__*` variables.
#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = env::args()
        .nth(1)
        .ok_or_else(|| Error::Fatal("usage: listen-watch <document-path>".to_string()))?;
    let key = DocumentKey::new(&path)?;
    let settings = Settings::load(None)?;
    register_custom_metrics(&REGISTRY).map_err(|e| Error::Fatal(format!("metrics registration: {}", e)))?;

    info!(
        database = %settings.database.formatted_name(),
        endpoint = %settings.network.endpoint,
        document = %key,
        "starting listener"
    );
    let watch = Watch::connect(settings)?;

    let (failed_tx, mut failed_rx) = mpsc::unbounded_channel();
    let subscription = watch.on_snapshot(
        WatchTarget::document(key),
        |snapshot| {
            info!(
                read_time = %snapshot.read_time(),
                exists = !snapshot.is_empty(),
                changes = snapshot.doc_changes().len(),
                "snapshot"
            );
            for change in snapshot.doc_changes() {
                info!(kind = change.kind.as_str(), document = %change.document.key(), "document change");
            }
        },
        move |e| {
            let _ = failed_tx.send(e);
        },
    );

    let result = tokio::select! {
        reason = shutdown_signal() => {
            info!("{} detected, shutting down", reason?);
            Ok(())
        }
        Some(e) = failed_rx.recv() => {
            error!("listener stopped: {}", e);
            Err(e)
        }
    };

    subscription.unsubscribe();
    watch.shutdown();
    info!("metrics:\n{}", gather_metrics(&REGISTRY));
    result
}

async fn shutdown_signal() -> Result<&'static str> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(|e| Error::Fatal(e.to_string()))?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(|e| Error::Fatal(e.to_string()))?;
    let reason = tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    };
    Ok(reason)
}
