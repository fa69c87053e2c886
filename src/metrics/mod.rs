use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;
use tracing::warn;

lazy_static! {
    pub static ref LISTEN_STREAMS_OPENED: IntCounter =
        IntCounter::new("listen_streams_opened", "Listen streams successfully opened")
            .expect("metric can not be created");

    /// Labelled by `class`: `transient` or `permanent`
    pub static ref LISTEN_STREAM_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("listen_stream_errors", "Listen stream failures by retry class"),
        &["class"]
    )
    .expect("metric can not be created");

    pub static ref SNAPSHOTS_DELIVERED: IntCounter =
        IntCounter::new("snapshots_delivered", "Query snapshots handed to subscribers")
            .expect("metric can not be created");

    /// Labelled by `kind`: `added`, `removed` or `modified`
    pub static ref DOCUMENT_CHANGES: IntCounterVec = IntCounterVec::new(
        Opts::new("document_changes", "Document changes delivered in snapshots"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref EXISTENCE_FILTER_MISMATCHES: IntCounter = IntCounter::new(
        "existence_filter_mismatches",
        "Existence filters that forced a full resync"
    )
    .expect("metric can not be created");

    pub static ref ACTIVE_SUBSCRIPTIONS: IntGauge =
        IntGauge::new("active_subscriptions", "Live watch subscriptions")
            .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

pub fn register_custom_metrics(registry: &Registry) -> prometheus::Result<()> {
    registry.register(Box::new(LISTEN_STREAMS_OPENED.clone()))?;
    registry.register(Box::new(LISTEN_STREAM_ERRORS.clone()))?;
    registry.register(Box::new(SNAPSHOTS_DELIVERED.clone()))?;
    registry.register(Box::new(DOCUMENT_CHANGES.clone()))?;
    registry.register(Box::new(EXISTENCE_FILTER_MISMATCHES.clone()))?;
    registry.register(Box::new(ACTIVE_SUBSCRIPTIONS.clone()))?;
    Ok(())
}

/// Renders `registry` in the Prometheus text exposition format.
pub fn gather_metrics(registry: &Registry) -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        warn!("could not encode custom metrics: {}", e);
    }
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            warn!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}

#[cfg(test)]
mod metrics_test;
