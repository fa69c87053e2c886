// -
// Listen protocol

/// Locally chosen ID of the single target every watch stream manages
pub const WATCH_TARGET_ID: i32 = 0x1;

/// Fully qualified gRPC method of the bidirectional Listen call
pub(crate) const LISTEN_METHOD_PATH: &str = "/google.firestore.v1.Firestore/Listen";

/// Routing header carrying the database resource name
pub(crate) const RESOURCE_PREFIX_HEADER: &str = "google-cloud-resource-prefix";

// -
// Engine defaults

/// Silence on an open stream after which it is torn down and re-opened
pub(crate) const DEFAULT_IDLE_TIMEOUT_MS: u64 = 120 * 1000;

pub(crate) const DEFAULT_BACKOFF_BASE_DELAY_MS: u64 = 1000;
pub(crate) const DEFAULT_BACKOFF_MAX_DELAY_MS: u64 = 60 * 1000;
pub(crate) const DEFAULT_BACKOFF_MULTIPLIER: f64 = 1.5;
pub(crate) const DEFAULT_BACKOFF_JITTER_FACTOR: f64 = 1.0;
pub(crate) const DEFAULT_BACKOFF_MAX_RETRIES: usize = 10;
pub(crate) const DEFAULT_OPEN_TIMEOUT_MS: u64 = 10 * 1000;

// -
// Settings sources

/// Prefix of environment variables overriding settings, e.g. `LISTEN__WATCH__IDLE_TIMEOUT_MS`
pub(crate) const ENV_PREFIX: &str = "LISTEN";
pub(crate) const ENV_CONFIG_PATH: &str = "LISTEN_CONFIG_PATH";
