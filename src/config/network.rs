use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Channel parameters for the gRPC listen transport
///
/// One channel is shared by every subscription of a [`crate::Watch`]; each
/// subscription multiplexes its own HTTP/2 stream over it.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NetworkConfig {
    /// Service address, e.g. an emulator at `http://localhost:8080`
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// TCP connect timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_in_ms: u64,

    /// TCP keepalive in seconds
    #[serde(default = "default_tcp_keepalive")]
    pub tcp_keepalive_in_secs: u64,

    /// HTTP2 keepalive ping interval in seconds
    #[serde(default = "default_h2_keepalive_interval")]
    pub http2_keep_alive_interval_in_secs: u64,

    /// HTTP2 keepalive timeout in seconds
    #[serde(default = "default_h2_keepalive_timeout")]
    pub http2_keep_alive_timeout_in_secs: u64,

    /// Initial connection-level flow control window in bytes
    #[serde(default = "default_conn_window_size")]
    pub connection_window_size: u32,

    /// Initial stream-level flow control window in bytes
    #[serde(default = "default_stream_window_size")]
    pub stream_window_size: u32,

    /// Capacity of the outbound request queue of each listen stream
    #[serde(default = "default_request_buffer_size")]
    pub request_buffer_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            connect_timeout_in_ms: default_connect_timeout(),
            tcp_keepalive_in_secs: default_tcp_keepalive(),
            http2_keep_alive_interval_in_secs: default_h2_keepalive_interval(),
            http2_keep_alive_timeout_in_secs: default_h2_keepalive_timeout(),
            connection_window_size: default_conn_window_size(),
            stream_window_size: default_stream_window_size(),
            request_buffer_size: default_request_buffer_size(),
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "network.endpoint must not be empty".to_string(),
            )));
        }

        if self.connect_timeout_in_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "network.connect_timeout_in_ms must be > 0".to_string(),
            )));
        }

        if self.http2_keep_alive_timeout_in_secs >= self.http2_keep_alive_interval_in_secs {
            return Err(Error::Config(ConfigError::Message(format!(
                "network.http2_keep_alive_timeout_in_secs ({}) must be less than the interval ({})",
                self.http2_keep_alive_timeout_in_secs, self.http2_keep_alive_interval_in_secs
            ))));
        }

        // HTTP/2 minimum window
        const MIN_WINDOW: u32 = 65535;
        if self.stream_window_size < MIN_WINDOW || self.connection_window_size < MIN_WINDOW {
            return Err(Error::Config(ConfigError::Message(format!(
                "network window sizes must be >= {} bytes (stream: {}, connection: {})",
                MIN_WINDOW, self.stream_window_size, self.connection_window_size
            ))));
        }

        if self.request_buffer_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "network.request_buffer_size must be > 0".to_string(),
            )));
        }

        Ok(())
    }
}

fn default_endpoint() -> String {
    "http://localhost:8080".to_string()
}
fn default_connect_timeout() -> u64 {
    5000
}
fn default_tcp_keepalive() -> u64 {
    300
}
fn default_h2_keepalive_interval() -> u64 {
    30
}
fn default_h2_keepalive_timeout() -> u64 {
    10
}
fn default_conn_window_size() -> u32 {
    1048576
}
fn default_stream_window_size() -> u32 {
    262144
}
fn default_request_buffer_size() -> usize {
    8
}
