//! Client configuration and server URL derivation.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use parley_protocol::constants::{
    DEFAULT_SERVER_URL, OUTBOUND_QUEUE_CAPACITY, RECONNECT_INITIAL_DELAY, RECONNECT_MAX_ATTEMPTS,
    RECONNECT_MAX_DELAY, WS_MAX_MESSAGE_SIZE, WS_PATH, WS_PING_PERIOD, WS_PONG_WAIT,
    WS_TOKEN_PARAM,
};

use crate::queue::OverflowPolicy;
use crate::ws_client::ConnectionError;

/// Settings for a [`ConnectionManager`](crate::ConnectionManager).
///
/// Every field has a default, so partial configuration files are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base HTTP(S) endpoint of the chat server.
    pub server_url: String,
    /// Inbound messages larger than this are dropped.
    pub max_message_size: usize,
    /// Upper bound for a single WebSocket handshake.
    pub connect_timeout_secs: u64,
    pub reconnect: ReconnectConfig,
    pub queue: QueueConfig,
    pub keepalive: KeepaliveConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            max_message_size: WS_MAX_MESSAGE_SIZE,
            connect_timeout_secs: 10,
            reconnect: ReconnectConfig::default(),
            queue: QueueConfig::default(),
            keepalive: KeepaliveConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Creates a default configuration pointing at `server_url`.
    pub fn with_server(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Self::default()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Derives the WebSocket URL for `token`.
    ///
    /// `http` becomes `ws` and `https` becomes `wss`; `/ws` is appended to the
    /// base path and the credential is passed as the `token` query parameter.
    pub fn ws_url(&self, token: &str) -> Result<Url, ConnectionError> {
        let mut url = Url::parse(&self.server_url)?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => return Err(ConnectionError::UnsupportedScheme(other.to_string())),
        };
        if url.scheme() != scheme {
            url.set_scheme(scheme)
                .map_err(|()| ConnectionError::UnsupportedScheme(url.scheme().to_string()))?;
        }
        let path = format!("{}{WS_PATH}", url.path().trim_end_matches('/'));
        url.set_path(&path);
        url.query_pairs_mut().append_pair(WS_TOKEN_PARAM, token);
        Ok(url)
    }
}

/// Returns `url` with the credential replaced, for logging.
pub(crate) fn redacted(url: &Url) -> String {
    let mut shown = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == WS_TOKEN_PARAM { "***".into() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    shown.query_pairs_mut().clear().extend_pairs(pairs);
    shown.to_string()
}

/// Configuration for automatic reconnection with exponential backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay_ms: u64,
    /// Maximum delay between attempts (backoff cap).
    pub max_delay_ms: u64,
    /// Reconnects scheduled before giving up.
    pub max_attempts: u32,
    /// Multiplier for each subsequent attempt.
    pub backoff_factor: f64,
    /// Random spread as a fraction of the delay (0.25 = ±25%). Off by default.
    pub jitter: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: RECONNECT_INITIAL_DELAY.as_millis() as u64,
            max_delay_ms: RECONNECT_MAX_DELAY.as_millis() as u64,
            max_attempts: RECONNECT_MAX_ATTEMPTS,
            backoff_factor: 2.0,
            jitter: 0.0,
        }
    }
}

impl ReconnectConfig {
    /// Calculates the delay before reconnect number `attempt` (0-based):
    /// `min(initial * factor^attempt, max)`, then jitter if configured.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.min(63) as i32;
        let ms = self.initial_delay_ms as f64 * self.backoff_factor.powi(exp);
        let capped = ms.min(self.max_delay_ms as f64);
        if self.jitter <= 0.0 {
            return Duration::from_millis(capped.round() as u64);
        }
        let spread = capped * self.jitter.min(1.0);
        let offset = (std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos() as f64
            / u32::MAX as f64)
            * 2.0
            - 1.0; // [-1.0, 1.0)
        let with_jitter = (capped + spread * offset).max(0.0);
        Duration::from_millis(with_jitter.round() as u64)
    }
}

/// Outbound queue bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Frames held while disconnected.
    pub capacity: usize,
    pub overflow: OverflowPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: OUTBOUND_QUEUE_CAPACITY,
            overflow: OverflowPolicy::DropOldest,
        }
    }
}

/// Ping/pong keepalive timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepaliveConfig {
    pub ping_interval_secs: u64,
    /// Read deadline; any inbound message resets it.
    pub pong_wait_secs: u64,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: WS_PING_PERIOD.as_secs(),
            pong_wait_secs: WS_PONG_WAIT.as_secs(),
        }
    }
}

impl KeepaliveConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }

    pub fn pong_wait(&self) -> Duration {
        Duration::from_secs(self.pong_wait_secs.max(1))
    }
}
