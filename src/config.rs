//! Session configuration.
//!
//! [`DashboardConfig`] collects every tunable of a dashboard session. All
//! fields have documented defaults; only the backend URLs are required.
//!
//! # Example
//!
//! ```
//! use bingo_dashboard_client::config::DashboardConfig;
//! use std::time::Duration;
//!
//! let config = DashboardConfig::new("http://localhost:5000", "ws://localhost:5000/events")
//!     .with_steady_refresh_interval(Duration::from_secs(3))
//!     .with_fallback_poll_interval(Duration::from_secs(30));
//! assert_eq!(config.channel.max_attempts, 5);
//! assert_eq!(config.steady_refresh_interval, Some(Duration::from_secs(3)));
//! ```

use std::time::Duration;

use crate::notify::DEFAULT_TOAST_TTL;
use crate::scheduler::MIN_INTERVAL;

/// Default retry budget of the push channel.
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default delay before the first reconnect attempt.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Default cap on the reconnect delay.
const DEFAULT_RETRY_DELAY_MAX: Duration = Duration::from_millis(5000);

/// Default push-channel handshake timeout.
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(20_000);

/// Default backstop poll interval while the push channel is down.
const DEFAULT_FALLBACK_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Default grace period before polling starts if the first connect is slow.
const DEFAULT_INITIAL_CONNECT_GRACE: Duration = Duration::from_secs(5);

/// Default capacity of the push-event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown of the channel loop.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ── Push channel ────────────────────────────────────────────────────

/// Push-channel connection policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Whether to reconnect after a failed connect or a dropped channel.
    ///
    /// Defaults to **true**.
    pub retry: bool,
    /// Reconnect attempts before giving up for good.
    ///
    /// Defaults to **5**. A fresh `connect()` resets the counter.
    pub max_attempts: u32,
    /// Delay before the first reconnect attempt; doubles on each attempt.
    ///
    /// Defaults to **1000ms**.
    pub retry_delay: Duration,
    /// Upper bound for the reconnect delay.
    ///
    /// Defaults to **5000ms**.
    pub retry_delay_max: Duration,
    /// Time allowed for one connect attempt.
    ///
    /// Defaults to **20000ms**.
    pub handshake_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            retry: true,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            retry_delay_max: DEFAULT_RETRY_DELAY_MAX,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

impl ChannelConfig {
    /// Delay before reconnect attempt `attempt` (1-based):
    /// `retry_delay * 2^(attempt-1)`, capped at `retry_delay_max`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.retry_delay
            .saturating_mul(1u32 << exponent)
            .min(self.retry_delay_max)
    }

    #[must_use]
    pub fn with_retry(mut self, retry: bool) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration, max: Duration) -> Self {
        self.retry_delay = delay;
        self.retry_delay_max = max.max(delay);
        self
    }

    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }
}

// ── Session ─────────────────────────────────────────────────────────

/// Configuration for a [`DashboardSession`](crate::session::DashboardSession).
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Base URL of the HTTP API, e.g. `http://localhost:5000`.
    pub base_url: String,
    /// URL of the push channel, e.g. `ws://localhost:5000/events`.
    pub channel_url: String,
    /// Push-channel connection policy.
    pub channel: ChannelConfig,
    /// Interval of the backstop full refresh while the channel is down.
    ///
    /// Defaults to **30 seconds**.
    pub fallback_poll_interval: Duration,
    /// Interval of the steady refresh that runs regardless of connectivity.
    ///
    /// Defaults to **disabled**. The reference dashboard uses 3 seconds.
    pub steady_refresh_interval: Option<Duration>,
    /// How long to wait for the first connect before starting the backstop.
    ///
    /// Defaults to **5 seconds**.
    pub initial_connect_grace: Duration,
    /// Capacity of the push-event channel. Server events are dropped (with a
    /// warning) when the session lags; lifecycle events never are.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Lifetime of toasts emitted by the session.
    ///
    /// Defaults to **5 seconds**.
    pub notification_ttl: Duration,
    /// Time the channel loop gets to close gracefully on shutdown before it
    /// is aborted.
    ///
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
    /// Discard dashboard snapshots older than the one already applied.
    ///
    /// Defaults to **false**: the last response to arrive wins, even if it
    /// was requested earlier than the one it replaces.
    pub sequence_guard: bool,
}

impl DashboardConfig {
    /// Create a configuration with the given endpoints and default values.
    pub fn new(base_url: impl Into<String>, channel_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            channel_url: channel_url.into(),
            channel: ChannelConfig::default(),
            fallback_poll_interval: DEFAULT_FALLBACK_POLL_INTERVAL,
            steady_refresh_interval: None,
            initial_connect_grace: DEFAULT_INITIAL_CONNECT_GRACE,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            notification_ttl: DEFAULT_TOAST_TTL,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            sequence_guard: false,
        }
    }

    /// Build a configuration from environment variables.
    ///
    /// Reads `BINGO_DASHBOARD_URL` (default `http://localhost:5000`),
    /// `BINGO_DASHBOARD_WS_URL` (default derived from the base URL),
    /// `BINGO_FALLBACK_POLL_SECS` and `BINGO_STEADY_REFRESH_MS`. Unparsable
    /// numbers fall back to the defaults.
    pub fn from_env() -> Self {
        let base_url = std::env::var("BINGO_DASHBOARD_URL")
            .unwrap_or_else(|_| "http://localhost:5000".to_string());
        let channel_url = std::env::var("BINGO_DASHBOARD_WS_URL")
            .unwrap_or_else(|_| default_channel_url(&base_url));

        let mut config = Self::new(base_url, channel_url);
        if let Some(secs) = env_u64("BINGO_FALLBACK_POLL_SECS") {
            config = config.with_fallback_poll_interval(Duration::from_secs(secs));
        }
        if let Some(ms) = env_u64("BINGO_STEADY_REFRESH_MS") {
            config.steady_refresh_interval = (ms > 0).then(|| Duration::from_millis(ms));
        }
        config
    }

    #[must_use]
    pub fn with_channel(mut self, channel: ChannelConfig) -> Self {
        self.channel = channel;
        self
    }

    /// Intervals below [`MIN_INTERVAL`] are clamped to it.
    #[must_use]
    pub fn with_fallback_poll_interval(mut self, interval: Duration) -> Self {
        self.fallback_poll_interval = interval.max(MIN_INTERVAL);
        self
    }

    /// Intervals below [`MIN_INTERVAL`] are clamped to it.
    #[must_use]
    pub fn with_steady_refresh_interval(mut self, interval: Duration) -> Self {
        self.steady_refresh_interval = Some(interval.max(MIN_INTERVAL));
        self
    }

    #[must_use]
    pub fn with_initial_connect_grace(mut self, grace: Duration) -> Self {
        self.initial_connect_grace = grace;
        self
    }

    /// Set the capacity of the push-event channel. Values below 1 are
    /// clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_notification_ttl(mut self, ttl: Duration) -> Self {
        self.notification_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_sequence_guard(mut self, enabled: bool) -> Self {
        self.sequence_guard = enabled;
        self
    }
}

fn env_u64(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Ignoring {name}={raw:?}: {e}");
            None
        }
    }
}

/// `http://host/` → `ws://host/events`, `https://` → `wss://`.
fn default_channel_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    let ws = if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        trimmed.to_string()
    };
    format!("{ws}/events")
}
