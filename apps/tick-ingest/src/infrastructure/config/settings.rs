//! Ingestion Configuration Settings
//!
//! Configuration types for the ingestion service, loaded from environment
//! variables. Numeric variables that fail to parse fall back to their
//! defaults; values that would make the pipeline meaningless (zero timeouts,
//! a zero backoff floor, an empty queue) are rejected.

use std::str::FromStr;
use std::time::Duration;

use bigdecimal::{BigDecimal, Zero};

use crate::domain::parse_decimal;

use crate::infrastructure::feed::{
    DEFAULT_BASE_PRICE, DEFAULT_FEED_HOST, DEFAULT_MOCK_INTERVAL, MockStreamer, ReconnectConfig,
    SupervisorConfig,
};
use crate::infrastructure::storage::DEFAULT_SINK_TIMEOUT;

/// Default instrument.
pub const DEFAULT_SYMBOL: &str = "btcusdt";

/// Live feed connection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSettings {
    /// Feed host, optionally with port.
    pub host: String,
    /// Dial plus handshake bound.
    pub handshake_timeout: Duration,
    /// Single read deadline.
    pub read_timeout: Duration,
    /// Initial reconnection delay.
    pub reconnect_delay_min: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Maximum consecutive reconnection attempts (0 = unlimited).
    pub max_reconnect_attempts: u32,
    /// Tick queue capacity.
    pub tick_queue_capacity: usize,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_FEED_HOST.to_string(),
            handshake_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(5),
            reconnect_delay_min: Duration::from_millis(500),
            reconnect_delay_max: Duration::from_secs(30),
            max_reconnect_attempts: 0, // Unlimited
            tick_queue_capacity: 32,
        }
    }
}

/// Synthetic feed settings.
#[derive(Debug, Clone, PartialEq)]
pub struct MockSettings {
    /// Use the generator instead of the live feed.
    pub enabled: bool,
    /// Emission interval.
    pub interval: Duration,
    /// Starting price.
    pub base_price: BigDecimal,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: DEFAULT_MOCK_INTERVAL,
            base_price: BigDecimal::from(DEFAULT_BASE_PRICE),
        }
    }
}

/// Tick store settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
    /// Database file path, or `:memory:`.
    pub db_path: String,
    /// Bound for a single store operation.
    pub op_timeout: Duration,
    /// Keep ticks in process memory instead of the database.
    pub dry_run: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            db_path: "ticks.db".to_string(),
            op_timeout: DEFAULT_SINK_TIMEOUT,
            dry_run: false,
        }
    }
}

/// Complete ingestion configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    /// Instrument to ingest.
    pub symbol: String,
    /// Live feed settings.
    pub feed: FeedSettings,
    /// Synthetic feed settings.
    pub mock: MockSettings,
    /// Store settings.
    pub storage: StorageSettings,
    /// Prometheus metrics port (0 = recorder only).
    pub metrics_port: u16,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            symbol: DEFAULT_SYMBOL.to_string(),
            feed: FeedSettings::default(),
            mock: MockSettings::default(),
            storage: StorageSettings::default(),
            metrics_port: 9090,
        }
    }
}

impl IngestConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but unusable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but unusable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let env = EnvSource { lookup: &lookup };

        let symbol = env
            .string("TICK_INGEST_SYMBOL")
            .unwrap_or(defaults.symbol)
            .trim()
            .to_string();
        if symbol.is_empty() {
            return Err(ConfigError::EmptyValue("TICK_INGEST_SYMBOL".to_string()));
        }

        let feed = FeedSettings {
            host: env
                .string("TICK_INGEST_FEED_HOST")
                .unwrap_or(defaults.feed.host),
            handshake_timeout: env.duration_secs(
                "TICK_INGEST_HANDSHAKE_TIMEOUT_SECS",
                defaults.feed.handshake_timeout,
            ),
            read_timeout: env.duration_secs(
                "TICK_INGEST_READ_TIMEOUT_SECS",
                defaults.feed.read_timeout,
            ),
            reconnect_delay_min: env.duration_millis(
                "TICK_INGEST_RECONNECT_DELAY_MIN_MS",
                defaults.feed.reconnect_delay_min,
            ),
            reconnect_delay_max: env.duration_secs(
                "TICK_INGEST_RECONNECT_DELAY_MAX_SECS",
                defaults.feed.reconnect_delay_max,
            ),
            max_reconnect_attempts: env.parsed(
                "TICK_INGEST_MAX_RECONNECT_ATTEMPTS",
                defaults.feed.max_reconnect_attempts,
            ),
            tick_queue_capacity: env.parsed(
                "TICK_INGEST_TICK_QUEUE_CAPACITY",
                defaults.feed.tick_queue_capacity,
            ),
        };

        require_nonzero(
            "TICK_INGEST_HANDSHAKE_TIMEOUT_SECS",
            feed.handshake_timeout,
        )?;
        require_nonzero("TICK_INGEST_READ_TIMEOUT_SECS", feed.read_timeout)?;
        require_nonzero(
            "TICK_INGEST_RECONNECT_DELAY_MIN_MS",
            feed.reconnect_delay_min,
        )?;

        if feed.tick_queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "TICK_INGEST_TICK_QUEUE_CAPACITY".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if feed.reconnect_delay_min > feed.reconnect_delay_max {
            return Err(ConfigError::Invalid {
                key: "TICK_INGEST_RECONNECT_DELAY_MIN_MS".to_string(),
                reason: format!(
                    "{:?} exceeds maximum delay {:?}",
                    feed.reconnect_delay_min, feed.reconnect_delay_max
                ),
            });
        }

        let base_price = match env.string("TICK_INGEST_MOCK_BASE_PRICE") {
            Some(raw) => parse_base_price(&raw)?,
            None => defaults.mock.base_price,
        };

        let mock = MockSettings {
            enabled: env.flag("USE_MOCK_STREAMER"),
            interval: env.duration_millis("TICK_INGEST_MOCK_INTERVAL_MS", defaults.mock.interval),
            base_price,
        };

        let storage = StorageSettings {
            db_path: env
                .string("TICK_INGEST_DB_PATH")
                .unwrap_or(defaults.storage.db_path),
            op_timeout: env.duration_secs(
                "TICK_INGEST_SINK_TIMEOUT_SECS",
                defaults.storage.op_timeout,
            ),
            dry_run: env.flag("TICK_INGEST_DRY_RUN"),
        };
        require_nonzero("TICK_INGEST_SINK_TIMEOUT_SECS", storage.op_timeout)?;

        Ok(Self {
            symbol,
            feed,
            mock,
            storage,
            metrics_port: env.parsed("TICK_INGEST_METRICS_PORT", defaults.metrics_port),
        })
    }

    /// Connection supervisor configuration derived from the feed settings.
    #[must_use]
    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            host: self.feed.host.clone(),
            handshake_timeout: self.feed.handshake_timeout,
            read_timeout: self.feed.read_timeout,
            tick_capacity: self.feed.tick_queue_capacity,
            reconnect: ReconnectConfig {
                max_attempts: self.feed.max_reconnect_attempts,
                ..ReconnectConfig::doubling(
                    self.feed.reconnect_delay_min,
                    self.feed.reconnect_delay_max,
                )
            },
            ..SupervisorConfig::default()
        }
    }

    /// Synthetic generator built from the mock settings.
    #[must_use]
    pub fn mock_streamer(&self) -> MockStreamer {
        MockStreamer::new(
            self.mock.interval,
            self.mock.base_price.clone(),
            self.feed.tick_queue_capacity,
        )
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable has an unusable value.
    #[error("invalid value for {key}: {reason}")]
    Invalid {
        /// Variable name.
        key: String,
        /// What is wrong with it.
        reason: String,
    },
}

fn require_nonzero(key: &str, value: Duration) -> Result<(), ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::Invalid {
            key: key.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}

fn parse_base_price(raw: &str) -> Result<BigDecimal, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        key: "TICK_INGEST_MOCK_BASE_PRICE".to_string(),
        reason,
    };

    let price = parse_decimal(raw.trim()).map_err(|e| invalid(format!("{raw:?}: {e}")))?;
    if price <= BigDecimal::zero() {
        return Err(invalid(format!("{raw:?} must be positive")));
    }
    Ok(price)
}

struct EnvSource<'a, F> {
    lookup: &'a F,
}

impl<F> EnvSource<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
    }

    fn parsed<T: FromStr>(&self, key: &str, default: T) -> T {
        self.string(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn flag(&self, key: &str) -> bool {
        self.string(key).is_some_and(|v| {
            matches!(
                v.trim().to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
    }

    fn duration_secs(&self, key: &str, default: Duration) -> Duration {
        self.string(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(default, Duration::from_secs)
    }

    fn duration_millis(&self, key: &str, default: Duration) -> Duration {
        self.string(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(default, Duration::from_millis)
    }
}
