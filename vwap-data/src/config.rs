use crate::{
    error::DataError,
    exchange::coinbase::{BASE_URL_COINBASE, CHANNEL_MATCHES},
    tick::Instrument,
};
use std::{num::NonZeroUsize, str::FromStr, time::Duration};
use url::Url;

/// Default Coinbase Exchange public WebSocket feed.
pub const DEFAULT_URL: &str = BASE_URL_COINBASE;

/// Default comma-separated trading pairs.
pub const DEFAULT_TRADING_PAIRS: &str = "BTC-USD,ETH-USD,ETH-BTC";

/// Default comma-separated channels.
pub const DEFAULT_CHANNELS: &str = CHANNEL_MATCHES;

/// Default sliding window size (number of ticks per instrument).
pub const DEFAULT_SLIDING_WINDOW: usize = 200;

/// Default number of connection attempts.
pub const DEFAULT_RETRIES: u32 = 10;

/// Default read-idle timeout after which the read loop gives up on a silent connection.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(120);

pub const ENV_URL: &str = "COINBASE_URL";
pub const ENV_TRADING_PAIRS: &str = "COINBASE_TRADING_PAIRS";
pub const ENV_CHANNELS: &str = "COINBASE_CHANNELS";
pub const ENV_SLIDING_WINDOW: &str = "COINBASE_SLIDING_WINDOW";
pub const ENV_RETRIES: &str = "COINBASE_RETRIES";
pub const ENV_READ_TIMEOUT_SECS: &str = "COINBASE_READ_TIMEOUT_SECS";

/// Feed configuration, constructed once at startup and passed by reference into the
/// [`CoinbaseConnection`](crate::exchange::coinbase::connection::CoinbaseConnection) and
/// [`VwapAggregator`](crate::aggregator::VwapAggregator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// WebSocket endpoint.
    pub url: Url,
    /// Instruments to subscribe to.
    pub product_ids: Vec<Instrument>,
    /// Channels to subscribe to, eg/ "matches".
    pub channels: Vec<String>,
    /// Sliding window size per instrument.
    pub window: NonZeroUsize,
    /// Maximum connection attempts before giving up.
    pub retries: u32,
    /// Read-idle timeout for the inbound frame stream.
    pub read_timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: Url::parse(DEFAULT_URL).expect("DEFAULT_URL is a valid url"),
            product_ids: split_list(DEFAULT_TRADING_PAIRS)
                .map(Instrument::from)
                .collect(),
            channels: split_list(DEFAULT_CHANNELS).map(str::to_string).collect(),
            window: NonZeroUsize::new(DEFAULT_SLIDING_WINDOW)
                .expect("DEFAULT_SLIDING_WINDOW is non-zero"),
            retries: DEFAULT_RETRIES,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl FeedConfig {
    /// Construct a [`FeedConfig`] from the process environment, falling back to defaults for
    /// any variable that is not set.
    pub fn from_env() -> Result<Self, DataError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Construct a [`FeedConfig`] from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DataError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_URL) {
            config = config.with_url(&url)?;
        }

        if let Some(pairs) = lookup(ENV_TRADING_PAIRS) {
            config.product_ids = split_list(&pairs).map(Instrument::from).collect();
            if config.product_ids.is_empty() {
                return Err(DataError::Config(format!("{ENV_TRADING_PAIRS} is empty")));
            }
        }

        if let Some(channels) = lookup(ENV_CHANNELS) {
            config.channels = split_list(&channels).map(str::to_string).collect();
            if config.channels.is_empty() {
                return Err(DataError::Config(format!("{ENV_CHANNELS} is empty")));
            }
        }

        if let Some(window) = lookup(ENV_SLIDING_WINDOW) {
            config.window = parse_positive::<usize>(ENV_SLIDING_WINDOW, &window)
                .and_then(|window| {
                    NonZeroUsize::new(window).ok_or_else(|| {
                        DataError::Config(format!("{ENV_SLIDING_WINDOW} must be positive"))
                    })
                })?;
        }

        if let Some(retries) = lookup(ENV_RETRIES) {
            config.retries = parse_positive::<u32>(ENV_RETRIES, &retries)?;
        }

        if let Some(secs) = lookup(ENV_READ_TIMEOUT_SECS) {
            config.read_timeout =
                Duration::from_secs(parse_positive::<u64>(ENV_READ_TIMEOUT_SECS, &secs)?);
        }

        Ok(config)
    }

    /// Set the WebSocket endpoint.
    pub fn with_url(mut self, url: &str) -> Result<Self, DataError> {
        self.url = Url::parse(url).map_err(|error| DataError::Config(format!("{url}: {error}")))?;
        Ok(self)
    }

    /// Set the instruments to subscribe to.
    pub fn with_product_ids<I, S>(mut self, product_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Instrument>,
    {
        self.product_ids = product_ids.into_iter().map(Into::into).collect();
        self
    }

    /// Set the sliding window size.
    pub fn with_window(mut self, window: NonZeroUsize) -> Self {
        self.window = window;
        self
    }

    /// Set the maximum number of connection attempts.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set the read-idle timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
}

fn parse_positive<T>(key: &str, value: &str) -> Result<T, DataError>
where
    T: FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let parsed = value
        .trim()
        .parse::<T>()
        .map_err(|error| DataError::Config(format!("{key}={value:?}: {error}")))?;

    if parsed > T::default() {
        Ok(parsed)
    } else {
        Err(DataError::Config(format!("{key} must be positive, got {value}")))
    }
}
