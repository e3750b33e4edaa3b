//! Per-server timeout configuration.
//!
//! Every [`crate::server::Server`] gets its own [`ServerConfig`]; there is no
//! process wide state. Durations are validated once, when the config is
//! built, so invalid values surface at startup and never at request time.

use std::time::Duration;

use thiserror::Error;

/// Smallest enforceable timeout; anything shorter is lost in scheduling jitter.
pub const MIN_TIMEOUT: Duration = Duration::from_millis(1);

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_KEEP_ALIVE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{name} must not be negative, got {value}")]
    Negative { name: &'static str, value: f64 },

    #[error("{name} must be a finite number of seconds, got {value}")]
    NotFinite { name: &'static str, value: f64 },

    #[error("{name} of {value:?} is below the minimum of {min:?}")]
    TooSmall { name: &'static str, value: Duration, min: Duration },
}

/// Timeouts enforced on every connection of a server. `None` disables one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    request_timeout: Option<Duration>,
    response_timeout: Option<Duration>,
    keep_alive_timeout: Option<Duration>,
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }

    /// Time budget for receiving a complete request, measured from the start of the request cycle.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    /// Time budget for the handler to produce a response.
    pub fn response_timeout(&self) -> Option<Duration> {
        self.response_timeout
    }

    /// How long a kept-alive connection may sit idle between requests.
    pub fn keep_alive_timeout(&self) -> Option<Duration> {
        self.keep_alive_timeout
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            response_timeout: Some(DEFAULT_RESPONSE_TIMEOUT),
            keep_alive_timeout: Some(DEFAULT_KEEP_ALIVE_TIMEOUT),
        }
    }
}

/// A timeout as given by the user, validated in [`ServerConfigBuilder::build`].
#[derive(Debug, Clone, Copy, PartialEq)]
enum TimeoutSetting {
    Seconds(f64),
    Duration(Duration),
    Disabled,
}

impl TimeoutSetting {
    fn validate(self, name: &'static str) -> Result<Option<Duration>, ConfigError> {
        let duration = match self {
            TimeoutSetting::Disabled => return Ok(None),
            TimeoutSetting::Seconds(value) if !value.is_finite() => return Err(ConfigError::NotFinite { name, value }),
            TimeoutSetting::Seconds(value) if value < 0.0 => return Err(ConfigError::Negative { name, value }),
            TimeoutSetting::Seconds(value) => {
                Duration::try_from_secs_f64(value).map_err(|_overflow| ConfigError::NotFinite { name, value })?
            }
            TimeoutSetting::Duration(duration) => duration,
        };

        if duration.is_zero() {
            return Ok(None);
        }
        if duration < MIN_TIMEOUT {
            return Err(ConfigError::TooSmall { name, value: duration, min: MIN_TIMEOUT });
        }
        Ok(Some(duration))
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfigBuilder {
    request_timeout: TimeoutSetting,
    response_timeout: TimeoutSetting,
    keep_alive_timeout: TimeoutSetting,
}

impl ServerConfigBuilder {
    fn new() -> Self {
        Self {
            request_timeout: TimeoutSetting::Duration(DEFAULT_REQUEST_TIMEOUT),
            response_timeout: TimeoutSetting::Duration(DEFAULT_RESPONSE_TIMEOUT),
            keep_alive_timeout: TimeoutSetting::Duration(DEFAULT_KEEP_ALIVE_TIMEOUT),
        }
    }

    /// Request timeout in (fractional) seconds, `0` disables it.
    pub fn request_timeout_secs(mut self, seconds: f64) -> Self {
        self.request_timeout = TimeoutSetting::Seconds(seconds);
        self
    }

    /// Request timeout, `None` or zero disables it.
    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout.map_or(TimeoutSetting::Disabled, TimeoutSetting::Duration);
        self
    }

    pub fn response_timeout_secs(mut self, seconds: f64) -> Self {
        self.response_timeout = TimeoutSetting::Seconds(seconds);
        self
    }

    pub fn response_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.response_timeout = timeout.map_or(TimeoutSetting::Disabled, TimeoutSetting::Duration);
        self
    }

    pub fn keep_alive_timeout_secs(mut self, seconds: f64) -> Self {
        self.keep_alive_timeout = TimeoutSetting::Seconds(seconds);
        self
    }

    pub fn keep_alive_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.keep_alive_timeout = timeout.map_or(TimeoutSetting::Disabled, TimeoutSetting::Duration);
        self
    }

    pub fn build(self) -> Result<ServerConfig, ConfigError> {
        Ok(ServerConfig {
            request_timeout: self.request_timeout.validate("request_timeout")?,
            response_timeout: self.response_timeout.validate("response_timeout")?,
            keep_alive_timeout: self.keep_alive_timeout.validate("keep_alive_timeout")?,
        })
    }
}
