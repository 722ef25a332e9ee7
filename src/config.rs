//! Console configuration: where the backend lives and how often to poll it.

use reqwest::Url;
use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Validated console settings
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
	/// Base URI every API path is appended to.
	pub base_uri: Url,
	/// Upper bound on a single API call.
	pub request_timeout: Duration,
	/// Delay between two synchronization rounds.
	pub poll_interval: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("Invalid base URI '{0}': {1}")]
	InvalidBaseUri(String, String),

	#[error("Base URI must use http or https, got '{0}'")]
	UnsupportedScheme(String),

	#[error("{0} must be greater than zero")]
	ZeroDuration(&'static str),
}

impl ConsoleConfig {
	pub fn new(
		base_uri: &str,
		request_timeout_secs: u64,
		poll_interval_secs: u64,
	) -> Result<Self, ConfigError> {
		let base_uri = Url::parse(base_uri)
			.map_err(|e| ConfigError::InvalidBaseUri(base_uri.to_string(), e.to_string()))?;
		if !matches!(base_uri.scheme(), "http" | "https") {
			return Err(ConfigError::UnsupportedScheme(base_uri.scheme().to_string()));
		}
		if base_uri.cannot_be_a_base() {
			return Err(ConfigError::InvalidBaseUri(
				base_uri.to_string(),
				"not a base URI".to_string(),
			));
		}
		if request_timeout_secs == 0 {
			return Err(ConfigError::ZeroDuration("request timeout"));
		}
		if poll_interval_secs == 0 {
			return Err(ConfigError::ZeroDuration("poll interval"));
		}

		Ok(Self {
			base_uri,
			request_timeout: Duration::from_secs(request_timeout_secs),
			poll_interval: Duration::from_secs(poll_interval_secs),
		})
	}
}
