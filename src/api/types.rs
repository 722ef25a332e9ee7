//! Types for the administration API: hosts, wire payloads and error kinds

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

/// A named host of the mining backend.
///
/// The set is closed: three miner nodes and the web server. The host selects the URL path
/// suffix of the per-host endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Host {
	Miner1,
	Miner2,
	Miner3,
	WebServer,
}

impl Host {
	/// All hosts, in display order.
	pub const ALL: [Host; 4] = [Host::Miner1, Host::Miner2, Host::Miner3, Host::WebServer];

	/// Hosts that keep a blockchain.
	pub const MINERS: [Host; 3] = [Host::Miner1, Host::Miner2, Host::Miner3];

	/// Path segment used by `/admin/logs/{segment}`.
	pub fn logs_segment(&self) -> &'static str {
		match self {
			Host::Miner1 => "1",
			Host::Miner2 => "2",
			Host::Miner3 => "3",
			Host::WebServer => "serveurweb",
		}
	}

	/// Path segment used by `/admin/chaine/{segment}`, `None` for hosts without a chain.
	pub fn chain_segment(&self) -> Option<&'static str> {
		match self {
			Host::Miner1 => Some("1"),
			Host::Miner2 => Some("2"),
			Host::Miner3 => Some("3"),
			Host::WebServer => None,
		}
	}

	/// Human readable label shown by the console.
	pub fn label(&self) -> &'static str {
		match self {
			Host::Miner1 => "Mineur 1",
			Host::Miner2 => "Mineur 2",
			Host::Miner3 => "Mineur 3",
			Host::WebServer => "Serveur Web",
		}
	}
}

impl fmt::Display for Host {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.label())
	}
}

impl std::str::FromStr for Host {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"1" | "miner1" => Ok(Host::Miner1),
			"2" | "miner2" => Ok(Host::Miner2),
			"3" | "miner3" => Ok(Host::Miner3),
			"web" | "webserver" | "serveurweb" => Ok(Host::WebServer),
			other => Err(format!("unknown host '{}'", other)),
		}
	}
}

/// Username and password used once, for the login exchange.
///
/// The password buffer is wiped when the credentials are dropped.
pub struct Credentials {
	pub username: String,
	pub password: Zeroizing<String>,
}

impl Credentials {
	pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
		Self {
			username: username.into(),
			password: Zeroizing::new(password.into()),
		}
	}
}

impl fmt::Debug for Credentials {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Credentials")
			.field("username", &self.username)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// Body of a successful login.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
	pub access_token: String,
}

/// One line of a host's log stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
	/// Sequence number, strictly increasing within a host.
	pub no: u64,
	pub message: String,
}

/// Result of a `GetLogs` call: the entries newer than the requested cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogBatch {
	/// Cursor reported by the server after this batch.
	#[serde(rename = "dernier")]
	pub reported_cursor: u64,
	#[serde(rename = "logs")]
	pub entries: Vec<LogEntry>,
}

/// A block of a miner's chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
	pub hash: String,
	#[serde(rename = "hash_precedent")]
	pub previous_hash: String,
	#[serde(rename = "donnees")]
	pub payload: serde_json::Value,
	/// Seconds since the Unix epoch.
	#[serde(rename = "horodatage")]
	pub timestamp: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChainResponse {
	#[serde(rename = "blocs")]
	pub blocks: Vec<Block>,
}

/// Acknowledgement of a command endpoint (any 2xx response).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack;

/// Outcome of a logout. The local session is cleared in both cases.
#[derive(Debug)]
pub enum LogoutAck {
	/// The server acknowledged the logout.
	Confirmed,
	/// The server did not acknowledge it; the error says why.
	LocalOnly(ApiError),
}

/// Failure kinds of an API call.
///
/// `BadRequest`, `Unauthorized`, `NotFound` and `ConnectionError` classify a response (or its
/// absence). `Unauthenticated` and `UnsupportedHost` are raised locally before any I/O.
/// `SchemaInvalid` means a 2xx body did not have the expected shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
	#[error("Not authenticated: login required")]
	Unauthenticated,

	#[error("Bad request: {0}")]
	BadRequest(String),

	#[error("Unauthorized: {0}")]
	Unauthorized(String),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Connection error: {0}")]
	ConnectionError(String),

	#[error("Invalid response: {0}")]
	SchemaInvalid(String),

	#[error("{0} has no blockchain")]
	UnsupportedHost(Host),
}

impl From<reqwest::Error> for ApiError {
	fn from(e: reqwest::Error) -> Self {
		ApiError::ConnectionError(e.to_string())
	}
}
