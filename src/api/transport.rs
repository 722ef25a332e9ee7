//!
//! HTTP transport for the administration API.
//!
//! The transport only moves bytes: it builds the request against the configured base URI,
//! attaches the bearer token it is given and returns the raw status and body. Mapping a status
//! to an error kind is done by [`classify`], which is shared by every operation.

use super::types::ApiError;
use reqwest::redirect::Policy;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::debug;

/// HTTP method of an API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
	Get,
	Post,
}

/// A request ready to be sent, relative to the base URI.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
	pub method: Method,
	/// Absolute path, e.g. `/admin/logs/1`.
	pub path: String,
	/// JSON body, sent even on `GET` when present.
	pub body: Option<serde_json::Value>,
	/// Bearer token to attach, `None` for anonymous calls.
	pub bearer: Option<String>,
}

impl ApiRequest {
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			body: None,
			bearer: None,
		}
	}

	pub fn with_body(mut self, body: serde_json::Value) -> Self {
		self.body = Some(body);
		self
	}

	pub fn with_bearer(mut self, token: String) -> Self {
		self.bearer = Some(token);
		self
	}
}

/// Status and body of a response, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
	pub status: u16,
	pub body: Vec<u8>,
}

impl RawResponse {
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self {
			status,
			body: body.into(),
		}
	}
}

/// Map a response status to success or to exactly one failure kind.
pub fn classify(response: &RawResponse) -> Result<(), ApiError> {
	match response.status {
		200..=299 => Ok(()),
		400 => Err(ApiError::BadRequest(body_excerpt(&response.body))),
		401 | 403 => Err(ApiError::Unauthorized(format!(
			"HTTP {}",
			response.status
		))),
		404 => Err(ApiError::NotFound(format!("HTTP {}", response.status))),
		status => Err(ApiError::ConnectionError(format!("HTTP {}", status))),
	}
}

fn body_excerpt(body: &[u8]) -> String {
	const MAX: usize = 200;
	let text = String::from_utf8_lossy(body);
	let text = text.trim();
	if text.is_empty() {
		return "HTTP 400".to_string();
	}
	match text.char_indices().nth(MAX) {
		Some((cut, _)) => format!("{}…", &text[..cut]),
		None => text.to_string(),
	}
}

/// Something able to carry an [`ApiRequest`] to the backend.
///
/// Implementations return `Err` only for transport failures (timeout, refused connection,
/// unreadable response), always as [`ApiError::ConnectionError`].
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
	async fn send(&self, request: ApiRequest) -> Result<RawResponse, ApiError>;
}

/// `reqwest` backed transport.
#[derive(Clone)]
pub struct HttpTransport {
	/// The underlying HTTP client, carrying the request timeout.
	http_client: Client,
	/// Base URI every path is appended to.
	base_uri: Url,
}

impl HttpTransport {
	/// Create a transport for `base_uri` whose requests give up after `timeout`.
	///
	/// Redirects are not followed: a 3xx reaches [`classify`] as is.
	pub fn new(base_uri: Url, timeout: Duration) -> Result<Self, ApiError> {
		let http_client = Client::builder()
			.timeout(timeout)
			.redirect(Policy::none())
			.build()?;
		Ok(Self {
			http_client,
			base_uri,
		})
	}

	fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
		let joined = format!("{}{}", self.base_uri.as_str().trim_end_matches('/'), path);
		Url::parse(&joined)
			.map_err(|e| ApiError::ConnectionError(format!("Invalid endpoint {}: {}", joined, e)))
	}
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
	async fn send(&self, request: ApiRequest) -> Result<RawResponse, ApiError> {
		let url = self.endpoint(&request.path)?;
		debug!("{:?} {}", request.method, url);

		let mut builder = match request.method {
			Method::Get => self.http_client.get(url),
			Method::Post => self.http_client.post(url),
		};
		if let Some(token) = &request.bearer {
			builder = builder.bearer_auth(token);
		}
		if let Some(body) = &request.body {
			builder = builder.json(body);
		}

		let response = builder.send().await?;
		let status = response.status().as_u16();
		let body = response.bytes().await?.to_vec();
		debug!("{} answered {} ({} bytes)", request.path, status, body.len());

		Ok(RawResponse { status, body })
	}
}
