//!
//! Client for the mining backend administration API.
//!
//! Every operation follows the same path: take a snapshot of the session token, send the
//! request through the [`Transport`], classify the status, then validate and decode the body.
//! Failures are returned as an [`ApiError`] and never collapsed into an empty result.

use super::schema::{self, Shape};
use super::session::AuthSession;
use super::transport::{ApiRequest, HttpTransport, Method, RawResponse, Transport, classify};
use super::types::*;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Administration API client
#[derive(Clone)]
pub struct ApiClient {
	/// Carries requests to the backend.
	transport: Arc<dyn Transport>,
	/// Bearer token shared by every clone of this client.
	session: Arc<AuthSession>,
}

impl ApiClient {
	/// Create a client over an arbitrary transport with a fresh session.
	pub fn new(transport: Arc<dyn Transport>) -> Self {
		Self {
			transport,
			session: Arc::new(AuthSession::new()),
		}
	}

	/// Create a client talking HTTP to `base_uri`.
	///
	/// # Errors
	/// Returns `ApiError::ConnectionError` if the HTTP client cannot be built.
	pub fn http(base_uri: Url, timeout: Duration) -> Result<Self, ApiError> {
		Ok(Self::new(Arc::new(HttpTransport::new(base_uri, timeout)?)))
	}

	pub fn session(&self) -> &Arc<AuthSession> {
		&self.session
	}

	/// Exchange credentials for a bearer token.
	///
	/// On success the session becomes authenticated. On any failure the session is left
	/// unauthenticated, dropping a token held from an earlier login.
	pub async fn login(&self, credentials: &Credentials) -> Result<(), ApiError> {
		info!("Logging in as {}", credentials.username);

		match self.request_token(credentials).await {
			Ok(token) => {
				self.session.authenticate(token.access_token).await;
				Ok(())
			}
			Err(e) => {
				self.session.invalidate_all().await;
				warn!("Login rejected: {}", e);
				Err(e)
			}
		}
	}

	async fn request_token(&self, credentials: &Credentials) -> Result<TokenResponse, ApiError> {
		let request = ApiRequest::new(Method::Post, "/usager/login").with_body(json!({
			"usager": credentials.username,
			"mot_de_passe": credentials.password.as_str(),
		}));

		let response = self.transport.send(request).await?;
		classify(&response)?;
		schema::decode(&response.body, &schema::token_response())
	}

	/// End the session.
	///
	/// The token is dropped locally before the request goes out, so the call only fails when
	/// there was no session to end. Whether the server confirmed is reported in the
	/// [`LogoutAck`].
	pub async fn logout(&self) -> Result<LogoutAck, ApiError> {
		let token = self
			.session
			.take_token()
			.await
			.ok_or(ApiError::Unauthenticated)?;

		let request = ApiRequest::new(Method::Post, "/admin/logout").with_bearer(token);
		let outcome = match self.transport.send(request).await {
			Ok(response) => classify(&response),
			Err(e) => Err(e),
		};

		match outcome {
			Ok(()) => {
				info!("Logged out");
				Ok(LogoutAck::Confirmed)
			}
			Err(e) => {
				warn!("Logout not confirmed by server, session cleared locally: {}", e);
				Ok(LogoutAck::LocalOnly(e))
			}
		}
	}

	/// Change the password of the logged in account.
	pub async fn change_password(&self, old: &str, new: &str) -> Result<Ack, ApiError> {
		let body = json!({ "ancien": old, "nouveau": new });
		self.command("/admin/motdepasse", body).await
	}

	/// Create an account, with edit rights when `is_editor` is set.
	pub async fn create_account(
		&self,
		credentials: &Credentials,
		is_editor: bool,
	) -> Result<Ack, ApiError> {
		let body = json!({
			"usager": credentials.username,
			"mot_de_passe": credentials.password.as_str(),
			"edition": is_editor,
		});
		self.command("/admin/creationcompte", body).await
	}

	/// Delete the account named `username`.
	pub async fn delete_account(&self, username: &str) -> Result<Ack, ApiError> {
		self.command("/admin/suppressioncompte", json!({ "usager": username }))
			.await
	}

	/// Fetch the full chain of a miner, oldest block first.
	///
	/// # Errors
	/// `ApiError::UnsupportedHost` for the web server, which keeps no chain.
	pub async fn get_blockchain(&self, host: Host) -> Result<Vec<Block>, ApiError> {
		let segment = host
			.chain_segment()
			.ok_or(ApiError::UnsupportedHost(host))?;
		let request = ApiRequest::new(Method::Get, format!("/admin/chaine/{}", segment));

		let chain: ChainResponse = self
			.authorized(request, &schema::chain_response())
			.await?;
		debug!("{} returned {} blocks", host, chain.blocks.len());
		Ok(chain.blocks)
	}

	/// Fetch the log entries of `host` newer than `last_received`.
	pub async fn get_logs(&self, host: Host, last_received: u64) -> Result<LogBatch, ApiError> {
		let request = ApiRequest::new(
			Method::Get,
			format!("/admin/logs/{}", host.logs_segment()),
		)
		.with_body(json!({ "dernier": last_received }));

		let batch: LogBatch = self.authorized(request, &schema::logs_response()).await?;
		debug!(
			"{} returned {} log entries after #{} (server cursor {})",
			host,
			batch.entries.len(),
			last_received,
			batch.reported_cursor
		);
		Ok(batch)
	}

	async fn command(&self, path: &str, body: serde_json::Value) -> Result<Ack, ApiError> {
		let request = ApiRequest::new(Method::Post, path).with_body(body);
		let response = self.send_authorized(request).await?;
		schema::check(&response.body, &schema::ack_response())?;
		info!("{} acknowledged", path);
		Ok(Ack)
	}

	async fn authorized<T: DeserializeOwned>(
		&self,
		request: ApiRequest,
		shape: &Shape,
	) -> Result<T, ApiError> {
		let response = self.send_authorized(request).await?;
		schema::decode(&response.body, shape)
	}

	/// Sign `request` with the current token, send it and classify the status.
	async fn send_authorized(&self, request: ApiRequest) -> Result<RawResponse, ApiError> {
		let token = self
			.session
			.bearer()
			.await
			.ok_or(ApiError::Unauthenticated)?;

		let response = self
			.transport
			.send(request.with_bearer(token.clone()))
			.await?;

		if let Err(e) = classify(&response) {
			if matches!(e, ApiError::Unauthorized(_)) {
				self.session.invalidate(&token).await;
			}
			return Err(e);
		}
		Ok(response)
	}
}
