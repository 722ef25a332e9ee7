//! Bearer-token session shared by every API call.
//!
//! The session is a two-state machine. Only three transitions write it: a successful login,
//! a logout, and an unauthorized (401/403) response. Everything else takes a snapshot of the
//! token at call time.

use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionState {
	Unauthenticated,
	Authenticated { token: String },
}

/// Holder of the bearer token.
#[derive(Debug)]
pub struct AuthSession {
	state: RwLock<SessionState>,
}

impl Default for AuthSession {
	fn default() -> Self {
		Self::new()
	}
}

impl AuthSession {
	/// Create an unauthenticated session.
	pub fn new() -> Self {
		Self {
			state: RwLock::new(SessionState::Unauthenticated),
		}
	}

	/// Login succeeded: store the token.
	pub(crate) async fn authenticate(&self, token: String) {
		*self.state.write().await = SessionState::Authenticated { token };
		info!("Session authenticated");
	}

	/// Logout: drop the token and hand it back so the logout request can still be signed.
	pub(crate) async fn take_token(&self) -> Option<String> {
		let mut state = self.state.write().await;
		match std::mem::replace(&mut *state, SessionState::Unauthenticated) {
			SessionState::Authenticated { token } => {
				info!("Session cleared");
				Some(token)
			}
			SessionState::Unauthenticated => None,
		}
	}

	/// Unauthorized response for a call signed with `token`.
	///
	/// The session is only dropped if it still holds that token, so a re-login that completed
	/// while the rejected call was in flight survives.
	pub(crate) async fn invalidate(&self, token: &str) {
		let mut state = self.state.write().await;
		if matches!(&*state, SessionState::Authenticated { token: current } if current == token) {
			*state = SessionState::Unauthenticated;
			warn!("Session invalidated by an unauthorized response");
		}
	}

	/// Unauthorized response to a login attempt.
	pub(crate) async fn invalidate_all(&self) {
		let mut state = self.state.write().await;
		if *state != SessionState::Unauthenticated {
			warn!("Session invalidated by a rejected login");
		}
		*state = SessionState::Unauthenticated;
	}

	/// Current token, if authenticated.
	pub async fn bearer(&self) -> Option<String> {
		match &*self.state.read().await {
			SessionState::Authenticated { token } => Some(token.clone()),
			SessionState::Unauthenticated => None,
		}
	}

	pub async fn is_authenticated(&self) -> bool {
		matches!(&*self.state.read().await, SessionState::Authenticated { .. })
	}
}
