use crate::api::ApiError;

/// Errors surfaced by the sync engines
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
	#[error("API error: {0}")]
	ApiError(#[from] ApiError),

	#[error("Event handler error: {0}")]
	HandlerError(String),
}

impl SyncError {
	/// Whether the failure means the session is gone and a new login is needed.
	pub fn needs_login(&self) -> bool {
		matches!(
			self,
			SyncError::ApiError(ApiError::Unauthenticated | ApiError::Unauthorized(_))
		)
	}
}
