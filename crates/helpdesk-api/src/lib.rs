//! HTTP surface of the helpdesk: JSON endpoints for each role plus the
//! server-rendered dashboards that drive them through plain HTML forms.

pub mod admin;
pub mod applications;
pub mod auth;
pub mod chat;
pub mod error;
pub mod middleware;
pub mod pages;
pub mod router;

use tracing::error;

use helpdesk_ui::RefreshPolicy;

use crate::error::ApiError;

pub use auth::{AppState, AppStateInner};
pub use router::router;

/// Runtime switches that shape behaviour rather than wiring.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Reject chat posts on archived tickets instead of only disabling the
    /// input on the dashboard.
    pub enforce_closed_chat: bool,
    pub refresh: RefreshPolicy,
}

/// Runs store work off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })?
}
