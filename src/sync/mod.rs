//! Two-way synchronization between the local store and a spreadsheet-shaped
//! remote mirror.
//!
//! The remote holds one header row plus one data row per entry; conflict
//! resolution is timestamp-based (newer side wins per entry). The
//! [`RemoteMirror`] trait is the seam between the coordinator and the
//! HTTP client, and [`TokenProvider`] is the seam to the externally-managed
//! authentication flow; this crate only consumes a stored bearer token.

pub mod auto_sync;
pub mod coordinator;
pub mod rows;
pub mod sheets;

pub use auto_sync::try_auto_sync;
pub use coordinator::{PullReport, PushReport, SyncCoordinator, SyncReport};
pub use sheets::{SheetsClient, StoredTokenProvider, TokenProvider};

use std::future::Future;

/// Settings keys owned by the sync subsystem.
pub const SETTING_SPREADSHEET_ID: &str = "sheets_spreadsheet_id";
pub const SETTING_ACCESS_TOKEN: &str = "sheets_access_token";
pub const SETTING_TOKEN_EXPIRES_AT: &str = "sheets_token_expires_at";
pub const SETTING_LAST_SYNC_TIME: &str = "sheets_last_sync_time";
pub const SETTING_AUTO_SYNC: &str = "sheets_auto_sync";
pub const SETTING_SYNC_INTERVAL_MINUTES: &str = "sheets_sync_interval_minutes";

/// Errors that can occur during sync operations.
#[derive(Debug)]
pub enum SyncError {
    /// No spreadsheet has been configured yet.
    NotConfigured,
    /// The bearer token is missing, expired, or was rejected by the remote.
    /// Distinguished so callers stop retrying and request re-authentication.
    AuthExpired,
    /// The request never produced a usable response.
    Transport(String),
    /// The remote answered with a non-success status.
    Api { status: u16, message: String },
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::NotConfigured => write!(
                f,
                "No spreadsheet configured. Run 'fleetfuel sync setup' first."
            ),
            SyncError::AuthExpired => {
                write!(f, "Authentication expired. Please sign in again.")
            }
            SyncError::Transport(e) => write!(f, "Transport error: {}", e),
            SyncError::Api { status, message } => {
                write!(f, "Remote API error ({}): {}", status, message)
            }
        }
    }
}

impl std::error::Error for SyncError {}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        SyncError::Transport(e.to_string())
    }
}

/// A rectangular remote range holding one data row per entry below a fixed
/// header row.
pub trait RemoteMirror: Send + Sync {
    /// Reads every data row (header excluded). An empty or missing range
    /// yields an empty vec, never an error.
    fn read_rows(
        &self,
    ) -> impl Future<Output = Result<Vec<Vec<String>>, SyncError>> + Send;

    /// Clears all data rows, then writes `rows` starting at the first data
    /// row. Not transactional: a failure between the clear and the write can
    /// leave the range empty.
    fn overwrite_rows(
        &self,
        rows: Vec<Vec<String>>,
    ) -> impl Future<Output = Result<(), SyncError>> + Send;
}
