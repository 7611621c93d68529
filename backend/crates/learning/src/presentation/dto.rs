//! HTTP-only request shapes
//!
//! Command and query bodies deserialize straight into their request types;
//! only query strings that differ from a request live here.

use serde::Deserialize;

// ============================================================================
// Confirm Email
// ============================================================================

/// Query string of the emailed confirmation link
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmEmailParams {
    pub token: String,
    /// Informational; the token subject decides which user is confirmed
    #[serde(default)]
    pub email: Option<String>,
}
