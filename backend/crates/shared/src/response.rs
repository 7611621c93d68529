//! Response Envelopes
//!
//! Every command/query answers with a [`Reply<T>`]. Expected business
//! failures (not found, already exists, bad credentials, ...) are a
//! [`Reply::Rejected`] value, never an [`AppError`](crate::error::app_error::AppError).
//! Faults stay on the error channel.
//!
//! On the wire a reply is the flat `{success, message, data}` object:
//!
//! ```
//! use kernel::response::{Reply, Rejection};
//!
//! let ok = Reply::done("Fetched topic.", 7);
//! assert_eq!(
//!     serde_json::to_value(&ok).unwrap(),
//!     serde_json::json!({"success": true, "message": "Fetched topic.", "data": 7})
//! );
//!
//! let no: Reply<i32> = Reply::rejected(Rejection::NotFound, "Topic not found.");
//! assert_eq!(serde_json::to_value(&no).unwrap()["success"], false);
//! ```

use std::borrow::Cow;

use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Expected business failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rejection {
    /// Target entity does not exist
    NotFound,
    /// A uniqueness rule would be violated
    AlreadyExists,
    /// Login failed (unknown user or wrong password, intentionally merged)
    InvalidCredentials,
    /// Entity is referenced by children and cannot be removed
    StillReferenced,
    /// Token is malformed, expired or of the wrong kind
    InvalidToken,
}

/// Tagged command/query result
#[derive(Debug, Clone, PartialEq)]
pub enum Reply<T> {
    /// Operation succeeded
    Done {
        message: Cow<'static, str>,
        data: T,
    },
    /// Operation was refused for an expected reason
    Rejected {
        reason: Rejection,
        message: Cow<'static, str>,
    },
}

impl<T> Reply<T> {
    pub fn done(message: impl Into<Cow<'static, str>>, data: T) -> Self {
        Reply::Done {
            message: message.into(),
            data,
        }
    }

    pub fn rejected(reason: Rejection, message: impl Into<Cow<'static, str>>) -> Self {
        Reply::Rejected {
            reason,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<Cow<'static, str>>) -> Self {
        Self::rejected(Rejection::NotFound, message)
    }

    pub fn already_exists(message: impl Into<Cow<'static, str>>) -> Self {
        Self::rejected(Rejection::AlreadyExists, message)
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Done { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Reply::Done { message, .. } | Reply::Rejected { message, .. } => message,
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Reply::Done { data, .. } => Some(data),
            Reply::Rejected { .. } => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Reply::Done { data, .. } => Some(data),
            Reply::Rejected { .. } => None,
        }
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Reply::Done { .. } => None,
            Reply::Rejected { reason, .. } => Some(*reason),
        }
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    success: bool,
    message: &'a str,
    data: Option<&'a T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<Rejection>,
}

#[derive(Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
struct Envelope<T> {
    success: bool,
    message: String,
    data: Option<T>,
    #[serde(default)]
    reason: Option<Rejection>,
}

impl<T: Serialize> Serialize for Reply<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let envelope = match self {
            Reply::Done { message, data } => EnvelopeRef {
                success: true,
                message,
                data: Some(data),
                reason: None,
            },
            Reply::Rejected { reason, message } => EnvelopeRef {
                success: false,
                message,
                data: None,
                reason: Some(*reason),
            },
        };
        envelope.serialize(serializer)
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Reply<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let envelope = Envelope::<T>::deserialize(deserializer)?;
        if envelope.success {
            let data = envelope
                .data
                .ok_or_else(|| de::Error::missing_field("data"))?;
            Ok(Reply::done(envelope.message, data))
        } else {
            let reason = envelope
                .reason
                .ok_or_else(|| de::Error::missing_field("reason"))?;
            Ok(Reply::rejected(reason, envelope.message))
        }
    }
}

// ============================================================================
// Paged listing
// ============================================================================

/// One page of a filtered listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub page_number: u32,
    pub page_size: u32,
    /// Size of the whole filtered set, not of this page
    pub total_records: u64,
    pub data: Vec<T>,
}

impl<T> Page<T> {
    /// Offset of the first record of page `page_number` (1-based)
    pub fn offset(page_number: u32, page_size: u32) -> u64 {
        u64::from(page_number.saturating_sub(1)) * u64::from(page_size)
    }
}
