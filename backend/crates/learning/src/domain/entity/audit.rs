//! Audit trail carried by every entity

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use serde::{Deserialize, Serialize};

/// Who touched a row and when
///
/// `deleted_*` exist in the schema but nothing sets them: deletes are hard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_by: Option<UserId>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<UserId>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Audit {
    pub fn new() -> Self {
        Self {
            created_by: None,
            created_at: Utc::now(),
            updated_by: None,
            updated_at: None,
            deleted_by: None,
            deleted_at: None,
        }
    }

    pub fn stamp_created(&mut self, actor: Option<UserId>, at: DateTime<Utc>) {
        self.created_by = actor;
        self.created_at = at;
    }

    pub fn stamp_updated(&mut self, actor: Option<UserId>, at: DateTime<Utc>) {
        self.updated_by = actor;
        self.updated_at = Some(at);
    }
}

impl Default for Audit {
    fn default() -> Self {
        Self::new()
    }
}
