//! User Entity

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use serde::{Deserialize, Serialize};

use super::audit::Audit;
use crate::domain::value_object::{email::Email, user_role::UserRole};

/// Registered learner or administrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    /// Argon2id PHC string
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    /// May be empty
    pub nick_name: String,
    pub role: UserRole,
    pub is_email_confirmed: bool,
    pub email_confirmed_at: Option<DateTime<Utc>>,
    pub audit: Audit,
}

impl User {
    /// New self-registered user: role `User`, empty nickname, unconfirmed
    pub fn register(email: Email, password_hash: String, first_name: String, last_name: String) -> Self {
        Self {
            id: UserId::new(),
            email,
            password_hash,
            first_name,
            last_name,
            nick_name: String::new(),
            role: UserRole::User,
            is_email_confirmed: false,
            email_confirmed_at: None,
            audit: Audit::new(),
        }
    }

    /// Idempotent; returns `false` when the email was already confirmed
    pub fn confirm_email(&mut self, at: DateTime<Utc>) -> bool {
        if self.is_email_confirmed {
            return false;
        }
        self.is_email_confirmed = true;
        self.email_confirmed_at = Some(at);
        true
    }

    /// Case-insensitive substring match over names, nickname and email
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        [
            self.first_name.as_str(),
            self.last_name.as_str(),
            self.nick_name.as_str(),
            self.email.as_str(),
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(&term))
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}
