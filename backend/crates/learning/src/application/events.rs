//! Domain events published by the learning handlers

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use platform::messaging::DomainEvent;
use serde::{Deserialize, Serialize};

use crate::domain::entity::{Audit, User};
use crate::domain::value_object::{Email, UserRole};

/// Published after a successful registration
///
/// Carries the password hash so the read side can be rebuilt from the
/// event alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRegisteredEvent {
    pub user_id: UserId,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub nick_name: String,
    pub role: UserRole,
    pub registered_at: DateTime<Utc>,
}

impl DomainEvent for UserRegisteredEvent {
    const NAME: &'static str = "UserRegisteredEvent";
}

impl UserRegisteredEvent {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.to_string(),
            password_hash: user.password_hash.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            nick_name: user.nick_name.clone(),
            role: user.role,
            registered_at: user.audit.created_at,
        }
    }

    /// Read-side user as of registration
    pub fn to_user(&self) -> User {
        let mut audit = Audit::new();
        audit.created_at = self.registered_at;

        User {
            id: self.user_id,
            email: Email::from_db(self.email.clone()),
            password_hash: self.password_hash.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            nick_name: self.nick_name.clone(),
            role: self.role,
            is_email_confirmed: false,
            email_confirmed_at: None,
            audit,
        }
    }
}
