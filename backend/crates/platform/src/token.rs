//! Bearer Token Issuer
//!
//! Issues and verifies the three HS256 token kinds. Each kind has its own
//! signing key and lifetime, so a refresh or confirm-email token can never
//! pass as an access token.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use kernel::error::app_error::AppError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Token kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
    ConfirmEmail,
}

impl TokenKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
            TokenKind::ConfirmEmail => "confirm_email",
        }
    }
}

/// Signed claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub role: String,
    /// Unique token id
    pub jti: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub kind: TokenKind,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("Token is expired")]
    Expired,

    #[error("Token is invalid: {0}")]
    Invalid(String),

    #[error("Token kind mismatch: expected {expected}, got {actual}")]
    WrongKind {
        expected: &'static str,
        actual: &'static str,
    },
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(_) => AppError::internal("Failed to issue token").with_source(err),
            _ => AppError::unauthorized("Invalid or expired token").with_source(err),
        }
    }
}

/// One key plus lifetime
#[derive(Clone)]
pub struct TokenSettings {
    pub secret: Vec<u8>,
    pub lifetime: Duration,
}

impl fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSettings")
            .field("secret", &"[REDACTED]")
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

/// Token issuer configuration
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub access: TokenSettings,
    pub refresh: TokenSettings,
    pub confirm_email: TokenSettings,
    pub issuer: String,
    pub audience: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access: TokenSettings {
                secret: Vec::new(),
                lifetime: Duration::from_secs(60 * 60),
            },
            refresh: TokenSettings {
                secret: Vec::new(),
                lifetime: Duration::from_secs(7 * 24 * 3600),
            },
            confirm_email: TokenSettings {
                secret: Vec::new(),
                lifetime: Duration::from_secs(60 * 60),
            },
            issuer: "LearnLanguage.API".to_string(),
            audience: "LearnLanguage.Client".to_string(),
        }
    }
}

impl TokenConfig {
    /// Fixed, insecure keys for local development and tests
    pub fn development() -> Self {
        let mut config = Self::default();
        config.access.secret = b"dev-access-key-change-me-0123456789".to_vec();
        config.refresh.secret = b"dev-refresh-key-change-me-0123456789".to_vec();
        config.confirm_email.secret = b"dev-confirm-key-change-me-0123456789".to_vec();
        config
    }

    fn settings(&self, kind: TokenKind) -> &TokenSettings {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
            TokenKind::ConfirmEmail => &self.confirm_email,
        }
    }
}

/// Access + refresh pair returned by login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// HS256 token issuer
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    config: TokenConfig,
}

impl TokenIssuer {
    pub fn new(config: TokenConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    pub fn issue(&self, kind: TokenKind, subject: &str, role: &str) -> Result<String, TokenError> {
        let settings = self.config.settings(kind);
        let now = Utc::now().timestamp();
        let lifetime = i64::try_from(settings.lifetime.as_secs()).unwrap_or(i64::MAX / 2);

        let claims = Claims {
            sub: subject.to_string(),
            role: role.to_string(),
            jti: Uuid::new_v4().to_string(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            iat: now,
            nbf: now,
            exp: now.saturating_add(lifetime),
            kind,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&settings.secret),
        )
        .map_err(TokenError::Signing)
    }

    pub fn issue_access(&self, subject: &str, role: &str) -> Result<String, TokenError> {
        self.issue(TokenKind::Access, subject, role)
    }

    pub fn issue_refresh(&self, subject: &str, role: &str) -> Result<String, TokenError> {
        self.issue(TokenKind::Refresh, subject, role)
    }

    pub fn issue_confirm_email(&self, subject: &str, role: &str) -> Result<String, TokenError> {
        self.issue(TokenKind::ConfirmEmail, subject, role)
    }

    pub fn issue_pair(&self, subject: &str, role: &str) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue_access(subject, role)?,
            refresh_token: self.issue_refresh(subject, role)?,
        })
    }

    /// Verify signature, expiry, issuer, audience and kind
    pub fn verify(&self, kind: TokenKind, token: &str) -> Result<Claims, TokenError> {
        let settings = self.config.settings(kind);

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);
        validation.validate_nbf = true;
        validation.leeway = 0;

        let data = decode::<Claims>(token, &DecodingKey::from_secret(&settings.secret), &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })?;

        if data.claims.kind != kind {
            return Err(TokenError::WrongKind {
                expected: kind.as_str(),
                actual: data.claims.kind.as_str(),
            });
        }

        Ok(data.claims)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(TokenConfig::development())
    }

    #[test]
    fn test_access_token_roundtrip() {
        let issuer = issuer();
        let token = issuer.issue_access("user-1", "Admin").unwrap();
        let claims = issuer.verify(TokenKind::Access, &token).unwrap();

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.role, "Admin");
        assert_eq!(claims.kind, TokenKind::Access);
        assert!(Uuid::parse_str(&claims.jti).is_ok());
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_each_token_has_unique_id() {
        let issuer = issuer();
        let a = issuer.verify(TokenKind::Access, &issuer.issue_access("u", "User").unwrap()).unwrap();
        let b = issuer.verify(TokenKind::Access, &issuer.issue_access("u", "User").unwrap()).unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn test_kinds_do_not_cross() {
        let issuer = issuer();
        let pair = issuer.issue_pair("user-1", "User").unwrap();
        assert!(issuer.verify(TokenKind::Access, &pair.refresh_token).is_err());
        assert!(issuer.verify(TokenKind::Refresh, &pair.access_token).is_err());
        assert!(issuer.verify(TokenKind::Refresh, &pair.refresh_token).is_ok());

        let confirm = issuer.issue_confirm_email("user-1", "User").unwrap();
        assert!(issuer.verify(TokenKind::Access, &confirm).is_err());
        assert!(issuer.verify(TokenKind::ConfirmEmail, &confirm).is_ok());
    }

    #[test]
    fn test_same_key_wrong_kind_is_rejected() {
        let mut config = TokenConfig::development();
        config.refresh.secret = config.access.secret.clone();
        let issuer = TokenIssuer::new(config);

        let refresh = issuer.issue_refresh("user-1", "User").unwrap();
        assert!(matches!(
            issuer.verify(TokenKind::Access, &refresh),
            Err(TokenError::WrongKind { .. })
        ));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let mut config = TokenConfig::development();
        config.access.lifetime = Duration::ZERO;
        let issuer = TokenIssuer::new(config);

        let token = issuer.issue_access("user-1", "User").unwrap();
        std::thread::sleep(Duration::from_millis(1100));
        assert!(matches!(
            issuer.verify(TokenKind::Access, &token),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_foreign_audience_is_rejected() {
        let token = issuer().issue_access("user-1", "User").unwrap();

        let mut other = TokenConfig::development();
        other.audience = "someone-else".to_string();
        assert!(TokenIssuer::new(other).verify(TokenKind::Access, &token).is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer_token("bearer   abc"), Some("abc"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("abc"), None);
    }
}
