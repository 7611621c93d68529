//! Auth Use Cases
//!
//! Register, login, current-user info and email confirmation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use kernel::error::app_error::{AppError, AppResult};
use kernel::id::UserId;
use kernel::response::{Rejection, Reply};
use platform::cache::CacheService;
use platform::mail::{EmailSender, welcome_email};
use platform::messaging::{EventPublisher, publish_event};
use platform::password::{ClearTextPassword, PasswordHasher};
use platform::pipeline::{AuthRequirement, Request, RequestContext, RequestHandler, ValidationErrors};
use platform::token::{TokenIssuer, TokenKind, TokenPair};
use serde::{Deserialize, Serialize};

use crate::application::config::LearningConfig;
use crate::application::dto::{MyInfoDto, UserDto};
use crate::application::events::UserRegisteredEvent;
use crate::application::{UserLookup, current_user_id, evict_user, validate_name};
use crate::domain::entity::User;
use crate::domain::repository::Store;
use crate::domain::value_object::Email;
use crate::infra::replication::WriteStore;

pub const EMAIL_EXISTS: &str = "Email already exists.";
pub const INVALID_CREDENTIALS: &str = "Invalid login credentials.";
pub const USER_NOT_FOUND: &str = "User not found.";
pub const INVALID_CONFIRMATION: &str = "Invalid or expired confirmation token.";

// ============================================================================
// Register
// ============================================================================

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCommand {
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

impl Request for RegisterCommand {
    type Response = Reply<UserDto>;
    const NAME: &'static str = "RegisterCommand";

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = ValidationErrors::new();
        v.check("email", Email::new(&self.email));
        v.check("password", ClearTextPassword::new(self.password.as_str()));
        validate_name(&mut v, "firstName", "First name", &self.first_name);
        validate_name(&mut v, "lastName", "Last name", &self.last_name);
        v.into_result()
    }
}

pub struct RegisterHandler<S> {
    write: WriteStore<S>,
    cache: Arc<dyn CacheService>,
    hasher: Arc<PasswordHasher>,
    publisher: Arc<dyn EventPublisher>,
    config: Arc<LearningConfig>,
}

impl<S: Store> RegisterHandler<S> {
    pub fn new(
        write: WriteStore<S>,
        cache: Arc<dyn CacheService>,
        hasher: Arc<PasswordHasher>,
        publisher: Arc<dyn EventPublisher>,
        config: Arc<LearningConfig>,
    ) -> Self {
        Self {
            write,
            cache,
            hasher,
            publisher,
            config,
        }
    }
}

#[async_trait]
impl<S: Store> RequestHandler<RegisterCommand> for RegisterHandler<S> {
    async fn handle(&self, request: RegisterCommand, ctx: &RequestContext) -> AppResult<Reply<UserDto>> {
        let email = Email::new(&request.email).map_err(|e| AppError::bad_request(e.to_string()))?;
        let lookup = UserLookup::Email(email.as_str());
        let key = lookup.cache_key();

        let cached = self
            .cache
            .get::<User>(&key)
            .await
            .is_some_and(|user| lookup.matches(&user));
        if cached || self.write.store().find_user_by_email(email.as_str()).await?.is_some() {
            tracing::debug!(email = %email, cached, "Registration refused: email in use");
            return Ok(Reply::already_exists(EMAIL_EXISTS));
        }

        let password = ClearTextPassword::new(request.password)?;
        let password_hash = self.hasher.hash(&password)?;

        let user = User::register(
            email,
            password_hash,
            request.first_name.trim().to_string(),
            request.last_name.trim().to_string(),
        );

        let user = match self.write.scope(ctx).insert_user(user).await {
            Ok(user) => user,
            Err(e) if e.is_duplicate() => {
                tracing::debug!(key = %key, "Registration lost a race on email");
                return Ok(Reply::already_exists(EMAIL_EXISTS));
            }
            Err(e) => return Err(e.into()),
        };

        self.cache
            .set(&key, &user, Some(self.config.register_cache_ttl))
            .await;

        if let Err(e) = publish_event(self.publisher.as_ref(), &UserRegisteredEvent::from_user(&user)).await {
            tracing::warn!(user_id = %user.id, error = %e, "Registration kept without event");
        }

        tracing::info!(user_id = %user.id, email = %user.email, "User registered");

        Ok(Reply::done("User registered successfully.", UserDto::from(&user)))
    }
}

// ============================================================================
// Login
// ============================================================================

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginCommand {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub nick_name: String,
    #[serde(skip_serializing, default)]
    pub password: String,
}

impl LoginCommand {
    /// Normalized email when given, otherwise the trimmed nickname
    fn lookup_value(&self) -> String {
        let email = self.email.trim();
        if email.is_empty() {
            self.nick_name.trim().to_string()
        } else {
            email.to_lowercase()
        }
    }

    fn lookup<'a>(&self, value: &'a str) -> UserLookup<'a> {
        if self.email.trim().is_empty() {
            UserLookup::Nickname(value)
        } else {
            UserLookup::Email(value)
        }
    }
}

impl Request for LoginCommand {
    type Response = Reply<TokenPair>;
    const NAME: &'static str = "LoginCommand";

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = ValidationErrors::new();
        let has_email = !self.email.trim().is_empty();
        v.ensure(
            "email",
            has_email || !self.nick_name.trim().is_empty(),
            "Email or nickname is required.",
        );
        if has_email {
            v.check("email", Email::new(&self.email));
        }
        v.required("password", &self.password, "Password is required.");
        v.into_result()
    }
}

pub struct LoginHandler<S> {
    read: Arc<S>,
    cache: Arc<dyn CacheService>,
    hasher: Arc<PasswordHasher>,
    tokens: Arc<TokenIssuer>,
    config: Arc<LearningConfig>,
}

impl<S: Store> LoginHandler<S> {
    pub fn new(
        read: Arc<S>,
        cache: Arc<dyn CacheService>,
        hasher: Arc<PasswordHasher>,
        tokens: Arc<TokenIssuer>,
        config: Arc<LearningConfig>,
    ) -> Self {
        Self {
            read,
            cache,
            hasher,
            tokens,
            config,
        }
    }

    async fn find_user(&self, lookup: UserLookup<'_>) -> AppResult<Option<User>> {
        let key = lookup.cache_key();
        match self.cache.get::<User>(&key).await {
            Some(user) if lookup.matches(&user) => return Ok(Some(user)),
            Some(_) => {
                tracing::warn!(key = %key, "Cached user does not match its key, evicting");
                self.cache.remove(&key).await;
            }
            None => {}
        }

        let user = match lookup {
            UserLookup::Email(email) => self.read.find_user_by_email(email).await?,
            UserLookup::Nickname(nick_name) => self.read.find_user_by_nickname(nick_name).await?,
        };

        if let Some(user) = &user {
            self.cache.set(&key, user, Some(self.config.login_cache_ttl)).await;
        }
        Ok(user)
    }
}

#[async_trait]
impl<S: Store> RequestHandler<LoginCommand> for LoginHandler<S> {
    async fn handle(&self, request: LoginCommand, _ctx: &RequestContext) -> AppResult<Reply<TokenPair>> {
        let lookup = request.lookup_value();

        let Some(user) = self.find_user(request.lookup(&lookup)).await? else {
            tracing::warn!(login = %lookup, reason = "user not found", "Login failed");
            return Ok(Reply::rejected(Rejection::InvalidCredentials, INVALID_CREDENTIALS));
        };

        let password = ClearTextPassword::for_verification(request.password)?;
        if !self.hasher.verify(&password, &user.password_hash) {
            tracing::warn!(user_id = %user.id, reason = "password mismatch", "Login failed");
            return Ok(Reply::rejected(Rejection::InvalidCredentials, INVALID_CREDENTIALS));
        }

        let tokens = self.tokens.issue_pair(&user.id.to_string(), user.role.code())?;

        tracing::info!(user_id = %user.id, "User logged in");

        Ok(Reply::done("Login successful.", tokens))
    }
}

// ============================================================================
// Get My Info
// ============================================================================

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GetMyInfoQuery;

impl Request for GetMyInfoQuery {
    type Response = Reply<MyInfoDto>;
    const NAME: &'static str = "GetMyInfoQuery";
    const AUTH: AuthRequirement = AuthRequirement::Authenticated;
}

pub struct GetMyInfoHandler<S> {
    read: Arc<S>,
}

impl<S: Store> GetMyInfoHandler<S> {
    pub fn new(read: Arc<S>) -> Self {
        Self { read }
    }
}

#[async_trait]
impl<S: Store> RequestHandler<GetMyInfoQuery> for GetMyInfoHandler<S> {
    async fn handle(&self, _request: GetMyInfoQuery, ctx: &RequestContext) -> AppResult<Reply<MyInfoDto>> {
        let user_id = current_user_id(ctx)?;

        let Some(user) = self.read.find_user_by_id(&user_id).await? else {
            return Ok(Reply::not_found(USER_NOT_FOUND));
        };
        let activities = self.read.find_activities_by_user(&user_id).await?;

        Ok(Reply::done("Fetched user info.", MyInfoDto::new(&user, &activities)))
    }
}

// ============================================================================
// Confirm Email
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmEmailCommand {
    pub token: String,
}

impl Request for ConfirmEmailCommand {
    /// Data is the confirmed address
    type Response = Reply<String>;
    const NAME: &'static str = "ConfirmEmailCommand";

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = ValidationErrors::new();
        v.required("token", &self.token, "Token is required.");
        v.into_result()
    }
}

pub struct ConfirmEmailHandler<S> {
    write: WriteStore<S>,
    cache: Arc<dyn CacheService>,
    tokens: Arc<TokenIssuer>,
    mailer: Arc<dyn EmailSender>,
}

impl<S: Store> ConfirmEmailHandler<S> {
    pub fn new(
        write: WriteStore<S>,
        cache: Arc<dyn CacheService>,
        tokens: Arc<TokenIssuer>,
        mailer: Arc<dyn EmailSender>,
    ) -> Self {
        Self {
            write,
            cache,
            tokens,
            mailer,
        }
    }
}

#[async_trait]
impl<S: Store> RequestHandler<ConfirmEmailCommand> for ConfirmEmailHandler<S> {
    async fn handle(&self, request: ConfirmEmailCommand, ctx: &RequestContext) -> AppResult<Reply<String>> {
        let claims = match self.tokens.verify(TokenKind::ConfirmEmail, request.token.trim()) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::warn!(error = %e, "Email confirmation refused");
                return Ok(Reply::rejected(Rejection::InvalidToken, INVALID_CONFIRMATION));
            }
        };
        let Ok(user_id) = UserId::parse(&claims.sub) else {
            tracing::warn!(subject = %claims.sub, "Confirmation token subject is not a user id");
            return Ok(Reply::rejected(Rejection::InvalidToken, INVALID_CONFIRMATION));
        };

        let Some(mut user) = self.write.store().find_user_by_id(&user_id).await? else {
            return Ok(Reply::not_found(USER_NOT_FOUND));
        };

        // Already confirmed: nothing to write, no second welcome email
        if !user.confirm_email(Utc::now()) {
            return Ok(Reply::done("Email confirmed successfully.", user.email.into_db()));
        }

        let user = self.write.scope(ctx).update_user(user).await?;
        evict_user(self.cache.as_ref(), &user).await;

        let welcome = welcome_email(user.email.as_str(), &user.display_name());
        if let Err(e) = self.mailer.send(welcome).await {
            tracing::warn!(user_id = %user.id, error = %e, "Welcome email not sent");
        }

        tracing::info!(user_id = %user.id, "Email confirmed");
        Ok(Reply::done("Email confirmed successfully.", user.email.into_db()))
    }
}
