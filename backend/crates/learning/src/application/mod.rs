//! Application Layer
//!
//! Commands and queries, their handlers, and the registration consumer.
//! [`build_mediator`] wires every handler into one [`Mediator`].

pub mod auth;
pub mod catalog;
pub mod config;
pub mod consumer;
pub mod dto;
pub mod events;
pub mod topic;
pub mod user;
pub mod user_activity;

use std::sync::Arc;

use kernel::error::app_error::{AppResult, OptionExt};
use kernel::error::kind::ErrorKind;
use kernel::id::UserId;
use platform::cache::CacheService;
use platform::mail::EmailSender;
use platform::messaging::EventPublisher;
use platform::password::PasswordHasher;
use platform::pipeline::{Mediator, RequestContext, ValidationErrors};
use platform::token::TokenIssuer;

use crate::domain::entity::User;
use crate::domain::repository::Store;
use crate::infra::replication::WriteStore;

pub use config::{LearningConfig, RetryPolicy};

/// Role allowed to manage the catalog and delete users
pub const ADMIN: &str = "Admin";

/// How a user is looked up at login or registration
///
/// Emails and nicknames live in separate cache namespaces, so a nickname
/// that looks like an address can never shadow that address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserLookup<'a> {
    Email(&'a str),
    Nickname(&'a str),
}

impl UserLookup<'_> {
    pub fn cache_key(&self) -> String {
        match self {
            Self::Email(email) => format!("user:email:{email}"),
            Self::Nickname(nick_name) => format!("user:nick:{nick_name}"),
        }
    }

    /// A cached user only answers the lookup it was cached for
    pub fn matches(&self, user: &User) -> bool {
        match self {
            Self::Email(email) => user.email.as_str() == *email,
            Self::Nickname(nick_name) => user.nick_name == *nick_name,
        }
    }
}

/// Drop the cached copies of `user` under both lookup keys
pub(crate) async fn evict_user(cache: &dyn CacheService, user: &User) {
    cache.remove(&UserLookup::Email(user.email.as_str()).cache_key()).await;
    if !user.nick_name.is_empty() {
        cache.remove(&UserLookup::Nickname(&user.nick_name).cache_key()).await;
    }
}

/// Caller's id; a subject that is not a user id is an authentication fault
pub(crate) fn current_user_id(ctx: &RequestContext) -> AppResult<UserId> {
    ctx.current_user_id()
        .and_then(|id| UserId::parse(id).ok())
        .ok_or_app_err(ErrorKind::Unauthorized, "Invalid user identity")
}

pub(crate) fn validate_name(v: &mut ValidationErrors, field: &'static str, label: &str, value: &str) {
    if v.required(field, value, &format!("{label} is required.")) {
        v.max_len(
            field,
            value.trim(),
            50,
            &format!("{label} must not exceed 50 characters."),
        );
    }
}

/// Collaborators shared by the handlers
pub struct Dependencies<S> {
    pub write: WriteStore<S>,
    pub read: Arc<S>,
    pub cache: Arc<dyn CacheService>,
    pub hasher: Arc<PasswordHasher>,
    pub tokens: Arc<TokenIssuer>,
    pub publisher: Arc<dyn EventPublisher>,
    pub mailer: Arc<dyn EmailSender>,
    pub config: Arc<LearningConfig>,
}

impl<S> Clone for Dependencies<S> {
    fn clone(&self) -> Self {
        Self {
            write: self.write.clone(),
            read: self.read.clone(),
            cache: self.cache.clone(),
            hasher: self.hasher.clone(),
            tokens: self.tokens.clone(),
            publisher: self.publisher.clone(),
            mailer: self.mailer.clone(),
            config: self.config.clone(),
        }
    }
}

/// Register one handler per command and query
pub fn build_mediator<S: Store>(deps: &Dependencies<S>) -> Mediator {
    let d = deps.clone();

    Mediator::builder(d.cache.clone())
        // auth
        .register::<auth::RegisterCommand, _>(auth::RegisterHandler::new(
            d.write.clone(),
            d.cache.clone(),
            d.hasher.clone(),
            d.publisher.clone(),
            d.config.clone(),
        ))
        .register::<auth::LoginCommand, _>(auth::LoginHandler::new(
            d.read.clone(),
            d.cache.clone(),
            d.hasher.clone(),
            d.tokens.clone(),
            d.config.clone(),
        ))
        .register::<auth::GetMyInfoQuery, _>(auth::GetMyInfoHandler::new(d.read.clone()))
        .register::<auth::ConfirmEmailCommand, _>(auth::ConfirmEmailHandler::new(
            d.write.clone(),
            d.cache.clone(),
            d.tokens.clone(),
            d.mailer.clone(),
        ))
        // topics
        .register::<topic::CreateTopicCommand, _>(topic::TopicCommandHandler::new(d.write.clone(), d.cache.clone()))
        .register::<topic::UpdateTopicCommand, _>(topic::TopicCommandHandler::new(d.write.clone(), d.cache.clone()))
        .register::<topic::DeleteTopicCommand, _>(topic::TopicCommandHandler::new(d.write.clone(), d.cache.clone()))
        .register::<topic::GetAllTopicsQuery, _>(topic::TopicQueryHandler::new(d.read.clone()))
        .register::<topic::GetTopicByIdQuery, _>(topic::TopicQueryHandler::new(d.read.clone()))
        .register::<topic::GetTopicByNameQuery, _>(topic::TopicQueryHandler::new(d.read.clone()))
        // users
        .register::<user::GetAllUsersQuery, _>(user::UserQueryHandler::new(d.read.clone()))
        .register::<user::GetUserByIdQuery, _>(user::UserQueryHandler::new(d.read.clone()))
        .register::<user::UpdateUserCommand, _>(user::UserCommandHandler::new(d.write.clone(), d.cache.clone()))
        .register::<user::DeleteUserCommand, _>(user::UserCommandHandler::new(d.write.clone(), d.cache.clone()))
        // activities
        .register::<user_activity::CreateUserActivityCommand, _>(user_activity::CreateUserActivityHandler::new(
            d.write.clone(),
        ))
        .register::<user_activity::GetUserActivityQuery, _>(user_activity::GetUserActivityHandler::new(
            d.read.clone(),
        ))
        // catalog
        .register::<catalog::CreateLevelCommand, _>(catalog::CreateLevelHandler::new(d.write.clone()))
        .register::<catalog::CreateLessonCommand, _>(catalog::CreateLessonHandler::new(
            d.write.clone(),
            d.cache.clone(),
        ))
        .register::<catalog::GetLessonsByTopicQuery, _>(catalog::GetLessonsByTopicHandler::new(d.read.clone()))
        .build()
}
