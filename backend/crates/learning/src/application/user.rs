//! User Use Cases

use std::sync::Arc;

use async_trait::async_trait;
use kernel::error::app_error::AppResult;
use kernel::id::UserId;
use kernel::response::{Page, Rejection, Reply};
use platform::cache::CacheService;
use platform::pipeline::{AuthRequirement, Request, RequestContext, RequestHandler, ValidationErrors};
use serde::{Deserialize, Serialize};

use crate::application::auth::USER_NOT_FOUND;
use crate::application::dto::UserDto;
use crate::application::{ADMIN, evict_user, validate_name};
use crate::domain::repository::{Store, UserFilter};
use crate::infra::replication::WriteStore;

pub const MAX_PAGE_SIZE: u32 = 100;

fn default_page_number() -> u32 {
    1
}

fn default_page_size() -> u32 {
    10
}

// ============================================================================
// Queries
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAllUsersQuery {
    #[serde(default = "default_page_number")]
    pub page_number: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub search_term: Option<String>,
}

impl Default for GetAllUsersQuery {
    fn default() -> Self {
        Self {
            page_number: default_page_number(),
            page_size: default_page_size(),
            search_term: None,
        }
    }
}

impl Request for GetAllUsersQuery {
    type Response = Page<UserDto>;
    const NAME: &'static str = "GetAllUsersQuery";
    const AUTH: AuthRequirement = AuthRequirement::Authenticated;

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = ValidationErrors::new();
        v.ensure("pageNumber", self.page_number >= 1, "Page number must be at least 1.");
        v.ensure(
            "pageSize",
            (1..=MAX_PAGE_SIZE).contains(&self.page_size),
            "Page size must be between 1 and 100.",
        );
        v.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetUserByIdQuery {
    pub id: UserId,
}

impl Request for GetUserByIdQuery {
    type Response = Reply<UserDto>;
    const NAME: &'static str = "GetUserByIdQuery";
    const AUTH: AuthRequirement = AuthRequirement::Authenticated;
}

pub struct UserQueryHandler<S> {
    read: Arc<S>,
}

impl<S: Store> UserQueryHandler<S> {
    pub fn new(read: Arc<S>) -> Self {
        Self { read }
    }
}

#[async_trait]
impl<S: Store> RequestHandler<GetAllUsersQuery> for UserQueryHandler<S> {
    async fn handle(&self, request: GetAllUsersQuery, _ctx: &RequestContext) -> AppResult<Page<UserDto>> {
        let search = request
            .search_term
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_string);

        let filter = UserFilter {
            search,
            offset: Page::<UserDto>::offset(request.page_number, request.page_size),
            limit: u64::from(request.page_size),
        };
        let (users, total_records) = self.read.list_users(&filter).await?;

        Ok(Page {
            page_number: request.page_number,
            page_size: request.page_size,
            total_records,
            data: users.iter().map(UserDto::from).collect(),
        })
    }
}

#[async_trait]
impl<S: Store> RequestHandler<GetUserByIdQuery> for UserQueryHandler<S> {
    async fn handle(&self, request: GetUserByIdQuery, _ctx: &RequestContext) -> AppResult<Reply<UserDto>> {
        Ok(match self.read.find_user_by_id(&request.id).await? {
            Some(user) => Reply::done("Fetched user.", UserDto::from(&user)),
            None => Reply::not_found(USER_NOT_FOUND),
        })
    }
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserCommand {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub nick_name: Option<String>,
}

impl Request for UpdateUserCommand {
    type Response = Reply<UserDto>;
    const NAME: &'static str = "UpdateUserCommand";
    const AUTH: AuthRequirement = AuthRequirement::Authenticated;

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = ValidationErrors::new();
        validate_name(&mut v, "firstName", "First name", &self.first_name);
        validate_name(&mut v, "lastName", "Last name", &self.last_name);
        if let Some(nick_name) = &self.nick_name {
            v.max_len("nickName", nick_name.trim(), 50, "Nickname must not exceed 50 characters.");
            v.ensure("nickName", !nick_name.contains('@'), "Nickname must not contain '@'.");
        }
        v.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteUserCommand {
    pub id: UserId,
}

impl Request for DeleteUserCommand {
    type Response = Reply<UserId>;
    const NAME: &'static str = "DeleteUserCommand";
    const AUTH: AuthRequirement = AuthRequirement::Roles(ADMIN);
}

pub struct UserCommandHandler<S> {
    write: WriteStore<S>,
    cache: Arc<dyn CacheService>,
}

impl<S: Store> UserCommandHandler<S> {
    pub fn new(write: WriteStore<S>, cache: Arc<dyn CacheService>) -> Self {
        Self { write, cache }
    }
}

#[async_trait]
impl<S: Store> RequestHandler<UpdateUserCommand> for UserCommandHandler<S> {
    async fn handle(&self, request: UpdateUserCommand, ctx: &RequestContext) -> AppResult<Reply<UserDto>> {
        let Some(mut user) = self.write.store().find_user_by_id(&request.id).await? else {
            return Ok(Reply::not_found(USER_NOT_FOUND));
        };

        // Entries under the old nickname must go too
        evict_user(self.cache.as_ref(), &user).await;

        user.first_name = request.first_name.trim().to_string();
        user.last_name = request.last_name.trim().to_string();
        if let Some(nick_name) = request.nick_name {
            user.nick_name = nick_name.trim().to_string();
        }

        let user = self.write.scope(ctx).update_user(user).await?;
        evict_user(self.cache.as_ref(), &user).await;

        tracing::info!(user_id = %user.id, "User updated");

        Ok(Reply::done("User updated successfully.", UserDto::from(&user)))
    }
}

#[async_trait]
impl<S: Store> RequestHandler<DeleteUserCommand> for UserCommandHandler<S> {
    async fn handle(&self, request: DeleteUserCommand, ctx: &RequestContext) -> AppResult<Reply<UserId>> {
        let Some(user) = self.write.store().find_user_by_id(&request.id).await? else {
            return Ok(Reply::not_found(USER_NOT_FOUND));
        };

        match self.write.scope(ctx).delete_user(user.id).await {
            Ok(true) => {}
            Ok(false) => return Ok(Reply::not_found(USER_NOT_FOUND)),
            Err(e) if e.is_still_referenced() => {
                return Ok(Reply::rejected(
                    Rejection::StillReferenced,
                    "User still owns content and cannot be deleted.",
                ));
            }
            Err(e) => return Err(e.into()),
        }

        evict_user(self.cache.as_ref(), &user).await;
        tracing::info!(user_id = %user.id, "User deleted");

        Ok(Reply::done("User deleted successfully.", user.id))
    }
}
