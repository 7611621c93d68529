//! HTTP Handlers
//!
//! Thin adapters: extract, build the request, hand it to the mediator.
//! Business rejections come back as `200 {success: false, ...}`; faults
//! become `AppError` responses.

use axum::Json;
use axum::extract::{Path, Query, State};
use kernel::error::app_error::AppResult;
use kernel::id::{Id, TopicId, UserId};
use kernel::response::{Page, Reply};
use platform::pipeline::{Mediator, Request};
use platform::token::TokenPair;

use crate::application::auth::{ConfirmEmailCommand, GetMyInfoQuery, LoginCommand, RegisterCommand};
use crate::application::catalog::{CreateLessonCommand, CreateLevelCommand, GetLessonsByTopicQuery};
use crate::application::dto::{LessonDto, LevelDto, MyInfoDto, TopicDto, UserActivityDto, UserDto};
use crate::application::topic::{
    CreateTopicCommand, DeleteTopicCommand, GetAllTopicsQuery, GetTopicByIdQuery, GetTopicByNameQuery,
    UpdateTopicCommand,
};
use crate::application::user::{DeleteUserCommand, GetAllUsersQuery, GetUserByIdQuery, UpdateUserCommand};
use crate::application::user_activity::{CreateUserActivityCommand, GetUserActivityQuery};
use crate::presentation::dto::ConfirmEmailParams;
use crate::presentation::middleware::Caller;

/// Shared state for learning handlers
#[derive(Clone)]
pub struct AppState {
    pub mediator: Mediator,
}

async fn dispatch<R: Request>(state: &AppState, caller: &Caller, request: R) -> AppResult<Json<R::Response>> {
    Ok(Json(state.mediator.send(request, &caller.0).await?))
}

fn parse_id<T>(raw: &str) -> AppResult<Id<T>> {
    Ok(Id::parse(raw)?)
}

// ============================================================================
// Auth
// ============================================================================

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<RegisterCommand>,
) -> AppResult<Json<Reply<UserDto>>> {
    dispatch(&state, &caller, req).await
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<LoginCommand>,
) -> AppResult<Json<Reply<TokenPair>>> {
    dispatch(&state, &caller, req).await
}

/// GET /api/auth/me
pub async fn me(State(state): State<AppState>, caller: Caller) -> AppResult<Json<Reply<MyInfoDto>>> {
    dispatch(&state, &caller, GetMyInfoQuery).await
}

/// POST /api/auth/confirm-email
pub async fn confirm_email(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<ConfirmEmailCommand>,
) -> AppResult<Json<Reply<String>>> {
    dispatch(&state, &caller, req).await
}

/// GET /api/auth/confirm-email?token=..&email=.. (the emailed link)
pub async fn confirm_email_link(
    State(state): State<AppState>,
    caller: Caller,
    Query(params): Query<ConfirmEmailParams>,
) -> AppResult<Json<Reply<String>>> {
    tracing::debug!(email = ?params.email, "Confirmation link followed");
    dispatch(&state, &caller, ConfirmEmailCommand { token: params.token }).await
}

// ============================================================================
// Topics
// ============================================================================

/// GET /api/topic/get-all
pub async fn get_all_topics(
    State(state): State<AppState>,
    caller: Caller,
) -> AppResult<Json<Reply<Vec<TopicDto>>>> {
    dispatch(&state, &caller, GetAllTopicsQuery).await
}

/// GET /api/topic/get-by-id/{id}
pub async fn get_topic_by_id(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<Json<Reply<TopicDto>>> {
    let id: TopicId = parse_id(&id)?;
    dispatch(&state, &caller, GetTopicByIdQuery { id }).await
}

/// GET /api/topic/get-by-name/{name}
pub async fn get_topic_by_name(
    State(state): State<AppState>,
    caller: Caller,
    Path(name): Path<String>,
) -> AppResult<Json<Reply<TopicDto>>> {
    dispatch(&state, &caller, GetTopicByNameQuery { name }).await
}

/// POST /api/topic/create
pub async fn create_topic(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<CreateTopicCommand>,
) -> AppResult<Json<Reply<TopicDto>>> {
    dispatch(&state, &caller, req).await
}

/// PUT /api/topic/update
pub async fn update_topic(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<UpdateTopicCommand>,
) -> AppResult<Json<Reply<TopicDto>>> {
    dispatch(&state, &caller, req).await
}

/// DELETE /api/topic/delete/{id}
pub async fn delete_topic(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<Json<Reply<TopicId>>> {
    let id: TopicId = parse_id(&id)?;
    dispatch(&state, &caller, DeleteTopicCommand { id }).await
}

// ============================================================================
// Users
// ============================================================================

/// GET /api/user/get-all?pageNumber&pageSize&searchTerm
pub async fn get_all_users(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<GetAllUsersQuery>,
) -> AppResult<Json<Page<UserDto>>> {
    dispatch(&state, &caller, query).await
}

/// GET /api/user/get-by-id/{id}
pub async fn get_user_by_id(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<Json<Reply<UserDto>>> {
    let id: UserId = parse_id(&id)?;
    dispatch(&state, &caller, GetUserByIdQuery { id }).await
}

/// PUT /api/user/update
pub async fn update_user(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<UpdateUserCommand>,
) -> AppResult<Json<Reply<UserDto>>> {
    dispatch(&state, &caller, req).await
}

/// DELETE /api/user/delete/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<Json<Reply<UserId>>> {
    let id: UserId = parse_id(&id)?;
    dispatch(&state, &caller, DeleteUserCommand { id }).await
}

// ============================================================================
// User Activities
// ============================================================================

/// GET /api/useractivity/get-by-user
pub async fn get_user_activities(
    State(state): State<AppState>,
    caller: Caller,
) -> AppResult<Json<Reply<Vec<UserActivityDto>>>> {
    dispatch(&state, &caller, GetUserActivityQuery).await
}

/// POST /api/useractivity/create
pub async fn create_user_activity(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<CreateUserActivityCommand>,
) -> AppResult<Json<Reply<UserActivityDto>>> {
    dispatch(&state, &caller, req).await
}

// ============================================================================
// Catalog
// ============================================================================

/// POST /api/level/create
pub async fn create_level(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<CreateLevelCommand>,
) -> AppResult<Json<Reply<LevelDto>>> {
    dispatch(&state, &caller, req).await
}

/// POST /api/lesson/create
pub async fn create_lesson(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<CreateLessonCommand>,
) -> AppResult<Json<Reply<LessonDto>>> {
    dispatch(&state, &caller, req).await
}

/// GET /api/lesson/get-by-topic/{topicId}
pub async fn get_lessons_by_topic(
    State(state): State<AppState>,
    caller: Caller,
    Path(topic_id): Path<String>,
) -> AppResult<Json<Reply<Vec<LessonDto>>>> {
    let topic_id: TopicId = parse_id(&topic_id)?;
    dispatch(&state, &caller, GetLessonsByTopicQuery { topic_id }).await
}
