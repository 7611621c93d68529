//! User Activity Use Cases

use std::sync::Arc;

use async_trait::async_trait;
use kernel::error::app_error::AppResult;
use kernel::response::Reply;
use platform::pipeline::{AuthRequirement, Request, RequestContext, RequestHandler, ValidationErrors};
use serde::{Deserialize, Serialize};

use crate::application::current_user_id;
use crate::application::dto::UserActivityDto;
use crate::domain::entity::UserActivity;
use crate::domain::repository::Store;
use crate::infra::replication::WriteStore;

pub const ACTIVITY_EXISTS: &str = "User activity already exists for this language.";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserActivityCommand {
    pub language_studying: String,
    /// Minutes per day
    pub study_time_everyday: i32,
}

impl Request for CreateUserActivityCommand {
    type Response = Reply<UserActivityDto>;
    const NAME: &'static str = "CreateUserActivityCommand";
    const AUTH: AuthRequirement = AuthRequirement::Authenticated;

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = ValidationErrors::new();
        if v.required("languageStudying", &self.language_studying, "Language is required.") {
            v.max_len(
                "languageStudying",
                self.language_studying.trim(),
                50,
                "Language must not exceed 50 characters.",
            );
        }
        v.ensure(
            "studyTimeEveryday",
            self.study_time_everyday >= 0,
            "Study time must not be negative.",
        );
        v.into_result()
    }
}

pub struct CreateUserActivityHandler<S> {
    write: WriteStore<S>,
}

impl<S: Store> CreateUserActivityHandler<S> {
    pub fn new(write: WriteStore<S>) -> Self {
        Self { write }
    }
}

#[async_trait]
impl<S: Store> RequestHandler<CreateUserActivityCommand> for CreateUserActivityHandler<S> {
    async fn handle(
        &self,
        request: CreateUserActivityCommand,
        ctx: &RequestContext,
    ) -> AppResult<Reply<UserActivityDto>> {
        let user_id = current_user_id(ctx)?;
        let language = request.language_studying.trim().to_string();

        if self.write.store().find_activity(&user_id, &language).await?.is_some() {
            return Ok(Reply::already_exists(ACTIVITY_EXISTS));
        }

        let activity = UserActivity::start(user_id, language, request.study_time_everyday);
        let activity = match self.write.scope(ctx).insert_activity(activity).await {
            Ok(activity) => activity,
            Err(e) if e.is_duplicate() => {
                tracing::debug!(user_id = %user_id, "Concurrent activity create lost");
                return Ok(Reply::already_exists(ACTIVITY_EXISTS));
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            user_id = %user_id,
            language = %activity.language_studying,
            "User activity created"
        );

        Ok(Reply::done(
            "User activity created successfully.",
            UserActivityDto::from(&activity),
        ))
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GetUserActivityQuery;

impl Request for GetUserActivityQuery {
    type Response = Reply<Vec<UserActivityDto>>;
    const NAME: &'static str = "GetUserActivityQuery";
    const AUTH: AuthRequirement = AuthRequirement::Authenticated;
}

pub struct GetUserActivityHandler<S> {
    read: Arc<S>,
}

impl<S: Store> GetUserActivityHandler<S> {
    pub fn new(read: Arc<S>) -> Self {
        Self { read }
    }
}

#[async_trait]
impl<S: Store> RequestHandler<GetUserActivityQuery> for GetUserActivityHandler<S> {
    async fn handle(
        &self,
        _request: GetUserActivityQuery,
        ctx: &RequestContext,
    ) -> AppResult<Reply<Vec<UserActivityDto>>> {
        let user_id = current_user_id(ctx)?;
        let activities = self.read.find_activities_by_user(&user_id).await?;

        Ok(Reply::done(
            "Fetched user activities.",
            activities.iter().map(UserActivityDto::from).collect(),
        ))
    }
}
