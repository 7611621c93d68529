//! Level and Lesson Use Cases

use std::sync::Arc;

use async_trait::async_trait;
use kernel::error::app_error::AppResult;
use kernel::id::{LevelId, TopicId};
use kernel::response::Reply;
use platform::cache::CacheService;
use platform::pipeline::{AuthRequirement, CachePolicy, Request, RequestContext, RequestHandler, ValidationErrors};
use serde::{Deserialize, Serialize};

use crate::application::ADMIN;
use crate::application::dto::{LessonDto, LevelDto};
use crate::application::topic::TOPIC_NOT_FOUND;
use crate::domain::entity::{Lesson, Level};
use crate::domain::repository::Store;
use crate::infra::replication::WriteStore;

/// Cached lesson listings, evicted when a lesson is added
pub const LESSON_QUERIES: &str = "^GetLessonsByTopicQuery";

// ============================================================================
// Levels
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLevelCommand {
    pub name: String,
    pub required_exp: i32,
}

impl Request for CreateLevelCommand {
    type Response = Reply<LevelDto>;
    const NAME: &'static str = "CreateLevelCommand";
    const AUTH: AuthRequirement = AuthRequirement::Roles(ADMIN);

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = ValidationErrors::new();
        if v.required("name", &self.name, "Name is required.") {
            v.max_len("name", self.name.trim(), 50, "Name must not exceed 50 characters.");
        }
        v.ensure("requiredExp", self.required_exp >= 0, "Required exp must not be negative.");
        v.into_result()
    }
}

pub struct CreateLevelHandler<S> {
    write: WriteStore<S>,
}

impl<S: Store> CreateLevelHandler<S> {
    pub fn new(write: WriteStore<S>) -> Self {
        Self { write }
    }
}

#[async_trait]
impl<S: Store> RequestHandler<CreateLevelCommand> for CreateLevelHandler<S> {
    async fn handle(&self, request: CreateLevelCommand, ctx: &RequestContext) -> AppResult<Reply<LevelDto>> {
        let level = Level::new(request.name.trim().to_string(), request.required_exp);
        let level = self.write.scope(ctx).insert_level(level).await?;

        tracing::info!(level_id = %level.id, name = %level.name, "Level created");

        Ok(Reply::done("Level created successfully.", LevelDto::from(&level)))
    }
}

// ============================================================================
// Lessons
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLessonCommand {
    pub title: String,
    pub description: String,
    pub exp_reward: i32,
    pub topic_id: TopicId,
    pub level_id: LevelId,
    pub language: String,
    #[serde(default)]
    pub words: Vec<String>,
}

impl Request for CreateLessonCommand {
    type Response = Reply<LessonDto>;
    const NAME: &'static str = "CreateLessonCommand";
    const AUTH: AuthRequirement = AuthRequirement::Roles(ADMIN);

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = ValidationErrors::new();
        if v.required("title", &self.title, "Title is required.") {
            v.max_len("title", self.title.trim(), 200, "Title must not exceed 200 characters.");
        }
        v.max_len(
            "description",
            self.description.trim(),
            1000,
            "Description must not exceed 1000 characters.",
        );
        v.ensure("expReward", self.exp_reward >= 0, "Exp reward must not be negative.");
        if v.required("language", &self.language, "Language is required.") {
            v.max_len("language", self.language.trim(), 50, "Language must not exceed 50 characters.");
        }
        v.into_result()
    }
}

pub struct CreateLessonHandler<S> {
    write: WriteStore<S>,
    cache: Arc<dyn CacheService>,
}

impl<S: Store> CreateLessonHandler<S> {
    pub fn new(write: WriteStore<S>, cache: Arc<dyn CacheService>) -> Self {
        Self { write, cache }
    }
}

#[async_trait]
impl<S: Store> RequestHandler<CreateLessonCommand> for CreateLessonHandler<S> {
    async fn handle(&self, request: CreateLessonCommand, ctx: &RequestContext) -> AppResult<Reply<LessonDto>> {
        let store = self.write.store();
        if store.find_topic_by_id(&request.topic_id).await?.is_none() {
            return Ok(Reply::not_found(TOPIC_NOT_FOUND));
        }
        if store.find_level_by_id(&request.level_id).await?.is_none() {
            return Ok(Reply::not_found("Level not found."));
        }

        let lesson = Lesson::new(
            request.title.trim().to_string(),
            request.description.trim().to_string(),
            request.exp_reward,
            request.topic_id,
            request.level_id,
            request.language.trim(),
            &request.words,
        );
        let lesson = self.write.scope(ctx).insert_lesson(lesson).await?;

        self.cache.remove_by_pattern(LESSON_QUERIES).await;
        tracing::info!(
            lesson_id = %lesson.id,
            topic_id = %lesson.topic_id,
            words = lesson.words.len(),
            "Lesson created"
        );

        Ok(Reply::done("Lesson created successfully.", LessonDto::from(&lesson)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetLessonsByTopicQuery {
    pub topic_id: TopicId,
}

impl Request for GetLessonsByTopicQuery {
    type Response = Reply<Vec<LessonDto>>;
    const NAME: &'static str = "GetLessonsByTopicQuery";
    const AUTH: AuthRequirement = AuthRequirement::Authenticated;

    fn cache_policy(&self) -> Option<CachePolicy> {
        Some(CachePolicy::keyed(self.topic_id.to_string()))
    }
}

pub struct GetLessonsByTopicHandler<S> {
    read: Arc<S>,
}

impl<S: Store> GetLessonsByTopicHandler<S> {
    pub fn new(read: Arc<S>) -> Self {
        Self { read }
    }
}

#[async_trait]
impl<S: Store> RequestHandler<GetLessonsByTopicQuery> for GetLessonsByTopicHandler<S> {
    async fn handle(
        &self,
        request: GetLessonsByTopicQuery,
        _ctx: &RequestContext,
    ) -> AppResult<Reply<Vec<LessonDto>>> {
        let lessons = self.read.find_lessons_by_topic(&request.topic_id).await?;

        Ok(Reply::done(
            "Fetched lessons.",
            lessons.iter().map(LessonDto::from).collect(),
        ))
    }
}
