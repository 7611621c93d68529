//! Topic Use Cases

use std::sync::Arc;

use async_trait::async_trait;
use kernel::error::app_error::AppResult;
use kernel::id::TopicId;
use kernel::response::{Rejection, Reply};
use platform::cache::CacheService;
use platform::pipeline::{AuthRequirement, CachePolicy, Request, RequestContext, RequestHandler, ValidationErrors};
use serde::{Deserialize, Serialize};

use crate::application::ADMIN;
use crate::application::dto::TopicDto;
use crate::domain::entity::Topic;
use crate::domain::repository::Store;
use crate::infra::replication::WriteStore;

/// Cached topic query keys, evicted on every topic mutation
pub const TOPIC_QUERIES: &str = "^Get(AllTopics|TopicBy(Id|Name))Query";

pub const TOPIC_EXISTS: &str = "Topic already exists.";
pub const TOPIC_NOT_FOUND: &str = "Topic not found.";

fn validate_topic(v: &mut ValidationErrors, name: &str, description: &str) {
    if v.required("name", name, "Name is required.") {
        v.max_len("name", name.trim(), 100, "Name must not exceed 100 characters.");
    }
    if v.required("description", description, "Description is required.") {
        v.max_len(
            "description",
            description.trim(),
            500,
            "Description must not exceed 500 characters.",
        );
    }
}

async fn evict_topic_queries(cache: &dyn CacheService) {
    let evicted = cache.remove_by_pattern(TOPIC_QUERIES).await;
    tracing::debug!(evicted, "Topic queries evicted");
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTopicCommand {
    pub name: String,
    pub description: String,
}

impl Request for CreateTopicCommand {
    type Response = Reply<TopicDto>;
    const NAME: &'static str = "CreateTopicCommand";
    const AUTH: AuthRequirement = AuthRequirement::Roles(ADMIN);

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = ValidationErrors::new();
        validate_topic(&mut v, &self.name, &self.description);
        v.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTopicCommand {
    pub id: TopicId,
    pub name: String,
    pub description: String,
}

impl Request for UpdateTopicCommand {
    type Response = Reply<TopicDto>;
    const NAME: &'static str = "UpdateTopicCommand";
    const AUTH: AuthRequirement = AuthRequirement::Roles(ADMIN);

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = ValidationErrors::new();
        validate_topic(&mut v, &self.name, &self.description);
        v.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTopicCommand {
    pub id: TopicId,
}

impl Request for DeleteTopicCommand {
    type Response = Reply<TopicId>;
    const NAME: &'static str = "DeleteTopicCommand";
    const AUTH: AuthRequirement = AuthRequirement::Roles(ADMIN);
}

/// Create, update and delete share one handler
pub struct TopicCommandHandler<S> {
    write: WriteStore<S>,
    cache: Arc<dyn CacheService>,
}

impl<S: Store> TopicCommandHandler<S> {
    pub fn new(write: WriteStore<S>, cache: Arc<dyn CacheService>) -> Self {
        Self { write, cache }
    }
}

#[async_trait]
impl<S: Store> RequestHandler<CreateTopicCommand> for TopicCommandHandler<S> {
    async fn handle(&self, request: CreateTopicCommand, ctx: &RequestContext) -> AppResult<Reply<TopicDto>> {
        let name = request.name.trim().to_string();

        if self.write.store().find_topic_by_name(&name).await?.is_some() {
            return Ok(Reply::already_exists(TOPIC_EXISTS));
        }

        let topic = Topic::new(name, request.description.trim().to_string());
        let topic = match self.write.scope(ctx).insert_topic(topic).await {
            Ok(topic) => topic,
            Err(e) if e.is_duplicate() => return Ok(Reply::already_exists(TOPIC_EXISTS)),
            Err(e) => return Err(e.into()),
        };

        evict_topic_queries(self.cache.as_ref()).await;
        tracing::info!(topic_id = %topic.id, name = %topic.name, "Topic created");

        Ok(Reply::done("Topic created successfully.", TopicDto::from(&topic)))
    }
}

#[async_trait]
impl<S: Store> RequestHandler<UpdateTopicCommand> for TopicCommandHandler<S> {
    async fn handle(&self, request: UpdateTopicCommand, ctx: &RequestContext) -> AppResult<Reply<TopicDto>> {
        let Some(mut topic) = self.write.store().find_topic_by_id(&request.id).await? else {
            return Ok(Reply::not_found(TOPIC_NOT_FOUND));
        };

        topic.name = request.name.trim().to_string();
        topic.description = request.description.trim().to_string();

        let topic = match self.write.scope(ctx).update_topic(topic).await {
            Ok(topic) => topic,
            Err(e) if e.is_duplicate() => return Ok(Reply::already_exists(TOPIC_EXISTS)),
            Err(e) => return Err(e.into()),
        };

        evict_topic_queries(self.cache.as_ref()).await;
        tracing::info!(topic_id = %topic.id, "Topic updated");

        Ok(Reply::done("Topic updated successfully.", TopicDto::from(&topic)))
    }
}

#[async_trait]
impl<S: Store> RequestHandler<DeleteTopicCommand> for TopicCommandHandler<S> {
    async fn handle(&self, request: DeleteTopicCommand, ctx: &RequestContext) -> AppResult<Reply<TopicId>> {
        match self.write.scope(ctx).delete_topic(request.id).await {
            Ok(true) => {}
            Ok(false) => return Ok(Reply::not_found(TOPIC_NOT_FOUND)),
            Err(e) if e.is_still_referenced() => {
                return Ok(Reply::rejected(
                    Rejection::StillReferenced,
                    "Topic is still used by lessons or words.",
                ));
            }
            Err(e) => return Err(e.into()),
        }

        evict_topic_queries(self.cache.as_ref()).await;
        tracing::info!(topic_id = %request.id, "Topic deleted");

        Ok(Reply::done("Topic deleted successfully.", request.id))
    }
}

// ============================================================================
// Queries
// ============================================================================

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GetAllTopicsQuery;

impl Request for GetAllTopicsQuery {
    type Response = Reply<Vec<TopicDto>>;
    const NAME: &'static str = "GetAllTopicsQuery";
    const AUTH: AuthRequirement = AuthRequirement::Authenticated;

    fn cache_policy(&self) -> Option<CachePolicy> {
        Some(CachePolicy::derived())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTopicByIdQuery {
    pub id: TopicId,
}

impl Request for GetTopicByIdQuery {
    type Response = Reply<TopicDto>;
    const NAME: &'static str = "GetTopicByIdQuery";
    const AUTH: AuthRequirement = AuthRequirement::Authenticated;

    fn cache_policy(&self) -> Option<CachePolicy> {
        Some(CachePolicy::derived())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTopicByNameQuery {
    pub name: String,
}

impl Request for GetTopicByNameQuery {
    type Response = Reply<TopicDto>;
    const NAME: &'static str = "GetTopicByNameQuery";
    const AUTH: AuthRequirement = AuthRequirement::Authenticated;

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = ValidationErrors::new();
        v.required("name", &self.name, "Name is required.");
        v.into_result()
    }

    fn cache_policy(&self) -> Option<CachePolicy> {
        Some(CachePolicy::derived())
    }
}

pub struct TopicQueryHandler<S> {
    read: Arc<S>,
}

impl<S: Store> TopicQueryHandler<S> {
    pub fn new(read: Arc<S>) -> Self {
        Self { read }
    }
}

#[async_trait]
impl<S: Store> RequestHandler<GetAllTopicsQuery> for TopicQueryHandler<S> {
    async fn handle(&self, _request: GetAllTopicsQuery, _ctx: &RequestContext) -> AppResult<Reply<Vec<TopicDto>>> {
        let topics = self.read.list_topics().await?;
        Ok(Reply::done(
            "Fetched all topics.",
            topics.iter().map(TopicDto::from).collect(),
        ))
    }
}

#[async_trait]
impl<S: Store> RequestHandler<GetTopicByIdQuery> for TopicQueryHandler<S> {
    async fn handle(&self, request: GetTopicByIdQuery, _ctx: &RequestContext) -> AppResult<Reply<TopicDto>> {
        Ok(match self.read.find_topic_by_id(&request.id).await? {
            Some(topic) => Reply::done("Fetched topic.", TopicDto::from(&topic)),
            None => Reply::not_found(TOPIC_NOT_FOUND),
        })
    }
}

#[async_trait]
impl<S: Store> RequestHandler<GetTopicByNameQuery> for TopicQueryHandler<S> {
    async fn handle(&self, request: GetTopicByNameQuery, _ctx: &RequestContext) -> AppResult<Reply<TopicDto>> {
        Ok(match self.read.find_topic_by_name(request.name.trim()).await? {
            Some(topic) => Reply::done("Fetched topic.", TopicDto::from(&topic)),
            None => Reply::not_found(TOPIC_NOT_FOUND),
        })
    }
}
