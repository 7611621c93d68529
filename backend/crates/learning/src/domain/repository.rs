//! Repository Traits
//!
//! Interfaces for data persistence. Implementations live in the
//! infrastructure layer; the same traits back both the write store (system
//! of record) and the read store (query side).

use async_trait::async_trait;
use kernel::id::{LevelId, TopicId, UserId};

use crate::domain::entity::{Lesson, Level, Topic, User, UserActivity};
use crate::error::StoreResult;

/// Filter and window for user listings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    /// Case-insensitive substring over names, nickname and email
    pub search: Option<String>,
    pub offset: u64,
    pub limit: u64,
}

/// User repository trait
#[trait_variant::make(UserRepository: Send)]
pub trait LocalUserRepository {
    async fn create_user(&self, user: &User) -> StoreResult<()>;

    async fn find_user_by_id(&self, id: &UserId) -> StoreResult<Option<User>>;

    /// `email` is expected normalized (trimmed, lowercase)
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn find_user_by_nickname(&self, nick_name: &str) -> StoreResult<Option<User>>;

    /// Sorted by `created_at` then email; returns the page and the size of
    /// the whole filtered set
    async fn list_users(&self, filter: &UserFilter) -> StoreResult<(Vec<User>, u64)>;

    async fn update_user(&self, user: &User) -> StoreResult<()>;

    /// `Ok(false)` when absent; `StillReferenced` when the user owns content
    async fn delete_user(&self, id: &UserId) -> StoreResult<bool>;
}

/// Topic repository trait
#[trait_variant::make(TopicRepository: Send)]
pub trait LocalTopicRepository {
    async fn create_topic(&self, topic: &Topic) -> StoreResult<()>;

    async fn find_topic_by_id(&self, id: &TopicId) -> StoreResult<Option<Topic>>;

    /// Exact match
    async fn find_topic_by_name(&self, name: &str) -> StoreResult<Option<Topic>>;

    /// Sorted by name
    async fn list_topics(&self) -> StoreResult<Vec<Topic>>;

    async fn update_topic(&self, topic: &Topic) -> StoreResult<()>;

    /// `Ok(false)` when absent; `StillReferenced` when lessons or words use it
    async fn delete_topic(&self, id: &TopicId) -> StoreResult<bool>;
}

/// User activity repository trait
#[trait_variant::make(ActivityRepository: Send)]
pub trait LocalActivityRepository {
    /// `Duplicate` when (user, language) already exists
    async fn create_activity(&self, activity: &UserActivity) -> StoreResult<()>;

    async fn find_activity(&self, user_id: &UserId, language: &str) -> StoreResult<Option<UserActivity>>;

    /// Sorted by language
    async fn find_activities_by_user(&self, user_id: &UserId) -> StoreResult<Vec<UserActivity>>;
}

/// Level repository trait
#[trait_variant::make(LevelRepository: Send)]
pub trait LocalLevelRepository {
    async fn create_level(&self, level: &Level) -> StoreResult<()>;

    async fn find_level_by_id(&self, id: &LevelId) -> StoreResult<Option<Level>>;
}

/// Lesson repository trait
#[trait_variant::make(LessonRepository: Send)]
pub trait LocalLessonRepository {
    /// Persists the lesson together with its words
    async fn create_lesson(&self, lesson: &Lesson) -> StoreResult<()>;

    /// Sorted by title, words in lesson order
    async fn find_lessons_by_topic(&self, topic_id: &TopicId) -> StoreResult<Vec<Lesson>>;
}

// ============================================================================
// Replication
// ============================================================================

/// A committed write, as shipped to the read side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    UserUpserted(User),
    UserDeleted(UserId),
    TopicUpserted(Topic),
    TopicDeleted(TopicId),
    ActivityUpserted(UserActivity),
    LevelUpserted(Level),
    /// Carries the lesson's words
    LessonUpserted(Lesson),
}

impl Change {
    pub fn name(&self) -> &'static str {
        match self {
            Change::UserUpserted(_) => "user_upserted",
            Change::UserDeleted(_) => "user_deleted",
            Change::TopicUpserted(_) => "topic_upserted",
            Change::TopicDeleted(_) => "topic_deleted",
            Change::ActivityUpserted(_) => "activity_upserted",
            Change::LevelUpserted(_) => "level_upserted",
            Change::LessonUpserted(_) => "lesson_upserted",
        }
    }

    pub fn entity_id(&self) -> String {
        match self {
            Change::UserUpserted(u) => u.id.to_string(),
            Change::UserDeleted(id) => id.to_string(),
            Change::TopicUpserted(t) => t.id.to_string(),
            Change::TopicDeleted(id) => id.to_string(),
            Change::ActivityUpserted(a) => a.id.to_string(),
            Change::LevelUpserted(l) => l.id.to_string(),
            Change::LessonUpserted(l) => l.id.to_string(),
        }
    }
}

/// Read-side sink: idempotent upsert/delete in one transaction
#[trait_variant::make(ReplicaSink: Send)]
pub trait LocalReplicaSink {
    async fn apply(&self, change: &Change) -> StoreResult<()>;
}

/// Invoked after every write-store commit
#[async_trait]
pub trait ReplicationHook: Send + Sync + 'static {
    async fn replicate(&self, change: &Change) -> StoreResult<()>;
}

/// Everything a store backend provides
pub trait Store:
    UserRepository
    + TopicRepository
    + ActivityRepository
    + LevelRepository
    + LessonRepository
    + ReplicaSink
    + Send
    + Sync
    + 'static
{
}

impl<T> Store for T where
    T: UserRepository
        + TopicRepository
        + ActivityRepository
        + LevelRepository
        + LessonRepository
        + ReplicaSink
        + Send
        + Sync
        + 'static
{
}
