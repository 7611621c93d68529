//! In-memory Store
//!
//! Backs the write and read sides when no database URL is configured, and
//! every scenario test. A single `RwLock` over all tables gives each write
//! the same atomicity a transaction would: uniqueness and restrict checks
//! happen under the write lock.

use std::collections::HashMap;
use std::sync::Arc;

use kernel::id::{LessonId, LevelId, TopicId, UserActivityId, UserId};
use tokio::sync::RwLock;

use crate::domain::entity::{Lesson, Level, Topic, User, UserActivity};
use crate::domain::repository::{
    ActivityRepository, Change, LessonRepository, LevelRepository, ReplicaSink, TopicRepository,
    UserFilter, UserRepository,
};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    topics: HashMap<TopicId, Topic>,
    activities: HashMap<UserActivityId, UserActivity>,
    levels: HashMap<LevelId, Level>,
    lessons: HashMap<LessonId, Lesson>,
}

impl Tables {
    fn email_taken(&self, user: &User) -> bool {
        self.users
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
    }

    fn topic_name_taken(&self, topic: &Topic) -> bool {
        self.topics
            .values()
            .any(|t| t.id != topic.id && t.name == topic.name)
    }

    fn activity_taken(&self, activity: &UserActivity) -> bool {
        self.activities.values().any(|a| {
            a.id != activity.id
                && a.user_id == activity.user_id
                && a.language_studying == activity.language_studying
        })
    }

    fn user_is_referenced(&self, id: &UserId) -> bool {
        let owns = |created_by: &Option<UserId>| created_by.as_ref() == Some(id);
        self.activities.values().any(|a| a.user_id == *id)
            || self.topics.values().any(|t| owns(&t.audit.created_by))
            || self.levels.values().any(|l| owns(&l.audit.created_by))
            || self.lessons.values().any(|l| {
                owns(&l.audit.created_by) || l.words.iter().any(|w| owns(&w.audit.created_by))
            })
    }

    fn topic_is_referenced(&self, id: &TopicId) -> bool {
        self.lessons
            .values()
            .any(|l| l.topic_id == *id || l.words.iter().any(|w| w.topic_id == *id))
    }

    fn insert_user(&mut self, user: &User) -> StoreResult<()> {
        if self.email_taken(user) {
            return Err(StoreError::Duplicate("users_email_key".into()));
        }
        self.users.insert(user.id, user.clone());
        Ok(())
    }

    fn insert_topic(&mut self, topic: &Topic) -> StoreResult<()> {
        if self.topic_name_taken(topic) {
            return Err(StoreError::Duplicate("topics_name_key".into()));
        }
        self.topics.insert(topic.id, topic.clone());
        Ok(())
    }

    fn insert_activity(&mut self, activity: &UserActivity) -> StoreResult<()> {
        if self.activity_taken(activity) {
            return Err(StoreError::Duplicate(
                "user_activities_user_id_language_studying_key".into(),
            ));
        }
        self.activities.insert(activity.id, activity.clone());
        Ok(())
    }
}

/// Process-local store
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }
}

// ============================================================================
// User Repository Implementation
// ============================================================================

impl UserRepository for MemoryStore {
    async fn create_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.users.contains_key(&user.id) {
            return Err(StoreError::Duplicate("users_pkey".into()));
        }
        tables.insert_user(user)
    }

    async fn find_user_by_id(&self, id: &UserId) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email.as_str() == email).cloned())
    }

    async fn find_user_by_nickname(&self, nick_name: &str) -> StoreResult<Option<User>> {
        if nick_name.is_empty() {
            return Ok(None);
        }
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.nick_name == nick_name).cloned())
    }

    async fn list_users(&self, filter: &UserFilter) -> StoreResult<(Vec<User>, u64)> {
        let tables = self.tables.read().await;
        let mut matching: Vec<&User> = tables
            .users
            .values()
            .filter(|u| match filter.search.as_deref() {
                Some(term) if !term.trim().is_empty() => u.matches_search(term.trim()),
                _ => true,
            })
            .collect();
        matching.sort_by(|a, b| {
            a.audit
                .created_at
                .cmp(&b.audit.created_at)
                .then_with(|| a.email.as_str().cmp(b.email.as_str()))
        });

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(usize::try_from(filter.offset).unwrap_or(usize::MAX))
            .take(usize::try_from(filter.limit).unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user.id) {
            return Ok(());
        }
        tables.insert_user(user)
    }

    async fn delete_user(&self, id: &UserId) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(id) {
            return Ok(false);
        }
        if tables.user_is_referenced(id) {
            return Err(StoreError::StillReferenced("users".into()));
        }
        tables.users.remove(id);
        Ok(true)
    }
}

// ============================================================================
// Topic Repository Implementation
// ============================================================================

impl TopicRepository for MemoryStore {
    async fn create_topic(&self, topic: &Topic) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.topics.contains_key(&topic.id) {
            return Err(StoreError::Duplicate("topics_pkey".into()));
        }
        tables.insert_topic(topic)
    }

    async fn find_topic_by_id(&self, id: &TopicId) -> StoreResult<Option<Topic>> {
        Ok(self.tables.read().await.topics.get(id).cloned())
    }

    async fn find_topic_by_name(&self, name: &str) -> StoreResult<Option<Topic>> {
        let tables = self.tables.read().await;
        Ok(tables.topics.values().find(|t| t.name == name).cloned())
    }

    async fn list_topics(&self) -> StoreResult<Vec<Topic>> {
        let tables = self.tables.read().await;
        let mut topics: Vec<Topic> = tables.topics.values().cloned().collect();
        topics.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(topics)
    }

    async fn update_topic(&self, topic: &Topic) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.topics.contains_key(&topic.id) {
            return Ok(());
        }
        tables.insert_topic(topic)
    }

    async fn delete_topic(&self, id: &TopicId) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if !tables.topics.contains_key(id) {
            return Ok(false);
        }
        if tables.topic_is_referenced(id) {
            return Err(StoreError::StillReferenced("topics".into()));
        }
        tables.topics.remove(id);
        Ok(true)
    }
}

// ============================================================================
// Activity / Level / Lesson Repository Implementations
// ============================================================================

impl ActivityRepository for MemoryStore {
    async fn create_activity(&self, activity: &UserActivity) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&activity.user_id) {
            return Err(StoreError::StillReferenced("user_activities_user_id_fkey".into()));
        }
        tables.insert_activity(activity)
    }

    async fn find_activity(&self, user_id: &UserId, language: &str) -> StoreResult<Option<UserActivity>> {
        let tables = self.tables.read().await;
        Ok(tables
            .activities
            .values()
            .find(|a| a.user_id == *user_id && a.language_studying == language)
            .cloned())
    }

    async fn find_activities_by_user(&self, user_id: &UserId) -> StoreResult<Vec<UserActivity>> {
        let tables = self.tables.read().await;
        let mut activities: Vec<UserActivity> = tables
            .activities
            .values()
            .filter(|a| a.user_id == *user_id)
            .cloned()
            .collect();
        activities.sort_by(|a, b| a.language_studying.cmp(&b.language_studying));
        Ok(activities)
    }
}

impl LevelRepository for MemoryStore {
    async fn create_level(&self, level: &Level) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.levels.contains_key(&level.id) {
            return Err(StoreError::Duplicate("levels_pkey".into()));
        }
        tables.levels.insert(level.id, level.clone());
        Ok(())
    }

    async fn find_level_by_id(&self, id: &LevelId) -> StoreResult<Option<Level>> {
        Ok(self.tables.read().await.levels.get(id).cloned())
    }
}

impl LessonRepository for MemoryStore {
    async fn create_lesson(&self, lesson: &Lesson) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.topics.contains_key(&lesson.topic_id) {
            return Err(StoreError::StillReferenced("lessons_topic_id_fkey".into()));
        }
        if !tables.levels.contains_key(&lesson.level_id) {
            return Err(StoreError::StillReferenced("lessons_level_id_fkey".into()));
        }
        if tables.lessons.contains_key(&lesson.id) {
            return Err(StoreError::Duplicate("lessons_pkey".into()));
        }
        tables.lessons.insert(lesson.id, lesson.clone());
        Ok(())
    }

    async fn find_lessons_by_topic(&self, topic_id: &TopicId) -> StoreResult<Vec<Lesson>> {
        let tables = self.tables.read().await;
        let mut lessons: Vec<Lesson> = tables
            .lessons
            .values()
            .filter(|l| l.topic_id == *topic_id)
            .cloned()
            .collect();
        lessons.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(lessons)
    }
}

// ============================================================================
// Replica Sink Implementation
// ============================================================================

impl ReplicaSink for MemoryStore {
    async fn apply(&self, change: &Change) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        match change {
            Change::UserUpserted(user) => tables.insert_user(user),
            Change::UserDeleted(id) => {
                tables.users.remove(id);
                Ok(())
            }
            Change::TopicUpserted(topic) => tables.insert_topic(topic),
            Change::TopicDeleted(id) => {
                tables.topics.remove(id);
                Ok(())
            }
            Change::ActivityUpserted(activity) => tables.insert_activity(activity),
            Change::LevelUpserted(level) => {
                tables.levels.insert(level.id, level.clone());
                Ok(())
            }
            Change::LessonUpserted(lesson) => {
                tables.lessons.insert(lesson.id, lesson.clone());
                Ok(())
            }
        }
    }
}
