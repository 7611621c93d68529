//! Write store, audit stamping and read-side replication
//!
//! Every mutation goes through a [`WriteScope`]: stamp audit fields from the
//! request's principal, commit to the system-of-record store, then hand the
//! committed change to the [`ReplicationHook`]. A hook failure after commit
//! is logged and swallowed; the read side catches up on the next write or
//! event replay.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use kernel::id::{TopicId, UserId};
use platform::pipeline::RequestContext;

use crate::domain::entity::{Lesson, Level, Topic, User, UserActivity};
use crate::domain::repository::{Change, ReplicaSink, ReplicationHook, Store};
use crate::error::StoreResult;

/// Applies every committed change to a separate read store
pub struct ReadStoreMirror<S> {
    read: Arc<S>,
}

impl<S> ReadStoreMirror<S> {
    pub fn new(read: Arc<S>) -> Self {
        Self { read }
    }
}

#[async_trait]
impl<S> ReplicationHook for ReadStoreMirror<S>
where
    S: ReplicaSink + Send + Sync + 'static,
{
    async fn replicate(&self, change: &Change) -> StoreResult<()> {
        self.read.apply(change).await
    }
}

/// For deployments where both sides share one database
pub struct NoReplication;

#[async_trait]
impl ReplicationHook for NoReplication {
    async fn replicate(&self, _change: &Change) -> StoreResult<()> {
        Ok(())
    }
}

/// System-of-record store plus its replication hook
pub struct WriteStore<S> {
    store: Arc<S>,
    hook: Arc<dyn ReplicationHook>,
}

impl<S> Clone for WriteStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            hook: self.hook.clone(),
        }
    }
}

impl<S: Store> WriteStore<S> {
    pub fn new(store: Arc<S>, hook: Arc<dyn ReplicationHook>) -> Self {
        Self { store, hook }
    }

    /// Direct reads against the write side (command paths)
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Unit of work attributed to the caller in `ctx`
    pub fn scope(&self, ctx: &RequestContext) -> WriteScope<'_, S> {
        let actor = ctx.current_user_id().and_then(|id| UserId::parse(id).ok());
        WriteScope { write: self, actor }
    }
}

/// Audit-stamping unit of work
pub struct WriteScope<'a, S> {
    write: &'a WriteStore<S>,
    actor: Option<UserId>,
}

impl<S: Store> WriteScope<'_, S> {
    pub fn actor(&self) -> Option<UserId> {
        self.actor
    }

    async fn replicate(&self, change: Change) {
        if let Err(e) = self.write.hook.replicate(&change).await {
            tracing::warn!(
                change = change.name(),
                id = %change.entity_id(),
                error = %e,
                "Replication to read store failed; write kept"
            );
        }
    }

    pub async fn insert_user(&self, mut user: User) -> StoreResult<User> {
        user.audit.stamp_created(self.actor, Utc::now());
        self.write.store.create_user(&user).await?;
        self.replicate(Change::UserUpserted(user.clone())).await;
        Ok(user)
    }

    pub async fn update_user(&self, mut user: User) -> StoreResult<User> {
        user.audit.stamp_updated(self.actor, Utc::now());
        self.write.store.update_user(&user).await?;
        self.replicate(Change::UserUpserted(user.clone())).await;
        Ok(user)
    }

    pub async fn delete_user(&self, id: UserId) -> StoreResult<bool> {
        let deleted = self.write.store.delete_user(&id).await?;
        if deleted {
            self.replicate(Change::UserDeleted(id)).await;
        }
        Ok(deleted)
    }

    pub async fn insert_topic(&self, mut topic: Topic) -> StoreResult<Topic> {
        topic.audit.stamp_created(self.actor, Utc::now());
        self.write.store.create_topic(&topic).await?;
        self.replicate(Change::TopicUpserted(topic.clone())).await;
        Ok(topic)
    }

    pub async fn update_topic(&self, mut topic: Topic) -> StoreResult<Topic> {
        topic.audit.stamp_updated(self.actor, Utc::now());
        self.write.store.update_topic(&topic).await?;
        self.replicate(Change::TopicUpserted(topic.clone())).await;
        Ok(topic)
    }

    pub async fn delete_topic(&self, id: TopicId) -> StoreResult<bool> {
        let deleted = self.write.store.delete_topic(&id).await?;
        if deleted {
            self.replicate(Change::TopicDeleted(id)).await;
        }
        Ok(deleted)
    }

    pub async fn insert_activity(&self, mut activity: UserActivity) -> StoreResult<UserActivity> {
        activity.audit.stamp_created(self.actor, Utc::now());
        self.write.store.create_activity(&activity).await?;
        self.replicate(Change::ActivityUpserted(activity.clone())).await;
        Ok(activity)
    }

    pub async fn insert_level(&self, mut level: Level) -> StoreResult<Level> {
        level.audit.stamp_created(self.actor, Utc::now());
        self.write.store.create_level(&level).await?;
        self.replicate(Change::LevelUpserted(level.clone())).await;
        Ok(level)
    }

    pub async fn insert_lesson(&self, mut lesson: Lesson) -> StoreResult<Lesson> {
        let now = Utc::now();
        lesson.audit.stamp_created(self.actor, now);
        for word in &mut lesson.words {
            word.audit.stamp_created(self.actor, now);
        }
        self.write.store.create_lesson(&lesson).await?;
        self.replicate(Change::LessonUpserted(lesson.clone())).await;
        Ok(lesson)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repository::{TopicRepository, UserRepository};
    use crate::domain::value_object::Email;
    use crate::error::StoreError;
    use crate::infra::memory::MemoryStore;
    use platform::pipeline::Principal;

    struct BrokenHook;

    #[async_trait]
    impl ReplicationHook for BrokenHook {
        async fn replicate(&self, _change: &Change) -> StoreResult<()> {
            Err(StoreError::Corrupt("read store offline".into()))
        }
    }

    fn admin_ctx(id: UserId) -> RequestContext {
        RequestContext::authenticated(Principal {
            subject: id.to_string(),
            role: "Admin".into(),
            token_id: "jti".into(),
        })
    }

    #[tokio::test]
    async fn test_insert_stamps_actor_and_mirrors() {
        let write = Arc::new(MemoryStore::new());
        let read = Arc::new(MemoryStore::new());
        let store = WriteStore::new(write.clone(), Arc::new(ReadStoreMirror::new(read.clone())));

        let admin = UserId::new();
        let topic = store
            .scope(&admin_ctx(admin))
            .insert_topic(Topic::new("Travel".into(), "Trips".into()))
            .await
            .unwrap();

        assert_eq!(topic.audit.created_by, Some(admin));
        let mirrored = read.find_topic_by_id(&topic.id).await.unwrap().unwrap();
        assert_eq!(mirrored, topic);
    }

    #[tokio::test]
    async fn test_update_stamps_updated_fields() {
        let write = Arc::new(MemoryStore::new());
        let store = WriteStore::new(write.clone(), Arc::new(NoReplication));
        let scope = store.scope(&RequestContext::anonymous());

        let user = User::register(
            Email::new("a@test.com").unwrap(),
            "hash".into(),
            "A".into(),
            "B".into(),
        );
        let mut user = scope.insert_user(user).await.unwrap();
        assert_eq!(user.audit.created_by, None);
        assert_eq!(user.audit.updated_at, None);

        user.nick_name = "ace".into();
        let user = scope.update_user(user).await.unwrap();
        assert!(user.audit.updated_at.is_some());
        assert_eq!(
            write.find_user_by_id(&user.id).await.unwrap().unwrap().nick_name,
            "ace"
        );
    }

    #[tokio::test]
    async fn test_hook_failure_keeps_write() {
        let write = Arc::new(MemoryStore::new());
        let store = WriteStore::new(write.clone(), Arc::new(BrokenHook));

        let topic = store
            .scope(&RequestContext::anonymous())
            .insert_topic(Topic::new("Food".into(), "Meals".into()))
            .await
            .unwrap();

        assert!(write.find_topic_by_id(&topic.id).await.unwrap().is_some());
    }
}
