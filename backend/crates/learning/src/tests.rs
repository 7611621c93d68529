//! Scenario tests for the learning crate
//!
//! Everything runs against `MemoryStore` on both sides, the moka cache and
//! the in-memory bus.

#[cfg(test)]
mod support {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use platform::cache::{CacheService, MemoryCacheService};
    use platform::mail::{EmailSender, MailError, OutgoingEmail};
    use platform::messaging::{EventEnvelope, EventPublisher, InMemoryBus, PublishError};
    use platform::password::{HasherConfig, PasswordHasher};
    use platform::pipeline::{Mediator, Principal, RequestContext};
    use platform::token::{TokenConfig, TokenIssuer};

    use crate::application::auth::RegisterCommand;
    use crate::application::{Dependencies, LearningConfig, build_mediator};
    use crate::domain::repository::ReplicationHook;
    use crate::infra::{MemoryStore, NoReplication, ReadStoreMirror, WriteStore};
    use kernel::id::UserId;

    pub const PASSWORD: &str = "Secret1!";

    /// Records every message; fails the first `fail_first` sends
    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<OutgoingEmail>>,
        pub attempts: Mutex<u32>,
        pub fail_first: u32,
        pub reject: bool,
    }

    impl RecordingMailer {
        pub fn sent(&self) -> Vec<OutgoingEmail> {
            self.sent.lock().unwrap().clone()
        }

        pub fn attempts(&self) -> u32 {
            *self.attempts.lock().unwrap()
        }
    }

    #[async_trait]
    impl EmailSender for RecordingMailer {
        async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
            let attempt = {
                let mut attempts = self.attempts.lock().unwrap();
                *attempts += 1;
                *attempts
            };
            if self.reject {
                return Err(MailError::Rejected("550 mailbox unavailable".into()));
            }
            if attempt <= self.fail_first {
                return Err(MailError::Transient("421 try later".into()));
            }
            self.sent.lock().unwrap().push(email);
            Ok(())
        }
    }

    /// Publisher whose broker is always down
    pub struct OfflinePublisher;

    #[async_trait]
    impl EventPublisher for OfflinePublisher {
        async fn publish(&self, _envelope: EventEnvelope) -> Result<(), PublishError> {
            Err(PublishError::Transport("broker offline".into()))
        }
    }

    pub struct Harness {
        pub mediator: Mediator,
        pub write: Arc<MemoryStore>,
        pub read: Arc<MemoryStore>,
        pub cache: Arc<dyn CacheService>,
        pub tokens: Arc<TokenIssuer>,
        pub bus: InMemoryBus,
        pub mailer: Arc<RecordingMailer>,
        pub deps: Dependencies<MemoryStore>,
    }

    pub fn harness() -> Harness {
        build(true, RecordingMailer::default(), None)
    }

    /// Write and read stores with no replication between them
    pub fn detached(mailer: RecordingMailer) -> Harness {
        build(false, mailer, None)
    }

    /// Mirrored stores, but every publish fails
    pub fn offline_broker() -> Harness {
        build(true, RecordingMailer::default(), Some(Arc::new(OfflinePublisher)))
    }

    fn build(mirror: bool, mailer: RecordingMailer, publisher: Option<Arc<dyn EventPublisher>>) -> Harness {
        let write = Arc::new(MemoryStore::new());
        let read = Arc::new(MemoryStore::new());
        let hook: Arc<dyn ReplicationHook> = if mirror {
            Arc::new(ReadStoreMirror::new(read.clone()))
        } else {
            Arc::new(NoReplication)
        };

        let cache: Arc<dyn CacheService> = Arc::new(MemoryCacheService::default());
        let tokens = Arc::new(TokenIssuer::new(TokenConfig::development()));
        let bus = InMemoryBus::new();
        let mailer = Arc::new(mailer);

        let deps = Dependencies {
            write: WriteStore::new(write.clone(), hook),
            read: read.clone(),
            cache: cache.clone(),
            hasher: Arc::new(PasswordHasher::new(HasherConfig::minimal(), None).unwrap()),
            tokens: tokens.clone(),
            publisher: publisher.unwrap_or_else(|| Arc::new(bus.clone())),
            mailer: mailer.clone(),
            config: Arc::new(LearningConfig::development()),
        };

        Harness {
            mediator: build_mediator(&deps),
            write,
            read,
            cache,
            tokens,
            bus,
            mailer,
            deps,
        }
    }

    pub fn ctx_for(id: UserId, role: &str) -> RequestContext {
        RequestContext::authenticated(Principal {
            subject: id.to_string(),
            role: role.to_string(),
            token_id: "test-jti".to_string(),
        })
    }

    pub fn register_command(email: &str) -> RegisterCommand {
        RegisterCommand {
            email: email.to_string(),
            password: PASSWORD.to_string(),
            first_name: "Ann".to_string(),
            last_name: "Lee".to_string(),
        }
    }

    impl Harness {
        pub async fn register(&self, email: &str) -> UserId {
            let reply = self
                .mediator
                .send(register_command(email), &RequestContext::anonymous())
                .await
                .unwrap();
            reply.into_data().unwrap().id
        }

        pub async fn register_admin(&self, email: &str) -> UserId {
            use crate::domain::entity::User;
            use crate::domain::repository::UserRepository;
            use crate::domain::value_object::{Email, UserRole};

            let mut user = User::register(
                Email::new(email).unwrap(),
                "$argon2id$unused".into(),
                "Root".into(),
                "Admin".into(),
            );
            user.role = UserRole::Admin;
            let user = self
                .deps
                .write
                .scope(&RequestContext::anonymous())
                .insert_user(user)
                .await
                .unwrap();
            assert!(self.read.find_user_by_id(&user.id).await.unwrap().is_some());
            user.id
        }
    }
}

// ============================================================================
// Auth
// ============================================================================

#[cfg(test)]
mod auth_tests {
    use super::support::*;
    use crate::application::auth::{ConfirmEmailCommand, GetMyInfoQuery, LoginCommand};
    use crate::application::user::UpdateUserCommand;
    use crate::application::user_activity::CreateUserActivityCommand;
    use crate::domain::repository::UserRepository;
    use kernel::response::Rejection;
    use platform::pipeline::{Principal, RequestContext};
    use platform::token::TokenKind;

    fn login(email: &str, password: &str) -> LoginCommand {
        LoginCommand {
            email: email.to_string(),
            nick_name: String::new(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let h = harness();
        let anon = RequestContext::anonymous();

        let reply = h.mediator.send(register_command("ann@test.com"), &anon).await.unwrap();
        assert!(reply.is_success());
        assert_eq!(reply.message(), "User registered successfully.");
        let user = reply.into_data().unwrap();
        assert_eq!(user.email, "ann@test.com");
        assert_eq!(user.role.code(), "User");
        assert_eq!(user.nick_name, "");

        let reply = h.mediator.send(login("ann@test.com", PASSWORD), &anon).await.unwrap();
        assert_eq!(reply.message(), "Login successful.");
        let tokens = reply.into_data().unwrap();
        let claims = h.tokens.verify(TokenKind::Access, &tokens.access_token).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.role, "User");
        assert!(h.tokens.verify(TokenKind::Refresh, &tokens.refresh_token).is_ok());
    }

    #[tokio::test]
    async fn test_register_survives_publish_failure() {
        let h = offline_broker();

        let reply = h
            .mediator
            .send(register_command("offline@test.com"), &RequestContext::anonymous())
            .await
            .unwrap();
        assert!(reply.is_success());
        assert_eq!(reply.message(), "User registered successfully.");
        let id = reply.into_data().unwrap().id;

        assert!(h.write.find_user_by_id(&id).await.unwrap().is_some());
        assert!(h.read.find_user_by_id(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_nickname_cannot_shadow_an_email() {
        let h = harness();
        let mallory = h.register("mallory@test.com").await;

        let err = h
            .mediator
            .send(
                UpdateUserCommand {
                    id: mallory,
                    first_name: "Mal".into(),
                    last_name: "Lory".into(),
                    nick_name: Some("victim@test.com".into()),
                },
                &ctx_for(mallory, "User"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        // Even with such a nickname in place, it lives in its own cache namespace
        let mut user = h.write.find_user_by_id(&mallory).await.unwrap().unwrap();
        user.nick_name = "victim@test.com".into();
        h.deps
            .write
            .scope(&RequestContext::anonymous())
            .update_user(user)
            .await
            .unwrap();

        let by_nick = LoginCommand {
            email: String::new(),
            nick_name: "victim@test.com".into(),
            password: PASSWORD.into(),
        };
        let reply = h.mediator.send(by_nick, &RequestContext::anonymous()).await.unwrap();
        assert!(reply.is_success());

        let victim = h
            .mediator
            .send(register_command("victim@test.com"), &RequestContext::anonymous())
            .await
            .unwrap();
        assert!(victim.is_success());

        let reply = h
            .mediator
            .send(login("victim@test.com", PASSWORD), &RequestContext::anonymous())
            .await
            .unwrap();
        let claims = h
            .tokens
            .verify(TokenKind::Access, &reply.into_data().unwrap().access_token)
            .unwrap();
        assert_eq!(claims.sub, victim.into_data().unwrap().id.to_string());
    }

    #[tokio::test]
    async fn test_stored_hash_is_argon2() {
        let h = harness();
        let id = h.register("hash@test.com").await;
        let stored = h.write.find_user_by_id(&id).await.unwrap().unwrap();
        assert!(stored.password_hash.starts_with("$argon2id$"));
        assert_ne!(stored.password_hash, PASSWORD);
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_look_the_same() {
        let h = harness();
        h.register("ann@test.com").await;
        let anon = RequestContext::anonymous();

        let wrong = h.mediator.send(login("ann@test.com", "Wrong1!pass"), &anon).await.unwrap();
        let unknown = h.mediator.send(login("nobody@test.com", PASSWORD), &anon).await.unwrap();

        for reply in [wrong, unknown] {
            assert_eq!(reply.rejection(), Some(Rejection::InvalidCredentials));
            assert_eq!(reply.message(), "Invalid login credentials.");
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_is_refused() {
        let h = harness();
        let anon = RequestContext::anonymous();
        h.register("dup@test.com").await;

        let again = h.mediator.send(register_command("DUP@test.com"), &anon).await.unwrap();
        assert_eq!(again.rejection(), Some(Rejection::AlreadyExists));
        assert_eq!(again.message(), "Email already exists.");
        assert_eq!(h.write.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_weak_password_is_a_validation_fault() {
        let h = harness();
        let mut command = register_command("weak@test.com");
        command.password = "password".into();

        let err = h
            .mediator
            .send(command, &RequestContext::anonymous())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(h.write.user_count().await, 0);
    }

    #[tokio::test]
    async fn test_login_needs_email_or_nickname() {
        let h = harness();
        let err = h
            .mediator
            .send(login("", PASSWORD), &RequestContext::anonymous())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(err.message().contains("Email or nickname is required."));
    }

    #[tokio::test]
    async fn test_my_info_includes_activities() {
        let h = harness();
        let id = h.register("me@test.com").await;
        let ctx = ctx_for(id, "User");

        h.mediator
            .send(
                CreateUserActivityCommand {
                    language_studying: "Spanish".into(),
                    study_time_everyday: 20,
                },
                &ctx,
            )
            .await
            .unwrap();

        let info = h.mediator.send(GetMyInfoQuery, &ctx).await.unwrap().into_data().unwrap();
        assert_eq!(info.email, "me@test.com");
        assert!(!info.is_email_confirmed);
        assert_eq!(info.user_activities.len(), 1);
        assert_eq!(info.user_activities[0].level, "Beginner");
    }

    #[tokio::test]
    async fn test_my_info_requires_a_user_id_subject() {
        let h = harness();

        let err = h
            .mediator
            .send(GetMyInfoQuery, &RequestContext::anonymous())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 401);

        let bogus = RequestContext::authenticated(Principal {
            subject: "not-a-uuid".into(),
            role: "User".into(),
            token_id: "jti".into(),
        });
        let err = h.mediator.send(GetMyInfoQuery, &bogus).await.unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[tokio::test]
    async fn test_confirm_email() {
        let h = harness();
        let id = h.register("confirm@test.com").await;
        let token = h.tokens.issue_confirm_email(&id.to_string(), "User").unwrap();

        let reply = h
            .mediator
            .send(ConfirmEmailCommand { token }, &RequestContext::anonymous())
            .await
            .unwrap();
        assert_eq!(reply.message(), "Email confirmed successfully.");
        assert_eq!(reply.into_data().unwrap(), "confirm@test.com");

        let read = h.read.find_user_by_id(&id).await.unwrap().unwrap();
        assert!(read.is_email_confirmed);
        assert!(read.email_confirmed_at.is_some());
        assert_eq!(h.mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_confirm_email_rejects_other_token_kinds() {
        let h = harness();
        let id = h.register("kind@test.com").await;
        let access = h.tokens.issue_access(&id.to_string(), "User").unwrap();

        let reply = h
            .mediator
            .send(ConfirmEmailCommand { token: access }, &RequestContext::anonymous())
            .await
            .unwrap();
        assert_eq!(reply.rejection(), Some(Rejection::InvalidToken));
        assert!(!h.write.find_user_by_id(&id).await.unwrap().unwrap().is_email_confirmed);
    }
}

// ============================================================================
// Topics & authorization
// ============================================================================

#[cfg(test)]
mod topic_tests {
    use super::support::*;
    use crate::application::topic::{
        CreateTopicCommand, DeleteTopicCommand, GetAllTopicsQuery, GetTopicByIdQuery, GetTopicByNameQuery,
        UpdateTopicCommand,
    };
    use crate::domain::repository::TopicRepository;
    use kernel::id::TopicId;
    use kernel::response::Rejection;
    use platform::pipeline::RequestContext;

    fn travel() -> CreateTopicCommand {
        CreateTopicCommand {
            name: "Travel".into(),
            description: "Trips and transport".into(),
        }
    }

    #[tokio::test]
    async fn test_only_admins_create_topics() {
        let h = harness();
        let user = h.register("user@test.com").await;

        let err = h.mediator.send(travel(), &ctx_for(user, "User")).await.unwrap_err();
        assert_eq!(err.status_code(), 403);

        let err = h.mediator.send(travel(), &RequestContext::anonymous()).await.unwrap_err();
        assert_eq!(err.status_code(), 401);

        assert!(h.write.list_topics().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_then_get_by_name() {
        let h = harness();
        let admin = h.register_admin("admin@test.com").await;
        let user = h.register("user@test.com").await;

        let created = h.mediator.send(travel(), &ctx_for(admin, "Admin")).await.unwrap();
        assert_eq!(created.message(), "Topic created successfully.");
        let created = created.into_data().unwrap();
        assert_eq!(created.created_by, Some(admin));

        let fetched = h
            .mediator
            .send(GetTopicByNameQuery { name: "Travel".into() }, &ctx_for(user, "User"))
            .await
            .unwrap();
        assert_eq!(fetched.message(), "Fetched topic.");
        assert_eq!(fetched.into_data().unwrap(), created);

        let cached = h.cache.get_raw("GetTopicByNameQuery:name=Travel").await;
        assert!(cached.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_topic_name() {
        let h = harness();
        let admin = ctx_for(h.register_admin("admin@test.com").await, "Admin");

        h.mediator.send(travel(), &admin).await.unwrap();
        let again = h.mediator.send(travel(), &admin).await.unwrap();
        assert_eq!(again.rejection(), Some(Rejection::AlreadyExists));
        assert_eq!(again.message(), "Topic already exists.");
    }

    #[tokio::test]
    async fn test_mutations_evict_cached_topic_queries() {
        let h = harness();
        let admin = ctx_for(h.register_admin("admin@test.com").await, "Admin");

        let first = h.mediator.send(travel(), &admin).await.unwrap().into_data().unwrap();
        let all = h.mediator.send(GetAllTopicsQuery, &admin).await.unwrap();
        assert_eq!(all.into_data().unwrap().len(), 1);

        h.mediator
            .send(
                CreateTopicCommand {
                    name: "Food".into(),
                    description: "Meals".into(),
                },
                &admin,
            )
            .await
            .unwrap();
        let all = h.mediator.send(GetAllTopicsQuery, &admin).await.unwrap();
        assert_eq!(all.into_data().unwrap().len(), 2);

        h.mediator
            .send(
                UpdateTopicCommand {
                    id: first.id,
                    name: "Journeys".into(),
                    description: "Trips".into(),
                },
                &admin,
            )
            .await
            .unwrap();
        let by_id = h.mediator.send(GetTopicByIdQuery { id: first.id }, &admin).await.unwrap();
        assert_eq!(by_id.into_data().unwrap().name, "Journeys");
    }

    #[tokio::test]
    async fn test_delete_topic() {
        let h = harness();
        let admin = ctx_for(h.register_admin("admin@test.com").await, "Admin");
        let topic = h.mediator.send(travel(), &admin).await.unwrap().into_data().unwrap();

        let deleted = h.mediator.send(DeleteTopicCommand { id: topic.id }, &admin).await.unwrap();
        assert_eq!(deleted.message(), "Topic deleted successfully.");
        assert!(h.read.find_topic_by_id(&topic.id).await.unwrap().is_none());

        let missing = h.mediator.send(DeleteTopicCommand { id: TopicId::new() }, &admin).await.unwrap();
        assert_eq!(missing.rejection(), Some(Rejection::NotFound));
    }

    #[tokio::test]
    async fn test_missing_topic_is_a_rejection() {
        let h = harness();
        let user = ctx_for(h.register("user@test.com").await, "User");

        let reply = h.mediator.send(GetTopicByIdQuery { id: TopicId::new() }, &user).await.unwrap();
        assert_eq!(reply.rejection(), Some(Rejection::NotFound));
        assert_eq!(reply.message(), "Topic not found.");
    }
}

// ============================================================================
// Users & activities
// ============================================================================

#[cfg(test)]
mod user_tests {
    use super::support::*;
    use crate::application::topic::CreateTopicCommand;
    use crate::application::user::{DeleteUserCommand, GetAllUsersQuery, GetUserByIdQuery, UpdateUserCommand};
    use crate::application::user_activity::{CreateUserActivityCommand, GetUserActivityQuery};
    use crate::application::UserLookup;
    use kernel::response::Rejection;

    #[tokio::test]
    async fn test_pagination_over_filtered_set() {
        let h = harness();
        let mut last = None;
        for i in 0..25 {
            last = Some(h.register(&format!("user{i:02}@test.com")).await);
        }
        let ctx = ctx_for(last.unwrap(), "User");

        let page = h
            .mediator
            .send(
                GetAllUsersQuery {
                    page_number: 3,
                    page_size: 10,
                    search_term: None,
                },
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(page.total_records, 25);
        assert_eq!(page.data.len(), 5);
        assert_eq!(page.page_number, 3);

        let filtered = h
            .mediator
            .send(
                GetAllUsersQuery {
                    page_number: 1,
                    page_size: 10,
                    search_term: Some("USER1".into()),
                },
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(filtered.total_records, 10);
    }

    #[tokio::test]
    async fn test_page_size_is_bounded() {
        let h = harness();
        let ctx = ctx_for(h.register("a@test.com").await, "User");

        let err = h
            .mediator
            .send(
                GetAllUsersQuery {
                    page_size: 101,
                    ..GetAllUsersQuery::default()
                },
                &ctx,
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_update_user_evicts_cache() {
        let h = harness();
        let id = h.register("upd@test.com").await;
        let ctx = ctx_for(id, "User");
        let key = UserLookup::Email("upd@test.com").cache_key();
        assert!(h.cache.get_raw(&key).await.is_some());

        let reply = h
            .mediator
            .send(
                UpdateUserCommand {
                    id,
                    first_name: "Anna".into(),
                    last_name: "Lee".into(),
                    nick_name: Some("annie".into()),
                },
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(reply.message(), "User updated successfully.");
        assert!(h.cache.get_raw(&key).await.is_none());

        let fetched = h.mediator.send(GetUserByIdQuery { id }, &ctx).await.unwrap();
        let user = fetched.into_data().unwrap();
        assert_eq!(user.first_name, "Anna");
        assert_eq!(user.nick_name, "annie");
    }

    #[tokio::test]
    async fn test_user_owning_content_is_not_deleted() {
        let h = harness();
        let admin_id = h.register_admin("admin@test.com").await;
        let admin = ctx_for(admin_id, "Admin");
        h.mediator
            .send(
                CreateTopicCommand {
                    name: "Travel".into(),
                    description: "Trips".into(),
                },
                &admin,
            )
            .await
            .unwrap();

        let reply = h.mediator.send(DeleteUserCommand { id: admin_id }, &admin).await.unwrap();
        assert_eq!(reply.rejection(), Some(Rejection::StillReferenced));

        let plain = h.register("plain@test.com").await;
        let reply = h.mediator.send(DeleteUserCommand { id: plain }, &admin).await.unwrap();
        assert_eq!(reply.message(), "User deleted successfully.");
    }

    #[tokio::test]
    async fn test_concurrent_activity_creates_yield_one() {
        let h = harness();
        let ctx = ctx_for(h.register("busy@test.com").await, "User");
        let command = CreateUserActivityCommand {
            language_studying: "French".into(),
            study_time_everyday: 15,
        };

        let (a, b) = tokio::join!(
            h.mediator.send(command.clone(), &ctx),
            h.mediator.send(command.clone(), &ctx)
        );
        let replies = [a.unwrap(), b.unwrap()];

        assert_eq!(replies.iter().filter(|r| r.is_success()).count(), 1);
        let loser = replies.iter().find(|r| !r.is_success()).unwrap();
        assert_eq!(loser.message(), "User activity already exists for this language.");

        let mine = h.mediator.send(GetUserActivityQuery, &ctx).await.unwrap();
        assert_eq!(mine.message(), "Fetched user activities.");
        assert_eq!(mine.into_data().unwrap().len(), 1);
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[cfg(test)]
mod catalog_tests {
    use super::support::*;
    use crate::application::catalog::{CreateLessonCommand, CreateLevelCommand, GetLessonsByTopicQuery};
    use crate::application::topic::CreateTopicCommand;
    use kernel::id::{LevelId, TopicId};
    use kernel::response::Rejection;

    fn lesson(topic_id: TopicId, level_id: LevelId, words: &[&str]) -> CreateLessonCommand {
        CreateLessonCommand {
            title: "Greetings".into(),
            description: "Saying hello".into(),
            exp_reward: 10,
            topic_id,
            level_id,
            language: "English".into(),
            words: words.iter().map(|w| w.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_lesson_with_words() {
        let h = harness();
        let admin = ctx_for(h.register_admin("admin@test.com").await, "Admin");

        let topic = h
            .mediator
            .send(
                CreateTopicCommand {
                    name: "Basics".into(),
                    description: "First steps".into(),
                },
                &admin,
            )
            .await
            .unwrap()
            .into_data()
            .unwrap();
        let level = h
            .mediator
            .send(
                CreateLevelCommand {
                    name: "Beginner".into(),
                    required_exp: 0,
                },
                &admin,
            )
            .await
            .unwrap();
        assert_eq!(level.message(), "Level created successfully.");
        let level = level.into_data().unwrap();

        // Cache the empty listing first; creating a lesson must evict it
        let before = h
            .mediator
            .send(GetLessonsByTopicQuery { topic_id: topic.id }, &admin)
            .await
            .unwrap();
        assert!(before.into_data().unwrap().is_empty());

        let created = h
            .mediator
            .send(lesson(topic.id, level.id, &["hello", "hello", " ", "bye"]), &admin)
            .await
            .unwrap();
        assert_eq!(created.message(), "Lesson created successfully.");
        let created = created.into_data().unwrap();
        let texts: Vec<_> = created.words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, ["hello", "bye"]);

        let listed = h
            .mediator
            .send(GetLessonsByTopicQuery { topic_id: topic.id }, &admin)
            .await
            .unwrap();
        assert_eq!(listed.message(), "Fetched lessons.");
        assert_eq!(listed.into_data().unwrap(), vec![created]);
    }

    #[tokio::test]
    async fn test_lesson_needs_topic_and_level() {
        let h = harness();
        let admin = ctx_for(h.register_admin("admin@test.com").await, "Admin");

        let reply = h
            .mediator
            .send(lesson(TopicId::new(), LevelId::new(), &["x"]), &admin)
            .await
            .unwrap();
        assert_eq!(reply.rejection(), Some(Rejection::NotFound));
        assert_eq!(reply.message(), "Topic not found.");
    }
}

// ============================================================================
// Replication & registration consumer
// ============================================================================

#[cfg(test)]
mod consumer_tests {
    use std::collections::BTreeMap;

    use super::support::*;
    use crate::application::consumer::{Outcome, RegistrationConsumer};
    use crate::application::events::UserRegisteredEvent;
    use crate::domain::repository::UserRepository;
    use platform::messaging::{Delivery, DomainEvent, EventConsumer, EventEnvelope, HEADER_EVENT_TYPE};
    use platform::pipeline::RequestContext;
    use tokio_util::sync::CancellationToken;

    fn consumer_for(h: &Harness) -> RegistrationConsumer<crate::infra::MemoryStore> {
        RegistrationConsumer::new(
            h.read.clone(),
            h.tokens.clone(),
            h.deps.mailer.clone(),
            h.deps.config.clone(),
        )
    }

    #[tokio::test]
    async fn test_event_replays_user_and_sends_confirmation() {
        let h = detached(RecordingMailer::default());
        let events = h.bus.subscribe(UserRegisteredEvent::NAME).await.unwrap();

        let id = h.register("event@test.com").await;
        assert!(h.read.find_user_by_id(&id).await.unwrap().is_none());

        h.bus.close().await;
        consumer_for(&h).run(&events, CancellationToken::new()).await;

        let replayed = h.read.find_user_by_id(&id).await.unwrap().unwrap();
        assert_eq!(replayed.email.as_str(), "event@test.com");

        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "event@test.com");
        assert!(sent[0].html_body.contains("/api/auth/confirm-email?token="));
    }

    #[tokio::test]
    async fn test_transient_mail_failures_are_retried() {
        let h = detached(RecordingMailer {
            fail_first: 2,
            ..RecordingMailer::default()
        });
        let events = h.bus.subscribe(UserRegisteredEvent::NAME).await.unwrap();
        h.register("retry@test.com").await;

        let delivery = events.next().await.unwrap().unwrap();
        assert_eq!(consumer_for(&h).process(&delivery).await, Outcome::Processed);
        assert_eq!(h.mailer.attempts(), 3);
        assert_eq!(h.mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_mail_is_not_retried() {
        let h = detached(RecordingMailer {
            reject: true,
            ..RecordingMailer::default()
        });
        let events = h.bus.subscribe(UserRegisteredEvent::NAME).await.unwrap();
        h.register("bounce@test.com").await;

        let delivery = events.next().await.unwrap().unwrap();
        assert_eq!(consumer_for(&h).process(&delivery).await, Outcome::EmailFailed);
        assert_eq!(h.mailer.attempts(), 1);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_skipped() {
        let h = harness();
        let mut headers = BTreeMap::new();
        headers.insert(HEADER_EVENT_TYPE.to_string(), UserRegisteredEvent::NAME.to_string());
        let delivery = Delivery {
            envelope: EventEnvelope {
                topic: UserRegisteredEvent::NAME.into(),
                key: UserRegisteredEvent::NAME.into(),
                headers,
                payload: "{not json".into(),
            },
            partition: 0,
            offset: 7,
        };

        assert_eq!(consumer_for(&h).process(&delivery).await, Outcome::Malformed);
        assert!(h.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_redelivery_keeps_confirmed_state() {
        let h = harness();
        let events = h.bus.subscribe(UserRegisteredEvent::NAME).await.unwrap();
        let id = h.register("again@test.com").await;

        let token = h.tokens.issue_confirm_email(&id.to_string(), "User").unwrap();
        h.mediator
            .send(
                crate::application::auth::ConfirmEmailCommand { token },
                &RequestContext::anonymous(),
            )
            .await
            .unwrap();

        let delivery = events.next().await.unwrap().unwrap();
        consumer_for(&h).process(&delivery).await;

        assert!(h.read.find_user_by_id(&id).await.unwrap().unwrap().is_email_confirmed);
    }

    #[tokio::test]
    async fn test_cancellation_stops_the_loop() {
        let h = harness();
        let events = h.bus.subscribe(UserRegisteredEvent::NAME).await.unwrap();
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        // Returns immediately even though the stream is still open
        consumer_for(&h).run(&events, shutdown).await;
    }
}

// ============================================================================
// HTTP surface
// ============================================================================

#[cfg(test)]
mod http_tests {
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use platform::mail::confirmation_link;
    use tower::ServiceExt;

    use super::support::*;
    use crate::presentation::router::learning_router;

    fn app(h: &Harness) -> Router {
        learning_router(h.mediator.clone(), h.tokens.clone())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_register_login_me() {
        let h = harness();

        let response = app(&h)
            .oneshot(post_json(
                "/api/auth/register",
                json!({"email": "web@test.com", "password": PASSWORD, "firstName": "Web", "lastName": "User"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["email"], "web@test.com");

        let response = app(&h)
            .oneshot(post_json(
                "/api/auth/login",
                json!({"email": "web@test.com", "password": PASSWORD}),
            ))
            .await
            .unwrap();
        let body = body_json(response).await;
        let access = body["data"]["access_token"].as_str().unwrap().to_string();

        let response = app(&h)
            .oneshot(
                Request::get("/api/auth/me")
                    .header(header::AUTHORIZATION, format!("Bearer {access}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["email"], "web@test.com");
        assert_eq!(body["data"]["isEmailConfirmed"], false);
    }

    #[tokio::test]
    async fn test_rejection_is_200_with_success_false() {
        let h = harness();
        let response = app(&h)
            .oneshot(post_json(
                "/api/auth/login",
                json!({"email": "ghost@test.com", "password": PASSWORD}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Invalid login credentials.");
    }

    #[tokio::test]
    async fn test_missing_token_is_401_json() {
        let h = harness();
        let response = app(&h)
            .oneshot(Request::get("/api/auth/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["status"], 401);
    }

    #[tokio::test]
    async fn test_malformed_body_gets_error_envelope() {
        let h = harness();
        let response = app(&h)
            .oneshot(
                Request::post("/api/auth/register")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{"))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        assert!(status.is_client_error());
        let body = body_json(response).await;
        assert_eq!(body["status"], status.as_u16());
        assert_eq!(body["error"], "Request error");
    }

    #[tokio::test]
    async fn test_emailed_link_confirms_through_the_router() {
        let h = harness();
        let id = h.register("link@test.com").await;
        let token = h.tokens.issue_confirm_email(&id.to_string(), "User").unwrap();

        let link = confirmation_link(&h.deps.config.app_base_url, &token, "link@test.com");
        let path = link
            .strip_prefix(h.deps.config.app_base_url.trim_end_matches('/'))
            .unwrap()
            .to_string();

        let response = app(&h)
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], "link@test.com");
    }

    #[tokio::test]
    async fn test_unknown_route_gets_error_envelope() {
        let h = harness();
        let response = app(&h)
            .oneshot(Request::get("/nowhere").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["status"], 404);
    }

    #[tokio::test]
    async fn test_bad_path_id_is_400() {
        let h = harness();
        let id = h.register("path@test.com").await;
        let access = h.tokens.issue_access(&id.to_string(), "User").unwrap();

        let response = app(&h)
            .oneshot(
                Request::get("/api/topic/get-by-id/not-a-uuid")
                    .header(header::AUTHORIZATION, format!("Bearer {access}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Invalid id format");
    }
}
