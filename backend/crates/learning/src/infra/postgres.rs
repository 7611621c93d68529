//! PostgreSQL Store Implementation
//!
//! One `PgStore` per database. The write side uses plain inserts so that
//! unique indexes surface as `StoreError::Duplicate`; the read side is fed
//! through [`ReplicaSink::apply`], which upserts by primary key inside a
//! transaction and can be replayed safely.

use chrono::{DateTime, Utc};
use kernel::id::{Id, LevelId, TopicId, UserId};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::domain::entity::{Audit, Lesson, Level, Topic, User, UserActivity, Word};
use crate::domain::repository::{
    ActivityRepository, Change, LessonRepository, LevelRepository, ReplicaSink, TopicRepository,
    UserFilter, UserRepository,
};
use crate::domain::value_object::{Email, UserRole};
use crate::error::{StoreError, StoreResult};

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

const AUDIT_COLUMNS: &str = "created_by, created_at, updated_by, updated_at, deleted_by, deleted_at";

fn user_select(filter: &str) -> String {
    format!(
        "SELECT id, email, password_hash, first_name, last_name, nick_name, role, \
         is_email_confirmed, email_confirmed_at, {AUDIT_COLUMNS} FROM users {filter}"
    )
}

fn topic_select(filter: &str) -> String {
    format!("SELECT id, name, description, {AUDIT_COLUMNS} FROM topics {filter}")
}

fn activity_select(filter: &str) -> String {
    format!(
        "SELECT id, user_id, exp, level, streak_day, study_time_today, study_time_everyday, \
         total_study_time, total_lessons, language_studying, {AUDIT_COLUMNS} \
         FROM user_activities {filter}"
    )
}

/// Escape `%`, `_` and `\` for use inside an ILIKE pattern
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn uuid_of<T>(id: &Option<Id<T>>) -> Option<Uuid> {
    id.as_ref().map(|id| *id.as_uuid())
}

// ============================================================================
// Writers shared by the write path and the replica sink
// ============================================================================

async fn write_user<'e, E: PgExecutor<'e>>(exec: E, user: &User, upsert: bool) -> StoreResult<()> {
    let conflict = if upsert {
        "ON CONFLICT (id) DO UPDATE SET
            email = EXCLUDED.email,
            password_hash = EXCLUDED.password_hash,
            first_name = EXCLUDED.first_name,
            last_name = EXCLUDED.last_name,
            nick_name = EXCLUDED.nick_name,
            role = EXCLUDED.role,
            is_email_confirmed = EXCLUDED.is_email_confirmed,
            email_confirmed_at = EXCLUDED.email_confirmed_at,
            updated_by = EXCLUDED.updated_by,
            updated_at = EXCLUDED.updated_at"
    } else {
        ""
    };
    let sql = format!(
        r#"
        INSERT INTO users (
            id, email, password_hash, first_name, last_name, nick_name, role,
            is_email_confirmed, email_confirmed_at, {AUDIT_COLUMNS}
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        {conflict}
        "#
    );

    sqlx::query(&sql)
        .bind(user.id.as_uuid())
        .bind(user.email.as_str())
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.nick_name)
        .bind(user.role.code())
        .bind(user.is_email_confirmed)
        .bind(user.email_confirmed_at)
        .bind(uuid_of(&user.audit.created_by))
        .bind(user.audit.created_at)
        .bind(uuid_of(&user.audit.updated_by))
        .bind(user.audit.updated_at)
        .bind(uuid_of(&user.audit.deleted_by))
        .bind(user.audit.deleted_at)
        .execute(exec)
        .await?;

    Ok(())
}

async fn write_topic<'e, E: PgExecutor<'e>>(exec: E, topic: &Topic, upsert: bool) -> StoreResult<()> {
    let conflict = if upsert {
        "ON CONFLICT (id) DO UPDATE SET
            name = EXCLUDED.name,
            description = EXCLUDED.description,
            updated_by = EXCLUDED.updated_by,
            updated_at = EXCLUDED.updated_at"
    } else {
        ""
    };
    let sql = format!(
        r#"
        INSERT INTO topics (id, name, description, {AUDIT_COLUMNS})
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        {conflict}
        "#
    );

    sqlx::query(&sql)
        .bind(topic.id.as_uuid())
        .bind(&topic.name)
        .bind(&topic.description)
        .bind(uuid_of(&topic.audit.created_by))
        .bind(topic.audit.created_at)
        .bind(uuid_of(&topic.audit.updated_by))
        .bind(topic.audit.updated_at)
        .bind(uuid_of(&topic.audit.deleted_by))
        .bind(topic.audit.deleted_at)
        .execute(exec)
        .await?;

    Ok(())
}

async fn write_activity<'e, E: PgExecutor<'e>>(
    exec: E,
    activity: &UserActivity,
    upsert: bool,
) -> StoreResult<()> {
    let conflict = if upsert {
        "ON CONFLICT (id) DO UPDATE SET
            exp = EXCLUDED.exp,
            level = EXCLUDED.level,
            streak_day = EXCLUDED.streak_day,
            study_time_today = EXCLUDED.study_time_today,
            study_time_everyday = EXCLUDED.study_time_everyday,
            total_study_time = EXCLUDED.total_study_time,
            total_lessons = EXCLUDED.total_lessons,
            updated_by = EXCLUDED.updated_by,
            updated_at = EXCLUDED.updated_at"
    } else {
        ""
    };
    let sql = format!(
        r#"
        INSERT INTO user_activities (
            id, user_id, exp, level, streak_day, study_time_today, study_time_everyday,
            total_study_time, total_lessons, language_studying, {AUDIT_COLUMNS}
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        {conflict}
        "#
    );

    sqlx::query(&sql)
        .bind(activity.id.as_uuid())
        .bind(activity.user_id.as_uuid())
        .bind(activity.exp)
        .bind(&activity.level)
        .bind(activity.streak_day)
        .bind(activity.study_time_today)
        .bind(activity.study_time_everyday)
        .bind(activity.total_study_time)
        .bind(activity.total_lessons)
        .bind(&activity.language_studying)
        .bind(uuid_of(&activity.audit.created_by))
        .bind(activity.audit.created_at)
        .bind(uuid_of(&activity.audit.updated_by))
        .bind(activity.audit.updated_at)
        .bind(uuid_of(&activity.audit.deleted_by))
        .bind(activity.audit.deleted_at)
        .execute(exec)
        .await?;

    Ok(())
}

async fn write_level<'e, E: PgExecutor<'e>>(exec: E, level: &Level, upsert: bool) -> StoreResult<()> {
    let conflict = if upsert {
        "ON CONFLICT (id) DO UPDATE SET
            name = EXCLUDED.name,
            required_exp = EXCLUDED.required_exp,
            updated_by = EXCLUDED.updated_by,
            updated_at = EXCLUDED.updated_at"
    } else {
        ""
    };
    let sql = format!(
        r#"
        INSERT INTO levels (id, name, required_exp, {AUDIT_COLUMNS})
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        {conflict}
        "#
    );

    sqlx::query(&sql)
        .bind(level.id.as_uuid())
        .bind(&level.name)
        .bind(level.required_exp)
        .bind(uuid_of(&level.audit.created_by))
        .bind(level.audit.created_at)
        .bind(uuid_of(&level.audit.updated_by))
        .bind(level.audit.updated_at)
        .bind(uuid_of(&level.audit.deleted_by))
        .bind(level.audit.deleted_at)
        .execute(exec)
        .await?;

    Ok(())
}

/// Lesson, its words and the ordered link rows; caller owns the transaction
async fn write_lesson(
    tx: &mut sqlx::PgConnection,
    lesson: &Lesson,
    upsert: bool,
) -> StoreResult<()> {
    let conflict = if upsert {
        "ON CONFLICT (id) DO UPDATE SET
            title = EXCLUDED.title,
            description = EXCLUDED.description,
            exp_reward = EXCLUDED.exp_reward,
            topic_id = EXCLUDED.topic_id,
            level_id = EXCLUDED.level_id,
            updated_by = EXCLUDED.updated_by,
            updated_at = EXCLUDED.updated_at"
    } else {
        ""
    };
    let sql = format!(
        r#"
        INSERT INTO lessons (
            id, title, description, exp_reward, topic_id, level_id, {AUDIT_COLUMNS}
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        {conflict}
        "#
    );

    sqlx::query(&sql)
        .bind(lesson.id.as_uuid())
        .bind(&lesson.title)
        .bind(&lesson.description)
        .bind(lesson.exp_reward)
        .bind(lesson.topic_id.as_uuid())
        .bind(lesson.level_id.as_uuid())
        .bind(uuid_of(&lesson.audit.created_by))
        .bind(lesson.audit.created_at)
        .bind(uuid_of(&lesson.audit.updated_by))
        .bind(lesson.audit.updated_at)
        .bind(uuid_of(&lesson.audit.deleted_by))
        .bind(lesson.audit.deleted_at)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM lesson_words WHERE lesson_id = $1")
        .bind(lesson.id.as_uuid())
        .execute(&mut *tx)
        .await?;

    for (position, word) in lesson.words.iter().enumerate() {
        let word_sql = format!(
            r#"
            INSERT INTO words (id, text, language, topic_id, {AUDIT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                text = EXCLUDED.text,
                language = EXCLUDED.language
            "#
        );
        sqlx::query(&word_sql)
            .bind(word.id.as_uuid())
            .bind(&word.text)
            .bind(&word.language)
            .bind(word.topic_id.as_uuid())
            .bind(uuid_of(&word.audit.created_by))
            .bind(word.audit.created_at)
            .bind(uuid_of(&word.audit.updated_by))
            .bind(word.audit.updated_at)
            .bind(uuid_of(&word.audit.deleted_by))
            .bind(word.audit.deleted_at)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO lesson_words (lesson_id, word_id, position) VALUES ($1, $2, $3)")
            .bind(lesson.id.as_uuid())
            .bind(word.id.as_uuid())
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
    }

    Ok(())
}

// ============================================================================
// User Repository Implementation
// ============================================================================

impl UserRepository for PgStore {
    async fn create_user(&self, user: &User) -> StoreResult<()> {
        write_user(&self.pool, user, false).await
    }

    async fn find_user_by_id(&self, id: &UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&user_select("WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&user_select("WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn find_user_by_nickname(&self, nick_name: &str) -> StoreResult<Option<User>> {
        if nick_name.is_empty() {
            return Ok(None);
        }
        let row = sqlx::query_as::<_, UserRow>(&user_select(
            "WHERE nick_name = $1 ORDER BY created_at LIMIT 1",
        ))
        .bind(nick_name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn list_users(&self, filter: &UserFilter) -> StoreResult<(Vec<User>, u64)> {
        let pattern = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(like_pattern);

        const SEARCH: &str = "WHERE ($1::text IS NULL \
             OR first_name ILIKE $1 OR last_name ILIKE $1 \
             OR nick_name ILIKE $1 OR email ILIKE $1)";

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM users {SEARCH}"))
            .bind(pattern.as_deref())
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, UserRow>(&user_select(&format!(
            "{SEARCH} ORDER BY created_at, email OFFSET $2 LIMIT $3"
        )))
        .bind(pattern.as_deref())
        .bind(i64::try_from(filter.offset).unwrap_or(i64::MAX))
        .bind(i64::try_from(filter.limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let users = rows
            .into_iter()
            .map(UserRow::into_user)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok((users, u64::try_from(total).unwrap_or_default()))
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users SET
                email = $2,
                password_hash = $3,
                first_name = $4,
                last_name = $5,
                nick_name = $6,
                role = $7,
                is_email_confirmed = $8,
                email_confirmed_at = $9,
                updated_by = $10,
                updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(user.email.as_str())
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.nick_name)
        .bind(user.role.code())
        .bind(user.is_email_confirmed)
        .bind(user.email_confirmed_at)
        .bind(uuid_of(&user.audit.updated_by))
        .bind(user.audit.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_user(&self, id: &UserId) -> StoreResult<bool> {
        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }
}

// ============================================================================
// Topic Repository Implementation
// ============================================================================

impl TopicRepository for PgStore {
    async fn create_topic(&self, topic: &Topic) -> StoreResult<()> {
        write_topic(&self.pool, topic, false).await
    }

    async fn find_topic_by_id(&self, id: &TopicId) -> StoreResult<Option<Topic>> {
        let row = sqlx::query_as::<_, TopicRow>(&topic_select("WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(TopicRow::into_topic))
    }

    async fn find_topic_by_name(&self, name: &str) -> StoreResult<Option<Topic>> {
        let row = sqlx::query_as::<_, TopicRow>(&topic_select("WHERE name = $1"))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(TopicRow::into_topic))
    }

    async fn list_topics(&self) -> StoreResult<Vec<Topic>> {
        let rows = sqlx::query_as::<_, TopicRow>(&topic_select("ORDER BY name"))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(TopicRow::into_topic).collect())
    }

    async fn update_topic(&self, topic: &Topic) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE topics SET
                name = $2,
                description = $3,
                updated_by = $4,
                updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(topic.id.as_uuid())
        .bind(&topic.name)
        .bind(&topic.description)
        .bind(uuid_of(&topic.audit.updated_by))
        .bind(topic.audit.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_topic(&self, id: &TopicId) -> StoreResult<bool> {
        let deleted = sqlx::query("DELETE FROM topics WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }
}

// ============================================================================
// Activity / Level Repository Implementations
// ============================================================================

impl ActivityRepository for PgStore {
    async fn create_activity(&self, activity: &UserActivity) -> StoreResult<()> {
        write_activity(&self.pool, activity, false).await
    }

    async fn find_activity(&self, user_id: &UserId, language: &str) -> StoreResult<Option<UserActivity>> {
        let row = sqlx::query_as::<_, ActivityRow>(&activity_select(
            "WHERE user_id = $1 AND language_studying = $2",
        ))
        .bind(user_id.as_uuid())
        .bind(language)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ActivityRow::into_activity))
    }

    async fn find_activities_by_user(&self, user_id: &UserId) -> StoreResult<Vec<UserActivity>> {
        let rows = sqlx::query_as::<_, ActivityRow>(&activity_select(
            "WHERE user_id = $1 ORDER BY language_studying",
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ActivityRow::into_activity).collect())
    }
}

impl LevelRepository for PgStore {
    async fn create_level(&self, level: &Level) -> StoreResult<()> {
        write_level(&self.pool, level, false).await
    }

    async fn find_level_by_id(&self, id: &LevelId) -> StoreResult<Option<Level>> {
        let row = sqlx::query_as::<_, LevelRow>(&format!(
            "SELECT id, name, required_exp, {AUDIT_COLUMNS} FROM levels WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(LevelRow::into_level))
    }
}

// ============================================================================
// Lesson Repository Implementation
// ============================================================================

impl LessonRepository for PgStore {
    async fn create_lesson(&self, lesson: &Lesson) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        write_lesson(&mut tx, lesson, false).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_lessons_by_topic(&self, topic_id: &TopicId) -> StoreResult<Vec<Lesson>> {
        let lesson_rows = sqlx::query_as::<_, LessonRow>(&format!(
            "SELECT id, title, description, exp_reward, topic_id, level_id, {AUDIT_COLUMNS} \
             FROM lessons WHERE topic_id = $1 ORDER BY title"
        ))
        .bind(topic_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        if lesson_rows.is_empty() {
            return Ok(Vec::new());
        }

        let lesson_ids: Vec<Uuid> = lesson_rows.iter().map(|r| r.id).collect();
        let word_rows = sqlx::query_as::<_, LessonWordRow>(
            r#"
            SELECT
                lw.lesson_id,
                w.id,
                w.text,
                w.language,
                w.topic_id,
                w.created_by,
                w.created_at,
                w.updated_by,
                w.updated_at,
                w.deleted_by,
                w.deleted_at
            FROM lesson_words lw
            JOIN words w ON w.id = lw.word_id
            WHERE lw.lesson_id = ANY($1)
            ORDER BY lw.lesson_id, lw.position
            "#,
        )
        .bind(&lesson_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut lessons: Vec<Lesson> = lesson_rows.into_iter().map(LessonRow::into_lesson).collect();
        for row in word_rows {
            let lesson_id = row.lesson_id;
            if let Some(lesson) = lessons.iter_mut().find(|l| *l.id.as_uuid() == lesson_id) {
                lesson.words.push(row.into_word());
            }
        }

        Ok(lessons)
    }
}

// ============================================================================
// Replica Sink Implementation
// ============================================================================

impl ReplicaSink for PgStore {
    async fn apply(&self, change: &Change) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        match change {
            Change::UserUpserted(user) => write_user(&mut *tx, user, true).await?,
            Change::UserDeleted(id) => {
                sqlx::query("DELETE FROM users WHERE id = $1")
                    .bind(id.as_uuid())
                    .execute(&mut *tx)
                    .await?;
            }
            Change::TopicUpserted(topic) => write_topic(&mut *tx, topic, true).await?,
            Change::TopicDeleted(id) => {
                sqlx::query("DELETE FROM topics WHERE id = $1")
                    .bind(id.as_uuid())
                    .execute(&mut *tx)
                    .await?;
            }
            Change::ActivityUpserted(activity) => write_activity(&mut *tx, activity, true).await?,
            Change::LevelUpserted(level) => write_level(&mut *tx, level, true).await?,
            Change::LessonUpserted(lesson) => write_lesson(&mut tx, lesson, true).await?,
        }

        tx.commit().await?;

        tracing::debug!(change = change.name(), id = %change.entity_id(), "Replica change applied");
        Ok(())
    }
}

// ============================================================================
// Row types
// ============================================================================

#[derive(sqlx::FromRow)]
struct AuditRow {
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_by: Option<Uuid>,
    updated_at: Option<DateTime<Utc>>,
    deleted_by: Option<Uuid>,
    deleted_at: Option<DateTime<Utc>>,
}

impl AuditRow {
    fn into_audit(self) -> Audit {
        Audit {
            created_by: self.created_by.map(UserId::from_uuid),
            created_at: self.created_at,
            updated_by: self.updated_by.map(UserId::from_uuid),
            updated_at: self.updated_at,
            deleted_by: self.deleted_by.map(UserId::from_uuid),
            deleted_at: self.deleted_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    nick_name: String,
    role: String,
    is_email_confirmed: bool,
    email_confirmed_at: Option<DateTime<Utc>>,
    #[sqlx(flatten)]
    audit: AuditRow,
}

impl UserRow {
    fn into_user(self) -> StoreResult<User> {
        let role = UserRole::from_code(&self.role)
            .map_err(|e| StoreError::Corrupt(format!("users.role: {}", e)))?;

        Ok(User {
            id: UserId::from_uuid(self.id),
            email: Email::from_db(self.email),
            password_hash: self.password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            nick_name: self.nick_name,
            role,
            is_email_confirmed: self.is_email_confirmed,
            email_confirmed_at: self.email_confirmed_at,
            audit: self.audit.into_audit(),
        })
    }
}

#[derive(sqlx::FromRow)]
struct TopicRow {
    id: Uuid,
    name: String,
    description: String,
    #[sqlx(flatten)]
    audit: AuditRow,
}

impl TopicRow {
    fn into_topic(self) -> Topic {
        Topic {
            id: TopicId::from_uuid(self.id),
            name: self.name,
            description: self.description,
            audit: self.audit.into_audit(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct ActivityRow {
    id: Uuid,
    user_id: Uuid,
    exp: i32,
    level: String,
    streak_day: i32,
    study_time_today: i32,
    study_time_everyday: i32,
    total_study_time: i32,
    total_lessons: i32,
    language_studying: String,
    #[sqlx(flatten)]
    audit: AuditRow,
}

impl ActivityRow {
    fn into_activity(self) -> UserActivity {
        UserActivity {
            id: Id::from_uuid(self.id),
            user_id: UserId::from_uuid(self.user_id),
            exp: self.exp,
            level: self.level,
            streak_day: self.streak_day,
            study_time_today: self.study_time_today,
            study_time_everyday: self.study_time_everyday,
            total_study_time: self.total_study_time,
            total_lessons: self.total_lessons,
            language_studying: self.language_studying,
            audit: self.audit.into_audit(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct LevelRow {
    id: Uuid,
    name: String,
    required_exp: i32,
    #[sqlx(flatten)]
    audit: AuditRow,
}

impl LevelRow {
    fn into_level(self) -> Level {
        Level {
            id: LevelId::from_uuid(self.id),
            name: self.name,
            required_exp: self.required_exp,
            audit: self.audit.into_audit(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct LessonRow {
    id: Uuid,
    title: String,
    description: String,
    exp_reward: i32,
    topic_id: Uuid,
    level_id: Uuid,
    #[sqlx(flatten)]
    audit: AuditRow,
}

impl LessonRow {
    fn into_lesson(self) -> Lesson {
        Lesson {
            id: Id::from_uuid(self.id),
            title: self.title,
            description: self.description,
            exp_reward: self.exp_reward,
            topic_id: TopicId::from_uuid(self.topic_id),
            level_id: LevelId::from_uuid(self.level_id),
            words: Vec::new(),
            audit: self.audit.into_audit(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct LessonWordRow {
    lesson_id: Uuid,
    id: Uuid,
    text: String,
    language: String,
    topic_id: Uuid,
    #[sqlx(flatten)]
    audit: AuditRow,
}

impl LessonWordRow {
    fn into_word(self) -> Word {
        Word {
            id: Id::from_uuid(self.id),
            text: self.text,
            language: self.language,
            topic_id: TopicId::from_uuid(self.topic_id),
            audit: self.audit.into_audit(),
        }
    }
}
