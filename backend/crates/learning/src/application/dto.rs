//! Response DTOs returned inside `Reply<T>`

use kernel::id::{LessonId, LevelId, TopicId, UserActivityId, UserId, WordId};
use serde::{Deserialize, Serialize};

use crate::domain::entity::{Lesson, Level, Topic, User, UserActivity, Word};
use crate::domain::value_object::UserRole;

// ============================================================================
// Users
// ============================================================================

/// Public view of a user; the password hash never leaves the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    #[serde(rename = "Id")]
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub nick_name: String,
    pub role: UserRole,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.to_string(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            nick_name: user.nick_name.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MyInfoDto {
    #[serde(rename = "Id")]
    pub id: UserId,
    pub email: String,
    pub nick_name: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub is_email_confirmed: bool,
    pub user_activities: Vec<UserActivityDto>,
}

impl MyInfoDto {
    pub fn new(user: &User, activities: &[UserActivity]) -> Self {
        Self {
            id: user.id,
            email: user.email.to_string(),
            nick_name: user.nick_name.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
            is_email_confirmed: user.is_email_confirmed,
            user_activities: activities.iter().map(UserActivityDto::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserActivityDto {
    #[serde(rename = "Id")]
    pub id: UserActivityId,
    pub exp: i32,
    pub level: String,
    pub streak_day: i32,
    pub study_time_today: i32,
    pub study_time_everyday: i32,
    pub total_study_time: i32,
    pub total_lessons: i32,
    pub language_studying: String,
    pub user_id: UserId,
}

impl From<&UserActivity> for UserActivityDto {
    fn from(a: &UserActivity) -> Self {
        Self {
            id: a.id,
            exp: a.exp,
            level: a.level.clone(),
            streak_day: a.streak_day,
            study_time_today: a.study_time_today,
            study_time_everyday: a.study_time_everyday,
            total_study_time: a.total_study_time,
            total_lessons: a.total_lessons,
            language_studying: a.language_studying.clone(),
            user_id: a.user_id,
        }
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicDto {
    #[serde(rename = "Id")]
    pub id: TopicId,
    pub name: String,
    pub description: String,
    pub created_by: Option<UserId>,
}

impl From<&Topic> for TopicDto {
    fn from(topic: &Topic) -> Self {
        Self {
            id: topic.id,
            name: topic.name.clone(),
            description: topic.description.clone(),
            created_by: topic.audit.created_by,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelDto {
    #[serde(rename = "Id")]
    pub id: LevelId,
    pub name: String,
    pub required_exp: i32,
}

impl From<&Level> for LevelDto {
    fn from(level: &Level) -> Self {
        Self {
            id: level.id,
            name: level.name.clone(),
            required_exp: level.required_exp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordDto {
    #[serde(rename = "Id")]
    pub id: WordId,
    pub text: String,
    pub language: String,
}

impl From<&Word> for WordDto {
    fn from(word: &Word) -> Self {
        Self {
            id: word.id,
            text: word.text.clone(),
            language: word.language.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonDto {
    #[serde(rename = "Id")]
    pub id: LessonId,
    pub title: String,
    pub description: String,
    pub exp_reward: i32,
    pub topic_id: TopicId,
    pub level_id: LevelId,
    pub words: Vec<WordDto>,
}

impl From<&Lesson> for LessonDto {
    fn from(lesson: &Lesson) -> Self {
        Self {
            id: lesson.id,
            title: lesson.title.clone(),
            description: lesson.description.clone(),
            exp_reward: lesson.exp_reward,
            topic_id: lesson.topic_id,
            level_id: lesson.level_id,
            words: lesson.words.iter().map(WordDto::from).collect(),
        }
    }
}
