use kernel::id::{UserActivityId, UserId};
use serde::{Deserialize, Serialize};

use super::audit::Audit;

/// Label given to a fresh activity
pub const DEFAULT_LEVEL: &str = "Beginner";

/// Per-language progress of one user; unique on (user, language)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserActivity {
    pub id: UserActivityId,
    pub user_id: UserId,
    pub exp: i32,
    pub level: String,
    pub streak_day: i32,
    /// Minutes
    pub study_time_today: i32,
    /// Daily goal in minutes
    pub study_time_everyday: i32,
    pub total_study_time: i32,
    pub total_lessons: i32,
    pub language_studying: String,
    pub audit: Audit,
}

impl UserActivity {
    pub fn start(user_id: UserId, language_studying: String, study_time_everyday: i32) -> Self {
        Self {
            id: UserActivityId::new(),
            user_id,
            exp: 0,
            level: DEFAULT_LEVEL.to_string(),
            streak_day: 0,
            study_time_today: 0,
            study_time_everyday,
            total_study_time: 0,
            total_lessons: 0,
            language_studying,
            audit: Audit::new(),
        }
    }
}
