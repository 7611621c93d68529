pub mod audit;
pub mod lesson;
pub mod level;
pub mod topic;
pub mod user;
pub mod user_activity;
pub mod word;

pub use audit::Audit;
pub use lesson::Lesson;
pub use level::Level;
pub use topic::Topic;
pub use user::User;
pub use user_activity::UserActivity;
pub use word::Word;
