//! Domain Layer
//!
//! Contains entities, value objects, and repository traits.

pub mod entity;
pub mod repository;
pub mod value_object;

// Re-exports
pub use entity::{Audit, Lesson, Level, Topic, User, UserActivity, Word};
pub use repository::{
    ActivityRepository, Change, LessonRepository, LevelRepository, ReplicaSink, ReplicationHook,
    Store, TopicRepository, UserFilter, UserRepository,
};
pub use value_object::{Email, UserRole};
