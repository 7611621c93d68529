use kernel::id::{TopicId, WordId};
use serde::{Deserialize, Serialize};

use super::audit::Audit;

/// Vocabulary item, filed under a topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    pub id: WordId,
    pub text: String,
    pub language: String,
    pub topic_id: TopicId,
    pub audit: Audit,
}

impl Word {
    pub fn new(text: String, language: String, topic_id: TopicId) -> Self {
        Self {
            id: WordId::new(),
            text,
            language,
            topic_id,
            audit: Audit::new(),
        }
    }
}
