use kernel::id::TopicId;
use serde::{Deserialize, Serialize};

use super::audit::Audit;

/// Subject area; the owner is `audit.created_by`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    /// Unique
    pub name: String,
    pub description: String,
    pub audit: Audit,
}

impl Topic {
    pub fn new(name: String, description: String) -> Self {
        Self {
            id: TopicId::new(),
            name,
            description,
            audit: Audit::new(),
        }
    }
}
