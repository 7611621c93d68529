use kernel::id::LevelId;
use serde::{Deserialize, Serialize};

use super::audit::Audit;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub id: LevelId,
    pub name: String,
    pub required_exp: i32,
    pub audit: Audit,
}

impl Level {
    pub fn new(name: String, required_exp: i32) -> Self {
        Self {
            id: LevelId::new(),
            name,
            required_exp,
            audit: Audit::new(),
        }
    }
}
