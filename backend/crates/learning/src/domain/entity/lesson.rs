//! Lesson Entity

use kernel::id::{LessonId, LevelId, TopicId};
use serde::{Deserialize, Serialize};

use super::audit::Audit;
use super::word::Word;

/// A lesson and the words it teaches, in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub title: String,
    pub description: String,
    pub exp_reward: i32,
    pub topic_id: TopicId,
    pub level_id: LevelId,
    pub words: Vec<Word>,
    pub audit: Audit,
}

impl Lesson {
    /// One `Word` per distinct non-empty text, first occurrence wins
    pub fn new(
        title: String,
        description: String,
        exp_reward: i32,
        topic_id: TopicId,
        level_id: LevelId,
        language: &str,
        words: &[String],
    ) -> Self {
        let mut texts: Vec<&str> = Vec::with_capacity(words.len());
        for text in words.iter().map(|w| w.trim()).filter(|w| !w.is_empty()) {
            if !texts.contains(&text) {
                texts.push(text);
            }
        }

        Self {
            id: LessonId::new(),
            title,
            description,
            exp_reward,
            topic_id,
            level_id,
            words: texts
                .into_iter()
                .map(|text| Word::new(text.to_string(), language.to_string(), topic_id))
                .collect(),
            audit: Audit::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_are_distinct_and_non_empty() {
        let topic = TopicId::new();
        let lesson = Lesson::new(
            "Airport".into(),
            "Checking in".into(),
            10,
            topic,
            LevelId::new(),
            "en",
            &["gate".into(), " ".into(), "ticket".into(), "gate".into()],
        );

        let texts: Vec<&str> = lesson.words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, ["gate", "ticket"]);
        assert!(lesson.words.iter().all(|w| w.topic_id == topic && w.language == "en"));
    }
}
