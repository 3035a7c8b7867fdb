use serde::{Deserialize, Serialize};

use super::question::LessonId;

pub const PERSONALIZED_PRACTICE_TITLE: &str = "Personalized Practice";
pub const REVIEW_TITLE: &str = "Review";

/// One entry of a learner's course path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PathSlot {
    Lesson { lesson_id: LessonId },
    PersonalizedPractice,
    Review,
}

impl PathSlot {
    pub fn lesson_id(&self) -> Option<LessonId> {
        match self {
            PathSlot::Lesson { lesson_id } => Some(*lesson_id),
            PathSlot::PersonalizedPractice | PathSlot::Review => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningPath {
    pub slots: Vec<PathSlot>,
}

impl LearningPath {
    pub fn new(slots: Vec<PathSlot>) -> Self {
        Self { slots }
    }

    /// Builds a path from display titles. Practice and review slots are
    /// recognised by title; every other title is a lesson, numbered by
    /// counting lessons only.
    pub fn from_titles<S: AsRef<str>>(titles: &[S]) -> Self {
        let mut next_lesson: LessonId = 0;
        let slots = titles
            .iter()
            .map(|title| match title.as_ref() {
                PERSONALIZED_PRACTICE_TITLE => PathSlot::PersonalizedPractice,
                REVIEW_TITLE => PathSlot::Review,
                _ => {
                    next_lesson += 1;
                    PathSlot::Lesson {
                        lesson_id: next_lesson,
                    }
                }
            })
            .collect();
        Self { slots }
    }

    /// The `count` lessons immediately before `slot_index`, skipping practice
    /// and review slots, returned in path order. Fewer are returned when the
    /// start of the path is reached.
    pub fn previous_lessons(&self, slot_index: usize, count: usize) -> Vec<LessonId> {
        let end = slot_index.min(self.slots.len());
        let mut lessons: Vec<LessonId> = self.slots[..end]
            .iter()
            .rev()
            .filter_map(PathSlot::lesson_id)
            .take(count)
            .collect();
        lessons.reverse();
        lessons
    }
}
