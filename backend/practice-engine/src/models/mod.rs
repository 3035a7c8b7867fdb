pub mod answer;
pub mod path;
pub mod question;
pub mod session;

pub use answer::{AnswerEvent, AnswerHistory, AnswerResult, AttemptOutcome, LessonAnswers};
pub use path::{LearningPath, PathSlot};
pub use question::{LessonId, QuestionKey, QuestionKind, QuestionOption, QuestionRecord};
pub use session::{PracticeMode, ScoredCandidate, SessionStatus, SessionSummary};
