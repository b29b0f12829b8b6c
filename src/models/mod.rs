pub mod attempt;
pub mod loaders;
pub mod progression;
pub mod question;
pub mod quiz;
pub mod score;

pub use attempt::AttemptSummary;
pub use loaders::{load_all_quizzes, load_quiz_file};
pub use progression::{PendingAward, ProgressionState};
pub use question::{Answer, AnswerId, Question, QuestionId, QuestionKind};
pub use quiz::QuizDefinition;
pub use score::ScoreResult;
