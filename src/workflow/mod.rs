pub mod attempt_ctx;
pub mod quiz_flow;
pub mod session;

pub use attempt_ctx::AttemptCtx;
pub use quiz_flow::{AwardTicket, QuizFlow, Submission};
pub use session::{
    Completion, CompletionTrigger, QuizSession, SessionEvent, SessionSettings, SessionState,
    SessionView, Transition,
};
