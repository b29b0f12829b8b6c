pub mod fallback_writer;
pub mod normalizer;
pub mod progression;
pub mod scorer;
pub mod sequencer;

pub use fallback_writer::FallbackWriter;
pub use normalizer::{normalize, NormalizeOutcome};
pub use progression::{AwardOutcome, ProgressionSettings, ProgressionUpdater};
pub use scorer::{score, Selections};
pub use sequencer::shuffle;
