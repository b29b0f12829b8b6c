pub mod toml_loader;

pub use toml_loader::{load_all_quizzes, load_quiz_file};
