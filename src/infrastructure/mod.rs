//! 基础设施层
//!
//! 持有持久化资源，只暴露 `ProgressionStore` 定义的读写能力

pub mod file_store;
pub mod memory_store;
pub mod store;

pub use file_store::JsonFileStore;
pub use memory_store::InMemoryStore;
pub use store::ProgressionStore;
