//! 基础设施层（Infrastructure Layer）
//!
//! 持有持久化资源，只暴露读写能力。

pub mod memory_store;
pub mod store;

pub use memory_store::InMemoryStore;
pub use store::ItemStore;
