//! 记忆层：只追加的 StateDelta / EmbeddedFact 存储（SQLite / 进程内）与上下文重建
//!
//! 不保存任何原始对话；每轮上下文由最近 N 条 delta + 向量检索结果重建。

pub mod in_memory;
pub mod records;
pub mod sqlite;
pub mod store;

pub use in_memory::InMemoryStore;
pub use records::{DeltaSnapshot, EmbeddedFact, NewEmbeddedFact, NewStateDelta, StateDelta};
pub use sqlite::SqliteStore;
pub use store::{cosine_distance, cosine_similarity, recent_deltas, MemoryStore};
