//! 核心层：错误类型与回合计数

pub mod error;
pub mod turn;

pub use error::EngineError;
pub use turn::TurnCounter;
