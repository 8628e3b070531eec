//! 持久化记录：StateDelta（每轮确定性状态变化）与 EmbeddedFact（带向量的可检索事实）
//!
//! 两者都只追加、不修改；id 由存储分配。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 已写入的状态变化
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDelta {
    pub id: i64,
    pub turn_number: u64,
    pub timestamp: DateTime<Utc>,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub value: String,
}

/// 待写入的状态变化
#[derive(Debug, Clone, PartialEq)]
pub struct NewStateDelta {
    pub turn_number: u64,
    pub timestamp: DateTime<Utc>,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub value: String,
}

impl NewStateDelta {
    pub(crate) fn into_stored(self, id: i64) -> StateDelta {
        StateDelta {
            id,
            turn_number: self.turn_number,
            timestamp: self.timestamp,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            action: self.action,
            value: self.value,
        }
    }
}

/// THINK prompt 中展示的 delta 视图（不含 id / timestamp）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeltaSnapshot {
    pub turn: u64,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub value: String,
}

impl From<&StateDelta> for DeltaSnapshot {
    fn from(d: &StateDelta) -> Self {
        Self {
            turn: d.turn_number,
            entity_type: d.entity_type.clone(),
            entity_id: d.entity_id.clone(),
            action: d.action.clone(),
            value: d.value.clone(),
        }
    }
}

/// 已写入的向量事实
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedFact {
    pub id: i64,
    pub turn_number: u64,
    pub timestamp: DateTime<Utc>,
    pub content: String,
    /// 来源标签，如 "turn_summary"
    pub source: String,
    pub embedding: Vec<f32>,
}

/// 待写入的向量事实
#[derive(Debug, Clone, PartialEq)]
pub struct NewEmbeddedFact {
    pub turn_number: u64,
    pub timestamp: DateTime<Utc>,
    pub content: String,
    pub source: String,
    pub embedding: Vec<f32>,
}

impl NewEmbeddedFact {
    pub(crate) fn into_stored(self, id: i64) -> EmbeddedFact {
        EmbeddedFact {
            id,
            turn_number: self.turn_number,
            timestamp: self.timestamp,
            content: self.content,
            source: self.source,
            embedding: self.embedding,
        }
    }
}
