//! 进程内存储：无持久化，适合测试与 `[store] backend = "memory"`

use std::sync::{Arc, RwLock};

use crate::core::EngineError;
use crate::memory::store::rank_by_distance;
use crate::memory::{EmbeddedFact, MemoryStore, NewEmbeddedFact, NewStateDelta, StateDelta};

#[derive(Default)]
struct Tables {
    deltas: Vec<StateDelta>,
    facts: Vec<EmbeddedFact>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

fn poisoned<T>(_: T) -> EngineError {
    EngineError::Store("in-memory store lock poisoned".to_string())
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前全部事实（按写入顺序），便于检查
    pub fn facts(&self) -> Vec<EmbeddedFact> {
        self.tables
            .read()
            .map(|t| t.facts.clone())
            .unwrap_or_default()
    }
}

impl MemoryStore for InMemoryStore {
    fn put_deltas(&self, deltas: &[NewStateDelta]) -> Result<Vec<i64>, EngineError> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        let mut ids = Vec::with_capacity(deltas.len());
        for d in deltas {
            let id = tables.next_id();
            tables.deltas.push(d.clone().into_stored(id));
            ids.push(id);
        }
        Ok(ids)
    }

    fn put_fact(&self, fact: NewEmbeddedFact) -> Result<i64, EngineError> {
        if fact.content.is_empty() {
            return Err(EngineError::Store("fact content must not be empty".to_string()));
        }
        let mut tables = self.tables.write().map_err(poisoned)?;
        let id = tables.next_id();
        tables.facts.push(fact.into_stored(id));
        Ok(id)
    }

    fn all_deltas(&self) -> Result<Vec<StateDelta>, EngineError> {
        Ok(self.tables.read().map_err(poisoned)?.deltas.clone())
    }

    fn nearest_facts(
        &self,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<(EmbeddedFact, f32)>, EngineError> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(rank_by_distance(query, tables.facts.iter().cloned(), limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::recent_deltas;
    use chrono::{Duration, Utc};

    fn new_delta(turn: u64, secs: i64, id: &str) -> NewStateDelta {
        NewStateDelta {
            turn_number: turn,
            timestamp: Utc::now() + Duration::seconds(secs),
            entity_type: "inventory".into(),
            entity_id: id.into(),
            action: "add".into(),
            value: "1".into(),
        }
    }

    #[test]
    fn test_recent_deltas_chronological_and_capped() {
        let store = InMemoryStore::new();
        // 乱序写入时间戳
        store
            .put_deltas(&[new_delta(1, 30, "c"), new_delta(1, 10, "a"), new_delta(1, 20, "b")])
            .unwrap();
        let recent = recent_deltas(&store, 2).unwrap();
        let ids: Vec<&str> = recent.iter().map(|d| d.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_same_timestamp_keeps_write_order() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let batch: Vec<NewStateDelta> = ["x", "y", "z"]
            .iter()
            .map(|id| NewStateDelta {
                timestamp: now,
                ..new_delta(2, 0, id)
            })
            .collect();
        store.put_deltas(&batch).unwrap();
        let recent = recent_deltas(&store, 5).unwrap();
        let ids: Vec<&str> = recent.iter().map(|d| d.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_nearest_facts_sorted_by_distance() {
        let store = InMemoryStore::new();
        for (content, emb) in [("far", vec![0.0, 1.0]), ("near", vec![1.0, 0.1]), ("exact", vec![1.0, 0.0])] {
            store
                .put_fact(NewEmbeddedFact {
                    turn_number: 1,
                    timestamp: Utc::now(),
                    content: content.into(),
                    source: "test".into(),
                    embedding: emb,
                })
                .unwrap();
        }
        let hits = store.nearest_facts(&[1.0, 0.0], 2).unwrap();
        let contents: Vec<&str> = hits.iter().map(|(f, _)| f.content.as_str()).collect();
        assert_eq!(contents, vec!["exact", "near"]);
        assert!(hits[0].1 <= hits[1].1);
    }

    #[test]
    fn test_empty_fact_rejected() {
        let store = InMemoryStore::new();
        let err = store.put_fact(NewEmbeddedFact {
            turn_number: 1,
            timestamp: Utc::now(),
            content: String::new(),
            source: "turn_summary".into(),
            embedding: vec![1.0],
        });
        assert!(err.is_err());
    }
}
