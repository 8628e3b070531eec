//! SQLite 持久化（rusqlite，同步）
//!
//! 两张只追加的表：state_deltas 与 embedded_facts（embedding 以 little-endian f32 BLOB 存储）。
//! 最近邻检索在进程内对全部事实计算余弦距离。

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::core::EngineError;
use crate::memory::store::rank_by_distance;
use crate::memory::{EmbeddedFact, MemoryStore, NewEmbeddedFact, NewStateDelta, StateDelta};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// 打开或创建数据库；父目录不存在时自动创建
    pub fn open(db_path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    EngineError::Store(format!("failed to create {}: {}", parent.display(), e))
                })?;
            }
        }
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn, db_path)
    }

    /// 内存数据库（测试用）
    pub fn open_in_memory() -> Result<Self, EngineError> {
        Self::init(Connection::open_in_memory()?, Path::new(":memory:"))
    }

    fn init(conn: Connection, db_path: &Path) -> Result<Self, EngineError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS state_deltas (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                turn_number INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                action TEXT NOT NULL,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS embedded_facts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                turn_number INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                content TEXT NOT NULL CHECK (length(content) > 0),
                source TEXT NOT NULL,
                embedding BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_state_deltas_turn ON state_deltas(turn_number);
            "#,
        )?;
        tracing::debug!(path = %db_path.display(), "sqlite store ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, EngineError> {
        self.conn
            .lock()
            .map_err(|_| EngineError::Store("sqlite connection lock poisoned".to_string()))
    }
}

fn encode_embedding(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn turn_from_sql(v: i64) -> u64 {
    u64::try_from(v).unwrap_or(0)
}

impl MemoryStore for SqliteStore {
    /// 一批 delta 在同一事务中写入：要么全部成功，要么都不写
    fn put_deltas(&self, deltas: &[NewStateDelta]) -> Result<Vec<i64>, EngineError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut ids = Vec::with_capacity(deltas.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO state_deltas (turn_number, timestamp, entity_type, entity_id, action, value)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for d in deltas {
                stmt.execute(params![
                    d.turn_number as i64,
                    d.timestamp,
                    d.entity_type,
                    d.entity_id,
                    d.action,
                    d.value
                ])?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    fn put_fact(&self, fact: NewEmbeddedFact) -> Result<i64, EngineError> {
        if fact.content.is_empty() {
            return Err(EngineError::Store("fact content must not be empty".to_string()));
        }
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO embedded_facts (turn_number, timestamp, content, source, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                fact.turn_number as i64,
                fact.timestamp,
                fact.content,
                fact.source,
                encode_embedding(&fact.embedding)
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn all_deltas(&self) -> Result<Vec<StateDelta>, EngineError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, turn_number, timestamp, entity_type, entity_id, action, value
             FROM state_deltas ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(StateDelta {
                    id: row.get(0)?,
                    turn_number: turn_from_sql(row.get(1)?),
                    timestamp: row.get::<_, DateTime<Utc>>(2)?,
                    entity_type: row.get(3)?,
                    entity_id: row.get(4)?,
                    action: row.get(5)?,
                    value: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn nearest_facts(
        &self,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<(EmbeddedFact, f32)>, EngineError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, turn_number, timestamp, content, source, embedding FROM embedded_facts",
        )?;
        let facts = stmt
            .query_map([], |row| {
                let blob: Vec<u8> = row.get(5)?;
                Ok(EmbeddedFact {
                    id: row.get(0)?,
                    turn_number: turn_from_sql(row.get(1)?),
                    timestamp: row.get::<_, DateTime<Utc>>(2)?,
                    content: row.get(3)?,
                    source: row.get(4)?,
                    embedding: decode_embedding(&blob),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rank_by_distance(query, facts, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_blob_roundtrip() {
        let v = vec![0.25f32, -1.5, 3.0e-7, 0.0];
        assert_eq!(decode_embedding(&encode_embedding(&v)), v);
    }

    #[test]
    fn test_in_memory_schema_accepts_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        let ids = store
            .put_deltas(&[NewStateDelta {
                turn_number: 1,
                timestamp: Utc::now(),
                entity_type: "scene".into(),
                entity_id: "gate".into(),
                action: "update".into(),
                value: "open".into(),
            }])
            .unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(store.all_deltas().unwrap()[0].value, "open");
    }

    #[test]
    fn test_recent_deltas_roundtrip_all_fields_in_time_order() {
        use chrono::TimeZone;

        use crate::memory::recent_deltas;

        let store = SqliteStore::open_in_memory().unwrap();
        let base = 1_700_000_000;
        let delta = |i: u32| NewStateDelta {
            turn_number: u64::from(i) + 1,
            timestamp: Utc.timestamp_opt(base + i64::from(i), i * 1_000_000).unwrap(),
            entity_type: format!("npc{i}"),
            entity_id: format!("guard_{i}"),
            action: if i % 2 == 0 { "update" } else { "create" }.into(),
            value: format!("{{\"mood\":\"alert {i}\"}}"),
        };
        // 写入顺序与时间顺序不同
        let order = [3u32, 0, 6, 1, 5, 2, 4];
        let written: Vec<NewStateDelta> = order.iter().map(|&i| delta(i)).collect();
        let ids = store.put_deltas(&written).unwrap();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7]);

        let recent = recent_deltas(&store, 5).unwrap();
        let expected: Vec<StateDelta> = (2u32..7)
            .map(|i| {
                let pos = order.iter().position(|&o| o == i).unwrap();
                delta(i).into_stored(ids[pos])
            })
            .collect();
        assert_eq!(recent, expected);
        assert!(recent.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }
}
