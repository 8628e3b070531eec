//! 存储抽象：StateDelta / EmbeddedFact 只追加写入、全量读取 delta、向量最近邻检索
//!
//! 引擎假定单写者；排序与截取最近 N 条由 recent_deltas 完成，不依赖存储的返回顺序。

use crate::core::EngineError;
use crate::memory::{EmbeddedFact, NewEmbeddedFact, NewStateDelta, StateDelta};

pub trait MemoryStore: Send + Sync {
    /// 按给定顺序追加一批 delta，返回分配的 id
    fn put_deltas(&self, deltas: &[NewStateDelta]) -> Result<Vec<i64>, EngineError>;

    /// 追加一条事实；content 为空时报错
    fn put_fact(&self, fact: NewEmbeddedFact) -> Result<i64, EngineError>;

    /// 全部 delta（顺序不保证）
    fn all_deltas(&self) -> Result<Vec<StateDelta>, EngineError>;

    /// 与 query 最近的至多 limit 条事实及其余弦距离，按距离升序
    fn nearest_facts(
        &self,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<(EmbeddedFact, f32)>, EngineError>;
}

/// 最近 limit 条 delta，按时间先后（旧 -> 新）；同一时间戳按写入 id 排序
pub fn recent_deltas(store: &dyn MemoryStore, limit: usize) -> Result<Vec<StateDelta>, EngineError> {
    let mut all = store.all_deltas()?;
    all.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
    let skip = all.len().saturating_sub(limit);
    Ok(all.split_off(skip))
}

/// 余弦相似度；维度不一致或零向量时为 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// 余弦距离 = 1 - 相似度（0 为完全相同，越小越相似）
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// 对候选事实按距离排序并截取（供各存储实现复用）
pub(crate) fn rank_by_distance<I>(query: &[f32], facts: I, limit: usize) -> Vec<(EmbeddedFact, f32)>
where
    I: IntoIterator<Item = EmbeddedFact>,
{
    let mut scored: Vec<(EmbeddedFact, f32)> = facts
        .into_iter()
        .map(|f| {
            let d = cosine_distance(query, &f.embedding);
            (f, d)
        })
        .collect();
    scored.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.id.cmp(&b.0.id))
    });
    scored.truncate(limit);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_distance() {
        let a = vec![1.0, 0.0, 0.0];
        assert!(cosine_distance(&a, &a).abs() < 1e-6);
        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_distance(&a, &c) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&a, &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }
}
