//! 回合计数器
//!
//! 进程内单调递增的回合号；启动时从已持久化的 StateDelta 恢复（取最大 turn_number，无记录则为 0），
//! 只通过 advance() 显式推进。

use crate::memory::StateDelta;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnCounter {
    current: u64,
}

impl TurnCounter {
    pub fn new(start: u64) -> Self {
        Self { current: start }
    }

    /// 纯函数：从已持久化的 delta 推出当前回合号
    pub fn recover(deltas: &[StateDelta]) -> Self {
        let current = deltas.iter().map(|d| d.turn_number).max().unwrap_or(0);
        Self { current }
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    /// 推进到下一回合并返回新回合号
    pub fn advance(&mut self) -> u64 {
        self.current += 1;
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn delta(turn: u64) -> StateDelta {
        StateDelta {
            id: turn as i64,
            turn_number: turn,
            timestamp: Utc::now(),
            entity_type: "scene".into(),
            entity_id: "tavern".into(),
            action: "update".into(),
            value: String::new(),
        }
    }

    #[test]
    fn test_recover_empty_is_zero() {
        assert_eq!(TurnCounter::recover(&[]).current(), 0);
    }

    #[test]
    fn test_recover_takes_max_turn_regardless_of_order() {
        let deltas = vec![delta(3), delta(7), delta(2), delta(7)];
        assert_eq!(TurnCounter::recover(&deltas).current(), 7);
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut counter = TurnCounter::new(4);
        assert_eq!(counter.advance(), 5);
        assert_eq!(counter.advance(), 6);
        assert_eq!(counter.current(), 6);
    }
}
