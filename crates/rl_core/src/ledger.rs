//! 淘汰账本
//!
//! 同一回合内多帧可能把运动归属到同一玩家，只有第一次计数。
//! 账本只增不减：玩家一旦被淘汰就不会被移除。

use std::collections::BTreeSet;

use crate::player::PlayerId;

/// 淘汰账本
#[derive(Debug, Clone, Default)]
pub struct EliminationLedger {
    /// 本局玩家数 (合法 ID 为 1..=num_players)
    num_players: u32,
    /// 已淘汰玩家 (有序，保证输出稳定)
    eliminated: BTreeSet<PlayerId>,
}

impl EliminationLedger {
    /// 创建新账本
    pub fn new(num_players: u32) -> Self {
        Self {
            num_players,
            eliminated: BTreeSet::new(),
        }
    }

    /// 记录淘汰
    ///
    /// 首次淘汰返回 `true`；已淘汰或 ID 越界返回 `false` 且不记录。
    pub fn record_if_new(&mut self, player_id: PlayerId) -> bool {
        if !self.in_range(player_id) {
            tracing::debug!(
                player_id,
                num_players = self.num_players,
                "Ignoring out-of-range elimination"
            );
            return false;
        }
        self.eliminated.insert(player_id)
    }

    /// 批量合并，返回本次新增的玩家 (按输入顺序)
    pub fn merge<I>(&mut self, ids: I) -> Vec<PlayerId>
    where
        I: IntoIterator<Item = PlayerId>,
    {
        ids.into_iter()
            .filter(|&id| self.record_if_new(id))
            .collect()
    }

    /// ID 是否在 1..=num_players 内
    pub fn in_range(&self, player_id: PlayerId) -> bool {
        player_id >= 1 && player_id <= self.num_players
    }

    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.eliminated.contains(&player_id)
    }

    /// 已淘汰人数
    pub fn len(&self) -> usize {
        self.eliminated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eliminated.is_empty()
    }

    pub fn num_players(&self) -> u32 {
        self.num_players
    }

    /// 全员淘汰
    pub fn is_complete(&self) -> bool {
        self.num_players > 0 && self.eliminated.len() >= self.num_players as usize
    }

    /// 已淘汰玩家 (升序)
    pub fn eliminated(&self) -> Vec<PlayerId> {
        self.eliminated.iter().copied().collect()
    }
}
