//! 游戏会话
//!
//! 会话由编排器独占。`eliminated` 只增不减，且始终是 `1..=num_players` 的子集。

use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use rl_core::{EliminationLedger, Player, PlayerId, RedLightError, Result};

use crate::phase::GamePhase;

/// 结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// 全员淘汰
    AllEliminated,
    /// 超过单局最长时间
    TimeUp,
    /// 操作员中止
    Aborted,
    /// 内部故障
    Fault,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllEliminated => "all_eliminated",
            Self::TimeUp => "time_up",
            Self::Aborted => "aborted",
            Self::Fault => "fault",
        }
    }
}

/// 游戏会话
#[derive(Debug)]
pub struct GameSession {
    /// 会话 ID
    id: Uuid,
    /// 当前阶段
    phase: GamePhase,
    /// 注册玩家 (人数在本局内不可变)
    players: Vec<Player>,
    /// 淘汰账本
    ledger: EliminationLedger,
    /// 开始时间
    started_at: Instant,
    /// 单局最长时间
    max_game_time: Duration,
    /// 结束时间 (Unix 毫秒，发给显示端)
    deadline_epoch_ms: i64,
    /// 当前回合 (从 1 开始)
    round: u32,
    /// 打开中的回合窗口的截止时间
    round_deadline: Option<Instant>,
}

impl GameSession {
    /// 创建新会话，初始阶段为 `Registering`
    pub fn new(players: Vec<Player>, max_game_time: Duration) -> Self {
        let num_players = players.len() as u32;
        let deadline_epoch_ms =
            chrono::Utc::now().timestamp_millis() + max_game_time.as_millis() as i64;
        Self {
            id: Uuid::new_v4(),
            phase: GamePhase::Registering,
            players,
            ledger: EliminationLedger::new(num_players),
            started_at: Instant::now(),
            max_game_time,
            deadline_epoch_ms,
            round: 0,
            round_deadline: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn num_players(&self) -> u32 {
        self.ledger.num_players()
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn deadline_epoch_ms(&self) -> i64 {
        self.deadline_epoch_ms
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// 阶段跳转
    pub fn advance(&mut self, next: GamePhase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(RedLightError::InvalidTransition {
                from: self.phase.as_str(),
                to: next.as_str(),
            });
        }
        if next == GamePhase::GreenLight {
            self.round += 1;
        }
        self.phase = next;
        Ok(())
    }

    /// 打开回合窗口并返回截止时间；同一时刻只允许一个
    pub fn open_round_window(&mut self, window: Duration) -> Result<Instant> {
        if self.round_deadline.is_some() {
            return Err(RedLightError::Protocol(format!(
                "round window already open in round {}",
                self.round
            )));
        }
        let deadline = Instant::now() + window;
        self.round_deadline = Some(deadline);
        Ok(deadline)
    }

    /// 关闭回合窗口，返回之前是否打开
    pub fn close_round_window(&mut self) -> bool {
        self.round_deadline.take().is_some()
    }

    pub fn is_window_open(&self) -> bool {
        self.round_deadline.is_some()
    }

    pub fn round_deadline(&self) -> Option<Instant> {
        self.round_deadline
    }

    /// 合并淘汰上报，返回新增的玩家
    pub fn merge_report<I>(&mut self, ids: I) -> Vec<PlayerId>
    where
        I: IntoIterator<Item = PlayerId>,
    {
        self.ledger.merge(ids)
    }

    /// 已淘汰玩家 (升序)
    pub fn eliminated(&self) -> Vec<PlayerId> {
        self.ledger.eliminated()
    }

    /// 结束条件
    pub fn end_reason(&self) -> Option<EndReason> {
        if self.ledger.is_complete() {
            Some(EndReason::AllEliminated)
        } else if self.elapsed() >= self.max_game_time {
            Some(EndReason::TimeUp)
        } else {
            None
        }
    }
}
