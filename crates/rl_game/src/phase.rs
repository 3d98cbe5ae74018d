//! 游戏阶段状态机
//!
//! `Idle → Registering → RoundCountdown → GreenLight → RedLightCapture
//!  → AwaitingEliminationReport → RoundDecision → {GreenLight | GameOver}`
//!
//! 操作员中止时任一局内阶段可直接进入 `GameOver`。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 游戏阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// 无会话，等待注册
    Idle,
    /// 已收到玩家图像，会话已创建
    Registering,
    /// 首回合前倒计时
    RoundCountdown,
    /// 允许移动
    GreenLight,
    /// 回合窗口打开，转发视频帧
    RedLightCapture,
    /// 等待视觉节点上报淘汰 (唯一的挂起点)
    AwaitingEliminationReport,
    /// 判定是否结束
    RoundDecision,
    /// 终止
    GameOver,
}

impl GamePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            GamePhase::Idle => "idle",
            GamePhase::Registering => "registering",
            GamePhase::RoundCountdown => "round_countdown",
            GamePhase::GreenLight => "green_light",
            GamePhase::RedLightCapture => "red_light_capture",
            GamePhase::AwaitingEliminationReport => "awaiting_elimination_report",
            GamePhase::RoundDecision => "round_decision",
            GamePhase::GameOver => "game_over",
        }
    }

    /// 是否处于一局之中
    pub fn in_game(&self) -> bool {
        !matches!(self, GamePhase::Idle | GamePhase::GameOver)
    }

    /// 是否允许跳转到 `next`
    pub fn can_transition_to(&self, next: GamePhase) -> bool {
        use GamePhase::*;
        match (self, next) {
            (Idle, Registering)
            | (Registering, RoundCountdown)
            | (RoundCountdown, GreenLight)
            | (GreenLight, RedLightCapture)
            | (RedLightCapture, AwaitingEliminationReport)
            | (AwaitingEliminationReport, RoundDecision)
            | (RoundDecision, GreenLight)
            | (GameOver, Idle) => true,
            (current, GameOver) => current.in_game(),
            _ => false,
        }
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
