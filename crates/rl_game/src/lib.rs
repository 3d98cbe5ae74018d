//! # rl_game - RedLight Game Orchestrator
//!
//! 游戏编排层：权威阶段状态机、回合窗口、与显示端/视觉节点的同步协议。

pub mod config;
pub mod cues;
pub mod frames;
pub mod orchestrator;
pub mod phase;
pub mod session;

pub use config::GameConfig;
pub use cues::{StageCues, TracingCues};
pub use frames::{FrameSource, NoFrames, ReplayFrames};
pub use orchestrator::Orchestrator;
pub use phase::GamePhase;
pub use session::{EndReason, GameSession};
