//! # rl_core - RedLight Core Primitives
//!
//! 核心原语层，定义玩家身份、淘汰账本、全局错误处理机制。
//! 此 crate 是整个项目的基础依赖，不依赖其他业务 crate。

pub mod error;
pub mod ledger;
pub mod player;

pub use error::{RedLightError, Result};
pub use ledger::EliminationLedger;
pub use player::{Player, PlayerId};
