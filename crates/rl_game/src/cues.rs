//! 舞台提示 (舵机转头、歌曲播放)
//!
//! 硬件由外部实现注入，编排器只依赖该特征。

use async_trait::async_trait;

/// 舞台提示特征
#[async_trait]
pub trait StageCues: Send + Sync {
    /// 绿灯：转身背对玩家，播放歌曲
    async fn green_light(&self);

    /// 红灯：转向玩家
    async fn red_light(&self);

    /// 本局结束
    async fn game_over(&self);
}

/// 仅记录日志的提示实现
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCues;

#[async_trait]
impl StageCues for TracingCues {
    async fn green_light(&self) {
        tracing::info!("Cue: turning away, playing song");
    }

    async fn red_light(&self) {
        tracing::info!("Cue: turning head around");
    }

    async fn game_over(&self) {
        tracing::info!("Cue: game over");
    }
}
