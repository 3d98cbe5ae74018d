//! 游戏配置

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use rl_core::{RedLightError, Result};

/// 游戏配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// 首回合前的倒计时
    pub countdown: Duration,
    /// 绿灯最短时长
    pub green_light_min: Duration,
    /// 绿灯最长时长
    pub green_light_max: Duration,
    /// 红灯采集窗口
    pub capture_window: Duration,
    /// 帧转发间隔 (约 30 FPS)
    pub frame_interval: Duration,
    /// 等待淘汰上报的超时
    pub report_timeout: Duration,
    /// 单局最长时间
    pub max_game_time: Duration,
    /// 最多玩家数
    pub max_players: u32,
    /// 随机种子，`None` 时取系统熵
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            countdown: Duration::from_secs(5),
            green_light_min: Duration::from_millis(1000),
            green_light_max: Duration::from_millis(1750),
            capture_window: Duration::from_secs(5),
            frame_interval: Duration::from_millis(33),
            report_timeout: Duration::from_secs(10),
            max_game_time: Duration::from_secs(60),
            max_players: 4,
            seed: None,
        }
    }
}

impl GameConfig {
    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.green_light_min > self.green_light_max {
            return Err(RedLightError::Config(format!(
                "green light range is empty: {:?} > {:?}",
                self.green_light_min, self.green_light_max
            )));
        }
        if self.frame_interval.is_zero() {
            return Err(RedLightError::Config("frame interval must be positive".to_string()));
        }
        if self.max_players == 0 {
            return Err(RedLightError::Config("max players must be positive".to_string()));
        }
        Ok(())
    }

    /// 每回合重新采样绿灯时长
    pub fn sample_green_light<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let (min, max) = (self.green_light_min, self.green_light_max);
        if max <= min {
            return min;
        }
        Duration::from_secs_f64(rng.gen_range(min.as_secs_f64()..=max.as_secs_f64()))
    }
}
