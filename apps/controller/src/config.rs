//! 主控节点配置
//!
//! 环境变量覆盖默认值：`RPI_IP`、`BACKEND_PORT` (视觉节点)、`MOBILE_APP_PORT`
//! (显示端)，以及 `RL_*` 计时参数。

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rl_core::{RedLightError, Result};
use rl_game::GameConfig;

/// 视觉节点端口默认值
pub const DEFAULT_BACKEND_PORT: u16 = 8765;
/// 显示端端口默认值
pub const DEFAULT_MOBILE_APP_PORT: u16 = 8766;

/// 主控节点配置
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// 监听 IP
    pub bind_ip: IpAddr,
    /// 视觉节点端点端口
    pub backend_port: u16,
    /// 显示端端点端口
    pub mobile_app_port: u16,
    /// 游戏参数
    pub game: GameConfig,
    /// 回放帧目录
    pub frames_dir: Option<PathBuf>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            backend_port: DEFAULT_BACKEND_PORT,
            mobile_app_port: DEFAULT_MOBILE_APP_PORT,
            game: GameConfig::default(),
            frames_dir: None,
        }
    }
}

impl ControllerConfig {
    /// 从进程环境读取
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源读取
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ip) = parse(&lookup, "RPI_IP")? {
            config.bind_ip = ip;
        }
        if let Some(port) = parse(&lookup, "BACKEND_PORT")? {
            config.backend_port = port;
        }
        if let Some(port) = parse(&lookup, "MOBILE_APP_PORT")? {
            config.mobile_app_port = port;
        }
        if config.backend_port == config.mobile_app_port {
            return Err(RedLightError::Config(format!(
                "BACKEND_PORT and MOBILE_APP_PORT must differ (both {})",
                config.backend_port
            )));
        }

        let game = &mut config.game;
        if let Some(secs) = parse(&lookup, "RL_COUNTDOWN_SECS")? {
            game.countdown = Duration::from_secs(secs);
        }
        if let Some(ms) = parse(&lookup, "RL_GREEN_MIN_MS")? {
            game.green_light_min = Duration::from_millis(ms);
        }
        if let Some(ms) = parse(&lookup, "RL_GREEN_MAX_MS")? {
            game.green_light_max = Duration::from_millis(ms);
        }
        if let Some(secs) = parse(&lookup, "RL_CAPTURE_SECS")? {
            game.capture_window = Duration::from_secs(secs);
        }
        if let Some(ms) = parse(&lookup, "RL_FRAME_INTERVAL_MS")? {
            game.frame_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = parse(&lookup, "RL_REPORT_TIMEOUT_SECS")? {
            game.report_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse(&lookup, "RL_MAX_GAME_SECS")? {
            game.max_game_time = Duration::from_secs(secs);
        }
        if let Some(max) = parse(&lookup, "RL_MAX_PLAYERS")? {
            game.max_players = max;
        }
        game.seed = parse(&lookup, "RL_SEED")?;
        game.validate()?;

        config.frames_dir = lookup("RL_FRAMES_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);

        Ok(config)
    }

    /// 视觉节点端点地址
    pub fn backend_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.backend_port)
    }

    /// 显示端端点地址
    pub fn mobile_app_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.mobile_app_port)
    }
}

fn parse<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| RedLightError::Config(format!("{}={:?}: {}", key, raw, e))),
    }
}
