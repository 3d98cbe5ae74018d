//! 视觉节点配置

use std::str::FromStr;
use std::time::Duration;

use rl_core::{RedLightError, Result};
use rl_link::LinkClientConfig;
use rl_vision::attribution::DEFAULT_MATCH_THRESHOLD;
use rl_vision::{AttributionPolicy, DiffConfig};

/// 视觉节点配置
#[derive(Debug, Clone, Default)]
pub struct VisionConfig {
    pub client: LinkClientConfig,
    pub diff: DiffConfig,
    pub policy: AttributionPolicy,
}

impl VisionConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `CONTROLLER_URL` 优先，否则由 `RPI_IP` 与 `BACKEND_PORT` 拼出地址
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("CONTROLLER_URL") {
            config.client.server_url = url;
        } else if let Some(ip) = lookup("RPI_IP") {
            let port: u16 = parse(&lookup, "BACKEND_PORT")?.unwrap_or(8765);
            config.client.server_url = format!("ws://{}:{}/", ip.trim(), port);
        }
        if !config.client.server_url.starts_with("ws://")
            && !config.client.server_url.starts_with("wss://")
        {
            return Err(RedLightError::Config(format!(
                "controller url must be ws:// or wss://, got {}",
                config.client.server_url
            )));
        }
        if let Some(attempts) = parse(&lookup, "RL_CONNECT_RETRIES")? {
            config.client.retry_attempts = attempts;
        }
        if let Some(secs) = parse(&lookup, "RL_CONNECT_DELAY_SECS")? {
            config.client.retry_delay = Duration::from_secs(secs);
        }

        if let Some(threshold) = parse(&lookup, "RL_DIFF_THRESHOLD")? {
            config.diff.threshold = threshold;
        }
        if let Some(area) = parse(&lookup, "RL_MIN_AREA")? {
            config.diff.min_area = area;
        }
        if let Some(frames) = parse::<u32, _>(&lookup, "RL_FRAMES_TO_PERSIST")? {
            if frames == 0 {
                return Err(RedLightError::Config(
                    "RL_FRAMES_TO_PERSIST must be positive".to_string(),
                ));
            }
            config.diff.frames_to_persist = frames;
        }

        let threshold = parse(&lookup, "RL_MATCH_THRESHOLD")?.unwrap_or(DEFAULT_MATCH_THRESHOLD);
        config.policy = match lookup("RL_ATTRIBUTION").as_deref().map(str::trim) {
            None | Some("lanes") => AttributionPolicy::Lanes,
            Some("template") => AttributionPolicy::Template { threshold },
            Some(other) => {
                return Err(RedLightError::Config(format!(
                    "RL_ATTRIBUTION must be 'lanes' or 'template', got {:?}",
                    other
                )))
            }
        };

        Ok(config)
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
