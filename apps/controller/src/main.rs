//! RedLight Controller - 主控节点
//!
//! 两个 WebSocket 端点 (显示端、视觉节点) + 阶段编排器。

mod config;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rl_game::{Orchestrator, ReplayFrames};
use rl_link::{LinkServer, LinkServerConfig, LinkSlot, Role};

use crate::config::ControllerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "redlight_controller=debug,rl_game=debug,rl_link=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("RedLight Controller starting...");

    let config = ControllerConfig::from_env()?;

    // 单写者入站队列
    let (inbound_tx, inbound_rx) = flume::unbounded();

    let display = LinkSlot::new(Role::Display);
    let vision = LinkSlot::new(Role::Vision);
    let display_server = LinkServer::new(
        LinkServerConfig::new(config.mobile_app_addr(), Role::Display),
        display.clone(),
        inbound_tx.clone(),
    );
    let vision_server = LinkServer::new(
        LinkServerConfig::new(config.backend_addr(), Role::Vision),
        vision.clone(),
        inbound_tx,
    );
    tracing::info!("Display endpoint configured on ws://{}", display_server.config().addr);
    tracing::info!("Vision endpoint configured on ws://{}", vision_server.config().addr);

    let mut orchestrator = Orchestrator::new(config.game.clone(), display, vision, inbound_rx);
    if let Some(dir) = &config.frames_dir {
        orchestrator = orchestrator.with_frames(Box::new(ReplayFrames::from_dir(dir)?));
    } else {
        tracing::warn!("RL_FRAMES_DIR not set, no frames will be forwarded");
    }

    tracing::info!("RedLight Controller is ready!");
    tracing::info!("Press Ctrl+C to shutdown...");

    tokio::select! {
        res = display_server.start() => res?,
        res = vision_server.start() => res?,
        res = orchestrator.run() => res?,
        res = tokio::signal::ctrl_c() => {
            res?;
            tracing::info!("Shutting down...");
        }
    }

    Ok(())
}
