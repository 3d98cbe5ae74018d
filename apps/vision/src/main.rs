//! RedLight Vision - 视觉节点
//!
//! 连接主控节点，在回合窗口内做帧差分并上报淘汰。

mod config;
mod worker;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rl_core::RedLightError;
use rl_link::LinkClient;

use crate::config::VisionConfig;
use crate::worker::VisionWorker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "redlight_vision=debug,rl_vision=info,rl_link=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("RedLight Vision starting...");

    let config = VisionConfig::from_env()?;
    tracing::info!(
        url = %config.client.server_url,
        policy = ?config.policy,
        "Vision worker configured"
    );

    let mut worker = VisionWorker::new(config.diff.clone(), config.policy.clone());
    let mut client = LinkClient::connect(config.client.clone()).await?;

    tracing::info!("RedLight Vision is ready!");

    loop {
        tokio::select! {
            msg = client.recv() => match msg {
                Some(Ok(msg)) => {
                    if let Some(reply) = worker.handle(msg) {
                        client.send(&reply).await?;
                    }
                }
                Some(Err(RedLightError::Link(e))) => {
                    tracing::error!("Link failed: {}", e);
                    break;
                }
                Some(Err(e)) => tracing::warn!("Discarding message: {}", e),
                None => {
                    tracing::info!("Controller closed the connection");
                    break;
                }
            },
            res = tokio::signal::ctrl_c() => {
                res?;
                tracing::info!("Shutting down...");
                client.close().await;
                break;
            }
        }
    }

    Ok(())
}
