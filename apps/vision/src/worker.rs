//! 视觉工作者
//!
//! 把主控节点的控制消息映射到 `VisionSession`，停止采集时生成淘汰上报。

use rl_core::{Player, Result};
use rl_link::protocol::{decode_base64, decode_images};
use rl_link::LinkMessage;
use rl_vision::{AttributionPolicy, DiffConfig, VisionSession};

/// 视觉工作者
pub struct VisionWorker {
    session: VisionSession,
    frames: u64,
}

impl VisionWorker {
    pub fn new(diff: DiffConfig, policy: AttributionPolicy) -> Self {
        Self {
            session: VisionSession::new(diff, policy),
            frames: 0,
        }
    }

    /// 处理一条消息，需要回复时返回回复
    pub fn handle(&mut self, msg: LinkMessage) -> Option<LinkMessage> {
        match msg {
            LinkMessage::PlayersInfo(images) => {
                if let Err(e) = self.register(&images) {
                    tracing::warn!("Registration failed: {}", e);
                }
                None
            }
            LinkMessage::StartVideoStream(_) => {
                self.frames = 0;
                self.session.start();
                None
            }
            LinkMessage::StopVideoStream(_) => {
                // 窗口未打开时回复空列表
                let eliminated = self.session.stop().unwrap_or_default();
                tracing::info!(frames = self.frames, ?eliminated, "Reporting eliminations");
                Some(LinkMessage::EliminatedPlayers(eliminated))
            }
            LinkMessage::VideoFrame(data) => {
                if let Err(e) = self.ingest(&data) {
                    tracing::warn!("Dropping undecodable frame: {}", e);
                }
                None
            }
            other => {
                tracing::debug!(kind = other.kind().as_str(), "Ignoring message");
                None
            }
        }
    }

    fn register(&mut self, images: &[String]) -> Result<usize> {
        let players = Player::roster(decode_images(images)?);
        self.session.register_players(&players)
    }

    fn ingest(&mut self, data: &str) -> Result<()> {
        if !self.session.is_window_open() {
            tracing::debug!("Frame outside round window dropped");
            return Ok(());
        }
        self.frames += 1;
        let newly = self.session.ingest_frame(&decode_base64(data)?)?;
        if !newly.is_empty() {
            tracing::debug!(frame = self.frames, ?newly, "Motion attributed");
        }
        Ok(())
    }

    pub fn session(&self) -> &VisionSession {
        &self.session
    }
}
