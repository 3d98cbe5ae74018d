//! 帧来源
//!
//! 摄像头采集与编码在外部完成，编排器只转发编码后的帧。

use std::path::Path;

use async_trait::async_trait;

use rl_core::{RedLightError, Result};

/// 帧来源特征
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// 下一帧编码图像；暂时没有帧时返回 `None`
    async fn next_frame(&mut self) -> Option<Vec<u8>>;
}

/// 不产生任何帧
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFrames;

#[async_trait]
impl FrameSource for NoFrames {
    async fn next_frame(&mut self) -> Option<Vec<u8>> {
        None
    }
}

/// 循环回放预载的帧
#[derive(Debug, Clone)]
pub struct ReplayFrames {
    frames: Vec<Vec<u8>>,
    cursor: usize,
}

impl ReplayFrames {
    pub fn new(frames: Vec<Vec<u8>>) -> Self {
        Self { frames, cursor: 0 }
    }

    /// 按文件名顺序加载目录中的 JPEG/PNG 文件
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let mut paths: Vec<_> = std::fs::read_dir(dir.as_ref())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| {
                        matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png")
                    })
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        let frames = paths
            .iter()
            .map(std::fs::read)
            .collect::<std::io::Result<Vec<_>>>()?;
        if frames.is_empty() {
            return Err(RedLightError::Config(format!(
                "no frames found in {}",
                dir.as_ref().display()
            )));
        }
        tracing::info!(count = frames.len(), dir = %dir.as_ref().display(), "Loaded replay frames");
        Ok(Self::new(frames))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[async_trait]
impl FrameSource for ReplayFrames {
    async fn next_frame(&mut self) -> Option<Vec<u8>> {
        if self.frames.is_empty() {
            return None;
        }
        let frame = self.frames[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.frames.len();
        Some(frame)
    }
}
