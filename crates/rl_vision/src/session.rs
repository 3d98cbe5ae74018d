//! 视觉会话
//!
//! 持有回合窗口状态、基准帧 (经由差分器) 与本回合淘汰账本。
//! 只有淘汰结果以值的形式离开本会话；跨回合去重由接收方负责。

use rl_core::{EliminationLedger, Player, PlayerId, Result};

use crate::attribution::{AttributionPolicy, RegionAttributor};
use crate::delta_diff::{DiffConfig, FrameDifferencer};
use crate::frame::GrayFrame;

/// 视觉会话
pub struct VisionSession {
    /// 差分器
    differencer: FrameDifferencer,
    /// 归属策略
    policy: AttributionPolicy,
    /// 归属器 (注册玩家后构建)
    attributor: Option<Box<dyn RegionAttributor>>,
    /// 本回合淘汰账本，每次打开窗口时清空
    ledger: EliminationLedger,
    /// 当前回合新增淘汰，停止时一次性上报
    pending: Vec<PlayerId>,
    /// 回合窗口是否打开
    window_open: bool,
    /// 当前窗口已处理帧数
    frames_in_window: u64,
}

impl VisionSession {
    /// 创建新会话
    pub fn new(diff_config: DiffConfig, policy: AttributionPolicy) -> Self {
        Self {
            differencer: FrameDifferencer::new(diff_config),
            policy,
            attributor: None,
            ledger: EliminationLedger::default(),
            pending: Vec::new(),
            window_open: false,
            frames_in_window: 0,
        }
    }

    /// 注册玩家，开始新的一局
    pub fn register_players(&mut self, players: &[Player]) -> Result<usize> {
        let attributor = self.policy.build(players)?;
        tracing::info!(
            players = players.len(),
            policy = attributor.name(),
            "Players registered for vision session"
        );
        self.attributor = Some(attributor);
        self.ledger = EliminationLedger::new(players.len() as u32);
        self.pending.clear();
        self.window_open = false;
        self.differencer.reset();
        Ok(players.len())
    }

    /// 打开回合窗口
    pub fn start(&mut self) {
        if self.window_open {
            tracing::warn!("Round window already open, ignoring start");
            return;
        }
        self.ledger = EliminationLedger::new(self.ledger.num_players());
        self.pending.clear();
        self.differencer.reset();
        self.frames_in_window = 0;
        self.window_open = true;
        tracing::info!("Round window opened");
    }

    /// 关闭回合窗口并取出本回合淘汰
    ///
    /// 窗口未打开时返回 `None`。
    pub fn stop(&mut self) -> Option<Vec<PlayerId>> {
        if !self.window_open {
            tracing::debug!("Stop received with no open round window");
            return None;
        }
        self.window_open = false;
        let eliminated = std::mem::take(&mut self.pending);
        tracing::info!(
            frames = self.frames_in_window,
            ?eliminated,
            "Round window closed"
        );
        Some(eliminated)
    }

    /// 处理一帧编码后的图像，返回本帧新增淘汰
    pub fn ingest_frame(&mut self, bytes: &[u8]) -> Result<Vec<PlayerId>> {
        if !self.window_open {
            tracing::debug!("Dropping frame outside round window");
            return Ok(Vec::new());
        }
        let frame = GrayFrame::decode(bytes)?;
        Ok(self.ingest_gray(&frame))
    }

    /// 处理一帧灰度图，返回本帧新增淘汰
    pub fn ingest_gray(&mut self, frame: &GrayFrame) -> Vec<PlayerId> {
        if !self.window_open {
            return Vec::new();
        }
        self.frames_in_window += 1;

        let regions = self.differencer.process_frame(frame);
        let Some(attributor) = &self.attributor else {
            if !regions.is_empty() {
                tracing::debug!(regions = regions.len(), "Motion with no registered players");
            }
            return Vec::new();
        };

        let mut newly = Vec::new();
        for region in &regions {
            let Some(player_id) = attributor.attribute(region, frame) else {
                continue;
            };
            if self.ledger.record_if_new(player_id) {
                tracing::info!(player_id, ?region, "Player eliminated");
                self.pending.push(player_id);
                newly.push(player_id);
            }
        }
        newly
    }

    pub fn is_window_open(&self) -> bool {
        self.window_open
    }

    pub fn num_players(&self) -> u32 {
        self.ledger.num_players()
    }

    /// 本回合 (或上一回合) 已淘汰玩家
    pub fn eliminated(&self) -> Vec<PlayerId> {
        self.ledger.eliminated()
    }
}

impl Default for VisionSession {
    fn default() -> Self {
        Self::new(DiffConfig::default(), AttributionPolicy::default())
    }
}
