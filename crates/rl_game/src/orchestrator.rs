//! 游戏编排器
//!
//! 单写者 Actor：所有入站消息经 `flume` 队列进入，阶段、会话与淘汰账本
//! 只在本任务内修改。除等待淘汰上报外，倒计时、绿灯、采集窗口都是可被
//! 操作员中止打断的定时等待。

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::Instrument;

use rl_core::{Player, PlayerId, RedLightError, Result};
use rl_link::protocol::decode_images;
use rl_link::{ConnectionId, Inbound, LinkMessage, LinkSlot, Outgoing, Role};

use crate::config::GameConfig;
use crate::cues::{StageCues, TracingCues};
use crate::frames::{FrameSource, NoFrames};
use crate::phase::GamePhase;
use crate::session::{EndReason, GameSession};

/// 打断一局的原因
#[derive(Debug)]
enum Interrupt {
    /// 操作员中止
    Abort,
    /// 入站队列关闭
    Closed,
    Fault(RedLightError),
}

impl From<RedLightError> for Interrupt {
    fn from(err: RedLightError) -> Self {
        Interrupt::Fault(err)
    }
}

/// 游戏编排器
pub struct Orchestrator {
    config: GameConfig,
    display: LinkSlot,
    vision: LinkSlot,
    inbound: flume::Receiver<Inbound>,
    cues: Arc<dyn StageCues>,
    frames: Box<dyn FrameSource>,
    rng: StdRng,
    session: Option<GameSession>,
    /// 本局名单 (base64 图像)，视觉链路更换时重发
    roster: Vec<String>,
    /// 最近收到名单的视觉连接
    roster_link: Option<ConnectionId>,
    phase_tx: watch::Sender<GamePhase>,
}

impl Orchestrator {
    pub fn new(
        config: GameConfig,
        display: LinkSlot,
        vision: LinkSlot,
        inbound: flume::Receiver<Inbound>,
    ) -> Self {
        let rng = config
            .seed
            .map(StdRng::seed_from_u64)
            .unwrap_or_else(StdRng::from_entropy);
        let (phase_tx, _) = watch::channel(GamePhase::Idle);
        Self {
            config,
            display,
            vision,
            inbound,
            cues: Arc::new(TracingCues),
            frames: Box::new(NoFrames),
            rng,
            session: None,
            roster: Vec::new(),
            roster_link: None,
            phase_tx,
        }
    }

    /// 注入舞台提示实现
    pub fn with_cues(mut self, cues: Arc<dyn StageCues>) -> Self {
        self.cues = cues;
        self
    }

    /// 注入帧来源
    pub fn with_frames(mut self, frames: Box<dyn FrameSource>) -> Self {
        self.frames = frames;
        self
    }

    /// 订阅当前阶段
    pub fn phase_watch(&self) -> watch::Receiver<GamePhase> {
        self.phase_tx.subscribe()
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// 主循环；入站队列关闭时返回
    pub async fn run(mut self) -> Result<()> {
        self.config.validate()?;
        tracing::info!(
            max_players = self.config.max_players,
            max_game_time = ?self.config.max_game_time,
            "Orchestrator started, waiting for players"
        );

        let inbound = self.inbound.clone();
        while let Ok(msg) = inbound.recv_async().await {
            let images = match msg {
                Inbound {
                    role: Role::Display,
                    message: LinkMessage::PlayersInfo(images),
                    ..
                } => images,
                Inbound {
                    role: Role::Vision,
                    message: LinkMessage::EliminatedPlayers(ids),
                    ..
                } => {
                    tracing::warn!(?ids, "Discarding elimination report, no game running");
                    continue;
                }
                other => {
                    tracing::debug!(
                        role = %other.role,
                        kind = other.message.kind().as_str(),
                        "Ignoring message while idle"
                    );
                    continue;
                }
            };

            if let Err(e) = self.register(&images) {
                tracing::warn!("Rejected registration: {}", e);
                continue;
            }
            self.roster = images;
            self.sync_roster().await;

            let span = match &self.session {
                Some(session) => tracing::info_span!("game", session = %session.id()),
                None => tracing::Span::none(),
            };
            let (reason, closed) = match self.play().instrument(span.clone()).await {
                Ok(reason) => (reason, false),
                Err(Interrupt::Abort) => {
                    tracing::info!(parent: &span, "Game aborted by operator");
                    (EndReason::Aborted, false)
                }
                Err(Interrupt::Closed) => (EndReason::Fault, true),
                Err(Interrupt::Fault(e)) => {
                    tracing::error!(parent: &span, "Game fault: {}", e);
                    (EndReason::Fault, false)
                }
            };
            self.finish(reason).instrument(span).await;
            if closed {
                break;
            }
        }

        tracing::info!("Inbound queue closed, orchestrator stopping");
        Ok(())
    }

    /// 校验并登记玩家，创建会话
    fn register(&mut self, images: &[String]) -> Result<()> {
        if images.is_empty() {
            return Err(RedLightError::Protocol(
                "players_info carries no images".to_string(),
            ));
        }
        if images.len() > self.config.max_players as usize {
            return Err(RedLightError::Protocol(format!(
                "{} players exceed the limit of {}",
                images.len(),
                self.config.max_players
            )));
        }

        let players = Player::roster(decode_images(images)?);
        let session = GameSession::new(players, self.config.max_game_time);
        tracing::info!(
            session = %session.id(),
            players = session.num_players(),
            deadline_ms = session.deadline_epoch_ms(),
            "Players registered"
        );
        self.session = Some(session);
        self.publish(GamePhase::Registering);
        Ok(())
    }

    /// 一局的回合循环
    async fn play(&mut self) -> std::result::Result<EndReason, Interrupt> {
        self.advance(GamePhase::RoundCountdown)?;
        let deadline = self.session()?.deadline_epoch_ms();
        self.display.send(LinkMessage::GameEndTime(deadline)).await;
        let countdown = self.config.countdown;
        self.pause(countdown).await?;

        loop {
            self.advance(GamePhase::GreenLight)?;
            let green = self.config.sample_green_light(&mut self.rng);
            tracing::info!(round = self.session()?.round(), duration = ?green, "Green light");
            self.cues.green_light().await;
            self.pause(green).await?;

            self.advance(GamePhase::RedLightCapture)?;
            tracing::info!(round = self.session()?.round(), "Red light");
            self.cues.red_light().await;
            self.capture_round().await?;

            self.advance(GamePhase::AwaitingEliminationReport)?;
            self.await_report().await?;

            self.advance(GamePhase::RoundDecision)?;
            if let Some(reason) = self.session()?.end_reason() {
                return Ok(reason);
            }
        }
    }

    /// 打开回合窗口并转发帧，窗口到期后关闭
    async fn capture_round(&mut self) -> std::result::Result<(), Interrupt> {
        let window = self.config.capture_window;
        let deadline = self.session_mut()?.open_round_window(window)?;
        self.sync_roster().await;
        self.vision.send(LinkMessage::StartVideoStream(true)).await;

        let inbound = self.inbound.clone();
        let mut ticker = tokio::time::interval(self.config.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut forwarded = 0u64;

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => break,
                _ = ticker.tick() => {
                    if let Some(frame) = self.frames.next_frame().await {
                        if self.vision.send(LinkMessage::video_frame(&frame)).await {
                            forwarded += 1;
                        } else {
                            tracing::debug!("Frame dropped, vision link unavailable");
                        }
                    }
                }
                msg = inbound.recv_async() => {
                    let msg = msg.map_err(|_| Interrupt::Closed)?;
                    self.handle_midgame(msg)?;
                }
            }
        }

        self.session_mut()?.close_round_window();
        self.vision.send(LinkMessage::StopVideoStream(true)).await;
        tracing::debug!(forwarded, "Round window closed");
        Ok(())
    }

    /// 当前视觉连接尚未收到本局名单时补发
    async fn sync_roster(&mut self) {
        let Some(current) = self.vision.current().await else {
            tracing::debug!("No vision link, roster not sent");
            return;
        };
        if self.roster_link == Some(current) {
            return;
        }
        let roster = LinkMessage::PlayersInfo(self.roster.clone());
        if self.vision.send_to(current, Outgoing::Message(roster)).await {
            if self.roster_link.is_some() {
                tracing::info!(connection = current, "Roster resent to new vision link");
            }
            self.roster_link = Some(current);
        }
    }

    /// 等待视觉节点上报，超时后按已有结果继续
    async fn await_report(&mut self) -> std::result::Result<(), Interrupt> {
        let inbound = self.inbound.clone();
        let timeout = tokio::time::sleep(self.config.report_timeout);
        tokio::pin!(timeout);

        loop {
            tokio::select! {
                _ = &mut timeout => {
                    tracing::warn!(
                        round = self.session()?.round(),
                        timeout = ?self.config.report_timeout,
                        "Elimination report timed out, continuing"
                    );
                    return Ok(());
                }
                msg = inbound.recv_async() => {
                    match msg.map_err(|_| Interrupt::Closed)? {
                        Inbound {
                            role: Role::Vision,
                            message: LinkMessage::EliminatedPlayers(ids),
                            ..
                        } => {
                            self.apply_report(ids).await?;
                            return Ok(());
                        }
                        other => self.handle_midgame(other)?,
                    }
                }
            }
        }
    }

    /// 合并上报，只把新增淘汰转发给显示端
    async fn apply_report(&mut self, ids: Vec<PlayerId>) -> std::result::Result<(), Interrupt> {
        let session = self.session_mut()?;
        let fresh = session.merge_report(ids.iter().copied());
        tracing::info!(
            round = session.round(),
            reported = ?ids,
            fresh = ?fresh,
            eliminated = ?session.eliminated(),
            "Elimination report merged"
        );
        if !fresh.is_empty() {
            self.display.send(LinkMessage::EliminatedPlayers(fresh)).await;
        }
        Ok(())
    }

    /// 定时等待，期间处理入站消息
    async fn pause(&mut self, duration: Duration) -> std::result::Result<(), Interrupt> {
        let inbound = self.inbound.clone();
        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return Ok(()),
                msg = inbound.recv_async() => {
                    let msg = msg.map_err(|_| Interrupt::Closed)?;
                    self.handle_midgame(msg)?;
                }
            }
        }
    }

    /// 局内收到的非预期消息
    fn handle_midgame(&self, msg: Inbound) -> std::result::Result<(), Interrupt> {
        let phase = *self.phase_tx.borrow();
        match (msg.role, msg.message) {
            (Role::Display, LinkMessage::GameStatus(false)) => return Err(Interrupt::Abort),
            (Role::Display, LinkMessage::GameStatus(true)) => {
                tracing::debug!(phase = %phase, "Game already running");
            }
            (Role::Display, LinkMessage::PlayersInfo(images)) => {
                tracing::warn!(
                    phase = %phase,
                    count = images.len(),
                    "Ignoring registration, game in progress"
                );
            }
            (Role::Vision, LinkMessage::EliminatedPlayers(ids)) => {
                tracing::warn!(phase = %phase, ?ids, "Discarding mistimed elimination report");
            }
            (role, message) => {
                tracing::debug!(
                    phase = %phase,
                    role = %role,
                    kind = message.kind().as_str(),
                    "Ignoring unexpected message"
                );
            }
        }
        Ok(())
    }

    /// 收尾：关闭窗口、通知显示端、回到 `Idle`
    async fn finish(&mut self, reason: EndReason) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        self.roster.clear();
        self.roster_link = None;

        if session.close_round_window() {
            self.vision.send(LinkMessage::StopVideoStream(true)).await;
        }
        if let Err(e) = session.advance(GamePhase::GameOver) {
            tracing::warn!("Forcing game over: {}", e);
        }
        self.publish(GamePhase::GameOver);

        self.display.send(LinkMessage::GameOver(true)).await;
        self.cues.game_over().await;
        tracing::info!(
            reason = reason.as_str(),
            rounds = session.round(),
            eliminated = ?session.eliminated(),
            elapsed = ?session.elapsed(),
            "Game over"
        );

        self.publish(GamePhase::Idle);
    }

    fn advance(&mut self, next: GamePhase) -> std::result::Result<(), Interrupt> {
        self.session_mut()?.advance(next)?;
        self.publish(next);
        Ok(())
    }

    fn publish(&self, phase: GamePhase) {
        tracing::debug!(phase = %phase, "Phase changed");
        self.phase_tx.send_replace(phase);
    }

    fn session(&self) -> std::result::Result<&GameSession, Interrupt> {
        self.session.as_ref().ok_or_else(no_session)
    }

    fn session_mut(&mut self) -> std::result::Result<&mut GameSession, Interrupt> {
        self.session.as_mut().ok_or_else(no_session)
    }
}

fn no_session() -> Interrupt {
    Interrupt::Fault(RedLightError::Protocol("no active session".to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;
    use tokio::time::Instant;

    use super::*;
    use crate::frames::ReplayFrames;

    struct Harness {
        inbound: flume::Sender<Inbound>,
        display_rx: mpsc::UnboundedReceiver<Outgoing>,
        vision_rx: Option<mpsc::UnboundedReceiver<Outgoing>>,
        vision: LinkSlot,
        display_id: ConnectionId,
        vision_id: ConnectionId,
        phase: watch::Receiver<GamePhase>,
        task: JoinHandle<Result<()>>,
    }

    impl Harness {
        async fn start(config: GameConfig) -> Self {
            Self::start_with(config, Box::new(NoFrames), Arc::new(TracingCues)).await
        }

        async fn start_with(
            config: GameConfig,
            frames: Box<dyn FrameSource>,
            cues: Arc<dyn StageCues>,
        ) -> Self {
            let display = LinkSlot::new(Role::Display);
            let vision = LinkSlot::new(Role::Vision);
            let (display_id, display_rx) = display.attach().await;
            let (vision_id, vision_rx) = vision.attach().await;
            let (tx, rx) = flume::unbounded();

            let orchestrator = Orchestrator::new(config, display, vision.clone(), rx)
                .with_frames(frames)
                .with_cues(cues);
            let phase = orchestrator.phase_watch();
            let task = tokio::spawn(orchestrator.run());

            Self {
                inbound: tx,
                display_rx,
                vision_rx: Some(vision_rx),
                vision,
                display_id,
                vision_id,
                phase,
                task,
            }
        }

        async fn from_display(&self, message: LinkMessage) {
            self.inbound
                .send_async(Inbound {
                    role: Role::Display,
                    connection: self.display_id,
                    message,
                })
                .await
                .unwrap();
        }

        async fn from_vision(&self, message: LinkMessage) {
            self.inbound
                .send_async(Inbound {
                    role: Role::Vision,
                    connection: self.vision_id,
                    message,
                })
                .await
                .unwrap();
        }

        /// 模拟视觉节点：每次收到停止采集时按脚本上报
        fn spawn_vision(&mut self, script: Vec<Vec<PlayerId>>) {
            let mut rx = self.vision_rx.take().unwrap();
            let inbound = self.inbound.clone();
            let connection = self.vision_id;
            tokio::spawn(async move {
                let mut rounds = script.into_iter();
                while let Some(out) = rx.recv().await {
                    if let Outgoing::Message(LinkMessage::StopVideoStream(_)) = out {
                        if let Some(ids) = rounds.next() {
                            let _ = inbound
                                .send_async(Inbound {
                                    role: Role::Vision,
                                    connection,
                                    message: LinkMessage::EliminatedPlayers(ids),
                                })
                                .await;
                        }
                    }
                }
            });
        }

        async fn wait_phase(&mut self, phase: GamePhase) {
            self.phase.wait_for(|p| *p == phase).await.unwrap();
        }

        /// 收集显示端消息直到 `game_over`
        async fn display_until_game_over(&mut self) -> Vec<LinkMessage> {
            let collect = async {
                let mut seen = Vec::new();
                while let Some(out) = self.display_rx.recv().await {
                    let Outgoing::Message(msg) = out else { continue };
                    let done = matches!(msg, LinkMessage::GameOver(_));
                    seen.push(msg);
                    if done {
                        break;
                    }
                }
                seen
            };
            tokio::time::timeout(Duration::from_secs(600), collect)
                .await
                .expect("game never ended")
        }

        fn drain_vision(&mut self) -> Vec<LinkMessage> {
            let rx = self.vision_rx.as_mut().unwrap();
            let mut seen = Vec::new();
            while let Ok(out) = rx.try_recv() {
                if let Outgoing::Message(msg) = out {
                    seen.push(msg);
                }
            }
            seen
        }
    }

    fn players(n: u8) -> LinkMessage {
        let images: Vec<Vec<u8>> = (1..=n).map(|i| vec![i]).collect();
        LinkMessage::players_info(&images)
    }

    fn test_config() -> GameConfig {
        GameConfig {
            seed: Some(7),
            ..GameConfig::default()
        }
    }

    fn eliminations(messages: &[LinkMessage]) -> Vec<Vec<PlayerId>> {
        messages
            .iter()
            .filter_map(|msg| match msg {
                LinkMessage::EliminatedPlayers(ids) => Some(ids.clone()),
                _ => None,
            })
            .collect()
    }

    fn count_game_over(messages: &[LinkMessage]) -> usize {
        messages
            .iter()
            .filter(|msg| matches!(msg, LinkMessage::GameOver(_)))
            .count()
    }

    #[derive(Default)]
    struct RecordingCues {
        calls: Mutex<Vec<&'static str>>,
    }

    #[async_trait::async_trait]
    impl StageCues for RecordingCues {
        async fn green_light(&self) {
            self.calls.lock().unwrap().push("green");
        }

        async fn red_light(&self) {
            self.calls.lock().unwrap().push("red");
        }

        async fn game_over(&self) {
            self.calls.lock().unwrap().push("over");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaches_game_over_when_everyone_moves() {
        let started = Instant::now();
        let cues = Arc::new(RecordingCues::default());
        let mut harness =
            Harness::start_with(test_config(), Box::new(NoFrames), cues.clone()).await;
        harness.spawn_vision(vec![vec![1], vec![2], vec![3]]);

        harness.from_display(players(3)).await;
        let display = harness.display_until_game_over().await;

        assert!(matches!(display[0], LinkMessage::GameEndTime(ms) if ms > 0));
        assert_eq!(eliminations(&display), vec![vec![1], vec![2], vec![3]]);
        assert_eq!(count_game_over(&display), 1);
        assert!(started.elapsed() < Duration::from_secs(60));

        harness.wait_phase(GamePhase::Idle).await;
        assert_eq!(
            *cues.calls.lock().unwrap(),
            vec!["green", "red", "green", "red", "green", "red", "over"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_new_eliminations_are_relayed() {
        let mut harness = Harness::start(test_config()).await;
        harness.spawn_vision(vec![vec![2], vec![2, 3], vec![1]]);

        harness.from_display(players(3)).await;
        let display = harness.display_until_game_over().await;

        assert_eq!(eliminations(&display), vec![vec![2], vec![3], vec![1]]);
        assert_eq!(count_game_over(&display), 1);
        assert!(matches!(display.last(), Some(LinkMessage::GameOver(true))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_reports_time_out_and_game_ends_on_time() {
        let started = Instant::now();
        let config = GameConfig {
            report_timeout: Duration::from_secs(2),
            max_game_time: Duration::from_secs(20),
            ..test_config()
        };
        let mut harness = Harness::start(config).await;

        harness.from_display(players(2)).await;
        let display = harness.display_until_game_over().await;
        assert!(eliminations(&display).is_empty());
        assert_eq!(count_game_over(&display), 1);
        assert!(started.elapsed() >= Duration::from_secs(20));

        let controls: Vec<_> = harness
            .drain_vision()
            .into_iter()
            .filter(|msg| {
                matches!(
                    msg,
                    LinkMessage::StartVideoStream(_) | LinkMessage::StopVideoStream(_)
                )
            })
            .collect();
        assert!(controls.len() >= 4);
        for pair in controls.chunks(2) {
            assert_eq!(
                pair,
                [
                    LinkMessage::StartVideoStream(true),
                    LinkMessage::StopVideoStream(true)
                ]
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_during_green_light() {
        let started = Instant::now();
        let mut harness = Harness::start(test_config()).await;

        harness.from_display(players(2)).await;
        harness.wait_phase(GamePhase::GreenLight).await;
        harness.from_display(LinkMessage::GameStatus(false)).await;

        let display = harness.display_until_game_over().await;
        assert!(matches!(display[0], LinkMessage::GameEndTime(_)));
        assert_eq!(display.len(), 2);
        assert!(started.elapsed() < Duration::from_secs(10));

        harness.wait_phase(GamePhase::Idle).await;
        let vision = harness.drain_vision();
        assert!(matches!(vision[0], LinkMessage::PlayersInfo(ref images) if images.len() == 2));
        assert!(!vision
            .iter()
            .any(|msg| matches!(msg, LinkMessage::StartVideoStream(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_during_capture_closes_window() {
        let mut harness = Harness::start(test_config()).await;

        harness.from_display(players(2)).await;
        harness.wait_phase(GamePhase::RedLightCapture).await;
        harness.from_display(LinkMessage::GameStatus(false)).await;

        let display = harness.display_until_game_over().await;
        assert_eq!(count_game_over(&display), 1);

        let vision = harness.drain_vision();
        assert_eq!(
            &vision[1..],
            [
                LinkMessage::StartVideoStream(true),
                LinkMessage::StopVideoStream(true)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_registrations_are_ignored() {
        let mut harness = Harness::start(test_config()).await;
        harness.spawn_vision(vec![vec![1]]);

        harness.from_display(LinkMessage::PlayersInfo(Vec::new())).await;
        harness.from_display(players(5)).await;
        harness
            .from_display(LinkMessage::PlayersInfo(vec!["not base64!".to_string()]))
            .await;
        harness.from_display(LinkMessage::GameStatus(true)).await;
        // 暂停时钟只在编排器空闲后推进
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(harness.inbound.is_empty());
        assert_eq!(*harness.phase.borrow(), GamePhase::Idle);
        assert!(harness.display_rx.try_recv().is_err());

        harness.from_display(players(1)).await;
        let display = harness.display_until_game_over().await;
        assert!(matches!(display[0], LinkMessage::GameEndTime(_)));
        assert_eq!(eliminations(&display), vec![vec![1]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mistimed_report_is_discarded() {
        let mut harness = Harness::start(test_config()).await;
        harness.from_vision(LinkMessage::EliminatedPlayers(vec![1])).await;
        harness.spawn_vision(vec![vec![2], vec![1]]);

        harness.from_display(players(2)).await;
        harness.wait_phase(GamePhase::GreenLight).await;
        harness.from_vision(LinkMessage::EliminatedPlayers(vec![1])).await;

        let display = harness.display_until_game_over().await;
        assert_eq!(eliminations(&display), vec![vec![2], vec![1]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_report_dropped_and_repeated_next_round() {
        let config = GameConfig {
            report_timeout: Duration::from_secs(2),
            ..test_config()
        };
        let mut harness = Harness::start(config).await;
        let mut rx = harness.vision_rx.take().unwrap();
        let inbound = harness.inbound.clone();
        let connection = harness.vision_id;
        tokio::spawn(async move {
            let mut round = 0;
            while let Some(out) = rx.recv().await {
                let Outgoing::Message(LinkMessage::StopVideoStream(_)) = out else {
                    continue;
                };
                round += 1;
                let ids = match round {
                    1 => {
                        // 超过上报等待时间才送达
                        tokio::time::sleep(Duration::from_secs(3)).await;
                        vec![2]
                    }
                    2 => vec![2],
                    _ => vec![1],
                };
                let _ = inbound
                    .send_async(Inbound {
                        role: Role::Vision,
                        connection,
                        message: LinkMessage::EliminatedPlayers(ids),
                    })
                    .await;
            }
        });

        harness.from_display(players(2)).await;
        let display = harness.display_until_game_over().await;
        assert_eq!(eliminations(&display), vec![vec![2], vec![1]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_roster_resent_to_new_vision_link() {
        let mut harness = Harness::start(test_config()).await;

        harness.from_display(players(2)).await;
        harness.wait_phase(GamePhase::GreenLight).await;
        let (_, mut late_rx) = harness.vision.attach().await;

        let mut seen = Vec::new();
        while seen.len() < 4 {
            let out = tokio::time::timeout(Duration::from_secs(60), late_rx.recv())
                .await
                .expect("vision link starved")
                .unwrap();
            if let Outgoing::Message(msg) = out {
                if !matches!(msg, LinkMessage::VideoFrame(_)) {
                    seen.push(msg);
                }
            }
        }
        assert!(matches!(seen[0], LinkMessage::PlayersInfo(ref images) if images.len() == 2));
        assert_eq!(
            &seen[1..],
            [
                LinkMessage::StartVideoStream(true),
                LinkMessage::StopVideoStream(true),
                LinkMessage::StartVideoStream(true)
            ]
        );

        harness.from_display(LinkMessage::GameStatus(false)).await;
        let display = harness.display_until_game_over().await;
        assert_eq!(count_game_over(&display), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_forwarded_only_inside_window() {
        let config = GameConfig {
            capture_window: Duration::from_secs(1),
            report_timeout: Duration::from_secs(1),
            max_game_time: Duration::from_secs(1),
            ..test_config()
        };
        let frames = ReplayFrames::new(vec![vec![1, 2, 3], vec![4, 5, 6]]);
        let mut harness =
            Harness::start_with(config, Box::new(frames), Arc::new(TracingCues)).await;

        harness.from_display(players(1)).await;
        harness.display_until_game_over().await;

        let vision = harness.drain_vision();
        let start = vision
            .iter()
            .position(|msg| matches!(msg, LinkMessage::StartVideoStream(_)))
            .unwrap();
        let stop = vision
            .iter()
            .position(|msg| matches!(msg, LinkMessage::StopVideoStream(_)))
            .unwrap();
        let frame_positions: Vec<_> = vision
            .iter()
            .enumerate()
            .filter(|(_, msg)| matches!(msg, LinkMessage::VideoFrame(_)))
            .map(|(i, _)| i)
            .collect();

        assert!(!frame_positions.is_empty());
        assert!(frame_positions.iter().all(|&i| start < i && i < stop));
        assert_eq!(vision[start + 1], LinkMessage::video_frame(&[1, 2, 3]));
    }

    #[tokio::test]
    async fn test_run_returns_when_inbound_closes() {
        let harness = Harness::start(test_config()).await;
        let Harness { inbound, task, .. } = harness;
        drop(inbound);
        tokio_test::assert_ok!(task.await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let config = GameConfig {
            max_players: 0,
            ..GameConfig::default()
        };
        let harness = Harness::start(config).await;
        assert!(matches!(
            harness.task.await.unwrap(),
            Err(RedLightError::Config(_))
        ));
    }
}
