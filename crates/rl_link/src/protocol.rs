//! 链路协议定义
//!
//! 线上格式为 `{"type": <string>, "data": <value>}`，入站同时接受 `payload` 键。

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use rl_core::{PlayerId, RedLightError, Result};

/// 原始信封
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// 消息类型
    #[serde(rename = "type")]
    pub kind: String,
    /// 载荷
    #[serde(default, alias = "payload")]
    pub data: serde_json::Value,
}

/// 链路消息类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    PlayersInfo,
    StartVideoStream,
    StopVideoStream,
    VideoFrame,
    EliminatedPlayers,
    GameEndTime,
    GameOver,
    GameStatus,
}

impl MessageType {
    /// 线上名称
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::PlayersInfo => "players_info",
            MessageType::StartVideoStream => "start_video_stream",
            MessageType::StopVideoStream => "stop_video_stream",
            MessageType::VideoFrame => "video_frame",
            MessageType::EliminatedPlayers => "eliminated_players",
            MessageType::GameEndTime => "game_end_time",
            MessageType::GameOver => "game_over",
            MessageType::GameStatus => "game_status",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let kind = match name {
            "players_info" => MessageType::PlayersInfo,
            "start_video_stream" => MessageType::StartVideoStream,
            "stop_video_stream" => MessageType::StopVideoStream,
            "video_frame" => MessageType::VideoFrame,
            "eliminated_players" => MessageType::EliminatedPlayers,
            "game_end_time" => MessageType::GameEndTime,
            "game_over" => MessageType::GameOver,
            "game_status" => MessageType::GameStatus,
            _ => return None,
        };
        Some(kind)
    }
}

/// 链路消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum LinkMessage {
    /// 玩家参考图像 (base64)，按列表顺序分配 1 起始的 ID
    PlayersInfo(Vec<String>),
    /// 打开回合窗口
    StartVideoStream(bool),
    /// 关闭回合窗口，视觉端需上报累计淘汰
    StopVideoStream(bool),
    /// 单帧图像 (base64)
    VideoFrame(String),
    /// 新淘汰的玩家 ID
    EliminatedPlayers(Vec<PlayerId>),
    /// 本局结束时间 (Unix 毫秒)
    GameEndTime(i64),
    /// 游戏结束
    GameOver(bool),
    /// 操作员开始/中止
    GameStatus(bool),
}

impl LinkMessage {
    pub fn kind(&self) -> MessageType {
        match self {
            LinkMessage::PlayersInfo(_) => MessageType::PlayersInfo,
            LinkMessage::StartVideoStream(_) => MessageType::StartVideoStream,
            LinkMessage::StopVideoStream(_) => MessageType::StopVideoStream,
            LinkMessage::VideoFrame(_) => MessageType::VideoFrame,
            LinkMessage::EliminatedPlayers(_) => MessageType::EliminatedPlayers,
            LinkMessage::GameEndTime(_) => MessageType::GameEndTime,
            LinkMessage::GameOver(_) => MessageType::GameOver,
            LinkMessage::GameStatus(_) => MessageType::GameStatus,
        }
    }

    /// 构造帧消息
    pub fn video_frame(bytes: &[u8]) -> Self {
        LinkMessage::VideoFrame(STANDARD.encode(bytes))
    }

    /// 构造注册消息
    pub fn players_info<B: AsRef<[u8]>>(images: &[B]) -> Self {
        LinkMessage::PlayersInfo(images.iter().map(|img| STANDARD.encode(img)).collect())
    }

    /// 序列化为 JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(RedLightError::Serialization)
    }

    /// 从 JSON 反序列化
    ///
    /// 无法解析、类型未知或载荷不符都是协议错误。
    pub fn from_json(json: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(json)
            .map_err(|e| RedLightError::Protocol(format!("unparseable envelope: {}", e)))?;
        Self::from_envelope(envelope)
    }

    pub fn from_envelope(envelope: Envelope) -> Result<Self> {
        let kind = MessageType::parse(&envelope.kind).ok_or_else(|| {
            RedLightError::Protocol(format!("unknown message type '{}'", envelope.kind))
        })?;
        serde_json::from_value(serde_json::json!({
            "type": kind.as_str(),
            "data": envelope.data,
        }))
        .map_err(|e| {
            RedLightError::Protocol(format!("bad payload for '{}': {}", kind.as_str(), e))
        })
    }
}

/// 解码 base64 图像列表
pub fn decode_images(images: &[String]) -> Result<Vec<Vec<u8>>> {
    images.iter().map(|img| decode_base64(img)).collect()
}

/// 解码 base64 字符串
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(data.trim())
        .map_err(|e| RedLightError::Decode(e.to_string()))
}

/// 显示端确认回执
pub fn ack_json() -> String {
    serde_json::json!({ "status": "success" }).to_string()
}
