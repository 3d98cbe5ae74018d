//! 链路客户端 (视觉节点侧)

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use rl_core::{RedLightError, Result};

use crate::protocol::LinkMessage;

/// 链路客户端配置
#[derive(Debug, Clone)]
pub struct LinkClientConfig {
    /// 主控节点地址，如 `ws://127.0.0.1:8765/`
    pub server_url: String,
    /// 初次连接尝试次数
    pub retry_attempts: u32,
    /// 重试间隔
    pub retry_delay: Duration,
}

impl Default for LinkClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8765/".to_string(),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// 链路客户端
pub struct LinkClient {
    config: LinkClientConfig,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl LinkClient {
    /// 连接到主控节点，失败时按配置重试
    pub async fn connect(config: LinkClientConfig) -> Result<Self> {
        let attempts = config.retry_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match connect_async(config.server_url.as_str()).await {
                Ok((stream, _)) => {
                    tracing::info!(url = %config.server_url, attempt, "Connected to controller");
                    return Ok(Self { config, stream });
                }
                Err(e) => {
                    tracing::warn!(
                        url = %config.server_url,
                        attempt,
                        attempts,
                        "Connection failed: {}",
                        e
                    );
                    last_error = Some(e);
                }
            }
            if attempt < attempts {
                tokio::time::sleep(config.retry_delay).await;
            }
        }

        Err(RedLightError::Link(format!(
            "could not reach {} after {} attempts: {}",
            config.server_url,
            attempts,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    /// 发送消息
    pub async fn send(&mut self, msg: &LinkMessage) -> Result<()> {
        self.send_raw(&msg.to_json()?).await
    }

    /// 发送原始文本帧
    pub async fn send_raw(&mut self, text: &str) -> Result<()> {
        self.stream
            .send(Message::Text(text.to_string()))
            .await
            .map_err(|e| RedLightError::Link(e.to_string()))
    }

    /// 接收下一条文本帧；连接关闭时返回 `None`
    pub async fn recv_raw(&mut self) -> Option<Result<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(bytes)) => {
                    return Some(
                        String::from_utf8(bytes)
                            .map_err(|e| RedLightError::Protocol(e.to_string())),
                    )
                }
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => return Some(Err(RedLightError::Link(e.to_string()))),
            }
        }
    }

    /// 接收下一条链路消息
    ///
    /// 协议错误以 `Err` 返回，调用方决定是否继续。
    pub async fn recv(&mut self) -> Option<Result<LinkMessage>> {
        let text = match self.recv_raw().await? {
            Ok(text) => text,
            Err(e) => return Some(Err(e)),
        };
        Some(LinkMessage::from_json(&text))
    }

    /// 关闭连接
    pub async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }

    pub fn config(&self) -> &LinkClientConfig {
        &self.config
    }
}
