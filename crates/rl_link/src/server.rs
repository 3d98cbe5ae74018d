//! 链路服务器
//!
//! 每个角色一个 WebSocket 端点。接收循环把解析后的消息转发给编排器的
//! 单写者队列；发送由槽位持有的写任务完成。

use std::net::SocketAddr;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use tower_http::trace::TraceLayer;

use rl_core::{RedLightError, Result};

use crate::link::{ConnectionId, Inbound, LinkSlot, Outgoing, Role};
use crate::protocol::LinkMessage;

/// 链路服务器配置
#[derive(Debug, Clone)]
pub struct LinkServerConfig {
    /// 监听地址
    pub addr: SocketAddr,
    /// 本端点服务的角色
    pub role: Role,
}

impl LinkServerConfig {
    pub fn new(addr: SocketAddr, role: Role) -> Self {
        Self { addr, role }
    }
}

#[derive(Clone)]
struct LinkState {
    slot: LinkSlot,
    inbound: flume::Sender<Inbound>,
}

/// 链路服务器
pub struct LinkServer {
    config: LinkServerConfig,
    slot: LinkSlot,
    inbound: flume::Sender<Inbound>,
}

impl LinkServer {
    /// 创建新服务器；入站消息写入 `inbound`
    pub fn new(config: LinkServerConfig, slot: LinkSlot, inbound: flume::Sender<Inbound>) -> Self {
        debug_assert_eq!(config.role, slot.role());
        Self {
            config,
            slot,
            inbound,
        }
    }

    /// 构建 Axum 路由
    pub fn build_router(&self) -> Router {
        let state = LinkState {
            slot: self.slot.clone(),
            inbound: self.inbound.clone(),
        };
        Router::new()
            .route("/", get(ws_handler))
            .route("/ws", get(ws_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// 绑定配置地址并启动
    pub async fn start(&self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.config.addr)
            .await
            .map_err(|e| RedLightError::Link(format!("bind {}: {}", self.config.addr, e)))?;
        self.serve(listener).await
    }

    /// 在已绑定的监听器上服务
    pub async fn serve(&self, listener: tokio::net::TcpListener) -> Result<()> {
        tracing::info!(
            role = %self.config.role,
            addr = ?listener.local_addr().ok(),
            "Link endpoint listening"
        );
        axum::serve(listener, self.build_router())
            .await
            .map_err(|e| RedLightError::Link(e.to_string()))
    }

    pub fn config(&self) -> &LinkServerConfig {
        &self.config
    }

    pub fn slot(&self) -> &LinkSlot {
        &self.slot
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<LinkState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// 处理 WebSocket 连接
async fn handle_socket(socket: WebSocket, state: LinkState) {
    let role = state.slot.role();
    let (id, mut outgoing) = state.slot.attach().await;
    let (mut sender, mut receiver) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(out) = outgoing.recv().await {
            let text = match out.to_json() {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(%role, connection = id, "Failed to encode outgoing: {}", e);
                    continue;
                }
            };
            if let Err(e) = sender.send(Message::Text(text)).await {
                tracing::warn!(%role, connection = id, "Send failed: {}", e);
                break;
            }
        }
        let _ = sender.close().await;
    });

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => handle_text(&state, id, &text).await,
            Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => handle_text(&state, id, text).await,
                Err(_) => tracing::warn!(%role, connection = id, "Discarding non-UTF-8 frame"),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(%role, connection = id, "Link closed with error: {}", e);
                break;
            }
        }
    }

    state.slot.detach(id).await;
    writer.abort();
    tracing::info!(%role, connection = id, "Connection finished");
}

async fn handle_text(state: &LinkState, id: ConnectionId, text: &str) {
    let role = state.slot.role();
    let message = match LinkMessage::from_json(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(%role, connection = id, "Discarding message: {}", e);
            return;
        }
    };

    tracing::debug!(%role, connection = id, kind = message.kind().as_str(), "Received");
    if role == Role::Display {
        state.slot.send_to(id, Outgoing::Ack).await;
    }

    let inbound = Inbound {
        role,
        connection: id,
        message,
    };
    if state.inbound.send_async(inbound).await.is_err() {
        tracing::warn!(%role, connection = id, "Orchestrator queue closed, dropping message");
    }
}
