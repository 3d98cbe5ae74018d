//! 链路槽位
//!
//! 每个角色最多一个活动链路。新连接直接替换旧引用 (后连接者胜出)，
//! 旧连接的发送端被丢弃后其写任务自然结束。

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};

use rl_core::Result;

use crate::protocol::{ack_json, LinkMessage};

/// 连接 ID
pub type ConnectionId = u64;

/// 链路角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// 显示端 (移动应用)
    Display,
    /// 视觉节点
    Vision,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Display => "display",
            Role::Vision => "vision",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 入站消息 (链路接收循环 → 编排器)
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub role: Role,
    pub connection: ConnectionId,
    pub message: LinkMessage,
}

/// 出站帧
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    Message(LinkMessage),
    /// `{"status": "success"}`
    Ack,
}

impl Outgoing {
    pub fn to_json(&self) -> Result<String> {
        match self {
            Outgoing::Message(msg) => msg.to_json(),
            Outgoing::Ack => Ok(ack_json()),
        }
    }
}

struct ActiveLink {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Outgoing>,
}

/// 链路槽位
#[derive(Clone)]
pub struct LinkSlot {
    role: Role,
    active: Arc<RwLock<Option<ActiveLink>>>,
    next_id: Arc<AtomicU64>,
}

impl LinkSlot {
    /// 创建空槽位
    pub fn new(role: Role) -> Self {
        Self {
            role,
            active: Arc::new(RwLock::new(None)),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// 挂接新连接，替换旧连接
    pub async fn attach(&self) -> (ConnectionId, mpsc::UnboundedReceiver<Outgoing>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        let mut active = self.active.write().await;
        if let Some(previous) = active.replace(ActiveLink { id, tx }) {
            tracing::warn!(
                role = %self.role,
                previous = previous.id,
                connection = id,
                "Replacing existing link"
            );
        } else {
            tracing::info!(role = %self.role, connection = id, "Link attached");
        }
        (id, rx)
    }

    /// 断开连接；只有仍是当前连接时才清空槽位
    pub async fn detach(&self, id: ConnectionId) -> bool {
        let mut active = self.active.write().await;
        match active.as_ref() {
            Some(link) if link.id == id => {
                *active = None;
                tracing::info!(role = %self.role, connection = id, "Link detached");
                true
            }
            _ => false,
        }
    }

    /// 当前连接 ID
    pub async fn current(&self) -> Option<ConnectionId> {
        self.active.read().await.as_ref().map(|link| link.id)
    }

    pub async fn is_connected(&self) -> bool {
        self.current().await.is_some()
    }

    /// 发送消息；无连接时为空操作，返回是否已入队
    pub async fn send(&self, msg: LinkMessage) -> bool {
        self.deliver(None, Outgoing::Message(msg)).await
    }

    /// 仅当 `id` 仍是当前连接时发送
    pub async fn send_to(&self, id: ConnectionId, out: Outgoing) -> bool {
        self.deliver(Some(id), out).await
    }

    async fn deliver(&self, target: Option<ConnectionId>, out: Outgoing) -> bool {
        let failed = {
            let active = self.active.read().await;
            let Some(link) = active.as_ref() else {
                tracing::debug!(role = %self.role, "No link, dropping outgoing message");
                return false;
            };
            if target.is_some_and(|id| id != link.id) {
                return false;
            }
            match link.tx.send(out) {
                Ok(()) => return true,
                Err(_) => link.id,
            }
        };

        tracing::warn!(role = %self.role, connection = failed, "Link writer gone, clearing link");
        self.detach(failed).await;
        false
    }
}
