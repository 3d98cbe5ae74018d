//! # rl_link - RedLight Link Protocol
//!
//! 节点间链路：JSON 信封协议、按角色的 WebSocket 端点 (后连接者胜出)、
//! 视觉节点侧客户端。

pub mod client;
pub mod link;
pub mod protocol;
pub mod server;

pub use client::{LinkClient, LinkClientConfig};
pub use link::{ConnectionId, Inbound, LinkSlot, Outgoing, Role};
pub use protocol::{LinkMessage, MessageType};
pub use server::{LinkServer, LinkServerConfig};
