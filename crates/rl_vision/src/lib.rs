//! # rl_vision - RedLight Vision Stream
//!
//! 视觉流处理：灰度帧差分、运动区域归属、回合内淘汰累计。

pub mod attribution;
pub mod delta_diff;
pub mod frame;
pub mod session;

pub use attribution::{AttributionPolicy, LaneAttributor, RegionAttributor, TemplateAttributor};
pub use delta_diff::{DiffConfig, FrameDifferencer, MotionRegion};
pub use frame::GrayFrame;
pub use session::VisionSession;
