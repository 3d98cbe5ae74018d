//! 运动区域归属
//!
//! 把运动区域映射到玩家身份。两种策略：固定水平泳道、参考图像模板匹配。
//! 策略按会话固定。

use serde::{Deserialize, Serialize};

use rl_core::{Player, PlayerId, Result};

use crate::delta_diff::MotionRegion;
use crate::frame::GrayFrame;

/// 默认模板接受阈值
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.7;

/// 区域归属特征
pub trait RegionAttributor: Send + Sync {
    /// 策略名称
    fn name(&self) -> &'static str;

    /// 区域归属的玩家，无法归属时返回 `None`
    fn attribute(&self, region: &MotionRegion, frame: &GrayFrame) -> Option<PlayerId>;
}

/// 归属策略配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum AttributionPolicy {
    /// 按画面宽度等分泳道
    Lanes,
    /// 按参考图像做归一化互相关
    Template { threshold: f64 },
}

impl Default for AttributionPolicy {
    fn default() -> Self {
        AttributionPolicy::Lanes
    }
}

impl AttributionPolicy {
    /// 按策略为已注册玩家构建归属器
    pub fn build(&self, players: &[Player]) -> Result<Box<dyn RegionAttributor>> {
        match self {
            AttributionPolicy::Lanes => Ok(Box::new(LaneAttributor::new(players.len() as u32))),
            AttributionPolicy::Template { threshold } => {
                Ok(Box::new(TemplateAttributor::from_players(players, *threshold)))
            }
        }
    }
}

/// 泳道归属器
///
/// 泳道为左闭右开区间：恰好落在边界上的质心归属右侧泳道，
/// 即 `lane = floor(cx * n / width)`。
#[derive(Debug, Clone)]
pub struct LaneAttributor {
    num_players: u32,
}

impl LaneAttributor {
    pub fn new(num_players: u32) -> Self {
        Self { num_players }
    }

    /// 根据质心横坐标和画面宽度计算玩家
    pub fn lane_for(&self, cx: f64, frame_width: u32) -> Option<PlayerId> {
        if self.num_players == 0 || frame_width == 0 || !cx.is_finite() || cx < 0.0 {
            return None;
        }
        let lane = (cx * self.num_players as f64 / frame_width as f64).floor() as u32;
        Some(lane.min(self.num_players - 1) + 1)
    }
}

impl RegionAttributor for LaneAttributor {
    fn name(&self) -> &'static str {
        "lanes"
    }

    fn attribute(&self, region: &MotionRegion, frame: &GrayFrame) -> Option<PlayerId> {
        let (cx, _) = region.centroid();
        self.lane_for(cx, frame.width())
    }
}

/// 模板归属器
pub struct TemplateAttributor {
    /// (玩家 ID, 灰度参考图)，按 ID 升序
    templates: Vec<(PlayerId, GrayFrame)>,
    threshold: f64,
}

impl TemplateAttributor {
    pub fn new(mut templates: Vec<(PlayerId, GrayFrame)>, threshold: f64) -> Self {
        templates.sort_by_key(|(id, _)| *id);
        Self {
            templates,
            threshold,
        }
    }

    /// 解码玩家参考图像；缺失或无法解码的玩家不可被归属
    pub fn from_players(players: &[Player], threshold: f64) -> Self {
        let templates = players
            .iter()
            .filter_map(|player| {
                let bytes = player.reference_image.as_deref()?;
                match GrayFrame::decode(bytes) {
                    Ok(frame) => Some((player.id, frame)),
                    Err(e) => {
                        tracing::warn!(player_id = player.id, "Unusable reference image: {}", e);
                        None
                    }
                }
            })
            .collect();
        Self::new(templates, threshold)
    }

    pub fn template_count(&self) -> usize {
        self.templates.len()
    }

    /// 每个模板的匹配分数 (按 ID 顺序)
    pub fn scores(&self, patch: &GrayFrame) -> Vec<(PlayerId, f64)> {
        self.templates
            .iter()
            .map(|(id, template)| {
                let resized = template.resize_nearest(patch.width(), patch.height());
                (*id, normalized_cross_correlation(patch, &resized))
            })
            .collect()
    }
}

impl RegionAttributor for TemplateAttributor {
    fn name(&self) -> &'static str {
        "template"
    }

    fn attribute(&self, region: &MotionRegion, frame: &GrayFrame) -> Option<PlayerId> {
        let patch = frame.crop(region.x, region.y, region.width, region.height);
        if patch.pixels().is_empty() {
            return None;
        }

        let mut best: Option<(PlayerId, f64)> = None;
        for (id, score) in self.scores(&patch) {
            // 严格大于：同分时保留 ID 较小者
            if score > self.threshold && best.map_or(true, |(_, s)| score > s) {
                best = Some((id, score));
            }
        }
        best.map(|(id, _)| id)
    }
}

/// 零均值归一化互相关，两者任一方差为零时返回 0
pub fn normalized_cross_correlation(a: &GrayFrame, b: &GrayFrame) -> f64 {
    if !a.same_size(b) || a.pixels().is_empty() {
        return 0.0;
    }
    let n = a.pixels().len() as f64;
    let mean_a = a.pixels().iter().map(|&p| p as f64).sum::<f64>() / n;
    let mean_b = b.pixels().iter().map(|&p| p as f64).sum::<f64>() / n;

    let (mut cross, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (&p, &q) in a.pixels().iter().zip(b.pixels()) {
        let da = p as f64 - mean_a;
        let db = q as f64 - mean_b;
        cross += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    let denom = (var_a * var_b).sqrt();
    if denom <= f64::EPSILON {
        0.0
    } else {
        cross / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn region_at(cx: u32) -> MotionRegion {
        MotionRegion {
            x: cx - 10,
            y: 100,
            width: 20,
            height: 40,
            area: 800,
        }
    }

    fn gradient(width: u32, height: u32) -> GrayFrame {
        let pixels = (0..height)
            .flat_map(|_| (0..width).map(move |x| (x * 255 / width) as u8))
            .collect();
        GrayFrame::from_luma(width, height, pixels).unwrap()
    }

    fn checkerboard(width: u32, height: u32, cell: u32) -> GrayFrame {
        let pixels = (0..height)
            .flat_map(|y| {
                (0..width).map(move |x| if (x / cell + y / cell) % 2 == 0 { 30 } else { 220 })
            })
            .collect();
        GrayFrame::from_luma(width, height, pixels).unwrap()
    }

    #[test]
    fn test_lane_boundaries_are_closed_open() {
        let lanes = LaneAttributor::new(4);

        assert_eq!(lanes.lane_for(100.0, 960), Some(1));
        assert_eq!(lanes.lane_for(239.0, 960), Some(1));
        assert_eq!(lanes.lane_for(240.0, 960), Some(2));
        assert_eq!(lanes.lane_for(719.9, 960), Some(3));
        assert_eq!(lanes.lane_for(959.0, 960), Some(4));
        assert_eq!(lanes.lane_for(960.0, 960), Some(4));
    }

    #[test]
    fn test_lane_attribution_uses_region_centroid() {
        let lanes = LaneAttributor::new(4);
        let frame = GrayFrame::filled(960, 540, 0);

        assert_eq!(lanes.attribute(&region_at(100), &frame), Some(1));
        assert_eq!(lanes.attribute(&region_at(500), &frame), Some(3));
    }

    #[test]
    fn test_lanes_without_players_attribute_nobody() {
        let lanes = LaneAttributor::new(0);
        assert_eq!(lanes.lane_for(10.0, 960), None);
        assert_eq!(LaneAttributor::new(2).lane_for(-1.0, 960), None);
    }

    #[test]
    fn test_template_picks_matching_player() {
        let templates = vec![(1, gradient(32, 32)), (2, checkerboard(32, 32, 8))];
        let attributor = TemplateAttributor::new(templates, DEFAULT_MATCH_THRESHOLD);

        let mut frame = GrayFrame::filled(200, 100, 0);
        let pattern = checkerboard(64, 64, 16);
        for y in 0..64 {
            for x in 0..64 {
                frame.set(50 + x, 20 + y, pattern.get(x, y));
            }
        }
        let region = MotionRegion {
            x: 50,
            y: 20,
            width: 64,
            height: 64,
            area: 4096,
        };

        assert_eq!(attributor.attribute(&region, &frame), Some(2));
    }

    #[test]
    fn test_template_below_threshold_is_nobody() {
        let attributor = TemplateAttributor::new(vec![(1, checkerboard(16, 16, 4))], 0.7);
        let frame = gradient(64, 64);
        let region = MotionRegion {
            x: 0,
            y: 0,
            width: 64,
            height: 64,
            area: 4096,
        };

        assert_eq!(attributor.attribute(&region, &frame), None);
    }

    #[test]
    fn test_template_tie_resolves_to_lowest_id() {
        let same = checkerboard(32, 32, 8);
        let attributor =
            TemplateAttributor::new(vec![(3, same.clone()), (2, same.clone())], 0.7);
        let region = MotionRegion {
            x: 0,
            y: 0,
            width: 32,
            height: 32,
            area: 1024,
        };

        assert_eq!(attributor.attribute(&region, &same), Some(2));
    }

    #[test]
    fn test_ncc_of_flat_patch_is_zero() {
        let flat = GrayFrame::filled(8, 8, 90);
        assert_eq!(normalized_cross_correlation(&flat, &gradient(8, 8)), 0.0);
        let g = gradient(8, 8);
        assert!((normalized_cross_correlation(&g, &g) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_policy_builds_from_registered_players() {
        let image = checkerboard(16, 16, 4).encode_png().unwrap();
        let players = vec![
            Player::new(1).with_image(image),
            Player::new(2).with_image(b"broken".to_vec()),
        ];

        let template = TemplateAttributor::from_players(&players, 0.7);
        assert_eq!(template.template_count(), 1);

        let lanes = AttributionPolicy::Lanes.build(&players).unwrap();
        assert_eq!(lanes.name(), "lanes");
    }

    proptest! {
        #[test]
        fn prop_every_column_maps_to_its_lane(
            num_players in 1u32..=8,
            width in 1u32..4000,
            column in 0u32..4000,
        ) {
            let lanes = LaneAttributor::new(num_players);
            let cx = column % width;
            let id = lanes.lane_for(cx as f64, width);

            prop_assert!(id.is_some());
            let id = id.unwrap_or_default();
            prop_assert!((1..=num_players).contains(&id));
            // 车道 k 覆盖 [k*w/n, (k+1)*w/n)
            let (cx, n, w) = (cx as u64, num_players as u64, width as u64);
            prop_assert!((id as u64 - 1) * w <= cx * n);
            prop_assert!(cx * n < id as u64 * w);
        }

        #[test]
        fn prop_lanes_are_monotonic(
            num_players in 1u32..=8,
            width in 1u32..4000,
            a in 0u32..4000,
            b in 0u32..4000,
        ) {
            let lanes = LaneAttributor::new(num_players);
            let (lo, hi) = (a.min(b) % width, a.max(b) % width);
            let (lo, hi) = (lo.min(hi), lo.max(hi));
            prop_assert!(lanes.lane_for(lo as f64, width) <= lanes.lane_for(hi as f64, width));
        }
    }
}
