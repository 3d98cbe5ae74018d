//! 帧差分运动检测
//!
//! 灰度 → 模糊 → 与基准帧做绝对差 → 二值化 → 膨胀 → 外轮廓 (连通域)。
//! 基准帧每 `frames_to_persist` 帧刷新一次，而不是每帧刷新，
//! 以抵抗缓慢的光照漂移带来的重影。

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::frame::GrayFrame;

/// 帧差分配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffConfig {
    /// 模糊核边长 (奇数)
    pub blur_kernel: u32,
    /// 二值化阈值
    pub threshold: u8,
    /// 膨胀迭代次数 (3x3 结构元)
    pub dilate_iterations: u32,
    /// 最小运动面积 (像素)
    pub min_area: u32,
    /// 基准帧刷新间隔 (帧)
    pub frames_to_persist: u32,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            blur_kernel: 11,
            threshold: 30,
            dilate_iterations: 2,
            min_area: 750,
            frames_to_persist: 5,
        }
    }
}

/// 运动区域 (仅在单帧处理期间有效)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// 前景像素数
    pub area: u32,
}

impl MotionRegion {
    /// 外接矩形中心
    pub fn centroid(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }
}

/// 帧差分器
pub struct FrameDifferencer {
    config: DiffConfig,
    /// 基准帧 (已模糊)
    baseline: Option<GrayFrame>,
    /// 距上次刷新基准帧的帧数
    frames_since_refresh: u32,
}

impl FrameDifferencer {
    /// 创建新差分器
    pub fn new(config: DiffConfig) -> Self {
        Self {
            config,
            baseline: None,
            frames_since_refresh: 0,
        }
    }

    pub fn config(&self) -> &DiffConfig {
        &self.config
    }

    /// 处理新帧
    ///
    /// 首帧只建立基准帧并返回空序列。
    pub fn process_frame(&mut self, frame: &GrayFrame) -> Vec<MotionRegion> {
        if frame.is_empty() {
            tracing::debug!(
                width = frame.width(),
                height = frame.height(),
                "Skipping empty frame"
            );
            return Vec::new();
        }
        let blurred = box_blur(frame, self.config.blur_kernel);

        let baseline = match &self.baseline {
            Some(baseline) if baseline.same_size(&blurred) => baseline,
            Some(_) => {
                tracing::debug!(
                    width = frame.width(),
                    height = frame.height(),
                    "Frame size changed, re-establishing baseline"
                );
                self.rebase(blurred);
                return Vec::new();
            }
            None => {
                self.rebase(blurred);
                return Vec::new();
            }
        };

        let mask = threshold_diff(baseline, &blurred, self.config.threshold);
        let mask = dilate(mask, self.config.dilate_iterations);
        let regions: Vec<MotionRegion> = external_regions(&mask)
            .into_iter()
            .filter(|r| r.area >= self.config.min_area)
            .collect();

        self.frames_since_refresh += 1;
        if self.frames_since_refresh >= self.config.frames_to_persist {
            self.rebase(blurred);
        }

        regions
    }

    /// 丢弃基准帧，下一帧重新预热
    pub fn reset(&mut self) {
        self.baseline = None;
        self.frames_since_refresh = 0;
    }

    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }

    fn rebase(&mut self, blurred: GrayFrame) {
        self.baseline = Some(blurred);
        self.frames_since_refresh = 0;
    }
}

impl Default for FrameDifferencer {
    fn default() -> Self {
        Self::new(DiffConfig::default())
    }
}

/// 可分离均值模糊，边缘像素复制
fn box_blur(frame: &GrayFrame, kernel: u32) -> GrayFrame {
    let radius = (kernel / 2) as i64;
    if radius == 0 || frame.is_empty() {
        return frame.clone();
    }
    let (w, h) = (frame.width() as i64, frame.height() as i64);
    let size = (2 * radius + 1) as u32;
    let src = frame.pixels();

    let mut horizontal = vec![0u8; src.len()];
    for y in 0..h {
        let row = &src[(y * w) as usize..((y + 1) * w) as usize];
        let mut sum: u32 = (-radius..=radius)
            .map(|dx| row[dx.clamp(0, w - 1) as usize] as u32)
            .sum();
        for x in 0..w {
            horizontal[(y * w + x) as usize] = (sum / size) as u8;
            let leaving = row[(x - radius).clamp(0, w - 1) as usize] as u32;
            let entering = row[(x + radius + 1).clamp(0, w - 1) as usize] as u32;
            sum = sum + entering - leaving;
        }
    }

    let mut out = vec![0u8; src.len()];
    for x in 0..w {
        let at = |y: i64| horizontal[(y.clamp(0, h - 1) * w + x) as usize] as u32;
        let mut sum: u32 = (-radius..=radius).map(at).sum();
        for y in 0..h {
            out[(y * w + x) as usize] = (sum / size) as u8;
            sum = sum + at(y + radius + 1) - at(y - radius);
        }
    }

    GrayFrame::from_luma(frame.width(), frame.height(), out)
        .unwrap_or_else(|_| frame.clone())
}

/// |a - b| > threshold 的二值掩码
fn threshold_diff(a: &GrayFrame, b: &GrayFrame, threshold: u8) -> Mask {
    let bits = a
        .pixels()
        .iter()
        .zip(b.pixels())
        .map(|(&p, &q)| p.abs_diff(q) > threshold)
        .collect();
    Mask {
        width: a.width() as usize,
        height: a.height() as usize,
        bits,
    }
}

struct Mask {
    width: usize,
    height: usize,
    bits: Vec<bool>,
}

/// 3x3 膨胀，按行列分离执行
fn dilate(mut mask: Mask, iterations: u32) -> Mask {
    let (w, h) = (mask.width, mask.height);
    for _ in 0..iterations {
        let mut horizontal = vec![false; mask.bits.len()];
        for y in 0..h {
            for x in 0..w {
                let i = y * w + x;
                horizontal[i] = mask.bits[i]
                    || (x > 0 && mask.bits[i - 1])
                    || (x + 1 < w && mask.bits[i + 1]);
            }
        }
        for y in 0..h {
            for x in 0..w {
                let i = y * w + x;
                mask.bits[i] = horizontal[i]
                    || (y > 0 && horizontal[i - w])
                    || (y + 1 < h && horizontal[i + w]);
            }
        }
    }
    mask
}

/// 8 连通域标记，按扫描顺序返回每个连通域的外接矩形
fn external_regions(mask: &Mask) -> Vec<MotionRegion> {
    let (w, h) = (mask.width, mask.height);
    let mut visited = vec![false; mask.bits.len()];
    let mut regions = Vec::new();
    let mut queue = VecDeque::new();

    for start in 0..mask.bits.len() {
        if !mask.bits[start] || visited[start] {
            continue;
        }
        visited[start] = true;
        queue.push_back(start);

        let (mut min_x, mut min_y, mut max_x, mut max_y) = (usize::MAX, usize::MAX, 0, 0);
        let mut area = 0u32;

        while let Some(i) = queue.pop_front() {
            let (x, y) = (i % w, i / w);
            area += 1;
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);

            for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    let n = ny * w + nx;
                    if mask.bits[n] && !visited[n] {
                        visited[n] = true;
                        queue.push_back(n);
                    }
                }
            }
        }

        regions.push(MotionRegion {
            x: min_x as u32,
            y: min_y as u32,
            width: (max_x - min_x + 1) as u32,
            height: (max_y - min_y + 1) as u32,
            area,
        });
    }

    regions
}
