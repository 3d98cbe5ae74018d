//! 灰度帧

use rl_core::{RedLightError, Result};

/// 8 位灰度帧，行优先存储
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayFrame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl GrayFrame {
    /// 从原始灰度像素创建
    ///
    /// 宽或高为零的帧被拒绝。
    pub fn from_luma(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RedLightError::Vision(format!(
                "empty frame {}x{}",
                width, height
            )));
        }
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(RedLightError::Vision(format!(
                "expected {} pixels for {}x{}, got {}",
                expected,
                width,
                height,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// 纯色帧
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            pixels: vec![value; width as usize * height as usize],
        }
    }

    /// 解码 JPEG/PNG 字节并转为灰度
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| RedLightError::Decode(e.to_string()))?
            .to_luma8();
        let (width, height) = image.dimensions();
        Self::from_luma(width, height, image.into_raw())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// 宽或高为零
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn same_size(&self, other: &GrayFrame) -> bool {
        self.width == other.width && self.height == other.height
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: u8) {
        let idx = y as usize * self.width as usize + x as usize;
        self.pixels[idx] = value;
    }

    /// 裁剪矩形区域，越界部分被截断
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> GrayFrame {
        let x_end = (x + width).min(self.width);
        let y_end = (y + height).min(self.height);
        let x = x.min(x_end);
        let y = y.min(y_end);

        let mut pixels = Vec::with_capacity(((x_end - x) * (y_end - y)) as usize);
        for row in y..y_end {
            let start = row as usize * self.width as usize;
            pixels.extend_from_slice(&self.pixels[start + x as usize..start + x_end as usize]);
        }
        GrayFrame {
            width: x_end - x,
            height: y_end - y,
            pixels,
        }
    }

    /// 最近邻缩放
    pub fn resize_nearest(&self, width: u32, height: u32) -> GrayFrame {
        if width == self.width && height == self.height {
            return self.clone();
        }
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            let src_y = (y as u64 * self.height as u64 / height.max(1) as u64) as u32;
            for x in 0..width {
                let src_x = (x as u64 * self.width as u64 / width.max(1) as u64) as u32;
                pixels.push(self.get(src_x, src_y));
            }
        }
        GrayFrame {
            width,
            height,
            pixels,
        }
    }

    /// 编码为 PNG (测试与调试用)
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let buffer = image::GrayImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| RedLightError::Vision("pixel buffer size mismatch".to_string()))?;
        let mut out = std::io::Cursor::new(Vec::new());
        buffer
            .write_to(&mut out, image::ImageFormat::Png)
            .map_err(|e| RedLightError::Decode(e.to_string()))?;
        Ok(out.into_inner())
    }
}
