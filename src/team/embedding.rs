// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 球员外观特征提取

use std::path::Path;

use anyhow::Result;
use image::{imageops::FilterType, RgbImage};
use ndarray::{Array, Axis, IxDyn};

use crate::models::{OrtBackend, OrtEP};

/// 外观特征提取接口: 一组球员裁剪图 → 等长特征向量
pub trait AppearanceEmbedder: Send {
    fn embed(&mut self, crops: &[RgbImage]) -> Result<Vec<Vec<f32>>>;
}

/// L2 归一化 (零向量保持不变)
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-6 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

// ========== 颜色直方图 ==========

/// 球衣颜色直方图 (未配置特征模型时使用)
///
/// 只统计躯干区域, 草地绿色像素不计入;
/// 彩色像素按色相分桶, 低饱和度像素 (白/灰/黑球衣) 按亮度分桶
#[derive(Debug, Clone)]
pub struct ColorHistogramEmbedder {
    hue_bins: usize,
    value_bins: usize,
}

impl Default for ColorHistogramEmbedder {
    fn default() -> Self {
        Self {
            hue_bins: 18,
            value_bins: 4,
        }
    }
}

impl ColorHistogramEmbedder {
    pub fn dims(&self) -> usize {
        self.hue_bins + self.value_bins
    }

    fn histogram(&self, crop: &RgbImage) -> Vec<f32> {
        let mut hist = vec![0.0f32; self.dims()];
        let (w, h) = crop.dimensions();
        if w == 0 || h == 0 {
            return hist;
        }

        // 躯干区域: 高度 15%-55%, 宽度 20%-80%
        let (y0, y1) = ((h as f32 * 0.15) as u32, ((h as f32 * 0.55) as u32).max(1));
        let (x0, x1) = ((w as f32 * 0.2) as u32, ((w as f32 * 0.8) as u32).max(1));

        for y in y0..y1.min(h) {
            for x in x0..x1.min(w) {
                let [r, g, b] = crop.get_pixel(x, y).0;
                let (hue, sat, val) = rgb_to_hsv(r, g, b);
                if is_grass(hue, sat, val) {
                    continue;
                }
                if sat < 0.2 {
                    let bin = ((val * self.value_bins as f32) as usize).min(self.value_bins - 1);
                    hist[self.hue_bins + bin] += 1.0;
                } else {
                    let bin = ((hue / 360.0 * self.hue_bins as f32) as usize).min(self.hue_bins - 1);
                    hist[bin] += 1.0;
                }
            }
        }

        l2_normalize(&mut hist);
        hist
    }
}

impl AppearanceEmbedder for ColorHistogramEmbedder {
    fn embed(&mut self, crops: &[RgbImage]) -> Result<Vec<Vec<f32>>> {
        Ok(crops.iter().map(|c| self.histogram(c)).collect())
    }
}

/// RGB → HSV (h: 0-360, s/v: 0-1)
fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let (r, g, b) = (r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta < 1e-6 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let s = if max < 1e-6 { 0.0 } else { delta / max };
    (h, s, max)
}

fn is_grass(hue: f32, sat: f32, val: f32) -> bool {
    (70.0..170.0).contains(&hue) && sat > 0.25 && val > 0.15
}

// ========== ONNX 视觉编码器 ==========

/// 视觉编码器 (SigLIP 类 ONNX 导出), 输出按 token 平均后归一化
pub struct OnnxEmbedder {
    engine: OrtBackend,
    input_size: u32,
    batch_size: usize,
}

impl OnnxEmbedder {
    pub fn new(path: &Path, ep: OrtEP) -> Result<Self> {
        Ok(Self {
            engine: OrtBackend::from_path(path, ep)?,
            input_size: 224,
            batch_size: 32,
        })
    }

    fn preprocess(&self, crops: &[RgbImage]) -> Array<f32, IxDyn> {
        let size = self.input_size as usize;
        let mut xs = Array::<f32, _>::zeros((crops.len(), 3, size, size)).into_dyn();
        for (idx, crop) in crops.iter().enumerate() {
            let img = image::imageops::resize(crop, self.input_size, self.input_size, FilterType::Triangle);
            for (x, y, rgb) in img.enumerate_pixels() {
                let (x, y) = (x as usize, y as usize);
                let [r, g, b] = rgb.0;
                // (v / 255 - 0.5) / 0.5
                xs[[idx, 0, y, x]] = r as f32 / 127.5 - 1.0;
                xs[[idx, 1, y, x]] = g as f32 / 127.5 - 1.0;
                xs[[idx, 2, y, x]] = b as f32 / 127.5 - 1.0;
            }
        }
        xs
    }
}

impl AppearanceEmbedder for OnnxEmbedder {
    fn embed(&mut self, crops: &[RgbImage]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(crops.len());
        for batch in crops.chunks(self.batch_size) {
            let xs = self.preprocess(batch);
            let ys = self.engine.run(xs)?;
            let out = ys
                .into_iter()
                .next()
                .ok_or_else(|| anyhow::anyhow!("embedding model returned no outputs"))?;

            // [B, T, D] → token 平均; [B, D] 直接使用
            let pooled = match out.ndim() {
                3 => out
                    .mean_axis(Axis(1))
                    .ok_or_else(|| anyhow::anyhow!("embedding output has zero tokens"))?,
                2 => out,
                n => anyhow::bail!("unexpected embedding output rank {}", n),
            };
            for row in pooled.axis_iter(Axis(0)) {
                let mut v: Vec<f32> = row.iter().copied().collect();
                l2_normalize(&mut v);
                embeddings.push(v);
            }
        }
        Ok(embeddings)
    }
}
