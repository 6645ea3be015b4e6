// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 模型统一接口与实现
///
/// # 架构说明
///
/// ## Detector
/// 单帧目标检测: 图片 + 置信度阈值 → 检测框 (足球 / 守门员 / 球员 / 裁判)
/// - **YoloDetector**: YOLO ONNX 导出, 文件 `yolo.rs`
///
/// ## KeypointModel
/// 单帧球场关键点: 图片 → 32 个关键点 (顺序与球场关键点一致)
/// - **RoboflowKeypointModel**: 远程推理服务 (模型 ID + API Key), 文件 `roboflow.rs`
/// - **PoseKeypointModel**: 本地 YOLO Pose ONNX 导出, 文件 `pose.rs`
///
/// ## 核心流程
/// ```text
/// 原始图片 → preprocess → ndarray张量
///          ↓
///     推理引擎 OrtBackend::run
///          ↓
///     原始输出 → postprocess → 检测结果
/// ```
use anyhow::Result;
use image::RgbImage;
use ndarray::{Array, IxDyn};

use crate::detection::{Detection, Keypoint};

/// 目标检测模型
pub trait Detector: Send {
    fn detect(&mut self, image: &RgbImage, conf: f32) -> Result<Vec<Detection>>;
}

/// 球场关键点模型
pub trait KeypointModel: Send {
    /// 返回全部关键点 (缺失的关键点置信度为 0)
    fn keypoints(&mut self, image: &RgbImage, conf: f32) -> Result<Vec<Keypoint>>;
}

/// 等比例缩放因子与缩放后尺寸
pub(crate) fn scale_wh(w0: f32, h0: f32, w1: f32, h1: f32) -> (f32, f32, f32) {
    let r = (w1 / w0).min(h1 / h0);
    (r, (w0 * r).round(), (h0 * r).round())
}

/// 等比例缩放到左上角, 其余区域填充 144/255, 输出 NCHW
pub(crate) fn letterbox(image: &RgbImage, width: u32, height: u32) -> (Array<f32, IxDyn>, f32) {
    let (w0, h0) = image.dimensions();
    let (ratio, w_new, h_new) = scale_wh(w0 as f32, h0 as f32, width as f32, height as f32);
    let resized = image::imageops::resize(
        image,
        (w_new as u32).max(1),
        (h_new as u32).max(1),
        image::imageops::FilterType::Triangle,
    );

    let mut xs = Array::<f32, _>::ones((1, 3, height as usize, width as usize)).into_dyn();
    xs.fill(144.0 / 255.0);
    for (x, y, rgb) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        if x >= width as usize || y >= height as usize {
            continue;
        }
        let [r, g, b] = rgb.0;
        xs[[0, 0, y, x]] = (r as f32) / 255.0;
        xs[[0, 1, y, x]] = (g as f32) / 255.0;
        xs[[0, 2, y, x]] = (b as f32) / 255.0;
    }
    (xs, ratio)
}

pub mod backend; // ONNX Runtime 推理后端
pub mod pose; // 本地关键点模型
pub mod roboflow; // 远程关键点模型
pub mod yolo; // YOLO 检测模型

pub use backend::{OrtBackend, OrtEP};
pub use pose::PoseKeypointModel;
pub use roboflow::RoboflowKeypointModel;
pub use yolo::YoloDetector;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letterbox_keeps_aspect_and_pads() {
        let img = RgbImage::from_pixel(200, 100, image::Rgb([255, 0, 0]));
        let (xs, ratio) = letterbox(&img, 64, 64);
        assert_eq!(xs.shape(), &[1, 3, 64, 64]);
        assert!((ratio - 0.32).abs() < 1e-6);
        assert_eq!(xs[[0, 0, 10, 10]], 1.0);
        assert!((xs[[0, 0, 50, 10]] - 144.0 / 255.0).abs() < 1e-6);
    }
}
