// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 流水线参数 - 通过JSON文件调整

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::detection::ByteTrackConfig;
use crate::pitch::PitchStyle;
use crate::renderer::AnnotatorStyle;
use crate::team::KMeansConfig;

/// 流水线参数配置
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    // === 检测参数 ===
    pub detector_input_size: u32, // 模型输入尺寸
    pub detector_iou: f32,        // 模型内 NMS IoU (按类别)
    pub ball_padding_px: f32,     // 足球框四周外扩
    pub clamp_ball_padding: bool, // 外扩后是否裁剪到画面内
    pub nms_iou_threshold: f32,   // 非足球目标 NMS IoU (不分类别)

    // === 分队训练 ===
    pub training_stride: usize,    // 抽帧步长
    pub training_confidence: f32,  // 训练时检测置信度
    pub kmeans: KMeansConfig,

    // === 关键点 ===
    pub keypoint_confidence_threshold: f32, // 关键点置信度 (严格大于)

    // === 跟踪 ===
    pub bytetrack: ByteTrackConfig,

    // === 绘制 ===
    pub annotator: AnnotatorStyle,
    pub radar_pitch: PitchStyle,
    pub voronoi_pitch: PitchStyle,
    pub radar_ball_radius: i32,
    pub radar_player_radius: i32,
    pub voronoi_ball_radius: i32,
    pub voronoi_player_radius: i32,
    pub voronoi_opacity: f32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            detector_input_size: 640,
            detector_iou: 0.7,
            ball_padding_px: 10.0,
            clamp_ball_padding: false,
            nms_iou_threshold: 0.5,

            training_stride: 30,
            training_confidence: 0.3,
            kmeans: KMeansConfig::default(),

            keypoint_confidence_threshold: 0.5,

            bytetrack: ByteTrackConfig::default(),

            annotator: AnnotatorStyle::default(),
            radar_pitch: PitchStyle::default(),
            voronoi_pitch: PitchStyle::voronoi(),
            radar_ball_radius: 10,
            radar_player_radius: 16,
            voronoi_ball_radius: 8,
            voronoi_player_radius: 16,
            voronoi_opacity: 0.5,
        }
    }
}

impl PipelineSettings {
    /// 从JSON文件加载配置, 文件不存在时创建默认配置
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(settings) => {
                    log::info!("✅ 配置已从 {} 加载", path.display());
                    settings
                }
                Err(e) => {
                    log::warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("📝 配置文件不存在,创建默认配置...");
                let settings = Self::default();
                settings.save(path);
                settings
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    log::error!("❌ 保存配置失败: {}", e);
                } else {
                    log::info!("💾 配置已保存到 {}", path.display());
                }
            }
            Err(e) => log::error!("❌ 序列化配置失败: {}", e),
        }
    }

    /// 打印当前配置
    pub fn log_summary(&self) {
        log::info!("🎛️  当前流水线配置:");
        log::info!("  足球外扩: {} px (裁剪: {})", self.ball_padding_px, self.clamp_ball_padding);
        log::info!("  NMS IoU: {:.2}", self.nms_iou_threshold);
        log::info!("  关键点阈值: {:.2}", self.keypoint_confidence_threshold);
        log::info!(
            "  分队训练: 步长 {}, 置信度 {:.2}",
            self.training_stride,
            self.training_confidence
        );
        log::info!("  ByteTrack最大丢失帧: {}", self.bytetrack.max_lost_frames);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_creates_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        let settings = PipelineSettings::load(&path);
        assert_eq!(settings, PipelineSettings::default());
        assert!(path.exists());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        fs::write(&path, r#"{"ball_padding_px": 4.0, "training_stride": 15}"#).unwrap();
        let settings = PipelineSettings::load(&path);
        assert_eq!(settings.ball_padding_px, 4.0);
        assert_eq!(settings.training_stride, 15);
        assert_eq!(settings.nms_iou_threshold, 0.5);
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(PipelineSettings::load(&path), PipelineSettings::default());
    }
}
