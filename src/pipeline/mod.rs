// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 视频处理流水线 (Video Processing Pipeline)
///
/// 每种输出独立解码一遍源视频, 各自拥有独立的跟踪器与守门员状态:
/// - frame:  单帧处理 (检测 / 跟踪 / 分队 / 合并)
/// - render: 单帧绘制 (跟踪 / 雷达 / Voronoi)
///
/// 分队模型在此之前用抽帧数据训练一次, 之后只读共享
pub mod frame;
pub mod render;

pub use frame::{crop, FrameObjects, FrameProcessor};
pub use render::{FrameRenderer, PitchProjector};

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::detection::ClassId;
use crate::error::{Error, Result};
use crate::input::{FrameSink, FrameSource, VideoInfo};
use crate::models::{Detector, KeypointModel};
use crate::pitch::SoccerPitchConfiguration;
use crate::renderer::FrameAnnotator;
use crate::settings::PipelineSettings;
use crate::team::TeamClassifier;

// ========== 输出类型 ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visualization {
    Tracking,
    Radar,
    Voronoi,
}

impl Visualization {
    pub const ALL: [Visualization; 3] = [
        Visualization::Tracking,
        Visualization::Radar,
        Visualization::Voronoi,
    ];

    /// 输出文件名前缀
    pub fn file_prefix(self) -> &'static str {
        match self {
            Visualization::Tracking => "tracking",
            Visualization::Radar => "radar",
            Visualization::Voronoi => "voronoi",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Visualization::Tracking => "Tracking",
            Visualization::Radar => "Radar",
            Visualization::Voronoi => "Voronoi",
        }
    }

    pub fn needs_keypoints(self) -> bool {
        !matches!(self, Visualization::Tracking)
    }

    /// 输出帧尺寸: 跟踪 = 源视频, 雷达 / Voronoi = 球场画布
    pub fn output_size(
        self,
        source: &VideoInfo,
        config: &SoccerPitchConfiguration,
        settings: &PipelineSettings,
    ) -> (u32, u32) {
        match self {
            Visualization::Tracking => (source.width, source.height),
            Visualization::Radar => settings.radar_pitch.canvas_size(config),
            Visualization::Voronoi => settings.voronoi_pitch.canvas_size(config),
        }
    }
}

// ========== 运行统计 ==========

/// 单次输出的统计: 写入帧数 + 各类别目标总数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub frames: usize,
    pub class_counts: [usize; 4],
}

impl RunSummary {
    pub fn count(&self, class: ClassId) -> usize {
        self.class_counts[class.index()]
    }

    fn record(&mut self, objects: &FrameObjects) {
        self.class_counts[ClassId::Ball.index()] += objects.ball.len();
        for o in &objects.objects {
            self.class_counts[o.detection.class_id.index()] += 1;
        }
    }
}

// ========== 流水线 ==========

/// 一次任务内共享的模型与绘制资源
pub struct Pipeline<'a> {
    pub detector: &'a mut dyn Detector,
    pub classifier: &'a mut dyn TeamClassifier,
    pub keypoint_model: Option<&'a mut dyn KeypointModel>,
    pub annotator: &'a FrameAnnotator,
    pub pitch: &'a SoccerPitchConfiguration,
    pub settings: &'a PipelineSettings,
    /// 用户设置的检测 / 关键点置信度
    pub confidence: f32,
}

impl<'a> Pipeline<'a> {
    /// 处理整段视频并写出一种输出, `on_frame` 收到已写入帧数
    pub fn run(
        &mut self,
        kind: Visualization,
        source: &mut dyn FrameSource,
        mut sink: Box<dyn FrameSink>,
        on_frame: &mut dyn FnMut(usize),
    ) -> Result<RunSummary> {
        let projector = if kind.needs_keypoints() {
            let model = self.keypoint_model.as_deref_mut().ok_or_else(|| {
                Error::Model(anyhow::anyhow!(
                    "{} output needs a keypoint model",
                    kind.file_prefix()
                ))
            })?;
            Some(PitchProjector::new(
                model,
                self.pitch,
                self.confidence,
                self.settings.keypoint_confidence_threshold,
            ))
        } else {
            None
        };
        let mut renderer =
            FrameRenderer::new(kind, self.annotator, projector, self.pitch, self.settings)?;
        let mut processor = FrameProcessor::new(
            &mut *self.detector,
            &mut *self.classifier,
            self.settings,
            self.confidence,
        );

        let mut summary = RunSummary::default();
        while let Some(frame) = source.next_frame()? {
            let objects = processor.process(&frame)?;
            let rendered = renderer.render(&frame, &objects)?;
            sink.write_frame(&rendered)?;
            summary.record(&objects);
            summary.frames += 1;
            on_frame(summary.frames);
        }
        sink.finish()?;

        log::info!(
            "✅ {} 输出完成: {} 帧, 足球 {}, 守门员 {}, 球员 {}, 裁判 {}",
            kind.label(),
            summary.frames,
            summary.count(ClassId::Ball),
            summary.count(ClassId::Goalkeeper),
            summary.count(ClassId::Player),
            summary.count(ClassId::Referee)
        );
        Ok(summary)
    }
}

/// 分队训练数据: 抽帧检测, 收集球员裁剪图 (不做 NMS)
pub fn collect_training_crops(
    detector: &mut dyn Detector,
    source: &mut dyn FrameSource,
    confidence: f32,
) -> Result<Vec<RgbImage>> {
    let mut crops = Vec::new();
    let mut frames = 0usize;
    while let Some(frame) = source.next_frame()? {
        frames += 1;
        let detections = detector.detect(&frame, confidence).map_err(Error::Model)?;
        crops.extend(
            detections
                .iter()
                .filter(|d| d.class_id == ClassId::Player)
                .filter_map(|d| crop(&frame, d)),
        );
    }
    log::info!("🧩 采样 {} 帧, 收集 {} 个球员裁剪图", frames, crops.len());
    Ok(crops)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_names_and_sizes() {
        let info = VideoInfo {
            width: 1920,
            height: 1080,
            fps: 25.0,
            total_frames: None,
        };
        let config = SoccerPitchConfiguration::default();
        let settings = PipelineSettings::default();
        assert_eq!(Visualization::Radar.file_prefix(), "radar");
        assert!(!Visualization::Tracking.needs_keypoints());
        assert_eq!(
            Visualization::Tracking.output_size(&info, &config, &settings),
            (1920, 1080)
        );
        assert_eq!(
            Visualization::Voronoi.output_size(&info, &config, &settings),
            (1300, 800)
        );
    }
}
