// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 集成测试公共组件: 内存视频 + 脚本化模型
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::{Rgb, RgbImage};
use pitchlens::detection::{BBox, ClassId, Detection, Keypoint};
use pitchlens::input::{FrameSink, FrameSource, VideoBackend, VideoInfo};
use pitchlens::job::ModelProvider;
use pitchlens::models::{Detector, KeypointModel};
use pitchlens::pitch::SoccerPitchConfiguration;
use pitchlens::team::{AppearanceEmbedder, ColorHistogramEmbedder};
use pitchlens::{Error, Result};

pub const WIDTH: u32 = 640;
pub const HEIGHT: u32 = 360;

pub const GRASS: [u8; 3] = [34, 139, 34];
pub const RED_KIT: [u8; 3] = [220, 30, 30];
pub const BLUE_KIT: [u8; 3] = [30, 30, 220];
pub const KEEPER_KIT: [u8; 3] = [240, 240, 40];
pub const REFEREE_KIT: [u8; 3] = [10, 10, 10];

fn player(x: f32, y: f32) -> BBox {
    BBox::new(x, y, x + 20.0, y + 50.0)
}

/// 固定场景: 左侧红队, 右侧蓝队, 左侧守门员, 中间裁判, 一个足球
pub fn scene() -> Vec<(Detection, [u8; 3])> {
    vec![
        (Detection::new(player(100.0, 100.0), 0.9, ClassId::Player), RED_KIT),
        (Detection::new(player(160.0, 200.0), 0.9, ClassId::Player), RED_KIT),
        (Detection::new(player(130.0, 260.0), 0.85, ClassId::Player), RED_KIT),
        (Detection::new(player(480.0, 100.0), 0.9, ClassId::Player), BLUE_KIT),
        (Detection::new(player(540.0, 200.0), 0.9, ClassId::Player), BLUE_KIT),
        (Detection::new(player(510.0, 260.0), 0.8, ClassId::Player), BLUE_KIT),
        (Detection::new(player(20.0, 160.0), 0.9, ClassId::Goalkeeper), KEEPER_KIT),
        (Detection::new(player(310.0, 150.0), 0.9, ClassId::Referee), REFEREE_KIT),
        (
            Detection::new(BBox::new(300.0, 300.0, 308.0, 308.0), 0.7, ClassId::Ball),
            [255, 255, 255],
        ),
    ]
}

pub fn scene_detections() -> Vec<Detection> {
    scene().into_iter().map(|(d, _)| d).collect()
}

/// 按场景绘制一帧
pub fn scene_frame() -> RgbImage {
    let mut frame = RgbImage::from_pixel(WIDTH, HEIGHT, Rgb(GRASS));
    for (det, color) in scene() {
        let b = det.bbox;
        for y in b.y1 as u32..(b.y2 as u32).min(HEIGHT) {
            for x in b.x1 as u32..(b.x2 as u32).min(WIDTH) {
                frame.put_pixel(x, y, Rgb(color));
            }
        }
    }
    frame
}

// ========== 内存视频 ==========

#[derive(Clone, Default)]
pub struct MemoryVideo {
    sources: Arc<Mutex<HashMap<PathBuf, Vec<RgbImage>>>>,
    written: Arc<Mutex<HashMap<PathBuf, Vec<RgbImage>>>>,
}

impl MemoryVideo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(&self, path: &Path, frames: Vec<RgbImage>) {
        self.sources.lock().unwrap().insert(path.to_path_buf(), frames);
    }

    pub fn written(&self, path: &Path) -> Option<Vec<RgbImage>> {
        self.written.lock().unwrap().get(path).cloned()
    }
}

struct MemorySource {
    frames: std::vec::IntoIter<RgbImage>,
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        Ok(self.frames.next())
    }
}

/// 创建时先写空文件 (模拟半成品), finish 时写入帧数
struct MemorySink {
    path: PathBuf,
    frames: Vec<RgbImage>,
    written: Arc<Mutex<HashMap<PathBuf, Vec<RgbImage>>>>,
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        std::fs::write(&self.path, format!("{} frames", self.frames.len()))?;
        self.written
            .lock()
            .unwrap()
            .insert(self.path.clone(), self.frames);
        Ok(())
    }
}

impl VideoBackend for MemoryVideo {
    fn probe(&self, path: &Path) -> Result<VideoInfo> {
        let sources = self.sources.lock().unwrap();
        let frames = sources
            .get(path)
            .ok_or_else(|| Error::decode(path, "no such video"))?;
        let (width, height) = frames.first().map(|f| f.dimensions()).unwrap_or((0, 0));
        Ok(VideoInfo {
            width,
            height,
            fps: 25.0,
            total_frames: Some(frames.len() as u64),
        })
    }

    fn open(&self, path: &Path, stride: usize) -> Result<Box<dyn FrameSource>> {
        let sources = self.sources.lock().unwrap();
        let frames = sources
            .get(path)
            .ok_or_else(|| Error::decode(path, "no such video"))?;
        let picked: Vec<RgbImage> = frames.iter().step_by(stride.max(1)).cloned().collect();
        Ok(Box::new(MemorySource {
            frames: picked.into_iter(),
        }))
    }

    fn create(&self, path: &Path, _: u32, _: u32, _: f64) -> Result<Box<dyn FrameSink>> {
        std::fs::write(path, b"")?;
        Ok(Box::new(MemorySink {
            path: path.to_path_buf(),
            frames: Vec::new(),
            written: self.written.clone(),
        }))
    }
}

// ========== 脚本化模型 ==========

/// 每帧返回相同检测结果 (低于置信度的过滤掉)
#[derive(Clone)]
pub struct SceneDetector {
    pub detections: Vec<Detection>,
}

impl Detector for SceneDetector {
    fn detect(&mut self, _: &RgbImage, conf: f32) -> anyhow::Result<Vec<Detection>> {
        Ok(self
            .detections
            .iter()
            .filter(|d| d.confidence >= conf)
            .copied()
            .collect())
    }
}

/// 每帧返回相同关键点
#[derive(Clone)]
pub struct FixedKeypoints(pub Vec<Keypoint>);

impl KeypointModel for FixedKeypoints {
    fn keypoints(&mut self, _: &RgbImage, _: f32) -> anyhow::Result<Vec<Keypoint>> {
        Ok(self.0.clone())
    }
}

/// 画面 = 球场坐标 × 0.05 (球场 12000×7000 → 600×350)
pub fn visible_pitch_keypoints() -> Vec<Keypoint> {
    SoccerPitchConfiguration::default()
        .vertices()
        .iter()
        .map(|v| Keypoint {
            x: v.x * 0.05,
            y: v.y * 0.05,
            confidence: 0.9,
        })
        .collect()
}

pub fn missing_pitch_keypoints() -> Vec<Keypoint> {
    vec![Keypoint::default(); SoccerPitchConfiguration::NUM_VERTICES]
}

pub struct FakeModels {
    pub detections: Vec<Detection>,
    pub keypoints: Vec<Keypoint>,
    pub detector_fails: bool,
}

impl FakeModels {
    pub fn new(keypoints: Vec<Keypoint>) -> Self {
        Self {
            detections: scene_detections(),
            keypoints,
            detector_fails: false,
        }
    }
}

impl ModelProvider for FakeModels {
    fn detector(&self) -> anyhow::Result<Box<dyn Detector>> {
        if self.detector_fails {
            anyhow::bail!("weights not found");
        }
        Ok(Box::new(SceneDetector {
            detections: self.detections.clone(),
        }))
    }

    fn keypoint_model(&self) -> anyhow::Result<Box<dyn KeypointModel>> {
        Ok(Box::new(FixedKeypoints(self.keypoints.clone())))
    }

    fn embedder(&self) -> anyhow::Result<Box<dyn AppearanceEmbedder>> {
        Ok(Box::new(ColorHistogramEmbedder::default()))
    }
}
