// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 单次上传的分析任务
//!
//! ```text
//! 校验参数 → 探测视频 → 加载模型 (10%) → 训练分队 (20%)
//!          → 逐个生成输出 (30% + 20% × k) → 完成 (100%)
//! ```
//!
//! 模型加载与分队训练失败会使整个任务失败; 之后每种输出互不影响,
//! 失败的输出删除半成品文件并记录错误.
//!
//! 每个任务写入输出目录下独立的子目录 `{任务ID}/`, 同名上传互不覆盖.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::error::{Error, ErrorCategory, Result};
use crate::input::{check_container, VideoBackend};
use crate::models::{Detector, KeypointModel};
use crate::pipeline::{collect_training_crops, Pipeline, RunSummary, Visualization};
use crate::pitch::SoccerPitchConfiguration;
use crate::renderer::FrameAnnotator;
use crate::settings::PipelineSettings;
use crate::team::{AppearanceEmbedder, KMeansTeamClassifier};

pub const MIN_CONFIDENCE: f32 = 0.1;
pub const MAX_CONFIDENCE: f32 = 0.9;
pub const DEFAULT_CONFIDENCE: f32 = 0.3;

/// 模型工厂 (每个任务加载一次)
pub trait ModelProvider: Send + Sync {
    fn detector(&self) -> anyhow::Result<Box<dyn Detector>>;
    fn keypoint_model(&self) -> anyhow::Result<Box<dyn KeypointModel>>;
    fn embedder(&self) -> anyhow::Result<Box<dyn AppearanceEmbedder>>;
}

/// 用户参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub confidence: f32,
    pub visualizations: Vec<Visualization>,
}

impl Default for JobRequest {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE,
            visualizations: Visualization::ALL.to_vec(),
        }
    }
}

impl JobRequest {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&self.confidence) {
            return Err(Error::InvalidParameter(format!(
                "confidence {} outside [{}, {}]",
                self.confidence, MIN_CONFIDENCE, MAX_CONFIDENCE
            )));
        }
        if self.visualizations.is_empty() {
            return Err(Error::InvalidParameter(
                "select at least one output".to_string(),
            ));
        }
        Ok(())
    }

    /// 去重并保持 Tracking → Radar → Voronoi 顺序
    pub fn ordered_visualizations(&self) -> Vec<Visualization> {
        Visualization::ALL
            .into_iter()
            .filter(|v| self.visualizations.contains(v))
            .collect()
    }
}

/// 源视频: 上传的临时文件 (任务结束即删除) 或本地文件
pub enum SourceVideo {
    Upload { file: NamedTempFile, name: String },
    Local(PathBuf),
}

impl SourceVideo {
    pub fn path(&self) -> &Path {
        match self {
            SourceVideo::Upload { file, .. } => file.path(),
            SourceVideo::Local(path) => path,
        }
    }

    /// 原始文件名 (用于输出命名)
    pub fn name(&self) -> String {
        match self {
            SourceVideo::Upload { name, .. } => name.clone(),
            SourceVideo::Local(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "video.mp4".to_string()),
        }
    }
}

/// `{类型}_{原文件名}`, 扩展名固定为 `.mp4`
pub fn output_file_name(kind: Visualization, source_name: &str) -> String {
    let base = Path::new(source_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = if stem.trim_matches('.').is_empty() {
        "video".to_string()
    } else {
        stem
    };
    format!("{}_{}.mp4", kind.file_prefix(), stem)
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputFile {
    pub kind: Visualization,
    /// 显示 / 下载用文件名 `{类型}_{原文件名}`
    pub file_name: String,
    /// 相对输出目录的路径 `{任务ID}/{file_name}`
    pub path: String,
    pub summary: RunSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputFailure {
    pub kind: Visualization,
    pub category: ErrorCategory,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Completed,
    PartiallyCompleted,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: Uuid,
    pub outcome: JobOutcome,
    pub outputs: Vec<OutputFile>,
    pub failures: Vec<OutputFailure>,
}

/// 进度回调: (百分比, 阶段说明)
pub type Progress<'a> = &'a mut dyn FnMut(u8, &str);

/// 分析器 (服务端与命令行共用)
pub struct Analyzer {
    models: Box<dyn ModelProvider>,
    video: Box<dyn VideoBackend>,
    annotator: FrameAnnotator,
    pitch: SoccerPitchConfiguration,
    settings: PipelineSettings,
    output_dir: PathBuf,
}

impl Analyzer {
    pub fn new(
        models: Box<dyn ModelProvider>,
        video: Box<dyn VideoBackend>,
        annotator: FrameAnnotator,
        settings: PipelineSettings,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            models,
            video,
            annotator,
            pitch: SoccerPitchConfiguration::default(),
            settings,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 任务输出子目录
    pub fn job_dir(&self, job_id: &Uuid) -> PathBuf {
        self.output_dir.join(job_id.to_string())
    }

    /// 以新的任务ID执行一次分析
    pub fn analyze(
        &self,
        source: SourceVideo,
        request: &JobRequest,
        progress: Progress<'_>,
    ) -> Result<JobReport> {
        self.analyze_job(Uuid::new_v4(), source, request, progress)
    }

    /// 执行一次分析, 输出写入 `{output_dir}/{job_id}/`;
    /// 源视频在返回前释放 (临时文件随之删除)
    pub fn analyze_job(
        &self,
        job_id: Uuid,
        source: SourceVideo,
        request: &JobRequest,
        progress: Progress<'_>,
    ) -> Result<JobReport> {
        request.validate()?;
        let path = source.path().to_path_buf();
        let source_name = source.name();
        check_container(Path::new(&source_name))?;
        let info = self.video.probe(&path)?;

        let kinds = request.ordered_visualizations();
        let needs_keypoints = kinds.iter().any(|k| k.needs_keypoints());

        // 1. 加载模型
        progress(10, "Loading models");
        let mut detector = self.models.detector().map_err(Error::Model)?;
        let mut keypoint_model = if needs_keypoints {
            Some(self.models.keypoint_model().map_err(Error::Model)?)
        } else {
            None
        };
        let embedder = self.models.embedder().map_err(Error::Model)?;

        // 2. 训练分队
        progress(20, "Training team classifier");
        let mut frames = self.video.open(&path, self.settings.training_stride)?;
        let crops = collect_training_crops(
            detector.as_mut(),
            frames.as_mut(),
            self.settings.training_confidence,
        )?;
        drop(frames);
        let mut classifier = KMeansTeamClassifier::fit(embedder, &crops, &self.settings.kmeans)?;

        let job_dir = self.job_dir(&job_id);
        std::fs::create_dir_all(&job_dir)?;

        let keypoints: Option<&mut dyn KeypointModel> = match keypoint_model.as_mut() {
            Some(model) => Some(model.as_mut()),
            None => None,
        };
        let mut pipeline = Pipeline {
            detector: detector.as_mut(),
            classifier: &mut classifier,
            keypoint_model: keypoints,
            annotator: &self.annotator,
            pitch: &self.pitch,
            settings: &self.settings,
            confidence: request.confidence,
        };

        // 3. 逐个生成输出
        let mut outputs = Vec::new();
        let mut failures = Vec::new();
        for (k, kind) in kinds.into_iter().enumerate() {
            let base = 30 + 20 * k as u8;
            let message = format!("Generating {} video", kind.label());
            progress(base, &message);

            let file_name = output_file_name(kind, &source_name);
            let target = job_dir.join(&file_name);
            let mut last = base;
            let mut on_frame = |written: usize| {
                if let Some(total) = info.total_frames.filter(|t| *t > 0) {
                    let pct = base + ((written as u64 * 20 / total).min(19) as u8);
                    if pct != last {
                        last = pct;
                        progress(pct, &message);
                    }
                }
            };

            match self.render_one(&mut pipeline, kind, &path, &target, &info, &mut on_frame) {
                Ok(summary) => {
                    log::info!("💾 {} → {}", kind.label(), target.display());
                    outputs.push(OutputFile {
                        kind,
                        path: format!("{}/{}", job_id, file_name),
                        file_name,
                        summary,
                    });
                }
                Err(e) => {
                    log::error!("❌ {} 输出失败: {}", kind.label(), e);
                    if target.exists() {
                        if let Err(rm) = std::fs::remove_file(&target) {
                            log::warn!("⚠️ 无法删除 {}: {}", target.display(), rm);
                        }
                    }
                    failures.push(OutputFailure {
                        kind,
                        category: e.category(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let outcome = match (outputs.is_empty(), failures.is_empty()) {
            (_, true) => JobOutcome::Completed,
            (false, false) => JobOutcome::PartiallyCompleted,
            (true, false) => JobOutcome::Failed,
        };
        if outputs.is_empty() {
            if let Err(e) = std::fs::remove_dir(&job_dir) {
                log::debug!("任务目录未删除 {}: {}", job_dir.display(), e);
            }
        }
        progress(100, "Done");
        Ok(JobReport {
            job_id,
            outcome,
            outputs,
            failures,
        })
    }

    fn render_one(
        &self,
        pipeline: &mut Pipeline<'_>,
        kind: Visualization,
        source: &Path,
        target: &Path,
        info: &crate::input::VideoInfo,
        on_frame: &mut dyn FnMut(usize),
    ) -> Result<RunSummary> {
        let (w, h) = kind.output_size(info, &self.pitch, &self.settings);
        let mut frames = self.video.open(source, 1)?;
        let sink = self.video.create(target, w, h, info.fps)?;
        pipeline.run(kind, frames.as_mut(), sink, on_frame)
    }
}
