// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 命令行模型参数 (两个可执行文件共用)

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::job::ModelProvider;
use crate::models::{
    roboflow::DEFAULT_API_URL, Detector, KeypointModel, OrtEP, PoseKeypointModel,
    RoboflowKeypointModel, YoloDetector,
};
use crate::pitch::SoccerPitchConfiguration;
use crate::settings::PipelineSettings;
use crate::team::{AppearanceEmbedder, ColorHistogramEmbedder, OnnxEmbedder};

/// 模型与运行参数
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// 球员检测模型 (YOLO ONNX)
    #[arg(long, default_value = "models/yolov11_best.onnx")]
    pub detection_model: PathBuf,

    /// 球场关键点模型ID (远程推理)
    #[arg(long, default_value = "football-field-detection-f07vi/14")]
    pub keypoint_model_id: String,

    /// 远程推理 API Key
    #[arg(long, env = "ROBOFLOW_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// 远程推理地址
    #[arg(long, default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// 本地关键点模型 (YOLO Pose ONNX), 设置后不再调用远程推理
    #[arg(long)]
    pub keypoint_onnx: Option<PathBuf>,

    /// 外观特征模型 (视觉编码器 ONNX), 未设置时使用颜色直方图
    #[arg(long)]
    pub embedding_onnx: Option<PathBuf>,

    /// 跟踪标签字体 (不可用时使用内置 DejaVu Sans)
    #[arg(long, default_value = "assets/DejaVuSans.ttf")]
    pub font: PathBuf,

    /// 输出目录
    #[arg(long, default_value = "outputs")]
    pub output_dir: PathBuf,

    /// 流水线参数文件 (JSON)
    #[arg(long, default_value = "pipeline.json")]
    pub settings: PathBuf,

    /// 使用 CUDA
    #[arg(long)]
    pub cuda: bool,

    /// 使用 TensorRT
    #[arg(long)]
    pub trt: bool,

    /// GPU 设备号
    #[arg(long, default_value_t = 0)]
    pub device_id: i32,
}

impl ModelArgs {
    pub fn ep(&self) -> OrtEP {
        OrtEP::from_flags(self.cuda, self.trt, self.device_id)
    }

    /// 绑定流水线参数, 得到模型工厂
    pub fn provider(&self, settings: &PipelineSettings) -> OnnxModelProvider {
        OnnxModelProvider {
            args: self.clone(),
            detector_input_size: settings.detector_input_size,
            detector_iou: settings.detector_iou,
        }
    }

    /// 加载参数文件 + 字体, 组装 FFmpeg 分析器
    #[cfg(feature = "ffmpeg")]
    pub fn analyzer(&self) -> crate::job::Analyzer {
        let settings = PipelineSettings::load(&self.settings);
        settings.log_summary();
        let annotator = crate::renderer::FrameAnnotator::new(
            settings.annotator.clone(),
            crate::renderer::load_font(&self.font),
        );
        crate::job::Analyzer::new(
            Box::new(self.provider(&settings)),
            Box::new(crate::input::FfmpegBackend::new()),
            annotator,
            settings,
            &self.output_dir,
        )
    }
}

/// 按命令行参数加载 ONNX / 远程模型
pub struct OnnxModelProvider {
    args: ModelArgs,
    detector_input_size: u32,
    detector_iou: f32,
}

impl ModelProvider for OnnxModelProvider {
    fn detector(&self) -> Result<Box<dyn Detector>> {
        log::info!("📦 检测模型: {}", self.args.detection_model.display());
        let detector = YoloDetector::new(
            &self.args.detection_model,
            self.args.ep(),
            self.detector_input_size,
        )?
        .with_iou(self.detector_iou);
        Ok(Box::new(detector))
    }

    fn keypoint_model(&self) -> Result<Box<dyn KeypointModel>> {
        let nk = SoccerPitchConfiguration::NUM_VERTICES;
        match &self.args.keypoint_onnx {
            Some(path) => {
                log::info!("🦴 关键点模型: {} (本地)", path.display());
                Ok(Box::new(PoseKeypointModel::new(
                    path,
                    self.args.ep(),
                    self.detector_input_size,
                    nk,
                )?))
            }
            None => Ok(Box::new(RoboflowKeypointModel::new(
                &self.args.api_url,
                &self.args.keypoint_model_id,
                self.args.api_key.as_deref().unwrap_or_default(),
                nk,
            )?)),
        }
    }

    fn embedder(&self) -> Result<Box<dyn AppearanceEmbedder>> {
        match &self.args.embedding_onnx {
            Some(path) => {
                log::info!("🧬 外观特征模型: {}", path.display());
                Ok(Box::new(OnnxEmbedder::new(path, self.args.ep())?))
            }
            None => {
                log::info!("🎨 外观特征: 颜色直方图");
                Ok(Box::new(ColorHistogramEmbedder::default()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        models: ModelArgs,
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["pitchlens"]).unwrap();
        assert_eq!(cli.models.keypoint_model_id, "football-field-detection-f07vi/14");
        assert_eq!(cli.models.output_dir, PathBuf::from("outputs"));
        assert_eq!(cli.models.ep(), OrtEP::CPU);
    }

    #[test]
    fn gpu_flags() {
        let cli = Cli::try_parse_from(["pitchlens", "--cuda", "--device-id", "1"]).unwrap();
        assert_eq!(cli.models.ep(), OrtEP::CUDA(1));
    }
}
