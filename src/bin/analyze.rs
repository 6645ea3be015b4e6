// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 离线分析单个视频
///
/// cargo run --bin pitchlens --release -- match.mp4 --confidence 0.3
use std::path::PathBuf;

use clap::Parser;
use pitchlens::config::ModelArgs;
use pitchlens::job::{JobOutcome, JobRequest, SourceVideo, DEFAULT_CONFIDENCE};
use pitchlens::pipeline::Visualization;

#[derive(Parser, Debug)]
#[command(author, version, about = "⚽ 足球比赛视频离线分析", long_about = None)]
struct Args {
    /// 源视频 (mp4 / avi / mov)
    video: PathBuf,

    /// 检测置信度 (0.1 - 0.9)
    #[arg(short, long, default_value_t = DEFAULT_CONFIDENCE)]
    confidence: f32,

    /// 只生成指定输出 (可重复), 默认全部
    #[arg(long = "only", value_parser = parse_visualization)]
    only: Vec<Visualization>,

    #[command(flatten)]
    models: ModelArgs,
}

fn parse_visualization(s: &str) -> Result<Visualization, String> {
    Visualization::ALL
        .into_iter()
        .find(|v| v.file_prefix() == s.to_ascii_lowercase())
        .ok_or_else(|| format!("unknown output `{}` (tracking, radar, voronoi)", s))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let request = JobRequest {
        confidence: args.confidence,
        visualizations: if args.only.is_empty() {
            Visualization::ALL.to_vec()
        } else {
            args.only.clone()
        },
    };

    let analyzer = args.models.analyzer();
    let mut progress = |percent: u8, stage: &str| log::info!("⏳ [{:>3}%] {}", percent, stage);
    let report = analyzer.analyze(SourceVideo::Local(args.video.clone()), &request, &mut progress)?;

    for out in &report.outputs {
        log::info!(
            "💾 {}: {} ({} 帧)",
            out.kind.label(),
            analyzer.output_dir().join(&out.path).display(),
            out.summary.frames
        );
    }
    for failure in &report.failures {
        log::error!("❌ {} ({:?}): {}", failure.kind.label(), failure.category, failure.message);
    }

    match report.outcome {
        JobOutcome::Completed => Ok(()),
        JobOutcome::PartiallyCompleted => {
            log::warn!("⚠️  部分输出失败");
            Ok(())
        }
        JobOutcome::Failed => anyhow::bail!("all outputs failed"),
    }
}
