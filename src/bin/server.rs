// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 足球比赛视频分析服务
///
/// 直接运行: cargo run --bin pitchlens-server --release
use clap::Parser;
use pitchlens::config::ModelArgs;

/// 上传视频, 生成跟踪 / 雷达 / Voronoi 视频
#[derive(Parser, Debug)]
#[command(author, version, about = "⚽ 足球比赛视频分析服务", long_about = None)]
struct Args {
    /// 监听地址
    #[arg(short, long, default_value = "127.0.0.1:8501")]
    bind: String,

    /// 已结束任务的输出保留时长 (小时)
    #[arg(long, default_value_t = 24)]
    keep_hours: i64,

    #[command(flatten)]
    models: ModelArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    log::info!("🚀 分析服务启动");
    log::info!("📦 检测模型: {}", args.models.detection_model.display());
    log::info!(
        "📁 输出目录: {} (保留 {} 小时)",
        args.models.output_dir.display(),
        args.keep_hours
    );
    if args.models.keypoint_onnx.is_none() && args.models.api_key.is_none() {
        log::warn!("⚠️  未设置 ROBOFLOW_API_KEY, 雷达与 Voronoi 输出将失败");
    }

    let analyzer = args.models.analyzer();
    let retention = chrono::Duration::hours(args.keep_hours.clamp(1, 24 * 365));
    pitchlens::server::serve(analyzer, &args.bind, retention).await
}
