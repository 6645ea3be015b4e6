// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 分队系统 (Team assignment)
///
/// - embedding:  球员外观特征 (ONNX 视觉编码器 / 颜色直方图)
/// - kmeans:     两队聚类
/// - goalkeeper: 守门员按质心归队
pub mod embedding;
pub mod goalkeeper;
pub mod kmeans;

pub use embedding::{AppearanceEmbedder, ColorHistogramEmbedder, OnnxEmbedder};
pub use goalkeeper::GoalkeeperResolver;
pub use kmeans::{KMeans, KMeansConfig};

use image::RgbImage;

use crate::detection::Team;
use crate::error::{Error, Result};

/// 球员裁剪图 → 队伍
///
/// 一次任务内只训练一次, 之后只读使用
pub trait TeamClassifier: Send {
    fn predict(&mut self, crops: &[RgbImage]) -> anyhow::Result<Vec<Team>>;
}

/// 外观特征 + 2-Means 分队
pub struct KMeansTeamClassifier {
    embedder: Box<dyn AppearanceEmbedder>,
    kmeans: KMeans,
}

impl KMeansTeamClassifier {
    /// 用训练裁剪图拟合两队
    pub fn fit(
        mut embedder: Box<dyn AppearanceEmbedder>,
        crops: &[RgbImage],
        config: &KMeansConfig,
    ) -> Result<Self> {
        if crops.len() < 2 {
            return Err(Error::EmptyTrainingSet);
        }
        log::info!("🧮 提取 {} 个球员外观特征...", crops.len());
        let features = embedder.embed(crops).map_err(Error::Model)?;
        let kmeans = KMeans::fit(&features, 2, config).ok_or(Error::EmptyTrainingSet)?;
        log::info!("✅ 分队模型训练完成");
        Ok(Self { embedder, kmeans })
    }
}

impl TeamClassifier for KMeansTeamClassifier {
    fn predict(&mut self, crops: &[RgbImage]) -> anyhow::Result<Vec<Team>> {
        if crops.is_empty() {
            return Ok(Vec::new());
        }
        let features = self.embedder.embed(crops)?;
        features
            .iter()
            .map(|f| {
                let cluster = self.kmeans.predict_one(f);
                Team::from_index(cluster)
                    .ok_or_else(|| anyhow::anyhow!("unexpected cluster index {}", cluster))
            })
            .collect()
    }
}
