// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! K-Means 聚类 (k-means++ 初始化, 固定随机种子)

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KMeansConfig {
    pub max_iterations: usize,
    pub seed: u64,
    /// 中心移动小于该值时提前结束
    pub tolerance: f32,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            seed: 42,
            tolerance: 1e-4,
        }
    }
}

#[derive(Clone, Debug)]
pub struct KMeans {
    centroids: Vec<Vec<f32>>,
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

impl KMeans {
    /// 聚类, 要求样本数 >= k 且 k >= 1
    pub fn fit(data: &[Vec<f32>], k: usize, config: &KMeansConfig) -> Option<Self> {
        if k == 0 || data.len() < k {
            return None;
        }
        let dims = data[0].len();
        if data.iter().any(|v| v.len() != dims) {
            return None;
        }

        let mut rng = StdRng::seed_from_u64(config.seed);

        // k-means++ 初始化
        let mut centroids: Vec<Vec<f32>> = vec![data[rng.gen_range(0..data.len())].clone()];
        while centroids.len() < k {
            let weights: Vec<f32> = data
                .iter()
                .map(|v| {
                    centroids
                        .iter()
                        .map(|c| squared_distance(v, c))
                        .fold(f32::INFINITY, f32::min)
                })
                .collect();
            let total: f32 = weights.iter().sum();
            let next = if total <= 0.0 {
                rng.gen_range(0..data.len())
            } else {
                let mut target = rng.gen::<f32>() * total;
                let mut chosen = data.len() - 1;
                for (i, w) in weights.iter().enumerate() {
                    if target < *w {
                        chosen = i;
                        break;
                    }
                    target -= w;
                }
                chosen
            };
            centroids.push(data[next].clone());
        }

        let mut model = Self { centroids };
        for iteration in 0..config.max_iterations {
            let labels: Vec<usize> = data.iter().map(|v| model.predict_one(v)).collect();

            let mut sums = vec![vec![0.0f32; dims]; k];
            let mut counts = vec![0usize; k];
            for (v, &label) in data.iter().zip(&labels) {
                counts[label] += 1;
                for (s, x) in sums[label].iter_mut().zip(v) {
                    *s += x;
                }
            }

            let mut shift = 0.0f32;
            for c in 0..k {
                // 空簇保留原中心
                if counts[c] == 0 {
                    continue;
                }
                let updated: Vec<f32> = sums[c].iter().map(|s| s / counts[c] as f32).collect();
                shift = shift.max(squared_distance(&updated, &model.centroids[c]).sqrt());
                model.centroids[c] = updated;
            }

            if shift < config.tolerance {
                log::debug!("K-Means 收敛: 第 {} 轮", iteration + 1);
                break;
            }
        }

        Some(model)
    }

    /// 最近中心索引 (距离相等取较小索引)
    pub fn predict_one(&self, v: &[f32]) -> usize {
        let mut best = 0;
        let mut best_dist = f32::INFINITY;
        for (i, c) in self.centroids.iter().enumerate() {
            let d = squared_distance(v, c);
            if d < best_dist {
                best = i;
                best_dist = d;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separates_two_blobs() {
        let mut data = Vec::new();
        for i in 0..10 {
            data.push(vec![0.0 + i as f32 * 0.01, 1.0]);
            data.push(vec![5.0 + i as f32 * 0.01, -1.0]);
        }
        let model = KMeans::fit(&data, 2, &KMeansConfig::default()).unwrap();
        let a = model.predict_one(&data[0]);
        let b = model.predict_one(&data[1]);
        assert_ne!(a, b);
        for (i, v) in data.iter().enumerate() {
            let expected = if i % 2 == 0 { a } else { b };
            assert_eq!(model.predict_one(v), expected);
        }
    }

    #[test]
    fn same_seed_same_result() {
        let data: Vec<Vec<f32>> = (0..30).map(|i| vec![(i * 7 % 11) as f32, (i % 3) as f32]).collect();
        let config = KMeansConfig::default();
        let m1 = KMeans::fit(&data, 2, &config).unwrap();
        let m2 = KMeans::fit(&data, 2, &config).unwrap();
        for v in &data {
            assert_eq!(m1.predict_one(v), m2.predict_one(v));
        }
    }

    #[test]
    fn too_few_samples() {
        assert!(KMeans::fit(&[vec![1.0]], 2, &KMeansConfig::default()).is_none());
    }
}
