// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 守门员归队: 离哪支球队的球员质心更近就归哪队
//!
//! 锚点为检测框底边中点; 距离严格更小才归 A 队, 相等归 B 队。
//! 某队本帧没有球员时沿用该队上一次的质心, 从未出现过则视为无穷远;
//! 两队都没有质心时守门员不归队 (None)。

use crate::detection::{Point, Team};

/// 一组点的质心, 空集返回 None
///
/// 坐标排序后再求和, 结果与输入顺序无关
pub fn centroid(points: &[Point]) -> Option<Point> {
    if points.is_empty() {
        return None;
    }
    let mean = |mut values: Vec<f64>| {
        values.sort_by(|a, b| a.total_cmp(b));
        values.iter().sum::<f64>() / values.len() as f64
    };
    let xs = points.iter().map(|p| p.x as f64).collect();
    let ys = points.iter().map(|p| p.y as f64).collect();
    Some(Point::new(mean(xs) as f32, mean(ys) as f32))
}

/// 按最近质心分配, 质心缺失时该队距离为 +∞
pub fn assign_by_centroids(goalkeeper: &Point, centroids: [Option<Point>; 2]) -> Option<Team> {
    let dist = |c: Option<Point>| c.map_or(f32::INFINITY, |c| goalkeeper.distance(&c));
    match centroids {
        [None, None] => None,
        [a, b] => {
            if dist(a) < dist(b) {
                Some(Team::A)
            } else {
                Some(Team::B)
            }
        }
    }
}

/// 守门员归队器 (每次视频处理独立一份)
#[derive(Debug, Default, Clone)]
pub struct GoalkeeperResolver {
    last_centroids: [Option<Point>; 2],
}

impl GoalkeeperResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// - `players`: 本帧已分队球员的锚点
    /// - `goalkeepers`: 本帧守门员锚点
    ///
    /// 返回与 `goalkeepers` 等长的归队结果
    pub fn resolve(&mut self, players: &[(Point, Team)], goalkeepers: &[Point]) -> Vec<Option<Team>> {
        for team in [Team::A, Team::B] {
            let members: Vec<Point> = players
                .iter()
                .filter(|(_, t)| *t == team)
                .map(|(p, _)| *p)
                .collect();
            if let Some(c) = centroid(&members) {
                self.last_centroids[team.index()] = Some(c);
            }
        }

        goalkeepers
            .iter()
            .map(|gk| assign_by_centroids(gk, self.last_centroids))
            .collect()
    }
}
