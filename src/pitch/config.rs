// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 标准足球场几何 (单位: 厘米)

use crate::detection::Point;

/// 球场尺寸配置, 32 个关键点顺序与关键点模型输出一致
#[derive(Clone, Debug, PartialEq)]
pub struct SoccerPitchConfiguration {
    pub width: f32,
    pub length: f32,
    pub penalty_box_width: f32,
    pub penalty_box_length: f32,
    pub goal_box_width: f32,
    pub goal_box_length: f32,
    pub centre_circle_radius: f32,
    pub penalty_spot_distance: f32,
}

impl Default for SoccerPitchConfiguration {
    fn default() -> Self {
        Self {
            width: 7000.0,
            length: 12000.0,
            penalty_box_width: 4100.0,
            penalty_box_length: 2015.0,
            goal_box_width: 1832.0,
            goal_box_length: 550.0,
            centre_circle_radius: 915.0,
            penalty_spot_distance: 1100.0,
        }
    }
}

/// 球场连线 (1-based 关键点编号)
pub const PITCH_EDGES: [(usize, usize); 33] = [
    (1, 2),
    (2, 3),
    (3, 4),
    (4, 5),
    (5, 6),
    (7, 8),
    (10, 11),
    (11, 12),
    (12, 13),
    (14, 15),
    (15, 16),
    (16, 17),
    (18, 19),
    (19, 20),
    (20, 21),
    (23, 24),
    (25, 26),
    (26, 27),
    (27, 28),
    (28, 29),
    (29, 30),
    (1, 14),
    (2, 10),
    (3, 7),
    (4, 8),
    (5, 13),
    (6, 17),
    (14, 25),
    (18, 26),
    (23, 27),
    (24, 28),
    (21, 29),
    (17, 30),
];

impl SoccerPitchConfiguration {
    /// 关键点数量
    pub const NUM_VERTICES: usize = 32;

    pub fn vertices(&self) -> Vec<Point> {
        let w = self.width;
        let l = self.length;
        let pbw = self.penalty_box_width;
        let pbl = self.penalty_box_length;
        let gbw = self.goal_box_width;
        let gbl = self.goal_box_length;
        let r = self.centre_circle_radius;
        let psd = self.penalty_spot_distance;

        [
            (0.0, 0.0), // 1
            (0.0, (w - pbw) / 2.0),
            (0.0, (w - gbw) / 2.0),
            (0.0, (w + gbw) / 2.0),
            (0.0, (w + pbw) / 2.0),
            (0.0, w), // 6
            (gbl, (w - gbw) / 2.0),
            (gbl, (w + gbw) / 2.0),
            (psd, w / 2.0), // 9
            (pbl, (w - pbw) / 2.0),
            (pbl, (w - gbw) / 2.0),
            (pbl, (w + gbw) / 2.0),
            (pbl, (w + pbw) / 2.0),
            (l / 2.0, 0.0), // 14
            (l / 2.0, w / 2.0 - r),
            (l / 2.0, w / 2.0 + r),
            (l / 2.0, w),
            (l - pbl, (w - pbw) / 2.0), // 18
            (l - pbl, (w - gbw) / 2.0),
            (l - pbl, (w + gbw) / 2.0),
            (l - pbl, (w + pbw) / 2.0),
            (l - psd, w / 2.0), // 22
            (l - gbl, (w - gbw) / 2.0),
            (l - gbl, (w + gbw) / 2.0),
            (l, 0.0), // 25
            (l, (w - pbw) / 2.0),
            (l, (w - gbw) / 2.0),
            (l, (w + gbw) / 2.0),
            (l, (w + pbw) / 2.0),
            (l, w), // 30
            (l / 2.0 - r, w / 2.0),
            (l / 2.0 + r, w / 2.0),
        ]
        .into_iter()
        .map(|(x, y)| Point::new(x, y))
        .collect()
    }

    pub fn edges(&self) -> &'static [(usize, usize)] {
        &PITCH_EDGES
    }
}
