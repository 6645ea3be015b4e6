// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 多目标跟踪公共组件
//! Common components for multi-object tracking

use serde::{Deserialize, Serialize};

use super::types::{BBox, Detection};

// ========== 卡尔曼滤波器 ==========

/// 卡尔曼滤波参数
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KalmanConfig {
    /// 过程噪声 q (0.1-1.0, 越小越平滑)
    pub process_noise: f32,
    /// 观测噪声 r (越大越平滑)
    pub observation_noise: f32,
    /// 速度衰减因子 (0.9-0.99)
    pub velocity_decay: f32,
    /// 静止判定阈值 (像素/帧)
    pub stationary_threshold: f32,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            process_noise: 0.1,
            observation_noise: 0.5,
            velocity_decay: 0.95,
            stationary_threshold: 2.0,
        }
    }
}

/// 简化卡尔曼滤波器 (用于单个边界框的位置和尺寸预测)
/// 状态向量: [x_center, y_center, width, height, vx, vy, vw, vh]
#[derive(Clone, Debug)]
pub struct KalmanBoxFilter {
    /// 状态估计: [cx, cy, w, h, vx, vy, vw, vh]
    state: [f32; 8],

    /// 估计误差协方差 (简化为对角阵)
    p: [f32; 8],

    config: KalmanConfig,

    /// 连续静止帧数计数器
    stationary_count: u32,
}

impl KalmanBoxFilter {
    pub fn new(bbox: &BBox, config: KalmanConfig) -> Self {
        let c = bbox.center();
        Self {
            state: [c.x, c.y, bbox.width(), bbox.height(), 0.0, 0.0, 0.0, 0.0], // 初始速度为0
            p: [10.0; 8],
            config,
            stationary_count: 0,
        }
    }

    /// 预测下一帧状态 (匀速运动模型 + 速度衰减)
    pub fn predict(&mut self) {
        let speed = (self.state[4] * self.state[4] + self.state[5] * self.state[5]).sqrt();
        let is_stationary = speed < self.config.stationary_threshold;

        let (decay_pos, decay_size) = if is_stationary {
            self.stationary_count += 1;
            // 连续静止3帧后,大幅衰减速度
            let decay = if self.stationary_count > 3 {
                0.7
            } else {
                self.config.velocity_decay
            };
            (decay, decay)
        } else {
            self.stationary_count = 0;
            (self.config.velocity_decay, 0.98) // 尺寸变化更慢
        };
        self.state[4] *= decay_pos;
        self.state[5] *= decay_pos;
        self.state[6] *= decay_size;
        self.state[7] *= decay_size;

        for i in 0..4 {
            self.state[i] += self.state[i + 4];
        }

        // 协方差预测: P = P + Q (静止时减小过程噪声)
        let q_factor = if is_stationary { 0.5 } else { 1.0 };
        for p in self.p.iter_mut() {
            *p += self.config.process_noise * q_factor;
        }
    }

    /// 更新 (融合观测值,自适应噪声调整)
    pub fn update(&mut self, bbox: &BBox) {
        let c = bbox.center();
        let y = [
            c.x - self.state[0],
            c.y - self.state[1],
            bbox.width() - self.state[2],
            bbox.height() - self.state[3],
        ];

        // 根据残差大小自适应调整观测噪声
        let residual_norm = (y[0] * y[0] + y[1] * y[1]).sqrt();
        let r = self.config.observation_noise;
        let adaptive_r = if residual_norm < self.config.stationary_threshold {
            r * 0.3
        } else if residual_norm < 10.0 {
            r
        } else {
            r * 3.0
        };

        // 卡尔曼增益: K = P / (P + R)
        let mut k = [0.0f32; 8];
        for i in 0..8 {
            let noise = if i < 4 { adaptive_r } else { adaptive_r * 10.0 };
            k[i] = self.p[i] / (self.p[i] + noise);
        }

        let velocity_gain = if residual_norm < self.config.stationary_threshold {
            0.3
        } else {
            1.0
        };
        for i in 0..4 {
            self.state[i] += k[i] * y[i];
            self.state[i + 4] += k[i + 4] * y[i] * velocity_gain;
        }

        // 协方差更新: P = (I - K) * P
        for i in 0..8 {
            self.p[i] *= 1.0 - k[i];
        }

        if residual_norm >= self.config.stationary_threshold {
            self.stationary_count = 0;
        }
    }

    /// 当前状态的边界框 (predict 之后即为本帧预测位置)
    pub fn state_bbox(&self) -> BBox {
        let (cx, cy) = (self.state[0], self.state[1]);
        let w = self.state[2].max(1.0);
        let h = self.state[3].max(1.0);
        BBox::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
    }
}

// ========== 跟踪器统一接口 ==========

/// 多目标跟踪器 Trait
pub trait Tracker {
    /// 更新跟踪器, 返回本帧被关联到轨迹的检测 (带 tracker_id)
    ///
    /// 输出框为本帧原始检测框, 未被确认的低分检测会被丢弃
    fn update(&mut self, detections: &[Detection]) -> Vec<Detection>;

    /// 获取当前跟踪数量
    fn track_count(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_motion_is_predicted_forward() {
        let mut kf = KalmanBoxFilter::new(&BBox::new(0.0, 0.0, 10.0, 10.0), KalmanConfig::default());
        for step in 1..=10 {
            let dx = step as f32 * 5.0;
            kf.predict();
            kf.update(&BBox::new(dx, 0.0, dx + 10.0, 10.0));
        }
        kf.predict();
        let predicted = kf.state_bbox();
        assert!(predicted.center().x > 50.0);
        assert!((predicted.width() - 10.0).abs() < 1.0);
    }
}
