// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! ByteTrack 算法实现
//! ByteTrack: Simple and effective multi-object tracking
//!
//! 核心思想:
//! 1. 高低分检测框分开处理
//! 2. 高分框优先匹配 (IOU)
//! 3. 低分框救援丢失的轨迹
//! 4. 纯运动模型,无需外观特征

use serde::{Deserialize, Serialize};

use super::tracker::{KalmanBoxFilter, KalmanConfig, Tracker};
use super::types::{BBox, Detection};

/// ByteTrack 参数
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ByteTrackConfig {
    /// 最大允许丢失帧数
    pub max_lost_frames: u32,
    /// 高分检测阈值 (同时是新建轨迹的门槛)
    pub high_score_threshold: f32,
    /// 低分检测阈值 (用于救援)
    pub low_score_threshold: f32,
    /// 高分匹配 IOU 阈值
    pub high_iou_threshold: f32,
    /// 低分匹配 IOU 阈值
    pub low_iou_threshold: f32,
    pub kalman: KalmanConfig,
}

impl Default for ByteTrackConfig {
    fn default() -> Self {
        Self {
            max_lost_frames: 30,
            high_score_threshold: 0.25,
            low_score_threshold: 0.1,
            high_iou_threshold: 0.2,
            low_iou_threshold: 0.5,
            kalman: KalmanConfig::default(),
        }
    }
}

/// ByteTrack 跟踪对象
#[derive(Clone, Debug)]
struct Track {
    id: u32,
    kalman: KalmanBoxFilter,
    /// 连续丢失帧数
    frames_lost: u32,
}

impl Track {
    fn new(id: u32, bbox: &BBox, config: KalmanConfig) -> Self {
        Self {
            id,
            kalman: KalmanBoxFilter::new(bbox, config),
            frames_lost: 0,
        }
    }

    fn update(&mut self, bbox: &BBox) {
        self.kalman.update(bbox);
        self.frames_lost = 0;
    }
}

/// ByteTrack 追踪器
pub struct ByteTracker {
    tracks: Vec<Track>,
    /// 下一个分配的ID
    next_id: u32,
    config: ByteTrackConfig,
}

impl ByteTracker {
    pub fn new(config: ByteTrackConfig) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            config,
        }
    }

    /// IOU 匹配 (贪心: 按代价排序)
    fn match_detections_to_tracks(
        &self,
        detections: &[(usize, &Detection)],
        track_indices: &[usize],
        iou_threshold: f32,
    ) -> Vec<(usize, usize)> {
        if detections.is_empty() || track_indices.is_empty() {
            return Vec::new();
        }

        let mut candidates = Vec::new();
        for (local_det_idx, (det_idx, detection)) in detections.iter().enumerate() {
            for (local_track_idx, &track_idx) in track_indices.iter().enumerate() {
                let predicted = self.tracks[track_idx].kalman.state_bbox();
                let iou = detection.bbox.iou(&predicted);
                if iou > iou_threshold {
                    candidates.push((1.0 - iou, *det_idx, local_det_idx, track_idx, local_track_idx));
                }
            }
        }

        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut assignments = Vec::new();
        let mut used_det = vec![false; detections.len()];
        let mut used_track = vec![false; track_indices.len()];

        for (_, det_idx, local_det_idx, track_idx, local_track_idx) in candidates {
            if !used_det[local_det_idx] && !used_track[local_track_idx] {
                assignments.push((det_idx, track_idx));
                used_det[local_det_idx] = true;
                used_track[local_track_idx] = true;
            }
        }

        assignments
    }
}

impl Default for ByteTracker {
    fn default() -> Self {
        Self::new(ByteTrackConfig::default())
    }
}

impl Tracker for ByteTracker {
    /// 更新跟踪 (ByteTrack 三步匹配)
    fn update(&mut self, detections: &[Detection]) -> Vec<Detection> {
        // 0. 所有轨迹先预测
        for track in &mut self.tracks {
            track.kalman.predict();
        }

        // 1. 分离高低分检测框
        let mut high_dets: Vec<(usize, &Detection)> = Vec::new();
        let mut low_dets: Vec<(usize, &Detection)> = Vec::new();
        for (idx, det) in detections.iter().enumerate() {
            if det.confidence >= self.config.high_score_threshold {
                high_dets.push((idx, det));
            } else if det.confidence >= self.config.low_score_threshold {
                low_dets.push((idx, det));
            }
        }

        let mut assigned: Vec<Option<u32>> = vec![None; detections.len()];
        let mut matched_track = vec![false; self.tracks.len()];

        // 2. 第一轮匹配: 高分检测 + 所有轨迹
        let all_tracks: Vec<usize> = (0..self.tracks.len()).collect();
        let assignments =
            self.match_detections_to_tracks(&high_dets, &all_tracks, self.config.high_iou_threshold);
        for (det_idx, track_idx) in assignments {
            matched_track[track_idx] = true;
            assigned[det_idx] = Some(self.tracks[track_idx].id);
            self.tracks[track_idx].update(&detections[det_idx].bbox);
        }

        // 3. 第二轮匹配: 低分检测 + 未匹配的轨迹 (救援)
        let unmatched_tracks: Vec<usize> = (0..self.tracks.len())
            .filter(|&idx| !matched_track[idx])
            .collect();
        let low_assignments = self.match_detections_to_tracks(
            &low_dets,
            &unmatched_tracks,
            self.config.low_iou_threshold,
        );
        for (det_idx, track_idx) in low_assignments {
            matched_track[track_idx] = true;
            assigned[det_idx] = Some(self.tracks[track_idx].id);
            self.tracks[track_idx].update(&detections[det_idx].bbox);
        }

        // 4. 未匹配的轨迹 → 标记丢失
        for (track, matched) in self.tracks.iter_mut().zip(&matched_track) {
            if !matched {
                track.frames_lost += 1;
            }
        }

        // 5. 未匹配的高分检测 → 新建轨迹
        for &(det_idx, det) in &high_dets {
            if assigned[det_idx].is_none() {
                let id = self.next_id;
                self.next_id += 1;
                self.tracks.push(Track::new(id, &det.bbox, self.config.kalman));
                assigned[det_idx] = Some(id);
            }
        }

        // 6. 删除丢失太久的轨迹
        let max_lost = self.config.max_lost_frames;
        self.tracks.retain(|t| t.frames_lost <= max_lost);

        detections
            .iter()
            .zip(assigned)
            .filter_map(|(det, id)| {
                id.map(|id| Detection {
                    tracker_id: Some(id),
                    ..*det
                })
            })
            .collect()
    }

    fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::ClassId;

    fn det(x: f32, conf: f32) -> Detection {
        Detection::new(BBox::new(x, 10.0, x + 20.0, 50.0), conf, ClassId::Player)
    }

    #[test]
    fn ids_stay_stable_across_frames() {
        let mut tracker = ByteTracker::default();
        let first = tracker.update(&[det(0.0, 0.9), det(200.0, 0.8)]);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].tracker_id, Some(1));
        assert_eq!(first[1].tracker_id, Some(2));

        let second = tracker.update(&[det(203.0, 0.85), det(2.0, 0.9)]);
        assert_eq!(second[0].tracker_id, Some(2));
        assert_eq!(second[1].tracker_id, Some(1));
        // 输出框为本帧原始检测框
        assert_eq!(second[0].bbox, det(203.0, 0.85).bbox);
    }

    #[test]
    fn low_score_detection_rescues_existing_track_only() {
        let mut tracker = ByteTracker::default();
        tracker.update(&[det(0.0, 0.9)]);
        let out = tracker.update(&[det(1.0, 0.15), det(400.0, 0.15)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].tracker_id, Some(1));
    }

    #[test]
    fn lost_tracks_are_dropped_and_ids_keep_counting() {
        let mut tracker = ByteTracker::new(ByteTrackConfig {
            max_lost_frames: 2,
            ..Default::default()
        });
        tracker.update(&[det(0.0, 0.9)]);
        for _ in 0..3 {
            tracker.update(&[]);
        }
        assert_eq!(tracker.track_count(), 0);

        let out = tracker.update(&[det(100.0, 0.9)]);
        assert_eq!(out[0].tracker_id, Some(2));
    }
}
