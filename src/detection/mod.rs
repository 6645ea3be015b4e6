// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测系统 (Detection System)
///
/// - types:     检测框 / 类别 / 队伍标签
/// - tracker:   卡尔曼滤波 + 跟踪器接口
/// - bytetrack: ByteTrack 跟踪算法
pub mod bytetrack;
pub mod tracker;
pub mod types;

pub use bytetrack::{ByteTrackConfig, ByteTracker};
pub use tracker::{KalmanConfig, Tracker};
pub use types::{BBox, ClassId, Detection, Keypoint, LabeledDetection, Point, Role, Team};
