#![allow(clippy::type_complexity)]
// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 命令行参数
pub mod detection; // 检测框 / 跟踪
pub mod error; // 错误类型
pub mod input; // 视频读写
pub mod job; // 单次上传的分析任务
pub mod models; // 检测 / 关键点模型
pub mod pipeline; // 逐帧处理流水线
pub mod pitch; // 球场几何与绘制
pub mod renderer; // 帧上标注
pub mod server; // Web 服务
pub mod settings; // 流水线参数 (JSON)
pub mod team; // 分队

pub use crate::detection::{BBox, ClassId, Detection, Keypoint, Point, Role, Team};
pub use crate::error::{Error, ErrorCategory, Result};

/// 非极大值抑制 (不区分类别)
///
/// 按置信度降序, 与已保留框 IoU 大于阈值的框被丢弃
pub fn non_max_suppression(xs: &mut Vec<Detection>, iou_threshold: f32) {
    xs.sort_by(|b1, b2| b2.confidence.total_cmp(&b1.confidence));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            let iou = xs[prev_index].bbox.iou(&xs[index].bbox);
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

/// 按类别分别做非极大值抑制 (检测模型后处理用)
pub fn non_max_suppression_per_class(xs: &mut Vec<Detection>, iou_threshold: f32) {
    let mut kept = Vec::with_capacity(xs.len());
    for class in ClassId::ALL {
        let mut group: Vec<Detection> = xs.iter().filter(|d| d.class_id == class).copied().collect();
        non_max_suppression(&mut group, iou_threshold);
        kept.extend(group);
    }
    kept.sort_by(|b1, b2| b2.confidence.total_cmp(&b1.confidence));
    *xs = kept;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x1: f32, conf: f32, class_id: ClassId) -> Detection {
        Detection::new(BBox::new(x1, 0.0, x1 + 10.0, 10.0), conf, class_id)
    }

    #[test]
    fn nms_is_class_agnostic() {
        // 同一位置的球员和守门员框: 只保留置信度高的那个
        let mut xs = vec![
            det(0.0, 0.6, ClassId::Player),
            det(1.0, 0.9, ClassId::Goalkeeper),
            det(50.0, 0.3, ClassId::Referee),
        ];
        non_max_suppression(&mut xs, 0.5);
        assert_eq!(xs.len(), 2);
        assert_eq!(xs[0].class_id, ClassId::Goalkeeper);
        assert_eq!(xs[1].class_id, ClassId::Referee);
    }

    #[test]
    fn nms_keeps_boxes_at_threshold() {
        // IoU 恰好不超过阈值时保留
        let mut xs = vec![det(0.0, 0.9, ClassId::Player), det(5.0, 0.8, ClassId::Player)];
        let iou = xs[0].bbox.iou(&xs[1].bbox);
        non_max_suppression(&mut xs, iou);
        assert_eq!(xs.len(), 2);
    }

    #[test]
    fn per_class_nms_keeps_overlapping_different_classes() {
        let mut xs = vec![det(0.0, 0.6, ClassId::Player), det(1.0, 0.9, ClassId::Goalkeeper)];
        non_max_suppression_per_class(&mut xs, 0.5);
        assert_eq!(xs.len(), 2);
        assert_eq!(xs[0].class_id, ClassId::Goalkeeper);
    }
}
