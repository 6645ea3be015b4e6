// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLO 检测模型
// 包含: 模型加载、预处理、推理、后处理

use std::path::Path;

use anyhow::Result;
use image::RgbImage;
use ndarray::{s, Array, Axis, IxDyn};

use super::{letterbox, Detector, OrtBackend, OrtEP};
use crate::detection::{BBox, ClassId, Detection};
use crate::non_max_suppression_per_class;

/// YOLO 检测模型 (输出 `[1, 4 + nc, N]`)
pub struct YoloDetector {
    engine: OrtBackend,
    width: u32,
    height: u32,
    iou: f32,
}

impl YoloDetector {
    pub fn new(path: &Path, ep: OrtEP, input_size: u32) -> Result<Self> {
        let engine = OrtBackend::from_path(path, ep)?;
        Ok(Self {
            engine,
            width: input_size,
            height: input_size,
            iou: 0.7,
        })
    }

    pub fn with_iou(mut self, iou: f32) -> Self {
        self.iou = iou;
        self
    }

    /// 后处理: 原始输出 → 检测框 (原图坐标)
    pub fn postprocess(
        preds: &Array<f32, IxDyn>,
        (width_original, height_original): (f32, f32),
        ratio: f32,
        conf: f32,
        iou: f32,
    ) -> Result<Vec<Detection>> {
        const CXYWH_OFFSET: usize = 4;
        if preds.ndim() != 3 || preds.shape()[1] <= CXYWH_OFFSET {
            anyhow::bail!("unexpected detector output shape {:?}", preds.shape());
        }
        let nc = preds.shape()[1] - CXYWH_OFFSET;

        let mut data: Vec<Detection> = Vec::new();
        let anchor = preds.index_axis(Axis(0), 0);
        for pred in anchor.axis_iter(Axis(1)) {
            let bbox = pred.slice(s![0..CXYWH_OFFSET]);
            let clss = pred.slice(s![CXYWH_OFFSET..CXYWH_OFFSET + nc]);

            let Some((id, &confidence)) = clss
                .iter()
                .enumerate()
                .reduce(|max, x| if x.1 > max.1 { x } else { max })
            else {
                continue;
            };
            if confidence < conf {
                continue;
            }
            // 未知类别忽略
            let Some(class_id) = ClassId::from_index(id) else {
                continue;
            };

            let cx = bbox[0] / ratio;
            let cy = bbox[1] / ratio;
            let w = bbox[2] / ratio;
            let h = bbox[3] / ratio;
            let x1 = (cx - w / 2.).clamp(0.0, width_original);
            let y1 = (cy - h / 2.).clamp(0.0, height_original);
            let x2 = (cx + w / 2.).clamp(0.0, width_original);
            let y2 = (cy + h / 2.).clamp(0.0, height_original);

            data.push(Detection::new(BBox::new(x1, y1, x2, y2), confidence, class_id));
        }

        non_max_suppression_per_class(&mut data, iou);
        Ok(data)
    }
}

impl Detector for YoloDetector {
    fn detect(&mut self, image: &RgbImage, conf: f32) -> Result<Vec<Detection>> {
        let (xs, ratio) = letterbox(image, self.width, self.height);
        let ys = self.engine.run(xs)?;
        let preds = ys
            .first()
            .ok_or_else(|| anyhow::anyhow!("detector returned no outputs"))?;
        let (w0, h0) = image.dimensions();
        Self::postprocess(preds, (w0 as f32, h0 as f32), ratio, conf, self.iou)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 构造 `[1, 4 + nc, N]` 输出, 每个候选为 (cx, cy, w, h, scores...)
    fn raw_output(candidates: &[[f32; 9]]) -> Array<f32, IxDyn> {
        let n = candidates.len();
        let mut xs = Array::<f32, _>::zeros((1, 9, n)).into_dyn();
        for (i, c) in candidates.iter().enumerate() {
            for (j, v) in c.iter().enumerate() {
                xs[[0, j, i]] = *v;
            }
        }
        xs
    }

    #[test]
    fn decodes_boxes_back_to_original_scale() {
        // 5 个类别, 最后一个 (id 4) 不属于比赛类别
        let preds = raw_output(&[
            [50.0, 50.0, 20.0, 40.0, 0.0, 0.0, 0.9, 0.0, 0.0],
            [10.0, 10.0, 4.0, 4.0, 0.8, 0.0, 0.0, 0.0, 0.0],
            [30.0, 30.0, 4.0, 4.0, 0.0, 0.0, 0.0, 0.0, 0.95],
            [70.0, 70.0, 4.0, 4.0, 0.0, 0.0, 0.0, 0.1, 0.0],
        ]);
        let dets = YoloDetector::postprocess(&preds, (200.0, 200.0), 0.5, 0.3, 0.7).unwrap();
        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].class_id, ClassId::Player);
        assert_eq!(dets[0].bbox, BBox::new(80.0, 60.0, 120.0, 140.0));
        assert_eq!(dets[1].class_id, ClassId::Ball);
    }

    #[test]
    fn rejects_malformed_output() {
        let preds = Array::<f32, _>::zeros((1, 3)).into_dyn();
        assert!(YoloDetector::postprocess(&preds, (10.0, 10.0), 1.0, 0.3, 0.7).is_err());
    }
}
