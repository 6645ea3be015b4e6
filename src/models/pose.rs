// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 本地球场关键点模型 (YOLO Pose ONNX 导出)
// 输出 `[1, 4 + nc + 3 * nk, N]`, 取置信度最高的实例

use std::path::Path;

use anyhow::Result;
use image::RgbImage;
use ndarray::{s, Array, Axis, IxDyn};

use super::{letterbox, KeypointModel, OrtBackend, OrtEP};
use crate::detection::Keypoint;

const KPT_STEP: usize = 3;

pub struct PoseKeypointModel {
    engine: OrtBackend,
    size: u32,
    nk: usize,
}

impl PoseKeypointModel {
    pub fn new(path: &Path, ep: OrtEP, input_size: u32, nk: usize) -> Result<Self> {
        Ok(Self {
            engine: OrtBackend::from_path(path, ep)?,
            size: input_size,
            nk,
        })
    }

    /// 后处理: 置信度最高且不低于阈值的实例 → 关键点 (原图坐标)
    pub fn postprocess(
        preds: &Array<f32, IxDyn>,
        nk: usize,
        ratio: f32,
        conf: f32,
    ) -> Result<Vec<Keypoint>> {
        if preds.ndim() != 3 || preds.shape()[1] < 4 + 1 + KPT_STEP * nk {
            anyhow::bail!(
                "unexpected pose output shape {:?} for {} keypoints",
                preds.shape(),
                nk
            );
        }
        let channels = preds.shape()[1];
        let nc = channels - 4 - KPT_STEP * nk;

        let anchor = preds.index_axis(Axis(0), 0);
        let best = anchor
            .axis_iter(Axis(1))
            .map(|pred| {
                let score = pred
                    .slice(s![4..4 + nc])
                    .iter()
                    .copied()
                    .fold(f32::NEG_INFINITY, f32::max);
                (score, pred)
            })
            .filter(|(score, _)| *score >= conf)
            .max_by(|a, b| a.0.total_cmp(&b.0));

        let Some((_, pred)) = best else {
            return Ok(vec![Keypoint::default(); nk]);
        };

        let kpts = pred.slice(s![channels - KPT_STEP * nk..]);
        Ok((0..nk)
            .map(|i| Keypoint {
                x: kpts[KPT_STEP * i] / ratio,
                y: kpts[KPT_STEP * i + 1] / ratio,
                confidence: kpts[KPT_STEP * i + 2],
            })
            .collect())
    }
}

impl KeypointModel for PoseKeypointModel {
    fn keypoints(&mut self, image: &RgbImage, conf: f32) -> Result<Vec<Keypoint>> {
        let (xs, ratio) = letterbox(image, self.size, self.size);
        let ys = self.engine.run(xs)?;
        let preds = ys
            .first()
            .ok_or_else(|| anyhow::anyhow!("pose model returned no outputs"))?;
        Self::postprocess(preds, self.nk, ratio, conf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_instance_keypoints_are_rescaled() {
        // nc = 1, nk = 2 → 4 + 1 + 6 = 11 通道, 两个候选
        let mut preds = Array::<f32, _>::zeros((1, 11, 2)).into_dyn();
        let weak = [0.0, 0.0, 0.0, 0.0, 0.4, 1.0, 1.0, 0.9, 2.0, 2.0, 0.9];
        let strong = [0.0, 0.0, 0.0, 0.0, 0.8, 10.0, 20.0, 0.7, 30.0, 40.0, 0.2];
        for (j, (w, s)) in weak.iter().zip(strong.iter()).enumerate() {
            preds[[0, j, 0]] = *w;
            preds[[0, j, 1]] = *s;
        }
        let kps = PoseKeypointModel::postprocess(&preds, 2, 0.5, 0.3).unwrap();
        assert_eq!(kps[0], Keypoint { x: 20.0, y: 40.0, confidence: 0.7 });
        assert_eq!(kps[1].confidence, 0.2);
    }

    #[test]
    fn nothing_above_threshold_gives_zero_confidence() {
        let preds = Array::<f32, _>::zeros((1, 11, 3)).into_dyn();
        let kps = PoseKeypointModel::postprocess(&preds, 2, 1.0, 0.3).unwrap();
        assert!(kps.iter().all(|k| k.confidence == 0.0));
    }
}
