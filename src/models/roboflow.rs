// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 远程球场关键点模型 (Roboflow 托管推理)
//!
//! `POST {api_url}/{model_id}?api_key=..&confidence=..`, 请求体为 base64 编码的 JPEG

use std::io::Cursor;

use anyhow::{Context, Result};
use base64::prelude::*;
use image::RgbImage;
use serde::Deserialize;

use super::KeypointModel;
use crate::detection::Keypoint;

pub const DEFAULT_API_URL: &str = "https://detect.roboflow.com";

#[derive(Debug, Deserialize)]
pub struct InferenceResponse {
    #[serde(default)]
    pub predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
pub struct Prediction {
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub keypoints: Vec<RemoteKeypoint>,
}

#[derive(Debug, Deserialize)]
pub struct RemoteKeypoint {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
    pub class_id: usize,
}

impl InferenceResponse {
    /// 取置信度最高的实例, 按 class_id 放入固定槽位
    pub fn into_keypoints(self, num_keypoints: usize) -> Vec<Keypoint> {
        let mut slots = vec![Keypoint::default(); num_keypoints];
        let best = self
            .predictions
            .into_iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence));
        if let Some(best) = best {
            for kp in best.keypoints {
                if let Some(slot) = slots.get_mut(kp.class_id) {
                    *slot = Keypoint {
                        x: kp.x,
                        y: kp.y,
                        confidence: kp.confidence,
                    };
                }
            }
        }
        slots
    }
}

pub struct RoboflowKeypointModel {
    api_url: String,
    model_id: String,
    api_key: String,
    num_keypoints: usize,
    agent: ureq::Agent,
}

impl RoboflowKeypointModel {
    pub fn new(api_url: &str, model_id: &str, api_key: &str, num_keypoints: usize) -> Result<Self> {
        if api_key.is_empty() {
            anyhow::bail!("keypoint model `{}` needs an API key (ROBOFLOW_API_KEY)", model_id);
        }
        log::info!("✅ 关键点模型: {} (远程)", model_id);
        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            model_id: model_id.trim_matches('/').to_string(),
            api_key: api_key.to_string(),
            num_keypoints,
            agent: ureq::AgentBuilder::new()
                .timeout(std::time::Duration::from_secs(30))
                .build(),
        })
    }
}

impl KeypointModel for RoboflowKeypointModel {
    fn keypoints(&mut self, image: &RgbImage, conf: f32) -> Result<Vec<Keypoint>> {
        let mut jpeg = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
            .context("failed to encode frame as jpeg")?;
        let body = BASE64_STANDARD.encode(&jpeg);

        let url = format!("{}/{}", self.api_url, self.model_id);
        let response: InferenceResponse = self
            .agent
            .post(&url)
            .query("api_key", &self.api_key)
            .query("confidence", &conf.to_string())
            .set("Content-Type", "application/x-www-form-urlencoded")
            .send_string(&body)
            .with_context(|| format!("keypoint request to {} failed", self.model_id))?
            .into_json()
            .context("invalid keypoint response")?;

        Ok(response.into_keypoints(self.num_keypoints))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypoints_land_in_their_class_slot() {
        let json = r#"{
            "predictions": [
                {"confidence": 0.4, "keypoints": [{"x": 1, "y": 1, "confidence": 0.9, "class_id": 0}]},
                {"confidence": 0.9, "keypoints": [
                    {"x": 10.5, "y": 20.0, "confidence": 0.8, "class_id": 3},
                    {"x": 99.0, "y": 98.0, "confidence": 0.7, "class_id": 31},
                    {"x": 5.0, "y": 5.0, "confidence": 0.9, "class_id": 40}
                ]}
            ]
        }"#;
        let response: InferenceResponse = serde_json::from_str(json).unwrap();
        let kps = response.into_keypoints(32);
        assert_eq!(kps.len(), 32);
        assert_eq!(kps[0].confidence, 0.0);
        assert_eq!(kps[3], Keypoint { x: 10.5, y: 20.0, confidence: 0.8 });
        assert_eq!(kps[31].x, 99.0);
    }

    #[test]
    fn no_predictions_means_no_keypoints() {
        let response: InferenceResponse = serde_json::from_str("{}").unwrap();
        assert!(response.into_keypoints(32).iter().all(|k| k.confidence == 0.0));
    }

    #[test]
    fn missing_api_key_is_rejected() {
        assert!(RoboflowKeypointModel::new(DEFAULT_API_URL, "field/1", "", 32).is_err());
    }
}
