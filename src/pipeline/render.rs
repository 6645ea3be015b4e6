// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 三种输出的逐帧绘制
//!
//! - Tracking: 原画面 + 椭圆 / 标签 / 足球三角
//! - Radar:    俯视球场 + 足球 / 两队 / 裁判
//! - Voronoi:  俯视球场 + 两队控制区域 + 足球 / 球员

use image::{Rgb, RgbImage};

use super::frame::FrameObjects;
use super::Visualization;
use crate::detection::{Point, Role, Team};
use crate::error::{Error, Result};
use crate::models::KeypointModel;
use crate::pitch::{
    draw_pitch, draw_pitch_voronoi_diagram, draw_points_on_pitch, PitchStyle,
    SoccerPitchConfiguration, ViewTransformer,
};
use crate::renderer::FrameAnnotator;
use crate::settings::PipelineSettings;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// 球场点的默认描边宽度
const RADAR_EDGE_THICKNESS: i32 = 2;
const VORONOI_EDGE_THICKNESS: i32 = 1;

/// 关键点 → 单应性 (画面 → 球场)
pub struct PitchProjector<'a> {
    model: &'a mut dyn KeypointModel,
    vertices: Vec<Point>,
    confidence: f32,
    threshold: f32,
}

impl<'a> PitchProjector<'a> {
    pub fn new(
        model: &'a mut dyn KeypointModel,
        config: &SoccerPitchConfiguration,
        confidence: f32,
        threshold: f32,
    ) -> Self {
        Self {
            model,
            vertices: config.vertices(),
            confidence,
            threshold,
        }
    }

    /// 只使用置信度严格大于阈值的关键点
    pub fn fit(&mut self, frame: &RgbImage) -> Result<ViewTransformer> {
        let keypoints = self
            .model
            .keypoints(frame, self.confidence)
            .map_err(Error::Model)?;
        if keypoints.len() != self.vertices.len() {
            return Err(Error::Model(anyhow::anyhow!(
                "keypoint model returned {} keypoints, pitch has {}",
                keypoints.len(),
                self.vertices.len()
            )));
        }

        let (frame_points, pitch_points): (Vec<Point>, Vec<Point>) = keypoints
            .iter()
            .zip(&self.vertices)
            .filter(|(k, _)| k.confidence > self.threshold)
            .map(|(k, v)| (Point::new(k.x, k.y), *v))
            .unzip();
        ViewTransformer::new(&frame_points, &pitch_points)
    }
}

/// 按输出类型绘制单帧
pub struct FrameRenderer<'a> {
    kind: Visualization,
    annotator: &'a FrameAnnotator,
    projector: Option<PitchProjector<'a>>,
    settings: &'a PipelineSettings,
    /// 空球场 (每帧复制)
    base: RgbImage,
}

impl<'a> FrameRenderer<'a> {
    pub fn new(
        kind: Visualization,
        annotator: &'a FrameAnnotator,
        projector: Option<PitchProjector<'a>>,
        config: &SoccerPitchConfiguration,
        settings: &'a PipelineSettings,
    ) -> Result<Self> {
        let base = match kind {
            Visualization::Tracking => RgbImage::new(0, 0),
            Visualization::Radar => draw_pitch(config, &settings.radar_pitch),
            Visualization::Voronoi => draw_pitch(config, &settings.voronoi_pitch),
        };
        if kind.needs_keypoints() && projector.is_none() {
            return Err(Error::Model(anyhow::anyhow!(
                "{} output needs a keypoint model",
                kind.file_prefix()
            )));
        }
        Ok(Self {
            kind,
            annotator,
            projector,
            settings,
            base,
        })
    }

    pub fn render(&mut self, frame: &RgbImage, objects: &FrameObjects) -> Result<RgbImage> {
        match self.kind {
            Visualization::Tracking => {
                let mut annotated = frame.clone();
                self.annotator
                    .annotate(&mut annotated, &objects.objects, &objects.ball);
                Ok(annotated)
            }
            Visualization::Radar => {
                let transformer = self.fit(frame)?;
                self.render_radar(&transformer, objects)
            }
            Visualization::Voronoi => {
                let transformer = self.fit(frame)?;
                self.render_voronoi(&transformer, objects)
            }
        }
    }

    fn fit(&mut self, frame: &RgbImage) -> Result<ViewTransformer> {
        match self.projector.as_mut() {
            Some(projector) => projector.fit(frame),
            None => Err(Error::Model(anyhow::anyhow!("missing keypoint model"))),
        }
    }

    fn render_radar(&self, t: &ViewTransformer, objects: &FrameObjects) -> Result<RgbImage> {
        let s = self.settings;
        let style: &PitchStyle = &s.radar_pitch;
        let palette = &s.annotator.palette;
        let mut pitch = self.base.clone();

        let ball = t.transform_points(&objects.ball_anchors());
        draw_points_on_pitch(
            &mut pitch,
            style,
            &ball,
            WHITE,
            BLACK,
            s.radar_ball_radius,
            RADAR_EDGE_THICKNESS,
        );
        for role in [Role::Team(Team::A), Role::Team(Team::B), Role::Referee] {
            let points = t.transform_points(&objects.anchors(role));
            draw_points_on_pitch(
                &mut pitch,
                style,
                &points,
                palette.by_index(role.palette_index()),
                BLACK,
                s.radar_player_radius,
                RADAR_EDGE_THICKNESS,
            );
        }
        Ok(pitch)
    }

    fn render_voronoi(&self, t: &ViewTransformer, objects: &FrameObjects) -> Result<RgbImage> {
        let s = self.settings;
        let style: &PitchStyle = &s.voronoi_pitch;
        let palette = &s.annotator.palette;
        let color_a = palette.by_index(Role::Team(Team::A).palette_index());
        let color_b = palette.by_index(Role::Team(Team::B).palette_index());
        let mut pitch = self.base.clone();

        // 裁判不参与控制区域
        let team_a = t.transform_points(&objects.team_anchors(Team::A));
        let team_b = t.transform_points(&objects.team_anchors(Team::B));
        draw_pitch_voronoi_diagram(
            &mut pitch,
            style,
            &team_a,
            &team_b,
            color_a,
            color_b,
            s.voronoi_opacity,
        );

        let ball = t.transform_points(&objects.ball_anchors());
        draw_points_on_pitch(
            &mut pitch,
            style,
            &ball,
            WHITE,
            WHITE,
            s.voronoi_ball_radius,
            VORONOI_EDGE_THICKNESS,
        );
        for (points, color) in [(&team_a, color_a), (&team_b, color_b)] {
            draw_points_on_pitch(
                &mut pitch,
                style,
                points,
                color,
                WHITE,
                s.voronoi_player_radius,
                VORONOI_EDGE_THICKNESS,
            );
        }
        Ok(pitch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Keypoint;

    struct Scripted(Vec<Keypoint>);

    impl KeypointModel for Scripted {
        fn keypoints(&mut self, _: &RgbImage, _: f32) -> anyhow::Result<Vec<Keypoint>> {
            Ok(self.0.clone())
        }
    }

    /// 画面坐标 = 球场坐标 / 10
    fn scaled_keypoints(config: &SoccerPitchConfiguration, confidence: f32) -> Vec<Keypoint> {
        config
            .vertices()
            .iter()
            .map(|v| Keypoint {
                x: v.x / 10.0,
                y: v.y / 10.0,
                confidence,
            })
            .collect()
    }

    #[test]
    fn projector_maps_frame_to_pitch() {
        let config = SoccerPitchConfiguration::default();
        let mut model = Scripted(scaled_keypoints(&config, 0.9));
        let mut projector = PitchProjector::new(&mut model, &config, 0.3, 0.5);
        let t = projector.fit(&RgbImage::new(8, 8)).unwrap();
        let p = t.transform_points(&[Point::new(600.0, 350.0)]);
        assert!((p[0].x - 6000.0).abs() < 0.5);
        assert!((p[0].y - 3500.0).abs() < 0.5);
    }

    #[test]
    fn keypoints_at_threshold_are_not_used() {
        let config = SoccerPitchConfiguration::default();
        let mut model = Scripted(scaled_keypoints(&config, 0.5));
        let mut projector = PitchProjector::new(&mut model, &config, 0.3, 0.5);
        assert!(matches!(
            projector.fit(&RgbImage::new(8, 8)),
            Err(Error::InsufficientKeypoints { found: 0 })
        ));
    }

    #[test]
    fn wrong_keypoint_count_is_a_model_error() {
        let config = SoccerPitchConfiguration::default();
        let mut model = Scripted(vec![Keypoint::default(); 5]);
        let mut projector = PitchProjector::new(&mut model, &config, 0.3, 0.5);
        assert!(matches!(
            projector.fit(&RgbImage::new(8, 8)),
            Err(Error::Model(_))
        ));
    }

    #[test]
    fn radar_without_projector_is_rejected() {
        let config = SoccerPitchConfiguration::default();
        let settings = PipelineSettings::default();
        let annotator = FrameAnnotator::new(settings.annotator.clone(), None);
        assert!(
            FrameRenderer::new(Visualization::Radar, &annotator, None, &config, &settings).is_err()
        );
    }
}
