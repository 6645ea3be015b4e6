// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 单帧处理: 检测 → 足球外扩 → NMS → 跟踪 → 分队 → 守门员归队 → 合并

use image::RgbImage;

use crate::detection::{
    ByteTracker, ClassId, Detection, LabeledDetection, Point, Role, Team, Tracker,
};
use crate::error::{Error, Result};
use crate::models::Detector;
use crate::non_max_suppression;
use crate::settings::PipelineSettings;
use crate::team::{GoalkeeperResolver, TeamClassifier};

/// 单帧处理结果
#[derive(Debug, Clone, Default)]
pub struct FrameObjects {
    /// 已外扩的足球框
    pub ball: Vec<Detection>,
    /// 合并顺序: 球员, 守门员, 裁判
    pub objects: Vec<LabeledDetection>,
}

impl FrameObjects {
    /// 指定角色的底边中点
    pub fn anchors(&self, role: Role) -> Vec<Point> {
        self.objects
            .iter()
            .filter(|o| o.role == role)
            .map(|o| o.detection.bbox.bottom_center())
            .collect()
    }

    /// 球员 + 守门员中属于某队的底边中点
    pub fn team_anchors(&self, team: Team) -> Vec<Point> {
        self.anchors(Role::Team(team))
    }

    pub fn ball_anchors(&self) -> Vec<Point> {
        self.ball.iter().map(|b| b.bbox.bottom_center()).collect()
    }
}

/// 裁剪检测框区域 (框先裁剪到画面内, 空区域返回 None)
pub fn crop(frame: &RgbImage, det: &Detection) -> Option<RgbImage> {
    let (w, h) = frame.dimensions();
    let b = det.bbox.clamp_to(w, h);
    let x = b.x1.floor() as u32;
    let y = b.y1.floor() as u32;
    let cw = (b.x2.ceil() as u32).saturating_sub(x);
    let ch = (b.y2.ceil() as u32).saturating_sub(y);
    if cw == 0 || ch == 0 {
        return None;
    }
    Some(image::imageops::crop_imm(frame, x, y, cw, ch).to_image())
}

/// 逐帧处理器 (一次视频处理一份, 跟踪与守门员状态独立)
pub struct FrameProcessor<'a> {
    detector: &'a mut dyn Detector,
    classifier: &'a mut dyn TeamClassifier,
    settings: &'a PipelineSettings,
    confidence: f32,
    tracker: ByteTracker,
    goalkeepers: GoalkeeperResolver,
    frame_index: usize,
}

impl<'a> FrameProcessor<'a> {
    pub fn new(
        detector: &'a mut dyn Detector,
        classifier: &'a mut dyn TeamClassifier,
        settings: &'a PipelineSettings,
        confidence: f32,
    ) -> Self {
        Self {
            detector,
            classifier,
            settings,
            confidence,
            tracker: ByteTracker::new(settings.bytetrack),
            goalkeepers: GoalkeeperResolver::new(),
            frame_index: 0,
        }
    }

    pub fn process(&mut self, frame: &RgbImage) -> Result<FrameObjects> {
        let index = self.frame_index;
        self.frame_index += 1;

        // 1. 检测
        let detections = self
            .detector
            .detect(frame, self.confidence)
            .map_err(Error::Model)?;

        // 2. 足球外扩
        let (w, h) = frame.dimensions();
        let (ball, mut others): (Vec<Detection>, Vec<Detection>) = detections
            .into_iter()
            .partition(|d| d.class_id == ClassId::Ball);
        let ball: Vec<Detection> = ball
            .into_iter()
            .map(|mut d| {
                d.bbox = d.bbox.pad(self.settings.ball_padding_px);
                if self.settings.clamp_ball_padding {
                    d.bbox = d.bbox.clamp_to(w, h);
                }
                d
            })
            .collect();

        // 3. 不分类别 NMS + 4. 跟踪
        non_max_suppression(&mut others, self.settings.nms_iou_threshold);
        let tracked = self.tracker.update(&others);

        // 5. 拆分
        let by_class = |class: ClassId| -> Vec<Detection> {
            tracked.iter().filter(|d| d.class_id == class).copied().collect()
        };
        let players = by_class(ClassId::Player);
        let goalkeepers = by_class(ClassId::Goalkeeper);
        let referees = by_class(ClassId::Referee);

        // 6. 分队
        let player_teams = self.classify(frame, &players)?;
        let player_anchors: Vec<(Point, Team)> = players
            .iter()
            .zip(&player_teams)
            .map(|(d, t)| (d.bbox.bottom_center(), *t))
            .collect();
        let gk_anchors: Vec<Point> = goalkeepers.iter().map(|d| d.bbox.bottom_center()).collect();
        let gk_teams = self.goalkeepers.resolve(&player_anchors, &gk_anchors);

        // 7. 合并: 球员, 守门员, 裁判
        let mut objects = Vec::with_capacity(players.len() + goalkeepers.len() + referees.len());
        objects.extend(players.into_iter().zip(player_teams).map(|(detection, team)| {
            LabeledDetection {
                detection,
                role: Role::Team(team),
            }
        }));
        for (detection, team) in goalkeepers.into_iter().zip(gk_teams) {
            match team {
                Some(team) => objects.push(LabeledDetection {
                    detection,
                    role: Role::Team(team),
                }),
                None => log::debug!("帧 {}: 守门员 {:?} 暂无可归属队伍", index, detection.tracker_id),
            }
        }
        objects.extend(referees.into_iter().map(|detection| LabeledDetection {
            detection,
            role: Role::Referee,
        }));

        log::debug!(
            "帧 {}: 足球 {}, 目标 {}, 轨迹 {}",
            index,
            ball.len(),
            objects.len(),
            self.tracker.track_count()
        );
        Ok(FrameObjects { ball, objects })
    }

    fn classify(&mut self, frame: &RgbImage, players: &[Detection]) -> Result<Vec<Team>> {
        if players.is_empty() {
            return Ok(Vec::new());
        }
        // 空裁剪用 1×1 占位, 保证与球员一一对应
        let crops: Vec<RgbImage> = players
            .iter()
            .map(|d| crop(frame, d).unwrap_or_else(|| RgbImage::new(1, 1)))
            .collect();
        let teams = self.classifier.predict(&crops).map_err(Error::Model)?;
        if teams.len() != players.len() {
            return Err(Error::Model(anyhow::anyhow!(
                "team classifier returned {} labels for {} players",
                teams.len(),
                players.len()
            )));
        }
        Ok(teams)
    }
}
