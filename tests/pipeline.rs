// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

mod common;

use std::path::Path;

use image::RgbImage;

use common::*;
use pitchlens::detection::{ClassId, Role, Team};
use pitchlens::input::VideoBackend;
use pitchlens::pipeline::{collect_training_crops, FrameProcessor, Pipeline, RunSummary, Visualization};
use pitchlens::pitch::SoccerPitchConfiguration;
use pitchlens::renderer::{bundled_font, FrameAnnotator};
use pitchlens::settings::PipelineSettings;
use pitchlens::team::{ColorHistogramEmbedder, KMeansTeamClassifier};
use pitchlens::Error;

const SOURCE: &str = "match.mp4";
const TARGET: &str = "out.mp4";

fn trained_classifier(settings: &PipelineSettings) -> KMeansTeamClassifier {
    let video = MemoryVideo::new();
    video.add_source(Path::new(SOURCE), vec![scene_frame(); 3]);
    let mut detector = SceneDetector {
        detections: scene_detections(),
    };
    let mut frames = video.open(Path::new(SOURCE), settings.training_stride).unwrap();
    let crops = collect_training_crops(&mut detector, frames.as_mut(), settings.training_confidence)
        .unwrap();
    assert_eq!(crops.len(), 6);
    KMeansTeamClassifier::fit(
        Box::new(ColorHistogramEmbedder::default()),
        &crops,
        &settings.kmeans,
    )
    .unwrap()
}

fn run(
    kind: Visualization,
    keypoints: Vec<pitchlens::detection::Keypoint>,
    frames: usize,
) -> (pitchlens::Result<RunSummary>, Vec<RgbImage>) {
    let settings = PipelineSettings::default();
    let pitch = SoccerPitchConfiguration::default();
    let annotator = FrameAnnotator::new(settings.annotator.clone(), None);
    let mut classifier = trained_classifier(&settings);
    let mut detector = SceneDetector {
        detections: scene_detections(),
    };
    let mut keypoint_model = FixedKeypoints(keypoints);

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join(TARGET);
    let video = MemoryVideo::new();
    video.add_source(Path::new(SOURCE), vec![scene_frame(); frames]);

    let mut pipeline = Pipeline {
        detector: &mut detector,
        classifier: &mut classifier,
        keypoint_model: Some(&mut keypoint_model),
        annotator: &annotator,
        pitch: &pitch,
        settings: &settings,
        confidence: 0.3,
    };
    let mut source = video.open(Path::new(SOURCE), 1).unwrap();
    let sink = video.create(&target, 0, 0, 25.0).unwrap();
    let mut seen = Vec::new();
    let result = pipeline.run(kind, source.as_mut(), sink, &mut |n| seen.push(n));
    let written = video.written(&target).unwrap_or_default();
    if let Ok(summary) = &result {
        assert_eq!(seen, (1..=summary.frames).collect::<Vec<_>>());
        assert_eq!(written.len(), summary.frames);
    }
    (result, written)
}

#[test]
fn tracking_writes_one_annotated_frame_per_input_frame() {
    let (result, _) = run(Visualization::Tracking, missing_pitch_keypoints(), 7);
    let summary = result.unwrap();
    assert_eq!(summary.frames, 7);
    assert_eq!(summary.count(ClassId::Ball), 7);
    assert_eq!(summary.count(ClassId::Player), 42);
    assert_eq!(summary.count(ClassId::Goalkeeper), 7);
    assert_eq!(summary.count(ClassId::Referee), 7);
}

#[test]
fn tracking_frames_keep_source_size_and_are_annotated() {
    let settings = PipelineSettings::default();
    let pitch = SoccerPitchConfiguration::default();
    let annotator = FrameAnnotator::new(settings.annotator.clone(), bundled_font());
    let mut classifier = trained_classifier(&settings);
    let mut detector = SceneDetector {
        detections: scene_detections(),
    };
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join(TARGET);
    let video = MemoryVideo::new();
    video.add_source(Path::new(SOURCE), vec![scene_frame(); 2]);

    let mut pipeline = Pipeline {
        detector: &mut detector,
        classifier: &mut classifier,
        keypoint_model: None,
        annotator: &annotator,
        pitch: &pitch,
        settings: &settings,
        confidence: 0.3,
    };
    let mut source = video.open(Path::new(SOURCE), 1).unwrap();
    let sink = video.create(&target, WIDTH, HEIGHT, 25.0).unwrap();
    pipeline
        .run(Visualization::Tracking, source.as_mut(), sink, &mut |_| {})
        .unwrap();

    let written = video.written(&target).unwrap();
    assert_eq!(written.len(), 2);
    assert_eq!(written[0].dimensions(), (WIDTH, HEIGHT));
    assert_ne!(written[0], scene_frame());
}

#[test]
fn goalkeeper_joins_the_nearer_team() {
    let settings = PipelineSettings::default();
    let mut classifier = trained_classifier(&settings);
    let mut detector = SceneDetector {
        detections: scene_detections(),
    };
    let mut processor = FrameProcessor::new(&mut detector, &mut classifier, &settings, 0.3);
    let objects = processor.process(&scene_frame()).unwrap();

    let role_of = |class: ClassId, x: f32| -> Role {
        objects
            .objects
            .iter()
            .find(|o| o.detection.class_id == class && o.detection.bbox.x1 == x)
            .map(|o| o.role)
            .unwrap()
    };
    let red = role_of(ClassId::Player, 100.0);
    let blue = role_of(ClassId::Player, 480.0);
    assert_ne!(red, blue);
    assert_eq!(role_of(ClassId::Player, 160.0), red);
    assert_eq!(role_of(ClassId::Player, 540.0), blue);
    // 守门员在左侧, 归红队
    assert_eq!(role_of(ClassId::Goalkeeper, 20.0), red);
    assert_eq!(role_of(ClassId::Referee, 310.0), Role::Referee);
    assert!(matches!(red, Role::Team(Team::A) | Role::Team(Team::B)));

    // 合并顺序: 球员, 守门员, 裁判
    let classes: Vec<ClassId> = objects.objects.iter().map(|o| o.detection.class_id).collect();
    assert_eq!(&classes[..6], &[ClassId::Player; 6]);
    assert_eq!(classes[6], ClassId::Goalkeeper);
    assert_eq!(classes[7], ClassId::Referee);
}

#[test]
fn radar_without_usable_keypoints_fails_before_writing() {
    let (result, written) = run(Visualization::Radar, missing_pitch_keypoints(), 3);
    assert!(matches!(result, Err(Error::InsufficientKeypoints { found: 0 })));
    assert!(written.is_empty());
}

#[test]
fn radar_and_voronoi_frames_use_the_pitch_canvas() {
    for kind in [Visualization::Radar, Visualization::Voronoi] {
        let (result, written) = run(kind, visible_pitch_keypoints(), 2);
        assert_eq!(result.unwrap().frames, 2);
        assert!(written.iter().all(|f| f.dimensions() == (1300, 800)));
    }
}

#[test]
fn repeated_runs_give_identical_summaries() {
    let (first, _) = run(Visualization::Tracking, missing_pitch_keypoints(), 5);
    let (second, _) = run(Visualization::Tracking, missing_pitch_keypoints(), 5);
    assert_eq!(first.unwrap(), second.unwrap());
}
