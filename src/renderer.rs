// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 帧标注渲染器
//!
//! - 椭圆: 球员脚下半开口椭圆弧, 颜色按队伍/裁判
//! - 标签: `#跟踪ID`, 位于底边中点
//! - 三角形: 足球上方的倒三角

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_polygon_mut, draw_text_mut, text_size,
};
use imageproc::point::Point as PolyPoint;
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

use crate::detection::{Detection, LabeledDetection};

// ========== 颜色 ==========

/// 调色板: 索引 0 = A 队, 1 = B 队, 2 = 裁判
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ColorPalette {
    pub colors: Vec<[u8; 3]>,
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self {
            colors: vec![[0, 191, 255], [255, 20, 147], [255, 215, 0]], // #00BFFF #FF1493 #FFD700
        }
    }
}

impl ColorPalette {
    pub fn by_index(&self, idx: usize) -> Rgb<u8> {
        if self.colors.is_empty() {
            return Rgb([255, 255, 255]);
        }
        Rgb(self.colors[idx % self.colors.len()])
    }
}

// ========== 绘制基础 ==========

/// 粗线段 (用四边形填充)
pub fn draw_thick_line_mut(
    img: &mut RgbImage,
    start: (f32, f32),
    end: (f32, f32),
    thickness: f32,
    color: Rgb<u8>,
) {
    let (dx, dy) = (end.0 - start.0, end.1 - start.1);
    let len = (dx * dx + dy * dy).sqrt();
    let half = (thickness / 2.0).max(0.5);
    if len < 0.5 {
        draw_filled_circle_mut(
            img,
            (start.0.round() as i32, start.1.round() as i32),
            half.round() as i32,
            color,
        );
        return;
    }

    // 法向量偏移
    let (nx, ny) = (-dy / len * half, dx / len * half);
    let corners = [
        (start.0 + nx, start.1 + ny),
        (end.0 + nx, end.1 + ny),
        (end.0 - nx, end.1 - ny),
        (start.0 - nx, start.1 - ny),
    ];
    let mut poly: Vec<PolyPoint<i32>> = Vec::with_capacity(4);
    for (x, y) in corners {
        let p = PolyPoint::new(x.round() as i32, y.round() as i32);
        if poly.last() != Some(&p) {
            poly.push(p);
        }
    }
    if poly.len() > 1 && poly.first() == poly.last() {
        poly.pop();
    }
    if poly.len() < 3 {
        imageproc::drawing::draw_line_segment_mut(img, start, end, color);
        return;
    }
    draw_polygon_mut(img, &poly, color);
}

/// 空心圆 (指定线宽)
pub fn draw_circle_outline_mut(
    img: &mut RgbImage,
    center: (i32, i32),
    radius: i32,
    thickness: i32,
    color: Rgb<u8>,
) {
    let thickness = thickness.max(1);
    let inner = radius - thickness / 2;
    for r in inner.max(0)..inner.max(0) + thickness {
        imageproc::drawing::draw_hollow_circle_mut(img, center, r, color);
    }
}

/// 椭圆弧 (角度单位: 度, 0° 指向 +x, 顺时针为正, 与图像坐标一致)
pub fn draw_ellipse_arc_mut(
    img: &mut RgbImage,
    center: (f32, f32),
    axes: (f32, f32),
    start_angle: f32,
    end_angle: f32,
    thickness: f32,
    color: Rgb<u8>,
) {
    if axes.0 <= 0.0 || axes.1 <= 0.0 {
        return;
    }
    const STEP: f32 = 5.0;
    let point_at = |deg: f32| {
        let rad = deg.to_radians();
        (center.0 + axes.0 * rad.cos(), center.1 + axes.1 * rad.sin())
    };
    let mut angle = start_angle;
    let mut prev = point_at(angle);
    while angle < end_angle {
        angle = (angle + STEP).min(end_angle);
        let next = point_at(angle);
        draw_thick_line_mut(img, prev, next, thickness, color);
        prev = next;
    }
}

// ========== 标注器 ==========

/// 标注器参数
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnnotatorStyle {
    pub palette: ColorPalette,
    pub ellipse_thickness: f32,
    pub ellipse_start_angle: f32,
    pub ellipse_end_angle: f32,
    pub label_text_color: [u8; 3],
    pub label_font_size: f32,
    pub label_padding: u32,
    pub ball_color: [u8; 3],
    pub triangle_base: f32,
    pub triangle_height: f32,
    pub triangle_outline_thickness: f32,
}

impl Default for AnnotatorStyle {
    fn default() -> Self {
        Self {
            palette: ColorPalette::default(),
            ellipse_thickness: 2.0,
            ellipse_start_angle: -45.0,
            ellipse_end_angle: 235.0,
            label_text_color: [0, 0, 0],
            label_font_size: 16.0,
            label_padding: 10,
            ball_color: [255, 215, 0],
            triangle_base: 25.0,
            triangle_height: 21.0,
            triangle_outline_thickness: 1.0,
        }
    }
}

/// 内置标签字体 (DejaVu Sans)
static BUNDLED_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// 内置字体
pub fn bundled_font() -> Option<FontVec> {
    match FontVec::try_from_vec(BUNDLED_FONT.to_vec()) {
        Ok(font) => Some(font),
        Err(e) => {
            log::error!("❌ 内置字体解析失败: {}, 跟踪标签将不显示", e);
            None
        }
    }
}

/// 加载标签字体, 文件不可用时回退到内置字体
pub fn load_font(path: &Path) -> Option<FontVec> {
    match std::fs::read(path) {
        Ok(bytes) => match FontVec::try_from_vec(bytes) {
            Ok(font) => {
                log::info!("✅ 字体加载成功: {}", path.display());
                return Some(font);
            }
            Err(e) => log::warn!("⚠️ 字体解析失败 {}: {}, 使用内置字体", path.display(), e),
        },
        Err(e) => log::warn!("⚠️ 字体文件不可读 {}: {}, 使用内置字体", path.display(), e),
    }
    bundled_font()
}

/// 跟踪视频的帧标注器
pub struct FrameAnnotator {
    style: AnnotatorStyle,
    font: Option<FontVec>,
}

impl FrameAnnotator {
    pub fn new(style: AnnotatorStyle, font: Option<FontVec>) -> Self {
        Self { style, font }
    }

    /// 依次绘制: 椭圆 → 标签 → 足球三角
    pub fn annotate(&self, frame: &mut RgbImage, objects: &[LabeledDetection], ball: &[Detection]) {
        for obj in objects {
            self.draw_ellipse(frame, obj);
        }
        if let Some(font) = &self.font {
            for obj in objects {
                if let Some(id) = obj.detection.tracker_id {
                    self.draw_label(frame, font, obj, &format!("#{}", id));
                }
            }
        }
        for b in ball {
            self.draw_triangle(frame, b);
        }
    }

    fn draw_ellipse(&self, frame: &mut RgbImage, obj: &LabeledDetection) {
        let bbox = &obj.detection.bbox;
        let anchor = bbox.bottom_center();
        let width = bbox.width();
        draw_ellipse_arc_mut(
            frame,
            (anchor.x, anchor.y),
            (width, 0.35 * width),
            self.style.ellipse_start_angle,
            self.style.ellipse_end_angle,
            self.style.ellipse_thickness,
            self.style.palette.by_index(obj.role.palette_index()),
        );
    }

    fn draw_label(&self, frame: &mut RgbImage, font: &FontVec, obj: &LabeledDetection, text: &str) {
        let scale = PxScale::from(self.style.label_font_size);
        let (tw, th) = text_size(scale, font, text);
        let pad = self.style.label_padding;
        let (box_w, box_h) = (tw + 2 * pad, th + 2 * pad);

        // 标签框中心对齐检测框底边中点
        let anchor = obj.detection.bbox.bottom_center();
        let x = (anchor.x - box_w as f32 / 2.0).round() as i32;
        let y = (anchor.y - box_h as f32 / 2.0).round() as i32;

        let background = self.style.palette.by_index(obj.role.palette_index());
        draw_filled_rect_mut(frame, Rect::at(x, y).of_size(box_w, box_h), background);
        draw_text_mut(
            frame,
            Rgb(self.style.label_text_color),
            x + pad as i32,
            y + pad as i32,
            scale,
            font,
            text,
        );
    }

    fn draw_triangle(&self, frame: &mut RgbImage, ball: &Detection) {
        let top = ball.bbox.top_center();
        let half = self.style.triangle_base / 2.0;
        let h = self.style.triangle_height;
        let corners = [
            (top.x - half, top.y - h),
            (top.x + half, top.y - h),
            (top.x, top.y),
        ];
        let poly: Vec<PolyPoint<i32>> = corners
            .iter()
            .map(|&(x, y)| PolyPoint::new(x.round() as i32, y.round() as i32))
            .collect();
        if poly[0] == poly[1] || poly[1] == poly[2] || poly[0] == poly[2] {
            return;
        }
        draw_polygon_mut(frame, &poly, Rgb(self.style.ball_color));

        let outline = Rgb([0, 0, 0]);
        for i in 0..3 {
            draw_thick_line_mut(
                frame,
                corners[i],
                corners[(i + 1) % 3],
                self.style.triangle_outline_thickness,
                outline,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{BBox, ClassId, Role, Team};

    #[test]
    fn ellipse_uses_team_color_and_triangle_uses_ball_color() {
        let mut frame = RgbImage::new(200, 200);
        let style = AnnotatorStyle::default();
        let annotator = FrameAnnotator::new(style.clone(), None);

        let player = LabeledDetection {
            detection: Detection {
                tracker_id: Some(7),
                ..Detection::new(BBox::new(80.0, 60.0, 120.0, 140.0), 0.9, ClassId::Player)
            },
            role: Role::Team(Team::B),
        };
        let ball = Detection::new(BBox::new(90.0, 30.0, 110.0, 50.0), 0.8, ClassId::Ball);
        annotator.annotate(&mut frame, &[player], &[ball]);

        // 椭圆最下方 (90°) 位于 (100, 140 + 0.35 * 40)
        assert_eq!(*frame.get_pixel(100, 154), style.palette.by_index(1));
        // 三角形内部
        assert_eq!(*frame.get_pixel(100, 20), Rgb(style.ball_color));
    }

    #[test]
    fn tracker_ids_are_labelled_with_bundled_font() {
        let style = AnnotatorStyle::default();
        let player = LabeledDetection {
            detection: Detection {
                tracker_id: Some(7),
                ..Detection::new(BBox::new(80.0, 60.0, 120.0, 140.0), 0.9, ClassId::Player)
            },
            role: Role::Team(Team::A),
        };
        // 黑色文字 (抗锯齿后仍明显偏暗)
        let text_pixels = |frame: &RgbImage| {
            (70..130)
                .flat_map(|x| (110..170).map(move |y| (x, y)))
                .filter(|&(x, y)| frame.get_pixel(x, y).0.iter().map(|&c| c as u32).sum::<u32>() < 150)
                .count()
        };

        let mut plain = RgbImage::from_pixel(200, 200, Rgb([34, 139, 34]));
        FrameAnnotator::new(style.clone(), None).annotate(&mut plain, &[player], &[]);
        assert_eq!(text_pixels(&plain), 0);

        // 配置的字体不存在时回退到内置字体
        let font = load_font(Path::new("no/such/font.ttf"));
        assert!(font.is_some());
        let mut labelled = RgbImage::from_pixel(200, 200, Rgb([34, 139, 34]));
        FrameAnnotator::new(style.clone(), font).annotate(&mut labelled, &[player], &[]);
        assert!(text_pixels(&labelled) > 0);
        // 标签底色为队伍颜色, 覆盖底边中点
        assert_eq!(*labelled.get_pixel(100, 128), style.palette.by_index(0));
    }

    #[test]
    fn degenerate_shapes_do_not_panic() {
        let mut frame = RgbImage::new(10, 10);
        draw_thick_line_mut(&mut frame, (2.0, 2.0), (2.0, 2.0), 4.0, Rgb([255, 0, 0]));
        draw_ellipse_arc_mut(&mut frame, (5.0, 5.0), (0.0, 0.0), -45.0, 235.0, 2.0, Rgb([1, 1, 1]));
        let annotator = FrameAnnotator::new(AnnotatorStyle::default(), None);
        let tiny = Detection::new(BBox::new(-50.0, -50.0, -50.0, -50.0), 0.5, ClassId::Ball);
        annotator.annotate(&mut frame, &[], &[tiny]);
    }
}
