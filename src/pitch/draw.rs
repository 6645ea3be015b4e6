// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 俯视球场绘制: 球场线 / 球员点 / Voronoi 控制区域

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;
use serde::{Deserialize, Serialize};

use super::config::SoccerPitchConfiguration;
use crate::detection::Point;
use crate::renderer::{draw_circle_outline_mut, draw_thick_line_mut};

/// 球场绘制参数
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PitchStyle {
    pub background_color: [u8; 3],
    pub line_color: [u8; 3],
    /// 四周留白 (像素)
    pub padding: u32,
    pub line_thickness: u32,
    /// 点球点半径
    pub point_radius: u32,
    /// 厘米 → 像素 缩放
    pub scale: f32,
}

impl Default for PitchStyle {
    fn default() -> Self {
        Self {
            background_color: [34, 139, 34],
            line_color: [255, 255, 255],
            padding: 50,
            line_thickness: 4,
            point_radius: 8,
            scale: 0.1,
        }
    }
}

impl PitchStyle {
    /// Voronoi 视图: 白底黑线
    pub fn voronoi() -> Self {
        Self {
            background_color: [255, 255, 255],
            line_color: [0, 0, 0],
            ..Self::default()
        }
    }

    /// 输出图像尺寸 (宽, 高)
    pub fn canvas_size(&self, config: &SoccerPitchConfiguration) -> (u32, u32) {
        let w = (config.length * self.scale) as u32 + 2 * self.padding;
        let h = (config.width * self.scale) as u32 + 2 * self.padding;
        (w, h)
    }

    /// 球场坐标 → 画布像素 (浮点计算后饱和转换, 远离球场的点不会溢出)
    fn to_canvas(&self, p: &Point) -> (i32, i32) {
        let pad = self.padding as f32;
        (
            (p.x * self.scale + pad) as i32,
            (p.y * self.scale + pad) as i32,
        )
    }
}

/// 绘制空球场
pub fn draw_pitch(config: &SoccerPitchConfiguration, style: &PitchStyle) -> RgbImage {
    let (w, h) = style.canvas_size(config);
    let mut pitch = RgbImage::from_pixel(w, h, Rgb(style.background_color));
    let line = Rgb(style.line_color);
    let pad = style.padding as i32;

    let vertices = config.vertices();
    for &(start, end) in config.edges() {
        let a = style.to_canvas(&vertices[start - 1]);
        let b = style.to_canvas(&vertices[end - 1]);
        draw_thick_line_mut(
            &mut pitch,
            (a.0 as f32, a.1 as f32),
            (b.0 as f32, b.1 as f32),
            style.line_thickness as f32,
            line,
        );
    }

    let scaled_width = (config.width * style.scale) as i32;
    let scaled_length = (config.length * style.scale) as i32;
    let circle_radius = (config.centre_circle_radius * style.scale) as i32;
    let spot_distance = (config.penalty_spot_distance * style.scale) as i32;

    // 中圈
    draw_circle_outline_mut(
        &mut pitch,
        (scaled_length / 2 + pad, scaled_width / 2 + pad),
        circle_radius,
        style.line_thickness as i32,
        line,
    );

    // 点球点
    for x in [spot_distance + pad, scaled_length - spot_distance + pad] {
        draw_filled_circle_mut(
            &mut pitch,
            (x, scaled_width / 2 + pad),
            style.point_radius as i32,
            line,
        );
    }

    pitch
}

/// 在球场上绘制一组点 (实心圆 + 描边)
pub fn draw_points_on_pitch(
    pitch: &mut RgbImage,
    style: &PitchStyle,
    points: &[Point],
    face_color: Rgb<u8>,
    edge_color: Rgb<u8>,
    radius: i32,
    thickness: i32,
) {
    let (w, h) = (pitch.width() as i32, pitch.height() as i32);
    for p in points {
        if !p.x.is_finite() || !p.y.is_finite() {
            continue;
        }
        // 只绘制与画布相交的点
        let center = style.to_canvas(p);
        if center.0 < -radius || center.1 < -radius || center.0 > w + radius || center.1 > h + radius {
            log::debug!("球场外的点 ({:.0}, {:.0}) 未绘制", p.x, p.y);
            continue;
        }
        draw_filled_circle_mut(pitch, center, radius, face_color);
        draw_circle_outline_mut(pitch, center, radius, thickness, edge_color);
    }
}

/// Voronoi 控制区域, 按 opacity 叠加到球场上
///
/// 每个像素归属距离最近球员所在的队伍 (距离相等归 B 队);
/// 一队为空时全部归另一队, 两队均为空时不修改
pub fn draw_pitch_voronoi_diagram(
    pitch: &mut RgbImage,
    style: &PitchStyle,
    team_a: &[Point],
    team_b: &[Point],
    team_a_color: Rgb<u8>,
    team_b_color: Rgb<u8>,
    opacity: f32,
) {
    if team_a.is_empty() && team_b.is_empty() {
        return;
    }

    let scale_points = |pts: &[Point]| -> Vec<(f32, f32)> {
        pts.iter()
            .filter(|p| p.x.is_finite() && p.y.is_finite())
            .map(|p| (p.x * style.scale, p.y * style.scale))
            .collect()
    };
    let a = scale_points(team_a);
    let b = scale_points(team_b);

    let nearest = |pts: &[(f32, f32)], x: f32, y: f32| -> f32 {
        pts.iter()
            .map(|&(px, py)| (px - x).powi(2) + (py - y).powi(2))
            .fold(f32::INFINITY, f32::min)
    };

    let opacity = opacity.clamp(0.0, 1.0);
    let pad = style.padding as f32;
    for (x, y, pixel) in pitch.enumerate_pixels_mut() {
        let (cx, cy) = (x as f32 - pad, y as f32 - pad);
        let color = if nearest(&a, cx, cy) < nearest(&b, cx, cy) {
            team_a_color
        } else {
            team_b_color
        };
        for c in 0..3 {
            let blended = opacity * color.0[c] as f32 + (1.0 - opacity) * pixel.0[c] as f32;
            pixel.0[c] = blended.round().clamp(0.0, 255.0) as u8;
        }
    }
}
