// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 球场 (Pitch)
///
/// - config: 球场尺寸与 32 个关键点
/// - view:   单应性变换 (画面 → 球场)
/// - draw:   俯视图绘制
pub mod config;
pub mod draw;
pub mod view;

pub use config::SoccerPitchConfiguration;
pub use draw::{draw_pitch, draw_pitch_voronoi_diagram, draw_points_on_pitch, PitchStyle};
pub use view::ViewTransformer;
