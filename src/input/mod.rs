// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 视频读写 (Video I/O)
///
/// - FrameSource: 按顺序逐帧读取 (可按步长抽帧)
/// - FrameSink:   按顺序逐帧写入
/// - VideoBackend: 打开 / 创建 / 探测视频 (FFmpeg 实现见 `ffmpeg.rs`)
use std::path::Path;

use image::RgbImage;

use crate::error::{Error, Result};

#[cfg(feature = "ffmpeg")]
pub mod decode_filter;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

#[cfg(feature = "ffmpeg")]
pub use ffmpeg::FfmpegBackend;

/// 支持上传的容器格式
pub const SUPPORTED_CONTAINERS: [&str; 3] = ["mp4", "avi", "mov"];

/// 检查文件扩展名是否为支持的容器
pub fn check_container(path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if SUPPORTED_CONTAINERS.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(Error::UnsupportedContainer(ext))
    }
}

/// 视频基本信息
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// 容器记录的总帧数 (可能缺失)
    pub total_frames: Option<u64>,
}

/// yuv420p 编码要求宽高为偶数: 奇数边向上补齐一个像素
pub fn even_size(width: u32, height: u32) -> (u32, u32) {
    (width + width % 2, height + height % 2)
}

/// 将帧扩展到 `width × height` (复制最右列 / 最下行), 返回 rgb24 原始数据
pub fn pad_frame(frame: &RgbImage, width: u32, height: u32) -> Vec<u8> {
    let (w, h) = frame.dimensions();
    if (w, h) == (width, height) {
        return frame.as_raw().clone();
    }
    let mut padded = RgbImage::new(width, height);
    for (x, y, pixel) in padded.enumerate_pixels_mut() {
        *pixel = *frame.get_pixel(x.min(w - 1), y.min(h - 1));
    }
    padded.into_raw()
}

/// 逐帧读取
pub trait FrameSource: Send {
    /// 读取下一帧, 结束时返回 None
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;
}

/// 逐帧写入
pub trait FrameSink: Send {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;

    /// 写入结束并落盘
    fn finish(self: Box<Self>) -> Result<()>;
}

/// 视频后端
pub trait VideoBackend: Send + Sync {
    fn probe(&self, path: &Path) -> Result<VideoInfo>;

    /// 打开视频, `stride` 为抽帧步长 (1 = 每帧)
    fn open(&self, path: &Path, stride: usize) -> Result<Box<dyn FrameSource>>;

    /// 创建输出视频, 帧尺寸固定为 width × height
    fn create(&self, path: &Path, width: u32, height: u32, fps: f64) -> Result<Box<dyn FrameSink>>;
}
