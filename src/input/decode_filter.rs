// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// FFmpeg解码过滤器模块
/// FFmpeg decode filter module
use crossbeam_channel::Sender;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};
use image::RgbImage;

/// FFmpeg解码过滤器: 视频文件 → RGB24帧 (按步长抽帧)
pub struct DecodeFilter {
    tx: Sender<RgbImage>,
    stride: usize,
    index: usize,
    sent: usize,
}

impl DecodeFilter {
    pub fn new(tx: Sender<RgbImage>, stride: usize) -> Self {
        Self {
            tx,
            stride: stride.max(1),
            index: 0,
            sent: 0,
        }
    }
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        log::debug!("✅ 解码线程启动 (步长 {})", self.stride);
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        unsafe {
            if frame.as_ptr().is_null() {
                return Ok(Some(frame));
            }

            let index = self.index;
            self.index += 1;
            if index % self.stride != 0 {
                return Ok(Some(frame));
            }

            // 滤镜链已转换为 rgb24, 单平面按行拷贝
            let w = (*frame.as_ptr()).width as u32;
            let h = (*frame.as_ptr()).height as u32;
            let data = (*frame.as_ptr()).data[0];
            let stride = (*frame.as_ptr()).linesize[0] as usize;
            if data.is_null() || w == 0 || h == 0 {
                return Ok(Some(frame));
            }

            let row_bytes = w as usize * 3;
            let mut rgb = vec![0u8; row_bytes * h as usize];
            for y in 0..h as usize {
                let src = std::slice::from_raw_parts(data.add(y * stride), row_bytes);
                rgb[y * row_bytes..(y + 1) * row_bytes].copy_from_slice(src);
            }

            let image = RgbImage::from_raw(w, h, rgb).ok_or("帧尺寸与数据长度不一致")?;

            // 接收端已关闭 (处理失败或提前结束) → 中止解码
            self.tx
                .send(image)
                .map_err(|_| "frame receiver closed".to_string())?;
            self.sent += 1;

            Ok(Some(frame))
        }
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        log::debug!("✅ 解码线程退出: 读取 {} 帧, 输出 {} 帧", self.index, self.sent);
    }
}
