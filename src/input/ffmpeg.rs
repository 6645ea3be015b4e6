// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// FFmpeg 视频后端
///
/// 解码: 文件 → `format=rgb24` → DecodeFilter → 有界通道 → FfmpegSource
/// 编码: FfmpegSink → 有界通道 → rawvideo 读回调 → libx264 (yuv420p, 奇数尺寸补齐为偶数)
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::stream_info::{find_video_stream_info, StreamInfo};
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input, Output};
use image::RgbImage;

use super::decode_filter::DecodeFilter;
use super::{check_container, even_size, pad_frame, FrameSink, FrameSource, VideoBackend, VideoInfo};
use crate::error::{Error, Result};

/// FFmpeg 读回调的文件结束返回值 (AVERROR_EOF)
const AVERROR_EOF: i32 = -541478725;

/// 解码 / 编码通道容量 (帧)
const CHANNEL_CAPACITY: usize = 8;

type WorkerHandle = JoinHandle<std::result::Result<(), String>>;

#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegBackend;

impl FfmpegBackend {
    pub fn new() -> Self {
        Self
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl VideoBackend for FfmpegBackend {
    fn probe(&self, path: &Path) -> Result<VideoInfo> {
        check_container(path)?;
        match find_video_stream_info(path_string(path)) {
            Ok(Some(StreamInfo::Video {
                width,
                height,
                fps,
                nb_frames,
                ..
            })) => {
                let info = VideoInfo {
                    width: width as u32,
                    height: height as u32,
                    fps: if (fps as f64) > 0.0 { fps as f64 } else { 25.0 },
                    total_frames: (nb_frames > 0).then_some(nb_frames as u64),
                };
                log::info!(
                    "🎬 {}: {}x{} @ {:.2} fps, {:?} 帧",
                    path.display(),
                    info.width,
                    info.height,
                    info.fps,
                    info.total_frames
                );
                Ok(info)
            }
            Ok(_) => Err(Error::decode(path, "no video stream")),
            Err(e) => Err(Error::decode(path, e)),
        }
    }

    fn open(&self, path: &Path, stride: usize) -> Result<Box<dyn FrameSource>> {
        check_container(path)?;
        if !path.is_file() {
            return Err(Error::decode(path, "file not found"));
        }
        Ok(Box::new(FfmpegSource::spawn(path, stride)))
    }

    fn create(&self, path: &Path, width: u32, height: u32, fps: f64) -> Result<Box<dyn FrameSink>> {
        if width == 0 || height == 0 {
            return Err(Error::encode(
                path,
                format!("frame size {}x{} must be non-zero", width, height),
            ));
        }
        Ok(Box::new(FfmpegSink::spawn(path, width, height, fps)))
    }
}

/// 解码线程 + 帧通道
pub struct FfmpegSource {
    path: PathBuf,
    rx: Option<Receiver<RgbImage>>,
    handle: Option<WorkerHandle>,
}

impl FfmpegSource {
    fn spawn(path: &Path, stride: usize) -> Self {
        let (tx, rx) = bounded(CHANNEL_CAPACITY);
        let url = path_string(path);
        let filter = DecodeFilter::new(tx, stride);
        let handle = std::thread::spawn(move || decode_file(&url, filter));
        Self {
            path: path.to_path_buf(),
            rx: Some(rx),
            handle: Some(handle),
        }
    }

    fn join(&mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => match handle.join() {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(Error::decode(&self.path, e)),
                Err(_) => Err(Error::decode(&self.path, "decoder thread panicked")),
            },
            None => Ok(()),
        }
    }
}

fn decode_file(url: &str, filter: DecodeFilter) -> std::result::Result<(), String> {
    let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
    let pipe = pipe.filter("decode", Box::new(filter));
    let out = create_null_output().add_frame_pipeline(pipe);

    let ctx = FfmpegContext::builder()
        .input(Input::new(url))
        .filter_descs(["format=rgb24"].into())
        .output(out)
        .build()
        .map_err(|e| format!("构建失败: {}", e))?;

    let sch = ctx.start().map_err(|e| format!("启动失败: {}", e))?;
    sch.wait().map_err(|e| format!("解码失败: {}", e))?;
    Ok(())
}

impl FrameSource for FfmpegSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let received = match &self.rx {
            Some(rx) => rx.recv().ok(),
            None => None,
        };
        match received {
            Some(frame) => Ok(Some(frame)),
            None => {
                // 发送端关闭 = 解码线程结束
                self.rx = None;
                self.join()?;
                Ok(None)
            }
        }
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        // 先关闭接收端, 解码线程发送失败后退出
        self.rx.take();
        if let Err(e) = self.join() {
            log::debug!("解码线程提前结束: {}", e);
        }
    }
}

/// 编码线程 + 帧通道
pub struct FfmpegSink {
    path: PathBuf,
    width: u32,
    height: u32,
    /// 编码尺寸 (偶数)
    stream_size: (u32, u32),
    tx: Option<Sender<Vec<u8>>>,
    handle: Option<WorkerHandle>,
}

impl FfmpegSink {
    fn spawn(path: &Path, width: u32, height: u32, fps: f64) -> Self {
        let (tx, rx) = bounded::<Vec<u8>>(CHANNEL_CAPACITY);
        let url = path_string(path);
        let stream_size = even_size(width, height);
        if stream_size != (width, height) {
            log::info!(
                "📐 {}x{} 补齐为 {}x{} 编码",
                width,
                height,
                stream_size.0,
                stream_size.1
            );
        }
        let (sw, sh) = stream_size;
        let handle = std::thread::spawn(move || encode_file(&url, rx, sw, sh, fps));
        Self {
            path: path.to_path_buf(),
            width,
            height,
            stream_size,
            tx: Some(tx),
            handle: Some(handle),
        }
    }

    fn join(&mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => match handle.join() {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(Error::encode(&self.path, e)),
                Err(_) => Err(Error::encode(&self.path, "encoder thread panicked")),
            },
            None => Ok(()),
        }
    }
}

fn encode_file(
    url: &str,
    rx: Receiver<Vec<u8>>,
    width: u32,
    height: u32,
    fps: f64,
) -> std::result::Result<(), String> {
    let mut pending: Vec<u8> = Vec::new();
    let mut offset = 0usize;
    let read_frames = move |buf: &mut [u8]| -> i32 {
        while offset >= pending.len() {
            match rx.recv() {
                Ok(next) => {
                    pending = next;
                    offset = 0;
                }
                Err(_) => return AVERROR_EOF,
            }
        }
        let n = (pending.len() - offset).min(buf.len());
        buf[..n].copy_from_slice(&pending[offset..offset + n]);
        offset += n;
        n as i32
    };

    let video_size = format!("{}x{}", width, height);
    let framerate = format!("{:.3}", fps);
    let input = Input::new_by_read_callback(read_frames)
        .set_format("rawvideo")
        .set_input_opts(
            [
                ("pixel_format", "rgb24"),
                ("video_size", video_size.as_str()),
                ("framerate", framerate.as_str()),
            ]
            .into(),
        );
    let output = Output::from(url).set_video_codec("libx264");

    let ctx = FfmpegContext::builder()
        .input(input)
        .filter_descs(["format=yuv420p"].into())
        .output(output)
        .build()
        .map_err(|e| format!("构建失败: {}", e))?;

    let sch = ctx.start().map_err(|e| format!("启动失败: {}", e))?;
    sch.wait().map_err(|e| format!("编码失败: {}", e))?;
    Ok(())
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(Error::encode(
                &self.path,
                format!(
                    "frame size {:?} differs from stream size {}x{}",
                    frame.dimensions(),
                    self.width,
                    self.height
                ),
            ));
        }
        let (sw, sh) = self.stream_size;
        let sent = match &self.tx {
            Some(tx) => tx.send(pad_frame(frame, sw, sh)).is_ok(),
            None => false,
        };
        if sent {
            return Ok(());
        }
        // 编码线程已退出, 取回错误
        self.tx = None;
        self.join()?;
        Err(Error::encode(&self.path, "encoder stopped early"))
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        self.tx.take();
        self.join()?;
        log::debug!("💾 已写入 {}", self.path.display());
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        self.tx.take();
        if let Err(e) = self.join() {
            log::debug!("编码线程异常结束: {}", e);
        }
    }
}
