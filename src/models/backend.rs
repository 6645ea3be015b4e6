// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! ONNX Runtime 推理后端

use std::path::Path;

use anyhow::{Context, Result};
use ndarray::{Array, IxDyn};
use ort::execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider};
use ort::session::Session;
use ort::value::Tensor;

/// 执行设备
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrtEP {
    CPU,
    CUDA(i32),
    Trt(i32),
}

impl OrtEP {
    pub fn from_flags(cuda: bool, trt: bool, device_id: i32) -> Self {
        if trt {
            OrtEP::Trt(device_id)
        } else if cuda {
            OrtEP::CUDA(device_id)
        } else {
            OrtEP::CPU
        }
    }
}

pub struct OrtBackend {
    session: Session,
    output_names: Vec<String>,
}

impl OrtBackend {
    /// 加载 ONNX 模型 (CPU / CUDA / TensorRT 由参数决定)
    pub fn from_path(path: &Path, ep: OrtEP) -> Result<Self> {
        let builder = Session::builder()?;
        let builder = match ep {
            OrtEP::CUDA(id) => builder.with_execution_providers([CUDAExecutionProvider::default()
                .with_device_id(id)
                .build()])?,
            OrtEP::Trt(id) => builder.with_execution_providers([
                TensorRTExecutionProvider::default()
                    .with_device_id(id)
                    .build(),
                CUDAExecutionProvider::default().with_device_id(id).build(),
            ])?,
            OrtEP::CPU => builder,
        };
        let session = builder
            .commit_from_file(path)
            .with_context(|| format!("failed to load onnx model {}", path.display()))?;

        let output_names = session.outputs.iter().map(|o| o.name.clone()).collect();
        log::info!("✅ 模型加载成功: {} ({:?})", path.display(), ep);

        Ok(Self {
            session,
            output_names,
        })
    }

    /// 单输入前向推理, 返回全部输出
    pub fn run(&mut self, xs: Array<f32, IxDyn>) -> Result<Vec<Array<f32, IxDyn>>> {
        let input = Tensor::from_array(xs)?;
        let outputs = self.session.run(ort::inputs![input])?;

        let mut ys = Vec::with_capacity(self.output_names.len());
        for name in &self.output_names {
            let (shape, data) = outputs[name.as_str()].try_extract_tensor::<f32>()?;
            let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
            ys.push(Array::from_shape_vec(IxDyn(&dims), data.to_vec())?);
        }
        Ok(ys)
    }
}
