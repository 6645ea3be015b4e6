// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 分析任务错误类型

use std::path::PathBuf;

use serde::Serialize;

/// 错误大类 (界面上按类别展示)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// 输入视频不可用
    Input,
    /// 模型加载 / 推理 / 远程调用失败
    Model,
    /// 处理过程中几何或训练数据不足
    Processing,
    /// 输出写入或文件系统错误
    Io,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported container `{0}`, expected mp4, avi or mov")]
    UnsupportedContainer(String),

    #[error("failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("model error: {0:#}")]
    Model(anyhow::Error),

    #[error("only {found} pitch keypoints above threshold, at least 4 are required")]
    InsufficientKeypoints { found: usize },

    #[error("pitch keypoints do not define a valid homography")]
    DegenerateHomography,

    #[error("no player crops collected, cannot fit team classifier")]
    EmptyTrainingSet,

    #[error("failed to encode {path}: {message}")]
    Encode { path: PathBuf, message: String },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::UnsupportedContainer(_) | Error::Decode { .. } | Error::InvalidParameter(_) => {
                ErrorCategory::Input
            }
            Error::Model(_) => ErrorCategory::Model,
            Error::InsufficientKeypoints { .. }
            | Error::DegenerateHomography
            | Error::EmptyTrainingSet => ErrorCategory::Processing,
            Error::Encode { .. } | Error::Io(_) => ErrorCategory::Io,
        }
    }

    pub fn decode(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::Decode {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn encode(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::Encode {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        assert_eq!(
            Error::UnsupportedContainer("mkv".into()).category(),
            ErrorCategory::Input
        );
        assert_eq!(
            Error::Model(anyhow::anyhow!("boom")).category(),
            ErrorCategory::Model
        );
        assert_eq!(
            Error::InsufficientKeypoints { found: 0 }.category(),
            ErrorCategory::Processing
        );
        assert_eq!(
            Error::encode("out.mp4", "disk full").category(),
            ErrorCategory::Io
        );
    }
}
