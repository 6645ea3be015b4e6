// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// Web 服务 (axum)
///
/// - `GET  /`                 上传页面
/// - `POST /api/jobs`         multipart 上传 (video, confidence, tracking, radar, voronoi)
/// - `GET  /api/jobs/:id`     任务状态
/// - `GET  /outputs/:job/:file`  输出视频 (支持 Range, `?download=1` 触发下载)
pub mod page;
pub mod queue;

pub use queue::{JobQueue, JobState, JobStatus};

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, FromRef, Multipart, Path, Query, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use uuid::Uuid;

use crate::error::{Error, ErrorCategory};
use crate::input::check_container;
use crate::job::{Analyzer, JobRequest, SourceVideo, DEFAULT_CONFIDENCE};
use crate::pipeline::Visualization;

#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<JobQueue>,
    pub output_dir: OutputDir,
}

/// 输出根目录 (每个任务一个子目录)
#[derive(Clone, Debug)]
pub struct OutputDir(pub PathBuf);

impl FromRef<AppState> for OutputDir {
    fn from_ref(state: &AppState) -> Self {
        state.output_dir.clone()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/jobs", post(create_job))
        .route("/api/jobs/:id", get(job_status))
        .route("/outputs/:job/:file", get(output_file))
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}

/// 启动服务, Ctrl-C 退出; 已结束任务保留 `retention` 后清理
pub async fn serve(analyzer: Analyzer, bind: &str, retention: chrono::Duration) -> anyhow::Result<()> {
    let output_dir = analyzer.output_dir().to_path_buf();
    tokio::fs::create_dir_all(&output_dir).await?;
    let state = AppState {
        queue: Arc::new(JobQueue::start(analyzer, retention)),
        output_dir: OutputDir(output_dir),
    };

    let listener = tokio::net::TcpListener::bind(bind).await?;
    log::info!("🌐 服务地址: http://{}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    log::info!("👋 服务已退出");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("⚠️ 无法监听退出信号: {}", e);
        std::future::pending::<()>().await;
    }
}

// ========== 错误响应 ==========

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    category: Option<ErrorCategory>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn bad_request(message: impl ToString) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                error: message.to_string(),
                category: Some(ErrorCategory::Input),
            },
        }
    }

    fn not_found(message: impl ToString) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: ErrorBody {
                error: message.to_string(),
                category: None,
            },
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        let category = e.category();
        let status = match category {
            ErrorCategory::Input => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            body: ErrorBody {
                error: e.to_string(),
                category: Some(category),
            },
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        Self::bad_request(e.body_text())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// ========== 处理函数 ==========

async fn index() -> Html<&'static str> {
    Html(page::INDEX_HTML)
}

#[derive(Debug, Serialize)]
struct CreatedJob {
    id: Uuid,
}

/// 复选框取值: 缺省为开启
fn parse_toggle(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "false" | "0" | "off" | "no"
    )
}

async fn create_job(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<CreatedJob>, ApiError> {
    let mut upload: Option<(tempfile::NamedTempFile, String)> = None;
    let mut confidence = DEFAULT_CONFIDENCE;
    let mut toggles = [true; 3];

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "video" => {
                let file_name = field
                    .file_name()
                    .map(|n| n.to_string())
                    .ok_or_else(|| ApiError::bad_request("video field has no file name"))?;
                check_container(std::path::Path::new(&file_name))?;
                let ext = std::path::Path::new(&file_name)
                    .extension()
                    .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
                    .unwrap_or_default();
                let temp = tempfile::Builder::new()
                    .prefix("upload_")
                    .suffix(&ext)
                    .tempfile()?;
                let mut out = tokio::fs::File::from_std(temp.reopen()?);
                let mut size = 0usize;
                while let Some(chunk) = field.chunk().await? {
                    size += chunk.len();
                    out.write_all(&chunk).await?;
                }
                out.flush().await?;
                log::info!("📤 收到上传 {} ({:.1} MB)", file_name, size as f64 / 1e6);
                upload = Some((temp, file_name));
            }
            "confidence" => {
                let text = field.text().await?;
                confidence = text.trim().parse().map_err(|_| {
                    ApiError::bad_request(format!("invalid confidence `{}`", text))
                })?;
            }
            "tracking" | "radar" | "voronoi" => {
                let text = field.text().await?;
                let idx = match name.as_str() {
                    "tracking" => 0,
                    "radar" => 1,
                    _ => 2,
                };
                toggles[idx] = parse_toggle(&text);
            }
            _ => {}
        }
    }

    let (file, name) = upload.ok_or_else(|| ApiError::bad_request("missing `video` file"))?;
    let request = JobRequest {
        confidence,
        visualizations: Visualization::ALL
            .into_iter()
            .zip(toggles)
            .filter_map(|(v, on)| on.then_some(v))
            .collect(),
    };
    request.validate()?;

    let id = state
        .queue
        .submit(SourceVideo::Upload { file, name }, request)
        .map_err(|e| ApiError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: ErrorBody {
                error: e.to_string(),
                category: None,
            },
        })?;
    Ok(Json(CreatedJob { id }))
}

async fn job_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobStatus>, ApiError> {
    state
        .queue
        .status(&id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("job {} not found", id)))
}

#[derive(Debug, Default, Deserialize)]
struct OutputQuery {
    #[serde(default)]
    download: Option<String>,
}

/// 只允许输出目录下的 `.mp4` 文件名
fn is_safe_output_name(file: &str) -> bool {
    !file.is_empty()
        && !file.contains(['/', '\\'])
        && !file.contains("..")
        && file.ends_with(".mp4")
}

/// 流式返回输出视频, Range 请求由 ServeFile 处理 (浏览器预览 / 拖动进度)
async fn output_file(
    State(OutputDir(output_dir)): State<OutputDir>,
    Path((job, file)): Path<(Uuid, String)>,
    Query(query): Query<OutputQuery>,
    request: Request,
) -> Result<Response, ApiError> {
    let not_found = || ApiError::not_found(format!("output {}/{} not found", job, file));
    if !is_safe_output_name(&file) {
        return Err(not_found());
    }
    let path = output_dir.join(job.to_string()).join(&file);
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        _ => return Err(not_found()),
    }

    let response = match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    let mut response = response.map(Body::new);
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("video/mp4"));
    if query.download.as_deref().map(parse_toggle).unwrap_or(false) {
        if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file)) {
            response.headers_mut().insert(header::CONTENT_DISPOSITION, value);
        }
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    fn outputs_router(dir: &std::path::Path) -> Router {
        Router::new()
            .route("/outputs/:job/:file", get(output_file))
            .with_state(OutputDir(dir.to_path_buf()))
    }

    fn write_output(dir: &std::path::Path, job: Uuid, len: usize) {
        let job_dir = dir.join(job.to_string());
        std::fs::create_dir_all(&job_dir).unwrap();
        let bytes: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        std::fs::write(job_dir.join("radar_match.mp4"), bytes).unwrap();
    }

    #[tokio::test]
    async fn outputs_support_range_requests() {
        let dir = tempfile::tempdir().unwrap();
        let job = Uuid::new_v4();
        write_output(dir.path(), job, 1000);

        let request = HttpRequest::get(format!("/outputs/{}/radar_match.mp4", job))
            .header(header::RANGE, "bytes=100-199")
            .body(Body::empty())
            .unwrap();
        let response = outputs_router(dir.path()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            response.headers()[header::CONTENT_RANGE],
            "bytes 100-199/1000"
        );
        assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body.len(), 100);
        assert_eq!(body[0], 100);
    }

    #[tokio::test]
    async fn download_flag_and_missing_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let job = Uuid::new_v4();
        write_output(dir.path(), job, 10);

        let request = HttpRequest::get(format!("/outputs/{}/radar_match.mp4?download=1", job))
            .body(Body::empty())
            .unwrap();
        let response = outputs_router(dir.path()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"radar_match.mp4\""
        );

        // 其他任务的同名文件不可见
        let request = HttpRequest::get(format!("/outputs/{}/radar_match.mp4", Uuid::new_v4()))
            .body(Body::empty())
            .unwrap();
        let response = outputs_router(dir.path()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn toggles_default_to_on() {
        assert!(parse_toggle("true"));
        assert!(parse_toggle("on"));
        assert!(parse_toggle(""));
        assert!(!parse_toggle("false"));
        assert!(!parse_toggle("0"));
    }

    #[test]
    fn output_names_cannot_escape_directory() {
        assert!(is_safe_output_name("tracking_match.mp4"));
        assert!(!is_safe_output_name("../secret.mp4"));
        assert!(!is_safe_output_name("a/b.mp4"));
        assert!(!is_safe_output_name("notes.txt"));
    }
}
