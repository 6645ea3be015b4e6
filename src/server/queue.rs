// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 任务队列: 单个工作线程顺序执行, 状态表供 HTTP 查询
//!
//! 已结束的任务保留 `retention` 时长, 之后状态与输出子目录一并删除

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use crossbeam_channel::{unbounded, Sender};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ErrorCategory;
use crate::job::{
    Analyzer, JobOutcome, JobReport, JobRequest, OutputFailure, OutputFile, SourceVideo,
};
use crate::pipeline::Visualization;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    PartiallyCompleted,
    Failed,
}

impl JobState {
    pub fn is_finished(&self) -> bool {
        !matches!(self, JobState::Queued | JobState::Running)
    }
}

impl From<JobOutcome> for JobState {
    fn from(outcome: JobOutcome) -> Self {
        match outcome {
            JobOutcome::Completed => JobState::Completed,
            JobOutcome::PartiallyCompleted => JobState::PartiallyCompleted,
            JobOutcome::Failed => JobState::Failed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobError {
    pub category: ErrorCategory,
    pub message: String,
}

/// 任务状态 (JSON 返回给前端)
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub id: Uuid,
    pub state: JobState,
    pub percent: u8,
    pub stage: String,
    pub source_name: String,
    pub confidence: f32,
    pub visualizations: Vec<Visualization>,
    pub outputs: Vec<OutputFile>,
    pub failures: Vec<OutputFailure>,
    pub error: Option<JobError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobStatus {
    fn queued(id: Uuid, source_name: String, request: &JobRequest) -> Self {
        let now = Utc::now();
        Self {
            id,
            state: JobState::Queued,
            percent: 0,
            stage: "Queued".to_string(),
            source_name,
            confidence: request.confidence,
            visualizations: request.ordered_visualizations(),
            outputs: Vec::new(),
            failures: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn finish(&mut self, report: JobReport) {
        self.state = report.outcome.into();
        self.percent = 100;
        self.stage = match report.outcome {
            JobOutcome::Completed => "Done",
            JobOutcome::PartiallyCompleted => "Done with errors",
            JobOutcome::Failed => "Failed",
        }
        .to_string();
        self.outputs = report.outputs;
        self.failures = report.failures;
    }
}

struct QueuedJob {
    id: Uuid,
    source: SourceVideo,
    request: JobRequest,
}

type JobTable = Arc<Mutex<HashMap<Uuid, JobStatus>>>;

fn lock(jobs: &JobTable) -> MutexGuard<'_, HashMap<Uuid, JobStatus>> {
    match jobs.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn update(jobs: &JobTable, id: Uuid, f: impl FnOnce(&mut JobStatus)) {
    if let Some(status) = lock(jobs).get_mut(&id) {
        f(status);
        status.updated_at = Utc::now();
    }
}

/// 删除结束超过 `retention` 的任务及其输出子目录, 返回被删除的任务ID
fn evict_expired(
    jobs: &JobTable,
    output_dir: &Path,
    now: DateTime<Utc>,
    retention: Duration,
) -> Vec<Uuid> {
    let expired: Vec<Uuid> = {
        let mut table = lock(jobs);
        let ids: Vec<Uuid> = table
            .values()
            .filter(|s| s.state.is_finished() && now - s.updated_at > retention)
            .map(|s| s.id)
            .collect();
        for id in &ids {
            table.remove(id);
        }
        ids
    };

    for id in &expired {
        let dir = output_dir.join(id.to_string());
        if dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                log::warn!("⚠️ 无法删除过期输出 {}: {}", dir.display(), e);
            }
        }
        log::info!("🧹 任务 {} 已过期, 清理完成", id);
    }
    expired
}

pub struct JobQueue {
    tx: Sender<QueuedJob>,
    jobs: JobTable,
    output_dir: PathBuf,
    retention: Duration,
}

impl JobQueue {
    /// 启动工作线程; 已结束任务保留 `retention` 后清理
    pub fn start(analyzer: Analyzer, retention: Duration) -> Self {
        let (tx, rx) = unbounded::<QueuedJob>();
        let jobs: JobTable = Arc::new(Mutex::new(HashMap::new()));
        let output_dir = analyzer.output_dir().to_path_buf();

        let table = jobs.clone();
        std::thread::spawn(move || {
            log::info!("✅ 任务线程启动");
            for job in rx {
                run_job(&analyzer, &table, job);
            }
            log::info!("任务线程退出");
        });

        Self {
            tx,
            jobs,
            output_dir,
            retention,
        }
    }

    /// 提交任务, 返回任务ID
    pub fn submit(&self, source: SourceVideo, request: JobRequest) -> anyhow::Result<Uuid> {
        evict_expired(&self.jobs, &self.output_dir, Utc::now(), self.retention);
        let id = Uuid::new_v4();
        lock(&self.jobs).insert(id, JobStatus::queued(id, source.name(), &request));
        if self
            .tx
            .send(QueuedJob {
                id,
                source,
                request,
            })
            .is_err()
        {
            lock(&self.jobs).remove(&id);
            anyhow::bail!("job worker is not running");
        }
        log::info!("📥 任务 {} 已排队", id);
        Ok(id)
    }

    pub fn status(&self, id: &Uuid) -> Option<JobStatus> {
        lock(&self.jobs).get(id).cloned()
    }
}

fn run_job(analyzer: &Analyzer, jobs: &JobTable, job: QueuedJob) {
    let QueuedJob {
        id,
        source,
        request,
    } = job;
    log::info!("🚀 任务 {} 开始: {}", id, source.name());
    update(jobs, id, |s| {
        s.state = JobState::Running;
        s.stage = "Starting".to_string();
    });

    let mut progress = |percent: u8, stage: &str| {
        update(jobs, id, |s| {
            s.percent = percent;
            s.stage = stage.to_string();
        });
    };

    match analyzer.analyze_job(id, source, &request, &mut progress) {
        Ok(report) => {
            log::info!("✅ 任务 {} 结束: {:?}", id, report.outcome);
            update(jobs, id, |s| s.finish(report));
        }
        Err(e) => {
            log::error!("❌ 任务 {} 失败: {}", id, e);
            update(jobs, id, |s| {
                s.state = JobState::Failed;
                s.stage = "Failed".to_string();
                s.error = Some(JobError {
                    category: e.category(),
                    message: e.to_string(),
                });
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(state: JobState, age_hours: i64, now: DateTime<Utc>) -> JobStatus {
        let mut s = JobStatus::queued(Uuid::new_v4(), "match.mp4".to_string(), &JobRequest::default());
        s.state = state;
        s.updated_at = now - Duration::hours(age_hours);
        s
    }

    #[test]
    fn finished_jobs_expire_with_their_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let old = status(JobState::Completed, 30, now);
        let fresh = status(JobState::PartiallyCompleted, 1, now);
        let running = status(JobState::Running, 30, now);
        let jobs: JobTable = Arc::new(Mutex::new(HashMap::new()));
        for s in [&old, &fresh, &running] {
            let job_dir = dir.path().join(s.id.to_string());
            std::fs::create_dir_all(&job_dir).unwrap();
            std::fs::write(job_dir.join("radar_match.mp4"), b"mp4").unwrap();
            lock(&jobs).insert(s.id, s.clone());
        }

        let evicted = evict_expired(&jobs, dir.path(), now, Duration::hours(24));
        assert_eq!(evicted, vec![old.id]);
        assert!(!dir.path().join(old.id.to_string()).exists());
        assert!(dir.path().join(fresh.id.to_string()).exists());
        assert!(dir.path().join(running.id.to_string()).exists());

        let table = lock(&jobs);
        assert!(!table.contains_key(&old.id));
        assert!(table.contains_key(&fresh.id));
        assert!(table.contains_key(&running.id));
    }

    #[test]
    fn outcome_maps_to_finished_state() {
        assert!(JobState::from(JobOutcome::Failed).is_finished());
        assert!(JobState::from(JobOutcome::Completed).is_finished());
        assert!(!JobState::Queued.is_finished());
    }
}
