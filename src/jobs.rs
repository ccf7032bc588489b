//! Background ingestion jobs.
//!
//! HTTP handlers never index inline. They enqueue a [`JobKind`] and return
//! the job id; a single worker task drains the queue in order, runs each job
//! through the [`Indexer`](crate::ingest::Indexer), records the outcome, and
//! reloads the query snapshot so the next question sees the change.
//!
//! Job records live in memory only and are lost on restart. Only the most
//! recent [`MAX_FINISHED_JOBS`] finished records are kept; queued and
//! running jobs are never dropped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::state::AppContext;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobKind {
    Add { path: PathBuf },
    Delete { document_id: String },
    Rebuild,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded { summary: serde_json::Value },
    Failed { error: String },
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Succeeded { .. } | JobStatus::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Finished job records retained for polling.
pub const MAX_FINISHED_JOBS: usize = 256;

type JobTable = Arc<RwLock<HashMap<String, JobRecord>>>;

/// Drop the oldest finished records until at most `keep` remain.
fn prune_finished(table: &mut HashMap<String, JobRecord>, keep: usize) {
    let mut finished: Vec<(DateTime<Utc>, String)> = table
        .values()
        .filter_map(|r| r.finished_at.map(|at| (at, r.id.clone())))
        .collect();
    if finished.len() <= keep {
        return;
    }
    finished.sort();
    let excess = finished.len() - keep;
    for (_, id) in finished.into_iter().take(excess) {
        table.remove(&id);
    }
}

/// Handle for submitting jobs and reading their status.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<String>,
    jobs: JobTable,
}

impl JobQueue {
    /// Spawn the worker on the current tokio runtime.
    pub fn start(ctx: Arc<AppContext>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let jobs: JobTable = Arc::new(RwLock::new(HashMap::new()));
        tokio::spawn(run_worker(ctx, rx, jobs.clone()));
        Self { tx, jobs }
    }

    /// Queue `kind` and return its job id.
    pub fn submit(&self, kind: JobKind) -> anyhow::Result<String> {
        let id = Uuid::new_v4().to_string();
        let record = JobRecord {
            id: id.clone(),
            kind: kind.clone(),
            status: JobStatus::Queued,
            created_at: Utc::now(),
            finished_at: None,
        };
        self.jobs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.clone(), record);
        self.tx
            .send(id.clone())
            .map_err(|_| anyhow::anyhow!("job worker has stopped"))?;
        tracing::info!(job = %id, ?kind, "job queued");
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Option<JobRecord> {
        self.jobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }
}

fn set_status(jobs: &JobTable, id: &str, status: JobStatus) {
    let mut table = jobs.write().unwrap_or_else(|e| e.into_inner());
    if let Some(record) = table.get_mut(id) {
        let finished = status.is_finished();
        if finished {
            record.finished_at = Some(Utc::now());
        }
        record.status = status;
        if finished {
            prune_finished(&mut table, MAX_FINISHED_JOBS);
        }
    }
}

async fn run_worker(ctx: Arc<AppContext>, mut rx: mpsc::UnboundedReceiver<String>, jobs: JobTable) {
    while let Some(id) = rx.recv().await {
        let kind = match jobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .map(|r| r.kind.clone())
        {
            Some(kind) => kind,
            None => continue,
        };

        set_status(&jobs, &id, JobStatus::Running);
        tracing::info!(job = %id, ?kind, "job started");

        let outcome = run_job(&ctx, &kind).await;

        // Reload whatever happened: a partial rebuild still changed the index.
        if let Err(e) = ctx.reload().await {
            tracing::error!(job = %id, error = %e, "index reload after job failed");
        }

        match outcome {
            Ok(summary) => {
                tracing::info!(job = %id, "job succeeded");
                set_status(&jobs, &id, JobStatus::Succeeded { summary });
            }
            Err(e) => {
                tracing::warn!(job = %id, error = %e, "job failed");
                set_status(
                    &jobs,
                    &id,
                    JobStatus::Failed {
                        error: format!("{:#}", e),
                    },
                );
            }
        }
    }
}

async fn run_job(ctx: &AppContext, kind: &JobKind) -> anyhow::Result<serde_json::Value> {
    let summary = match kind {
        JobKind::Add { path } => serde_json::to_value(ctx.indexer.add_document(path).await?)?,
        JobKind::Delete { document_id } => {
            serde_json::to_value(ctx.indexer.delete_document(document_id).await?)?
        }
        JobKind::Rebuild => serde_json::to_value(ctx.indexer.rebuild_all().await?)?,
    };
    Ok(summary)
}
