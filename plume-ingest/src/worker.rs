//! Scrape jobs as explicit queued work with an outcome channel.
//!
//! Write-path callers hand a job to the worker's bounded mailbox instead of
//! detaching an un-awaited future, and failures come back on the outcome
//! channel where the call site can see them.

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::schedule::IngestScheduler;
use crate::RunReport;

#[derive(Debug, Clone)]
pub enum ScrapeJob {
    /// Full scheduling pass for one user.
    User { user_id: String, budget: u32 },
    /// On-demand refresh of a single creator.
    Creator { creator_id: Uuid, budget: u32 },
}

impl ScrapeJob {
    fn label(&self) -> String {
        match self {
            ScrapeJob::User { user_id, .. } => format!("user:{user_id}"),
            ScrapeJob::Creator { creator_id, .. } => format!("creator:{creator_id}"),
        }
    }
}

/// What became of one job: the run report, or the fatal setup error.
#[derive(Debug)]
pub struct ScrapeOutcome {
    pub label: String,
    pub result: Result<RunReport>,
}

pub struct WorkerHandle {
    pub jobs: mpsc::Sender<ScrapeJob>,
    pub outcomes: mpsc::Receiver<ScrapeOutcome>,
    pub task: JoinHandle<Result<()>>,
}

/// Spawn the scrape worker with a bounded mailbox.
///
/// The worker drains jobs until all senders drop or the shutdown channel
/// fires. Job failures are reported on the outcome channel, never swallowed;
/// they do not stop the worker.
pub fn spawn_worker(
    scheduler: IngestScheduler,
    capacity: usize,
    shutdown: Option<broadcast::Receiver<()>>,
) -> WorkerHandle {
    let (job_tx, mut job_rx) = mpsc::channel::<ScrapeJob>(capacity);
    let (out_tx, out_rx) = mpsc::channel::<ScrapeOutcome>(capacity);

    let task = tokio::spawn(async move {
        if let Some(mut shutdown_rx) = shutdown {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    maybe_job = job_rx.recv() => {
                        match maybe_job {
                            Some(job) => run_job(&scheduler, job, &out_tx).await,
                            None => break,
                        }
                    }
                }
            }
        } else {
            while let Some(job) = job_rx.recv().await {
                run_job(&scheduler, job, &out_tx).await;
            }
        }
        Ok(())
    });

    WorkerHandle {
        jobs: job_tx,
        outcomes: out_rx,
        task,
    }
}

async fn run_job(
    scheduler: &IngestScheduler,
    job: ScrapeJob,
    out: &mpsc::Sender<ScrapeOutcome>,
) {
    let label = job.label();
    let result = match job {
        ScrapeJob::User { user_id, budget } => scheduler.run_for_user(&user_id, budget).await,
        ScrapeJob::Creator { creator_id, budget } => {
            scheduler.refresh_creator(creator_id, budget).await
        }
    };

    if let Err(e) = &result {
        tracing::error!(label = %label, error = %format!("{e:#}"), "worker.job_failed");
    }
    if out.send(ScrapeOutcome { label, result }).await.is_err() {
        tracing::debug!("worker.outcome_receiver_dropped");
    }
}
