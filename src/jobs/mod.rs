//! Background job execution for evaluations triggered by uploads and API
//! calls. Jobs are bounded by a semaphore, time-limited, and cancellable
//! per audit.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use dashmap::DashMap;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use crate::config::JobSettings;
use crate::errors::AttestError;

#[derive(Debug)]
pub enum JobOutcome<T> {
    Completed(T),
    Failed(AttestError),
    TimedOut,
    Cancelled,
}

impl<T> JobOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::Failed(_) => "failed",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
        }
    }
}

struct AuditJobs {
    token: CancellationToken,
    running: usize,
}

#[derive(Clone)]
pub struct JobRunner {
    permits: Arc<Semaphore>,
    audits: Arc<DashMap<i64, AuditJobs>>,
    timeout: Duration,
}

impl JobRunner {
    pub fn new(settings: &JobSettings) -> Self {
        Self::with_limits(settings.max_concurrent, Duration::from_secs(settings.timeout_secs))
    }

    pub fn with_limits(max_concurrent: usize, timeout: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            audits: Arc::new(DashMap::new()),
            timeout,
        }
    }

    /// Number of audits with at least one queued or running job.
    pub fn active_audits(&self) -> usize {
        self.audits.len()
    }

    fn register(&self, audit_id: i64) -> CancellationToken {
        let mut entry = self.audits.entry(audit_id).or_insert_with(|| AuditJobs {
            token: CancellationToken::new(),
            running: 0,
        });
        entry.running += 1;
        entry.token.clone()
    }

    fn release(audits: &DashMap<i64, AuditJobs>, audit_id: i64, token: &CancellationToken) {
        // a cancelled token means its entry was already removed
        if token.is_cancelled() {
            return;
        }
        if let Some(mut entry) = audits.get_mut(&audit_id) {
            entry.running = entry.running.saturating_sub(1);
        }
        audits.remove_if(&audit_id, |_, jobs| jobs.running == 0);
    }

    /// Cancel every queued and running job of an audit. Returns false when
    /// the audit had none.
    pub fn cancel_audit(&self, audit_id: i64) -> bool {
        match self.audits.remove(&audit_id) {
            Some((_, jobs)) => {
                jobs.token.cancel();
                info!(audit_id, running = jobs.running, "Cancelled audit jobs");
                true
            }
            None => false,
        }
    }

    /// Run `job` in the background under the concurrency limit and timeout.
    pub fn spawn<T, F>(&self, name: &'static str, audit_id: i64, job: F) -> JoinHandle<JobOutcome<T>>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, AttestError>> + Send + 'static,
    {
        let token = self.register(audit_id);
        let permits = Arc::clone(&self.permits);
        let audits = Arc::clone(&self.audits);
        let timeout = self.timeout;

        tokio::spawn(async move {
            let started = Instant::now();
            let outcome = tokio::select! {
                _ = token.cancelled() => JobOutcome::Cancelled,
                result = async {
                    let _permit = match permits.acquire_owned().await {
                        Ok(p) => p,
                        Err(_) => return JobOutcome::Failed(AttestError::Internal("job pool closed".into())),
                    };
                    match tokio::time::timeout(timeout, job).await {
                        Ok(Ok(value)) => JobOutcome::Completed(value),
                        Ok(Err(e)) => JobOutcome::Failed(e),
                        Err(_) => JobOutcome::TimedOut,
                    }
                } => result,
            };

            let elapsed_ms = started.elapsed().as_millis() as u64;
            match &outcome {
                JobOutcome::Failed(e) => warn!(job = name, audit_id, elapsed_ms, error = %e, "Job failed"),
                JobOutcome::TimedOut => warn!(job = name, audit_id, elapsed_ms, "Job timed out"),
                other => info!(job = name, audit_id, elapsed_ms, outcome = other.label(), "Job finished"),
            }
            Self::release(&audits, audit_id, &token);
            outcome
        })
    }
}
