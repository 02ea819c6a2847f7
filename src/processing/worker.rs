//! Background workers of the processing daemon
//!
//! Every worker runs the same loop: wait its startup delay, then run its
//! job, sleep for what is left of the interval, and repeat until shutdown.
//! A job in progress always completes before the worker exits.
//!
//! - **MetricProcessor**: aggregates staged measures of its sacks
//! - **MetricReporter**: logs the backlog of staged measures
//! - **MetricJanitor**: removes the data of deleted metrics

use crate::config::MetricdConfig;
use crate::coordination::{CoordinationError, Partitioner};
use crate::incoming::Sack;
use crate::processing::context::ProcessingContext;
use crate::processing::error::ProcessingResult;
use crate::processing::operations::{expunge_metrics, process_new_measures_for_sack};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Coordination group joined by processing workers
pub const PROCESSING_GROUP: &str = "carbonara-processing";

/// Deleted metrics removed per janitor pass
const EXPUNGE_BATCH_SIZE: usize = 1000;

/// Shutdown flag and wakeup shared by a set of workers
#[derive(Debug, Default)]
pub struct WorkerSignal {
    shutdown: AtomicBool,
    wake: Notify,
}

impl WorkerSignal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Cut the current sleep of every worker short
    pub fn wakeup(&self) {
        self.wake.notify_waiters();
    }

    /// Ask every worker to stop after its current job
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.wakeup();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, or until woken up or shut down
    pub async fn sleep(&self, duration: Duration) {
        let notified = self.wake.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_shutdown() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = notified => {}
        }
    }
}

/// Work run periodically by a worker
#[async_trait]
pub trait PeriodicJob: Send {
    fn name(&self) -> &'static str;

    async fn run_job(&mut self) -> ProcessingResult<()>;

    /// Called once the loop has stopped
    async fn close(&mut self) {}
}

/// Run `job` every `interval` until `signal` shuts down
pub fn spawn_worker<J>(mut job: J, interval: Duration, startup_delay: Duration, signal: Arc<WorkerSignal>) -> JoinHandle<()>
where
    J: PeriodicJob + 'static,
{
    tokio::spawn(async move {
        // Workers are started at different times
        signal.sleep(startup_delay).await;

        while !signal.is_shutdown() {
            let started = Instant::now();
            if let Err(e) = job.run_job().await {
                tracing::error!(job = job.name(), error = %e, "Unexpected error during {} job", job.name());
            }
            signal.sleep(interval.saturating_sub(started.elapsed())).await;
        }

        job.close().await;
        tracing::debug!(job = job.name(), "Worker stopped");
    })
}

/// Aggregates the staged measures of the sacks assigned to this worker
pub struct MetricProcessor {
    ctx: ProcessingContext,
    member: String,
    replicas: usize,
    configured: bool,
    partitioner: Option<Partitioner>,
    tasks: Vec<Sack>,
}

impl MetricProcessor {
    pub fn new(ctx: ProcessingContext, worker_id: usize, replicas: usize) -> Self {
        let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        Self {
            ctx,
            member: format!("{}.{}.{}", host, worker_id, Uuid::new_v4()),
            replicas,
            configured: false,
            partitioner: None,
            tasks: Vec::new(),
        }
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    async fn configure(&mut self) {
        self.configured = true;
        match Partitioner::join(self.ctx.membership.clone(), PROCESSING_GROUP, self.member.clone()).await {
            Ok(partitioner) => {
                tracing::info!(group = PROCESSING_GROUP, member = %self.member, "Joined coordination group");
                self.partitioner = Some(partitioner);
            }
            Err(CoordinationError::NotImplemented(_)) => {
                tracing::warn!(
                    "Coordinator does not support partitioning. Worker will battle against other workers for jobs."
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "Unexpected error configuring coordinator for partitioning");
                self.configured = false;
            }
        }
    }

    /// Sacks this worker is responsible for; all of them when partitioning
    /// is unavailable or assigns nothing
    pub async fn sacks_to_process(&mut self) -> Vec<Sack> {
        if !self.configured {
            self.configure().await;
        }

        if let Some(partitioner) = self.partitioner.as_mut() {
            match partitioner.refresh().await {
                Ok(changed) => {
                    if changed || self.tasks.is_empty() {
                        self.tasks = self
                            .ctx
                            .incoming
                            .sacks()
                            .into_iter()
                            .filter(|sack| partitioner.belongs_to_self(sack.to_string().as_bytes(), self.replicas))
                            .collect();
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Unexpected error updating the task partitioner");
                }
            }
        }

        if self.tasks.is_empty() {
            self.ctx.incoming.sacks()
        } else {
            self.tasks.clone()
        }
    }
}

#[async_trait]
impl PeriodicJob for MetricProcessor {
    fn name(&self) -> &'static str {
        "processing"
    }

    async fn run_job(&mut self) -> ProcessingResult<()> {
        let sacks = self.sacks_to_process().await;
        let mut metrics = 0;
        let mut processed_sacks = 0;

        for sack in &sacks {
            match process_new_measures_for_sack(&self.ctx, sack, false).await {
                Ok(count) => {
                    metrics += count;
                    processed_sacks += 1;
                }
                Err(e) => {
                    tracing::error!(sack = %sack, error = %e, "Unexpected error processing assigned job");
                }
            }
        }

        tracing::debug!("{} metrics processed from {} sacks", metrics, processed_sacks);
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(partitioner) = &self.partitioner {
            if let Err(e) = partitioner.leave().await {
                tracing::warn!(error = %e, "Unable to leave coordination group");
            }
        }
    }
}

/// Logs how many measures wait to be processed
pub struct MetricReporter {
    ctx: ProcessingContext,
}

impl MetricReporter {
    pub fn new(ctx: ProcessingContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl PeriodicJob for MetricReporter {
    fn name(&self) -> &'static str {
        "reporting"
    }

    async fn run_job(&mut self) -> ProcessingResult<()> {
        match self.ctx.incoming.report(false).await {
            Ok(report) => tracing::info!(
                measures = report.summary.measures,
                metrics = report.summary.metrics,
                "{} measurements bundles across {} metrics wait to be processed.",
                report.summary.measures,
                report.summary.metrics
            ),
            Err(e) => tracing::warn!(error = %e, "Unable to compute backlog. Retrying at next interval."),
        }
        Ok(())
    }
}

/// Removes the data of metrics marked for deletion
pub struct MetricJanitor {
    ctx: ProcessingContext,
}

impl MetricJanitor {
    pub fn new(ctx: ProcessingContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl PeriodicJob for MetricJanitor {
    fn name(&self) -> &'static str {
        "janitor"
    }

    async fn run_job(&mut self) -> ProcessingResult<()> {
        let expunged = expunge_metrics(&self.ctx, EXPUNGE_BATCH_SIZE, false).await?;
        tracing::debug!(expunged, "Metrics marked for deletion removed from backend");
        Ok(())
    }
}

/// The set of workers making up the processing daemon
pub struct Metricd {
    signal: Arc<WorkerSignal>,
    handles: Vec<JoinHandle<()>>,
}

impl Metricd {
    /// Spawn `workers` processors plus the reporter and the janitor
    pub fn start(ctx: ProcessingContext, config: &MetricdConfig) -> Self {
        let signal = WorkerSignal::new();
        let mut handles = Vec::new();

        for worker_id in 0..config.workers {
            handles.push(spawn_worker(
                MetricProcessor::new(ctx.clone(), worker_id, config.replicas),
                config.processing_interval(),
                Duration::from_secs(worker_id as u64),
                signal.clone(),
            ));
        }
        if let Some(interval) = config.reporting_interval() {
            handles.push(spawn_worker(
                MetricReporter::new(ctx.clone()),
                interval,
                Duration::ZERO,
                signal.clone(),
            ));
        }
        handles.push(spawn_worker(
            MetricJanitor::new(ctx),
            config.cleanup_interval(),
            Duration::ZERO,
            signal.clone(),
        ));

        tracing::info!(workers = config.workers, "Started metric processing");
        Self { signal, handles }
    }

    pub fn signal(&self) -> &Arc<WorkerSignal> {
        &self.signal
    }

    /// Stop every worker, waiting for jobs in progress to finish
    pub async fn shutdown(self) {
        tracing::info!("Waiting ongoing metric processing to finish");
        self.signal.shutdown();
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Worker task failed");
            }
        }
    }
}
