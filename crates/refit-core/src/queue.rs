//! The job queue: in-memory ordering plus the batched execution loop.
//!
//! Design:
//! - The record vector is the single source of truth within the process; the
//!   store is written through on every transition but never read mid-run.
//! - The lock is scoped to selection and mutation, never held across an
//!   await.
//! - Batches run under a fan-out/fan-in join: every member of batch N
//!   settles before batch N+1 is selected. The concurrency cap is therefore
//!   exact, at the cost of a slow job stalling the next batch.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::domain::{
    JobId, JobKind, JobRecord, JobStatus, MAX_PRIORITY, RunSummary, dispatch_order,
};
use crate::error::{EnqueueError, RunnerError, StorageError};
use crate::ports::{Clock, RunnerRegistry, SystemClock};
use crate::progress::ProgressReporter;
use crate::sink::ResultSink;
use crate::store::JobStore;

/// Default number of jobs dispatched concurrently per batch.
pub const DEFAULT_BATCH_SIZE: usize = 3;

pub struct JobQueue {
    jobs: Mutex<Vec<JobRecord>>,
    running: AtomicBool,
    seq: AtomicU64,
    batch_size: usize,
    store: Arc<dyn JobStore>,
    runners: RunnerRegistry,
    sink: ResultSink,
    clock: Arc<dyn Clock>,
}

impl JobQueue {
    pub fn new(store: Arc<dyn JobStore>, runners: RunnerRegistry, sink: ResultSink) -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
            seq: AtomicU64::new(0),
            batch_size: DEFAULT_BATCH_SIZE,
            store,
            runners,
            sink,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Submit a new job. Returns its freshly minted id.
    ///
    /// The record is appended to the in-memory queue first; the store write
    /// is best-effort per submission. If it fails, the job is still queued
    /// and the error carries the id.
    pub async fn enqueue(
        &self,
        kind: JobKind,
        input_path: impl Into<PathBuf>,
        priority: u8,
    ) -> Result<JobId, EnqueueError> {
        if priority > MAX_PRIORITY {
            return Err(EnqueueError::PriorityOutOfRange(priority));
        }
        if !self.runners.contains(kind) {
            return Err(EnqueueError::NoRunner(kind));
        }

        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let now = self.clock.now();
        let id = JobId::new(format!("{}_{}_{}", kind, seq, now.format("%Y%m%d_%H%M%S")));
        let job = JobRecord::new(id.clone(), kind, input_path, priority, now);

        {
            let mut jobs = self.jobs.lock().await;
            jobs.push(job.clone());
        }

        if let Err(source) = self.store.save(&job) {
            return Err(EnqueueError::Storage { id, source });
        }

        tracing::info!(%id, %kind, priority, "job enqueued");
        Ok(id)
    }

    /// Merge PENDING rows from the store into the in-memory queue, skipping
    /// ids already present. Returns how many records were added.
    ///
    /// `run()` calls this on entry, so a fresh process over a non-empty
    /// store resumes queued work instead of silently ignoring it.
    pub async fn reload_pending(&self) -> Result<usize, StorageError> {
        let rows = self.store.pending()?;
        let mut jobs = self.jobs.lock().await;
        let mut added = 0;
        for row in rows {
            if jobs.iter().all(|j| j.id != row.id) {
                jobs.push(row);
                added += 1;
            }
        }
        if added > 0 {
            tracing::info!(added, "reloaded pending jobs from store");
        }
        Ok(added)
    }

    /// Drain the queue: dispatch PENDING jobs in canonical order, at most
    /// `batch_size` in flight at a time, until none remain or a stop was
    /// requested. Jobs enqueued between batches join the next selection.
    pub async fn run(&self) -> RunSummary {
        self.running.store(true, Ordering::SeqCst);

        if let Err(error) = self.reload_pending().await {
            tracing::warn!(%error, "could not reload pending jobs from store");
        }

        let total = {
            let jobs = self.jobs.lock().await;
            jobs.iter().filter(|j| j.status == JobStatus::Pending).count()
        };
        let mut progress = ProgressReporter::new(total);

        while self.running.load(Ordering::SeqCst) {
            let batch = self.claim_batch().await;
            if batch.is_empty() {
                break;
            }

            for job in &batch {
                self.persist(job);
            }

            let mut inflight = JoinSet::new();
            for job in batch {
                let runner = self.runners.get(job.kind);
                inflight.spawn(async move {
                    let outcome = match runner {
                        Some(runner) => runner.execute(job.kind, &job.input_path).await,
                        None => Err(RunnerError::NotRegistered(job.kind)),
                    };
                    (job.id, outcome)
                });
            }

            // Batch barrier: nothing below selects new work until every
            // member of this batch has settled.
            while let Some(joined) = inflight.join_next().await {
                let (id, outcome) = match joined {
                    Ok(pair) => pair,
                    Err(error) => {
                        tracing::error!(%error, "runner task aborted");
                        continue;
                    }
                };
                if let Some(job) = self.settle(&id, outcome).await {
                    self.persist(&job);
                    if let Err(error) = self.sink.write(&job) {
                        tracing::error!(id = %job.id, %error, "result artifact write failed");
                    }
                    let message = match job.status {
                        JobStatus::Completed => "Completed",
                        _ => "Failed",
                    };
                    progress.update(&job.input_path, job.status, message);
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        progress.summary()
    }

    /// Halt the run loop after the batch currently in flight settles.
    /// Dispatched jobs always run to completion or failure.
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Snapshot of PENDING records in canonical dispatch order.
    pub async fn pending_status(&self) -> Vec<JobRecord> {
        let jobs = self.jobs.lock().await;
        let mut pending: Vec<JobRecord> = jobs
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(dispatch_order);
        pending
    }

    /// Snapshot of every record this queue has seen, any status.
    pub async fn jobs(&self) -> Vec<JobRecord> {
        self.jobs.lock().await.clone()
    }

    /// Select the next batch: PENDING records in canonical order, at most
    /// `batch_size`, transitioned to RUNNING before dispatch begins.
    async fn claim_batch(&self) -> Vec<JobRecord> {
        let mut jobs = self.jobs.lock().await;
        let mut order: Vec<usize> = (0..jobs.len())
            .filter(|&i| jobs[i].status == JobStatus::Pending)
            .collect();
        // Stable sort over insertion order: identical (priority, created_at)
        // keeps earliest-enqueued-first.
        order.sort_by(|&a, &b| dispatch_order(&jobs[a], &jobs[b]));

        order
            .into_iter()
            .take(self.batch_size)
            .map(|i| {
                jobs[i].start();
                jobs[i].clone()
            })
            .collect()
    }

    /// Apply a runner outcome to the record. Returns the settled record.
    async fn settle(
        &self,
        id: &JobId,
        outcome: Result<serde_json::Value, RunnerError>,
    ) -> Option<JobRecord> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.iter_mut().find(|j| &j.id == id)?;
        match outcome {
            Ok(result) => job.complete(result),
            Err(error) => {
                tracing::error!(%id, %error, "job failed");
                job.fail(error);
            }
        }
        Some(job.clone())
    }

    /// Write-through to the store. Storage failures are logged and the
    /// in-memory record stays authoritative for the rest of the process.
    fn persist(&self, job: &JobRecord) {
        if let Err(error) = self.store.save(job) {
            tracing::error!(id = %job.id, %error, "store write failed, keeping in-memory state");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    use crate::ports::FixedClock;
    use crate::store::SqliteJobStore;

    use super::*;

    /// Records, per runner invocation, a start/finish sequence number and
    /// the peak number of invocations in flight.
    #[derive(Default)]
    struct Probe {
        ticks: AtomicU64,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        spans: StdMutex<Vec<(String, u64, u64)>>,
    }

    impl Probe {
        fn span(&self, path: &str) -> (u64, u64) {
            let spans = self.spans.lock().unwrap();
            let (_, started, finished) = spans
                .iter()
                .find(|(p, _, _)| p == path)
                .unwrap_or_else(|| panic!("no span for {path}"));
            (*started, *finished)
        }
    }

    struct ProbeRunner {
        probe: Arc<Probe>,
        delay: Duration,
        fail: HashSet<PathBuf>,
    }

    #[async_trait]
    impl crate::ports::JobRunner for ProbeRunner {
        async fn execute(
            &self,
            _kind: JobKind,
            input_path: &Path,
        ) -> Result<serde_json::Value, RunnerError> {
            let started = self.probe.ticks.fetch_add(1, Ordering::SeqCst);
            let now = self.probe.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.probe.max_in_flight.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(self.delay).await;

            self.probe.in_flight.fetch_sub(1, Ordering::SeqCst);
            let finished = self.probe.ticks.fetch_add(1, Ordering::SeqCst);
            self.probe.spans.lock().unwrap().push((
                input_path.display().to_string(),
                started,
                finished,
            ));

            if self.fail.contains(input_path) {
                Err(RunnerError::Other(format!(
                    "forced failure for {}",
                    input_path.display()
                )))
            } else {
                Ok(serde_json::json!({"improvements": []}))
            }
        }
    }

    struct Fixture {
        queue: Arc<JobQueue>,
        probe: Arc<Probe>,
        store: Arc<SqliteJobStore>,
        _dir: TempDir,
    }

    fn fixture(delay_ms: u64, fail: &[&str]) -> Fixture {
        fixture_with_kinds(
            delay_ms,
            fail,
            &[
                JobKind::CodeImprovement,
                JobKind::TestGeneration,
                JobKind::DependencyCheck,
            ],
        )
    }

    fn fixture_with_kinds(delay_ms: u64, fail: &[&str], kinds: &[JobKind]) -> Fixture {
        let probe = Arc::new(Probe::default());
        let store = Arc::new(SqliteJobStore::in_memory().unwrap());
        let dir = tempfile::tempdir().unwrap();

        let runner = Arc::new(ProbeRunner {
            probe: Arc::clone(&probe),
            delay: Duration::from_millis(delay_ms),
            fail: fail.iter().map(PathBuf::from).collect(),
        });
        let mut runners = RunnerRegistry::new();
        for &kind in kinds {
            runners.register(kind, runner.clone()).unwrap();
        }

        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
        let queue = JobQueue::new(
            store.clone(),
            runners,
            ResultSink::new(dir.path().join("results")),
        )
        .with_clock(Arc::new(clock));

        Fixture {
            queue: Arc::new(queue),
            probe,
            store,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn batches_follow_priority_with_creation_tie_break() {
        let f = fixture(20, &[]);

        // Priorities [1, 5, 0, 5, 3]; batch size 3. First batch must be the
        // two priority-5 jobs plus the priority-3 job (creation order breaks
        // the 5/5 tie), second batch priority 1 then 0.
        for (path, priority) in [("a.py", 1), ("b.py", 5), ("c.py", 0), ("d.py", 5), ("e.py", 3)]
        {
            f.queue
                .enqueue(JobKind::CodeImprovement, path, priority)
                .await
                .unwrap();
        }

        let order: Vec<String> = f
            .queue
            .pending_status()
            .await
            .iter()
            .map(|j| j.input_path.display().to_string())
            .collect();
        assert_eq!(order, ["b.py", "d.py", "e.py", "a.py", "c.py"]);

        let summary = f.queue.run().await;
        assert_eq!(summary.total, 5);
        assert_eq!(summary.successful, 5);
        assert!(f.probe.max_in_flight.load(Ordering::SeqCst) <= 3);

        // Every first-batch member finished before any second-batch member
        // started: the barrier, observed through the probe's sequence ticks.
        let first_batch_finish = ["b.py", "d.py", "e.py"]
            .iter()
            .map(|p| f.probe.span(p).1)
            .max()
            .unwrap();
        let second_batch_start = ["a.py", "c.py"]
            .iter()
            .map(|p| f.probe.span(p).0)
            .min()
            .unwrap();
        assert!(first_batch_finish < second_batch_start);
    }

    #[tokio::test]
    async fn in_flight_runners_never_exceed_the_batch_size() {
        let f = fixture(10, &[]);
        for i in 0..8 {
            f.queue
                .enqueue(JobKind::CodeImprovement, format!("src/file{i}.py"), 0)
                .await
                .unwrap();
        }

        let summary = f.queue.run().await;
        assert_eq!(summary.total, 8);
        assert!(f.probe.max_in_flight.load(Ordering::SeqCst) <= DEFAULT_BATCH_SIZE);
    }

    #[tokio::test]
    async fn one_failure_is_isolated_from_batch_siblings() {
        let f = fixture(5, &["b.py"]);
        for path in ["a.py", "b.py", "c.py"] {
            f.queue
                .enqueue(JobKind::CodeImprovement, path, 0)
                .await
                .unwrap();
        }

        let summary = f.queue.run().await;
        assert_eq!(summary.total, 3);
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 1);

        let jobs = f.queue.jobs().await;
        let by_path = |p: &str| {
            jobs.iter()
                .find(|j| j.input_path == Path::new(p))
                .unwrap()
                .clone()
        };
        assert_eq!(by_path("a.py").status, JobStatus::Completed);
        assert_eq!(by_path("c.py").status, JobStatus::Completed);
        assert_eq!(by_path("b.py").status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn runner_failure_is_recorded_everywhere() {
        let f = fixture(1, &["broken.py"]);
        let id = f
            .queue
            .enqueue(JobKind::CodeImprovement, "broken.py", 0)
            .await
            .unwrap();

        let summary = f.queue.run().await;
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.successful, 0);

        let job = f.store.get(&id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        let result = job.result.unwrap();
        assert!(result["error"].as_str().unwrap().contains("forced failure"));
    }

    #[tokio::test]
    async fn jobs_enqueued_mid_run_are_picked_up() {
        let f = fixture(30, &[]);
        f.queue
            .enqueue(JobKind::CodeImprovement, "first.py", 0)
            .await
            .unwrap();

        let queue = Arc::clone(&f.queue);
        let run = tokio::spawn(async move { queue.run().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        f.queue
            .enqueue(JobKind::CodeImprovement, "second.py", 0)
            .await
            .unwrap();

        let summary = run.await.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.successful, 2);
    }

    #[tokio::test]
    async fn stop_halts_after_the_current_batch() {
        let f = fixture(100, &[]);
        for i in 0..6 {
            f.queue
                .enqueue(JobKind::CodeImprovement, format!("src/file{i}.py"), 0)
                .await
                .unwrap();
        }

        let queue = Arc::clone(&f.queue);
        let run = tokio::spawn(async move { queue.run().await });

        tokio::time::sleep(Duration::from_millis(30)).await;
        f.queue.request_stop();

        let summary = run.await.unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(f.queue.pending_status().await.len(), 3);
    }

    #[tokio::test]
    async fn enqueue_validates_priority_range() {
        let f = fixture(1, &[]);
        let err = f
            .queue
            .enqueue(JobKind::CodeImprovement, "a.py", 11)
            .await
            .unwrap_err();
        assert!(matches!(err, EnqueueError::PriorityOutOfRange(11)));
        assert!(f.queue.jobs().await.is_empty());

        // 10 is the inclusive maximum.
        f.queue
            .enqueue(JobKind::CodeImprovement, "a.py", 10)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn enqueue_rejects_kinds_without_a_runner() {
        let f = fixture_with_kinds(1, &[], &[JobKind::CodeImprovement]);
        let err = f
            .queue
            .enqueue(JobKind::TestGeneration, "a.py", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, EnqueueError::NoRunner(JobKind::TestGeneration)));
    }

    #[tokio::test]
    async fn enqueue_keeps_the_record_when_the_store_write_fails() {
        struct FailingStore;
        impl JobStore for FailingStore {
            fn initialize(&self) -> Result<(), StorageError> {
                Ok(())
            }
            fn save(&self, _job: &JobRecord) -> Result<(), StorageError> {
                Err(StorageError::Corrupt("disk full".into()))
            }
            fn pending(&self) -> Result<Vec<JobRecord>, StorageError> {
                Ok(Vec::new())
            }
        }

        let probe = Arc::new(Probe::default());
        let dir = tempfile::tempdir().unwrap();
        let mut runners = RunnerRegistry::new();
        runners
            .register(
                JobKind::CodeImprovement,
                Arc::new(ProbeRunner {
                    probe,
                    delay: Duration::from_millis(1),
                    fail: HashSet::new(),
                }),
            )
            .unwrap();
        let queue = JobQueue::new(
            Arc::new(FailingStore),
            runners,
            ResultSink::new(dir.path().join("results")),
        );

        let err = queue
            .enqueue(JobKind::CodeImprovement, "a.py", 0)
            .await
            .unwrap_err();
        let EnqueueError::Storage { id, .. } = err else {
            panic!("expected storage error");
        };
        let pending = queue.pending_status().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);

        // In-memory truth stays authoritative: the run still drains it.
        let summary = queue.run().await;
        assert_eq!(summary.total, 1);
        assert_eq!(summary.successful, 1);
    }

    #[tokio::test]
    async fn run_reloads_pending_rows_from_the_store() {
        let f = fixture(1, &[]);
        f.queue
            .enqueue(JobKind::CodeImprovement, "a.py", 2)
            .await
            .unwrap();
        f.queue
            .enqueue(JobKind::TestGeneration, "b.py", 7)
            .await
            .unwrap();

        // Same store, fresh process: the in-memory queue starts empty.
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ProbeRunner {
            probe: Arc::new(Probe::default()),
            delay: Duration::from_millis(1),
            fail: HashSet::new(),
        });
        let mut runners = RunnerRegistry::new();
        runners
            .register(JobKind::CodeImprovement, runner.clone())
            .unwrap();
        runners.register(JobKind::TestGeneration, runner).unwrap();
        let queue = JobQueue::new(
            f.store.clone(),
            runners,
            ResultSink::new(dir.path().join("results")),
        );

        let summary = queue.run().await;
        assert_eq!(summary.total, 2);
        assert_eq!(summary.successful, 2);
        assert!(f.store.pending().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reload_does_not_duplicate_records_already_in_memory() {
        let f = fixture(1, &[]);
        f.queue
            .enqueue(JobKind::CodeImprovement, "a.py", 0)
            .await
            .unwrap();

        assert_eq!(f.queue.reload_pending().await.unwrap(), 0);
        assert_eq!(f.queue.jobs().await.len(), 1);
    }

    #[tokio::test]
    async fn reloaded_row_without_a_runner_settles_failed() {
        let f = fixture_with_kinds(1, &[], &[JobKind::CodeImprovement]);

        // A row written by some other process, for a kind this queue has no
        // runner for.
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let foreign = JobRecord::new(
            JobId::new("dependency_check_0_20240601_120000"),
            JobKind::DependencyCheck,
            "a.py",
            0,
            at,
        );
        f.store.save(&foreign).unwrap();

        let summary = f.queue.run().await;
        assert_eq!(summary.failed, 1);

        let job = f.store.get(&foreign.id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(
            job.result.unwrap()["error"]
                .as_str()
                .unwrap()
                .contains("no runner")
        );
    }

    #[tokio::test]
    async fn result_artifacts_are_written_for_every_terminal_job() {
        let f = fixture(1, &["bad.py"]);
        let ok_id = f
            .queue
            .enqueue(JobKind::CodeImprovement, "good.py", 0)
            .await
            .unwrap();
        let bad_id = f
            .queue
            .enqueue(JobKind::CodeImprovement, "bad.py", 0)
            .await
            .unwrap();

        f.queue.run().await;

        let results = f._dir.path().join("results");
        let ok_artifact: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(results.join(format!("{ok_id}_result.json"))).unwrap(),
        )
        .unwrap();
        let bad_artifact: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(results.join(format!("{bad_id}_result.json"))).unwrap(),
        )
        .unwrap();
        assert_eq!(ok_artifact["status"], "completed");
        assert_eq!(bad_artifact["status"], "failed");
        assert!(bad_artifact["result"]["error"].is_string());
    }
}
