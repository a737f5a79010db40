//! Submits and tracks concurrent jobs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ducat_fetch::{CircuitBreaker, Transport};
use ducat_types::CancelFlag;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{
    CheckpointStore, JobError, JobId, JobKey, JobOutcome, JobRequest, JobRunner, JobStatusReport,
    ProgressObserver,
};

struct Entry {
    key: JobKey,
    cancel: CancelFlag,
    status: watch::Receiver<JobStatusReport>,
    handle: Option<JoinHandle<Result<JobOutcome, JobError>>>,
}

impl Entry {
    /// The runner holds the status sender until its task ends, panics included.
    fn is_active(&self) -> bool {
        !self.status.borrow().state.is_finished() && self.status.has_changed().is_ok()
    }
}

/// Runs jobs on the tokio runtime.
///
/// All jobs share one transport and one circuit breaker, so every job backs
/// off together when the upstream host degrades.
pub struct JobManager {
    transport: Arc<dyn Transport>,
    breaker: Arc<CircuitBreaker>,
    store: Arc<dyn CheckpointStore>,
    observers: Vec<Arc<dyn ProgressObserver>>,
    jobs: Mutex<HashMap<JobId, Entry>>,
}

impl std::fmt::Debug for JobManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobManager")
            .field("breaker", &self.breaker)
            .field("jobs", &self.lock().len())
            .finish_non_exhaustive()
    }
}

impl JobManager {
    /// Creates a manager.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        breaker: Arc<CircuitBreaker>,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            transport,
            breaker,
            store,
            observers: Vec::new(),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Attaches an observer to every job submitted afterwards.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Returns the shared circuit breaker.
    #[must_use]
    pub const fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, Entry>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a job in the background and returns its id.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidConfig`] if the configuration cannot run
    /// the request or a job with the same key is still active.
    pub fn submit(&self, request: JobRequest) -> Result<JobId, JobError> {
        request.config.validate(&request.key)?;

        let mut jobs = self.lock();
        // Forget jobs whose outcome was already taken.
        jobs.retain(|_, entry| entry.handle.is_some() || entry.is_active());
        if jobs
            .values()
            .any(|entry| entry.key == request.key && entry.is_active())
        {
            return Err(JobError::InvalidConfig(format!(
                "a job for {} is already running",
                request.key
            )));
        }

        let id = Uuid::new_v4();
        let key = request.key.clone();
        let mut runner = JobRunner::new(
            request,
            Arc::clone(&self.transport),
            Arc::clone(&self.breaker),
            Arc::clone(&self.store),
        )
        .with_id(id);
        for observer in &self.observers {
            runner = runner.with_observer(Arc::clone(observer));
        }

        let cancel = runner.cancel_flag();
        let status = runner.status();
        let handle = tokio::spawn(runner.run());
        tracing::info!(job = %id, %key, "job submitted");

        jobs.insert(
            id,
            Entry {
                key,
                cancel,
                status,
                handle: Some(handle),
            },
        );
        Ok(id)
    }

    /// Requests cancellation. Returns false for an unknown id.
    pub fn cancel(&self, id: JobId) -> bool {
        let jobs = self.lock();
        let Some(entry) = jobs.get(&id) else {
            return false;
        };
        entry.cancel.cancel();
        tracing::info!(job = %id, "cancellation requested");
        true
    }

    /// Requests cancellation of every job.
    pub fn cancel_all(&self) {
        for entry in self.lock().values() {
            entry.cancel.cancel();
        }
    }

    /// Returns true while the job's task is still running.
    #[must_use]
    pub fn is_active(&self, id: JobId) -> bool {
        self.lock().get(&id).is_some_and(Entry::is_active)
    }

    /// Returns the current progress of a job.
    #[must_use]
    pub fn status(&self, id: JobId) -> Option<JobStatusReport> {
        self.lock().get(&id).map(|entry| *entry.status.borrow())
    }

    /// Returns every known job and its progress.
    #[must_use]
    pub fn list(&self) -> Vec<(JobId, JobStatusReport)> {
        let mut jobs: Vec<_> = self
            .lock()
            .iter()
            .map(|(id, entry)| (*id, *entry.status.borrow()))
            .collect();
        jobs.sort_by_key(|(id, _)| *id);
        jobs
    }

    /// Waits for a job to end and returns its outcome.
    ///
    /// A job's outcome can be taken once; later calls return
    /// [`JobError::UnknownJob`].
    ///
    /// # Errors
    ///
    /// Returns the job's own error, [`JobError::UnknownJob`], or
    /// [`JobError::Panicked`] if the task did not run to completion.
    pub async fn wait(&self, id: JobId) -> Result<JobOutcome, JobError> {
        let handle = self
            .lock()
            .get_mut(&id)
            .and_then(|entry| entry.handle.take())
            .ok_or(JobError::UnknownJob(id))?;

        handle
            .await
            .map_err(|e| JobError::Panicked(e.to_string()))?
    }
}
