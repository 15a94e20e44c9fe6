use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::fs;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::{Authenticator, Credentials, PostPublisher, Renderer};
use crate::web::error::AppError;

pub const DEFAULT_WORKERS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Dispatching,
    Draining,
    Done,
}

/// Result of publishing a single file.
#[derive(Debug)]
pub struct ItemOutcome {
    pub path: PathBuf,
    pub worker: usize,
    pub result: Result<String, AppError>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }
}

/// Shared by every worker of one batch.
#[derive(Clone)]
struct ItemJob {
    renderer: Arc<dyn Renderer>,
    publisher: Arc<dyn PostPublisher>,
    access_token: Arc<str>,
}

impl ItemJob {
    async fn drain(self, worker: usize, queue: Arc<Mutex<mpsc::UnboundedReceiver<PathBuf>>>) -> Vec<ItemOutcome> {
        let mut outcomes = Vec::new();
        loop {
            let next = queue.lock().await.recv().await;
            let Some(path) = next else { break };

            info!(worker, path = %path.display(), "Authoring file.");
            let result = self.publish_isolated(path.clone()).await;
            match &result {
                Ok(url) => info!(worker, path = %path.display(), url = %url, "Published file."),
                Err(e) => error!(worker, path = %path.display(), error = %e, "Failed to publish file."),
            }
            outcomes.push(ItemOutcome { path, worker, result });
        }
        debug!(worker, "Worker finished; queue is empty.");
        outcomes
    }

    /// Runs one item on its own task so a panicking collaborator fails only that item.
    async fn publish_isolated(&self, path: PathBuf) -> Result<String, AppError> {
        let job = self.clone();
        let display = path.display().to_string();
        tokio::spawn(async move { job.publish_file(&path).await })
            .await
            .unwrap_or_else(|e| {
                Err(AppError::InternalServerError(format!(
                    "Publishing {display} aborted: {e}"
                )))
            })
    }

    async fn publish_file(&self, path: &Path) -> Result<String, AppError> {
        let markdown = fs::read_to_string(path)
            .await
            .map_err(|e| AppError::InvalidInput(format!("Cannot read {}: {e}", path.display())))?;
        let post = self.renderer.render(&self.access_token, &markdown).await?;
        debug!(slug = %post.meta.slug, "Rendered post.");
        self.publisher.publish(&self.access_token, &post).await
    }
}

/// Publishes a batch of markdown files with at most `workers` items in flight.
pub struct BulkPublisher {
    authenticator: Arc<dyn Authenticator>,
    renderer: Arc<dyn Renderer>,
    publisher: Arc<dyn PostPublisher>,
    workers: NonZeroUsize,
    state: StdMutex<DriverState>,
}

impl BulkPublisher {
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        renderer: Arc<dyn Renderer>,
        publisher: Arc<dyn PostPublisher>,
        workers: NonZeroUsize,
    ) -> Self {
        Self {
            authenticator,
            renderer,
            publisher,
            workers,
            state: StdMutex::new(DriverState::Idle),
        }
    }

    pub fn state(&self) -> DriverState {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn enter(&self, next: DriverState) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        debug!(from = ?*state, to = ?next, "Driver state change.");
        *state = next;
    }

    /// Authenticates once, then publishes every path.
    ///
    /// A failed login aborts the batch before any file is read. Per-file failures are
    /// recorded in the report and never stop the other files.
    pub async fn publish_all(
        &self,
        paths: Vec<PathBuf>,
        credentials: &Credentials,
    ) -> Result<BatchReport, AppError> {
        self.enter(DriverState::Idle);
        let tokens = self.authenticator.authenticate(credentials).await.map_err(|e| {
            error!(error = %e, "Login failed; aborting batch.");
            e
        })?;
        let access_token: Arc<str> = Arc::from(tokens.access_token);

        self.enter(DriverState::Dispatching);
        let total = paths.len();
        let (tx, rx) = mpsc::unbounded_channel::<PathBuf>();
        let queue = Arc::new(Mutex::new(rx));

        let mut workers = JoinSet::new();
        for worker in 0..self.workers.get() {
            let job = ItemJob {
                renderer: Arc::clone(&self.renderer),
                publisher: Arc::clone(&self.publisher),
                access_token: Arc::clone(&access_token),
            };
            workers.spawn(job.drain(worker, Arc::clone(&queue)));
        }

        for path in paths {
            if let Err(unsent) = tx.send(path) {
                warn!(path = %unsent.0.display(), "All workers stopped; file was not dispatched.");
            }
        }
        drop(tx);

        self.enter(DriverState::Draining);
        let mut report = BatchReport::default();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(outcomes) => report.outcomes.extend(outcomes),
                Err(e) => error!(error = %e, "Worker task terminated abnormally."),
            }
        }

        self.enter(DriverState::Done);
        info!(
            total,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Batch finished."
        );
        Ok(report)
    }
}
