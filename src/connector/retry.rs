//! Retry decorator with cancellable backoff.
//!
//! Every started call is driven by a [`RetryOperation`], a small state
//! machine guarded by one lock:
//!
//! ```text
//! Idle -> Executing(0) -> Waiting(0) -> Executing(1) -> ... -> Completed
//!   \__________\______________\________________________________/
//! ```
//!
//! Work (attempts and timers) is always spawned outside the lock, and the
//! completion is taken out of the lock before it runs, so it fires exactly
//! once no matter how results, timers, and cancellation interleave.

use async_trait::async_trait;
use std::fmt;
use std::mem;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use super::{ConnectorConfiguration, HttpConnector, HttpMethod, HttpRequest, HttpResponse};
use crate::cancel::{Cancellable, GroupCancellable};
use crate::error::ConnectorFailure;
use crate::lock::Locked;
use crate::retry::RetryStrategy;

/// Header carrying the per-call idempotency key on `POST` requests.
pub const IDEMPOTENCY_KEY: &str = "Idempotency-Key";

type Outcome = Result<HttpResponse, ConnectorFailure>;
type Completion = Box<dyn FnOnce(Outcome) + Send>;
type RetryPredicate = Arc<dyn Fn(&ConnectorFailure) -> bool + Send + Sync>;

/// Decides which failures are worth another attempt.
///
/// Network and timeout failures always retry; cancellation never does.
/// Server 5xx responses retry only when enabled, and any other failure only
/// when the extra predicate accepts it.
#[derive(Clone, Default)]
pub struct RetryClassifier {
    retry_server_errors: bool,
    predicate: Option<RetryPredicate>,
}

impl RetryClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retrying_server_errors(mut self, enabled: bool) -> Self {
        self.retry_server_errors = enabled;
        self
    }

    pub fn with_predicate(
        mut self,
        predicate: impl Fn(&ConnectorFailure) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn is_retryable(&self, failure: &ConnectorFailure) -> bool {
        match failure {
            ConnectorFailure::NetworkUnreachable | ConnectorFailure::Timeout => true,
            ConnectorFailure::Cancelled => false,
            ConnectorFailure::Server { status, .. }
                if self.retry_server_errors && (500..=599).contains(status) =>
            {
                true
            }
            _ => self
                .predicate
                .as_ref()
                .is_some_and(|predicate| predicate(failure)),
        }
    }
}

impl fmt::Debug for RetryClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryClassifier")
            .field("retry_server_errors", &self.retry_server_errors)
            .field("predicate", &self.predicate.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Decorator that re-runs transient failures with backoff.
pub struct RetryConnector {
    connector: Arc<dyn HttpConnector>,
    strategy: RetryStrategy,
    classifier: RetryClassifier,
}

impl RetryConnector {
    pub fn new(
        connector: Arc<dyn HttpConnector>,
        strategy: RetryStrategy,
        classifier: RetryClassifier,
    ) -> Self {
        Self {
            connector,
            strategy,
            classifier,
        }
    }

    /// Start a retrying call and return immediately.
    ///
    /// `completion` runs exactly once with the final outcome, or with
    /// [`ConnectorFailure::Cancelled`] if the returned operation is cancelled
    /// first. `POST` requests without an [`IDEMPOTENCY_KEY`] get a fresh one
    /// that every attempt reuses.
    pub fn start<F>(&self, request: &HttpRequest, completion: F) -> Arc<RetryOperation>
    where
        F: FnOnce(Result<HttpResponse, ConnectorFailure>) + Send + 'static,
    {
        let mut request = request.clone();
        if request.method == HttpMethod::Post && request.header(IDEMPOTENCY_KEY).is_none() {
            request.set_header(IDEMPOTENCY_KEY, uuid::Uuid::new_v4().to_string());
        }
        let operation = Arc::new(RetryOperation::new(
            Arc::clone(&self.connector),
            self.strategy.clone(),
            self.classifier.clone(),
            request,
            Box::new(completion),
        ));
        operation.start();
        operation
    }
}

#[async_trait]
impl HttpConnector for RetryConnector {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ConnectorFailure> {
        let (sender, receiver) = oneshot::channel();
        let operation = self.start(request, move |outcome| {
            let _ = sender.send(outcome);
        });
        // Dropping the caller's future cancels the operation.
        let _guard = CancelOnDrop(operation);
        receiver
            .await
            .unwrap_or(Err(ConnectorFailure::Internal(None)))
    }

    fn replace(&self, configuration: ConnectorConfiguration) {
        self.connector.replace(configuration);
    }
}

struct CancelOnDrop(Arc<RetryOperation>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Lifecycle of one retrying call.
#[derive(Debug)]
pub enum OperationState {
    Idle,
    /// An attempt is in flight; `retry_count` retries preceded it.
    Executing {
        cancellable: Arc<GroupCancellable>,
        retry_count: u32,
    },
    /// Backing off after attempt number `retry_count` failed.
    Waiting {
        timer: Arc<GroupCancellable>,
        retry_count: u32,
    },
    Completed,
}

impl OperationState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Executing { .. } => "executing",
            Self::Waiting { .. } => "waiting",
            Self::Completed => "completed",
        }
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn allows(&self, next: &OperationState) -> bool {
        match (self, next) {
            (Self::Idle, Self::Executing { retry_count, .. }) => *retry_count == 0,
            (
                Self::Executing {
                    retry_count: current,
                    ..
                },
                Self::Waiting { retry_count, .. },
            ) => current == retry_count,
            (
                Self::Waiting {
                    retry_count: current,
                    ..
                },
                Self::Executing { retry_count, .. },
            ) => current.checked_add(1) == Some(*retry_count),
            (Self::Idle | Self::Executing { .. } | Self::Waiting { .. }, Self::Completed) => true,
            _ => false,
        }
    }
}

struct OperationInner {
    state: OperationState,
    completion: Option<Completion>,
}

impl OperationInner {
    fn transition(&mut self, next: OperationState) -> OperationState {
        debug_assert!(
            self.state.allows(&next),
            "illegal retry transition {} -> {}",
            self.state.name(),
            next.name()
        );
        mem::replace(&mut self.state, next)
    }
}

/// What to do once the lock is released after an attempt finished.
enum Step {
    Ignore,
    Wait {
        timer: Arc<GroupCancellable>,
        delay: Duration,
    },
    Complete(Option<Completion>),
}

/// Handle to one retrying call. Cancelling it stops the in-flight attempt
/// or pending timer and completes the call with
/// [`ConnectorFailure::Cancelled`].
pub struct RetryOperation {
    connector: Arc<dyn HttpConnector>,
    strategy: RetryStrategy,
    classifier: RetryClassifier,
    request: HttpRequest,
    inner: Locked<OperationInner>,
}

impl RetryOperation {
    fn new(
        connector: Arc<dyn HttpConnector>,
        strategy: RetryStrategy,
        classifier: RetryClassifier,
        request: HttpRequest,
        completion: Completion,
    ) -> Self {
        Self {
            connector,
            strategy,
            classifier,
            request,
            inner: Locked::new(OperationInner {
                state: OperationState::Idle,
                completion: Some(completion),
            }),
        }
    }

    /// The request every attempt sends.
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn is_completed(&self) -> bool {
        self.inner
            .with_lock(|inner| matches!(inner.state, OperationState::Completed))
    }

    fn start(self: &Arc<Self>) {
        let cancellable = self.inner.with_lock(|inner| {
            if !matches!(inner.state, OperationState::Idle) {
                return None;
            }
            let cancellable = Arc::new(GroupCancellable::new());
            inner.transition(OperationState::Executing {
                cancellable: Arc::clone(&cancellable),
                retry_count: 0,
            });
            Some(cancellable)
        });
        if let Some(cancellable) = cancellable {
            self.spawn_attempt(&cancellable, 0);
        }
    }

    fn spawn_attempt(self: &Arc<Self>, cancellable: &GroupCancellable, retry_count: u32) {
        let operation = Arc::clone(self);
        let attempt =
            tokio::spawn(async move { operation.connector.execute(&operation.request).await });
        cancellable.add(Arc::new(attempt.abort_handle()));

        let operation = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = match attempt.await {
                Ok(outcome) => outcome,
                // Aborted through the group; cancel() already completed the call.
                Err(err) if err.is_cancelled() => return,
                Err(err) => Err(ConnectorFailure::internal(err)),
            };
            operation.attempt_completed(outcome, retry_count);
        });
    }

    fn attempt_completed(self: &Arc<Self>, outcome: Outcome, retry_count: u32) {
        let step = self.inner.with_lock(|inner| {
            let current = match &inner.state {
                OperationState::Executing { retry_count, .. } => *retry_count,
                _ => return Step::Ignore,
            };
            if current != retry_count {
                return Step::Ignore;
            }
            if let Err(failure) = &outcome {
                if self.classifier.is_retryable(failure) {
                    if let Some(delay) = self.strategy.interval(retry_count) {
                        let timer = Arc::new(GroupCancellable::new());
                        inner.transition(OperationState::Waiting {
                            timer: Arc::clone(&timer),
                            retry_count,
                        });
                        return Step::Wait { timer, delay };
                    }
                }
            }
            inner.transition(OperationState::Completed);
            Step::Complete(inner.completion.take())
        });

        match step {
            Step::Ignore => {}
            Step::Wait { timer, delay } => {
                if let Err(failure) = &outcome {
                    tracing::debug!(
                        request_id = %self.request.id,
                        failure = failure.kind(),
                        retry_count = retry_count + 1,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "scheduling retry"
                    );
                }
                self.spawn_timer(&timer, delay, retry_count);
            }
            Step::Complete(completion) => {
                if let Err(failure) = &outcome {
                    tracing::debug!(
                        request_id = %self.request.id,
                        failure = failure.kind(),
                        retry_count,
                        "request failed without further retries"
                    );
                }
                if let Some(completion) = completion {
                    completion(outcome);
                }
            }
        }
    }

    fn spawn_timer(self: &Arc<Self>, timer: &GroupCancellable, delay: Duration, retry_count: u32) {
        let operation = Arc::clone(self);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            operation.timer_fired(retry_count);
        });
        timer.add(Arc::new(task.abort_handle()));
    }

    fn timer_fired(self: &Arc<Self>, retry_count: u32) {
        let next = retry_count + 1;
        let cancellable = self.inner.with_lock(|inner| {
            match &inner.state {
                OperationState::Waiting {
                    retry_count: current,
                    ..
                } if *current == retry_count => {}
                _ => return None,
            }
            let cancellable = Arc::new(GroupCancellable::new());
            inner.transition(OperationState::Executing {
                cancellable: Arc::clone(&cancellable),
                retry_count: next,
            });
            Some(cancellable)
        });
        if let Some(cancellable) = cancellable {
            self.spawn_attempt(&cancellable, next);
        }
    }
}

impl Cancellable for RetryOperation {
    fn cancel(&self) {
        let cancelled = self.inner.with_lock(|inner| {
            if matches!(inner.state, OperationState::Completed) {
                return None;
            }
            let previous = inner.transition(OperationState::Completed);
            Some((previous, inner.completion.take()))
        });
        let Some((previous, completion)) = cancelled else {
            return;
        };

        match previous {
            OperationState::Executing { cancellable, .. } => cancellable.cancel(),
            OperationState::Waiting { timer, .. } => timer.cancel(),
            OperationState::Idle | OperationState::Completed => {}
        }
        tracing::debug!(request_id = %self.request.id, "request cancelled");
        if let Some(completion) = completion {
            completion(Err(ConnectorFailure::Cancelled));
        }
    }
}

impl fmt::Debug for RetryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.with_lock(|inner| inner.state.name());
        f.debug_struct("RetryOperation")
            .field("request_id", &self.request.id)
            .field("state", &state)
            .finish()
    }
}
