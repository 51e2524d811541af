//! Action Queue
//!
//! Durable, offline-first work queue. `enqueue` persists the action before it returns
//! and never waits on the network. A single drain worker executes actions through the
//! [`HandlerRegistry`], one at a time, in enqueue order per conversation.
//!
//! Failures are classified by the handler: permanent errors abandon the action at once,
//! transient ones are retried with exponential backoff until `max_attempts` is reached,
//! after which a terminal `failed` record is kept for reporting.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use quorum_storage_traits::queue::ActionQueueStorage;
use quorum_storage_traits::queue::types::{
    Action, ActionContext, ActionStatus, EnqueueOutcome, NewAction, QueueStats,
};
use quorum_storage_traits::{ActionId, QuorumStorageProvider, StorageError, Timestamp};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::clock::{Clock, SystemClock};
use crate::config::QueueConfig;
use crate::error::{ActionError, Error, FailureKind, SanitizedError};
use crate::handlers::{ActionHandler, HandlerRegistry};

mod events;
mod scheduler;

pub use self::events::QueueEvent;
use self::scheduler::Scheduler;

/// Builder for [`ActionQueue`]
pub struct ActionQueueBuilder<S> {
    storage: Arc<S>,
    registry: HandlerRegistry,
    config: QueueConfig,
    clock: Arc<dyn Clock>,
    events: Option<flume::Sender<QueueEvent>>,
}

impl<S> ActionQueueBuilder<S>
where
    S: QuorumStorageProvider + 'static,
{
    /// Set the queue configuration
    pub fn with_config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Send lifecycle notifications to `sender`
    pub fn with_events(mut self, sender: flume::Sender<QueueEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Recover interrupted work and load every pending action.
    ///
    /// Records left `processing` by a previous process are moved back to `pending`,
    /// so they execute again from their original queue position.
    pub fn open(self) -> Result<ActionQueue<S>, Error> {
        let recovered = self.storage.reset_processing_actions()?;
        if recovered > 0 {
            tracing::info!(recovered, "Recovered interrupted actions");
        }

        let mut scheduler = Scheduler::new();
        for action in self.storage.pending_actions()? {
            scheduler.insert(
                action.context.ordering_key(),
                action.id,
                action.seq,
                action.next_attempt_at,
            );
        }
        tracing::debug!(pending = scheduler.len(), "Action queue opened");

        Ok(ActionQueue {
            inner: Arc::new(QueueInner {
                storage: self.storage,
                registry: self.registry,
                config: self.config,
                clock: self.clock,
                scheduler: Mutex::new(scheduler),
                events: self.events,
                notify: Notify::new(),
                online: AtomicBool::new(true),
                closed: AtomicBool::new(false),
                drain_lock: tokio::sync::Mutex::new(()),
                worker: Mutex::new(None),
            }),
        })
    }
}

/// The offline-first action queue
///
/// Cheap to clone; clones share the same storage, scheduler and worker.
pub struct ActionQueue<S> {
    inner: Arc<QueueInner<S>>,
}

impl<S> Clone for ActionQueue<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> fmt::Debug for ActionQueue<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionQueue")
            .field("config", &self.inner.config)
            .field("registry", &self.inner.registry)
            .field("online", &self.inner.online.load(Ordering::SeqCst))
            .field("closed", &self.inner.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

struct QueueInner<S> {
    storage: Arc<S>,
    registry: HandlerRegistry,
    config: QueueConfig,
    clock: Arc<dyn Clock>,
    scheduler: Mutex<Scheduler>,
    events: Option<flume::Sender<QueueEvent>>,
    notify: Notify,
    online: AtomicBool,
    closed: AtomicBool,
    /// Serializes drain passes so only one action executes at a time
    drain_lock: tokio::sync::Mutex<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<S> ActionQueue<S>
where
    S: QuorumStorageProvider + 'static,
{
    /// Start building a queue over `storage`
    pub fn builder(storage: Arc<S>, registry: HandlerRegistry) -> ActionQueueBuilder<S> {
        ActionQueueBuilder {
            storage,
            registry,
            config: QueueConfig::default(),
            clock: Arc::new(SystemClock),
            events: None,
        }
    }

    /// Durably record an action keyed by [`ActionContext::dedupe_key`].
    ///
    /// A pending action with the same key takes the new payload in place and keeps its
    /// queue position. Works offline; delivery happens later on the drain worker.
    pub fn enqueue(&self, context: ActionContext) -> Result<EnqueueOutcome, Error> {
        let new = NewAction::new(context, self.inner.clock.now());
        self.inner.enqueue(new)
    }

    /// Like [`ActionQueue::enqueue`] with an explicit dedupe key
    pub fn enqueue_with_key<K>(
        &self,
        context: ActionContext,
        dedupe_key: K,
    ) -> Result<EnqueueOutcome, Error>
    where
        K: Into<String>,
    {
        let new = NewAction::new(context, self.inner.clock.now()).with_dedupe_key(dedupe_key);
        self.inner.enqueue(new)
    }

    /// Execute every action that is ready now, then return the number executed.
    ///
    /// Does nothing while offline or closed. Concurrent calls are serialized.
    pub async fn drain_ready(&self) -> Result<usize, Error> {
        self.inner.drain_ready().await
    }

    /// Spawn the drain worker on the current tokio runtime. Calling it again while the
    /// worker runs is a no-op.
    pub fn start(&self) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::QueueClosed);
        }

        let mut worker = self.inner.worker.lock();
        if worker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }

        let inner = Arc::clone(&self.inner);
        *worker = Some(tokio::spawn(async move { inner.run().await }));
        tracing::debug!("Drain worker started");
        Ok(())
    }

    /// Stop the worker and refuse further enqueues. Waits for the action in flight.
    pub async fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.notify.notify_one();

        let handle = self.inner.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Drain worker ended abnormally");
            }
        }
        tracing::debug!("Action queue closed");
    }

    /// Whether [`ActionQueue::close`] was called
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Pause or resume draining. Enqueue keeps working while offline.
    pub fn set_online(&self, online: bool) {
        let was_online = self.inner.online.swap(online, Ordering::SeqCst);
        if online && !was_online {
            tracing::debug!("Back online, resuming drain");
            self.inner.notify.notify_one();
        }
    }

    /// Whether draining is enabled
    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// Record counts by status
    pub fn stats(&self) -> Result<QueueStats, Error> {
        Ok(self.inner.storage.queue_stats()?)
    }

    /// Pending and in-flight actions in queue order
    pub fn pending(&self) -> Result<Vec<Action>, Error> {
        Ok(self.inner.storage.pending_actions()?)
    }

    /// Terminal `failed` records, oldest first
    pub fn failed(&self, limit: usize) -> Result<Vec<Action>, Error> {
        Ok(self
            .inner
            .storage
            .actions_by_status(ActionStatus::Failed, limit)?)
    }

    /// Delete terminal records older than `max_action_age_secs`
    pub fn prune(&self) -> Result<usize, Error> {
        prune_expired(
            self.inner.storage.as_ref(),
            &self.inner.config,
            self.inner.clock.now(),
        )
    }

    /// Give a terminal record a fresh set of attempts.
    ///
    /// Returns `false` if the action exists but is not `failed`.
    pub fn retry_failed(&self, id: &ActionId) -> Result<bool, Error> {
        let now = self.inner.clock.now();
        let mut scheduler = self.inner.scheduler.lock();
        let Some(action) = reset_failed_action(self.inner.storage.as_ref(), id, now)? else {
            return Ok(false);
        };
        scheduler.insert(
            action.context.ordering_key(),
            action.id,
            action.seq,
            action.next_attempt_at,
        );
        drop(scheduler);

        tracing::info!(action_id = %id, action_type = %action.action_type(), "Retrying failed action");
        self.inner.notify.notify_one();
        Ok(true)
    }

    /// The configuration in use
    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    /// The time source in use
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.inner.clock)
    }

    /// The handler registry in use
    pub fn registry(&self) -> &HandlerRegistry {
        &self.inner.registry
    }
}

/// Move a `failed` record back to `pending` with zero attempts, ready at `now`.
///
/// Returns the updated record, `None` if it is not `failed`, and
/// [`Error::ActionNotFound`] if there is no such record.
pub fn reset_failed_action<S>(
    storage: &S,
    id: &ActionId,
    now: Timestamp,
) -> Result<Option<Action>, Error>
where
    S: ActionQueueStorage + ?Sized,
{
    let Some(mut action) = storage.find_action(id)? else {
        return Err(Error::ActionNotFound(*id));
    };
    if action.status != ActionStatus::Failed {
        return Ok(None);
    }

    action.status = ActionStatus::Pending;
    action.attempts = 0;
    action.last_error = None;
    action.processed_at = None;
    action.next_attempt_at = now;
    storage.update_action(&action)?;
    Ok(Some(action))
}

/// Delete `failed` records that reached a terminal state more than
/// `max_action_age_secs` before `now`
pub fn prune_expired<S>(storage: &S, config: &QueueConfig, now: Timestamp) -> Result<usize, Error>
where
    S: ActionQueueStorage + ?Sized,
{
    let cutoff = now.saturating_sub(config.max_action_age());
    let pruned = storage.prune_failed_actions(cutoff)?;
    if pruned > 0 {
        tracing::info!(pruned, cutoff = %cutoff, "Pruned expired failed actions");
    }
    Ok(pruned)
}

/// How a failed execution is settled
enum Settlement {
    Retry { attempts: u32, at: Timestamp },
    /// Handler said permanent; the record is removed
    Drop,
    /// Retries exhausted or session expired; a `failed` record is kept
    Retain { session_expired: bool },
}

impl<S> QueueInner<S>
where
    S: QuorumStorageProvider + 'static,
{
    fn enqueue(&self, new: NewAction) -> Result<EnqueueOutcome, Error> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::QueueClosed);
        }
        self.check_capacity()?;

        let outcome = {
            let mut scheduler = self.scheduler.lock();
            let outcome = self.storage.enqueue_action(new)?;
            let action = outcome.action();
            if outcome.is_replaced() && scheduler.contains(&action.id) {
                scheduler.replace(&action.id, action.next_attempt_at);
            } else {
                scheduler.insert(
                    action.context.ordering_key(),
                    action.id,
                    action.seq,
                    action.next_attempt_at,
                );
            }
            outcome
        };

        let action = outcome.action();
        let (id, action_type) = (action.id, action.action_type());
        if outcome.is_replaced() {
            tracing::debug!(action_id = %id, action_type = %action_type, dedupe_key = %action.dedupe_key, "Superseded pending action");
            self.emit(QueueEvent::Replaced { id, action_type });
        } else {
            tracing::debug!(action_id = %id, action_type = %action_type, seq = action.seq, "Enqueued action");
            self.emit(QueueEvent::Enqueued { id, action_type });
        }

        self.notify.notify_one();
        Ok(outcome)
    }

    fn check_capacity(&self) -> Result<(), Error> {
        let max = self.config.max_queue_size;
        let stats = self.storage.queue_stats()?;
        if stats.total() < max {
            return Ok(());
        }

        prune_expired(self.storage.as_ref(), &self.config, self.clock.now())?;
        let stats = self.storage.queue_stats()?;
        if stats.pending + stats.processing >= max / 2 {
            tracing::warn!(
                pending = stats.pending,
                processing = stats.processing,
                failed = stats.failed,
                max_queue_size = max,
                "Action queue is full"
            );
            return Err(Error::QueueFull(stats.total()));
        }
        Ok(())
    }

    async fn run(self: Arc<Self>) {
        loop {
            if self.closed.load(Ordering::SeqCst) {
                break;
            }

            if let Err(e) = self.drain_ready().await {
                tracing::error!(error = %e, "Drain pass failed");
            }

            let wait = self.next_wait();
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(wait) => {}
            }
        }
        tracing::debug!("Drain worker stopped");
    }

    fn next_wait(&self) -> Duration {
        let poll = self.config.poll_interval();
        if !self.online.load(Ordering::SeqCst) {
            return poll;
        }
        let now = self.clock.now();
        match self.scheduler.lock().next_wakeup() {
            Some(ready_at) => ready_at.duration_since(now).min(poll),
            None => poll,
        }
    }

    async fn drain_ready(&self) -> Result<usize, Error> {
        let _pass = self.drain_lock.lock().await;
        let mut executed = 0;

        loop {
            if self.closed.load(Ordering::SeqCst) || !self.online.load(Ordering::SeqCst) {
                break;
            }
            let now = self.clock.now();
            let next = self.scheduler.lock().next_ready(now);
            let Some(id) = next else {
                break;
            };
            if self.process(id, now).await? {
                executed += 1;
            }
        }

        Ok(executed)
    }

    /// Run one action. Returns whether a handler was invoked.
    async fn process(&self, id: ActionId, now: Timestamp) -> Result<bool, Error> {
        let claimed = {
            let mut scheduler = self.scheduler.lock();
            match self.claim(&id, now) {
                Ok(Some(action)) => Some(action),
                Ok(None) => {
                    scheduler.remove(&id);
                    None
                }
                Err(e) => {
                    scheduler.reschedule(&id, now.saturating_add(self.config.poll_interval()));
                    return Err(e.into());
                }
            }
        };
        let Some(mut action) = claimed else {
            return Ok(false);
        };
        let action_type = action.action_type();

        let Some(handler) = self.registry.get_handler(action_type) else {
            tracing::error!(
                action_id = %id,
                action_type = %action_type,
                "No handler registered for action type"
            );
            let sanitized = SanitizedError::new(FailureKind::UnknownDefect);
            self.persist_terminal(&mut action, &sanitized, now)
                .inspect_err(|_| self.retry_later(&id, now))?;
            self.scheduler.lock().remove(&id);
            self.emit(QueueEvent::Abandoned {
                id,
                action_type,
                kind: FailureKind::UnknownDefect,
                retained: true,
            });
            return Ok(false);
        };

        tracing::debug!(action_id = %id, action_type = %action_type, attempt = action.attempts + 1, "Executing action");
        let result = handler.execute(&action.context).await;

        let settled = match result {
            Ok(()) => self.complete(&action),
            Err(error) => self.fail(&mut action, handler, error, now).await,
        };
        settled.inspect_err(|_| self.retry_later(&id, now))?;
        Ok(true)
    }

    /// Mark a scheduled action `processing`. `None` if it vanished or is terminal.
    fn claim(&self, id: &ActionId, now: Timestamp) -> Result<Option<Action>, StorageError> {
        let Some(mut action) = self.storage.find_action(id)? else {
            return Ok(None);
        };
        if action.status == ActionStatus::Failed {
            return Ok(None);
        }
        action.status = ActionStatus::Processing;
        action.last_attempt_at = Some(now);
        self.storage.update_action(&action)?;
        Ok(Some(action))
    }

    fn complete(&self, action: &Action) -> Result<(), Error> {
        self.storage.delete_action(&action.id)?;
        self.scheduler.lock().remove(&action.id);
        tracing::debug!(action_id = %action.id, action_type = %action.action_type(), "Action completed");
        self.emit(QueueEvent::Completed {
            id: action.id,
            action_type: action.action_type(),
        });
        Ok(())
    }

    async fn fail(
        &self,
        action: &mut Action,
        handler: Arc<dyn ActionHandler>,
        error: ActionError,
        now: Timestamp,
    ) -> Result<(), Error> {
        let (id, action_type) = (action.id, action.action_type());
        let kind = error.kind();
        let sanitized = error.sanitize();
        let attempts = action.attempts.saturating_add(1);

        let settlement = if error == ActionError::Unauthorized {
            Settlement::Retain {
                session_expired: true,
            }
        } else if kind == FailureKind::UnknownDefect || handler.is_permanent_error(&error) {
            Settlement::Drop
        } else if attempts >= self.config.max_attempts {
            Settlement::Retain {
                session_expired: false,
            }
        } else {
            Settlement::Retry {
                attempts,
                at: now.saturating_add(self.config.retry_delay(attempts)),
            }
        };

        match settlement {
            Settlement::Retry { attempts, at } => {
                action.status = ActionStatus::Pending;
                action.attempts = attempts;
                action.last_error = Some(sanitized.message().to_string());
                action.next_attempt_at = at;
                {
                    // Once pending, the record is visible to a deduping enqueue
                    let mut scheduler = self.scheduler.lock();
                    self.storage.update_action(action)?;
                    scheduler.reschedule(&id, at);
                }

                tracing::warn!(
                    action_id = %id,
                    action_type = %action_type,
                    attempts,
                    kind = %kind,
                    next_attempt_at = %at,
                    error = %error,
                    "Action failed, retry scheduled"
                );
                self.emit(QueueEvent::Retrying {
                    id,
                    action_type,
                    attempts,
                    next_attempt_at: at,
                    kind,
                });
            }
            Settlement::Drop => {
                self.storage.delete_action(&id)?;
                self.scheduler.lock().remove(&id);
                tracing::warn!(
                    action_id = %id,
                    action_type = %action_type,
                    kind = %kind,
                    error = %error,
                    "Action failed permanently"
                );
                self.abandon(action, handler, &sanitized, false).await;
            }
            Settlement::Retain { session_expired } => {
                action.attempts = attempts;
                self.persist_terminal(action, &sanitized, now)?;
                self.scheduler.lock().remove(&id);
                if session_expired {
                    tracing::warn!(action_id = %id, action_type = %action_type, "Session expired, action abandoned");
                    self.emit(QueueEvent::SessionExpired { id, action_type });
                } else {
                    tracing::warn!(
                        action_id = %id,
                        action_type = %action_type,
                        attempts,
                        kind = %kind,
                        error = %error,
                        "Retries exhausted, action abandoned"
                    );
                }
                self.abandon(action, handler, &sanitized, true).await;
            }
        }
        Ok(())
    }

    /// Run `on_failure` and surface the failure message, once per abandoned action
    async fn abandon(
        &self,
        action: &Action,
        handler: Arc<dyn ActionHandler>,
        sanitized: &SanitizedError,
        retained: bool,
    ) {
        let (id, action_type) = (action.id, action.action_type());
        handler.on_failure(&action.context, sanitized).await;

        self.emit(QueueEvent::Abandoned {
            id,
            action_type,
            kind: sanitized.kind(),
            retained,
        });
        if let Some(message) = handler.failure_message() {
            self.emit(QueueEvent::Notice {
                id,
                action_type,
                message,
            });
        }
    }

    fn persist_terminal(
        &self,
        action: &mut Action,
        sanitized: &SanitizedError,
        now: Timestamp,
    ) -> Result<(), StorageError> {
        action.status = ActionStatus::Failed;
        action.last_error = Some(sanitized.message().to_string());
        action.processed_at = Some(now);
        self.storage.update_action(action)
    }

    /// Storage failed mid-settlement; try the action again after a poll interval
    fn retry_later(&self, id: &ActionId, now: Timestamp) {
        let at = now.saturating_add(self.config.poll_interval());
        tracing::error!(action_id = %id, "Storage failed while settling action, retrying later");
        self.scheduler.lock().reschedule(id, at);
    }

    fn emit(&self, event: QueueEvent) {
        let Some(sender) = &self.events else {
            return;
        };
        if let Err(e) = sender.try_send(event) {
            tracing::debug!(error = %e, "Dropped queue event");
        }
    }
}
