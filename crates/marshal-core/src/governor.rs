use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, error, info, warn};

use crate::capacity::CapacityCounter;
use crate::error::GovernorError;
use crate::identity::{default_max_concurrent_tasks, NodeIdentity};
use crate::ids::TaskId;
use crate::message::{CallbackTag, InboxMessage, ResultPayload, TaskResult, TaskSpec, TaskSubmit};
use crate::model::Model;
use crate::table::{GovernorTables, ProcessEntry};
use crate::whitelist::Whitelist;

/// Invoked by the Governor loop when a task finishes, in place of the
/// function-valued `on_completion_callback` the source passes through the
/// inbox (see the "callback-in-message" redesign flag). Registered ahead of
/// time under a [`CallbackTag::Named`] tag via [`Governor::attach_sidecar`].
pub trait CompletionHandler: Send + Sync {
    fn on_complete(&self, result: &TaskResult, original: &TaskSpec);
}

/// Spawns the Isolated Processor (C2) for one task. Implemented by the
/// `marshal-processor` crate; kept as a trait here so `marshal-core` never
/// depends on how a child process is actually launched.
#[async_trait]
pub trait ProcessorLauncher: Send + Sync {
    async fn spawn(
        &self,
        proc_id: TaskId,
        spec: TaskSpec,
        model: Arc<dyn Model>,
        inbox: mpsc::UnboundedSender<InboxMessage>,
    );
}

/// Default previous-tasks ring buffer capacity (open question in spec.md §9).
pub const DEFAULT_PREVIOUS_TASKS_CAPACITY: usize = 1000;

/// Default dead-man timeout for the watchdog (open question in spec.md §9).
pub const DEFAULT_DEAD_MAN_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// A handle usable from any task/process that needs to submit work or read
/// capacity/status: the Admission Façade (C6).
#[derive(Clone)]
pub struct GovernorHandle {
    inbox_tx: mpsc::UnboundedSender<InboxMessage>,
    capacity: Arc<CapacityCounter>,
    whitelist: Arc<Whitelist>,
    tables: GovernorTables,
    identity: Arc<NodeIdentity>,
    max_concurrent_tasks: usize,
}

impl GovernorHandle {
    /// `submit(task) -> governor_id`. Fails with `InvalidTaskSpec` if the
    /// class is not whitelisted. Does not check capacity (§4.1).
    pub fn submit(&self, submit: TaskSubmit) -> Result<TaskId, GovernorError> {
        if !self.whitelist.contains(&submit.spec.model_class) {
            return Err(GovernorError::invalid_task_spec(submit.spec.model_class.clone()));
        }
        let task_id = submit.task_id.clone().unwrap_or_else(TaskId::generate);
        self.inbox_tx
            .send(InboxMessage::Submit(submit))
            .map_err(|_| GovernorError::already_started())?;
        Ok(task_id)
    }

    pub fn has_capacity(&self) -> bool {
        self.capacity.has_capacity()
    }

    pub fn tables(&self) -> &GovernorTables {
        &self.tables
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    pub fn max_concurrent_tasks(&self) -> usize {
        self.max_concurrent_tasks
    }

    pub fn terminate(&self) {
        let _ = self.inbox_tx.send(InboxMessage::Terminate);
    }

    /// Low-level inbox access used by sidecars to post `TaskResult`s that
    /// originate outside a spawned child (not part of the public §4.5
    /// façade, but still the same single queue).
    pub fn inbox_sender(&self) -> mpsc::UnboundedSender<InboxMessage> {
        self.inbox_tx.clone()
    }
}

/// The Governor: owns the inbox, the process table, the whitelist and the
/// capacity scoreboard (C5, C6, C7).
pub struct Governor {
    inbox_tx: mpsc::UnboundedSender<InboxMessage>,
    inbox_rx: mpsc::UnboundedReceiver<InboxMessage>,
    capacity: Arc<CapacityCounter>,
    whitelist: Arc<Whitelist>,
    tables: GovernorTables,
    identity: Arc<NodeIdentity>,
    max_concurrent_tasks: usize,
    launcher: Arc<dyn ProcessorLauncher>,
    completion_handlers: RwLock<HashMap<String, Arc<dyn CompletionHandler>>>,
    dead_man_timeout: Duration,
    started: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Governor {
    pub fn new(launcher: Arc<dyn ProcessorLauncher>) -> Self {
        Self::with_capacity(launcher, default_max_concurrent_tasks())
    }

    pub fn with_capacity(launcher: Arc<dyn ProcessorLauncher>, max_concurrent_tasks: usize) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            inbox_tx,
            inbox_rx,
            capacity: Arc::new(CapacityCounter::new()),
            whitelist: Arc::new(Whitelist::new()),
            tables: GovernorTables::new(DEFAULT_PREVIOUS_TASKS_CAPACITY),
            identity: Arc::new(NodeIdentity::generate()),
            max_concurrent_tasks,
            launcher,
            completion_handlers: RwLock::new(HashMap::new()),
            dead_man_timeout: DEFAULT_DEAD_MAN_TIMEOUT,
            started: AtomicBool::new(false),
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn with_previous_tasks_capacity(mut self, capacity: usize) -> Self {
        self.tables = GovernorTables::new(capacity);
        self
    }

    pub fn with_dead_man_timeout(mut self, timeout: Duration) -> Self {
        self.dead_man_timeout = timeout;
        self
    }

    pub fn register_class(&self, name: impl Into<String>, model: Arc<dyn Model>) -> Result<(), GovernorError> {
        self.whitelist.register(name, model)
    }

    /// Registers a sidecar's completion handler under `name`, so that
    /// `TaskSubmit`s tagged `CallbackTag::Named(name)` route their result
    /// back to it.
    pub async fn attach_sidecar(&self, name: impl Into<String>, handler: Arc<dyn CompletionHandler>) {
        self.completion_handlers.write().await.insert(name.into(), handler);
    }

    pub fn handle(&self) -> GovernorHandle {
        GovernorHandle {
            inbox_tx: self.inbox_tx.clone(),
            capacity: Arc::clone(&self.capacity),
            whitelist: Arc::clone(&self.whitelist),
            tables: self.tables.clone(),
            identity: Arc::clone(&self.identity),
            max_concurrent_tasks: self.max_concurrent_tasks,
        }
    }

    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown_tx.clone()
    }

    /// Runs the main loop until `Terminate` is received or the shutdown
    /// watch is flipped. Idempotent-forbidden: intended to be driven once,
    /// from `start()`.
    pub async fn run(mut self) {
        self.whitelist.lock();
        self.started.store(true, Ordering::SeqCst);

        let watchdog_tables = self.tables.clone();
        let watchdog_inbox = self.inbox_tx.clone();
        let watchdog_timeout = self.dead_man_timeout;
        let mut watchdog_shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            run_watchdog(watchdog_tables, watchdog_inbox, watchdog_timeout, &mut watchdog_shutdown).await;
        });

        info!(node = %self.identity, max_concurrent_tasks = self.max_concurrent_tasks, "governor loop starting");

        loop {
            let free = self.max_concurrent_tasks as i64 - self.tables.running_count().await as i64;

            let message = match self.inbox_rx.try_recv() {
                Ok(message) => {
                    // A message was already waiting: the inbox was not
                    // empty this tick, so the scoreboard reads zero.
                    self.capacity.set(0);
                    message
                }
                Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {
                    self.capacity.set(if free > 0 { free } else { 0 });
                    tokio::select! {
                        biased;
                        _ = self.shutdown_rx.changed() => {
                            if *self.shutdown_rx.borrow() {
                                break;
                            }
                            continue;
                        }
                        received = self.inbox_rx.recv() => {
                            match received {
                                Some(message) => message,
                                None => break,
                            }
                        }
                    }
                }
            };

            match message {
                InboxMessage::Submit(submit) => self.handle_submit(submit).await,
                InboxMessage::Result(result) => self.handle_result(result).await,
                InboxMessage::Terminate => break,
            }
        }

        info!(node = %self.identity, "governor loop terminated");
    }

    async fn handle_submit(&self, submit: TaskSubmit) {
        let Some(model) = self.whitelist.get(&submit.spec.model_class) else {
            error!(model_class = %submit.spec.model_class, "rejecting submission: class missing from whitelist at dequeue time");
            return;
        };

        let proc_id = submit.task_id.clone().unwrap_or_else(TaskId::generate);
        self.tables
            .insert_running(ProcessEntry::new(
                proc_id.clone(),
                submit.spec.clone(),
                submit.callback.clone(),
            ))
            .await;

        if let CallbackTag::Named(name) = &submit.callback {
            debug!(task_id = %proc_id, sidecar = %name, "submission tagged for sidecar callback");
        }

        self.launcher
            .spawn(proc_id, submit.spec, model, self.inbox_tx.clone())
            .await;
    }

    async fn handle_result(&self, result: TaskResult) {
        let Some(entry) = self.tables.complete(&result.task_id, result.payload.clone()).await else {
            error!(task_id = %result.task_id, "received TaskResult for unknown task_id; dropping");
            return;
        };

        self.invoke_completion(&entry, &result).await;
    }

    async fn invoke_completion(&self, entry: &ProcessEntry, result: &TaskResult) {
        let CallbackTag::Named(name) = &entry.callback else {
            return;
        };

        let handler = self.completion_handlers.read().await.get(name).cloned();
        let Some(handler) = handler else {
            warn!(task_id = %entry.task_id, sidecar = %name, "no completion handler registered for tag");
            return;
        };

        let result = result.clone();
        let spec = entry.spec.clone();
        // Best-effort guard: an exception from the callback must not kill
        // the loop.
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
            handler.on_complete(&result, &spec);
        }));
        if outcome.is_err() {
            warn!(task_id = %entry.task_id, "completion callback panicked; continuing");
        }
    }
}

async fn run_watchdog(
    tables: GovernorTables,
    inbox: mpsc::UnboundedSender<InboxMessage>,
    timeout: Duration,
    shutdown: &mut watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
            _ = interval.tick() => {
                for task_id in tables.stale_running(timeout).await {
                    warn!(%task_id, ?timeout, "dead-man timeout: child produced no result, synthesizing failure");
                    let payload = ResultPayload::Failed {
                        exception: "dead-man timeout: child process produced no result".to_string(),
                        traceback: String::new(),
                        failure_origin_task_id: None,
                        exception_class_name: None,
                    };
                    if inbox
                        .send(InboxMessage::Result(TaskResult { task_id, payload }))
                        .is_err()
                    {
                        return;
                    }
                }
            }
        }
    }
}
