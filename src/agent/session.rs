//! Agent sessions: a spawned task with a cooperative stop signal.
//!
//! The stop signal is handed to the task at spawn time. Tasks poll
//! [`StopSignal::is_stopped`] or select on [`StopSignal::stopped`] at safe
//! points; nothing is preempted until [`Session::stop_session`] gives up
//! waiting and aborts.

use crate::error::ApiError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Receiving half of a session's stop channel.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once a stop is requested or the session handle is dropped.
    pub async fn stopped(&mut self) {
        if *self.rx.borrow_and_update() {
            return;
        }
        while self.rx.changed().await.is_ok() {
            if *self.rx.borrow_and_update() {
                return;
            }
        }
    }
}

/// What a session is asked to work on.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub agent: String,
    pub message: String,
    pub system_prompt: Option<String>,
    pub tools: Vec<String>,
}

/// Long-running agent work executed inside a session.
#[async_trait]
pub trait AgentTask: Send + Sync + 'static {
    async fn run(&self, ctx: TaskContext, stop: StopSignal) -> Result<(), ApiError>;
}

/// Task that stays busy until stopped or until `max_idle` elapses.
pub struct IdleTask {
    pub tick: Duration,
    pub max_idle: Option<Duration>,
}

impl Default for IdleTask {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(250),
            max_idle: None,
        }
    }
}

#[async_trait]
impl AgentTask for IdleTask {
    async fn run(&self, ctx: TaskContext, mut stop: StopSignal) -> Result<(), ApiError> {
        let started = tokio::time::Instant::now();
        loop {
            tokio::select! {
                _ = stop.stopped() => {
                    debug!(agent = %ctx.agent, "Idle task observed stop signal");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.tick) => {
                    if let Some(max_idle) = self.max_idle {
                        if started.elapsed() >= max_idle {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

/// How a session ended when it was shut down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionExit {
    Completed,
    Failed(String),
    /// Did not observe the stop signal within the timeout
    Aborted,
}

/// A running (or finished) agent task.
pub struct Session {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<Result<(), ApiError>>,
    started_at: DateTime<Utc>,
}

impl Session {
    /// Spawn `task` on the current tokio runtime.
    pub fn spawn(task: Arc<dyn AgentTask>, ctx: TaskContext) -> Self {
        let (stop_tx, rx) = watch::channel(false);
        let stop = StopSignal { rx };
        let agent = ctx.agent.clone();
        let handle = tokio::spawn(async move {
            let result = task.run(ctx, stop).await;
            if let Err(ref e) = result {
                warn!(agent = %agent, error = %e, "Agent task failed");
            }
            result
        });
        Self {
            stop_tx,
            handle,
            started_at: Utc::now(),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn stop_requested(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Task still running and not yet asked to stop.
    pub fn is_running(&self) -> bool {
        !self.is_finished() && !self.stop_requested()
    }

    /// Send the stop signal. Returns true if this call sent it to a live task.
    pub fn request_stop(&self) -> bool {
        let already = self.stop_tx.send_replace(true);
        !already && !self.is_finished()
    }

    /// Signal stop and wait up to `timeout` for the task to exit, then abort it.
    pub async fn stop_session(mut self, timeout: Duration) -> SessionExit {
        self.stop_tx.send_replace(true);
        match tokio::time::timeout(timeout, &mut self.handle).await {
            Ok(Ok(Ok(()))) => SessionExit::Completed,
            Ok(Ok(Err(e))) => SessionExit::Failed(e.to_string()),
            Ok(Err(join_err)) => SessionExit::Failed(join_err.to_string()),
            Err(_) => {
                self.handle.abort();
                SessionExit::Aborted
            }
        }
    }
}
