// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client-driven polling.
//!
//! A [`PollTask`] reads one variable per tick and hands the sample to the
//! [`ValueDispatcher`]. The [`PollScheduler`] runs each task on its own tokio
//! task with a fixed-rate schedule:
//!
//! ```text
//! tick n fires at  start + initial_offset + n * period
//! ```
//!
//! Ticks of one task never overlap. A tick that overruns its slot is followed
//! by one immediate tick, after which the schedule realigns to the grid and
//! the missed slots are dropped.
//!
//! Each read is bounded by [`PollSettings::read_timeout`]. A failed read
//! (transport error, non-good status or timeout) halts the task: the loop
//! does not retry on its own, and the failure is reported through
//! [`PollExit::Failed`] when the task is removed.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::client::transport::ObservationSession;
use crate::client::value::ValueSample;
use crate::error::{OpcUaError, OpcUaResult, ReadError};
use crate::observe::dispatch::ValueDispatcher;
use crate::types::{PollSettings, VariableReference};

// =============================================================================
// PollTaskId
// =============================================================================

/// Identifies a task registered with a [`PollScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PollTaskId(u64);

impl PollTaskId {
    /// Returns the raw ID value.
    #[inline]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PollTaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "poll-{}", self.0)
    }
}

// =============================================================================
// PollTask
// =============================================================================

/// Periodic read of one variable over a shared session.
pub struct PollTask<S: ObservationSession> {
    session: Arc<S>,
    target: VariableReference,
    settings: PollSettings,
}

impl<S: ObservationSession> PollTask<S> {
    /// Creates a poll task.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the period or read timeout is zero.
    pub fn new(
        session: Arc<S>,
        target: VariableReference,
        settings: PollSettings,
    ) -> OpcUaResult<Self> {
        settings.validate()?;
        Ok(Self {
            session,
            target,
            settings,
        })
    }

    /// Returns the polled variable.
    pub fn target(&self) -> &VariableReference {
        &self.target
    }

    /// Returns the schedule settings.
    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Performs one tick: resolve the node, read it, dispatch the sample.
    ///
    /// The whole round trip is bounded by the read timeout.
    pub async fn tick(&self, dispatcher: &ValueDispatcher) -> OpcUaResult<ValueSample> {
        tracing::debug!(node_id = %self.target, "tick..");

        let bound = self.settings.read_timeout;
        let (display_name, sample) = tokio::time::timeout(bound, self.resolve_and_read())
            .await
            .map_err(|_| OpcUaError::read_timeout(self.target.to_string(), bound))??;

        if !sample.is_good() {
            return Err(OpcUaError::read(ReadError::bad_status(
                self.target.to_string(),
                sample.status_code.bits(),
            )));
        }

        tracing::info!(
            node_id = %self.target,
            "NodeID: {}, DisplayName: {}, CurrentValue: {}",
            self.target,
            display_name,
            sample.value
        );

        dispatcher.dispatch(&self.target, &sample);
        Ok(sample)
    }

    async fn resolve_and_read(&self) -> OpcUaResult<(String, ValueSample)> {
        let display_name = self
            .session
            .display_name(&self.target)
            .await
            .map_err(|e| as_read_error(&self.target, e))?;
        let sample = self
            .session
            .read_value(&self.target)
            .await
            .map_err(|e| as_read_error(&self.target, e))?;
        Ok((display_name, sample))
    }
}

impl<S: ObservationSession> fmt::Debug for PollTask<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollTask")
            .field("target", &self.target)
            .field("settings", &self.settings)
            .finish()
    }
}

/// Any failure during a tick surfaces as a read error.
fn as_read_error(target: &VariableReference, error: OpcUaError) -> OpcUaError {
    match error {
        OpcUaError::Read(_) => error,
        other => OpcUaError::read_failed(target.to_string(), other.to_string()),
    }
}

// =============================================================================
// PollExit
// =============================================================================

/// How a poll task ended.
#[derive(Debug)]
pub enum PollExit {
    /// Removed from the scheduler.
    Stopped {
        /// Ticks started before the stop.
        ticks: u64,
    },
    /// Halted by a failed tick.
    Failed {
        /// Ticks started, including the failed one.
        ticks: u64,
        /// The failure.
        error: OpcUaError,
    },
}

impl PollExit {
    /// Returns the number of ticks the task started.
    pub fn ticks(&self) -> u64 {
        match self {
            Self::Stopped { ticks } | Self::Failed { ticks, .. } => *ticks,
        }
    }

    /// Returns `true` if a failed tick halted the task.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Returns the failure, if any.
    pub fn error(&self) -> Option<&OpcUaError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            Self::Stopped { .. } => None,
        }
    }
}

// =============================================================================
// PollTaskStats
// =============================================================================

/// Counters of one poll task.
#[derive(Debug, Default)]
pub struct PollTaskStats {
    ticks: AtomicU64,
    reads_ok: AtomicU64,
    reads_failed: AtomicU64,
}

impl PollTaskStats {
    fn record_tick(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn record_read_ok(&self) {
        self.reads_ok.fetch_add(1, Ordering::Relaxed);
    }

    fn record_read_failed(&self) {
        self.reads_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns ticks started.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Returns successful reads.
    pub fn reads_ok(&self) -> u64 {
        self.reads_ok.load(Ordering::Relaxed)
    }

    /// Returns failed reads.
    pub fn reads_failed(&self) -> u64 {
        self.reads_failed.load(Ordering::Relaxed)
    }
}

// =============================================================================
// PollScheduler
// =============================================================================

struct ScheduledPoll {
    target: VariableReference,
    stop: watch::Sender<bool>,
    done: watch::Receiver<bool>,
    join: JoinHandle<PollExit>,
    stats: Arc<PollTaskStats>,
}

/// Runs poll tasks on the tokio runtime.
///
/// Removing a task stops its schedule but lets an in-flight tick finish.
pub struct PollScheduler {
    dispatcher: Arc<ValueDispatcher>,
    tasks: Mutex<HashMap<PollTaskId, ScheduledPoll>>,
    next_id: AtomicU64,
}

impl PollScheduler {
    /// Creates a scheduler delivering to `dispatcher`.
    pub fn new(dispatcher: Arc<ValueDispatcher>) -> Self {
        Self {
            dispatcher,
            tasks: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Starts `task` and returns its id.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<S>(&self, task: PollTask<S>) -> PollTaskId
    where
        S: ObservationSession + 'static,
    {
        let id = PollTaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (stop_tx, stop_rx) = watch::channel(false);
        let (done_tx, done_rx) = watch::channel(false);
        let stats = Arc::new(PollTaskStats::default());
        let target = task.target().clone();

        let run = run_poll_task(
            id,
            task,
            Arc::clone(&self.dispatcher),
            Arc::clone(&stats),
            stop_rx,
        );
        let join = tokio::spawn(async move {
            let exit = run.await;
            let _ = done_tx.send(true);
            exit
        });

        self.tasks.lock().insert(
            id,
            ScheduledPoll {
                target,
                stop: stop_tx,
                done: done_rx,
                join,
                stats,
            },
        );
        id
    }

    /// Detaches a task and waits for its in-flight tick, if any.
    ///
    /// Returns `None` if no task with `id` is registered.
    pub async fn remove(&self, id: PollTaskId) -> Option<PollExit> {
        let scheduled = self.tasks.lock().remove(&id)?;
        // A task that already halted has dropped its receiver.
        let _ = scheduled.stop.send(true);

        match scheduled.join.await {
            Ok(exit) => Some(exit),
            Err(e) => Some(PollExit::Failed {
                ticks: scheduled.stats.ticks(),
                error: OpcUaError::read_failed(scheduled.target.to_string(), e.to_string()),
            }),
        }
    }

    /// Returns `true` if the task is registered and its loop is still running.
    pub fn is_running(&self, id: PollTaskId) -> bool {
        self.tasks
            .lock()
            .get(&id)
            .map(|t| !t.join.is_finished())
            .unwrap_or(false)
    }

    /// Resolves once the task's loop has ended, stopped or halted.
    ///
    /// Resolves at once if no task with `id` is registered. The task stays
    /// registered; collect its exit with [`Self::remove`].
    pub async fn finished(&self, id: PollTaskId) {
        let Some(mut done) = self.tasks.lock().get(&id).map(|t| t.done.clone()) else {
            return;
        };
        // A dropped sender means the task is gone as well.
        let _ = done.wait_for(|done| *done).await;
    }

    /// Returns the counters of a registered task.
    pub fn stats(&self, id: PollTaskId) -> Option<Arc<PollTaskStats>> {
        self.tasks.lock().get(&id).map(|t| Arc::clone(&t.stats))
    }

    /// Returns the ids of all registered tasks.
    pub fn task_ids(&self) -> Vec<PollTaskId> {
        let mut ids: Vec<_> = self.tasks.lock().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Returns the number of registered tasks.
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Returns `true` if no task is registered.
    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// Removes every task.
    pub async fn shutdown(&self) -> Vec<(PollTaskId, PollExit)> {
        let mut exits = Vec::new();
        for id in self.task_ids() {
            if let Some(exit) = self.remove(id).await {
                exits.push((id, exit));
            }
        }
        exits
    }
}

impl fmt::Debug for PollScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollScheduler")
            .field("tasks", &self.len())
            .finish()
    }
}

async fn run_poll_task<S: ObservationSession>(
    id: PollTaskId,
    task: PollTask<S>,
    dispatcher: Arc<ValueDispatcher>,
    stats: Arc<PollTaskStats>,
    mut stop: watch::Receiver<bool>,
) -> PollExit {
    let settings = task.settings();
    let mut interval =
        tokio::time::interval_at(Instant::now() + settings.initial_offset, settings.period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        task_id = %id,
        node_id = %task.target(),
        period_ms = duration_ms(settings.period),
        initial_offset_ms = duration_ms(settings.initial_offset),
        "Poll task started"
    );

    loop {
        tokio::select! {
            biased;
            _ = stop.changed() => break,
            _ = interval.tick() => {}
        }

        let tick = stats.record_tick();
        if let Err(error) = task.tick(&dispatcher).await {
            stats.record_read_failed();
            error.log("poll tick");
            tracing::warn!(task_id = %id, tick, "Poll task halted after failed read");
            return PollExit::Failed { ticks: tick, error };
        }
        stats.record_read_ok();
    }

    let ticks = stats.ticks();
    tracing::info!(task_id = %id, ticks, "Poll task stopped");
    PollExit::Stopped { ticks }
}

fn duration_ms(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

// =============================================================================
// Tests
// =============================================================================
