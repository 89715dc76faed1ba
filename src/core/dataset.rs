//! Dataset execution core.
//!
//! A `Dataset` owns a columnar frame, its transformation history, queued vs.
//! executed operation lists, sparse frame checkpoints, and undo/redo stacks.
//! Execution discipline is governed by a per-dataset [`ExecutionMode`]:
//! `Eager` runs operations immediately, `Lazy` queues them for batched
//! execution. `current_frame` is replaced wholesale on every successful
//! execute/undo/redo and is always derivable by replaying the executed
//! operations against `original_frame`; checkpoints only bound replay cost.

use polars::prelude::*;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::types::{DatasetId, ExecutionMode};
use crate::errors::{Error, Result};
use crate::ops::Operation;

/// Default number of executed operations between frame checkpoints.
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 10;

/// Outcome of a single queued-operation execution step.
///
/// Deliberately a tri-state result rather than a bool/exception mix: the
/// caller can tell "queue drained" from "stopped at a failure" without
/// exception-driven control flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    Executed,
    Failed(String),
    QueueEmpty,
}

/// A loaded dataset and its transformation pipeline state.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub id: DatasetId,
    /// Unique within a session; the session suffixes collisions.
    pub name: String,
    /// Path or URL the data was loaded from.
    pub source: String,
    /// Name of the columnar engine in use.
    pub backend: &'static str,
    /// Ordered column name -> dtype debug-name pairs, as loaded.
    pub schema: Vec<(String, String)>,
    /// Original, pre-transformation row count.
    pub row_count: usize,
    /// As-loaded data; exclusively owned, never mutated.
    original_frame: Arc<DataFrame>,
    /// Result of all executed operations; replaced wholesale, never mutated
    /// in place.
    current_frame: Option<Arc<DataFrame>>,
    /// Front = next to execute.
    pub queued_operations: VecDeque<Operation>,
    pub executed_operations: Vec<Operation>,
    /// Legacy mirror of `executed_operations`, kept for serialization
    /// compatibility with older saved analyses.
    pub operation_history: Vec<Operation>,
    pub redo_stack: Vec<Operation>,
    /// Sparse map executed-operation-count -> frame snapshot.
    checkpoints: BTreeMap<usize, Arc<DataFrame>>,
    pub checkpoint_interval: usize,
    pub execution_mode: ExecutionMode,
    /// Session-scoped flag; exactly one dataset is active per session.
    pub is_active: bool,
}

impl Dataset {
    /// Wrap an as-loaded frame into a dataset with schema and row count
    /// derived from it.
    pub fn new(name: impl Into<String>, source: impl Into<String>, frame: DataFrame) -> Self {
        let schema = frame
            .get_columns()
            .iter()
            .map(|c| (c.name().to_string(), format!("{:?}", c.dtype())))
            .collect();
        let row_count = frame.height();
        let original = Arc::new(frame);
        Self {
            id: DatasetId::new(),
            name: name.into(),
            source: source.into(),
            backend: "polars",
            schema,
            row_count,
            current_frame: Some(original.clone()),
            original_frame: original,
            queued_operations: VecDeque::new(),
            executed_operations: Vec::new(),
            operation_history: Vec::new(),
            redo_stack: Vec::new(),
            checkpoints: BTreeMap::new(),
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            execution_mode: ExecutionMode::default(),
            is_active: false,
        }
    }

    pub fn with_checkpoint_interval(mut self, interval: usize) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    /// The as-loaded frame.
    pub fn original(&self) -> Arc<DataFrame> {
        self.original_frame.clone()
    }

    /// The frame reflecting all executed operations (the original frame when
    /// nothing has executed yet).
    pub fn current(&self) -> Arc<DataFrame> {
        self.current_frame
            .clone()
            .unwrap_or_else(|| self.original_frame.clone())
    }

    pub fn set_execution_mode(&mut self, mode: ExecutionMode) {
        debug!(dataset = %self.name, %mode, "switching execution mode");
        self.execution_mode = mode;
    }

    /// Single entry point used by all UI flows.
    ///
    /// In lazy mode this queues the operation and returns immediately; in
    /// eager mode it runs synchronously. An eager failure leaves
    /// `current_frame` untouched and the operation un-added to any list.
    pub fn apply_operation(&mut self, op: Operation) -> Result<()> {
        match self.execution_mode {
            ExecutionMode::Lazy => {
                self.queue_operation(op);
                Ok(())
            }
            ExecutionMode::Eager => {
                let frame = self.run_step(&op)?;
                self.commit_executed(op, frame, true);
                Ok(())
            }
        }
    }

    /// Explicit enqueue, independent of the current execution mode.
    pub fn queue_operation(&mut self, mut op: Operation) {
        op.state = crate::ops::OperationState::Queued;
        op.error_message = None;
        debug!(dataset = %self.name, display = %op.display, "queued operation");
        self.queued_operations.push_back(op);
    }

    /// Pop and execute the front of the queue.
    ///
    /// On failure the operation is marked `Failed` and re-inserted at the
    /// front, so it stays visible and addressable and blocks progress past
    /// it. Retrying later re-attempts the same operation.
    pub fn execute_next_queued(&mut self) -> ExecOutcome {
        let Some(mut op) = self.queued_operations.pop_front() else {
            return ExecOutcome::QueueEmpty;
        };
        match self.run_step(&op) {
            Ok(frame) => {
                self.commit_executed(op, frame, true);
                ExecOutcome::Executed
            }
            Err(err) => {
                let message = err.to_string();
                warn!(dataset = %self.name, display = %op.display, %message, "queued operation failed");
                op.mark_failed(message.clone());
                self.queued_operations.push_front(op);
                ExecOutcome::Failed(message)
            }
        }
    }

    /// Execute queued operations until the queue is empty or a step fails.
    ///
    /// Returns the number of successful executions. A failure leaves the
    /// failing operation at the front of the queue and everything after it
    /// untouched; partial progress is preserved, not rolled back.
    pub fn execute_all_queued(&mut self) -> usize {
        let mut executed = 0;
        loop {
            match self.execute_next_queued() {
                ExecOutcome::Executed => executed += 1,
                ExecOutcome::Failed(_) | ExecOutcome::QueueEmpty => break,
            }
        }
        executed
    }

    /// Discard all queued operations without applying them.
    pub fn clear_queued(&mut self) -> usize {
        let cleared = self.queued_operations.len();
        self.queued_operations.clear();
        cleared
    }

    /// Undo the most recent executed operation.
    ///
    /// Rebuilds `current_frame` from the nearest checkpoint at or before the
    /// new operation count, replaying the remaining executed operations in
    /// order. Returns `false` when there is nothing to undo, or when a
    /// replay step fails (state is left uncorrupted: the rebuild happens off
    /// to the side and is only committed on success).
    pub fn undo(&mut self) -> bool {
        if self.executed_operations.is_empty() {
            return false;
        }
        let target = self.executed_operations.len() - 1;
        let rebuilt = match self.replay_to(target) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(dataset = %self.name, %err, "undo replay failed");
                return false;
            }
        };
        if let Some(op) = self.executed_operations.pop() {
            self.operation_history.pop();
            self.redo_stack.push(op);
        }
        // checkpoints past the new length belong to the undone timeline
        self.checkpoints.retain(|count, _| *count <= target);
        self.current_frame = Some(Arc::new(rebuilt));
        true
    }

    /// Re-execute the most recently undone operation.
    ///
    /// Returns `false` when the redo stack is empty or the re-execution
    /// fails (the operation is pushed back in that case). Redo does not
    /// clear the remaining redo stack; any other successful forward
    /// execution does.
    pub fn redo(&mut self) -> bool {
        let Some(op) = self.redo_stack.pop() else {
            return false;
        };
        match self.run_step(&op) {
            Ok(frame) => {
                self.commit_executed(op, frame, false);
                true
            }
            Err(err) => {
                warn!(dataset = %self.name, %err, "redo failed");
                self.redo_stack.push(op);
                false
            }
        }
    }

    /// Replay every executed operation against the original frame, ignoring
    /// checkpoints. The result must match `current()` row for row; used to
    /// verify pipeline integrity.
    pub fn replay_from_original(&self) -> Result<DataFrame> {
        let mut frame = self.original_frame.as_ref().clone();
        for op in &self.executed_operations {
            frame = op.step.apply(&frame)?;
        }
        Ok(frame)
    }

    /// A deterministic page of the current frame, ordered by the first
    /// column so pagination is repeatable even against lazily-evaluated
    /// backends. Falls back to an unordered slice if stable ordering fails.
    /// Returns `None` when there is nothing to page over.
    pub fn get_page(&self, page_num: usize, page_size: usize) -> Option<DataFrame> {
        if page_size == 0 {
            return None;
        }
        let frame = self.current();
        let offset = (page_num * page_size) as i64;
        let Some(first_column) = frame.get_column_names().first().map(|c| c.to_string()) else {
            return None;
        };
        let by = vec![first_column];
        let options = SortMultipleOptions::default().with_maintain_order(true);
        match frame.sort(&by, options) {
            Ok(sorted) => Some(sorted.slice(offset, page_size)),
            Err(err) => {
                debug!(dataset = %self.name, %err, "stable page ordering unavailable, using plain slice");
                Some(frame.slice(offset, page_size))
            }
        }
    }

    /// Number of operations executed so far.
    pub fn executed_count(&self) -> usize {
        self.executed_operations.len()
    }

    fn run_step(&self, op: &Operation) -> Result<DataFrame> {
        let base = self.current();
        op.step
            .apply(&base)
            .map_err(|err| Error::operation_failed(op.display.clone(), err))
    }

    fn commit_executed(&mut self, mut op: Operation, frame: DataFrame, clear_redo: bool) {
        op.mark_executed();
        self.operation_history.push(op.clone());
        self.executed_operations.push(op);
        self.current_frame = Some(Arc::new(frame));
        if clear_redo {
            // new forward history invalidates the old redo path
            self.redo_stack.clear();
        }
        let count = self.executed_operations.len();
        if self.checkpoint_interval > 0 && count % self.checkpoint_interval == 0 {
            debug!(dataset = %self.name, count, "checkpointing frame");
            self.checkpoints.insert(count, self.current());
        }
    }

    /// Rebuild the frame state after `count` executed operations, starting
    /// from the nearest checkpoint at or below `count`.
    fn replay_to(&self, count: usize) -> Result<DataFrame> {
        let (start, mut frame) = match self.checkpoints.range(..=count).next_back() {
            Some((at, snapshot)) => (*at, snapshot.as_ref().clone()),
            None => (0, self.original_frame.as_ref().clone()),
        };
        for op in &self.executed_operations[start..count] {
            frame = op
                .step
                .apply(&frame)
                .map_err(|err| Error::operation_failed(op.display.clone(), err))?;
        }
        Ok(frame)
    }
}
