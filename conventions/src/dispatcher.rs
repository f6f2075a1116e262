//! Convention batch dispatcher.
//!
//! A builder operation that makes several structural edits opens a batch
//! first. Events raised while any batch is open are queued; closing the
//! outermost batch hands the queue to the session for one consolidated
//! convention pass. Conventions run during that pass may open their own
//! batches and raise more events, which land on the same queue.

use crate::event::ModelEvent;
use keystone_core::{ModelError, ModelResult};
use std::collections::VecDeque;

/// A caller-owned batch scope.
///
/// Must be handed back to [`ConventionDispatcher::close`] in LIFO order.
#[must_use = "a convention batch must be closed"]
#[derive(Debug)]
pub struct ConventionBatch {
    depth: usize,
}

impl ConventionBatch {
    /// Nesting depth of this batch, starting at 1.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// Queues model events while conventions are delayed.
#[derive(Debug, Default)]
pub struct ConventionDispatcher {
    depth: usize,
    pending: VecDeque<ModelEvent>,
    flushing: bool,
    dispatched: usize,
    limit: usize,
}

impl ConventionDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Batches ====================

    /// Open a batch.
    pub fn delay_conventions(&mut self) -> ConventionBatch {
        self.depth += 1;
        ConventionBatch { depth: self.depth }
    }

    /// Close a batch.
    ///
    /// Returns true when this was the outermost batch and no pass is in
    /// progress, i.e. the caller must flush.
    ///
    /// Closing out of order is an error, but the batches opened inside the
    /// one being closed are unwound with it so the dispatcher stays usable.
    pub fn close(&mut self, batch: ConventionBatch) -> ModelResult<bool> {
        if batch.depth != self.depth {
            let current = self.depth;
            if batch.depth <= self.depth {
                self.depth = batch.depth - 1;
            }
            tracing::warn!(
                target: "keystone::conventions",
                expected = current,
                closed = batch.depth,
                depth = self.depth,
                "convention batch closed out of order"
            );
            return Err(ModelError::batch_out_of_order(current, batch.depth));
        }
        self.depth -= 1;
        Ok(self.depth == 0 && !self.flushing)
    }

    /// Returns true while events are being queued rather than dispatched.
    pub fn is_delayed(&self) -> bool {
        self.depth > 0 || self.flushing
    }

    /// Current batch nesting depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    // ==================== Events ====================

    /// Queue an event.
    pub fn notify(&mut self, event: ModelEvent) {
        tracing::trace!(
            target: "keystone::conventions",
            kind = event.kind(),
            depth = self.depth,
            flushing = self.flushing,
            "event queued"
        );
        self.pending.push_back(event);
    }

    /// Number of queued events.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    // ==================== Flushing ====================

    /// Start a convention pass that may dispatch at most `limit` events.
    pub fn begin_flush(&mut self, limit: usize) {
        self.flushing = true;
        self.dispatched = 0;
        self.limit = limit;
    }

    /// Next event of the pass, FIFO.
    ///
    /// Fails once the pass has dispatched more than its limit, which means
    /// conventions keep triggering each other.
    pub fn next_event(&mut self) -> ModelResult<Option<ModelEvent>> {
        let Some(event) = self.pending.pop_front() else {
            return Ok(None);
        };
        self.dispatched += 1;
        if self.dispatched > self.limit {
            return Err(ModelError::convention_overflow(self.limit));
        }
        Ok(Some(event))
    }

    /// Finish a pass. Returns the number of events dispatched.
    pub fn end_flush(&mut self) -> usize {
        self.flushing = false;
        self.dispatched
    }

    /// Abandon a failed pass, dropping whatever is still queued.
    pub fn abort_flush(&mut self) {
        if !self.pending.is_empty() {
            tracing::warn!(
                target: "keystone::conventions",
                dropped = self.pending.len(),
                "convention pass aborted"
            );
        }
        self.pending.clear();
        self.flushing = false;
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing
    }
}
