//! Pending / in-flight event buffers.
//!
//! Visits accumulate in the pending queue. A flush moves all of them onto the
//! in-flight queue, which is what the request is built from. In-flight is only
//! cleared by a confirmed send, so a failed batch rides along with the next
//! one. To keep repeated failures from growing it without bound, an in-flight
//! queue larger than `buffer_limit` is dropped whole at the next promotion.

use log::warn;

use crate::event::PendingEvent;

#[derive(Debug)]
pub struct EventBuffer {
    pending:   Vec<PendingEvent>,
    in_flight: Vec<PendingEvent>,
    threshold: usize,
    limit:     usize,
}

impl EventBuffer {
    pub fn new(threshold: usize, limit: usize) -> Self {
        EventBuffer {
            pending:   Vec::new(),
            in_flight: Vec::new(),
            threshold,
            limit,
        }
    }

    /// Append a visit. Returns `true` when the pending queue has grown past
    /// the threshold and the caller should flush.
    pub fn add_pending(&mut self, event: PendingEvent) -> bool {
        self.pending.push(event);
        self.pending.len() > self.threshold
    }

    /// Move every pending visit onto the in-flight queue.
    ///
    /// Returns `false`, changing nothing, when there is nothing pending; the
    /// caller must not send in that case even if in-flight is non-empty.
    pub fn promote_to_in_flight(&mut self) -> bool {
        if self.pending.is_empty() {
            return false;
        }
        if self.in_flight.len() > self.limit {
            warn!(
                "in-flight batch of {} exceeds limit {}; discarding it",
                self.in_flight.len(),
                self.limit
            );
            self.in_flight.clear();
        }
        self.in_flight.append(&mut self.pending);
        true
    }

    /// Forget the in-flight batch after the collector has taken it.
    pub fn clear_in_flight(&mut self) {
        self.in_flight.clear();
    }

    pub fn pending(&self) -> &[PendingEvent] { &self.pending }

    pub fn in_flight(&self) -> &[PendingEvent] { &self.in_flight }
}
