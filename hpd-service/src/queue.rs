//! Outbound HPD message queue
//!
//! DisplayPort alt-mode converters must forward HPD updates in the order they were detected
//! without flooding the PD link. Updates wait here until the drain callback delivers them.
//! When the queue is full the oldest pending update is dropped, so the queue always holds the
//! most recent undelivered events.
use dock_services::hpd::HpdEvent;
use dock_services::{error, warn};
use heapless::Deque;

/// Number of pending HPD messages
pub const MAX_HPD_MSG_QUEUE: usize = 4;

/// Fixed-capacity ring of pending HPD events
#[derive(Debug, Default)]
pub struct MessageQueue {
    events: Deque<HpdEvent, MAX_HPD_MSG_QUEUE>,
    /// Number of events dropped to make room for newer ones
    evicted: u32,
}

impl MessageQueue {
    /// Create an empty queue
    pub const fn new() -> Self {
        Self {
            events: Deque::new(),
            evicted: 0,
        }
    }

    /// Number of pending events
    pub fn depth(&self) -> usize {
        self.events.len()
    }

    /// Returns true if nothing is pending
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Discard all pending events
    pub fn reset(&mut self) {
        self.events.clear();
    }

    /// Append an event, dropping the oldest pending one if the queue is full.
    ///
    /// Returns the dropped event, if any.
    pub fn push_evicting(&mut self, event: HpdEvent) -> Option<HpdEvent> {
        let evicted = if self.events.is_full() {
            self.evicted = self.evicted.wrapping_add(1);
            let oldest = self.events.pop_front();
            warn!("HPD queue full, dropping {:?} for {:?}", oldest, event);
            oldest
        } else {
            None
        };

        if let Err(event) = self.events.push_back(event) {
            error!("HPD queue: no room for {:?}", event);
        }
        evicted
    }

    /// Remove the oldest pending event
    pub fn pop(&mut self) -> Option<HpdEvent> {
        self.events.pop_front()
    }

    /// `n`-th pending event counting from the oldest, 0 is the oldest
    pub fn peek_from_tail(&self, n: usize) -> Option<HpdEvent> {
        self.events.iter().nth(n).copied()
    }

    /// `n`-th pending event counting from the newest, 0 is the newest
    pub fn peek_from_head(&self, n: usize) -> Option<HpdEvent> {
        self.events.iter().rev().nth(n).copied()
    }

    /// Most recently queued event
    pub fn newest(&self) -> Option<HpdEvent> {
        self.events.back().copied()
    }

    /// Total number of events dropped on overflow
    pub fn evicted(&self) -> u32 {
        self.evicted
    }
}
