//! Bounded FIFO of serialized frames awaiting a connected transport.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// What to do when a frame is queued while the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest queued frame to make room.
    #[default]
    DropOldest,
    /// Keep the queue as is and discard the new frame.
    DropNewest,
}

#[derive(Debug)]
pub(crate) struct OutboundQueue {
    frames: VecDeque<String>,
    capacity: usize,
    policy: OverflowPolicy,
}

impl OutboundQueue {
    pub(crate) fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            frames: VecDeque::new(),
            capacity: capacity.max(1),
            policy,
        }
    }

    /// Appends a frame. Returns the frame that was discarded on overflow.
    pub(crate) fn push(&mut self, frame: String) -> Option<String> {
        if self.frames.len() < self.capacity {
            self.frames.push_back(frame);
            return None;
        }
        match self.policy {
            OverflowPolicy::DropOldest => {
                let dropped = self.frames.pop_front();
                self.frames.push_back(frame);
                dropped
            }
            OverflowPolicy::DropNewest => Some(frame),
        }
    }

    pub(crate) fn pop_front(&mut self) -> Option<String> {
        self.frames.pop_front()
    }

    /// Puts a frame back at the head, e.g. when a flush was interrupted.
    pub(crate) fn push_front(&mut self, frame: String) {
        self.frames.push_front(frame);
    }

    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
