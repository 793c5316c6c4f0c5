// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Delay queue: a ring of buckets indexed by discretised delay
//!
//! An item pushed with delay `d` lands in bucket `(current_slot + d) % K` and
//! is returned by `peek_due()` after exactly `d` calls to `advance()`. Items
//! in one bucket come back in push order.

use crate::error::ConfigurationError;

#[derive(Debug, Clone)]
pub struct DelayQueue {
    buckets: Vec<Vec<u32>>,
    current_slot: usize,
}

impl DelayQueue {
    /// Queue with `slots` buckets, holding delays `0..slots`
    pub fn new(slots: usize) -> Result<Self, ConfigurationError> {
        if slots == 0 {
            return Err(ConfigurationError::EmptyQueue);
        }
        Ok(Self {
            buckets: vec![Vec::new(); slots],
            current_slot: 0,
        })
    }

    /// Queue able to hold delays up to and including `max_delay` steps
    pub fn with_max_delay(max_delay: usize) -> Result<Self, ConfigurationError> {
        Self::new(max_delay.saturating_add(1))
    }

    /// Number of buckets (`K`)
    pub fn num_slots(&self) -> usize {
        self.buckets.len()
    }

    pub fn max_delay(&self) -> usize {
        self.buckets.len() - 1
    }

    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    /// Schedule `item` for delivery `delay` steps from now
    ///
    /// # Errors
    ///
    /// `DelayOutOfRange` if `delay >= K`.
    #[inline]
    pub fn push(&mut self, item: u32, delay: usize) -> Result<(), ConfigurationError> {
        let slots = self.buckets.len();
        if delay >= slots {
            return Err(ConfigurationError::DelayOutOfRange { delay, slots });
        }
        let slot = (self.current_slot + delay) % slots;
        self.buckets[slot].push(item);
        Ok(())
    }

    /// Items due at the current step
    #[inline]
    pub fn peek_due(&self) -> &[u32] {
        &self.buckets[self.current_slot]
    }

    /// Drop the current bucket's items and move to the next step
    #[inline]
    pub fn advance(&mut self) {
        self.buckets[self.current_slot].clear();
        self.current_slot = (self.current_slot + 1) % self.buckets.len();
    }

    /// Total items waiting in all buckets
    pub fn pending(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.current_slot = 0;
    }

    /// Copy of this queue with `slots` buckets and the same pending items
    ///
    /// Every pending item keeps its remaining delay.
    pub fn resized(&self, slots: usize) -> Result<Self, ConfigurationError> {
        let mut queue = Self::new(slots)?;
        let old_slots = self.buckets.len();
        for offset in 0..old_slots {
            let bucket = &self.buckets[(self.current_slot + offset) % old_slots];
            for &item in bucket {
                queue.push(item, offset)?;
            }
        }
        Ok(queue)
    }
}
