//! # Cached Entity State
//!
//! Compact bitmask of derived facts about an execution ("does it have tasks?",
//! "does it have jobs?", ...). The flags let callers skip sub-fetches that are
//! known to return nothing.
//!
//! The bit positions are stored with the execution row and are part of the
//! persisted contract; see [`cached_state_bits`](crate::constants::cached_state_bits).

use crate::constants::cached_state_bits::{
    EVENT_SUBSCRIPTIONS_STATE_BIT, JOBS_STATE_BIT, TASKS_STATE_BIT, VARIABLES_STATE_BIT,
};
use serde::{Deserialize, Serialize};

/// Highest bit position the state can address
const MAX_STATE_BIT: u8 = 8;

/// Packed boolean flags of an execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CachedEntityState(i32);

impl CachedEntityState {
    /// Wrap raw bits as read from storage
    pub const fn from_bits(bits: i32) -> Self {
        Self(bits)
    }

    /// Raw bits for storage
    pub const fn bits(self) -> i32 {
        self.0
    }

    pub fn has_event_subscriptions(self) -> bool {
        self.is_bit_on(EVENT_SUBSCRIPTIONS_STATE_BIT)
    }

    pub fn set_has_event_subscriptions(&mut self, has_event_subscriptions: bool) {
        self.set_bit(EVENT_SUBSCRIPTIONS_STATE_BIT, has_event_subscriptions);
    }

    pub fn has_tasks(self) -> bool {
        self.is_bit_on(TASKS_STATE_BIT)
    }

    pub fn set_has_tasks(&mut self, has_tasks: bool) {
        self.set_bit(TASKS_STATE_BIT, has_tasks);
    }

    pub fn has_jobs(self) -> bool {
        self.is_bit_on(JOBS_STATE_BIT)
    }

    pub fn set_has_jobs(&mut self, has_jobs: bool) {
        self.set_bit(JOBS_STATE_BIT, has_jobs);
    }

    pub fn has_variables(self) -> bool {
        self.is_bit_on(VARIABLES_STATE_BIT)
    }

    pub fn set_has_variables(&mut self, has_variables: bool) {
        self.set_bit(VARIABLES_STATE_BIT, has_variables);
    }

    fn is_bit_on(self, bit: u8) -> bool {
        self.0 & mask(bit) != 0
    }

    fn set_bit(&mut self, bit: u8, on: bool) {
        if on {
            self.0 |= mask(bit);
        } else {
            self.0 &= !mask(bit);
        }
    }
}

impl From<i32> for CachedEntityState {
    fn from(bits: i32) -> Self {
        Self::from_bits(bits)
    }
}

/// Bit `n` (1-based) maps to `1 << (n - 1)`
fn mask(bit: u8) -> i32 {
    debug_assert!(
        (1..=MAX_STATE_BIT).contains(&bit),
        "cached entity state bit out of range: {bit}"
    );
    1 << (bit - 1)
}
