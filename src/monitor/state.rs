//! Availability state machine with failure hysteresis.
//!
//! ```text
//!              online verdict                offline verdict
//!  Unknown ───────────────────► Online          (counted)
//!     │                           ▲ │
//!     │ failures > threshold      │ │ failures > threshold
//!     ▼                           │ ▼
//!  Offline ◄──────────────────────┘
//! ```
//!
//! A single online verdict publishes Online immediately. Offline only
//! publishes once more consecutive failures than `failure_threshold`
//! have accumulated, so a threshold of N tolerates N blips and
//! publishes on the (N+1)th consecutive failure.

/// Last availability actually published to the outside world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Published {
    Unknown,
    Online,
    Offline,
}

/// What the caller should do with the verdict it just applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    PublishOnline,
    StillOnline,
    PublishOffline,
    StillOffline,
    /// Below the threshold; keep counting.
    OfflinePostponed { checks_remaining: u32 },
}

#[derive(Debug)]
pub struct AvailabilityState {
    failure_threshold: u32,
    consecutive_failures: u32,
    published: Published,
}

impl AvailabilityState {
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            failure_threshold,
            consecutive_failures: 0,
            published: Published::Unknown,
        }
    }

    pub fn published(&self) -> Published {
        self.published
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn set_failure_threshold(&mut self, threshold: u32) {
        self.failure_threshold = threshold;
        self.consecutive_failures = self
            .consecutive_failures
            .min(self.failure_threshold + 1);
    }

    /// Feed one liveness verdict through the machine.
    pub fn apply(&mut self, online: bool) -> Decision {
        if online {
            self.consecutive_failures = 0;
            if self.published == Published::Online {
                Decision::StillOnline
            } else {
                self.published = Published::Online;
                Decision::PublishOnline
            }
        } else {
            self.consecutive_failures =
                (self.consecutive_failures + 1).min(self.failure_threshold + 1);
            if self.consecutive_failures > self.failure_threshold {
                if self.published == Published::Offline {
                    Decision::StillOffline
                } else {
                    self.published = Published::Offline;
                    Decision::PublishOffline
                }
            } else {
                Decision::OfflinePostponed {
                    checks_remaining: self.failure_threshold + 1 - self.consecutive_failures,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_online_verdict_publishes() {
        let mut state = AvailabilityState::new(1);
        assert_eq!(state.apply(true), Decision::PublishOnline);
        assert_eq!(state.published(), Published::Online);
    }

    #[test]
    fn repeated_online_is_idempotent() {
        let mut state = AvailabilityState::new(1);
        assert_eq!(state.apply(true), Decision::PublishOnline);
        assert_eq!(state.apply(true), Decision::StillOnline);
        assert_eq!(state.apply(true), Decision::StillOnline);
    }

    #[test]
    fn threshold_n_publishes_on_failure_n_plus_one() {
        let mut state = AvailabilityState::new(2);
        assert_eq!(
            state.apply(false),
            Decision::OfflinePostponed { checks_remaining: 2 }
        );
        assert_eq!(
            state.apply(false),
            Decision::OfflinePostponed { checks_remaining: 1 }
        );
        assert_eq!(state.apply(false), Decision::PublishOffline);
        assert_eq!(state.published(), Published::Offline);
    }

    #[test]
    fn unknown_state_stays_unpublished_while_counting() {
        let mut state = AvailabilityState::new(2);
        state.apply(false);
        state.apply(false);
        assert_eq!(state.published(), Published::Unknown);
    }

    #[test]
    fn one_success_resets_the_counter() {
        let mut state = AvailabilityState::new(2);
        state.apply(false);
        state.apply(false);
        assert_eq!(state.apply(true), Decision::PublishOnline);
        assert_eq!(state.consecutive_failures(), 0);
        // the count starts over, so offline needs three more failures
        assert_eq!(
            state.apply(false),
            Decision::OfflinePostponed { checks_remaining: 2 }
        );
    }

    #[test]
    fn counter_is_clamped_once_offline() {
        let mut state = AvailabilityState::new(1);
        for _ in 0..10 {
            state.apply(false);
        }
        assert_eq!(state.consecutive_failures(), 2);
        assert_eq!(state.apply(false), Decision::StillOffline);
    }

    #[test]
    fn offline_then_online_publishes_again() {
        let mut state = AvailabilityState::new(1);
        state.apply(false);
        state.apply(false);
        assert_eq!(state.published(), Published::Offline);
        assert_eq!(state.apply(true), Decision::PublishOnline);
        assert_eq!(state.apply(false), Decision::OfflinePostponed { checks_remaining: 1 });
        assert_eq!(state.apply(false), Decision::PublishOffline);
    }

    #[test]
    fn lowering_the_threshold_clamps_the_counter() {
        let mut state = AvailabilityState::new(5);
        for _ in 0..4 {
            state.apply(false);
        }
        state.set_failure_threshold(1);
        assert_eq!(state.consecutive_failures(), 2);
        assert_eq!(state.apply(false), Decision::PublishOffline);
    }
}
