//! netwatch: debounced TCP reachability monitoring for network devices.
//!
//! One monitor task per device probes a TCP endpoint on a jittered
//! interval, classifies the outcome, and runs it through a hysteresis
//! state machine so that transient blips do not flip the published
//! online/offline state. Transitions are mirrored into a capability
//! store and forwarded to a trigger sink.

pub mod capability;
pub mod config;
pub mod diag;
pub mod monitor;
pub mod trigger;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
