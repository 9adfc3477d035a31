//! Probe outcome interpretation.
//!
//! Maps a raw [`ProbeOutcome`] plus the device context into a liveness
//! verdict. Pure and deterministic; the one domain rule of note is
//! that "refused" on a portless device proves the host itself is up,
//! because portless devices are probed on a throwaway port nothing is
//! expected to listen on.

use super::probe::ProbeOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub online: bool,
    /// Worth a distinct log line (timeouts, unclassified errors).
    pub notable: bool,
}

pub fn interpret(outcome: &ProbeOutcome, has_defined_port: bool) -> Verdict {
    match outcome {
        ProbeOutcome::Connected { .. } | ProbeOutcome::InProgress => Verdict {
            online: true,
            notable: false,
        },
        ProbeOutcome::Refused => Verdict {
            online: !has_defined_port,
            notable: false,
        },
        ProbeOutcome::Timeout => Verdict {
            online: false,
            notable: true,
        },
        ProbeOutcome::Unreachable | ProbeOutcome::NotFound => Verdict {
            online: false,
            notable: false,
        },
        ProbeOutcome::Unknown(_) => Verdict {
            online: false,
            notable: true,
        },
    }
}
