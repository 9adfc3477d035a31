//! Shared in-memory diagnostic log.
//!
//! A bounded append-only text buffer that devices write human-readable
//! status lines into. The buffer keeps the most recent
//! [`DIAG_LOG_CAP`] characters and drops the oldest data beyond that.
//! Appends are line-atomic: concurrent writers never interleave within
//! a line.

use std::sync::Mutex;

use chrono::Local;

/// Maximum number of bytes of log text retained.
pub const DIAG_LOG_CAP: usize = 60_000;

/// Severity 0: always shown, marked with `!!!!!!`.
pub const SEV_ERROR: u8 = 0;
/// Severity 1: normal operational notices.
pub const SEV_INFO: u8 = 1;
/// Severity 2: chatty per-cycle detail.
pub const SEV_DEBUG: u8 = 2;

pub struct DiagLog {
    inner: Mutex<Inner>,
}

struct Inner {
    buf: String,
    level: u8,
}

impl DiagLog {
    /// Create an empty log that keeps entries with severity <= `level`.
    pub fn new(level: u8) -> Self {
        Self {
            inner: Mutex::new(Inner {
                buf: String::new(),
                level,
            }),
        }
    }

    /// Append one timestamped line, unless `severity` exceeds the
    /// configured level.
    pub fn append(&self, message: &str, severity: u8) {
        let mut inner = self.inner.lock().unwrap();
        if severity > inner.level {
            return;
        }

        let ts = Local::now().format("%H:%M:%S%.3f");
        let marker = if severity == SEV_ERROR { "!!!!!! " } else { "* " };
        inner.buf.push_str(&format!("{ts}: {marker}{message}\r\n"));

        // keep only the newest DIAG_LOG_CAP characters
        if inner.buf.len() > DIAG_LOG_CAP {
            let mut cut = inner.buf.len() - DIAG_LOG_CAP;
            while !inner.buf.is_char_boundary(cut) {
                cut += 1;
            }
            inner.buf.drain(..cut);
        }
    }

    pub fn set_level(&self, level: u8) {
        self.inner.lock().unwrap().level = level;
    }

    /// Snapshot of the current buffer contents.
    pub fn contents(&self) -> String {
        self.inner.lock().unwrap().buf.clone()
    }
}
