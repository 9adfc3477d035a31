//! Single-shot TCP liveness probe.
//!
//! One call, one connection attempt, one terminal outcome. The socket
//! is dropped on every exit path and the call never outlives its
//! timeout budget, which also covers name resolution.

use std::io;
use std::time::Duration;

use tokio::net::{lookup_host, TcpStream};
use tokio::time::{timeout, Instant};

/// Classified result of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Handshake completed.
    Connected { elapsed_ms: u64 },
    /// Neither a connection nor an error within the timeout.
    Timeout,
    /// Connection actively refused (RST). Something answered.
    Refused,
    /// Host or network unreachable.
    Unreachable,
    /// Name resolution failed or produced no addresses.
    NotFound,
    /// Connect reported "operation already in progress"; the host is
    /// alive enough to be mid-handshake.
    InProgress,
    /// Anything else, carrying the error kind or OS code.
    Unknown(String),
}

impl std::fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeOutcome::Connected { elapsed_ms } => write!(f, "connected in {elapsed_ms} ms"),
            ProbeOutcome::Timeout => write!(f, "timeout"),
            ProbeOutcome::Refused => write!(f, "refused"),
            ProbeOutcome::Unreachable => write!(f, "unreach"),
            ProbeOutcome::NotFound => write!(f, "notfound"),
            ProbeOutcome::InProgress => write!(f, "ready"),
            ProbeOutcome::Unknown(detail) => write!(f, "unknown: {detail}"),
        }
    }
}

/// Attempt one TCP connection to `host:port` within `probe_timeout`.
pub async fn probe(host: &str, port: u16, probe_timeout: Duration) -> ProbeOutcome {
    let started = Instant::now();
    let target = format!("{host}:{port}");

    let addr = match timeout(probe_timeout, lookup_host(target.as_str())).await {
        Err(_) => return ProbeOutcome::Timeout,
        Ok(Err(_)) => return ProbeOutcome::NotFound,
        Ok(Ok(mut addrs)) => match addrs.next() {
            Some(addr) => addr,
            None => return ProbeOutcome::NotFound,
        },
    };

    let remaining = probe_timeout.saturating_sub(started.elapsed());
    match timeout(remaining, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            drop(stream);
            ProbeOutcome::Connected {
                elapsed_ms: started.elapsed().as_millis() as u64,
            }
        }
        Ok(Err(error)) => classify_error(&error),
        Err(_) => ProbeOutcome::Timeout,
    }
}

fn classify_error(error: &io::Error) -> ProbeOutcome {
    match error.kind() {
        io::ErrorKind::ConnectionRefused => ProbeOutcome::Refused,
        io::ErrorKind::HostUnreachable | io::ErrorKind::NetworkUnreachable => {
            ProbeOutcome::Unreachable
        }
        _ => match error.raw_os_error() {
            Some(code) if code == libc::EALREADY => ProbeOutcome::InProgress,
            Some(code) if code == libc::EHOSTUNREACH || code == libc::ENETUNREACH => {
                ProbeOutcome::Unreachable
            }
            Some(code) => ProbeOutcome::Unknown(format!("code {code}")),
            None => ProbeOutcome::Unknown(error.kind().to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connects_to_a_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let outcome = probe("127.0.0.1", port, Duration::from_secs(5)).await;
        assert!(
            matches!(outcome, ProbeOutcome::Connected { .. }),
            "got {outcome}"
        );
    }

    #[tokio::test]
    async fn refused_when_nothing_listens() {
        // grab a free port, then close it again
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let outcome = probe("127.0.0.1", port, Duration::from_secs(5)).await;
        assert_eq!(outcome, ProbeOutcome::Refused);
    }

    #[tokio::test]
    async fn never_hangs_past_the_timeout() {
        // TEST-NET-1, guaranteed non-routable
        let started = Instant::now();
        let outcome = probe("192.0.2.1", 80, Duration::from_secs(1)).await;
        assert!(
            matches!(outcome, ProbeOutcome::Timeout | ProbeOutcome::Unreachable),
            "got {outcome}"
        );
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn unresolvable_name_is_notfound() {
        let outcome = probe("netwatch-test-host.invalid", 80, Duration::from_secs(5)).await;
        assert!(
            matches!(outcome, ProbeOutcome::NotFound | ProbeOutcome::Timeout),
            "got {outcome}"
        );
    }

    #[test]
    fn refused_maps_from_error_kind() {
        let error = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(classify_error(&error), ProbeOutcome::Refused);
    }

    #[test]
    fn ealready_is_treated_as_in_progress() {
        let error = io::Error::from_raw_os_error(libc::EALREADY);
        assert_eq!(classify_error(&error), ProbeOutcome::InProgress);
    }

    #[test]
    fn unknown_errors_carry_their_code() {
        let error = io::Error::from_raw_os_error(libc::EPERM);
        assert_eq!(
            classify_error(&error),
            ProbeOutcome::Unknown(format!("code {}", libc::EPERM))
        );
    }
}
