//! Readiness probing for server processes

use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

use super::ProcessHandle;
use crate::common::{Error, Result};

/// Longest a single connection attempt may take
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(1);

/// Wait until `addr` accepts TCP connections
///
/// Polls every `poll` until `deadline` has elapsed. When `guard` is given and
/// that process exits while we are polling, the wait fails immediately.
pub async fn wait_for_listener(
    addr: &str,
    deadline: Duration,
    poll: Duration,
    mut guard: Option<&mut ProcessHandle>,
) -> Result<()> {
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        let remaining = deadline.saturating_sub(started.elapsed());
        let attempt = ATTEMPT_TIMEOUT.min(remaining).max(Duration::from_millis(1));
        match timeout(attempt, TcpStream::connect(addr)).await {
            Ok(Ok(_)) => {
                tracing::debug!(
                    addr,
                    attempts,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "listener ready"
                );
                return Ok(());
            }
            Ok(Err(e)) => tracing::trace!(addr, attempts, error = %e, "not ready"),
            Err(_) => tracing::trace!(addr, attempts, "connect attempt timed out"),
        }

        if let Some(process) = guard.as_deref_mut() {
            if let Some(code) = process.try_status()? {
                return Err(Error::Unexpected(format!(
                    "{} exited with status {} before accepting connections on {}",
                    process.label(),
                    code,
                    addr
                )));
            }
        }

        if started.elapsed() >= deadline {
            return Err(Error::timeout(
                format!("waiting for {} to accept connections", addr),
                deadline,
            ));
        }

        sleep(poll).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_ready_when_listening() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        wait_for_listener(&addr, Duration::from_secs(5), Duration::from_millis(10), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ready_once_listener_appears() {
        // Reserve a port, release it, and rebind it a little later
        let addr = {
            let scratch = TcpListener::bind("127.0.0.1:0").await.unwrap();
            scratch.local_addr().unwrap()
        };
        let late = tokio::spawn(async move {
            sleep(Duration::from_millis(150)).await;
            let listener = TcpListener::bind(addr).await.unwrap();
            sleep(Duration::from_secs(3)).await;
            drop(listener);
        });

        wait_for_listener(
            &addr.to_string(),
            Duration::from_secs(5),
            Duration::from_millis(20),
            None,
        )
        .await
        .unwrap();
        late.abort();
    }

    #[tokio::test]
    async fn test_times_out_on_closed_port() {
        let addr = {
            let scratch = TcpListener::bind("127.0.0.1:0").await.unwrap();
            scratch.local_addr().unwrap().to_string()
        };

        let err = wait_for_listener(
            &addr,
            Duration::from_millis(200),
            Duration::from_millis(20),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fails_fast_when_guard_exits() {
        let addr = {
            let scratch = TcpListener::bind("127.0.0.1:0").await.unwrap();
            scratch.local_addr().unwrap().to_string()
        };
        let mut server = ProcessHandle::spawn(
            "server",
            std::path::Path::new("sh"),
            &["-c".to_string(), "exit 7".to_string()],
        )
        .unwrap();

        let started = Instant::now();
        let err = wait_for_listener(
            &addr,
            Duration::from_secs(10),
            Duration::from_millis(20),
            Some(&mut server),
        )
        .await
        .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(matches!(err, Error::Unexpected(_)));
        assert!(err.to_string().contains("status 7"));
    }
}
