//! Shutdown triggers and the bounded drain of in-flight requests.

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix;
use tokio_util::sync::CancellationToken;

use crate::TRACING_TARGET_SERVER_SHUTDOWN;

/// What started the shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownTrigger {
    /// SIGINT or Ctrl+C.
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// The application token was cancelled, e.g. by a stopped consumer worker.
    Cancelled,
}

impl ShutdownTrigger {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Interrupt => "interrupt",
            Self::Terminate => "terminate",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Waits for Ctrl+C, SIGTERM or cancellation of `cancel`.
///
/// A signal handler that cannot be installed never fires; the other triggers
/// keep working.
pub async fn shutdown_trigger(cancel: CancellationToken) -> ShutdownTrigger {
    let trigger = tokio::select! {
        () = interrupt() => ShutdownTrigger::Interrupt,
        () = terminate() => ShutdownTrigger::Terminate,
        () = cancel.cancelled() => ShutdownTrigger::Cancelled,
    };

    tracing::info!(
        target: TRACING_TARGET_SERVER_SHUTDOWN,
        trigger = trigger.as_str(),
        "Shutdown triggered"
    );
    trigger
}

async fn interrupt() {
    if let Err(e) = ctrl_c().await {
        tracing::error!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            error = %e,
            "Failed to install Ctrl+C handler"
        );
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    match unix::signal(unix::SignalKind::terminate()) {
        Ok(mut signal) => {
            signal.recv().await;
        }
        Err(e) => {
            tracing::error!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                error = %e,
                "Failed to install SIGTERM handler"
            );
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

/// Drives `serve` to completion, allowing it `drain_timeout` once `draining` is
/// cancelled.
///
/// Returns a [`io::ErrorKind::TimedOut`] error if in-flight requests are still
/// running when the timeout elapses; they are dropped with the future.
pub async fn drain_within<F>(
    serve: F,
    draining: CancellationToken,
    drain_timeout: Duration,
) -> io::Result<()>
where
    F: Future<Output = io::Result<()>>,
{
    tokio::pin!(serve);

    tokio::select! {
        result = &mut serve => return result,
        () = draining.cancelled() => {}
    }

    tracing::info!(
        target: TRACING_TARGET_SERVER_SHUTDOWN,
        timeout_secs = drain_timeout.as_secs(),
        "Draining in-flight requests"
    );

    match tokio::time::timeout(drain_timeout, serve).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                timeout_secs = drain_timeout.as_secs(),
                "In-flight requests abandoned after the shutdown timeout"
            );
            Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!(
                    "in-flight requests did not finish within {}s",
                    drain_timeout.as_secs()
                ),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancellation_triggers_shutdown() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let trigger = tokio::time::timeout(Duration::from_secs(1), shutdown_trigger(cancel))
            .await
            .unwrap();
        assert_eq!(trigger, ShutdownTrigger::Cancelled);
    }

    #[tokio::test]
    async fn serve_result_is_returned_before_draining() {
        let draining = CancellationToken::new();
        let result = drain_within(async { Ok(()) }, draining, Duration::from_secs(1)).await;
        assert!(result.is_ok());

        let draining = CancellationToken::new();
        let result = drain_within(
            async { Err(io::Error::other("accept failed")) },
            draining,
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::Other);
    }

    #[tokio::test]
    async fn drain_finishing_in_time_is_ok() {
        let draining = CancellationToken::new();
        let serve = {
            let draining = draining.clone();
            async move {
                draining.cancelled().await;
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(())
            }
        };

        draining.cancel();
        let result = drain_within(serve, draining, Duration::from_secs(1)).await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_drain_is_cut_off() {
        let draining = CancellationToken::new();
        draining.cancel();

        let serve = std::future::pending::<io::Result<()>>();
        let result = drain_within(serve, draining, Duration::from_secs(30)).await;
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::TimedOut);
    }
}
