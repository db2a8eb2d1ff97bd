//! Daemon task supervision
//!
//! Wires the receive task to the reconciler and watches both. Neither is
//! expected to finish on its own, so either one stopping is an error. Only
//! the shutdown signal ends the daemon cleanly.

use std::future::Future;

use ripsync_common::{CommandRunner, RipsyncError, RipsyncResult};
use tokio::sync::mpsc;
use tracing::info;

use crate::receiver::{run_receiver, DatagramSource};
use crate::reconciler::RouteReconciler;

/// Run the receiver and reconciler until `shutdown` resolves.
///
/// Tracked routes are left installed on shutdown.
pub async fn serve<R, S, F>(
    reconciler: RouteReconciler<R>,
    source: S,
    queue_capacity: usize,
    shutdown: F,
) -> RipsyncResult<()>
where
    R: CommandRunner,
    S: DatagramSource + 'static,
    F: Future<Output = ()>,
{
    let (tx, rx) = mpsc::channel(queue_capacity);
    let mut receiver = tokio::spawn(run_receiver(source, tx));

    let result = tokio::select! {
        joined = &mut receiver => Err(match joined {
            Ok(Ok(())) => RipsyncError::internal("receiver stopped"),
            Ok(Err(e)) => e,
            Err(e) => RipsyncError::internal(format!("receiver task failed: {}", e)),
        }),
        result = reconciler.run(rx) => match result {
            Ok(()) => Err(RipsyncError::internal("advertisement queue closed")),
            Err(e) => Err(e),
        },
        _ = shutdown => {
            info!("Shutdown requested, exiting without withdrawing routes");
            Ok(())
        }
    };

    receiver.abort();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Platform;
    use crate::reconciler::ReconcilerConfig;
    use async_trait::async_trait;
    use ripsync_common::ExecResult;
    use std::io;
    use std::net::SocketAddr;
    use std::time::Duration;

    struct NoopRunner;

    #[async_trait]
    impl CommandRunner for NoopRunner {
        async fn run(&self, _program: &str, _args: &[String]) -> RipsyncResult<ExecResult> {
            Ok(ExecResult {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    /// Never delivers a datagram
    struct IdleSource;

    #[async_trait]
    impl DatagramSource for IdleSource {
        async fn recv_from(&mut self, _buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
            std::future::pending().await
        }
    }

    /// Brings the receive task down on first read
    struct CrashingSource;

    #[async_trait]
    impl DatagramSource for CrashingSource {
        async fn recv_from(&mut self, _buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
            panic!("socket state corrupted");
        }
    }

    fn reconciler() -> RouteReconciler<NoopRunner> {
        RouteReconciler::new(ReconcilerConfig::new("eth0", Platform::Linux), NoopRunner)
    }

    #[tokio::test]
    async fn test_shutdown_is_clean_exit() {
        let result = serve(reconciler(), IdleSource, 4, async {}).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_receiver_failure_is_an_error() {
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            serve(reconciler(), CrashingSource, 4, std::future::pending()),
        )
        .await
        .unwrap();

        assert!(matches!(result, Err(RipsyncError::Internal { .. })));
    }
}
