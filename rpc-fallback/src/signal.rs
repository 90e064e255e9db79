//! Shutdown signal handling.
//!
//! [`SigDown`] listens for SIGTERM/SIGINT on Unix (Ctrl+C on Windows) and
//! cancels a [`CancellationToken`] handed to in-flight provider resolution.

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Cancels its token on SIGTERM / SIGINT / Ctrl+C.
#[allow(missing_debug_implementations)]
pub struct SigDown {
    task_tracker: TaskTracker,
    cancellation_token: CancellationToken,
}

impl SigDown {
    /// Creates the handler and spawns the background listener.
    ///
    /// # Errors
    ///
    /// Returns an [`std::io::Error`] if signal registration fails.
    #[allow(clippy::unnecessary_wraps)]
    pub fn try_new() -> Result<Self, std::io::Error> {
        let inner = CancellationToken::new();
        let outer = inner.clone();
        let task_tracker = TaskTracker::new();

        #[cfg(unix)]
        {
            let mut sigterm = signal(SignalKind::terminate())?;
            let mut sigint = signal(SignalKind::interrupt())?;
            task_tracker.spawn(async move {
                tokio::select! {
                    _ = sigterm.recv() => {},
                    _ = sigint.recv() => {},
                    () = inner.cancelled() => return,
                }
                tracing::warn!("shutdown signal received, cancelling");
                inner.cancel();
            });
        }

        #[cfg(windows)]
        {
            task_tracker.spawn(async move {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::warn!("ctrl-c received, cancelling");
                        inner.cancel();
                    }
                    () = inner.cancelled() => {}
                }
            });
        }

        task_tracker.close();
        Ok(Self {
            task_tracker,
            cancellation_token: outer,
        })
    }

    /// Token cancelled when a shutdown signal arrives.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }
}

impl Drop for SigDown {
    // Stops the listener task once the command is done with the token.
    fn drop(&mut self) {
        self.cancellation_token.cancel();
        tracing::trace!(tasks = self.task_tracker.len(), "signal listener stopped");
    }
}
