//! Run cancellation.
//!
//! A [`CancellationToken`] is flipped once, either by a signal handler or by
//! the caller, and observed by poll loops and the process wait loop.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// SIGINT.
pub const SIGINT: i32 = 2;
/// SIGTERM.
pub const SIGTERM: i32 = 15;

/// Slice used by [`CancellationToken::sleep`] between cancellation checks.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    signal: AtomicI32,
}

/// Shared, clonable cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the run.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    /// Cancels the run on behalf of a signal.
    pub fn cancel_with_signal(&self, signal: i32) {
        self.inner.signal.store(signal, Ordering::SeqCst);
        self.cancel();
    }

    /// Returns true once the run has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// The signal that cancelled the run, if any.
    pub fn signal(&self) -> Option<i32> {
        match self.inner.signal.load(Ordering::SeqCst) {
            0 => None,
            sig => Some(sig),
        }
    }

    /// Process exit status for a signal-cancelled run (`128 + signal`).
    pub fn exit_code(&self) -> Option<i32> {
        self.signal().map(|sig| 128 + sig)
    }

    /// Sleeps for `duration` in short slices.
    ///
    /// Returns `false` if the token was cancelled before the full duration
    /// elapsed.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }
}

/// Installs SIGINT/SIGTERM handlers that cancel `token`.
///
/// The handlers run on a dedicated thread driving a current-thread tokio
/// runtime, so the rest of the harness stays synchronous.
pub fn install_signal_handlers(token: CancellationToken) -> std::io::Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    std::thread::Builder::new()
        .name("pgharness-signals".to_string())
        .spawn(move || {
            rt.block_on(async move {
                match wait_for_signal().await {
                    Ok(signal) => {
                        tracing::warn!(signal, "received signal, cancelling run");
                        token.cancel_with_signal(signal);
                    }
                    Err(e) => tracing::warn!("failed to listen for signals: {}", e),
                }
            })
        })?;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<i32> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| SIGINT),
        _ = terminate.recv() => Ok(SIGTERM),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<i32> {
    tokio::signal::ctrl_c().await?;
    Ok(SIGINT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
        assert_eq!(clone.exit_code(), None);
    }

    #[test]
    fn test_signal_exit_codes() {
        let token = CancellationToken::new();
        token.cancel_with_signal(SIGINT);
        assert_eq!(token.exit_code(), Some(130));

        let token = CancellationToken::new();
        token.cancel_with_signal(SIGTERM);
        assert_eq!(token.exit_code(), Some(143));
    }

    #[test]
    fn test_sleep_returns_early_when_cancelled() {
        let token = CancellationToken::new();
        let flipper = token.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            flipper.cancel();
        });

        let start = Instant::now();
        assert!(!token.sleep(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(2));
        handle.join().unwrap();
    }

    #[test]
    fn test_sleep_completes() {
        let token = CancellationToken::new();
        assert!(token.sleep(Duration::from_millis(10)));
    }
}
