//! Cooperative timing
//!
//! All waiting in the engine goes through a [`Pacer`]: a timed suspension
//! that is abandoned as soon as the shared cancellation token fires. The
//! same pacer (or clones of it) drives sequential steps and both paths of
//! an independent run, so cancelling the token stops every path of one
//! invocation together.

use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// The invocation was abandoned by its caller
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Invocation cancelled")]
pub struct Cancelled;

/// Timed suspension bound to a cancellation token
#[derive(Debug, Clone, Default)]
pub struct Pacer {
    token: CancellationToken,
}

impl Pacer {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Token observed by this pacer
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fail fast if the invocation has been abandoned
    pub fn checkpoint(&self) -> Result<(), Cancelled> {
        if self.token.is_cancelled() {
            return Err(Cancelled);
        }
        Ok(())
    }

    /// Suspend the current task for `duration`
    ///
    /// The token is checked before suspending and raced against the timer
    /// while suspended. A zero duration still performs the check.
    pub async fn hold(&self, duration: Duration) -> Result<(), Cancelled> {
        self.checkpoint()?;
        if duration.is_zero() {
            return Ok(());
        }

        tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                debug!("Suspension of {}ms cancelled", duration.as_millis());
                Err(Cancelled)
            }
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}
