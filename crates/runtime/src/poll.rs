//! Blocking-wait adapter over the runtime's poll-based async loads.
//!
//! The runtime reports `Pending` until an asset is ready. A bare retry loop
//! hangs forever on a stuck load, so [`LoadPolicy`] makes the bound
//! explicit: the default times out, [`LoadPolicy::unbounded`] polls without
//! limit for callers that accept the hang.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Result of one poll of an asynchronous runtime load.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadPoll<T> {
    /// Still loading; poll again.
    Pending,
    Ready(T),
    Failed(LoadFailure),
}

/// Terminal failure codes reported by the asset loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum LoadFailure {
    #[error("asset not found")]
    NotFound,
    #[error("asset payload is corrupt")]
    Corrupt,
    #[error("loader unavailable")]
    Unavailable,
}

/// Retry discipline for [`block_on_load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadPolicy {
    /// Sleep between polls while the load is pending.
    pub interval: Duration,
    /// Give up after this long; `None` polls forever.
    pub timeout: Option<Duration>,
}

impl Default for LoadPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1),
            timeout: Some(Duration::from_secs(10)),
        }
    }
}

impl LoadPolicy {
    /// Poll forever; a permanently stuck load blocks the frame loop.
    pub fn unbounded() -> Self {
        Self {
            timeout: None,
            ..Self::default()
        }
    }
}

/// Errors from a completed (or abandoned) blocking load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("load failed: {0}")]
    Terminal(#[from] LoadFailure),
    #[error("load still pending after {waited:?}")]
    TimedOut { waited: Duration },
}

/// Poll `load` to completion under the given policy.
///
/// This blocks the calling thread (the whole frame loop, in practice) for
/// the duration of the load; the single-threaded design accepts that.
pub fn block_on_load<T>(
    policy: LoadPolicy,
    mut load: impl FnMut() -> LoadPoll<T>,
) -> Result<T, LoadError> {
    let start = Instant::now();
    let mut polls: u32 = 0;
    loop {
        match load() {
            LoadPoll::Ready(value) => {
                tracing::trace!(polls, waited = ?start.elapsed(), "load ready");
                return Ok(value);
            }
            LoadPoll::Failed(failure) => {
                tracing::debug!(polls, error = %failure, "load failed");
                return Err(LoadError::Terminal(failure));
            }
            LoadPoll::Pending => {
                polls += 1;
                let waited = start.elapsed();
                if let Some(timeout) = policy.timeout {
                    if waited >= timeout {
                        tracing::warn!(polls, ?waited, "giving up on stuck load");
                        return Err(LoadError::TimedOut { waited });
                    }
                }
                std::thread::sleep(policy.interval);
            }
        }
    }
}
