//! Retry policies for handling `FLOOD_WAIT`.
//!
//! Transport (I/O) errors are surfaced by default: the request may already
//! have reached the server. [`AutoSleep::io_errors_as_flood_of`] opts in.
//!
//! Datacenter redirects are not routed through a policy: the client always
//! follows them, bounded by [`crate::Config::max_redirects`].

use std::num::NonZeroU32;
use std::ops::ControlFlow;
use std::time::Duration;

use crate::errors::InvocationError;

/// Controls how the client reacts when an RPC call fails.
pub trait RetryPolicy: Send + Sync + 'static {
    fn should_retry(&self, ctx: &RetryContext) -> ControlFlow<(), Duration>;
}

/// Context passed to [`RetryPolicy::should_retry`] on each failure.
pub struct RetryContext {
    pub fail_count:   NonZeroU32,
    pub slept_so_far: Duration,
    pub error:        InvocationError,
}

/// Never retry.
pub struct NoRetries;
impl RetryPolicy for NoRetries {
    fn should_retry(&self, _: &RetryContext) -> ControlFlow<(), Duration> {
        ControlFlow::Break(())
    }
}

/// Sleep for the server-specified time on FLOOD_WAIT and retry.
///
/// Waits longer than `threshold`, or more than `max_attempts` consecutive
/// flood failures, are handed back to the caller instead of blocking.
pub struct AutoSleep {
    pub threshold:             Duration,
    pub max_attempts:          u32,
    /// Retry a first I/O error once after this delay. Only safe for
    /// idempotent calls; `None` by default.
    pub io_errors_as_flood_of: Option<Duration>,
}

impl Default for AutoSleep {
    fn default() -> Self {
        Self {
            threshold:             Duration::from_secs(60),
            max_attempts:          5,
            io_errors_as_flood_of: None,
        }
    }
}

impl AutoSleep {
    /// Always sleep and retry on FLOOD_WAIT, however long and however often.
    ///
    /// A misbehaving server can block the caller forever with this policy.
    pub fn unbounded() -> Self {
        Self {
            threshold:             Duration::MAX,
            max_attempts:          u32::MAX,
            io_errors_as_flood_of: None,
        }
    }
}

impl RetryPolicy for AutoSleep {
    fn should_retry(&self, ctx: &RetryContext) -> ControlFlow<(), Duration> {
        if let Some(secs) = ctx.error.flood_wait_seconds() {
            let wait = Duration::from_secs(secs);
            if ctx.fail_count.get() <= self.max_attempts && wait <= self.threshold {
                tracing::info!("[veil] FLOOD_WAIT_{secs} — sleeping before retry #{}", ctx.fail_count);
                return ControlFlow::Continue(wait);
            }
            tracing::warn!("[veil] FLOOD_WAIT_{secs} exceeds policy (attempt {}), giving up", ctx.fail_count);
            return ControlFlow::Break(());
        }
        if matches!(ctx.error, InvocationError::Io(_)) && ctx.fail_count.get() == 1 {
            if let Some(d) = self.io_errors_as_flood_of {
                tracing::info!("[veil] I/O error — sleeping {:?} before retry", d);
                return ControlFlow::Continue(d);
            }
        }
        ControlFlow::Break(())
    }
}
