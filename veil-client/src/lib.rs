//! # veil-client
//!
//! Resilient RPC client for chat transports that expose nothing but an opaque
//! `call(method, params) -> result` surface.
//!
//! ## Features
//! - `FLOOD_WAIT` auto-sleep with a configurable [`RetryPolicy`]
//! - Datacenter redirects: `PHONE_MIGRATE` moves the sticky default DC,
//!   every other `*_MIGRATE` retries just that call on the named DC
//! - Default DC persisted through a pluggable [`KeyValueStore`]
//! - Cheap to clone; all clones share one default DC

#![deny(unsafe_code)]

mod errors;
mod retry;
pub mod store;

pub use errors::{InvocationError, Redirect, RedirectKind, RpcError, CODE_FLOOD, CODE_SEE_OTHER};
pub use retry::{AutoSleep, NoRetries, RetryContext, RetryPolicy};
pub use store::{InMemoryStore, JsonFileStore, KeyValueStore, ScopedStore};

use std::future::Future;
use std::num::NonZeroU32;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::sleep;

/// Store key holding the sticky default DC.
pub const DEFAULT_DC_KEY: &str = "default_dc";

// ─── RpcTransport ─────────────────────────────────────────────────────────────

/// The raw, non-retrying RPC surface of the messaging backend.
///
/// Implementations send `method` with `params` to datacenter `dc_id` and
/// return the decoded result object. Server-side failures must come back as
/// [`InvocationError::Rpc`] so the client can classify them.
pub trait RpcTransport: Send + Sync + 'static {
    fn call(
        &self,
        method: &str,
        params: &Value,
        dc_id:  i32,
    ) -> impl Future<Output = Result<Value, InvocationError>> + Send;
}

impl<T: RpcTransport> RpcTransport for Arc<T> {
    fn call(
        &self,
        method: &str,
        params: &Value,
        dc_id:  i32,
    ) -> impl Future<Output = Result<Value, InvocationError>> + Send {
        (**self).call(method, params, dc_id)
    }
}

// ─── CallOptions ──────────────────────────────────────────────────────────────

/// Per-call routing options.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Send this call to a specific DC instead of the default one.
    pub dc_id:       Option<i32>,
    /// Hand every failure back at once instead of consulting the retry
    /// policy. Redirects are still followed.
    pub best_effort: bool,
}

impl CallOptions {
    /// Route the call to `dc_id`.
    pub fn on_dc(dc_id: i32) -> Self {
        Self { dc_id: Some(dc_id), ..Self::default() }
    }

    /// A call whose result is optional, e.g. a thumbnail: never sleeps.
    pub fn best_effort() -> Self {
        Self { best_effort: true, ..Self::default() }
    }
}

// ─── Config ───────────────────────────────────────────────────────────────────

/// Configuration for [`Client::new`].
#[derive(Clone)]
pub struct Config {
    /// DC used until a `PHONE_MIGRATE` (or a stored value) says otherwise.
    pub default_dc:    i32,
    pub retry_policy:  Arc<dyn RetryPolicy>,
    /// Where the sticky default DC is persisted (default: in memory).
    pub store:         Arc<dyn KeyValueStore>,
    /// Redirects followed for a single call before the error is surfaced.
    pub max_redirects: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_dc:    2,
            retry_policy:  Arc::new(AutoSleep::default()),
            store:         Arc::new(InMemoryStore::new()),
            max_redirects: 5,
        }
    }
}

// ─── Client ───────────────────────────────────────────────────────────────────

struct ClientInner<T> {
    transport:     T,
    default_dc:    Mutex<i32>,
    retry_policy:  Arc<dyn RetryPolicy>,
    store:         Arc<dyn KeyValueStore>,
    max_redirects: u32,
}

/// The resilient RPC client. Cheap to clone — internally Arc-wrapped.
pub struct Client<T> {
    inner: Arc<ClientInner<T>>,
}

impl<T> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T: RpcTransport> Client<T> {
    /// Build a client over `transport`.
    ///
    /// A default DC previously persisted in `config.store` wins over
    /// `config.default_dc`.
    pub fn new(transport: T, config: Config) -> Self {
        let default_dc = match config.store.get(DEFAULT_DC_KEY) {
            Ok(Some(raw)) => match raw.parse::<i32>() {
                Ok(dc) => {
                    tracing::info!("[veil] Restored default DC{dc} from {} store", config.store.name());
                    dc
                }
                Err(_) => {
                    tracing::warn!("[veil] Ignoring malformed stored default DC {raw:?}");
                    config.default_dc
                }
            },
            Ok(None) => config.default_dc,
            Err(e) => {
                tracing::warn!("[veil] Could not read default DC from {} store: {e}", config.store.name());
                config.default_dc
            }
        };

        Self {
            inner: Arc::new(ClientInner {
                transport,
                default_dc:    Mutex::new(default_dc),
                retry_policy:  config.retry_policy,
                store:         config.store,
                max_redirects: config.max_redirects,
            }),
        }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// The store the client persists its state in.
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.inner.store
    }

    /// DC that calls without an explicit override are sent to.
    pub async fn default_dc(&self) -> i32 {
        *self.inner.default_dc.lock().await
    }

    /// Move the default DC. Applies to every later call of every clone.
    pub async fn set_default_dc(&self, dc_id: i32) {
        *self.inner.default_dc.lock().await = dc_id;
        if let Err(e) = self.inner.store.set(DEFAULT_DC_KEY, &dc_id.to_string()) {
            tracing::warn!("[veil] Could not persist default DC{dc_id}: {e}");
        }
        tracing::info!("[veil] Default DC is now DC{dc_id}");
    }

    /// Invoke `method` on the default DC.
    pub async fn invoke(&self, method: &str, params: &Value) -> Result<Value, InvocationError> {
        self.call(method, params, &CallOptions::default()).await
    }

    /// Invoke `method` and decode the result into `R`.
    pub async fn invoke_as<R: DeserializeOwned>(
        &self,
        method: &str,
        params: &Value,
    ) -> Result<R, InvocationError> {
        self.call_as(method, params, &CallOptions::default()).await
    }

    /// [`Client::call`] and decode the result into `R`.
    pub async fn call_as<R: DeserializeOwned>(
        &self,
        method:  &str,
        params:  &Value,
        options: &CallOptions,
    ) -> Result<R, InvocationError> {
        let body = self.call(method, params, options).await?;
        serde_json::from_value(body).map_err(Into::into)
    }

    /// Invoke `method`, sleeping through flood waits and following redirects.
    ///
    /// Any error the retry policy gives up on, and any error that is neither a
    /// flood wait nor a redirect, is returned unchanged.
    pub async fn call(
        &self,
        method:  &str,
        params:  &Value,
        options: &CallOptions,
    ) -> Result<Value, InvocationError> {
        let mut options      = options.clone();
        let mut fail_count   = NonZeroU32::MIN;
        let mut slept_so_far = Duration::default();
        let mut redirects    = 0u32;

        loop {
            let dc_id = match options.dc_id {
                Some(dc) => dc,
                None     => self.default_dc().await,
            };

            let err = match self.inner.transport.call(method, params, dc_id).await {
                Ok(body) => return Ok(body),
                Err(e)   => e,
            };
            tracing::debug!("[veil] {method} on DC{dc_id} failed: {err}");

            if let Some(redirect) = err.migration() {
                if redirects >= self.inner.max_redirects {
                    tracing::warn!("[veil] {method}: giving up after {redirects} redirects");
                    return Err(err);
                }
                redirects += 1;
                if redirect.kind.switches_default() {
                    self.set_default_dc(redirect.dc_id).await;
                    options.dc_id = None;
                } else {
                    tracing::info!("[veil] {method}: retrying on DC{}", redirect.dc_id);
                    options.dc_id = Some(redirect.dc_id);
                }
                continue;
            }

            if options.best_effort {
                return Err(err);
            }

            let ctx = RetryContext { fail_count, slept_so_far, error: err };
            match self.inner.retry_policy.should_retry(&ctx) {
                ControlFlow::Continue(delay) => {
                    sleep(delay).await;
                    slept_so_far += delay;
                    fail_count = fail_count.saturating_add(1);
                }
                ControlFlow::Break(()) => return Err(ctx.error),
            }
        }
    }
}
