//! Error types for veil-client.
//!
//! Every failure that crosses the transport boundary arrives as a raw
//! `(errorCode, errorMessage)` pair and is parsed into an [`RpcError`] here.

use std::{fmt, io};

/// Status code the transport uses for rate limiting (`FLOOD_WAIT_<n>`).
pub const CODE_FLOOD: i32 = 420;
/// Status code the transport uses for datacenter redirects (`<TYPE>_MIGRATE_<dc>`).
pub const CODE_SEE_OTHER: i32 = 303;

// ─── RpcError ─────────────────────────────────────────────────────────────────

/// An error returned by the transport in response to an RPC call.
///
/// Numeric values are stripped from the name and placed in [`RpcError::value`].
///
/// # Example
/// `FLOOD_WAIT_30` → `RpcError { code: 420, name: "FLOOD_WAIT", value: Some(30) }`
#[derive(Clone, Debug, PartialEq)]
pub struct RpcError {
    /// HTTP-like status code.
    pub code: i32,
    /// Error name in SCREAMING_SNAKE_CASE with digits removed.
    pub name: String,
    /// Numeric suffix extracted from the name, if any.
    pub value: Option<u32>,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RPC {}: {}", self.code, self.name)?;
        if let Some(v) = self.value {
            write!(f, " (value: {v})")?;
        }
        Ok(())
    }
}

impl std::error::Error for RpcError {}

impl RpcError {
    /// Parse a raw error message like `"FLOOD_WAIT_30"` into an `RpcError`.
    pub fn from_telegram(code: i32, message: &str) -> Self {
        if let Some(idx) = message.rfind('_') {
            let suffix = &message[idx + 1..];
            if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
                if let Ok(v) = suffix.parse::<u32>() {
                    let name = message[..idx].to_string();
                    return Self { code, name, value: Some(v) };
                }
            }
        }
        Self { code, name: message.to_string(), value: None }
    }

    /// Match on the error name, with optional wildcard prefix/suffix `'*'`.
    ///
    /// # Examples
    /// - `err.is("FLOOD_WAIT")` — exact match
    /// - `err.is("PHONE_CODE_*")` — starts-with match
    /// - `err.is("*_MIGRATE")` — ends-with match
    pub fn is(&self, pattern: &str) -> bool {
        if let Some(prefix) = pattern.strip_suffix('*') {
            self.name.starts_with(prefix)
        } else if let Some(suffix) = pattern.strip_prefix('*') {
            self.name.ends_with(suffix)
        } else {
            self.name == pattern
        }
    }

    /// Returns the flood-wait duration in seconds, if this is a FLOOD_WAIT error.
    pub fn flood_wait_seconds(&self) -> Option<u64> {
        if self.code == CODE_FLOOD && self.name == "FLOOD_WAIT" {
            self.value.map(|v| v as u64)
        } else {
            None
        }
    }

    /// Returns the redirect target, if this is a `<TYPE>_MIGRATE_<dc>` error.
    pub fn migration(&self) -> Option<Redirect> {
        if self.code != CODE_SEE_OTHER {
            return None;
        }
        let kind = self.name.strip_suffix("_MIGRATE")?;
        let dc_id = i32::try_from(self.value?).ok()?;
        Some(Redirect { kind: RedirectKind::from_marker(kind), dc_id })
    }
}

// ─── Redirect ─────────────────────────────────────────────────────────────────

/// Which request family a datacenter redirect applies to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RedirectKind {
    /// Auth-code request (`PHONE_MIGRATE`). The account lives on another DC.
    Phone,
    /// `USER_MIGRATE`.
    User,
    /// `NETWORK_MIGRATE`.
    Network,
    /// `FILE_MIGRATE`.
    File,
    /// `STATS_MIGRATE`.
    Stats,
    /// Any marker not listed above.
    Other(String),
}

impl RedirectKind {
    fn from_marker(marker: &str) -> Self {
        match marker {
            "PHONE"   => Self::Phone,
            "USER"    => Self::User,
            "NETWORK" => Self::Network,
            "FILE"    => Self::File,
            "STATS"   => Self::Stats,
            other     => Self::Other(other.to_string()),
        }
    }

    /// `true` when the redirect must move the client's default DC rather than
    /// just the one call. Signing in on a DC other than the one that sent the
    /// code fails with `PHONE_CODE_EXPIRED`.
    pub fn switches_default(&self) -> bool {
        matches!(self, Self::Phone)
    }
}

/// A parsed datacenter redirect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Redirect {
    pub kind:  RedirectKind,
    pub dc_id: i32,
}

// ─── InvocationError ──────────────────────────────────────────────────────────

/// The error type returned from any [`crate::Client`] call.
#[derive(Debug)]
pub enum InvocationError {
    /// The transport rejected the request.
    Rpc(RpcError),
    /// Network / I/O failure.
    Io(io::Error),
    /// The response did not have the expected shape.
    Deserialize(String),
    /// The request was dropped (e.g. the transport shut down).
    Dropped,
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rpc(e)          => write!(f, "{e}"),
            Self::Io(e)           => write!(f, "I/O error: {e}"),
            Self::Deserialize(s)  => write!(f, "deserialize error: {s}"),
            Self::Dropped         => write!(f, "request dropped"),
        }
    }
}

impl std::error::Error for InvocationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Rpc(e) => Some(e),
            Self::Io(e)  => Some(e),
            _            => None,
        }
    }
}

impl From<io::Error> for InvocationError {
    fn from(e: io::Error) -> Self { Self::Io(e) }
}

impl From<RpcError> for InvocationError {
    fn from(e: RpcError) -> Self { Self::Rpc(e) }
}

impl From<serde_json::Error> for InvocationError {
    fn from(e: serde_json::Error) -> Self { Self::Deserialize(e.to_string()) }
}

impl InvocationError {
    /// Build an RPC error straight from the transport's `(errorCode, errorMessage)`.
    pub fn rpc(code: i32, message: &str) -> Self {
        Self::Rpc(RpcError::from_telegram(code, message))
    }

    /// Returns `true` if this is the named RPC error (supports `'*'` wildcards).
    pub fn is(&self, pattern: &str) -> bool {
        match self {
            Self::Rpc(e) => e.is(pattern),
            _            => false,
        }
    }

    /// If this is a FLOOD_WAIT error, returns how many seconds to wait.
    pub fn flood_wait_seconds(&self) -> Option<u64> {
        match self {
            Self::Rpc(e) => e.flood_wait_seconds(),
            _            => None,
        }
    }

    /// If this is a datacenter redirect, returns where to go.
    pub fn migration(&self) -> Option<Redirect> {
        match self {
            Self::Rpc(e) => e.migration(),
            _            => None,
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flood_wait_is_parsed() {
        let e = RpcError::from_telegram(420, "FLOOD_WAIT_30");
        assert_eq!(e.name, "FLOOD_WAIT");
        assert_eq!(e.value, Some(30));
        assert_eq!(e.flood_wait_seconds(), Some(30));
    }

    #[test]
    fn flood_wait_needs_420() {
        let e = RpcError::from_telegram(400, "FLOOD_WAIT_30");
        assert_eq!(e.flood_wait_seconds(), None);
    }

    #[test]
    fn phone_migrate_switches_default() {
        let r = RpcError::from_telegram(303, "PHONE_MIGRATE_4").migration().unwrap();
        assert_eq!(r, Redirect { kind: RedirectKind::Phone, dc_id: 4 });
        assert!(r.kind.switches_default());
    }

    #[test]
    fn file_migrate_is_per_call() {
        let r = RpcError::from_telegram(303, "FILE_MIGRATE_5").migration().unwrap();
        assert_eq!(r.kind, RedirectKind::File);
        assert_eq!(r.dc_id, 5);
        assert!(!r.kind.switches_default());
    }

    #[test]
    fn unknown_marker_is_kept() {
        let r = RpcError::from_telegram(303, "WEIRD_MIGRATE_2").migration().unwrap();
        assert_eq!(r.kind, RedirectKind::Other("WEIRD".into()));
    }

    #[test]
    fn out_of_range_dc_is_not_a_redirect() {
        let e = RpcError::from_telegram(303, "FILE_MIGRATE_4294967295");
        assert_eq!(e.value, Some(u32::MAX));
        assert!(e.migration().is_none());
    }

    #[test]
    fn wildcard_matching() {
        let e = RpcError::from_telegram(400, "PHONE_CODE_INVALID");
        assert!(e.is("PHONE_CODE_*"));
        assert!(e.is("*_INVALID"));
        assert!(!e.is("PHONE_CODE"));
        assert!(e.migration().is_none());
    }
}
