//! Error types for veil-sync.

use std::fmt;

use veil_client::InvocationError;

// ─── SyncError ────────────────────────────────────────────────────────────────

/// The error type returned from [`crate::Synchronizer`] operations.
///
/// Cryptographic degradation is never an error here: it is reported through
/// `was_encrypted` / [`crate::Resolved::Fallback`] instead.
#[derive(Debug)]
pub enum SyncError {
    /// The transport call failed (after retries).
    Invocation(InvocationError),
    /// The [`crate::Session`] was invalidated by `destroy`.
    SessionClosed,
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invocation(e) => write!(f, "{e}"),
            Self::SessionClosed => write!(f, "session closed"),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Invocation(e) => Some(e),
            Self::SessionClosed => None,
        }
    }
}

impl From<InvocationError> for SyncError {
    fn from(e: InvocationError) -> Self { Self::Invocation(e) }
}

// ─── CryptoError ──────────────────────────────────────────────────────────────

/// A failure reported by the [`crate::Encryption`] collaborator.
///
/// The overlay folds these into `was_encrypted = false`; they are only logged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CryptoError(pub String);

impl CryptoError {
    pub fn new(reason: impl Into<String>) -> Self { Self(reason.into()) }
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "crypto: {}", self.0)
    }
}

impl std::error::Error for CryptoError {}

// ─── SignInError ──────────────────────────────────────────────────────────────

/// Errors returned by [`crate::Synchronizer::sign_in`].
#[derive(Debug)]
pub enum SignInError {
    /// The phone number is not registered with the transport.
    SignUpRequired,
    /// The account has a 2FA password; password login is not supported here.
    PasswordRequired,
    /// The code entered was wrong or has expired.
    InvalidCode,
    /// Any other error.
    Other(InvocationError),
}

impl fmt::Display for SignInError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignUpRequired   => write!(f, "sign up required — register with the official app first"),
            Self::PasswordRequired => write!(f, "2FA password required"),
            Self::InvalidCode      => write!(f, "invalid or expired code"),
            Self::Other(e)         => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SignInError {}

impl From<InvocationError> for SignInError {
    fn from(e: InvocationError) -> Self { Self::Other(e) }
}

// ─── LoginToken ───────────────────────────────────────────────────────────────

/// Opaque token returned by [`crate::Synchronizer::request_login_code`].
///
/// Pass to [`crate::Synchronizer::sign_in`] with the received code.
pub struct LoginToken {
    pub(crate) phone:           String,
    pub(crate) phone_code_hash: String,
}

impl LoginToken {
    /// The phone number the code was sent to.
    pub fn phone(&self) -> &str { &self.phone }
}

impl fmt::Debug for LoginToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LoginToken {{ phone: {:?} }}", self.phone)
    }
}
