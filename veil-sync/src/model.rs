//! Normalized conversation model handed to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Resolved ─────────────────────────────────────────────────────────────────

/// The outcome of a best-effort lookup.
///
/// `Fallback` carries the default used because the lookup failed or was not
/// possible, so callers can tell a real answer from a substituted one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolved<T> {
    Ok(T),
    Fallback(T),
}

impl<T> Resolved<T> {
    pub fn value(&self) -> &T {
        match self {
            Self::Ok(v) | Self::Fallback(v) => v,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Self::Ok(v) | Self::Fallback(v) => v,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

// ─── Peer ─────────────────────────────────────────────────────────────────────

/// What kind of conversation endpoint a [`Peer`] is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeerKind {
    /// One-to-one chat with a user.
    Direct,
    /// Basic group with an enumerable member list.
    Group,
    /// Broadcast channel. Membership and encryption are never attempted.
    Channel,
}

/// A conversation endpoint, rebuilt on every listing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Peer {
    pub id:                    String,
    /// Credential needed to address users and channels.
    pub access_hash:           Option<String>,
    pub kind:                  PeerKind,
    pub display_name:          String,
    /// Member ids; empty for direct peers and channels.
    pub members:               Vec<String>,
    pub photo_id:              Option<String>,
    /// A `data:` URL of the profile picture, or the default asset.
    pub picture:               Resolved<String>,
    /// `Some(true)` once the peer's published key package was validated.
    pub has_valid_key_package: Option<bool>,
}

impl Peer {
    /// A direct peer with no picture and no members.
    pub fn direct(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self::new(id, PeerKind::Direct, display_name)
    }

    /// A bare peer of `kind` with the default picture placeholder.
    pub fn new(id: impl Into<String>, kind: PeerKind, display_name: impl Into<String>) -> Self {
        Self {
            id:                    id.into(),
            access_hash:           None,
            kind,
            display_name:          display_name.into(),
            members:               Vec::new(),
            photo_id:              None,
            picture:               Resolved::Fallback(String::new()),
            has_valid_key_package: None,
        }
    }

    pub fn with_access_hash(mut self, access_hash: impl Into<String>) -> Self {
        self.access_hash = Some(access_hash.into()); self
    }

    pub fn with_members(mut self, members: Vec<String>) -> Self {
        self.members = members; self
    }

    pub fn with_key_package(mut self, valid: bool) -> Self {
        self.has_valid_key_package = Some(valid); self
    }
}

// ─── Message ──────────────────────────────────────────────────────────────────

/// A normalized chat message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Plaintext when decryption worked, the raw payload otherwise.
    pub text:          String,
    pub is_own:        bool,
    /// `true` only if the payload was actually decrypted (or, outgoing, encrypted).
    pub was_encrypted: bool,
    /// Transport message id as a string, `"0"` for unsent messages.
    pub id:            String,
    /// Transport send time, seconds since the Unix epoch.
    pub timestamp:     i64,
    pub author_name:   String,
}

impl Message {
    /// An outgoing message authored locally, not yet sent.
    pub fn outgoing(text: impl Into<String>) -> Self {
        Self {
            text:          text.into(),
            is_own:        true,
            was_encrypted: false,
            id:            "0".into(),
            timestamp:     0,
            author_name:   "Me".into(),
        }
    }

    /// Placeholder for a dialog whose top message is missing from the response.
    pub fn empty() -> Self {
        Self {
            text:          String::new(),
            is_own:        false,
            was_encrypted: false,
            id:            "0".into(),
            timestamp:     0,
            author_name:   String::new(),
        }
    }

    /// `timestamp` in milliseconds, the unit the encryption layer expects.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.saturating_mul(1000)
    }

    /// `timestamp` as a UTC date, `None` if out of range.
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

// ─── Dialog ───────────────────────────────────────────────────────────────────

/// Whether a conversation has usable encryption key material.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncryptionState {
    /// Not probed yet.
    #[default]
    Unknown,
    Encrypted,
    Unencrypted,
}

impl From<bool> for EncryptionState {
    fn from(encrypted: bool) -> Self {
        if encrypted { Self::Encrypted } else { Self::Unencrypted }
    }
}

/// A conversation summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dialog {
    pub peer:        Peer,
    pub group_id:    String,
    pub top_message: Message,
    /// Starts as [`EncryptionState::Unknown`]; resolved separately so it never
    /// holds up `top_message`.
    pub encrypted:   EncryptionState,
}

// ─── History ──────────────────────────────────────────────────────────────────

/// Result of one history fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum History {
    /// Same ids in the same order as last time; nothing was decrypted.
    Unchanged { hash: u32 },
    /// Decrypted messages, newest first as the transport returns them.
    Changed { messages: Vec<Message>, hash: u32 },
}

impl History {
    pub fn hash(&self) -> u32 {
        match self {
            Self::Unchanged { hash } | Self::Changed { hash, .. } => *hash,
        }
    }

    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_accessors() {
        let ok = Resolved::Ok(3);
        let fb = Resolved::Fallback(0);
        assert_eq!(*ok.value(), 3);
        assert!(!ok.is_fallback());
        assert!(fb.is_fallback());
        assert_eq!(fb.into_inner(), 0);
    }

    #[test]
    fn timestamp_conversions() {
        let mut m = Message::outgoing("x");
        m.timestamp = 1_600_000_000;
        assert_eq!(m.timestamp_ms(), 1_600_000_000_000);
        assert_eq!(m.sent_at().unwrap().timestamp(), 1_600_000_000);
    }

    #[test]
    fn encryption_state_from_probe() {
        assert_eq!(EncryptionState::from(true), EncryptionState::Encrypted);
        assert_eq!(EncryptionState::from(false), EncryptionState::Unencrypted);
        assert_eq!(EncryptionState::default(), EncryptionState::Unknown);
    }
}
