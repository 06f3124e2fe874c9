//! Encryption overlay.
//!
//! Adapts the [`Encryption`] collaborator to the message model. Whatever the
//! collaborator does, the overlay never fails: missing key material, foreign
//! ciphertext or a collaborator error all end up as `was_encrypted = false`
//! with the input text passed through.

use std::future::Future;
use std::sync::Arc;

use crate::errors::CryptoError;
use crate::identity::derive_group_id;
use crate::model::{Message, Peer, PeerKind, Resolved};

/// Text plus whether it went through the cipher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payload {
    pub text:          String,
    pub was_encrypted: bool,
}

impl Payload {
    /// `text` untouched by the cipher.
    pub fn clear(text: impl Into<String>) -> Self {
        Self { text: text.into(), was_encrypted: false }
    }
}

// ─── Encryption ───────────────────────────────────────────────────────────────

/// The group-keyed encryption service.
///
/// `transport` names the chat transport (e.g. `"telegram"`) so one key store
/// can serve several transports. Implementations signal "cannot encrypt /
/// decrypt" with `was_encrypted = false` or an error; both are tolerated.
pub trait Encryption: Send + Sync + 'static {
    fn encrypt(
        &self,
        text:      &str,
        transport: &str,
        local_id:  &str,
        group_id:  &str,
    ) -> impl Future<Output = Result<Payload, CryptoError>> + Send;

    fn decrypt(
        &self,
        payload:      &str,
        timestamp_ms: i64,
        transport:    &str,
        local_id:     &str,
        group_id:     &str,
    ) -> impl Future<Output = Result<Payload, CryptoError>> + Send;

    /// Whether a current shared key exists for the group `peer_or_group_id`
    /// with the given `members`.
    fn has_valid_shared_key(
        &self,
        transport:        &str,
        local_id:         &str,
        peer_or_group_id: &str,
        members:          &[String],
    ) -> impl Future<Output = Result<bool, CryptoError>> + Send;

    /// Whether `peer_id` has published a valid key package.
    fn has_valid_key_package(
        &self,
        transport: &str,
        peer_id:   &str,
    ) -> impl Future<Output = Result<bool, CryptoError>> + Send;
}

impl<E: Encryption> Encryption for Arc<E> {
    fn encrypt(
        &self,
        text:      &str,
        transport: &str,
        local_id:  &str,
        group_id:  &str,
    ) -> impl Future<Output = Result<Payload, CryptoError>> + Send {
        (**self).encrypt(text, transport, local_id, group_id)
    }

    fn decrypt(
        &self,
        payload:      &str,
        timestamp_ms: i64,
        transport:    &str,
        local_id:     &str,
        group_id:     &str,
    ) -> impl Future<Output = Result<Payload, CryptoError>> + Send {
        (**self).decrypt(payload, timestamp_ms, transport, local_id, group_id)
    }

    fn has_valid_shared_key(
        &self,
        transport:        &str,
        local_id:         &str,
        peer_or_group_id: &str,
        members:          &[String],
    ) -> impl Future<Output = Result<bool, CryptoError>> + Send {
        (**self).has_valid_shared_key(transport, local_id, peer_or_group_id, members)
    }

    fn has_valid_key_package(
        &self,
        transport: &str,
        peer_id:   &str,
    ) -> impl Future<Output = Result<bool, CryptoError>> + Send {
        (**self).has_valid_key_package(transport, peer_id)
    }
}

// ─── EncryptionOverlay ────────────────────────────────────────────────────────

/// Converts messages to and from ciphertext for one transport.
pub struct EncryptionOverlay<E> {
    crypto:    E,
    transport: String,
}

impl<E: Encryption> EncryptionOverlay<E> {
    pub fn new(crypto: E, transport: impl Into<String>) -> Self {
        Self { crypto, transport: transport.into() }
    }

    /// The wrapped collaborator.
    pub fn crypto(&self) -> &E {
        &self.crypto
    }

    /// Name passed to the collaborator as `transport`.
    pub fn transport(&self) -> &str {
        &self.transport
    }

    /// Copy of `msg` with its text replaced by the ciphertext.
    ///
    /// Without key material the text is kept and `was_encrypted` is `false`,
    /// meaning the message will go out in the clear.
    pub async fn encrypt_message(&self, msg: &Message, peer: &Peer, local_id: &str) -> Message {
        let group_id = derive_group_id(local_id, peer);
        let sealed = match self.crypto.encrypt(&msg.text, &self.transport, local_id, &group_id).await {
            Ok(p)  => p,
            Err(e) => {
                tracing::warn!("[veil-sync] encrypt for group {group_id} failed, sending in clear: {e}");
                Payload::clear(msg.text.as_str())
            }
        };
        Message { text: sealed.text, was_encrypted: sealed.was_encrypted, ..msg.clone() }
    }

    /// Decrypt `raw` sent at `timestamp_ms` in the conversation with `peer`.
    ///
    /// Anything that cannot be decrypted comes back as `raw` with
    /// `was_encrypted = false`.
    pub async fn decrypt_payload(&self, raw: &str, timestamp_ms: i64, peer: &Peer, local_id: &str) -> Payload {
        let group_id = derive_group_id(local_id, peer);
        self.decrypt_in_group(raw, timestamp_ms, local_id, &group_id).await
    }

    /// Decrypt the text of a received message in place.
    pub async fn decrypt_message(&self, msg: Message, peer: &Peer, local_id: &str) -> Message {
        let opened = self.decrypt_payload(&msg.text, msg.timestamp_ms(), peer, local_id).await;
        Message { text: opened.text, was_encrypted: opened.was_encrypted, ..msg }
    }

    pub(crate) async fn decrypt_in_group(
        &self,
        raw:          &str,
        timestamp_ms: i64,
        local_id:     &str,
        group_id:     &str,
    ) -> Payload {
        match self.crypto.decrypt(raw, timestamp_ms, &self.transport, local_id, group_id).await {
            Ok(p)  => p,
            Err(e) => {
                tracing::debug!("[veil-sync] decrypt in group {group_id} failed, showing raw payload: {e}");
                Payload::clear(raw)
            }
        }
    }

    /// Whether the conversation with `peer` has a usable shared key.
    ///
    /// Channels are never encrypted. Probe failures fall back to `false`.
    pub async fn probe_shared_key(&self, peer: &Peer, local_id: &str) -> Resolved<bool> {
        let members = match peer.kind {
            PeerKind::Channel => return Resolved::Ok(false),
            PeerKind::Direct  => vec![peer.id.clone()],
            PeerKind::Group   => peer.members.clone(),
        };
        let group_id = derive_group_id(local_id, peer);
        match self.crypto.has_valid_shared_key(&self.transport, local_id, &group_id, &members).await {
            Ok(valid) => Resolved::Ok(valid),
            Err(e) => {
                tracing::debug!("[veil-sync] shared-key probe for {group_id} failed: {e}");
                Resolved::Fallback(false)
            }
        }
    }

    /// Whether `peer` has published a valid key package. Failures fall back to `false`.
    pub async fn probe_key_package(&self, peer: &Peer) -> Resolved<bool> {
        match self.crypto.has_valid_key_package(&self.transport, &peer.id).await {
            Ok(valid) => Resolved::Ok(valid),
            Err(e) => {
                tracing::debug!("[veil-sync] key-package probe for {} failed: {e}", peer.id);
                Resolved::Fallback(false)
            }
        }
    }
}
