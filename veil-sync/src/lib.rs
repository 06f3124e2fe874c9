//! # veil-sync
//!
//! End-to-end encryption overlay for an unencrypted chat transport.
//!
//! The [`Synchronizer`] reads conversations through a resilient
//! [`veil_client::Client`], derives the encryption group of every
//! conversation, decrypts what it can through the [`Encryption`] collaborator
//! and hands back a normalized [`Dialog`] / [`Message`] model. Sending runs
//! the other way: plaintext → ciphertext → transport.
//!
//! ## Features
//! - Dialog listing with decrypted top messages and best-effort pictures
//! - History fetches that skip decryption when nothing changed
//! - Encrypted send with fallback to clear text when no key exists
//! - Login by phone code, contacts with key-package probing
//! - Single-flight history poller

#![deny(unsafe_code)]

mod contacts;
mod errors;
pub mod auth;
pub mod hash;
pub mod identity;
pub mod model;
pub mod overlay;
pub mod poller;
pub mod raw;
mod session;

pub use errors::{CryptoError, LoginToken, SignInError, SyncError};
pub use hash::item_hash;
pub use identity::derive_group_id;
pub use model::{Dialog, EncryptionState, History, Message, Peer, PeerKind, Resolved};
pub use overlay::{Encryption, EncryptionOverlay, Payload};
pub use poller::{MessagePoller, PollConfig, PollEvent};
pub use session::Session;

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::json;
use veil_client::{CallOptions, Client, InvocationError, RpcTransport};

use raw::{RawAction, RawChat, RawChatData, RawDialog, RawDialogs, RawFile, RawHistory, RawMessage,
          RawPeer, RawUser, RawUserData, RawUserFull};
use session::SessionSlot;

// ─── SyncConfig ───────────────────────────────────────────────────────────────

/// Configuration for [`Synchronizer::new`].
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Transport name handed to the encryption collaborator.
    pub transport_name:    String,
    /// Dialogs requested per `list_dialogs` call.
    pub dialog_page_size:  i32,
    /// Picture used when a peer has no photo or it cannot be fetched.
    pub default_picture:   String,
    /// Bytes requested when fetching a profile picture.
    pub photo_chunk_limit: i32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            transport_name:    "telegram".into(),
            dialog_page_size:  500,
            default_picture:   "assets/logo_small.png".into(),
            photo_chunk_limit: 16384,
        }
    }
}

// ─── Synchronizer ─────────────────────────────────────────────────────────────

struct SyncInner<T, E> {
    client:  Client<T>,
    overlay: EncryptionOverlay<E>,
    config:  SyncConfig,
    session: SessionSlot,
}

/// Reads and writes conversations through the encryption overlay.
/// Cheap to clone — internally Arc-wrapped.
pub struct Synchronizer<T, E> {
    inner: Arc<SyncInner<T, E>>,
}

impl<T, E> Clone for Synchronizer<T, E> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

type UserTable<'a> = HashMap<&'a str, &'a RawUserData>;
type ChatTable<'a> = HashMap<&'a str, &'a RawChatData>;

fn user_table(users: &[RawUser]) -> UserTable<'_> {
    users.iter().filter_map(RawUser::data).map(|u| (u.id.as_str(), u)).collect()
}

fn chat_table(chats: &[RawChat]) -> ChatTable<'_> {
    chats.iter().filter_map(RawChat::data).map(|c| (c.id.as_str(), c)).collect()
}

impl<T: RpcTransport, E: Encryption> Synchronizer<T, E> {
    pub fn new(client: Client<T>, crypto: E, config: SyncConfig) -> Self {
        let overlay = EncryptionOverlay::new(crypto, config.transport_name.clone());
        Self {
            inner: Arc::new(SyncInner {
                client,
                overlay,
                config,
                session: SessionSlot::default(),
            }),
        }
    }

    /// The RPC client every call goes through.
    pub fn client(&self) -> &Client<T> {
        &self.inner.client
    }

    pub fn overlay(&self) -> &EncryptionOverlay<E> {
        &self.inner.overlay
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    // ── Session ────────────────────────────────────────────────────────────

    /// Resolve the local identity, once per session.
    ///
    /// Returns `None` when the transport is not signed in (or the self-lookup
    /// failed); the next call tries again.
    pub async fn init(&self) -> Option<Session> {
        self.inner.session.get_or_resolve(|| async {
            let req = json!({ "id": { "_": "inputUserSelf" } });
            match self.inner.client.invoke_as::<RawUserFull>("users.getFullUser", &req).await {
                Ok(full) => {
                    let own_id = full.full_user.id.0;
                    let own_name = full.users.iter()
                        .filter_map(RawUser::data)
                        .find(|u| u.id.as_str() == own_id)
                        .map(RawUserData::full_name)
                        .unwrap_or_default();
                    tracing::info!("[veil-sync] Session ready for user {own_id}");
                    Some((own_id, own_name))
                }
                Err(e) => {
                    tracing::info!("[veil-sync] Not signed in yet: {e}");
                    None
                }
            }
        }).await
    }

    /// Forget the local identity. Every [`Session`] handed out so far is
    /// rejected from now on with [`SyncError::SessionClosed`].
    pub async fn destroy(&self) {
        self.inner.session.clear().await;
        tracing::info!("[veil-sync] Session destroyed");
    }

    /// `Ok` if `session` is still the live one.
    pub fn check_session(&self, session: &Session) -> Result<(), SyncError> {
        self.inner.session.check(session)
    }

    // ── Dialogs ────────────────────────────────────────────────────────────

    /// Fetch the most recent dialogs with decrypted top messages.
    ///
    /// `encrypted` is left [`EncryptionState::Unknown`]; resolve it with
    /// [`Synchronizer::probe_encryption`] or
    /// [`Synchronizer::resolve_encryption`] once the list is on screen.
    pub async fn list_dialogs(&self, session: &Session) -> Result<Vec<Dialog>, SyncError> {
        self.check_session(session)?;
        let req = json!({
            "offset_peer": { "_": "inputPeerEmpty" },
            "limit":       self.inner.config.dialog_page_size,
            "hash":        0,
        });
        let page = match self.inner.client.invoke_as::<RawDialogs>("messages.getDialogs", &req).await? {
            RawDialogs::Dialogs(p) | RawDialogs::Slice(p) => p,
            RawDialogs::NotModified => return Ok(vec![]),
        };
        tracing::debug!("[veil-sync] {} dialogs loaded", page.dialogs.len());

        let users = user_table(&page.users);
        let chats = chat_table(&page.chats);
        let top_messages: HashMap<(PeerKind, &str, i64), &RawMessage> = page.messages.iter()
            .filter_map(|m| m.peer().map(|p| ((p.kind(), p.id(), m.id()), m)))
            .collect();

        let mut dialogs = Vec::with_capacity(page.dialogs.len());
        for dialog in &page.dialogs {
            let RawDialog::Dialog { peer: raw_peer, top_message } = dialog else { continue };

            let peer     = self.resolve_peer(raw_peer, &users, &chats).await?;
            let group_id = derive_group_id(session.own_id(), &peer);
            let top_message = match top_messages.get(&(raw_peer.kind(), raw_peer.id(), *top_message)) {
                Some(m) => self.normalize_message(m, &users, session.own_id(), &group_id).await,
                None    => Message::empty(),
            };

            dialogs.push(Dialog { peer, group_id, top_message, encrypted: EncryptionState::Unknown });
        }

        self.check_session(session)?;
        Ok(dialogs)
    }

    /// Whether the conversation with `peer` has a usable shared key.
    pub async fn probe_encryption(&self, session: &Session, peer: &Peer) -> Result<Resolved<bool>, SyncError> {
        self.check_session(session)?;
        Ok(self.inner.overlay.probe_shared_key(peer, session.own_id()).await)
    }

    /// Probe every dialog in turn and fill in its `encrypted` state.
    pub async fn resolve_encryption(&self, session: &Session, dialogs: &mut [Dialog]) -> Result<(), SyncError> {
        for dialog in dialogs.iter_mut() {
            let probed = self.probe_encryption(session, &dialog.peer).await?;
            dialog.encrypted = EncryptionState::from(probed.into_inner());
        }
        Ok(())
    }

    // ── Messages ───────────────────────────────────────────────────────────

    /// Fetch up to `limit` newest messages of `peer`.
    ///
    /// When the ids hash to `previous_hash` nothing is decrypted and
    /// [`History::Unchanged`] is returned. Otherwise messages are decrypted in
    /// transport order (newest first).
    pub async fn list_messages(
        &self,
        session:       &Session,
        peer:          &Peer,
        limit:         i32,
        previous_hash: u32,
    ) -> Result<History, SyncError> {
        self.check_session(session)?;
        let req = json!({
            "peer":  raw::input_peer(peer.kind, &peer.id, peer.access_hash.as_deref()),
            "limit": limit,
            "hash":  previous_hash,
        });
        let page = match self.inner.client.invoke_as::<RawHistory>("messages.getHistory", &req).await? {
            RawHistory::Messages(p) | RawHistory::Slice(p) | RawHistory::Channel(p) => p,
            RawHistory::NotModified => return Ok(History::Unchanged { hash: previous_hash }),
        };

        let hash = item_hash(page.messages.iter().map(RawMessage::id));
        if hash == previous_hash {
            return Ok(History::Unchanged { hash });
        }

        let users    = user_table(&page.users);
        let group_id = derive_group_id(session.own_id(), peer);
        let mut messages = Vec::with_capacity(page.messages.len());
        for m in &page.messages {
            messages.push(self.normalize_message(m, &users, session.own_id(), &group_id).await);
        }

        self.check_session(session)?;
        Ok(History::Changed { messages, hash })
    }

    /// Encrypt `message.text` for `peer` and send it.
    ///
    /// Returns whether the transmitted payload was actually encrypted; with no
    /// key material the message goes out in the clear and this is `false`.
    pub async fn send_message(&self, session: &Session, peer: &Peer, message: &Message) -> Result<bool, SyncError> {
        self.check_session(session)?;
        let sealed = self.inner.overlay.encrypt_message(message, peer, session.own_id()).await;
        let req = json!({
            "peer":      raw::input_peer(peer.kind, &peer.id, peer.access_hash.as_deref()),
            "message":   sealed.text,
            "random_id": random_id()?.to_string(),
        });
        self.inner.client.invoke("messages.sendMessage", &req).await?;
        tracing::debug!("[veil-sync] Sent message to {} (encrypted: {})", peer.id, sealed.was_encrypted);
        Ok(sealed.was_encrypted)
    }

    /// Member ids of `peer`. Empty for direct peers and, by choice, channels.
    pub async fn get_group_members(&self, session: &Session, peer: &Peer) -> Result<Vec<String>, SyncError> {
        self.check_session(session)?;
        Ok(self.fetch_members(peer.kind, &peer.id).await?)
    }

    // ── Helpers ────────────────────────────────────────────────────────────

    async fn fetch_members(&self, kind: PeerKind, id: &str) -> Result<Vec<String>, InvocationError> {
        match kind {
            PeerKind::Direct | PeerKind::Channel => Ok(vec![]),
            PeerKind::Group => {
                let full: raw::RawChatFull = self.inner.client
                    .invoke_as("messages.getFullChat", &json!({ "chat_id": id }))
                    .await?;
                Ok(full.users.iter().filter_map(RawUser::data).map(|u| u.id.0.clone()).collect())
            }
        }
    }

    async fn resolve_peer(
        &self,
        raw_peer: &RawPeer,
        users:    &UserTable<'_>,
        chats:    &ChatTable<'_>,
    ) -> Result<Peer, InvocationError> {
        let kind = raw_peer.kind();
        let id   = raw_peer.id();
        let mut peer = Peer::new(id, kind, "(Unknown)");

        match kind {
            PeerKind::Direct => if let Some(u) = users.get(id) {
                peer.access_hash  = u.access_hash.as_ref().map(|h| h.0.clone());
                peer.display_name = u.full_name();
                peer.photo_id     = u.photo_id().map(str::to_string);
            },
            PeerKind::Group | PeerKind::Channel => if let Some(c) = chats.get(id) {
                peer.access_hash  = c.access_hash.as_ref().map(|h| h.0.clone());
                peer.display_name = c.title.clone();
                peer.photo_id     = c.photo_id().map(str::to_string);
            },
        }

        peer.members = self.fetch_members(kind, id).await?;
        peer.picture = self.fetch_picture(&peer).await;
        Ok(peer)
    }

    /// Download the small profile picture of `peer` as a `data:` URL.
    ///
    /// Never waits out a flood wait: a listing is not held back for a picture.
    pub(crate) async fn fetch_picture(&self, peer: &Peer) -> Resolved<String> {
        let fallback = || Resolved::Fallback(self.inner.config.default_picture.clone());
        let Some(photo_id) = peer.photo_id.as_deref() else { return fallback() };

        let req = json!({
            "cdn_supported": true,
            "precise":       true,
            "location": {
                "_":        "inputPeerPhotoFileLocation",
                "big":      false,
                "peer":     raw::input_peer(peer.kind, &peer.id, peer.access_hash.as_deref()),
                "photo_id": photo_id,
            },
            "offset": 0,
            "limit":  self.inner.config.photo_chunk_limit,
        });
        let options = CallOptions::best_effort();
        match self.inner.client.call_as::<RawFile>("upload.getFile", &req, &options).await {
            Ok(file) if !file.bytes.is_empty() => {
                Resolved::Ok(format!("data:image/jpeg;base64,{}", BASE64.encode(&file.bytes)))
            }
            Ok(_) => fallback(),
            Err(e) => {
                tracing::debug!("[veil-sync] Picture of {} unavailable: {e}", peer.id);
                fallback()
            }
        }
    }

    /// Turn one raw message into the model, decrypting text messages.
    async fn normalize_message(
        &self,
        raw:      &RawMessage,
        users:    &UserTable<'_>,
        own_id:   &str,
        group_id: &str,
    ) -> Message {
        match raw {
            RawMessage::Message(m) => {
                let from    = m.from_id.as_ref().and_then(RawPeer::user_id);
                let is_own  = m.out || from == Some(own_id);
                let author  = if m.post {
                    String::new()
                } else {
                    from.or_else(|| m.peer_id.user_id())
                        .and_then(|id| users.get(id))
                        .and_then(|u| u.first_name.clone())
                        .unwrap_or_default()
                };
                let opened = if m.message.is_empty() {
                    Payload::clear("")
                } else {
                    self.inner.overlay.decrypt_in_group(&m.message, m.date.saturating_mul(1000), own_id, group_id).await
                };
                Message {
                    text:          opened.text,
                    is_own,
                    was_encrypted: opened.was_encrypted,
                    id:            m.id.to_string(),
                    timestamp:     m.date,
                    author_name:   author,
                }
            }
            RawMessage::Service(m) => Message {
                text:          service_text(&m.action).to_string(),
                is_own:        false,
                was_encrypted: false,
                id:            m.id.to_string(),
                timestamp:     m.date,
                author_name:   String::new(),
            },
            RawMessage::Empty { id, .. } => Message { id: id.to_string(), ..Message::empty() },
        }
    }
}

/// Placeholder shown for a non-text system event.
fn service_text(action: &RawAction) -> &'static str {
    match action {
        RawAction::ChatCreate     => "Chat was created",
        RawAction::ChatAddUser    => "User was added",
        RawAction::ChatDeleteUser => "User was removed",
        RawAction::Unknown        => "",
    }
}

/// Correlation id for outgoing messages, 63 random bits from the OS.
fn random_id() -> Result<i64, InvocationError> {
    let mut b = [0u8; 8];
    getrandom::getrandom(&mut b)
        .map_err(|e| InvocationError::Io(std::io::Error::other(e.to_string())))?;
    Ok(i64::from_le_bytes(b) & i64::MAX)
}
