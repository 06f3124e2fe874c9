#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use veil_client::{Client, Config, InvocationError, RpcTransport};
use veil_sync::{CryptoError, Encryption, Payload, SyncConfig, Synchronizer};

// ── Fake backend ──────────────────────────────────────────────────────────────

type Reply = Result<Value, (i32, String)>;

#[derive(Clone, Debug)]
pub struct Call {
    pub method: String,
    pub params: Value,
    pub dc_id:  i32,
}

/// Answers each method from a one-shot queue first, then from a sticky reply.
#[derive(Default)]
pub struct Backend {
    once:   Mutex<HashMap<String, VecDeque<Reply>>>,
    sticky: Mutex<HashMap<String, Reply>>,
    calls:  Mutex<Vec<Call>>,
}

impl Backend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, method: &str, value: Value) {
        self.sticky.lock().unwrap().insert(method.into(), Ok(value));
    }

    pub fn fail(&self, method: &str, code: i32, message: &str) {
        self.sticky.lock().unwrap().insert(method.into(), Err((code, message.into())));
    }

    pub fn reply_once(&self, method: &str, value: Value) {
        self.once.lock().unwrap().entry(method.into()).or_default().push_back(Ok(value));
    }

    pub fn fail_once(&self, method: &str, code: i32, message: &str) {
        self.once.lock().unwrap().entry(method.into()).or_default().push_back(Err((code, message.into())));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.method == method).collect()
    }
}

impl RpcTransport for Backend {
    async fn call(&self, method: &str, params: &Value, dc_id: i32) -> Result<Value, InvocationError> {
        self.calls.lock().unwrap().push(Call { method: method.into(), params: params.clone(), dc_id });
        let queued = self.once.lock().unwrap().get_mut(method).and_then(VecDeque::pop_front);
        let reply = match queued {
            Some(r) => r,
            None    => self.sticky.lock().unwrap().get(method).cloned()
                .unwrap_or_else(|| Err((400, "METHOD_INVALID".into()))),
        };
        reply.map_err(|(code, message)| InvocationError::rpc(code, &message))
    }
}

// ── Fake cipher ───────────────────────────────────────────────────────────────

/// Reversible stand-in for the group cipher: `"<enc:GROUP>"` + reversed text.
#[derive(Default)]
pub struct FakeCrypto {
    /// Groups with key material.
    pub groups:       Mutex<HashSet<String>>,
    /// Groups whose shared-key probe errors.
    pub broken:       Mutex<HashSet<String>>,
    /// Peers with a valid key package.
    pub key_packages: Mutex<HashSet<String>>,
    pub decrypts:     AtomicUsize,
}

impl FakeCrypto {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_group(self: Arc<Self>, group_id: &str) -> Arc<Self> {
        self.groups.lock().unwrap().insert(group_id.into());
        self
    }

    pub fn seal(group_id: &str, text: &str) -> String {
        format!("<enc:{group_id}>{}", text.chars().rev().collect::<String>())
    }

    pub fn decrypt_count(&self) -> usize {
        self.decrypts.load(Ordering::SeqCst)
    }
}

impl Encryption for FakeCrypto {
    async fn encrypt(&self, text: &str, _transport: &str, _local_id: &str, group_id: &str) -> Result<Payload, CryptoError> {
        if self.groups.lock().unwrap().contains(group_id) {
            Ok(Payload { text: Self::seal(group_id, text), was_encrypted: true })
        } else {
            Ok(Payload::clear(text))
        }
    }

    async fn decrypt(
        &self,
        payload: &str,
        _timestamp_ms: i64,
        _transport: &str,
        _local_id: &str,
        group_id: &str,
    ) -> Result<Payload, CryptoError> {
        self.decrypts.fetch_add(1, Ordering::SeqCst);
        if !payload.starts_with("<enc:") {
            return Ok(Payload::clear(payload));
        }
        let prefix = format!("<enc:{group_id}>");
        match payload.strip_prefix(&prefix) {
            Some(body) if self.groups.lock().unwrap().contains(group_id) => {
                Ok(Payload { text: body.chars().rev().collect(), was_encrypted: true })
            }
            _ => Err(CryptoError::new("no key for this ciphertext")),
        }
    }

    async fn has_valid_shared_key(
        &self,
        _transport: &str,
        _local_id: &str,
        peer_or_group_id: &str,
        _members: &[String],
    ) -> Result<bool, CryptoError> {
        if self.broken.lock().unwrap().contains(peer_or_group_id) {
            return Err(CryptoError::new("key server unreachable"));
        }
        Ok(self.groups.lock().unwrap().contains(peer_or_group_id))
    }

    async fn has_valid_key_package(&self, _transport: &str, peer_id: &str) -> Result<bool, CryptoError> {
        if peer_id == "666" {
            return Err(CryptoError::new("key package malformed"));
        }
        Ok(self.key_packages.lock().unwrap().contains(peer_id))
    }
}

// ── Wiring ────────────────────────────────────────────────────────────────────

pub type Sync = Synchronizer<Arc<Backend>, Arc<FakeCrypto>>;

pub fn synchronizer(backend: &Arc<Backend>, crypto: &Arc<FakeCrypto>) -> Sync {
    let client = Client::new(backend.clone(), Config::default());
    Synchronizer::new(client, crypto.clone(), SyncConfig::default())
}

/// Backend answering the self-lookup for user `own_id`.
pub fn signed_in_backend(own_id: &str) -> Arc<Backend> {
    let backend = Backend::new();
    backend.reply("users.getFullUser", json!({
        "_": "users.userFull",
        "full_user": { "_": "userFull", "id": own_id.parse::<i64>().unwrap() },
        "users": [{ "_": "user", "id": own_id.parse::<i64>().unwrap(), "first_name": "Me", "self": true }],
        "chats": [],
    }));
    backend
}

pub fn text_message(id: i64, peer: Value, from: i64, text: &str, date: i64) -> Value {
    json!({
        "_": "message",
        "id": id,
        "peer_id": peer,
        "from_id": { "_": "peerUser", "user_id": from },
        "message": text,
        "date": date,
    })
}

pub fn peer_user(id: i64) -> Value {
    json!({ "_": "peerUser", "user_id": id })
}

pub fn peer_chat(id: i64) -> Value {
    json!({ "_": "peerChat", "chat_id": id })
}

pub fn peer_channel(id: i64) -> Value {
    json!({ "_": "peerChannel", "channel_id": id })
}
