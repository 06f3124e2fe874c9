//! Raw transport records.
//!
//! The transport answers with JSON objects tagged by their constructor name in
//! the `"_"` field (`{"_": "peerUser", "user_id": 42}`). Only the fields the
//! synchronizer reads are modelled; everything else is ignored. Constructors
//! this crate does not know about decode to an `Unknown` variant instead of
//! failing the whole response.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

use crate::model::PeerKind;

// ─── Id ───────────────────────────────────────────────────────────────────────

/// A transport identifier kept as a decimal string.
///
/// Ids may exceed 2^53, so the transport sends them either as JSON numbers or
/// as strings; both decode losslessly.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Id(pub String);

impl Id {
    pub fn as_str(&self) -> &str { &self.0 }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        match Value::deserialize(d)? {
            Value::String(s) => Ok(Self(s)),
            Value::Number(n) => Ok(Self(n.to_string())),
            other            => Err(D::Error::custom(format!("expected an id, got {other}"))),
        }
    }
}

// ─── Peers ────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "_")]
pub enum RawPeer {
    #[serde(rename = "peerUser")]
    User { user_id: Id },
    #[serde(rename = "peerChat")]
    Chat { chat_id: Id },
    #[serde(rename = "peerChannel")]
    Channel { channel_id: Id },
}

impl RawPeer {
    pub fn kind(&self) -> PeerKind {
        match self {
            Self::User { .. }    => PeerKind::Direct,
            Self::Chat { .. }    => PeerKind::Group,
            Self::Channel { .. } => PeerKind::Channel,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::User { user_id }       => user_id.as_str(),
            Self::Chat { chat_id }       => chat_id.as_str(),
            Self::Channel { channel_id } => channel_id.as_str(),
        }
    }

    /// The user id, if this peer is a user.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::User { user_id } => Some(user_id.as_str()),
            _                      => None,
        }
    }
}

/// Build the `inputPeer*` object addressing a peer in requests.
pub fn input_peer(kind: PeerKind, id: &str, access_hash: Option<&str>) -> Value {
    let access_hash = access_hash.unwrap_or("0");
    match kind {
        PeerKind::Direct  => json!({ "_": "inputPeerUser", "user_id": id, "access_hash": access_hash }),
        PeerKind::Group   => json!({ "_": "inputPeerChat", "chat_id": id }),
        PeerKind::Channel => json!({ "_": "inputPeerChannel", "channel_id": id, "access_hash": access_hash }),
    }
}

// ─── Users & chats ────────────────────────────────────────────────────────────

/// Profile photo reference; `photo_id` is absent for `*PhotoEmpty`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawPhoto {
    #[serde(default)]
    pub photo_id: Option<Id>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawUserData {
    pub id:          Id,
    #[serde(default)]
    pub access_hash: Option<Id>,
    #[serde(default)]
    pub first_name:  Option<String>,
    #[serde(default)]
    pub last_name:   Option<String>,
    #[serde(default)]
    pub photo:       Option<RawPhoto>,
}

impl RawUserData {
    /// `"first last"`, trimmed.
    pub fn full_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or("");
        let last  = self.last_name.as_deref().unwrap_or("");
        format!("{first} {last}").trim().to_string()
    }

    pub fn photo_id(&self) -> Option<&str> {
        self.photo.as_ref()?.photo_id.as_ref().map(Id::as_str)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "_")]
pub enum RawUser {
    #[serde(rename = "user")]
    User(RawUserData),
    #[serde(rename = "userEmpty")]
    Empty { id: Id },
    #[serde(other)]
    Unknown,
}

impl RawUser {
    pub fn data(&self) -> Option<&RawUserData> {
        match self {
            Self::User(u) => Some(u),
            _             => None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawChatData {
    pub id:          Id,
    #[serde(default)]
    pub access_hash: Option<Id>,
    #[serde(default)]
    pub title:       String,
    #[serde(default)]
    pub photo:       Option<RawPhoto>,
}

impl RawChatData {
    pub fn photo_id(&self) -> Option<&str> {
        self.photo.as_ref()?.photo_id.as_ref().map(Id::as_str)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "_")]
pub enum RawChat {
    #[serde(rename = "chat")]
    Chat(RawChatData),
    #[serde(rename = "chatForbidden")]
    Forbidden(RawChatData),
    #[serde(rename = "channel")]
    Channel(RawChatData),
    #[serde(rename = "channelForbidden")]
    ChannelForbidden(RawChatData),
    #[serde(rename = "chatEmpty")]
    Empty { id: Id },
    #[serde(other)]
    Unknown,
}

impl RawChat {
    pub fn data(&self) -> Option<&RawChatData> {
        match self {
            Self::Chat(c) | Self::Forbidden(c) | Self::Channel(c) | Self::ChannelForbidden(c) => Some(c),
            _ => None,
        }
    }
}

// ─── Messages ─────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "_")]
pub enum RawAction {
    #[serde(rename = "messageActionChatCreate")]
    ChatCreate,
    #[serde(rename = "messageActionChatAddUser")]
    ChatAddUser,
    #[serde(rename = "messageActionChatDeleteUser")]
    ChatDeleteUser,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawTextMessage {
    pub id:      i64,
    #[serde(default)]
    pub from_id: Option<RawPeer>,
    pub peer_id: RawPeer,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub date:    i64,
    #[serde(default)]
    pub out:     bool,
    #[serde(default)]
    pub post:    bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawServiceMessage {
    pub id:      i64,
    pub peer_id: RawPeer,
    #[serde(default)]
    pub date:    i64,
    pub action:  RawAction,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "_")]
pub enum RawMessage {
    #[serde(rename = "message")]
    Message(RawTextMessage),
    #[serde(rename = "messageService")]
    Service(RawServiceMessage),
    #[serde(rename = "messageEmpty")]
    Empty {
        id: i64,
        #[serde(default)]
        peer_id: Option<RawPeer>,
    },
}

impl RawMessage {
    pub fn id(&self) -> i64 {
        match self {
            Self::Message(m)     => m.id,
            Self::Service(m)     => m.id,
            Self::Empty { id, .. } => *id,
        }
    }

    pub fn peer(&self) -> Option<&RawPeer> {
        match self {
            Self::Message(m)            => Some(&m.peer_id),
            Self::Service(m)            => Some(&m.peer_id),
            Self::Empty { peer_id, .. } => peer_id.as_ref(),
        }
    }
}

// ─── Method results ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "_")]
pub enum RawDialog {
    #[serde(rename = "dialog")]
    Dialog { peer: RawPeer, top_message: i64 },
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DialogsPage {
    #[serde(default)]
    pub dialogs:  Vec<RawDialog>,
    #[serde(default)]
    pub messages: Vec<RawMessage>,
    #[serde(default)]
    pub chats:    Vec<RawChat>,
    #[serde(default)]
    pub users:    Vec<RawUser>,
}

/// Result of `messages.getDialogs`.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "_")]
pub enum RawDialogs {
    #[serde(rename = "messages.dialogs")]
    Dialogs(DialogsPage),
    #[serde(rename = "messages.dialogsSlice")]
    Slice(DialogsPage),
    #[serde(rename = "messages.dialogsNotModified")]
    NotModified,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct HistoryPage {
    #[serde(default)]
    pub messages: Vec<RawMessage>,
    #[serde(default)]
    pub users:    Vec<RawUser>,
}

/// Result of `messages.getHistory`.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "_")]
pub enum RawHistory {
    #[serde(rename = "messages.messages")]
    Messages(HistoryPage),
    #[serde(rename = "messages.messagesSlice")]
    Slice(HistoryPage),
    #[serde(rename = "messages.channelMessages")]
    Channel(HistoryPage),
    #[serde(rename = "messages.messagesNotModified")]
    NotModified,
}

/// Result of `messages.getFullChat`.
#[derive(Clone, Debug, Deserialize)]
pub struct RawChatFull {
    #[serde(default)]
    pub users: Vec<RawUser>,
}

/// Result of `contacts.getContacts`.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "_")]
pub enum RawContacts {
    #[serde(rename = "contacts.contacts")]
    Contacts {
        #[serde(default)]
        users: Vec<RawUser>,
    },
    #[serde(rename = "contacts.contactsNotModified")]
    NotModified,
}

/// Result of `upload.getFile`.
#[derive(Clone, Debug, Deserialize)]
pub struct RawFile {
    #[serde(default)]
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawFullUserInfo {
    pub id: Id,
}

/// Result of `users.getFullUser`.
#[derive(Clone, Debug, Deserialize)]
pub struct RawUserFull {
    pub full_user: RawFullUserInfo,
    #[serde(default)]
    pub users:     Vec<RawUser>,
}

/// Result of `auth.sendCode`.
#[derive(Clone, Debug, Deserialize)]
pub struct RawSentCode {
    pub phone_code_hash: String,
}

/// Result of `auth.signIn`.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "_")]
pub enum RawAuthorization {
    #[serde(rename = "auth.authorization")]
    Authorization { user: RawUser },
    #[serde(rename = "auth.authorizationSignUpRequired")]
    SignUpRequired,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_accepts_numbers_and_strings() {
        let a: Id = serde_json::from_value(json!(1234567890123_i64)).unwrap();
        let b: Id = serde_json::from_value(json!("1234567890123")).unwrap();
        assert_eq!(a, b);
        assert!(serde_json::from_value::<Id>(json!(true)).is_err());
    }

    #[test]
    fn message_variants_decode() {
        let raw = json!([
            { "_": "message", "id": 7, "peer_id": { "_": "peerUser", "user_id": 200 },
              "from_id": { "_": "peerUser", "user_id": 100 }, "message": "hi", "date": 10 },
            { "_": "messageService", "id": 6, "peer_id": { "_": "peerChat", "chat_id": 9 },
              "date": 5, "action": { "_": "messageActionChatCreate", "title": "t", "users": [] } },
            { "_": "messageService", "id": 5, "peer_id": { "_": "peerChat", "chat_id": 9 },
              "date": 5, "action": { "_": "messageActionPinMessage" } },
            { "_": "messageEmpty", "id": 4 }
        ]);
        let msgs: Vec<RawMessage> = serde_json::from_value(raw).unwrap();
        assert_eq!(msgs.iter().map(RawMessage::id).collect::<Vec<_>>(), vec![7, 6, 5, 4]);
        assert!(matches!(&msgs[1], RawMessage::Service(s) if matches!(s.action, RawAction::ChatCreate)));
        assert!(matches!(&msgs[2], RawMessage::Service(s) if matches!(s.action, RawAction::Unknown)));
        assert!(msgs[3].peer().is_none());
    }

    #[test]
    fn unknown_constructors_do_not_fail_the_page() {
        let raw = json!({
            "_": "messages.dialogsSlice",
            "count": 1,
            "dialogs": [{ "_": "dialogFolder", "folder": {} }],
            "users": [{ "_": "userNew" }],
            "chats": [{ "_": "chatEmpty", "id": 3 }]
        });
        let RawDialogs::Slice(page) = serde_json::from_value(raw).unwrap() else {
            panic!("expected slice");
        };
        assert!(matches!(page.dialogs[0], RawDialog::Unknown));
        assert!(page.users[0].data().is_none());
        assert!(page.chats[0].data().is_none());
        assert!(page.messages.is_empty());
    }

    #[test]
    fn input_peer_shapes() {
        assert_eq!(
            input_peer(PeerKind::Direct, "200", Some("55")),
            json!({ "_": "inputPeerUser", "user_id": "200", "access_hash": "55" }),
        );
        assert_eq!(input_peer(PeerKind::Group, "9", None), json!({ "_": "inputPeerChat", "chat_id": "9" }));
        assert_eq!(input_peer(PeerKind::Channel, "8", None)["access_hash"], json!("0"));
    }
}
