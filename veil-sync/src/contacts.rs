//! Contact listing and key-package probing.

use serde_json::json;
use veil_client::RpcTransport;

use crate::model::{Peer, Resolved};
use crate::overlay::Encryption;
use crate::raw::{RawContacts, RawUser};
use crate::{Session, SyncError, Synchronizer};

impl<T: RpcTransport, E: Encryption> Synchronizer<T, E> {
    /// Fetch the contact list as direct peers, sorted by display name.
    ///
    /// Pictures are best-effort; `has_valid_key_package` is left unset until
    /// [`Synchronizer::probe_key_package`] runs.
    pub async fn list_contacts(&self, session: &Session) -> Result<Vec<Peer>, SyncError> {
        self.check_session(session)?;
        let raw: RawContacts = self.client().invoke_as("contacts.getContacts", &json!({ "hash": 0 })).await?;
        let users = match raw {
            RawContacts::Contacts { users } => users,
            RawContacts::NotModified        => return Ok(vec![]),
        };

        let mut contacts = Vec::with_capacity(users.len());
        for user in users.iter().filter_map(RawUser::data) {
            let mut peer = Peer::direct(user.id.as_str(), user.full_name());
            peer.access_hash = user.access_hash.as_ref().map(|h| h.0.clone());
            peer.photo_id    = user.photo_id().map(str::to_string);
            peer.picture     = self.fetch_picture(&peer).await;
            contacts.push(peer);
        }
        contacts.sort_by(|a, b| a.display_name.cmp(&b.display_name));

        self.check_session(session)?;
        Ok(contacts)
    }

    /// Whether `peer` has published a valid key package.
    pub async fn probe_key_package(&self, peer: &Peer) -> Resolved<bool> {
        self.overlay().probe_key_package(peer).await
    }

    /// Probe every contact and return them with `has_valid_key_package` set.
    pub async fn resolve_key_packages(&self, contacts: Vec<Peer>) -> Vec<Peer> {
        let mut resolved = Vec::with_capacity(contacts.len());
        for peer in contacts {
            let valid = self.probe_key_package(&peer).await.into_inner();
            resolved.push(peer.with_key_package(valid));
        }
        resolved
    }
}
