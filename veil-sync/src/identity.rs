//! Group identity derivation.
//!
//! Both ends of a direct chat must land on the same encryption group without
//! talking to each other, so the group id is built from the two user ids in a
//! fixed order. Group-like peers already have a shared id.

use std::cmp::Ordering;

use crate::model::{Peer, PeerKind};

/// Separator between the two user ids of a direct group id.
pub const DIRECT_SEPARATOR: char = '_';

/// Canonical group id binding `local_id` and `peer` to one encryption group.
pub fn derive_group_id(local_id: &str, peer: &Peer) -> String {
    match peer.kind {
        PeerKind::Direct                    => direct_group_id(local_id, &peer.id),
        PeerKind::Group | PeerKind::Channel => peer.id.clone(),
    }
}

/// `"<smaller>_<larger>"` for two user ids, compared as integers.
pub fn direct_group_id(a: &str, b: &str) -> String {
    let (lo, hi) = match compare_ids(a, b) {
        Ordering::Greater => (b, a),
        _                 => (a, b),
    };
    format!("{lo}{DIRECT_SEPARATOR}{hi}")
}

// Transport ids are decimal integers. Anything else is compared as text so the
// result is still the same on both sides.
fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<i128>(), b.parse::<i128>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _              => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_id_is_ordered() {
        assert_eq!(derive_group_id("100", &Peer::direct("200", "bob")), "100_200");
        assert_eq!(derive_group_id("200", &Peer::direct("100", "alice")), "100_200");
    }

    #[test]
    fn direct_id_is_symmetric() {
        let pairs = [("1", "2"), ("9", "10"), ("123456789012", "98765"), ("5", "5")];
        for (a, b) in pairs {
            assert_eq!(
                derive_group_id(a, &Peer::direct(b, "")),
                derive_group_id(b, &Peer::direct(a, "")),
            );
        }
    }

    #[test]
    fn numeric_not_lexicographic() {
        assert_eq!(direct_group_id("10", "9"), "9_10");
    }

    #[test]
    fn group_ids_pass_through() {
        let group = Peer::new("777", PeerKind::Group, "team");
        let channel = Peer::new("888", PeerKind::Channel, "news");
        assert_eq!(derive_group_id("100", &group), "777");
        assert_eq!(derive_group_id("100", &channel), "888");
    }

    #[test]
    fn stable_across_calls() {
        let peer = Peer::direct("42", "x");
        assert_eq!(derive_group_id("7", &peer), derive_group_id("7", &peer));
    }
}
