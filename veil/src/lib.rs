//! # veil — end-to-end encryption over an unencrypted chat transport
//!
//! `veil` wires two focused sub-crates together:
//!
//! | Sub-crate     | Role                                                        |
//! |---------------|-------------------------------------------------------------|
//! | `veil-client` | RPC client: flood-wait sleeps, DC redirects, keyed store    |
//! | `veil-sync`   | Group ids, change hashing, encryption overlay, synchronizer |
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use veil::client::{Client, Config, RpcTransport};
//! use veil::sync::{Encryption, Synchronizer, SyncConfig};
//!
//! async fn run<T: RpcTransport, E: Encryption>(transport: T, crypto: E)
//!     -> Result<(), Box<dyn std::error::Error>>
//! {
//!     let client = Client::new(transport, Config::default());
//!     let sync   = Synchronizer::new(client, crypto, SyncConfig::default());
//!
//!     let Some(session) = sync.init().await else {
//!         println!("not signed in");
//!         return Ok(());
//!     };
//!     for dialog in sync.list_dialogs(&session).await? {
//!         println!("{}: {}", dialog.peer.display_name, dialog.top_message.text);
//!     }
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Re-export of [`veil_client`] — RPC client, retry policies, keyed stores.
pub use veil_client as client;

/// Re-export of [`veil_sync`] — overlay, synchronizer, login, poller.
pub use veil_sync as sync;
