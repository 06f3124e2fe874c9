mod common;

use std::time::Duration;

use common::*;
use serde_json::{Value, json};
use tokio::time::Instant;
use veil_sync::{MessagePoller, Peer, PollConfig, PollEvent, SyncError, item_hash};

fn page(ids: &[i64]) -> Value {
    let messages: Vec<Value> = ids.iter()
        .map(|&id| text_message(id, peer_user(200), 200, &format!("m{id}"), id * 10))
        .collect();
    json!({ "_": "messages.messages", "messages": messages, "users": [] })
}

fn texts(event: Option<PollEvent>) -> Vec<String> {
    match event {
        Some(PollEvent::Messages(msgs)) => msgs.into_iter().map(|m| m.text).collect(),
        other => panic!("expected messages, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn emits_changes_oldest_first() {
    let backend = signed_in_backend("100");
    backend.reply("messages.getHistory", page(&[2, 1]));
    let sync = synchronizer(&backend, &FakeCrypto::new());
    let session = sync.init().await.unwrap();

    let mut poller = MessagePoller::spawn(sync, session, Peer::direct("200", "Bob"), PollConfig::default());
    let started = Instant::now();
    assert_eq!(texts(poller.next().await), ["m1", "m2"]);

    backend.reply("messages.getHistory", page(&[3, 2, 1]));
    assert_eq!(texts(poller.next().await), ["m1", "m2", "m3"]);
    assert!(started.elapsed() >= Duration::from_secs(1));

    let calls = backend.calls_to("messages.getHistory");
    assert_eq!(calls[0].params["hash"], 0);
    assert_eq!(calls[1].params["hash"], item_hash([2, 1]));
    assert_eq!(calls[0].params["limit"], 25);

    poller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn unchanged_polls_stay_quiet() {
    let backend = signed_in_backend("100");
    backend.reply("messages.getHistory", page(&[1]));
    let sync = synchronizer(&backend, &FakeCrypto::new());
    let session = sync.init().await.unwrap();

    let mut poller = MessagePoller::spawn(sync, session, Peer::direct("200", "Bob"), PollConfig::default());
    assert_eq!(texts(poller.next().await), ["m1"]);

    tokio::time::sleep(Duration::from_millis(4500)).await;
    assert_eq!(backend.calls_to("messages.getHistory").len(), 5);

    poller.stop();
    assert!(poller.next().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn failures_are_reported_and_polling_continues() {
    let backend = signed_in_backend("100");
    backend.fail_once("messages.getHistory", 500, "INTERNAL");
    backend.reply("messages.getHistory", page(&[1]));
    let sync = synchronizer(&backend, &FakeCrypto::new());
    let session = sync.init().await.unwrap();

    let mut poller = MessagePoller::spawn(sync, session, Peer::direct("200", "Bob"), PollConfig::default());

    assert!(matches!(poller.next().await, Some(PollEvent::Failed(SyncError::Invocation(e))) if e.is("INTERNAL")));
    assert_eq!(texts(poller.next().await), ["m1"]);
}

#[tokio::test(start_paused = true)]
async fn destroyed_session_ends_the_poll() {
    let backend = signed_in_backend("100");
    backend.reply("messages.getHistory", page(&[1]));
    let sync = synchronizer(&backend, &FakeCrypto::new());
    let session = sync.init().await.unwrap();

    let mut poller = MessagePoller::spawn(sync.clone(), session, Peer::direct("200", "Bob"), PollConfig::default());
    assert_eq!(texts(poller.next().await), ["m1"]);

    sync.destroy().await;

    assert!(matches!(poller.next().await, Some(PollEvent::Failed(SyncError::SessionClosed))));
    assert!(poller.next().await.is_none());
}
