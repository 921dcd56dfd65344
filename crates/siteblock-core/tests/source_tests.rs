//! Integration tests for command delivery into a running agent

use siteblock_core::clock::ManualClock;
use siteblock_core::registry::MemoryStore;
use siteblock_core::rules::{MemoryInstaller, RuleTemplate};
use siteblock_core::source::{command_channel, send_command, write_command_file, FilePoller, SocketListener};
use siteblock_core::{Agent, Command, CommandOutcome, Registry, RuleSynchronizer};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

const NOW: i64 = 1_700_000_000;

fn agent(installer: &MemoryInstaller, store: &MemoryStore) -> Agent {
    let registry = Registry::open(Box::new(store.clone()), 1000).unwrap();
    let rules = RuleSynchronizer::new(Box::new(installer.clone()), RuleTemplate::default());
    Agent::builder(registry, rules)
        .clock(Arc::new(ManualClock::new(NOW)))
        .build()
}

#[tokio::test]
async fn test_socket_end_to_end() {
    let installer = MemoryInstaller::new();
    let store = MemoryStore::new();

    let listener = SocketListener::bind("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();

    let (tx, rx) = command_channel();
    tokio::spawn(listener.run(tx));

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(agent(&installer, &store).run(rx, async {
        let _ = stop_rx.await;
    }));

    let block = Command::block(["example.com"], 1, NOW + 3600, 100.0);
    assert_eq!(send_command(addr, &block).await.unwrap(), Ok(CommandOutcome::Executed));
    assert_eq!(installer.len(), 2);

    assert_eq!(send_command(addr, &block).await.unwrap(), Ok(CommandOutcome::Stale));

    let bogus = Command::block(["not a site"], 2, NOW + 60, 101.0);
    assert_eq!(send_command(addr, &bogus).await.unwrap(), Ok(CommandOutcome::Rejected));

    let unblock = Command::unblock(1, 102.0);
    assert_eq!(send_command(addr, &unblock).await.unwrap(), Ok(CommandOutcome::Executed));
    assert!(installer.is_empty());
    assert!(store.snapshot().unwrap().blocks.is_empty());

    stop_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_command_file_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("block-commands.json");
    let installer = MemoryInstaller::new();
    let store = MemoryStore::new();

    let (tx, rx) = command_channel();
    tokio::spawn(
        FilePoller::new(&path)
            .with_interval(Duration::from_millis(20))
            .run(tx),
    );

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(agent(&installer, &store).run(rx, async {
        let _ = stop_rx.await;
    }));

    write_command_file(&path, &Command::block(["example.com"], 1, NOW + 3600, 100.0)).unwrap();
    wait_for(|| installer.len() == 2).await;

    // Re-read many times, executed once
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(installer.ids(), vec![1000, 1001]);

    write_command_file(&path, &Command::unblock(1, 101.0)).unwrap();
    wait_for(|| installer.is_empty()).await;
    assert_eq!(store.snapshot().unwrap().last_command_timestamp, 101.0);

    stop_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..250 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time");
}
