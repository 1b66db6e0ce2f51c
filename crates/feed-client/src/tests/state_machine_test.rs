//! Connection state machine tests
//!
//! All of these run on a paused clock, so timer assertions are exact.

use super::common::{attach, frame, settle, CountingSource, Recorder, Script, ScriptedConnector};
use crate::{ConnectionState, FeedError, RealtimeFeed, RecencyView};
use feed_types::EventKind;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

const BACKOFF_SCHEDULE_MS: [u128; 10] = [
    2_000, 4_000, 8_000, 16_000, 30_000, 30_000, 30_000, 30_000, 30_000, 30_000,
];

#[tokio::test(start_paused = true)]
async fn test_backoff_schedule_and_retry_ceiling() {
    let connector = ScriptedConnector::always_failing();
    let recorder = Recorder::new();

    let feed = attach(&recorder, RealtimeFeed::builder())
        .push_arc(connector.clone())
        .start()
        .unwrap();

    sleep(Duration::from_secs(300)).await;

    // First connect plus ten retries
    assert_eq!(connector.attempt_count(), 11);
    assert_eq!(connector.gaps_ms(), BACKOFF_SCHEDULE_MS.to_vec());

    let status = feed.status();
    assert!(status.push_exhausted);
    assert!(!status.polling);
    assert_eq!(status.connection, ConnectionState::Disconnected);
    assert_eq!(recorder.disconnected(), 11);
    assert_eq!(recorder.connected(), 0);

    // Push is abandoned for good
    sleep(Duration::from_secs(600)).await;
    assert_eq!(connector.attempt_count(), 11);
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_leaves_poller_running() {
    let connector = ScriptedConnector::always_failing();
    let source = CountingSource::new();
    let recorder = Recorder::new();

    let feed = attach(&recorder, RealtimeFeed::builder())
        .push_arc(connector.clone())
        .pull_arc(source.clone())
        .start()
        .unwrap();

    settle().await;

    // The first connect error starts polling while push retries
    let status = feed.status();
    assert_eq!(status.connection, ConnectionState::Backoff);
    assert_eq!(status.attempt, 1);
    assert!(status.polling);

    sleep(Duration::from_secs(300)).await;

    let status = feed.status();
    assert!(status.push_exhausted);
    assert!(status.polling);
    assert_eq!(connector.attempt_count(), 11);

    // Fixed interval, never restarted by the fallback
    assert!(source.fetch_count() >= 30);
    assert!(source.gaps_ms().iter().all(|gap| *gap == 10_000));
    assert_eq!(recorder.count(EventKind::StatsUpdate), source.fetch_count());

    feed.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_pull_only_polls_on_fixed_interval() {
    let connector = ScriptedConnector::always_failing();
    let source = CountingSource::new();
    let recorder = Recorder::new();

    let feed = attach(&recorder, RealtimeFeed::builder())
        .use_push(false)
        .poll_interval(Duration::from_secs(10))
        .push_arc(connector.clone())
        .pull_arc(source.clone())
        .start()
        .unwrap();

    sleep(Duration::from_secs(35)).await;

    assert_eq!(connector.attempt_count(), 0);
    assert_eq!(source.fetch_count(), 4);
    assert_eq!(source.gaps_ms(), vec![10_000, 10_000, 10_000]);

    let stats = recorder.payloads(EventKind::StatsUpdate);
    assert_eq!(stats.len(), 4);
    assert_eq!(stats[3].get("total_blocks"), Some(&json!(4)));
    assert!(feed.status().polling);
}

#[tokio::test(start_paused = true)]
async fn test_no_safety_net_after_first_connect() {
    let connector = ScriptedConnector::new(vec![Script::Close(Vec::new())]);
    let source = CountingSource::new();
    let recorder = Recorder::new();

    let feed = attach(&recorder, RealtimeFeed::builder())
        .push_arc(connector.clone())
        .pull_arc(source.clone())
        .start()
        .unwrap();

    settle().await;
    assert_eq!(recorder.connected(), 1);
    assert_eq!(recorder.disconnected(), 1);

    // Retries fail, but push once worked so polling waits for exhaustion
    sleep(Duration::from_secs(20)).await;
    assert!(!feed.status().polling);
    assert_eq!(source.fetch_count(), 0);

    sleep(Duration::from_secs(300)).await;
    let status = feed.status();
    assert!(status.push_exhausted);
    assert!(status.polling);
    assert!(source.fetch_count() >= 1);
    assert_eq!(connector.attempt_count(), 11);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_cancels_reconnect_and_polling() {
    let connector = ScriptedConnector::always_failing();
    let source = CountingSource::new();
    let recorder = Recorder::new();

    let feed = attach(&recorder, RealtimeFeed::builder())
        .push_arc(connector.clone())
        .pull_arc(source.clone())
        .start()
        .unwrap();

    settle().await;
    let status = feed.status();
    assert_eq!(status.connection, ConnectionState::Backoff);
    assert!(status.polling);

    feed.disconnect().await;

    let attempts = connector.attempt_count();
    let fetches = source.fetch_count();
    let delivered = recorder.total();
    let disconnects = recorder.disconnected();

    sleep(Duration::from_secs(600)).await;

    assert_eq!(connector.attempt_count(), attempts);
    assert_eq!(source.fetch_count(), fetches);
    assert_eq!(recorder.total(), delivered);
    assert_eq!(recorder.disconnected(), disconnects);

    let status = feed.status();
    assert!(status.torn_down);
    assert!(!status.polling);
    assert_eq!(status.connection, ConnectionState::Disconnected);
    assert!(!feed.is_active());

    // Second call is a no-op
    feed.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_tears_down() {
    let connector = ScriptedConnector::always_failing();

    let feed = RealtimeFeed::builder()
        .push_arc(connector.clone())
        .start()
        .unwrap();
    let status = feed.subscribe_status();

    settle().await;
    drop(feed);

    sleep(Duration::from_secs(300)).await;
    assert_eq!(connector.attempt_count(), 1);
    assert!(status.borrow().torn_down);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_and_unknown_frames_are_dropped() {
    let connector = ScriptedConnector::new(vec![Script::Hold(vec![
        frame(EventKind::Transaction, json!({"value": 1.5})),
        frame(EventKind::Transaction, json!({"hash": "0x01"})),
        crate::PushFrame {
            event: "pending_transaction".to_string(),
            data: json!({"hash": "0x02"}),
        },
        frame(EventKind::Block, json!({"number": 5})),
    ])]);
    let recorder = Recorder::new();

    let feed = attach(&recorder, RealtimeFeed::builder())
        .push_arc(connector.clone())
        .start()
        .unwrap();

    settle().await;

    let txs = recorder.payloads(EventKind::Transaction);
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].get("hash"), Some(&json!("0x01")));
    assert_eq!(recorder.count(EventKind::Block), 1);

    // A bad frame does not cost the connection
    assert_eq!(feed.state(), ConnectionState::Connected);
    assert_eq!(connector.attempt_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stats_with_float_counts_are_delivered() {
    let connector = ScriptedConnector::new(vec![Script::Hold(vec![
        frame(EventKind::StatsUpdate, json!({"total_blocks": 1200.0})),
        frame(EventKind::StatsUpdate, json!({"total_transactions": 18446744073709551616.0})),
    ])]);
    let recorder = Recorder::new();

    let _feed = attach(&recorder, RealtimeFeed::builder())
        .push_arc(connector.clone())
        .start()
        .unwrap();

    settle().await;

    let stats = recorder.payloads(EventKind::StatsUpdate);
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].get("total_blocks"), Some(&json!(1200.0)));

    let mut view = RecencyView::new();
    assert!(view.apply_stats(&stats[0]));
    assert!(view.apply_stats(&stats[1]));
}

#[tokio::test(start_paused = true)]
async fn test_handler_panic_keeps_connection() {
    let connector = ScriptedConnector::new(vec![Script::Hold(vec![
        frame(EventKind::Block, json!({"number": 1})),
        frame(EventKind::Block, json!({"number": 2})),
    ])]);
    let calls = Arc::new(Mutex::new(Vec::new()));
    let seen = calls.clone();

    let feed = RealtimeFeed::builder()
        .push_arc(connector.clone())
        .on_block(move |block| {
            let number = feed_types::block_number(block).unwrap_or_default();
            seen.lock().push(number);
            if number == 1 {
                panic!("row template missing");
            }
            Ok(())
        })
        .start()
        .unwrap();

    settle().await;

    assert_eq!(*calls.lock(), vec![1, 2]);
    assert_eq!(feed.state(), ConnectionState::Connected);
    assert_eq!(connector.attempt_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_alias_duplicates_collapse_in_view() {
    let connector = ScriptedConnector::new(vec![Script::Hold(vec![
        frame(EventKind::Block, json!({"number": 100})),
        frame(EventKind::Block, json!({"height": 100})),
        frame(EventKind::Block, json!({"block_number": "101"})),
    ])]);
    let view = Arc::new(Mutex::new(RecencyView::new()));
    let sink = view.clone();

    let _feed = RealtimeFeed::builder()
        .push_arc(connector)
        .on_block(move |block| {
            sink.lock().apply_block(block);
            Ok(())
        })
        .start()
        .unwrap();

    settle().await;
    assert_eq!(view.lock().block_numbers(), vec![101, 100]);
}

#[tokio::test(start_paused = true)]
async fn test_push_and_poll_overlap() {
    let connector = ScriptedConnector::new(vec![Script::Fail, Script::Hold(Vec::new())]);
    let source = CountingSource::new();
    let recorder = Recorder::new();

    let feed = attach(&recorder, RealtimeFeed::builder())
        .push_arc(connector.clone())
        .pull_arc(source.clone())
        .start()
        .unwrap();

    sleep(Duration::from_secs(25)).await;

    // The safety-net poller keeps running after push comes up
    let status = feed.status();
    assert_eq!(status.connection, ConnectionState::Connected);
    assert_eq!(status.attempt, 0);
    assert!(status.polling);
    assert_eq!(source.fetch_count(), 3);

    connector.send(frame(EventKind::StatsUpdate, json!({"total_blocks": 999})));
    settle().await;

    let stats = recorder.payloads(EventKind::StatsUpdate);
    assert_eq!(stats.len(), 4);
    assert_eq!(stats[3].get("total_blocks"), Some(&json!(999)));
}

#[tokio::test(start_paused = true)]
async fn test_successful_reconnect_resets_attempts() {
    let connector = ScriptedConnector::new(vec![
        Script::Hold(Vec::new()),
        Script::Fail,
        Script::Hold(Vec::new()),
    ]);
    let recorder = Recorder::new();

    let feed = attach(&recorder, RealtimeFeed::builder())
        .push_arc(connector.clone())
        .start()
        .unwrap();

    settle().await;
    assert_eq!(feed.state(), ConnectionState::Connected);

    connector.drop_connections();
    settle().await;
    assert_eq!(feed.status().attempt, 1);

    sleep(Duration::from_secs(10)).await;
    assert_eq!(feed.state(), ConnectionState::Connected);
    assert_eq!(feed.status().attempt, 0);
    assert_eq!(recorder.connected(), 2);
    assert_eq!(connector.attempt_count(), 3);
    assert_eq!(connector.gaps_ms().last(), Some(&4_000));

    // Counting starts over
    connector.drop_connections();
    settle().await;
    let status = feed.status();
    assert_eq!(status.connection, ConnectionState::Backoff);
    assert_eq!(status.attempt, 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_timeout_counts_as_failure() {
    let connector = ScriptedConnector::new(vec![Script::Hang, Script::Hold(Vec::new())]);

    let feed = RealtimeFeed::builder()
        .connect_timeout(Duration::from_secs(5))
        .push_arc(connector.clone())
        .start()
        .unwrap();

    sleep(Duration::from_secs(6)).await;
    assert_eq!(feed.state(), ConnectionState::Backoff);
    assert_eq!(connector.attempt_count(), 1);

    // Timeout at 5s, retry 2s later
    sleep(Duration::from_secs(2)).await;
    assert_eq!(feed.state(), ConnectionState::Connected);
    assert_eq!(connector.gaps_ms(), vec![7_000]);
}

#[tokio::test(start_paused = true)]
async fn test_stats_refresh_runs_next_to_push() {
    let connector = ScriptedConnector::new(vec![Script::Hold(Vec::new())]);
    let source = CountingSource::new();
    let recorder = Recorder::new();

    let feed = attach(&recorder, RealtimeFeed::builder())
        .stats_refresh_interval(Duration::from_secs(60))
        .push_arc(connector.clone())
        .pull_arc(source.clone())
        .start()
        .unwrap();

    sleep(Duration::from_secs(125)).await;

    let status = feed.status();
    assert!(status.stats_refresh);
    assert!(!status.polling);
    assert_eq!(source.fetch_count(), 3);
    assert_eq!(recorder.count(EventKind::StatsUpdate), 3);

    // Once push is abandoned the fallback poller replaces the refresh
    connector.drop_connections();
    sleep(Duration::from_secs(300)).await;

    let status = feed.status();
    assert!(status.push_exhausted);
    assert!(status.polling);
    assert!(!status.stats_refresh);
}

#[tokio::test(start_paused = true)]
async fn test_inert_when_both_transports_disabled() {
    let connector = ScriptedConnector::always_failing();
    let source = CountingSource::new();
    let recorder = Recorder::new();

    let feed = attach(&recorder, RealtimeFeed::builder())
        .use_push(false)
        .use_pull(false)
        .push_arc(connector.clone())
        .pull_arc(source.clone())
        .start()
        .unwrap();

    sleep(Duration::from_secs(60)).await;

    assert_eq!(connector.attempt_count(), 0);
    assert_eq!(source.fetch_count(), 0);
    assert_eq!(recorder.total(), 0);
    assert_eq!(feed.state(), ConnectionState::Disconnected);
    assert!(feed.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_polling_skipped_without_stats_handler() {
    let source = CountingSource::new();

    let feed = RealtimeFeed::builder()
        .use_push(false)
        .pull_arc(source.clone())
        .on_block(|_| Ok(()))
        .start()
        .unwrap();

    sleep(Duration::from_secs(30)).await;
    assert_eq!(source.fetch_count(), 0);
    assert!(!feed.status().polling);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let result = RealtimeFeed::builder().max_reconnect_attempts(0).start();
    assert!(matches!(result, Err(FeedError::InvalidConfig(_))));

    let result = RealtimeFeed::builder().connect_timeout(Duration::ZERO).start();
    assert!(matches!(result, Err(FeedError::InvalidConfig(_))));
}
