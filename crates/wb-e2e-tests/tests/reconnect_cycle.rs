//! Dynamic plug/unplug of the CAN adapter: the supervisor must rebuild the
//! whole session on every appearance and clear it on every loss.

mod helpers;

use std::time::Duration;

use helpers::TestHarness;

#[tokio::test(start_paused = true)]
async fn session_follows_device_lifecycle() {
    let harness = TestHarness::new();
    harness.start().await;

    // Starting disconnected: no session.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!harness.runtime.session_active().await);
    assert!(harness.runtime.session_stats().await.is_none());

    // Device appears: full session.
    harness.connect().await;
    let stats = harness.runtime.session_stats().await.unwrap();
    assert_eq!(stats.node_states, 4);
    assert_eq!(stats.mock_nodes, 3);
    assert_eq!(stats.assemblies, 1);
    assert!(stats.tasks > 0);

    // Device disappears: everything cleared.
    harness.disconnect().await;
    assert!(harness.runtime.session_stats().await.is_none());
    assert!(harness.runtime.node_state("temp_1").await.is_none());
    assert!(harness.runtime.kettle("kettle_1").await.is_none());

    // Re-appearance repeats startup cleanly.
    harness.connect().await;
    let stats_again = harness.runtime.session_stats().await.unwrap();
    assert_eq!(stats_again, stats);

    harness.runtime.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn repeated_cycles_stay_clean() {
    let harness = TestHarness::new();
    harness.start().await;

    for _ in 0..3 {
        harness.connect().await;
        assert!(harness.runtime.session_active().await);
        harness.disconnect().await;
        assert!(!harness.runtime.session_active().await);
    }

    harness.runtime.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stop_tears_down_active_session() {
    let harness = TestHarness::new();
    harness.start().await;
    harness.connect().await;

    harness.runtime.stop().await.unwrap();
    assert!(!harness.runtime.session_active().await);
}
