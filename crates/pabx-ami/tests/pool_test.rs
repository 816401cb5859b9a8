// tests/pool_test.rs
//! Connection pool behaviour against the simulated switch

mod common;

use common::{wait_for, AmiSimulator};
use pabx_ami::{AmiAction, AmiError, AmiPool};
use std::collections::HashSet;
use std::time::Duration;

#[tokio::test]
async fn test_initialize_connects_every_slot() {
    let sim = AmiSimulator::start().await;
    let pool = AmiPool::new(sim.config(3));

    pool.initialize().await.unwrap();

    let summary = pool.summary();
    assert!(summary.initialized);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.healthy, 3);
    let ids: Vec<usize> = summary.connections.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![0, 1, 2]);
    assert!(summary.connections.iter().all(|c| c.authenticated));
    assert_eq!(sim.sessions_for("Login").len(), 3);

    pool.disconnect().await;
}

#[tokio::test]
async fn test_initialize_is_idempotent() {
    let sim = AmiSimulator::start().await;
    let pool = AmiPool::new(sim.config(2));

    pool.initialize().await.unwrap();
    pool.initialize().await.unwrap();

    assert_eq!(pool.summary().total, 2);
    assert_eq!(sim.sessions_for("Login").len(), 2);

    pool.disconnect().await;
}

#[tokio::test]
async fn test_round_robin_visits_every_connection() {
    let sim = AmiSimulator::start().await;
    let pool = AmiPool::new(sim.config(3));
    pool.initialize().await.unwrap();

    let picks: Vec<usize> = (0..6)
        .map(|_| pool.get_next_connection().unwrap().id())
        .collect();

    let first_round: HashSet<usize> = picks[..3].iter().copied().collect();
    assert_eq!(first_round.len(), 3);
    assert_eq!(picks[..3], picks[3..]);

    pool.disconnect().await;
}

#[tokio::test]
async fn test_actions_spread_across_sessions() {
    let sim = AmiSimulator::start().await;
    let pool = AmiPool::new(sim.config(3));
    pool.initialize().await.unwrap();

    for _ in 0..3 {
        pool.send_action(AmiAction::new("CoreStatus").with_action_id())
            .await
            .unwrap();
    }

    assert!(wait_for(Duration::from_secs(2), || sim.sessions_for("CoreStatus").len() == 3).await);
    let sessions: HashSet<usize> = sim.sessions_for("CoreStatus").into_iter().collect();
    assert_eq!(sessions.len(), 3);

    pool.disconnect().await;
}

#[tokio::test]
async fn test_no_switch_means_no_healthy_connection() {
    // Grab a free port and release it so nothing is listening there
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let mut config = pabx_core::config::AmiConfig::new("127.0.0.1", port, "admin", "amp111");
    config.pool_size = 2;
    config.max_reconnect_attempts = 0;

    let pool = AmiPool::new(config);

    assert!(matches!(pool.initialize().await, Err(AmiError::NoHealthyConnection)));
    assert!(!pool.is_initialized());
    assert_eq!(pool.summary().total, 0);

    // Lazy initialization fails the same way
    let result = pool.send_action(AmiAction::ping()).await;
    assert!(matches!(result, Err(AmiError::NoHealthyConnection)));
}

#[tokio::test]
async fn test_rejected_logins_fail_initialize() {
    let sim = AmiSimulator::start().await;
    sim.reject_logins(true);
    let pool = AmiPool::new(sim.config(2));

    assert!(matches!(pool.initialize().await, Err(AmiError::NoHealthyConnection)));
    assert!(!pool.is_initialized());
}

#[tokio::test]
async fn test_send_action_initializes_lazily() {
    let sim = AmiSimulator::start().await;
    let pool = AmiPool::new(sim.config(2));
    assert!(!pool.is_initialized());

    pool.send_action(AmiAction::ping()).await.unwrap();

    assert!(pool.is_initialized());
    assert_eq!(pool.summary().healthy, 2);
    assert!(wait_for(Duration::from_secs(2), || sim.sessions_for("Ping").len() == 1).await);

    pool.disconnect().await;
}

#[tokio::test]
async fn test_events_fan_in_to_subscribers() {
    let sim = AmiSimulator::start().await;
    let pool = AmiPool::new(sim.config(2));
    pool.initialize().await.unwrap();
    let mut events = pool.subscribe();

    sim.push_event(&[
        ("Event", "Hangup"),
        ("Channel", "SIP/200-00000007"),
        ("AccountCode", "ACME"),
    ]);

    // One copy per session
    for _ in 0..2 {
        let message = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.event_name(), Some("Hangup"));
        assert_eq!(message.account_code(), Some("ACME"));
    }

    pool.disconnect().await;
}

#[tokio::test]
async fn test_responses_carry_action_id() {
    let sim = AmiSimulator::start().await;
    let pool = AmiPool::new(sim.config(2));
    pool.initialize().await.unwrap();
    let mut events = pool.subscribe();

    let action = AmiAction::hangup("PJSIP/1001-00000001", None);
    let action_id = action.action_id().unwrap().to_string();
    pool.send_action(action).await.unwrap();

    let response = loop {
        let message = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        if message.is_response() {
            break message;
        }
    };
    assert_eq!(response.action_id(), Some(action_id.as_str()));

    pool.disconnect().await;
}

#[tokio::test]
async fn test_never_exhausted_while_one_stays_healthy() {
    let sim = AmiSimulator::start().await;
    let pool = AmiPool::new(sim.config(3));
    pool.initialize().await.unwrap();

    sim.kill_session(0);

    for _ in 0..20 {
        assert!(pool.get_next_connection().is_ok());
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    pool.disconnect().await;
}

#[tokio::test]
async fn test_failed_connection_is_replaced() {
    let sim = AmiSimulator::start().await;
    let mut config = sim.config(1);
    config.max_reconnect_attempts = 1;
    config.reconnect_base_delay_ms = 200;
    let pool = AmiPool::new(config);
    pool.initialize().await.unwrap();
    assert_eq!(pool.connection(0).unwrap().generation(), 0);

    // The single retry is rejected, so the instance gives up
    sim.reject_logins(true);
    sim.kill_all();

    let replaced = wait_for(Duration::from_secs(3), || {
        pool.connection(0).map(|c| c.generation()).unwrap_or(0) >= 1
    })
    .await;
    assert!(replaced);

    sim.reject_logins(false);
    assert!(wait_for(Duration::from_secs(3), || pool.summary().healthy == 1).await);

    let conn = pool.connection(0).unwrap();
    assert_eq!(conn.id(), 0);
    assert!(conn.generation() >= 1);

    pool.disconnect().await;
}

#[tokio::test]
async fn test_health_monitor_replaces_stale_connection() {
    let sim = AmiSimulator::start().await;
    let mut config = sim.config(1);
    config.health_timeout_secs = 1;
    config.health_check_interval_secs = 1;
    config.heartbeat_interval_secs = 3600;
    let pool = AmiPool::new(config);
    pool.initialize().await.unwrap();

    let original = pool.connection(0).unwrap();
    assert_eq!(original.generation(), 0);

    let replaced = wait_for(Duration::from_secs(5), || {
        pool.connection(0).map(|c| c.generation()).unwrap_or(0) >= 1
    })
    .await;
    assert!(replaced);

    let conn = pool.connection(0).unwrap();
    assert_eq!(conn.id(), 0);
    assert!(conn.generation() > original.generation());
    // The retired instance logged off
    assert!(wait_for(Duration::from_secs(2), || !sim.sessions_for("Logoff").is_empty()).await);

    pool.disconnect().await;
}

#[tokio::test]
async fn test_health_monitor_leaves_retrying_connection_alone() {
    let sim = AmiSimulator::start().await;
    let mut config = sim.config(1);
    config.health_check_interval_secs = 1;
    config.reconnect_base_delay_ms = 10_000;
    let pool = AmiPool::new(config);
    pool.initialize().await.unwrap();

    sim.kill_all();
    let conn = pool.connection(0).unwrap();
    assert!(wait_for(Duration::from_secs(2), || conn.in_retry_cycle()).await);
    assert!(!conn.is_healthy());

    // Two monitor ticks pass while the backoff sleep is still running
    tokio::time::sleep(Duration::from_millis(2500)).await;

    let current = pool.connection(0).unwrap();
    assert_eq!(current.generation(), 0);
    assert!(current.in_retry_cycle());
    assert_eq!(sim.sessions_for("Login").len(), 1);

    pool.disconnect().await;
}

#[tokio::test]
async fn test_disconnect_closes_everything() {
    let sim = AmiSimulator::start().await;
    let pool = AmiPool::new(sim.config(3));
    pool.initialize().await.unwrap();

    pool.disconnect().await;

    assert!(!pool.is_initialized());
    assert_eq!(pool.summary().total, 0);
    assert!(wait_for(Duration::from_secs(1), || sim.sessions_for("Logoff").len() == 3).await);
    assert!(matches!(
        pool.get_next_connection(),
        Err(AmiError::NoHealthyConnection)
    ));
}
