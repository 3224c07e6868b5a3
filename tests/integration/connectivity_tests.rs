//! Integration tests for the reconnect → restart escalation ladder and the
//! publish path, driven through the public `ConnectivityManager` API with
//! mock link / session / system adapters.

use std::panic::{catch_unwind, AssertUnwindSafe};

use airnode::config::NodeConfig;
use airnode::connectivity::{ConnectionState, ConnectivityManager, FailedLayer, Recovery};

use super::mock_hw::{MockDelay, MockLink, MockSession, MockSystem, RESTART_PANIC};

type Manager = ConnectivityManager<MockLink, MockSession, MockDelay, MockSystem>;

fn manager(link: MockLink, session: MockSession) -> (Manager, MockDelay) {
    let delay = MockDelay::default();
    let m = ConnectivityManager::new(
        link,
        session,
        delay.clone(),
        MockSystem,
        &NodeConfig::default(),
        0x00ab_12cd,
    );
    (m, delay)
}

fn restarted(f: impl FnOnce()) -> bool {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => false,
        Err(payload) => {
            let msg = payload
                .downcast_ref::<String>()
                .map(String::as_str)
                .or_else(|| payload.downcast_ref::<&str>().copied())
                .unwrap_or_default();
            assert_eq!(msg, RESTART_PANIC, "unexpected panic");
            true
        }
    }
}

// ── Publish gating ───────────────────────────────────────────

#[test]
fn connected_round_publishes_exactly_once() {
    let link = MockLink::up();
    let session = MockSession::for_link(&link, true);
    let (mut m, delay) = manager(link, session);

    assert_eq!(m.state(), ConnectionState::Connected);
    m.publish_state(r#"{"rco2":412}"#).unwrap();

    let publishes = m.session().state_publishes();
    assert_eq!(publishes.len(), 1);
    assert_eq!(
        publishes[0].topic,
        "homeassistant/sensor/air_gradient_ab12cd/state"
    );
    assert_eq!(delay.total_ms.get(), 0, "no backoff when already connected");
}

#[test]
fn no_publish_while_link_is_down() {
    let link = MockLink::down();
    let session = MockSession::for_link(&link, true);
    let (mut m, _) = manager(link, session);

    assert!(restarted(|| {
        let _ = m.publish_state("{}");
    }));
    assert!(m.session().published.is_empty());
}

#[test]
fn no_publish_while_session_is_down() {
    let link = MockLink::up();
    let session = MockSession::for_link(&link, false);
    let (mut m, _) = manager(link, session);

    assert!(restarted(|| {
        let _ = m.publish_state("{}");
    }));
    assert!(m.session().published.is_empty());
    assert_eq!(m.session().connects, 3);
}

#[test]
fn publish_after_recovery_happens_only_once_connected() {
    let link = MockLink::down().healing_on(2);
    let session = MockSession::for_link(&link, false).healing_on(1);
    let (mut m, delay) = manager(link, session);

    m.publish_state(r#"{"pm02":7}"#).unwrap();

    let publishes = m.session().state_publishes();
    assert_eq!(publishes.len(), 1);
    assert!(publishes[0].link_up && publishes[0].connected);
    // Two WiFi backoffs and one MQTT backoff.
    assert_eq!(delay.total_ms.get(), 3 * 5_000);
}

#[test]
fn session_lost_during_publish_is_recovered_and_retried() {
    let link = MockLink::up();
    let session = MockSession::for_link(&link, true)
        .healing_on(1)
        .dropping_publishes(1);
    let (mut m, delay) = manager(link, session);

    m.publish_state(r#"{"atmp":21.5}"#).unwrap();

    assert_eq!(m.state(), ConnectionState::Connected);
    let session = m.session();
    assert_eq!(session.connects, 1);
    let publishes = session.state_publishes();
    assert_eq!(publishes.len(), 1);
    assert!(publishes[0].link_up && publishes[0].connected);
    assert_eq!(delay.total_ms.get(), 5_000);
}

#[test]
fn publish_failure_with_unrecoverable_session_restarts() {
    let link = MockLink::up();
    let session = MockSession::for_link(&link, true).dropping_publishes(1);
    let (mut m, _) = manager(link, session);

    assert!(restarted(|| {
        let _ = m.publish_state("{}");
    }));
    assert_eq!(m.session().connects, 3);
    assert!(m.session().published.is_empty());
}

// ── Escalation ladder ────────────────────────────────────────

#[test]
fn wifi_ceiling_with_healthy_session_still_restarts() {
    let link = MockLink::down();
    let session = MockSession::for_link(&link, true);
    let (mut m, delay) = manager(link, session);

    assert!(restarted(|| m.ensure_connected()));
    assert_eq!(m.link().reconnects, 3);
    assert_eq!(m.session().connects, 0, "session is not retried over a dead link");
    // Three backoffs plus the pre-restart wait.
    assert_eq!(delay.total_ms.get(), 3 * 5_000 + 5_000);
}

#[test]
fn recover_reports_the_failed_layer() {
    let link = MockLink::down();
    let session = MockSession::for_link(&link, false);
    let (mut m, _) = manager(link, session);
    assert_eq!(m.recover(), Recovery::Exhausted(FailedLayer::Both));

    let link = MockLink::up();
    let session = MockSession::for_link(&link, false);
    let (mut m, _) = manager(link, session);
    assert_eq!(m.recover(), Recovery::Exhausted(FailedLayer::Session));
}

#[test]
fn link_recovered_then_session_recovered() {
    let link = MockLink::down().healing_on(3);
    let session = MockSession::for_link(&link, false).healing_on(3);
    let (mut m, _) = manager(link, session);

    assert_eq!(
        m.recover(),
        Recovery::Restored {
            link_attempts: 3,
            session_attempts: 3
        }
    );
    assert_eq!(m.state(), ConnectionState::Connected);
}

#[test]
fn custom_retry_budget_is_honoured() {
    let mut config = NodeConfig::default();
    config.retry.link_attempts = 5;
    config.retry.backoff_ms = 100;
    let link = MockLink::down();
    let session = MockSession::for_link(&link, false);
    let delay = MockDelay::default();
    let mut m = ConnectivityManager::new(link, session, delay.clone(), MockSystem, &config, 1);

    assert_eq!(m.recover(), Recovery::Exhausted(FailedLayer::Both));
    assert_eq!(m.link().reconnects, 5);
    assert_eq!(delay.total_ms.get(), 500);
}

// ── Inbound ──────────────────────────────────────────────────

#[test]
fn catalog_reset_message_restarts() {
    let link = MockLink::up();
    let mut session = MockSession::for_link(&link, true);
    session.inbound.push_back(airnode::app::ports::InboundMessage {
        topic: "homeassistant/status".into(),
        payload: b"online".to_vec(),
    });
    let (mut m, _) = manager(link, session);

    assert!(restarted(|| {
        m.process_inbound();
    }));
}
