//! Connectivity manager tests: bounded association, broker session and
//! the fast path.

use crate::mock_hw::{HwCall, MockPlatform, MockStorage, configured_storage};

use runlimiter::app::connectivity::ConnectivityManager;
use runlimiter::app::console::SerialConsole;
use runlimiter::app::ports::LinkStatus;
use runlimiter::app::store::ConfigStore;
use runlimiter::config::{
    BROKER_RETRY_DELAY_MS, Field, WIFI_ATTEMPT_DELAY_MS, WIFI_CONNECTION_ATTEMPTS,
};

fn loaded_store() -> ConfigStore<MockStorage> {
    let mut store = ConfigStore::new(configured_storage("60"), 5);
    store.load().unwrap();
    store
}

#[test]
fn incomplete_settings_never_touch_the_network() {
    let mut hw = MockPlatform::online();
    let mut store = ConfigStore::new(MockStorage::erased(), 5);
    let mut console = SerialConsole::new();
    let mut conn = ConnectivityManager::new();

    assert!(!conn.ensure_connected(&mut hw, &mut store, &mut console));
    assert!(hw.calls.is_empty());
}

#[test]
fn connects_link_then_session() {
    let mut hw = MockPlatform::online();
    let mut store = loaded_store();
    let mut console = SerialConsole::new();
    let mut conn = ConnectivityManager::new();

    assert!(conn.ensure_connected(&mut hw, &mut store, &mut console));
    assert_eq!(
        hw.calls,
        vec![
            HwCall::Associate {
                ssid: "HomeNet".into()
            },
            HwCall::LinkLed(true),
            HwCall::Connect {
                client_id: store.settings().client_id.as_str().into()
            },
            HwCall::Subscribe("shop/saw/command".into()),
        ]
    );
}

#[test]
fn fast_path_does_nothing_when_up() {
    let mut hw = MockPlatform::online();
    let mut store = loaded_store();
    let mut console = SerialConsole::new();
    let mut conn = ConnectivityManager::new();
    assert!(conn.ensure_connected(&mut hw, &mut store, &mut console));
    hw.clear_calls();

    assert!(conn.ensure_connected(&mut hw, &mut store, &mut console));
    assert!(hw.calls.is_empty());
}

#[test]
fn association_gives_up_after_bounded_attempts() {
    let mut hw = MockPlatform::offline();
    let mut store = loaded_store();
    let mut console = SerialConsole::new();
    let mut conn = ConnectivityManager::new();

    assert!(!conn.ensure_connected(&mut hw, &mut store, &mut console));
    assert!(!conn.last_link_ok());
    assert_eq!(hw.link, LinkStatus::NoSsidAvailable);
    assert_eq!(
        hw.count(|c| *c == HwCall::Delay(WIFI_ATTEMPT_DELAY_MS)),
        WIFI_CONNECTION_ATTEMPTS as usize
    );
    assert_eq!(hw.feeds, WIFI_CONNECTION_ATTEMPTS);
    assert_eq!(hw.count(|c| matches!(c, HwCall::Connect { .. })), 0);
    assert_eq!(hw.calls.last(), Some(&HwCall::LinkLed(false)));
}

#[test]
fn serial_commands_serviced_while_associating() {
    let mut hw = MockPlatform::offline();
    let mut store = loaded_store();
    let mut console = SerialConsole::new();
    let mut conn = ConnectivityManager::new();

    hw.type_line("ssid=OtherNet");
    conn.ensure_connected(&mut hw, &mut store, &mut console);

    assert_eq!(store.settings().ssid.as_str(), "OtherNet");
}

#[test]
fn broker_refusal_keeps_link_result_and_pauses() {
    let mut hw = MockPlatform::online();
    hw.broker_up = false;
    let mut store = loaded_store();
    let mut console = SerialConsole::new();
    let mut conn = ConnectivityManager::new();

    assert!(conn.ensure_connected(&mut hw, &mut store, &mut console));
    assert_eq!(hw.calls.last(), Some(&HwCall::Delay(BROKER_RETRY_DELAY_MS)));
    assert!(!hw.session);
}

#[test]
fn credentials_sent_only_when_configured() {
    let mut hw = MockPlatform::online();
    let mut store = loaded_store();
    store.update(Field::BrokerUsername, "saw").unwrap();
    store.update(Field::BrokerPassword, "pw").unwrap();
    let mut console = SerialConsole::new();
    let mut conn = ConnectivityManager::new();

    conn.ensure_connected(&mut hw, &mut store, &mut console);
    assert_eq!(
        hw.last_credentials,
        Some((Some("saw".into()), Some("pw".into())))
    );
}

#[test]
fn session_reopened_without_reassociating() {
    let mut hw = MockPlatform::online();
    let mut store = loaded_store();
    let mut console = SerialConsole::new();
    let mut conn = ConnectivityManager::new();
    conn.ensure_connected(&mut hw, &mut store, &mut console);
    hw.session = false;
    hw.clear_calls();

    assert!(conn.ensure_connected(&mut hw, &mut store, &mut console));
    assert_eq!(hw.count(|c| matches!(c, HwCall::Associate { .. })), 0);
    assert_eq!(hw.count(|c| matches!(c, HwCall::Connect { .. })), 1);
}
