//! Integration tests for the AppService → FSM → outputs / MQTT pipeline.
//!
//! These run on the host and drive the whole control loop against
//! [`MockPlatform`], from boot through timeout, reporting and recovery.

use crate::mock_hw::{
    HwCall, MockPlatform, MockStorage, Published, TOPIC_ROOT, boot, configured_storage, run_for,
};

use runlimiter::app::service::AppService;
use runlimiter::app::store::{ConfigStore, LoadOutcome};
use runlimiter::config::{
    BROKER_RETRY_DELAY_MS, DEFAULT_MAX_RUNTIME_SECS, FACTORY_RESET_DELAY_MS, RESET_DELAY_MS,
    Field, Settings, WIFI_ATTEMPT_DELAY_MS, WIFI_CONNECTION_ATTEMPTS,
};
use runlimiter::fsm::StateId;

fn status_topic() -> String {
    format!("{TOPIC_ROOT}status")
}

fn published(topic: &str, payload: &str, retain: bool) -> Published {
    Published {
        topic: topic.into(),
        payload: payload.into(),
        retain,
    }
}

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn boot_energizes_relay_and_announces_run_message() {
    let mut hw = MockPlatform::online();
    let app = boot(configured_storage("5"), &mut hw);

    assert_eq!(app.state(), StateId::Running);
    assert_eq!(app.deadline_ms(), 5_000);
    assert_eq!(hw.relay_writes(), vec![true]);
    assert_eq!(hw.warning_led(), Some(false));
    assert!(hw.calls.contains(&HwCall::LinkLed(true)));

    assert_eq!(
        hw.published(),
        vec![
            &published(&format!("{TOPIC_ROOT}rssi"), "-61", true),
            &published(&status_topic(), "started", true),
        ]
    );
    assert!(hw.calls.contains(&HwCall::Subscribe(format!("{TOPIC_ROOT}command"))));
    assert!(hw.calls.contains(&HwCall::FirmwareBegin));
}

#[test]
fn session_registers_retained_last_will_on_status() {
    let mut hw = MockPlatform::online();
    let _app = boot(configured_storage("5"), &mut hw);

    assert_eq!(hw.last_will, Some(published(&status_topic(), "stopped", true)));
    assert_eq!(hw.last_credentials, Some((None, None)));
}

#[test]
fn relay_comes_on_before_any_network_activity() {
    let mut hw = MockPlatform::online();
    let _app = boot(configured_storage("5"), &mut hw);

    let relay_at = hw.calls.iter().position(|c| *c == HwCall::Relay(true));
    let associate_at = hw
        .calls
        .iter()
        .position(|c| matches!(c, HwCall::Associate { .. }));
    assert!(relay_at.unwrap() < associate_at.unwrap());
}

#[test]
fn blank_storage_boots_on_defaults_without_network() {
    let mut hw = MockPlatform::online();
    let mut app = AppService::new(ConfigStore::new(MockStorage::erased(), 1));

    assert_eq!(app.boot(&mut hw), LoadOutcome::Blank);
    assert!(!app.store().is_valid());
    assert_eq!(app.store().storage().commits, 1, "defaults persisted");
    assert_eq!(app.deadline_ms(), u64::from(DEFAULT_MAX_RUNTIME_SECS) * 1000);
    assert!(hw.relay_on());
    assert_eq!(hw.count(|c| matches!(c, HwCall::Associate { .. })), 0);
    assert!(hw.published().is_empty());
    assert!(!hw.calls.contains(&HwCall::FirmwareBegin));
}

#[test]
fn stored_out_of_range_port_is_wiped_at_boot() {
    let mut hw = MockPlatform::online();
    let mut store = ConfigStore::new(configured_storage("5"), 3);
    store.load().unwrap();
    store.update(Field::BrokerPort, "70000").unwrap();
    assert!(!store.is_valid());

    let app = boot(store.storage().rebooted(), &mut hw);
    assert!(!app.store().is_valid());
    assert!(app.store().settings().ssid.is_empty(), "reset to defaults");
    assert_eq!(hw.count(|c| matches!(c, HwCall::Associate { .. })), 0);
}

// ── Timeout ───────────────────────────────────────────────────

#[test]
fn timeout_after_max_runtime_publishes_retained_status() {
    let mut hw = MockPlatform::online();
    let mut app = boot(configured_storage("5"), &mut hw);

    run_for(&mut app, &mut hw, 4_900, 100);
    assert_eq!(app.state(), StateId::Running);
    assert!(hw.relay_on());

    run_for(&mut app, &mut hw, 101, 101);
    assert_eq!(app.state(), StateId::TimedOut);
    assert!(!hw.relay_on());
    assert!(app.timeout_message_sent());
    assert_eq!(
        hw.published_to(&status_topic()).last(),
        Some(&&published(&status_topic(), "timeout", true))
    );
}

#[test]
fn relay_cut_exactly_once() {
    let mut hw = MockPlatform::online();
    let mut app = boot(configured_storage("5"), &mut hw);

    run_for(&mut app, &mut hw, 60_000, 100);

    assert_eq!(hw.relay_writes(), vec![true, false]);
    assert_eq!(app.state(), StateId::TimedOut);
    assert_eq!(
        hw.published_to(&status_topic())
            .iter()
            .filter(|p| p.payload == "timeout")
            .count(),
        1
    );
}

#[test]
fn timeout_latch_waits_for_successful_publish() {
    let mut hw = MockPlatform::online();
    let mut app = boot(configured_storage("5"), &mut hw);
    hw.publish_ok = false;

    run_for(&mut app, &mut hw, 8_000, 100);
    assert_eq!(app.state(), StateId::TimedOut);
    assert!(!app.timeout_message_sent());
    assert!(!hw.relay_on());
    assert_eq!(hw.warning_led(), Some(true), "steady until reported");
    assert_eq!(hw.count(|c| *c == HwCall::WarningLed(false)), 1, "only the boot write");

    hw.publish_ok = true;
    run_for(&mut app, &mut hw, 100, 100);
    assert!(app.timeout_message_sent());
    assert_eq!(hw.relay_writes(), vec![true, false], "retries never re-cut");
}

#[test]
fn warning_indicator_flashes_once_reported() {
    let mut hw = MockPlatform::online();
    let mut app = boot(configured_storage("5"), &mut hw);
    run_for(&mut app, &mut hw, 5_000, 100);
    assert!(app.timeout_message_sent());
    hw.clear_calls();

    run_for(&mut app, &mut hw, 2_000, 50);

    let toggles = hw.count(|c| matches!(c, HwCall::WarningLed(_)));
    assert!(toggles >= 6, "expected flashing, saw {toggles} writes");
    assert!(hw.relay_writes().is_empty());
}

#[test]
fn deadline_is_fixed_at_boot() {
    let mut hw = MockPlatform::online();
    let mut app = boot(configured_storage("5"), &mut hw);

    hw.type_line("maxRuntime=3600");
    run_for(&mut app, &mut hw, 5_000, 100);

    assert_eq!(app.store().settings().max_runtime_secs, 3600);
    assert_eq!(app.state(), StateId::TimedOut);
}

#[test]
fn clock_wrap_while_running_keeps_deadline() {
    const HOUR_MS: u32 = 3_600_000;

    // 60 days, longer than the 32-bit millisecond clock can count.
    let mut hw = MockPlatform::online();
    let mut app = boot(configured_storage("5184000"), &mut hw);
    assert_eq!(app.deadline_ms(), 5_184_000_000);

    run_for(&mut app, &mut hw, 1_100 * HOUR_MS, HOUR_MS);
    assert_eq!(app.elapsed_ms(), 3_960_000_000);
    run_for(&mut app, &mut hw, 100 * HOUR_MS, HOUR_MS);

    assert_eq!(u64::from(hw.now_ms), 4_320_000_000 - (1u64 << 32), "mock clock wrapped");
    assert_eq!(app.elapsed_ms(), 4_320_000_000);
    assert_eq!(app.state(), StateId::Running);
    assert_eq!(hw.relay_writes(), vec![true]);
    assert!(hw.published_to(&status_topic()).iter().all(|p| p.payload != "timeout"));

    run_for(&mut app, &mut hw, 240 * HOUR_MS, HOUR_MS);
    assert_eq!(app.state(), StateId::TimedOut);
    assert_eq!(hw.relay_writes(), vec![true, false]);
    assert_eq!(
        hw.published_to(&status_topic())
            .iter()
            .filter(|p| p.payload == "timeout")
            .count(),
        1
    );
}

#[test]
fn boot_near_clock_wrap_counts_from_boot() {
    let mut hw = MockPlatform::online();
    hw.now_ms = u32::MAX - 1_000;
    let mut app = AppService::new(ConfigStore::new(configured_storage("5"), 9));
    app.boot(&mut hw);

    run_for(&mut app, &mut hw, 4_900, 100);
    assert_eq!(app.elapsed_ms(), 4_900);
    assert_eq!(app.state(), StateId::Running);

    run_for(&mut app, &mut hw, 100, 100);
    assert_eq!(app.state(), StateId::TimedOut);
    assert_eq!(hw.relay_writes(), vec![true, false]);
}

#[test]
fn failed_relay_cut_is_retried() {
    let mut hw = MockPlatform::online();
    let mut app = boot(configured_storage("5"), &mut hw);
    hw.relay_fault = true;

    run_for(&mut app, &mut hw, 5_300, 100);
    assert_eq!(app.state(), StateId::TimedOut);
    assert_eq!(hw.relay_writes(), vec![true]);
    assert!(hw.failed_relay_writes >= 3, "rewritten every tick");

    hw.relay_fault = false;
    run_for(&mut app, &mut hw, 200, 100);
    assert_eq!(hw.relay_writes(), vec![true, false]);
    assert!(!hw.relay_on());
}

// ── Invalid settings ──────────────────────────────────────────

#[test]
fn out_of_range_port_skips_network_at_timeout() {
    let mut hw = MockPlatform::online();
    let mut app = boot(configured_storage("5"), &mut hw);
    let connects = hw.count(|c| matches!(c, HwCall::Connect { .. }));
    hw.drop_link();

    hw.type_line("brokerPort=70000");
    run_for(&mut app, &mut hw, 6_000, 100);

    assert!(!app.store().is_valid());
    assert_eq!(app.state(), StateId::TimedOut);
    assert!(!hw.relay_on());
    assert!(!app.timeout_message_sent());
    assert_eq!(hw.count(|c| matches!(c, HwCall::Connect { .. })), connects);
    assert_eq!(hw.count(|c| matches!(c, HwCall::Associate { .. })), 1);
}

// ── Connectivity recovery ─────────────────────────────────────

#[test]
fn offline_boot_retries_until_network_returns() {
    let mut hw = MockPlatform::offline();
    let mut app = boot(configured_storage("5"), &mut hw);

    assert!(!app.connectivity().last_link_ok());
    assert_eq!(
        hw.count(|c| *c == HwCall::Delay(WIFI_ATTEMPT_DELAY_MS)),
        WIFI_CONNECTION_ATTEMPTS as usize
    );
    assert!(hw.calls.contains(&HwCall::LinkLed(false)));
    assert!(hw.published().is_empty());
    assert!(!hw.calls.contains(&HwCall::FirmwareBegin));

    // Association delays count as run time, so the first tick times out.
    app.tick(&mut hw);
    assert_eq!(app.state(), StateId::TimedOut);
    assert!(!app.timeout_message_sent());

    hw.ap_in_range = true;
    hw.broker_up = true;
    app.tick(&mut hw);
    assert!(app.connectivity().last_link_ok());
    assert!(app.timeout_message_sent());
    assert_eq!(hw.relay_writes(), vec![true, false]);
}

#[test]
fn lost_link_is_reassociated_for_timeout_report() {
    let mut hw = MockPlatform::online();
    let mut app = boot(configured_storage("5"), &mut hw);
    hw.drop_link();

    run_for(&mut app, &mut hw, 5_000, 100);

    assert_eq!(hw.count(|c| matches!(c, HwCall::Associate { .. })), 2);
    assert_eq!(hw.count(|c| matches!(c, HwCall::Connect { .. })), 2);
    assert!(app.timeout_message_sent());
}

#[test]
fn refused_broker_waits_and_keeps_link() {
    let mut hw = MockPlatform::online();
    hw.broker_up = false;
    let app = boot(configured_storage("5"), &mut hw);

    assert!(app.connectivity().last_link_ok());
    assert!(hw.calls.contains(&HwCall::Delay(BROKER_RETRY_DELAY_MS)));
    assert!(hw.published().is_empty());
    assert!(hw.calls.contains(&HwCall::FirmwareBegin));
}

// ── Serial commands ───────────────────────────────────────────

#[test]
fn serial_command_is_echoed_and_acknowledged() {
    let mut hw = MockPlatform::online();
    let mut app = boot(configured_storage("5"), &mut hw);
    hw.take_serial();

    hw.type_line("runMessage=go");
    app.tick(&mut hw);

    assert_eq!(hw.take_serial(), "runMessage=go\nOK\r\n");
    assert_eq!(app.store().settings().run_message.as_str(), "go");
}

#[test]
fn serial_settings_query_prints_dump() {
    let mut hw = MockPlatform::online();
    let mut app = boot(configured_storage("5"), &mut hw);
    hw.take_serial();

    hw.type_line("settings");
    app.tick(&mut hw);

    let out = hw.take_serial();
    assert!(out.contains("\r\nssid=HomeNet\r\n"));
    assert!(out.contains("IP Address=192.168.1.77"));
    assert!(!out.contains("OK\r\n"));
}

#[test]
fn serial_garbage_prints_listing_and_changes_nothing() {
    let mut hw = MockPlatform::online();
    let mut app = boot(configured_storage("5"), &mut hw);
    let before = app.store().settings().clone();
    let commits = app.store().storage().commits;
    hw.take_serial();

    hw.type_line("frobnicate");
    app.tick(&mut hw);

    let out = hw.take_serial();
    assert!(out.contains("factorydefaults=yes"));
    assert!(!out.contains("OK\r\n"));
    assert_eq!(app.store().settings(), &before);
    assert_eq!(app.store().storage().commits, commits);
}

#[test]
fn overlong_serial_line_is_discarded() {
    let mut hw = MockPlatform::online();
    let mut app = boot(configured_storage("5"), &mut hw);
    let before = app.store().settings().clone();
    let commits = app.store().storage().commits;
    hw.take_serial();

    // Would read as maxRuntime=0 if cut at the buffer size.
    let line = format!("maxRuntime={}7", "0".repeat(189));
    hw.type_line(&line);
    app.tick(&mut hw);

    let out = hw.take_serial();
    assert!(out.contains("factorydefaults=yes"), "listing shown");
    assert!(!out.contains("OK\r\n"));
    assert_eq!(app.store().settings(), &before);
    assert!(app.store().is_valid());
    assert_eq!(app.store().storage().commits, commits);

    hw.type_line("maxRuntime=9");
    app.tick(&mut hw);
    assert_eq!(app.store().settings().max_runtime_secs, 9);
}

#[test]
fn serial_utf8_value_is_stored_intact() {
    let mut hw = MockPlatform::online();
    let mut app = boot(configured_storage("5"), &mut hw);
    hw.take_serial();

    hw.type_line("ssid=Caf\u{e9}");
    app.tick(&mut hw);

    assert_eq!(app.store().settings().ssid.as_str(), "Caf\u{e9}");
    assert_eq!(hw.take_serial(), "ssid=Caf\u{e9}\nOK\r\n");
}

#[test]
fn serial_invalid_utf8_is_rejected() {
    let mut hw = MockPlatform::online();
    let mut app = boot(configured_storage("5"), &mut hw);
    let before = app.store().settings().clone();

    hw.rx.extend(b"ssid=\xc3\n");
    app.tick(&mut hw);

    assert_eq!(app.store().settings(), &before);
}

#[test]
fn partial_serial_line_waits_for_newline() {
    let mut hw = MockPlatform::online();
    let mut app = boot(configured_storage("5"), &mut hw);

    hw.rx.extend(b"debug=tr");
    app.tick(&mut hw);
    assert!(!app.store().settings().debug);

    hw.rx.extend(b"ue\r\n");
    app.tick(&mut hw);
    assert!(app.store().settings().debug);
}

#[test]
fn factory_defaults_persist_then_restart() {
    let mut hw = MockPlatform::online();
    let mut app = boot(configured_storage("5"), &mut hw);
    hw.clear_calls();

    hw.type_line("factorydefaults=yes");
    app.tick(&mut hw);

    let stored = Settings::decode(&app.store().storage().flash).unwrap();
    assert!(stored.ssid.is_empty());
    assert_eq!(stored.validity_marker, 0);
    assert!(!stored.client_id.is_empty());

    let delay_at = hw
        .calls
        .iter()
        .position(|c| *c == HwCall::Delay(FACTORY_RESET_DELAY_MS));
    let restart_at = hw.calls.iter().position(|c| *c == HwCall::Restart);
    assert!(delay_at.unwrap() < restart_at.unwrap());
    assert!(hw.take_serial().contains("Resetting EEPROM Values"));
}

#[test]
fn action_without_yes_is_rejected() {
    let mut hw = MockPlatform::online();
    let mut app = boot(configured_storage("5"), &mut hw);

    hw.type_line("reset=now");
    app.tick(&mut hw);
    assert_eq!(hw.restarts(), 0);
}

// ── MQTT commands ─────────────────────────────────────────────

#[test]
fn mqtt_command_replies_on_root_plus_command_text() {
    let mut hw = MockPlatform::online();
    let mut app = boot(configured_storage("5"), &mut hw);

    hw.deliver(&format!("{TOPIC_ROOT}command"), "debug=true");
    hw.deliver(&format!("{TOPIC_ROOT}command"), "bogus");
    app.tick(&mut hw);

    assert!(app.store().settings().debug);
    assert_eq!(
        hw.published_to(&format!("{TOPIC_ROOT}debug=true")),
        vec![&published(&format!("{TOPIC_ROOT}debug=true"), "OK", false)]
    );
    assert_eq!(
        hw.published_to(&format!("{TOPIC_ROOT}bogus")),
        vec![&published(&format!("{TOPIC_ROOT}bogus"), "(empty)", false)]
    );
}

#[test]
fn mqtt_settings_query_replies_with_dump() {
    let mut hw = MockPlatform::online();
    let mut app = boot(configured_storage("5"), &mut hw);

    hw.deliver(&format!("{TOPIC_ROOT}command"), "settings");
    app.tick(&mut hw);

    let reply = hw.published_to(&format!("{TOPIC_ROOT}settings"));
    assert_eq!(reply.len(), 1);
    assert!(reply[0].payload.starts_with('\n'));
    assert!(reply[0].payload.contains("\nmaxRuntime=5\n"));
}

#[test]
fn mqtt_topic_root_change_replies_under_new_root() {
    let mut hw = MockPlatform::online();
    let mut app = boot(configured_storage("5"), &mut hw);

    hw.deliver(&format!("{TOPIC_ROOT}command"), "topicRoot=lab/");
    app.tick(&mut hw);

    assert_eq!(hw.published_to("lab/topicRoot=lab/").len(), 1);
}

#[test]
fn mqtt_reset_restarts_after_delay() {
    let mut hw = MockPlatform::online();
    let mut app = boot(configured_storage("5"), &mut hw);

    hw.deliver(&format!("{TOPIC_ROOT}command"), "reset=yes");
    app.tick(&mut hw);

    assert!(hw.calls.contains(&HwCall::Delay(RESET_DELAY_MS)));
    assert_eq!(hw.restarts(), 1);
}

#[test]
fn watchdog_fed_every_tick() {
    let mut hw = MockPlatform::online();
    let mut app = boot(configured_storage("5"), &mut hw);
    let before = hw.feeds;

    run_for(&mut app, &mut hw, 1_000, 100);
    assert_eq!(hw.feeds - before, 10);
}
