//! End-to-end run on the host simulation adapters.
//!
//! Wires the real [`HardwareAdapter`] with simulated WiFi, MQTT, NVS and
//! serial backends, so the whole firmware path from boot to timeout report
//! runs without a device.

use core::convert::Infallible;
use std::net::Ipv4Addr;

use embedded_hal::digital::{ErrorType, OutputPin};

use runlimiter::adapters::board::BoardOutputs;
use runlimiter::adapters::hardware::HardwareAdapter;
use runlimiter::adapters::mqtt::{MqttAdapter, PublishedMessage};
use runlimiter::adapters::nvs::NvsAdapter;
use runlimiter::adapters::serial::SerialAdapter;
use runlimiter::adapters::system::SystemAdapter;
use runlimiter::adapters::time::Esp32TimeAdapter;
use runlimiter::adapters::watchdog::Watchdog;
use runlimiter::adapters::wifi::{SimAccessPoint, WifiAdapter};
use runlimiter::adapters::entropy;
use runlimiter::app::ports::ClockPort;
use runlimiter::app::service::AppService;
use runlimiter::app::store::{ConfigStore, LoadOutcome};
use runlimiter::fsm::StateId;

use crate::mock_hw::{TOPIC_ROOT, configured_storage};

#[derive(Default)]
struct SimPin;

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

type SimHardware = HardwareAdapter<SimPin, SimPin, SimPin>;

fn sim_hardware() -> SimHardware {
    let wifi = WifiAdapter::with_access_point(SimAccessPoint {
        ssid: "HomeNet".into(),
        password: "hunter22".into(),
        rssi: -50,
        address: Ipv4Addr::new(10, 1, 1, 9),
    });
    HardwareAdapter::new(
        BoardOutputs::new(SimPin, SimPin, SimPin),
        Esp32TimeAdapter::new(),
        Watchdog::new(),
        SerialAdapter::new(),
        wifi,
        MqttAdapter::new(),
        SystemAdapter::new(),
    )
}

fn boot_sim(hw: &mut SimHardware) -> AppService<NvsAdapter> {
    let image = configured_storage("1").flash;
    let store = ConfigStore::new(NvsAdapter::with_image(&image), entropy::seed());
    let mut app = AppService::new(store);
    assert_eq!(app.boot(hw), LoadOutcome::Valid);
    app
}

fn message(topic: &str, payload: &str, retain: bool) -> PublishedMessage {
    PublishedMessage {
        topic: topic.into(),
        payload: payload.into(),
        retain,
    }
}

#[test]
fn boot_to_timeout_on_simulated_device() {
    let mut hw = sim_hardware();
    let mut app = boot_sim(&mut hw);

    assert!(hw.mqtt().published().contains(&message(
        &format!("{TOPIC_ROOT}status"),
        "started",
        true
    )));
    assert!(hw.system().image_validated());

    hw.delay_ms(1_100);
    app.tick(&mut hw);

    assert_eq!(app.state(), StateId::TimedOut);
    assert!(app.timeout_message_sent());
    assert_eq!(
        hw.mqtt().published().last(),
        Some(&message(&format!("{TOPIC_ROOT}status"), "timeout", true))
    );
    assert!(hw.watchdog().feeds() >= 1);
}

#[test]
fn simulated_broker_commands_get_replies() {
    let mut hw = sim_hardware();
    let mut app = boot_sim(&mut hw);

    hw.mqtt_mut()
        .inject_inbound(&format!("{TOPIC_ROOT}command"), "runMessage=hi");
    app.tick(&mut hw);

    assert_eq!(app.store().settings().run_message.as_str(), "hi");
    assert_eq!(
        hw.mqtt().published().last(),
        Some(&message(&format!("{TOPIC_ROOT}runMessage=hi"), "OK", false))
    );
    assert_eq!(app.store().storage().commit_count(), 1);
}

#[test]
fn simulated_serial_console_dumps_settings() {
    let mut hw = sim_hardware();
    let mut app = boot_sim(&mut hw);

    hw.serial_mut().push_input("settings\n");
    app.tick(&mut hw);

    let out = hw.serial_mut().take_output();
    assert!(out.contains("maxRuntime=1\r\n"));
    assert!(out.contains("IP Address=10.1.1.9"));
}

#[test]
fn lost_session_is_rebuilt_for_timeout_report() {
    let mut hw = sim_hardware();
    let mut app = boot_sim(&mut hw);

    hw.mqtt_mut().drop_session();
    hw.wifi_mut().drop_link();
    hw.delay_ms(1_100);
    app.tick(&mut hw);

    assert_eq!(hw.mqtt().sessions(), 2);
    assert!(app.timeout_message_sent());
}
