//! Hardware adapter: bridges the concrete adapters to the domain ports.
//!
//! Owns the board outputs, clock, watchdog, serial console, WiFi link, MQTT
//! client and system services, and exposes them as one
//! [`Platform`](crate::app::ports::Platform) through delegation.  Storage
//! stays outside: the configuration store owns its [`NvsAdapter`](super::nvs::NvsAdapter).

use core::net::Ipv4Addr;

use embedded_hal::digital::OutputPin;

use crate::app::ports::{
    ClockPort, FirmwareUpdatePort, InboundMessage, LinkPort, LinkStatus, MessagingPort,
    OutputPort, RestartPort, SerialPort, SessionOptions, WatchdogPort,
};

use super::board::BoardOutputs;
use super::mqtt::MqttAdapter;
use super::serial::SerialAdapter;
use super::system::SystemAdapter;
use super::time::Esp32TimeAdapter;
use super::watchdog::Watchdog;
use super::wifi::WifiAdapter;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<R, W, L> {
    board: BoardOutputs<R, W, L>,
    clock: Esp32TimeAdapter,
    watchdog: Watchdog,
    serial: SerialAdapter,
    wifi: WifiAdapter,
    mqtt: MqttAdapter,
    system: SystemAdapter,
}

impl<R, W, L> HardwareAdapter<R, W, L>
where
    R: OutputPin,
    W: OutputPin,
    L: OutputPin,
{
    pub fn new(
        board: BoardOutputs<R, W, L>,
        clock: Esp32TimeAdapter,
        watchdog: Watchdog,
        serial: SerialAdapter,
        wifi: WifiAdapter,
        mqtt: MqttAdapter,
        system: SystemAdapter,
    ) -> Self {
        Self {
            board,
            clock,
            watchdog,
            serial,
            wifi,
            mqtt,
            system,
        }
    }

    pub fn serial_mut(&mut self) -> &mut SerialAdapter {
        &mut self.serial
    }

    pub fn wifi_mut(&mut self) -> &mut WifiAdapter {
        &mut self.wifi
    }

    pub fn mqtt(&self) -> &MqttAdapter {
        &self.mqtt
    }

    pub fn mqtt_mut(&mut self) -> &mut MqttAdapter {
        &mut self.mqtt
    }

    pub fn system(&self) -> &SystemAdapter {
        &self.system
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }
}

// ── OutputPort ────────────────────────────────────────────────

impl<R: OutputPin, W: OutputPin, L: OutputPin> OutputPort for HardwareAdapter<R, W, L> {
    fn set_relay(&mut self, energized: bool) -> bool {
        self.board.set_relay(energized)
    }

    fn set_warning_led(&mut self, on: bool) -> bool {
        self.board.set_warning_led(on)
    }

    fn set_link_led(&mut self, on: bool) {
        self.board.set_link_led(on);
    }
}

// ── ClockPort / WatchdogPort ──────────────────────────────────

impl<R, W, L> ClockPort for HardwareAdapter<R, W, L> {
    fn now_ms(&self) -> u32 {
        self.clock.now_ms()
    }

    fn delay_ms(&mut self, ms: u32) {
        self.clock.delay_ms(ms);
    }
}

impl<R, W, L> WatchdogPort for HardwareAdapter<R, W, L> {
    fn feed(&mut self) {
        self.watchdog.feed();
    }
}

// ── SerialPort ────────────────────────────────────────────────

impl<R, W, L> SerialPort for HardwareAdapter<R, W, L> {
    fn read_byte(&mut self) -> Option<u8> {
        self.serial.read_byte()
    }

    fn write_bytes(&mut self, data: &[u8]) {
        self.serial.write_bytes(data);
    }
}

// ── LinkPort ──────────────────────────────────────────────────

impl<R, W, L> LinkPort for HardwareAdapter<R, W, L> {
    fn associate(&mut self, ssid: &str, password: &str) {
        self.wifi.associate(ssid, password);
    }

    fn link_status(&self) -> LinkStatus {
        self.wifi.link_status()
    }

    fn rssi(&self) -> i32 {
        self.wifi.rssi()
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        self.wifi.local_ip()
    }
}

// ── MessagingPort ─────────────────────────────────────────────

impl<R, W, L> MessagingPort for HardwareAdapter<R, W, L> {
    fn connect(&mut self, options: &SessionOptions<'_>) -> bool {
        self.mqtt.connect(options)
    }

    fn is_connected(&self) -> bool {
        self.mqtt.is_connected()
    }

    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> bool {
        self.mqtt.publish(topic, payload, retain)
    }

    fn subscribe(&mut self, topic: &str) -> bool {
        self.mqtt.subscribe(topic)
    }

    fn service(&mut self) {
        self.mqtt.service();
    }

    fn poll_inbound(&mut self) -> Option<InboundMessage> {
        self.mqtt.poll_inbound()
    }

    fn state_code(&self) -> i32 {
        self.mqtt.state_code()
    }
}

// ── FirmwareUpdatePort / RestartPort ──────────────────────────

impl<R, W, L> FirmwareUpdatePort for HardwareAdapter<R, W, L> {
    fn begin(&mut self) {
        self.system.begin();
    }

    fn poll(&mut self) {
        self.system.poll();
    }
}

impl<R, W, L> RestartPort for HardwareAdapter<R, W, L> {
    fn restart(&mut self) {
        self.system.restart();
    }
}
