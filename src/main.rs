//! RunLimiter Firmware: Main Entry Point
//!
//! Powers a load through a relay for a configured run time, then cuts it
//! and reports the timeout over MQTT.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  BoardOutputs   Esp32Time   Watchdog   SerialAdapter           │
//! │  (Output)       (Clock)     (Watchdog) (Serial)                │
//! │  WifiAdapter    MqttAdapter SystemAdapter   NvsAdapter         │
//! │  (Link)         (Messaging) (Restart+OTA)   (Storage)          │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  FSM · ConfigStore · Commands · Connectivity           │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{info, warn};

use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{AnyIOPin, AnyOutputPin, PinDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::uart::{self, UartDriver};
use esp_idf_hal::units::Hertz;
use esp_idf_svc::eventloop::EspSystemEventLoop;

use runlimiter::adapters::board::BoardOutputs;
use runlimiter::adapters::entropy;
use runlimiter::adapters::hardware::HardwareAdapter;
use runlimiter::adapters::mqtt::MqttAdapter;
use runlimiter::adapters::nvs::NvsAdapter;
use runlimiter::adapters::serial::SerialAdapter;
use runlimiter::adapters::system::SystemAdapter;
use runlimiter::adapters::time::Esp32TimeAdapter;
use runlimiter::adapters::watchdog::Watchdog;
use runlimiter::adapters::wifi::WifiAdapter;
use runlimiter::app::service::AppService;
use runlimiter::app::store::{ConfigStore, LoadOutcome};
use runlimiter::config::LOOP_PERIOD_MS;
use runlimiter::pins;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  RunLimiter v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;

    // ── 2. Board outputs ──────────────────────────────────────
    // SAFETY: the GPIO numbers in `pins` are distinct and no other driver
    // claims them.
    let (relay, warning_led, link_led) = unsafe {
        (
            AnyOutputPin::new(pins::RELAY_GPIO),
            AnyOutputPin::new(pins::WARNING_LED_GPIO),
            AnyOutputPin::new(pins::LINK_LED_GPIO),
        )
    };
    let board = BoardOutputs::new(
        PinDriver::output(relay)?,
        PinDriver::output(warning_led)?,
        PinDriver::output(link_led)?,
    );

    // ── 3. Console, network and system services ───────────────
    let uart = UartDriver::new(
        peripherals.uart0,
        peripherals.pins.gpio1,
        peripherals.pins.gpio3,
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &uart::config::Config::default().baudrate(Hertz(pins::UART_BAUD)),
    )?;
    let wifi = WifiAdapter::new(peripherals.modem, sysloop)?;

    let mut hw = HardwareAdapter::new(
        board,
        Esp32TimeAdapter::new(),
        Watchdog::new(),
        SerialAdapter::new(uart),
        wifi,
        MqttAdapter::new(),
        SystemAdapter::new(),
    );

    // ── 4. Settings store ─────────────────────────────────────
    let nvs = NvsAdapter::new().map_err(|e| anyhow::anyhow!("NVS init failed: {e}"))?;
    let store = ConfigStore::new(nvs, entropy::seed());

    // ── 5. Boot ───────────────────────────────────────────────
    let mut app = AppService::new(store);
    match app.boot(&mut hw) {
        LoadOutcome::Valid => info!("Boot: stored settings complete"),
        LoadOutcome::Incomplete => warn!("Boot: settings incomplete, configure over serial"),
        LoadOutcome::Blank => warn!("Boot: no stored settings, defaults written"),
    }

    // ── 6. Control loop ───────────────────────────────────────
    loop {
        app.tick(&mut hw);
        FreeRtos::delay_ms(LOOP_PERIOD_MS);
    }
}
