//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements                        | Connects to              |
//! |------------|-----------------------------------|--------------------------|
//! | `board`    | OutputPort                        | Relay + LED GPIOs        |
//! | `time`     | ClockPort                         | ESP32 system timer       |
//! | `watchdog` | WatchdogPort                      | ESP-IDF task watchdog    |
//! | `serial`   | SerialPort                        | UART0 console            |
//! | `wifi`     | LinkPort                          | ESP-IDF WiFi STA         |
//! | `mqtt`     | MessagingPort                     | ESP-IDF MQTT client      |
//! | `nvs`      | StoragePort                       | NVS / in-memory store    |
//! | `system`   | RestartPort, FirmwareUpdatePort   | esp-ota, chip reset      |
//! | `entropy`  | (client-id seed)                  | Hardware RNG             |
//! | `hardware` | Platform (by delegation)          | All of the above         |

pub mod board;
pub mod entropy;
pub mod hardware;
pub mod mqtt;
pub mod nvs;
pub mod serial;
pub mod system;
pub mod time;
pub mod watchdog;
pub mod wifi;
