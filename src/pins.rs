//! GPIO assignments and board options for the run limiter board.
//!
//! Single source of truth: every adapter references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Solid-state relay
// ---------------------------------------------------------------------------

/// Digital output driving the SSR input.
pub const RELAY_GPIO: i32 = 5;
/// HIGH energises the relay (load powered).
pub const RELAY_ACTIVE_HIGH: bool = true;

// ---------------------------------------------------------------------------
// Indicators
// ---------------------------------------------------------------------------

/// Timeout warning LED.
pub const WARNING_LED_GPIO: i32 = 4;
/// On-board LED, lit while the WiFi link is up.
pub const LINK_LED_GPIO: i32 = 2;
/// Both LEDs sink current: LOW lights them.
pub const LED_ACTIVE_LOW: bool = true;

/// Flash the warning LED once the timeout has been reported.  Boards that
/// wire the LED to the relay driver transistor must keep it steady.
pub const FLASH_WARNING_LED: bool = true;

// ---------------------------------------------------------------------------
// UART console
// ---------------------------------------------------------------------------

pub const UART_BAUD: u32 = 115_200;
