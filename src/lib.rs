//! RunLimiter firmware library.
//!
//! Exposes the pure-logic modules for integration testing and fuzzing.
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each adapter.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod fsm;
pub mod pins;
