//! Application core: pure domain logic, zero direct I/O.
//!
//! This module holds the rules of the run limiter: the configuration store,
//! the command processor, connectivity recovery and status reporting, all
//! orchestrated by [`service::AppService`].  Hardware and network access
//! happen through the **port traits** in [`ports`], keeping this layer
//! testable without real peripherals.

pub mod command;
pub mod connectivity;
pub mod console;
pub mod ports;
pub mod reporter;
pub mod service;
pub mod store;
