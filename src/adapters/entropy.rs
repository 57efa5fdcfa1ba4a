//! Seed for the client-id generator.
//!
//! On the device this reads the hardware RNG, which is only truly random
//! while the radio is running; a pseudo-random value is still fine for a
//! broker client id.  The simulation mixes the wall clock and process id.

#[cfg(target_os = "espidf")]
pub fn seed() -> u32 {
    // SAFETY: esp_random has no preconditions.
    unsafe { esp_idf_svc::sys::esp_random() }
}

#[cfg(not(target_os = "espidf"))]
pub fn seed() -> u32 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() ^ d.as_secs() as u32)
        .unwrap_or(0);
    nanos ^ std::process::id().rotate_left(16)
}
