//! Fuzz target: `Settings::decode`
//!
//! Decodes arbitrary flash contents as a settings block.  Anything that
//! decodes must re-encode into a block that decodes to the same record.
//!
//! cargo fuzz run fuzz_settings_block

#![no_main]

use libfuzzer_sys::fuzz_target;
use runlimiter::config::Settings;

fuzz_target!(|data: &[u8]| {
    let Some(settings) = Settings::decode(data) else {
        return;
    };

    let block = settings.encode().expect("decoded record must fit the block");
    assert_eq!(Settings::decode(&block), Some(settings));
});
