//! Fuzz target: `command::parse`
//!
//! Feeds arbitrary text as a command line and checks that parsing never
//! panics and that any accepted assignment refers to text inside the line.
//!
//! cargo fuzz run fuzz_command_line

#![no_main]

use libfuzzer_sys::fuzz_target;
use runlimiter::app::command::{self, Command};
use runlimiter::config::Settings;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = core::str::from_utf8(data) else {
        return;
    };

    if let Ok(Command::Set(field, value)) = command::parse(line) {
        assert!(line.contains(value), "value must be a slice of the line");
        assert!(!value.ends_with(['\r', '\n']));

        // Applying the value either succeeds or leaves the record untouched.
        let mut settings = Settings::default();
        let before = settings.clone();
        if settings.set(field, value).is_err() {
            assert_eq!(settings, before);
        }
    }
});
