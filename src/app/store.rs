//! Configuration store: the single owner of the persisted [`Settings`].
//!
//! Every mutation builds a candidate record, re-runs the validity
//! predicate, stamps the marker and commits the whole block.  The store
//! adopts the candidate only after the commit succeeds.  There is no way to
//! write part of the record.

use log::{LevelFilter, debug, info, warn};

use crate::config::{
    self, CLIENT_ID_CAPACITY, Field, SETTINGS_BLOCK_SIZE, SETTINGS_OFFSET, Settings,
    VALID_SETTINGS_FLAG,
};
use crate::error::{Error, Result};

use super::ports::{StorageError, StoragePort};

/// What [`ConfigStore::load`] found in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Marker present; the record passed validation when it was saved.
    Valid,
    /// Readable record saved while incomplete.
    Incomplete,
    /// Erased, never written, or undecodable.  The in-memory record is
    /// left untouched.
    Blank,
}

pub struct ConfigStore<S: StoragePort> {
    storage: S,
    settings: Settings,
    valid: bool,
    rng_state: u32,
}

impl<S: StoragePort> ConfigStore<S> {
    /// Wrap a storage backend.  The record starts at compiled-in defaults
    /// and is only read from storage by [`load`](Self::load).
    ///
    /// `seed` feeds client id generation; zero is remapped.
    pub fn new(storage: S, seed: u32) -> Self {
        Self {
            storage,
            settings: Settings::default(),
            valid: false,
            rng_state: if seed == 0 { 0x9E37_79B9 } else { seed },
        }
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Derived validity flag, kept in step with the marker.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    // ── Persistence ───────────────────────────────────────────

    /// Read the block and trust it only if the marker says so.
    pub fn load(&mut self) -> Result<LoadOutcome> {
        let mut block = [0u8; SETTINGS_BLOCK_SIZE];
        self.storage.read_block(SETTINGS_OFFSET, &mut block)?;

        let Some(settings) = Settings::decode(&block) else {
            warn!("Store: no usable settings block");
            self.valid = false;
            return Ok(LoadOutcome::Blank);
        };

        self.valid = settings.validity_marker == VALID_SETTINGS_FLAG;
        self.settings = settings;
        self.sync_log_level();
        if self.valid {
            debug!("Store: loaded configuration values");
            Ok(LoadOutcome::Valid)
        } else {
            info!("Store: device not configured, settings incomplete");
            Ok(LoadOutcome::Incomplete)
        }
    }

    /// Boot-time load with the sanity check: a blank block or an
    /// impossible port resets everything to defaults.
    pub fn load_or_initialize(&mut self) -> Result<LoadOutcome> {
        let outcome = self.load()?;
        if outcome == LoadOutcome::Blank || self.settings.broker_port > u32::from(u16::MAX) {
            warn!("Store: settings failed sanity check, initializing");
            self.reset_to_defaults()?;
        } else {
            debug!("Store: sanity check passed");
        }
        Ok(outcome)
    }

    /// Validate, stamp the marker, fill in a client id if missing, then
    /// write and commit the whole block.
    pub fn save(&mut self) -> Result<()> {
        self.persist(self.settings.clone())
    }

    /// Overwrite every field with defaults (including a fresh client id)
    /// and save.
    pub fn reset_to_defaults(&mut self) -> Result<()> {
        let mut candidate = Settings::default();
        candidate.client_id = self.new_client_id();
        self.persist(candidate)
    }

    pub fn regenerate_client_id(&mut self) -> Result<()> {
        let mut candidate = self.settings.clone();
        candidate.client_id = self.new_client_id();
        self.persist(candidate)
    }

    /// Set one field from its text form and save.  A rejected value leaves
    /// the record unchanged and nothing is written.
    pub fn update(&mut self, field: Field, value: &str) -> Result<()> {
        let mut candidate = self.settings.clone();
        candidate.set(field, value)?;
        self.persist(candidate)
    }

    // ── Internal ──────────────────────────────────────────────

    /// The `debug` setting gates debug-level log output.
    fn sync_log_level(&self) {
        log::set_max_level(if self.settings.debug {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        });
    }

    /// Write `candidate` and adopt it only once the commit succeeded, so
    /// a storage failure leaves memory matching flash.
    fn persist(&mut self, mut candidate: Settings) -> Result<()> {
        let valid = match candidate.validate() {
            Ok(()) => {
                info!("Settings deemed complete.");
                candidate.validity_marker = VALID_SETTINGS_FLAG;
                true
            }
            Err(e) => {
                info!("Settings still incomplete ({})", e);
                candidate.validity_marker = 0;
                false
            }
        };
        if candidate.client_id.is_empty() {
            candidate.client_id = self.new_client_id();
        }

        let block = candidate
            .encode()
            .map_err(|_| Error::Storage(StorageError::Encode))?;
        self.storage.write_block(SETTINGS_OFFSET, &block)?;
        self.storage.commit()?;

        self.settings = candidate;
        self.valid = valid;
        self.sync_log_level();
        Ok(())
    }

    fn new_client_id(&mut self) -> heapless::String<CLIENT_ID_CAPACITY> {
        let id = config::client_id_from(self.next_random());
        info!("Store: new MQTT client id {}", id);
        id
    }

    /// xorshift32; only needs to spread ids across devices.
    fn next_random(&mut self) -> u16 {
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng_state = x;
        (x >> 16) as u16
    }
}
