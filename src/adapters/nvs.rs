//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`StoragePort`] as an EEPROM-style block: a RAM mirror of
//! [`SETTINGS_BLOCK_SIZE`] bytes that reads and writes hit directly, made
//! durable on [`commit`](StoragePort::commit).
//!
//! - **`target_os = "espidf"`**: the block lives in one NVS blob under the
//!   `runlimiter` namespace.  `nvs_commit()` makes each commit atomic.
//! - **`not(target_os = "espidf")`**: commits copy the mirror into an
//!   in-memory "flash" image for host tests and simulation.
//!
//! A never-written block reads back as erased flash (`0xFF`).

use crate::app::ports::{StorageError, StoragePort};
use crate::config::SETTINGS_BLOCK_SIZE;
use log::{debug, info};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(target_os = "espidf")]
const NAMESPACE: &[u8] = b"runlimiter\0";
#[cfg(target_os = "espidf")]
const BLOCK_KEY: &[u8] = b"settings\0";

const ERASED: u8 = 0xFF;

pub struct NvsAdapter {
    mirror: [u8; SETTINGS_BLOCK_SIZE],
    dirty: bool,
    #[cfg(not(target_os = "espidf"))]
    flash: Option<Vec<u8>>,
    #[cfg(not(target_os = "espidf"))]
    commits: usize,
}

impl NvsAdapter {
    /// Initialise NVS flash and pull the stored block into RAM.
    ///
    /// On first boot or after a version mismatch the NVS partition is erased
    /// and re-initialised.  A missing blob leaves the mirror erased.
    #[cfg(target_os = "espidf")]
    pub fn new() -> Result<Self, StorageError> {
        // SAFETY: called once from the main task before any other NVS access.
        let ret = unsafe { nvs_flash_init() };
        if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
            warn!("NVS: erasing and re-initialising flash partition");
            if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK {
                return Err(StorageError::IoError);
            }
        } else if ret != ESP_OK {
            return Err(StorageError::IoError);
        }

        let mut adapter = Self {
            mirror: [ERASED; SETTINGS_BLOCK_SIZE],
            dirty: false,
        };
        adapter.load_blob()?;
        info!("NvsAdapter: ESP-IDF NVS initialised");
        Ok(adapter)
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Result<Self, StorageError> {
        info!("NvsAdapter: simulation backend");
        Ok(Self {
            mirror: [ERASED; SETTINGS_BLOCK_SIZE],
            dirty: false,
            flash: None,
            commits: 0,
        })
    }

    /// Simulation only: start from a pre-written flash image, as if the
    /// device rebooted with `image` stored.
    #[cfg(not(target_os = "espidf"))]
    pub fn with_image(image: &[u8]) -> Self {
        let mut mirror = [ERASED; SETTINGS_BLOCK_SIZE];
        let len = image.len().min(SETTINGS_BLOCK_SIZE);
        mirror[..len].copy_from_slice(&image[..len]);
        Self {
            mirror,
            dirty: false,
            flash: Some(mirror.to_vec()),
            commits: 0,
        }
    }

    /// Simulation only: the durable image, `None` until the first commit.
    #[cfg(not(target_os = "espidf"))]
    pub fn flash_image(&self) -> Option<&[u8]> {
        self.flash.as_deref()
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn commit_count(&self) -> usize {
        self.commits
    }

    fn span(offset: usize, len: usize) -> Result<core::ops::Range<usize>, StorageError> {
        let end = offset.checked_add(len).ok_or(StorageError::OutOfRange)?;
        if end > SETTINGS_BLOCK_SIZE {
            return Err(StorageError::OutOfRange);
        }
        Ok(offset..end)
    }

    /// Open the namespace, run `f` with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(NAMESPACE.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    #[cfg(target_os = "espidf")]
    fn load_blob(&mut self) -> Result<(), StorageError> {
        let mirror = &mut self.mirror;
        let result = Self::with_nvs_handle(false, |handle| {
            let mut size = SETTINGS_BLOCK_SIZE;
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    BLOCK_KEY.as_ptr() as *const _,
                    mirror.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(size)
        });

        match result {
            Ok(size) => {
                info!("NvsAdapter: loaded settings block ({} bytes)", size);
                Ok(())
            }
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => {
                info!("NvsAdapter: no stored settings block");
                self.mirror = [ERASED; SETTINGS_BLOCK_SIZE];
                Ok(())
            }
            Err(e) => {
                warn!("NvsAdapter: NVS read error {}", e);
                self.mirror = [ERASED; SETTINGS_BLOCK_SIZE];
                Err(StorageError::IoError)
            }
        }
    }
}

impl StoragePort for NvsAdapter {
    fn read_block(&self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        let span = Self::span(offset, buf.len())?;
        buf.copy_from_slice(&self.mirror[span]);
        Ok(())
    }

    fn write_block(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        let span = Self::span(offset, data.len())?;
        if self.mirror[span.clone()] != *data {
            self.mirror[span].copy_from_slice(data);
            self.dirty = true;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        if !self.dirty {
            debug!("NvsAdapter: block unchanged, nothing to commit");
            return Ok(());
        }

        #[cfg(target_os = "espidf")]
        {
            let block = &self.mirror;
            Self::with_nvs_handle(true, |handle| {
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        BLOCK_KEY.as_ptr() as *const _,
                        block.as_ptr() as *const _,
                        block.len(),
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            })
            .map_err(|e| {
                warn!("NvsAdapter: commit failed ({})", e);
                StorageError::IoError
            })?;
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.flash = Some(self.mirror.to_vec());
            self.commits += 1;
        }

        debug!("NvsAdapter: settings block committed");
        self.dirty = false;
        Ok(())
    }
}
