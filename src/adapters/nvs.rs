//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`] for the pump.
//!
//! - Config validation: a stored blob is range-checked on load and rejected
//!   if it fails.
//! - Namespace isolation: the config blob (`pump-cfg`) and the reservoir
//!   record (`pump-state`) live in separate namespaces.
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::PumpConfig;
use log::{info, warn};

#[cfg(not(feature = "espidf"))]
use std::collections::HashMap;

#[cfg(feature = "espidf")]
use esp_idf_svc::sys::*;

pub const CONFIG_NAMESPACE: &str = "pump-cfg";
pub const CONFIG_KEY: &str = "pumpcfg";

const MAX_BLOB_SIZE: usize = 256;

/// NVS names are at most 15 bytes plus the terminator.
const NAME_BUF: usize = 16;

pub struct NvsAdapter {
    #[cfg(not(feature = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the NVS partition is
    /// erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(feature = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(feature = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(feature = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(feature = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(feature = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns_buf = c_name(namespace);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns_buf.as_ptr().cast(), mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }
}

/// NUL-terminated copy of an NVS name, truncated to 15 bytes.
#[cfg_attr(not(feature = "espidf"), allow(dead_code))]
fn c_name(name: &str) -> [u8; NAME_BUF] {
    let mut buf = [0u8; NAME_BUF];
    let bytes = name.as_bytes();
    let len = bytes.len().min(NAME_BUF - 1);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

pub(crate) fn validate_config(cfg: &PumpConfig) -> Result<(), ConfigError> {
    if !cfg.capacity_units.is_finite() || !(1.0..=1000.0).contains(&cfg.capacity_units) {
        return Err(ConfigError::ValidationFailed(
            "capacity_units must be 1–1000",
        ));
    }
    if !cfg.dose_increment_units.is_finite()
        || cfg.dose_increment_units <= 0.0
        || cfg.dose_increment_units > cfg.capacity_units
    {
        return Err(ConfigError::ValidationFailed(
            "dose_increment_units must be > 0 and <= capacity_units",
        ));
    }
    let pulses = cfg.capacity_units / cfg.dose_increment_units;
    if (pulses - cfg.pulses_per_cartridge() as f32).abs() > 1e-3 {
        return Err(ConfigError::ValidationFailed(
            "capacity_units must be a whole number of dose increments",
        ));
    }
    if !(1..=1000).contains(&cfg.pulse_duration_ms) {
        return Err(ConfigError::ValidationFailed(
            "pulse_duration_ms must be 1–1000",
        ));
    }
    if cfg.bolus_interval_ms <= cfg.pulse_duration_ms || cfg.bolus_interval_ms > 60_000 {
        return Err(ConfigError::ValidationFailed(
            "bolus_interval_ms must exceed pulse_duration_ms and be <= 60000",
        ));
    }
    if cfg.basal_yield_window_ms >= cfg.bolus_interval_ms {
        return Err(ConfigError::ValidationFailed(
            "basal_yield_window_ms must be < bolus_interval_ms",
        ));
    }
    if !(1000..=600_000).contains(&cfg.save_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "save_interval_ms must be 1000–600000",
        ));
    }
    if !(1..=100).contains(&cfg.tick_period_ms) {
        return Err(ConfigError::ValidationFailed(
            "tick_period_ms must be 1–100",
        ));
    }
    if cfg.prime_lockout_ms > 5000 {
        return Err(ConfigError::ValidationFailed(
            "prime_lockout_ms must be 0–5000",
        ));
    }
    if !(500..=60_000).contains(&cfg.keepalive_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "keepalive_interval_ms must be 500–60000",
        ));
    }
    Ok(())
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<PumpConfig, ConfigError> {
        let mut buf = [0u8; MAX_BLOB_SIZE];
        let len = match self.read(CONFIG_NAMESPACE, CONFIG_KEY, &mut buf) {
            Ok(len) => len,
            Err(StorageError::NotFound) => {
                info!("NvsAdapter: no stored config, using defaults");
                return Ok(PumpConfig::default());
            }
            Err(e) => {
                warn!("NvsAdapter: config read failed ({})", e);
                return Err(ConfigError::IoError);
            }
        };
        let cfg: PumpConfig =
            postcard::from_bytes(&buf[..len]).map_err(|_| ConfigError::Corrupted)?;
        validate_config(&cfg)?;
        info!("NvsAdapter: loaded config ({} bytes)", len);
        Ok(cfg)
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(feature = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            match self.store.borrow().get(&composite) {
                Some(data) => {
                    let len = data.len().min(buf.len());
                    buf[..len].copy_from_slice(&data[..len]);
                    Ok(len)
                }
                None => Err(StorageError::NotFound),
            }
        }

        #[cfg(feature = "espidf")]
        {
            let key_buf = c_name(key);
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let mut size = buf.len();
                let ret = unsafe {
                    nvs_get_blob(handle, key_buf.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut size)
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(size)
            });
            match result {
                Ok(size) => Ok(size),
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Err(StorageError::NotFound),
                Err(_) => Err(StorageError::IoError),
            }
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(feature = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().insert(composite, data.to_vec());
            Ok(())
        }

        #[cfg(feature = "espidf")]
        {
            let key_buf = c_name(key);
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let ret = unsafe {
                    nvs_set_blob(handle, key_buf.as_ptr().cast(), data.as_ptr().cast(), data.len())
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|e| {
                if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
                    StorageError::Full
                } else {
                    StorageError::IoError
                }
            })
        }
    }
}
