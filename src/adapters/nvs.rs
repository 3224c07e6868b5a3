//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`]: the whole [`NodeConfig`] is one postcard
//! blob under `airnode::nodecfg`.  A missing blob loads as defaults; a blob
//! that does not decode is reported as [`ConfigError::Corrupted`] so the
//! caller can decide whether to fall back.
//!
//! ESP-IDF NVS commits are atomic per `nvs_commit()`, so a power cut during
//! `save` leaves either the old or the new blob.

use log::info;

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::NodeConfig;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(target_os = "espidf")]
const CONFIG_NAMESPACE: &[u8] = b"airnode\0";
#[cfg(target_os = "espidf")]
const CONFIG_KEY: &[u8] = b"nodecfg\0";
#[cfg(target_os = "espidf")]
const MAX_BLOB_SIZE: usize = 1024;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    blob: std::cell::RefCell<Option<Vec<u8>>>,
}

impl NvsAdapter {
    /// Initialise NVS flash.  On first boot or after a version mismatch the
    /// partition is erased and re-initialised.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            blob: std::cell::RefCell::new(None),
        })
    }

    /// Simulation: overwrite the stored blob with arbitrary bytes.
    #[cfg(not(target_os = "espidf"))]
    pub fn write_raw(&self, bytes: &[u8]) {
        *self.blob.borrow_mut() = Some(bytes.to_vec());
    }

    /// Open the config namespace, run `f` with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_handle<T>(
        write: bool,
        f: impl FnOnce(nvs_handle_t) -> Result<T, esp_err_t>,
    ) -> Result<T, esp_err_t> {
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let mut handle: nvs_handle_t = 0;
        let ret = unsafe { nvs_open(CONFIG_NAMESPACE.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }
        let result = f(handle);
        unsafe { nvs_close(handle) };
        result
    }

    #[cfg(target_os = "espidf")]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        let result = Self::with_handle(false, |handle| {
            let key = CONFIG_KEY.as_ptr() as *const _;
            let mut size: usize = 0;
            let ret = unsafe { nvs_get_blob(handle, key, core::ptr::null_mut(), &mut size) };
            if ret != ESP_OK {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH);
            }
            let mut buf = vec![0u8; size];
            let ret = unsafe { nvs_get_blob(handle, key, buf.as_mut_ptr() as *mut _, &mut size) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(buf)
        });
        match result {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Ok(None),
            Err(e) if e == ESP_ERR_NVS_INVALID_LENGTH => Err(ConfigError::Corrupted),
            Err(e) => {
                warn!("NvsAdapter: NVS read error {}", e);
                Err(ConfigError::IoError)
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        Ok(self.blob.borrow().clone())
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        Self::with_handle(true, |handle| {
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    CONFIG_KEY.as_ptr() as *const _,
                    bytes.as_ptr() as *const _,
                    bytes.len(),
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
            warn!("NvsAdapter: NVS write error {}", e);
            ConfigError::IoError
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blob(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        self.write_raw(bytes);
        Ok(())
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<NodeConfig, ConfigError> {
        match self.read_blob()? {
            Some(bytes) => {
                let cfg: NodeConfig =
                    postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
                Ok(cfg)
            }
            None => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(NodeConfig::default())
            }
        }
    }

    fn save(&self, config: &NodeConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.write_blob(&bytes)?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}
