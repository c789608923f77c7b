//! Linux sysfs GPIO driver.
//!
//! Uses the legacy `/sys/class/gpio` interface: pins are exported on setup,
//! configured through `direction` and driven through `value`, and unexported
//! again on cleanup.
//!
//! Module parameters:
//! - `path` (optional, default `/sys/class/gpio`) - sysfs GPIO root
//!
//! Pull resistors cannot be configured through sysfs; a pull mode other
//! than `none` is logged and ignored.

use async_trait::async_trait;
use mqio_common::hal::driver::{GpioModule, ModuleError, PinDirection, PinSetup};
use mqio_common::io::config::{ModuleConfig, PullMode};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEFAULT_SYSFS_ROOT: &str = "/sys/class/gpio";

/// GPIO module backed by `/sys/class/gpio`.
#[derive(Debug)]
pub struct SysfsGpio {
    root: PathBuf,
    exported: Mutex<Vec<u32>>,
}

/// Factory function to create a sysfs GPIO module.
pub fn create_driver(config: &ModuleConfig) -> Result<Arc<dyn GpioModule>, ModuleError> {
    let root = match config.params.get("path") {
        None => PathBuf::from(DEFAULT_SYSFS_ROOT),
        Some(toml::Value::String(path)) => PathBuf::from(path),
        Some(other) => {
            return Err(ModuleError::ConfigError(format!(
                "module '{}': path must be a string, got {other}",
                config.name
            )));
        }
    };
    Ok(Arc::new(SysfsGpio::new(root)))
}

impl SysfsGpio {
    /// Create a driver rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            exported: Mutex::new(Vec::new()),
        }
    }

    fn pin_dir(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{pin}"))
    }

    fn value_path(&self, pin: u32) -> PathBuf {
        self.pin_dir(pin).join("value")
    }

    fn write_attr(path: &Path, value: &str) -> Result<(), ModuleError> {
        fs::write(path, value).map_err(|e| ModuleError::io(path.display().to_string(), e))
    }
}

#[async_trait]
impl GpioModule for SysfsGpio {
    fn kind(&self) -> &'static str {
        "sysfs"
    }

    fn setup_pin(&self, setup: &PinSetup) -> Result<(), ModuleError> {
        let pin = setup.pin;
        if !self.pin_dir(pin).exists() {
            Self::write_attr(&self.root.join("export"), &pin.to_string())
                .map_err(|e| ModuleError::SetupFailed(format!("export of pin {pin}: {e}")))?;
            self.exported.lock().push(pin);
        }

        if setup.pull != PullMode::None {
            warn!("sysfs GPIO cannot set pull mode {:?} on pin {pin}; ignoring", setup.pull);
        }

        // "high"/"low" set the direction and the initial level in one write.
        let direction = match (setup.direction, setup.initial) {
            (PinDirection::Input, _) => "in",
            (PinDirection::Output, Some(true)) => "high",
            (PinDirection::Output, Some(false)) => "low",
            (PinDirection::Output, None) => "out",
        };
        Self::write_attr(&self.pin_dir(pin).join("direction"), direction)
            .map_err(|e| ModuleError::SetupFailed(format!("direction of pin {pin}: {e}")))?;
        debug!("sysfs pin {pin} direction={direction}");
        Ok(())
    }

    async fn set_pin(&self, pin: u32, level: bool) -> Result<(), ModuleError> {
        let path = self.value_path(pin);
        tokio::fs::write(&path, if level { "1" } else { "0" })
            .await
            .map_err(|e| ModuleError::io(path.display().to_string(), e))
    }

    async fn get_pin(&self, pin: u32) -> Result<bool, ModuleError> {
        let path = self.value_path(pin);
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ModuleError::io(path.display().to_string(), e))?;
        match raw.trim() {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(ModuleError::io(
                path.display().to_string(),
                format!("unexpected value {other:?}"),
            )),
        }
    }

    fn cleanup(&self) -> Result<(), ModuleError> {
        let pins: Vec<u32> = self.exported.lock().drain(..).collect();
        let unexport = self.root.join("unexport");
        let failed: Vec<String> = pins
            .iter()
            .filter_map(|pin| Self::write_attr(&unexport, &pin.to_string()).err())
            .map(|e| e.to_string())
            .collect();
        info!("sysfs GPIO unexported {} pin(s)", pins.len() - failed.len());
        if failed.is_empty() {
            Ok(())
        } else {
            Err(ModuleError::CleanupFailed(failed.join("; ")))
        }
    }
}
