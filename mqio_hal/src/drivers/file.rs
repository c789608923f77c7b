//! File sensor driver.
//!
//! Reads one number from a text file per sensor input, e.g. Linux thermal
//! zones or hwmon attributes.
//!
//! Sensor input parameters:
//! - `path` (required) - File to read
//! - `scale` (optional, default 1) - Divisor applied to the raw number

use async_trait::async_trait;
use mqio_common::hal::driver::{ModuleError, SensorModule};
use mqio_common::io::config::{ModuleConfig, SensorInputConfig};
use std::sync::Arc;
use tracing::debug;

/// Sensor module reading numeric files.
#[derive(Debug, Default)]
pub struct FileSensor;

/// Factory function to create a file sensor module.
pub fn create_driver(_config: &ModuleConfig) -> Result<Arc<dyn SensorModule>, ModuleError> {
    Ok(Arc::new(FileSensor))
}

fn path_of(config: &SensorInputConfig) -> Result<&str, ModuleError> {
    config.param_str("path").ok_or_else(|| {
        ModuleError::ConfigError(format!("sensor input '{}' needs a 'path'", config.name))
    })
}

fn scale_of(config: &SensorInputConfig) -> Result<f64, ModuleError> {
    match config.param_f64("scale") {
        None => Ok(1.0),
        Some(scale) if scale != 0.0 && scale.is_finite() => Ok(scale),
        Some(scale) => Err(ModuleError::ConfigError(format!(
            "sensor input '{}' has invalid scale {scale}",
            config.name
        ))),
    }
}

#[async_trait]
impl SensorModule for FileSensor {
    fn kind(&self) -> &'static str {
        "file"
    }

    fn setup_sensor(&self, config: &SensorInputConfig) -> Result<(), ModuleError> {
        let path = path_of(config)?;
        scale_of(config)?;
        debug!("File sensor '{}' reads {path}", config.name);
        Ok(())
    }

    async fn get_value(&self, config: &SensorInputConfig) -> Result<Option<f64>, ModuleError> {
        let path = path_of(config)?;
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ModuleError::io(path, e))?;
        let raw = content.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        let value: f64 = raw.parse().map_err(|e| ModuleError::io(path, e))?;
        Ok(Some(value / scale_of(config)?))
    }

    fn cleanup(&self) -> Result<(), ModuleError> {
        Ok(())
    }
}
