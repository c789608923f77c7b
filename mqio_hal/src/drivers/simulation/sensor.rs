//! Simulated sensor.
//!
//! Returns a fixed reading per sensor input: the input's own `value`
//! parameter, falling back to the module's `value` parameter. Inputs with
//! neither yield "no reading".

use async_trait::async_trait;
use mqio_common::hal::driver::{ModuleError, SensorModule};
use mqio_common::io::config::{ModuleConfig, SensorInputConfig};
use tracing::debug;

/// In-memory sensor module.
#[derive(Debug, Default)]
pub struct SimulatedSensor {
    default_value: Option<f64>,
}

impl SimulatedSensor {
    /// Create a sensor returning `default_value` for inputs without their own value.
    pub fn new(default_value: Option<f64>) -> Self {
        Self { default_value }
    }

    /// Build from a `[[sensor_modules]]` entry.
    pub fn from_config(config: &ModuleConfig) -> Result<Self, ModuleError> {
        let default_value = match config.params.get("value") {
            None => None,
            Some(toml::Value::Float(f)) => Some(*f),
            Some(toml::Value::Integer(i)) => Some(*i as f64),
            Some(other) => {
                return Err(ModuleError::ConfigError(format!(
                    "module '{}': value must be a number, got {other}",
                    config.name
                )));
            }
        };
        Ok(Self::new(default_value))
    }
}

#[async_trait]
impl SensorModule for SimulatedSensor {
    fn kind(&self) -> &'static str {
        "simulation"
    }

    fn setup_sensor(&self, config: &SensorInputConfig) -> Result<(), ModuleError> {
        debug!("Simulated sensor '{}' set up", config.name);
        Ok(())
    }

    async fn get_value(&self, config: &SensorInputConfig) -> Result<Option<f64>, ModuleError> {
        Ok(config.param_f64("value").or(self.default_value))
    }

    fn cleanup(&self) -> Result<(), ModuleError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensor_input(extra: &str) -> SensorInputConfig {
        toml::from_str(&format!("name = \"temp\"\nmodule = \"sim\"\n{extra}")).unwrap()
    }

    #[tokio::test]
    async fn test_input_value_overrides_module_default() {
        let sensor = SimulatedSensor::new(Some(1.0));
        assert_eq!(sensor.get_value(&sensor_input("value = 21.5")).await.unwrap(), Some(21.5));
        assert_eq!(sensor.get_value(&sensor_input("")).await.unwrap(), Some(1.0));
    }

    #[tokio::test]
    async fn test_no_value_means_no_reading() {
        let sensor = SimulatedSensor::new(None);
        assert_eq!(sensor.get_value(&sensor_input("")).await.unwrap(), None);
    }

    #[test]
    fn test_from_config_rejects_non_number() {
        let mut config = ModuleConfig::new("sim", "simulation");
        config
            .params
            .insert("value".to_string(), toml::Value::String("hot".to_string()));
        assert!(SimulatedSensor::from_config(&config).is_err());
    }
}
