//! Engine and tick driver configuration.

use serde::{Deserialize, Serialize};

use crate::error::EcsError;

/// Shortest accepted fixed step, in seconds (10 kHz).
pub const MIN_DELTA_FIXED_TIME: f64 = 1e-4;

/// Timing configuration of an engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Length of one fixed step, in seconds.
    pub delta_fixed_time: f64,
    /// Upper bound on one tick's variable delta, in seconds.
    pub max_variable_time: f64,
}

impl EngineConfig {
    /// Create the default configuration (60 Hz fixed step, 0.25 s cap).
    #[must_use]
    pub fn new() -> Self {
        Self {
            delta_fixed_time: 1.0 / 60.0,
            max_variable_time: 0.25,
        }
    }

    /// Override the fixed step length.
    #[must_use]
    pub fn with_delta_fixed_time(mut self, seconds: f64) -> Self {
        self.delta_fixed_time = seconds;
        self
    }

    /// Override the variable delta cap.
    #[must_use]
    pub fn with_max_variable_time(mut self, seconds: f64) -> Self {
        self.max_variable_time = seconds;
        self
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::Json`] if the text is not a valid configuration,
    /// or [`EcsError::InvalidConfig`] if a value is out of range.
    pub fn from_json(text: &str) -> Result<Self, EcsError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that both times are finite, the fixed step is at least
    /// [`MIN_DELTA_FIXED_TIME`], and the variable cap is not negative.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> Result<(), EcsError> {
        if !valid_delta_fixed_time(self.delta_fixed_time) {
            return Err(EcsError::InvalidConfig(format!(
                "delta_fixed_time must be a finite number >= {MIN_DELTA_FIXED_TIME}, got {}",
                self.delta_fixed_time
            )));
        }
        if !valid_max_variable_time(self.max_variable_time) {
            return Err(EcsError::InvalidConfig(format!(
                "max_variable_time must be a finite number >= 0, got {}",
                self.max_variable_time
            )));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn valid_delta_fixed_time(seconds: f64) -> bool {
    seconds.is_finite() && seconds >= MIN_DELTA_FIXED_TIME
}

pub(crate) fn valid_max_variable_time(seconds: f64) -> bool {
    seconds.is_finite() && seconds >= 0.0
}

/// Configuration for the tick driver loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.delta_fixed_time, 1.0 / 60.0);
        assert_eq!(config.max_variable_time, 0.25);
    }

    #[test]
    fn test_from_json_fills_missing_fields() {
        let config = EngineConfig::from_json(r#"{ "delta_fixed_time": 0.02 }"#).unwrap();
        assert_eq!(config.delta_fixed_time, 0.02);
        assert_eq!(config.max_variable_time, 0.25);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            EngineConfig::from_json("not json"),
            Err(EcsError::Json(_))
        ));
    }

    #[test]
    fn test_from_json_rejects_out_of_range_values() {
        assert!(matches!(
            EngineConfig::from_json(r#"{ "delta_fixed_time": 1e-20 }"#),
            Err(EcsError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{ "max_variable_time": -0.5 }"#),
            Err(EcsError::InvalidConfig(_))
        ));
        assert!(EngineConfig::from_json(r#"{ "delta_fixed_time": 0.0001 }"#).is_ok());
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .with_delta_fixed_time(0.1)
            .with_max_variable_time(1.0);
        assert_eq!(config.delta_fixed_time, 0.1);
        assert_eq!(config.max_variable_time, 1.0);
    }
}
