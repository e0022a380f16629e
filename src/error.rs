//! station error taxonomy
//!
//! provisioning failures are fatal (the process restarts), sensor and upload
//! failures only cost the current cycle.

use thiserror::Error;

/// why a cycle produced no usable reading
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorReadFailure {
    #[error("temperature read returned NaN")]
    InvalidTemperature,
    #[error("humidity read returned NaN")]
    InvalidHumidity,
    #[error("temperature and humidity reads returned NaN")]
    InvalidClimate,
    #[error("sensor io error: {0}")]
    Io(String),
}

impl SensorReadFailure {
    /// classify a climate pair, `None` when both values are usable
    pub fn from_climate(temperature: f32, humidity: f32) -> Option<Self> {
        match (temperature.is_nan(), humidity.is_nan()) {
            (false, false) => None,
            (true, false) => Some(Self::InvalidTemperature),
            (false, true) => Some(Self::InvalidHumidity),
            (true, true) => Some(Self::InvalidClimate),
        }
    }
}

#[derive(Debug, Error)]
pub enum StationError {
    #[error("failed to connect to network (fallback ap {ap_name:?})")]
    Provisioning { ap_name: String },

    #[error(transparent)]
    SensorRead(#[from] SensorReadFailure),

    #[error("upload of field {field} failed with code {code}")]
    Upload { field: u8, code: i32 },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl StationError {
    /// fatal errors end the process, everything else is retried next tick
    pub fn is_fatal(&self) -> bool {
        matches!(self, StationError::Provisioning { .. } | StationError::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_climate_classification() {
        assert_eq!(SensorReadFailure::from_climate(22.5, 48.0), None);
        assert_eq!(SensorReadFailure::from_climate(f32::NAN, 48.0), Some(SensorReadFailure::InvalidTemperature));
        assert_eq!(SensorReadFailure::from_climate(22.5, f32::NAN), Some(SensorReadFailure::InvalidHumidity));
        assert_eq!(SensorReadFailure::from_climate(f32::NAN, f32::NAN), Some(SensorReadFailure::InvalidClimate));
    }

    #[test]
    fn test_fatality() {
        assert!(StationError::Provisioning { ap_name: "ASAA".into() }.is_fatal());
        assert!(!StationError::Upload { field: 2, code: -401 }.is_fatal());
        assert!(!StationError::from(SensorReadFailure::InvalidHumidity).is_fatal());
    }
}
