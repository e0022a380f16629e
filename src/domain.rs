use crate::error::SensorReadFailure;

/// one complete set of readings taken in a single cycle
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensorReading {
    /// temperature in celsius
    pub temperature: f32,
    /// relative humidity (0-100%)
    pub humidity: f32,
    /// raw 10-bit adc value (0-1023)
    pub light_intensity: u16,
    /// water level probe is wet
    pub water_present: bool,
}

impl SensorReading {
    /// value uploaded for a given field
    pub fn value_of(&self, field: Field) -> f32 {
        match field {
            Field::Temperature => self.temperature,
            Field::Humidity => self.humidity,
            Field::Light => self.light_intensity as f32,
            Field::Water => {
                if self.water_present {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// telemetry channel fields, in upload order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Temperature,
    Humidity,
    Light,
    Water,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::Temperature, Field::Humidity, Field::Light, Field::Water];

    /// numeric field index on the remote channel
    pub fn index(self) -> u8 {
        match self {
            Field::Temperature => 1,
            Field::Humidity => 2,
            Field::Light => 3,
            Field::Water => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Field::Temperature => "Temperature",
            Field::Humidity => "Humidity",
            Field::Light => "Light Intensity",
            Field::Water => "Water Level",
        }
    }
}

/// network state, decided once at boot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// result code returned by the sink for a single field write
pub const STATUS_OK: i32 = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadStatus {
    Success,
    Failure(i32),
}

impl UploadStatus {
    pub fn from_code(code: i32) -> Self {
        if code == STATUS_OK {
            UploadStatus::Success
        } else {
            UploadStatus::Failure(code)
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, UploadStatus::Success)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldOutcome {
    pub field: Field,
    pub value: f32,
    pub status: UploadStatus,
}

/// every field write of one cycle, in the order they were attempted
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UploadReport {
    pub outcomes: Vec<FieldOutcome>,
}

impl UploadReport {
    pub fn push(&mut self, outcome: FieldOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FieldOutcome> {
        self.outcomes.iter().filter(|o| !o.status.is_success())
    }

    pub fn is_complete_success(&self) -> bool {
        !self.outcomes.is_empty() && self.failures().next().is_none()
    }
}

/// what happened in one cycle
#[derive(Clone, Debug, PartialEq)]
pub enum CycleOutcome {
    Skipped(SensorReadFailure),
    Uploaded(UploadReport),
}

/// lifecycle of the station process
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StationPhase {
    Booting,
    Provisioning,
    Failed,
    Connected,
    Cycling,
}
