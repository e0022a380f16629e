//! ==============================================================================
//! cycle.rs - sensor sampling and telemetry upload cycle
//! ==============================================================================
//!
//! purpose:
//!     the station's main loop. every tick it:
//!
//!         1. reads temperature/humidity (dht), light (adc) and water (gpio)
//!         2. skips the cycle if the dht returned NaN
//!         3. prints the reading, one line per field
//!         4. writes fields 1..4 to the sink, one call each
//!         5. waits for the next tick
//!
//!     upload failures are soft: every field is written regardless, each
//!     failure is logged on its own and the full picture is returned in an
//!     UploadReport.
//!
//! scheduling:
//!     a tokio interval with MissedTickBehavior::Delay. consecutive cycles start
//!     at least `period` apart and an overrunning cycle never causes a burst
//!     of catch-up ticks.
//!
//! relationships:
//!     - used by: main.rs
//!     - uses: hal.rs (ClimateSensor, HardwareProvider), sink.rs, diagnostics.rs
//!
//! ==============================================================================

use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};

use crate::diagnostics::{format_reading, Diagnostics, READ_FAILED_LINE};
use crate::domain::{CycleOutcome, Field, FieldOutcome, SensorReading, UploadReport, UploadStatus};
use crate::error::{SensorReadFailure, StationError};
use crate::hal::{ClimateSensor, HardwareProvider};
use crate::sink::{describe_status, TelemetrySink};

/// highest value of the 10-bit light adc
const ADC_MAX: u16 = 1023;

#[derive(Debug, Clone)]
pub struct CycleConfig {
    pub period: Duration,
    pub channel_id: u64,
    pub write_key: String,
    pub light_channel: u8,
    pub water_pin: u8,
    pub show_sensor_data: bool,
}

pub struct TelemetryCycle<H, C, S, D> {
    config: CycleConfig,
    hal: H,
    climate: C,
    sink: S,
    diagnostics: D,
}

impl<H, C, S, D> TelemetryCycle<H, C, S, D>
where
    H: HardwareProvider,
    C: ClimateSensor,
    S: TelemetrySink,
    D: Diagnostics,
{
    pub fn new(config: CycleConfig, hal: H, mut climate: C, sink: S, diagnostics: D) -> Self {
        climate.begin();
        Self { config, hal, climate, sink, diagnostics }
    }

    /// step 1: query every source once
    pub fn sample(&mut self) -> Result<SensorReading, SensorReadFailure> {
        let humidity = self.climate.read_humidity();
        let temperature = self.climate.read_temperature();
        if let Some(failure) = SensorReadFailure::from_climate(temperature, humidity) {
            return Err(failure);
        }

        let light_intensity = self
            .hal
            .read_adc(self.config.light_channel)
            .map_err(|e| SensorReadFailure::Io(format!("light adc channel {}: {:#}", self.config.light_channel, e)))?;
        let water_present = self
            .hal
            .read_gpio(self.config.water_pin)
            .map_err(|e| SensorReadFailure::Io(format!("water gpio {}: {:#}", self.config.water_pin, e)))?;

        if light_intensity == 0 || light_intensity >= ADC_MAX {
            tracing::warn!("[CYCLE] light reading pinned at {}, sensor may be disconnected", light_intensity);
        }

        Ok(SensorReading { temperature, humidity, light_intensity, water_present })
    }

    /// step 4: one independent write per field, in index order
    pub async fn upload(&mut self, reading: &SensorReading) -> UploadReport {
        let mut report = UploadReport::default();
        for field in Field::ALL {
            let value = reading.value_of(field);
            let code = self
                .sink
                .write_field(self.config.channel_id, field.index(), value, &self.config.write_key)
                .await;
            let status = UploadStatus::from_code(code);
            if let UploadStatus::Failure(code) = status {
                let err = StationError::Upload { field: field.index(), code };
                tracing::warn!("[CYCLE] {} ({}): {}", err, field.label(), describe_status(code));
            }
            report.push(FieldOutcome { field, value, status });
        }
        report
    }

    /// one read-validate-print-upload pass, without the wait
    pub async fn run_once(&mut self) -> CycleOutcome {
        let reading = match self.sample() {
            Ok(r) => r,
            Err(failure) => {
                self.diagnostics.line(READ_FAILED_LINE);
                tracing::warn!("[CYCLE] skipping cycle: {}", StationError::from(failure.clone()));
                return CycleOutcome::Skipped(failure);
            }
        };

        if self.config.show_sensor_data {
            for line in format_reading(&reading) {
                self.diagnostics.line(&line);
            }
        }

        let report = self.upload(&reading).await;
        if report.is_complete_success() {
            tracing::info!("[CYCLE] {} fields sent to channel {}", report.attempted(), self.config.channel_id);
        } else {
            let failed: Vec<String> = report
                .failures()
                .map(|o| format!("{}={}", o.field.label(), o.value))
                .collect();
            tracing::warn!(
                "[CYCLE] {}/{} field writes failed: {}",
                failed.len(),
                report.attempted(),
                failed.join(", ")
            );
        }
        CycleOutcome::Uploaded(report)
    }

    /// run cycles on the fixed period, forever when `max_cycles` is None
    pub async fn run(&mut self, max_cycles: Option<u64>) {
        let mut ticker = time::interval(self.config.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!("[CYCLE] sampling every {}s", self.config.period.as_secs());
        let mut completed = 0u64;
        loop {
            if max_cycles.is_some_and(|max| completed >= max) {
                break;
            }
            ticker.tick().await;
            self.run_once().await;
            completed += 1;
        }
    }
}
