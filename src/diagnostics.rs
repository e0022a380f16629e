//! human readable reading output, one line per field

use crate::domain::{Field, SensorReading};

pub const READ_FAILED_LINE: &str = "Failed to read from DHT sensor!";

/// line oriented diagnostic output
pub trait Diagnostics {
    fn line(&mut self, line: &str);
}

/// writes diagnostic lines through tracing under the `diagnostics` target
#[derive(Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn line(&mut self, line: &str) {
        tracing::info!(target: "diagnostics", "{}", line);
    }
}

pub fn format_field(reading: &SensorReading, field: Field) -> String {
    match field {
        Field::Temperature => format!("{}: {:.2} °C", field.label(), reading.temperature),
        Field::Humidity => format!("{}: {:.2} %", field.label(), reading.humidity),
        Field::Light => format!("{}: {}", field.label(), reading.light_intensity),
        Field::Water => format!(
            "{}: {}",
            field.label(),
            if reading.water_present { "Detected" } else { "Not Detected" }
        ),
    }
}

/// the lines for a reading, in upload order
pub fn format_reading(reading: &SensorReading) -> Vec<String> {
    Field::ALL.iter().map(|f| format_field(reading, *f)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_reading() {
        let reading = SensorReading {
            temperature: 22.5,
            humidity: 48.0,
            light_intensity: 512,
            water_present: true,
        };
        assert_eq!(
            format_reading(&reading),
            vec![
                "Temperature: 22.50 °C",
                "Humidity: 48.00 %",
                "Light Intensity: 512",
                "Water Level: Detected",
            ]
        );
    }
}
