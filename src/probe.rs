//! bring-up probes for checking one piece of the station at a time
//!
//!     probe-sensors  read the dht every 2s and print it
//!     probe-sink     push a random test value to field 1 every period
//!     probe-network  provisioning only (handled in main.rs)

use std::time::Duration;

use rand::Rng;

use crate::diagnostics::{Diagnostics, READ_FAILED_LINE};
use crate::domain::STATUS_OK;
use crate::hal::ClimateSensor;
use crate::sink::{describe_status, TelemetrySink};

/// dht polling rate used by the sensor probe
pub const SENSOR_PROBE_INTERVAL: Duration = Duration::from_secs(2);

/// returns how many reads succeeded
pub async fn probe_sensors<C, D>(climate: &mut C, diagnostics: &mut D, cycles: Option<u64>) -> u64
where
    C: ClimateSensor,
    D: Diagnostics,
{
    climate.begin();
    diagnostics.line("DHT Sensor Test Starting...");

    let mut ok = 0;
    let mut done = 0;
    while cycles.map_or(true, |max| done < max) {
        tokio::time::sleep(SENSOR_PROBE_INTERVAL).await;
        done += 1;

        let humidity = climate.read_humidity();
        let temperature = climate.read_temperature();
        if humidity.is_nan() || temperature.is_nan() {
            diagnostics.line(READ_FAILED_LINE);
            continue;
        }
        diagnostics.line(&format!("Humidity: {:.2} %\tTemperature: {:.2} °C", humidity, temperature));
        ok += 1;
    }
    ok
}

/// returns the status code of every write
pub async fn probe_sink<S: TelemetrySink>(
    sink: &S,
    channel_id: u64,
    write_key: &str,
    period: Duration,
    cycles: Option<u64>,
) -> Vec<i32> {
    let mut codes = Vec::new();
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut done = 0;
    while cycles.map_or(true, |max| done < max) {
        ticker.tick().await;
        done += 1;

        let value = rand::thread_rng().gen_range(20..30) as f32;
        tracing::info!("[PROBE] Sending test value: {}", value);

        let code = sink.write_field(channel_id, 1, value, write_key).await;
        if code == STATUS_OK {
            tracing::info!("[PROBE] Data sent successfully to ThingSpeak.");
        } else {
            tracing::warn!("[PROBE] Failed to send data to ThingSpeak. error code: {} ({})", code, describe_status(code));
        }
        codes.push(code);
    }
    codes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::time::Instant;

    struct Alternating {
        n: usize,
    }

    impl ClimateSensor for Alternating {
        fn begin(&mut self) {}
        fn read_humidity(&mut self) -> f32 {
            self.n += 1;
            if self.n % 2 == 0 { f32::NAN } else { 45.0 }
        }
        fn read_temperature(&mut self) -> f32 {
            21.0
        }
    }

    #[derive(Default)]
    struct Lines(Vec<String>);

    impl Diagnostics for Lines {
        fn line(&mut self, line: &str) {
            self.0.push(line.to_string());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_sensors() {
        let mut climate = Alternating { n: 0 };
        let mut lines = Lines::default();

        let start = Instant::now();
        let ok = probe_sensors(&mut climate, &mut lines, Some(3)).await;
        assert_eq!(start.elapsed(), SENSOR_PROBE_INTERVAL * 3);
        assert_eq!(ok, 2);
        assert_eq!(
            lines.0,
            vec![
                "DHT Sensor Test Starting...".to_string(),
                "Humidity: 45.00 %\tTemperature: 21.00 °C".to_string(),
                READ_FAILED_LINE.to_string(),
                "Humidity: 45.00 %\tTemperature: 21.00 °C".to_string(),
            ]
        );
    }

    #[derive(Default)]
    struct Capture(Mutex<Vec<(u8, f32, Instant)>>);

    impl TelemetrySink for Capture {
        async fn write_field(&self, _channel_id: u64, field: u8, value: f32, _write_key: &str) -> i32 {
            self.0.lock().unwrap().push((field, value, Instant::now()));
            if value >= 25.0 { STATUS_OK } else { crate::sink::ERR_NOT_INSERTED }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_sink() {
        let sink = Capture::default();
        let codes = probe_sink(&sink, 1, "KEY", Duration::from_secs(20), Some(3)).await;
        assert_eq!(codes.len(), 3);

        let writes = sink.0.lock().unwrap();
        for (field, value, _) in writes.iter() {
            assert_eq!(*field, 1);
            assert!((20.0..30.0).contains(value));
        }
        assert_eq!(writes[1].2 - writes[0].2, Duration::from_secs(20));
        assert_eq!(writes[2].2 - writes[1].2, Duration::from_secs(20));
    }
}
