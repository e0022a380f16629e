//! ==============================================================================
//! hal.rs - Hardware Abstraction Layer
//! ==============================================================================
//!
//! purpose:
//!     provides a unified interface for the station hardware: digital GPIO,
//!     a 10-bit ADC channel for the light sensor and the DHT climate sensor.
//!     abstracts away the difference between running on a real Raspberry Pi
//!     (using `rppal`) and a development machine (using mocks).
//!
//! design philosophy:
//!     - "Compile Anywhere": The station should compile on Windows/Mac/Linux.
//!     - "Sentinel at the edge": DHT failures become NaN in `Dht`, the
//!       cycle driver decides what a NaN means.
//!
//! relationships:
//!     - used by: cycle.rs (light/water reads), gpio.rs (status led), main.rs
//!     - uses: rppal (on feature="hardware")
//!     - uses: std::process::Command (Python DHT driver, timing-sensitive)
//!
//! ==============================================================================

use anyhow::Result;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// DHT family members supported by the bus driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DhtModel {
    #[default]
    Dht11,
    Dht22,
}

/// minimum time between two bus transactions, both models share it
pub const DHT_MIN_SAMPLING_INTERVAL: Duration = Duration::from_secs(2);

impl DhtModel {
    fn adafruit_class(self) -> &'static str {
        match self {
            DhtModel::Dht11 => "DHT11",
            DhtModel::Dht22 => "DHT22",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input,
    Output,
}

pub trait HardwareProvider: Send + Sync {
    fn set_gpio_mode(&self, pin: u8, mode: PinMode) -> Result<()>;
    fn write_gpio(&self, pin: u8, level: bool) -> Result<()>;
    fn read_gpio(&self, pin: u8) -> Result<bool>;
    /// 10-bit conversion, 0..=1023
    fn read_adc(&self, channel: u8) -> Result<u16>;
    /// (temperature celsius, relative humidity %)
    fn read_dht(&self, pin: u8, model: DhtModel) -> Result<(f32, f32)>;
}

impl<H: HardwareProvider + ?Sized> HardwareProvider for Arc<H> {
    fn set_gpio_mode(&self, pin: u8, mode: PinMode) -> Result<()> {
        (**self).set_gpio_mode(pin, mode)
    }

    fn write_gpio(&self, pin: u8, level: bool) -> Result<()> {
        (**self).write_gpio(pin, level)
    }

    fn read_gpio(&self, pin: u8) -> Result<bool> {
        (**self).read_gpio(pin)
    }

    fn read_adc(&self, channel: u8) -> Result<u16> {
        (**self).read_adc(channel)
    }

    fn read_dht(&self, pin: u8, model: DhtModel) -> Result<(f32, f32)> {
        (**self).read_dht(pin, model)
    }
}

// ==============================================================================================
// MOCK IMPLEMENTATION (For WSL / Non-Hardware Build)
// ==============================================================================================
#[cfg(not(feature = "hardware"))]
pub struct Hal {}

#[cfg(not(feature = "hardware"))]
impl Hal {
    pub fn new() -> Result<Self> {
        tracing::info!("Using MOCK HAL (No hardware access)");
        Ok(Self {})
    }
}

#[cfg(not(feature = "hardware"))]
impl HardwareProvider for Hal {
    fn set_gpio_mode(&self, pin: u8, mode: PinMode) -> Result<()> {
        tracing::debug!("[MOCK GPIO] Pin {} set to {:?}", pin, mode);
        Ok(())
    }

    fn write_gpio(&self, pin: u8, level: bool) -> Result<()> {
        tracing::debug!("[MOCK GPIO] Pin {} write {}", pin, level);
        Ok(())
    }

    fn read_gpio(&self, pin: u8) -> Result<bool> {
        tracing::debug!("[MOCK GPIO] Pin {} read", pin);
        Ok(false)
    }

    fn read_adc(&self, channel: u8) -> Result<u16> {
        tracing::debug!("[MOCK ADC] Channel {} read", channel);
        Ok(512)
    }

    fn read_dht(&self, pin: u8, model: DhtModel) -> Result<(f32, f32)> {
        tracing::debug!("[MOCK {}] Reading pin {}", model.adafruit_class(), pin);
        Ok((25.0, 50.0)) // Mock data
    }
}

// ==============================================================================================
// REAL IMPLEMENTATION (For Raspberry Pi)
// ==============================================================================================
#[cfg(feature = "hardware")]
pub struct Hal {
    gpio: rppal::gpio::Gpio,
    // MCP3008 on SPI0/CE0, kept open for the life of the station
    adc: std::sync::Mutex<rppal::spi::Spi>,
}

#[cfg(feature = "hardware")]
impl Hal {
    pub fn new() -> Result<Self> {
        use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
        tracing::info!("Using REAL HARDWARE HAL (rppal)");
        let gpio = rppal::gpio::Gpio::new()?;
        let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, 1_000_000, Mode::Mode0)?;
        Ok(Self { gpio, adc: std::sync::Mutex::new(spi) })
    }
}

#[cfg(feature = "hardware")]
impl HardwareProvider for Hal {
    fn set_gpio_mode(&self, pin: u8, mode: PinMode) -> Result<()> {
        // rppal configures the direction when the pin is claimed
        tracing::debug!("[GPIO] Pin {} mode {:?}", pin, mode);
        Ok(())
    }

    fn write_gpio(&self, pin: u8, level: bool) -> Result<()> {
        let mut p = self.gpio.get(pin)?.into_output();
        // keep the level after the handle drops, otherwise the led resets
        p.set_reset_on_drop(false);
        if level { p.set_high(); } else { p.set_low(); }
        Ok(())
    }

    fn read_gpio(&self, pin: u8) -> Result<bool> {
        let p = self.gpio.get(pin)?.into_input();
        Ok(p.is_high())
    }

    fn read_adc(&self, channel: u8) -> Result<u16> {
        // MCP3008 single-ended: start bit, SGL/DIFF + channel, don't care
        let write = [0x01, 0x80 | ((channel & 0x07) << 4), 0x00];
        let mut read = [0u8; 3];
        let spi = self.adc.lock().map_err(|_| anyhow::anyhow!("adc lock poisoned"))?;
        spi.transfer(&mut read, &write)?;
        Ok((((read[1] & 0x03) as u16) << 8) | read[2] as u16)
    }

    fn read_dht(&self, pin: u8, model: DhtModel) -> Result<(f32, f32)> {
        // NOTE: DHT bit-banging from userspace is unreliable without a kernel driver,
        // so the adafruit driver does the timing in a subprocess.
        use std::process::Command;
        let script = format!(
            r#"
import adafruit_dht, board, json, sys
try:
    dht = adafruit_dht.{}(board.D{})
    try:
        print(json.dumps({{"t": dht.temperature, "h": dht.humidity}}))
    finally:
        dht.exit()
except Exception as e:
    print(str(e), file=sys.stderr)
    print("null")
"#,
            model.adafruit_class(),
            pin
        );
        let output = Command::new("python3").args(["-c", &script]).output()?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim() == "null" || stdout.trim().is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("{:?} read failed: {}", model, stderr.trim());
        }
        let v: serde_json::Value = serde_json::from_str(stdout.trim())?;
        let t = v["t"].as_f64().ok_or_else(|| anyhow::anyhow!("missing temperature"))?;
        let h = v["h"].as_f64().ok_or_else(|| anyhow::anyhow!("missing humidity"))?;
        Ok((t as f32, h as f32))
    }
}

// ==============================================================================================
// CLIMATE SENSOR (DHT bus protocol)
// ==============================================================================================

/// the stateful bus sensor, reads return NaN when the transaction failed
pub trait ClimateSensor {
    fn begin(&mut self);
    fn read_temperature(&mut self) -> f32;
    fn read_humidity(&mut self) -> f32;
}

/// DHT11/DHT22 driver on top of a hardware provider.
///
/// One bus transaction yields both temperature and humidity, so the result is
/// cached for `DHT_MIN_SAMPLING_INTERVAL`. Back-to-back
/// `read_temperature` / `read_humidity` calls therefore describe the same
/// measurement.
pub struct Dht<H> {
    hal: H,
    pin: u8,
    model: DhtModel,
    last: Option<(Instant, f32, f32)>,
}

impl<H: HardwareProvider> Dht<H> {
    pub fn new(hal: H, pin: u8, model: DhtModel) -> Self {
        Self { hal, pin, model, last: None }
    }

    fn sample(&mut self) -> (f32, f32) {
        if let Some((at, t, h)) = self.last {
            if at.elapsed() < DHT_MIN_SAMPLING_INTERVAL {
                return (t, h);
            }
        }

        let (t, h) = match self.hal.read_dht(self.pin, self.model) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::debug!("[{:?}] bus read on GPIO {} failed: {}", self.model, self.pin, e);
                (f32::NAN, f32::NAN)
            }
        };
        self.last = Some((Instant::now(), t, h));
        (t, h)
    }
}

impl<H: HardwareProvider> ClimateSensor for Dht<H> {
    fn begin(&mut self) {
        if let Err(e) = self.hal.set_gpio_mode(self.pin, PinMode::Input) {
            tracing::warn!("[{:?}] failed to configure GPIO {}: {}", self.model, self.pin, e);
        }
        self.last = None;
    }

    fn read_temperature(&mut self) -> f32 {
        self.sample().0
    }

    fn read_humidity(&mut self) -> f32 {
        self.sample().1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHal {
        reads: AtomicUsize,
        fail: bool,
    }

    impl HardwareProvider for CountingHal {
        fn set_gpio_mode(&self, _pin: u8, _mode: PinMode) -> Result<()> {
            Ok(())
        }
        fn write_gpio(&self, _pin: u8, _level: bool) -> Result<()> {
            Ok(())
        }
        fn read_gpio(&self, _pin: u8) -> Result<bool> {
            Ok(true)
        }
        fn read_adc(&self, _channel: u8) -> Result<u16> {
            Ok(0)
        }
        fn read_dht(&self, _pin: u8, _model: DhtModel) -> Result<(f32, f32)> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("checksum mismatch");
            }
            Ok((20.0 + n as f32, 40.0 + n as f32))
        }
    }

    #[test]
    fn test_dht_pairs_come_from_one_transaction() {
        let hal = Arc::new(CountingHal { reads: AtomicUsize::new(0), fail: false });
        let mut dht = Dht::new(hal.clone(), 14, DhtModel::Dht22);
        dht.begin();

        assert_eq!(dht.read_temperature(), 20.0);
        assert_eq!(dht.read_humidity(), 40.0);
        assert_eq!(hal.reads.load(Ordering::SeqCst), 1);

        // begin() drops the cached measurement
        dht.begin();
        assert_eq!(dht.read_humidity(), 41.0);
        assert_eq!(hal.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dht_caches_for_two_seconds() {
        let hal = Arc::new(CountingHal { reads: AtomicUsize::new(0), fail: false });
        let mut dht = Dht::new(hal.clone(), 14, DhtModel::Dht11);
        dht.begin();

        assert_eq!(dht.read_temperature(), 20.0);
        tokio::time::advance(Duration::from_millis(1500)).await;
        assert_eq!(dht.read_temperature(), 20.0);
        assert_eq!(hal.reads.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(dht.read_temperature(), 21.0);
        assert_eq!(hal.reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dht_failure_is_nan() {
        let hal = Arc::new(CountingHal { reads: AtomicUsize::new(0), fail: true });
        let mut dht = Dht::new(hal, 14, DhtModel::Dht11);
        dht.begin();
        assert!(dht.read_temperature().is_nan());
        assert!(dht.read_humidity().is_nan());
    }

    #[test]
    fn test_model_parsing() {
        #[derive(Deserialize)]
        struct Wrap {
            model: DhtModel,
        }
        let w: Wrap = toml::from_str("model = \"dht22\"").unwrap();
        assert_eq!(w.model, DhtModel::Dht22);
        assert!(toml::from_str::<Wrap>("model = \"am2302\"").is_err());
    }

    #[cfg(not(feature = "hardware"))]
    #[test]
    fn test_mock_hal_values() {
        let hal = Hal::new().unwrap();
        assert_eq!(hal.read_adc(0).unwrap(), 512);
        assert!(!hal.read_gpio(5).unwrap());
        assert_eq!(hal.read_dht(14, DhtModel::Dht11).unwrap(), (25.0, 50.0));
    }
}
