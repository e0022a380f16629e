//! ==============================================================================
//! gpio.rs - status led signalling
//! ==============================================================================
//!
//! purpose:
//!     the station has no screen, so the on-board led is the only way to see
//!     the provisioning result without a serial console.
//!
//!     - booting:   led off
//!     - connected: led off
//!     - failed:    two on/off blinks (1s each phase), then the process restarts
//!
//! relationships:
//!     - used by: startup.rs (provisioning feedback)
//!     - uses: hal.rs (write_gpio)
//!
//! ==============================================================================

use std::time::Duration;

use crate::hal::{HardwareProvider, PinMode};

/// number of on/off pairs in the failure pattern
pub const FAILURE_BLINKS: usize = 2;

/// duration of each on and off phase
pub const BLINK_PHASE: Duration = Duration::from_secs(1);

pub struct StatusLed<H> {
    hal: H,
    pin: u8,
}

impl<H: HardwareProvider> StatusLed<H> {
    pub fn new(hal: H, pin: u8) -> Self {
        if let Err(e) = hal.set_gpio_mode(pin, PinMode::Output) {
            tracing::warn!("[LED] failed to configure GPIO {}: {}", pin, e);
        }
        Self { hal, pin }
    }

    fn set(&self, level: bool) {
        // led feedback is best effort, a broken led must not stop the station
        if let Err(e) = self.hal.write_gpio(self.pin, level) {
            tracing::warn!("[LED] write to GPIO {} failed: {}", self.pin, e);
        }
    }

    /// blink the failure pattern
    pub async fn signal_failure(&self) {
        for _ in 0..FAILURE_BLINKS {
            self.set(true);
            tokio::time::sleep(BLINK_PHASE).await;
            self.set(false);
            tokio::time::sleep(BLINK_PHASE).await;
        }
    }

    /// known state before provisioning starts
    pub fn signal_off(&self) {
        self.set(false);
    }

    pub fn signal_connected(&self) {
        self.signal_off();
    }
}
