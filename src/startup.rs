//! boot sequence: join the network once, show the result on the status led.
//!
//! a failed join is fatal. the led blinks the failure pattern and the caller
//! restarts the process, nothing in here retries.

use crate::domain::{ConnectionState, StationPhase};
use crate::error::StationError;
use crate::gpio::StatusLed;
use crate::hal::HardwareProvider;
use crate::network::Provisioner;

pub fn enter(phase: StationPhase) {
    tracing::debug!("[BOOT] phase -> {:?}", phase);
}

pub async fn boot<P, H>(provisioner: &mut P, led: &StatusLed<H>, ap_name: &str) -> Result<ConnectionState, StationError>
where
    P: Provisioner,
    H: HardwareProvider,
{
    enter(StationPhase::Booting);
    led.signal_off();
    tracing::info!("[BOOT] Starting network provisioning...");

    enter(StationPhase::Provisioning);
    if !provisioner.auto_connect(ap_name).await {
        enter(StationPhase::Failed);
        tracing::error!("[BOOT] Failed to connect to network ({:?}).", ConnectionState::Disconnected);
        led.signal_failure().await;
        return Err(StationError::Provisioning { ap_name: ap_name.to_string() });
    }

    enter(StationPhase::Connected);
    tracing::info!("[BOOT] Connected to network!");
    led.signal_connected();
    Ok(ConnectionState::Connected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::tests::RecordingHal;
    use std::sync::Arc;

    struct FixedProvisioner {
        result: bool,
        calls: Vec<String>,
    }

    impl Provisioner for FixedProvisioner {
        async fn auto_connect(&mut self, ap_name: &str) -> bool {
            self.calls.push(ap_name.to_string());
            self.result
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_blinks_twice_and_is_fatal() {
        let hal = Arc::new(RecordingHal::default());
        let led = StatusLed::new(hal.clone(), 2);
        let mut prov = FixedProvisioner { result: false, calls: vec![] };

        let err = boot(&mut prov, &led, "ASAA").await.unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, StationError::Provisioning { ref ap_name } if ap_name == "ASAA"));

        // provisioning is attempted exactly once
        assert_eq!(prov.calls, vec!["ASAA".to_string()]);

        let levels: Vec<bool> = hal.writes.lock().unwrap().iter().map(|(_, l, _)| *l).collect();
        // off at boot, then two on/off pairs
        assert_eq!(levels, vec![false, true, false, true, false]);
        // no sensor was touched
        assert_eq!(*hal.reads.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_success_turns_led_off() {
        let hal = Arc::new(RecordingHal::default());
        let led = StatusLed::new(hal.clone(), 2);
        let mut prov = FixedProvisioner { result: true, calls: vec![] };

        let state = boot(&mut prov, &led, "ASAA").await.unwrap();
        assert_eq!(state, ConnectionState::Connected);

        let levels: Vec<bool> = hal.writes.lock().unwrap().iter().map(|(_, l, _)| *l).collect();
        assert_eq!(levels, vec![false, false]);
    }
}
