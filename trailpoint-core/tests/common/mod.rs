//! Scripted collaborator doubles and a harness wiring them to the engine.
//!
//! Each double exposes its state through an `Arc<Mutex<..>>` so a test can
//! adjust the script and inspect side effects while the engine owns the
//! boxed half.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use trailpoint_core::time::SharedTime;
use trailpoint_core::{
    CellularRadio, CloudTransport, Collaborators, FixProvider, FixStatus, LocationConfig,
    LocationEngine, LocationPoint, SendError, SleepControl, TrackerError, TrackerResult,
    WakeRequestError, WifiRadio,
};

#[derive(Default)]
pub struct ProviderState {
    pub powered: bool,
    pub fix: Option<LocationPoint>,
    pub outside: bool,
    pub radius: f32,
    pub way_point: Option<(f64, f64)>,
    pub starts: usize,
    pub stops: usize,
}

pub struct MockProvider(pub Arc<Mutex<ProviderState>>);

impl FixProvider for MockProvider {
    fn status(&self) -> FixStatus {
        FixStatus {
            powered: self.0.lock().unwrap().powered,
        }
    }

    fn location(&mut self) -> TrackerResult<LocationPoint> {
        self.0.lock().unwrap().fix.ok_or(TrackerError::NotEnoughData {
            required: 1,
            available: 0,
        })
    }

    fn start(&mut self) {
        let mut state = self.0.lock().unwrap();
        state.powered = true;
        state.starts += 1;
    }

    fn stop(&mut self) {
        let mut state = self.0.lock().unwrap();
        state.powered = false;
        state.stops += 1;
    }

    fn set_radius_threshold(&mut self, radius_m: f32) {
        self.0.lock().unwrap().radius = radius_m;
    }

    fn radius_threshold(&self) -> f32 {
        self.0.lock().unwrap().radius
    }

    fn is_outside_radius(&mut self, _point: &LocationPoint) -> TrackerResult<bool> {
        Ok(self.0.lock().unwrap().outside)
    }

    fn set_way_point(&mut self, latitude: f64, longitude: f64) {
        self.0.lock().unwrap().way_point = Some((latitude, longitude));
    }
}

#[derive(Default)]
pub struct TransportState {
    pub connected: bool,
    pub busy: bool,
    pub reject: bool,
    /// Every payload the transport accepted, with its full-ack flag
    pub sent: Vec<(String, bool)>,
}

pub struct MockTransport(pub Arc<Mutex<TransportState>>);

impl CloudTransport for MockTransport {
    fn connected(&self) -> bool {
        self.0.lock().unwrap().connected
    }

    fn send(&mut self, payload: &str, full_ack: bool) -> nb::Result<(), SendError> {
        let mut state = self.0.lock().unwrap();
        if state.busy {
            return Err(nb::Error::WouldBlock);
        }
        if state.reject {
            return Err(nb::Error::Other(SendError::Rejected));
        }
        state.sent.push((payload.to_string(), full_ack));
        Ok(())
    }
}

#[derive(Default)]
pub struct SleepSystemState {
    pub wake_at: Option<u32>,
    pub full_wake: bool,
    pub sleep_disabled: bool,
    pub connecting_time: u32,
    pub forced_full_wake: usize,
    pub extensions: Vec<(u32, bool)>,
}

pub struct MockSleep(pub Arc<Mutex<SleepSystemState>>);

impl SleepControl for MockSleep {
    fn wake_at(&mut self, at: u32) -> Result<(), WakeRequestError> {
        self.0.lock().unwrap().wake_at = Some(at);
        Ok(())
    }

    fn force_full_wake_cycle(&mut self) {
        let mut state = self.0.lock().unwrap();
        state.full_wake = true;
        state.forced_full_wake += 1;
    }

    fn extend_execution(&mut self, seconds: u32, early_shutdown: bool) {
        self.0.lock().unwrap().extensions.push((seconds, early_shutdown));
    }

    fn is_full_wake_cycle(&self) -> bool {
        self.0.lock().unwrap().full_wake
    }

    fn is_sleep_disabled(&self) -> bool {
        self.0.lock().unwrap().sleep_disabled
    }

    fn connecting_time(&self) -> u32 {
        self.0.lock().unwrap().connecting_time
    }
}

#[derive(Default)]
pub struct WifiState {
    pub on: bool,
    pub aps: Vec<trailpoint_core::radio::WifiAccessPoint>,
    pub scans: usize,
}

pub struct MockWifi(pub Arc<Mutex<WifiState>>);

impl WifiRadio for MockWifi {
    fn on(&mut self) {
        self.0.lock().unwrap().on = true;
    }

    fn off(&mut self) {
        self.0.lock().unwrap().on = false;
    }

    fn scan(
        &mut self,
        out: &mut heapless::Vec<
            trailpoint_core::radio::WifiAccessPoint,
            { trailpoint_core::constants::MAX_WPS_COLLECT },
        >,
    ) -> TrackerResult<()> {
        let mut state = self.0.lock().unwrap();
        state.scans += 1;
        for ap in &state.aps {
            let _ = out.push(*ap);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct CellularScript {
    pub serving_lines: Vec<String>,
    pub neighbor_lines: Vec<String>,
}

pub struct MockCellular(pub Arc<Mutex<CellularScript>>);

impl CellularRadio for MockCellular {
    fn query(&mut self, command: &str, each_line: &mut dyn FnMut(&str)) -> TrackerResult<()> {
        let script = self.0.lock().unwrap();
        let lines = if command.contains("servingcell") {
            &script.serving_lines
        } else {
            &script.neighbor_lines
        };
        for line in lines {
            each_line(line);
        }
        Ok(())
    }
}

pub struct Harness {
    pub engine: LocationEngine,
    pub clock: SharedTime,
    pub provider: Arc<Mutex<ProviderState>>,
    pub transport: Arc<Mutex<TransportState>>,
    pub sleep: Arc<Mutex<SleepSystemState>>,
    pub wifi: Arc<Mutex<WifiState>>,
    pub cellular: Arc<Mutex<CellularScript>>,
}

/// A locked, stable fix at a fixed position.
pub fn stable_fix() -> LocationPoint {
    LocationPoint {
        latitude: 37.42341234,
        longitude: -122.08123456,
        altitude: 12.0,
        horizontal_accuracy: 3.0,
        vertical_accuracy: 5.0,
        epoch_time: 1_700_000_000,
        locked: true,
        stable: true,
        ..Default::default()
    }
}

impl Harness {
    /// Build an engine over fresh doubles: connected transport, full wake,
    /// sleep disabled, clock at 100s uptime. `init` has already run.
    pub fn new(config: LocationConfig) -> Self {
        let clock = SharedTime::new(100_000);
        let provider = Arc::new(Mutex::new(ProviderState::default()));
        let transport = Arc::new(Mutex::new(TransportState {
            connected: true,
            ..Default::default()
        }));
        let sleep = Arc::new(Mutex::new(SleepSystemState {
            full_wake: true,
            sleep_disabled: true,
            connecting_time: 90,
            ..Default::default()
        }));
        let wifi = Arc::new(Mutex::new(WifiState::default()));
        let cellular = Arc::new(Mutex::new(CellularScript::default()));

        let collab = Collaborators {
            provider: Box::new(MockProvider(provider.clone())),
            transport: Box::new(MockTransport(transport.clone())),
            sleep: Box::new(MockSleep(sleep.clone())),
            wifi: Box::new(MockWifi(wifi.clone())),
            cellular: Box::new(MockCellular(cellular.clone())),
            clock: Box::new(clock.clone()),
        };

        let mut engine = LocationEngine::new(collab, config).unwrap();
        engine.init();

        Self {
            engine,
            clock,
            provider,
            transport,
            sleep,
            wifi,
            cellular,
        }
    }

    /// Advance the clock and run one tick.
    pub fn step(&mut self, seconds: u64) {
        self.clock.advance(seconds * 1000);
        self.engine.tick().unwrap();
    }

    pub fn sent(&self) -> Vec<String> {
        self.transport
            .lock()
            .unwrap()
            .sent
            .iter()
            .map(|(payload, _)| payload.clone())
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        self.transport.lock().unwrap().sent.len()
    }

    pub fn give_stable_fix(&self) {
        self.provider.lock().unwrap().fix = Some(stable_fix());
    }
}
