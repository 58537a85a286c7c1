//! Scripted capture device and permission provider for tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use pawlingo_core::PermissionState;

use crate::capture::{
    CaptureDevice, CaptureError, CaptureSettings, PermissionProvider, Result, RouteOptions,
};
use crate::cpal_device::MIN_DB;

#[derive(Default)]
struct FakeState {
    levels: VecDeque<f32>,
    calls: Vec<String>,
    reads: usize,
    capturing: bool,
    location: Option<PathBuf>,
    no_output: bool,
    route_error: Option<CaptureError>,
    start_error: Option<CaptureError>,
}

/// Plays back a fixed list of levels, one per `average_power` call.
pub struct FakeCapture {
    state: Arc<Mutex<FakeState>>,
}

/// Handle for poking at a [`FakeCapture`] after it moved into a detector.
#[derive(Clone)]
pub struct FakeControl {
    state: Arc<Mutex<FakeState>>,
}

impl FakeCapture {
    pub fn with_levels(levels: impl IntoIterator<Item = f32>) -> Self {
        let state = FakeState {
            levels: levels.into_iter().collect(),
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn control(&self) -> FakeControl {
        FakeControl {
            state: self.state.clone(),
        }
    }

    fn record(&self, call: impl Into<String>) {
        self.state.lock().calls.push(call.into());
    }
}

impl FakeControl {
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn reads(&self) -> usize {
        self.state.lock().reads
    }

    /// Simulate the platform stopping capture behind our back.
    pub fn interrupt(&self) {
        self.state.lock().capturing = false;
    }

    pub fn fail_next_route(&self, error: CaptureError) {
        self.state.lock().route_error = Some(error);
    }

    pub fn fail_next_start(&self, error: CaptureError) {
        self.state.lock().start_error = Some(error);
    }

    pub fn produce_no_output(&self) {
        self.state.lock().no_output = true;
    }
}

impl CaptureDevice for FakeCapture {
    fn activate_route(&mut self, _options: &RouteOptions) -> Result<()> {
        self.record("activate_route");
        match self.state.lock().route_error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn deactivate_route(&mut self) {
        self.record("deactivate_route");
    }

    fn start(&mut self, path: &Path, _settings: &CaptureSettings) -> Result<()> {
        self.record("start");
        let mut state = self.state.lock();
        if let Some(e) = state.start_error.take() {
            return Err(e);
        }
        state.capturing = true;
        state.location = (!state.no_output).then(|| path.to_path_buf());
        Ok(())
    }

    fn set_metering(&mut self, enabled: bool) {
        self.record(format!("metering:{}", enabled));
    }

    fn is_capturing(&self) -> bool {
        self.state.lock().capturing
    }

    fn average_power(&mut self) -> f32 {
        let mut state = self.state.lock();
        state.reads += 1;
        state.levels.pop_front().unwrap_or(MIN_DB)
    }

    fn stop(&mut self) -> Option<PathBuf> {
        self.record("stop");
        let mut state = self.state.lock();
        state.capturing = false;
        state.location.take()
    }
}

/// Permission provider with a fixed answer.
pub struct FakePermissions {
    state: PermissionState,
}

impl FakePermissions {
    pub fn granted() -> Self {
        Self {
            state: PermissionState::Granted,
        }
    }

    pub fn denied() -> Self {
        Self {
            state: PermissionState::Denied,
        }
    }

    pub fn undetermined() -> Self {
        Self {
            state: PermissionState::Undetermined,
        }
    }
}

#[async_trait]
impl PermissionProvider for FakePermissions {
    fn status(&self) -> PermissionState {
        self.state
    }

    async fn request(&self) -> bool {
        self.state.is_granted()
    }
}
