//! Sound activity detection on top of a [`CaptureDevice`].
//!
//! While a recording session is active a sampler task reads the device's
//! average power on a fixed interval, classifies it against the threshold and
//! feeds the result into an [`ActivityState`] machine. Only transitions of that
//! machine produce events, so repeated loud or quiet samples are silent.
//!
//! All events go out over one channel. Whoever drains the receiver is the
//! single context the front end reacts on.

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use pawlingo_core::{ActivityState, Config, DetectorEvent, DetectorState, Edge, Threshold};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::{self, JoinHandle};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use crate::capture::{CaptureDevice, CaptureSettings, PermissionProvider, Result, RouteOptions};

/// Shortest sample interval a detector accepts.
pub const MIN_SAMPLE_INTERVAL: Duration = Duration::from_millis(10);
/// Longest sample interval a detector accepts.
pub const MAX_SAMPLE_INTERVAL: Duration = Duration::from_secs(60);

/// Everything a detector needs to know up front. Fixed for its lifetime.
#[derive(Debug, Clone)]
pub struct DetectorOptions {
    pub threshold: Threshold,
    pub sample_interval: Duration,
    /// Where each session writes its audio. Reused, so every session
    /// overwrites the last one.
    pub output_path: PathBuf,
    pub settings: CaptureSettings,
    pub route: RouteOptions,
}

impl DetectorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            threshold: config.threshold(),
            sample_interval: config.sample_interval(),
            output_path: config.output_path(),
            settings: CaptureSettings::mono(config.sample_rate),
            route: RouteOptions::default(),
        }
    }
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Outcome of an explicit permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionResponse {
    Granted,
    Denied,
}

/// A single capture, from toggle on to toggle off.
#[derive(Debug)]
struct RecordingSession {
    id: u64,
    location: PathBuf,
    activity: ActivityState,
}

/// What one sampler tick observed.
#[derive(Debug, PartialEq, Eq)]
enum Sample {
    /// Level read, no edge
    Steady,
    Edge(DetectorEvent),
    /// The session this sampler belongs to is gone
    Stale,
    /// Capture stopped underneath us
    Interrupted,
}

/// Why the sampler leaves its loop.
#[derive(Debug, PartialEq, Eq)]
enum Halt {
    Done,
    /// The session must be torn down before exiting
    Interrupted,
}

struct Inner<D> {
    device: D,
    session: Option<RecordingSession>,
    sampler: Option<JoinHandle<()>>,
    next_session: u64,
}

impl<D: CaptureDevice> Inner<D> {
    /// Route first, then capture, then metering. Undoes the route if capture
    /// fails to start.
    fn begin_capture(&mut self, location: &Path, options: &DetectorOptions) -> Result<()> {
        self.device.activate_route(&options.route)?;
        if let Err(e) = self.device.start(location, &options.settings) {
            self.device.deactivate_route();
            return Err(e);
        }
        self.device.set_metering(true);
        Ok(())
    }

    /// Mirror of [`Inner::begin_capture`]. Returns the location the device
    /// reports having written.
    fn end_session(&mut self) -> Option<PathBuf> {
        if let Some(sampler) = self.sampler.take() {
            sampler.abort();
        }
        let session = self.session.take();
        let captured = self.device.stop();
        self.device.set_metering(false);
        self.device.deactivate_route();

        if let Some(session) = session {
            debug!(
                session = session.id,
                location = %session.location.display(),
                "Session ended"
            );
        }
        captured
    }

    fn sample(&mut self, session_id: u64, threshold: Threshold) -> Sample {
        let Some(session) = self.session.as_mut().filter(|s| s.id == session_id) else {
            return Sample::Stale;
        };
        if !self.device.is_capturing() {
            return Sample::Interrupted;
        }

        let level_db = self.device.average_power();
        let loud = threshold.is_loud(level_db);
        trace!(level_db, loud, "Audio level");

        match session.activity.observe(loud) {
            Some(Edge::SoundStarted) => {
                debug!(level_db, "Sound detected");
                Sample::Edge(DetectorEvent::SoundDetected)
            }
            Some(Edge::SoundStopped) => {
                debug!(level_db, "Silence detected");
                Sample::Edge(DetectorEvent::SilenceDetected)
            }
            None => Sample::Steady,
        }
    }
}

/// Records from a [`CaptureDevice`] and reports when sound starts and stops.
pub struct SoundActivityDetector<D: CaptureDevice> {
    inner: Arc<Mutex<Inner<D>>>,
    permissions: Arc<dyn PermissionProvider>,
    events: mpsc::UnboundedSender<DetectorEvent>,
    runtime: Handle,
    options: DetectorOptions,
}

impl<D: CaptureDevice> SoundActivityDetector<D> {
    /// Create a detector and the receiving end of its event channel. The
    /// sampler is spawned on `runtime` whenever a session starts.
    ///
    /// `options.sample_interval` is clamped to
    /// [`MIN_SAMPLE_INTERVAL`]..=[`MAX_SAMPLE_INTERVAL`].
    pub fn new(
        device: D,
        permissions: Arc<dyn PermissionProvider>,
        mut options: DetectorOptions,
        runtime: Handle,
    ) -> (Self, mpsc::UnboundedReceiver<DetectorEvent>) {
        let interval = options
            .sample_interval
            .clamp(MIN_SAMPLE_INTERVAL, MAX_SAMPLE_INTERVAL);
        if interval != options.sample_interval {
            warn!(
                requested = ?options.sample_interval,
                using = ?interval,
                "Sample interval out of range"
            );
            options.sample_interval = interval;
        }

        let (events, receiver) = mpsc::unbounded_channel();
        let inner = Inner {
            device,
            session: None,
            sampler: None,
            next_session: 0,
        };
        let detector = Self {
            inner: Arc::new(Mutex::new(inner)),
            permissions,
            events,
            runtime,
            options,
        };
        (detector, receiver)
    }

    pub fn threshold(&self) -> Threshold {
        self.options.threshold
    }

    pub fn sample_interval(&self) -> Duration {
        self.options.sample_interval
    }

    pub fn state(&self) -> DetectorState {
        match &self.inner.lock().session {
            Some(session) => DetectorState::Recording(session.activity),
            None => DetectorState::Idle,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.state().is_recording()
    }

    /// Current permission without prompting. Only an explicit grant counts.
    pub fn check_permission(&self) -> bool {
        let state = self.permissions.status();
        debug!(state = ?state, "Microphone permission");
        state.is_granted()
    }

    /// Prompt for microphone access. A refusal is reported once through
    /// [`DetectorEvent::PermissionDenied`]; this never fails.
    pub async fn request_permission(&self) -> PermissionResponse {
        request_permission(self.permissions.as_ref(), &self.events).await
    }

    /// [`SoundActivityDetector::request_permission`] as a detached task.
    pub fn spawn_permission_request(&self) -> JoinHandle<PermissionResponse> {
        let permissions = self.permissions.clone();
        let events = self.events.clone();
        self.runtime
            .spawn(async move { request_permission(permissions.as_ref(), &events).await })
    }

    /// Start recording if idle, stop if recording.
    ///
    /// Starting emits [`DetectorEvent::RecordingStarted`] only if the whole
    /// setup succeeded; otherwise the error is logged and the detector stays
    /// idle. Stopping always emits [`DetectorEvent::RecordingFinished`].
    pub fn toggle_recording(&self) {
        let mut inner = self.inner.lock();
        if inner.session.is_some() {
            self.stop(&mut inner);
        } else {
            self.start(&mut inner);
        }
    }

    fn start(&self, inner: &mut Inner<D>) {
        let location = self.options.output_path.clone();
        if let Err(e) = inner.begin_capture(&location, &self.options) {
            error!("Error starting recording: {}", e);
            return;
        }

        inner.next_session += 1;
        let id = inner.next_session;
        inner.session = Some(RecordingSession {
            id,
            location,
            activity: ActivityState::Quiet,
        });
        info!(
            session = id,
            threshold_db = self.options.threshold.db(),
            "Recording started"
        );

        self.send(DetectorEvent::RecordingStarted);
        inner.sampler = Some(self.spawn_sampler(id));
    }

    fn stop(&self, inner: &mut Inner<D>) {
        let location = inner.end_session();
        match &location {
            Some(path) => info!(location = %path.display(), "Recording finished"),
            None => info!("Recording finished without output"),
        }
        self.send(DetectorEvent::RecordingFinished(location));
    }

    fn spawn_sampler(&self, session_id: u64) -> JoinHandle<()> {
        let inner = Arc::downgrade(&self.inner);
        let events = self.events.clone();
        let threshold = self.options.threshold;
        let period = self.options.sample_interval;

        self.runtime.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match run_tick(&inner, session_id, threshold, &events) {
                    ControlFlow::Continue(()) => {}
                    ControlFlow::Break(Halt::Done) => break,
                    ControlFlow::Break(Halt::Interrupted) => {
                        // Stopping the device may block on its capture thread.
                        let inner = inner.clone();
                        if let Err(e) =
                            task::spawn_blocking(move || tear_down(&inner, session_id)).await
                        {
                            error!("Failed to tear down interrupted session: {}", e);
                        }
                        break;
                    }
                }
            }
            debug!(session = session_id, "Sampler stopped");
        })
    }

    fn send(&self, event: DetectorEvent) {
        // The receiver only goes away when the front end shuts down.
        self.events.send(event).ok();
    }
}

impl<D: CaptureDevice> Drop for SoundActivityDetector<D> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        if inner.session.is_some() {
            inner.end_session();
        }
    }
}

async fn request_permission(
    permissions: &dyn PermissionProvider,
    events: &mpsc::UnboundedSender<DetectorEvent>,
) -> PermissionResponse {
    if permissions.request().await {
        info!("Microphone permission granted");
        PermissionResponse::Granted
    } else {
        warn!("Microphone permission denied");
        events.send(DetectorEvent::PermissionDenied).ok();
        PermissionResponse::Denied
    }
}

/// One sampler step. Breaks when the sampler should exit.
fn run_tick<D: CaptureDevice>(
    inner: &Weak<Mutex<Inner<D>>>,
    session_id: u64,
    threshold: Threshold,
    events: &mpsc::UnboundedSender<DetectorEvent>,
) -> ControlFlow<Halt> {
    let Some(inner) = inner.upgrade() else {
        return ControlFlow::Break(Halt::Done);
    };
    let sample = inner.lock().sample(session_id, threshold);

    match sample {
        Sample::Steady => ControlFlow::Continue(()),
        Sample::Edge(event) => {
            events.send(event).ok();
            ControlFlow::Continue(())
        }
        Sample::Stale => ControlFlow::Break(Halt::Done),
        Sample::Interrupted => {
            warn!(
                session = session_id,
                "Recorder not active, stopping monitoring"
            );
            ControlFlow::Break(Halt::Interrupted)
        }
    }
}

/// End an interrupted session without emitting anything. A toggle may have
/// ended or replaced the session since the tick; then there is nothing to do.
fn tear_down<D: CaptureDevice>(inner: &Weak<Mutex<Inner<D>>>, session_id: u64) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let mut inner = inner.lock();
    if inner.session.as_ref().is_some_and(|s| s.id == session_id) {
        // We are the sampler; detach rather than abort ourselves.
        inner.sampler.take();
        inner.end_session();
    }
}
