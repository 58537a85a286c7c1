//! Detector state types.

/// Loudness threshold on the decibel power scale reported by capture devices.
///
/// Fixed for the lifetime of a detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold(f32);

impl Threshold {
    /// Threshold used when nothing else is configured.
    pub const DEFAULT_DB: f32 = -45.0;

    pub fn new(db: f32) -> Self {
        Self(db)
    }

    pub fn db(&self) -> f32 {
        self.0
    }

    /// A level counts as loud only when strictly above the threshold.
    pub fn is_loud(&self, level_db: f32) -> bool {
        level_db > self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(Self::DEFAULT_DB)
    }
}

/// A transition of the [`ActivityState`] machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Quiet -> Active
    SoundStarted,
    /// Active -> Quiet
    SoundStopped,
}

/// Whether the input is currently considered loud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivityState {
    #[default]
    Quiet,
    Active,
}

impl ActivityState {
    /// Feed one classified sample into the machine. Returns the edge taken, or
    /// `None` when the sample repeats the current state.
    pub fn observe(&mut self, loud: bool) -> Option<Edge> {
        match (*self, loud) {
            (ActivityState::Quiet, true) => {
                *self = ActivityState::Active;
                Some(Edge::SoundStarted)
            }
            (ActivityState::Active, false) => {
                *self = ActivityState::Quiet;
                Some(Edge::SoundStopped)
            }
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        *self = ActivityState::Quiet;
    }
}

/// The externally visible state of a sound activity detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectorState {
    /// Not recording, no sampling happening
    #[default]
    Idle,
    /// A capture session is running
    Recording(ActivityState),
}

impl DetectorState {
    pub fn is_recording(&self) -> bool {
        matches!(self, DetectorState::Recording(_))
    }
}

/// Microphone permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
    Undetermined,
}

impl PermissionState {
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionState::Granted)
    }
}
