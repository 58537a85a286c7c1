//! The seam between the detector and whatever actually owns the microphone.
//!
//! The detector only knows the sequencing contract: activate the audio route,
//! start capture, enable metering, then sample. Teardown runs the mirror of
//! that. Everything platform specific lives behind [`CaptureDevice`] and
//! [`PermissionProvider`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pawlingo_core::PermissionState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    /// generic anyhow error
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
    /// No recording device available
    #[error("no input device available")]
    NoInputDevice,
    /// Route could not be activated, usually because the device is busy
    #[error("audio route unavailable: {0}")]
    RouteUnavailable(String),
    /// Capture was started before the route was activated
    #[error("capture started without an active route")]
    NotPrepared,
    /// Sample format not supported
    #[error("sample format not supported: {0}")]
    SampleFormatNotSupported(String),
    /// Build stream error
    #[error(transparent)]
    BuildStream(#[from] cpal::BuildStreamError),
    /// Play stream error
    #[error(transparent)]
    PlayStream(#[from] cpal::PlayStreamError),
    /// Capture file could not be written
    #[error(transparent)]
    Writer(#[from] hound::Error),
}

pub type Result<T> = std::result::Result<T, CaptureError>;

/// Encoder quality hint passed along with the capture settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderQuality {
    Low,
    Medium,
    High,
}

/// How the capture should be encoded. Backends honour what they can.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    pub sample_rate: u32,
    pub channels: u16,
    pub quality: EncoderQuality,
}

impl CaptureSettings {
    /// Mono, high quality, at the given rate.
    pub fn mono(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
            quality: EncoderQuality::High,
        }
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self::mono(12_000)
    }
}

/// Options for the shared audio route while a session is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteOptions {
    /// Playback and recording at the same time
    pub play_and_record: bool,
    /// Route output to the speaker instead of the receiver
    pub default_to_speaker: bool,
    /// Allow Bluetooth headsets as input
    pub allow_bluetooth: bool,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            play_and_record: true,
            default_to_speaker: true,
            allow_bluetooth: true,
        }
    }
}

/// A microphone that can record to a file and report its level.
pub trait CaptureDevice: Send + 'static {
    /// Claim the shared audio route.
    fn activate_route(&mut self, options: &RouteOptions) -> Result<()>;

    /// Release the route claimed by [`CaptureDevice::activate_route`].
    fn deactivate_route(&mut self);

    /// Begin writing captured audio to `path`.
    fn start(&mut self, path: &Path, settings: &CaptureSettings) -> Result<()>;

    fn set_metering(&mut self, enabled: bool);

    /// False once capture has ended, including when it was interrupted.
    fn is_capturing(&self) -> bool;

    /// Average power in dB since the previous call.
    fn average_power(&mut self) -> f32;

    /// Stop capture and return where the audio was written, if anywhere.
    fn stop(&mut self) -> Option<PathBuf>;
}

/// Platform microphone permission.
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    /// Current permission, without prompting.
    fn status(&self) -> PermissionState;

    /// Prompt for access if needed. Resolves to whether access was granted.
    async fn request(&self) -> bool;
}
