//! Microphone capture and sound activity detection for pawlingo.
//!
//! [`SoundActivityDetector`] drives any [`CaptureDevice`]; [`CpalCapture`] is
//! the device used by the application.

mod capture;
mod cpal_device;
mod detector;

#[cfg(test)]
mod testing;

pub use capture::{
    CaptureDevice, CaptureError, CaptureSettings, EncoderQuality, PermissionProvider, Result,
    RouteOptions,
};
pub use cpal_device::{CpalCapture, CpalPermissions, MIN_DB, rms_db};
pub use detector::{
    DetectorOptions, MAX_SAMPLE_INTERVAL, MIN_SAMPLE_INTERVAL, PermissionResponse,
    SoundActivityDetector,
};
