// Re-export from sub-crates
pub use pawlingo_audio::{
    CaptureDevice, CaptureError, CpalCapture, CpalPermissions, DetectorOptions,
    PermissionProvider, PermissionResponse, SoundActivityDetector,
};
pub use pawlingo_core::{
    APP_NAME, APP_NAME_PRETTY, Config, ConfigManager, DEFAULT_LOG_LEVEL, DetectorEvent,
    DetectorListener, DetectorState, LOG_ENV, Pet, Threshold,
};

// App-specific modules
pub mod command;
pub mod phrases;
pub mod translator;

// Version from this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
