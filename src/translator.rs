//! The translator screen, minus the screen.
//!
//! [`TranslatorSession`] listens to detector events. Every time sound starts it
//! picks a phrase; when the recording finishes it turns the last pick into a
//! [`Translation`]. Recordings that never heard anything get a placeholder.

use std::path::PathBuf;

use pawlingo_core::{DetectorListener, Pet};
use rand::SeedableRng;
use rand::rngs::StdRng;
use thiserror::Error;
use tracing::{debug, info};

use crate::phrases::PhraseBook;

/// Shown when a recording finished without any sound.
pub const SILENT_PLACEHOLDER: &str = "mew-mew";

/// Which way the translation goes. Only pet to human is supported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    PetToHuman,
    HumanToPet,
}

impl Direction {
    pub fn swap(&mut self) {
        *self = match self {
            Direction::PetToHuman => Direction::HumanToPet,
            Direction::HumanToPet => Direction::PetToHuman,
        };
    }

    /// Left and right labels of the direction switch.
    pub fn labels(&self) -> (&'static str, &'static str) {
        match self {
            Direction::PetToHuman => ("PET", "HUMAN"),
            Direction::HumanToPet => ("HUMAN", "PET"),
        }
    }
}

/// Why a tap on the recorder did not toggle recording.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TapError {
    #[error("Language mismatch: switch the translation direction, we can't translate from human to pet yet")]
    LanguageMismatch,
    #[error("Microphone access required: enable microphone access to start recording")]
    MicrophoneAccess,
}

/// What the result screen shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub text: String,
    pub pet: Pet,
    pub sound_detected: bool,
}

/// Caption of the recorder button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderStatus {
    Idle,
    Recording,
}

impl RecorderStatus {
    pub fn title(&self) -> &'static str {
        match self {
            RecorderStatus::Idle => "Start Speak",
            RecorderStatus::Recording => "Recording...",
        }
    }
}

pub struct TranslatorSession {
    phrases: PhraseBook,
    pet: Pet,
    direction: Direction,
    status: RecorderStatus,
    hearing: bool,
    permission_denied: bool,
    selected: Option<String>,
    result: Option<Translation>,
    rng: StdRng,
}

impl TranslatorSession {
    pub fn new(phrases: PhraseBook, pet: Pet) -> Self {
        Self::with_rng(phrases, pet, StdRng::from_entropy())
    }

    pub fn with_rng(phrases: PhraseBook, pet: Pet, rng: StdRng) -> Self {
        Self {
            phrases,
            pet,
            direction: Direction::default(),
            status: RecorderStatus::Idle,
            hearing: false,
            permission_denied: false,
            selected: None,
            result: None,
            rng,
        }
    }

    pub fn pet(&self) -> Pet {
        self.pet
    }

    pub fn select_pet(&mut self, pet: Pet) {
        self.pet = pet;
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn swap_direction(&mut self) {
        self.direction.swap();
    }

    pub fn status(&self) -> RecorderStatus {
        self.status
    }

    /// True between a sound and the following silence.
    pub fn is_hearing(&self) -> bool {
        self.hearing
    }

    /// True once an explicit permission request was refused.
    pub fn permission_denied(&self) -> bool {
        self.permission_denied
    }

    /// Gate a tap on the recorder. `Ok` means recording may be toggled.
    ///
    /// `recording` is the detector's own state; a session can end without an
    /// event, so the cached status is not trusted here. An active recording
    /// can always be stopped.
    pub fn begin_tap(&self, recording: bool, granted: bool) -> Result<(), TapError> {
        if recording {
            return Ok(());
        }
        if self.direction == Direction::HumanToPet {
            return Err(TapError::LanguageMismatch);
        }
        if !granted {
            return Err(TapError::MicrophoneAccess);
        }
        Ok(())
    }

    /// The translation produced by the last finished recording, if not yet
    /// taken.
    pub fn take_result(&mut self) -> Option<Translation> {
        self.result.take()
    }
}

impl DetectorListener for TranslatorSession {
    fn on_recording_started(&mut self) {
        self.status = RecorderStatus::Recording;
        self.hearing = false;
        // A previous session may have ended without finishing.
        self.selected = None;
        self.result = None;
    }

    fn on_sound_detected(&mut self) {
        let phrase = self.phrases.pick(&mut self.rng).to_string();
        debug!(phrase = %phrase, "Picked translation");
        self.selected = Some(phrase);
        self.hearing = true;
    }

    fn on_silence_detected(&mut self) {
        self.hearing = false;
    }

    fn on_recording_finished(&mut self, location: Option<PathBuf>) {
        self.status = RecorderStatus::Idle;
        self.hearing = false;

        let translation = match self.selected.take() {
            Some(text) => Translation {
                text,
                pet: self.pet,
                sound_detected: true,
            },
            None => Translation {
                text: SILENT_PLACEHOLDER.to_string(),
                pet: self.pet,
                sound_detected: false,
            },
        };
        info!(
            location = ?location,
            sound_detected = translation.sound_detected,
            "Translation ready"
        );
        self.result = Some(translation);
    }

    fn on_permission_denied(&mut self) {
        self.permission_denied = true;
    }
}
