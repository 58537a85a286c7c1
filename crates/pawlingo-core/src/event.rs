//! Event types for the sound activity detector.
//!
//! These events are used by the audio system to communicate recording and
//! activity changes without depending on any specific UI framework. The
//! detector pushes them onto a channel; whoever drains that channel is the
//! single context all listener callbacks run on.

use std::path::PathBuf;

/// Events emitted by the sound activity detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectorEvent {
    /// Capture is running and the sampler has started
    RecordingStarted,
    /// The input level crossed above the threshold
    SoundDetected,
    /// The input level fell back to or below the threshold
    SilenceDetected,
    /// Recording was toggled off, carrying the capture file location if any
    RecordingFinished(Option<PathBuf>),
    /// The user refused microphone access on an explicit request
    PermissionDenied,
}

impl DetectorEvent {
    /// Route this event to the matching listener method.
    pub fn dispatch<L: DetectorListener + ?Sized>(self, listener: &mut L) {
        match self {
            DetectorEvent::RecordingStarted => listener.on_recording_started(),
            DetectorEvent::SoundDetected => listener.on_sound_detected(),
            DetectorEvent::SilenceDetected => listener.on_silence_detected(),
            DetectorEvent::RecordingFinished(location) => listener.on_recording_finished(location),
            DetectorEvent::PermissionDenied => listener.on_permission_denied(),
        }
    }
}

/// Subscriber for detector events. Every method defaults to doing nothing, so
/// implementors only override what they care about.
pub trait DetectorListener {
    fn on_recording_started(&mut self) {}

    fn on_sound_detected(&mut self) {}

    fn on_silence_detected(&mut self) {}

    fn on_recording_finished(&mut self, _location: Option<PathBuf>) {}

    fn on_permission_denied(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        started: usize,
        finished: Vec<Option<PathBuf>>,
    }

    impl DetectorListener for Counter {
        fn on_recording_started(&mut self) {
            self.started += 1;
        }

        fn on_recording_finished(&mut self, location: Option<PathBuf>) {
            self.finished.push(location);
        }
    }

    #[test]
    fn test_dispatch_routes_to_listener() {
        let mut counter = Counter::default();
        DetectorEvent::RecordingStarted.dispatch(&mut counter);
        DetectorEvent::RecordingFinished(Some(PathBuf::from("/tmp/recording.wav")))
            .dispatch(&mut counter);

        assert_eq!(counter.started, 1);
        assert_eq!(
            counter.finished,
            vec![Some(PathBuf::from("/tmp/recording.wav"))]
        );
    }

    #[test]
    fn test_unhandled_events_are_noops() {
        let mut counter = Counter::default();
        DetectorEvent::SoundDetected.dispatch(&mut counter);
        DetectorEvent::SilenceDetected.dispatch(&mut counter);
        DetectorEvent::PermissionDenied.dispatch(&mut counter);

        assert_eq!(counter.started, 0);
        assert!(counter.finished.is_empty());
    }
}
