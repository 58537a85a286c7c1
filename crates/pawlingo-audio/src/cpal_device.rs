//! Capture backend built on cpal. There can only be one active capture at a
//! time, and the capture file is overwritten by every new session.
//!
//! ## Format notes
//!
//! Audio is downmixed to mono and written as 16 bit WAV through hound. The
//! requested sample rate is used when the device supports it, otherwise the
//! device default rate is kept. The container is a detail for whoever picks
//! the file up afterwards; the detector only cares about levels.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use anyhow::anyhow;
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use hound::WavWriter;
use parking_lot::Mutex;
use pawlingo_core::PermissionState;
use tracing::{debug, error, info, warn};

use crate::capture::{
    CaptureDevice, CaptureError, CaptureSettings, PermissionProvider, Result, RouteOptions,
};

/// Floor of the power scale, reported for digital silence.
pub const MIN_DB: f32 = -160.0;

type WavWriterHandle = Arc<Mutex<Option<WavWriter<BufWriter<File>>>>>;

/// Running mean-square accumulator shared with the input callback.
#[derive(Debug)]
struct Meter {
    enabled: AtomicBool,
    inner: Mutex<MeterState>,
}

#[derive(Debug)]
struct MeterState {
    sum_squares: f64,
    samples: u64,
    last_db: f32,
}

impl Meter {
    fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            inner: Mutex::new(MeterState {
                sum_squares: 0.0,
                samples: 0,
                last_db: MIN_DB,
            }),
        }
    }

    fn accumulate(&self, sample: f32) {
        let mut state = self.inner.lock();
        state.sum_squares += f64::from(sample) * f64::from(sample);
        state.samples += 1;
    }

    /// Drain the accumulator. Without new samples the previous reading holds.
    fn take_db(&self) -> f32 {
        if !self.enabled.load(Ordering::Relaxed) {
            return MIN_DB;
        }
        let mut state = self.inner.lock();
        if state.samples > 0 {
            let mean = state.sum_squares / state.samples as f64;
            state.last_db = rms_db(mean.sqrt() as f32);
            state.sum_squares = 0.0;
            state.samples = 0;
        }
        state.last_db
    }

    fn reset(&self) {
        let mut state = self.inner.lock();
        state.sum_squares = 0.0;
        state.samples = 0;
        state.last_db = MIN_DB;
    }
}

/// Convert an RMS amplitude to dBFS.
pub fn rms_db(rms: f32) -> f32 {
    if rms <= 0.0 {
        return MIN_DB;
    }
    (20.0 * rms.log10()).clamp(MIN_DB, 0.0)
}

/// The thread that owns the cpal stream. cpal streams are not `Send`, so the
/// stream is parked on its own thread and we talk to it via channels.
struct CaptureWorker {
    stop: mpsc::Sender<()>,
    thread: JoinHandle<()>,
    path: PathBuf,
}

/// [`CaptureDevice`] backed by the default cpal host.
pub struct CpalCapture {
    route: Option<String>,
    meter: Arc<Meter>,
    capturing: Arc<AtomicBool>,
    worker: Option<CaptureWorker>,
}

impl CpalCapture {
    pub fn new() -> Self {
        Self {
            route: None,
            meter: Arc::new(Meter::new()),
            capturing: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    fn finish_worker(&mut self) -> Option<PathBuf> {
        let worker = self.worker.take()?;
        // The worker may already be gone if the stream died; ignore send errors.
        worker.stop.send(()).ok();
        if worker.thread.join().is_err() {
            error!("capture thread panicked");
        }
        self.capturing.store(false, Ordering::SeqCst);
        info!(path = %worker.path.display(), "Capture saved");
        Some(worker.path)
    }
}

impl Default for CpalCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureDevice for CpalCapture {
    fn activate_route(&mut self, options: &RouteOptions) -> Result<()> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or(CaptureError::NoInputDevice)?;
        let name = device
            .name()
            .map_err(|e| CaptureError::RouteUnavailable(e.to_string()))?;

        info!(device_name = %name, options = ?options, "Audio route active");
        self.route = Some(name);
        Ok(())
    }

    fn deactivate_route(&mut self) {
        if let Some(name) = self.route.take() {
            debug!(device_name = %name, "Audio route released");
        }
    }

    fn start(&mut self, path: &Path, settings: &CaptureSettings) -> Result<()> {
        let route = self.route.clone().ok_or(CaptureError::NotPrepared)?;
        // Never leave a previous capture thread running.
        self.finish_worker();
        self.meter.reset();

        let (ready_tx, ready_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel();
        let job = CaptureJob {
            route,
            path: path.to_path_buf(),
            settings: *settings,
            meter: self.meter.clone(),
            capturing: self.capturing.clone(),
        };

        let thread = thread::Builder::new()
            .name("pawlingo-capture".to_string())
            .spawn(move || job.run(ready_tx, stop_rx))
            .map_err(|e| CaptureError::Anyhow(e.into()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.worker = Some(CaptureWorker {
                    stop: stop_tx,
                    thread,
                    path: path.to_path_buf(),
                });
                Ok(())
            }
            Ok(Err(e)) => {
                thread.join().ok();
                Err(e)
            }
            Err(_) => {
                thread.join().ok();
                Err(CaptureError::Anyhow(anyhow!(
                    "capture thread exited before starting"
                )))
            }
        }
    }

    fn set_metering(&mut self, enabled: bool) {
        self.meter.enabled.store(enabled, Ordering::Relaxed);
    }

    fn is_capturing(&self) -> bool {
        self.worker.is_some() && self.capturing.load(Ordering::SeqCst)
    }

    fn average_power(&mut self) -> f32 {
        self.meter.take_db()
    }

    fn stop(&mut self) -> Option<PathBuf> {
        self.finish_worker()
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        self.finish_worker();
    }
}

/// Everything the capture thread needs to build and own a stream.
struct CaptureJob {
    route: String,
    path: PathBuf,
    settings: CaptureSettings,
    meter: Arc<Meter>,
    capturing: Arc<AtomicBool>,
}

impl CaptureJob {
    fn run(self, ready: mpsc::Sender<Result<()>>, stop: mpsc::Receiver<()>) {
        let (stream, writer) = match self.open() {
            Ok(opened) => opened,
            Err(e) => {
                ready.send(Err(e)).ok();
                return;
            }
        };
        ready.send(Ok(())).ok();

        // Park until asked to stop or the owner goes away.
        stop.recv().ok();

        stream.pause().ok();
        drop(stream);
        self.capturing.store(false, Ordering::SeqCst);

        // Finalize the writer so it writes the proper framing information.
        let finalized = writer.lock().take().map(|w| w.finalize());
        if let Some(Err(e)) = finalized {
            error!("failed to finalize capture file: {}", e);
        }
    }

    fn open(&self) -> Result<(cpal::Stream, WavWriterHandle)> {
        let device = find_input_device(&self.route)?;
        let config = pick_config(&device, &self.settings)?;

        info!(
            device_name = %self.route,
            requested_rate = self.settings.sample_rate,
            config = ?config,
            "Capturing from device"
        );

        if self.settings.channels != 1 {
            debug!(
                channels = self.settings.channels,
                "Capture is always downmixed to mono"
            );
        }
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: config.sample_rate().0,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = Arc::new(Mutex::new(Some(WavWriter::create(&self.path, spec)?)));

        let stream_config: cpal::StreamConfig = config.config();
        let stream = match config.sample_format() {
            cpal::SampleFormat::I8 => self.build::<i8>(&device, &stream_config, &writer)?,
            cpal::SampleFormat::I16 => self.build::<i16>(&device, &stream_config, &writer)?,
            cpal::SampleFormat::I32 => self.build::<i32>(&device, &stream_config, &writer)?,
            cpal::SampleFormat::U16 => self.build::<u16>(&device, &stream_config, &writer)?,
            cpal::SampleFormat::F32 => self.build::<f32>(&device, &stream_config, &writer)?,
            sample_format => {
                return Err(CaptureError::SampleFormatNotSupported(format!(
                    "{:?}",
                    sample_format
                )));
            }
        };

        // Set before play so a stream error raised right away is not lost.
        self.capturing.store(true, Ordering::SeqCst);
        if let Err(e) = stream.play() {
            self.capturing.store(false, Ordering::SeqCst);
            return Err(e.into());
        }
        Ok((stream, writer))
    }

    fn build<T>(
        &self,
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        writer: &WavWriterHandle,
    ) -> Result<cpal::Stream>
    where
        T: SizedSample,
        f32: FromSample<T>,
    {
        let channels = usize::from(config.channels.max(1));
        let writer = writer.clone();
        let meter = self.meter.clone();

        let stream = device.build_input_stream(
            config,
            move |data: &[T], _: &_| write_input_data(data, channels, &writer, &meter),
            stream_error_handler(self.capturing.clone()),
            None,
        )?;
        Ok(stream)
    }
}

/// Any stream error ends the capture as far as the detector is concerned.
fn stream_error_handler(capturing: Arc<AtomicBool>) -> impl FnMut(cpal::StreamError) + Send {
    move |err| {
        error!("an error occurred on stream: {}", err);
        capturing.store(false, Ordering::SeqCst);
    }
}

fn find_input_device(name: &str) -> Result<cpal::Device> {
    let host = cpal::default_host();
    let named = host
        .input_devices()
        .map_err(|e| CaptureError::RouteUnavailable(e.to_string()))?
        .find(|device| device.name().map(|n| n == name).unwrap_or(false));

    match named {
        Some(device) => Ok(device),
        None => {
            warn!(device_name = %name, "Routed device disappeared, using default input");
            host.default_input_device()
                .ok_or(CaptureError::NoInputDevice)
        }
    }
}

/// Prefer a supported config covering the requested rate, else the default.
fn pick_config(
    device: &cpal::Device,
    settings: &CaptureSettings,
) -> Result<cpal::SupportedStreamConfig> {
    let wanted = settings.sample_rate;
    if let Ok(ranges) = device.supported_input_configs() {
        let mut ranges: Vec<_> = ranges
            .filter(|r| r.min_sample_rate().0 <= wanted && wanted <= r.max_sample_rate().0)
            .collect();
        // Fewest channels first, we downmix anyway.
        ranges.sort_by_key(|r| r.channels());
        if let Some(range) = ranges.into_iter().next() {
            return Ok(range.with_sample_rate(cpal::SampleRate(wanted)));
        }
    }

    debug!(
        requested_rate = settings.sample_rate,
        "Requested rate unsupported, using device default"
    );
    device
        .default_input_config()
        .map_err(|_| CaptureError::NoInputDevice)
}

fn write_input_data<T>(input: &[T], channels: usize, writer: &WavWriterHandle, meter: &Meter)
where
    T: Sample,
    f32: FromSample<T>,
{
    let metering = meter.enabled.load(Ordering::Relaxed);
    // Never block the audio callback; a busy writer just drops this buffer.
    let mut guard = writer.try_lock();
    let mut wav = guard.as_deref_mut().and_then(Option::as_mut);

    for frame in input.chunks(channels) {
        let mono = frame.iter().map(|&s| f32::from_sample(s)).sum::<f32>() / frame.len() as f32;
        if metering {
            meter.accumulate(mono);
        }
        if let Some(wav) = &mut wav {
            wav.write_sample(i16::from_sample(mono)).ok();
        }
    }
}

/// Desktop hosts never prompt for microphone access, so permission is
/// inferred from whether an input device is reachable at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalPermissions;

impl CpalPermissions {
    fn input_reachable() -> PermissionState {
        match cpal::default_host().input_devices() {
            Ok(mut devices) => {
                if devices.next().is_some() {
                    PermissionState::Granted
                } else {
                    PermissionState::Denied
                }
            }
            Err(e) => {
                warn!("Failed to enumerate input devices: {}", e);
                PermissionState::Undetermined
            }
        }
    }
}

#[async_trait]
impl PermissionProvider for CpalPermissions {
    fn status(&self) -> PermissionState {
        Self::input_reachable()
    }

    async fn request(&self) -> bool {
        match tokio::task::spawn_blocking(Self::input_reachable).await {
            Ok(state) => state.is_granted(),
            Err(e) => {
                error!("Permission check failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_db_full_scale() {
        assert_eq!(rms_db(1.0), 0.0);
        assert!((rms_db(0.1) + 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_rms_db_silence_is_floor() {
        assert_eq!(rms_db(0.0), MIN_DB);
        assert_eq!(rms_db(1e-12), MIN_DB);
    }

    #[test]
    fn test_meter_disabled_reads_floor() {
        let meter = Meter::new();
        meter.accumulate(0.5);
        assert_eq!(meter.take_db(), MIN_DB);
    }

    #[test]
    fn test_meter_drains_and_holds() {
        let meter = Meter::new();
        meter.enabled.store(true, Ordering::Relaxed);
        for _ in 0..10 {
            meter.accumulate(0.1);
        }
        let first = meter.take_db();
        assert!((first + 20.0).abs() < 1e-3);
        // No new samples: the previous reading holds.
        assert_eq!(meter.take_db(), first);

        meter.accumulate(1.0);
        assert!(meter.take_db().abs() < 1e-3);
    }

    #[test]
    fn test_write_input_data_downmixes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 12_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer: WavWriterHandle =
            Arc::new(Mutex::new(Some(WavWriter::create(&path, spec).unwrap())));
        let meter = Meter::new();
        meter.enabled.store(true, Ordering::Relaxed);

        // Two stereo frames: (0.5, 0.5) and (1.0, -1.0)
        write_input_data(&[0.5f32, 0.5, 1.0, -1.0], 2, &writer, &meter);
        writer.lock().take().unwrap().finalize().unwrap();

        let samples: Vec<i16> = hound::WavReader::open(&path)
            .unwrap()
            .into_samples::<i16>()
            .map(|s| s.unwrap())
            .collect();
        assert_eq!(samples.len(), 2);
        assert!(samples[0] > 16_000);
        assert_eq!(samples[1], 0);
    }

    #[test]
    fn test_stream_error_stops_capturing() {
        let capturing = Arc::new(AtomicBool::new(true));
        let mut on_error = stream_error_handler(capturing.clone());

        on_error(cpal::StreamError::DeviceNotAvailable);
        assert!(!capturing.load(Ordering::SeqCst));
    }

    #[test]
    fn test_start_without_route_fails() {
        let mut capture = CpalCapture::new();
        let dir = tempfile::tempdir().unwrap();
        let err = capture
            .start(&dir.path().join("x.wav"), &CaptureSettings::default())
            .unwrap_err();
        assert!(matches!(err, CaptureError::NotPrepared));
        assert!(!capture.is_capturing());
        assert_eq!(capture.stop(), None);
    }
}
