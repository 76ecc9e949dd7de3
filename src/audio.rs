use crate::config::BandPolicy;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SampleFormat};
use ringbuf::HeapRb;
use ringbuf::traits::{Consumer as _, Producer as _, Split as _};
use rustfft::FftPlanner;
use rustfft::num_complex::Complex;
use std::f32::consts::PI;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering, fence};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Bins at or below this raw magnitude are excluded from every sum.
pub const NOISE_GATE: u8 = 10;

/// Consecutive fully gated samples before the signal is reported silent (~3 s at 60 fps).
pub const SILENCE_FRAMES: u32 = 180;

/// Snapshot age after which an open session is reported stalled.
pub const STALL_AFTER: Duration = Duration::from_millis(1000);

const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;
const SMOOTHING: f32 = 0.8;

const BASS_HZ: (f32, f32) = (80.0, 300.0);
const MID_HZ: (f32, f32) = (300.0, 3000.0);
const TREBLE_HZ: (f32, f32) = (3000.0, 8000.0);

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("no default input device found")]
    NoInputDevice,
    #[error("no input device matching: {query}")]
    DeviceNotFound { query: String },
    #[error("enumerate input devices: {0}")]
    Enumerate(#[from] cpal::DevicesError),
    #[error("query default input config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),
    #[error("unsupported sample format: {0:?}")]
    UnsupportedFormat(SampleFormat),
    #[error("open input stream (permission denied or device busy?): {0}")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("start input stream: {0}")]
    Play(#[from] cpal::PlayStreamError),
    #[error("spawn analysis thread: {0}")]
    SpawnAnalysis(#[source] io::Error),
    #[error("fft size must be a power of two in 256..=32768, got {0}")]
    InvalidFftSize(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    pub device: Option<String>,
    pub fft_size: usize,
    pub policy: BandPolicy,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: None,
            fft_size: 4096,
            policy: BandPolicy::Frequency,
        }
    }
}

impl CaptureConfig {
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn validate(&self) -> Result<(), CaptureError> {
        let n = self.fft_size;
        if !n.is_power_of_two() || !(256..=32768).contains(&n) {
            return Err(CaptureError::InvalidFftSize(n));
        }
        Ok(())
    }
}

/// Per-frame summary of a magnitude snapshot. Every field is in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BandEnergies {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub average: f32,
    /// Spectral centroid as a fraction of the bin count.
    pub brightness: f32,
}

#[derive(Clone, Copy, Default)]
struct BandAcc {
    sum: f64,
    count: u32,
}

impl BandAcc {
    fn energy(self) -> f32 {
        if self.count == 0 {
            return 0.0;
        }
        ((self.sum / 255.0 / self.count as f64) as f32).clamp(0.0, 1.0)
    }
}

/// Reduce byte magnitudes (one per bin, `0..=255`) to band energies.
///
/// Bins at or below [`NOISE_GATE`] are dropped before any sum, including the
/// centroid. Band values are averaged over contributing bins only, so an
/// empty band reads 0. `average` is divided by the full bin count.
pub fn analyze(mags: &[u8], sample_rate_hz: u32, policy: BandPolicy) -> BandEnergies {
    let n = mags.len();
    if n == 0 {
        return BandEnergies::default();
    }

    let bin_hz = sample_rate_hz as f32 / 2.0 / n as f32;
    let (bass_end, mid_end) = index_split_points(n);

    let mut bands = [BandAcc::default(); 3];
    let mut total = 0.0f64;
    let mut weighted = 0.0f64;

    for (i, &m) in mags.iter().enumerate() {
        if m <= NOISE_GATE {
            continue;
        }
        let m = m as f64;
        total += m;
        weighted += i as f64 * m;

        let band = match policy {
            BandPolicy::Frequency => band_for_hz(i as f32 * bin_hz),
            BandPolicy::IndexSplit => Some(if i < bass_end {
                0
            } else if i < mid_end {
                1
            } else {
                2
            }),
        };
        if let Some(b) = band {
            bands[b].sum += m;
            bands[b].count += 1;
        }
    }

    let average = ((total / 255.0 / n as f64) as f32).clamp(0.0, 1.0);
    let brightness = if total > 0.0 {
        ((weighted / total) as f32 / n as f32).clamp(0.0, 1.0)
    } else {
        0.0
    };

    BandEnergies {
        bass: bands[0].energy(),
        mid: bands[1].energy(),
        treble: bands[2].energy(),
        average,
        brightness,
    }
}

/// Exclusive end indices of the bass and mid partitions for the index-split policy.
pub fn index_split_points(n: usize) -> (usize, usize) {
    let bass_end = (n as f32 * 0.1).ceil() as usize;
    let mid_end = (n as f32 * 0.5).ceil() as usize;
    (bass_end.min(n), mid_end.min(n))
}

fn band_for_hz(f: f32) -> Option<usize> {
    if f >= BASS_HZ.0 && f < BASS_HZ.1 {
        Some(0)
    } else if f >= MID_HZ.0 && f < MID_HZ.1 {
        Some(1)
    } else if f >= TREBLE_HZ.0 && f < TREBLE_HZ.1 {
        Some(2)
    } else {
        None
    }
}

/// Latest byte spectrum shared between the analysis thread and the frame loop.
///
/// Single writer, any number of readers. Readers retry while a write is in
/// flight; the writer never waits. Last write wins.
pub struct SpectrumBuffer {
    seq: AtomicU64,
    bins: Box<[AtomicU8]>,
    sample_rate_hz: u32,
    epoch: Instant,
    // Nanoseconds after `epoch` plus one; zero until the first publish.
    updated_ns: AtomicU64,
}

impl SpectrumBuffer {
    pub fn new(bin_count: usize, sample_rate_hz: u32) -> Self {
        Self {
            seq: AtomicU64::new(0),
            bins: (0..bin_count).map(|_| AtomicU8::new(0)).collect(),
            sample_rate_hz,
            epoch: Instant::now(),
            updated_ns: AtomicU64::new(0),
        }
    }

    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    pub fn publish(&self, mags: &[u8]) {
        self.seq.fetch_add(1, Ordering::Relaxed); // odd => write in progress
        fence(Ordering::Release);
        for (dst, &src) in self.bins.iter().zip(mags) {
            dst.store(src, Ordering::Relaxed);
        }
        self.updated_ns.store(self.elapsed_ns() + 1, Ordering::Relaxed);
        self.seq.fetch_add(1, Ordering::Release); // even => stable
    }

    /// Copy the latest snapshot into `out` and return its generation.
    pub fn read_into(&self, out: &mut [u8]) -> u64 {
        loop {
            let v1 = self.seq.load(Ordering::Acquire);
            if v1 & 1 == 1 {
                std::hint::spin_loop();
                continue;
            }

            for (dst, src) in out.iter_mut().zip(self.bins.iter()) {
                *dst = src.load(Ordering::Relaxed);
            }

            fence(Ordering::Acquire);
            let v2 = self.seq.load(Ordering::Relaxed);
            if v1 == v2 {
                return v1 / 2;
            }
        }
    }

    /// Number of completed publishes.
    pub fn generation(&self) -> u64 {
        self.seq.load(Ordering::Acquire) / 2
    }

    /// Time since the last publish on a monotonic clock. Zero before the first one.
    pub fn age(&self) -> Duration {
        match self.updated_ns.load(Ordering::Relaxed) {
            0 => Duration::ZERO,
            t => Duration::from_nanos(self.elapsed_ns().saturating_sub(t - 1)),
        }
    }

    fn elapsed_ns(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX - 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalStatus {
    /// No capture session.
    Idle,
    Live,
    /// Every bin has been under the noise gate for a while (muted or unplugged mic).
    Silent,
    /// The analysis thread stopped publishing.
    Stalled,
}

impl SignalStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Live => "live",
            Self::Silent => "silent",
            Self::Stalled => "stalled",
        }
    }
}

pub fn list_input_devices() -> anyhow::Result<()> {
    use anyhow::Context;

    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());
    let devices = host.input_devices().context("enumerate input devices")?;

    let mut out = io::stdout();
    writeln!(out, "Input devices:")?;
    for dev in devices {
        let name = dev.name().unwrap_or_else(|_| "<unknown>".to_string());
        let mark = if default_name.as_deref() == Some(name.as_str()) {
            " (default)"
        } else {
            ""
        };
        writeln!(out, "  - {name}{mark}")?;
    }
    Ok(())
}

struct CaptureSession {
    spectrum: Arc<SpectrumBuffer>,
    // None when the spectrum is fed externally.
    mic: Option<MicCapture>,
}

/// Turns the latest spectrum snapshot into [`BandEnergies`] once per frame.
pub struct SpectrumAnalyzer {
    policy: BandPolicy,
    session: Option<CaptureSession>,
    scratch: Vec<u8>,
    silent_frames: u32,
    status: SignalStatus,
    stall_after: Duration,
}

impl SpectrumAnalyzer {
    pub fn new(policy: BandPolicy) -> Self {
        Self {
            policy,
            session: None,
            scratch: Vec::new(),
            silent_frames: 0,
            status: SignalStatus::Idle,
            stall_after: STALL_AFTER,
        }
    }

    /// Override how old a snapshot may get before the signal reads as stalled.
    pub fn with_stall_after(mut self, stall_after: Duration) -> Self {
        self.stall_after = stall_after;
        self
    }

    pub fn stall_after(&self) -> Duration {
        self.stall_after
    }

    /// Acquire the input device and start the background transform.
    ///
    /// On failure nothing stays acquired and the analyzer is closed.
    pub fn open(&mut self, cfg: &CaptureConfig) -> Result<(), CaptureError> {
        self.close();
        cfg.validate()?;
        self.policy = cfg.policy;

        let (mic, spectrum) = MicCapture::start(cfg)?;
        info!(
            device = %mic.device_name,
            sample_rate_hz = spectrum.sample_rate_hz(),
            bins = spectrum.bin_count(),
            policy = ?self.policy,
            "capture opened"
        );
        self.install(CaptureSession {
            spectrum,
            mic: Some(mic),
        });
        Ok(())
    }

    /// Open a session that reads from an externally written spectrum.
    pub fn attach(&mut self, spectrum: Arc<SpectrumBuffer>) {
        self.close();
        debug!(bins = spectrum.bin_count(), "external spectrum attached");
        self.install(CaptureSession {
            spectrum,
            mic: None,
        });
    }

    fn install(&mut self, session: CaptureSession) {
        self.scratch = vec![0; session.spectrum.bin_count()];
        self.silent_frames = 0;
        self.status = SignalStatus::Live;
        self.session = Some(session);
    }

    /// Release the device and the transform thread. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            let was_mic = session.mic.is_some();
            drop(session);
            if was_mic {
                info!("capture closed");
            }
        }
        self.scratch.clear();
        self.silent_frames = 0;
        self.status = SignalStatus::Idle;
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn policy(&self) -> BandPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: BandPolicy) {
        self.policy = policy;
    }

    pub fn bin_count(&self) -> usize {
        self.session
            .as_ref()
            .map(|s| s.spectrum.bin_count())
            .unwrap_or(0)
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.session
            .as_ref()
            .map(|s| s.spectrum.sample_rate_hz())
            .unwrap_or(0)
    }

    pub fn signal_status(&self) -> SignalStatus {
        self.status
    }

    /// Read the latest snapshot and reduce it. Zeroed while closed.
    pub fn sample(&mut self) -> BandEnergies {
        let Some(session) = self.session.as_ref() else {
            return BandEnergies::default();
        };

        session.spectrum.read_into(&mut self.scratch);
        let age = session.spectrum.age();
        let bands = analyze(&self.scratch, session.spectrum.sample_rate_hz(), self.policy);

        if bands.average > 0.0 {
            self.silent_frames = 0;
        } else {
            self.silent_frames = self.silent_frames.saturating_add(1);
        }

        let next = if age > self.stall_after {
            SignalStatus::Stalled
        } else if self.silent_frames >= SILENCE_FRAMES {
            SignalStatus::Silent
        } else {
            SignalStatus::Live
        };
        if next != self.status {
            match next {
                SignalStatus::Stalled => {
                    warn!(age_ms = age.as_millis() as u64, "spectrum stalled")
                }
                SignalStatus::Silent => warn!(frames = self.silent_frames, "input is silent"),
                _ => info!(from = self.status.label(), "signal live"),
            }
            self.status = next;
        }

        bands
    }
}

impl Drop for SpectrumAnalyzer {
    fn drop(&mut self) {
        self.close();
    }
}

struct MicCapture {
    stream: cpal::Stream,
    stop: Arc<AtomicBool>,
    analysis_handle: Option<thread::JoinHandle<()>>,
    device_name: String,
}

impl MicCapture {
    fn start(cfg: &CaptureConfig) -> Result<(Self, Arc<SpectrumBuffer>), CaptureError> {
        let host = cpal::default_host();
        let device = select_input_device(&host, cfg.device.as_deref())?;
        let device_name = device.name().unwrap_or_else(|_| "<unknown>".to_string());
        let supported = device.default_input_config()?;
        let sample_rate_hz = supported.sample_rate().0;
        let channels = (supported.channels() as usize).max(1);
        let config: cpal::StreamConfig = supported.clone().into();

        let rb_capacity = (sample_rate_hz as usize).saturating_mul(2).max(cfg.fft_size * 2);
        let rb = HeapRb::<f32>::new(rb_capacity);
        let (mut prod, mut cons) = rb.split();

        let err_fn = |err| warn!("audio stream error: {err}");

        let stream = match supported.sample_format() {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _| push_mono(data, channels, &mut prod),
                err_fn,
                None,
            )?,
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _| push_mono(data, channels, &mut prod),
                err_fn,
                None,
            )?,
            SampleFormat::U16 => device.build_input_stream(
                &config,
                move |data: &[u16], _| push_mono(data, channels, &mut prod),
                err_fn,
                None,
            )?,
            fmt => return Err(CaptureError::UnsupportedFormat(fmt)),
        };
        stream.play()?;

        let spectrum = Arc::new(SpectrumBuffer::new(cfg.bin_count(), sample_rate_hz));
        let stop = Arc::new(AtomicBool::new(false));
        let spectrum_for_thread = Arc::clone(&spectrum);
        let stop_for_thread = Arc::clone(&stop);
        let fft_size = cfg.fft_size;

        // The stream is dropped with this scope if the spawn fails.
        let analysis_handle = thread::Builder::new()
            .name("spectrum-analysis".to_string())
            .spawn(move || {
                analyze_loop(&mut cons, fft_size, &stop_for_thread, &spectrum_for_thread)
            })
            .map_err(CaptureError::SpawnAnalysis)?;

        Ok((
            Self {
                stream,
                stop,
                analysis_handle: Some(analysis_handle),
                device_name,
            },
            spectrum,
        ))
    }
}

impl Drop for MicCapture {
    fn drop(&mut self) {
        let _ = self.stream.pause();
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.analysis_handle.take() {
            let _ = h.join();
        }
    }
}

fn select_input_device(
    host: &cpal::Host,
    device_query: Option<&str>,
) -> Result<cpal::Device, CaptureError> {
    let Some(query) = device_query.map(|s| s.trim().to_lowercase()) else {
        return host.default_input_device().ok_or(CaptureError::NoInputDevice);
    };

    let found = host.input_devices()?.find(|d| {
        d.name()
            .map(|n| n.to_lowercase().contains(&query))
            .unwrap_or(false)
    });
    found.ok_or(CaptureError::DeviceNotFound { query })
}

fn push_mono<T: Sample<Float = f32> + Copy>(
    data: &[T],
    channels: usize,
    prod: &mut ringbuf::HeapProd<f32>,
) {
    for frame in data.chunks(channels) {
        let mut acc = 0.0f32;
        for s in frame {
            acc += (*s).to_float_sample();
        }
        let _ = prod.try_push(acc / frame.len().max(1) as f32);
    }
}

fn analyze_loop(
    cons: &mut ringbuf::HeapCons<f32>,
    n: usize,
    stop: &AtomicBool,
    spectrum: &SpectrumBuffer,
) {
    let hop = (n / 4).max(256);

    let mut scratch = vec![0.0f32; n];
    let mut write_pos = 0usize;
    let mut filled = 0usize;
    let mut since_last = 0usize;

    let hann = (0..n)
        .map(|i| 0.5 - 0.5 * ((2.0 * PI * i as f32) / (n as f32)).cos())
        .collect::<Vec<_>>();

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n);
    let mut fft_buf = vec![Complex { re: 0.0, im: 0.0 }; n];
    let mut smoothed = vec![0.0f32; n / 2];
    let mut bytes = vec![0u8; n / 2];

    while !stop.load(Ordering::Relaxed) {
        let mut got_any = false;
        while let Some(s) = cons.try_pop() {
            got_any = true;
            scratch[write_pos] = s;
            write_pos = (write_pos + 1) % n;
            if filled < n {
                filled += 1;
            }
            since_last += 1;
            if filled == n && since_last >= hop {
                since_last = 0;
                transform_window(&scratch, write_pos, &hann, &*fft, &mut fft_buf, &mut smoothed);
                magnitudes_to_bytes(&smoothed, &mut bytes);
                spectrum.publish(&bytes);
            }
        }

        if !got_any {
            thread::sleep(Duration::from_millis(1));
        }
    }
}

fn transform_window(
    scratch: &[f32],
    write_pos: usize,
    hann: &[f32],
    fft: &dyn rustfft::Fft<f32>,
    fft_buf: &mut [Complex<f32>],
    smoothed: &mut [f32],
) {
    let n = fft_buf.len();
    for i in 0..n {
        let s = scratch[(write_pos + i) % n];
        fft_buf[i].re = s * hann[i];
        fft_buf[i].im = 0.0;
    }

    fft.process(fft_buf);
    let norm = 1.0 / n as f32;
    for (s, c) in smoothed.iter_mut().zip(fft_buf.iter()) {
        let m = (c.re * c.re + c.im * c.im).sqrt() * norm;
        *s = SMOOTHING * *s + (1.0 - SMOOTHING) * m;
    }
}

/// Map linear magnitudes onto `0..=255` over the `[MIN_DB, MAX_DB]` window.
pub fn magnitudes_to_bytes(mags: &[f32], out: &mut [u8]) {
    let range = MAX_DB - MIN_DB;
    for (dst, &m) in out.iter_mut().zip(mags) {
        let db = if m > 0.0 { 20.0 * m.log10() } else { MIN_DB };
        let v = ((db - MIN_DB) / range * 255.0).clamp(0.0, 255.0);
        *dst = v as u8;
    }
}
