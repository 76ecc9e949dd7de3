use crate::audio::CaptureConfig;
use crate::visual::{FrameSettings, MAX_PARTICLES};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

pub const MIN_SENSITIVITY: f32 = 0.1;
pub const MAX_SENSITIVITY: f32 = 3.0;

#[derive(Parser, Debug, Clone)]
#[command(name = "audioscape", version, about = "Microphone-reactive waves and particles in the terminal")]
pub struct Config {
    #[arg(long, value_enum, default_value_t = Mode::Combined)]
    pub mode: Mode,

    #[arg(long, default_value_t = 1.0)]
    pub sensitivity: f32,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub trails: bool,

    #[arg(long, default_value_t = 4096)]
    pub fft_size: usize,

    #[arg(long, value_enum, default_value_t = BandPolicy::Frequency)]
    pub policy: BandPolicy,

    #[arg(long, default_value_t = 200)]
    pub particles: usize,

    #[arg(long, value_enum, default_value_t = RendererMode::HalfBlock)]
    pub renderer: RendererMode,

    #[arg(long, default_value_t = 60)]
    pub fps: u32,

    #[arg(long, default_value_t = false)]
    pub list_devices: bool,

    #[arg(long)]
    pub device: Option<String>,

    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub sync_updates: bool,

    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    #[value(alias = "waves")]
    Wave,
    #[value(alias = "particle", alias = "dots")]
    Particles,
    #[value(alias = "both", alias = "all")]
    Combined,
}

impl Mode {
    pub fn next(self) -> Self {
        match self {
            Self::Wave => Self::Particles,
            Self::Particles => Self::Combined,
            Self::Combined => Self::Wave,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Wave => "wave",
            Self::Particles => "particles",
            Self::Combined => "combined",
        }
    }

    pub fn draws_waves(self) -> bool {
        matches!(self, Self::Wave | Self::Combined)
    }

    pub fn draws_particles(self) -> bool {
        matches!(self, Self::Particles | Self::Combined)
    }
}

/// How frequency bins are grouped into bass/mid/treble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BandPolicy {
    /// 80-300 Hz, 300-3000 Hz, 3-8 kHz.
    #[value(alias = "freq", alias = "hz")]
    Frequency,
    /// First 10% of bins, next 40%, remainder.
    #[value(name = "index-split", alias = "index", alias = "split")]
    IndexSplit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RendererMode {
    #[value(name = "half-block", alias = "halfblock", alias = "half_block", alias = "hb")]
    HalfBlock,
    #[value(alias = "hires", alias = "dots")]
    Braille,
}

impl RendererMode {
    /// Raster pixels per terminal cell (columns, rows).
    pub fn cell_pixels(self) -> (usize, usize) {
        match self {
            Self::HalfBlock => (1, 2),
            Self::Braille => (2, 4),
        }
    }
}

impl Config {
    pub fn capture(&self) -> CaptureConfig {
        CaptureConfig {
            device: self.device.clone(),
            fft_size: self.fft_size,
            policy: self.policy,
        }
    }

    /// Requested particle count, capped at [`MAX_PARTICLES`].
    pub fn particle_count(&self) -> usize {
        self.particles.min(MAX_PARTICLES)
    }

    pub fn frame_settings(&self) -> FrameSettings {
        FrameSettings {
            mode: self.mode,
            sensitivity: clamp_sensitivity(self.sensitivity),
            trails: self.trails,
        }
    }
}

pub fn clamp_sensitivity(v: f32) -> f32 {
    if v.is_finite() {
        v.clamp(MIN_SENSITIVITY, MAX_SENSITIVITY)
    } else {
        1.0
    }
}
