mod color;
mod particles;
mod surface;
mod wave;

use crate::audio::BandEnergies;
use crate::config::Mode;

pub use color::{edge_center_gradient, hsl_to_rgb, lerp_rgb};
pub use particles::{
    DEFAULT_PARTICLE_COUNT, HueFamily, MAX_PARTICLES, Particle, ParticleField, wrap,
};
pub use surface::{Blend, REFERENCE_HEIGHT, Surface};
pub use wave::{AMPLITUDE_FLOOR, LAYER_ALPHAS, LAYER_BASELINES, Oscillator, TRAIL_FADE, WaveField};

/// Per-frame inputs from the front-end.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameSettings {
    pub mode: Mode,
    pub sensitivity: f32,
    pub trails: bool,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            mode: Mode::Combined,
            sensitivity: 1.0,
            trails: true,
        }
    }
}

/// Runs the wave and particle fields selected by the mode and decides how
/// they are layered.
pub struct Compositor {
    wave: WaveField,
    particles: ParticleField,
    particle_count: usize,
}

impl Compositor {
    /// `particle_count` is capped at [`MAX_PARTICLES`].
    pub fn new(particle_count: usize) -> Self {
        Self {
            wave: WaveField::new(0, 0),
            particles: ParticleField::new(),
            particle_count: particle_count.min(MAX_PARTICLES),
        }
    }

    pub fn particle_count(&self) -> usize {
        self.particle_count
    }

    /// Regenerate all field state for a new surface size.
    pub fn reinitialize(&mut self, width: usize, height: usize, rng: &mut fastrand::Rng) {
        self.wave.reinitialize(width, height);
        self.particles
            .reinitialize(width, height, self.particle_count, rng);
    }

    /// New particles at the current size; waves keep their phase.
    pub fn reseed(&mut self, rng: &mut fastrand::Rng) {
        let (w, h) = self.particles.bounds();
        self.particles
            .reinitialize(w as usize, h as usize, self.particle_count, rng);
    }

    pub fn wave(&self) -> &WaveField {
        &self.wave
    }

    pub fn particles(&self) -> &ParticleField {
        &self.particles
    }

    pub fn render(&mut self, surface: &mut Surface, bands: &BandEnergies, settings: &FrameSettings) {
        let sensitivity = settings.sensitivity;
        let mode = settings.mode;

        // The wave pass owns the clear/fade; without it the compositor does.
        if mode.draws_waves() {
            self.wave.render(surface, bands, sensitivity, settings.trails);
        } else if settings.trails {
            surface.fade(color::BLACK, TRAIL_FADE);
        } else {
            surface.clear();
        }

        if mode.draws_particles() {
            let blend = if mode.draws_waves() {
                Blend::Add
            } else {
                Blend::Over
            };
            self.particles
                .render_blended(surface, bands, sensitivity, blend);
        }
    }
}
