use crate::audio::BandEnergies;
use crate::visual::color::hsl_to_rgb;
use crate::visual::surface::{Blend, Surface};

pub const DEFAULT_PARTICLE_COUNT: usize = 200;
/// Upper bound on the field population.
pub const MAX_PARTICLES: usize = 20_000;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub vx: f32,
    pub vy: f32,
    pub alpha: f32,
}

impl Particle {
    pub fn random(rng: &mut fastrand::Rng, width: f32, height: f32) -> Self {
        Self {
            x: wrap(rng.f32() * width, width),
            y: wrap(rng.f32() * height, height),
            size: 1.0 + rng.f32() * 2.0,
            vx: rng.f32() - 0.5,
            vy: rng.f32() - 0.5,
            alpha: 0.2 + rng.f32() * 0.5,
        }
    }

    /// Move by the stored velocity scaled by `1 + intensity`, wrapping on a torus.
    /// The stored velocity is left untouched.
    pub fn step(&mut self, intensity: f32, width: f32, height: f32) {
        let k = 1.0 + intensity;
        self.x = wrap(self.x + self.vx * k, width);
        self.y = wrap(self.y + self.vy * k, height);
    }
}

/// Map any coordinate into `[0, dim)`.
pub fn wrap(v: f32, dim: f32) -> f32 {
    if !(dim > 0.0) || !v.is_finite() {
        return 0.0;
    }
    let r = v.rem_euclid(dim);
    // rem_euclid can round up to `dim` for tiny negative inputs.
    if r >= dim { 0.0 } else { r }
}

/// Colour family picked by whichever band is loudest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HueFamily {
    /// Blue-purple.
    Bass,
    /// Cyan-green.
    Mid,
    /// Pink-magenta.
    Treble,
}

impl HueFamily {
    /// Bass wins ties against both others, mid wins ties against treble.
    pub fn dominant(bands: &BandEnergies) -> Self {
        if bands.bass >= bands.mid && bands.bass >= bands.treble {
            Self::Bass
        } else if bands.mid >= bands.treble {
            Self::Mid
        } else {
            Self::Treble
        }
    }

    pub fn base_hue(self) -> f32 {
        match self {
            Self::Bass => 250.0,
            Self::Mid => 165.0,
            Self::Treble => 320.0,
        }
    }

    pub fn hue(self, brightness: f32) -> f32 {
        self.base_hue() + brightness.clamp(0.0, 1.0) * 40.0
    }
}

pub struct ParticleField {
    particles: Vec<Particle>,
    width: f32,
    height: f32,
}

impl ParticleField {
    pub fn new() -> Self {
        Self {
            particles: Vec::new(),
            width: 0.0,
            height: 0.0,
        }
    }

    /// Replace every particle with a fresh random one for the given bounds.
    pub fn reinitialize(&mut self, width: usize, height: usize, count: usize, rng: &mut fastrand::Rng) {
        self.width = width as f32;
        self.height = height as f32;
        self.particles.clear();
        self.particles.reserve(count);
        for _ in 0..count {
            self.particles.push(Particle::random(rng, self.width, self.height));
        }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn bounds(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    pub fn step(&mut self, intensity: f32) {
        let (w, h) = (self.width, self.height);
        for p in &mut self.particles {
            p.step(intensity, w, h);
        }
    }

    /// Advance and draw every particle. Does not clear the surface.
    pub fn render(&mut self, surface: &mut Surface, bands: &BandEnergies, sensitivity: f32) {
        self.render_blended(surface, bands, sensitivity, Blend::Over);
    }

    pub fn render_blended(
        &mut self,
        surface: &mut Surface,
        bands: &BandEnergies,
        sensitivity: f32,
        blend: Blend,
    ) {
        let intensity = bands.average * sensitivity * 6.0;
        self.step(intensity);

        let scale = surface.pixel_scale();
        let color = hsl_to_rgb(HueFamily::dominant(bands).hue(bands.brightness), 0.8, 0.62);
        let glow = surface.px(intensity * 5.0);
        // Discs shrink slower than strokes so they stay a few pixels wide.
        for p in &self.particles {
            let radius = p.size * (1.0 + intensity * 0.8) * scale.sqrt();
            let alpha = (p.alpha + bands.average).min(1.0);
            surface.fill_disc(p.x, p.y, radius, glow, color, alpha, blend);
        }
    }
}

impl Default for ParticleField {
    fn default() -> Self {
        Self::new()
    }
}
