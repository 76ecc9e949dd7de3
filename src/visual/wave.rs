use crate::audio::BandEnergies;
use crate::visual::color::{BLACK, edge_center_gradient, hsl_to_rgb};
use crate::visual::surface::{Blend, Surface};
use std::f32::consts::TAU;

/// Vertical baseline of each layer as a fraction of surface height.
pub const LAYER_BASELINES: [f32; 3] = [0.50, 0.52, 0.48];
pub const LAYER_ALPHAS: [f32; 3] = [0.6, 0.4, 0.3];

/// Overlay opacity used instead of a clear when trails are on.
pub const TRAIL_FADE: f32 = 0.1;

/// Amplitude floor, in reference pixels, that keeps a wave visible in silence.
pub const AMPLITUDE_FLOOR: f32 = 10.0;

const SAMPLE_STEP: usize = 2;

// (amplitude as fraction of height, cycles across the width, phase speed, hue)
const LAYER_SPECS: [(f32, f32, f32, f32); 3] = [
    (0.070, 2.0, 0.020, 265.0),
    (0.055, 3.5, 0.030, 190.0),
    (0.040, 5.5, 0.050, 325.0),
];

#[derive(Clone, Debug, PartialEq)]
pub struct Oscillator {
    /// Base amplitude in pixels.
    pub amplitude: f32,
    /// Spatial frequency in radians per pixel.
    pub frequency: f32,
    /// Phase advance per frame at silence.
    pub speed: f32,
    /// Base hue in degrees.
    pub hue: f32,
    /// Running phase, kept in `[0, TAU)`.
    pub offset: f32,
}

impl Oscillator {
    /// `amplitude·band·sensitivity·3 + floor`, with the floor converted by `scale`
    /// (see [`Surface::pixel_scale`]).
    pub fn displayed_amplitude(&self, band: f32, sensitivity: f32, scale: f32) -> f32 {
        self.amplitude * band * sensitivity * 3.0 + AMPLITUDE_FLOOR * scale
    }

    /// Sample the waveform every second pixel from 0 through `width`.
    pub fn trace(&self, out: &mut Vec<(f32, f32)>, width: usize, y_base: f32, amplitude: f32) {
        out.clear();
        let mut x = 0usize;
        while x < width {
            out.push((x as f32, self.y_at(x as f32, y_base, amplitude)));
            x += SAMPLE_STEP;
        }
        let w = width as f32;
        out.push((w, self.y_at(w, y_base, amplitude)));
    }

    pub fn y_at(&self, x: f32, y_base: f32, amplitude: f32) -> f32 {
        y_base + (x * self.frequency + self.offset).sin() * amplitude
    }

    /// Louder bands scroll faster. Wrapping keeps the step exact over long sessions.
    pub fn advance(&mut self, band: f32) {
        self.offset = (self.offset + self.speed * (1.0 + band)).rem_euclid(TAU);
    }
}

/// Three stacked oscillators driven by bass, mid and treble.
pub struct WaveField {
    layers: [Oscillator; 3],
    points: Vec<(f32, f32)>,
}

impl WaveField {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            layers: build_layers(width, height),
            points: Vec::new(),
        }
    }

    /// Rebuild the oscillators for a new surface size. Phase restarts at zero.
    pub fn reinitialize(&mut self, width: usize, height: usize) {
        self.layers = build_layers(width, height);
    }

    pub fn layers(&self) -> &[Oscillator; 3] {
        &self.layers
    }

    pub fn render(&mut self, surface: &mut Surface, bands: &BandEnergies, sensitivity: f32, trails: bool) {
        if trails {
            surface.fade(BLACK, TRAIL_FADE);
        } else {
            surface.clear();
        }

        let width = surface.width();
        let height = surface.height() as f32;
        let scale = surface.pixel_scale();
        let drive = [bands.bass, bands.mid, bands.treble];
        let hue_shift = bands.brightness * 120.0;

        for (i, osc) in self.layers.iter_mut().enumerate() {
            let band = drive[i].clamp(0.0, 1.0);
            let amplitude = osc.displayed_amplitude(band, sensitivity, scale);
            osc.trace(&mut self.points, width, height * LAYER_BASELINES[i], amplitude);

            let edge = hsl_to_rgb(osc.hue + hue_shift, 0.85, 0.6);
            let w = width as f32;
            let stroke = surface.px(2.0 + band * 10.0);
            let glow = surface.px(band * 20.0);
            surface.stroke_polyline(
                &self.points,
                stroke,
                glow,
                (LAYER_ALPHAS[i] + band * 0.4).min(1.0),
                |x| edge_center_gradient(edge, x, w),
                Blend::Over,
            );

            osc.advance(band);
        }
    }
}

fn build_layers(width: usize, height: usize) -> [Oscillator; 3] {
    let w = width.max(1) as f32;
    let h = height as f32;
    LAYER_SPECS.map(|(amp, cycles, speed, hue)| Oscillator {
        amplitude: h * amp,
        frequency: cycles * TAU / w,
        speed,
        hue,
        offset: 0.0,
    })
}
