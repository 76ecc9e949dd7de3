use crate::audio::{BandEnergies, CaptureConfig, CaptureError, SignalStatus, SpectrumAnalyzer, SpectrumBuffer};
use crate::config::BandPolicy;
use crate::visual::{Compositor, FrameSettings, Surface};
use std::sync::Arc;
use tracing::{debug, warn};

/// Capture, analysis and rendering state for one visualizer window.
///
/// Renderer state survives capture start/stop; only a resize regenerates it.
pub struct VisualizerSession {
    analyzer: SpectrumAnalyzer,
    compositor: Compositor,
    surface: Surface,
    rng: fastrand::Rng,
    last_bands: BandEnergies,
}

impl VisualizerSession {
    pub fn new(policy: BandPolicy, particle_count: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => fastrand::Rng::with_seed(s),
            None => fastrand::Rng::new(),
        };
        Self {
            analyzer: SpectrumAnalyzer::new(policy),
            compositor: Compositor::new(particle_count),
            surface: Surface::new(0, 0),
            rng,
            last_bands: BandEnergies::default(),
        }
    }

    /// Start microphone capture. A failure leaves the session stopped.
    pub fn start(&mut self, cfg: &CaptureConfig) -> Result<(), CaptureError> {
        self.analyzer.open(cfg).inspect_err(|err| {
            warn!("capture start failed: {err}");
        })
    }

    /// Feed the analyzer from an external spectrum instead of a device.
    pub fn attach(&mut self, spectrum: Arc<SpectrumBuffer>) {
        self.analyzer.attach(spectrum);
    }

    pub fn stop(&mut self) {
        self.analyzer.close();
    }

    pub fn is_capturing(&self) -> bool {
        self.analyzer.is_open()
    }

    pub fn signal_status(&self) -> SignalStatus {
        self.analyzer.signal_status()
    }

    pub fn analyzer(&self) -> &SpectrumAnalyzer {
        &self.analyzer
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn last_bands(&self) -> BandEnergies {
        self.last_bands
    }

    /// Resize the surface and regenerate wave and particle state.
    /// Returns false when the size did not change.
    pub fn resize(&mut self, width: usize, height: usize) -> bool {
        if !self.surface.resize(width, height) {
            return false;
        }
        debug!(width, height, "surface resized");
        self.compositor.reinitialize(width, height, &mut self.rng);
        true
    }

    pub fn reseed(&mut self) {
        self.compositor.reseed(&mut self.rng);
    }

    /// Analyse the latest spectrum and draw one frame.
    pub fn frame(&mut self, settings: &FrameSettings) -> BandEnergies {
        let bands = self.analyzer.sample();
        self.compositor.render(&mut self.surface, &bands, settings);
        self.last_bands = bands;
        bands
    }
}
