use audioscape::audio::BandEnergies;
use audioscape::config::Mode;
use audioscape::visual::{
    AMPLITUDE_FLOOR, Blend, Compositor, FrameSettings, HueFamily, LAYER_BASELINES, MAX_PARTICLES,
    Oscillator, Particle, ParticleField, REFERENCE_HEIGHT, Surface, WaveField, edge_center_gradient,
    hsl_to_rgb, wrap,
};
use proptest::prelude::*;
use std::f32::consts::TAU;

/// Forward distance from `from` to `to` on the phase circle.
fn phase_step(from: f32, to: f32) -> f32 {
    (to - from).rem_euclid(TAU)
}

fn bands(bass: f32, mid: f32, treble: f32) -> BandEnergies {
    BandEnergies {
        bass,
        mid,
        treble,
        average: (bass + mid + treble) / 3.0,
        brightness: 0.3,
    }
}

fn lit_pixels(s: &Surface) -> usize {
    s.pixels()
        .chunks_exact(4)
        .filter(|p| p[0] != 0 || p[1] != 0 || p[2] != 0)
        .count()
}

// ── Wave field ──────────────────────────────────────────────────────────────

#[test]
fn wave_phase_advances_with_band_energy() {
    let mut surface = Surface::new(200, 100);
    let mut field = WaveField::new(200, 100);
    let speed = field.layers()[0].speed;
    let start = field.layers()[0].offset;

    let b = bands(0.5, 0.0, 0.0);
    for _ in 0..10 {
        field.render(&mut surface, &b, 1.0, false);
    }
    let expected = start + 10.0 * speed * 1.5;
    assert!((field.layers()[0].offset - expected).abs() < 1e-5);

    // Silent layers still scroll at their base speed.
    let mid = &field.layers()[1];
    assert!((mid.offset - 10.0 * mid.speed).abs() < 1e-5);
}

#[test]
fn wave_phase_advances_every_frame() {
    let mut surface = Surface::new(64, 32);
    let mut field = WaveField::new(64, 32);
    let mut prev: Vec<f32> = field.layers().iter().map(|o| o.offset).collect();
    for i in 0..400 {
        let v = (i % 7) as f32 / 6.0;
        let drive = [v, 1.0 - v, v * 0.5];
        field.render(&mut surface, &bands(drive[0], drive[1], drive[2]), 2.0, true);
        for ((o, p), band) in field.layers().iter().zip(prev.iter_mut()).zip(drive) {
            assert!((0.0..TAU).contains(&o.offset));
            let want = o.speed * (1.0 + band);
            assert!((phase_step(*p, o.offset) - want).abs() < 1e-4);
            *p = o.offset;
        }
    }
}

#[test]
fn wave_phase_keeps_its_speed_in_long_sessions() {
    let mut osc = Oscillator {
        amplitude: 10.0,
        frequency: 0.1,
        speed: 0.02,
        hue: 265.0,
        offset: 0.0,
    };
    // Roughly 40 hours of silence at 60 fps.
    for _ in 0..9_000_000 {
        osc.advance(0.0);
    }
    assert!((0.0..TAU).contains(&osc.offset));

    let mut travelled = 0.0;
    for _ in 0..100 {
        let before = osc.offset;
        osc.advance(0.0);
        travelled += phase_step(before, osc.offset);
    }
    assert!((travelled - 2.0).abs() < 1e-3, "travelled {travelled}");
}

#[test]
fn wave_phase_wraps_past_a_full_turn() {
    let mut osc = WaveField::new(100, 100).layers()[2].clone();
    osc.offset = TAU - 0.01;
    let y_before = osc.y_at(7.0, 0.0, 1.0);
    osc.advance(1.0);
    assert!((osc.offset - (0.1 - 0.01)).abs() < 1e-5);
    // Same point on the curve as the unwrapped phase.
    let unwrapped = (7.0 * osc.frequency + TAU - 0.01 + 0.1).sin();
    assert!((osc.y_at(7.0, 0.0, 1.0) - unwrapped).abs() < 1e-4);
    assert!(y_before != osc.y_at(7.0, 0.0, 1.0));
}

#[test]
fn wave_layers_follow_surface_size() {
    let field = WaveField::new(400, 200);
    let layers = field.layers();
    assert!((layers[0].amplitude - 200.0 * 0.070).abs() < 1e-4);
    assert!((layers[0].frequency - 2.0 * TAU / 400.0).abs() < 1e-6);
    assert!(layers[2].speed > layers[1].speed && layers[1].speed > layers[0].speed);
    assert_eq!(layers.iter().map(|l| l.hue).collect::<Vec<_>>(), [265.0, 190.0, 325.0]);
}

#[test]
fn wave_trace_spans_the_full_width() {
    let field = WaveField::new(101, 50);
    let osc = &field.layers()[1];
    let mut pts = Vec::new();
    osc.trace(&mut pts, 101, 25.0, 0.0);

    assert_eq!(pts.first().map(|p| p.0), Some(0.0));
    assert_eq!(pts.last().map(|p| p.0), Some(101.0));
    assert!(pts.windows(2).all(|w| w[1].0 > w[0].0 && w[1].0 - w[0].0 <= 2.0));
    // Zero amplitude sits on the baseline.
    assert!(pts.iter().all(|p| p.1 == 25.0));
}

#[test]
fn wave_amplitude_has_a_floor() {
    let field = WaveField::new(100, 720);
    let osc = &field.layers()[0];
    assert_eq!(osc.displayed_amplitude(0.0, 1.0, 1.0), AMPLITUDE_FLOOR);
    let loud = osc.displayed_amplitude(1.0, 2.0, 1.0);
    assert!((loud - (osc.amplitude * 6.0 + AMPLITUDE_FLOOR)).abs() < 1e-4);
}

#[test]
fn wave_constants_are_reference_pixels() {
    let full = Surface::new(10, REFERENCE_HEIGHT as usize);
    let small = Surface::new(160, 144);
    assert_eq!(full.px(AMPLITUDE_FLOOR), AMPLITUDE_FLOOR);
    assert!((small.px(AMPLITUDE_FLOOR) - AMPLITUDE_FLOOR * 144.0 / REFERENCE_HEIGHT).abs() < 1e-5);

    // At reference height the silent floor is the full ten pixels. On a
    // short raster it keeps the same share of the height.
    let wave = WaveField::new(160, 144);
    let osc = &wave.layers()[0];
    assert_eq!(osc.displayed_amplitude(0.0, 1.0, full.pixel_scale()), AMPLITUDE_FLOOR);
    let floor = osc.displayed_amplitude(0.0, 1.0, small.pixel_scale());
    assert!((floor / 144.0 - AMPLITUDE_FLOOR / REFERENCE_HEIGHT).abs() < 1e-6);
}

#[test]
fn wave_draws_around_baselines() {
    let (w, h) = (160usize, 90usize);
    let mut surface = Surface::new(w, h);
    let mut field = WaveField::new(w, h);
    field.render(&mut surface, &BandEnergies::default(), 1.0, false);

    assert!(lit_pixels(&surface) > 0);
    // Top and bottom rows are far from every baseline and stay black.
    for x in 0..w {
        assert_eq!(surface.pixel(x, 0), [0, 0, 0, 255]);
        assert_eq!(surface.pixel(x, h - 1), [0, 0, 0, 255]);
    }
    let mid_row = (h as f32 * LAYER_BASELINES[0]) as usize;
    assert!((0..w).any(|x| surface.pixel(x, mid_row) != [0, 0, 0, 255]));
}

#[test]
fn wave_without_trails_clears_each_frame() {
    let mut surface = Surface::new(80, 40);
    surface.fade([255, 255, 255], 1.0);
    let mut field = WaveField::new(80, 40);
    field.render(&mut surface, &BandEnergies::default(), 1.0, false);
    assert_eq!(surface.pixel(0, 0), [0, 0, 0, 255]);
}

#[test]
fn wave_with_trails_fades_instead_of_clearing() {
    let mut surface = Surface::new(80, 40);
    surface.fade([200, 200, 200], 1.0);
    let mut field = WaveField::new(80, 40);
    field.render(&mut surface, &BandEnergies::default(), 1.0, true);
    assert_eq!(surface.pixel(0, 0), [180, 180, 180, 255]);
}

#[test]
fn wave_reinitialize_resets_phase() {
    let mut surface = Surface::new(50, 50);
    let mut field = WaveField::new(50, 50);
    field.render(&mut surface, &bands(1.0, 1.0, 1.0), 1.0, false);
    assert!(field.layers()[0].offset > 0.0);

    field.reinitialize(120, 60);
    assert!(field.layers().iter().all(|o| o.offset == 0.0));
    assert!((field.layers()[0].amplitude - 60.0 * 0.070).abs() < 1e-4);
}

// ── Colour ──────────────────────────────────────────────────────────────────

#[test]
fn gradient_is_white_in_the_middle() {
    let edge = [10, 20, 30];
    assert_eq!(edge_center_gradient(edge, 0.0, 100.0), edge);
    assert_eq!(edge_center_gradient(edge, 100.0, 100.0), edge);
    assert_eq!(edge_center_gradient(edge, 50.0, 100.0), [255, 255, 255]);
}

#[test]
fn hsl_primaries() {
    assert_eq!(hsl_to_rgb(0.0, 1.0, 0.5), [255, 0, 0]);
    assert_eq!(hsl_to_rgb(120.0, 1.0, 0.5), [0, 255, 0]);
    assert_eq!(hsl_to_rgb(240.0, 1.0, 0.5), [0, 0, 255]);
    assert_eq!(hsl_to_rgb(480.0, 1.0, 0.5), [0, 255, 0]);
    assert_eq!(hsl_to_rgb(-120.0, 1.0, 0.5), [0, 0, 255]);
}

// ── Particles ───────────────────────────────────────────────────────────────

#[test]
fn particles_respect_bounds_after_reinitialize() {
    let mut rng = fastrand::Rng::with_seed(3);
    let mut field = ParticleField::new();
    for (w, h) in [(320usize, 180usize), (40, 12)] {
        field.reinitialize(w, h, 200, &mut rng);
        assert_eq!(field.particles().len(), 200);
        assert_eq!(field.bounds(), (w as f32, h as f32));
        for p in field.particles() {
            assert!(p.x >= 0.0 && p.x < w as f32);
            assert!(p.y >= 0.0 && p.y < h as f32);
            assert!((1.0..=3.0).contains(&p.size));
            assert!((-0.5..0.5).contains(&p.vx));
            assert!((-0.5..0.5).contains(&p.vy));
            assert!((0.2..=0.7).contains(&p.alpha));
        }
    }
}

#[test]
fn particle_step_keeps_velocity_and_scales_motion() {
    let mut p = Particle {
        x: 10.0,
        y: 10.0,
        size: 2.0,
        vx: 0.5,
        vy: -0.25,
        alpha: 0.5,
    };
    p.step(3.0, 100.0, 100.0);
    assert_eq!((p.x, p.y), (12.0, 9.0));
    assert_eq!((p.vx, p.vy), (0.5, -0.25));
}

#[test]
fn particle_wraps_across_edges() {
    let mut p = Particle {
        x: 99.8,
        y: 0.1,
        size: 1.0,
        vx: 0.4,
        vy: -0.4,
        alpha: 0.3,
    };
    p.step(0.0, 100.0, 50.0);
    assert!((p.x - 0.2).abs() < 1e-3);
    assert!((p.y - 49.7).abs() < 1e-3);
}

#[test]
fn wrap_handles_degenerate_input() {
    assert_eq!(wrap(5.0, 0.0), 0.0);
    assert_eq!(wrap(f32::NAN, 10.0), 0.0);
    assert_eq!(wrap(f32::INFINITY, 10.0), 0.0);
    assert_eq!(wrap(-1e-9, 10.0), 0.0);
    assert_eq!(wrap(25.0, 10.0), 5.0);
}

proptest! {
    #[test]
    fn stepped_particles_stay_in_bounds(
        x in 0.0f32..500.0,
        y in 0.0f32..300.0,
        vx in -0.5f32..0.5,
        vy in -0.5f32..0.5,
        intensity in 0.0f32..1.0e6,
        steps in 1usize..40,
    ) {
        let (w, h) = (500.0, 300.0);
        let mut p = Particle { x: wrap(x, w), y: wrap(y, h), size: 1.0, vx, vy, alpha: 0.5 };
        for _ in 0..steps {
            p.step(intensity, w, h);
            prop_assert!(p.x >= 0.0 && p.x < w, "x = {}", p.x);
            prop_assert!(p.y >= 0.0 && p.y < h, "y = {}", p.y);
        }
    }

    #[test]
    fn wrap_lands_in_range(v in -1.0e7f32..1.0e7, dim in 0.5f32..4096.0) {
        let r = wrap(v, dim);
        prop_assert!(r >= 0.0 && r < dim);
    }
}

#[test]
fn dominant_band_picks_hue_family() {
    assert_eq!(HueFamily::dominant(&bands(0.9, 0.1, 0.1)), HueFamily::Bass);
    assert_eq!(HueFamily::dominant(&bands(0.1, 0.8, 0.2)), HueFamily::Mid);
    assert_eq!(HueFamily::dominant(&bands(0.1, 0.2, 0.9)), HueFamily::Treble);
}

#[test]
fn dominant_band_ties() {
    assert_eq!(HueFamily::dominant(&bands(0.5, 0.5, 0.5)), HueFamily::Bass);
    assert_eq!(HueFamily::dominant(&bands(0.5, 0.5, 0.1)), HueFamily::Bass);
    assert_eq!(HueFamily::dominant(&bands(0.5, 0.1, 0.5)), HueFamily::Bass);
    assert_eq!(HueFamily::dominant(&bands(0.1, 0.5, 0.5)), HueFamily::Mid);
    assert_eq!(HueFamily::dominant(&BandEnergies::default()), HueFamily::Bass);
}

#[test]
fn hue_shifts_with_brightness() {
    assert_eq!(HueFamily::Bass.hue(0.0), 250.0);
    assert_eq!(HueFamily::Mid.hue(1.0), 205.0);
    assert_eq!(HueFamily::Treble.hue(0.5), 340.0);
}

#[test]
fn particle_field_draws_without_clearing() {
    let mut rng = fastrand::Rng::with_seed(9);
    let mut surface = Surface::new(120, 60);
    surface.fade([40, 40, 40], 1.0);
    let mut field = ParticleField::new();
    field.reinitialize(120, 60, 0, &mut rng);
    field.render(&mut surface, &bands(0.5, 0.5, 0.5), 1.0);
    assert_eq!(surface.pixel(10, 10), [40, 40, 40, 255]);

    field.reinitialize(120, 60, 50, &mut rng);
    field.render(&mut surface, &bands(0.5, 0.2, 0.1), 1.0);
    assert!(surface.pixels().chunks_exact(4).any(|p| p[0] != 40 || p[2] != 40));
}

// ── Surface ─────────────────────────────────────────────────────────────────

#[test]
fn surface_resize_reports_changes() {
    let mut s = Surface::new(10, 10);
    assert!(!s.resize(10, 10));
    assert!(s.resize(20, 5));
    assert_eq!(s.pixels().len(), 20 * 5 * 4);
    assert_eq!(s.pixel(19, 4), [0, 0, 0, 255]);
    assert_eq!(s.pixel(20, 0), [0, 0, 0, 0]);
}

#[test]
fn pixel_scale_tracks_height() {
    assert_eq!(Surface::new(10, 720).pixel_scale(), 1.0);
    assert_eq!(Surface::new(10, 1440).pixel_scale(), 1.0);
    assert_eq!(Surface::new(10, 360).pixel_scale(), 0.5);
    assert_eq!(Surface::new(10, 20).pixel_scale(), 0.15);
}

#[test]
fn additive_blend_saturates() {
    let mut s = Surface::new(2, 2);
    s.blend_px(0, 0, [200, 100, 0], 1.0, Blend::Add);
    s.blend_px(0, 0, [200, 100, 0], 1.0, Blend::Add);
    assert_eq!(s.pixel(0, 0), [255, 200, 0, 255]);

    // Out of range is ignored.
    s.blend_px(-1, 0, [255, 255, 255], 1.0, Blend::Add);
    s.blend_px(0, 2, [255, 255, 255], 1.0, Blend::Add);
    assert_eq!(s.pixel(1, 1), [0, 0, 0, 255]);
}

#[test]
fn polyline_joints_are_not_double_painted() {
    // Two collinear segments meeting at x = 10.
    let mut s = Surface::new(21, 5);
    s.stroke_polyline(
        &[(0.0, 2.5), (10.0, 2.5), (20.0, 2.5)],
        1.0,
        0.0,
        0.5,
        |_| [200, 200, 200],
        Blend::Add,
    );
    assert_eq!(s.pixel(10, 2), s.pixel(5, 2));
    assert_eq!(s.pixel(5, 2), [100, 100, 100, 255]);
}

#[test]
fn disc_glow_reaches_past_the_core() {
    let mut plain = Surface::new(40, 40);
    plain.fill_disc(20.0, 20.0, 3.0, 0.0, [255, 255, 255], 1.0, Blend::Over);
    let mut glowing = Surface::new(40, 40);
    glowing.fill_disc(20.0, 20.0, 3.0, 8.0, [255, 255, 255], 1.0, Blend::Over);

    assert_eq!(plain.pixel(20, 20), [255, 255, 255, 255]);
    assert_eq!(plain.pixel(27, 20), [0, 0, 0, 255]);
    assert_ne!(glowing.pixel(27, 20), [0, 0, 0, 255]);
}

// ── Compositor ──────────────────────────────────────────────────────────────

fn settings(mode: Mode, trails: bool) -> FrameSettings {
    FrameSettings {
        mode,
        sensitivity: 1.0,
        trails,
    }
}

#[test]
fn mode_cycle_and_layers() {
    assert_eq!(Mode::Wave.next(), Mode::Particles);
    assert_eq!(Mode::Particles.next(), Mode::Combined);
    assert_eq!(Mode::Combined.next(), Mode::Wave);
    assert!(Mode::Wave.draws_waves() && !Mode::Wave.draws_particles());
    assert!(!Mode::Particles.draws_waves() && Mode::Particles.draws_particles());
    assert!(Mode::Combined.draws_waves() && Mode::Combined.draws_particles());
}

#[test]
fn compositor_caps_the_particle_population() {
    let mut rng = fastrand::Rng::with_seed(5);
    let mut comp = Compositor::new(usize::MAX);
    assert_eq!(comp.particle_count(), MAX_PARTICLES);
    comp.reinitialize(40, 20, &mut rng);
    assert_eq!(comp.particles().particles().len(), MAX_PARTICLES);

    assert_eq!(Compositor::new(0).particle_count(), 0);
    assert_eq!(Compositor::new(120).particle_count(), 120);
}

#[test]
fn particles_mode_leaves_waves_untouched() {
    let mut rng = fastrand::Rng::with_seed(1);
    let mut surface = Surface::new(100, 50);
    let mut comp = Compositor::new(30);
    comp.reinitialize(100, 50, &mut rng);

    let before = comp.particles().particles().to_vec();
    comp.render(&mut surface, &bands(0.4, 0.4, 0.4), &settings(Mode::Particles, false));

    assert!(comp.wave().layers().iter().all(|o| o.offset == 0.0));
    assert_ne!(comp.particles().particles(), &before[..]);
}

#[test]
fn wave_mode_leaves_particles_untouched() {
    let mut rng = fastrand::Rng::with_seed(1);
    let mut surface = Surface::new(100, 50);
    let mut comp = Compositor::new(30);
    comp.reinitialize(100, 50, &mut rng);

    let before = comp.particles().particles().to_vec();
    comp.render(&mut surface, &bands(0.4, 0.4, 0.4), &settings(Mode::Wave, true));

    assert!(comp.wave().layers().iter().all(|o| o.offset > 0.0));
    assert_eq!(comp.particles().particles(), &before[..]);
}

#[test]
fn combined_mode_runs_both_fields() {
    let mut rng = fastrand::Rng::with_seed(5);
    let mut surface = Surface::new(100, 50);
    let mut comp = Compositor::new(30);
    comp.reinitialize(100, 50, &mut rng);

    let before = comp.particles().particles().to_vec();
    comp.render(&mut surface, &bands(0.4, 0.4, 0.4), &settings(Mode::Combined, true));

    assert!(comp.wave().layers().iter().all(|o| o.offset > 0.0));
    assert_ne!(comp.particles().particles(), &before[..]);
    assert!(lit_pixels(&surface) > 0);
}

#[test]
fn particles_mode_clears_or_fades() {
    let mut rng = fastrand::Rng::with_seed(2);
    let mut comp = Compositor::new(0);
    comp.reinitialize(40, 20, &mut rng);

    let mut surface = Surface::new(40, 20);
    surface.fade([100, 100, 100], 1.0);
    comp.render(&mut surface, &BandEnergies::default(), &settings(Mode::Particles, true));
    assert_eq!(surface.pixel(0, 0), [90, 90, 90, 255]);

    comp.render(&mut surface, &BandEnergies::default(), &settings(Mode::Particles, false));
    assert_eq!(surface.pixel(0, 0), [0, 0, 0, 255]);
}

#[test]
fn reseed_keeps_bounds_and_wave_phase() {
    let mut rng = fastrand::Rng::with_seed(8);
    let mut surface = Surface::new(60, 30);
    let mut comp = Compositor::new(20);
    comp.reinitialize(60, 30, &mut rng);
    comp.render(&mut surface, &bands(0.2, 0.2, 0.2), &settings(Mode::Combined, false));
    let phase = comp.wave().layers()[0].offset;
    let before = comp.particles().particles().to_vec();

    comp.reseed(&mut rng);
    assert_eq!(comp.particles().bounds(), (60.0, 30.0));
    assert_eq!(comp.particles().particles().len(), 20);
    assert_ne!(comp.particles().particles(), &before[..]);
    assert_eq!(comp.wave().layers()[0].offset, phase);
}
