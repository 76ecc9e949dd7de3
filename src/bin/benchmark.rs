use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use audioscape::audio::{SpectrumBuffer, analyze};
use audioscape::config::{BandPolicy, Mode};
use audioscape::scheduler::{FrameTick, ManualScheduler, Scheduler, TickControl};
use audioscape::session::VisualizerSession;
use audioscape::visual::FrameSettings;

struct Args {
    frames: u64,
    w: usize,
    h: usize,
    bins: usize,
    sample_rate_hz: u32,
    particles: usize,
    policy: BandPolicy,
    ci_smoke: bool,
    max_ms: f64,
}

fn parse_args() -> Args {
    let mut args = Args {
        frames: 240,
        w: 160,
        h: 88,
        bins: 2048,
        sample_rate_hz: 48_000,
        particles: 200,
        policy: BandPolicy::Frequency,
        ci_smoke: false,
        max_ms: 16.0,
    };

    let argv = std::env::args().skip(1).collect::<Vec<_>>();
    let mut i = 0usize;
    while i < argv.len() {
        let k = argv[i].as_str();
        let v = argv.get(i + 1).map(|s| s.as_str());
        match (k, v) {
            ("--frames", Some(x)) => {
                if let Ok(n) = x.parse::<u64>() {
                    args.frames = n.max(1);
                }
                i += 2;
            }
            ("--w", Some(x)) => {
                if let Ok(n) = x.parse::<usize>() {
                    args.w = n.max(1);
                }
                i += 2;
            }
            ("--h", Some(x)) => {
                if let Ok(n) = x.parse::<usize>() {
                    args.h = n.max(1);
                }
                i += 2;
            }
            ("--bins", Some(x)) => {
                if let Ok(n) = x.parse::<usize>() {
                    args.bins = n.max(16);
                }
                i += 2;
            }
            ("--particles", Some(x)) => {
                if let Ok(n) = x.parse::<usize>() {
                    args.particles = n;
                }
                i += 2;
            }
            ("--policy", Some("index-split")) => {
                args.policy = BandPolicy::IndexSplit;
                i += 2;
            }
            ("--policy", Some("frequency")) => {
                args.policy = BandPolicy::Frequency;
                i += 2;
            }
            ("--ci-smoke", _) => {
                args.ci_smoke = true;
                i += 1;
            }
            ("--max-ms", Some(x)) => {
                if let Ok(v) = x.parse::<f64>() {
                    args.max_ms = v.max(0.1);
                }
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    if args.ci_smoke {
        args.frames = args.frames.min(90);
    }
    args
}

/// A moving bass thump, a wandering mid partial and hi-hat noise bursts.
fn synth_spectrum(out: &mut [u8], sample_rate_hz: u32, step: u64, rng: &mut fastrand::Rng) {
    let n = out.len();
    let bin_hz = sample_rate_hz as f32 / 2.0 / n as f32;
    let t = step as f32 / 60.0;
    let kick = ((t * 2.0 * std::f32::consts::PI).sin() * 0.5 + 0.5).powf(3.0);
    let mid_hz = 600.0 + (t * 0.7).sin() * 400.0;
    let hat = step % 8 < 2;

    for (i, m) in out.iter_mut().enumerate() {
        let f = i as f32 * bin_hz;
        let mut v = 0.0f32;
        if (60.0..250.0).contains(&f) {
            v += 230.0 * kick;
        }
        v += 190.0 * (-((f - mid_hz) / 120.0).powi(2)).exp();
        if hat && (5000.0..9000.0).contains(&f) {
            v += 90.0 + rng.f32() * 60.0;
        }
        v += rng.f32() * 8.0;
        *m = v.clamp(0.0, 255.0) as u8;
    }
}

fn bench_analysis(args: &Args) -> f64 {
    let mut rng = fastrand::Rng::with_seed(7);
    let mut mags = vec![0u8; args.bins];
    let mut sink = 0.0f32;
    let start = Instant::now();
    for step in 0..args.frames {
        synth_spectrum(&mut mags, args.sample_rate_hz, step, &mut rng);
        sink += analyze(&mags, args.sample_rate_hz, args.policy).brightness;
    }
    let ms = start.elapsed().as_secs_f64() * 1000.0 / args.frames as f64;
    println!("analysis: {:>7.3} ms/frame (checksum {:.3})", ms, sink);
    ms
}

fn bench_mode(args: &Args, mode: Mode, trails: bool) -> Result<f64> {
    let spectrum = Arc::new(SpectrumBuffer::new(args.bins, args.sample_rate_hz));
    let mut session = VisualizerSession::new(args.policy, args.particles, Some(42));
    session.attach(Arc::clone(&spectrum));
    session.resize(args.w, args.h);

    let settings = FrameSettings {
        mode,
        sensitivity: 1.2,
        trails,
    };
    let mut rng = fastrand::Rng::with_seed(11);
    let mut mags = vec![0u8; args.bins];
    let mut lit = 0u64;
    let mut total_ms = 0.0f64;

    let mut scheduler = ManualScheduler::new(args.frames, 1.0 / 60.0);
    scheduler.run(&mut |tick: &FrameTick| {
        synth_spectrum(&mut mags, args.sample_rate_hz, tick.index, &mut rng);
        spectrum.publish(&mags);

        let start = Instant::now();
        session.frame(&settings);
        total_ms += start.elapsed().as_secs_f64() * 1000.0;

        let px = session.surface().pixels();
        if px.chunks_exact(4).any(|p| p[0] != 0 || p[1] != 0 || p[2] != 0) {
            lit += 1;
        }
        Ok(TickControl::Continue)
    })?;

    let ms = total_ms / args.frames as f64;
    println!(
        "{:<10} trails={:<5} {:>7.3} ms/frame, lit {}/{} frames",
        mode.label(),
        trails,
        ms,
        lit,
        args.frames
    );
    Ok(ms)
}

fn main() -> Result<()> {
    let args = parse_args();
    println!(
        "benchmark: {}x{} raster, {} bins @ {} Hz, {} particles, {} frames, policy {:?}",
        args.w, args.h, args.bins, args.sample_rate_hz, args.particles, args.frames, args.policy
    );

    let mut worst = bench_analysis(&args);
    for mode in [Mode::Wave, Mode::Particles, Mode::Combined] {
        for trails in [false, true] {
            worst = worst.max(bench_mode(&args, mode, trails)?);
        }
    }

    if args.ci_smoke && worst > args.max_ms {
        anyhow::bail!(
            "ci smoke failed: worst {:.3} ms/frame exceeds {:.3} ms",
            worst,
            args.max_ms
        );
    }
    Ok(())
}
