use crate::audio::{BandEnergies, CaptureConfig, SignalStatus};
use crate::config::{Config, MAX_SENSITIVITY, MIN_SENSITIVITY, Mode, clamp_sensitivity};
use crate::render::{Frame, make_renderer};
use crate::scheduler::{CancelToken, FixedRateScheduler, FrameTick, Scheduler, TickControl};
use crate::session::VisualizerSession;
use crate::terminal::{TerminalGuard, raster_size};
use crate::visual::FrameSettings;
use anyhow::Context;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use std::io::BufWriter;
use std::time::{Duration, Instant};
use tracing::info;

const SENSITIVITY_STEP: f32 = 0.1;

struct UiState {
    settings: FrameSettings,
    show_hud: bool,
    show_help: bool,
    capture_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyOutcome {
    Continue,
    Quit,
    ToggleCapture,
    Reseed,
    LayoutChanged,
}

pub fn run(cfg: Config) -> anyhow::Result<()> {
    let capture = cfg.capture();
    capture.validate().context("invalid --fft-size")?;

    let _term = TerminalGuard::new()?;
    let mut out = BufWriter::new(TerminalGuard::stdout());
    let mut renderer = make_renderer(cfg.renderer);
    let cell = cfg.renderer.cell_pixels();

    let mut session = VisualizerSession::new(cfg.policy, cfg.particle_count(), cfg.seed);
    let mut ui = UiState {
        settings: cfg.frame_settings(),
        show_hud: true,
        show_help: false,
        capture_error: None,
    };
    start_capture(&mut session, &capture, &mut ui);

    let mut last_size = TerminalGuard::checked_size()?;
    let mut hud_rows = hud_rows_for_text(last_size.1, ui.show_hud, 3);
    resize_session(&mut session, last_size, cell, hud_rows);

    let mut fps = FpsCounter::new();
    let policy_label = format!("{:?}", cfg.policy);
    let mut scheduler = FixedRateScheduler::new(cfg.fps, CancelToken::new());

    scheduler.run(&mut |_tick: &FrameTick| {
        // Drain input events (non-blocking).
        while event::poll(Duration::from_millis(0))? {
            match event::read()? {
                Event::Key(k) if k.kind != KeyEventKind::Release => {
                    match handle_key(k.code, k.modifiers, &mut ui) {
                        KeyOutcome::Quit => return Ok(TickControl::Stop),
                        KeyOutcome::ToggleCapture => {
                            if session.is_capturing() {
                                session.stop();
                            } else {
                                start_capture(&mut session, &capture, &mut ui);
                            }
                        }
                        KeyOutcome::Reseed => session.reseed(),
                        KeyOutcome::LayoutChanged => {
                            hud_rows = hud_rows_for_text(last_size.1, ui.show_hud, 3);
                            resize_session(&mut session, last_size, cell, hud_rows);
                        }
                        KeyOutcome::Continue => {}
                    }
                }
                Event::Resize(c, r) => {
                    last_size = (c, r);
                    resize_session(&mut session, last_size, cell, hud_rows);
                }
                _ => {}
            }
        }

        // Resize events can be missed in some terminals.
        let sz = TerminalGuard::size()?;
        if sz != last_size {
            last_size = sz;
            resize_session(&mut session, last_size, cell, hud_rows);
        }

        let bands = session.frame(&ui.settings);

        let (term_cols, term_rows) = last_size;
        let status = if session.is_capturing() {
            session.signal_status()
        } else {
            SignalStatus::Idle
        };
        let hud = if ui.show_hud {
            build_wrapped_hud(term_cols as usize, &ui, &bands, status, &policy_label, fps.fps())
        } else {
            String::new()
        };
        let wanted = hud_rows_for_text(term_rows, ui.show_hud, hud.lines().count());
        if wanted != hud_rows {
            hud_rows = wanted;
            resize_session(&mut session, last_size, cell, hud_rows);
            // Skip painting a frame whose raster no longer matches the layout.
            return Ok(TickControl::Continue);
        }

        let surface = session.surface();
        let frame = Frame {
            term_cols,
            term_rows,
            visual_rows: term_rows.saturating_sub(hud_rows).max(1),
            pixel_width: surface.width(),
            pixel_height: surface.height(),
            pixels_rgba: surface.pixels(),
            hud: &hud,
            hud_rows,
            hud_alert: !matches!(status, SignalStatus::Live),
            overlay: ui.show_help.then(help_popup_text),
            sync_updates: cfg.sync_updates,
        };
        renderer.render(&frame, &mut out)?;
        fps.tick();
        Ok(TickControl::Continue)
    })?;

    session.stop();
    Ok(())
}

fn start_capture(session: &mut VisualizerSession, capture: &CaptureConfig, ui: &mut UiState) {
    match session.start(capture) {
        Ok(()) => ui.capture_error = None,
        Err(err) => ui.capture_error = Some(err.to_string()),
    }
}

fn resize_session(
    session: &mut VisualizerSession,
    size: (u16, u16),
    cell: (usize, usize),
    hud_rows: u16,
) {
    let (w, h) = raster_size(size, hud_rows, cell);
    if session.resize(w, h) {
        info!(cols = size.0, rows = size.1, w, h, "raster resized");
    }
}

fn handle_key(code: KeyCode, mods: KeyModifiers, ui: &mut UiState) -> KeyOutcome {
    if mods.contains(KeyModifiers::CONTROL) && matches!(code, KeyCode::Char('c')) {
        return KeyOutcome::Quit;
    }

    let s = &mut ui.settings;
    match code {
        KeyCode::Esc if ui.show_help => {
            ui.show_help = false;
            KeyOutcome::Continue
        }
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => KeyOutcome::Quit,
        KeyCode::Char('m') | KeyCode::Char('M') => {
            s.mode = s.mode.next();
            KeyOutcome::Continue
        }
        KeyCode::Char('1') => {
            s.mode = Mode::Wave;
            KeyOutcome::Continue
        }
        KeyCode::Char('2') => {
            s.mode = Mode::Particles;
            KeyOutcome::Continue
        }
        KeyCode::Char('3') => {
            s.mode = Mode::Combined;
            KeyOutcome::Continue
        }
        KeyCode::Char('t') | KeyCode::Char('T') => {
            s.trails = !s.trails;
            KeyOutcome::Continue
        }
        KeyCode::Up => {
            s.sensitivity = clamp_sensitivity(s.sensitivity + SENSITIVITY_STEP);
            KeyOutcome::Continue
        }
        KeyCode::Down => {
            s.sensitivity = clamp_sensitivity(s.sensitivity - SENSITIVITY_STEP);
            KeyOutcome::Continue
        }
        KeyCode::Char(' ') => KeyOutcome::ToggleCapture,
        KeyCode::Char('r') | KeyCode::Char('R') => KeyOutcome::Reseed,
        KeyCode::Char('i') | KeyCode::Char('I') => {
            ui.show_hud = !ui.show_hud;
            KeyOutcome::LayoutChanged
        }
        KeyCode::Char('?') | KeyCode::Char('h') | KeyCode::Char('H') | KeyCode::F(1) => {
            ui.show_help = !ui.show_help;
            KeyOutcome::Continue
        }
        _ => KeyOutcome::Continue,
    }
}

fn hud_rows_for_text(term_rows: u16, show_hud: bool, lines: usize) -> u16 {
    if !show_hud {
        return 0;
    }
    let max_rows = term_rows.saturating_sub(1);
    (lines.min(u16::MAX as usize) as u16).min(max_rows)
}

fn build_wrapped_hud(
    cols: usize,
    ui: &UiState,
    bands: &BandEnergies,
    status: SignalStatus,
    policy_label: &str,
    fps: f32,
) -> String {
    let s = &ui.settings;
    let capture_line = match (&ui.capture_error, status) {
        (Some(err), SignalStatus::Idle) => format!("Capture failed: {err} (space to retry)"),
        (_, SignalStatus::Idle) => "Capture stopped (space to start)".to_string(),
        _ => format!(
            "Bass {:>4.2} | Mid {:>4.2} | Treble {:>4.2} | Avg {:>4.2} | Bright {:>4.2}",
            bands.bass, bands.mid, bands.treble, bands.average, bands.brightness
        ),
    };
    let logical_lines = vec![
        format!(
            "Mode: {} | Sens: {:>4.2} ({:.1}-{:.1}) | Trails: {} | Signal: {} | Bands: {} | FPS: {:>4.1}",
            s.mode.label(),
            s.sensitivity,
            MIN_SENSITIVITY,
            MAX_SENSITIVITY,
            if s.trails { "on" } else { "off" },
            status.label(),
            policy_label,
            fps,
        ),
        capture_line,
        "Keys: m mode | 1/2/3 wave/particles/combined | t trails | up/down sensitivity | space capture | r reseed | i HUD | ? help | q quit".to_string(),
    ];

    wrap_hud_lines(cols, &logical_lines).join("\n")
}

fn wrap_hud_lines(cols: usize, lines: &[String]) -> Vec<String> {
    let width = cols.max(1);
    let mut out = Vec::new();
    for line in lines {
        let chars: Vec<char> = line.chars().collect();
        if chars.is_empty() {
            out.push(String::new());
            continue;
        }
        for chunk in chars.chunks(width) {
            out.push(chunk.iter().collect());
        }
    }
    out
}

fn help_popup_text() -> &'static str {
    "audioscape hotkeys\n\
m  cycle mode: wave/particles/combined\n\
1/2/3  wave / particles / combined\n\
t  toggle trails (fade instead of clear)\n\
up/down  sensitivity\n\
space  stop/start microphone capture\n\
r  regenerate particles\n\
i  show/hide HUD\n\
? or h or F1  toggle this help\n\
q or esc  quit"
}

struct FpsCounter {
    last: Instant,
    frames: u32,
    fps: f32,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            last: Instant::now(),
            frames: 0,
            fps: 0.0,
        }
    }

    fn tick(&mut self) {
        self.frames += 1;
        let now = Instant::now();
        let dt = now.duration_since(self.last).as_secs_f32();
        if dt >= 0.5 {
            self.fps = (self.frames as f32) / dt;
            self.frames = 0;
            self.last = now;
        }
    }

    fn fps(&self) -> f32 {
        self.fps
    }
}
