use crate::render::{Frame, Renderer, text_frame_begin, text_frame_end, write_colors};
use std::io::Write;

const HALF_BLOCK: char = '\u{2580}';

/// One cell per column, two stacked pixels per cell (fg = top, bg = bottom).
pub struct HalfBlockRenderer {
    last_fg: Option<(u8, u8, u8)>,
    last_bg: Option<(u8, u8, u8)>,
}

impl HalfBlockRenderer {
    pub fn new() -> Self {
        Self {
            last_fg: None,
            last_bg: None,
        }
    }
}

impl Default for HalfBlockRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for HalfBlockRenderer {
    fn name(&self) -> &'static str {
        "halfblock"
    }

    fn render(&mut self, frame: &Frame<'_>, out: &mut dyn Write) -> anyhow::Result<()> {
        let Some((cols, visual_rows)) = text_frame_begin(frame, 1, 2, out)? else {
            return Ok(());
        };
        self.last_fg = None;
        self.last_bg = None;

        let w = frame.pixel_width;
        let px = frame.pixels_rgba;
        for row in 0..visual_rows {
            let top = row * 2 * w;
            let bot = top + w;
            for x in 0..cols {
                let ti = (top + x) * 4;
                let bi = (bot + x) * 4;
                write_colors(
                    out,
                    &mut self.last_fg,
                    &mut self.last_bg,
                    (px[ti], px[ti + 1], px[ti + 2]),
                    (px[bi], px[bi + 1], px[bi + 2]),
                )?;
                write!(out, "{HALF_BLOCK}")?;
            }
            out.write_all(b"\r\n")?;
        }

        text_frame_end(frame, cols, visual_rows, out)
    }
}
