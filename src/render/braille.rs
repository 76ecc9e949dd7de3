use crate::render::{Frame, Renderer, text_frame_begin, text_frame_end, write_colors};
use std::io::Write;

// Dot order within a 2x4 cell, row-major: (0,0) (1,0) (0,1) (1,1) ...
const DOT_BITS: [u8; 8] = [0x01, 0x08, 0x02, 0x10, 0x04, 0x20, 0x40, 0x80];

/// 2x4 pixels per cell. Pixels brighter than the cell's mid luma become
/// dots in the mean "on" colour over the mean "off" colour.
pub struct BrailleRenderer {
    last_fg: Option<(u8, u8, u8)>,
    last_bg: Option<(u8, u8, u8)>,
}

impl BrailleRenderer {
    pub fn new() -> Self {
        Self {
            last_fg: None,
            last_bg: None,
        }
    }
}

impl Default for BrailleRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct ColorSum {
    r: u32,
    g: u32,
    b: u32,
    n: u32,
}

impl ColorSum {
    fn add(&mut self, (r, g, b): (u8, u8, u8)) {
        self.r += r as u32;
        self.g += g as u32;
        self.b += b as u32;
        self.n += 1;
    }

    fn mean(&self) -> Option<(u8, u8, u8)> {
        (self.n > 0).then(|| {
            (
                (self.r / self.n) as u8,
                (self.g / self.n) as u8,
                (self.b / self.n) as u8,
            )
        })
    }
}

impl Renderer for BrailleRenderer {
    fn name(&self) -> &'static str {
        "braille"
    }

    fn render(&mut self, frame: &Frame<'_>, out: &mut dyn Write) -> anyhow::Result<()> {
        let Some((cols, visual_rows)) = text_frame_begin(frame, 2, 4, out)? else {
            return Ok(());
        };
        self.last_fg = None;
        self.last_bg = None;

        let w = frame.pixel_width;
        let px = frame.pixels_rgba;
        for row in 0..visual_rows {
            for col in 0..cols {
                let mut lum = [0u16; 8];
                let mut rgb = [(0u8, 0u8, 0u8); 8];
                for dy in 0..4usize {
                    for dx in 0..2usize {
                        let i = dy * 2 + dx;
                        let idx = ((row * 4 + dy) * w + col * 2 + dx) * 4;
                        rgb[i] = (px[idx], px[idx + 1], px[idx + 2]);
                        lum[i] = luma(px[idx], px[idx + 1], px[idx + 2]);
                    }
                }

                let min_l = lum.iter().copied().min().unwrap_or(0);
                let max_l = lum.iter().copied().max().unwrap_or(0);
                let thr = (min_l + max_l) / 2;

                let mut bits = 0u8;
                let mut on = ColorSum::default();
                let mut off = ColorSum::default();
                for i in 0..8 {
                    if lum[i] > thr {
                        bits |= DOT_BITS[i];
                        on.add(rgb[i]);
                    } else {
                        off.add(rgb[i]);
                    }
                }

                let bg = off.mean().unwrap_or((0, 0, 0));
                let (fg, ch) = match on.mean() {
                    Some(fg) => (fg, char::from_u32(0x2800 + bits as u32).unwrap_or(' ')),
                    None => (bg, ' '),
                };

                write_colors(out, &mut self.last_fg, &mut self.last_bg, fg, bg)?;
                write!(out, "{ch}")?;
            }
            out.write_all(b"\r\n")?;
        }

        text_frame_end(frame, cols, visual_rows, out)
    }
}

#[inline]
fn luma(r: u8, g: u8, b: u8) -> u16 {
    // Rec.709 weights in 8.8 fixed point.
    ((r as u32 * 54 + g as u32 * 183 + b as u32 * 19) >> 8) as u16
}
