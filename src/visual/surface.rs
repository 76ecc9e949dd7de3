/// Pixels along the short edge at which renderer units are used unscaled.
/// Canvas height at which reference pixels and raster pixels coincide.
pub const REFERENCE_HEIGHT: f32 = 720.0;
const MIN_PIXEL_SCALE: f32 = 0.15;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Blend {
    /// Standard source-over compositing.
    Over,
    /// Additive, saturating at white.
    Add,
}

/// An owned RGBA8 raster handed to every renderer call.
///
/// Alpha is kept at 255; opacity is applied while compositing.
pub struct Surface {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
    // Per-pixel stroke coverage, reused between strokes.
    mask: Vec<f32>,
}

impl Surface {
    pub fn new(width: usize, height: usize) -> Self {
        let mut s = Self {
            width: 0,
            height: 0,
            pixels: Vec::new(),
            mask: Vec::new(),
        };
        s.resize(width, height);
        s
    }

    /// Reallocate for a new size. Returns false when the size is unchanged.
    pub fn resize(&mut self, width: usize, height: usize) -> bool {
        if width == self.width && height == self.height && !self.pixels.is_empty() {
            return false;
        }
        self.width = width;
        self.height = height;
        self.pixels = vec![0; width.saturating_mul(height).saturating_mul(4)];
        self.mask = vec![0.0; width.saturating_mul(height)];
        self.clear();
        true
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        if x >= self.width || y >= self.height {
            return [0, 0, 0, 0];
        }
        let i = (y * self.width + x) * 4;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    /// Raster pixels per reference pixel.
    ///
    /// Fixed drawing constants such as stroke widths, glow radii and the wave
    /// amplitude floor are given in reference pixels of a
    /// [`REFERENCE_HEIGHT`]-tall canvas. A terminal raster is far shorter, so
    /// those constants shrink with it and keep the same proportions. Lengths
    /// derived from the surface size (wave amplitudes, baselines) are already
    /// raster pixels and are not scaled again.
    pub fn pixel_scale(&self) -> f32 {
        (self.height as f32 / REFERENCE_HEIGHT).clamp(MIN_PIXEL_SCALE, 1.0)
    }

    /// Convert a length in reference pixels to raster pixels.
    pub fn px(&self, reference: f32) -> f32 {
        reference * self.pixel_scale()
    }

    pub fn clear(&mut self) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&[0, 0, 0, 255]);
        }
    }

    /// Composite a full-surface overlay, e.g. a translucent black for trails.
    pub fn fade(&mut self, color: [u8; 3], alpha: f32) {
        let a = alpha.clamp(0.0, 1.0);
        if a <= 0.0 {
            return;
        }
        for px in self.pixels.chunks_exact_mut(4) {
            for c in 0..3 {
                px[c] = mix(px[c], color[c], a);
            }
        }
    }

    pub fn blend_px(&mut self, x: isize, y: isize, color: [u8; 3], alpha: f32, blend: Blend) {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return;
        }
        let a = alpha.clamp(0.0, 1.0);
        if a <= 0.0 {
            return;
        }
        let i = (y as usize * self.width + x as usize) * 4;
        let px = &mut self.pixels[i..i + 3];
        match blend {
            Blend::Over => {
                for c in 0..3 {
                    px[c] = mix(px[c], color[c], a);
                }
            }
            Blend::Add => {
                for c in 0..3 {
                    let v = px[c] as f32 + color[c] as f32 * a;
                    px[c] = v.min(255.0) as u8;
                }
            }
        }
    }

    /// Stroke an anti-aliased polyline with an optional soft glow.
    ///
    /// Coverage is merged per pixel (max over segments) before compositing so
    /// joints are not painted twice. `color_at` maps an x coordinate to the
    /// stroke colour, which is how horizontal gradients are expressed.
    pub fn stroke_polyline(
        &mut self,
        points: &[(f32, f32)],
        width: f32,
        glow: f32,
        alpha: f32,
        color_at: impl Fn(f32) -> [u8; 3],
        blend: Blend,
    ) {
        if points.len() < 2 || self.width == 0 || self.height == 0 {
            return;
        }
        let half = (width * 0.5).max(0.5);
        let glow = glow.max(0.0);
        let reach = half + glow + 1.0;

        self.mask.iter_mut().for_each(|m| *m = 0.0);
        let (mut min_x, mut max_x) = (self.width, 0usize);
        let (mut min_y, mut max_y) = (self.height, 0usize);

        for seg in points.windows(2) {
            let (ax, ay) = seg[0];
            let (bx, by) = seg[1];
            let Some((x0, x1, y0, y1)) =
                self.clip_box(ax.min(bx) - reach, ax.max(bx) + reach, ay.min(by) - reach, ay.max(by) + reach)
            else {
                continue;
            };
            min_x = min_x.min(x0);
            max_x = max_x.max(x1);
            min_y = min_y.min(y0);
            max_y = max_y.max(y1);

            for y in y0..=y1 {
                for x in x0..=x1 {
                    let d = dist_to_segment(x as f32 + 0.5, y as f32 + 0.5, ax, ay, bx, by);
                    let cov = coverage(d, half, glow);
                    let m = &mut self.mask[y * self.width + x];
                    if cov > *m {
                        *m = cov;
                    }
                }
            }
        }

        if min_x > max_x || min_y > max_y {
            return;
        }
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let cov = self.mask[y * self.width + x];
                if cov > 0.0 {
                    let c = color_at(x as f32);
                    self.blend_px(x as isize, y as isize, c, alpha * cov, blend);
                }
            }
        }
    }

    /// Fill a disc with an anti-aliased edge and an optional soft halo.
    pub fn fill_disc(
        &mut self,
        cx: f32,
        cy: f32,
        radius: f32,
        glow: f32,
        color: [u8; 3],
        alpha: f32,
        blend: Blend,
    ) {
        let r = radius.max(0.0);
        let glow = glow.max(0.0);
        let reach = r + glow + 1.0;
        let Some((x0, x1, y0, y1)) = self.clip_box(cx - reach, cx + reach, cy - reach, cy + reach)
        else {
            return;
        };
        for y in y0..=y1 {
            for x in x0..=x1 {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                let cov = coverage((dx * dx + dy * dy).sqrt(), r, glow);
                if cov > 0.0 {
                    self.blend_px(x as isize, y as isize, color, alpha * cov, blend);
                }
            }
        }
    }

    fn clip_box(&self, x0: f32, x1: f32, y0: f32, y1: f32) -> Option<(usize, usize, usize, usize)> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let wmax = (self.width - 1) as f32;
        let hmax = (self.height - 1) as f32;
        if x1 < 0.0 || y1 < 0.0 || x0 > wmax || y0 > hmax {
            return None;
        }
        Some((
            x0.max(0.0).floor() as usize,
            x1.min(wmax).ceil() as usize,
            y0.max(0.0).floor() as usize,
            y1.min(hmax).ceil() as usize,
        ))
    }
}

/// Solid core with a one-pixel AA edge, then a quadratic halo out to `glow`.
fn coverage(d: f32, half: f32, glow: f32) -> f32 {
    let core = (half + 0.5 - d).clamp(0.0, 1.0);
    if glow <= 0.0 || d <= half {
        return core;
    }
    let t = (1.0 - (d - half) / glow).clamp(0.0, 1.0);
    core.max(t * t * 0.45)
}

fn dist_to_segment(px: f32, py: f32, ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    let (dx, dy) = (bx - ax, by - ay);
    let len2 = dx * dx + dy * dy;
    let t = if len2 > 1e-12 {
        (((px - ax) * dx + (py - ay) * dy) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (qx, qy) = (ax + t * dx - px, ay + t * dy - py);
    (qx * qx + qy * qy).sqrt()
}

#[inline]
fn mix(dst: u8, src: u8, a: f32) -> u8 {
    (dst as f32 + (src as f32 - dst as f32) * a).round().clamp(0.0, 255.0) as u8
}
