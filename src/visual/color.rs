pub const WHITE: [u8; 3] = [255, 255, 255];
pub const BLACK: [u8; 3] = [0, 0, 0];

/// Hue in degrees (any range), saturation and lightness in `[0, 1]`.
pub fn hsl_to_rgb(hue_deg: f32, s: f32, l: f32) -> [u8; 3] {
    let h = fract01(hue_deg / 360.0) * 6.0;
    let s = s.clamp(0.0, 1.0);
    let l = l.clamp(0.0, 1.0);
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let m = l - c * 0.5;
    let (r, g, b) = match (h.floor() as i32).rem_euclid(6) {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    [
        ((r + m).clamp(0.0, 1.0) * 255.0).round() as u8,
        ((g + m).clamp(0.0, 1.0) * 255.0).round() as u8,
        ((b + m).clamp(0.0, 1.0) * 255.0).round() as u8,
    ]
}

pub fn lerp_rgb(a: [u8; 3], b: [u8; 3], t: f32) -> [u8; 3] {
    let t = t.clamp(0.0, 1.0);
    let ch = |i: usize| (a[i] as f32 + (b[i] as f32 - a[i] as f32) * t).round() as u8;
    [ch(0), ch(1), ch(2)]
}

/// Edge colour at both ends fading to white in the middle.
pub fn edge_center_gradient(edge: [u8; 3], x: f32, width: f32) -> [u8; 3] {
    if width <= 0.0 {
        return edge;
    }
    let t = (x / width).clamp(0.0, 1.0);
    let to_center = 1.0 - (t - 0.5).abs() * 2.0;
    lerp_rgb(edge, WHITE, to_center)
}

pub fn fract01(x: f32) -> f32 {
    let f = x - x.floor();
    if f < 0.0 { f + 1.0 } else { f }
}
