//! Braille sub-cell canvas
//!
//! Each terminal cell holds a 2×4 grid of braille dots, so a `w×h` cell area
//! gives `2w×4h` addressable dots. Dots carry a color and a layer; a cell is
//! drawn in the color of its highest-layer lit dot.

use crate::terminal::Terminal;
use crossterm::style::Color;

/// Draw order, lowest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Layer {
    Land = 1,
    Region = 2,
    Path = 3,
    Effect = 4,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Dot {
    color: Color,
    layer: Layer,
}

/// Dot offsets within a cell → braille bit.
const DOT_BITS: [(usize, usize, u8); 8] = [
    (0, 0, 0x01),
    (0, 1, 0x02),
    (0, 2, 0x04),
    (1, 0, 0x08),
    (1, 1, 0x10),
    (1, 2, 0x20),
    (0, 3, 0x40),
    (1, 3, 0x80),
];

pub struct BrailleCanvas {
    width: usize,
    height: usize,
    dots: Vec<Option<Dot>>,
}

impl BrailleCanvas {
    /// Canvas covering `cols×rows` terminal cells.
    pub fn new(cols: u16, rows: u16) -> Self {
        let width = cols as usize * 2;
        let height = rows as usize * 4;
        Self {
            width,
            height,
            dots: vec![None; width * height],
        }
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        *self = Self::new(cols, rows);
    }

    /// Size in dots.
    pub fn dot_size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn clear(&mut self) {
        self.dots.fill(None);
    }

    /// Light a dot unless a higher layer already owns it.
    pub fn plot(&mut self, x: i32, y: i32, color: Color, layer: Layer) {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return;
        }
        let slot = &mut self.dots[y as usize * self.width + x as usize];
        if slot.map_or(true, |d| d.layer <= layer) {
            *slot = Some(Dot { color, layer });
        }
    }

    #[cfg(test)]
    pub fn is_set(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return false;
        }
        self.dots[y as usize * self.width + x as usize].is_some()
    }

    /// Bresenham line.
    pub fn line(&mut self, from: (f64, f64), to: (f64, f64), color: Color, layer: Layer) {
        self.dashed_line(from, to, color, layer, None);
    }

    /// Line drawn as `on` dots followed by `off` gaps when `dash` is given.
    pub fn dashed_line(
        &mut self,
        from: (f64, f64),
        to: (f64, f64),
        color: Color,
        layer: Layer,
        dash: Option<(usize, usize)>,
    ) {
        let Some((start, end)) = self.clip(from, to) else {
            return;
        };
        let (mut x0, mut y0) = (start.0.round() as i32, start.1.round() as i32);
        let (x1, y1) = (end.0.round() as i32, end.1.round() as i32);
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        // Dots skipped by clipping keep the dash phase anchored at `from`
        let mut step = (start.0 - from.0).abs().max((start.1 - from.1).abs()).round() as usize;

        loop {
            let visible = match dash {
                Some((on, off)) if on + off > 0 => step % (on + off) < on,
                _ => true,
            };
            if visible {
                self.plot(x0, y0, color, layer);
            }
            if x0 == x1 && y0 == y1 {
                break;
            }
            step += 1;
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    /// Liang-Barsky clip of `from → to` against the dot area, with one dot
    /// of slack. `None` when the segment misses it entirely.
    fn clip(&self, from: (f64, f64), to: (f64, f64)) -> Option<((f64, f64), (f64, f64))> {
        if !(from.0.is_finite() && from.1.is_finite() && to.0.is_finite() && to.1.is_finite()) {
            return None;
        }
        let (min_x, min_y) = (-1.0, -1.0);
        let (max_x, max_y) = (self.width as f64, self.height as f64);
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
        for (p, q) in [
            (-dx, from.0 - min_x),
            (dx, max_x - from.0),
            (-dy, from.1 - min_y),
            (dy, max_y - from.1),
        ] {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
            if t0 > t1 {
                return None;
            }
        }
        Some((
            (from.0 + dx * t0, from.1 + dy * t0),
            (from.0 + dx * t1, from.1 + dy * t1),
        ))
    }

    /// Closed outline through `points`.
    pub fn polyline(&mut self, points: &[(f64, f64)], color: Color, layer: Layer) {
        for (i, &a) in points.iter().enumerate() {
            let b = points[(i + 1) % points.len()];
            self.line(a, b, color, layer);
        }
    }

    /// Even-odd scanline fill.
    pub fn fill_polygon(&mut self, points: &[(f64, f64)], color: Color, layer: Layer) {
        if points.len() < 3 {
            return;
        }
        let min_y = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min).max(0.0).floor() as i32;
        let max_y = points
            .iter()
            .map(|p| p.1)
            .fold(f64::NEG_INFINITY, f64::max)
            .min(self.height as f64 - 1.0)
            .ceil() as i32;

        let mut crossings: Vec<f64> = Vec::new();
        for y in min_y..=max_y {
            let sy = y as f64 + 0.5;
            crossings.clear();
            for (i, &(ax, ay)) in points.iter().enumerate() {
                let (bx, by) = points[(i + 1) % points.len()];
                if (ay <= sy && by > sy) || (by <= sy && ay > sy) {
                    crossings.push(ax + (sy - ay) / (by - ay) * (bx - ax));
                }
            }
            crossings.sort_by(|a, b| a.total_cmp(b));
            for pair in crossings.chunks_exact(2) {
                let start = pair[0].round().max(0.0) as i32;
                let end = pair[1].round().min(self.width as f64) as i32;
                for x in start..end {
                    self.plot(x, y, color, layer);
                }
            }
        }
    }

    /// Circle outline, radius in dots.
    pub fn ring(&mut self, center: (f64, f64), radius: f64, color: Color, layer: Layer) {
        if radius < 0.5 {
            self.plot(center.0.round() as i32, center.1.round() as i32, color, layer);
            return;
        }
        let steps = ((radius * std::f64::consts::TAU).ceil() as usize).clamp(8, 720);
        for i in 0..steps {
            let a = i as f64 / steps as f64 * std::f64::consts::TAU;
            self.plot(
                (center.0 + radius * a.cos()).round() as i32,
                (center.1 + radius * a.sin()).round() as i32,
                color,
                layer,
            );
        }
    }

    /// Filled disc, radius in dots.
    pub fn disc(&mut self, center: (f64, f64), radius: f64, color: Color, layer: Layer) {
        let r = radius.max(0.0);
        let ri = r.ceil() as i32;
        let (cx, cy) = (center.0.round() as i32, center.1.round() as i32);
        for dy in -ri..=ri {
            for dx in -ri..=ri {
                if ((dx * dx + dy * dy) as f64) <= r * r + 0.5 {
                    self.plot(cx + dx, cy + dy, color, layer);
                }
            }
        }
    }

    /// Blit onto the terminal buffer with the top-left cell at `(x0, y0)`.
    pub fn render(&self, term: &mut Terminal, x0: i32, y0: i32) {
        let cols = self.width / 2;
        let rows = self.height / 4;
        for cy in 0..rows {
            for cx in 0..cols {
                let mut bits: u8 = 0;
                let mut top: Option<Dot> = None;
                for &(ox, oy, bit) in &DOT_BITS {
                    let x = cx * 2 + ox;
                    let y = cy * 4 + oy;
                    if let Some(dot) = self.dots[y * self.width + x] {
                        bits |= bit;
                        if top.map_or(true, |t| dot.layer >= t.layer) {
                            top = Some(dot);
                        }
                    }
                }
                if let Some(dot) = top {
                    let ch = char::from_u32(0x2800 + bits as u32).unwrap_or(' ');
                    term.set(x0 + cx as i32, y0 + cy as i32, ch, Some(dot.color), dot.layer >= Layer::Effect);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::rgb;

    const WHITE: Color = rgb(255, 255, 255);

    #[test]
    fn dimensions_are_two_by_four_per_cell() {
        let canvas = BrailleCanvas::new(10, 5);
        assert_eq!(canvas.dot_size(), (20, 20));
    }

    #[test]
    fn out_of_bounds_plots_are_ignored() {
        let mut canvas = BrailleCanvas::new(2, 2);
        canvas.plot(-1, 0, WHITE, Layer::Path);
        canvas.plot(4, 0, WHITE, Layer::Path);
        canvas.plot(0, 8, WHITE, Layer::Path);
        assert!(canvas.dots.iter().all(Option::is_none));
    }

    #[test]
    fn lower_layer_does_not_overwrite() {
        let mut canvas = BrailleCanvas::new(1, 1);
        let red = rgb(255, 0, 0);
        canvas.plot(0, 0, red, Layer::Path);
        canvas.plot(0, 0, WHITE, Layer::Land);
        assert_eq!(canvas.dots[0].map(|d| d.color), Some(red));
    }

    #[test]
    fn line_hits_both_endpoints() {
        let mut canvas = BrailleCanvas::new(10, 5);
        canvas.line((1.0, 1.0), (15.0, 9.0), WHITE, Layer::Path);
        assert!(canvas.is_set(1, 1));
        assert!(canvas.is_set(15, 9));
    }

    #[test]
    fn dashes_leave_gaps() {
        let mut canvas = BrailleCanvas::new(10, 1);
        canvas.dashed_line((0.0, 0.0), (19.0, 0.0), WHITE, Layer::Path, Some((3, 2)));
        let lit: Vec<bool> = (0..10).map(|x| canvas.is_set(x, 0)).collect();
        assert_eq!(lit, vec![true, true, true, false, false, true, true, true, false, false]);
    }

    #[test]
    fn far_offscreen_source_still_reaches_viewport() {
        let mut canvas = BrailleCanvas::new(10, 5);
        canvas.line((-1_000_000.0, 10.0), (10.0, 10.0), WHITE, Layer::Path);
        assert!((0..=10).all(|x| canvas.is_set(x, 10)));
        assert!(!canvas.is_set(11, 10));
    }

    #[test]
    fn clipped_dashes_keep_their_phase() {
        let mut canvas = BrailleCanvas::new(10, 1);
        canvas.dashed_line((-5.0, 0.0), (19.0, 0.0), WHITE, Layer::Path, Some((3, 2)));
        let lit: Vec<bool> = (0..10).map(|x| canvas.is_set(x, 0)).collect();
        assert_eq!(lit, vec![true, true, true, false, false, true, true, true, false, false]);
    }

    #[test]
    fn segment_outside_canvas_draws_nothing() {
        let mut canvas = BrailleCanvas::new(10, 5);
        canvas.line((-50.0, -50.0), (-10.0, 500.0), WHITE, Layer::Path);
        canvas.line((f64::NAN, 0.0), (5.0, 5.0), WHITE, Layer::Path);
        assert!(canvas.dots.iter().all(Option::is_none));
    }

    #[test]
    fn filled_square_covers_interior() {
        let mut canvas = BrailleCanvas::new(10, 5);
        canvas.fill_polygon(&[(2.0, 2.0), (10.0, 2.0), (10.0, 10.0), (2.0, 10.0)], WHITE, Layer::Region);
        assert!(canvas.is_set(5, 5));
        assert!(!canvas.is_set(12, 5));
        assert!(!canvas.is_set(5, 12));
    }

    #[test]
    fn ring_leaves_centre_empty() {
        let mut canvas = BrailleCanvas::new(10, 5);
        canvas.ring((10.0, 10.0), 5.0, WHITE, Layer::Effect);
        assert!(canvas.is_set(15, 10));
        assert!(!canvas.is_set(10, 10));
    }
}
