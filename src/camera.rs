//! Pan/zoom viewport camera
//!
//! Scale and translation each have a current and a target value. Input only
//! moves targets; `tick` runs every frame and eases the current values toward
//! them, and keeps any fling velocity decaying. Screen position of a content
//! point `p` is `p * scale + translate`.

use std::time::{Duration, Instant};

/// 2D vector in viewport (braille dot) units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f64 {
        self.x.hypot(self.y)
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;
    fn add(self, o: Vec2) -> Vec2 {
        Vec2::new(self.x + o.x, self.y + o.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, o: Vec2) -> Vec2 {
        Vec2::new(self.x - o.x, self.y - o.y)
    }
}

impl std::ops::Mul<f64> for Vec2 {
    type Output = Vec2;
    fn mul(self, k: f64) -> Vec2 {
        Vec2::new(self.x * k, self.y * k)
    }
}

#[derive(Clone, Debug)]
pub struct CameraConfig {
    pub min_scale: f64,
    pub max_scale: f64,
    /// Multiplicative scale change per zoom step.
    pub zoom_step: f64,
    /// Fraction of the remaining distance covered per tick, in (0, 1).
    pub smoothing: f64,
    /// How far past the viewport edge a zoomed map may be dragged.
    pub drag_margin: f64,
    /// Per-tick velocity multiplier after release.
    pub friction: f64,
    /// Velocities below this (dots per tick) stop the fling.
    pub min_velocity: f64,
    /// Releases sooner than this after press are taps.
    pub tap_threshold: Duration,
    /// Extra velocity damping applied to taps.
    pub tap_damping: f64,
    /// Nominal frame period, used to turn pointer samples into per-tick velocity.
    pub frame: Duration,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            min_scale: 1.0,
            max_scale: 8.0,
            zoom_step: 1.25,
            smoothing: 0.2,
            drag_margin: 40.0,
            friction: 0.92,
            min_velocity: 0.05,
            tap_threshold: Duration::from_millis(50),
            tap_damping: 0.2,
            frame: Duration::from_millis(33),
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Drag {
    origin: Vec2,
    start_translate: Vec2,
    /// Velocity reference: the newest sample at least one frame old.
    sample_pos: Vec2,
    sample_at: Instant,
    pressed_at: Instant,
    velocity: Vec2,
}

/// Snap distance below which smoothing is considered converged.
const SETTLE_EPSILON: f64 = 1e-3;

pub struct Camera {
    config: CameraConfig,
    viewport: Vec2,
    content: Vec2,
    scale: f64,
    translate: Vec2,
    target_scale: f64,
    target_translate: Vec2,
    pan_velocity: Vec2,
    drag: Option<Drag>,
}

impl Camera {
    /// `viewport` is the screen area, `content` the map's size at scale 1.
    pub fn new(config: CameraConfig, viewport: Vec2, content: Vec2) -> Self {
        let mut camera = Self {
            config,
            viewport,
            content,
            scale: 1.0,
            translate: Vec2::ZERO,
            target_scale: 1.0,
            target_translate: Vec2::ZERO,
            pan_velocity: Vec2::ZERO,
            drag: None,
        };
        camera.reset();
        camera.snap();
        camera
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    #[cfg(test)]
    pub fn translate(&self) -> Vec2 {
        self.translate
    }

    #[cfg(test)]
    pub fn target_scale(&self) -> f64 {
        self.target_scale
    }

    #[cfg(test)]
    pub fn target_translate(&self) -> Vec2 {
        self.target_translate
    }

    /// Content point to screen point using the current state.
    pub fn to_screen(&self, content: Vec2) -> Vec2 {
        content * self.scale + self.translate
    }

    /// Screen point back to content space using the current state.
    #[cfg(test)]
    pub fn to_content(&self, screen: Vec2) -> Vec2 {
        (screen - self.translate) * (1.0 / self.scale)
    }

    /// Terminal resized: keep the zoom level, re-apply bounds.
    pub fn resize(&mut self, viewport: Vec2, content: Vec2) {
        self.viewport = viewport;
        self.content = content;
        self.target_translate = self.constrain(self.target_translate, self.target_scale);
        self.translate = self.constrain(self.translate, self.scale);
    }

    /// Keep the scaled content within the viewport plus the drag margin.
    /// An axis where the content is smaller than the viewport is centred.
    pub fn constrain(&self, translate: Vec2, scale: f64) -> Vec2 {
        Vec2::new(
            constrain_axis(translate.x, self.content.x * scale, self.viewport.x, self.config.drag_margin),
            constrain_axis(translate.y, self.content.y * scale, self.viewport.y, self.config.drag_margin),
        )
    }

    /// Whether `translate` satisfies the bounds at `scale`.
    #[cfg(test)]
    pub fn is_contained(&self, translate: Vec2, scale: f64) -> bool {
        let c = self.constrain(translate, scale);
        (c.x - translate.x).abs() < 1e-6 && (c.y - translate.y).abs() < 1e-6
    }

    /// Zoom one step in (`direction > 0`) or out, keeping the content point
    /// under `anchor` fixed on screen.
    pub fn zoom(&mut self, direction: i32, anchor: Vec2) {
        let old = self.target_scale;
        let new = (old * self.config.zoom_step.powi(direction.signum()))
            .clamp(self.config.min_scale, self.config.max_scale);
        if (new - old).abs() < f64::EPSILON {
            return;
        }
        let anchored = (anchor - self.target_translate) * (1.0 / old);
        self.target_scale = new;
        self.target_translate = self.constrain(anchor - anchored * new, new);
    }

    pub fn zoom_centered(&mut self, direction: i32) {
        self.zoom(direction, self.viewport * 0.5);
    }

    pub fn pan_to(&mut self, target: Vec2) {
        self.pan_velocity = Vec2::ZERO;
        self.target_translate = self.constrain(target, self.target_scale);
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan_to(self.target_translate + delta);
    }

    /// Back to the whole map, centred. Current values ease there.
    pub fn reset(&mut self) {
        self.drag = None;
        self.pan_velocity = Vec2::ZERO;
        self.target_scale = self.config.min_scale;
        self.target_translate = self.constrain(Vec2::ZERO, self.target_scale);
    }

    pub fn pointer_down(&mut self, pos: Vec2, now: Instant) {
        self.pan_velocity = Vec2::ZERO;
        self.drag = Some(Drag {
            origin: pos,
            start_translate: self.target_translate,
            sample_pos: pos,
            sample_at: now,
            pressed_at: now,
            velocity: Vec2::ZERO,
        });
    }

    /// Dragging moves the target; the smoothing step chases it.
    pub fn pointer_move(&mut self, pos: Vec2, now: Instant) {
        let Some(mut drag) = self.drag else {
            return;
        };
        let target = drag.start_translate + (pos - drag.origin);
        self.target_translate = self.constrain(target, self.target_scale);

        // Input arrives in bursts between frames, so never measure over
        // less than one frame.
        let frame = self.config.frame.as_secs_f64().max(0.001);
        let elapsed = now.saturating_duration_since(drag.sample_at).as_secs_f64();
        drag.velocity = (pos - drag.sample_pos) * (frame / elapsed.max(frame));
        if elapsed >= frame {
            drag.sample_pos = pos;
            drag.sample_at = now;
        }
        self.drag = Some(drag);
    }

    pub fn pointer_up(&mut self, now: Instant) {
        let Some(drag) = self.drag.take() else {
            return;
        };
        let mut velocity = drag.velocity;
        if now.saturating_duration_since(drag.pressed_at) < self.config.tap_threshold {
            velocity = velocity * self.config.tap_damping;
        }
        self.pan_velocity = if velocity.length() < self.config.min_velocity {
            Vec2::ZERO
        } else {
            velocity
        };
    }

    /// Per-frame update: apply fling inertia to the target, then ease the
    /// current state toward the target.
    pub fn tick(&mut self) {
        if self.drag.is_none() && self.pan_velocity != Vec2::ZERO {
            self.target_translate = self.constrain(self.target_translate + self.pan_velocity, self.target_scale);
            self.pan_velocity = self.pan_velocity * self.config.friction;
            if self.pan_velocity.length() < self.config.min_velocity {
                self.pan_velocity = Vec2::ZERO;
            }
        }

        let k = self.config.smoothing;
        self.scale += (self.target_scale - self.scale) * k;
        self.translate = self.translate + (self.target_translate - self.translate) * k;

        if (self.target_scale - self.scale).abs() < SETTLE_EPSILON
            && (self.target_translate - self.translate).length() < SETTLE_EPSILON
        {
            self.snap();
        }
        self.translate = self.constrain(self.translate, self.scale);
    }

    /// True while anything is still moving.
    #[cfg(test)]
    pub fn is_animating(&self) -> bool {
        self.pan_velocity != Vec2::ZERO
            || (self.target_scale - self.scale).abs() > 0.0
            || self.target_translate != self.translate
    }

    fn snap(&mut self) {
        self.scale = self.target_scale;
        self.translate = self.target_translate;
    }
}

fn constrain_axis(t: f64, scaled: f64, viewport: f64, margin: f64) -> f64 {
    if scaled <= viewport {
        (viewport - scaled) / 2.0
    } else {
        t.clamp(viewport - scaled - margin, margin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    fn camera() -> Camera {
        Camera::new(CameraConfig::default(), Vec2::new(200.0, 100.0), Vec2::new(200.0, 100.0))
    }

    fn settle(camera: &mut Camera) {
        for _ in 0..500 {
            camera.tick();
        }
    }

    #[test]
    fn starts_centred_at_min_scale() {
        let cam = Camera::new(CameraConfig::default(), Vec2::new(300.0, 100.0), Vec2::new(200.0, 100.0));
        assert_eq!(cam.scale(), 1.0);
        assert_eq!(cam.translate(), Vec2::new(50.0, 0.0));
    }

    #[test]
    fn zoom_keeps_anchor_fixed() {
        let mut cam = camera();
        let anchor = Vec2::new(120.0, 40.0);
        let before = cam.to_content(anchor);
        cam.zoom(1, anchor);
        settle(&mut cam);
        let after = cam.to_content(anchor);
        assert!((before.x - after.x).abs() < 1e-6);
        assert!((before.y - after.y).abs() < 1e-6);
        assert!((cam.scale() - 1.25).abs() < 1e-9);
    }

    #[test]
    fn target_scale_is_clamped() {
        let mut cam = camera();
        for _ in 0..50 {
            cam.zoom_centered(1);
        }
        assert!((cam.target_scale() - 8.0).abs() < 1e-9);
        for _ in 0..50 {
            cam.zoom_centered(-1);
        }
        assert!((cam.target_scale() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn small_axis_is_centred_not_clamped() {
        let cam = Camera::new(CameraConfig::default(), Vec2::new(400.0, 100.0), Vec2::new(200.0, 100.0));
        let c = cam.constrain(Vec2::new(-999.0, 999.0), 1.0);
        assert_eq!(c.x, 100.0);
        assert_eq!(c.y, 0.0);
    }

    #[test]
    fn tick_converges_toward_target() {
        let mut cam = camera();
        cam.zoom_centered(1);
        cam.tick();
        assert!(cam.scale() > 1.0 && cam.scale() < 1.25);
        settle(&mut cam);
        assert!(!cam.is_animating());
    }

    #[test]
    fn drag_sets_target_and_lags() {
        let mut cam = camera();
        cam.zoom_centered(1);
        cam.zoom_centered(1);
        settle(&mut cam);
        let start = cam.target_translate();
        let t0 = Instant::now();
        cam.pointer_down(Vec2::new(100.0, 50.0), t0);
        cam.pointer_move(Vec2::new(110.0, 55.0), t0 + Duration::from_millis(33));
        assert_eq!(cam.target_translate(), cam.constrain(start + Vec2::new(10.0, 5.0), cam.target_scale()));
        assert_eq!(cam.translate(), start);
        cam.tick();
        assert!(cam.translate() != start);
    }

    #[test]
    fn fling_decays_to_rest() {
        let mut cam = camera();
        for _ in 0..6 {
            cam.zoom_centered(1);
        }
        settle(&mut cam);
        let t0 = Instant::now();
        cam.pointer_down(Vec2::new(100.0, 50.0), t0);
        cam.pointer_move(Vec2::new(104.0, 50.0), t0 + Duration::from_millis(200));
        cam.pointer_move(Vec2::new(108.0, 50.0), t0 + Duration::from_millis(233));
        let released = cam.target_translate();
        cam.pointer_up(t0 + Duration::from_millis(240));
        cam.tick();
        assert!(cam.target_translate().x > released.x);
        settle(&mut cam);
        assert!(!cam.is_animating());
    }

    #[test]
    fn tap_release_is_damped() {
        let mut cam = camera();
        for _ in 0..6 {
            cam.zoom_centered(1);
        }
        settle(&mut cam);
        let t0 = Instant::now();
        cam.pointer_down(Vec2::new(100.0, 50.0), t0);
        cam.pointer_move(Vec2::new(101.0, 50.0), t0 + Duration::from_millis(33));
        cam.pointer_up(t0 + Duration::from_millis(40));
        // 1 dot/tick damped by 0.2 is 0.2; still above the stop threshold
        assert!((cam.pan_velocity.x - 0.2).abs() < 1e-9);
    }

    #[test]
    fn burst_of_move_events_does_not_overshoot() {
        let mut cam = camera();
        for _ in 0..6 {
            cam.zoom_centered(1);
        }
        settle(&mut cam);
        let t0 = Instant::now();
        cam.pointer_down(Vec2::new(100.0, 50.0), t0);
        cam.pointer_move(Vec2::new(102.0, 50.0), t0 + Duration::from_millis(200));
        cam.pointer_move(Vec2::new(104.0, 50.0), t0 + Duration::from_micros(200_050));
        cam.pointer_up(t0 + Duration::from_micros(200_100));
        // Two dots inside one frame are at most two dots per tick
        assert!(cam.pan_velocity.x > 0.0);
        assert!(cam.pan_velocity.x <= 2.0 + 1e-9, "velocity {:?}", cam.pan_velocity);

        let released = cam.target_translate();
        settle(&mut cam);
        assert!(cam.target_translate().x - released.x < 30.0);
    }

    #[test]
    fn bounds_hold_after_random_input() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut cam = camera();
        let mut now = Instant::now();
        for _ in 0..2000 {
            let p = Vec2::new(rng.gen_range(-50.0..250.0), rng.gen_range(-50.0..150.0));
            match rng.gen_range(0..7) {
                0 => cam.zoom(if rng.gen_bool(0.5) { 1 } else { -1 }, p),
                1 => cam.pan_to(p * 5.0),
                2 => cam.pointer_down(p, now),
                3 => cam.pointer_move(p, now),
                4 => cam.pointer_up(now),
                5 => cam.reset(),
                _ => cam.tick(),
            }
            now += Duration::from_millis(rng.gen_range(1..40));
            cam.tick();
            assert!(cam.is_contained(cam.target_translate(), cam.target_scale()));
            assert!(cam.is_contained(cam.translate(), cam.scale()));
        }
    }
}
