//! Attack path animation
//!
//! Every promoted event becomes a short-lived task with a start time and a
//! fixed timeline: travel, hold, fade. One scheduler advances all tasks per
//! frame and drops the finished ones. Drawing state is a pure function of
//! elapsed time (`PathTask::frame_at`), so frame jitter never skips a step.

use crate::geo::GeoPoint;
use crossterm::style::Color;
use std::f64::consts::PI;
use std::time::{Duration, Instant};

/// Fixed animation timeline.
#[derive(Clone, Debug)]
pub struct PathTiming {
    pub travel: Duration,
    pub hold: Duration,
    pub fade: Duration,
    /// Fraction of travel over which the line grows to full length.
    pub line_grow: f64,
    /// Marker progress at which the arrowhead starts fading in.
    pub arrow_start: f64,
    pub arrow_opacity: f64,
    pub impact_rings: u32,
    pub ring_stagger: Duration,
    pub ring_duration: Duration,
    pub flash: Duration,
}

impl Default for PathTiming {
    fn default() -> Self {
        Self {
            travel: Duration::from_millis(2000),
            hold: Duration::from_millis(300),
            fade: Duration::from_millis(800),
            line_grow: 0.6,
            arrow_start: 0.7,
            arrow_opacity: 0.9,
            impact_rings: 3,
            ring_stagger: Duration::from_millis(200),
            ring_duration: Duration::from_millis(900),
            flash: Duration::from_millis(600),
        }
    }
}

impl PathTiming {
    pub fn total(&self) -> Duration {
        self.travel + self.hold + self.fade
    }

    fn impact_total(&self) -> Duration {
        let last_ring = self.ring_stagger * self.impact_rings.saturating_sub(1) + self.ring_duration;
        last_ring.max(self.flash)
    }
}

/// Arrowhead triangle for a tip pointing along `angle` (radians).
/// The two base vertices sit `size` behind the tip, ±30° off the shaft.
pub fn arrowhead(tip: GeoPoint, angle: f64, size: f64) -> [GeoPoint; 3] {
    let spread = PI / 6.0;
    let back = |a: f64| GeoPoint::new(tip.x - size * a.cos(), tip.y - size * a.sin());
    [tip, back(angle - spread), back(angle + spread)]
}

// ============================================================================
// Frames
// ============================================================================

/// What to draw for one path at one instant.
#[derive(Clone, Debug, PartialEq)]
pub struct PathFrame {
    pub source: GeoPoint,
    pub destination: GeoPoint,
    pub color: Color,
    /// Dash offset left to consume, as a fraction of the line length.
    /// 1.0 hides the whole line, 0.0 shows all of it.
    pub dash_offset: f64,
    pub marker: GeoPoint,
    /// Direction of travel, `atan2(dy, dx)`.
    pub angle: f64,
    pub arrow_opacity: f64,
    /// Overall group opacity, drops to zero during the fade.
    pub opacity: f64,
}

impl PathFrame {
    /// Visible part of the line, source to this point.
    pub fn line_end(&self) -> GeoPoint {
        self.source.lerp(self.destination, 1.0 - self.dash_offset)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImpactFrame {
    pub at: GeoPoint,
    pub color: Color,
    /// `(radius fraction, opacity)` per started ring.
    pub rings: Vec<(f64, f64)>,
    pub flash: f64,
}

// ============================================================================
// Tasks
// ============================================================================

#[derive(Clone, Debug)]
pub struct PathTask {
    pub source: GeoPoint,
    pub destination: GeoPoint,
    pub color: Color,
    /// Source region to mark when the marker lands.
    pub region: Option<String>,
}

impl PathTask {
    pub fn angle(&self) -> f64 {
        (self.destination.y - self.source.y).atan2(self.destination.x - self.source.x)
    }

    pub fn frame_at(&self, elapsed: Duration, timing: &PathTiming) -> PathFrame {
        let travel = timing.travel.as_secs_f64().max(f64::EPSILON);
        let t = elapsed.as_secs_f64();
        let progress = (t / travel).min(1.0);

        let grow = (t / (travel * timing.line_grow)).min(1.0);
        let dash_offset = 1.0 - grow;

        let arrow_opacity = if progress < timing.arrow_start {
            0.0
        } else {
            let span = (1.0 - timing.arrow_start).max(f64::EPSILON);
            (timing.arrow_opacity * (progress - timing.arrow_start) / span).min(timing.arrow_opacity)
        };

        let fade_start = (timing.travel + timing.hold).as_secs_f64();
        let fade = timing.fade.as_secs_f64().max(f64::EPSILON);
        let opacity = (1.0 - (t - fade_start).max(0.0) / fade).clamp(0.0, 1.0);

        PathFrame {
            source: self.source,
            destination: self.destination,
            color: self.color,
            dash_offset,
            marker: self.source.lerp(self.destination, progress),
            angle: self.angle(),
            arrow_opacity,
            opacity,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ImpactTask {
    pub at: GeoPoint,
    pub color: Color,
}

impl ImpactTask {
    pub fn frame_at(&self, elapsed: Duration, timing: &PathTiming) -> ImpactFrame {
        let ring_len = timing.ring_duration.as_secs_f64().max(f64::EPSILON);
        let rings = (0..timing.impact_rings)
            .filter_map(|i| {
                let local = elapsed.checked_sub(timing.ring_stagger * i)?.as_secs_f64() / ring_len;
                (local < 1.0).then_some((local, 1.0 - local))
            })
            .collect();
        let flash = 1.0 - elapsed.as_secs_f64() / timing.flash.as_secs_f64().max(f64::EPSILON);
        ImpactFrame {
            at: self.at,
            color: self.color,
            rings,
            flash: flash.max(0.0),
        }
    }
}

#[derive(Clone, Debug)]
enum TaskKind {
    Path(PathTask),
    Impact(ImpactTask),
}

/// Lifecycle of a scheduled animation.
#[derive(Clone, Debug)]
enum Task {
    /// Created but not yet advanced; its clock starts on the next frame.
    Pending(TaskKind),
    Active {
        kind: TaskKind,
        started: Instant,
        arrived: bool,
    },
    Completed,
}

/// A path's marker reached its destination.
#[derive(Clone, Debug, PartialEq)]
pub struct Arrival {
    pub at: GeoPoint,
    pub color: Color,
    pub region: Option<String>,
}

pub struct PathScheduler {
    timing: PathTiming,
    tasks: Vec<Task>,
}

impl PathScheduler {
    pub fn new(timing: PathTiming) -> Self {
        Self {
            timing,
            tasks: Vec::new(),
        }
    }

    pub fn animate(&mut self, source: GeoPoint, destination: GeoPoint, color: Color, region: Option<String>) {
        self.tasks.push(Task::Pending(TaskKind::Path(PathTask {
            source,
            destination,
            color,
            region,
        })));
    }

    /// Advance every task to `now`. Paths whose marker has just landed
    /// spawn an impact and are reported once as arrivals. Finished tasks
    /// are removed.
    pub fn advance(&mut self, now: Instant) -> Vec<Arrival> {
        let mut arrivals = Vec::new();
        let mut impacts = Vec::new();
        let travel = self.timing.travel;
        let path_total = self.timing.total();
        let impact_total = self.timing.impact_total();

        for task in &mut self.tasks {
            *task = match std::mem::replace(task, Task::Completed) {
                Task::Pending(kind) => Task::Active {
                    kind,
                    started: now,
                    arrived: false,
                },
                Task::Active { kind, started, mut arrived } => {
                    let elapsed = now.saturating_duration_since(started);
                    let total = match &kind {
                        TaskKind::Path(path) => {
                            if !arrived && elapsed >= travel {
                                arrived = true;
                                impacts.push(ImpactTask {
                                    at: path.destination,
                                    color: path.color,
                                });
                                arrivals.push(Arrival {
                                    at: path.destination,
                                    color: path.color,
                                    region: path.region.clone(),
                                });
                            }
                            path_total
                        }
                        TaskKind::Impact(_) => impact_total,
                    };
                    if elapsed >= total {
                        Task::Completed
                    } else {
                        Task::Active { kind, started, arrived }
                    }
                }
                Task::Completed => Task::Completed,
            };
        }

        self.tasks.retain(|t| !matches!(t, Task::Completed));
        self.tasks.extend(impacts.into_iter().map(|i| Task::Active {
            kind: TaskKind::Impact(i),
            started: now,
            arrived: true,
        }));
        arrivals
    }

    pub fn path_frames(&self, now: Instant) -> Vec<PathFrame> {
        self.tasks
            .iter()
            .filter_map(|t| match t {
                Task::Active {
                    kind: TaskKind::Path(p),
                    started,
                    ..
                } => Some(p.frame_at(now.saturating_duration_since(*started), &self.timing)),
                _ => None,
            })
            .collect()
    }

    pub fn impact_frames(&self, now: Instant) -> Vec<ImpactFrame> {
        self.tasks
            .iter()
            .filter_map(|t| match t {
                Task::Active {
                    kind: TaskKind::Impact(i),
                    started,
                    ..
                } => Some(i.frame_at(now.saturating_duration_since(*started), &self.timing)),
                _ => None,
            })
            .collect()
    }

    /// Paths in flight, pending or active.
    pub fn active_paths(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| {
                matches!(
                    t,
                    Task::Pending(TaskKind::Path(_)) | Task::Active { kind: TaskKind::Path(_), .. }
                )
            })
            .count()
    }

    #[cfg(test)]
    pub fn is_idle(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::rgb;

    const EPS: f64 = 1e-9;

    fn task() -> PathTask {
        PathTask {
            source: GeoPoint::new(0.0, 0.0),
            destination: GeoPoint::new(100.0, 0.0),
            color: rgb(255, 0, 0),
            region: Some("China".to_string()),
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn line_grows_over_first_sixty_percent() {
        let timing = PathTiming::default();
        let t = task();
        assert!((t.frame_at(ms(0), &timing).dash_offset - 1.0).abs() < EPS);
        assert!((t.frame_at(ms(600), &timing).dash_offset - 0.5).abs() < EPS);
        assert!(t.frame_at(ms(1200), &timing).dash_offset.abs() < EPS);
        assert!(t.frame_at(ms(1900), &timing).dash_offset.abs() < EPS);
    }

    #[test]
    fn marker_interpolates_over_full_travel() {
        let timing = PathTiming::default();
        let t = task();
        assert!((t.frame_at(ms(1000), &timing).marker.x - 50.0).abs() < EPS);
        assert!((t.frame_at(ms(2000), &timing).marker.x - 100.0).abs() < EPS);
        assert!((t.frame_at(ms(2200), &timing).marker.x - 100.0).abs() < EPS);
    }

    #[test]
    fn arrowhead_fades_in_after_seventy_percent() {
        let timing = PathTiming::default();
        let t = task();
        assert_eq!(t.frame_at(ms(1399), &timing).arrow_opacity, 0.0);
        assert!((t.frame_at(ms(1700), &timing).arrow_opacity - 0.45).abs() < 1e-6);
        assert!((t.frame_at(ms(2000), &timing).arrow_opacity - 0.9).abs() < 1e-6);
    }

    #[test]
    fn group_fades_after_hold() {
        let timing = PathTiming::default();
        let t = task();
        assert_eq!(t.frame_at(ms(2300), &timing).opacity, 1.0);
        assert!((t.frame_at(ms(2700), &timing).opacity - 0.5).abs() < 1e-6);
        assert_eq!(t.frame_at(ms(3100), &timing).opacity, 0.0);
    }

    #[test]
    fn arrowhead_vertices_at_thirty_degrees() {
        let tip = GeoPoint::new(10.0, 10.0);
        let [t, left, right] = arrowhead(tip, 0.0, 2.0);
        assert_eq!(t, tip);
        let expected_x = 10.0 - 2.0 * (PI / 6.0).cos();
        assert!((left.x - expected_x).abs() < EPS && (right.x - expected_x).abs() < EPS);
        assert!((left.y - 11.0).abs() < EPS);
        assert!((right.y - 9.0).abs() < EPS);
    }

    #[test]
    fn angle_follows_direction() {
        let mut t = task();
        t.destination = GeoPoint::new(0.0, 50.0);
        assert!((t.angle() - PI / 2.0).abs() < EPS);
    }

    #[test]
    fn scheduler_reports_arrival_once_and_cleans_up() {
        let mut scheduler = PathScheduler::new(PathTiming::default());
        let t0 = Instant::now();
        scheduler.animate(GeoPoint::new(0.0, 0.0), GeoPoint::new(10.0, 0.0), rgb(1, 2, 3), Some("Russia".into()));
        assert_eq!(scheduler.active_paths(), 1);

        assert!(scheduler.advance(t0).is_empty());
        assert!(scheduler.advance(t0 + ms(1000)).is_empty());

        let arrivals = scheduler.advance(t0 + ms(2000));
        assert_eq!(arrivals.len(), 1);
        assert_eq!(arrivals[0].region.as_deref(), Some("Russia"));
        assert_eq!(scheduler.impact_frames(t0 + ms(2000)).len(), 1);

        assert!(scheduler.advance(t0 + ms(2100)).is_empty());
        scheduler.advance(t0 + ms(3100));
        assert_eq!(scheduler.active_paths(), 0);
        scheduler.advance(t0 + ms(5000));
        assert!(scheduler.is_idle());
    }

    #[test]
    fn idle_scheduler_stays_empty() {
        let mut scheduler = PathScheduler::new(PathTiming::default());
        let t0 = Instant::now();
        for i in 0..100 {
            assert!(scheduler.advance(t0 + ms(i * 16)).is_empty());
        }
        assert!(scheduler.is_idle());
        assert!(scheduler.path_frames(t0).is_empty());
    }

    #[test]
    fn impact_rings_are_staggered() {
        let timing = PathTiming::default();
        let impact = ImpactTask {
            at: GeoPoint::new(0.0, 0.0),
            color: rgb(255, 255, 255),
        };
        assert_eq!(impact.frame_at(ms(100), &timing).rings.len(), 1);
        assert_eq!(impact.frame_at(ms(450), &timing).rings.len(), 3);
        let late = impact.frame_at(ms(1000), &timing);
        assert_eq!(late.rings.len(), 2);
        assert_eq!(late.flash, 0.0);
    }
}
