use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::events::PlayerUpdate;
use crate::timing::{Beat, MAX_CYCLE_EVENTS};

/// Seconds a pulse takes to fade out after a beat.
pub const PULSE_DECAY: f64 = 0.15;

/// Screen rectangle an animation draws into.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl Bounds {
    pub fn new(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn width(&self) -> f32 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f32 {
        self.ymax - self.ymin
    }

    pub fn center(&self) -> (f32, f32) {
        (
            (self.xmin + self.xmax) / 2.0,
            (self.ymin + self.ymax) / 2.0,
        )
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Circle {
        x: f32,
        y: f32,
        radius: f32,
        alpha: f32,
    },
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        alpha: f32,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
    },
}

/// Drawing surface supplied by the host.
pub trait Canvas {
    fn clear(&mut self, region: Bounds);
    fn draw(&mut self, shape: Shape);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnimationKind {
    /// A circle that flashes on every beat.
    Simple,
    /// A cursor sweeping across one measure.
    Measure,
}

/// Flashes when a scheduled beat's time is crossed.
#[derive(Debug, Default)]
pub struct Pulse {
    upcoming: VecDeque<f64>,
    last_hit: Option<f64>,
}

impl Pulse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&mut self, update: &PlayerUpdate) {
        match update {
            PlayerUpdate::Started { .. } => {
                self.upcoming.clear();
                self.last_hit = None;
            }
            PlayerUpdate::Allocated { reference, events } => {
                self.upcoming.extend(events.iter().map(|e| e.at(*reference)));
            }
            PlayerUpdate::Stopped => self.upcoming.clear(),
        }
    }

    /// Brightness at `now`: 1 right on a beat, fading to 0.
    pub fn intensity(&mut self, now: f64) -> f32 {
        while let Some(&time) = self.upcoming.front() {
            if time > now {
                break;
            }
            self.last_hit = Some(time);
            self.upcoming.pop_front();
        }

        match self.last_hit {
            Some(hit) => (1.0 - (now - hit) / PULSE_DECAY).clamp(0.0, 1.0) as f32,
            None => 0.0,
        }
    }

    pub fn draw(&mut self, now: f64, bounds: Bounds, canvas: &mut impl Canvas) {
        let alpha = self.intensity(now);
        let (x, y) = bounds.center();
        let max_radius = bounds.width().min(bounds.height()) / 2.0;
        canvas.draw(Shape::Circle {
            x,
            y,
            radius: max_radius * (0.6 + 0.4 * alpha),
            alpha,
        });
    }
}

/// Tracks the playhead across one measure of the beat.
#[derive(Debug)]
pub struct Sweep {
    beat: Beat,
    reference: Option<f64>,
    marks: Vec<f64>,
    length: f64,
}

impl Sweep {
    pub fn new(beat: Beat) -> Self {
        let mut sweep = Self {
            beat,
            reference: None,
            marks: Vec::new(),
            length: 0.0,
        };
        sweep.measure();
        sweep
    }

    fn measure(&mut self) {
        self.beat.reset();
        let events = self.beat.pull_cycle(MAX_CYCLE_EVENTS);
        let (Some(first), Some(last)) = (events.first(), events.last()) else {
            self.marks.clear();
            self.length = 0.0;
            return;
        };

        self.length = last.time - first.time;
        // The closing event is the next measure's downbeat
        let end = if events.len() > 1 && last.start_of_cycle {
            events.len() - 1
        } else {
            events.len()
        };
        self.marks = events[..end].iter().map(|e| e.time - first.time).collect();
    }

    pub fn marks(&self) -> &[f64] {
        &self.marks
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn handle(&mut self, update: &PlayerUpdate) {
        match update {
            PlayerUpdate::Started { reference } => {
                self.measure();
                self.reference = Some(*reference);
            }
            PlayerUpdate::Allocated { .. } => {}
            PlayerUpdate::Stopped => self.reference = None,
        }
    }

    /// Position within the measure at `now`, in `[0, 1)`. `None` while
    /// stopped.
    pub fn phase(&self, now: f64) -> Option<f64> {
        let reference = self.reference?;
        if self.length <= 0.0 {
            return Some(0.0);
        }
        let elapsed = (now - reference).max(0.0);
        Some((elapsed / self.length).rem_euclid(1.0))
    }

    pub fn draw(&mut self, now: f64, bounds: Bounds, canvas: &mut impl Canvas) {
        let (_, mid) = bounds.center();
        canvas.draw(Shape::Line {
            x1: bounds.xmin,
            y1: mid,
            x2: bounds.xmax,
            y2: mid,
        });

        let tick = bounds.height() / 8.0;
        if self.length > 0.0 {
            for mark in &self.marks {
                let x = bounds.xmin + bounds.width() * (mark / self.length) as f32;
                canvas.draw(Shape::Rect {
                    x: x - 1.0,
                    y: mid - tick / 2.0,
                    width: 2.0,
                    height: tick,
                    alpha: 1.0,
                });
            }
        }

        if let Some(phase) = self.phase(now) {
            let x = bounds.xmin + bounds.width() * phase as f32;
            canvas.draw(Shape::Line {
                x1: x,
                y1: bounds.ymin,
                x2: x,
                y2: bounds.ymax,
            });
        }
    }
}

#[derive(Debug)]
pub enum Animation {
    Pulse(Pulse),
    Sweep(Sweep),
}

impl Animation {
    pub fn new(kind: AnimationKind, beat: Beat) -> Self {
        match kind {
            AnimationKind::Simple => Animation::Pulse(Pulse::new()),
            AnimationKind::Measure => Animation::Sweep(Sweep::new(beat)),
        }
    }

    pub fn kind(&self) -> AnimationKind {
        match self {
            Animation::Pulse(_) => AnimationKind::Simple,
            Animation::Sweep(_) => AnimationKind::Measure,
        }
    }

    pub fn handle(&mut self, update: &PlayerUpdate) {
        match self {
            Animation::Pulse(pulse) => pulse.handle(update),
            Animation::Sweep(sweep) => sweep.handle(update),
        }
    }

    pub fn draw(&mut self, now: f64, bounds: Bounds, canvas: &mut impl Canvas) {
        match self {
            Animation::Pulse(pulse) => pulse.draw(now, bounds, canvas),
            Animation::Sweep(sweep) => sweep.draw(now, bounds, canvas),
        }
    }
}
