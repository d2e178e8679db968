//! Count-up animations for the statistics blocks.

use crate::config::CounterConfig;
use crate::timer::Millis;

const STEPPED_FRAMES: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Easing {
    /// `1 - (1 - t)^3`, rounded to the target's precision.
    CubicOut,
    /// Equal increments on a fixed frame clock, displayed floored.
    Stepped { frames: u32 },
}

#[derive(Debug, Clone)]
pub struct CounterAnimation {
    target: f64,
    duration: Millis,
    easing: Easing,
    started_at: Option<Millis>,
}

impl CounterAnimation {
    pub fn cubic(target: f64, duration: Millis) -> Self {
        Self {
            target,
            duration,
            easing: Easing::CubicOut,
            started_at: None,
        }
    }

    /// The landing-page variant: 60 linear steps, integer display.
    pub fn stepped(target: u64, duration: Millis) -> Self {
        Self {
            target: target as f64,
            duration,
            easing: Easing::Stepped {
                frames: STEPPED_FRAMES,
            },
            started_at: None,
        }
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    /// (Re)starts from zero.
    pub fn start(&mut self, now: Millis) {
        self.started_at = Some(now);
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn is_finished(&self, now: Millis) -> bool {
        self.started_at
            .is_some_and(|start| now.saturating_sub(start) >= self.duration)
    }

    pub fn value_at(&self, now: Millis) -> f64 {
        let Some(start) = self.started_at else {
            return 0.0;
        };
        let elapsed = now.saturating_sub(start) as f64;
        match self.easing {
            Easing::CubicOut => {
                if self.duration == 0 {
                    return self.target;
                }
                let progress = (elapsed / self.duration as f64).min(1.0);
                self.target * (1.0 - (1.0 - progress).powi(3))
            }
            Easing::Stepped { frames } => {
                let frames = frames.max(1) as f64;
                let step_time = self.duration as f64 / frames;
                let steps = if step_time > 0.0 {
                    (elapsed / step_time).floor()
                } else {
                    frames
                };
                (self.target * steps / frames).min(self.target)
            }
        }
    }

    /// Text shown in the counter element at `now`.
    pub fn display_at(&self, now: Millis) -> String {
        let value = self.value_at(now);
        match self.easing {
            Easing::CubicOut => {
                let decimals = if self.target.fract() != 0.0 { 1 } else { 0 };
                format!("{value:.decimals$}")
            }
            Easing::Stepped { .. } => format!("{}", value.floor() as i64),
        }
    }
}

/// A counter that starts the first time enough of it scrolls into view and
/// never again.
#[derive(Debug, Clone)]
pub struct VisibilityCounter {
    animation: CounterAnimation,
    threshold: f64,
}

impl VisibilityCounter {
    pub fn new(target: u64, config: &CounterConfig) -> Self {
        Self {
            animation: CounterAnimation::stepped(target, config.duration_ms),
            threshold: config.visibility_threshold,
        }
    }

    /// Feeds an intersection ratio; returns true when this call started the animation.
    pub fn observe(&mut self, ratio: f64, now: Millis) -> bool {
        if self.animation.is_started() || ratio < self.threshold {
            return false;
        }
        self.animation.start(now);
        true
    }

    pub fn display_at(&self, now: Millis) -> String {
        self.animation.display_at(now)
    }

    pub fn animation(&self) -> &CounterAnimation {
        &self.animation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cubic_counter_eases_out_to_target() {
        let mut counter = CounterAnimation::cubic(7.0, 1_500);
        counter.start(1_000);
        assert_eq!(counter.display_at(1_000), "0");
        assert_eq!(counter.display_at(1_750), "6");
        assert_eq!(counter.display_at(5_000), "7");
        assert!(counter.is_finished(2_500));
    }

    #[test]
    fn fractional_target_keeps_one_decimal() {
        let mut counter = CounterAnimation::cubic(2.5, 1_500);
        counter.start(0);
        assert_eq!(counter.display_at(0), "0.0");
        assert_eq!(counter.display_at(1_500), "2.5");
    }

    #[test]
    fn restart_begins_from_zero() {
        let mut counter = CounterAnimation::cubic(100.0, 1_000);
        counter.start(0);
        assert_eq!(counter.display_at(1_000), "100");
        counter.start(2_000);
        assert_eq!(counter.display_at(2_000), "0");
    }

    #[test]
    fn stepped_counter_floors_each_frame() {
        let mut counter = CounterAnimation::stepped(200, 1_500);
        counter.start(0);
        assert_eq!(counter.display_at(24), "0");
        assert_eq!(counter.display_at(25), "3");
        assert_eq!(counter.display_at(750), "100");
        assert_eq!(counter.display_at(1_500), "200");
    }

    #[test]
    fn visibility_counter_fires_once() {
        let mut counter = VisibilityCounter::new(500, &CounterConfig::default());
        assert!(!counter.observe(0.3, 0));
        assert!(counter.observe(0.5, 100));
        assert!(!counter.observe(0.9, 200));
        assert_eq!(counter.display_at(1_600), "500");
    }
}
