//! Slide carousels: the photo gallery and the statistics slider.
//!
//! A `Carousel` owns two timers: the transition guard, which drops
//! navigation requests while a slide change is still animating, and the
//! autoplay task. User navigation always restarts autoplay from zero, so the
//! next automatic advance is a full delay after the last interaction.

use crate::config::{CarouselConfig, CounterConfig, SwipeConfig};
use crate::counter::CounterAnimation;
use crate::timer::{Millis, ScheduledTask};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum CarouselError {
    #[error("carousel needs at least one slide")]
    NoSlides,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlideChange {
    pub from: usize,
    pub to: usize,
    /// Screen-reader text for the live region.
    pub announcement: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    ArrowLeft,
    ArrowRight,
}

impl NavKey {
    /// Maps a DOM `KeyboardEvent.key` value.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ArrowLeft" => Some(Self::ArrowLeft),
            "ArrowRight" => Some(Self::ArrowRight),
            _ => None,
        }
    }
}

/// Direction the finger travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    Left,
    Right,
}

/// Tracks one touch gesture at a time.
#[derive(Debug, Clone)]
pub struct Swipe {
    config: SwipeConfig,
    start: Option<(f64, f64)>,
}

impl Swipe {
    pub fn new(config: SwipeConfig) -> Self {
        Self {
            config,
            start: None,
        }
    }

    pub fn touch_start(&mut self, x: f64, y: f64) {
        self.start = Some((x, y));
    }

    /// Finishes the gesture. Mostly-vertical or short movements are not swipes.
    pub fn touch_end(&mut self, x: f64, y: f64) -> Option<SwipeDirection> {
        let (start_x, start_y) = self.start.take()?;
        let dx = start_x - x;
        let dy = (start_y - y).abs();
        if dy >= self.config.max_vertical || dx.abs() <= self.config.min_distance {
            return None;
        }
        Some(if dx > 0.0 {
            SwipeDirection::Left
        } else {
            SwipeDirection::Right
        })
    }
}

#[derive(Debug, Clone)]
pub struct Carousel {
    len: usize,
    current: usize,
    transition: ScheduledTask,
    autoplay: ScheduledTask,
    running: bool,
    hovered: bool,
    hidden: bool,
}

impl Carousel {
    pub fn new(len: usize, config: CarouselConfig) -> Result<Self, CarouselError> {
        if len == 0 {
            warn!("carousel has no slides; it stays disabled");
            return Err(CarouselError::NoSlides);
        }
        Ok(Self {
            len,
            current: 0,
            transition: ScheduledTask::once(config.transition_ms),
            autoplay: ScheduledTask::every(config.autoplay_delay_ms),
            running: false,
            hovered: false,
            hidden: false,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn is_active(&self, index: usize) -> bool {
        index == self.current
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_pending()
    }

    pub fn autoplay_pending(&self) -> bool {
        self.autoplay.is_pending()
    }

    /// Begins autoplay. Called once the widget is mounted.
    pub fn start(&mut self, now: Millis) {
        self.running = true;
        self.restart_autoplay(now);
    }

    pub fn next(&mut self, now: Millis) -> Option<SlideChange> {
        let target = (self.current + 1) % self.len;
        self.navigate(target, now)
    }

    pub fn prev(&mut self, now: Millis) -> Option<SlideChange> {
        let target = (self.current + self.len - 1) % self.len;
        self.navigate(target, now)
    }

    /// Dot click.
    pub fn go_to(&mut self, index: usize, now: Millis) -> Option<SlideChange> {
        self.navigate(index, now)
    }

    pub fn key(&mut self, key: NavKey, now: Millis) -> Option<SlideChange> {
        match key {
            NavKey::ArrowLeft => self.prev(now),
            NavKey::ArrowRight => self.next(now),
        }
    }

    /// A left swipe shows the next slide.
    pub fn swipe(&mut self, direction: SwipeDirection, now: Millis) -> Option<SlideChange> {
        match direction {
            SwipeDirection::Left => self.next(now),
            SwipeDirection::Right => self.prev(now),
        }
    }

    pub fn pointer_enter(&mut self) {
        self.hovered = true;
        self.autoplay.stop();
    }

    pub fn pointer_leave(&mut self, now: Millis) {
        self.hovered = false;
        self.restart_autoplay(now);
    }

    pub fn set_hidden(&mut self, hidden: bool, now: Millis) {
        self.hidden = hidden;
        self.restart_autoplay(now);
    }

    /// Advances timers: releases the transition guard, then runs autoplay.
    pub fn tick(&mut self, now: Millis) -> Option<SlideChange> {
        self.transition.poll(now);
        if self.autoplay.poll(now) {
            let target = (self.current + 1) % self.len;
            return self.transition_to(target, now);
        }
        None
    }

    pub fn next_deadline(&self) -> Option<Millis> {
        match (self.transition.deadline(), self.autoplay.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn navigate(&mut self, target: usize, now: Millis) -> Option<SlideChange> {
        let change = self.transition_to(target, now);
        self.restart_autoplay(now);
        change
    }

    fn transition_to(&mut self, target: usize, now: Millis) -> Option<SlideChange> {
        self.transition.poll(now);
        if target >= self.len || target == self.current || self.transition.is_pending() {
            return None;
        }
        let from = self.current;
        self.current = target;
        self.transition.start(now);
        debug!(from, to = target, "slide change");
        Some(SlideChange {
            from,
            to: target,
            announcement: format!("Imagen {} de {}", target + 1, self.len),
        })
    }

    fn restart_autoplay(&mut self, now: Millis) {
        self.autoplay.stop();
        if self.running && !self.hovered && !self.hidden {
            self.autoplay.start(now);
        }
    }
}

/// Carousel whose slides each carry a number that counts up whenever the
/// slide becomes active.
#[derive(Debug, Clone)]
pub struct StatsSlider {
    carousel: Carousel,
    counters: Vec<Option<CounterAnimation>>,
}

impl StatsSlider {
    /// `targets[i]` is the number shown on slide `i`, if any.
    pub fn new(
        targets: &[Option<f64>],
        config: CarouselConfig,
        counter: &CounterConfig,
    ) -> Result<Self, CarouselError> {
        let carousel = Carousel::new(targets.len(), config)?;
        let counters = targets
            .iter()
            .map(|target| target.map(|value| CounterAnimation::cubic(value, counter.duration_ms)))
            .collect();
        Ok(Self { carousel, counters })
    }

    pub fn carousel(&self) -> &Carousel {
        &self.carousel
    }

    pub fn start(&mut self, now: Millis) {
        self.carousel.start(now);
        self.animate_current(now);
    }

    pub fn next(&mut self, now: Millis) -> Option<SlideChange> {
        let change = self.carousel.next(now);
        self.activate(change, now)
    }

    pub fn prev(&mut self, now: Millis) -> Option<SlideChange> {
        let change = self.carousel.prev(now);
        self.activate(change, now)
    }

    pub fn go_to(&mut self, index: usize, now: Millis) -> Option<SlideChange> {
        let change = self.carousel.go_to(index, now);
        self.activate(change, now)
    }

    pub fn key(&mut self, key: NavKey, now: Millis) -> Option<SlideChange> {
        let change = self.carousel.key(key, now);
        self.activate(change, now)
    }

    pub fn swipe(&mut self, direction: SwipeDirection, now: Millis) -> Option<SlideChange> {
        let change = self.carousel.swipe(direction, now);
        self.activate(change, now)
    }

    pub fn pointer_enter(&mut self) {
        self.carousel.pointer_enter();
    }

    pub fn pointer_leave(&mut self, now: Millis) {
        self.carousel.pointer_leave(now);
    }

    pub fn set_hidden(&mut self, hidden: bool, now: Millis) {
        self.carousel.set_hidden(hidden, now);
    }

    pub fn tick(&mut self, now: Millis) -> Option<SlideChange> {
        let change = self.carousel.tick(now);
        self.activate(change, now)
    }

    /// Counter text on the active slide.
    pub fn counter_display(&self, now: Millis) -> Option<String> {
        self.counters
            .get(self.carousel.current())?
            .as_ref()
            .map(|counter| counter.display_at(now))
    }

    fn activate(&mut self, change: Option<SlideChange>, now: Millis) -> Option<SlideChange> {
        if change.is_some() {
            self.animate_current(now);
        }
        change
    }

    fn animate_current(&mut self, now: Millis) {
        if let Some(Some(counter)) = self.counters.get_mut(self.carousel.current()) {
            counter.start(now);
        }
    }
}
