//! Cancellable scheduled tasks driven by host-supplied time.
//!
//! A widget owns one `ScheduledTask` per concern (autoplay, transition guard,
//! deferred load). Starting a task always replaces its previous deadline, so a
//! task can never have more than one pending fire.

/// Milliseconds on the host's monotonic clock.
pub type Millis = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    Once,
    Every,
}

#[derive(Debug, Clone)]
pub struct ScheduledTask {
    delay: Millis,
    repeat: Repeat,
    deadline: Option<Millis>,
}

impl ScheduledTask {
    pub fn once(delay: Millis) -> Self {
        Self {
            delay,
            repeat: Repeat::Once,
            deadline: None,
        }
    }

    pub fn every(delay: Millis) -> Self {
        Self {
            delay,
            repeat: Repeat::Every,
            deadline: None,
        }
    }

    pub fn delay(&self) -> Millis {
        self.delay
    }

    /// Arms the task a full delay from `now`, dropping any earlier deadline.
    pub fn start(&mut self, now: Millis) {
        self.deadline = Some(now.saturating_add(self.delay));
    }

    pub fn stop(&mut self) {
        self.deadline = None;
    }

    pub fn restart(&mut self, now: Millis) {
        self.stop();
        self.start(now);
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Millis> {
        self.deadline
    }

    /// Returns true when the task fires at `now`.
    ///
    /// One-shot tasks disarm after firing. Repeating tasks re-arm from their
    /// own deadline so a late poll does not drift the schedule; if the host
    /// fell behind by several periods the task fires once and catches up.
    pub fn poll(&mut self, now: Millis) -> bool {
        let Some(deadline) = self.deadline else {
            return false;
        };
        if now < deadline {
            return false;
        }
        match self.repeat {
            Repeat::Once => self.deadline = None,
            Repeat::Every => {
                let period = self.delay.max(1);
                let behind = (now - deadline) / period;
                self.deadline = Some(deadline + period * (behind + 1));
            }
        }
        true
    }
}
