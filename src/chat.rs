//! The floating chat window: open/close state, the welcome badge, and the
//! queue of bot messages waiting out their simulated typing delay.

use crate::config::ChatConfig;
use crate::router::{ConversationState, Reply, Router, Speaker};
use crate::timer::{Millis, ScheduledTask};
use crate::KnowledgeBase;
use rand::Rng;
use rand::rngs::SmallRng;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BotMessage {
    pub text: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChatEvent {
    BadgeShown,
    Message(BotMessage),
}

#[derive(Debug, Clone)]
struct Pending {
    due: Millis,
    follow_up: bool,
    message: BotMessage,
}

pub struct ChatWidget<R = SmallRng> {
    router: Router<R>,
    state: ConversationState,
    open: bool,
    badge_visible: bool,
    badge: ScheduledTask,
    outbox: VecDeque<Pending>,
    last_reply_due: Millis,
}

impl ChatWidget<SmallRng> {
    pub fn new(config: ChatConfig, now: Millis) -> Self {
        Self::with_router(Router::new(config), now)
    }
}

impl<R: Rng> ChatWidget<R> {
    pub fn with_router(router: Router<R>, now: Millis) -> Self {
        let mut badge = ScheduledTask::once(router.config().welcome_badge_delay_ms);
        badge.start(now);
        info!("chat widget initialised");
        Self {
            router,
            state: ConversationState::new(),
            open: false,
            badge_visible: false,
            badge,
            outbox: VecDeque::new(),
            last_reply_due: now,
        }
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn badge_visible(&self) -> bool {
        self.badge_visible
    }

    /// True while a reply is queued, i.e. the typing indicator is showing.
    pub fn is_typing(&self) -> bool {
        self.outbox.iter().any(|pending| !pending.follow_up)
    }

    /// Flips the window. Opening hides the welcome badge for good.
    pub fn toggle(&mut self) -> bool {
        self.open = !self.open;
        if self.open {
            self.badge.stop();
            self.badge_visible = false;
        }
        self.open
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    /// Topic hint for the text currently in the input box.
    pub fn input_hint(&self, partial: &str) -> Option<&'static str> {
        KnowledgeBase::typing_hint(partial)
    }

    /// Queues a reply to typed text. Blank input is ignored.
    pub fn submit(&mut self, input: &str, now: Millis) -> bool {
        if input.trim().is_empty() {
            return false;
        }
        let reply = self.router.respond(&mut self.state, input);
        let delay = self.router.typing_delay();
        debug!(delay, kind = ?reply.kind, "reply queued");
        self.enqueue(reply, now.saturating_add(delay));
        true
    }

    pub fn select_option(&mut self, label: &str, now: Millis) {
        let reply = self.router.select_option(&mut self.state, label);
        let delay = self.router.config().option_delay_ms;
        self.enqueue(reply, now.saturating_add(delay));
    }

    /// Quick-action buttons bound to a topic key. Unknown keys are ignored.
    pub fn quick_action(&mut self, key: &str, now: Millis) -> bool {
        let Some(reply) = self.router.quick_action(&mut self.state, key) else {
            return false;
        };
        let delay = self.router.config().option_delay_ms;
        self.enqueue(reply, now.saturating_add(delay));
        true
    }

    /// Earliest time at which `tick` has something to deliver.
    pub fn next_deadline(&self) -> Option<Millis> {
        let queued = self.outbox.front().map(|pending| pending.due);
        match (queued, self.badge.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Delivers everything due at `now`, in order.
    pub fn tick(&mut self, now: Millis) -> Vec<ChatEvent> {
        let mut events = Vec::new();
        if self.badge.poll(now) && !self.open {
            self.badge_visible = true;
            events.push(ChatEvent::BadgeShown);
        }
        while self.outbox.front().is_some_and(|pending| pending.due <= now) {
            let Some(pending) = self.outbox.pop_front() else {
                break;
            };
            if pending.follow_up {
                self.state.record(Speaker::Bot, pending.message.text.clone());
            }
            events.push(ChatEvent::Message(pending.message));
        }
        events
    }

    fn enqueue(&mut self, reply: Reply, due: Millis) {
        // Replies never overtake an earlier reply still waiting in the queue.
        let due = due.max(self.last_reply_due);
        self.last_reply_due = due;
        self.insert(Pending {
            due,
            follow_up: false,
            message: BotMessage {
                text: reply.text,
                options: reply.options,
            },
        });
        if let Some(follow_up) = reply.follow_up {
            self.insert(Pending {
                due: due.saturating_add(follow_up.delay_ms),
                follow_up: true,
                message: BotMessage {
                    text: follow_up.text,
                    options: Vec::new(),
                },
            });
        }
    }

    fn insert(&mut self, pending: Pending) {
        let position = self
            .outbox
            .iter()
            .position(|queued| queued.due > pending.due)
            .unwrap_or(self.outbox.len());
        self.outbox.insert(position, pending);
    }
}
