//! The hero section's background video: an endless shuffled playlist that
//! pauses itself when scrolled out of view, unless the user took over.

use crate::config::PlayerConfig;
use crate::timer::{Millis, ScheduledTask};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Commands for the host's media element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlayerAction {
    Load { index: usize, src: String },
    Play,
    Pause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerKey {
    TogglePlay,
    ToggleMute,
}

impl PlayerKey {
    /// Maps a `KeyboardEvent.key`. Shortcuts are off while typing in a field.
    pub fn from_key(key: &str, text_input_focused: bool) -> Option<Self> {
        if text_input_focused {
            return None;
        }
        match key {
            " " | "k" => Some(Self::TogglePlay),
            "m" => Some(Self::ToggleMute),
            _ => None,
        }
    }
}

pub struct BackgroundPlayer<R = SmallRng> {
    playlist: Vec<String>,
    rng: R,
    threshold: f64,
    next_video: ScheduledTask,
    last_index: Option<usize>,
    playing: bool,
    muted: bool,
    loading: bool,
    user_paused: bool,
    auto_pause: bool,
}

impl BackgroundPlayer<SmallRng> {
    pub fn new(config: &PlayerConfig) -> Self {
        Self::with_rng(config, SmallRng::from_entropy())
    }
}

impl<R: Rng> BackgroundPlayer<R> {
    pub fn with_rng(config: &PlayerConfig, rng: R) -> Self {
        if config.playlist.is_empty() {
            warn!("background player has an empty playlist; it will stay idle");
        }
        Self {
            playlist: config.playlist.clone(),
            rng,
            threshold: config.visibility_threshold,
            next_video: ScheduledTask::once(config.next_video_delay_ms),
            last_index: None,
            playing: false,
            muted: false,
            loading: false,
            user_paused: false,
            auto_pause: true,
        }
    }

    pub fn last_index(&self) -> Option<usize> {
        self.last_index
    }

    pub fn current_source(&self) -> Option<&str> {
        self.last_index
            .and_then(|index| self.playlist.get(index))
            .map(String::as_str)
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// True from a load until the new source reports its first frame.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn user_paused(&self) -> bool {
        self.user_paused
    }

    pub fn auto_pause_enabled(&self) -> bool {
        self.auto_pause
    }

    /// Picks a random entry, never the one that just played when there is a choice.
    pub fn load_random(&mut self) -> Option<PlayerAction> {
        let len = self.playlist.len();
        if len == 0 {
            return None;
        }
        let mut index = self.rng.gen_range(0..len);
        while len > 1 && Some(index) == self.last_index {
            index = self.rng.gen_range(0..len);
        }
        self.last_index = Some(index);
        self.loading = true;
        self.playing = false;
        let src = self.playlist[index].clone();
        info!(%src, "loading background video");
        Some(PlayerAction::Load { index, src })
    }

    /// First frame decoded. Playback starts unless the user paused.
    pub fn loaded_data(&mut self) -> Option<PlayerAction> {
        self.loading = false;
        (!self.user_paused).then_some(PlayerAction::Play)
    }

    /// The host's `play()` resolved.
    pub fn play_started(&mut self) {
        self.playing = true;
        self.auto_pause = true;
    }

    /// The host's `play()` was rejected (autoplay policy); stay paused.
    pub fn play_rejected(&mut self) {
        debug!("autoplay rejected");
        self.playing = false;
    }

    pub fn ended(&mut self, now: Millis) {
        self.playing = false;
        self.next_video.start(now);
    }

    pub fn tick(&mut self, now: Millis) -> Option<PlayerAction> {
        if self.next_video.poll(now) {
            return self.load_random();
        }
        None
    }

    pub fn next_deadline(&self) -> Option<Millis> {
        self.next_video.deadline()
    }

    /// Intersection change for the player container.
    pub fn visibility(&mut self, ratio: f64) -> Option<PlayerAction> {
        if !self.auto_pause {
            return None;
        }
        if ratio >= self.threshold {
            if !self.playing && !self.user_paused && !self.loading {
                // Optimistic, so the host is asked once; `play_rejected` reverts it.
                self.playing = true;
                return Some(PlayerAction::Play);
            }
        } else if self.playing {
            self.playing = false;
            debug!("background video paused out of view");
            return Some(PlayerAction::Pause);
        }
        None
    }

    /// Click, space or `k`. A manual pause turns off visibility handling
    /// until the user resumes.
    pub fn toggle_play(&mut self) -> PlayerAction {
        if self.playing {
            self.playing = false;
            self.user_paused = true;
            self.auto_pause = false;
            PlayerAction::Pause
        } else {
            self.playing = true;
            self.user_paused = false;
            self.auto_pause = true;
            PlayerAction::Play
        }
    }

    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }

    pub fn key(&mut self, key: PlayerKey) -> Option<PlayerAction> {
        match key {
            PlayerKey::TogglePlay => Some(self.toggle_play()),
            PlayerKey::ToggleMute => {
                self.toggle_mute();
                None
            }
        }
    }
}
