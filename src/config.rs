use crate::timer::Millis;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

pub const SEARCH_QUERIES_KEY: &str = "cablebus_search_queries";
pub const QUESTION_CLICKS_KEY: &str = "cablebus_question_clicks";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Every tunable of the site's widgets. Missing fields fall back to the
/// values the production pages ship with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub chat: ChatConfig,
    pub gallery: CarouselConfig,
    pub stats: CarouselConfig,
    pub swipe: SwipeConfig,
    pub counter: CounterConfig,
    pub player: PlayerConfig,
    pub loader: LoaderConfig,
    pub faq: FaqConfig,
    pub storage: StorageConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            chat: ChatConfig::default(),
            gallery: CarouselConfig::gallery(),
            stats: CarouselConfig::stats(),
            swipe: SwipeConfig::default(),
            counter: CounterConfig::default(),
            player: PlayerConfig::default(),
            loader: LoaderConfig::default(),
            faq: FaqConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl SiteConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let config: SiteConfig = serde_json::from_str(&raw)?;
        debug!(path = %path.display(), "loaded site config");
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub typing_delay_min_ms: Millis,
    pub typing_delay_max_ms: Millis,
    pub option_delay_ms: Millis,
    pub related_delay_ms: Millis,
    pub welcome_badge_delay_ms: Millis,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            typing_delay_min_ms: 800,
            typing_delay_max_ms: 1_600,
            option_delay_ms: 800,
            related_delay_ms: 1_500,
            welcome_badge_delay_ms: 3_000,
        }
    }
}

/// Both fields are required when a carousel block appears in a config file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CarouselConfig {
    pub autoplay_delay_ms: Millis,
    pub transition_ms: Millis,
}

impl CarouselConfig {
    pub const fn gallery() -> Self {
        Self {
            autoplay_delay_ms: 4_500,
            transition_ms: 700,
        }
    }

    pub const fn stats() -> Self {
        Self {
            autoplay_delay_ms: 7_000,
            transition_ms: 600,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SwipeConfig {
    pub min_distance: f64,
    pub max_vertical: f64,
}

impl Default for SwipeConfig {
    fn default() -> Self {
        Self {
            min_distance: 50.0,
            max_vertical: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    pub duration_ms: Millis,
    pub visibility_threshold: f64,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            duration_ms: 1_500,
            visibility_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub playlist: Vec<String>,
    pub next_video_delay_ms: Millis,
    pub visibility_threshold: f64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            playlist: (1..=4).map(|n| format!("videos/video{n}.mp4")).collect(),
            next_video_delay_ms: 500,
            visibility_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub notice_ms: Millis,
    pub autoload_delay_ms: Millis,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            notice_ms: 4_000,
            autoload_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FaqConfig {
    pub debounce_ms: Millis,
    pub min_tracked_chars: usize,
    pub min_suggestion_chars: usize,
    pub suggestion_limit: usize,
    pub top_queries: usize,
}

impl Default for FaqConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            min_tracked_chars: 3,
            min_suggestion_chars: 2,
            suggestion_limit: 4,
            top_queries: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub search_queries_key: String,
    pub question_clicks_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            search_queries_key: SEARCH_QUERIES_KEY.to_string(),
            question_clicks_key: QUESTION_CLICKS_KEY.to_string(),
        }
    }
}
