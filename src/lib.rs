//! Interactive core of the Cablebús information site: the FAQ chatbot, the
//! carousel and video widgets, and the FAQ page search/metrics.
//!
//! Nothing here touches a DOM. Widgets take input events plus the current
//! time in milliseconds and hand back what the page should render.

mod data;

pub mod carousel;
pub mod chat;
pub mod config;
pub mod counter;
pub mod faq;
pub mod metrics;
pub mod player;
pub mod router;
pub mod timer;
pub mod video;

use data::{COMBINED_KEY_SEPARATOR, ContextualRecord, KnowledgeData, TopicRecord};
use once_cell::sync::Lazy;

static KNOWLEDGE_JSON: &str = include_str!(env!("CABLEBUS_KNOWLEDGE"));

static KNOWLEDGE: Lazy<KnowledgeData> =
    Lazy::new(|| serde_json::from_str(KNOWLEDGE_JSON).expect("valid knowledge data"));

/// Minimum input length before the chat input reports a live topic hint.
const TYPING_HINT_MIN_CHARS: usize = 3;

/// Read-only access to the embedded knowledge base.
pub struct KnowledgeBase;

impl KnowledgeBase {
    /// Returns the topic stored under `key`.
    pub fn topic(key: &str) -> Option<TopicEntry<'static>> {
        knowledge()
            .topics
            .iter()
            .find(|record| record.key == key)
            .map(|record| TopicEntry { record })
    }

    /// Iterates topics in declaration order.
    pub fn topics() -> impl Iterator<Item = TopicEntry<'static>> {
        knowledge().topics.iter().map(|record| TopicEntry { record })
    }

    /// Returns the keys of every topic with at least one keyword contained in `text`.
    ///
    /// Matching is case-insensitive substring containment over the trimmed
    /// input; results follow declaration order and each topic appears once.
    pub fn detect_topics(text: &str) -> Vec<&'static str> {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return Vec::new();
        }
        Self::topics()
            .filter(|topic| topic.matches_normalized(&normalized))
            .map(|topic| topic.key())
            .collect()
    }

    /// Looks up the canned answer for a set of simultaneously detected topics.
    pub fn combined_response(keys: &[&str]) -> Option<&'static str> {
        let key = combined_key(keys);
        knowledge()
            .combined
            .iter()
            .find(|record| record.key == key)
            .map(|record| record.response.as_str())
    }

    /// Iterates the contextual categories (greeting, farewell, ...) in priority order.
    pub fn contextual_categories() -> impl Iterator<Item = ContextualCategory<'static>> {
        knowledge()
            .contextual
            .iter()
            .map(|record| ContextualCategory { record })
    }

    /// First topic detected in partially typed input, once it is long enough to be useful.
    pub fn typing_hint(partial: &str) -> Option<&'static str> {
        let normalized = normalize(partial);
        if normalized.chars().count() < TYPING_HINT_MIN_CHARS {
            return None;
        }
        Self::topics()
            .find(|topic| topic.matches_normalized(&normalized))
            .map(|topic| topic.key())
    }
}

fn knowledge() -> &'static KnowledgeData {
    &KNOWLEDGE
}

/// Lower-cases and trims user text the way every matcher in the crate expects it.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Builds the combined-response key: detected keys sorted and joined with `" y "`.
pub fn combined_key(keys: &[&str]) -> String {
    let mut sorted = keys.to_vec();
    sorted.sort_unstable();
    sorted.join(COMBINED_KEY_SEPARATOR)
}

#[derive(Clone, Copy)]
pub struct TopicEntry<'a> {
    record: &'a TopicRecord,
}

impl<'a> TopicEntry<'a> {
    pub fn key(&self) -> &'a str {
        &self.record.key
    }

    pub fn question(&self) -> &'a str {
        &self.record.question
    }

    /// Full answer; may contain inline HTML markup.
    pub fn answer(&self) -> &'a str {
        &self.record.answer
    }

    pub fn short_answer(&self) -> &'a str {
        &self.record.short_answer
    }

    pub fn keywords(&self) -> impl Iterator<Item = &'a str> + 'a {
        self.record.keywords.iter().map(String::as_str)
    }

    pub fn related(&self) -> impl Iterator<Item = TopicEntry<'static>> + 'a {
        self.record
            .related
            .iter()
            .filter_map(|key| KnowledgeBase::topic(key))
    }

    pub fn options(&self) -> impl Iterator<Item = &'a str> + 'a {
        self.record.options.iter().map(String::as_str)
    }

    pub fn option_labels(&self) -> Vec<String> {
        self.record.options.clone()
    }

    pub fn option_aliases(&self) -> impl Iterator<Item = &'a str> + 'a {
        self.record.option_aliases.iter().map(String::as_str)
    }

    /// Whether a normalized quick-reply label is one of this topic's aliases.
    pub fn opens_on_option(&self, normalized_label: &str) -> bool {
        self.record
            .option_aliases
            .iter()
            .any(|alias| alias == normalized_label)
    }

    /// Tests already-normalized text against this topic's keywords.
    pub fn matches_normalized(&self, normalized: &str) -> bool {
        self.record
            .keywords
            .iter()
            .any(|keyword| normalized.contains(keyword.as_str()))
    }
}

impl std::fmt::Debug for TopicEntry<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TopicEntry").field(&self.record.key).finish()
    }
}

#[derive(Clone, Copy)]
pub struct ContextualCategory<'a> {
    record: &'a ContextualRecord,
}

impl<'a> ContextualCategory<'a> {
    pub fn name(&self) -> &'a str {
        &self.record.name
    }

    pub fn patterns(&self) -> impl Iterator<Item = &'a str> + 'a {
        self.record.patterns.iter().map(String::as_str)
    }

    pub fn responses(&self) -> &'a [String] {
        &self.record.responses
    }

    /// Whether replies from this category carry the generic quick-reply options.
    pub fn offers_options(&self) -> bool {
        self.record.offers_options
    }

    pub fn matches_normalized(&self, normalized: &str) -> bool {
        self.record
            .patterns
            .iter()
            .any(|pattern| normalized.contains(pattern.as_str()))
    }
}
