//! The FAQ page: live search with highlighting, suggestions, the accordion,
//! and the metrics hooks behind them.

use crate::config::FaqConfig;
use crate::metrics::{Metrics, TopQuery};
use crate::timer::{Millis, ScheduledTask};
use crate::{KnowledgeBase, normalize};
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use tracing::debug;

const SUGGESTION_PREVIEW_CHARS: usize = 60;
const ELLIPSIS: &str = "...";
const DEFAULT_CATEGORY: &str = "Sistema Cablebús";

pub const COMMON_SUGGESTIONS: &[&str] = &[
    "costo del cablebús",
    "horarios de operación",
    "estaciones del cablebús",
    "seguridad",
    "accesibilidad",
    "medio ambiente",
    "construcción",
    "rutas",
];

static EXISTING_HIGHLIGHT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<mark class="highlight">(.*?)</mark>"#).expect("valid highlight pattern")
});
static LINE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid line break pattern"));
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid tag pattern"));
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqItem {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqCategory {
    pub name: String,
    pub items: Vec<FaqItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub category: usize,
    pub item: usize,
    pub question_html: String,
    pub answer_html: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub term: String,
    pub hits: Vec<SearchHit>,
    /// One flag per category, in catalogue order.
    pub visible_categories: Vec<bool>,
    pub no_results: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqIndex {
    categories: Vec<FaqCategory>,
}

impl FaqIndex {
    pub fn new(categories: Vec<FaqCategory>) -> Self {
        Self { categories }
    }

    /// Catalogue built from the chatbot's topics, answers reduced to plain text.
    pub fn from_knowledge() -> Self {
        let items = KnowledgeBase::topics()
            .map(|topic| FaqItem {
                question: topic.question().to_string(),
                answer: plain_text(topic.answer()),
            })
            .collect();
        Self::new(vec![FaqCategory {
            name: DEFAULT_CATEGORY.to_string(),
            items,
        }])
    }

    pub fn categories(&self) -> &[FaqCategory] {
        &self.categories
    }

    pub fn item(&self, category: usize, item: usize) -> Option<&FaqItem> {
        self.categories.get(category)?.items.get(item)
    }

    fn items(&self) -> impl Iterator<Item = (usize, usize, &FaqItem)> {
        self.categories.iter().enumerate().flat_map(|(c, category)| {
            category
                .items
                .iter()
                .enumerate()
                .map(move |(i, item)| (c, i, item))
        })
    }

    /// Case-insensitive substring search over questions and answers. An empty
    /// term shows everything without highlights.
    pub fn search(&self, term: &str) -> SearchResults {
        let term = normalize(term);
        let mut visible_categories = vec![term.is_empty(); self.categories.len()];
        let mut hits = Vec::new();
        for (c, i, item) in self.items() {
            let matched = term.is_empty()
                || item.question.to_lowercase().contains(&term)
                || item.answer.to_lowercase().contains(&term);
            if !matched {
                continue;
            }
            visible_categories[c] = true;
            hits.push(SearchHit {
                category: c,
                item: i,
                question_html: highlight(&item.question, &term),
                answer_html: highlight(&item.answer, &term),
            });
        }
        debug!(%term, hits = hits.len(), "faq search");
        let no_results = !term.is_empty() && hits.is_empty();
        SearchResults {
            term,
            hits,
            visible_categories,
            no_results,
        }
    }

    /// Questions containing the term, cut to a preview. Needs `min_chars`.
    pub fn suggestions(&self, term: &str, min_chars: usize, limit: usize) -> Vec<String> {
        let term = normalize(term);
        if term.chars().count() < min_chars {
            return Vec::new();
        }
        self.items()
            .filter(|(_, _, item)| item.question.to_lowercase().contains(&term))
            .map(|(_, _, item)| {
                let mut preview: String =
                    item.question.chars().take(SUGGESTION_PREVIEW_CHARS).collect();
                preview.push_str(ELLIPSIS);
                preview
            })
            .take(limit)
            .collect()
    }
}

/// Wraps every case-insensitive occurrence of `term` in a highlight mark,
/// dropping marks left over from a previous search first.
pub fn highlight(text: &str, term: &str) -> String {
    let cleaned = clear_highlights(text);
    if term.is_empty() {
        return cleaned;
    }
    let Ok(pattern) = Regex::new(&format!("(?i)({})", regex::escape(term))) else {
        return cleaned;
    };
    pattern
        .replace_all(&cleaned, r#"<mark class="highlight">$1</mark>"#)
        .into_owned()
}

pub fn clear_highlights(text: &str) -> String {
    EXISTING_HIGHLIGHT.replace_all(text, "$1").into_owned()
}

fn plain_text(markup: &str) -> String {
    let spaced = LINE_BREAK.replace_all(markup, NoExpand(" "));
    let stripped = TAG.replace_all(&spaced, NoExpand(""));
    SPACES.replace_all(stripped.trim(), NoExpand(" ")).into_owned()
}

/// Page state: search box, suggestion list, and the accordion.
pub struct FaqPage {
    index: FaqIndex,
    metrics: Metrics,
    config: FaqConfig,
    input: String,
    debounce: ScheduledTask,
    results: SearchResults,
    suggestions: Vec<String>,
    open_item: Option<(usize, usize)>,
}

impl FaqPage {
    pub fn new(index: FaqIndex, metrics: Metrics, config: FaqConfig) -> Self {
        let results = index.search("");
        Self {
            debounce: ScheduledTask::once(config.debounce_ms),
            index,
            metrics,
            config,
            input: String::new(),
            results,
            suggestions: Vec::new(),
            open_item: None,
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn results(&self) -> &SearchResults {
        &self.results
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn open_item(&self) -> Option<(usize, usize)> {
        self.open_item
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Keystroke in the search box; the search runs once typing pauses.
    pub fn type_text(&mut self, text: &str, now: Millis) {
        self.input = text.to_string();
        self.debounce.restart(now);
    }

    /// Runs the debounced search when due. Returns true if results changed.
    pub fn tick(&mut self, now: Millis) -> bool {
        if !self.debounce.poll(now) {
            return false;
        }
        self.run_search();
        true
    }

    pub fn focus(&mut self) {
        if self.input.trim().is_empty() {
            self.suggestions = COMMON_SUGGESTIONS
                .iter()
                .take(self.config.suggestion_limit)
                .map(|s| s.to_string())
                .collect();
        }
    }

    pub fn blur(&mut self) {
        self.suggestions.clear();
    }

    pub fn escape(&mut self) {
        self.input.clear();
        self.debounce.stop();
        self.run_search();
    }

    /// Enter counts the search once it is long enough to mean something.
    pub fn enter(&mut self) -> bool {
        let query = self.input.trim();
        if query.chars().count() < self.config.min_tracked_chars {
            return false;
        }
        self.metrics.track_search(query)
    }

    pub fn select_suggestion(&mut self, suggestion: &str) {
        self.input = suggestion.replacen(ELLIPSIS, "", 1);
        self.debounce.stop();
        self.run_search();
        self.suggestions.clear();
    }

    /// Question header click. Opens the item and closes any other; clicking
    /// the open item closes it. Returns whether the item is now open.
    pub fn click_question(&mut self, category: usize, item: usize) -> bool {
        let Some(entry) = self.index.item(category, item) else {
            return false;
        };
        self.metrics.track_question_click(&entry.question);
        let key = (category, item);
        if self.open_item == Some(key) {
            self.open_item = None;
            false
        } else {
            self.open_item = Some(key);
            true
        }
    }

    pub fn top_queries(&self) -> Vec<TopQuery> {
        self.metrics.top_queries(self.config.top_queries)
    }

    fn run_search(&mut self) {
        self.results = self.index.search(&self.input);
        self.suggestions = if self.results.term.is_empty() {
            Vec::new()
        } else {
            self.index.suggestions(
                &self.input,
                self.config.min_suggestion_chars,
                self.config.suggestion_limit,
            )
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FaqIndex {
        FaqIndex::new(vec![
            FaqCategory {
                name: "Servicio".into(),
                items: vec![
                    FaqItem {
                        question: "¿Cuál es el horario?".into(),
                        answer: "De 5 AM a 11 PM todos los días.".into(),
                    },
                    FaqItem {
                        question: "¿Cuánto cuesta?".into(),
                        answer: "La tarifa es de $12 MXN.".into(),
                    },
                ],
            },
            FaqCategory {
                name: "Obra".into(),
                items: vec![FaqItem {
                    question: "¿Cuándo termina la construcción?".into(),
                    answer: "Se estima para 2026.".into(),
                }],
            },
        ])
    }

    fn page() -> FaqPage {
        FaqPage::new(sample(), Metrics::ephemeral(), FaqConfig::default())
    }

    #[test]
    fn search_matches_answers_and_hides_empty_categories() {
        let results = sample().search("  TARIFA ");
        assert_eq!(results.hits.len(), 1);
        assert_eq!(results.hits[0].item, 1);
        assert_eq!(
            results.hits[0].answer_html,
            r#"La <mark class="highlight">tarifa</mark> es de $12 MXN."#
        );
        assert_eq!(results.visible_categories, vec![true, false]);
        assert!(!results.no_results);
    }

    #[test]
    fn empty_term_shows_everything() {
        let results = sample().search("");
        assert_eq!(results.hits.len(), 3);
        assert_eq!(results.visible_categories, vec![true, true]);
        assert!(!results.no_results);
        assert!(!results.hits[0].question_html.contains("<mark"));
    }

    #[test]
    fn no_results_only_for_non_empty_term() {
        let results = sample().search("teleférico");
        assert!(results.no_results);
        assert_eq!(results.visible_categories, vec![false, false]);
    }

    #[test]
    fn highlight_escapes_and_replaces_old_marks() {
        let once = highlight("Cuesta $12 MXN", "$12");
        assert_eq!(once, r#"Cuesta <mark class="highlight">$12</mark> MXN"#);
        let again = highlight(&once, "mxn");
        assert_eq!(again, r#"Cuesta $12 <mark class="highlight">MXN</mark>"#);
        assert_eq!(highlight(&again, ""), "Cuesta $12 MXN");
    }

    #[test]
    fn suggestions_need_two_chars_and_cap_at_limit() {
        let index = sample();
        assert!(index.suggestions("c", 2, 4).is_empty());
        assert_eq!(index.suggestions("cuá", 2, 4).len(), 3);
        assert_eq!(
            index.suggestions("cuánd", 2, 4),
            vec!["¿Cuándo termina la construcción?..."]
        );
        assert_eq!(index.suggestions("¿", 2, 4).len(), 0);
        assert_eq!(index.suggestions("¿cu", 2, 1).len(), 1);
    }

    #[test]
    fn typing_is_debounced() {
        let mut page = page();
        page.type_text("hor", 0);
        page.type_text("horario", 200);
        assert!(!page.tick(300));
        assert!(page.tick(500));
        assert_eq!(page.results().hits.len(), 1);
        assert_eq!(page.suggestions(), ["¿Cuál es el horario?..."]);
    }

    #[test]
    fn escape_clears_search() {
        let mut page = page();
        page.type_text("tarifa", 0);
        page.tick(300);
        page.escape();
        assert_eq!(page.input(), "");
        assert_eq!(page.results().hits.len(), 3);
        assert!(page.suggestions().is_empty());
    }

    #[test]
    fn focus_offers_common_suggestions() {
        let mut page = page();
        page.focus();
        assert_eq!(page.suggestions(), &COMMON_SUGGESTIONS[..4]);
        page.select_suggestion("¿Cuánto cuesta?...");
        assert_eq!(page.input(), "¿Cuánto cuesta?");
        assert_eq!(page.results().hits.len(), 1);
        assert!(page.suggestions().is_empty());
    }

    #[test]
    fn enter_tracks_long_enough_queries() {
        let mut page = page();
        page.type_text("ab", 0);
        assert!(!page.enter());
        page.type_text("rutas", 0);
        assert!(page.enter());
        assert_eq!(page.metrics().search_count("rutas"), 1);
    }

    #[test]
    fn accordion_keeps_one_item_open_and_counts_clicks() {
        let mut page = page();
        assert!(page.click_question(0, 0));
        assert!(page.click_question(1, 0));
        assert_eq!(page.open_item(), Some((1, 0)));
        assert!(!page.click_question(1, 0));
        assert_eq!(page.open_item(), None);
        assert!(!page.click_question(5, 5));
        assert_eq!(page.metrics().question_count("¿Cuándo termina la construcción?"), 2);
        assert_eq!(page.top_queries()[0].count, 2);
    }

    #[test]
    fn knowledge_catalogue_is_plain_text() {
        let index = FaqIndex::from_knowledge();
        let items = &index.categories()[0].items;
        assert_eq!(items.len(), KnowledgeBase::topics().count());
        assert!(items.iter().all(|item| !item.answer.contains('<')));
        assert!(!index.search("12 mxn").hits.is_empty());
    }
}
