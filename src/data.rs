use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TopicRecord {
    pub key: String,
    pub question: String,
    pub answer: String,
    pub short_answer: String,
    pub keywords: Vec<String>,
    pub related: Vec<String>,
    pub options: Vec<String>,
    /// Quick-reply labels (lowercase) that open this topic without naming it.
    #[serde(default)]
    pub option_aliases: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ContextualRecord {
    pub name: String,
    pub patterns: Vec<String>,
    pub responses: Vec<String>,
    pub offers_options: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CombinedRecord {
    pub key: String,
    pub response: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct KnowledgeData {
    pub topics: Vec<TopicRecord>,
    pub contextual: Vec<ContextualRecord>,
    pub combined: Vec<CombinedRecord>,
}

/// Separator used when joining sorted topic keys into a combined-response key.
pub const COMBINED_KEY_SEPARATOR: &str = " y ";

#[allow(dead_code)]
impl KnowledgeData {
    pub fn topic(&self, key: &str) -> Option<&TopicRecord> {
        self.topics.iter().find(|topic| topic.key == key)
    }

    /// Lists every referential defect in the data set. Empty means the data is usable.
    pub fn integrity_problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for (idx, topic) in self.topics.iter().enumerate() {
            if topic.key.trim().is_empty() {
                problems.push(format!("topic #{idx} has an empty key"));
            }
            if self.topics[..idx].iter().any(|other| other.key == topic.key) {
                problems.push(format!("duplicate topic key {:?}", topic.key));
            }
            if topic.keywords.is_empty() {
                problems.push(format!("topic {:?} has no keywords", topic.key));
            }
            for keyword in &topic.keywords {
                if keyword.trim().is_empty() || *keyword != keyword.to_lowercase() {
                    problems.push(format!(
                        "topic {:?} keyword {:?} must be non-empty lowercase",
                        topic.key, keyword
                    ));
                }
            }
            for alias in &topic.option_aliases {
                if alias.trim().is_empty() || *alias != alias.to_lowercase() {
                    problems.push(format!(
                        "topic {:?} option alias {:?} must be non-empty lowercase",
                        topic.key, alias
                    ));
                }
                let claimed_earlier = self.topics[..idx]
                    .iter()
                    .any(|other| other.option_aliases.contains(alias));
                if claimed_earlier {
                    problems.push(format!(
                        "option alias {:?} is claimed by more than one topic",
                        alias
                    ));
                }
            }
            for related in &topic.related {
                if self.topic(related).is_none() {
                    problems.push(format!(
                        "topic {:?} links to unknown topic {:?}",
                        topic.key, related
                    ));
                }
            }
        }
        for combined in &self.combined {
            let parts: Vec<&str> = combined.key.split(COMBINED_KEY_SEPARATOR).collect();
            if parts.len() < 2 {
                problems.push(format!(
                    "combined response {:?} names fewer than two topics",
                    combined.key
                ));
            }
            for part in &parts {
                if self.topic(part).is_none() {
                    problems.push(format!(
                        "combined response {:?} names unknown topic {:?}",
                        combined.key, part
                    ));
                }
            }
            if parts.windows(2).any(|pair| pair[0] > pair[1]) {
                problems.push(format!(
                    "combined response {:?} is not in sorted key order",
                    combined.key
                ));
            }
        }
        for category in &self.contextual {
            if category.patterns.is_empty() || category.responses.is_empty() {
                problems.push(format!(
                    "contextual category {:?} needs patterns and responses",
                    category.name
                ));
            }
        }
        problems
    }
}
