//! Keyword tag classification.
//!
//! A [`Taxonomy`] maps each tag name to a list of lowercase keyword
//! substrings. A tag applies when any of its keywords occurs in the
//! lowercased text. Classification is pure and deterministic.

use std::collections::{BTreeMap, BTreeSet};

/// Built-in AI-topic taxonomy, used when the config provides none.
pub const DEFAULT_TAXONOMY: &[(&str, &[&str])] = &[
    (
        "AI Agent",
        &["ai agent", "autonomous agent", "ai assistant"],
    ),
    (
        "LLM",
        &["llm", "large language model", "gpt", "claude", "gemini"],
    ),
    ("Autonomous AI", &["autonomous ai", "self-directed", "agentic"]),
    ("AI Assistant", &["assistant", "chatbot", "copilot"]),
    ("AI Research", &["research", "paper", "study", "findings"]),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxonomy {
    tags: BTreeMap<String, Vec<String>>,
}

impl Taxonomy {
    /// Builds a taxonomy from tag → keywords. Keywords are lowercased and
    /// empty keywords are discarded.
    pub fn new<I, K>(tags: I) -> Self
    where
        I: IntoIterator<Item = (String, K)>,
        K: IntoIterator<Item = String>,
    {
        let tags = tags
            .into_iter()
            .map(|(name, keywords)| {
                let keywords = keywords
                    .into_iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect();
                (name, keywords)
            })
            .collect();
        Self { tags }
    }

    pub fn tag_names(&self) -> Vec<String> {
        self.tags.keys().cloned().collect()
    }

    pub fn keywords(&self, tag: &str) -> Option<&[String]> {
        self.tags.get(tag).map(Vec::as_slice)
    }

    pub fn classify(&self, text: &str) -> BTreeSet<String> {
        let lower = text.to_lowercase();
        self.tags
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|k| lower.contains(k.as_str())))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::new(DEFAULT_TAXONOMY.iter().map(|(name, keywords)| {
            (
                name.to_string(),
                keywords.iter().map(|k| k.to_string()).collect::<Vec<_>>(),
            )
        }))
    }
}

/// Classifies `text` against the built-in taxonomy.
pub fn classify(text: &str) -> BTreeSet<String> {
    Taxonomy::default().classify(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_research_paper_about_llms() {
        let tags = classify("new LLM research paper");
        assert!(tags.contains("LLM"));
        assert!(tags.contains("AI Research"));
    }

    #[test]
    fn test_unrelated_text_has_no_tags() {
        assert!(classify("just had lunch").is_empty());
        assert!(classify("").is_empty());
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify("Meet our new CHATBOT"), set(&["AI Assistant"]));
    }

    #[test]
    fn test_multiple_tags_from_overlapping_keywords() {
        // "ai assistant" hits both AI Agent and (via "assistant") AI Assistant.
        assert_eq!(
            classify("Our AI assistant is agentic"),
            set(&["AI Agent", "AI Assistant", "Autonomous AI"])
        );
    }

    #[test]
    fn test_substring_semantics() {
        // Substring matching, not word matching.
        assert_eq!(classify("studying hard"), set(&["AI Research"]));
    }

    #[test]
    fn test_deterministic() {
        let text = "GPT agents publish findings with their copilot";
        assert_eq!(classify(text), classify(text));
    }

    #[test]
    fn test_custom_taxonomy_lowercases_keywords() {
        let taxonomy = Taxonomy::new(vec![(
            "Robotics".to_string(),
            vec!["Humanoid".to_string(), "  ".to_string()],
        )]);
        assert_eq!(taxonomy.keywords("Robotics"), Some(&["humanoid".to_string()][..]));
        assert_eq!(taxonomy.classify("A HUMANOID demo"), set(&["Robotics"]));
        assert!(taxonomy.classify("   ").is_empty());
    }

    #[test]
    fn test_default_tag_names() {
        assert_eq!(
            Taxonomy::default().tag_names(),
            vec!["AI Agent", "AI Assistant", "AI Research", "Autonomous AI", "LLM"]
        );
    }
}
