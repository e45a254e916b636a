//! Theme and entity derivation.
//!
//! A pure function of the text, recomputed on every store/update: text can
//! change between truncated and full versions, so nothing here is cached.

use std::collections::BTreeSet;

/// Keyword buckets for theme classification. Single-word keywords match whole
/// words; multi-word phrases match as substrings of the lowercased text.
const THEME_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "ai",
        &["ai", "artificial intelligence", "machine learning", "ml", "deep learning", "neural network"],
    ),
    (
        "llm",
        &["llm", "gpt", "chatgpt", "claude", "openai", "anthropic", "gemini", "llama"],
    ),
    (
        "agents",
        &["agent", "agentic", "autonomous", "automation", "workflow"],
    ),
    (
        "infrastructure",
        &["cloud", "aws", "gcp", "azure", "kubernetes", "docker", "api"],
    ),
    (
        "business",
        &["startup", "b2b", "b2c", "saas", "enterprise", "founder", "vc", "funding"],
    ),
    (
        "crypto",
        &["blockchain", "crypto", "bitcoin", "ethereum", "defi", "nft", "web3"],
    ),
    (
        "dev",
        &["python", "javascript", "typescript", "rust", "go", "coding", "programming"],
    ),
    (
        "security",
        &["security", "privacy", "encryption", "auth", "authentication"],
    ),
];

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
];

/// Derive theme labels and proper-noun entities from tweet text.
pub fn derive_themes_and_entities(text: &str) -> (BTreeSet<String>, BTreeSet<String>) {
    (derive_themes(text), derive_entities(text))
}

fn derive_themes(text: &str) -> BTreeSet<String> {
    let lower = text.to_lowercase();
    let word_re = regex::Regex::new(r"\b\w+\b").expect("valid regex");
    let words: BTreeSet<&str> = word_re.find_iter(&lower).map(|m| m.as_str()).collect();

    let mut themes = BTreeSet::new();
    for (category, keywords) in THEME_KEYWORDS {
        for keyword in *keywords {
            let hit = if keyword.contains(' ') {
                lower.contains(keyword)
            } else {
                words.contains(keyword)
            };
            if hit {
                themes.insert((*category).to_string());
                break;
            }
        }
    }
    themes
}

/// Proper-noun heuristic over capitalization patterns: multi-word names like
/// "Sam Altman" plus capitalized words that are not at the start of the first
/// sentence.
fn derive_entities(text: &str) -> BTreeSet<String> {
    let mut entities = BTreeSet::new();

    let multi_word = regex::Regex::new(r"\b([A-Z][a-z]+(?:\s+[A-Z][a-z]+)+)\b").expect("valid regex");
    for cap in multi_word.captures_iter(text) {
        entities.insert(cap[1].to_string());
    }

    let sentence_split = regex::Regex::new(r"[.!?]+\s+").expect("valid regex");
    for (i, sentence) in sentence_split.split(text).enumerate() {
        for (j, word) in sentence.split_whitespace().enumerate() {
            // The opening word of the text is capitalized by convention,
            // not because it names anything.
            if i == 0 && j == 0 {
                continue;
            }
            if STOP_WORDS.contains(&word.to_lowercase().as_str()) {
                continue;
            }
            let mut chars = word.chars();
            let leading_upper = chars.next().is_some_and(|c| c.is_uppercase());
            if !leading_upper || word.chars().count() < 2 {
                continue;
            }
            let clean: String = word.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
            if clean.chars().count() > 2 {
                entities.insert(clean);
            }
        }
    }

    entities
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn themes_match_whole_words_only() {
        let (themes, _) = derive_themes_and_entities("He said nothing of note");
        // "said" contains "ai" as a substring but is not the word "ai".
        assert!(!themes.contains("ai"));
    }

    #[test]
    fn single_keyword_triggers_category() {
        let (themes, _) = derive_themes_and_entities("shipping a new rust crate today");
        assert!(themes.contains("dev"));
    }

    #[test]
    fn phrase_keywords_match_as_substring() {
        let (themes, _) = derive_themes_and_entities("Notes on machine learning at scale");
        assert!(themes.contains("ai"));
    }

    #[test]
    fn multiple_categories_from_one_text() {
        let (themes, _) =
            derive_themes_and_entities("Claude automation running on kubernetes for a saas startup");
        assert!(themes.contains("llm"));
        assert!(themes.contains("agents"));
        assert!(themes.contains("infrastructure"));
        assert!(themes.contains("business"));
    }

    #[test]
    fn multi_word_proper_nouns_extracted() {
        let (_, entities) = derive_themes_and_entities("Interview with Sam Altman yesterday");
        assert!(entities.contains("Sam Altman"));
    }

    #[test]
    fn first_word_of_text_is_not_an_entity() {
        let (_, entities) = derive_themes_and_entities("Shipping things is fun");
        assert!(!entities.contains("Shipping"));
    }

    #[test]
    fn capitalized_words_mid_sentence_are_entities() {
        let (_, entities) = derive_themes_and_entities("We tried Neo4j on the new box");
        assert!(entities.contains("Neo4j"));
    }

    #[test]
    fn stop_words_and_short_words_skipped() {
        let (_, entities) = derive_themes_and_entities("Talked to The team about Go plans");
        assert!(!entities.contains("The"));
        // "Go" cleans to two characters, below the length floor.
        assert!(!entities.contains("Go"));
    }

    #[test]
    fn themes_recompute_differently_for_fuller_text() {
        let (truncated, _) = derive_themes_and_entities("Thread on why we moved our infra");
        let (full, _) =
            derive_themes_and_entities("Thread on why we moved our infra to kubernetes and docker");
        assert!(truncated.is_empty());
        assert!(full.contains("infrastructure"));
    }
}
