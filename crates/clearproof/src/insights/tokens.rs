//! Word tokens used to match summary phrases against submission text.

use std::collections::BTreeSet;

const STOPWORDS: &[&str] = &[
    "about", "after", "all", "also", "and", "any", "are", "but", "can", "for", "from", "had",
    "has", "have", "her", "his", "its", "just", "like", "more", "most", "not", "our", "out",
    "over", "she", "than", "that", "the", "their", "them", "then", "there", "these", "they",
    "this", "too", "very", "was", "were", "what", "when", "which", "while", "who", "will",
    "with", "you", "your",
];

/// Lowercased word tokens longer than two characters, stopwords removed.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// A phrase matches when any of its tokens appears in `tokens`.
pub fn phrase_matches(phrase: &str, tokens: &BTreeSet<String>) -> bool {
    tokenize(phrase).iter().any(|t| tokens.contains(t))
}

pub fn count_matching<'a, I>(phrases: I, tokens: &BTreeSet<String>) -> usize
where
    I: IntoIterator<Item = &'a String>,
{
    phrases
        .into_iter()
        .filter(|p| phrase_matches(p, tokens))
        .count()
}
