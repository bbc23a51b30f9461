//! Categorized theme tags extracted from images.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Maximum number of characters kept per flattened tag.
pub const MAX_TAG_LEN: usize = 50;

/// Semantic tags describing one image, or a whole submission once combined.
///
/// Every category is a set of short lowercase strings. Tags are normalized
/// on the way in, so two insights built from differently-cased provider
/// output compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThemeInsights {
    pub subjects: BTreeSet<String>,
    pub vibes: BTreeSet<String>,
    pub notable_elements: BTreeSet<String>,
    pub colors: BTreeSet<String>,
    pub keywords: BTreeSet<String>,
}

impl ThemeInsights {
    /// Returns true if any category holds at least one tag.
    pub fn has_any_data(&self) -> bool {
        self.categories().iter().any(|c| !c.is_empty())
    }

    /// Re-normalizes every tag, dropping ones that end up empty.
    pub fn normalized(self) -> Self {
        Self {
            subjects: normalize_set(self.subjects),
            vibes: normalize_set(self.vibes),
            notable_elements: normalize_set(self.notable_elements),
            colors: normalize_set(self.colors),
            keywords: normalize_set(self.keywords),
        }
    }

    /// Merges per-file insights into one submission-level instance.
    ///
    /// Union per category with case-insensitive deduplication.
    pub fn combine<'a, I>(items: I) -> Self
    where
        I: IntoIterator<Item = &'a ThemeInsights>,
    {
        let mut combined = ThemeInsights::default();
        for item in items {
            extend_normalized(&mut combined.subjects, &item.subjects);
            extend_normalized(&mut combined.vibes, &item.vibes);
            extend_normalized(&mut combined.notable_elements, &item.notable_elements);
            extend_normalized(&mut combined.colors, &item.colors);
            extend_normalized(&mut combined.keywords, &item.keywords);
        }
        combined
    }

    /// All categories as one deduplicated, sorted, lowercase list.
    pub fn flatten_tags(&self) -> Vec<String> {
        self.categories()
            .into_iter()
            .flat_map(|c| c.iter())
            .filter_map(|t| normalize_tag(t))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn categories(&self) -> [&BTreeSet<String>; 5] {
        [
            &self.subjects,
            &self.vibes,
            &self.notable_elements,
            &self.colors,
            &self.keywords,
        ]
    }
}

/// Stored shape of `content_features.theme_tags_json`.
///
/// Either the full categorized payload, or a plain tag array for rows where
/// no category data was available. Variant order matters for the untagged
/// decoder: an array never decodes as `Insights`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThemePayload {
    Tags(Vec<String>),
    Insights(ThemeInsights),
}

impl ThemePayload {
    /// Decodes a stored payload. Malformed JSON yields `None`.
    pub fn parse(json: &str) -> Option<Self> {
        match serde_json::from_str::<ThemePayload>(json) {
            Ok(payload) => Some(payload),
            Err(e) => {
                log::debug!("Ignoring malformed theme payload: {}", e);
                None
            }
        }
    }

    /// Flattened, normalized tag list regardless of the stored shape.
    pub fn tags(&self) -> Vec<String> {
        match self {
            ThemePayload::Insights(insights) => insights.flatten_tags(),
            ThemePayload::Tags(tags) => normalize_tags(tags.iter()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ThemePayload::Insights(insights) => !insights.has_any_data(),
            ThemePayload::Tags(tags) => tags.iter().all(|t| normalize_tag(t).is_none()),
        }
    }
}

/// Normalizes a single tag: trimmed, lowercased, inner whitespace collapsed,
/// surrounding quotes and hashes stripped, capped at [`MAX_TAG_LEN`] chars.
///
/// Applying it to its own output is a no-op.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let cleaned = raw
        .trim()
        .trim_matches(is_edge_punct)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let capped: String = cleaned.chars().take(MAX_TAG_LEN).collect();
    // The cap can land on punctuation or a space.
    let capped = capped
        .trim_end_matches(|c: char| c.is_whitespace() || is_edge_punct(c))
        .to_string();

    if capped.is_empty() {
        None
    } else {
        Some(capped)
    }
}

fn is_edge_punct(c: char) -> bool {
    matches!(c, '"' | '\'' | '#' | '.' | ',')
}

/// Normalizes and deduplicates a list of tags into sorted order.
pub fn normalize_tags<'a, I>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    tags.into_iter()
        .filter_map(|t| normalize_tag(t))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn normalize_set(set: BTreeSet<String>) -> BTreeSet<String> {
    set.iter().filter_map(|t| normalize_tag(t)).collect()
}

fn extend_normalized(target: &mut BTreeSet<String>, source: &BTreeSet<String>) {
    target.extend(source.iter().filter_map(|t| normalize_tag(t)));
}
