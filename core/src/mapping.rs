//! Offline prompt → image lookup used by the simulated provider client.
//!
//! The table is data: each keyword maps to one image reference per provider
//! key. Resolution normalises the prompt, tries an exact keyword match, then
//! falls back to the first keyword (in table order) contained in the prompt.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};

/// Provider key → image reference for a single keyword.
pub type ImageSet = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingResult<'a> {
    Mapped(&'a ImageSet),
    NoMapping,
}

impl MappingResult<'_> {
    pub fn is_mapped(&self) -> bool {
        matches!(self, Self::Mapped(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct PromptResolver {
    entries: Vec<(String, ImageSet)>,
}

const SAMPLE_TABLE: &[(&str, &str)] = &[
    ("ice cream", "ice-cream"),
    ("sunset", "sunset"),
    ("beautiful sunset", "sunset"),
    ("mountain", "mountain"),
    ("snow mountain", "mountain"),
    ("cat", "cat"),
    ("cute cat", "cat"),
    ("dog", "dog"),
    ("puppy", "dog"),
];

pub fn normalize_prompt(prompt: &str) -> String {
    prompt.trim().to_lowercase()
}

impl PromptResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// The bundled demo table with sample images for every default provider.
    pub fn builtin() -> Self {
        let mut resolver = Self::new();
        for (keyword, asset) in SAMPLE_TABLE {
            let images = ["dalle3", "imagen3"]
                .iter()
                .map(|provider| {
                    (
                        provider.to_string(),
                        format!("/sample-images/{provider}/{asset}.png"),
                    )
                })
                .collect();
            resolver.insert(keyword, images);
        }
        resolver
    }

    /// Load a table from JSON shaped as `{ "keyword": { "provider": "reference" } }`.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read mapping file {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("invalid mapping file {}", path.display()))
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        // Keywords arrive sorted (no `preserve_order`), which fixes the scan order.
        let table: serde_json::Map<String, serde_json::Value> = serde_json::from_str(raw)?;
        let mut resolver = Self::new();
        for (keyword, value) in table {
            let images: ImageSet = serde_json::from_value(value)
                .with_context(|| format!("mapping for '{keyword}' is not a string map"))?;
            resolver.insert(&keyword, images);
        }
        Ok(resolver)
    }

    /// Add or replace a keyword. Blank keywords are ignored because they
    /// would match every prompt.
    pub fn insert(&mut self, keyword: &str, images: ImageSet) -> bool {
        let key = normalize_prompt(keyword);
        if key.is_empty() {
            log::warn!("ignoring blank mapping keyword");
            return false;
        }
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = images,
            None => self.entries.push((key, images)),
        }
        true
    }

    pub fn resolve(&self, prompt: &str) -> MappingResult<'_> {
        let normalized = normalize_prompt(prompt);
        if normalized.is_empty() {
            return MappingResult::NoMapping;
        }

        if let Some((_, images)) = self.entries.iter().find(|(k, _)| *k == normalized) {
            return MappingResult::Mapped(images);
        }

        self.entries
            .iter()
            .find(|(k, _)| normalized.contains(k.as_str()))
            .map(|(_, images)| MappingResult::Mapped(images))
            .unwrap_or(MappingResult::NoMapping)
    }

    pub fn has_mapping(&self, prompt: &str) -> bool {
        self.resolve(prompt).is_mapped()
    }

    pub fn available_prompts(&self) -> Vec<&str> {
        self.entries.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn images_for(resolver: &PromptResolver, prompt: &str) -> ImageSet {
        match resolver.resolve(prompt) {
            MappingResult::Mapped(images) => images.clone(),
            MappingResult::NoMapping => panic!("expected mapping for {prompt:?}"),
        }
    }

    #[test]
    fn exact_match_ignores_case_and_padding() {
        let resolver = PromptResolver::builtin();
        let images = images_for(&resolver, "  Ice Cream ");
        assert_eq!(
            images.get("dalle3").map(String::as_str),
            Some("/sample-images/dalle3/ice-cream.png")
        );
    }

    #[test]
    fn substring_match_finds_keyword_inside_prompt() {
        let resolver = PromptResolver::builtin();
        let images = images_for(&resolver, "a tiny puppy in the snow");
        assert_eq!(
            images.get("imagen3").map(String::as_str),
            Some("/sample-images/imagen3/dog.png")
        );
    }

    #[test]
    fn substring_scan_uses_table_order() {
        let mut resolver = PromptResolver::new();
        resolver.insert("cat", ImageSet::from([("a".into(), "cat.png".into())]));
        resolver.insert("dog", ImageSet::from([("a".into(), "dog.png".into())]));
        let images = images_for(&resolver, "dog chasing a cat");
        assert_eq!(images.get("a").map(String::as_str), Some("cat.png"));
    }

    #[test]
    fn blank_and_unknown_prompts_have_no_mapping() {
        let resolver = PromptResolver::builtin();
        for prompt in ["", "   ", "xyz123"] {
            assert_eq!(resolver.resolve(prompt), MappingResult::NoMapping);
            assert!(!resolver.has_mapping(prompt));
        }
    }

    #[test]
    fn empty_image_set_is_still_a_mapping() {
        let mut resolver = PromptResolver::new();
        resolver.insert("void", ImageSet::new());
        assert!(resolver.has_mapping("the void"));
        assert!(matches!(resolver.resolve("void"), MappingResult::Mapped(set) if set.is_empty()));
    }

    #[test]
    fn resolve_is_repeatable() {
        let resolver = PromptResolver::builtin();
        assert_eq!(resolver.resolve("cute cat"), resolver.resolve("cute cat"));
        assert_eq!(resolver.has_mapping("cute cat"), resolver.resolve("cute cat").is_mapped());
    }

    #[test]
    fn blank_keywords_are_rejected() {
        let mut resolver = PromptResolver::new();
        assert!(!resolver.insert("  ", ImageSet::new()));
        assert!(resolver.is_empty());
    }

    #[test]
    fn json_table_keeps_keywords() {
        let resolver = PromptResolver::from_json_str(
            r#"{ "Lighthouse": { "dalle3": "a.png", "imagen3": "b.png" } }"#,
        )
        .unwrap();
        assert_eq!(resolver.available_prompts(), vec!["lighthouse"]);
        assert!(resolver.has_mapping("old lighthouse at dusk"));
        assert!(PromptResolver::from_json_str(r#"{ "x": 3 }"#).is_err());
    }
}
