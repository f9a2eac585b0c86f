use std::collections::BTreeMap;

use serde::Serialize;

use super::providers::Provider;
use crate::errors::GenerationError;

/// Result of invoking one provider once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutcome {
    pub provider: String,
    pub result: Result<String, GenerationError>,
}

impl GenerationOutcome {
    pub fn new(provider: &Provider, result: Result<String, GenerationError>) -> Self {
        Self {
            provider: provider.key.clone(),
            result,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn image(&self) -> Option<&str> {
        self.result.as_deref().ok()
    }

    pub fn error(&self) -> Option<&GenerationError> {
        self.result.as_ref().err()
    }
}

/// Serializable view of an outcome for front ends.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeView {
    Success { image: String },
    Failure { code: String, error: String },
}

impl From<&GenerationOutcome> for OutcomeView {
    fn from(outcome: &GenerationOutcome) -> Self {
        match &outcome.result {
            Ok(image) => Self::Success {
                image: image.clone(),
            },
            Err(err) => Self::Failure {
                code: err.code().to_string(),
                error: err.to_string(),
            },
        }
    }
}

/// One outcome per configured provider, kept in configured order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateResult {
    outcomes: Vec<GenerationOutcome>,
}

impl AggregateResult {
    pub fn new(outcomes: Vec<GenerationOutcome>) -> Self {
        Self { outcomes }
    }

    /// Every provider failed with the same error, used when the fan-out
    /// itself broke down.
    pub fn all_failed(providers: &[Provider], err: &GenerationError) -> Self {
        Self::new(
            providers
                .iter()
                .map(|p| GenerationOutcome::new(p, Err(err.clone())))
                .collect(),
        )
    }

    pub fn get(&self, provider_key: &str) -> Option<&GenerationOutcome> {
        self.outcomes.iter().find(|o| o.provider == provider_key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GenerationOutcome> {
        self.outcomes.iter()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Provider key → image reference for the successful outcomes only.
    pub fn successful_images(&self) -> BTreeMap<String, String> {
        self.outcomes
            .iter()
            .filter_map(|o| o.image().map(|img| (o.provider.clone(), img.to_string())))
            .collect()
    }

    /// Provider key → error text for the failed outcomes only.
    pub fn errors(&self) -> BTreeMap<String, String> {
        self.outcomes
            .iter()
            .filter_map(|o| o.error().map(|e| (o.provider.clone(), e.to_string())))
            .collect()
    }
}
