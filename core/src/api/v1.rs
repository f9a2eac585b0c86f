//! Version 1 of the command API.
//!
//! Commands are intentionally thin wrappers that validate input, call into
//! the orchestrator or history store, and return serializable payloads that
//! a front end can render directly.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::agents::{
    AggregateResult, CredentialProvider, Generation, Orchestrator, OutcomeView, RequestSequencer,
};
use crate::config::{AppConfig, ClientMode};
use crate::history::HistoryEntry;
use crate::mapping::PromptResolver;

pub const NO_MAPPING_NOTICE: &str = "Could not generate images.";
pub const ALL_FAILED_NOTICE: &str = "Image generation failed";
pub const UNEXPECTED_NOTICE: &str = "Failed to generate images. Please try again.";

/// Shared state handed to each command.
#[derive(Clone)]
pub struct ApiState {
    pub config: AppConfig,
    pub orchestrator: Arc<Orchestrator>,
    pub resolver: Arc<PromptResolver>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub sequencer: Arc<RequestSequencer>,
}

/// Per-provider panel content.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderPanel {
    pub provider: String,
    pub display_name: String,
    #[serde(flatten)]
    pub outcome: OutcomeView,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateView {
    pub ticket: u64,
    /// A newer generation was started before this one settled; the result
    /// should not replace what is on screen.
    pub superseded: bool,
    pub prompt: String,
    /// No provider was asked. Existing images should stay visible.
    pub no_mapping: bool,
    pub panels: Vec<ProviderPanel>,
    pub images: BTreeMap<String, String>,
    pub errors: BTreeMap<String, String>,
    pub history_id: Option<i64>,
    pub notice: String,
}

impl GenerateView {
    pub fn success_count(&self) -> usize {
        self.images.len()
    }
}

fn panels(orchestrator: &Orchestrator, aggregate: &AggregateResult) -> Vec<ProviderPanel> {
    orchestrator
        .providers()
        .iter()
        .filter_map(|provider| {
            aggregate.get(&provider.key).map(|outcome| ProviderPanel {
                provider: provider.key.clone(),
                display_name: provider.display_name.clone(),
                outcome: OutcomeView::from(outcome),
            })
        })
        .collect()
}

/// Generate images for `prompt` with every provider.
pub async fn generate(state: &ApiState, prompt: &str) -> Result<GenerateView, String> {
    if prompt.trim().is_empty() {
        return Err("Please enter a prompt".to_string());
    }

    let ticket = state.sequencer.issue();
    let result = state.orchestrator.generate_all(prompt).await;
    let superseded = !state.sequencer.is_current(ticket);
    if superseded {
        log::info!("generation #{} superseded by a newer request", ticket.value());
    }

    let mut view = GenerateView {
        ticket: ticket.value(),
        superseded,
        prompt: prompt.to_string(),
        no_mapping: false,
        panels: Vec::new(),
        images: BTreeMap::new(),
        errors: BTreeMap::new(),
        history_id: None,
        notice: String::new(),
    };

    match result {
        Ok(Generation::NoMapping) => {
            view.no_mapping = true;
            view.notice = NO_MAPPING_NOTICE.to_string();
        }
        Ok(Generation::Completed {
            aggregate,
            history_id,
        }) => {
            view.panels = panels(&state.orchestrator, &aggregate);
            view.images = aggregate.successful_images();
            view.errors = aggregate.errors();
            view.history_id = history_id;
            view.notice = match aggregate.success_count() {
                0 => ALL_FAILED_NOTICE.to_string(),
                n => format!("Successfully generated {n} image(s)"),
            };
        }
        Err(err) => {
            log::error!("image generation aborted: {err}");
            let aggregate = AggregateResult::all_failed(state.orchestrator.providers(), &err);
            view.panels = panels(&state.orchestrator, &aggregate);
            view.errors = aggregate.errors();
            view.notice = UNEXPECTED_NOTICE.to_string();
        }
    }

    Ok(view)
}

/// All saved prompts, most recent first.
pub async fn list_history(state: &ApiState) -> Vec<HistoryEntry> {
    state.orchestrator.history().list().await
}

/// Load one saved prompt so its images can be shown again.
pub async fn get_history(state: &ApiState, id: i64) -> Result<HistoryEntry, String> {
    state
        .orchestrator
        .history()
        .get(id)
        .await
        .ok_or_else(|| format!("No history entry exists for id {id}"))
}

pub async fn delete_history(state: &ApiState, id: i64) {
    state.orchestrator.history().delete(id).await
}

pub async fn clear_history(state: &ApiState) {
    state.orchestrator.history().clear().await
}

/// Keywords the offline table knows about.
pub fn available_prompts(state: &ApiState) -> Vec<String> {
    state
        .resolver
        .available_prompts()
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub mode: ClientMode,
    pub api_base_url: String,
    pub project_id: Option<String>,
    pub has_access_token: bool,
    pub provider_count: usize,
    pub mapped_prompts: usize,
}

/// Configuration snapshot for diagnostics. Never includes the token itself.
pub async fn config_summary(state: &ApiState) -> ConfigSummary {
    ConfigSummary {
        mode: state.orchestrator.client().mode(),
        api_base_url: state.config.api_base_url.clone(),
        project_id: state.config.project_id.clone(),
        has_access_token: state.credentials.get().await.is_some(),
        provider_count: state.orchestrator.providers().len(),
        mapped_prompts: state.resolver.len(),
    }
}
