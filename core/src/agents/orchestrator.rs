use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use serde_json::json;

use super::client::ProviderClient;
use super::outcome::{AggregateResult, GenerationOutcome};
use super::providers::Provider;
use crate::errors::GenerationError;
use crate::history::HistoryStore;
use crate::logging::EventLevel;

const MODULE: &str = "generation";

/// What a single `generate_all` call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    /// The prompt maps to nothing; no provider was invoked. Callers should
    /// keep whatever they were showing and surface one notice.
    NoMapping,
    Completed {
        aggregate: AggregateResult,
        /// Row id of the history entry, when one was written.
        history_id: Option<i64>,
    },
}

/// Fans one prompt out to every configured provider and records successful
/// results in history.
pub struct Orchestrator {
    providers: Vec<Provider>,
    client: Arc<dyn ProviderClient>,
    history: HistoryStore,
}

impl Orchestrator {
    pub fn new(
        providers: Vec<Provider>,
        client: Arc<dyn ProviderClient>,
        history: HistoryStore,
    ) -> Self {
        Self {
            providers,
            client,
            history,
        }
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    pub fn client(&self) -> &dyn ProviderClient {
        self.client.as_ref()
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Generate `prompt` with every provider concurrently.
    ///
    /// Provider failures are captured in their own outcome and never affect
    /// the others. `Err` is reserved for a breakdown of the fan-out itself;
    /// see [`AggregateResult::all_failed`] for reporting it.
    pub async fn generate_all(&self, prompt: &str) -> Result<Generation, GenerationError> {
        if !self.client.accepts(prompt) {
            log::info!("no mapping for prompt {prompt:?}; skipping providers");
            return Ok(Generation::NoMapping);
        }

        log::info!(
            "generating {prompt:?} with {} provider(s) in {} mode",
            self.providers.len(),
            self.client.mode()
        );

        // join_all polls in order, so every call starts before any is awaited
        // to completion and results come back in provider order.
        let fan_out = join_all(
            self.providers
                .iter()
                .map(|provider| self.client.invoke(prompt, provider)),
        );
        let outcomes = AssertUnwindSafe(fan_out)
            .catch_unwind()
            .await
            .map_err(|panic| GenerationError::Unexpected(panic_message(panic)))?;

        for outcome in &outcomes {
            self.record_outcome(prompt, outcome).await;
        }
        let aggregate = AggregateResult::new(outcomes);

        let images = aggregate.successful_images();
        let history_id = if images.is_empty() {
            log::warn!("all providers failed for {prompt:?}; nothing saved");
            None
        } else {
            self.history.append(prompt, images).await
        };

        Ok(Generation::Completed {
            aggregate,
            history_id,
        })
    }

    async fn record_outcome(&self, prompt: &str, outcome: &GenerationOutcome) {
        match &outcome.result {
            Ok(_) => {
                self.history
                    .audit(
                        MODULE,
                        EventLevel::Info,
                        "GEN-0200",
                        "image generation succeeded",
                        Some(json!({ "provider": outcome.provider, "prompt": prompt })),
                    )
                    .await
            }
            Err(err) => {
                self.history
                    .audit(
                        MODULE,
                        EventLevel::Warn,
                        err.code(),
                        "image generation failed",
                        Some(json!({
                            "provider": outcome.provider,
                            "prompt": prompt,
                            "error": err.to_string(),
                        })),
                    )
                    .await
            }
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "image generation aborted unexpectedly".to_string()
    }
}

/// Ticket identifying one user-initiated generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

impl Ticket {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Hands out increasing tickets so that a settled generation can tell
/// whether a newer one was started in the meantime.
#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: AtomicU64,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// True while no later ticket has been issued.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }
}
