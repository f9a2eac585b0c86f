pub mod client;
pub mod credentials;
pub mod orchestrator;
pub mod outcome;
pub mod providers;

pub use client::{build_client, ProviderClient, RemoteClient, SimulatedClient};
pub use credentials::{CredentialProvider, SettingsCredentialStore, StaticCredential};
pub use orchestrator::{Generation, Orchestrator, RequestSequencer, Ticket};
pub use outcome::{AggregateResult, GenerationOutcome, OutcomeView};
pub use providers::{default_providers, Provider};
