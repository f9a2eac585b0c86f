use serde::{Deserialize, Serialize};

/// One image-generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    /// Stable key used in mappings, outcomes and history (`dalle3`).
    pub key: String,
    /// Identifier the remote endpoint expects as `model_provider` (`openai`).
    pub system_id: String,
    pub display_name: String,
}

pub struct ProviderSeed {
    pub key: &'static str,
    pub system_id: &'static str,
    pub display: &'static str,
}

pub const PROVIDER_SEEDS: &[ProviderSeed] = &[
    ProviderSeed {
        key: "dalle3",
        system_id: "openai",
        display: "DALL-E 3",
    },
    ProviderSeed {
        key: "imagen3",
        system_id: "gcp-deepmind",
        display: "Imagen 3",
    },
];

impl From<&ProviderSeed> for Provider {
    fn from(seed: &ProviderSeed) -> Self {
        Self {
            key: seed.key.to_string(),
            system_id: seed.system_id.to_string(),
            display_name: seed.display.to_string(),
        }
    }
}

/// The configured providers, in presentation order.
pub fn default_providers() -> Vec<Provider> {
    PROVIDER_SEEDS.iter().map(Provider::from).collect()
}
