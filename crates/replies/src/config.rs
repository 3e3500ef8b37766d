/// Which responder backs the reply simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponderConfig {
    Canned {
        candidates: Vec<String>,
        seed: Option<u64>,
    },
    Rig(RigConfig),
}

/// Connection details for an OpenAI-compatible completion endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RigConfig {
    pub provider_id: String,
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    pub preamble: Option<String>,
}

impl RigConfig {
    pub fn new(
        provider_id: impl Into<String>,
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider_id: provider_id.into().trim().to_string(),
            api_key: api_key.into().trim().to_string(),
            endpoint: endpoint.into().trim().to_string(),
            model: model.into().trim().to_string(),
            preamble: None,
        }
    }

    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = Some(preamble.into());
        self
    }
}
