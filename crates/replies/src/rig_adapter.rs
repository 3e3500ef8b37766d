use rig::completion::{CompletionModel, Message as RigMessage};
use rig::message::AssistantContent;
use rig::prelude::CompletionClient;
use rig::providers::openai;
use snafu::ensure;

use super::config::RigConfig;
use super::responder::{
    BoxFuture, MissingApiKeySnafu, ReplyRequest, Responder, ResponderError, ResponderResult,
};

/// Answers each message with a single completion from an OpenAI-compatible endpoint.
pub struct RigResponder {
    config: RigConfig,
}

impl RigResponder {
    pub fn new(config: RigConfig) -> ResponderResult<Self> {
        ensure!(
            !config.api_key.is_empty(),
            MissingApiKeySnafu {
                stage: "rig-responder-new",
                responder_id: config.provider_id.clone(),
            }
        );

        Ok(Self { config })
    }

    fn build_client(config: &RigConfig) -> ResponderResult<openai::Client> {
        let mut builder = openai::Client::builder().api_key(config.api_key.as_str());
        if !config.endpoint.is_empty() {
            builder = builder.base_url(config.endpoint.as_str());
        }
        builder
            .build()
            .map_err(|source| transport_error(config, "build-client", source))
    }

    async fn complete(config: RigConfig, request: ReplyRequest) -> ResponderResult<String> {
        let client = Self::build_client(&config)?;
        let model = client.completion_model(config.model.clone());

        let mut builder = model.completion_request(RigMessage::user(request.text));
        if let Some(preamble) = &config.preamble
            && !preamble.trim().is_empty()
        {
            builder = builder.preamble(preamble.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|source| transport_error(&config, "send-completion", source))?;

        // Multi-part answers are joined; tool calls and reasoning are ignored.
        let text = response
            .choice
            .iter()
            .filter_map(|content| match content {
                AssistantContent::Text(text) => Some(text.text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        tracing::debug!(
            target = %request.target,
            provider_id = %config.provider_id,
            model_id = %config.model,
            reply_len = text.len(),
            "completion received"
        );

        Ok(text)
    }
}

fn transport_error(
    config: &RigConfig,
    stage: &'static str,
    source: impl std::fmt::Display,
) -> ResponderError {
    tracing::warn!(
        provider_id = %config.provider_id,
        model_id = %config.model,
        stage,
        error = %source,
        "completion request failed"
    );
    ResponderError::Transport {
        stage,
        responder_id: config.provider_id.clone(),
        message: source.to_string(),
    }
}

impl Responder for RigResponder {
    fn id(&self) -> &str {
        &self.config.provider_id
    }

    fn respond(&self, request: ReplyRequest) -> BoxFuture<'static, ResponderResult<String>> {
        Box::pin(Self::complete(self.config.clone(), request))
    }
}
