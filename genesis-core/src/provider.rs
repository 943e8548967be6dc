//! Workers AI as a [`GenerationProvider`].

use crate::config::EngineConfig;
use crate::generation::{GenerationPrompt, GenerationProvider, ProviderError};
use crate::visual::WorldImage;
use async_trait::async_trait;
use workers_ai::{Message, TextRequest, WorkersAi};

const MAX_TOKENS: usize = 256;

/// Generation backed by Cloudflare Workers AI.
///
/// Built without credentials it still works as a provider, but every call
/// fails with [`ProviderError::Unavailable`].
#[derive(Debug, Clone)]
pub struct WorkersAiProvider {
    client: Option<WorkersAi>,
}

impl WorkersAiProvider {
    pub fn new(client: WorkersAi) -> Self {
        Self {
            client: Some(client),
        }
    }

    /// A provider that never reaches the network.
    pub fn unconfigured() -> Self {
        Self { client: None }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        match (&config.api_key, &config.account_id) {
            (Some(key), Some(account)) => Self::new(
                WorkersAi::new(key, account)
                    .with_api_base(&config.api_base)
                    .with_text_model(&config.text_model)
                    .with_image_model(&config.image_model),
            ),
            _ => {
                tracing::warn!("Workers AI credentials missing, new concepts will use local fallbacks");
                Self::unconfigured()
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    fn client(&self) -> Result<&WorkersAi, ProviderError> {
        self.client
            .as_ref()
            .ok_or_else(|| ProviderError::Unavailable("no Workers AI credentials".to_string()))
    }
}

impl From<workers_ai::Error> for ProviderError {
    fn from(err: workers_ai::Error) -> Self {
        use workers_ai::Error;
        match err {
            Error::NoApiKey | Error::NoAccount => ProviderError::Unavailable(err.to_string()),
            Error::Network(message) => ProviderError::Transport(message),
            Error::Api { status, message } => ProviderError::Api { status, message },
            Error::Parse(message) | Error::Config(message) => ProviderError::BadResponse(message),
        }
    }
}

#[async_trait]
impl GenerationProvider for WorkersAiProvider {
    async fn generate_text(&self, prompt: &GenerationPrompt) -> Result<String, ProviderError> {
        let request = TextRequest::new(vec![
            Message::system(&prompt.system),
            Message::user(&prompt.user),
        ])
        .with_max_tokens(MAX_TOKENS);

        let response = self.client()?.run_text(&request).await?;
        Ok(response.text)
    }

    async fn generate_image(&self, prompt: &str) -> Result<WorldImage, ProviderError> {
        let image = self.client()?.run_image(prompt).await?;
        Ok(WorldImage {
            media_type: image.media_type,
            bytes: image.bytes,
        })
    }

    fn name(&self) -> &str {
        "workers-ai"
    }
}
