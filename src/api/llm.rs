//! A client for any service that speaks the OpenAI `/v1/chat/completions` API.

use crate::api::Llm;
use crate::error::Res;
use crate::Config;
use anyhow::{bail, Context};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Sends single-message chats to an OpenAI-compatible endpoint. Replies are requested with
/// temperature 0 so that the same table gets the same answer.
#[derive(Debug, Clone)]
pub(crate) struct ChatLlm {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl ChatLlm {
    pub(crate) fn new(base_url: &str, model: &str, api_key: Option<String>) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        }
    }

    /// Uses the base URL and model from `config.json`. The API key is read from the environment
    /// variable that the config names; when it is unset we send no `Authorization` header.
    pub(crate) fn from_config(config: &Config) -> Res<Self> {
        let key_env = config.llm_api_key_env();
        let api_key = match std::env::var(key_env) {
            Ok(key) if !key.trim().is_empty() => Some(key),
            Ok(_) | Err(std::env::VarError::NotPresent) => {
                debug!("{key_env} is not set, calling the model service without an API key");
                None
            }
            Err(e) => return Err(e).with_context(|| format!("Unable to read {key_env}")),
        };
        Ok(Self::new(config.llm_base_url(), config.llm_model(), api_key))
    }
}

#[async_trait::async_trait]
impl Llm for ChatLlm {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Res<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
            stream: false,
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        trace!("POST {url} ({} prompt bytes)", prompt.len());
        let mut req_builder = self.http_client.post(&url).json(&request);
        if let Some(api_key) = &self.api_key {
            req_builder = req_builder.bearer_auth(api_key);
        }

        let response = req_builder
            .send()
            .await
            .with_context(|| format!("Unable to reach the model service at {url}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Model service error {status}: {body}");
        }

        let chat_response: ChatCompletionResponse = response
            .json()
            .await
            .context("Unable to parse the model service response")?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .context("The model service returned no choices")
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}
