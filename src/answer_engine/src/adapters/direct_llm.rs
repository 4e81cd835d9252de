use super::{AdapterOutcome, AdapterRequest, NormalizedAnswer, ProviderAdapter};
use answer_types::error::{CollectorError, ErrorKind};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::chat::{ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
};
use async_trait::async_trait;
use serde_json::Value;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

/// The one adapter that speaks a standard chat-completions dialect end to
/// end; built on `async-openai` the same way the host's job pipeline is,
/// but stripped of streaming/tool-calling since a single-turn answer is all
/// this domain needs.
pub struct DirectLlmAdapter {
    pub name: String,
    pub model: String,
    client: Client<OpenAIConfig>,
}

impl DirectLlmAdapter {
    pub fn new(name: impl Into<String>, model: impl Into<String>, api_key: Option<String>, base_url: &str) -> Result<Self, CollectorError> {
        let api_key = api_key.ok_or_else(|| {
            CollectorError::new(ErrorKind::ConfigurationMissing, "direct LLM adapter missing API key")
        })?;
        let config = OpenAIConfig::new().with_api_key(api_key).with_api_base(base_url);
        Ok(DirectLlmAdapter {
            name: name.into(),
            model: model.into(),
            client: Client::with_config(config),
        })
    }
}

#[async_trait]
impl ProviderAdapter for DirectLlmAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_async(&self) -> bool {
        false
    }

    async fn call(&self, req: &AdapterRequest) -> Result<AdapterOutcome, CollectorError> {
        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(DEFAULT_SYSTEM_PROMPT)
            .build()
            .map_err(|e| CollectorError::new(ErrorKind::Unknown, e.to_string()))?;
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(req.prompt.clone())
            .build()
            .map_err(|e| CollectorError::new(ErrorKind::Unknown, e.to_string()))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![system.into(), user.into()])
            .build()
            .map_err(|e| CollectorError::new(ErrorKind::Unknown, e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(map_openai_error)?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| CollectorError::new(ErrorKind::EmptyResponse, "no choices returned"))?;
        let answer = choice.message.content.clone().unwrap_or_default();
        if answer.is_empty() {
            return Err(CollectorError::new(ErrorKind::EmptyResponse, "empty completion"));
        }

        Ok(AdapterOutcome::Sync(NormalizedAnswer {
            answer,
            citations: Vec::new(),
            urls: Vec::new(),
            model_used: Some(response.model.clone()),
            metadata: serde_json::to_value(&response).unwrap_or(Value::Null),
        }))
    }
}

fn map_openai_error(e: async_openai::error::OpenAIError) -> CollectorError {
    use async_openai::error::OpenAIError;
    match e {
        OpenAIError::ApiError(api_err) => {
            let kind = match api_err.code.as_deref() {
                Some("401") | Some("invalid_api_key") => ErrorKind::Auth,
                Some("429") | Some("rate_limit_exceeded") => ErrorKind::Transport,
                Some(c) if c.starts_with('5') => ErrorKind::Transport,
                _ => ErrorKind::InvalidInput,
            };
            CollectorError::new(kind, api_err.message)
        }
        OpenAIError::Reqwest(re) => CollectorError::from(re),
        other => CollectorError::new(ErrorKind::Unknown, other.to_string()),
    }
}
