use log::{error, info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Result, ServiceError};
use crate::config::Config;

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f64,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Deserialize, Default)]
struct ApiErrorBody {
    #[serde(default)]
    error: Option<ApiErrorDetail>,
}

#[derive(Deserialize, Default)]
struct ApiErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Owns the call to the external language-model service and classifies its
/// failures. Performs no JSON interpretation of the completion text itself;
/// the raw string goes to the repair parser unmodified.
#[derive(Clone)]
pub struct EvaluationClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl EvaluationClient {
    pub fn new(config: &Config) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: config.llm_base_url.clone(),
            api_key: config.llm_api_key.clone(),
            model: config.llm_model.clone(),
            max_tokens: config.llm_max_tokens,
        }
    }

    async fn request_completion(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: self.max_tokens,
            temperature: 0.4,
            stream: false,
        };

        info!("requesting evaluation with model: {}", self.model);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceError::TransportError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            // The provider reports policy rejections through a structured
            // error code, never matched on human-readable text.
            if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(&body) {
                if let Some(detail) = parsed.error {
                    let code = detail.code.unwrap_or_default();
                    if code == "content_filter" || code == "content_policy_violation" {
                        return Err(ServiceError::ContentBlocked(
                            detail.message.unwrap_or_else(|| code.clone()),
                        ));
                    }
                }
            }
            error!("evaluation service error {}: {}", status, body);
            return Err(ServiceError::TransportError(format!("HTTP {}", status)));
        }

        let completion: ChatResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::TransportError(e.to_string()))?;

        if let Some(usage) = &completion.usage {
            info!(
                "token usage - prompt: {}, completion: {}, total: {}",
                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
            );
        }

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or(ServiceError::EmptyResponse)?;

        match choice.finish_reason.as_deref() {
            // A cut-off reply is surfaced, not retried: the caller falls
            // back instead of accepting a broken rating.
            Some("length") => {
                warn!("evaluation reply hit the output budget");
                return Err(ServiceError::TruncatedResponse);
            }
            Some("content_filter") => {
                return Err(ServiceError::ContentBlocked(
                    "completion stopped by the provider's content filter".to_string(),
                ));
            }
            _ => {}
        }

        let text = choice.message.content.trim().to_string();
        if text.is_empty() {
            return Err(ServiceError::EmptyResponse);
        }
        Ok(text)
    }
}

impl super::CompletionService for EvaluationClient {
    async fn evaluate(&self, prompt: &str) -> Result<String> {
        self.request_completion(prompt).await
    }
}
