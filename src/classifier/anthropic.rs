//! [`StateClassifier`] backed by the Anthropic Messages API.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::prompt::{build_user_prompt, SYSTEM_PROMPT};
use super::{ClassificationRequest, ClassifierReply, StateClassifier};
use crate::config::{MonitorSettings, PricingConfig};
use crate::models::decision::TokenUsage;
use crate::terminal::BoxFuture;
use crate::{AppError, Result};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Unsupported,
}

/// Classifier calling `POST {base}/v1/messages`.
pub struct AnthropicClassifier {
    api_key: String,
    messages_url: String,
    model: String,
    max_tokens: u32,
    pricing: PricingConfig,
    client: Client,
}

impl AnthropicClassifier {
    /// Build a classifier from the monitor settings and a credential.
    ///
    /// `request_timeout` caps the HTTP exchange; the monitor loop applies its
    /// own bound on top.
    #[must_use]
    pub fn new(api_key: &str, settings: &MonitorSettings, request_timeout: Duration) -> Self {
        let base = settings
            .api_base_url
            .as_deref()
            .map_or(DEFAULT_BASE_URL, |url| url.trim_end_matches('/'));
        Self {
            api_key: api_key.trim().to_owned(),
            messages_url: format!("{base}/v1/messages"),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            pricing: settings.pricing,
            client: Client::builder()
                .timeout(request_timeout)
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Endpoint this classifier posts to.
    #[must_use]
    pub fn messages_url(&self) -> &str {
        &self.messages_url
    }

    async fn call(&self, request: &ClassificationRequest) -> Result<ClassifierReply> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: build_user_prompt(request),
            }],
        };

        let response = self
            .client
            .post(&self.messages_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|err| AppError::ClassifierCall(format!("request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::ClassifierCall(format!(
                "API returned {status}: {}",
                detail.chars().take(200).collect::<String>()
            )));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|err| AppError::ClassifierCall(format!("unreadable response: {err}")))?;

        let usage = parsed.usage.map_or_else(TokenUsage::default, |usage| {
            TokenUsage::priced(usage.input_tokens, usage.output_tokens, &self.pricing)
        });

        let text = parsed
            .content
            .into_iter()
            .find_map(|block| match block {
                ResponseContentBlock::Text { text } => Some(text),
                ResponseContentBlock::Unsupported => None,
            })
            .unwrap_or_default();

        debug!(
            worker_id = %request.worker_id,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "classifier replied"
        );

        Ok(ClassifierReply { text, usage })
    }
}

impl StateClassifier for AnthropicClassifier {
    fn classify<'a>(
        &'a self,
        request: &'a ClassificationRequest,
    ) -> BoxFuture<'a, Result<ClassifierReply>> {
        Box::pin(self.call(request))
    }
}
