//! Text completion over Azure OpenAI.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::LlmSettings;

const MAX_OUTPUT_TOKENS: u32 = 200;
const TEMPERATURE: f64 = 0.2;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM is not configured")]
    NotConfigured,

    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("LLM reply contained no text")]
    EmptyReply,
}

/// Per-request settings sent by a chat client. Missing fields fall back to
/// the process defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmOverride {
    pub endpoint: Option<String>,
    pub key: Option<String>,
    pub api_version: Option<String>,
    pub deployment: Option<String>,
}

#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, prompt: &str, overrides: Option<&LlmOverride>) -> Result<String, LlmError>;
}

pub struct AzureOpenAiClient {
    http: Client,
    defaults: LlmSettings,
}

impl AzureOpenAiClient {
    pub fn new(defaults: LlmSettings, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, defaults })
    }

    /// An override only applies when it names both endpoint and key.
    fn effective(&self, overrides: Option<&LlmOverride>) -> LlmSettings {
        match overrides {
            Some(o) if nonblank(&o.endpoint) && nonblank(&o.key) => LlmSettings {
                endpoint: o.endpoint.clone(),
                key: o.key.clone(),
                api_version: o
                    .api_version
                    .clone()
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| self.defaults.api_version.clone()),
                deployment: o
                    .deployment
                    .clone()
                    .filter(|d| !d.is_empty())
                    .unwrap_or_else(|| self.defaults.deployment.clone()),
            },
            _ => self.defaults.clone(),
        }
    }

    async fn responses(&self, s: &LlmSettings, endpoint: &str, key: &str, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/openai/responses", endpoint.trim_end_matches('/'));
        let body = json!({
            "model": s.deployment,
            "input": prompt,
            "max_output_tokens": MAX_OUTPUT_TOKENS,
        });
        let reply = self.post(&url, &s.api_version, key, &body).await?;
        responses_text(&reply).ok_or(LlmError::EmptyReply)
    }

    async fn chat_completions(
        &self,
        s: &LlmSettings,
        endpoint: &str,
        key: &str,
        prompt: &str,
    ) -> Result<String, LlmError> {
        let url = format!(
            "{}/openai/deployments/{}/chat/completions",
            endpoint.trim_end_matches('/'),
            s.deployment
        );
        let mut body = Map::new();
        body.insert("messages".into(), json!([{ "role": "user", "content": prompt }]));
        if prefers_new_api(s) {
            body.insert("max_completion_tokens".into(), json!(MAX_OUTPUT_TOKENS));
        } else {
            body.insert("max_tokens".into(), json!(MAX_OUTPUT_TOKENS));
            body.insert("temperature".into(), json!(TEMPERATURE));
        }

        let reply = match self.post(&url, &s.api_version, key, &Value::Object(body.clone())).await {
            Err(LlmError::Api { status: 400, body: detail }) if adjust_parameters(&mut body, &detail) => {
                debug!("Retrying chat completion with adjusted parameters");
                self.post(&url, &s.api_version, key, &Value::Object(body)).await?
            }
            other => other?,
        };
        Ok(reply["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    async fn post(&self, url: &str, api_version: &str, key: &str, body: &Value) -> Result<Value, LlmError> {
        let response = self
            .http
            .post(url)
            .query(&[("api-version", api_version)])
            .header("api-key", key)
            .json(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl TextCompletion for AzureOpenAiClient {
    async fn complete(&self, prompt: &str, overrides: Option<&LlmOverride>) -> Result<String, LlmError> {
        let settings = self.effective(overrides);
        let (Some(endpoint), Some(key)) = (settings.endpoint.as_deref(), settings.key.as_deref()) else {
            return Err(LlmError::NotConfigured);
        };
        if !settings.is_configured() {
            return Err(LlmError::NotConfigured);
        }

        if prefers_new_api(&settings) {
            match self.responses(&settings, endpoint, key, prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => warn!(error = %e, "Responses API failed, falling back to chat completions"),
            }
        }
        self.chat_completions(&settings, endpoint, key, prompt).await
    }
}

fn nonblank(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// Newer deployments and 2025 API versions take `max_completion_tokens` and
/// are served by the Responses API.
fn prefers_new_api(s: &LlmSettings) -> bool {
    let model = s.deployment.to_lowercase();
    model.starts_with("gpt-5") || model.starts_with("o4") || s.api_version.starts_with("2025-")
}

/// Rewrites the request body after an "unsupported parameter/value" reply.
/// Returns false when the complaint is about something else.
fn adjust_parameters(body: &mut Map<String, Value>, detail: &str) -> bool {
    let unsupported_param = detail.contains("Unsupported parameter");
    let unsupported_value = detail.contains("Unsupported value") || detail.contains("unsupported_value");

    if unsupported_param && body.contains_key("max_tokens") && detail.contains("max_tokens") {
        body.remove("max_tokens");
        body.insert("max_completion_tokens".into(), json!(MAX_OUTPUT_TOKENS));
        true
    } else if unsupported_param
        && body.contains_key("max_completion_tokens")
        && detail.contains("max_completion_tokens")
    {
        body.remove("max_completion_tokens");
        body.insert("max_tokens".into(), json!(MAX_OUTPUT_TOKENS));
        true
    } else if unsupported_value && detail.contains("temperature") {
        body.remove("temperature").is_some()
    } else {
        false
    }
}

fn responses_text(reply: &Value) -> Option<String> {
    if let Some(text) = reply["output_text"].as_str().filter(|t| !t.is_empty()) {
        return Some(text.to_string());
    }
    reply["output"]
        .as_array()?
        .iter()
        .filter_map(|item| item["content"].as_array())
        .flatten()
        .find_map(|content| content["text"].as_str().filter(|t| !t.is_empty()))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn settings(endpoint: Option<String>, deployment: &str, api_version: &str) -> LlmSettings {
        LlmSettings {
            endpoint,
            key: Some("secret".into()),
            api_version: api_version.into(),
            deployment: deployment.into(),
        }
    }

    #[actix_web::test]
    async fn unconfigured_client_refuses() {
        let client = AzureOpenAiClient::new(LlmSettings::default(), Duration::from_secs(1)).unwrap();
        let err = client.complete("hi", None).await.unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured));
    }

    #[actix_web::test]
    async fn new_deployments_use_responses_api() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/openai/responses")
            .match_query(Matcher::UrlEncoded("api-version".into(), "2025-04-01-preview".into()))
            .match_header("api-key", "secret")
            .match_body(Matcher::PartialJson(json!({"model": "gpt-5-mini", "max_output_tokens": 200})))
            .with_body(r#"{"output":[{"content":[{"type":"output_text","text":"hello"}]}]}"#)
            .create_async()
            .await;

        let client = AzureOpenAiClient::new(
            settings(Some(server.url()), "gpt-5-mini", "2025-04-01-preview"),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.complete("hi", None).await.unwrap(), "hello");
        mock.assert_async().await;
    }

    #[actix_web::test]
    async fn unsupported_max_tokens_is_swapped_once() {
        let mut server = mockito::Server::new_async().await;
        let path = "/openai/deployments/gpt-4o-mini/chat/completions";
        let rejected = server
            .mock("POST", path)
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({"max_tokens": 200})))
            .with_status(400)
            .with_body(r#"{"error":{"message":"Unsupported parameter: 'max_tokens' is not supported with this model."}}"#)
            .expect(1)
            .create_async()
            .await;
        let accepted = server
            .mock("POST", path)
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({"max_completion_tokens": 200})))
            .with_body(r#"{"choices":[{"message":{"content":"{\"intent\":\"smalltalk\"}"}}]}"#)
            .expect(1)
            .create_async()
            .await;

        let client = AzureOpenAiClient::new(
            settings(Some(server.url()), "gpt-4o-mini", "2024-06-01"),
            Duration::from_secs(5),
        )
        .unwrap();
        let reply = client.complete("hi", None).await.unwrap();

        assert_eq!(reply, r#"{"intent":"smalltalk"}"#);
        rejected.assert_async().await;
        accepted.assert_async().await;
    }

    #[test]
    fn override_needs_endpoint_and_key() {
        let client = AzureOpenAiClient::new(
            settings(Some("https://default".into()), "gpt-4o-mini", "2024-06-01"),
            Duration::from_secs(1),
        )
        .unwrap();

        let partial = LlmOverride {
            endpoint: Some("https://other".into()),
            ..Default::default()
        };
        assert_eq!(client.effective(Some(&partial)).endpoint.as_deref(), Some("https://default"));

        let full = LlmOverride {
            endpoint: Some("https://other".into()),
            key: Some("k2".into()),
            ..Default::default()
        };
        let s = client.effective(Some(&full));
        assert_eq!(s.endpoint.as_deref(), Some("https://other"));
        assert_eq!(s.deployment, "gpt-4o-mini");
    }

    #[test]
    fn temperature_is_dropped_on_unsupported_value() {
        let mut body = Map::new();
        body.insert("temperature".into(), json!(0.2));
        assert!(adjust_parameters(&mut body, "Unsupported value: 'temperature' does not support 0.2"));
        assert!(!body.contains_key("temperature"));
        assert!(!adjust_parameters(&mut body, "Rate limit exceeded"));
    }
}
