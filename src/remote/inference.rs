/// Language-model client for OpenAI-compatible chat completion endpoints
///
/// Timeouts, non-2xx responses (including quota and rate limits) and
/// malformed bodies all become `Error::Inference`.
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

/// A chat model answering one system + user prompt pair
pub trait ChatModel {
    /// Model identifier; part of every cache key built on this model
    fn model(&self) -> &str;

    fn complete(&self, system: &str, user: &str) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Blocking client for `POST {base_url}/chat/completions`
pub struct OpenAiChatClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f64,
}

impl OpenAiChatClient {
    /// Build a client from explicit configuration
    ///
    /// The API key is read once, from the variable named by `api_key_env`.
    pub fn new(config: &LlmConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout()?).build()?;

        Ok(Self {
            client,
            endpoint: completions_endpoint(&config.base_url),
            model: config.model.clone(),
            api_key: config.api_key(),
            temperature: config.temperature,
        })
    }
}

impl ChatModel for OpenAiChatClient {
    fn model(&self) -> &str {
        &self.model
    }

    fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
        };

        debug!(endpoint = %self.endpoint, model = %self.model, "chat completion request");

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().map_err(|e| {
            if e.is_timeout() {
                Error::Inference(format!("request timed out: {}", e))
            } else {
                Error::Inference(format!("request failed: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => {
                    Error::Inference(format!("rate limited or out of quota: {}", snippet))
                }
                _ => Error::Inference(format!("HTTP {}: {}", status, snippet)),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| Error::Inference(format!("malformed response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::Inference("response contained no message".to_string()))
    }
}

fn completions_endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// Decode a JSON object from a model reply
///
/// Tolerates Markdown code fences and prose around the object.
pub fn parse_json_reply<T: DeserializeOwned>(reply: &str) -> Result<T> {
    let start = reply.find('{');
    let end = reply.rfind('}');

    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => {
            return Err(Error::Inference(format!(
                "reply is not a JSON object: {}",
                reply.chars().take(200).collect::<String>()
            )))
        }
    };

    serde_json::from_str(json)
        .map_err(|e| Error::Inference(format!("reply does not match schema: {}", e)))
}
