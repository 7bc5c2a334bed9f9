use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::validate::schema_description;
use crate::cli::ModelArgs;
use crate::error::ExtractError;
use crate::model::ListingChunk;

const SYSTEM_PROMPT: &str = "You are an expert parser of congressional job listings that produces structured JSON. \
Include every field of the provided schema in your output. Post_ID is the MEM-XXX-XX identifier. \
Split the position title into Job_Function (for example Legislative, Communications) and Title_Parsed \
(for example Legislative Director, Press Secretary). Use the filename to determine Date_Posted and write \
dates as YYYY-MM-DD. Represent responsibilities, qualifications and skills as JSON arrays of strings. \
If, after double-checking, a value for an optional field cannot be found, you must explicitly use null.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content,
        }
    }
}

/// Anything that turns a chat transcript into the model's text reply.
pub trait CompletionBackend {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String, ExtractError>;
}

/// Sends one chunk to the model and returns the parsed JSON it produced.
pub fn extract(
    backend: &dyn CompletionBackend,
    chunk: &ListingChunk,
    source_filename: &str,
) -> Result<Value, ExtractError> {
    let messages = build_messages(chunk, source_filename);
    let content = backend.complete(&messages)?;
    parse_model_content(&content)
}

pub fn build_messages(chunk: &ListingChunk, source_filename: &str) -> Vec<ChatMessage> {
    let user_prompt = format!(
        "Parse the following job listing text into a JSON array of objects, where each object strictly \
conforms to the Job Schema. Ensure every field is present, using null for any missing optional values.\n\n\
Job Schema: {}\n\n\
Text to parse from file '{}':\n---\n{}\n---\n",
        schema_description(),
        source_filename,
        chunk.text
    );

    vec![
        ChatMessage::new("system", SYSTEM_PROMPT.to_string()),
        ChatMessage::new("user", user_prompt),
    ]
}

/// Parses the model's text reply, unwrapping a Markdown code fence if the
/// model added one.
pub fn parse_model_content(content: &str) -> Result<Value, ExtractError> {
    static FENCE_RE: OnceLock<Regex> = OnceLock::new();
    let fence_re = FENCE_RE.get_or_init(|| {
        Regex::new(r"(?s)^\s*```[A-Za-z]*\s*(.*?)\s*```\s*$").expect("valid fence regex")
    });

    let body = fence_re
        .captures(content)
        .and_then(|captures| captures.get(1))
        .map(|inner| inner.as_str())
        .unwrap_or(content)
        .trim();

    if body.is_empty() {
        return Err(ExtractError::MalformedResponse(
            "model returned empty content".to_string(),
        ));
    }

    serde_json::from_str(body).map_err(|err| ExtractError::MalformedResponse(err.to_string()))
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    response_format: ResponseFormat,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` backend (Ollama, vLLM, hosted APIs).
pub struct ChatCompletionsBackend {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl ChatCompletionsBackend {
    pub fn new(args: &ModelArgs) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(args.request_timeout_secs))
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", args.base_url.trim_end_matches('/')),
            api_key: args.api_key.clone(),
            model: args.model.clone(),
            temperature: args.temperature,
        })
    }
}

impl CompletionBackend for ChatCompletionsBackend {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String, ExtractError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            response_format: ResponseFormat {
                kind: "json_object",
            },
            temperature: self.temperature,
            stream: false,
        };

        debug!(endpoint = %self.endpoint, model = %self.model, "sending completion request");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().map_err(transport_error)?;

        if !status.is_success() {
            return Err(ExtractError::Transport {
                message: format!("endpoint returned {}: {}", status, body.trim()),
                transient: is_transient_status(status),
            });
        }

        parse_completion_body(&body)
    }
}

pub fn parse_completion_body(body: &str) -> Result<String, ExtractError> {
    let response: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|err| ExtractError::MalformedResponse(format!("completion body: {err}")))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| {
            ExtractError::MalformedResponse("completion has no message content".to_string())
        })
}

pub fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

fn transport_error(err: reqwest::Error) -> ExtractError {
    let transient = if err.is_connect() || err.is_builder() {
        false
    } else {
        err.is_timeout() || err.is_request() || err.is_body()
    };

    ExtractError::Transport {
        message: err.to_string(),
        transient,
    }
}
