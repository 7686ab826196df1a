use crate::{config::AppConfig, models::DesignScheme};
use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use serde::Deserialize;
use reqwest::Client;
use tracing::{info, error};

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("HTTP error: {0}")] Http(String),
    #[error("API error: status={status} body={body}")] Api { status: u16, body: String },
    #[error("no text content in response")] EmptyResponse,
    #[error("parse error: {0}")] Parse(String),
    #[error("invalid scheme: {0}")] Validation(String),
}

pub const SYSTEM_INSTRUCTION: &str = r#"You are the dedicated AI design assistant of "3D Phantasm".
Goal: turn the customer's requirement into a model design scheme that can be 3D printed directly.

Hard constraints:
1. Every model must suit FDM printing.
2. Nozzle diameter 0.4mm, layer height 0.2mm.
3. Minimise supports; keep overhang angles at or below 45 degrees.
4. The output must be clearly structured.

Always answer with this JSON structure:
{
  "style": "description of the model style",
  "dimensions": "recommended dimensions",
  "friendlyDesign": "print-friendly design notes (reducing supports, optimising the base, etc.)",
  "modelingKeys": "modeling key points (chamfers, wall thickness, tolerances with concrete values)",
  "printParams": "recommended print parameters (temperature, infill, speed), one per line",
  "failureRisks": "failure risk warnings, one per line"
}"#;

/// Wraps the raw user text the way every request phrases it.
pub fn build_user_prompt(user_text: &str) -> String {
    format!("Customer requirement: {user_text}")
}

/// Schema handed to the model: an object of six required strings.
pub fn response_schema() -> Value {
    let properties: serde_json::Map<String, Value> = DesignScheme::FIELDS
        .iter()
        .map(|f| (f.to_string(), json!({ "type": "STRING" })))
        .collect();
    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": DesignScheme::FIELDS,
    })
}

pub fn build_request_body(user_text: &str) -> Value {
    json!({
        "systemInstruction": {
            "parts": [{ "text": SYSTEM_INSTRUCTION }]
        },
        "contents": [{
            "role": "user",
            "parts": [{ "text": build_user_prompt(user_text) }]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": response_schema()
        }
    })
}

/// Turns the model's reply text into a scheme. Extra fields are ignored; a missing or non-string
/// required field, or a top level that is not an object, is a validation failure.
pub fn parse_scheme(text: &str) -> Result<DesignScheme, GeminiError> {
    let value: Value = serde_json::from_str(text.trim())
        .map_err(|e| GeminiError::Parse(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| GeminiError::Validation("top-level value is not an object".into()))?;
    for field in DesignScheme::FIELDS {
        match object.get(field) {
            Some(Value::String(_)) => {}
            Some(_) => return Err(GeminiError::Validation(format!("field `{field}` is not a string"))),
            None => return Err(GeminiError::Validation(format!("missing field `{field}`"))),
        }
    }
    serde_json::from_value(value).map_err(|e| GeminiError::Validation(e.to_string()))
}

/// Anything that can turn a product description into a scheme.
#[async_trait]
pub trait SchemeGenerator: Send + Sync {
    async fn generate(&self, user_text: &str) -> Result<DesignScheme, GeminiError>;
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.api_key.clone(), config.api_base.clone(), config.model.clone())
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    async fn perform_api_call(&self, user_text: &str) -> Result<String, GeminiError> {
        let url = self.endpoint();
        info!("🔗 Making request to: {} (model {})", url, self.model);

        let response = self.client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&build_request_body(user_text))
            .send()
            .await
            .map_err(|e| GeminiError::Http(redact(&e.to_string(), &self.api_key)))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        let response_text = response.text().await
            .map_err(|e| GeminiError::Http(redact(&e.to_string(), &self.api_key)))?;

        if !status.is_success() {
            error!("❌ API Error response: {}", response_text);
            return Err(GeminiError::Api { status: status.as_u16(), body: response_text });
        }

        let parsed: GeminiResponse = serde_json::from_str(&response_text)
            .map_err(|e| GeminiError::Parse(format!("envelope: {e}")))?;

        extract_text(&parsed).ok_or(GeminiError::EmptyResponse)
    }
}

#[async_trait]
impl SchemeGenerator for GeminiClient {
    async fn generate(&self, user_text: &str) -> Result<DesignScheme, GeminiError> {
        info!("🎯 Generating design scheme ({} chars of input)", user_text.chars().count());
        let text = self.perform_api_call(user_text).await?;
        let scheme = parse_scheme(&text)?;
        info!("✅ Design scheme generated: style={:?}", scheme.style);
        Ok(scheme)
    }
}

fn redact(message: &str, api_key: &str) -> String {
    if api_key.is_empty() { message.to_string() } else { message.replace(api_key, "***") }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate { #[serde(default)] content: Content }

#[derive(Debug, Deserialize, Default)]
struct Content { #[serde(default)] parts: Vec<Part> }

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Other(Value),
}

/// Joins the text parts of the first candidate.
fn extract_text(resp: &GeminiResponse) -> Option<String> {
    let candidate = resp.candidates.first()?;
    let text: String = candidate.content.parts.iter()
        .filter_map(|p| match p {
            Part::Text { text } => Some(text.as_str()),
            Part::Other(_) => None,
        })
        .collect();
    if text.trim().is_empty() { None } else { Some(text) }
}
