//! Gemini-backed travel advisor.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::GeminiConfig;
use crate::error::{Result, WayfarerError};

use super::report::TravelReport;
use super::TravelAdvisor;

/// Nucleus sampling cutoff sent with every request.
const TOP_P: f64 = 0.8;
/// Token candidate pool sent with every request.
const TOP_K: u32 = 40;

/// Travel advisor backed by the Gemini `generateContent` REST API.
pub struct GeminiAdvisor {
    config: GeminiConfig,
    api_key: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f64,
    #[serde(rename = "topP")]
    top_p: f64,
    #[serde(rename = "topK")]
    top_k: u32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl GeminiAdvisor {
    /// Create an advisor from configuration.
    ///
    /// The API key comes from the config or the `GEMINI_API_KEY` /
    /// `GOOGLE_API_KEY` environment variables; a missing key aborts startup
    /// rather than failing on the first query.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let api_key = config.resolved_api_key().ok_or_else(|| {
            WayfarerError::Config(
                "Gemini API key not configured; set gemini.api_key or the GEMINI_API_KEY \
                 environment variable"
                    .to_string(),
            )
        })?;

        Ok(Self {
            api_key,
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
            config,
        })
    }

    fn request_url(&self) -> String {
        let model = &self.config.model;
        let model_path = if model.starts_with("models/") {
            model.clone()
        } else {
            format!("models/{model}")
        };
        format!(
            "{}/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            model_path
        )
    }
}

#[async_trait]
impl TravelAdvisor for GeminiAdvisor {
    async fn advise(
        &self,
        query: &str,
        destination: &str,
        origin: Option<&str>,
    ) -> Result<TravelReport> {
        info!(
            destination,
            origin = origin.unwrap_or("any country"),
            "generating travel info"
        );

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: format_prompt(query, destination, origin),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                top_p: TOP_P,
                top_k: TOP_K,
                max_output_tokens: self.config.max_output_tokens,
            },
        };

        // The key rides in a header, never the URL: reqwest error messages
        // quote the URL, and advisor errors reach the response body.
        let response = self
            .client
            .post(self.request_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| WayfarerError::Advisor(format!("request to Gemini failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WayfarerError::Advisor(format!(
                "Gemini API error ({status}): {body}"
            )));
        }

        let result: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| WayfarerError::Advisor(format!("malformed Gemini response: {e}")))?;

        if let Some(error) = result.error {
            return Err(WayfarerError::Advisor(format!(
                "Gemini API error: {}",
                error.message
            )));
        }

        let text = result
            .candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| WayfarerError::Advisor("empty response from Gemini".to_string()))?;

        debug!(destination, "parsing model response");
        parse_report(&text)
    }
}

/// Build the instruction block sent as the user turn.
fn format_prompt(query: &str, destination: &str, origin: Option<&str>) -> String {
    let origin = origin.unwrap_or("any country");
    format!(
        r#"You are a travel advisor specializing in international travel requirements.
Please provide detailed information about travel requirements from {origin} to {destination}.

Query: {query}

Please provide the following information in JSON format:
1. Visa requirements
2. Required documents
3. Travel advisories
4. Estimated processing time
5. Embassy information

Format your response as a JSON object with these exact keys:
{{
    "destination": "{destination}",
    "origin": "{origin}",
    "visaRequirements": "detailed visa requirements",
    "documents": ["list", "of", "required", "documents"],
    "advisories": ["list", "of", "travel", "advisories"],
    "estimatedProcessingTime": "estimated processing time",
    "embassyInformation": "embassy contact information",
    "timestamp": "current timestamp"
}}"#
    )
}

/// Drop the Markdown fence models like to wrap JSON in.
fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let text = text.strip_prefix("```json").unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim()
}

/// Parse the model's answer into a validated report.
fn parse_report(text: &str) -> Result<TravelReport> {
    let cleaned = strip_code_fence(text);
    let mut report: TravelReport = serde_json::from_str(cleaned)
        .map_err(|e| WayfarerError::Advisor(format!("invalid JSON from model: {e}")))?;
    report.normalize_timestamp();
    Ok(report)
}
