//! Gemini API client
//!
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::error::EngineError;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

// Approximate USD per token for flash models.
const INPUT_PRICE_USD: f64 = 0.000_000_35;
const OUTPUT_PRICE_USD: f64 = 0.000_001_05;

/// Model answer plus a heuristic confidence.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub confidence: f32,
}

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: BASE_URL.to_string(),
        })
    }

    /// Point at another endpoint (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Generate a response for `prompt` under `system`.
    ///
    /// `stage` only labels the usage log line.
    pub async fn generate(
        &self,
        stage: &str,
        system: &str,
        prompt: &str,
        temperature: f32,
    ) -> crate::Result<Generation> {
        if self.api_key.is_empty() {
            return Err(EngineError::LlmError(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!(
            "{}/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 1024,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: system.to_string(),
                }],
            },
        };

        info!(stage, model = %self.model, "Calling Gemini API");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                EngineError::ServiceUnavailable(format!("Gemini API error: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Gemini API error response: {}", error_text);
            return Err(status_error(status, &error_text));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            EngineError::LlmError(format!("Gemini parse error: {}", e))
        })?;

        let answer = gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| EngineError::LlmError("Empty response from Gemini".to_string()))?;

        let confidence = calculate_confidence(&gemini_response);
        log_usage(stage, &self.model, prompt, &answer, gemini_response.usage_metadata.as_ref());

        Ok(Generation {
            text: answer,
            confidence,
        })
    }
}

fn status_error(status: StatusCode, body: &str) -> EngineError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        EngineError::RateLimited(format!("Gemini API 429: {}", body))
    } else if status.is_server_error() {
        EngineError::ServiceUnavailable(format!("Gemini API {}: {}", status.as_u16(), body))
    } else {
        EngineError::LlmError(format!("Gemini API {}: {}", status.as_u16(), body))
    }
}

fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

fn estimated_cost_usd(tokens_in: u64, tokens_out: u64) -> f64 {
    tokens_in as f64 * INPUT_PRICE_USD + tokens_out as f64 * OUTPUT_PRICE_USD
}

/// Token usage per call. Reported counts win over the character estimate.
fn log_usage(stage: &str, model: &str, prompt: &str, answer: &str, usage: Option<&UsageMetadata>) {
    let tokens_in = usage
        .and_then(|u| u.prompt_token_count)
        .unwrap_or_else(|| estimate_tokens(prompt));
    let tokens_out = usage
        .and_then(|u| u.candidates_token_count)
        .unwrap_or_else(|| estimate_tokens(answer));

    info!(
        stage,
        model,
        prompt_chars = prompt.len(),
        answer_chars = answer.len(),
        tokens_in,
        tokens_out,
        cost_usd = estimated_cost_usd(tokens_in, tokens_out),
        "Gemini usage"
    );
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Content,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
}

/// Calculate response confidence
fn calculate_confidence(response: &GeminiResponse) -> f32 {
    let base_confidence: f32 = 0.85;

    let Some(candidate) = response.candidates.first() else {
        return 0.5;
    };

    let finish_confidence = match candidate.finish_reason.as_deref() {
        Some("STOP") => 1.0,
        Some("MAX_TOKENS") => 0.8,
        Some("SAFETY") => 0.6,
        _ => 0.7,
    };

    let response_length = candidate
        .content
        .parts
        .first()
        .map(|p| p.text.len())
        .unwrap_or(0);

    // Extraction answers are short JSON, so only empty ones are suspicious.
    let length_confidence = if response_length < 2 {
        0.6
    } else if response_length > 4000 {
        0.8
    } else {
        1.0
    };

    (base_confidence * finish_confidence * length_confidence).clamp(0.5, 0.98)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: "gastei 50 no mercado".to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.1,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 1024,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: "Responda somente com JSON".to_string(),
                }],
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "gastei 50 no mercado");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 1024);
        assert!(json.get("systemInstruction").is_some());
    }

    #[test]
    fn test_response_parsing_and_confidence() {
        let raw = r#"{
            "candidates": [{"content": {"parts": [{"text": "{\"domain\":\"finance\"}"}]}, "finishReason": "STOP"}],
            "usageMetadata": {"promptTokenCount": 120, "candidatesTokenCount": 8}
        }"#;
        let response: GeminiResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.candidates.len(), 1);
        assert_eq!(
            response.usage_metadata.as_ref().and_then(|u| u.prompt_token_count),
            Some(120)
        );
        let confidence = calculate_confidence(&response);
        assert!((confidence - 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_status_mapping() {
        use crate::error::FailureKind;
        assert_eq!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "quota").failure_kind(),
            FailureKind::RateLimited
        );
        assert_eq!(
            status_error(StatusCode::SERVICE_UNAVAILABLE, "").failure_kind(),
            FailureKind::ServiceUnavailable
        );
    }

    #[test]
    fn test_cost_estimate() {
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens("abc"), 1);
        assert!(estimated_cost_usd(1_000_000, 0) > 0.34);
    }

    #[tokio::test]
    async fn test_missing_key_is_an_llm_error() {
        let client = GeminiClient::new("", "gemini-2.0-flash").unwrap();
        let err = client.generate("classifier", "sys", "oi", 0.0).await.unwrap_err();
        assert!(matches!(err, EngineError::LlmError(_)));
    }
}
