// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Gemini `generateContent` endpoint.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{debug, warn};

use mensageiro_core::{MensageiroError, SAFETY_MARKER};

use crate::types::{ApiErrorResponse, GenerateContentRequest, GenerateContentResponse};

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    model: String,
    base_url: String,
    max_retries: u32,
}

impl GeminiClient {
    pub fn new(
        api_key: &str,
        model: String,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, MensageiroError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(api_key).map_err(|e| {
                MensageiroError::Config(format!("invalid Gemini API key header value: {e}"))
            })?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| MensageiroError::AiBackend {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: 1,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    /// Sends the request and returns the concatenated answer text.
    ///
    /// 429/500/503 are retried once after a second. Safety blocks reported by
    /// the API become [`MensageiroError::SafetyBlocked`].
    pub async fn generate(&self, request: &GenerateContentRequest) -> Result<String, MensageiroError> {
        let url = self.endpoint();
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying Gemini request after transient error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            let response = self
                .client
                .post(&url)
                .json(request)
                .send()
                .await
                .map_err(|e| MensageiroError::AiBackend {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(%status, attempt, model = %self.model, "Gemini response received");

            if status.is_success() {
                let body: GenerateContentResponse =
                    response.json().await.map_err(|e| MensageiroError::AiBackend {
                        message: format!("failed to parse Gemini response: {e}"),
                        source: Some(Box::new(e)),
                    })?;
                return extract_text(body);
            }

            let body = response.text().await.unwrap_or_default();
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(%status, "transient Gemini error, will retry");
                last_error = Some(format!("API returned {status}: {body}"));
                continue;
            }

            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api) => format!(
                    "Gemini API error {} ({}): {}",
                    api.error.code, api.error.status, api.error.message
                ),
                Err(_) => format!("API returned {status}: {body}"),
            };
            return Err(MensageiroError::from_backend_message(message));
        }

        Err(MensageiroError::from_backend_message(last_error.unwrap_or_else(
            || "Gemini request failed after retries".to_string(),
        )))
    }
}

fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503)
}

/// Pulls the answer out of a successful response, detecting safety blocks.
pub(crate) fn extract_text(response: GenerateContentResponse) -> Result<String, MensageiroError> {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        return Err(MensageiroError::SafetyBlocked {
            message: format!("prompt blocked ({reason}) [{SAFETY_MARKER}]"),
        });
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(MensageiroError::from_backend_message(
            "Gemini returned no candidates",
        ));
    };

    if candidate.finish_reason.as_deref() == Some(SAFETY_MARKER) {
        return Err(MensageiroError::SafetyBlocked {
            message: format!("finishReason={SAFETY_MARKER}"),
        });
    }

    let text = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(MensageiroError::from_backend_message(format!(
            "Gemini returned an empty answer (finishReason={})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }
    Ok(text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Content, Part};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: &str) -> GeminiClient {
        GeminiClient::new(
            "test-key",
            "gemini-2.0-flash".into(),
            base_url.to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn request() -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content::user(vec![Part::text("Olá")])],
            system_instruction: None,
        }
    }

    #[tokio::test]
    async fn returns_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "Tudo "}, {"text": "bem!"}]},
                    "finishReason": "STOP"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = client(&server.uri()).generate(&request()).await.unwrap();
        assert_eq!(text, "Tudo bem!");
    }

    #[tokio::test]
    async fn prompt_block_is_safety_blocked() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "promptFeedback": {"blockReason": "SAFETY"}
            })))
            .mount(&server)
            .await;

        let err = client(&server.uri()).generate(&request()).await.unwrap_err();
        assert!(err.is_safety_blocked());
        // The rendered error still carries the marker once it crosses a queue.
        assert!(MensageiroError::from_backend_message(err.to_string()).is_safety_blocked());
    }

    #[tokio::test]
    async fn safety_finish_reason_is_safety_blocked() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"finishReason": "SAFETY"}]
            })))
            .mount(&server)
            .await;

        let err = client(&server.uri()).generate(&request()).await.unwrap_err();
        assert!(err.is_safety_blocked());
    }

    #[tokio::test]
    async fn api_error_is_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server.uri()).generate(&request()).await.unwrap_err();
        assert!(matches!(err, MensageiroError::AiBackend { .. }));
        assert!(err.to_string().contains("API key not valid"));
    }

    #[tokio::test]
    async fn transient_error_is_retried_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(2)
            .mount(&server)
            .await;

        let err = client(&server.uri()).generate(&request()).await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }
}
