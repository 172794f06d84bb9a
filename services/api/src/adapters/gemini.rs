//! services/api/src/adapters/gemini.rs
//!
//! This module contains the adapter for the Gemini generative-AI service.
//! It implements the `ContractExtractionService` port from the `core` crate:
//! one streaming `generateContent` call per document, every text chunk
//! accumulated into a single buffer, then parsed as the fixed five-field
//! JSON record.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use async_trait::async_trait;
use contract_analysis_core::domain::ContractAnalysis;
use contract_analysis_core::ports::{
    ContractDocument, ContractExtractionService, PortError, PortResult,
};
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Base URL for the Gemini API.
const API_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const USER_INSTRUCTION: &str =
    "Analyze this contract and extract the requested information.";

const SYSTEM_INSTRUCTION: &str = r#"Analyze the provided contract and return ONLY a valid JSON object with the following information:

{
    "parties": "Names of the parties involved in the contract",
    "monetary_values": "Monetary values mentioned",
    "main_obligations": "Main obligations of each party",
    "additional_data": "Subject matter of the contract, term, and other important data",
    "termination_clause": "Conditions for terminating the contract"
}

Return only the JSON, with no additional text."#;

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    system_instruction: Content,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    fn inline_pdf(bytes: &[u8]) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: "application/pdf".to_string(),
                data: BASE64.encode(bytes),
            }),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
}

/// One SSE event's payload from the streaming endpoint. Only the text parts
/// matter here; everything else in the chunk is ignored.
#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<StreamCandidate>,
}

#[derive(Deserialize)]
struct StreamCandidate {
    #[serde(default)]
    content: Option<StreamContent>,
}

#[derive(Deserialize)]
struct StreamContent {
    #[serde(default)]
    parts: Vec<StreamPart>,
}

#[derive(Deserialize)]
struct StreamPart {
    #[serde(default)]
    text: Option<String>,
}

/// The five-field record the model is instructed to return. Every key is
/// required at the wire level: a response missing any of them is a schema
/// mismatch, not a partially filled analysis. The domain record keeps the
/// fields optional.
#[derive(Deserialize)]
struct AnalysisPayload {
    parties: String,
    monetary_values: String,
    main_obligations: String,
    additional_data: String,
    termination_clause: String,
}

impl AnalysisPayload {
    fn to_domain(self) -> ContractAnalysis {
        ContractAnalysis {
            parties: Some(self.parties),
            monetary_values: Some(self.monetary_values),
            main_obligations: Some(self.main_obligations),
            additional_data: Some(self.additional_data),
            termination_clause: Some(self.termination_clause),
        }
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ContractExtractionService` against the Gemini API.
#[derive(Clone)]
pub struct GeminiExtractor {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiExtractor {
    /// Creates a new `GeminiExtractor`. A `None` API key is allowed; every
    /// extraction attempt then fails with `ProviderUnconfigured`.
    pub fn new(api_key: Option<String>, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: API_BASE_URL.to_string(),
        }
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    fn build_request(&self, document: ContractDocument) -> GenerateContentRequest {
        let parts = match document {
            ContractDocument::Pdf(bytes) => {
                vec![Part::inline_pdf(&bytes), Part::text(USER_INSTRUCTION)]
            }
            ContractDocument::Text(text) => {
                vec![Part::text(format!("{}\n\n{}", USER_INSTRUCTION, text))]
            }
        };

        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            system_instruction: Content {
                role: None,
                parts: vec![Part::text(SYSTEM_INSTRUCTION)],
            },
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        }
    }

    /// Runs the streaming call and accumulates every text chunk into one buffer.
    async fn collect_response_text(&self, request: &GenerateContentRequest) -> PortResult<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(PortError::ProviderUnconfigured)?;

        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent",
            self.base_url, self.model
        );

        let response = self
            .client
            .post(&url)
            .query(&[("alt", "sse")])
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| PortError::Provider(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        debug!(status = %status, model = %self.model, "streaming response received");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PortError::Provider(format!(
                "API returned {}: {}",
                status, body
            )));
        }

        let mut events = response.bytes_stream().eventsource();
        let mut buffer = String::new();
        while let Some(event) = events.next().await {
            let event =
                event.map_err(|e| PortError::Provider(format!("SSE stream error: {}", e)))?;
            let chunk: StreamChunk = serde_json::from_str(&event.data)
                .map_err(|e| PortError::Provider(format!("failed to parse stream chunk: {}", e)))?;
            for candidate in chunk.candidates {
                if let Some(content) = candidate.content {
                    for part in content.parts {
                        if let Some(text) = part.text {
                            buffer.push_str(&text);
                        }
                    }
                }
            }
        }

        Ok(buffer)
    }
}

//=========================================================================================
// `ContractExtractionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContractExtractionService for GeminiExtractor {
    async fn extract_contract_data(
        &self,
        document: ContractDocument,
    ) -> PortResult<ContractAnalysis> {
        let request = self.build_request(document);
        let raw = self.collect_response_text(&request).await?;

        let payload: AnalysisPayload = serde_json::from_str(raw.trim())
            .map_err(|e| PortError::MalformedResponse(e.to_string()))?;
        Ok(payload.to_domain())
    }
}
