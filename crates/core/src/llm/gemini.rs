use crate::config::Settings;
use crate::domain::market::SourceCitation;
use crate::llm::error::LlmError;
use crate::llm::models::{supports_search, ModelCatalog, ModelDescriptor};
use crate::llm::{Credentials, Generation, GenerationClient};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 120;
const TEMPERATURE: f64 = 0.1;
const MAX_OUTPUT_TOKENS: u32 = 8192;
const CATALOG_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
}

impl GeminiClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let timeout_secs = settings.gemini_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        Self::new(&settings.gemini_base_url, Duration::from_secs(timeout_secs))
    }

    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn generate_url(&self, model: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.base_url)
    }

    /// Sends the request and returns the body of a successful response.
    async fn send(&self, req: reqwest::RequestBuilder) -> Result<String, LlmError> {
        let res = req.send().await.map_err(|err| {
            tracing::error!(error = %err, "Gemini request failed");
            LlmError::Network(transport_message(&err))
        })?;

        let status = res.status();
        let text = res.text().await.map_err(|err| {
            tracing::error!(error = %err, %status, "failed to read Gemini response body");
            LlmError::Network(transport_message(&err))
        })?;

        if !status.is_success() {
            let err = remote_error(status.as_u16(), &text);
            tracing::error!(%status, error = %err, "Gemini returned an error status");
            return Err(err);
        }

        Ok(text)
    }

    fn request_body(prompt: &str, use_search: bool) -> GenerateContentRequest<'_> {
        GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
            tools: use_search.then(|| {
                vec![Tool {
                    google_search: GoogleSearch {},
                }]
            }),
        }
    }
}

#[async_trait::async_trait]
impl GenerationClient for GeminiClient {
    async fn generate(
        &self,
        credentials: &Credentials,
        prompt: &str,
        allow_search_grounding: bool,
    ) -> Result<Generation, LlmError> {
        if !credentials.has_api_key() {
            return Err(LlmError::Auth);
        }

        let model = credentials.model().to_string();
        let grounding_used = allow_search_grounding && supports_search(&model);
        if allow_search_grounding && !grounding_used {
            tracing::info!(%model, "model is not search-capable; sending without grounding");
        }

        let req = self
            .http
            .post(self.generate_url(&model))
            .query(&[("key", credentials.api_key.trim())])
            .json(&Self::request_body(prompt, grounding_used));

        let t0 = std::time::Instant::now();
        let text = self.send(req).await?;
        let parsed = serde_json::from_str::<GenerateContentResponse>(&text).map_err(|err| {
            tracing::error!(error = %err, "Gemini response is not the expected JSON");
            LlmError::Remote {
                status: 200,
                message: "APIの応答を読み取れませんでした。".to_string(),
            }
        })?;

        let generation = Generation {
            text: parsed.first_text(),
            citations: parsed.citations(),
            model_used: model,
            grounding_used,
        };

        tracing::info!(
            model = %generation.model_used,
            grounding = generation.grounding_used,
            text_len = generation.text.len(),
            citations = generation.citations.len(),
            elapsed_ms = t0.elapsed().as_millis(),
            "Gemini generation finished"
        );

        Ok(generation)
    }

    async fn list_models(&self, api_key: &str) -> Result<Vec<ModelDescriptor>, LlmError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(LlmError::Auth);
        }

        let req = self
            .http
            .get(self.models_url())
            .query(&[("key", api_key.to_string()), ("pageSize", CATALOG_PAGE_SIZE.to_string())]);

        let text = self.send(req).await?;
        let catalog = serde_json::from_str::<ModelCatalog>(&text).map_err(|err| {
            tracing::error!(error = %err, "model catalog is not the expected JSON");
            LlmError::Remote {
                status: 200,
                message: "モデル一覧を読み取れませんでした。".to_string(),
            }
        })?;

        let models = catalog.into_descriptors();
        tracing::info!(count = models.len(), "fetched Gemini model catalog");
        Ok(models)
    }
}

fn transport_message(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "タイムアウトしました".to_string()
    } else if err.is_connect() {
        "接続できませんでした".to_string()
    } else {
        err.to_string()
    }
}

/// Prefers `error.message` from the service body, else a generic status line.
fn remote_error(status: u16, body: &str) -> LlmError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error)
        .and_then(|e| e.message)
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());

    match message {
        Some(message) => LlmError::Remote { status, message },
        None => LlmError::remote_generic(status),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
}

#[derive(Debug, Clone, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Clone, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Debug, Clone, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Clone, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    fn first_text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .and_then(|p| p.text.clone())
            .unwrap_or_default()
    }

    fn citations(&self) -> Vec<SourceCitation> {
        let Some(meta) = self
            .candidates
            .first()
            .and_then(|c| c.grounding_metadata.as_ref())
        else {
            return Vec::new();
        };

        meta.grounding_chunks
            .iter()
            .filter_map(|chunk| chunk.web.as_ref())
            .filter_map(|web| {
                let url = web.uri.as_deref().map(str::trim).unwrap_or_default();
                if url.is_empty() {
                    return None;
                }
                Some(SourceCitation {
                    title: web.title.clone().unwrap_or_default(),
                    url: url.to_string(),
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebChunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct WebChunk {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    uri: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_body_matches_wire_format() {
        let body = serde_json::to_value(GeminiClient::request_body("hello", false)).unwrap();
        assert_eq!(
            body,
            json!({
                "contents": [{"parts": [{"text": "hello"}]}],
                "generationConfig": {"temperature": 0.1, "maxOutputTokens": 8192}
            })
        );
    }

    #[test]
    fn request_body_attaches_google_search_tool() {
        let body = serde_json::to_value(GeminiClient::request_body("hello", true)).unwrap();
        assert_eq!(body["tools"], json!([{"google_search": {}}]));
    }

    #[test]
    fn extracts_text_and_non_empty_citations() {
        let res: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"parts": [{"text": "{\"a\":1}"}, {"text": "ignored"}]},
                "groundingMetadata": {"groundingChunks": [
                    {"web": {"title": "kabutan.jp", "uri": "https://kabutan.jp/x"}},
                    {"web": {"title": "no uri"}},
                    {"web": {"title": "blank", "uri": "  "}},
                    {}
                ]}
            }]
        }))
        .unwrap();

        assert_eq!(res.first_text(), "{\"a\":1}");
        let citations = res.citations();
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].url, "https://kabutan.jp/x");
    }

    #[test]
    fn missing_text_defaults_to_empty() {
        let res: GenerateContentResponse =
            serde_json::from_value(json!({"candidates": [{"finishReason": "SAFETY"}]})).unwrap();
        assert_eq!(res.first_text(), "");
        assert!(res.citations().is_empty());

        let empty: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.first_text(), "");
    }

    #[test]
    fn remote_error_prefers_service_message() {
        let err = remote_error(400, r#"{"error": {"code": 400, "message": "API key not valid."}}"#);
        assert_eq!(
            err,
            LlmError::Remote {
                status: 400,
                message: "API key not valid.".to_string()
            }
        );
        assert_eq!(remote_error(502, "<html>bad gateway</html>"), LlmError::remote_generic(502));
    }

    #[test]
    fn generate_url_strips_namespace() {
        let client = GeminiClient::new("https://example.test/v1beta/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.generate_url("models/gemini-2.0-flash"),
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn generate_without_key_fails_before_network() {
        // Port 9 (discard) on localhost; never reached.
        let client = GeminiClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let err = client
            .generate(&Credentials::default(), "prompt", true)
            .await
            .unwrap_err();
        assert_eq!(err, LlmError::Auth);

        let err = client.list_models("  ").await.unwrap_err();
        assert_eq!(err, LlmError::Auth);
    }
}
