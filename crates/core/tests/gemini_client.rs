use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use kabuscan_core::app::{Controller, Outcome};
use kabuscan_core::llm::error::LlmError;
use kabuscan_core::llm::gemini::GeminiClient;
use kabuscan_core::llm::{Credentials, GenerationClient};
use kabuscan_core::settings::SettingsStore;

#[derive(Clone)]
struct Fake {
    status: StatusCode,
    body: String,
    seen: Arc<Mutex<Vec<Seen>>>,
}

#[derive(Debug, Clone)]
struct Seen {
    action: String,
    query: HashMap<String, String>,
    body: Value,
}

impl Fake {
    fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

async fn generate(
    State(fake): State<Fake>,
    Path(action): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    fake.seen.lock().push(Seen {
        action,
        query,
        body,
    });
    (fake.status, fake.body.clone())
}

async fn models(
    State(fake): State<Fake>,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    fake.seen.lock().push(Seen {
        action: "list".to_string(),
        query,
        body: Value::Null,
    });
    (fake.status, fake.body.clone())
}

async fn spawn_fake_gemini(fake: Fake) -> String {
    let app = Router::new()
        .route("/v1beta/models", get(models))
        .route("/v1beta/models/:action", post(generate))
        .with_state(fake);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/v1beta")
}

fn client(base_url: &str) -> GeminiClient {
    GeminiClient::new(base_url, Duration::from_secs(5)).unwrap()
}

fn creds(model: &str) -> Credentials {
    Credentials {
        api_key: "secret".to_string(),
        selected_model: model.to_string(),
    }
}

fn generation_body(text: &str) -> String {
    json!({
        "candidates": [{
            "content": {"parts": [{"text": text}]},
            "groundingMetadata": {"groundingChunks": [
                {"web": {"title": "株探", "uri": "https://kabutan.jp/news"}},
                {"web": {"title": "empty", "uri": ""}},
                {"web": {"title": "minkabu", "uri": "https://minkabu.jp"}}
            ]}
        }]
    })
    .to_string()
}

#[tokio::test]
async fn catalog_is_filtered_and_sorted_newest_first() {
    let fake = Fake::new(
        StatusCode::OK,
        json!({"models": [
            {"name": "models/gemini-1.5-flash", "displayName": "Gemini 1.5 Flash",
             "supportedGenerationMethods": ["generateContent", "countTokens"]},
            {"name": "models/text-embedding-004", "displayName": "Embedding",
             "supportedGenerationMethods": ["embedContent"]},
            {"name": "models/gemini-2.5-pro",
             "supportedGenerationMethods": ["generateContent"]},
            {"name": "models/gemma-3-27b-it", "displayName": "Gemma 3 27B",
             "supportedGenerationMethods": ["generateContent"]}
        ]})
        .to_string(),
    );
    let seen = fake.seen.clone();
    let base = spawn_fake_gemini(fake).await;

    let models = client(&base).list_models(" secret ").await.unwrap();
    let ids: Vec<_> = models.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["gemma-3-27b-it", "gemini-2.5-pro", "gemini-1.5-flash"]);
    assert_eq!(models[1].display_name, "gemini-2.5-pro");
    assert!(!models[0].supports_search);
    assert!(models[1].supports_search);

    let seen = seen.lock();
    assert_eq!(seen[0].query.get("key").map(String::as_str), Some("secret"));
    assert_eq!(seen[0].query.get("pageSize").map(String::as_str), Some("100"));
}

#[tokio::test]
async fn search_capable_model_sends_grounding_tool_and_returns_citations() {
    let fake = Fake::new(StatusCode::OK, generation_body("{\"ok\": true}"));
    let seen = fake.seen.clone();
    let base = spawn_fake_gemini(fake).await;

    let generation = client(&base)
        .generate(&creds("gemini-2.0-flash"), "プロンプト", true)
        .await
        .unwrap();

    assert_eq!(generation.text, "{\"ok\": true}");
    assert!(generation.grounding_used);
    assert_eq!(generation.model_used, "gemini-2.0-flash");
    let urls: Vec<_> = generation.citations.iter().map(|c| c.url.as_str()).collect();
    assert_eq!(urls, ["https://kabutan.jp/news", "https://minkabu.jp"]);

    let seen = seen.lock();
    assert_eq!(seen[0].action, "gemini-2.0-flash:generateContent");
    assert_eq!(seen[0].query.get("key").map(String::as_str), Some("secret"));
    assert_eq!(seen[0].body["tools"], json!([{"google_search": {}}]));
    assert_eq!(seen[0].body["contents"][0]["parts"][0]["text"], "プロンプト");
    assert_eq!(seen[0].body["generationConfig"]["maxOutputTokens"], 8192);
}

#[tokio::test]
async fn other_models_are_called_without_tools() {
    let fake = Fake::new(StatusCode::OK, generation_body("text"));
    let seen = fake.seen.clone();
    let base = spawn_fake_gemini(fake).await;

    let generation = client(&base)
        .generate(&creds("gemma-3-27b-it"), "p", true)
        .await
        .unwrap();
    assert!(!generation.grounding_used);
    assert!(seen.lock()[0].body.get("tools").is_none());
}

#[tokio::test]
async fn service_error_message_is_surfaced() {
    let fake = Fake::new(
        StatusCode::BAD_REQUEST,
        json!({"error": {"code": 400, "message": "API key not valid. Please pass a valid API key."}})
            .to_string(),
    );
    let base = spawn_fake_gemini(fake).await;

    let err = client(&base)
        .generate(&creds("gemini-2.0-flash"), "p", true)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LlmError::Remote {
            status: 400,
            message: "API key not valid. Please pass a valid API key.".to_string()
        }
    );
}

#[tokio::test]
async fn unstructured_error_falls_back_to_status_line() {
    let fake = Fake::new(StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded");
    let base = spawn_fake_gemini(fake).await;

    let err = client(&base).list_models("secret").await.unwrap_err();
    assert_eq!(err.to_string(), "APIエラー (500)");
}

#[tokio::test]
async fn unreachable_host_is_a_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{addr}/v1beta"))
        .generate(&creds("gemini-2.0-flash"), "p", true)
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::Network(_)), "{err:?}");
}

#[tokio::test]
async fn controller_scan_runs_end_to_end() {
    let text = "```json\n{\"date\": \"2024/01/10\", \
\"stopHighs\": [{\"no\": 1, \"code\": 1234, \"name\": \"テスト\", \"market\": \"グロース\", \"price\": 850, \"change\": \"+17.9%\", \"material\": \"\"}], \
\"soaring\": [{\"no\": 1, \"code\": \"1234\"}, {\"no\": 2, \"code\": \"4567\", \"name\": \"急騰\"}]}\n```";
    let fake = Fake::new(StatusCode::OK, generation_body(text));
    let seen = fake.seen.clone();
    let base = spawn_fake_gemini(fake).await;

    let dir = tempfile::tempdir().unwrap();
    let mut store = SettingsStore::open(dir.path().join("settings.json")).unwrap();
    store.save_credentials("secret", "gemini-2.5-flash").unwrap();
    let controller = Controller::new(Arc::new(client(&base)), store)
        .with_target_date(NaiveDate::from_ymd_opt(2024, 1, 10));

    assert_eq!(controller.fetch_market().await, Outcome::Completed);
    let scan = controller.view().state.scan.unwrap();
    assert_eq!(scan.snapshot.stop_highs[0].code, "1234");
    assert_eq!(scan.snapshot.stop_highs[0].price, "850");
    assert_eq!(scan.snapshot.stop_highs[0].material, "材料不明");
    assert_eq!(scan.snapshot.soaring.len(), 1);
    assert_eq!(scan.snapshot.soaring[0].code, "4567");
    assert_eq!(scan.citations.len(), 2);
    assert_eq!(seen.lock()[0].action, "gemini-2.5-flash:generateContent");
}
