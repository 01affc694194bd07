use axum::{
    extract::{Form, State},
    response::{Html, Redirect},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kabuscan_core::app::{Controller, Outcome};
use kabuscan_core::domain::market::StockRecord;
use kabuscan_core::llm::gemini::GeminiClient;
use kabuscan_core::render::page::{render_page, routes};
use kabuscan_core::settings::SettingsStore;

mod origin;

use origin::{require_local_origin, LocalOrigin};

type AppState = Arc<Controller>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = kabuscan_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let settings_path = settings.require_settings_path()?;
    let mut store = match SettingsStore::open(&settings_path) {
        Ok(store) => store,
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, path = %settings_path.display(), "settings unreadable; starting with defaults");
            SettingsStore::in_memory()
        }
    };
    if let Some(key) = settings.gemini_api_key.as_deref() {
        store.seed_api_key(key);
    }

    let client = GeminiClient::from_settings(&settings)?;
    let controller = Controller::new(Arc::new(client), store)
        .with_security_warnings(!settings.disable_security_warnings);
    let state: AppState = Arc::new(controller);

    let addr = settings.bind_addr()?;
    let app = router(state, LocalOrigin::for_addr(addr));
    tracing::info!(%addr, settings = %settings_path.display(), "dashboard listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState, local: LocalOrigin) -> Router {
    Router::new()
        .route(routes::INDEX, get(index))
        .route(routes::HEALTHZ, get(healthz))
        .route(routes::SETTINGS, post(save_settings))
        .route(routes::MODELS, post(refresh_models))
        .route(routes::THEME, post(toggle_theme))
        .route(routes::SCAN, post(scan))
        .route(routes::ANALYZE, post(analyze))
        .route(routes::SEARCH, post(search))
        .with_state(state)
        .layer(axum::middleware::from_fn_with_state(local, require_local_origin))
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn index(State(controller): State<AppState>) -> Html<String> {
    Html(render_page(&controller.view()))
}

fn back(outcome: Outcome) -> Redirect {
    if let Outcome::Busy = outcome {
        tracing::debug!("request ignored; already in flight");
    }
    Redirect::to(routes::INDEX)
}

#[derive(Debug, Deserialize)]
struct SettingsForm {
    #[serde(default)]
    api_key: String,
    #[serde(default)]
    model: String,
}

async fn save_settings(
    State(controller): State<AppState>,
    Form(form): Form<SettingsForm>,
) -> Redirect {
    back(controller.save_settings(&form.api_key, &form.model))
}

async fn refresh_models(
    State(controller): State<AppState>,
    Form(form): Form<SettingsForm>,
) -> Redirect {
    controller.select_model(&form.model);
    back(controller.refresh_models(Some(&form.api_key)).await)
}

async fn toggle_theme(State(controller): State<AppState>) -> Redirect {
    controller.toggle_theme();
    Redirect::to(routes::INDEX)
}

async fn scan(State(controller): State<AppState>) -> Redirect {
    back(controller.fetch_market().await)
}

#[derive(Debug, Deserialize)]
struct AnalyzeForm {
    #[serde(default)]
    code: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    market: String,
    #[serde(default)]
    price: String,
    #[serde(default)]
    change: String,
    #[serde(default)]
    material: String,
}

impl From<AnalyzeForm> for StockRecord {
    fn from(form: AnalyzeForm) -> Self {
        StockRecord {
            sequence_no: 1,
            code: form.code,
            name: form.name,
            market: form.market,
            price: form.price,
            change_percent: form.change,
            material: form.material,
        }
    }
}

async fn analyze(
    State(controller): State<AppState>,
    Form(form): Form<AnalyzeForm>,
) -> Redirect {
    back(controller.analyze_stock(form.into()).await)
}

#[derive(Debug, Deserialize)]
struct SearchForm {
    #[serde(default)]
    query: String,
}

async fn search(State(controller): State<AppState>, Form(form): Form<SearchForm>) -> Redirect {
    back(controller.analyze_query(&form.query).await)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &kabuscan_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
