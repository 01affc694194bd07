use crate::app::slot::RequestSlot;
use crate::domain::market::{MarketSnapshot, SourceCitation, StockRecord};
use crate::domain::report::AnalysisReport;
use crate::llm::error::LlmError;
use crate::llm::json::{parse_analysis_report, parse_market_snapshot};
use crate::llm::models::ModelDescriptor;
use crate::llm::{Credentials, GenerationClient};
use crate::prompt::{build_analysis_prompt, build_market_scan_prompt, StockQuery};
use crate::settings::{SettingsStore, Theme};
use crate::time::jp_market::resolve_target_date;
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const MISSING_KEY_NOTICE: &str =
    "APIキーが設定されていません。右上の設定ボタンからGemini APIキーを入力してください。";
const MISSING_KEY_FOR_MODELS: &str = "APIキーを先に入力してください。";
const EMPTY_QUERY: &str = "銘柄コードまたは銘柄名を入力してください。";
const SCAN_FAILED_STATUS: &str = "エラーが発生しました";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }
}

/// Result of a controller operation, for surfaces that need more than the
/// rendered state (redirects, exit codes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// Another request of the same family is in flight; nothing was done.
    Busy,
    /// No API key; the settings dialog was opened instead of calling out.
    NeedsSettings,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketScan {
    pub snapshot: MarketSnapshot,
    pub citations: Vec<SourceCitation>,
    pub model_used: String,
    pub grounding_used: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppState {
    #[serde(skip)]
    pub credentials: Credentials,
    pub theme: Theme,
    pub models: Vec<ModelDescriptor>,
    pub model_status: Option<Notice>,
    pub settings_open: bool,
    /// Transient banner; cleared by [`Controller::view`].
    pub notice: Option<Notice>,
    pub scan: Option<MarketScan>,
    pub scan_status: Option<String>,
    pub scan_error: Option<String>,
    pub analyzed: Option<StockRecord>,
    pub report: Option<AnalysisReport>,
    pub report_error: Option<String>,
}

/// Everything the renderer needs for one page.
#[derive(Debug, Clone)]
pub struct View {
    pub state: AppState,
    pub today: NaiveDate,
    pub target_date: NaiveDate,
    pub models_busy: bool,
    pub scan_busy: bool,
    pub analysis_busy: bool,
    pub security_warnings: bool,
}

pub struct Controller {
    client: Arc<dyn GenerationClient>,
    settings: Mutex<SettingsStore>,
    state: Mutex<AppState>,
    models_slot: RequestSlot,
    scan_slot: RequestSlot,
    analysis_slot: RequestSlot,
    fixed_target_date: Option<NaiveDate>,
    security_warnings: bool,
}

impl Controller {
    pub fn new(client: Arc<dyn GenerationClient>, settings: SettingsStore) -> Self {
        let credentials = settings.credentials();
        let theme = settings.theme();
        let notice = if credentials.has_api_key() {
            None
        } else {
            tracing::warn!("no Gemini API key configured");
            Some(Notice::warning(MISSING_KEY_NOTICE))
        };

        Self {
            client,
            settings: Mutex::new(settings),
            state: Mutex::new(AppState {
                credentials,
                theme,
                notice,
                ..AppState::default()
            }),
            models_slot: RequestSlot::new("models"),
            scan_slot: RequestSlot::new("scan"),
            analysis_slot: RequestSlot::new("analysis"),
            fixed_target_date: None,
            security_warnings: true,
        }
    }

    /// Pins the date the prompts ask about instead of deriving it from the
    /// local clock.
    pub fn with_target_date(mut self, date: Option<NaiveDate>) -> Self {
        self.fixed_target_date = date;
        self
    }

    pub fn with_security_warnings(mut self, enabled: bool) -> Self {
        self.security_warnings = enabled;
        self
    }

    pub fn target_date(&self) -> NaiveDate {
        self.fixed_target_date
            .unwrap_or_else(|| resolve_target_date(&chrono::Local::now()))
    }

    pub fn credentials(&self) -> Credentials {
        self.state.lock().credentials.clone()
    }

    pub fn is_scan_busy(&self) -> bool {
        self.scan_slot.is_busy()
    }

    /// Snapshot for rendering. Takes the transient notice so it is shown once.
    pub fn view(&self) -> View {
        let state = {
            let mut state = self.state.lock();
            let snapshot = state.clone();
            state.notice = None;
            snapshot
        };
        View {
            state,
            today: chrono::Local::now().date_naive(),
            target_date: self.target_date(),
            models_busy: self.models_slot.is_busy(),
            scan_busy: self.scan_slot.is_busy(),
            analysis_busy: self.analysis_slot.is_busy(),
            security_warnings: self.security_warnings,
        }
    }

    pub fn set_settings_open(&self, open: bool) {
        self.state.lock().settings_open = open;
    }

    fn notify(&self, notice: Notice) {
        self.state.lock().notice = Some(notice);
    }

    /// Persists the key and model. Blank fields keep the current values.
    pub fn save_settings(&self, api_key: &str, model: &str) -> Outcome {
        let saved = self.settings.lock().save_credentials(api_key, model);
        match saved {
            Ok(credentials) => {
                tracing::info!(model = %credentials.model(), "settings saved");
                let mut state = self.state.lock();
                state.notice = Some(Notice::info(format!(
                    "APIキーとモデル（{}）を保存しました。",
                    credentials.model()
                )));
                state.credentials = credentials;
                state.settings_open = false;
                Outcome::Completed
            }
            Err(err) => {
                let message = err.to_string();
                tracing::warn!(error = %err, "settings not saved");
                let mut state = self.state.lock();
                state.notice = Some(Notice::warning(message.clone()));
                state.settings_open = true;
                Outcome::Failed(message)
            }
        }
    }

    /// Switches the model for this session without touching the settings
    /// file. Blank input is ignored.
    pub fn select_model(&self, model: &str) {
        let model = model.trim();
        if model.is_empty() {
            return;
        }
        let mut state = self.state.lock();
        if !state.models.is_empty() && !state.models.iter().any(|m| m.id == model) {
            tracing::debug!(model, "selected model is not in the fetched catalog");
        }
        state.credentials.selected_model = model.to_string();
    }

    pub fn toggle_theme(&self) -> Theme {
        let next = self.state.lock().theme.toggled();
        if let Err(err) = self.settings.lock().save_theme(next) {
            tracing::warn!(error = %err, "theme not persisted");
        }
        self.state.lock().theme = next;
        next
    }

    /// Fetches the model catalog with `key_override` (the unsaved settings
    /// input) or the stored key.
    pub async fn refresh_models(&self, key_override: Option<&str>) -> Outcome {
        let api_key = key_override
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.credentials().api_key.trim().to_string());

        if api_key.is_empty() {
            let mut state = self.state.lock();
            state.model_status = Some(Notice::warning(MISSING_KEY_FOR_MODELS));
            state.settings_open = true;
            return Outcome::Failed(MISSING_KEY_FOR_MODELS.to_string());
        }

        let Some(guard) = self.models_slot.try_begin() else {
            return Outcome::Busy;
        };
        self.set_settings_open(true);

        match self.client.list_models(&api_key).await {
            Ok(models) => {
                tracing::info!(count = models.len(), "model catalog fetched");
                let mut state = self.state.lock();
                state.model_status = Some(Notice::info(format!(
                    "{}件のモデルを取得しました",
                    models.len()
                )));
                state.models = models;
                drop(state);
                guard.succeed();
                Outcome::Completed
            }
            Err(err) => {
                let message = format!("取得失敗: {err}");
                tracing::warn!(stage = err.stage(), error = %err, "model catalog fetch failed");
                self.state.lock().model_status = Some(Notice::warning(message.clone()));
                guard.fail(err.to_string());
                Outcome::Failed(message)
            }
        }
    }

    /// Runs the price-limit / rapid-rise scan for the target date.
    pub async fn fetch_market(&self) -> Outcome {
        let credentials = self.credentials();
        if !credentials.has_api_key() {
            self.set_settings_open(true);
            return Outcome::NeedsSettings;
        }
        let Some(guard) = self.scan_slot.try_begin() else {
            return Outcome::Busy;
        };

        let target_date = self.target_date();
        tracing::info!(%target_date, model = %credentials.model(), "market scan started");
        let prompt = build_market_scan_prompt(target_date);

        match self.run_scan(&credentials, &prompt).await {
            Ok(scan) => {
                let status = format!(
                    "ストップ高: {}件 / 急騰: {}件 を取得しました",
                    scan.snapshot.stop_highs.len(),
                    scan.snapshot.soaring.len()
                );
                tracing::info!(
                    stop_highs = scan.snapshot.stop_highs.len(),
                    soaring = scan.snapshot.soaring.len(),
                    grounding = scan.grounding_used,
                    "market scan finished"
                );
                let mut state = self.state.lock();
                state.scan = Some(scan);
                state.scan_status = Some(status);
                state.scan_error = None;
                drop(state);
                guard.succeed();
                Outcome::Completed
            }
            Err(err) => {
                let message = err.to_string();
                tracing::warn!(stage = err.stage(), error = %err, "market scan failed");
                let mut state = self.state.lock();
                state.scan = None;
                state.scan_status = Some(SCAN_FAILED_STATUS.to_string());
                state.scan_error = Some(message.clone());
                state.notice = Some(Notice::warning(message.clone()));
                drop(state);
                guard.fail(message.clone());
                Outcome::Failed(message)
            }
        }
    }

    async fn run_scan(&self, credentials: &Credentials, prompt: &str) -> Result<MarketScan, LlmError> {
        let generation = self.client.generate(credentials, prompt, true).await?;
        let snapshot = parse_market_snapshot(&generation.text)?;
        Ok(MarketScan {
            snapshot,
            citations: generation.citations,
            model_used: generation.model_used,
            grounding_used: generation.grounding_used,
        })
    }

    /// Produces an analysis report for `stock`, replacing the previous one.
    pub async fn analyze_stock(&self, stock: StockRecord) -> Outcome {
        let credentials = self.credentials();
        if !credentials.has_api_key() {
            self.set_settings_open(true);
            return Outcome::NeedsSettings;
        }
        let Some(guard) = self.analysis_slot.try_begin() else {
            return Outcome::Busy;
        };

        let target_date = self.target_date();
        tracing::info!(code = %stock.code, name = %stock.name, %target_date, "analysis started");
        let prompt = build_analysis_prompt(&stock, target_date);
        {
            let mut state = self.state.lock();
            state.analyzed = Some(stock);
            state.report_error = None;
        }

        let result = async {
            let generation = self.client.generate(&credentials, &prompt, true).await?;
            parse_analysis_report(&generation.text, &generation.citations)
        }
        .await;

        match result {
            Ok(report) => {
                tracing::info!(
                    code = %report.code(),
                    judgment = report.verdict.judgment.label(),
                    sources = report.sources.len(),
                    "analysis finished"
                );
                let mut state = self.state.lock();
                state.report = Some(report);
                drop(state);
                guard.succeed();
                Outcome::Completed
            }
            Err(err) => {
                let message = err.to_string();
                tracing::warn!(stage = err.stage(), error = %err, "analysis failed");
                let mut state = self.state.lock();
                state.report = None;
                state.report_error = Some(message.clone());
                state.notice = Some(Notice::warning(message.clone()));
                drop(state);
                guard.fail(message.clone());
                Outcome::Failed(message)
            }
        }
    }

    /// Search box entry point: a 4-digit query is a code, anything else a
    /// name.
    pub async fn analyze_query(&self, query: &str) -> Outcome {
        match StockQuery::parse(query) {
            Some(query) => self.analyze_stock(query.into_record()).await,
            None => {
                self.notify(Notice::warning(EMPTY_QUERY));
                Outcome::Failed(EMPTY_QUERY.to_string())
            }
        }
    }
}
