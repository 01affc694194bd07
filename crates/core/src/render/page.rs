use crate::app::{Notice, NoticeLevel, View};
use crate::llm::models::ModelDescriptor;
use crate::render::report::render_report;
use crate::render::tables::{render_sources, render_stock_table, TableKind, MARKET_SOURCE_LIMIT};
use crate::render::escape_html;
use crate::time::jp_market::{format_ja_header, format_ja_long};

pub mod routes {
    pub const INDEX: &str = "/";
    pub const HEALTHZ: &str = "/healthz";
    pub const SETTINGS: &str = "/settings";
    pub const MODELS: &str = "/models";
    pub const THEME: &str = "/theme";
    pub const SCAN: &str = "/scan";
    pub const ANALYZE: &str = "/analyze";
    pub const SEARCH: &str = "/search";
}

const SECURITY_WARNING: &str = "このダッシュボードはローカルポートで待ち受けており、APIキーは設定ファイルに保存されます。\
信頼できないネットワークには公開しないでください。";

const STYLE: &str = r#"
:root, [data-theme="dark"] {
  --bg: #0d1117; --surface: #161b22; --border: #30363d;
  --text: #e6edf3; --text-muted: #8b949e;
  --accent-blue: #58a6ff; --accent-green: #3fb950; --accent-red: #f85149; --accent-yellow: #d29922;
}
[data-theme="light"] {
  --bg: #f6f8fa; --surface: #ffffff; --border: #d0d7de;
  --text: #1f2328; --text-muted: #656d76;
  --accent-blue: #0969da; --accent-green: #1a7f37; --accent-red: #cf222e; --accent-yellow: #9a6700;
}
body { margin: 0; background: var(--bg); color: var(--text); font-family: "Hiragino Sans", "Noto Sans JP", sans-serif; }
header { display: flex; align-items: center; gap: 12px; padding: 12px 24px; border-bottom: 1px solid var(--border); background: var(--surface); }
header h1 { font-size: 18px; margin: 0; flex: 1; }
main { max-width: 1200px; margin: 0 auto; padding: 24px; }
section { background: var(--surface); border: 1px solid var(--border); border-radius: 8px; padding: 16px; margin-bottom: 20px; }
.inline-form { display: inline; }
button { cursor: pointer; border-radius: 6px; border: 1px solid var(--border); background: var(--bg); color: var(--text); padding: 6px 12px; }
button:disabled { opacity: .5; cursor: default; }
.model-badge, .date-display { font-size: 12px; color: var(--text-muted); }
.alert { display: flex; gap: 8px; padding: 10px 14px; border-radius: 6px; margin-bottom: 16px; }
.alert-info { border: 1px solid var(--accent-blue); }
.alert-warning { border: 1px solid var(--accent-yellow); }
.alert-security { border: 1px dashed var(--accent-red); font-size: 12px; }
.model-status.ok { color: var(--accent-green); }
.model-status.error { color: var(--accent-red); }
.stock-table { width: 100%; border-collapse: collapse; }
.stock-table th, .stock-table td { padding: 8px; border-bottom: 1px solid var(--border); text-align: left; }
.change-positive { color: var(--accent-red); }
.change-negative { color: var(--accent-blue); }
.market-badge { font-size: 11px; padding: 2px 6px; border-radius: 4px; border: 1px solid var(--border); }
.market-prime { color: var(--accent-blue); }
.market-growth { color: var(--accent-green); }
.market-standard { color: var(--accent-yellow); }
.empty-state, .loading-state { text-align: center; padding: 32px; color: var(--text-muted); }
.sources-section { margin-top: 12px; font-size: 12px; }
.source-link { display: block; color: var(--accent-blue); }
.report-grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(280px, 1fr)); gap: 16px; }
.report-card { border: 1px solid var(--border); border-radius: 8px; padding: 12px; margin-bottom: 16px; }
.data-row { display: flex; justify-content: space-between; padding: 4px 0; }
.data-label { color: var(--text-muted); }
.verdict-banner { padding: 16px; border-radius: 8px; margin: 16px 0; font-size: 20px; }
.verdict-banner.buy { border: 2px solid var(--accent-red); }
.verdict-banner.neutral { border: 2px solid var(--accent-yellow); }
.verdict-banner.sell { border: 2px solid var(--accent-blue); }
.strength-bar { flex: 1; height: 8px; background: var(--border); border-radius: 4px; }
.strength-meter { display: flex; align-items: center; gap: 8px; }
.strength-fill { height: 100%; border-radius: 4px; }
.strength-fill.high { background: var(--accent-red); }
.strength-fill.medium { background: var(--accent-yellow); }
.strength-fill.low { background: var(--accent-blue); }
.strategy-grid { display: grid; grid-template-columns: 1fr 1fr; gap: 8px; }
.strategy-value.loss { color: var(--accent-blue); }
.strategy-value.gain { color: var(--accent-red); }
.disclaimer { font-size: 11px; color: var(--text-muted); margin-top: 16px; }
"#;

fn alert_class(level: NoticeLevel) -> (&'static str, &'static str) {
    match level {
        NoticeLevel::Info => ("alert-info", "ℹ️"),
        NoticeLevel::Warning => ("alert-warning", "⚠️"),
    }
}

pub fn render_alert(notice: &Notice) -> String {
    let (class, icon) = alert_class(notice.level);
    format!(
        "<div class=\"alert {class}\"><span class=\"alert-icon\">{icon}</span><span>{}</span></div>",
        escape_html(&notice.message)
    )
}

/// `<option>` list for the settings dialog. With no fetched catalog the
/// current model is offered on its own so the form still submits it.
pub fn render_model_options(models: &[ModelDescriptor], selected: &str) -> String {
    if models.is_empty() {
        if selected.is_empty() {
            return "<option value=\"\">利用可能なモデルがありません</option>".to_string();
        }
        return format!(
            "<option value=\"{id}\" selected>{id}</option>",
            id = escape_html(selected)
        );
    }
    models
        .iter()
        .map(|m| {
            let tag = if m.supports_search {
                " ✓検索対応"
            } else {
                " △検索非対応"
            };
            format!(
                "<option value=\"{}\"{}>{}{tag}</option>",
                escape_html(&m.id),
                if m.id == selected { " selected" } else { "" },
                escape_html(&m.display_name),
            )
        })
        .collect()
}

fn disabled(busy: bool) -> &'static str {
    if busy {
        " disabled"
    } else {
        ""
    }
}

fn render_settings(view: &View) -> String {
    let state = &view.state;
    let model_status = state
        .model_status
        .as_ref()
        .map(|n| {
            let class = match n.level {
                NoticeLevel::Info => "ok",
                NoticeLevel::Warning => "error",
            };
            format!(
                "<div class=\"model-status {class}\">{}</div>",
                escape_html(&n.message)
            )
        })
        .unwrap_or_default();
    let open = if state.settings_open { " open" } else { "" };
    // The stored key is never written into the page.
    let key_placeholder = if state.credentials.has_api_key() {
        "保存済み（変更する場合のみ入力）"
    } else {
        "AIza..."
    };

    format!(
        "<details class=\"settings\"{open}><summary>⚙️ 設定</summary>\
<form method=\"post\" action=\"{settings}\">\
<label>Gemini APIキー <input type=\"password\" name=\"api_key\" value=\"\" placeholder=\"{key_placeholder}\" autocomplete=\"off\"></label>\
<label>モデル <select name=\"model\">{options}</select></label>\
<button type=\"submit\">保存</button>\
<button type=\"submit\" formaction=\"{models}\"{models_disabled}>{models_label}</button>\
</form>{model_status}</details>",
        settings = routes::SETTINGS,
        models = routes::MODELS,
        options = render_model_options(&state.models, state.credentials.model()),
        models_disabled = disabled(view.models_busy),
        models_label = if view.models_busy {
            "取得中..."
        } else {
            "🔄 モデルを検索"
        },
    )
}

fn render_market(view: &View) -> String {
    let state = &view.state;
    let status = if view.scan_busy {
        "データ取得中...".to_string()
    } else {
        state.scan_status.clone().unwrap_or_default()
    };
    let data_date = state
        .scan
        .as_ref()
        .and_then(|s| s.snapshot.date.as_deref())
        .map(|d| format!(" <span class=\"data-date\">({})</span>", escape_html(d)))
        .unwrap_or_default();

    let (stop_highs, soaring, sources) = match (&state.scan, &state.scan_error) {
        (_, Some(err)) => (
            format!(
                "<div class=\"empty-state\"><div class=\"empty-icon\">❌</div>\
<div class=\"empty-text\">データの取得に失敗しました<br><small>{}</small></div></div>",
                escape_html(err)
            ),
            render_stock_table(&[], TableKind::Soaring),
            String::new(),
        ),
        (Some(scan), None) => (
            render_stock_table(&scan.snapshot.stop_highs, TableKind::StopHigh),
            render_stock_table(&scan.snapshot.soaring, TableKind::Soaring),
            render_sources(&scan.citations, MARKET_SOURCE_LIMIT),
        ),
        (None, None) => (
            render_stock_table(&[], TableKind::StopHigh),
            render_stock_table(&[], TableKind::Soaring),
            String::new(),
        ),
    };
    let count = |kind: TableKind| {
        state.scan.as_ref().map_or(0, |s| match kind {
            TableKind::StopHigh => s.snapshot.stop_highs.len(),
            TableKind::Soaring => s.snapshot.soaring.len(),
        })
    };

    format!(
        "<section class=\"market\">\
<form method=\"post\" action=\"{scan}\" class=\"inline-form\"><button type=\"submit\" class=\"fetch-btn\"{scan_disabled}>🔍 取得</button></form>\
<span class=\"target-date\">取得対象日: {target_date}</span>\
<span class=\"fetch-status\">{status}</span>\
<h2>🚀 {stop_title}{data_date} <span class=\"count\">{stop_count}</span></h2>{stop_highs}{sources}\
<h2>📈 {soaring_title}{data_date} <span class=\"count\">{soaring_count}</span></h2>{soaring}\
</section>",
        scan = routes::SCAN,
        scan_disabled = disabled(view.scan_busy),
        target_date = format_ja_long(view.target_date),
        status = escape_html(&status),
        stop_title = TableKind::StopHigh.title(),
        stop_count = count(TableKind::StopHigh),
        soaring_title = TableKind::Soaring.title(),
        soaring_count = count(TableKind::Soaring),
    )
}

fn render_search(view: &View) -> String {
    format!(
        "<section class=\"search\"><form method=\"post\" action=\"{search}\">\
<input type=\"search\" name=\"query\" placeholder=\"銘柄コード（例: 7203）または銘柄名\">\
<button type=\"submit\"{busy}>📊 分析</button></form></section>",
        search = routes::SEARCH,
        busy = disabled(view.analysis_busy),
    )
}

fn render_report_section(view: &View) -> String {
    let state = &view.state;
    let body = if view.analysis_busy {
        let target = state
            .analyzed
            .as_ref()
            .map(|s| if s.name.is_empty() { s.code.as_str() } else { s.name.as_str() })
            .unwrap_or_default();
        format!(
            "<div class=\"loading-state\">{} を分析中...</div>",
            escape_html(target)
        )
    } else if let Some(err) = &state.report_error {
        format!(
            "<div class=\"alert alert-warning\"><span class=\"alert-icon\">❌</span><span>分析に失敗しました: {}</span></div>",
            escape_html(err)
        )
    } else if let Some(report) = &state.report {
        render_report(report)
    } else {
        return String::new();
    };
    format!("<section class=\"report-section\" id=\"report\">{body}</section>")
}

/// Full dashboard document.
pub fn render_page(view: &View) -> String {
    let state = &view.state;
    let notice = state.notice.as_ref().map(render_alert).unwrap_or_default();
    let security = if view.security_warnings {
        format!(
            "<div class=\"alert alert-security\"><span class=\"alert-icon\">🔒</span><span>{SECURITY_WARNING}</span></div>"
        )
    } else {
        String::new()
    };

    format!(
        "<!DOCTYPE html>\n<html lang=\"ja\" data-theme=\"{theme}\"><head><meta charset=\"utf-8\">\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
<title>ストップ高銘柄スキャナー</title><style>{STYLE}</style></head><body>\
<header><h1>📊 ストップ高銘柄スキャナー</h1>\
<span class=\"date-display\">{today}</span>\
<span class=\"model-badge\">{model}</span>\
<form method=\"post\" action=\"{theme_route}\" class=\"inline-form\"><button type=\"submit\" class=\"theme-toggle\">{theme_icon}</button></form>\
</header><main>{security}{notice}{settings}{market}{search}{report}</main></body></html>",
        theme = state.theme.as_str(),
        today = format_ja_header(view.today),
        model = escape_html(state.credentials.model()),
        theme_route = routes::THEME,
        theme_icon = match state.theme {
            crate::settings::Theme::Dark => "☀️",
            crate::settings::Theme::Light => "🌙",
        },
        settings = render_settings(view),
        market = render_market(view),
        search = render_search(view),
        report = render_report_section(view),
    )
}
