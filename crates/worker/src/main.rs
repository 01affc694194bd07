use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kabuscan_core::app::{Controller, Outcome};
use kabuscan_core::llm::gemini::GeminiClient;
use kabuscan_core::prompt::StockQuery;
use kabuscan_core::render::{page::render_page, report::render_report};
use kabuscan_core::settings::SettingsStore;

#[derive(Debug, Parser)]
#[command(name = "kabuscan_worker")]
struct Args {
    /// Trading date the prompts ask about (YYYY-MM-DD). Defaults to today
    /// after the 15:30 close, yesterday before it.
    #[arg(long, global = true)]
    target_date: Option<String>,

    /// Model id for this run only; the saved model is used otherwise.
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List models that support content generation.
    Models,
    /// Fetch today's price-limit and rapid-rise lists.
    Scan {
        /// Print the rendered dashboard instead of JSON.
        #[arg(long)]
        html: bool,
    },
    /// Produce an analysis report for one security.
    Analyze {
        #[arg(long)]
        code: String,
        #[arg(long)]
        name: Option<String>,
        /// Print the rendered report instead of JSON.
        #[arg(long)]
        html: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = kabuscan_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let target_date = parse_target_date(args.target_date.as_deref())?;

    let settings_path = settings.require_settings_path()?;
    let mut store = SettingsStore::open(&settings_path)?;
    if let Some(key) = settings.gemini_api_key.as_deref() {
        store.seed_api_key(key);
    }

    let client = GeminiClient::from_settings(&settings)?;
    let controller = Controller::new(Arc::new(client), store)
        .with_target_date(target_date)
        .with_security_warnings(!settings.disable_security_warnings);
    if let Some(model) = args.model.as_deref() {
        controller.select_model(model);
    }

    match args.command {
        Command::Models => {
            finish(controller.refresh_models(None).await, &settings_path)?;
            let view = controller.view();
            println!("{}", serde_json::to_string_pretty(&view.state.models)?);
        }
        Command::Scan { html } => {
            tracing::info!(target_date = %controller.target_date(), "scan requested");
            finish(controller.fetch_market().await, &settings_path)?;
            let view = controller.view();
            if html {
                println!("{}", render_page(&view));
            } else {
                let scan = view.state.scan.context("scan finished without a result")?;
                println!("{}", serde_json::to_string_pretty(&scan)?);
            }
        }
        Command::Analyze { code, name, html } => {
            let mut stock = StockQuery::Code(code.trim().to_string()).into_record();
            if let Some(name) = name {
                stock.name = name;
            }
            finish(controller.analyze_stock(stock).await, &settings_path)?;
            let report = controller
                .view()
                .state
                .report
                .context("analysis finished without a report")?;
            if html {
                println!("{}", render_report(&report));
            } else {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
    }

    Ok(())
}

fn finish(outcome: Outcome, settings_path: &std::path::Path) -> anyhow::Result<()> {
    match outcome {
        Outcome::Completed => Ok(()),
        Outcome::NeedsSettings => bail!(
            "no Gemini API key; set GEMINI_API_KEY or save one in {}",
            settings_path.display()
        ),
        Outcome::Busy => bail!("another request is already in flight"),
        Outcome::Failed(message) => {
            let err = anyhow::anyhow!(message);
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "run failed");
            Err(err)
        }
    }
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

fn parse_target_date(arg: Option<&str>) -> anyhow::Result<Option<chrono::NaiveDate>> {
    arg.map(|s| {
        chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid --target-date: {s}"))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_date_is_optional_and_validated() {
        assert_eq!(parse_target_date(None).unwrap(), None);
        assert_eq!(
            parse_target_date(Some("2024-01-10")).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2024, 1, 10)
        );
        assert!(parse_target_date(Some("2024/01/10")).is_err());
    }

    #[test]
    fn analyze_flags_parse() {
        let args = Args::try_parse_from([
            "kabuscan_worker",
            "analyze",
            "--code",
            "7203",
            "--html",
            "--target-date",
            "2024-01-10",
        ])
        .unwrap();
        assert_eq!(args.target_date.as_deref(), Some("2024-01-10"));
        assert!(matches!(
            args.command,
            Command::Analyze { ref code, html: true, name: None } if code == "7203"
        ));
    }
}
