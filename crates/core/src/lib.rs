pub mod app;
pub mod domain;
pub mod llm;
pub mod prompt;
pub mod render;
pub mod settings;
pub mod time;

pub mod config {
    use anyhow::Context;
    use std::path::PathBuf;

    const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
    const DEFAULT_BIND: &str = "127.0.0.1:3210";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub gemini_base_url: String,
        pub gemini_timeout_secs: Option<u64>,
        pub gemini_api_key: Option<String>,
        pub settings_path: Option<PathBuf>,
        pub sentry_dsn: Option<String>,
        pub bind: Option<String>,
        pub port: Option<u16>,
        pub disable_security_warnings: bool,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                gemini_base_url: std::env::var("GEMINI_BASE_URL")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
                gemini_timeout_secs: std::env::var("GEMINI_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok()),
                gemini_api_key: std::env::var("GEMINI_API_KEY")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                settings_path: std::env::var("KABUSCAN_SETTINGS_PATH")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .map(PathBuf::from),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                bind: std::env::var("KABUSCAN_BIND").ok(),
                port: std::env::var("PORT").ok().and_then(|v| v.parse().ok()),
                disable_security_warnings: std::env::var("KABUSCAN_DISABLE_SECURITY_WARNINGS")
                    .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes"))
                    .unwrap_or(false),
            })
        }

        /// Settings file location; falls back to the platform config directory.
        pub fn require_settings_path(&self) -> anyhow::Result<PathBuf> {
            if let Some(path) = &self.settings_path {
                return Ok(path.clone());
            }
            let dir = dirs::config_dir()
                .context("no platform config directory; set KABUSCAN_SETTINGS_PATH")?;
            Ok(dir.join("kabuscan").join("settings.json"))
        }

        pub fn bind_addr(&self) -> anyhow::Result<std::net::SocketAddr> {
            if let Some(bind) = self.bind.as_deref() {
                return bind
                    .parse()
                    .with_context(|| format!("invalid KABUSCAN_BIND: {bind}"));
            }
            let mut addr: std::net::SocketAddr = DEFAULT_BIND
                .parse()
                .context("invalid default bind address")?;
            if let Some(port) = self.port {
                addr.set_port(port);
            }
            Ok(addr)
        }
    }
}
