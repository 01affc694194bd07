use thiserror::Error;

/// Failures surfaced by the Gemini client and the response normalizer.
///
/// `Display` strings are user-facing (shown in the banner and inline error
/// block), so they stay in Japanese like the rest of the UI.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LlmError {
    /// No API key configured. Recoverable by opening settings.
    #[error("APIキーが設定されていません。設定画面からAPIキーを入力してください。")]
    Auth,

    /// Non-success HTTP status. `message` is the service's own error message
    /// when the body carried one.
    #[error("{message}")]
    Remote { status: u16, message: String },

    /// DNS, connect, timeout and other transport failures.
    #[error("通信に失敗しました: {0}")]
    Network(String),

    /// The generated text did not yield the expected JSON.
    #[error("{0}")]
    Parse(String),
}

impl LlmError {
    pub fn remote_generic(status: u16) -> Self {
        LlmError::Remote {
            status,
            message: format!("APIエラー ({status})"),
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            LlmError::Auth => "auth",
            LlmError::Remote { .. } => "http",
            LlmError::Network(_) => "transport",
            LlmError::Parse(_) => "parse",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_remote_message_carries_status() {
        let err = LlmError::remote_generic(503);
        assert_eq!(err.to_string(), "APIエラー (503)");
        assert_eq!(err.stage(), "http");
    }

    #[test]
    fn parse_and_network_messages_differ() {
        let parse = LlmError::Parse("データの解析に失敗しました。".to_string());
        let net = LlmError::Network("connection refused".to_string());
        assert_ne!(parse.to_string(), net.to_string());
        assert!(net.to_string().starts_with("通信に失敗しました"));
    }
}
