pub mod error;
pub mod gemini;
pub mod json;
pub mod models;

use crate::domain::market::SourceCitation;
use crate::llm::error::LlmError;
use crate::llm::models::ModelDescriptor;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub api_key: String,
    pub selected_model: String,
}

impl Credentials {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// The configured model, or the default when none was chosen.
    pub fn model(&self) -> &str {
        let model = self.selected_model.trim();
        if model.is_empty() {
            DEFAULT_MODEL
        } else {
            model
        }
    }
}

/// Output of one generation call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    pub citations: Vec<SourceCitation>,
    pub model_used: String,
    pub grounding_used: bool,
}

#[async_trait::async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(
        &self,
        credentials: &Credentials,
        prompt: &str,
        allow_search_grounding: bool,
    ) -> Result<Generation, LlmError>;

    async fn list_models(&self, api_key: &str) -> Result<Vec<ModelDescriptor>, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_model_falls_back_to_default() {
        let creds = Credentials {
            api_key: "k".to_string(),
            selected_model: "  ".to_string(),
        };
        assert_eq!(creds.model(), DEFAULT_MODEL);
        assert!(creds.has_api_key());
        assert!(!Credentials::default().has_api_key());
    }
}
