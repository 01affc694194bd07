use serde::{Deserialize, Serialize};

/// Model-family fragments known to accept the `google_search` tool.
///
/// This is a name heuristic, not a capability reported by the service.
pub const SEARCH_CAPABLE_KEYWORDS: &[&str] = &["gemini-2.0", "gemini-1.5", "gemini-2.5"];

const MODEL_NAME_PREFIX: &str = "models/";
const GENERATE_CONTENT_METHOD: &str = "generateContent";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub display_name: String,
    pub description: String,
    pub supports_search: bool,
}

pub fn supports_search(model: &str) -> bool {
    SEARCH_CAPABLE_KEYWORDS.iter().any(|k| model.contains(k))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelCatalog {
    #[serde(default)]
    pub models: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl ModelCatalog {
    /// Content-generation models only, newest-looking ids first.
    pub fn into_descriptors(self) -> Vec<ModelDescriptor> {
        let mut out: Vec<ModelDescriptor> = self
            .models
            .into_iter()
            .filter(|m| {
                m.supported_generation_methods
                    .iter()
                    .any(|method| method == GENERATE_CONTENT_METHOD)
            })
            .map(CatalogEntry::into_descriptor)
            .collect();

        // Lexicographic, not a version sort.
        out.sort_by(|a, b| b.id.cmp(&a.id));
        out
    }
}

impl CatalogEntry {
    fn into_descriptor(self) -> ModelDescriptor {
        let id = self
            .name
            .strip_prefix(MODEL_NAME_PREFIX)
            .unwrap_or(&self.name)
            .to_string();
        let display_name = self
            .display_name
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| id.clone());

        ModelDescriptor {
            supports_search: supports_search(&self.name),
            id,
            display_name,
            description: self.description.unwrap_or_default(),
        }
    }
}
