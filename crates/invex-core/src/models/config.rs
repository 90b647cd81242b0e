//! Configuration structures for the extraction pipeline.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::record::NullPolicy;

/// Main configuration for invex.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvexConfig {
    /// Generation backend configuration.
    pub generation: GenerationConfig,

    /// Document rendering configuration.
    pub document: DocumentConfig,

    /// Stage orchestration configuration.
    pub pipeline: PipelineConfig,

    /// Scoring configuration.
    pub validation: ValidationConfig,
}

/// Generation backend configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Ollama server address.
    pub base_url: String,

    /// Model name passed with every request.
    pub model: String,

    /// HTTP timeout per generation call, in seconds.
    pub timeout_secs: u64,

    /// Sampling temperature (server default when unset).
    pub temperature: Option<f32>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "gemma3n:e2b".to_string(),
            timeout_secs: 300,
            temperature: None,
        }
    }
}

/// Document rendering configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Prefix each PDF page with a `# Page N` header.
    pub page_headers: bool,

    /// Maximum pages to render (0 = unlimited).
    pub max_pages: usize,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            page_headers: true,
            max_pages: 0,
        }
    }
}

/// Stage orchestration configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Merge behavior for explicit nulls in model responses.
    pub null_policy: NullPolicy,

    /// Entity key used when no invoice numbers are found.
    pub sentinel_key: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            null_policy: NullPolicy::KeepExisting,
            sentinel_key: "UNKNOWN".to_string(),
        }
    }
}

/// Scoring configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Warn about totals and dates that do not parse.
    pub check_values: bool,

    /// Allowed difference between the line item sum and the invoice total.
    pub total_tolerance: Decimal,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            check_values: true,
            total_tolerance: Decimal::new(1, 0),
        }
    }
}

impl InvexConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: InvexConfig =
            serde_json::from_str(r#"{"pipeline": {"null_policy": "overwrite"}}"#).unwrap();
        assert_eq!(config.pipeline.null_policy, NullPolicy::Overwrite);
        assert_eq!(config.pipeline.sentinel_key, "UNKNOWN");
        assert_eq!(config.generation, GenerationConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = InvexConfig::default();
        config.generation.model = "llama3.2".to_string();
        config.save(&path).unwrap();

        let loaded = InvexConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
