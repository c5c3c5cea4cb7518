//! Store Configuration
//!
//! Connection-independent settings for adapters and repositories: the
//! database name, the target engine, default pagination and vector search
//! tuning. Loaded from a JSON file.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};
use crate::pipeline::Similarity;
use crate::render::Engine;

/// Store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database name (required)
    pub database: String,

    /// Target engine (default: "base")
    #[serde(default)]
    pub engine: Engine,

    /// Page size appended by engine adapters when a pipeline has no
    /// pagination (default: 25)
    #[serde(default = "default_page_limit")]
    pub default_page_limit: u64,

    /// Atlas search index named in `$vectorSearch` (default: "vector_index")
    #[serde(default = "default_vector_index")]
    pub vector_index: Option<String>,

    /// Field holding document embeddings (default: "keywordsVector")
    #[serde(default = "default_vector_path")]
    pub vector_path: String,

    /// Similarity metric passed to vector search (default: COS)
    #[serde(default = "default_vector_similarity")]
    pub vector_similarity: Option<Similarity>,

    /// Lower bound of the vector search candidate pool (default: 50)
    #[serde(default = "default_min_vector_candidates")]
    pub min_vector_candidates: u32,
}

fn default_page_limit() -> u64 {
    25
}

fn default_vector_index() -> Option<String> {
    Some("vector_index".to_string())
}

fn default_vector_path() -> String {
    "keywordsVector".to_string()
}

fn default_vector_similarity() -> Option<Similarity> {
    Some(Similarity::Cosine)
}

fn default_min_vector_candidates() -> u32 {
    50
}

impl StoreConfig {
    /// Create a config for `database` with every other setting defaulted
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            engine: Engine::default(),
            default_page_limit: default_page_limit(),
            vector_index: default_vector_index(),
            vector_path: default_vector_path(),
            vector_similarity: default_vector_similarity(),
            min_vector_candidates: default_min_vector_candidates(),
        }
    }

    /// Same config targeting `engine`
    pub fn with_engine(mut self, engine: Engine) -> Self {
        self.engine = engine;
        self
    }

    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> QueryResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| QueryError::config(format!("Failed to read config: {}", e)))?;

        let config: StoreConfig = serde_json::from_str(&content)
            .map_err(|e| QueryError::config(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> QueryResult<()> {
        if self.database.trim().is_empty() {
            return Err(QueryError::config("database must not be empty"));
        }

        if self.default_page_limit == 0 {
            return Err(QueryError::config("default_page_limit must be > 0"));
        }

        if self.min_vector_candidates == 0 {
            return Err(QueryError::config("min_vector_candidates must be > 0"));
        }

        if self.vector_path.is_empty() {
            return Err(QueryError::config("vector_path must not be empty"));
        }

        if matches!(&self.vector_index, Some(index) if index.is_empty()) {
            return Err(QueryError::config(
                "vector_index must be omitted or non-empty",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let file = write_config(r#"{ "database": "cams" }"#);
        let config = StoreConfig::load(file.path()).unwrap();

        assert_eq!(config, StoreConfig::new("cams"));
        assert_eq!(config.engine, Engine::Base);
        assert_eq!(config.default_page_limit, 25);
        assert_eq!(config.vector_index.as_deref(), Some("vector_index"));
        assert_eq!(config.vector_path, "keywordsVector");
        assert_eq!(config.vector_similarity, Some(Similarity::Cosine));
        assert_eq!(config.min_vector_candidates, 50);
    }

    #[test]
    fn test_full_config() {
        let file = write_config(
            r#"{
                "database": "cams",
                "engine": "cosmos",
                "default_page_limit": 10,
                "vector_index": null,
                "vector_similarity": "IP",
                "min_vector_candidates": 100
            }"#,
        );
        let config = StoreConfig::load(file.path()).unwrap();

        assert_eq!(config.engine, Engine::Cosmos);
        assert_eq!(config.default_page_limit, 10);
        assert_eq!(config.vector_index, None);
        assert_eq!(config.vector_similarity, Some(Similarity::InnerProduct));
        assert_eq!(config.min_vector_candidates, 100);
    }

    #[test]
    fn test_missing_database_is_rejected() {
        let file = write_config(r#"{ "engine": "atlas" }"#);
        let err = StoreConfig::load(file.path()).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_zero_page_limit_is_rejected() {
        let file = write_config(r#"{ "database": "cams", "default_page_limit": 0 }"#);
        assert!(StoreConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_unknown_engine_is_rejected() {
        let file = write_config(r#"{ "database": "cams", "engine": "postgres" }"#);
        assert!(StoreConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = StoreConfig::load(Path::new("/nonexistent/pipequery.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }
}
