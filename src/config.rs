use crate::error::RagError;

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_f32(name: &str, default: f32) -> f32 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// All tunable knobs for the pipeline and its remote collaborators.
/// Built from the environment with defaults; validated before use so a
/// bad deployment fails at startup rather than mid-index.
#[derive(Debug, Clone)]
pub struct RagConfig {
    /// Bearer credential for the embedding/generation endpoints.
    pub api_key: String,
    /// Base URL of the OpenAI-compatible API.
    pub api_base_url: String,
    pub embedding_model: String,
    pub generation_model: String,
    pub generation_temperature: f32,
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of chunks retrieved per query.
    pub top_k: usize,
    /// Retry budget for transient embedding-service failures.
    pub max_retries: usize,
    pub request_timeout_secs: u64,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base_url: "https://api.openai.com/v1".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            generation_model: "gpt-4o-mini".to_string(),
            generation_temperature: 0.0,
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 3,
            max_retries: 3,
            request_timeout_secs: 120,
        }
    }
}

impl RagConfig {
    /// Reads configuration from the environment. The credential is the
    /// only knob without a default.
    pub fn from_env() -> Result<Self, RagError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            RagError::Configuration("OPENAI_API_KEY is not set".to_string())
        })?;

        let config = Self {
            api_key,
            api_base_url: env_string("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            embedding_model: env_string("RAG_EMBEDDING_MODEL", "text-embedding-3-small"),
            generation_model: env_string("RAG_GENERATION_MODEL", "gpt-4o-mini"),
            generation_temperature: env_f32("RAG_GENERATION_TEMPERATURE", 0.0),
            chunk_size: env_usize("RAG_CHUNK_SIZE", 500),
            chunk_overlap: env_usize("RAG_CHUNK_OVERLAP", 50),
            top_k: env_usize("RAG_TOP_K", 3),
            max_retries: env_usize("RAG_MAX_RETRIES", 3),
            request_timeout_secs: env_u64("RAG_REQUEST_TIMEOUT_SECS", 120),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RagError> {
        if self.api_key.trim().is_empty() {
            return Err(RagError::Configuration(
                "API key must not be empty".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(RagError::Configuration(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::Configuration(
                "top_k must be at least 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.generation_temperature) {
            return Err(RagError::Configuration(format!(
                "generation_temperature ({}) must be between 0 and 2",
                self.generation_temperature
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> RagConfig {
        RagConfig {
            api_key: "test-key".to_string(),
            ..RagConfig::default()
        }
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let config = RagConfig::default();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.top_k, 3);
        assert_eq!(config.generation_temperature, 0.0);
    }

    #[test]
    fn test_valid_config_passes_validation() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_missing_api_key_rejected() {
        let config = RagConfig::default();
        assert!(matches!(
            config.validate(),
            Err(RagError::Configuration(_))
        ));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let mut config = valid_config();
        config.chunk_size = 0;
        assert!(matches!(
            config.validate(),
            Err(RagError::Configuration(_))
        ));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let mut config = valid_config();
        config.chunk_size = 50;
        config.chunk_overlap = 50;
        assert!(matches!(
            config.validate(),
            Err(RagError::Configuration(_))
        ));

        config.chunk_overlap = 49;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let mut config = valid_config();
        config.top_k = 0;
        assert!(matches!(
            config.validate(),
            Err(RagError::Configuration(_))
        ));
    }
}
