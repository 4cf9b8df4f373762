//! Configuration validation
//!
//! Validates configuration and reports issues.

use secrecy::ExposeSecret;

use super::types::cache::CacheBackendType;
use super::types::provider::ProviderKind;
use super::types::Config;

/// Result of configuration validation
#[derive(Debug, Clone)]
pub struct ConfigValidationResult {
    /// Whether the config is valid
    pub valid: bool,
    /// Validation errors (critical)
    pub errors: Vec<ValidationIssue>,
    /// Validation warnings (non-critical)
    pub warnings: Vec<ValidationIssue>,
}

impl ConfigValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        ConfigValidationResult {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Add an error
    pub fn with_error(mut self, issue: ValidationIssue) -> Self {
        self.valid = false;
        self.errors.push(issue);
        self
    }

    /// Add a warning
    pub fn with_warning(mut self, issue: ValidationIssue) -> Self {
        self.warnings.push(issue);
        self
    }
}

/// A validation issue
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the config field
    pub path: String,
    /// Issue message
    pub message: String,
    /// Suggested fix
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    /// Create a new issue
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Add a suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

/// Validate the configuration
pub fn validate_config(config: &Config) -> ConfigValidationResult {
    let mut result = ConfigValidationResult::valid();

    // Validate provider configuration
    result = validate_provider_config(config, result);

    // Validate storage configuration
    result = validate_storage_config(config, result);

    // Validate cache configuration
    result = validate_cache_config(config, result);

    // Validate search defaults
    result = validate_search_config(config, result);

    result
}

fn validate_provider_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    let openai = &config.provider.openai;

    if config.provider.kind == ProviderKind::OpenAI && openai.api_key.expose_secret().is_empty() {
        result = result.with_error(
            ValidationIssue::new("provider.openai.api_key", "OpenAI provider selected but no API key configured")
                .with_suggestion("Set OPENAI_API_KEY environment variable or switch provider.kind to local"),
        );
    }

    // The local provider still routes completions to OpenAI when a key is set
    if config.provider.kind == ProviderKind::Local && openai.api_key.expose_secret().is_empty() {
        result = result.with_warning(
            ValidationIssue::new(
                "provider.kind",
                "Local provider generates vectors only and no OpenAI key is set. Completions will be unavailable.",
            )
            .with_suggestion("Set OPENAI_API_KEY to enable completions"),
        );
    }

    if !(0.0..=2.0).contains(&openai.temperature) {
        result = result.with_error(
            ValidationIssue::new(
                "provider.openai.temperature",
                format!("Temperature {} is outside [0, 2]", openai.temperature),
            ),
        );
    }

    result
}

fn validate_storage_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    let db = &config.database;

    if db.max_connections == 0 {
        result = result.with_error(
            ValidationIssue::new("database.max_connections", "Connection pool must allow at least one connection")
                .with_suggestion("Set database.max_connections to 1 or more"),
        );
    }

    if db.dimensions == Some(0) {
        result = result.with_error(
            ValidationIssue::new("database.dimensions", "Vector dimensionality must be positive")
                .with_suggestion("Remove database.dimensions to fix it on the first insert"),
        );
    }

    if let Err(e) = db.connect_options() {
        result = result.with_error(ValidationIssue::new("database.url", e.to_string()));
    }

    result
}

fn validate_cache_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    let cache = &config.cache;

    if cache.backend == CacheBackendType::Local && cache.local.max_capacity == 0 {
        result = result.with_error(
            ValidationIssue::new("cache.local.max_capacity", "Local cache capacity must be positive"),
        );
    }

    if cache.backend == CacheBackendType::Redis && cache.redis.host.is_empty() {
        result = result.with_error(
            ValidationIssue::new("cache.redis.host", "Redis backend selected but no host configured")
                .with_suggestion("Set REDIS_HOST environment variable"),
        );
    }

    result
}

fn validate_search_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    let search = &config.search;

    if !search.threshold.is_finite() || !(-1.0..=1.0).contains(&search.threshold) {
        result = result.with_error(
            ValidationIssue::new(
                "search.threshold",
                format!("Similarity threshold {} is outside [-1, 1]", search.threshold),
            ),
        );
    }

    if search.limit == 0 {
        result = result.with_warning(
            ValidationIssue::new("search.limit", "Default limit is 0; searches without a limit return nothing"),
        );
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn openai_config() -> Config {
        let mut config = Config::default();
        config.provider.openai.api_key = SecretString::from("sk-test");
        config
    }

    #[test]
    fn test_validate_default_config() {
        let config = openai_config();
        let result = validate_config(&config);
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_missing_api_key() {
        let result = validate_config(&Config::default());
        assert!(!result.valid);
        assert_eq!(result.errors[0].path, "provider.openai.api_key");
    }

    #[test]
    fn test_local_provider_warns() {
        let mut config = Config::default();
        config.provider.kind = ProviderKind::Local;
        let result = validate_config(&config);
        assert!(result.valid);
        assert!(result.warnings.iter().any(|w| w.path == "provider.kind"));
    }

    #[test]
    fn test_local_provider_with_key_keeps_completions() {
        let mut config = openai_config();
        config.provider.kind = ProviderKind::Local;
        let result = validate_config(&config);
        assert!(result.valid);
        assert!(!result.warnings.iter().any(|w| w.path == "provider.kind"));
    }

    #[test]
    fn test_bad_search_and_pool() {
        let mut config = openai_config();
        config.search.threshold = 1.5;
        config.search.limit = 0;
        config.database.max_connections = 0;
        let result = validate_config(&config);

        let paths: Vec<_> = result.errors.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"search.threshold"));
        assert!(paths.contains(&"database.max_connections"));
        assert!(result.warnings.iter().any(|w| w.path == "search.limit"));
    }
}
