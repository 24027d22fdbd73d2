//! Orchestrator configuration with sensible defaults.
//!
//! [`SourcePriorityConfig`] fixes the order in which sources are consulted
//! and the short-circuit/fallback policy. It is validated once when it is
//! built and is read-only afterwards. [`OrchestratorConfig`] bundles it with
//! cache limits and resource knobs, and can be loaded from TOML.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SearchError;
use crate::types::Source;

/// Validated, immutable source ordering and fan-out policy.
///
/// Construct with [`SourcePriorityConfig::new`] or from a dynamic value with
/// [`SourcePriorityConfig::from_value`]. Serde deserialisation goes through
/// the same validation, so a bad `[source_priority]` table fails config
/// loading instead of producing a half-valid orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct SourcePriorityConfig {
    priority: Vec<Source>,
    stop_on_first: bool,
    fallback_on_error: bool,
}

impl Default for SourcePriorityConfig {
    fn default() -> Self {
        Self {
            priority: Source::all().to_vec(),
            stop_on_first: true,
            fallback_on_error: true,
        }
    }
}

impl SourcePriorityConfig {
    /// Build a priority config, rejecting empty or repeated source lists.
    pub fn new(
        priority: Vec<Source>,
        stop_on_first: bool,
        fallback_on_error: bool,
    ) -> Result<Self, SearchError> {
        if priority.is_empty() {
            return Err(SearchError::Configuration(
                "priority must list at least one source".into(),
            ));
        }
        for (i, source) in priority.iter().enumerate() {
            if priority[..i].contains(source) {
                return Err(SearchError::Configuration(format!(
                    "priority lists source '{source}' more than once"
                )));
            }
        }
        Ok(Self {
            priority,
            stop_on_first,
            fallback_on_error,
        })
    }

    /// Validate a dynamically-typed config object.
    ///
    /// Accepts `stopOnFirst`/`fallbackOnError` as well as their snake_case
    /// spellings. Fails when the object is absent, `priority` is missing, not
    /// a list, empty, or names an unknown source, or when either flag is
    /// missing or not a boolean.
    pub fn from_value(value: Option<&Value>) -> Result<Self, SearchError> {
        let Some(value) = value else {
            return Err(SearchError::Configuration(
                "source priority config is missing".into(),
            ));
        };
        let Some(object) = value.as_object() else {
            return Err(SearchError::Configuration(
                "source priority config must be an object".into(),
            ));
        };

        let items = match object.get("priority") {
            None | Some(Value::Null) => {
                return Err(SearchError::Configuration("priority is required".into()))
            }
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(SearchError::Configuration(
                    "priority must be an array of sources".into(),
                ))
            }
        };
        let priority = items
            .iter()
            .map(|item| match item.as_str() {
                Some(name) => name.parse::<Source>(),
                None => Err(SearchError::Configuration(format!(
                    "invalid source {item}: expected a string"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let stop_on_first = bool_field(object, "stopOnFirst", "stop_on_first")?;
        let fallback_on_error = bool_field(object, "fallbackOnError", "fallback_on_error")?;
        Self::new(priority, stop_on_first, fallback_on_error)
    }

    /// Sources in the order they are consulted by default.
    pub fn priority(&self) -> &[Source] {
        &self.priority
    }

    /// Whether fan-out stops at the first source that returns results.
    pub fn stop_on_first(&self) -> bool {
        self.stop_on_first
    }

    /// Whether a failing source is retried against its stale data.
    pub fn fallback_on_error(&self) -> bool {
        self.fallback_on_error
    }
}

impl TryFrom<Value> for SourcePriorityConfig {
    type Error = SearchError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(Some(&value))
    }
}

fn bool_field(object: &Map<String, Value>, camel: &str, snake: &str) -> Result<bool, SearchError> {
    match object.get(camel).or_else(|| object.get(snake)) {
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(other) => Err(SearchError::Configuration(format!(
            "{camel} must be a boolean, got {other}"
        ))),
        None => Err(SearchError::Configuration(format!("{camel} is required"))),
    }
}

/// Size and lifetime limits for one bounded cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheLimits {
    /// Time-to-live for each entry, in seconds.
    pub ttl_secs: u64,
    /// Maximum number of entries.
    pub max_entries: u64,
    /// Maximum estimated size of all entries, in bytes.
    pub max_bytes: u64,
}

impl CacheLimits {
    /// Limits for the search results cache: 5 minutes, 200 entries, 15 MiB.
    pub const fn search_results() -> Self {
        Self {
            ttl_secs: 5 * 60,
            max_entries: 200,
            max_bytes: 15 * 1024 * 1024,
        }
    }

    /// Limits for the index snapshot cache: 15 minutes, 100 entries, 20 MiB.
    pub const fn index() -> Self {
        Self {
            ttl_secs: 15 * 60,
            max_entries: 100,
            max_bytes: 20 * 1024 * 1024,
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    fn validate(&self, name: &str) -> Result<(), SearchError> {
        if self.ttl_secs == 0 {
            return Err(SearchError::Configuration(format!(
                "{name}.ttl_secs must be greater than 0"
            )));
        }
        if self.max_entries == 0 {
            return Err(SearchError::Configuration(format!(
                "{name}.max_entries must be greater than 0"
            )));
        }
        if self.max_bytes == 0 {
            return Err(SearchError::Configuration(format!(
                "{name}.max_bytes must be greater than 0"
            )));
        }
        if self.max_bytes > u64::from(u32::MAX) {
            return Err(SearchError::Configuration(format!(
                "{name}.max_bytes must not exceed {}",
                u32::MAX
            )));
        }
        Ok(())
    }
}

/// Configuration for a [`crate::UnifiedSearch`] instance.
///
/// Use [`Default::default()`] for sensible defaults, or load a TOML file
/// with [`OrchestratorConfig::load`]. Missing keys fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Source ordering and fan-out policy.
    pub source_priority: SourcePriorityConfig,
    /// Limits for the cache of paginated search results.
    pub results_cache: CacheLimits,
    /// Limits for the cache of remote index snapshots.
    pub index_cache: CacheLimits,
    /// Resident memory (MiB) above which caches are cleaned between sources.
    pub memory_threshold_mb: u64,
    /// How many sources may be queried at once during full fan-out.
    pub max_concurrent_sources: usize,
    /// Per-source result cap, and streaming cap, when a call sets none.
    pub default_max_results: usize,
    /// Result sets with at least this many candidates are not cached.
    pub cache_candidate_limit: usize,
    /// Post-processing yields to the scheduler every this many items.
    pub yield_every: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            source_priority: SourcePriorityConfig::default(),
            results_cache: CacheLimits::search_results(),
            index_cache: CacheLimits::index(),
            memory_threshold_mb: 200,
            max_concurrent_sources: 3,
            default_max_results: 1000,
            cache_candidate_limit: 1000,
            yield_every: 256,
        }
    }
}

impl OrchestratorConfig {
    /// Parse a TOML document and validate the result.
    pub fn from_toml_str(raw: &str) -> Result<Self, SearchError> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| SearchError::Configuration(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SearchError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SearchError::Configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - both cache limit sets have non-zero TTL, entry and byte limits
    /// - `max_concurrent_sources` must be greater than 0
    /// - `default_max_results` must be greater than 0
    /// - `yield_every` must be greater than 0
    pub fn validate(&self) -> Result<(), SearchError> {
        self.results_cache.validate("results_cache")?;
        self.index_cache.validate("index_cache")?;
        if self.max_concurrent_sources == 0 {
            return Err(SearchError::Configuration(
                "max_concurrent_sources must be greater than 0".into(),
            ));
        }
        if self.default_max_results == 0 {
            return Err(SearchError::Configuration(
                "default_max_results must be greater than 0".into(),
            ));
        }
        if self.yield_every == 0 {
            return Err(SearchError::Configuration(
                "yield_every must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn memory_threshold_bytes(&self) -> u64 {
        self.memory_threshold_mb.saturating_mul(1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_priority_is_local_github_collection() {
        let config = SourcePriorityConfig::default();
        assert_eq!(
            config.priority(),
            &[Source::Local, Source::GitHub, Source::Collection]
        );
        assert!(config.stop_on_first());
        assert!(config.fallback_on_error());
    }

    #[test]
    fn empty_priority_rejected() {
        let err = SourcePriorityConfig::new(vec![], true, true).unwrap_err();
        assert!(err.to_string().contains("at least one source"));
    }

    #[test]
    fn duplicate_priority_rejected() {
        let err =
            SourcePriorityConfig::new(vec![Source::Local, Source::Local], true, true).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn missing_config_rejected() {
        let err = SourcePriorityConfig::from_value(None).unwrap_err();
        assert!(err.to_string().contains("missing"));
        let err = SourcePriorityConfig::from_value(Some(&json!("local"))).unwrap_err();
        assert!(err.to_string().contains("object"));
    }

    #[test]
    fn priority_shape_validated() {
        let missing = json!({ "stopOnFirst": true, "fallbackOnError": true });
        assert!(SourcePriorityConfig::from_value(Some(&missing))
            .unwrap_err()
            .to_string()
            .contains("priority is required"));

        let not_list = json!({ "priority": "local", "stopOnFirst": true, "fallbackOnError": true });
        assert!(SourcePriorityConfig::from_value(Some(&not_list))
            .unwrap_err()
            .to_string()
            .contains("array"));

        let empty = json!({ "priority": [], "stopOnFirst": true, "fallbackOnError": true });
        assert!(SourcePriorityConfig::from_value(Some(&empty)).is_err());
    }

    #[test]
    fn invalid_source_names_rejected() {
        let unknown = json!({ "priority": ["local", "gitlab"], "stopOnFirst": true, "fallbackOnError": true });
        let err = SourcePriorityConfig::from_value(Some(&unknown)).unwrap_err();
        assert!(err.to_string().contains("gitlab"));

        let number = json!({ "priority": [1], "stopOnFirst": true, "fallbackOnError": true });
        assert!(SourcePriorityConfig::from_value(Some(&number)).is_err());
    }

    #[test]
    fn non_boolean_flags_rejected() {
        let stop = json!({ "priority": ["local"], "stopOnFirst": "yes", "fallbackOnError": true });
        let err = SourcePriorityConfig::from_value(Some(&stop)).unwrap_err();
        assert!(err.to_string().contains("stopOnFirst must be a boolean"));

        let fallback = json!({ "priority": ["local"], "stopOnFirst": true, "fallbackOnError": 1 });
        let err = SourcePriorityConfig::from_value(Some(&fallback)).unwrap_err();
        assert!(err.to_string().contains("fallbackOnError must be a boolean"));

        let absent = json!({ "priority": ["local"], "stopOnFirst": true });
        assert!(SourcePriorityConfig::from_value(Some(&absent)).is_err());
    }

    #[test]
    fn camel_and_snake_case_flags_accepted() {
        let camel = json!({ "priority": ["github", "local"], "stopOnFirst": false, "fallbackOnError": true });
        let config = SourcePriorityConfig::from_value(Some(&camel)).expect("valid");
        assert_eq!(config.priority(), &[Source::GitHub, Source::Local]);
        assert!(!config.stop_on_first());

        let snake = json!({ "priority": ["collection"], "stop_on_first": true, "fallback_on_error": false });
        let config = SourcePriorityConfig::from_value(Some(&snake)).expect("valid");
        assert!(!config.fallback_on_error());
    }

    #[test]
    fn default_config_has_sensible_values() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.results_cache.ttl_secs, 300);
        assert_eq!(config.results_cache.max_entries, 200);
        assert_eq!(config.results_cache.max_bytes, 15 * 1024 * 1024);
        assert_eq!(config.index_cache.ttl_secs, 900);
        assert_eq!(config.index_cache.max_entries, 100);
        assert_eq!(config.index_cache.max_bytes, 20 * 1024 * 1024);
        assert_eq!(config.memory_threshold_mb, 200);
        assert_eq!(config.max_concurrent_sources, 3);
        assert_eq!(config.default_max_results, 1000);
        assert_eq!(config.cache_candidate_limit, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_concurrency_rejected() {
        let config = OrchestratorConfig {
            max_concurrent_sources: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_concurrent_sources"));
    }

    #[test]
    fn zero_cache_ttl_rejected() {
        let config = OrchestratorConfig {
            results_cache: CacheLimits {
                ttl_secs: 0,
                ..CacheLimits::search_results()
            },
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("results_cache.ttl_secs"));
    }

    #[test]
    fn toml_overrides_merge_with_defaults() {
        let raw = r#"
            memory_threshold_mb = 512

            [source_priority]
            priority = ["github", "collection"]
            stop_on_first = false
            fallback_on_error = true

            [index_cache]
            ttl_secs = 60
            max_entries = 10
            max_bytes = 1048576
        "#;
        let config = OrchestratorConfig::from_toml_str(raw).expect("valid toml");
        assert_eq!(config.memory_threshold_mb, 512);
        assert_eq!(
            config.source_priority.priority(),
            &[Source::GitHub, Source::Collection]
        );
        assert!(!config.source_priority.stop_on_first());
        assert_eq!(config.index_cache.ttl_secs, 60);
        assert_eq!(config.results_cache, CacheLimits::search_results());
    }

    #[test]
    fn toml_with_invalid_priority_fails_to_load() {
        let raw = r#"
            [source_priority]
            priority = []
            stop_on_first = true
            fallback_on_error = true
        "#;
        let err = OrchestratorConfig::from_toml_str(raw).unwrap_err();
        assert!(err.to_string().contains("config error"));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("unified-index.toml");
        std::fs::write(&path, "max_concurrent_sources = 2\n").expect("write config");
        let config = OrchestratorConfig::load(&path).expect("load");
        assert_eq!(config.max_concurrent_sources, 2);
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let err = OrchestratorConfig::load("/nonexistent/unified-index.toml").unwrap_err();
        assert!(matches!(err, SearchError::Configuration(_)));
    }
}
