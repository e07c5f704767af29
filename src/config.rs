//! Configuration management for toolforge
//!
//! Comprehensive configuration for the registry, executor, execution
//! cache, and chain engine, with support for multiple configuration
//! sources (spec's "Ambient Stack": config loading follows the
//! teacher's `config`-crate-backed `ConfigLoader` pattern).

#[cfg(feature = "config-management")]
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Global configuration for toolforge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolforgeConfig {
    /// Registry configuration
    pub registry: RegistryConfig,
    /// Executor configuration
    pub executor: ExecutorConfig,
    /// Execution cache configuration (spec §4.2/§4.3)
    pub cache: CacheConfig,
    /// Chain engine configuration (spec §4.5)
    pub chain: ChainConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Tool-specific configurations
    pub tools: HashMap<String, ToolConfig>,
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Maximum number of tools allowed
    pub max_tools: Option<usize>,
    /// Enable concurrent access optimizations
    pub concurrent_access: bool,
    /// Cache tool metadata
    pub cache_metadata: bool,
    /// Auto-register built-in tools
    pub auto_register_builtin: bool,
    /// Tool discovery paths
    pub discovery_paths: Vec<String>,
}

/// Executor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Default timeout for tool execution
    #[serde(with = "duration_serde")]
    pub default_timeout: Duration,
    /// Maximum number of retries
    pub max_retries: u32,
    /// Enable parallel execution
    pub parallel_execution: bool,
    /// Maximum concurrent executions
    pub max_concurrent: usize,
    /// Enable execution logging
    pub enable_logging: bool,
    /// Enable performance monitoring
    pub enable_monitoring: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty, compact)
    pub format: String,
    /// Enable structured logging
    pub structured: bool,
    /// Log file path (optional)
    pub file_path: Option<String>,
    /// Enable console logging
    pub console: bool,
}

/// Execution cache configuration (spec §4.2 "Result Store" sizing knobs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum total size of cached results, in bytes.
    pub max_size_bytes: usize,
    /// Default TTL applied when a caller doesn't specify one.
    #[serde(with = "duration_serde")]
    pub default_ttl: Duration,
    /// How often the background sweep removes expired entries.
    #[serde(with = "duration_serde")]
    pub cleanup_interval: Duration,
}

/// Chain engine configuration (spec §4.5 retry/backoff defaults).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Default `maxRetries` applied to a step that doesn't set its own.
    pub default_max_retries: u32,
    /// Base of the exponential backoff (`base^(attempt-1)` seconds).
    pub default_backoff_base: u64,
}

/// Tool-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Whether the tool is enabled
    pub enabled: bool,
    /// Tool-specific timeout
    #[serde(with = "duration_serde", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    /// Tool-specific retry count
    pub retries: Option<u32>,
    /// Tool-specific settings
    pub settings: HashMap<String, serde_json::Value>,
}

impl Default for ToolforgeConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            executor: ExecutorConfig::default(),
            cache: CacheConfig::default(),
            chain: ChainConfig::default(),
            logging: LoggingConfig::default(),
            tools: HashMap::new(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 64 * 1024 * 1024,
            default_ttl: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            default_max_retries: 0,
            default_backoff_base: 2,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_tools: None,
            concurrent_access: true,
            cache_metadata: true,
            auto_register_builtin: true,
            discovery_paths: vec![],
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            max_retries: 3,
            parallel_execution: true,
            max_concurrent: 10,
            enable_logging: true,
            enable_monitoring: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            structured: false,
            file_path: None,
            console: true,
        }
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: None,
            retries: None,
            settings: HashMap::new(),
        }
    }
}

/// Configuration builder for fluent API
pub struct ConfigBuilder {
    config: ToolforgeConfig,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            config: ToolforgeConfig::default(),
        }
    }

    /// Set registry configuration
    pub fn registry(mut self, registry: RegistryConfig) -> Self {
        self.config.registry = registry;
        self
    }

    /// Set executor configuration
    pub fn executor(mut self, executor: ExecutorConfig) -> Self {
        self.config.executor = executor;
        self
    }

    /// Set execution cache configuration
    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    /// Set chain engine configuration
    pub fn chain(mut self, chain: ChainConfig) -> Self {
        self.config.chain = chain;
        self
    }

    /// Set logging configuration
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.config.logging = logging;
        self
    }

    /// Add tool configuration
    pub fn tool(mut self, name: impl Into<String>, config: ToolConfig) -> Self {
        self.config.tools.insert(name.into(), config);
        self
    }

    /// Build the configuration
    pub fn build(self) -> ToolforgeConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration loader with support for multiple sources
pub struct ConfigLoader {
    sources: Vec<ConfigSource>,
}

#[derive(Debug)]
enum ConfigSource {
    File(String),
    Environment(String),
    Defaults,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            sources: vec![ConfigSource::Defaults],
        }
    }
    
    /// Add a configuration file source
    pub fn add_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.sources.push(ConfigSource::File(
            path.as_ref().to_string_lossy().to_string()
        ));
        self
    }
    
    /// Add environment variable source
    pub fn add_env(mut self, prefix: impl Into<String>) -> Self {
        self.sources.push(ConfigSource::Environment(prefix.into()));
        self
    }
    
    /// Load configuration from all sources
    #[cfg(feature = "config-management")]
    pub fn load(self) -> Result<ToolforgeConfig, ConfigError> {
        let mut config_builder = Config::builder();
        
        // Add sources in order
        for source in self.sources {
            match source {
                ConfigSource::File(path) => {
                    config_builder = config_builder.add_source(File::with_name(&path));
                }
                ConfigSource::Environment(prefix) => {
                    config_builder = config_builder.add_source(
                        Environment::with_prefix(&prefix).separator("__")
                    );
                }
                ConfigSource::Defaults => {
                    // Defaults are handled by the struct's Default implementation
                }
            }
        }
        
        let config = config_builder.build()?;
        config.try_deserialize()
    }
    
    /// Load configuration (fallback implementation without config crate)
    #[cfg(not(feature = "config-management"))]
    pub fn load(self) -> Result<ToolforgeConfig, Box<dyn std::error::Error>> {
        // Return default configuration when config management is disabled
        Ok(ToolforgeConfig::default())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Serde helper for Duration serialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;
    
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }
    
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Configuration validation
impl ToolforgeConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        // Validate executor config
        if self.executor.max_concurrent == 0 {
            return Err("max_concurrent must be greater than 0".to_string());
        }

        if self.executor.default_timeout.as_secs() == 0 {
            return Err("default_timeout must be greater than 0".to_string());
        }

        if self.cache.max_size_bytes == 0 {
            return Err("cache.max_size_bytes must be greater than 0".to_string());
        }

        if self.chain.default_backoff_base < 2 {
            return Err("chain.default_backoff_base must be at least 2".to_string());
        }

        // Validate logging config
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err("invalid log level".to_string()),
        }

        match self.logging.format.as_str() {
            "json" | "pretty" | "compact" => {}
            _ => return Err("invalid log format".to_string()),
        }

        Ok(())
    }
}
