use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::DagcheckError;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    /// File this configuration was read from; `None` for built-in defaults.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Browser origins allowed to call the API with credentials.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
            log_level: default_log_level(),
        }
    }
}

/// What to do with an edge whose endpoint was never declared as a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DanglingPolicy {
    /// Fail the request with a 400.
    #[default]
    Reject,
    /// Keep going; an undeclared node behaves like one with no outgoing edges.
    Tolerate,
}

/// Payload validation settings
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    #[serde(default)]
    pub dangling_edges: DanglingPolicy,
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,
    #[serde(default = "default_max_edges")]
    pub max_edges: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            dangling_edges: DanglingPolicy::default(),
            max_nodes: default_max_nodes(),
            max_edges: default_max_edges(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_allowed_origins() -> Vec<String> {
    // The pipeline editor's dev server
    vec!["http://localhost:3000".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_nodes() -> usize {
    10_000
}

fn default_max_edges() -> usize {
    50_000
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. `explicit` path (e.g. from the command line), must exist
    /// 2. Path specified in DAGCHECK_CONFIG environment variable, must exist
    /// 3. ./config.toml in current directory (built-in defaults if absent)
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let _ = dotenv::dotenv();

        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        match std::env::var("DAGCHECK_CONFIG") {
            Ok(path) => Self::load_from(Path::new(&path)),
            Err(_) => {
                let default_path = PathBuf::from("config.toml");
                if default_path.exists() {
                    Self::load_from(&default_path)
                } else {
                    let config = Config::default();
                    config.validate()?;
                    Ok(config)
                }
            }
        }
    }

    /// Load and validate configuration from an explicit path.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config = Self::from_toml_str(&config_str)
            .with_context(|| format!("Invalid config file: {}", config_path.display()))?;
        config.source = Some(config_path.to_path_buf());
        Ok(config)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> crate::error::Result<()> {
        if self.server.allowed_origins.is_empty() {
            return Err(invalid(
                "server.allowed_origins must list at least one origin (e.g. \"http://localhost:3000\")",
            ));
        }

        for origin in &self.server.allowed_origins {
            // Credentialed CORS cannot be combined with a wildcard origin
            if origin == "*" {
                return Err(invalid(
                    "server.allowed_origins must not contain '*' (credentials are allowed)",
                ));
            }
            let parsed = url::Url::parse(origin).map_err(|e| {
                invalid(format!("server.allowed_origins: invalid origin '{}': {}", origin, e))
            })?;
            if parsed.host_str().is_none() || (parsed.path() != "/" && !parsed.path().is_empty()) {
                return Err(invalid(format!(
                    "server.allowed_origins: '{}' must be scheme://host[:port] with no path",
                    origin
                )));
            }
        }

        if self.validation.max_nodes == 0 {
            return Err(invalid("validation.max_nodes must be greater than 0"));
        }

        if self.validation.max_edges == 0 {
            return Err(invalid("validation.max_edges must be greater than 0"));
        }

        Ok(())
    }

    /// Human-readable origin of this configuration, for startup logs.
    pub fn source_description(&self) -> String {
        match &self.source {
            Some(path) => path.display().to_string(),
            None => "built-in defaults (no config.toml found)".to_string(),
        }
    }

    /// Address the server binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn invalid(message: impl Into<String>) -> DagcheckError {
    DagcheckError::Config(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    const FULL_CONFIG: &str = r#"
[server]
host = "0.0.0.0"
port = 9000
allowed_origins = ["http://localhost:3000", "https://editor.example.com"]
log_level = "debug"

[validation]
dangling_edges = "tolerate"
max_nodes = 100
max_edges = 200
"#;

    fn with_config_env(config_path: Option<&Path>, f: impl FnOnce()) {
        let original = std::env::var("DAGCHECK_CONFIG").ok();
        match config_path {
            Some(p) => std::env::set_var("DAGCHECK_CONFIG", p),
            None => std::env::remove_var("DAGCHECK_CONFIG"),
        }
        f();
        std::env::remove_var("DAGCHECK_CONFIG");
        if let Some(val) = original {
            std::env::set_var("DAGCHECK_CONFIG", val);
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.allowed_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.validation.dangling_edges, DanglingPolicy::Reject);
        assert_eq!(config.bind_addr(), "127.0.0.1:8000");
        assert!(config.source.is_none());
        assert!(config.source_description().contains("built-in defaults"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_toml_str(FULL_CONFIG).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.allowed_origins.len(), 2);
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.validation.dangling_edges, DanglingPolicy::Tolerate);
        assert_eq!(config.validation.max_nodes, 100);
        assert_eq!(config.validation.max_edges, 200);
    }

    #[test]
    fn test_partial_config_falls_back_to_defaults() {
        let config = Config::from_toml_str("[server]\nport = 8123\n").unwrap();
        assert_eq!(config.server.port, 8123);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.validation.max_nodes, 10_000);
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let result = Config::from_toml_str("[validation]\ndangling_edges = \"ignore\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_wildcard_origin_rejected() {
        let result = Config::from_toml_str("[server]\nallowed_origins = [\"*\"]\n");
        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains("'*'"));
    }

    #[test]
    fn test_empty_origins_rejected() {
        assert!(Config::from_toml_str("[server]\nallowed_origins = []\n").is_err());
    }

    #[test]
    fn test_validation_failure_is_config_error() {
        let config = Config {
            validation: ValidationConfig {
                max_edges: 0,
                ..ValidationConfig::default()
            },
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, DagcheckError::Config(ref msg) if msg.contains("max_edges")));
        assert!(!err.is_client_error());

        // Still reachable through the anyhow chain returned by the loaders
        let err = Config::from_toml_str("[server]\nallowed_origins = [\"*\"]\n").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DagcheckError>(),
            Some(DagcheckError::Config(_))
        ));
    }

    #[test]
    fn test_origin_with_path_rejected() {
        let result =
            Config::from_toml_str("[server]\nallowed_origins = [\"http://localhost:3000/app\"]\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_limits_rejected() {
        assert!(Config::from_toml_str("[validation]\nmax_nodes = 0\n").is_err());
        assert!(Config::from_toml_str("[validation]\nmax_edges = 0\n").is_err());
    }

    #[test]
    fn test_config_load_from_env_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("dagcheck.toml");
        fs::write(&config_path, FULL_CONFIG).unwrap();
        with_config_env(Some(config_path.as_path()), || {
            let config = Config::load(None);
            assert!(config.is_ok(), "Config::load() failed: {:?}", config.err());
            let config = config.unwrap();
            assert_eq!(config.server.port, 9000);
            assert_eq!(config.source.as_deref(), Some(config_path.as_path()));
            assert_eq!(config.source_description(), config_path.display().to_string());
        });
    }

    #[test]
    fn test_explicit_path_wins_over_env() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let explicit = temp_dir.path().join("explicit.toml");
        fs::write(&explicit, "[server]\nport = 7001\n").unwrap();
        let from_env = temp_dir.path().join("env.toml");
        fs::write(&from_env, FULL_CONFIG).unwrap();
        with_config_env(Some(from_env.as_path()), || {
            let config = Config::load(Some(explicit.as_path())).unwrap();
            assert_eq!(config.server.port, 7001);
        });
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nonexistent.toml");
        with_config_env(Some(missing.as_path()), || {
            let config = Config::load(None);
            assert!(config.is_err());
            assert!(config.unwrap_err().to_string().contains("Failed to read config file"));
        });
    }
}
