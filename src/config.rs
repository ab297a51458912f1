use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for MantenTask
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MantenTaskConfig {
    /// Database settings (optional)
    pub database: Option<DatabaseConfig>,
    /// Email notification settings
    pub notifications: NotificationConfig,
    /// Report document settings
    pub documents: DocumentConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL (SQLite file path or connection string)
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MailTransportKind {
    /// Log each message through tracing
    Log,
    /// Write each message as a JSON file into `outbox_dir`
    Outbox,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    /// Master switch for lifecycle emails
    pub enabled: bool,
    /// Sender address on every message
    pub from_address: String,
    /// Delivery mechanism
    pub transport: MailTransportKind,
    /// Outbox directory for the `outbox` transport
    pub outbox_dir: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DocumentConfig {
    /// Directory receiving generated report PDFs
    pub output_dir: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level used when RUST_LOG is not set
    pub log_level: String,
    /// Emit structured JSON logs instead of human-readable lines
    pub json_logs: bool,
}

impl Default for MantenTaskConfig {
    fn default() -> Self {
        Self {
            database: Some(DatabaseConfig {
                url: "sqlite://.mantentask/mantentask.db".to_string(),
                max_connections: 10,
                auto_migrate: true,
            }),
            notifications: NotificationConfig {
                enabled: false, // Opt-in; requires a relay reading the outbox
                from_address: "noreply@mantentask.local".to_string(),
                transport: MailTransportKind::Log,
                outbox_dir: ".mantentask/outbox".to_string(),
            },
            documents: DocumentConfig {
                output_dir: ".mantentask/reports".to_string(),
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
            },
        }
    }
}

impl MantenTaskConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (mantentask.toml, .mantentask-rc)
    /// 3. Environment variables (prefixed with MANTENTASK__, nested keys joined by `__`)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Same as [`MantenTaskConfig::load`] with configuration files resolved against `dir`
    pub fn load_from(dir: &Path) -> Result<Self> {
        // Start with default configuration
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        let toml_path = dir.join("mantentask.toml");
        if toml_path.exists() {
            builder = builder.add_source(File::from(toml_path));
        }

        let rc_path = dir.join(".mantentask-rc");
        if rc_path.exists() {
            builder = builder.add_source(File::from(rc_path).format(config::FileFormat::Toml));
        }

        // Override with environment variables
        builder = builder.add_source(
            Environment::with_prefix("MANTENTASK")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<MantenTaskConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = MantenTaskConfig::load_env_file();
        MantenTaskConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static MantenTaskConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}
