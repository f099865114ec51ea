use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::collaborators::{ComparisonMode, SummaryStyle};
use crate::error::AppError;

/// Default per-file upload limit (50 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub storage: StorageConfig,
    pub limits: LimitsConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub server: ServerConfig,
    pub tasks: TaskConfig,
}

/// Completion endpoint configuration.
///
/// `endpoint_url: None` selects the offline model.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub endpoint_url: Option<String>,
    pub api_key: String,
    pub app_key: String,
    pub source: String,
    pub max_tokens: u32,
    pub account_type: u32,
}

/// On-disk layout for the document cache
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub purge_on_shutdown: bool,
}

/// Upload limits
#[derive(Debug, Clone)]
pub struct LimitsConfig {
    pub max_upload_bytes: u64,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Collaborator call configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// HTTP listener configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

/// Fixed task parameters used by the dispatcher
#[derive(Debug, Clone)]
pub struct TaskConfig {
    pub summary_style: SummaryStyle,
    pub comparison_mode: ComparisonMode,
    pub retrieval_k: usize,
}

impl StorageConfig {
    /// Directory holding raw uploaded bytes.
    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    /// Directory holding serialized index blobs.
    pub fn indices_dir(&self) -> PathBuf {
        self.data_dir.join("indices")
    }

    /// Path of the cache manifest.
    pub fn manifest_path(&self) -> PathBuf {
        self.data_dir.join("manifest.json")
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let llm = LlmConfig {
            endpoint_url: env::var("LLM_ENDPOINT_URL")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            api_key: env::var("LLM_API_KEY").unwrap_or_default(),
            app_key: env::var("LLM_APP_KEY").unwrap_or_else(|_| "DOCASSIST".to_string()),
            source: env::var("LLM_SOURCE").unwrap_or_else(|_| "doc-assistant".to_string()),
            max_tokens: parse_or("LLM_MAX_TOKENS", 4000),
            account_type: parse_or("LLM_ACCOUNT_TYPE", 2),
        };

        let storage = StorageConfig {
            data_dir: PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string())),
            purge_on_shutdown: env::var("PURGE_ON_SHUTDOWN")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        };

        let limits = LimitsConfig {
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: parse_or("REQUEST_TIMEOUT_MS", 30000),
            max_retries: parse_or("MAX_RETRIES", 0),
            retry_delay_ms: parse_or("RETRY_DELAY_MS", 1000),
        };

        let server = ServerConfig {
            bind: env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8000".to_string()),
        };

        let tasks = TaskConfig {
            summary_style: parse_enum("SUMMARY_STYLE", SummaryStyle::Brief)?,
            comparison_mode: parse_enum("COMPARISON_MODE", ComparisonMode::Comprehensive)?,
            retrieval_k: parse_or("RETRIEVAL_K", 5usize).max(1),
        };

        Ok(Config {
            llm,
            storage,
            limits,
            logging,
            request,
            server,
            tasks,
        })
    }
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_enum<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr<Err = String>,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|e| AppError::Config {
            message: format!("{}: {}", key, e),
        }),
        _ => Ok(default),
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            api_key: String::new(),
            app_key: "DOCASSIST".to_string(),
            source: "doc-assistant".to_string(),
            max_tokens: 4000,
            account_type: 2,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            max_retries: 0,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            summary_style: SummaryStyle::Brief,
            comparison_mode: ComparisonMode::Comprehensive,
            retrieval_k: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Configuration rooted at `data_dir` with every other value defaulted.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            llm: LlmConfig::default(),
            storage: StorageConfig {
                data_dir: data_dir.into(),
                purge_on_shutdown: false,
            },
            limits: LimitsConfig::default(),
            logging: LoggingConfig::default(),
            request: RequestConfig::default(),
            server: ServerConfig {
                bind: "127.0.0.1:8000".to_string(),
            },
            tasks: TaskConfig::default(),
        }
    }
}
