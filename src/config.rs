//! Grader configuration
//!
//! Loaded from the environment (after `.env`), stored once, and read through
//! `get_config()` with a default fallback.

use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::Context;
use tracing::warn;

/// Default wall-clock budget for one run, in milliseconds
pub const DEFAULT_TIMEOUT_MS: u32 = 4000;

/// Default number of characters shown per text block in the report
pub const DEFAULT_DISPLAY_LIMIT: usize = 4000;

/// Grader configuration
#[derive(Debug, Clone)]
pub struct GraderConfig {
    /// Wall-clock limit for each reference/candidate run
    pub timeout_ms: u32,
    /// Display-only truncation threshold for report text
    pub display_limit: usize,
    /// Runtime used when a request does not name one
    pub default_runtime: String,
    /// Directory holding attachment files
    pub attachments_dir: PathBuf,
    /// Root for per-run scratch directories (system temp dir when unset)
    pub scratch_root: Option<PathBuf>,
    /// Worker ID, used to namespace scratch directories
    pub worker_id: u32,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            display_limit: DEFAULT_DISPLAY_LIMIT,
            default_runtime: "python".to_string(),
            attachments_dir: PathBuf::from("."),
            scratch_root: None,
            worker_id: 0,
        }
    }
}

impl GraderConfig {
    /// Read configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let timeout_ms = match std::env::var("JUDGE_TIMEOUT_MS") {
            Ok(v) => v
                .parse::<u32>()
                .with_context(|| format!("Invalid JUDGE_TIMEOUT_MS: {}", v))?,
            Err(_) => defaults.timeout_ms,
        };
        let display_limit = match std::env::var("JUDGE_DISPLAY_LIMIT") {
            Ok(v) => v
                .parse::<usize>()
                .with_context(|| format!("Invalid JUDGE_DISPLAY_LIMIT: {}", v))?,
            Err(_) => defaults.display_limit,
        };
        let default_runtime =
            std::env::var("JUDGE_RUNTIME").unwrap_or(defaults.default_runtime);
        let attachments_dir = std::env::var("JUDGE_ATTACHMENTS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.attachments_dir);
        let scratch_root = std::env::var("JUDGE_SCRATCH_DIR").ok().map(PathBuf::from);

        Ok(Self {
            timeout_ms,
            display_limit,
            default_runtime,
            attachments_dir,
            scratch_root,
            worker_id: defaults.worker_id,
        })
    }

    pub fn with_worker_id(mut self, worker_id: u32) -> Self {
        self.worker_id = worker_id;
        self
    }
}

/// Global grader configuration
static GRADER_CONFIG: OnceLock<GraderConfig> = OnceLock::new();

/// Initialize the global configuration
pub fn init_config(config: GraderConfig) -> anyhow::Result<()> {
    GRADER_CONFIG
        .set(config)
        .map_err(|_| anyhow::anyhow!("Grader configuration already initialized"))
}

/// Get grader configuration
pub fn get_config() -> &'static GraderConfig {
    GRADER_CONFIG.get().unwrap_or_else(|| {
        static DEFAULT: OnceLock<GraderConfig> = OnceLock::new();

        warn!("Grader configuration not initialized, using default");
        DEFAULT.get_or_init(GraderConfig::default)
    })
}
