//! Runtime configuration for running program texts

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::Context;
use serde::Deserialize;

/// Placeholder replaced by the function name in a function driver
const FUNCTION_PLACEHOLDER: &str = "{function}";

/// Configuration for a program runtime
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Name of the source file (e.g., "prog.py")
    pub source_file: String,
    /// Run command, executed inside the run directory
    pub run_command: Vec<String>,
    /// Line-comment introducer
    pub comment_prefix: String,
    /// Helper source prepended to every program
    pub prelude: Option<String>,
    /// Function-mode driver template
    pub function_driver: Option<String>,
}

impl RuntimeConfig {
    /// Program text with the runtime prelude, if any, in front
    pub fn with_prelude(&self, source: &str) -> String {
        match &self.prelude {
            Some(prelude) => format!("{}\n{}", prelude, source),
            None => source.to_string(),
        }
    }

    /// Source that calls `function` through the driver, or `None` if the
    /// runtime cannot drive function calls
    pub fn function_program(&self, source: &str, function: &str) -> Option<String> {
        let driver = self.function_driver.as_ref()?;
        Some(format!(
            "{}\n{}",
            self.with_prelude(source),
            driver.replace(FUNCTION_PLACEHOLDER, function)
        ))
    }
}

/// Raw TOML configuration for a runtime
#[derive(Debug, Deserialize)]
struct RawRuntimeConfig {
    source_file: String,
    run_command: String,
    #[serde(default = "default_comment_prefix")]
    comment_prefix: String,
    prelude: Option<String>,
    function_driver: Option<String>,
    #[serde(default)]
    aliases: Vec<String>,
}

fn default_comment_prefix() -> String {
    "#".to_string()
}

/// Runtimes keyed by lowercase name and alias
#[derive(Debug, Clone, Default)]
pub struct RuntimeRegistry {
    runtimes: HashMap<String, RuntimeConfig>,
}

impl RuntimeRegistry {
    /// Registry from the runtimes file bundled with the crate
    pub fn bundled() -> anyhow::Result<Self> {
        let content = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/files/runtimes.toml"));
        Self::from_toml(content)
    }

    /// Registry from a runtimes file on disk
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read runtimes config {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let raw_configs: HashMap<String, RawRuntimeConfig> =
            toml::from_str(content).context("Invalid runtimes config")?;

        let mut runtimes = HashMap::new();
        for (name, raw) in raw_configs {
            let run_command = into_command(&raw.run_command);
            if run_command.is_empty() {
                anyhow::bail!("Empty run_command for runtime {}", name);
            }
            let config = RuntimeConfig {
                source_file: raw.source_file,
                run_command,
                comment_prefix: raw.comment_prefix,
                prelude: raw.prelude,
                function_driver: raw.function_driver,
            };

            for alias in raw.aliases {
                runtimes.insert(alias.to_lowercase(), config.clone());
            }
            runtimes.insert(name.to_lowercase(), config);
        }

        Ok(Self { runtimes })
    }

    pub fn get(&self, name: &str) -> Option<&RuntimeConfig> {
        self.runtimes.get(&name.to_lowercase())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.runtimes.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Global runtime registry
static RUNTIMES: OnceLock<RuntimeRegistry> = OnceLock::new();

/// Initialize runtimes from `path`, or from the bundled file when `None`
pub fn init_runtimes(path: Option<&Path>) -> anyhow::Result<()> {
    let registry = match path {
        Some(path) => RuntimeRegistry::from_file(path)?,
        None => RuntimeRegistry::bundled()?,
    };

    RUNTIMES
        .set(registry)
        .map_err(|_| anyhow::anyhow!("Runtimes already initialized"))?;

    Ok(())
}

/// Get the global registry (empty until initialized)
pub fn registry() -> &'static RuntimeRegistry {
    RUNTIMES.get().unwrap_or_else(|| {
        static EMPTY: OnceLock<RuntimeRegistry> = OnceLock::new();
        EMPTY.get_or_init(RuntimeRegistry::default)
    })
}

fn into_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(|s| s.to_string()).collect()
}
