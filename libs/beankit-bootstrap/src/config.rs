use anyhow::{Context, Result};
use beankit::{BootstrapArgs, ContextHandle};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Environment prefix for layered overrides, e.g. `BEANKIT__HOME_DIR=/srv/app`.
pub const ENV_PREFIX: &str = "BEANKIT__";

/// Application configuration: where relative paths are anchored, how to log,
/// and which contexts to bootstrap.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Base directory for relative locations and log files.
    /// Empty means "directory of the config file" (or the working directory).
    #[serde(default)]
    pub home_dir: String,
    /// Logging configuration (optional, uses defaults if None).
    pub logging: Option<LoggingConfig>,
    /// Contexts in construction order; parents must be declared before children.
    #[serde(default)]
    pub contexts: Vec<ContextConfig>,
}

/// One context to bootstrap.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ContextConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// Name of a context declared earlier in the list.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub case_sensitive: Option<bool>,
    #[serde(default)]
    pub refresh: bool,
}

impl ContextConfig {
    /// Translate into bootstrap args; the parent name must already be resolved to a handle.
    pub fn to_bootstrap_args(&self, parent: Option<ContextHandle>) -> BootstrapArgs {
        let mut args = BootstrapArgs::new();
        args.set_configuration_locations(self.locations.iter().cloned());
        if let Some(name) = &self.name {
            args.set_name(name.clone());
        }
        if let Some(cs) = self.case_sensitive {
            args.set_case_sensitive(cs);
        }
        args.set_parent_context(parent);
        args.set_refresh(self.refresh);
        args
    }
}

/// Logging configuration - maps subsystem (target prefix) names to their settings.
/// Key "default" is the catch-all for logs that don't match explicit subsystems.
pub type LoggingConfig = HashMap<String, Section>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Section {
    /// "trace" | "debug" | "info" | "warn" | "error" | "off"
    pub console_level: String,
    /// Log file path, relative paths resolve against `home_dir`. Empty disables file output.
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub file_level: String,
    #[serde(default)]
    pub max_backups: Option<usize>,
    #[serde(default)]
    pub max_size_mb: Option<u64>,
}

/// Create a default logging configuration.
pub fn default_logging_config() -> LoggingConfig {
    let mut logging = HashMap::new();
    logging.insert(
        "default".to_string(),
        Section {
            console_level: "info".to_string(),
            file: String::new(),
            file_level: "debug".to_string(),
            max_backups: Some(3),
            max_size_mb: Some(100),
        },
    );
    logging
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            home_dir: String::new(),
            logging: Some(default_logging_config()),
            contexts: Vec::new(),
        }
    }
}

/// Structural problems in the `contexts` list.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("context name '{0}' is declared more than once")]
    DuplicateContextName(String),
    #[error("context #{index} names parent '{parent}', which is not declared before it")]
    UnknownParent { index: usize, parent: String },
}

impl AppConfig {
    /// Load configuration with layered loading: defaults → YAML file → environment variables.
    /// Resolves `home_dir` against the config file's directory and validates the context list.
    pub fn load_layered<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        use figment::{
            providers::{Env, Format, Serialized, Yaml},
            Figment,
        };

        let config_path = config_path.as_ref();

        // Optional sections stay None unless YAML/ENV provide them.
        let base = AppConfig {
            home_dir: String::new(),
            logging: None,
            contexts: Vec::new(),
        };

        let figment = Figment::new()
            .merge(Serialized::defaults(base))
            .merge(Yaml::file(config_path))
            // Example: BEANKIT__HOME_DIR=/srv/app maps to home_dir
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let mut config: AppConfig = figment
            .extract()
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

        let anchor = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.normalize_home_dir(&anchor)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file or fall back to defaults anchored at the working directory.
    pub fn load_or_default<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_layered(path),
            None => {
                let mut c = Self::default();
                let cwd = std::env::current_dir().context("Failed to read working directory")?;
                c.normalize_home_dir(&cwd)?;
                Ok(c)
            }
        }
    }

    /// Serialize configuration to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config to YAML")
    }

    pub fn home_dir(&self) -> &Path {
        Path::new(&self.home_dir)
    }

    /// Apply overrides from command line arguments.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        let logging = self.logging.get_or_insert_with(default_logging_config);
        if let Some(default_section) = logging.get_mut("default") {
            default_section.console_level = match args.verbose {
                0 => default_section.console_level.clone(), // keep
                1 => "debug".to_string(),
                _ => "trace".to_string(),
            };
        }
    }

    /// Context names are unique; a parent must be declared before its children.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut declared = HashSet::new();
        for (index, ctx) in self.contexts.iter().enumerate() {
            if let Some(parent) = &ctx.parent {
                if !declared.contains(parent.as_str()) {
                    return Err(ConfigError::UnknownParent {
                        index,
                        parent: parent.clone(),
                    });
                }
            }
            if let Some(name) = &ctx.name {
                if !declared.insert(name.as_str()) {
                    return Err(ConfigError::DuplicateContextName(name.clone()));
                }
            }
        }
        Ok(())
    }

    /// Make `home_dir` absolute: empty → `anchor`, relative → `anchor/home_dir`.
    fn normalize_home_dir(&mut self, anchor: &Path) -> Result<()> {
        let raw = self.home_dir.trim();
        let resolved: PathBuf = if raw.is_empty() {
            anchor.to_path_buf()
        } else if Path::new(raw).is_absolute() {
            PathBuf::from(raw)
        } else {
            anchor.join(raw)
        };
        let resolved = if resolved.is_absolute() {
            resolved
        } else {
            std::env::current_dir()
                .context("Failed to read working directory")?
                .join(resolved)
        };
        self.home_dir = resolved.to_string_lossy().to_string();
        Ok(())
    }
}

/// Command line settings that feed into the loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// `-v` count: 1 raises the console to debug, 2+ to trace.
    pub verbose: u8,
}
