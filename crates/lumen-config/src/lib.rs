//! Configuration management for Lumen.
//!
//! Parses `lumen.toml` with serde and finds it by walking up from the current
//! directory. CLI settings are applied after loading via [`CliSettings`].
//!
//! ```toml
//! [render]
//! gfm = true
//! extract_title = false
//! renumber_lists = true
//! nesting_indent = 4
//! tabs = "lazy"
//!
//! [avatars]
//! minecraft_url = "https://mc-heads.net/avatar/{name}"
//!
//! [cache]
//! enabled = true
//! dir = ".lumen/cache"
//! ```
//!
//! ## Environment Variable Expansion
//!
//! `${VAR}` and `${VAR:-default}` are expanded in `avatars.minecraft_url` and
//! `cache.dir`.

mod expand;

use std::path::{Path, PathBuf};

use lumen_renderer::{DEFAULT_MINECRAFT_AVATAR_URL, PipelineOptions, TabsMode};
use serde::Deserialize;

/// CLI settings that override configuration file values.
#[derive(Debug, Default)]
pub struct CliSettings {
    pub tabs: Option<TabsMode>,
    pub cache_enabled: Option<bool>,
    pub renumber_lists: Option<bool>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "lumen.toml";

const DEFAULT_CACHE_DIR: &str = ".lumen/cache";

/// Accepted range for `render.nesting_indent`.
const NESTING_INDENT_RANGE: std::ops::RangeInclusive<usize> = 2..=8;

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub render: RenderConfig,
    pub avatars: AvatarsConfig,
    /// Cache section as written (paths relative to the config file).
    cache: CacheConfigRaw,

    /// Resolved cache configuration (set after loading).
    #[serde(skip)]
    pub cache_resolved: CacheConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Rendering options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub gfm: bool,
    /// Use the first H1 as the page title.
    pub extract_title: bool,
    pub renumber_lists: bool,
    /// Minimum indent of nested ordered lists.
    pub nesting_indent: usize,
    pub tabs: TabsMode,
}

impl Default for RenderConfig {
    fn default() -> Self {
        let options = PipelineOptions::default();
        Self {
            gfm: options.gfm,
            extract_title: options.extract_title,
            renumber_lists: options.renumber_lists,
            nesting_indent: options.nesting_indent,
            tabs: options.tabs,
        }
    }
}

/// Avatar sources for chat blocks.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AvatarsConfig {
    /// URL template for `avatar:minecraft`. Must contain `{name}`.
    pub minecraft_url: String,
}

impl Default for AvatarsConfig {
    fn default() -> Self {
        Self {
            minecraft_url: DEFAULT_MINECRAFT_AVATAR_URL.to_owned(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct CacheConfigRaw {
    enabled: Option<bool>,
    dir: Option<String>,
}

/// Resolved cache configuration with an absolute directory.
#[derive(Debug, Default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub dir: PathBuf,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`cache.dir`").
        field: String,
        /// Error message (e.g., "${`LUMEN_CACHE`} not set").
        message: String,
    },
}

/// Require a URL field to use http:// or https:// scheme.
fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file. Otherwise searches
    /// for `lumen.toml` in the current directory and its parents, falling back
    /// to defaults.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, or if reading,
    /// parsing, expansion or validation fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        Ok(config)
    }

    /// Pipeline options described by this configuration.
    #[must_use]
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            gfm: self.render.gfm,
            extract_title: self.render.extract_title,
            renumber_lists: self.render.renumber_lists,
            nesting_indent: self.render.nesting_indent,
            tabs: self.render.tabs,
            minecraft_avatar_url: self.avatars.minecraft_url.clone(),
        }
    }

    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(tabs) = settings.tabs {
            self.render.tabs = tabs;
        }
        if let Some(cache_enabled) = settings.cache_enabled {
            self.cache_resolved.enabled = cache_enabled;
        }
        if let Some(renumber_lists) = settings.renumber_lists {
            self.render.renumber_lists = renumber_lists;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    fn default_with_base(base: &Path) -> Self {
        Self {
            render: RenderConfig::default(),
            avatars: AvatarsConfig::default(),
            cache: CacheConfigRaw::default(),
            cache_resolved: CacheConfig {
                enabled: true,
                dir: base.join(DEFAULT_CACHE_DIR),
            },
            config_path: None,
        }
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_render()?;
        self.validate_avatars()?;
        Ok(())
    }

    fn validate_render(&self) -> Result<(), ConfigError> {
        let indent = self.render.nesting_indent;
        if !NESTING_INDENT_RANGE.contains(&indent) {
            return Err(ConfigError::Validation(format!(
                "render.nesting_indent must be between {} and {}, got {indent}",
                NESTING_INDENT_RANGE.start(),
                NESTING_INDENT_RANGE.end()
            )));
        }
        Ok(())
    }

    fn validate_avatars(&self) -> Result<(), ConfigError> {
        let url = &self.avatars.minecraft_url;
        require_http_url(url, "avatars.minecraft_url")?;
        if !url.contains("{name}") {
            return Err(ConfigError::Validation(
                "avatars.minecraft_url must contain {name}".to_owned(),
            ));
        }
        Ok(())
    }

    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.avatars.minecraft_url =
            expand::expand_env(&self.avatars.minecraft_url, "avatars.minecraft_url")?;
        if let Some(ref dir) = self.cache.dir {
            self.cache.dir = Some(expand::expand_env(dir, "cache.dir")?);
        }
        Ok(())
    }

    /// Resolve the cache directory against the config file's directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        self.cache_resolved = CacheConfig {
            enabled: self.cache.enabled.unwrap_or(true),
            dir: config_dir.join(self.cache.dir.as_deref().unwrap_or(DEFAULT_CACHE_DIR)),
        };
    }
}
