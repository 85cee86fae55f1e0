//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub endpoints: EndpointConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// One URL per hosted function
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_list_url")]
    pub list: String,

    #[serde(default = "default_load_url")]
    pub load: String,

    #[serde(default = "default_save_url")]
    pub save: String,

    #[serde(default = "default_delete_url")]
    pub delete: String,

    #[serde(default = "default_canvas_url")]
    pub canvas: String,

    #[serde(default = "default_suggestions_url")]
    pub suggestions: String,

    #[serde(default = "default_image_url")]
    pub image: String,
}

fn default_list_url() -> String {
    "https://epokscvush.execute-api.us-east-1.amazonaws.com/prod/list".to_string()
}

fn default_load_url() -> String {
    "https://6hqpsv28p0.execute-api.us-east-1.amazonaws.com/prod/load".to_string()
}

fn default_save_url() -> String {
    "https://i7p8c7igtl.execute-api.us-east-1.amazonaws.com/prod/save".to_string()
}

fn default_delete_url() -> String {
    "https://y7ur3yspla.execute-api.us-east-1.amazonaws.com/prod/delete".to_string()
}

fn default_canvas_url() -> String {
    "https://pbdllb0wt8.execute-api.us-east-1.amazonaws.com/prod/canvas".to_string()
}

fn default_suggestions_url() -> String {
    "https://nocgxc2zhc.execute-api.us-east-1.amazonaws.com/prod/writersblock".to_string()
}

fn default_image_url() -> String {
    "https://j3fis510x1.execute-api.us-east-1.amazonaws.com/prod/imagegenerator".to_string()
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            list: default_list_url(),
            load: default_load_url(),
            save: default_save_url(),
            delete: default_delete_url(),
            canvas: default_canvas_url(),
            suggestions: default_suggestions_url(),
            image: default_image_url(),
        }
    }
}

impl EndpointConfig {
    /// Point every endpoint at `<base>/<operation>`, for self-hosted stores
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            list: format!("{}/list", base),
            load: format!("{}/load", base),
            save: format!("{}/save", base),
            delete: format!("{}/delete", base),
            canvas: format!("{}/canvas", base),
            suggestions: format!("{}/writersblock", base),
            image: format!("{}/imagegenerator", base),
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_request_timeout() -> u64 {
    30_000
}

fn default_user_agent() -> String {
    format!("StoryTime/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Fixed delays of the view flow and the session widgets
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TimingConfig {
    /// Boot animation before the landing page
    #[serde(default = "default_boot_ms")]
    pub boot_ms: u64,

    /// Transitional loader between landing and editor
    #[serde(default = "default_start_ms")]
    pub start_ms: u64,

    /// Delay before a freshly opened canvas gets its surface
    #[serde(default = "default_canvas_mount_ms")]
    pub canvas_mount_ms: u64,

    /// Delay before reloading the story map after a story load
    #[serde(default = "default_canvas_reload_ms")]
    pub canvas_reload_ms: u64,

    /// Delay before re-listing characters after a character save
    #[serde(default = "default_roster_refresh_ms")]
    pub roster_refresh_ms: u64,

    /// Star field frame interval on the landing page
    #[serde(default = "default_star_frame_ms")]
    pub star_frame_ms: u64,

    /// Tech stack rotation interval on the about page
    #[serde(default = "default_tech_rotate_ms")]
    pub tech_rotate_ms: u64,
}

fn default_boot_ms() -> u64 {
    3000
}

fn default_start_ms() -> u64 {
    2000
}

fn default_canvas_mount_ms() -> u64 {
    100
}

fn default_canvas_reload_ms() -> u64 {
    500
}

fn default_roster_refresh_ms() -> u64 {
    100
}

fn default_star_frame_ms() -> u64 {
    16
}

fn default_tech_rotate_ms() -> u64 {
    2000
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            boot_ms: default_boot_ms(),
            start_ms: default_start_ms(),
            canvas_mount_ms: default_canvas_mount_ms(),
            canvas_reload_ms: default_canvas_reload_ms(),
            roster_refresh_ms: default_roster_refresh_ms(),
            star_frame_ms: default_star_frame_ms(),
            tech_rotate_ms: default_tech_rotate_ms(),
        }
    }
}

impl TimingConfig {
    /// No delays at all. Ambient intervals keep a 1ms floor.
    pub fn immediate() -> Self {
        Self {
            boot_ms: 0,
            start_ms: 0,
            canvas_mount_ms: 0,
            canvas_reload_ms: 0,
            roster_refresh_ms: 0,
            star_frame_ms: 1,
            tech_rotate_ms: 1,
        }
    }

    pub fn boot(&self) -> Duration {
        Duration::from_millis(self.boot_ms)
    }

    pub fn start(&self) -> Duration {
        Duration::from_millis(self.start_ms)
    }

    pub fn canvas_mount(&self) -> Duration {
        Duration::from_millis(self.canvas_mount_ms)
    }

    pub fn canvas_reload(&self) -> Duration {
        Duration::from_millis(self.canvas_reload_ms)
    }

    pub fn roster_refresh(&self) -> Duration {
        Duration::from_millis(self.roster_refresh_ms)
    }

    pub fn star_frame(&self) -> Duration {
        Duration::from_millis(self.star_frame_ms.max(1))
    }

    pub fn tech_rotate(&self) -> Duration {
        Duration::from_millis(self.tech_rotate_ms.max(1))
    }
}

/// Editor session preferences
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_language")]
    pub default_language: String,

    #[serde(default = "default_dark_mode")]
    pub dark_mode: bool,

    /// Directory for locally exported story maps
    #[serde(default = "default_export_dir")]
    pub export_dir: String,

    /// Report a save whose response never arrived as (unconfirmed) success
    #[serde(default)]
    pub assume_saved_on_transport_error: bool,
}

fn default_language() -> String {
    "English".to_string()
}

fn default_dark_mode() -> bool {
    true
}

fn default_export_dir() -> String {
    ".".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_language: default_language(),
            dark_mode: default_dark_mode(),
            export_dir: default_export_dir(),
            assume_saved_on_transport_error: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("storytime").join("config.toml")),
            Some(PathBuf::from("/etc/storytime/config.toml")),
            Some(PathBuf::from("./storytime.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        // A shared base URL first, so per-endpoint overrides win
        if let Ok(base) = std::env::var("STORYTIME_BASE_URL") {
            self.endpoints = EndpointConfig::with_base(&base);
        }

        let endpoint_vars: [(&str, &mut String); 7] = [
            ("STORYTIME_LIST_URL", &mut self.endpoints.list),
            ("STORYTIME_LOAD_URL", &mut self.endpoints.load),
            ("STORYTIME_SAVE_URL", &mut self.endpoints.save),
            ("STORYTIME_DELETE_URL", &mut self.endpoints.delete),
            ("STORYTIME_CANVAS_URL", &mut self.endpoints.canvas),
            ("STORYTIME_SUGGESTIONS_URL", &mut self.endpoints.suggestions),
            ("STORYTIME_IMAGE_URL", &mut self.endpoints.image),
        ];
        for (var, slot) in endpoint_vars {
            if let Ok(url) = std::env::var(var) {
                *slot = url;
            }
        }

        if let Ok(timeout) = std::env::var("STORYTIME_REQUEST_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.http.request_timeout_ms = ms;
            }
        }

        if let Ok(language) = std::env::var("STORYTIME_LANGUAGE") {
            self.session.default_language = language;
        }
        if let Ok(dir) = std::env::var("STORYTIME_EXPORT_DIR") {
            self.session.export_dir = dir;
        }

        // Logging overrides
        if let Ok(level) = std::env::var("STORYTIME_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("STORYTIME_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Story Time Configuration
#
# Environment variables override these settings:
# - STORYTIME_BASE_URL (sets every endpoint to <base>/<operation>)
# - STORYTIME_LIST_URL, STORYTIME_LOAD_URL, STORYTIME_SAVE_URL,
#   STORYTIME_DELETE_URL, STORYTIME_CANVAS_URL,
#   STORYTIME_SUGGESTIONS_URL, STORYTIME_IMAGE_URL
# - STORYTIME_REQUEST_TIMEOUT_MS
# - STORYTIME_LANGUAGE
# - STORYTIME_EXPORT_DIR
# - STORYTIME_LOG_LEVEL
# - STORYTIME_LOG_FORMAT

[endpoints]
list = "https://epokscvush.execute-api.us-east-1.amazonaws.com/prod/list"
load = "https://6hqpsv28p0.execute-api.us-east-1.amazonaws.com/prod/load"
save = "https://i7p8c7igtl.execute-api.us-east-1.amazonaws.com/prod/save"
delete = "https://y7ur3yspla.execute-api.us-east-1.amazonaws.com/prod/delete"
canvas = "https://pbdllb0wt8.execute-api.us-east-1.amazonaws.com/prod/canvas"
suggestions = "https://nocgxc2zhc.execute-api.us-east-1.amazonaws.com/prod/writersblock"
image = "https://j3fis510x1.execute-api.us-east-1.amazonaws.com/prod/imagegenerator"

[http]
# Request timeout in milliseconds
request_timeout_ms = 30000

[timing]
# Boot animation before the landing page (ms)
boot_ms = 3000

# Loader between "Start Writing" and the editor (ms)
start_ms = 2000

# Canvas surface creation delay after opening the panel (ms)
canvas_mount_ms = 100

# Story map reload delay after loading a story (ms)
canvas_reload_ms = 500

# Character list refresh delay after saving a character (ms)
roster_refresh_ms = 100

# Landing star field frame interval (ms)
star_frame_ms = 16

# About page tech stack rotation interval (ms)
tech_rotate_ms = 2000

[session]
# Language for writing suggestions
default_language = "English"

# Start in dark mode
dark_mode = true

# Where "canvas export" writes <name>-map.png
export_dir = "."

# Treat a save whose response was lost in transport as saved.
# Off by default: such saves may not have happened.
assume_saved_on_transport_error = false

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/storytime/storytime.log"
"#
    .to_string()
}
