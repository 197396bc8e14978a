use serde::{Deserialize, Serialize};
use clap::{ArgAction, Parser, Subcommand, ValueEnum, ValueHint};
use dirs_next::{data_dir, home_dir};
use std::{fs, path::{Path, PathBuf}, time::Duration};
use thiserror::Error;

use crate::constants::{
    DEFAULT_CONNECT_TIMEOUT_MS,
    DEFAULT_REQUEST_TIMEOUT_MS,
    DEFAULT_SERVER_URL,
    DEFAULT_SPEECH_COMMAND,
    DEFAULT_VIEWPORT_HEIGHT,
    DEFAULT_VIEWPORT_WIDTH,
};

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration. These are terminal settings; the screen
/// itself is described by the queue configuration fetched at runtime.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// General options
    pub log_level: Option<String>,     // e.g., "info" | "debug"
    /// queue server endpoint
    pub server: Option<ServerConfig>,
    /// this terminal
    pub terminal: Option<TerminalConfig>,
    /// local preset storage
    pub presets: Option<PresetsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    pub base_url: Option<String>,
    pub connect_timeout_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TerminalConfig {
    /// device id, or "mac" to use the network interface address
    pub device_id: Option<String>,
    /// interface used when device_id is "mac"
    pub interface: Option<String>,
    pub viewport_width: Option<u32>,
    pub viewport_height: Option<u32>,
    pub speech_backend: Option<SpeechBackend>,
    pub speech_command: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PresetsConfig {
    pub local_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SpeechBackend {
    /// external espeak compatible program
    #[default]
    Command,
    /// log announcements only
    Log,
    /// no announcements
    Off,
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone)]
#[command(name = "QuMonS", version, about = "QuMonS pharmacy queue terminal")]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, short = 'c', value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    /// Enable debug log level
    #[arg(long, short = 'v', alias = "verbose", action = ArgAction::SetTrue)]
    pub debug: bool,
    #[arg(long)]
    pub log_level: Option<String>,
    /// Queue server base URL, e.g. http://queue.local:8080
    #[arg(long)]
    pub server_url: Option<String>,
    /// Device id; "mac" derives it from the network interface
    #[arg(long)]
    pub device_id: Option<String>,
    #[arg(long)]
    pub interface: Option<String>,
    #[arg(long)]
    pub viewport_width: Option<u32>,
    #[arg(long)]
    pub viewport_height: Option<u32>,
    #[arg(long, value_enum)]
    pub speech_backend: Option<SpeechBackend>,
    #[arg(long)]
    pub speech_command: Option<String>,
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub preset_dir: Option<PathBuf>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the terminal (default)
    Run,
    /// Manage stored presets
    Presets {
        #[command(subcommand)]
        action: PresetCommand,
    },
}

#[derive(Debug, Subcommand, Clone, PartialEq, Eq)]
pub enum PresetCommand {
    /// List stored presets
    List,
    /// Print a preset as JSON
    Show { id: String },
    /// Save the built-in default configuration as a new preset
    SaveDefault { name: String },
    /// Delete a preset
    Delete {
        id: String,
        /// confirm without prompting
        #[arg(long, short = 'y', action = ArgAction::SetTrue)]
        yes: bool,
    },
}

/// Public entry point: read YAML, merge CLI overrides, validate.
pub fn load(cli: &Cli) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli);

    // 4) Validate
    validate(&cfg)?;

    Ok(cfg)
}

/// Pretty YAML of effective config (nice for debugging)
pub fn dump(cfg: &Config) -> Result<String, ConfigError> {
    Ok(serde_yaml::to_string(cfg)?)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/qumons/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/qumons/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/qumons.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["qumons.yaml", "config.yaml", "config/qumons.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    parse_yaml(&s)
}

fn parse_yaml(s: &str) -> Result<Config, ConfigError> {
    let cfg: Config = serde_yaml::from_str(s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    // top-level
    if src.log_level.is_some()      { dst.log_level = src.log_level; }
    match (&mut dst.server, src.server) {
        (None, Some(c)) => dst.server = Some(c),
        (Some(d), Some(s)) => merge_server(d, s),
        _ => {}
    }
    match (&mut dst.terminal, src.terminal) {
        (None, Some(c)) => dst.terminal = Some(c),
        (Some(d), Some(s)) => merge_terminal(d, s),
        _ => {}
    }
    match (&mut dst.presets, src.presets) {
        (None, Some(c)) => dst.presets = Some(c),
        (Some(d), Some(s)) => {
            if s.local_dir.is_some() { d.local_dir = s.local_dir; }
        }
        _ => {}
    }
}

fn merge_server(dst: &mut ServerConfig, src: ServerConfig) {
    if src.base_url.is_some()            { dst.base_url = src.base_url; }
    if src.connect_timeout_ms.is_some()  { dst.connect_timeout_ms = src.connect_timeout_ms; }
    if src.timeout_ms.is_some()          { dst.timeout_ms = src.timeout_ms; }
}

fn merge_terminal(dst: &mut TerminalConfig, src: TerminalConfig) {
    if src.device_id.is_some()        { dst.device_id = src.device_id; }
    if src.interface.is_some()        { dst.interface = src.interface; }
    if src.viewport_width.is_some()   { dst.viewport_width = src.viewport_width; }
    if src.viewport_height.is_some()  { dst.viewport_height = src.viewport_height; }
    if src.speech_backend.is_some()   { dst.speech_backend = src.speech_backend; }
    if src.speech_command.is_some()   { dst.speech_command = src.speech_command; }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some()       { cfg.log_level = cli.log_level.clone(); }

    if let Some(url) = cli.server_url.as_ref() {
        cfg.server.get_or_insert_with(ServerConfig::default).base_url = Some(url.clone());
    }

    let any_terminal = cli.device_id.is_some()
        || cli.interface.is_some()
        || cli.viewport_width.is_some()
        || cli.viewport_height.is_some()
        || cli.speech_backend.is_some()
        || cli.speech_command.is_some();

    if any_terminal && cfg.terminal.is_none() {
        cfg.terminal = Some(TerminalConfig::default());
    }
    if let Some(terminal) = cfg.terminal.as_mut() {
        if cli.device_id.is_some()        { terminal.device_id = cli.device_id.clone(); }
        if cli.interface.is_some()        { terminal.interface = cli.interface.clone(); }
        if cli.viewport_width.is_some()   { terminal.viewport_width = cli.viewport_width; }
        if cli.viewport_height.is_some()  { terminal.viewport_height = cli.viewport_height; }
        if cli.speech_backend.is_some()   { terminal.speech_backend = cli.speech_backend; }
        if cli.speech_command.is_some()   { terminal.speech_command = cli.speech_command.clone(); }
    }

    if let Some(dir) = cli.preset_dir.as_ref() {
        cfg.presets.get_or_insert_with(PresetsConfig::default).local_dir = Some(dir.clone());
    }
}

/// Put any invariants here (required fields, ranges, etc.)
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    let url = cfg.server_url();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::Validation(format!("server base_url must be http(s): {}", url)));
    }
    if let Some(server) = cfg.server.as_ref() {
        if server.connect_timeout_ms == Some(0) || server.timeout_ms == Some(0) {
            return Err(ConfigError::Validation("server timeouts must be > 0".into()));
        }
    }
    let (w, h) = cfg.viewport();
    if w == 0 || h == 0 {
        return Err(ConfigError::Validation("terminal viewport width/height must be > 0".into()));
    }
    if cfg.speech_backend() == SpeechBackend::Command && cfg.speech_command().trim().is_empty() {
        return Err(ConfigError::Validation("terminal speech_command must not be empty".into()));
    }
    if let Some(id) = cfg.device_id() {
        if id.trim().is_empty() {
            return Err(ConfigError::Validation("terminal device_id must not be blank".into()));
        }
    }
    Ok(())
}

// Effective values, defaults applied
impl Config {
    pub fn server_url(&self) -> &str {
        self.server
            .as_ref()
            .and_then(|s| s.base_url.as_deref())
            .unwrap_or(DEFAULT_SERVER_URL)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(
            self.server.as_ref().and_then(|s| s.connect_timeout_ms).unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(
            self.server.as_ref().and_then(|s| s.timeout_ms).unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
        )
    }

    pub fn device_id(&self) -> Option<&str> {
        self.terminal.as_ref().and_then(|t| t.device_id.as_deref())
    }

    pub fn interface(&self) -> Option<&str> {
        self.terminal.as_ref().and_then(|t| t.interface.as_deref())
    }

    pub fn viewport(&self) -> (u32, u32) {
        let t = self.terminal.as_ref();
        (
            t.and_then(|t| t.viewport_width).unwrap_or(DEFAULT_VIEWPORT_WIDTH),
            t.and_then(|t| t.viewport_height).unwrap_or(DEFAULT_VIEWPORT_HEIGHT),
        )
    }

    pub fn speech_backend(&self) -> SpeechBackend {
        self.terminal.as_ref().and_then(|t| t.speech_backend).unwrap_or_default()
    }

    pub fn speech_command(&self) -> &str {
        self.terminal
            .as_ref()
            .and_then(|t| t.speech_command.as_deref())
            .unwrap_or(DEFAULT_SPEECH_COMMAND)
    }

    /// Local preset directory; `None` when no data directory can be found
    pub fn preset_dir(&self) -> Option<PathBuf> {
        self.presets
            .as_ref()
            .and_then(|p| p.local_dir.clone())
            .or_else(|| data_dir().map(|d| d.join("qumons").join("presets")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["QuMonS"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_apply() {
        let cfg = Config::default();
        assert_eq!(cfg.server_url(), DEFAULT_SERVER_URL);
        assert_eq!(cfg.viewport(), (DEFAULT_VIEWPORT_WIDTH, DEFAULT_VIEWPORT_HEIGHT));
        assert_eq!(cfg.speech_backend(), SpeechBackend::Command);
        assert_eq!(cfg.device_id(), None);
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn test_yaml_then_cli_precedence() {
        let mut cfg = Config::default();
        let yaml = parse_yaml(
            "log_level: info\n\
             server:\n  base_url: http://queue.local:8080\n  timeout_ms: 2500\n\
             terminal:\n  device_id: term-01\n  speech_backend: log\n",
        )
        .unwrap();
        merge(&mut cfg, yaml);
        assert_eq!(cfg.server_url(), "http://queue.local:8080");
        assert_eq!(cfg.request_timeout(), Duration::from_millis(2500));
        assert_eq!(cfg.speech_backend(), SpeechBackend::Log);

        apply_cli_overrides(&mut cfg, &cli(&["--device-id", "term-02", "--viewport-width", "1080"]));
        assert_eq!(cfg.device_id(), Some("term-02"));
        assert_eq!(cfg.viewport(), (1080, DEFAULT_VIEWPORT_HEIGHT));
        // untouched by the override
        assert_eq!(cfg.speech_backend(), SpeechBackend::Log);
        assert_eq!(cfg.log_level.as_deref(), Some("info"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut cfg = Config::default();
        apply_cli_overrides(&mut cfg, &cli(&["--server-url", "queue.local"]));
        assert!(matches!(validate(&cfg), Err(ConfigError::Validation(_))));

        let mut cfg = Config::default();
        apply_cli_overrides(&mut cfg, &cli(&["--viewport-height", "0"]));
        assert!(validate(&cfg).is_err());

        let mut cfg = Config::default();
        apply_cli_overrides(&mut cfg, &cli(&["--speech-command", " "]));
        assert!(validate(&cfg).is_err());

        let mut cfg = Config::default();
        apply_cli_overrides(&mut cfg, &cli(&["--speech-backend", "off", "--speech-command", " "]));
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn test_subcommands_parse() {
        assert_eq!(cli(&[]).command, None);
        assert_eq!(
            cli(&["presets", "delete", "preset-1", "--yes"]).command,
            Some(Commands::Presets { action: PresetCommand::Delete { id: "preset-1".into(), yes: true } })
        );
        assert!(cli(&["-v", "run"]).debug);
    }

    #[test]
    fn test_dump_is_yaml() {
        let mut cfg = Config::default();
        apply_cli_overrides(&mut cfg, &cli(&["--preset-dir", "/tmp/qumons"]));
        let text = dump(&cfg).unwrap();
        assert!(text.contains("local_dir: /tmp/qumons"));
        assert_eq!(cfg.preset_dir(), Some(PathBuf::from("/tmp/qumons")));
    }
}
