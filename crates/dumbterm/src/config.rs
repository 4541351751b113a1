//! Command line and configuration file handling
//!
//! Settings come from three layers: built-in defaults, an optional TOML file
//! and the command line. Later layers win.

use clap::{Parser, ValueEnum};
use dumbterm_buffer::DEFAULT_CURSOR;
use dumbterm_pty::SessionBuilder;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_SHELL: &str = "/bin/sh";
pub const DEFAULT_TERM: &str = "dumb";
pub const DEFAULT_FRAME_MS: u64 = 16;
pub const DEFAULT_TEARDOWN_GRACE_MS: u64 = 500;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `EnvFilter`
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about = "dumbterm - a terminal emulator for the dumb terminal")]
pub struct Args {
    /// Shell to run [default: /bin/sh]
    #[arg(long)]
    pub shell: Option<PathBuf>,

    /// Argument passed to the shell (repeatable)
    #[arg(long = "shell-arg", allow_hyphen_values = true)]
    pub shell_args: Vec<String>,

    /// Value of TERM for the shell [default: dumb]
    #[arg(long)]
    pub term: Option<String>,

    /// Frame interval in milliseconds [default: 16]
    #[arg(long)]
    pub frame_ms: Option<u64>,

    /// Maximum number of output lines kept [default: unlimited]
    #[arg(long)]
    pub scrollback: Option<usize>,

    /// Cursor marker glyph [default: |]
    #[arg(long)]
    pub cursor: Option<char>,

    /// Config file [default: <config dir>/dumbterm/config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write logs to this file (nothing is logged otherwise)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Log level [default: info]
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,
}

/// Contents of the TOML config file. Every key is optional.
#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub shell: Option<PathBuf>,
    pub shell_args: Option<Vec<String>>,
    pub term: Option<String>,
    pub frame_ms: Option<u64>,
    pub scrollback: Option<usize>,
    pub cursor: Option<char>,
    pub log_file: Option<PathBuf>,
    pub log_level: Option<LogLevel>,
    pub env: BTreeMap<String, String>,
    pub unset_env: Vec<String>,
    pub teardown_grace_ms: Option<u64>,
}

impl FileConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub shell: PathBuf,
    pub shell_args: Vec<String>,
    pub term: String,
    pub frame_interval: Duration,
    pub scrollback: Option<usize>,
    pub cursor: char,
    pub log_file: Option<PathBuf>,
    pub log_level: LogLevel,
    pub env: BTreeMap<String, String>,
    pub unset_env: Vec<String>,
    pub teardown_grace: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: PathBuf::from(DEFAULT_SHELL),
            shell_args: Vec::new(),
            term: DEFAULT_TERM.to_string(),
            frame_interval: Duration::from_millis(DEFAULT_FRAME_MS),
            scrollback: None,
            cursor: DEFAULT_CURSOR,
            log_file: None,
            log_level: LogLevel::Info,
            env: BTreeMap::new(),
            unset_env: Vec::new(),
            teardown_grace: Duration::from_millis(DEFAULT_TEARDOWN_GRACE_MS),
        }
    }
}

/// Default config file location, if the platform has a config directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("dumbterm").join("config.toml"))
}

impl Config {
    /// Resolve settings for `args`, reading the config file it names or the
    /// default one.
    ///
    /// An explicit `--config` file must exist; the default one may not.
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => FileConfig::from_path(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => FileConfig::from_path(&path)?,
                _ => FileConfig::default(),
            },
        };
        Self::merge(args, file)
    }

    /// Layer `args` over `file` over the defaults and validate the result
    pub fn merge(args: &Args, file: FileConfig) -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let shell_args = if !args.shell_args.is_empty() {
            args.shell_args.clone()
        } else {
            file.shell_args.unwrap_or(defaults.shell_args)
        };

        let frame_ms = args
            .frame_ms
            .or(file.frame_ms)
            .unwrap_or(DEFAULT_FRAME_MS);
        if frame_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "frame_ms",
                reason: "must be at least 1".into(),
            });
        }

        let scrollback = args.scrollback.or(file.scrollback);
        if scrollback == Some(0) {
            return Err(ConfigError::Invalid {
                field: "scrollback",
                reason: "must be at least 1 line".into(),
            });
        }

        let term = args.term.clone().or(file.term).unwrap_or(defaults.term);
        if term.is_empty() || term.contains('\0') {
            return Err(ConfigError::Invalid {
                field: "term",
                reason: format!("{term:?} is not a terminal name"),
            });
        }

        let cursor = args.cursor.or(file.cursor).unwrap_or(defaults.cursor);
        if cursor.is_control() {
            return Err(ConfigError::Invalid {
                field: "cursor",
                reason: "must be a printable character".into(),
            });
        }

        let config = Self {
            shell: args.shell.clone().or(file.shell).unwrap_or(defaults.shell),
            shell_args,
            term,
            frame_interval: Duration::from_millis(frame_ms),
            scrollback,
            cursor,
            log_file: args.log_file.clone().or(file.log_file),
            log_level: args
                .log_level
                .or(file.log_level)
                .unwrap_or(defaults.log_level),
            env: file.env,
            unset_env: file.unset_env,
            teardown_grace: file
                .teardown_grace_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.teardown_grace),
        };
        debug!("Resolved configuration: {:?}", config);
        Ok(config)
    }

    /// Builder for the shell session these settings describe
    pub fn session_builder(&self) -> SessionBuilder {
        let mut builder = SessionBuilder::new()
            .shell(&self.shell)
            .args(&self.shell_args)
            .term(self.term.clone())
            .teardown_grace(self.teardown_grace);
        for key in &self.unset_env {
            builder = builder.unset_env(key);
        }
        for (key, value) in &self.env {
            builder = builder.env(key, value);
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("dumbterm").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = Config::merge(&parse(&[]), FileConfig::default()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.shell, PathBuf::from("/bin/sh"));
        assert_eq!(config.term, "dumb");
        assert_eq!(config.frame_interval, Duration::from_millis(16));
        assert_eq!(config.cursor, '|');
        assert_eq!(config.scrollback, None);
    }

    #[test]
    fn test_cli_overrides_file() {
        let args = parse(&["--shell", "/bin/bash", "--frame-ms", "8", "--cursor", "_"]);
        let file = FileConfig {
            shell: Some("/bin/zsh".into()),
            frame_ms: Some(33),
            scrollback: Some(500),
            ..Default::default()
        };
        let config = Config::merge(&args, file).unwrap();
        assert_eq!(config.shell, PathBuf::from("/bin/bash"));
        assert_eq!(config.frame_interval, Duration::from_millis(8));
        assert_eq!(config.cursor, '_');
        assert_eq!(config.scrollback, Some(500));
    }

    #[test]
    fn test_shell_args_replace_file_list() {
        let file = FileConfig {
            shell_args: Some(vec!["-l".into()]),
            ..Default::default()
        };
        let config = Config::merge(&parse(&[]), file).unwrap();
        assert_eq!(config.shell_args, vec!["-l"]);

        let file = FileConfig {
            shell_args: Some(vec!["-l".into()]),
            ..Default::default()
        };
        let args = parse(&["--shell-arg", "-c", "--shell-arg", "echo hi"]);
        let config = Config::merge(&args, file).unwrap();
        assert_eq!(config.shell_args, vec!["-c", "echo hi"]);
    }

    #[test_case(&["--frame-ms", "0"], "frame_ms" ; "zero frame interval")]
    #[test_case(&["--scrollback", "0"], "scrollback" ; "zero scrollback")]
    #[test_case(&["--term", ""], "term" ; "empty term")]
    #[test_case(&["--cursor", "\t"], "cursor" ; "control cursor")]
    fn test_invalid_values_rejected(argv: &[&str], expected: &str) {
        match Config::merge(&parse(argv), FileConfig::default()) {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, expected),
            other => panic!("expected invalid {expected}, got {other:?}"),
        }
    }

    #[test]
    fn test_log_level_names() {
        let args = parse(&["--log-level", "debug"]);
        assert_eq!(args.log_level, Some(LogLevel::Debug));
        assert_eq!(LogLevel::Warn.as_directive(), "warn");
        assert!(Args::try_parse_from(["dumbterm", "--log-level", "loud"]).is_err());
    }

    #[test]
    fn test_parse_file_config() {
        let file: FileConfig = toml::from_str(
            r#"
            shell = "/bin/dash"
            shell_args = ["-i"]
            frame_ms = 20
            cursor = "_"
            log_level = "trace"
            unset_env = ["PROMPT_COMMAND"]
            teardown_grace_ms = 50

            [env]
            PS1 = "$ "
            "#,
        )
        .unwrap();
        assert_eq!(file.shell, Some(PathBuf::from("/bin/dash")));
        assert_eq!(file.log_level, Some(LogLevel::Trace));
        assert_eq!(file.env.get("PS1").map(String::as_str), Some("$ "));

        let config = Config::merge(&parse(&[]), file).unwrap();
        assert_eq!(config.teardown_grace, Duration::from_millis(50));
        assert_eq!(config.unset_env, vec!["PROMPT_COMMAND"]);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result: Result<FileConfig, _> = toml::from_str("colour = \"red\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_session_builder_environment() {
        let mut config = Config::default();
        config.term = "vt52".into();
        config.env.insert("DUMBTERM_CONFIG_TEST".into(), "1".into());
        let env = config.session_builder().environment();
        assert!(env.iter().any(|(k, v)| k == "TERM" && v == "vt52"));
        assert!(env.iter().any(|(k, v)| k == "DUMBTERM_CONFIG_TEST" && v == "1"));
    }
}
