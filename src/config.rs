//! Layered settings resolution.
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Config file: `$SHADOW_CONFIG` or `<config_dir>/shadow/config.yaml`
//!    (YAML; `.json` files are parsed as JSON)
//! 3. Environment variables: `SHADOW_*`
//! 4. Command-line flags

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const DEFAULT_BRIDGE_URL: &str = "http://localhost:6767/api";
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 100;

/// Directory beneath the install root that holds the bridge and its helper scripts.
pub const BRIDGE_DIR_NAME: &str = "shadow-bridge";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid bridge URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid command line for '{key}': {message}")]
    InvalidCommand { key: &'static str, message: String },

    #[error("invalid value for {key}: '{value}'")]
    InvalidNumber { key: &'static str, value: String },
}

/// Fully resolved settings used by every command.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Install root; contains `shadow-bridge/` and `gemini.ps1`.
    pub root: PathBuf,
    pub bridge_url: Url,
    /// Interpreter argv prefix for helper scripts (e.g. `["py", "-3"]`).
    pub python: Vec<String>,
    /// PowerShell argv prefix for the gemini wrapper.
    pub powershell: Vec<String>,
    pub max_upload_bytes: u64,
}

impl Settings {
    pub fn bridge_dir(&self) -> PathBuf {
        self.root.join(BRIDGE_DIR_NAME)
    }
}

/// One settings layer. Every field is optional so layers can be overlaid.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RawSettings {
    pub root: Option<PathBuf>,
    pub bridge_url: Option<String>,
    pub python: Option<String>,
    pub powershell: Option<String>,
    pub max_upload_mb: Option<u64>,
}

impl RawSettings {
    /// Overlay `upper` onto `self`; `upper` wins field by field.
    pub fn overlay(self, upper: RawSettings) -> RawSettings {
        RawSettings {
            root: upper.root.or(self.root),
            bridge_url: upper.bridge_url.or(self.bridge_url),
            python: upper.python.or(self.python),
            powershell: upper.powershell.or(self.powershell),
            max_upload_mb: upper.max_upload_mb.or(self.max_upload_mb),
        }
    }

    /// Build the environment layer from a variable lookup. Empty values are ignored.
    pub fn from_env_with<F>(lookup: F) -> Result<RawSettings, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let max_upload_mb = match get("SHADOW_MAX_UPLOAD_MB") {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|_| {
                ConfigError::InvalidNumber {
                    key: "SHADOW_MAX_UPLOAD_MB",
                    value: raw.clone(),
                }
            })?),
            None => None,
        };

        Ok(RawSettings {
            root: get("SHADOW_ROOT").map(PathBuf::from),
            bridge_url: get("SHADOW_BRIDGE_URL"),
            python: get("SHADOW_PYTHON"),
            powershell: get("SHADOW_POWERSHELL"),
            max_upload_mb,
        })
    }

    pub fn from_env() -> Result<RawSettings, ConfigError> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Parse a config file. `.json` is read as JSON, anything else as YAML.
    pub fn from_file(path: &Path) -> Result<RawSettings, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let parsed = if is_json {
            serde_json::from_str(&raw).map_err(|e| e.to_string())
        } else if raw.trim().is_empty() {
            Ok(RawSettings::default())
        } else {
            serde_yaml::from_str(&raw).map_err(|e| e.to_string())
        };

        parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }
}

/// Default config file location, if the platform has a config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("shadow").join("config.yaml"))
}

fn default_root() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join("shadow"))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_python() -> &'static str {
    if cfg!(windows) { "python" } else { "python3" }
}

fn default_powershell() -> &'static str {
    if cfg!(windows) { "powershell.exe" } else { "pwsh" }
}

fn split_command(key: &'static str, raw: &str) -> Result<Vec<String>, ConfigError> {
    let parts = shell_words::split(raw).map_err(|e| ConfigError::InvalidCommand {
        key,
        message: e.to_string(),
    })?;
    if parts.is_empty() || parts[0].is_empty() {
        return Err(ConfigError::InvalidCommand {
            key,
            message: "empty command".into(),
        });
    }
    Ok(parts)
}

/// Validate and normalise a bridge base URL. Only http(s) is accepted.
pub fn parse_bridge_url(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).map_err(|e| ConfigError::InvalidUrl {
        url: trimmed.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidUrl {
            url: trimmed.to_string(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

/// Turn a merged layer into concrete settings, filling defaults.
pub fn resolve(merged: RawSettings) -> Result<Settings, ConfigError> {
    let bridge_url = parse_bridge_url(merged.bridge_url.as_deref().unwrap_or(DEFAULT_BRIDGE_URL))?;
    let python = split_command("python", merged.python.as_deref().unwrap_or(default_python()))?;
    let powershell = split_command(
        "powershell",
        merged.powershell.as_deref().unwrap_or(default_powershell()),
    )?;
    let max_upload_mb = merged.max_upload_mb.unwrap_or(DEFAULT_MAX_UPLOAD_MB);

    Ok(Settings {
        root: merged.root.unwrap_or_else(default_root),
        bridge_url,
        python,
        powershell,
        max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
    })
}

/// Load settings from every layer. `explicit_config` comes from `--config`;
/// `cli` carries flag overrides.
pub fn load(explicit_config: Option<&Path>, cli: RawSettings) -> Result<Settings, ConfigError> {
    let env = RawSettings::from_env()?;

    let env_config = std::env::var_os("SHADOW_CONFIG")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);

    let file = match explicit_config.map(Path::to_path_buf).or(env_config) {
        // Explicitly named files must exist.
        Some(path) => RawSettings::from_file(&path)?,
        None => match default_config_path() {
            Some(path) if path.is_file() => RawSettings::from_file(&path)?,
            _ => RawSettings::default(),
        },
    };

    let merged = RawSettings::default().overlay(file).overlay(env).overlay(cli);
    tracing::debug!(?merged, "resolved settings layers");
    resolve(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let s = resolve(RawSettings::default()).unwrap();
        assert_eq!(s.bridge_url.as_str(), "http://localhost:6767/api");
        assert_eq!(s.max_upload_bytes, 100 * 1024 * 1024);
        assert!(!s.python.is_empty());
        assert!(s.bridge_dir().ends_with(BRIDGE_DIR_NAME));
    }

    #[test]
    fn later_layers_win() {
        let file = RawSettings {
            bridge_url: Some("http://file:1/api".into()),
            python: Some("python3.11".into()),
            ..Default::default()
        };
        let env = RawSettings {
            bridge_url: Some("http://env:2/api".into()),
            ..Default::default()
        };
        let cli = RawSettings {
            root: Some(PathBuf::from("/opt/shadow")),
            ..Default::default()
        };
        let merged = RawSettings::default().overlay(file).overlay(env).overlay(cli);
        let s = resolve(merged).unwrap();
        assert_eq!(s.bridge_url.as_str(), "http://env:2/api");
        assert_eq!(s.python, vec!["python3.11"]);
        assert_eq!(s.root, PathBuf::from("/opt/shadow"));
    }

    #[test]
    fn env_layer_reads_shadow_vars() {
        let raw = RawSettings::from_env_with(env_of(&[
            ("SHADOW_ROOT", "/srv/shadow"),
            ("SHADOW_BRIDGE_URL", "http://127.0.0.1:7000/api"),
            ("SHADOW_PYTHON", "py -3"),
            ("SHADOW_MAX_UPLOAD_MB", "5"),
            ("SHADOW_POWERSHELL", "  "),
        ]))
        .unwrap();
        assert_eq!(raw.root, Some(PathBuf::from("/srv/shadow")));
        assert_eq!(raw.max_upload_mb, Some(5));
        assert_eq!(raw.powershell, None, "blank values are ignored");

        let s = resolve(raw).unwrap();
        assert_eq!(s.python, vec!["py", "-3"]);
        assert_eq!(s.max_upload_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn bad_upload_limit_rejected() {
        let err = RawSettings::from_env_with(env_of(&[("SHADOW_MAX_UPLOAD_MB", "lots")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));
    }

    #[test]
    fn bridge_url_must_be_http() {
        assert!(parse_bridge_url("https://bridge.local/api").is_ok());
        assert!(matches!(
            parse_bridge_url("ftp://bridge.local"),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(parse_bridge_url("not a url").is_err());
    }

    #[test]
    fn quoted_interpreter_path() {
        let raw = RawSettings {
            python: Some(r#""C:\Program Files\Python\python.exe" -u"#.into()),
            ..Default::default()
        };
        let s = resolve(raw).unwrap();
        assert_eq!(s.python[0], r"C:\Program Files\Python\python.exe");
        assert_eq!(s.python[1], "-u");
    }

    #[test]
    fn yaml_and_json_files() {
        let dir = tempfile::tempdir().unwrap();

        let yaml = dir.path().join("config.yaml");
        std::fs::write(&yaml, "bridge_url: http://yaml:1/api\nmax_upload_mb: 7\n").unwrap();
        let y = RawSettings::from_file(&yaml).unwrap();
        assert_eq!(y.bridge_url.as_deref(), Some("http://yaml:1/api"));
        assert_eq!(y.max_upload_mb, Some(7));

        let json = dir.path().join("config.json");
        std::fs::write(&json, r#"{"root":"/x","python":"python"}"#).unwrap();
        let j = RawSettings::from_file(&json).unwrap();
        assert_eq!(j.root, Some(PathBuf::from("/x")));

        let empty = dir.path().join("empty.yaml");
        std::fs::write(&empty, "").unwrap();
        assert_eq!(RawSettings::from_file(&empty).unwrap(), RawSettings::default());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = load(Some(Path::new("/definitely/not/here.yaml")), RawSettings::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
