use std::fs;
use std::path::{Path, PathBuf};

use toml_edit::DocumentMut;

use crate::io::atomic::atomic_write;
use crate::model::config::{AppConfig, PersistenceMode};
use crate::ops::task_ops::validate_color;

/// Keys accepted by `tf config get|set`
pub const KEYS: &[&str] = &[
    "mode",
    "remote.url",
    "remote.api_key",
    "remote.timeout_secs",
    "defaults.category_color",
    "defaults.priority_color",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config.toml: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config.toml: {0}")]
    Syntax(#[from] toml_edit::TomlError),
    #[error("unknown config key '{0}' (known keys: {keys})", keys = KEYS.join(", "))]
    UnknownKey(String),
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
    #[error("{0} already exists (use --force to overwrite)")]
    AlreadyInitialized(PathBuf),
}

/// Home directory: `--home`, then `TAFLO_HOME`, then
/// `$XDG_CONFIG_HOME/taflo`, then `$HOME/.config/taflo`.
pub fn resolve_home(flag: Option<&Path>) -> PathBuf {
    resolve_home_with(flag, |k| std::env::var(k).ok())
}

fn resolve_home_with(flag: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(dir) = flag {
        return dir.to_path_buf();
    }
    let non_empty = |k: &str| env(k).filter(|v| !v.is_empty());
    if let Some(dir) = non_empty("TAFLO_HOME") {
        return PathBuf::from(dir);
    }
    let config_dir = non_empty("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            non_empty("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/"))
                .join(".config")
        });
    config_dir.join("taflo")
}

pub fn config_path(home: &Path) -> PathBuf {
    home.join("config.toml")
}

/// Read the config, returning both the parsed config and the raw
/// `toml_edit` document for round-trip-safe editing.
/// A missing file yields defaults and an empty document.
pub fn read_config(home: &Path) -> Result<(AppConfig, DocumentMut), ConfigError> {
    let path = config_path(home);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok((AppConfig::default(), DocumentMut::new()));
        }
        Err(e) => return Err(ConfigError::Read { path, source: e }),
    };
    let config: AppConfig = toml::from_str(&text)?;
    let doc: DocumentMut = text.parse()?;
    Ok((config, doc))
}

/// Write the document back, preserving formatting and comments.
pub fn write_config(home: &Path, doc: &DocumentMut) -> Result<(), ConfigError> {
    let path = config_path(home);
    fs::create_dir_all(home).map_err(|e| ConfigError::Write {
        path: path.clone(),
        source: e,
    })?;
    atomic_write(&path, doc.to_string().as_bytes()).map_err(|e| ConfigError::Write { path, source: e })
}

/// The effective value of a key, defaults included
pub fn get_key(config: &AppConfig, key: &str) -> Result<Option<String>, ConfigError> {
    let remote = config.remote.as_ref();
    Ok(match key {
        "mode" => Some(config.mode.as_str().to_string()),
        "remote.url" => remote.map(|r| r.url.clone()),
        "remote.api_key" => remote.map(|r| r.api_key.clone()),
        "remote.timeout_secs" => remote.map(|r| r.timeout_secs.to_string()),
        "defaults.category_color" => Some(config.defaults.category_color.clone()),
        "defaults.priority_color" => Some(config.defaults.priority_color.clone()),
        _ => return Err(ConfigError::UnknownKey(key.to_string())),
    })
}

/// Set one key in the document. The edited document must still parse as a
/// complete config, so e.g. `remote.url` alone is rejected until
/// `remote.api_key` is also set.
pub fn set_key(doc: &mut DocumentMut, key: &str, value: &str) -> Result<AppConfig, ConfigError> {
    let mut edited = doc.clone();
    set_item(&mut edited, key, value)?;
    let config = validate_doc(&edited, key, value)?;
    *doc = edited;
    Ok(config)
}

fn set_item(doc: &mut DocumentMut, key: &str, value: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| invalid_value(key, value, reason);
    let item = match key {
        "mode" => {
            let mode = PersistenceMode::parse_mode(value)
                .ok_or_else(|| invalid("expected local or remote"))?;
            toml_edit::value(mode.as_str())
        }
        "remote.url" => {
            if !(value.starts_with("https://") || value.starts_with("http://")) {
                return Err(invalid("expected an http(s) URL"));
            }
            toml_edit::value(value.trim_end_matches('/'))
        }
        "remote.api_key" => toml_edit::value(value),
        "remote.timeout_secs" => {
            let secs: i64 = value
                .parse()
                .map_err(|_| invalid("expected a whole number of seconds"))?;
            if secs <= 0 {
                return Err(invalid("must be positive"));
            }
            toml_edit::value(secs)
        }
        "defaults.category_color" | "defaults.priority_color" => {
            let color = validate_color(value).map_err(|e| invalid(&e.to_string()))?;
            toml_edit::value(color)
        }
        _ => return Err(ConfigError::UnknownKey(key.to_string())),
    };

    match key.split_once('.') {
        Some((table, field)) => {
            if !doc.contains_key(table) {
                doc[table] = toml_edit::Item::Table(toml_edit::Table::new());
            }
            doc[table][field] = item;
        }
        None => doc[key] = item,
    }
    Ok(())
}

fn validate_doc(doc: &DocumentMut, key: &str, value: &str) -> Result<AppConfig, ConfigError> {
    toml::from_str(&doc.to_string()).map_err(|e| {
        invalid_value(key, value, &format!("config would not be valid: {}", e.message()))
    })
}

fn invalid_value(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Write a fresh config.toml. Refuses to overwrite unless `force`.
pub fn init_config(
    home: &Path,
    mode: PersistenceMode,
    remote: Option<(&str, &str)>,
    force: bool,
) -> Result<PathBuf, ConfigError> {
    let path = config_path(home);
    if path.exists() && !force {
        return Err(ConfigError::AlreadyInitialized(path));
    }
    let mut doc: DocumentMut = TEMPLATE.parse()?;
    if let Some((url, key)) = remote {
        set_item(&mut doc, "remote.url", url)?;
        set_item(&mut doc, "remote.api_key", key)?;
    }
    set_item(&mut doc, "mode", mode.as_str())?;
    validate_doc(&doc, "mode", mode.as_str())?;
    write_config(home, &doc)?;
    tracing::info!(path = %path.display(), mode = mode.as_str(), "wrote config");
    Ok(path)
}

const TEMPLATE: &str = r##"# taflo configuration
#
# mode = "local" keeps tasks in JSON files under data/;
# mode = "remote" uses the hosted backend configured in [remote].
mode = "local"

[defaults]
category_color = "#3b82f6"
priority_color = "#f59e0b"
"##;
