use serde::{Deserialize, Serialize};

/// Where task data lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceMode {
    #[default]
    Local,
    Remote,
}

impl PersistenceMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PersistenceMode::Local => "local",
            PersistenceMode::Remote => "remote",
        }
    }

    pub fn parse_mode(s: &str) -> Option<PersistenceMode> {
        match s {
            "local" => Some(PersistenceMode::Local),
            "remote" => Some(PersistenceMode::Remote),
            _ => None,
        }
    }
}

/// Configuration from config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub mode: PersistenceMode,
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// Hosted backend connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    /// Public (anon) API key sent with every request
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_category_color")]
    pub category_color: String,
    #[serde(default = "default_priority_color")]
    pub priority_color: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        DefaultsConfig {
            category_color: default_category_color(),
            priority_color: default_priority_color(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_category_color() -> String {
    "#3b82f6".to_string()
}

fn default_priority_color() -> String {
    "#f59e0b".to_string()
}
