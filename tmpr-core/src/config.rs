use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, fs, path::PathBuf, str::FromStr};
use tracing::debug;

use crate::{Error, Result, Unit};

/// Upstream services that need credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenWeather,
    LocationIq,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenWeather => "openweather",
            ProviderId::LocationIq => "locationiq",
        }
    }

    /// Environment variable that overrides the stored key.
    pub fn env_var(&self) -> &'static str {
        match self {
            ProviderId::OpenWeather => "OPEN_WEATHER_API_KEY",
            ProviderId::LocationIq => "LOCATION_IQ_API_KEY",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenWeather, ProviderId::LocationIq]
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "openweather" => Ok(ProviderId::OpenWeather),
            "locationiq" => Ok(ProviderId::LocationIq),
            _ => Err(Error::Config(format!(
                "unknown provider '{value}', supported providers: openweather, locationiq"
            ))),
        }
    }
}

/// Credentials for a single provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
}

/// Settings stored on disk.
///
/// Example TOML:
/// ```toml
/// unit = "metric"
///
/// [providers.openweather]
/// api_key = "..."
///
/// [providers.locationiq]
/// api_key = "..."
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Default unit system, used when none is given on the command line.
    pub unit: Option<String>,

    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;

        Self::from_toml(&contents)
            .map_err(|e| e.context(format!("failed to parse config file {}", path.display())))
    }

    /// Like [`Config::load`], but skips the file entirely when nothing has to
    /// come from it: an explicit unit and every API key set in the
    /// environment. A broken file then cannot get in the way.
    pub fn load_if_needed(explicit_unit: Option<&str>) -> Result<Self> {
        if Self::file_needed(explicit_unit, |name| std::env::var(name).ok()) {
            Self::load()
        } else {
            debug!("unit and API keys given directly, not reading config file");
            Ok(Self::default())
        }
    }

    fn file_needed<F>(explicit_unit: Option<&str>, lookup_env: F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        explicit_unit.is_none()
            || ProviderId::all()
                .iter()
                .any(|id| lookup_env(id.env_var()).is_none_or(|key| key.is_empty()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Config(format!(
                    "failed to create config directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let toml = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize configuration: {e}")))?;

        fs::write(&path, toml).map_err(|e| {
            Error::Config(format!("failed to write config file {}: {e}", path.display()))
        })?;

        Ok(path)
    }

    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "tmpr", "tmpr")
            .ok_or_else(|| Error::Config("could not determine platform config directory".into()))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers
            .insert(provider_id.as_str().to_string(), ProviderConfig { api_key });
    }

    pub fn set_unit(&mut self, unit: Unit) {
        self.unit = Some(unit.as_str().to_string());
    }

    /// Stored API key for a provider, if present and non-empty.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.providers
            .get(provider_id.as_str())
            .map(|cfg| cfg.api_key.as_str())
            .filter(|key| !key.is_empty())
    }

    /// Resolve the API key for `provider_id`, preferring the environment over
    /// the stored configuration.
    pub fn api_key(&self, provider_id: ProviderId) -> Result<String> {
        self.api_key_with(provider_id, |name| std::env::var(name).ok())
    }

    fn api_key_with<F>(&self, provider_id: ProviderId, lookup_env: F) -> Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup_env(provider_id.env_var()).filter(|key| !key.is_empty()) {
            return Ok(key);
        }

        self.provider_api_key(provider_id)
            .map(str::to_owned)
            .ok_or_else(|| {
                Error::Config(format!(
                    "no API key for {provider_id}: set {} or run `tmpr configure {provider_id}`",
                    provider_id.env_var()
                ))
            })
    }

    /// Effective unit: `explicit` if given, then the stored default, then
    /// [`Unit::Standard`].
    pub fn resolve_unit(&self, explicit: Option<&str>) -> Result<Unit> {
        explicit
            .or(self.unit.as_deref())
            .unwrap_or_default()
            .parse()
    }
}
