use crate::core::quote::SourceTag;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
}

impl ProviderConfig {
    fn new(base_url: &str) -> Option<Self> {
        Some(Self {
            base_url: base_url.to_string(),
        })
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ProvidersConfig {
    pub yahoo: Option<ProviderConfig>,
    pub coingecko: Option<ProviderConfig>,
    pub investing: Option<ProviderConfig>,
    pub google_finance: Option<ProviderConfig>,
    pub quefondos: Option<ProviderConfig>,
    pub morningstar: Option<ProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            yahoo: ProviderConfig::new("https://query1.finance.yahoo.com"),
            coingecko: ProviderConfig::new("https://api.coingecko.com/api/v3"),
            investing: ProviderConfig::new("https://es.investing.com"),
            google_finance: ProviderConfig::new("https://www.google.com/finance"),
            quefondos: ProviderConfig::new("https://www.quefondos.com"),
            morningstar: ProviderConfig::new(
                "https://lt.morningstar.com/api/rest.svc/klr5zyak8x",
            ),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub accept_language: String,
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            user_agent: BROWSER_USER_AGENT.to_string(),
            accept_language: "es-ES,es;q=0.9,en;q=0.8".to_string(),
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub persist: bool,
    pub data_path: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub providers: ProvidersConfig,
    pub http: HttpConfig,
    pub cache: CacheConfig,
    pub default_currency: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            providers: ProvidersConfig::default(),
            http: HttpConfig::default(),
            cache: CacheConfig::default(),
            default_currency: "EUR".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads the config from the default location, or built-in defaults when absent.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using built-in defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "quotefinder", "quotefinder")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.cache.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("dev", "quotefinder", "quotefinder")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Base URL of a source with any trailing slash removed, falling back to the
    /// built-in default when the section is missing.
    pub fn base_url(&self, source: SourceTag) -> String {
        let defaults = ProvidersConfig::default();
        let select = |providers: &ProvidersConfig| -> Option<String> {
            let entry = match source {
                SourceTag::Yahoo => &providers.yahoo,
                SourceTag::CoinGecko => &providers.coingecko,
                SourceTag::Investing => &providers.investing,
                SourceTag::GoogleFinance => &providers.google_finance,
                SourceTag::Quefondos => &providers.quefondos,
                SourceTag::Morningstar => &providers.morningstar,
                SourceTag::Unknown => return None,
            };
            entry.as_ref().map(|p| p.base_url.trim_end_matches('/').to_string())
        };
        select(&self.providers)
            .or_else(|| select(&defaults))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
providers:
  yahoo:
    base_url: "http://example.com/yahoo/"
  investing:
    base_url: "http://example.com/investing"
http:
  timeout_secs: 5
cache:
  persist: true
  data_path: "/tmp/quotefinder"
default_currency: "USD"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.base_url(SourceTag::Yahoo), "http://example.com/yahoo");
        assert_eq!(
            config.base_url(SourceTag::Investing),
            "http://example.com/investing"
        );
        // Sections not mentioned keep their defaults
        assert_eq!(
            config.base_url(SourceTag::CoinGecko),
            "https://api.coingecko.com/api/v3"
        );
        assert_eq!(config.http.timeout_secs, 5);
        assert!(config.http.user_agent.starts_with("Mozilla/5.0"));
        assert!(config.cache.persist);
        assert_eq!(
            config.default_data_path().unwrap(),
            PathBuf::from("/tmp/quotefinder")
        );
        assert_eq!(config.default_currency, "USD");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.default_currency, "EUR");
        assert!(!config.cache.persist);
        assert_eq!(
            config.base_url(SourceTag::Quefondos),
            "https://www.quefondos.com"
        );
        assert_eq!(config.base_url(SourceTag::Unknown), "");
    }

    #[test]
    fn test_null_provider_falls_back_to_default() {
        let config: AppConfig = serde_yaml::from_str("providers:\n  yahoo: ~\n").unwrap();
        assert_eq!(
            config.base_url(SourceTag::Yahoo),
            "https://query1.finance.yahoo.com"
        );
    }

    #[test]
    fn test_load_from_path() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "default_currency: GBP\n").unwrap();
        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.default_currency, "GBP");

        let missing = AppConfig::load_from_path("/nonexistent/quotefinder.yaml");
        assert!(missing.is_err());
        assert!(
            missing
                .unwrap_err()
                .to_string()
                .starts_with("Failed to read config file")
        );
    }
}
