use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub nautobot: NautobotConfig,
    #[serde(default)]
    pub secret_server: SecretServerConfig,
}

/// Connection settings for the Nautobot inventory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NautobotConfig {
    /// Root URL of the Nautobot instance (without the `/api` suffix)
    pub endpoint: String,
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// Connection settings for Thycotic/Delinea Secret Server
///
/// Which credentials are needed depends on the authorizer selected at fetch
/// time; nothing is validated when the configuration is loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretServerConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub cloud_based: bool,
    /// Required when `cloud_based` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(default = "default_tld")]
    pub tld: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// PEM bundle of additional trusted certificates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_bundle_path: Option<PathBuf>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_tld() -> String {
    "com".to_string()
}

impl Default for SecretServerConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            cloud_based: false,
            tenant: None,
            tld: default_tld(),
            username: None,
            password: None,
            token: None,
            domain: None,
            ca_bundle_path: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Parse a boolean-ish environment value.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "t" | "yes" | "y" | "on"
    )
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        toml::from_str(&contents).context("Failed to parse config file")
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Unset and empty are the same thing for every variable below.
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let nautobot = NautobotConfig {
            endpoint: var("NAUTOBOT_API_ENDPOINT")
                .context("NAUTOBOT_API_ENDPOINT environment variable not set")?,
            token: var("NAUTOBOT_TOKEN").context("NAUTOBOT_TOKEN environment variable not set")?,
            api_version: var("NAUTOBOT_API_VERSION"),
            timeout_seconds: var("NAUTOBOT_TIMEOUT_SECONDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_timeout_seconds),
        };

        let secret_server = SecretServerConfig {
            base_url: var("SECRET_SERVER_BASE_URL").unwrap_or_default(),
            cloud_based: var("SECRET_SERVER_IS_CLOUD_BASED")
                .map(|s| is_truthy(&s))
                .unwrap_or(false),
            tenant: var("SECRET_SERVER_TENANT"),
            tld: var("SECRET_SERVER_TLD").unwrap_or_else(default_tld),
            username: var("SECRET_SERVER_USERNAME"),
            password: var("SECRET_SERVER_PASSWORD"),
            token: var("SECRET_SERVER_TOKEN"),
            domain: var("SECRET_SERVER_DOMAIN"),
            ca_bundle_path: var("REQUESTS_CA_BUNDLE").map(PathBuf::from),
            timeout_seconds: var("SECRET_SERVER_TIMEOUT_SECONDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_timeout_seconds),
        };

        Ok(Self {
            nautobot,
            secret_server,
        })
    }

    /// Create a sample configuration file
    pub fn create_sample<P: AsRef<Path>>(path: P) -> Result<()> {
        let sample = Self {
            nautobot: NautobotConfig {
                endpoint: "https://nautobot.example.com".to_string(),
                token: "your-nautobot-token-here".to_string(),
                api_version: Some("2.0".to_string()),
                timeout_seconds: default_timeout_seconds(),
            },
            secret_server: SecretServerConfig {
                base_url: "https://secretserver.example.com/SecretServer".to_string(),
                username: Some("svc-automation".to_string()),
                password: Some("your-secret-server-password-here".to_string()),
                ..SecretServerConfig::default()
            },
        };

        let toml_string =
            toml::to_string_pretty(&sample).context("Failed to serialize sample config")?;
        fs::write(path.as_ref(), toml_string)
            .with_context(|| format!("Failed to write sample config to {:?}", path.as_ref()))?;

        Ok(())
    }
}
