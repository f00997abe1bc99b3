use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

pub const SLACK_BOT_TOKEN_VAR: &str = "SLACK_BOT_TOKEN";
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const PORT_VAR: &str = "PORT";

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HTTPConfig,

    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub slack: SlackConfig,

    #[serde(default)]
    pub reply: ReplyConfig,

    #[cfg(feature = "sentry")]
    #[serde(default)]
    pub sentry: Option<SentryConfig>,

    /// Never read from the config file, only from the environment.
    #[serde(skip)]
    pub credentials: Credentials,
}
impl AppConfig {
    /// Loads the TOML config (explicit path, else `config.toml` if present, else defaults)
    /// and resolves credentials from the process environment.
    pub fn load(config_filepath: Option<PathBuf>) -> Result<Self> {
        Self::load_from(config_filepath, |key| std::env::var(key).ok())
    }

    fn load_from<F>(config_filepath: Option<PathBuf>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config_path = match config_filepath {
            Some(path) => Some(path),
            None => Some(PathBuf::from(DEFAULT_CONFIG_PATH)).filter(|path| path.is_file()),
        };

        let config_content = match &config_path {
            Some(path) => Some(
                fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {path:?}"))?,
            ),
            None => None,
        };

        Self::from_sources(config_content.as_deref(), env)
            .with_context(|| match config_path {
                Some(path) => format!("Invalid configuration from {path:?}"),
                None => "Invalid configuration (no config file)".to_string(),
            })
    }

    pub fn from_sources<F>(config_content: Option<&str>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: AppConfig = match config_content {
            Some(content) => toml::from_str(content).context("Failed to parse TOML config")?,
            None => AppConfig::default(),
        };

        config.credentials = Credentials::from_env(&env)?;
        if let Some(port) = env(PORT_VAR).filter(|port| !port.trim().is_empty()) {
            let port: u16 = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid {PORT_VAR} environment variable: {port:?}"))?;
            config.http.address.set_port(port);
        }

        Ok(config)
    }
}

#[derive(Default, Clone)]
pub struct Credentials {
    pub slack_bot_token: String,
    pub openai_api_key: String,
}
impl Credentials {
    fn from_env<F>(env: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| -> Result<String> {
            match env(key).map(|value| value.trim().to_string()) {
                Some(value) if !value.is_empty() => Ok(value),
                _ => bail!("Missing required {key} environment variable!"),
            }
        };

        Ok(Self {
            slack_bot_token: required(SLACK_BOT_TOKEN_VAR)?,
            openai_api_key: required(OPENAI_API_KEY_VAR)?,
        })
    }
}
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("slack_bot_token", &"<redacted>")
            .field("openai_api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HTTPConfig {
    #[serde(default = "default_http_address")]
    pub address: SocketAddr,

    #[serde(default)]
    pub tls: Option<TLSConfig>,
}
impl Default for HTTPConfig {
    fn default() -> Self {
        Self {
            address: default_http_address(),
            tls: None,
        }
    }
}

#[cfg_attr(
    not(any(feature = "tls-rustls", feature = "tls-native")),
    allow(dead_code)
)]
#[derive(Debug, Clone, Deserialize)]
pub struct TLSConfig {
    #[serde(deserialize_with = "deserialize_existing_file")]
    pub certificate_path: PathBuf,

    #[serde(deserialize_with = "deserialize_existing_file")]
    pub key_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_api_url")]
    pub api_url: String,

    #[serde(default = "default_completion_model")]
    pub model: String,
}
impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_url: default_completion_api_url(),
            model: default_completion_model(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackConfig {
    #[serde(default = "default_slack_api_base")]
    pub api_base: String,

    #[serde(default = "default_slack_request_timeout_secs")]
    pub request_timeout_secs: u64,
}
impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            api_base: default_slack_api_base(),
            request_timeout_secs: default_slack_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplyConfig {
    /// Post a generic internal-error notice into the thread when the reply itself fails.
    #[serde(default = "default_true")]
    pub notify_on_delivery_failure: bool,
}
impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            notify_on_delivery_failure: default_true(),
        }
    }
}

#[cfg(feature = "sentry")]
#[derive(Debug, Deserialize)]
pub struct SentryConfig {
    pub dsn: String,

    #[serde(default)]
    pub environment: Option<String>,

    #[serde(default)]
    pub server_name: Option<String>,

    #[serde(default)]
    pub debug: bool,

    /// Message text is user content, so PII stays off unless asked for.
    #[serde(default)]
    pub send_default_pii: bool,
}

fn default_http_address() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 3000)
}
fn default_completion_api_url() -> String {
    "https://api.openai.com/v1/responses".to_string()
}
fn default_completion_model() -> String {
    "gpt-4.1-mini".to_string()
}
fn default_slack_api_base() -> String {
    "https://slack.com/api".to_string()
}
fn default_slack_request_timeout_secs() -> u64 {
    10
}
fn default_true() -> bool {
    true
}

fn deserialize_existing_file<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let path = PathBuf::deserialize(deserializer)?;
    if !path.is_file() {
        return Err(serde::de::Error::custom(format!(
            "File does not exist or is not a file: {}",
            path.display()
        )));
    }
    Ok(path)
}
