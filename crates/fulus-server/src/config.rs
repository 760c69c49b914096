//! Server configuration: CLI args + JSON config file, with fields falling
//! back to environment variables via [`LiteralOrEnv`] for secrets. Mirrors
//! the teacher's `Config::load` shape (CLI path -> file -> serde defaults).

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::IpAddr;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Parser, Debug)]
#[command(name = "fulus-server")]
#[command(about = "Offline sync + AI chat core HTTP server")]
struct CliArgs {
    /// Path to the JSON configuration file.
    #[arg(long, short, env = "CONFIG", default_value = "config.json")]
    config: PathBuf,
}

/// A transparent wrapper that resolves `$VAR`/`${VAR}` environment variable
/// references during deserialization, falling back to the literal value
/// otherwise. Used for fields that may carry a secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralOrEnv<T>(T);

impl<T> LiteralOrEnv<T> {
    pub fn inner(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }

    fn parse_env_var_syntax(s: &str) -> Option<String> {
        if let Some(stripped) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
            Some(stripped.to_string())
        } else if let Some(stripped) = s.strip_prefix('$') {
            if !stripped.is_empty() && stripped.chars().all(|c| c.is_alphanumeric() || c == '_') {
                Some(stripped.to_string())
            } else {
                None
            }
        } else {
            None
        }
    }
}

impl<T> Deref for LiteralOrEnv<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for LiteralOrEnv<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<'de, T> Deserialize<'de> for LiteralOrEnv<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let value = if let Some(var_name) = Self::parse_env_var_syntax(&s) {
            std::env::var(&var_name)
                .map_err(|_| serde::de::Error::custom(format!("environment variable '{var_name}' not found (referenced as '{s}')")))?
        } else {
            s
        };
        value.parse::<T>().map(LiteralOrEnv).map_err(|e| serde::de::Error::custom(format!("failed to parse value: {e}")))
    }
}

impl<T: Serialize> Serialize for LiteralOrEnv<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file at {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineTxConfig {
    #[serde(default = "defaults::offline_max_age_days")]
    pub max_age_days: i64,
    #[serde(default = "defaults::offline_future_tolerance_minutes")]
    pub future_tolerance_minutes: i64,
    #[serde(default = "defaults::offline_batch_max")]
    pub batch_max: usize,
    #[serde(default = "defaults::offline_max_amount", with = "rust_decimal::serde::str")]
    pub max_amount: rust_decimal::Decimal,
}

impl Default for OfflineTxConfig {
    fn default() -> Self {
        OfflineTxConfig {
            max_age_days: defaults::offline_max_age_days(),
            future_tolerance_minutes: defaults::offline_future_tolerance_minutes(),
            batch_max: defaults::offline_batch_max(),
            max_amount: defaults::offline_max_amount(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceConfig {
    #[serde(default = "defaults::nonce_retention_days")]
    pub retention_days: i64,
}

impl Default for NonceConfig {
    fn default() -> Self {
        NonceConfig { retention_days: defaults::nonce_retention_days() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMemoryConfig {
    #[serde(default = "defaults::chat_memory_max_messages")]
    pub max_messages: usize,
    #[serde(default = "defaults::chat_memory_cache_ttl_seconds")]
    pub cache_ttl_seconds: i64,
}

impl Default for ChatMemoryConfig {
    fn default() -> Self {
        ChatMemoryConfig {
            max_messages: defaults::chat_memory_max_messages(),
            cache_ttl_seconds: defaults::chat_memory_cache_ttl_seconds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfig {
    #[serde(default)]
    pub memory: ChatMemoryConfig,
    #[serde(default = "defaults::chat_prune_after_days")]
    pub prune_after_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsRateConfig {
    #[serde(default = "defaults::insights_rate_minute")]
    pub minute: usize,
    #[serde(default = "defaults::insights_rate_hour")]
    pub hour: usize,
}

impl Default for InsightsRateConfig {
    fn default() -> Self {
        InsightsRateConfig { minute: defaults::insights_rate_minute(), hour: defaults::insights_rate_hour() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsCacheConfig {
    #[serde(default = "defaults::insights_cache_default_ttl_seconds")]
    pub default_ttl_seconds: i64,
}

impl Default for InsightsCacheConfig {
    fn default() -> Self {
        InsightsCacheConfig { default_ttl_seconds: defaults::insights_cache_default_ttl_seconds() }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct InsightsConfig {
    #[serde(default)]
    pub rate: InsightsRateConfig,
    #[serde(default)]
    pub cache: InsightsCacheConfig,
}

/// Server configuration (spec §6 "Configuration surface").
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "defaults::default_port")]
    port: u16,
    #[serde(default = "defaults::default_host")]
    host: IpAddr,
    #[serde(default)]
    pub offline: OfflineTxConfig,
    #[serde(default)]
    pub nonce: NonceConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub insights: InsightsConfig,
    /// IP addresses permitted to call `POST /chat/admin`.
    #[serde(default)]
    pub admin_ip_allowlist: Vec<IpAddr>,
    /// LLM provider credential; may be a literal or `$ENV_VAR` reference.
    pub llm_api_key: LiteralOrEnv<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: defaults::default_port(),
            host: defaults::default_host(),
            offline: OfflineTxConfig::default(),
            nonce: NonceConfig::default(),
            chat: ChatConfig::default(),
            insights: InsightsConfig::default(),
            admin_ip_allowlist: Vec::new(),
            llm_api_key: LiteralOrEnv("dev-only-placeholder".to_string()),
        }
    }
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn host(&self) -> IpAddr {
        self.host
    }

    /// Loads configuration from `--config`/`$CONFIG` (default `config.json`);
    /// missing fields fall back to environment variables or the defaults
    /// above during deserialization.
    pub fn load() -> Result<Self, ConfigError> {
        let cli_args = CliArgs::parse();
        if !cli_args.config.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(&cli_args.config).map_err(|e| ConfigError::FileRead(cli_args.config.clone(), e))?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }
}

mod defaults {
    use std::env;
    use std::net::IpAddr;

    pub fn default_port() -> u16 {
        env::var("PORT").ok().and_then(|s| s.parse().ok()).unwrap_or(8080)
    }

    pub fn default_host() -> IpAddr {
        env::var("HOST").ok().and_then(|s| s.parse().ok()).unwrap_or(IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)))
    }

    pub fn offline_max_age_days() -> i64 {
        30
    }

    pub fn offline_future_tolerance_minutes() -> i64 {
        5
    }

    pub fn offline_batch_max() -> usize {
        100
    }

    pub fn offline_max_amount() -> rust_decimal::Decimal {
        fulus_types::offline_tx::MAX_AMOUNT
    }

    pub fn nonce_retention_days() -> i64 {
        7
    }

    pub fn chat_memory_max_messages() -> usize {
        20
    }

    pub fn chat_memory_cache_ttl_seconds() -> i64 {
        3600
    }

    pub fn chat_prune_after_days() -> i64 {
        30
    }

    pub fn insights_rate_minute() -> usize {
        30
    }

    pub fn insights_rate_hour() -> usize {
        100
    }

    pub fn insights_cache_default_ttl_seconds() -> i64 {
        600
    }
}
