use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    pub duffel: DuffelConfig,
    pub vault: VaultConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DuffelConfig {
    pub api_token: String,
    #[serde(default = "default_duffel_base_url")]
    pub base_url: String,
    /// Card vault calls are synchronous from the customer's perspective.
    #[serde(default = "default_tokenize_timeout")]
    pub tokenize_timeout_secs: u64,
}

fn default_duffel_base_url() -> String {
    "https://api.duffel.com".to_string()
}

fn default_tokenize_timeout() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct VaultConfig {
    /// 64 hex chars (AES-256 key).
    pub key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_booking_rpm")]
    pub booking_requests_per_minute: u32,
    #[serde(default = "default_payment_rpm")]
    pub payment_requests_per_minute: u32,
    #[serde(default = "default_reference_prefix")]
    pub reference_prefix: String,
    #[serde(default = "default_reconcile_fan_out")]
    pub reconcile_fan_out: usize,
}

fn default_booking_rpm() -> u32 {
    20
}

fn default_payment_rpm() -> u32 {
    5
}

fn default_reference_prefix() -> String {
    "SKY".to_string()
}

fn default_reconcile_fan_out() -> usize {
    8
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file (optional)
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in to git
            .add_source(config::File::with_name("config/local").required(false))
            // Environment variables with a prefix of SKYBOOK
            .add_source(config::Environment::with_prefix("SKYBOOK").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
