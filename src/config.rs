use std::time::Duration;

use clap::Parser;
use once_cell::sync::Lazy;

pub const DEFAULT_BCRYPT_COST: u32 = 12;
pub const DEFAULT_GENERATED_PASSWORD_LENGTH: usize = 12;
pub const DEFAULT_PROCESSING_LEASE_SECONDS: u64 = 300; // 5 minutes

pub static APP_CONFIG: Lazy<Config> = Lazy::new(Config::parse);

#[derive(Debug, Parser, Clone)]
pub struct Config {
    #[clap(long, env, default_value_t = 8080)]
    pub port: u16,

    #[clap(long, env, default_value_t = true, action = clap::ArgAction::Set)]
    pub swagger_enabled: bool,

    #[clap(long, env, default_value = "info")]
    pub log_level: String,

    #[clap(long, env)]
    pub database_url: String,

    /// Apply pending schema migrations on startup.
    #[clap(long, env, default_value_t = true, action = clap::ArgAction::Set)]
    pub run_migrations: bool,

    #[clap(long, env, default_value_t = DEFAULT_BCRYPT_COST)]
    pub bcrypt_cost: u32,

    /// Length of passwords issued to roster rows that do not carry one.
    #[clap(long, env, default_value_t = DEFAULT_GENERATED_PASSWORD_LENGTH)]
    pub generated_password_length: usize,

    /// How long a processing pass may hold a file before another caller can take it over.
    #[clap(long, env, default_value_t = DEFAULT_PROCESSING_LEASE_SECONDS)]
    pub processing_lease_seconds: u64,

    /// Let `pending` files go straight to `processed` without an explicit approval.
    #[clap(long, env, default_value_t = false)]
    pub auto_approve_uploads: bool,

    #[clap(long, env, default_value = "*")]
    pub cors_allowed_origins: String,

    #[clap(long, env, default_value = "local")]
    pub app_env: String,
}

/// Knobs the roster pipeline reads at runtime.
///
/// Binaries build this from [`Config`]; tests construct it directly.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub bcrypt_cost: u32,
    pub generated_password_length: usize,
    pub processing_lease: Duration,
    pub auto_approve_uploads: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            generated_password_length: DEFAULT_GENERATED_PASSWORD_LENGTH,
            processing_lease: Duration::from_secs(DEFAULT_PROCESSING_LEASE_SECONDS),
            auto_approve_uploads: false,
        }
    }
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            bcrypt_cost: config.bcrypt_cost,
            generated_password_length: config.generated_password_length,
            processing_lease: Duration::from_secs(config.processing_lease_seconds),
            auto_approve_uploads: config.auto_approve_uploads,
        }
    }
}
