use std::env;

use auth::TokenLifetimes;
use chrono::Duration;
use config::Config as ConfigBuilder;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    pub links: LinksConfig,
    pub password_reset: PasswordResetConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub http_port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub session_ttl_hours: i64,
    pub email_verification_ttl_hours: i64,
    pub password_reset_ttl_minutes: i64,
}

impl JwtConfig {
    pub fn lifetimes(&self) -> TokenLifetimes {
        TokenLifetimes {
            session: Duration::hours(self.session_ttl_hours),
            email_verification: Duration::hours(self.email_verification_ttl_hours),
            password_reset: Duration::minutes(self.password_reset_ttl_minutes),
        }
    }
}

/// Base URLs embedded in links delivered out-of-band.
#[derive(Debug, Deserialize, Clone)]
pub struct LinksConfig {
    pub verification_url: String,
    pub reset_password_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PasswordResetConfig {
    /// Addresses whose password can never be reset.
    pub protected_emails: Vec<String>,
}

impl Config {
    /// Load configuration from files with environment variable overrides
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (DATABASE__URL, JWT__SECRET, etc.)
    /// 2. Environment-specific config file (config/{environment}.toml)
    /// 3. Default config file (config/default.toml)
    /// 4. Built-in defaults
    ///
    /// `database.url` and `jwt.secret` have no built-in default.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(Self::environment())
    }

    /// Environment source: `JWT__SECRET` sets `jwt.secret`.
    ///
    /// No prefix, so every variable is read; unknown keys are ignored on
    /// deserialization.
    fn environment() -> Environment {
        Environment::default()
            .separator("__")
            .list_separator(",")
            // Example: PASSWORD_RESET__PROTECTED_EMAILS=a@x.com,b@y.com
            .with_list_parse_key("password_reset.protected_emails")
            .try_parsing(true)
    }

    fn load_with(environment: Environment) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let configuration = Self::with_defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(environment)
            .build()?;

        configuration.try_deserialize()
    }

    fn with_defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError>
    {
        ConfigBuilder::builder()
            .set_default("database.max_connections", 5)?
            .set_default("server.http_port", 5001)?
            .set_default("jwt.session_ttl_hours", 7 * 24)?
            .set_default("jwt.email_verification_ttl_hours", 24)?
            .set_default("jwt.password_reset_ttl_minutes", 15)?
            .set_default(
                "links.verification_url",
                "http://localhost:5001/api/auth/verify-email",
            )?
            .set_default(
                "links.reset_password_url",
                "http://localhost:5173/reset-password",
            )?
            .set_default("password_reset.protected_emails", Vec::<String>::new())
    }
}
