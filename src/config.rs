use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// When unset the server runs on the in-memory backend, which is only
    /// suitable for a single local instance.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,

    /// Cron expression for the expire-overdue housekeeping sweep.
    pub expiry_sweep_schedule: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        Ok(Self {
            database_url: config.get("database_url").ok(),
            host: config.get("host").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: config.get("port").unwrap_or(8080),
            expiry_sweep_schedule: config
                .get("expiry_sweep_schedule")
                .unwrap_or_else(|_| "0 */5 * * * *".to_string()),
        })
    }
}
