use serde::Deserialize;

/// Table used when `LEADS_TABLE_NAME` is not set.
pub const DEFAULT_TABLE_NAME: &str = "leads";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// Azure storage connection string. `None` leaves the store unconfigured.
    pub storage_connection_string: Option<String>,
    pub table_name: String,
    pub environment: String,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("FUNCTIONS_CUSTOMHANDLER_PORT")
                .or_else(|_| std::env::var("PORT"))
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))
                .and_then(|port| {
                    if port == 0 {
                        anyhow::bail!("PORT must be a valid number between 1-65535");
                    }
                    Ok(port)
                })?,
            storage_connection_string: std::env::var("AZURE_STORAGE_CONNECTION_STRING")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            table_name: std::env::var("LEADS_TABLE_NAME")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|name| name.trim().to_string())
                .unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string()),
            environment: std::env::var("AZURE_FUNCTIONS_ENVIRONMENT")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "Production".to_string()),
            rate_limit_per_second: std::env::var("RATE_LIMIT_PER_SECOND")
                .unwrap_or_else(|_| "10".to_string())
                .parse::<u64>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| anyhow::anyhow!("RATE_LIMIT_PER_SECOND must be a positive integer"))?,
            rate_limit_burst: std::env::var("RATE_LIMIT_BURST")
                .unwrap_or_else(|_| "20".to_string())
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| anyhow::anyhow!("RATE_LIMIT_BURST must be a positive integer"))?,
        };

        validate_table_name(&config.table_name)?;

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        if config.storage_connection_string.is_none() {
            tracing::warn!("AZURE_STORAGE_CONNECTION_STRING not found; lead storage disabled");
        }
        tracing::debug!("Table name: {}", config.table_name);
        tracing::debug!("Environment: {}", config.environment);
        tracing::debug!(
            "Rate limit: {}/s, burst {}",
            config.rate_limit_per_second,
            config.rate_limit_burst
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

/// Table names are 3-63 alphanumeric characters and start with a letter.
pub fn validate_table_name(name: &str) -> anyhow::Result<()> {
    if !(3..=63).contains(&name.len()) {
        anyhow::bail!("LEADS_TABLE_NAME must be 3-63 characters long");
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        anyhow::bail!("LEADS_TABLE_NAME may only contain letters and digits");
    }
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        anyhow::bail!("LEADS_TABLE_NAME must start with a letter");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_rules() {
        assert!(validate_table_name("leads").is_ok());
        assert!(validate_table_name("Leads2024").is_ok());
        assert!(validate_table_name("le").is_err());
        assert!(validate_table_name("1leads").is_err());
        assert!(validate_table_name("lead-table").is_err());
        assert!(validate_table_name(&"a".repeat(64)).is_err());
    }
}
