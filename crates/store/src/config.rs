use common::StoreError;

/// Postgres connection settings, read the same way as the bus's
/// `BusConfig::from_env`.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_url: String,
    pub max_connections: u32,
}

impl StoreConfig {
    /// Expected environment variables:
    /// - `DATABASE_URL` (required)
    /// - `DATABASE_MAX_CONNECTIONS` (optional, default 10)
    pub fn from_env() -> Result<Self, StoreError> {
        dotenv::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| StoreError::Connection("DATABASE_URL must be set".to_string()))?;

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| StoreError::Connection("DATABASE_MAX_CONNECTIONS must be a valid number".to_string()))?;

        Ok(Self { database_url, max_connections })
    }
}
