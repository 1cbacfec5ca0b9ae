use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("DATABASE_URL must be a postgres:// or postgresql:// URL")]
    InvalidDatabaseUrl,

    #[error("ASSESSMENT_DB_MAX_CONNECTIONS must be a number between 1 and 100, got {0:?}")]
    InvalidPoolSize(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::MissingRequired("DATABASE_URL"))?;
        if !database_url.starts_with("postgres://") && !database_url.starts_with("postgresql://")
        {
            return Err(ConfigError::InvalidDatabaseUrl);
        }

        let max_connections = match lookup("ASSESSMENT_DB_MAX_CONNECTIONS") {
            None => DEFAULT_MAX_CONNECTIONS,
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|size| (1..=100).contains(size))
                .ok_or(ConfigError::InvalidPoolSize(raw))?,
        };

        Ok(Self {
            database_url,
            max_connections,
            user_id: lookup("ASSESSMENT_USER_ID").filter(|value| !value.is_empty()),
            user_name: lookup("ASSESSMENT_USER_NAME").filter(|value| !value.is_empty()),
        })
    }
}
