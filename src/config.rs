use std::{env, fmt::Display, str::FromStr};

use anyhow::Context;
use tracing::info;

pub struct Config {
    pub database_url: Option<String>,
    pub port: u16,
    pub max_connections: u32,
    pub admin_email: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").ok(),
            port: try_load("PORT", "8080")?,
            max_connections: try_load("DATABASE_MAX_CONNECTIONS", "5")?,
            admin_email: try_load("ADMIN_EMAIL", "admin@surveyapp.com")?,
        })
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a production Postgres instance")
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| anyhow::anyhow!("invalid {key} value `{raw}`: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_default_when_unset() {
        let port: u16 = try_load("SUGGESTION_REPORT_TEST_UNSET_PORT", "8080").unwrap();
        assert_eq!(port, 8080);
    }

    #[test]
    fn rejects_unparsable_values() {
        let result: anyhow::Result<u16> = try_load("SUGGESTION_REPORT_TEST_UNSET_BAD", "not-a-port");
        assert!(result.is_err());
    }
}
