use std::{env, fmt::Display, str::FromStr, time::Duration};

use anyhow::{anyhow, Context};
use tracing::info;

use crate::lifecycle::ExamPolicy;
use crate::service::ServiceConfig;

pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub service: ServiceConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .context("DATABASE_URL must be set to a production Postgres instance")?;

        Ok(Self {
            database_url,
            max_connections: try_load(&lookup, "DB_MAX_CONNECTIONS", "5")?,
            acquire_timeout: Duration::from_secs(try_load(
                &lookup,
                "DB_ACQUIRE_TIMEOUT_SECS",
                "10",
            )?),
            service: ServiceConfig {
                exam_policy: try_load::<ExamPolicy>(&lookup, "EXAM_POLICY", "independent")?,
                require_upload_privilege: try_load(&lookup, "REQUIRE_UPLOAD_PRIVILEGE", "true")?,
                top_performers: try_load(&lookup, "TOP_PERFORMERS", "5")?,
            },
        })
    }
}

fn try_load<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.trim()
        .parse()
        .map_err(|e| anyhow!("invalid {key} value {raw:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config =
            Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/results")]))
                .unwrap();
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.acquire_timeout, Duration::from_secs(10));
        assert_eq!(config.service, ServiceConfig::default());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/results"),
            ("EXAM_POLICY", "requires-test"),
            ("REQUIRE_UPLOAD_PRIVILEGE", "false"),
            ("TOP_PERFORMERS", "10"),
        ]))
        .unwrap();
        assert_eq!(config.service.exam_policy, ExamPolicy::RequiresTest);
        assert!(!config.service.require_upload_privilege);
        assert_eq!(config.service.top_performers, 10);
    }

    #[test]
    fn malformed_values_are_errors() {
        let result = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/results"),
            ("DB_MAX_CONNECTIONS", "many"),
        ]));
        assert!(result.is_err());
        assert!(Config::from_lookup(lookup(&[])).is_err());
    }
}
