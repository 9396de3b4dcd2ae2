// SPDX-License-Identifier: PMPL-1.0-or-later
//! Layered configuration: a TOML file overridden by CLI flags.

use serde::{Deserialize, Serialize};
use tokio_postgres::Config as PgConfig;

/// Connection details for one database (source or destination).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub sslmode: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            dbname: "postgres".to_string(),
            sslmode: "disable".to_string(),
        }
    }
}

impl ConnectionConfig {
    /// Build a `tokio_postgres::Config` out of these fields, in place of
    /// the Go original's DSN-string formatting.
    pub fn to_tokio_postgres_config(&self) -> PgConfig {
        let mut config = PgConfig::new();
        config
            .host(&self.host)
            .port(self.port)
            .user(&self.user)
            .password(&self.password)
            .dbname(&self.dbname);
        config
    }

    /// A `tokio_postgres` keyword/value connection string built from these
    /// fields, used where an owned `&str` is more convenient than a `Config`.
    pub fn dsn(&self) -> String {
        format!(
            "host={} port={} user={} password={} dbname={} sslmode={}",
            self.host, self.port, self.user, self.password, self.dbname, self.sslmode
        )
    }
}

/// Top-level run configuration, loaded from `pgsync.toml` (or wherever
/// `--config` points) and overridden by CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub source: ConnectionConfig,
    pub destination: ConnectionConfig,
    pub tables: Vec<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    pgsync_core::DEFAULT_BATCH_SIZE as usize
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            source: ConnectionConfig::default(),
            destination: ConnectionConfig::default(),
            tables: Vec::new(),
            batch_size: default_batch_size(),
        }
    }
}

impl RunConfig {
    /// An annotated starting point for an operator to edit, written out by
    /// `pgsync init` and on first run when no config file exists yet.
    pub fn example() -> Self {
        Self {
            source: ConnectionConfig {
                host: "source.internal".to_string(),
                dbname: "app_production".to_string(),
                ..ConnectionConfig::default()
            },
            destination: ConnectionConfig {
                host: "destination.internal".to_string(),
                dbname: "app_staging".to_string(),
                ..ConnectionConfig::default()
            },
            tables: vec!["public.customers".to_string(), "public.orders".to_string()],
            batch_size: default_batch_size(),
        }
    }

    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: RunConfig = toml::from_str(&contents)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        use anyhow::Context;
        let contents = toml::to_string_pretty(self).context("serializing config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("writing config file {}", path.display()))?;
        Ok(())
    }

    /// Reject configurations that would fail obviously, before any network I/O.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.batch_size > 0, "batch_size must be positive");
        anyhow::ensure!(!self.tables.is_empty(), "tables must list at least one table");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_config_validates() {
        RunConfig::example()
            .validate()
            .expect("the example config is a valid starting point");
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let mut cfg = RunConfig::example();
        cfg.batch_size = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn empty_table_list_is_rejected() {
        let mut cfg = RunConfig::example();
        cfg.tables.clear();
        assert!(cfg.validate().is_err());
    }
}
