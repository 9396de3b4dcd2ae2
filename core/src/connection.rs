// SPDX-License-Identifier: PMPL-1.0-or-later
//! A thin wrapper around a `tokio_postgres` client, shared by the source
//! and destination handles an orchestrator passes into the core.

use tokio_postgres::{Client, Config, NoTls};
use tracing::{info, instrument, warn};

use crate::error::ConnectionError;

/// One live connection to a PostgreSQL database.
///
/// The orchestrator owns two of these per run (source, destination) and
/// passes them into [`crate::introspect::introspect`] and
/// [`crate::sync::sync_table`] respectively. Each handle is assumed
/// exclusively owned for the duration of the run.
pub struct PgHandle {
    connection_string: String,
    client: Client,
    database_name: String,
}

impl PgHandle {
    /// Connect to `connection_string`, spawning the background connection
    /// task the way `tokio_postgres` requires.
    #[instrument(skip(connection_string), fields(database))]
    pub async fn connect(connection_string: &str) -> Result<Self, ConnectionError> {
        let config: Config = connection_string.parse()?;
        let database_name = config
            .get_dbname()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "postgres".to_string());

        let (client, connection) = tokio_postgres::connect(connection_string, NoTls).await?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "postgres connection task ended with an error");
            }
        });

        info!(database = %database_name, "connected");

        Ok(Self {
            connection_string: connection_string.to_string(),
            client,
            database_name,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut Client {
        &mut self.client
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}
