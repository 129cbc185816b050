//! Docker container management for the PostgreSQL tests
//!
//! Each test starts its own container and keeps the returned
//! [`PostgresContainer`] alive for as long as it talks to the server.

use std::time::Duration;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;

use crate::fixtures::initialize_logging;

/// A running PostgreSQL container
pub struct PostgresContainer {
    #[allow(dead_code)]
    inner: ContainerAsync<Postgres>,
    /// Host address (typically 127.0.0.1)
    pub host: String,
    /// Port number (randomly assigned by testcontainers)
    pub port: u16,
}

impl PostgresContainer {
    /// Connection string for the default `postgres` database
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} user=postgres password=postgres dbname=postgres connect_timeout=5",
            self.host, self.port
        )
    }
}

/// Start a PostgreSQL container and wait until it accepts connections
pub async fn start_postgres() -> anyhow::Result<PostgresContainer> {
    initialize_logging();
    tracing::info!("starting PostgreSQL test container");

    let inner = Postgres::default()
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("failed to start postgres container: {}", e))?;

    let port = inner
        .get_host_port_ipv4(5432)
        .await
        .map_err(|e| anyhow::anyhow!("failed to get postgres port: {}", e))?;

    let container = PostgresContainer {
        inner,
        host: "127.0.0.1".to_string(),
        port,
    };

    wait_until_ready(&container.connection_string()).await?;
    tracing::info!(port, "PostgreSQL test container ready");
    Ok(container)
}

async fn wait_until_ready(connection_string: &str) -> anyhow::Result<()> {
    use pqpool_core::Connector;
    use pqpool_postgres::PostgresConnector;

    let max_retries: u32 = 10;
    for attempt in 1..=max_retries {
        match PostgresConnector.open(connection_string).await {
            Ok(conn) => {
                conn.close().await.ok();
                return Ok(());
            }
            Err(e) if attempt < max_retries => {
                let delay = Duration::from_millis(250 * u64::from(attempt));
                tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, "PostgreSQL not ready, retrying: {}", e);
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "PostgreSQL not ready after {} attempts: {}",
                    max_retries,
                    e
                ));
            }
        }
    }
    Ok(())
}
