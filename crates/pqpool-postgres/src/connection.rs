//! PostgreSQL connection implementation

use async_trait::async_trait;
use pqpool_core::{
    ColumnMeta, Connection, PoolError, QueryResult, Result, Row, StatementResult, Transaction,
    Value,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::Mutex;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};

use crate::connector::host_from_connection_string;
use crate::value::{PgValue, decode_column};

type SharedClient = Arc<Mutex<Option<Client>>>;

fn format_postgres_error(error: &tokio_postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let code = db_error.code();
    let mut message = db_error.message().to_string();

    if let Some(detail) = db_error.detail()
        && !detail.trim().is_empty()
    {
        message.push_str(&format!(" (detail: {})", detail));
    }

    if let Some(hint) = db_error.hint()
        && !hint.trim().is_empty()
    {
        message.push_str(&format!(" (hint: {})", hint));
    }

    match code.code() {
        "23505" => format!("duplicate value violates unique constraint: {}", message),
        "23503" => format!("foreign key violation: {}", message),
        "23502" => format!("null value violates not-null constraint: {}", message),
        "22P02" => format!("invalid input syntax: {}", message),
        _ => format!("{} (code: {:?})", message, code),
    }
}

fn closed_error() -> PoolError {
    PoolError::Connection("connection is closed".into())
}

/// Run `sql` on the simple protocol
///
/// Accepts several `;`-separated statements. The result is the last
/// statement's rows, all as text.
async fn run_simple_query(client: &Client, sql: &str) -> Result<QueryResult> {
    let start_time = Instant::now();
    let messages = client.simple_query(sql).await.map_err(|e| {
        let message = format_postgres_error(&e);
        PoolError::Query(format!("Query failed: {}", message))
    })?;

    let mut result = QueryResult::empty();
    let mut columns: Vec<ColumnMeta> = Vec::new();
    let mut rows: Vec<Row> = Vec::new();
    for message in messages {
        match message {
            SimpleQueryMessage::Row(row) => {
                if columns.is_empty() {
                    columns = row
                        .columns()
                        .iter()
                        .enumerate()
                        .map(|(ordinal, column)| ColumnMeta {
                            name: column.name().to_string(),
                            data_type: "text".to_string(),
                            ordinal,
                        })
                        .collect();
                }
                let names = columns.iter().map(|c| c.name.clone()).collect();
                let values = (0..row.len())
                    .map(|idx| row.get(idx).map_or(Value::Null, |v| Value::String(v.to_string())))
                    .collect();
                rows.push(Row::new(names, values));
            }
            SimpleQueryMessage::CommandComplete(affected) => {
                result.columns = std::mem::take(&mut columns);
                result.rows = std::mem::take(&mut rows);
                result.affected_rows = affected;
            }
            _ => {}
        }
    }

    result.execution_time_ms = start_time.elapsed().as_millis() as u64;
    Ok(result)
}

async fn run_query(client: &Client, sql: &str, params: &[Value]) -> Result<QueryResult> {
    tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing query");
    if params.is_empty() {
        return run_simple_query(client, sql).await;
    }
    let start_time = Instant::now();

    let statement = client.prepare(sql).await.map_err(|e| {
        let message = format_postgres_error(&e);
        PoolError::Query(format!("Failed to prepare query: {}", message))
    })?;

    let pg_params: Vec<PgValue> = params.iter().map(PgValue::from_value).collect();
    let param_refs: Vec<&(dyn ToSql + Sync)> =
        pg_params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

    let pg_rows = client.query(&statement, &param_refs).await.map_err(|e| {
        let message = format_postgres_error(&e);
        PoolError::Query(format!("Query failed: {}", message))
    })?;

    let columns: Vec<ColumnMeta> = statement
        .columns()
        .iter()
        .enumerate()
        .map(|(ordinal, column)| ColumnMeta {
            name: column.name().to_string(),
            data_type: column.type_().name().to_string(),
            ordinal,
        })
        .collect();
    let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

    let rows = pg_rows
        .iter()
        .map(|row| {
            let values = (0..row.len()).map(|idx| decode_column(row, idx)).collect();
            Row::new(names.clone(), values)
        })
        .collect();

    let mut result = QueryResult::empty();
    result.columns = columns;
    result.rows = rows;
    result.execution_time_ms = start_time.elapsed().as_millis() as u64;
    Ok(result)
}

async fn run_execute(client: &Client, sql: &str, params: &[Value]) -> Result<StatementResult> {
    tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing statement");

    let pg_params: Vec<PgValue> = params.iter().map(PgValue::from_value).collect();
    let param_refs: Vec<&(dyn ToSql + Sync)> =
        pg_params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

    let affected_rows = client.execute(sql, &param_refs).await.map_err(|e| {
        let message = format_postgres_error(&e);
        PoolError::Query(format!("Statement failed: {}", message))
    })?;

    Ok(StatementResult { affected_rows })
}

/// PostgreSQL connection wrapper
pub struct PostgresConnection {
    client: SharedClient,
    closed: Arc<AtomicBool>,
    host: Option<String>,
}

impl PostgresConnection {
    /// Connect using a libpq-style or URL connection string
    pub async fn connect(connection_string: &str) -> Result<Self> {
        let host = host_from_connection_string(connection_string);
        tracing::info!(
            host = host.as_deref().unwrap_or("unknown"),
            "connecting to PostgreSQL database"
        );

        let (client, connection) = tokio_postgres::connect(connection_string, NoTls)
            .await
            .map_err(|e| {
                let message = format_postgres_error(&e);
                tracing::error!(error = %message, "failed to connect to PostgreSQL");
                PoolError::Connection(format!("Failed to connect to PostgreSQL: {}", message))
            })?;

        let closed = Arc::new(AtomicBool::new(false));
        let driver_closed = closed.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "PostgreSQL connection error");
            }
            driver_closed.store(true, Ordering::SeqCst);
        });

        Ok(Self {
            client: Arc::new(Mutex::new(Some(client))),
            closed,
            host,
        })
    }
}

#[async_trait]
impl Connection for PostgresConnection {
    fn driver_name(&self) -> &str {
        "postgresql"
    }

    fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or_else(closed_error)?;
        run_execute(client, sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or_else(closed_error)?;
        run_query(client, sql, params).await
    }

    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        tracing::debug!("beginning PostgreSQL transaction");
        {
            let guard = self.client.lock().await;
            let client = guard.as_ref().ok_or_else(closed_error)?;
            client.execute("BEGIN", &[]).await.map_err(|e| {
                let message = format_postgres_error(&e);
                PoolError::Query(format!("Failed to begin transaction: {}", message))
            })?;
        }

        Ok(Box::new(PostgresTransaction {
            client: self.client.clone(),
            committed: false,
            rolled_back: false,
        }))
    }

    async fn close(&self) -> Result<()> {
        tracing::debug!(host = self.host.as_deref().unwrap_or("unknown"), "closing PostgreSQL connection");
        self.client.lock().await.take();
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return true;
        }
        match self.client.try_lock() {
            Ok(guard) => guard.as_ref().is_none_or(|client| client.is_closed()),
            // Busy means a query holds it, so it is alive
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for PostgresConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConnection")
            .field("host", &self.host)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

/// Transaction opened with `BEGIN` on a [`PostgresConnection`]
pub struct PostgresTransaction {
    client: SharedClient,
    committed: bool,
    rolled_back: bool,
}

impl Drop for PostgresTransaction {
    fn drop(&mut self) {
        if !self.committed && !self.rolled_back {
            tracing::warn!("PostgreSQL transaction dropped without commit or rollback");
        }
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn commit(mut self: Box<Self>) -> Result<()> {
        tracing::debug!("committing PostgreSQL transaction");

        if self.rolled_back {
            return Err(PoolError::Query("Transaction already rolled back".into()));
        }
        if self.committed {
            return Err(PoolError::Query("Transaction already committed".into()));
        }

        {
            let guard = self.client.lock().await;
            let client = guard.as_ref().ok_or_else(closed_error)?;
            client.execute("COMMIT", &[]).await.map_err(|e| {
                let message = format_postgres_error(&e);
                PoolError::Query(format!("Failed to commit transaction: {}", message))
            })?;
        }

        self.committed = true;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        tracing::debug!("rolling back PostgreSQL transaction");

        if self.committed {
            return Err(PoolError::Query("Transaction already committed".into()));
        }
        if self.rolled_back {
            return Ok(());
        }

        {
            let guard = self.client.lock().await;
            let client = guard.as_ref().ok_or_else(closed_error)?;
            client.execute("ROLLBACK", &[]).await.map_err(|e| {
                let message = format_postgres_error(&e);
                PoolError::Query(format!("Failed to rollback transaction: {}", message))
            })?;
        }

        self.rolled_back = true;
        Ok(())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or_else(closed_error)?;
        run_query(client, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or_else(closed_error)?;
        run_execute(client, sql, params).await
    }
}
