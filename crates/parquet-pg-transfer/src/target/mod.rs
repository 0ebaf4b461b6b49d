//! PostgreSQL bulk loading.
//!
//! [`PgBulkLoader`] streams a dataset into an existing table with
//! `COPY <table> (<columns>) FROM STDIN WITH (FORMAT csv)` inside a single transaction.
//! Each call opens its own connection and closes it on return.

pub mod csv;
pub mod tls;

use async_trait::async_trait;
use bytes::BytesMut;
use futures::SinkExt;
use tokio_postgres::config::SslMode as PgSslMode;
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, NoTls};
use tracing::debug;

use crate::config::TargetConfig;
use crate::core::{BulkLoader, Dataset};
use crate::error::{Result, TransferError};

use self::tls::{make_tls_connector, SslMode};

/// Bulk loader using the PostgreSQL COPY protocol.
#[derive(Debug, Clone)]
pub struct PgBulkLoader {
    copy_chunk_rows: usize,
}

impl Default for PgBulkLoader {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl PgBulkLoader {
    /// Create a loader sending `copy_chunk_rows` rows per COPY message.
    pub fn new(copy_chunk_rows: usize) -> Self {
        Self {
            copy_chunk_rows: copy_chunk_rows.max(1),
        }
    }
}

#[async_trait]
impl BulkLoader for PgBulkLoader {
    async fn load(&self, dataset: &Dataset, table: &str, target: &TargetConfig) -> Result<u64> {
        let table = target.qualified_table(table);
        if dataset.num_columns() == 0 {
            return Err(TransferError::Format(format!(
                "dataset for {} has no columns",
                table
            )));
        }
        csv::check_copy_types(&dataset.schema())?;

        let copy_sql = copy_statement(&table, &dataset.column_names());
        let batch = dataset.batch();
        let row_count = batch.num_rows();

        let mut client = connect(target).await?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| classify_pg_error(&table, &e))?;

        debug!("{}: {}", table, copy_sql);
        let sink = tx
            .copy_in(&copy_sql)
            .await
            .map_err(|e| classify_pg_error(&table, &e))?;
        tokio::pin!(sink);

        let mut buf = BytesMut::with_capacity(1024 * 1024);
        let mut offset = 0;
        while offset < row_count {
            let len = self.copy_chunk_rows.min(row_count - offset);
            csv::encode_rows(batch, offset, len, &mut buf)?;
            sink.send(buf.split().freeze())
                .await
                .map_err(|e| classify_pg_error(&table, &e))?;
            offset += len;
        }

        let copied = sink
            .finish()
            .await
            .map_err(|e| classify_pg_error(&table, &e))?;
        tx.commit()
            .await
            .map_err(|e| classify_pg_error(&table, &e))?;

        debug!("{}: committed {} rows", table, copied);
        Ok(copied)
    }

    async fn health_check(&self, target: &TargetConfig) -> Result<()> {
        let client = connect(target).await?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| TransferError::Connection(format!("{}: {}", describe(target), e)))?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "postgres"
    }
}

/// Open a new connection, driving it on a background task until the client drops.
pub async fn connect(target: &TargetConfig) -> Result<Client> {
    let mut pg_config = target.pg_config();
    let mode = SslMode::parse(&target.ssl_mode)?;
    // Never fall back to plaintext when TLS was asked for
    pg_config.ssl_mode(if mode.requires_tls() {
        PgSslMode::Require
    } else {
        PgSslMode::Disable
    });
    let connect_error = |e: tokio_postgres::Error| {
        TransferError::Connection(format!("{}: {}", describe(target), e))
    };

    let client = match make_tls_connector(mode)? {
        None => {
            let (client, connection) = pg_config.connect(NoTls).await.map_err(connect_error)?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    debug!("PostgreSQL connection closed: {}", e);
                }
            });
            client
        }
        Some(tls) => {
            let (client, connection) = pg_config.connect(tls).await.map_err(connect_error)?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    debug!("PostgreSQL connection closed: {}", e);
                }
            });
            client
        }
    };

    debug!("Connected to PostgreSQL {}", describe(target));
    Ok(client)
}

fn describe(target: &TargetConfig) -> String {
    format!("{}:{}/{}", target.host, target.port, target.database)
}

/// Build the COPY statement naming every column explicitly.
pub fn copy_statement(table: &str, columns: &[String]) -> String {
    let col_list: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT csv)",
        quote_table(table),
        col_list.join(", ")
    )
}

/// Quote a PostgreSQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a possibly schema-qualified table name.
pub fn quote_table(table: &str) -> String {
    table
        .split('.')
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(".")
}

fn classify_pg_error(table: &str, err: &tokio_postgres::Error) -> TransferError {
    let message = match err.as_db_error() {
        Some(db) => db.message().to_string(),
        None => err.to_string(),
    };
    classify(table, err.code(), message)
}

/// Map a database-reported failure to the transfer error taxonomy.
pub fn classify(table: &str, code: Option<&SqlState>, message: String) -> TransferError {
    match code {
        Some(code) if *code == SqlState::UNDEFINED_COLUMN => {
            TransferError::schema_mismatch(table, message)
        }
        _ => TransferError::load(table, message),
    }
}
