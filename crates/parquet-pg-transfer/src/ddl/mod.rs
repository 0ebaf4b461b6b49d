//! One-shot DDL runner.

use std::path::Path;

use tracing::{debug, info};

use crate::config::TargetConfig;
use crate::error::{Result, TransferError};
use crate::target::connect;

/// Execute every statement in a SQL file on a fresh connection.
///
/// Statements run as one simple-query batch, so each commits on its own unless the
/// file wraps them in a transaction.
pub async fn apply_ddl(target: &TargetConfig, path: &Path) -> Result<()> {
    let sql = read_sql(path).await?;
    let client = connect(target).await?;

    debug!("Executing {} bytes of DDL from {}", sql.len(), path.display());
    client
        .batch_execute(&sql)
        .await
        .map_err(|e| TransferError::load(path.display().to_string(), ddl_message(&e)))?;

    info!("Applied DDL from {}", path.display());
    Ok(())
}

async fn read_sql(path: &Path) -> Result<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(sql) if sql.trim().is_empty() => Err(TransferError::Config(format!(
            "DDL file {} is empty",
            path.display()
        ))),
        Ok(sql) => Ok(sql),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(TransferError::NotFound(
            format!("DDL file {} does not exist", path.display()),
        )),
        Err(e) => Err(TransferError::Io(e)),
    }
}

fn ddl_message(err: &tokio_postgres::Error) -> String {
    match err.as_db_error() {
        Some(db) => db.message().to_string(),
        None => err.to_string(),
    }
}
