//! Error types for the transfer pipeline.

use thiserror::Error;

/// Exit codes used by the CLI.
pub const EXIT_CONFIG_ERROR: u8 = 1;
pub const EXIT_CONNECTION_ERROR: u8 = 2;
pub const EXIT_TRANSFER_ERROR: u8 = 3;
pub const EXIT_BATCH_INCOMPLETE: u8 = 4;
pub const EXIT_NOT_FOUND: u8 = 6;
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for transfer operations.
#[derive(Error, Debug)]
pub enum TransferError {
    /// Configuration error (invalid YAML, missing fields, missing environment, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Payload is not a valid columnar container or has an unsupported version.
    #[error("Format error: {0}")]
    Format(String),

    /// Local file or object-store objects are missing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Object store transport failure (DNS, TLS, auth).
    #[error("Object store connectivity error: {0}")]
    Connectivity(String),

    /// Database connection could not be established.
    #[error("Database connection error: {0}")]
    Connection(String),

    /// Dataset columns do not match the destination table.
    #[error("Schema mismatch for table {table}: {message}")]
    SchemaMismatch { table: String, message: String },

    /// Database rejected the loaded data.
    #[error("Load failed for table {table}: {message}")]
    Load { table: String, message: String },

    /// One or more datasets of a batch failed.
    #[error("Batch finished with failed datasets: {}", .0.join(", "))]
    BatchIncomplete(Vec<String>),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Arrow error while assembling in-memory data
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl TransferError {
    /// Create a SchemaMismatch error.
    pub fn schema_mismatch(table: impl Into<String>, message: impl Into<String>) -> Self {
        TransferError::SchemaMismatch {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a Load error.
    pub fn load(table: impl Into<String>, message: impl Into<String>) -> Self {
        TransferError::Load {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Whether the orchestrator may contain this error at the per-dataset boundary.
    ///
    /// Data and transport failures are recoverable; configuration and internal
    /// failures abort the batch.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TransferError::Format(_)
                | TransferError::NotFound(_)
                | TransferError::Connectivity(_)
                | TransferError::Connection(_)
                | TransferError::SchemaMismatch { .. }
                | TransferError::Load { .. }
        )
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            TransferError::Config(_) | TransferError::Yaml(_) => EXIT_CONFIG_ERROR,
            TransferError::Connectivity(_) | TransferError::Connection(_) => {
                EXIT_CONNECTION_ERROR
            }
            TransferError::Format(_)
            | TransferError::SchemaMismatch { .. }
            | TransferError::Load { .. }
            | TransferError::Json(_)
            | TransferError::Arrow(_) => EXIT_TRANSFER_ERROR,
            TransferError::BatchIncomplete(_) => EXIT_BATCH_INCOMPLETE,
            TransferError::NotFound(_) => EXIT_NOT_FOUND,
            TransferError::Io(_) => EXIT_IO_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for transfer operations.
pub type Result<T> = std::result::Result<T, TransferError>;
