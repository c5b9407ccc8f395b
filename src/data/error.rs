use std::io;

use arrow::error::ArrowError;
use thiserror::Error;

use super::model::ColumnType;

// ---------------------------------------------------------------------------
// Column access errors
// ---------------------------------------------------------------------------

/// Failure of a type-checked column lookup on a [`Table`](super::model::Table).
#[derive(Debug, Error)]
pub enum ColumnError {
    #[error("column '{column}' is missing")]
    Missing { column: String },

    #[error("column '{column}' has type {found}, expected {expected}")]
    WrongType {
        column: String,
        expected: &'static str,
        found: ColumnType,
    },

    /// The column has the right logical type but its encoding could not be
    /// unpacked (e.g. a corrupt dictionary).
    #[error("column '{column}' could not be decoded")]
    Undecodable {
        column: String,
        #[source]
        source: ArrowError,
    },
}

// ---------------------------------------------------------------------------
// Partition errors
// ---------------------------------------------------------------------------

/// Fieldless discriminant of [`PartitionError`], handy for matching in
/// callers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ResourceNotFound,
    MalformedData,
    SchemaMismatch,
    Overflow,
}

/// Any failure while reading or scanning one partition.  Every variant
/// carries the partition location as it appeared in the manifest.
#[derive(Debug, Error)]
pub enum PartitionError {
    #[error("partition '{partition}' not found")]
    ResourceNotFound {
        partition: String,
        #[source]
        source: io::Error,
    },

    #[error("partition '{partition}' is malformed: {detail}")]
    MalformedData { partition: String, detail: String },

    #[error("partition '{partition}' does not match the expected schema")]
    SchemaMismatch {
        partition: String,
        #[source]
        source: ColumnError,
    },

    #[error("partition '{partition}': running total for symbol '{symbol}' overflowed")]
    Overflow { partition: String, symbol: String },
}

impl PartitionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PartitionError::ResourceNotFound { .. } => ErrorKind::ResourceNotFound,
            PartitionError::MalformedData { .. } => ErrorKind::MalformedData,
            PartitionError::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            PartitionError::Overflow { .. } => ErrorKind::Overflow,
        }
    }

    /// Location of the partition that failed.
    pub fn partition(&self) -> &str {
        match self {
            PartitionError::ResourceNotFound { partition, .. }
            | PartitionError::MalformedData { partition, .. }
            | PartitionError::SchemaMismatch { partition, .. }
            | PartitionError::Overflow { partition, .. } => partition,
        }
    }

    pub(crate) fn malformed(partition: &str, detail: impl ToString) -> Self {
        PartitionError::MalformedData {
            partition: partition.to_string(),
            detail: detail.to_string(),
        }
    }

    /// Classify a column lookup failure: a missing or mistyped column is a
    /// schema problem, an undecodable one is bad data.
    pub(crate) fn from_column(partition: &str, err: ColumnError) -> Self {
        match err {
            ColumnError::Undecodable { column, source } => PartitionError::MalformedData {
                partition: partition.to_string(),
                detail: format!("column '{column}': {source}"),
            },
            other => PartitionError::SchemaMismatch {
                partition: partition.to_string(),
                source: other,
            },
        }
    }
}
