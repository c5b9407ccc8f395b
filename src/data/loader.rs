use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::datatypes::{Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::error::PartitionError;
use super::model::Table;

// ---------------------------------------------------------------------------
// Reader seam
// ---------------------------------------------------------------------------

/// Produces one fully materialised [`Table`] per partition location.
///
/// Implementations must not cache between calls: every call performs its own
/// open and full read, so at most one partition's worth of data is held by
/// the caller at a time.
pub trait PartitionReader {
    fn read(&self, location: &str) -> Result<Table, PartitionError>;
}

impl<R: PartitionReader + ?Sized> PartitionReader for &R {
    fn read(&self, location: &str) -> Result<Table, PartitionError> {
        (**self).read(location)
    }
}

// ---------------------------------------------------------------------------
// Parquet reader
// ---------------------------------------------------------------------------

/// Reads partitions stored as Parquet.
///
/// A location is either
/// * a single `.parquet` file, or
/// * a partition directory (`sym_root=AAPL/`), in which case every
///   `.parquet` / `.pq` file directly inside it is read in file-name order
///   and concatenated.
///
/// Every `key=value` directory on the path becomes a constant text column
/// `key` unless the files already carry one, so reading
/// `sym_root=AAPL/part-0.parquet` yields a `sym_root` column of `AAPL`.
///
/// A leading `file://` is accepted and stripped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetReader;

impl PartitionReader for ParquetReader {
    fn read(&self, location: &str) -> Result<Table, PartitionError> {
        let path = resolve_location(location);
        let meta = std::fs::metadata(&path).map_err(|e| not_found(location, e))?;

        let (table, dir) = if meta.is_dir() {
            (read_partition_dir(location, &path)?, Some(path.as_path()))
        } else {
            (read_parquet_file(location, &path)?, path.parent())
        };
        let table = match dir {
            Some(dir) => with_partition_columns(location, dir, table)?,
            None => table,
        };

        log::debug!(
            "Read partition {location}: {} rows x {} columns",
            table.num_rows(),
            table.num_columns()
        );
        Ok(table)
    }
}

fn resolve_location(location: &str) -> PathBuf {
    PathBuf::from(location.strip_prefix("file://").unwrap_or(location))
}

fn not_found(location: &str, source: io::Error) -> PartitionError {
    PartitionError::ResourceNotFound {
        partition: location.to_string(),
        source,
    }
}

fn malformed(location: &str, what: &str, err: impl fmt::Display) -> PartitionError {
    PartitionError::malformed(location, format!("{what}: {err}"))
}

/// Read a single Parquet file into one table.
///
/// `location` is only used to label errors.
pub fn read_parquet_file(location: &str, path: &Path) -> Result<Table, PartitionError> {
    let file = File::open(path).map_err(|e| not_found(location, e))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| malformed(location, "reading parquet metadata", e))?;
    let schema = builder.schema().clone();
    let reader = builder
        .build()
        .map_err(|e| malformed(location, "building parquet reader", e))?;

    let mut batches = Vec::new();
    for batch_result in reader {
        let batch = batch_result.map_err(|e| malformed(location, "reading record batch", e))?;
        batches.push(batch);
    }

    Table::from_batches(schema, &batches).map_err(|e| malformed(location, "assembling table", e))
}

fn is_parquet_file(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    path.is_file() && matches!(ext.as_str(), "parquet" | "pq")
}

/// Parquet files directly inside `dir`, sorted by file name.
pub(crate) fn parquet_files_in(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if is_parquet_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn read_partition_dir(location: &str, dir: &Path) -> Result<Table, PartitionError> {
    let files = parquet_files_in(dir).map_err(|e| not_found(location, e))?;
    if files.is_empty() {
        return Err(not_found(
            location,
            io::Error::new(io::ErrorKind::NotFound, "directory holds no parquet files"),
        ));
    }

    let mut parts = Vec::with_capacity(files.len());
    for file in &files {
        parts.push(read_parquet_file(location, file)?);
    }

    let schema = unify_part_schemas(location, &files, &parts)?;
    let mut batches = Vec::with_capacity(parts.len());
    for part in &parts {
        let columns = part.record_batch().columns().to_vec();
        let batch = RecordBatch::try_new(schema.clone(), columns)
            .map_err(|e| malformed(location, "assembling table", e))?;
        batches.push(batch);
    }

    Table::from_batches(schema, &batches).map_err(|e| malformed(location, "assembling table", e))
}

/// The schema all part files of a directory are read under.
///
/// Parts must agree on field names and data types, in order.  Nullability
/// may differ (a field is nullable if any part says so) and schema or field
/// metadata, such as the `pandas` blob writers attach, is dropped.
fn unify_part_schemas(
    location: &str,
    files: &[PathBuf],
    parts: &[Table],
) -> Result<SchemaRef, PartitionError> {
    let first = parts[0].schema();
    for (file, part) in files.iter().zip(parts).skip(1) {
        let schema = part.schema();
        let same_layout = schema.fields().len() == first.fields().len()
            && schema
                .fields()
                .iter()
                .zip(first.fields().iter())
                .all(|(a, b)| a.name() == b.name() && a.data_type() == b.data_type());
        if !same_layout {
            let detail = format!(
                "part file {} has different columns than {}",
                file.display(),
                files[0].display()
            );
            return Err(PartitionError::malformed(location, detail));
        }
    }

    let fields: Vec<Field> = first
        .fields()
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let nullable = parts.iter().any(|p| p.schema().field(i).is_nullable());
            Field::new(field.name(), field.data_type().clone(), nullable)
        })
        .collect();
    Ok(Arc::new(Schema::new(fields)))
}

/// `key=value` components of `dir`, outermost first.
fn partition_keys(dir: &Path) -> Vec<(String, String)> {
    dir.components()
        .filter_map(|c| {
            let name = c.as_os_str().to_str()?;
            let (key, value) = name.split_once('=')?;
            (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}

fn with_partition_columns(
    location: &str,
    dir: &Path,
    mut table: Table,
) -> Result<Table, PartitionError> {
    for (key, value) in partition_keys(dir) {
        if table.column_type(&key).is_some() {
            continue;
        }
        table = table
            .with_constant_text_column(&key, &value)
            .map_err(|e| malformed(location, "adding partition column", e))?;
    }
    Ok(table)
}
