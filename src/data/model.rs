use std::fmt;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, Float64Array, Int64Array, LargeStringArray, StringArray,
    StringViewArray, UInt64Array,
};
use arrow::compute::{cast, concat_batches};
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema, SchemaRef, UInt64Type};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

use super::error::ColumnError;

// ---------------------------------------------------------------------------
// ColumnType – the logical type of a column
// ---------------------------------------------------------------------------

/// Logical column type.  Several Arrow physical types collapse onto each
/// variant; everything the pipeline cannot consume lands in `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Float,
    Other(DataType),
}

impl ColumnType {
    pub fn of(data_type: &DataType) -> Self {
        match data_type {
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => ColumnType::Text,
            DataType::Dictionary(_, values) if ColumnType::of(values) == ColumnType::Text => {
                ColumnType::Text
            }
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => ColumnType::Integer,
            DataType::Float16 | DataType::Float32 | DataType::Float64 => ColumnType::Float,
            other => ColumnType::Other(other.clone()),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Text => write!(f, "text"),
            ColumnType::Integer => write!(f, "integer"),
            ColumnType::Float => write!(f, "floating-point"),
            ColumnType::Other(dt) => write!(f, "other({dt})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Typed column views
// ---------------------------------------------------------------------------

/// A text column.  Dictionary-encoded columns are unpacked on access, so
/// only the three flat string layouts remain.
#[derive(Debug, Clone)]
pub enum TextColumn {
    Utf8(StringArray),
    LargeUtf8(LargeStringArray),
    View(StringViewArray),
}

impl TextColumn {
    pub fn len(&self) -> usize {
        match self {
            TextColumn::Utf8(a) => a.len(),
            TextColumn::LargeUtf8(a) => a.len(),
            TextColumn::View(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `row`, `None` for a null cell.
    pub fn value(&self, row: usize) -> Option<&str> {
        match self {
            TextColumn::Utf8(a) => a.is_valid(row).then(|| a.value(row)),
            TextColumn::LargeUtf8(a) => a.is_valid(row).then(|| a.value(row)),
            TextColumn::View(a) => a.is_valid(row).then(|| a.value(row)),
        }
    }
}

/// One numeric cell, widened to the largest type of its family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericValue {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl NumericValue {
    /// The value as a double.  Integers beyond 2^53 lose precision.
    pub fn as_f64(self) -> f64 {
        match self {
            NumericValue::Signed(v) => v as f64,
            NumericValue::Unsigned(v) => v as f64,
            NumericValue::Float(v) => v,
        }
    }
}

impl fmt::Display for NumericValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericValue::Signed(v) => write!(f, "{v}"),
            NumericValue::Unsigned(v) => write!(f, "{v}"),
            NumericValue::Float(v) => write!(f, "{v}"),
        }
    }
}

/// A numeric column.  Narrow integer and float types are widened losslessly
/// when the column is resolved.
#[derive(Debug, Clone)]
pub enum NumericColumn {
    Signed(Int64Array),
    Unsigned(UInt64Array),
    Float(Float64Array),
}

impl NumericColumn {
    pub fn len(&self) -> usize {
        match self {
            NumericColumn::Signed(a) => a.len(),
            NumericColumn::Unsigned(a) => a.len(),
            NumericColumn::Float(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_valid(&self, row: usize) -> bool {
        match self {
            NumericColumn::Signed(a) => a.is_valid(row),
            NumericColumn::Unsigned(a) => a.is_valid(row),
            NumericColumn::Float(a) => a.is_valid(row),
        }
    }

    /// Value at `row`, `None` for a null cell.
    pub fn value(&self, row: usize) -> Option<NumericValue> {
        if !self.is_valid(row) {
            return None;
        }
        let value = match self {
            NumericColumn::Signed(a) => NumericValue::Signed(a.value(row)),
            NumericColumn::Unsigned(a) => NumericValue::Unsigned(a.value(row)),
            NumericColumn::Float(a) => NumericValue::Float(a.value(row)),
        };
        Some(value)
    }
}

// ---------------------------------------------------------------------------
// Table – one partition, fully materialised
// ---------------------------------------------------------------------------

/// An immutable in-memory table: a single Arrow record batch whose columns
/// all share the batch's row count.
#[derive(Debug, Clone)]
pub struct Table {
    batch: RecordBatch,
}

impl Table {
    pub fn new(batch: RecordBatch) -> Self {
        Table { batch }
    }

    /// Concatenate record batches sharing `schema` into one table.
    pub fn from_batches(schema: SchemaRef, batches: &[RecordBatch]) -> Result<Self, ArrowError> {
        let batch = concat_batches(&schema, batches)?;
        Ok(Table { batch })
    }

    /// A copy of this table with a trailing non-null text column holding
    /// `value` on every row.  Schema metadata is carried over.
    pub fn with_constant_text_column(&self, name: &str, value: &str) -> Result<Self, ArrowError> {
        let schema = self.batch.schema();
        let mut fields: Vec<Field> = schema
            .fields()
            .iter()
            .map(|f| f.as_ref().clone())
            .collect();
        fields.push(Field::new(name, DataType::Utf8, false));
        let schema = Schema::new_with_metadata(fields, schema.metadata().clone());

        let mut columns = self.batch.columns().to_vec();
        let constant = StringArray::from(vec![value; self.batch.num_rows()]);
        columns.push(Arc::new(constant));

        let batch = RecordBatch::try_new(Arc::new(schema), columns)?;
        Ok(Table { batch })
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn record_batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Column names paired with their logical types, in schema order.
    pub fn columns(&self) -> Vec<(String, ColumnType)> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| (f.name().clone(), ColumnType::of(f.data_type())))
            .collect()
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.batch
            .schema()
            .field_with_name(name)
            .ok()
            .map(|f| ColumnType::of(f.data_type()))
    }

    fn lookup(&self, name: &str) -> Result<&ArrayRef, ColumnError> {
        self.batch
            .column_by_name(name)
            .ok_or_else(|| ColumnError::Missing {
                column: name.to_string(),
            })
    }

    /// Resolve `name` as a text column.
    pub fn text_column(&self, name: &str) -> Result<TextColumn, ColumnError> {
        let col = self.lookup(name)?;
        let undecodable = |source: ArrowError| ColumnError::Undecodable {
            column: name.to_string(),
            source,
        };

        match col.data_type() {
            DataType::Utf8 => Ok(TextColumn::Utf8(col.as_string::<i32>().clone())),
            DataType::LargeUtf8 => Ok(TextColumn::LargeUtf8(col.as_string::<i64>().clone())),
            DataType::Utf8View => Ok(TextColumn::View(col.as_string_view().clone())),
            DataType::Dictionary(_, values) if ColumnType::of(values) == ColumnType::Text => {
                // Unpack to the plain string layout of the dictionary values.
                let flat = cast(col, values).map_err(undecodable)?;
                match flat.data_type() {
                    DataType::Utf8 => Ok(TextColumn::Utf8(flat.as_string::<i32>().clone())),
                    DataType::LargeUtf8 => {
                        Ok(TextColumn::LargeUtf8(flat.as_string::<i64>().clone()))
                    }
                    DataType::Utf8View => Ok(TextColumn::View(flat.as_string_view().clone())),
                    other => Err(ColumnError::WrongType {
                        column: name.to_string(),
                        expected: "text",
                        found: ColumnType::of(other),
                    }),
                }
            }
            other => Err(ColumnError::WrongType {
                column: name.to_string(),
                expected: "text",
                found: ColumnType::of(other),
            }),
        }
    }

    /// Resolve `name` as an integer or floating-point column.
    pub fn numeric_column(&self, name: &str) -> Result<NumericColumn, ColumnError> {
        let col = self.lookup(name)?;
        let widen = |target: &DataType| {
            cast(col, target).map_err(|source| ColumnError::Undecodable {
                column: name.to_string(),
                source,
            })
        };

        match col.data_type() {
            DataType::Int64 => {
                let ints = col.as_primitive::<Int64Type>().clone();
                Ok(NumericColumn::Signed(ints))
            }
            DataType::UInt64 => {
                let uints = col.as_primitive::<UInt64Type>().clone();
                Ok(NumericColumn::Unsigned(uints))
            }
            DataType::Float64 => {
                let floats = col.as_primitive::<Float64Type>().clone();
                Ok(NumericColumn::Float(floats))
            }
            DataType::Int8 | DataType::Int16 | DataType::Int32 => {
                let wide = widen(&DataType::Int64)?;
                Ok(NumericColumn::Signed(wide.as_primitive::<Int64Type>().clone()))
            }
            DataType::UInt8 | DataType::UInt16 | DataType::UInt32 => {
                let wide = widen(&DataType::UInt64)?;
                Ok(NumericColumn::Unsigned(wide.as_primitive::<UInt64Type>().clone()))
            }
            DataType::Float16 | DataType::Float32 => {
                let wide = widen(&DataType::Float64)?;
                Ok(NumericColumn::Float(wide.as_primitive::<Float64Type>().clone()))
            }
            other => Err(ColumnError::WrongType {
                column: name.to_string(),
                expected: "numeric",
                found: ColumnType::of(other),
            }),
        }
    }
}
