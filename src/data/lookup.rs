use std::collections::{BTreeMap, BTreeSet};

use super::aggregate::DEFAULT_SYMBOL_COLUMN;
use super::error::{ColumnError, PartitionError};
use super::keys::SymbolKeys;
use super::loader::PartitionReader;
use super::model::{ColumnType, NumericValue};

pub const DEFAULT_MINUTE_COLUMN: &str = "minute";

/// Column names for building a [`TradesLookup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupOptions {
    pub key_columns: Vec<String>,
    pub minute_column: String,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            key_columns: vec![DEFAULT_SYMBOL_COLUMN.to_string()],
            minute_column: DEFAULT_MINUTE_COLUMN.to_string(),
        }
    }
}

/// Symbols traded in each minute, for answering "what traded between
/// minute `a` and minute `b`" without rescanning the partitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradesLookup {
    by_minute: BTreeMap<i64, BTreeSet<String>>,
}

impl TradesLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan every partition of `manifest` in order.  Rows with a null minute
    /// are ignored; the minute column must hold integers.
    pub fn build<R, S>(
        reader: &R,
        manifest: &[S],
        options: &LookupOptions,
    ) -> Result<Self, PartitionError>
    where
        R: PartitionReader + ?Sized,
        S: AsRef<str>,
    {
        let mut lookup = TradesLookup::new();
        for location in manifest {
            lookup.scan_partition(reader, location.as_ref(), options)?;
        }
        log::info!(
            "Indexed {} partitions over {} distinct minutes",
            manifest.len(),
            lookup.minutes()
        );
        Ok(lookup)
    }

    fn scan_partition<R: PartitionReader + ?Sized>(
        &mut self,
        reader: &R,
        location: &str,
        options: &LookupOptions,
    ) -> Result<(), PartitionError> {
        let table = reader.read(location)?;
        let column_err = |e| PartitionError::from_column(location, e);

        let keys = SymbolKeys::resolve(&table, &options.key_columns).map_err(column_err)?;
        let minute_column = &options.minute_column;
        let fractional = || {
            column_err(ColumnError::WrongType {
                column: minute_column.clone(),
                expected: "integer",
                found: ColumnType::Float,
            })
        };
        if table.column_type(minute_column) == Some(ColumnType::Float) {
            return Err(fractional());
        }
        let minutes = table.numeric_column(minute_column).map_err(column_err)?;

        let mut buf = String::new();
        for row in 0..table.num_rows() {
            let minute = match minutes.value(row) {
                None => continue,
                Some(NumericValue::Signed(m)) => m,
                Some(NumericValue::Unsigned(m)) => i64::try_from(m).map_err(|_| {
                    let detail = format!("row {row}: minute {m} is out of range");
                    PartitionError::malformed(location, detail)
                })?,
                Some(NumericValue::Float(_)) => return Err(fractional()),
            };
            self.insert(minute, keys.key_at(row, &mut buf));
        }
        Ok(())
    }

    pub fn insert(&mut self, minute: i64, symbol: &str) {
        let symbols = self.by_minute.entry(minute).or_default();
        if !symbols.contains(symbol) {
            symbols.insert(symbol.to_string());
        }
    }

    /// Number of distinct minutes with at least one trade.
    pub fn minutes(&self) -> usize {
        self.by_minute.len()
    }

    /// Sorted, distinct symbols traded in `[start, end]`, both ends included.
    /// An inverted interval is empty.
    pub fn symbols_in(&self, start: i64, end: i64) -> Vec<String> {
        if start > end {
            return Vec::new();
        }
        let mut found = BTreeSet::new();
        for symbols in self.by_minute.range(start..=end).map(|(_, s)| s) {
            found.extend(symbols.iter().map(String::as_str));
        }
        found.into_iter().map(str::to_string).collect()
    }
}
