use std::collections::BTreeMap;

use rayon::prelude::*;

use super::error::PartitionError;
use super::keys::SymbolKeys;
use super::loader::PartitionReader;
use super::model::NumericValue;
use crate::report::{AggregateStats, SymbolVolume, VolumeReport};

pub const DEFAULT_SYMBOL_COLUMN: &str = "sym_suffix";
pub const DEFAULT_ROOT_COLUMN: &str = "sym_root";
pub const DEFAULT_VOLUME_COLUMN: &str = "n_trades";

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// How fractional volume values become whole trade counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VolumeRounding {
    /// Drop the fractional part (toward zero).
    #[default]
    Truncate,
    /// Round to the nearest integer, halves away from zero.
    Nearest,
}

impl VolumeRounding {
    /// Convert one cell to whole units.  Fails on non-finite floats and on
    /// values outside the `i64` range.
    pub fn to_units(self, value: NumericValue) -> Result<i64, String> {
        match value {
            NumericValue::Signed(v) => Ok(v),
            NumericValue::Unsigned(v) => {
                i64::try_from(v).map_err(|_| format!("value {v} exceeds the supported range"))
            }
            NumericValue::Float(v) => {
                if !v.is_finite() {
                    return Err(format!("non-finite value {v}"));
                }
                let whole = match self {
                    VolumeRounding::Truncate => v.trunc(),
                    VolumeRounding::Nearest => v.round(),
                };
                // i64::MAX as f64 rounds up to 2^63, which is itself out of range.
                if whole < i64::MIN as f64 || whole >= i64::MAX as f64 {
                    return Err(format!("value {v} exceeds the supported range"));
                }
                Ok(whole as i64)
            }
        }
    }
}

/// Column names and conversion rules for one aggregation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Text columns forming the symbol key, joined with `.`.  The default is
    /// `sym_suffix` alone; `[sym_root, sym_suffix]` gives full tickers.
    pub key_columns: Vec<String>,
    pub volume_column: String,
    pub rounding: VolumeRounding,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            key_columns: vec![DEFAULT_SYMBOL_COLUMN.to_string()],
            volume_column: DEFAULT_VOLUME_COLUMN.to_string(),
            rounding: VolumeRounding::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// VolumeAccumulator
// ---------------------------------------------------------------------------

/// Running per-symbol totals for one aggregation run.  Keys are kept in
/// byte-lexicographic order, so draining it yields the sorted report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeAccumulator {
    totals: BTreeMap<String, i64>,
}

impl VolumeAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn get(&self, symbol: &str) -> Option<i64> {
        self.totals.get(symbol).copied()
    }

    /// Make sure `symbol` has an entry, starting at zero.
    pub fn register(&mut self, symbol: &str) {
        if !self.totals.contains_key(symbol) {
            self.totals.insert(symbol.to_string(), 0);
        }
    }

    /// Add `volume` to `symbol`'s total.  Returns the new total, or `None`
    /// (leaving the total untouched) if the addition would overflow.
    pub fn checked_add(&mut self, symbol: &str, volume: i64) -> Option<i64> {
        match self.totals.get_mut(symbol) {
            Some(total) => {
                *total = total.checked_add(volume)?;
                Some(*total)
            }
            None => {
                self.totals.insert(symbol.to_string(), volume);
                Some(volume)
            }
        }
    }

    /// Fold `other` into `self` by key-wise addition.  On overflow the
    /// offending symbol is returned and `self` is left partially merged.
    pub fn merge(&mut self, other: VolumeAccumulator) -> Result<(), String> {
        for (symbol, volume) in other.totals {
            if self.checked_add(&symbol, volume).is_none() {
                return Err(symbol);
            }
        }
        Ok(())
    }

    pub fn into_entries(self) -> Vec<SymbolVolume> {
        self.totals
            .into_iter()
            .map(|(symbol, total)| SymbolVolume { symbol, total })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// VolumeAggregator
// ---------------------------------------------------------------------------

/// Sums the volume column per symbol across a manifest of partitions.
///
/// Any failure on any partition aborts the run; no partial report is ever
/// returned.
#[derive(Debug, Clone)]
pub struct VolumeAggregator<R> {
    reader: R,
    options: AggregateOptions,
}

impl<R: PartitionReader> VolumeAggregator<R> {
    pub fn new(reader: R) -> Self {
        Self::with_options(reader, AggregateOptions::default())
    }

    pub fn with_options(reader: R, options: AggregateOptions) -> Self {
        Self { reader, options }
    }

    pub fn options(&self) -> &AggregateOptions {
        &self.options
    }

    /// Aggregate partitions one at a time, in manifest order.
    pub fn aggregate<S: AsRef<str>>(
        &self,
        manifest: &[S],
    ) -> Result<VolumeReport, PartitionError> {
        let mut acc = VolumeAccumulator::new();
        let mut stats = AggregateStats::default();

        for location in manifest {
            stats.rows += self.scan_partition(location.as_ref(), &mut acc)?;
            stats.partitions += 1;
        }

        log::info!(
            "Aggregated {} rows from {} partitions into {} symbols",
            stats.rows,
            stats.partitions,
            acc.len()
        );
        Ok(VolumeReport::new(acc.into_entries(), stats))
    }

    /// Read one partition and add its rows to `acc`.  Returns the number of
    /// rows scanned.  The table is dropped before returning.
    pub fn scan_partition(
        &self,
        location: &str,
        acc: &mut VolumeAccumulator,
    ) -> Result<u64, PartitionError> {
        let table = self.reader.read(location)?;

        let keys = SymbolKeys::resolve(&table, &self.options.key_columns)
            .map_err(|e| PartitionError::from_column(location, e))?;
        let volumes = table
            .numeric_column(&self.options.volume_column)
            .map_err(|e| PartitionError::from_column(location, e))?;

        let mut buf = String::new();
        for row in 0..table.num_rows() {
            let symbol = keys.key_at(row, &mut buf);

            let Some(value) = volumes.value(row) else {
                acc.register(symbol);
                continue;
            };
            let volume = self.options.rounding.to_units(value).map_err(|detail| {
                let column = &self.options.volume_column;
                let detail = format!("row {row}: column '{column}': {detail}");
                PartitionError::malformed(location, detail)
            })?;

            if acc.checked_add(symbol, volume).is_none() {
                return Err(PartitionError::Overflow {
                    partition: location.to_string(),
                    symbol: symbol.to_string(),
                });
            }
        }

        log::debug!("Scanned {} rows from {location}", table.num_rows());
        Ok(table.num_rows() as u64)
    }
}

impl<R: PartitionReader + Sync> VolumeAggregator<R> {
    /// Aggregate with partitions read concurrently on the rayon pool.
    ///
    /// Each partition fills its own accumulator; the partials are then merged
    /// in manifest order by addition, so totals match [`aggregate`].  If
    /// several partitions fail, the error of the earliest one in the manifest
    /// is returned.
    ///
    /// [`aggregate`]: VolumeAggregator::aggregate
    pub fn aggregate_parallel<S: AsRef<str> + Sync>(
        &self,
        manifest: &[S],
    ) -> Result<VolumeReport, PartitionError> {
        let partials: Vec<Result<(VolumeAccumulator, u64), PartitionError>> = manifest
            .par_iter()
            .map(|location| {
                let mut acc = VolumeAccumulator::new();
                let rows = self.scan_partition(location.as_ref(), &mut acc)?;
                Ok((acc, rows))
            })
            .collect();

        let mut acc = VolumeAccumulator::new();
        let mut stats = AggregateStats::default();
        for (location, partial) in manifest.iter().zip(partials) {
            let (part, rows) = partial?;
            acc.merge(part).map_err(|symbol| PartitionError::Overflow {
                partition: location.as_ref().to_string(),
                symbol,
            })?;
            stats.rows += rows;
            stats.partitions += 1;
        }

        log::info!(
            "Aggregated {} rows from {} partitions into {} symbols (parallel)",
            stats.rows,
            stats.partitions,
            acc.len()
        );
        Ok(VolumeReport::new(acc.into_entries(), stats))
    }
}
