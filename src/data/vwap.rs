use std::collections::BTreeMap;

use super::aggregate::{DEFAULT_SYMBOL_COLUMN, DEFAULT_VOLUME_COLUMN};
use super::error::PartitionError;
use super::keys::SymbolKeys;
use super::loader::PartitionReader;
use crate::report::{AggregateStats, SymbolVwap, VwapReport};

pub const DEFAULT_PRICE_COLUMN: &str = "price_av";

/// Column names for a VWAP run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VwapOptions {
    pub key_columns: Vec<String>,
    pub volume_column: String,
    pub price_column: String,
}

impl Default for VwapOptions {
    fn default() -> Self {
        Self {
            key_columns: vec![DEFAULT_SYMBOL_COLUMN.to_string()],
            volume_column: DEFAULT_VOLUME_COLUMN.to_string(),
            price_column: DEFAULT_PRICE_COLUMN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Weighted {
    volume: f64,
    notional: f64,
}

/// Running `sum(volume)` and `sum(volume * price)` per symbol.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VwapAccumulator {
    sums: BTreeMap<String, Weighted>,
}

impl VwapAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    pub fn register(&mut self, symbol: &str) {
        if !self.sums.contains_key(symbol) {
            self.sums.insert(symbol.to_string(), Weighted::default());
        }
    }

    pub fn add(&mut self, symbol: &str, volume: f64, price: f64) {
        self.register(symbol);
        if let Some(w) = self.sums.get_mut(symbol) {
            w.volume += volume;
            w.notional += volume * price;
        }
    }

    /// Final entries in symbol order.  A symbol with zero total volume has
    /// no defined average price.
    pub fn into_entries(self) -> Vec<SymbolVwap> {
        self.sums
            .into_iter()
            .map(|(symbol, w)| SymbolVwap {
                symbol,
                volume: w.volume,
                vwap: (w.volume != 0.0).then(|| w.notional / w.volume),
            })
            .collect()
    }
}

/// Computes the volume-weighted average price per symbol across a manifest.
///
/// Rows whose volume or price is null are left out of both sums; the symbol
/// is still listed.  Non-finite values abort the run like any other bad
/// partition.
#[derive(Debug, Clone)]
pub struct VwapAggregator<R> {
    reader: R,
    options: VwapOptions,
}

impl<R: PartitionReader> VwapAggregator<R> {
    pub fn new(reader: R) -> Self {
        Self::with_options(reader, VwapOptions::default())
    }

    pub fn with_options(reader: R, options: VwapOptions) -> Self {
        Self { reader, options }
    }

    pub fn aggregate<S: AsRef<str>>(&self, manifest: &[S]) -> Result<VwapReport, PartitionError> {
        let mut acc = VwapAccumulator::new();
        let mut stats = AggregateStats::default();

        for location in manifest {
            stats.rows += self.scan_partition(location.as_ref(), &mut acc)?;
            stats.partitions += 1;
        }

        log::info!(
            "Computed VWAP over {} rows from {} partitions for {} symbols",
            stats.rows,
            stats.partitions,
            acc.len()
        );
        Ok(VwapReport::new(acc.into_entries(), stats))
    }

    fn scan_partition(
        &self,
        location: &str,
        acc: &mut VwapAccumulator,
    ) -> Result<u64, PartitionError> {
        let table = self.reader.read(location)?;
        let column_err = |e| PartitionError::from_column(location, e);

        let keys = SymbolKeys::resolve(&table, &self.options.key_columns).map_err(column_err)?;
        let volumes = table
            .numeric_column(&self.options.volume_column)
            .map_err(column_err)?;
        let prices = table
            .numeric_column(&self.options.price_column)
            .map_err(column_err)?;

        let mut buf = String::new();
        for row in 0..table.num_rows() {
            let symbol = keys.key_at(row, &mut buf);
            let (Some(volume), Some(price)) = (volumes.value(row), prices.value(row)) else {
                acc.register(symbol);
                continue;
            };
            let (volume, price) = (volume.as_f64(), price.as_f64());
            if !volume.is_finite() || !price.is_finite() {
                let detail = format!("row {row}: non-finite volume {volume} or price {price}");
                return Err(PartitionError::malformed(location, detail));
            }
            acc.add(symbol, volume, price);
        }

        log::debug!("Scanned {} rows from {location}", table.num_rows());
        Ok(table.num_rows() as u64)
    }
}
