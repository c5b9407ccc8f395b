//! Per-symbol traded volume, VWAP and interval lookups across partitioned
//! Parquet market data.
//!
//! ```no_run
//! use trade_volume::data::aggregate::VolumeAggregator;
//! use trade_volume::data::loader::ParquetReader;
//! use trade_volume::data::manifest::Manifest;
//!
//! # fn main() -> anyhow::Result<()> {
//! let manifest = Manifest::load("trades.json".as_ref())?;
//! let report = VolumeAggregator::new(ParquetReader).aggregate(manifest.partitions())?;
//! for entry in report.entries() {
//!     println!("{} = {}", entry.symbol, entry.total);
//! }
//! # Ok(())
//! # }
//! ```

pub mod data;
pub mod report;

pub use data::aggregate::{AggregateOptions, VolumeAccumulator, VolumeAggregator, VolumeRounding};
pub use data::error::{ErrorKind, PartitionError};
pub use data::loader::{ParquetReader, PartitionReader};
pub use data::manifest::Manifest;
pub use data::lookup::{LookupOptions, TradesLookup};
pub use data::model::Table;
pub use data::vwap::{VwapAggregator, VwapOptions};
pub use report::{SymbolVolume, SymbolVwap, VolumeReport, VwapReport};
