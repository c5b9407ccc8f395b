/// Data layer: partition reading and per-symbol statistics.
///
/// Architecture:
/// ```text
///   manifest.json / discovered sym_root=* dirs
///        │
///        ▼
///   ┌──────────┐
///   │ manifest  │  ordered partition locations
///   └──────────┘
///        │  one location at a time
///        ▼
///   ┌──────────┐
///   │  loader   │  .parquet file / directory → Table (+ sym_root=… columns)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │   keys    │  key columns → symbol per row (sym_root.sym_suffix)
///   └──────────┘
///        │
///        ├────────────► aggregate: n_trades → VolumeAccumulator → report
///        ├────────────► vwap:      n_trades × price_av → VwapReport
///        └────────────► lookup:    minute → symbols traded in [a, b]
/// ```

pub mod aggregate;
pub mod error;
pub mod keys;
pub mod loader;
pub mod lookup;
pub mod manifest;
pub mod model;
pub mod vwap;
