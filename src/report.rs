use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// Total traded volume for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolVolume {
    pub symbol: String,
    pub total: i64,
}

/// Bookkeeping for one aggregation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregateStats {
    pub partitions: usize,
    pub rows: u64,
}

/// Result of an aggregation run: per-symbol totals, sorted by symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeReport {
    entries: Vec<SymbolVolume>,
    stats: AggregateStats,
}

impl VolumeReport {
    /// Build a report.  `entries` are re-sorted by symbol, so the caller's
    /// order never leaks into the output.
    pub fn new(mut entries: Vec<SymbolVolume>, stats: AggregateStats) -> Self {
        entries.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Self { entries, stats }
    }

    pub fn entries(&self) -> &[SymbolVolume] {
        &self.entries
    }

    pub fn stats(&self) -> AggregateStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, symbol: &str) -> Option<i64> {
        self.entries
            .binary_search_by(|e| e.symbol.as_str().cmp(symbol))
            .ok()
            .map(|i| self.entries[i].total)
    }

    /// The `k` most traded symbols: total descending, ties by symbol.
    pub fn top(&self, k: usize) -> Vec<SymbolVolume> {
        let mut ranked = self.entries.clone();
        ranked.sort_by(|a, b| {
            b.total
                .cmp(&a.total)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        ranked.truncate(k);
        ranked
    }

    pub fn into_pairs(self) -> Vec<(String, i64)> {
        self.entries
            .into_iter()
            .map(|e| (e.symbol, e.total))
            .collect()
    }
}

/// Volume-weighted average price for one symbol.  `vwap` is `None` when
/// the symbol has no priced volume.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolVwap {
    pub symbol: String,
    pub volume: f64,
    pub vwap: Option<f64>,
}

/// Result of a VWAP run, sorted by symbol.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VwapReport {
    entries: Vec<SymbolVwap>,
    stats: AggregateStats,
}

impl VwapReport {
    pub fn new(mut entries: Vec<SymbolVwap>, stats: AggregateStats) -> Self {
        entries.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Self { entries, stats }
    }

    pub fn entries(&self) -> &[SymbolVwap] {
        &self.entries
    }

    pub fn stats(&self) -> AggregateStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, symbol: &str) -> Option<&SymbolVwap> {
        self.entries
            .binary_search_by(|e| e.symbol.as_str().cmp(symbol))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// The `k` symbols with the most volume, ties by symbol.
    pub fn top(&self, k: usize) -> Vec<SymbolVwap> {
        let mut ranked = self.entries.clone();
        ranked.sort_by(|a, b| {
            b.volume
                .total_cmp(&a.volume)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        ranked.truncate(k);
        ranked
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// `symbol = total`, one per line.
    #[default]
    Text,
    Csv,
    Json,
}

/// Write `entries` to `out` in the given format.
pub fn write_entries<W: Write>(
    entries: &[SymbolVolume],
    format: ReportFormat,
    mut out: W,
) -> Result<()> {
    match format {
        ReportFormat::Text => {
            for e in entries {
                writeln!(out, "{} = {}", e.symbol, e.total).context("writing report")?;
            }
        }
        ReportFormat::Csv => {
            let mut writer = csv::Writer::from_writer(&mut out);
            // Write the header explicitly so an empty report still has one.
            writer
                .write_record(["symbol", "total"])
                .context("writing CSV header")?;
            for e in entries {
                let total = e.total.to_string();
                writer
                    .write_record([e.symbol.as_str(), total.as_str()])
                    .context("writing CSV row")?;
            }
            writer.flush().context("flushing CSV")?;
        }
        ReportFormat::Json => {
            serde_json::to_writer_pretty(&mut out, entries).context("writing JSON report")?;
            writeln!(out).context("writing report")?;
        }
    }
    Ok(())
}

/// Write VWAP entries to `out`.  Text shows four decimals and `-` for a
/// missing price; CSV leaves the cell empty; JSON uses `null`.
pub fn write_vwap_entries<W: Write>(
    entries: &[SymbolVwap],
    format: ReportFormat,
    mut out: W,
) -> Result<()> {
    match format {
        ReportFormat::Text => {
            for e in entries {
                let written = match e.vwap {
                    Some(vwap) => writeln!(out, "{} = {vwap:.4}", e.symbol),
                    None => writeln!(out, "{} = -", e.symbol),
                };
                written.context("writing report")?;
            }
        }
        ReportFormat::Csv => {
            let mut writer = csv::Writer::from_writer(&mut out);
            writer
                .write_record(["symbol", "volume", "vwap"])
                .context("writing CSV header")?;
            for e in entries {
                let volume = e.volume.to_string();
                let vwap = e.vwap.map(|v| v.to_string()).unwrap_or_default();
                writer
                    .write_record([e.symbol.as_str(), volume.as_str(), vwap.as_str()])
                    .context("writing CSV row")?;
            }
            writer.flush().context("flushing CSV")?;
        }
        ReportFormat::Json => {
            serde_json::to_writer_pretty(&mut out, entries).context("writing JSON report")?;
            writeln!(out).context("writing report")?;
        }
    }
    Ok(())
}
