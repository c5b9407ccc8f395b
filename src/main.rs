//! trade-volume CLI.
//!
//! Commands:
//! - `aggregate`: total traded volume per symbol across a manifest of partitions
//! - `vwap`: volume-weighted average price per symbol
//! - `traded`: symbols traded within a minute interval, both ends included
//! - `inspect`: load one Parquet partition and print its shape and columns
//! - `discover`: build a manifest from a `sym_root=*` partitioned dataset

use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use trade_volume::data::aggregate::{
    AggregateOptions, VolumeAggregator, VolumeRounding, DEFAULT_SYMBOL_COLUMN,
    DEFAULT_VOLUME_COLUMN,
};
use trade_volume::data::loader::{ParquetReader, PartitionReader};
use trade_volume::data::lookup::{LookupOptions, TradesLookup, DEFAULT_MINUTE_COLUMN};
use trade_volume::data::manifest::{
    default_manifest_path, discover_partitions, Manifest, DEFAULT_PARTITION_PREFIX,
};
use trade_volume::data::vwap::{VwapAggregator, VwapOptions, DEFAULT_PRICE_COLUMN};
use trade_volume::report::{write_entries, write_vwap_entries, ReportFormat};

#[derive(Parser)]
#[command(
    name = "trade-volume",
    about = "Per-symbol traded volume across partitioned Parquet market data"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sum the volume column per symbol over every partition in a manifest.
    Aggregate {
        /// JSON manifest: an array of partition paths, or an object of name -> path.
        manifest: PathBuf,

        /// Read partitions concurrently.
        #[arg(long, default_value_t = false)]
        parallel: bool,

        /// Only print the K most traded symbols, largest first.
        #[arg(long, value_name = "K")]
        top: Option<usize>,

        /// Output format.
        #[arg(long, value_enum, default_value_t = FormatArg::Text)]
        format: FormatArg,

        /// How fractional volumes become whole trade counts.
        #[arg(long, value_enum, default_value_t = RoundingArg::Truncate)]
        rounding: RoundingArg,

        #[command(flatten)]
        keys: KeyArgs,

        /// Column holding the traded volume.
        #[arg(long, default_value = DEFAULT_VOLUME_COLUMN)]
        volume_column: String,
    },
    /// Volume-weighted average price per symbol over a manifest.
    Vwap {
        /// JSON manifest of partitions.
        manifest: PathBuf,

        /// Only print the K symbols with the most volume.
        #[arg(long, value_name = "K")]
        top: Option<usize>,

        /// Output format.
        #[arg(long, value_enum, default_value_t = FormatArg::Text)]
        format: FormatArg,

        #[command(flatten)]
        keys: KeyArgs,

        /// Column holding the traded volume (the weights).
        #[arg(long, default_value = DEFAULT_VOLUME_COLUMN)]
        volume_column: String,

        /// Column holding the price.
        #[arg(long, default_value = DEFAULT_PRICE_COLUMN)]
        price_column: String,
    },
    /// List the symbols traded between two minutes, both included.
    Traded {
        /// JSON manifest of partitions.
        manifest: PathBuf,

        /// First minute of the interval.
        #[arg(long)]
        from: i64,

        /// Last minute of the interval.
        #[arg(long)]
        to: i64,

        #[command(flatten)]
        keys: KeyArgs,

        /// Integer column holding the trade minute.
        #[arg(long, default_value = DEFAULT_MINUTE_COLUMN)]
        minute_column: String,
    },
    /// Load a single partition and print its shape.
    Inspect {
        /// Parquet file or partition directory.
        path: PathBuf,

        /// Also print the first N rows.
        #[arg(long, value_name = "N")]
        head: Option<usize>,
    },
    /// Build a manifest from a partitioned dataset root.
    Discover {
        /// Dataset root holding the partition directories.
        root: PathBuf,

        /// Partition directory prefix.
        #[arg(long, default_value = DEFAULT_PARTITION_PREFIX)]
        prefix: String,

        /// Where to write the manifest. Defaults to `<root>.json`.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct KeyArgs {
    /// Text columns forming the symbol, joined with '.'
    /// (`sym_root,sym_suffix` gives full tickers such as BRK.A).
    #[arg(long, value_delimiter = ',', default_value = DEFAULT_SYMBOL_COLUMN)]
    id_columns: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Text,
    Csv,
    Json,
}

impl From<FormatArg> for ReportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => ReportFormat::Text,
            FormatArg::Csv => ReportFormat::Csv,
            FormatArg::Json => ReportFormat::Json,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum RoundingArg {
    Truncate,
    Nearest,
}

impl From<RoundingArg> for VolumeRounding {
    fn from(arg: RoundingArg) -> Self {
        match arg {
            RoundingArg::Truncate => VolumeRounding::Truncate,
            RoundingArg::Nearest => VolumeRounding::Nearest,
        }
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Aggregate {
            manifest,
            parallel,
            top,
            format,
            rounding,
            keys,
            volume_column,
        } => {
            let options = AggregateOptions {
                key_columns: keys.id_columns,
                volume_column,
                rounding: rounding.into(),
            };
            cmd_aggregate(&manifest, parallel, top, format.into(), options)
        }
        Commands::Vwap {
            manifest,
            top,
            format,
            keys,
            volume_column,
            price_column,
        } => {
            let options = VwapOptions {
                key_columns: keys.id_columns,
                volume_column,
                price_column,
            };
            cmd_vwap(&manifest, top, format.into(), options)
        }
        Commands::Traded {
            manifest,
            from,
            to,
            keys,
            minute_column,
        } => {
            let options = LookupOptions {
                key_columns: keys.id_columns,
                minute_column,
            };
            cmd_traded(&manifest, from, to, &options)
        }
        Commands::Inspect { path, head } => cmd_inspect(&path, head),
        Commands::Discover {
            root,
            prefix,
            output,
        } => cmd_discover(&root, &prefix, output),
    }
}

fn cmd_aggregate(
    manifest_path: &Path,
    parallel: bool,
    top: Option<usize>,
    format: ReportFormat,
    options: AggregateOptions,
) -> Result<()> {
    let manifest = load_manifest(manifest_path)?;
    log::info!(
        "Aggregating {} partitions from {}",
        manifest.len(),
        manifest_path.display()
    );

    let aggregator = VolumeAggregator::with_options(ParquetReader, options);
    let report = if parallel {
        aggregator.aggregate_parallel(manifest.partitions())
    } else {
        aggregator.aggregate(manifest.partitions())
    }
    .context("aggregation failed")?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    match top {
        Some(k) => write_entries(&report.top(k), format, &mut out)?,
        None => write_entries(report.entries(), format, &mut out)?,
    }
    out.flush().context("flushing report")?;
    Ok(())
}

fn load_manifest(path: &Path) -> Result<Manifest> {
    Manifest::load(path).with_context(|| format!("loading {}", path.display()))
}

fn cmd_vwap(
    manifest_path: &Path,
    top: Option<usize>,
    format: ReportFormat,
    options: VwapOptions,
) -> Result<()> {
    let manifest = load_manifest(manifest_path)?;
    let report = VwapAggregator::with_options(ParquetReader, options)
        .aggregate(manifest.partitions())
        .context("VWAP computation failed")?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    match top {
        Some(k) => write_vwap_entries(&report.top(k), format, &mut out)?,
        None => write_vwap_entries(report.entries(), format, &mut out)?,
    }
    out.flush().context("flushing report")?;
    Ok(())
}

fn cmd_traded(manifest_path: &Path, from: i64, to: i64, options: &LookupOptions) -> Result<()> {
    if from > to {
        bail!("interval start {from} is after its end {to}");
    }
    let manifest = load_manifest(manifest_path)?;
    let lookup = TradesLookup::build(&ParquetReader, manifest.partitions(), options)
        .context("building trades lookup")?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for symbol in lookup.symbols_in(from, to) {
        writeln!(out, "{symbol}")?;
    }
    out.flush().context("flushing output")?;
    Ok(())
}

fn cmd_inspect(path: &Path, head: Option<usize>) -> Result<()> {
    let Some(location) = path.to_str() else {
        bail!("path is not valid UTF-8: {}", path.display());
    };
    let table = ParquetReader.read(location)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(
        out,
        "Loaded table ({} x {})",
        table.num_rows(),
        table.num_columns()
    )?;
    for (name, column_type) in table.columns() {
        writeln!(out, "  {name}: {column_type}")?;
    }

    if let Some(n) = head {
        let rows = table.record_batch().slice(0, n.min(table.num_rows()));
        let pretty = arrow::util::pretty::pretty_format_batches(&[rows])
            .context("formatting rows")?;
        writeln!(out, "{pretty}")?;
    }
    Ok(())
}

fn cmd_discover(root: &Path, prefix: &str, output: Option<PathBuf>) -> Result<()> {
    let found = discover_partitions(root, prefix)?;
    if found.is_empty() {
        bail!(
            "no '{prefix}*' partition directories with parquet files under {}",
            root.display()
        );
    }

    let manifest = Manifest::from_discovered(&found);
    let out_path = output.unwrap_or_else(|| default_manifest_path(root));
    manifest.save(&out_path)?;

    println!(
        "Manifest with {} partitions saved to {}",
        manifest.len(),
        out_path.display()
    );
    Ok(())
}
