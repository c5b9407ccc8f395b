use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use trade_volume::data::manifest::{discover_partitions, Manifest, DEFAULT_PARTITION_PREFIX};

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next_u64() % n
    }
}

/// Root symbols and the suffixes they trade under.  `None` is the plain
/// listing with no suffix.
const LISTINGS: &[(&str, &[Option<&str>])] = &[
    ("AAPL", &[None]),
    ("BRK", &[Some("A"), Some("B")]),
    ("MSFT", &[None]),
    ("PBR", &[None, Some("A")]),
];

/// Reference price per root, in dollars.
const BASE_PRICES: &[f64] = &[190.0, 410.0, 330.0, 14.0];

const TRADING_MINUTES: i64 = 390;
const ROWS_PER_PARTITION: usize = 500;

fn build_partition(
    suffixes: &[Option<&str>],
    base_price: f64,
    rng: &mut SimpleRng,
) -> Result<RecordBatch> {
    let mut minute = Vec::with_capacity(ROWS_PER_PARTITION);
    let mut sym_suffix = Vec::with_capacity(ROWS_PER_PARTITION);
    let mut n_trades = Vec::with_capacity(ROWS_PER_PARTITION);
    let mut price_av = Vec::with_capacity(ROWS_PER_PARTITION);

    for _ in 0..ROWS_PER_PARTITION {
        minute.push(rng.below(TRADING_MINUTES as u64) as i64);
        sym_suffix.push(suffixes[rng.below(suffixes.len() as u64) as usize]);
        // Whole trade counts stored as doubles, as the upstream export does.
        n_trades.push((1 + rng.below(200)) as f64);
        // +/- 5% around the reference, in cents.
        let spread = (base_price * 5.0) as u64;
        let cents = rng.below(2 * spread + 1) as f64 - spread as f64;
        price_av.push(base_price + cents / 100.0);
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new("minute", DataType::Int64, false),
        Field::new("sym_suffix", DataType::Utf8, true),
        Field::new("n_trades", DataType::Float64, false),
        Field::new("price_av", DataType::Float64, false),
    ]));

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(minute)),
            Arc::new(StringArray::from(sym_suffix)),
            Arc::new(Float64Array::from(n_trades)),
            Arc::new(Float64Array::from(price_av)),
        ],
    )
    .context("building record batch")
}

fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer =
        ArrowWriter::try_new(file, batch.schema(), None).context("creating writer")?;
    writer.write(batch).context("writing batch")?;
    writer.close().context("closing writer")?;
    Ok(())
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);
    let root = Path::new("sample_trades");

    for ((sym_root, suffixes), base_price) in LISTINGS.iter().zip(BASE_PRICES) {
        let dir = root.join(format!("{DEFAULT_PARTITION_PREFIX}{sym_root}"));
        std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

        let batch = build_partition(suffixes, *base_price, &mut rng)?;
        write_parquet(&dir.join("part-0.parquet"), &batch)?;
    }

    let found = discover_partitions(root, DEFAULT_PARTITION_PREFIX)?;
    let manifest = Manifest::from_discovered(&found);
    let manifest_path = Path::new("sample_trades.json");
    manifest.save(manifest_path)?;

    println!(
        "Wrote {} partitions ({} rows each) under {}, manifest at {}",
        manifest.len(),
        ROWS_PER_PARTITION,
        root.display(),
        manifest_path.display()
    );
    Ok(())
}
