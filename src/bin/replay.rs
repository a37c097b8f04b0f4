//! Replay a recorded Tardis-format L3 CSV tape through the book.

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mbo_lob::feed::{FeedTranslator, TardisL3Row};
use mbo_lob::{BookConfig, MarketOrderBook, UpdateKind};

#[derive(Parser)]
#[command(name = "replay", about = "Replay an L3 CSV tape through the order book")]
struct Args {
    /// Path to the Tardis CSV export
    csv: PathBuf,

    /// Fixed-point price multiplier (100 = cents)
    #[arg(long, default_value_t = 100)]
    price_mult: u64,

    /// Bound of the dense order-id space / order pool capacity
    #[arg(long, default_value_t = 1 << 20)]
    max_order_ids: u32,

    /// Maximum distinct live price levels
    #[arg(long, default_value_t = 1 << 14)]
    max_price_levels: u32,

    /// Print the final book snapshot
    #[arg(long)]
    dump: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut book = MarketOrderBook::new(
        1,
        BookConfig {
            max_order_ids: args.max_order_ids,
            max_price_levels: args.max_price_levels,
        },
    );
    book.warm_up();

    let mut translator = FeedTranslator::new(1, args.price_mult, args.max_order_ids);
    let mut reader = csv::Reader::from_path(&args.csv)?;

    let mut rows = 0u64;
    let mut applied = 0u64;
    let mut dropped = 0u64;
    let mut trades = 0u64;

    let start = Instant::now();
    for result in reader.deserialize::<TardisL3Row>() {
        let row = result?;
        rows += 1;

        let Some(update) = translator.translate(&row) else {
            continue;
        };
        if update.kind == UpdateKind::Trade {
            trades += 1;
        }
        match book.apply_update(&update) {
            Ok(()) => applied += 1,
            Err(_) => dropped += 1,
        }
    }
    let elapsed = start.elapsed();

    println!("=== Replay Summary ===");
    println!("Rows:      {rows}");
    println!("Applied:   {applied}");
    println!("Dropped:   {dropped}");
    println!("Trades:    {trades}");
    println!("Elapsed:   {:.3}s", elapsed.as_secs_f64());
    println!(
        "Rate:      {:.0} rows/sec",
        rows as f64 / elapsed.as_secs_f64()
    );
    println!("Resting:   {} orders", book.order_count());
    println!("BBO:       {}", book.bbo());

    if args.dump {
        println!("{}", book.render());
    }

    Ok(())
}
