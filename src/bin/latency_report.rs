//! Hot-path latency percentiles for `apply_update`.

use hdrhistogram::Histogram;
use std::time::Instant;

use mbo_lob::runtime::pin_to_last_core;
use mbo_lob::{BookConfig, MarketOrderBook, MarketUpdate, Side};

const ITERATIONS: u64 = 1_000_000;
/// Orders resting at any moment; ids wrap through this window.
const WINDOW: u64 = 50_000;

fn main() {
    println!("Preparing Latency Benchmark...");

    pin_to_last_core();

    let mut book = MarketOrderBook::new(
        1,
        BookConfig {
            max_order_ids: 100_000,
            max_price_levels: 1_024,
        },
    );
    book.warm_up();

    let mut histogram = Histogram::<u64>::new_with_bounds(1, 100_000, 3).unwrap();

    println!("Running {} iterations...", ITERATIONS);

    let mut total_duration = std::time::Duration::new(0, 0);

    for i in 0..ITERATIONS {
        let id = i % WINDOW;
        let (side, price) = if id % 2 == 0 {
            (Side::Bid, 9_900 - (id % 100))
        } else {
            (Side::Ask, 10_100 + (id % 100))
        };

        // Steady-state churn: cancel the window-old resident before
        // re-adding under the same id.
        if i >= WINDOW {
            let start = Instant::now();
            std::hint::black_box(book.apply_update(&MarketUpdate::cancel(
                1,
                id,
                Some(side),
                price,
            )))
            .unwrap();
            let elapsed = start.elapsed();
            histogram.record(elapsed.as_nanos() as u64).unwrap_or(());
            total_duration += elapsed;
        }

        let update = MarketUpdate::add(1, id, side, price, 10, i + 1);

        let start = Instant::now();
        std::hint::black_box(book.apply_update(&update)).unwrap();
        let elapsed = start.elapsed();

        histogram.record(elapsed.as_nanos() as u64).unwrap_or(());
        total_duration += elapsed;
    }

    let ops = histogram.len();

    println!("\n=== Latency Report (ns) ===");
    println!("Total Ops:  {}", ops);
    println!(
        "Throughput: {:.2} ops/sec",
        ops as f64 / total_duration.as_secs_f64()
    );
    println!("---------------------------");
    println!("Min:    {:6} ns", histogram.min());
    println!("P50:    {:6} ns", histogram.value_at_quantile(0.50));
    println!("P90:    {:6} ns", histogram.value_at_quantile(0.90));
    println!("P99:    {:6} ns", histogram.value_at_quantile(0.99));
    println!("P99.9:  {:6} ns", histogram.value_at_quantile(0.999));
    println!("P99.99: {:6} ns", histogram.value_at_quantile(0.9999));
    println!("Max:    {:6} ns", histogram.max());
    println!("---------------------------");

    println!("\nDistribution:");
    for v in histogram.iter_log(100_000, 2.0) {
        let count = v.count_at_value();
        if count > 0 {
            println!(
                "up to {:6} ns: {:10} count",
                v.value_iterated_to(),
                count
            );
        }
    }
}
