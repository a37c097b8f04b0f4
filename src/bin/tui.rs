//! Live depth viewer over a synthetic market-update stream.

use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

use mbo_lob::{BookConfig, MarketOrderBook, MarketUpdate, Side};

/// Top-of-book snapshot shared with the UI thread
#[derive(Default, Clone)]
struct BookSnapshot {
    bids: Vec<(u64, u64)>, // (Price, Qty)
    asks: Vec<(u64, u64)>,
}

struct SharedStats {
    ops_count: AtomicU64,
    ns_per_op: AtomicU64,
    pool_used: AtomicU64,
    pool_capacity: AtomicU64,
    book_snapshot: RwLock<BookSnapshot>,
}

impl SharedStats {
    fn new(capacity: u64) -> Self {
        Self {
            ops_count: AtomicU64::new(0),
            ns_per_op: AtomicU64::new(0),
            pool_used: AtomicU64::new(0),
            pool_capacity: AtomicU64::new(capacity),
            book_snapshot: RwLock::new(BookSnapshot::default()),
        }
    }
}

fn render_level_bars(levels: &[(u64, u64)]) -> String {
    let mut out = String::new();
    let max_qty = levels.iter().map(|(_, q)| *q).max().unwrap_or(1) as f32;

    for (price, qty) in levels.iter().take(15) {
        let price_fmt = format!("{:.2}", *price as f64 / 100.0);
        let bar_len = ((*qty as f32 / max_qty) * 20.0) as usize;
        let bar = "█".repeat(bar_len);
        out.push_str(&format!("{:>10} {} {:<6}\n", price_fmt, bar, qty));
    }
    out
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Shared state
    const WINDOW: u64 = 50_000;
    let capacity: u32 = 100_000;
    let stats = Arc::new(SharedStats::new(capacity as u64));
    let stats_clone = stats.clone();

    // Book thread (synthetic flow with a random-walk mid price)
    thread::spawn(move || {
        let mut book = MarketOrderBook::new(
            1,
            BookConfig {
                max_order_ids: capacity,
                max_price_levels: 4_096,
            },
        );
        book.warm_up();

        let mut rng = 12345u64; // Simple LCG for speed
        let mut i = 0u64;
        let mut loop_count = 0u64;
        let mut current_mid_price = 300_000u64; // $3,000.00 in cents

        // Remember what each window slot holds so it can be canceled
        // before the id is reused.
        let mut live: Vec<Option<(Side, u64)>> = vec![None; WINDOW as usize];

        loop {
            const BATCH_SIZE: u64 = 1000;
            let start_batch = std::time::Instant::now();

            for _ in 0..BATCH_SIZE {
                rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1);
                let r = rng >> 32;

                // Drift the mid-price occasionally
                if r % 100 == 0 {
                    let drift = (r % 11) as i64 - 5;
                    current_mid_price = (current_mid_price as i64 + drift).max(1_000) as u64;
                }

                let side = if r % 2 == 0 { Side::Bid } else { Side::Ask };
                let spread_offset = (100 + (r % 400)) / 2;
                let noise = (r % 20) as i64 - 10;
                let base_price = if side == Side::Bid {
                    current_mid_price.saturating_sub(spread_offset)
                } else {
                    current_mid_price.saturating_add(spread_offset)
                };
                let price = (base_price as i64 + noise).max(1) as u64;
                let qty = 1 + (rng % 100) as u32;

                let id = i % WINDOW;
                if let Some((old_side, old_price)) = live[id as usize].take() {
                    let _ = book.apply_update(&MarketUpdate::cancel(
                        1,
                        id,
                        Some(old_side),
                        old_price,
                    ));
                }
                i += 1;
                let _ = book.apply_update(&MarketUpdate::add(1, id, side, price, qty, i));
                live[id as usize] = Some((side, price));
            }

            // Session-style reset once the random walk has spread the
            // ladders too wide for the level pool.
            if book.levels_live() > 3_500 {
                let _ = book.apply_update(&MarketUpdate::clear(1));
                live.iter_mut().for_each(|slot| *slot = None);
            }

            loop_count += 1;
            stats_clone.ops_count.fetch_add(BATCH_SIZE, Ordering::Relaxed);

            let elapsed = start_batch.elapsed();
            stats_clone
                .ns_per_op
                .store(elapsed.as_nanos() as u64 / BATCH_SIZE, Ordering::Relaxed);
            stats_clone
                .pool_used
                .store(book.orders_live() as u64, Ordering::Relaxed);

            // Publish a depth snapshot every few batches
            if loop_count % 50 == 0 {
                if let Ok(mut write_guard) = stats_clone.book_snapshot.write() {
                    write_guard.bids = book
                        .depth::<15>(Side::Bid)
                        .iter()
                        .map(|q| (q.price, q.qty))
                        .collect();
                    write_guard.asks = book
                        .depth::<15>(Side::Ask)
                        .iter()
                        .map(|q| (q.price, q.qty))
                        .collect();
                }
            }
        }
    });

    // Run TUI Loop
    let mut last_ops = 0;
    let mut last_time = std::time::Instant::now();
    let mut throughput = 0.0;

    loop {
        // Handle input
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.code == KeyCode::Char('q') {
                    break;
                }
            }
        }

        // Calculate throughput
        let now = std::time::Instant::now();
        if now.duration_since(last_time).as_secs_f64() >= 1.0 {
            let current_ops = stats.ops_count.load(Ordering::Relaxed);
            throughput = (current_ops - last_ops) as f64;
            last_ops = current_ops;
            last_time = now;
        }

        terminal.draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .margin(1)
                .constraints(
                    [
                        Constraint::Length(3),  // Header
                        Constraint::Min(10),    // Book
                        Constraint::Length(10), // Stats
                    ]
                    .as_ref(),
                )
                .split(f.size());

            // 1. Header
            let header = Block::default()
                .borders(Borders::ALL)
                .title("MBO-LOB Feed Demo");
            let title = Paragraph::new("ETH-USD | Press 'q' to quit")
                .block(header)
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::Cyan));
            f.render_widget(title, chunks[0]);

            // 2. Book
            let book_chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                .split(chunks[1]);

            let snapshot = stats.book_snapshot.read().unwrap();
            let bids_text = render_level_bars(&snapshot.bids);
            let asks_text = render_level_bars(&snapshot.asks);

            let bids_widget = Paragraph::new(bids_text).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("BIDS")
                    .style(Style::default().fg(Color::Green)),
            );
            let asks_widget = Paragraph::new(asks_text).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("ASKS")
                    .style(Style::default().fg(Color::Red)),
            );

            f.render_widget(bids_widget, book_chunks[0]);
            f.render_widget(asks_widget, book_chunks[1]);

            // 3. Stats
            let ops_fmt = if throughput > 1_000_000.0 {
                format!("{:.2} M", throughput / 1_000_000.0)
            } else {
                format!("{:.0} k", throughput / 1_000.0)
            };

            let pool_used = stats.pool_used.load(Ordering::Relaxed);
            let pool_cap = stats.pool_capacity.load(Ordering::Relaxed);
            let pool_pct = (pool_used as f64 / pool_cap as f64) * 100.0;
            let latency = stats.ns_per_op.load(Ordering::Relaxed);

            let stats_text = format!(
                "Throughput: {} ops/sec\nLatency (Avg Batch): {} ns\nPool Usage: {} / {} ({:.1}%)",
                ops_fmt, latency, pool_used, pool_cap, pool_pct
            );

            let stats_block = Paragraph::new(stats_text)
                .block(Block::default().borders(Borders::ALL).title("Book Telemetry"))
                .style(Style::default().fg(Color::Yellow));
            f.render_widget(stats_block, chunks[2]);
        })?;
    }

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    Ok(())
}
