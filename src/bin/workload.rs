//! Synthetic workload: index rows from several threads, run range searches,
//! print the metrics snapshot.
//!
//! Run: cargo run --release --bin keyslice-workload -- [--config <dir>] [--rows N] [--threads N]

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use keyslice::{
    IndexConfig, KeyComponent, KeyType, MapperRegistry, MapperSpec, NativeType, RangeBoundary, Row, SearchIndex,
    SearchRequest, TableSchema, Value,
};
use tracing_subscriber::EnvFilter;

const PARTITIONS: usize = 64;

fn print_usage() {
    println!("keyslice-workload {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: keyslice-workload [--config <dir>] [--rows <n>] [--threads <n>] [--generic]");
    println!();
    println!("Options:");
    println!("  --config       Directory holding index_config.json (default: auto-tuned)");
    println!("  --rows         Rows to index (default: 100000)");
    println!("  --threads      Writer threads (default: 4)");
    println!("  --generic      Leave key components unmapped (generic strategy)");
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn parse_count(args: &[String], flag: &str, default: usize) -> usize {
    match arg_value(args, flag) {
        None => default,
        Some(raw) => match raw.parse() {
            Ok(n) if n > 0 => n,
            _ => {
                eprintln!("Error: {} expects a positive integer, got '{}'", flag, raw);
                std::process::exit(1);
            }
        },
    }
}

fn sample_table() -> TableSchema {
    let key_type = Arc::new(KeyType::new(vec![
        KeyComponent::new("day", NativeType::Int),
        KeyComponent::new("ts", NativeType::Timestamp).descending(),
        KeyComponent::new("seq", NativeType::BigInt),
    ]));
    TableSchema::new("events", key_type)
        .with_column("kind", NativeType::Text)
        .with_column("score", NativeType::Double)
}

fn load_config(args: &[String], generic: bool) -> keyslice::Result<IndexConfig> {
    let mut config = match arg_value(args, "--config") {
        Some(dir) => IndexConfig::read_from(&PathBuf::from(dir))?.unwrap_or_else(IndexConfig::auto_tune),
        None => IndexConfig::auto_tune(),
    };
    if config.columns.is_empty() {
        config = config.with_column("kind", MapperSpec::String);
        if !generic {
            config = config
                .with_column("day", MapperSpec::Integer)
                .with_column("ts", MapperSpec::Date)
                .with_column("seq", MapperSpec::BigInteger);
        }
    }
    Ok(config)
}

fn run(args: &[String]) -> keyslice::Result<()> {
    let rows = parse_count(args, "--rows", 100_000);
    let threads = parse_count(args, "--threads", 4);
    let config = load_config(args, args.iter().any(|a| a == "--generic"))?;

    let index = Arc::new(SearchIndex::open(&config, sample_table(), &MapperRegistry::new())?);
    eprintln!(
        "[keyslice-workload] {} strategy, {} shards, {} workers",
        index.translator().kind(),
        config.shard_count,
        config.dispatcher.worker_count
    );

    let started = Instant::now();
    let per_thread = rows.div_ceil(threads);
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let index = Arc::clone(&index);
            thread::spawn(move || -> keyslice::Result<()> {
                let first = t * per_thread;
                let last = ((t + 1) * per_thread).min(rows);
                for i in first..last {
                    let row = Row::new(
                        format!("tenant-{}", i % PARTITIONS),
                        vec![
                            Value::Int((i % 7) as i32),
                            Value::Timestamp(1_700_000_000_000 + (i as i64 * 37) % 86_400_000),
                            Value::BigInt(i as i64),
                        ],
                    )
                    .with_column("kind", if i % 3 == 0 { "click" } else { "view" })
                    .with_column("score", (i % 1000) as f64 / 10.0);
                    index.upsert(row)?;
                }
                Ok(())
            })
        })
        .collect();
    for handle in handles {
        match handle.join() {
            Ok(result) => result?,
            Err(_) => eprintln!("[keyslice-workload] writer thread panicked"),
        }
    }
    index.commit()?;
    eprintln!(
        "[keyslice-workload] indexed {} rows in {:?}",
        index.len(),
        started.elapsed()
    );

    let started = Instant::now();
    let mut returned = 0;
    for p in 0..PARTITIONS {
        let request = SearchRequest::new()
            .partition(format!("tenant-{p}"))
            .start(RangeBoundary::inclusive(vec![Value::Int(2)]))
            .stop(RangeBoundary::exclusive(vec![Value::Int(5)]))
            .filter("kind", "click")
            .limit(100);
        returned += index.search(&request)?.len();
    }
    let top = index.search(&SearchRequest::new().limit(10))?;
    eprintln!(
        "[keyslice-workload] {} searches returned {} rows in {:?}",
        PARTITIONS + 1,
        returned + top.len(),
        started.elapsed()
    );

    index.close();
    println!("{:#?}", index.metrics());
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    if let Err(e) = run(&args) {
        eprintln!("[keyslice-workload] error ({}): {}", e.code(), e);
        std::process::exit(1);
    }
}
