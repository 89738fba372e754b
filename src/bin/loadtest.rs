//! Controlled load-generation client for exercising a Gatekeeper
//! deployment you own.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use chrono::{SecondsFormat, Utc};
use clap::Parser;
use parking_lot::Mutex;

/// Hard cap on worker count, to keep accidental typos from turning a
/// controlled test into something else.
const MAX_CONCURRENCY: usize = 200;

#[derive(Parser, Debug)]
#[command(name = "loadtest")]
#[command(about = "Controlled load-generation client for your own Gatekeeper deployment")]
struct Args {
    /// Target base URL. Must be infrastructure you own.
    base_url: String,

    /// Concurrent workers
    #[arg(long, default_value_t = 10)]
    concurrency: usize,

    /// Total duration in seconds
    #[arg(long, default_value_t = 90)]
    duration: u64,

    /// Path to request
    #[arg(long, default_value = "/")]
    path: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 5.0)]
    timeout: f64,

    /// Seconds over which workers start, from one up to full concurrency
    #[arg(long, default_value_t = 0)]
    ramp_up: u64,

    /// Delay in seconds between requests per worker
    #[arg(long, default_value_t = 0.0)]
    delay: f64,

    /// CSV file for per-request records
    #[arg(long)]
    out: Option<String>,

    /// Confirm that you own or administer the target
    #[arg(long)]
    confirm_own: bool,
}

/// One per-request record, kept only when `--out` is set.
struct RequestRecord {
    timestamp: String,
    worker_id: usize,
    status: String,
    detail: String,
}

#[derive(Default)]
struct Stats {
    sent: u64,
    success: u64,
    errors: u64,
    codes: BTreeMap<u16, u64>,
    records: Vec<RequestRecord>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if !args.confirm_own {
        bail!("pass --confirm-own to confirm the target is your own infrastructure");
    }
    let concurrency = args.concurrency.max(1);
    if concurrency > MAX_CONCURRENCY {
        bail!(
            "requested concurrency {} exceeds the safe maximum {}",
            concurrency,
            MAX_CONCURRENCY
        );
    }

    let url = format!("{}{}", args.base_url.trim_end_matches('/'), args.path);

    println!("{}", "=".repeat(60));
    println!("Controlled load test");
    println!("Target:          {}", url);
    println!("Duration (s):    {}", args.duration);
    println!("Workers:         {}", concurrency);
    println!("Timeout (s):     {}", args.timeout);
    println!("Ramp-up (s):     {}", args.ramp_up);
    println!("Delay/req (s):   {}", args.delay);
    if let Some(ref out) = args.out {
        println!("Output CSV:      {}", out);
    }
    println!("Running against owned infrastructure only.");
    println!("{}", "=".repeat(60));

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs_f64(args.timeout))
        .build()
        .context("building HTTP client")?;

    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let stats = Arc::new(Mutex::new(Stats::default()));
    let keep_records = args.out.is_some();

    // stagger worker starts across the ramp-up period
    let ramp_interval = if args.ramp_up > 0 && concurrency > 1 {
        Duration::from_secs_f64(args.ramp_up as f64 / (concurrency - 1) as f64)
    } else {
        Duration::ZERO
    };

    let mut workers = Vec::with_capacity(concurrency);
    for worker_id in 0..concurrency {
        let client = client.clone();
        let url = url.clone();
        let stats = Arc::clone(&stats);
        let delay = args.delay;
        workers.push(tokio::spawn(worker(
            worker_id,
            client,
            url,
            deadline,
            delay,
            keep_records,
            stats,
        )));
        if !ramp_interval.is_zero() && worker_id + 1 < concurrency {
            tokio::time::sleep(ramp_interval).await;
        }
    }
    for handle in workers {
        let _ = handle.await;
    }

    let stats = stats.lock();
    println!();
    println!("=== FINAL REPORT ===");
    println!("Target URL:            {}", url);
    println!("Requests sent:         {}", stats.sent);
    println!("Successful (<400):     {}", stats.success);
    println!("Errors/timeouts:       {}", stats.errors);
    println!("HTTP status codes:");
    for (code, n) in &stats.codes {
        println!("  {}: {}", code, n);
    }

    if let Some(ref out) = args.out {
        write_records(out, &stats.records)
            .with_context(|| format!("writing records to {}", out))?;
        println!("Records saved to {}", out);
    }

    Ok(())
}

async fn worker(
    worker_id: usize,
    client: reqwest::Client,
    url: String,
    deadline: Instant,
    delay: f64,
    keep_records: bool,
    stats: Arc<Mutex<Stats>>,
) {
    while Instant::now() < deadline {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        match client.get(&url).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let bytes = response.bytes().await.map(|b| b.len()).unwrap_or(0);
                let mut stats = stats.lock();
                stats.sent += 1;
                *stats.codes.entry(status).or_insert(0) += 1;
                if status < 400 {
                    stats.success += 1;
                }
                if keep_records {
                    stats.records.push(RequestRecord {
                        timestamp,
                        worker_id,
                        status: status.to_string(),
                        detail: bytes.to_string(),
                    });
                }
            }
            Err(e) => {
                let mut stats = stats.lock();
                stats.sent += 1;
                stats.errors += 1;
                if keep_records {
                    stats.records.push(RequestRecord {
                        timestamp,
                        worker_id,
                        status: "ERR".to_string(),
                        detail: e.to_string(),
                    });
                }
            }
        }
        if delay > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(delay)).await;
        }
    }
}

fn write_records(path: &str, records: &[RequestRecord]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    writeln!(file, "timestamp_utc,worker_id,status_or_error,bytes_or_error")?;
    for record in records {
        writeln!(
            file,
            "{},{},{},{}",
            record.timestamp,
            record.worker_id,
            record.status,
            record.detail.replace(',', ";")
        )?;
    }
    Ok(())
}
