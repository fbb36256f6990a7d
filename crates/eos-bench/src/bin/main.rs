//! Standalone stress benchmark runner.

use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

use clap::Parser;
use eos_bench::{BenchmarkSuite, default_benchmarks, run_scenario};

#[derive(Parser)]
#[command(name = "eos-bench")]
#[command(about = "Stress benchmarks for the eos handle registry and arrays", long_about = None)]
struct Cli {
    /// Runs per scenario
    #[arg(long, default_value_t = 5)]
    runs: usize,
    /// Objects touched per run
    #[arg(long, default_value_t = 10_000)]
    objects: usize,
    /// Write the JSON report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let benchmarks = default_benchmarks(cli.objects);
    eprintln!(
        "Running {} benchmarks, {} runs each...\n",
        benchmarks.len(),
        cli.runs
    );

    let mut results = Vec::new();
    for (idx, scenario) in benchmarks.iter().enumerate() {
        eprint!("[{}/{}] {} ... ", idx + 1, benchmarks.len(), scenario.name);
        match run_scenario(scenario, cli.runs) {
            Ok(result) => {
                let agg = &result.aggregate;
                eprintln!(
                    "OK ({:.4}s median, min {:.4}s, max {:.4}s, {:.0} ops/s)",
                    agg.total_time_median_s,
                    agg.total_time_min_s,
                    agg.total_time_max_s,
                    agg.ops_per_s_median
                );
                results.push(result);
            }
            Err(e) => {
                eprintln!("FAILED");
                eprintln!("  Error: {e}");
            }
        }
    }

    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)?
        .as_secs();
    let report = serde_json::to_string_pretty(&BenchmarkSuite {
        timestamp: format!("timestamp_{timestamp}"),
        results,
    })?;

    match cli.output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, report)?;
            eprintln!("\nReport saved to: {}", path.display());
        }
        None => println!("{report}"),
    }
    Ok(())
}
