//! Stress benchmarks for the handle registry and shared arrays.

use std::sync::Arc;
use std::time::Instant;

use eos_core::{EosError, RegistryConfig};
use eos_language::{Array, DoubleArray, RegisteredObject, Session};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum BenchError {
    #[error(transparent)]
    Eos(#[from] EosError),

    #[error("invariant violated in {scenario}: {detail}")]
    Invariant { scenario: String, detail: String },
}

pub type BenchResult<T> = Result<T, BenchError>;

/// What a scenario exercises.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScenarioKind {
    /// Register, drop every other object, register again; one thread.
    SequentialChurn,
    /// Same churn driven from rayon workers.
    ParallelChurn,
    /// Attach, resize and copy arrays sharing one buffer.
    ArrayAlias,
}

/// A benchmark scenario definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkScenario {
    pub id: String,
    pub name: String,
    pub kind: ScenarioKind,
    /// Objects (or arrays) touched per run.
    pub objects: usize,
    /// Registry sizing; small steps force frequent growth.
    pub config: RegistryConfig,
}

/// A single run's measurements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetrics {
    pub total_time_s: f64,
    pub adds: u64,
    pub deletes: u64,
    pub grows: u64,
    pub final_capacity: usize,
    pub ops_per_s: f64,
}

/// Aggregated statistics for multiple runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub run_count: usize,
    pub total_time_median_s: f64,
    pub total_time_min_s: f64,
    pub total_time_max_s: f64,
    pub ops_per_s_median: f64,
    pub grows_median: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub scenario: BenchmarkScenario,
    pub runs: Vec<RunMetrics>,
    pub aggregate: AggregateMetrics,
}

/// Collection of benchmark results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkSuite {
    pub timestamp: String,
    pub results: Vec<BenchmarkResult>,
}

pub fn default_benchmarks(objects: usize) -> Vec<BenchmarkScenario> {
    let churn_config = RegistryConfig {
        initial_capacity: 64,
        growth_step: 64,
    };
    vec![
        BenchmarkScenario {
            id: "sequential-churn".into(),
            name: "Sequential registry churn".into(),
            kind: ScenarioKind::SequentialChurn,
            objects,
            config: churn_config,
        },
        BenchmarkScenario {
            id: "parallel-churn".into(),
            name: "Parallel registry churn".into(),
            kind: ScenarioKind::ParallelChurn,
            objects,
            config: churn_config,
        },
        BenchmarkScenario {
            id: "array-alias".into(),
            name: "Array attach/resize/copy".into(),
            kind: ScenarioKind::ArrayAlias,
            objects,
            config: RegistryConfig::default(),
        },
    ]
}

/// Run a single benchmark scenario `times` times.
pub fn run_scenario(scenario: &BenchmarkScenario, times: usize) -> BenchResult<BenchmarkResult> {
    let mut runs = Vec::with_capacity(times);
    for run_idx in 0..times {
        let metrics = run_once(scenario)?;
        debug!(
            scenario = %scenario.id,
            run = run_idx,
            time_s = metrics.total_time_s,
            "run complete"
        );
        runs.push(metrics);
    }

    let aggregate = compute_aggregates(&runs);
    info!(
        scenario = %scenario.id,
        median_s = aggregate.total_time_median_s,
        "scenario complete"
    );
    Ok(BenchmarkResult {
        scenario: scenario.clone(),
        runs,
        aggregate,
    })
}

fn run_once(scenario: &BenchmarkScenario) -> BenchResult<RunMetrics> {
    let session = Session::with_config(scenario.config)?;
    let start = Instant::now();
    match scenario.kind {
        ScenarioKind::SequentialChurn => sequential_churn(&session, scenario)?,
        ScenarioKind::ParallelChurn => parallel_churn(&session, scenario)?,
        ScenarioKind::ArrayAlias => array_alias(scenario)?,
    }
    let total_time_s = start.elapsed().as_secs_f64();

    let stats = session.registry().stats().snapshot();
    let ops = match scenario.kind {
        ScenarioKind::ArrayAlias => scenario.objects as u64,
        _ => stats.adds + stats.deletes,
    };
    Ok(RunMetrics {
        total_time_s,
        adds: stats.adds,
        deletes: stats.deletes,
        grows: stats.grows,
        final_capacity: session.registry().capacity(),
        ops_per_s: if total_time_s > 0.0 {
            ops as f64 / total_time_s
        } else {
            0.0
        },
    })
}

fn check(scenario: &BenchmarkScenario, ok: bool, detail: impl FnOnce() -> String) -> BenchResult<()> {
    if ok {
        Ok(())
    } else {
        Err(BenchError::Invariant {
            scenario: scenario.id.clone(),
            detail: detail(),
        })
    }
}

fn distinct_keys(arrays: &[Arc<DoubleArray>]) -> bool {
    let mut keys: Vec<_> = arrays.iter().filter_map(|a| a.key()).collect();
    keys.sort_unstable();
    keys.dedup();
    keys.len() == arrays.len()
}

fn sequential_churn(session: &Session, scenario: &BenchmarkScenario) -> BenchResult<()> {
    let mut live = (0..scenario.objects)
        .map(|_| session.new_double_array(4, 0.0))
        .collect::<Result<Vec<_>, _>>()?;

    let mut index = 0;
    live.retain(|_| {
        index += 1;
        index % 2 == 0
    });
    for _ in 0..scenario.objects / 2 {
        live.push(session.new_double_array(4, 1.0)?);
    }

    check(scenario, distinct_keys(&live), || "duplicate live keys".into())?;
    check(scenario, session.live_objects() == live.len(), || {
        format!("{} live slots for {} objects", session.live_objects(), live.len())
    })
}

fn parallel_churn(session: &Session, scenario: &BenchmarkScenario) -> BenchResult<()> {
    let first = (0..scenario.objects)
        .into_par_iter()
        .map(|_| session.new_double_array(4, 0.0))
        .collect::<Result<Vec<_>, _>>()?;

    let (kept, dropped): (Vec<_>, Vec<_>) = first
        .into_iter()
        .enumerate()
        .partition(|(i, _)| i % 2 == 0);
    let second = dropped
        .into_par_iter()
        .map(|(_, arr)| {
            drop(arr);
            session.new_double_array(4, 1.0)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut live: Vec<_> = kept.into_iter().map(|(_, arr)| arr).collect();
    live.extend(second);
    check(scenario, distinct_keys(&live), || "duplicate live keys".into())?;
    check(scenario, session.live_objects() == live.len(), || {
        format!("{} live slots for {} objects", session.live_objects(), live.len())
    })
}

fn array_alias(scenario: &BenchmarkScenario) -> BenchResult<()> {
    let base = Array::filled(64, 1.0_f64);
    for i in 0..scenario.objects {
        let mut alias = base.clone();
        let mut dup = Array::new(0);
        dup.copy_from(&alias);
        alias.resize(64 + i % 16);
        dup.axpy(2.0, &base)?;
        check(scenario, dup.get(0)? == 3.0, || "axpy result".into())?;
    }
    check(scenario, base.ref_count() == 1, || {
        format!("{} references left on base buffer", base.ref_count())
    })
}

fn median<T: Copy + PartialOrd>(values: &mut [T]) -> Option<T> {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    values.get(values.len() / 2).copied()
}

fn compute_aggregates(runs: &[RunMetrics]) -> AggregateMetrics {
    let mut times: Vec<f64> = runs.iter().map(|r| r.total_time_s).collect();
    let mut rates: Vec<f64> = runs.iter().map(|r| r.ops_per_s).collect();
    let mut grows: Vec<u64> = runs.iter().map(|r| r.grows).collect();

    AggregateMetrics {
        run_count: runs.len(),
        total_time_median_s: median(&mut times).unwrap_or(0.0),
        total_time_min_s: times.first().copied().unwrap_or(0.0),
        total_time_max_s: times.last().copied().unwrap_or(0.0),
        ops_per_s_median: median(&mut rates).unwrap_or(0.0),
        grows_median: median(&mut grows).unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_benchmarks_are_defined() {
        let benchmarks = default_benchmarks(100);
        assert_eq!(benchmarks.len(), 3);
        assert!(benchmarks.iter().all(|b| !b.id.is_empty()));
        assert!(benchmarks.iter().all(|b| b.objects == 100));
    }

    #[test]
    fn every_scenario_runs_clean() {
        for scenario in default_benchmarks(200) {
            let result = run_scenario(&scenario, 2).unwrap();
            assert_eq!(result.runs.len(), 2);
            assert_eq!(result.aggregate.run_count, 2);
        }
    }

    #[test]
    fn churn_counts_adds_and_deletes() {
        let scenario = &default_benchmarks(128)[0];
        let metrics = run_once(scenario).unwrap();
        assert_eq!(metrics.adds, 192);
        // everything is released by the time the run returns
        assert_eq!(metrics.deletes, 192);
        assert!(metrics.grows >= 1);
    }

    #[test]
    fn aggregates_sort_times() {
        let run = |t: f64| RunMetrics {
            total_time_s: t,
            adds: 0,
            deletes: 0,
            grows: 1,
            final_capacity: 0,
            ops_per_s: 1.0 / t,
        };
        let agg = compute_aggregates(&[run(0.3), run(0.1), run(0.2)]);
        assert_eq!(agg.total_time_median_s, 0.2);
        assert_eq!(agg.total_time_min_s, 0.1);
        assert_eq!(agg.total_time_max_s, 0.3);
        assert_eq!(agg.grows_median, 1);
    }

    #[test]
    fn empty_aggregate_is_zero() {
        let agg = compute_aggregates(&[]);
        assert_eq!(agg.run_count, 0);
        assert_eq!(agg.total_time_median_s, 0.0);
    }

    #[test]
    fn suite_serializes() {
        let scenario = default_benchmarks(10).remove(2);
        let result = run_scenario(&scenario, 1).unwrap();
        let suite = BenchmarkSuite {
            timestamp: "timestamp_0".into(),
            results: vec![result],
        };
        let json = serde_json::to_string(&suite).unwrap();
        let back: BenchmarkSuite = serde_json::from_str(&json).unwrap();
        assert_eq!(back.results[0].scenario.kind, ScenarioKind::ArrayAlias);
    }
}
