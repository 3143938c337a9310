//! Batch generation of observations.
//!
//! Every job owns its random stream, seeded from the batch seed and the job
//! index, so a batch is reproducible whether it runs on one thread or many.
//! Cancellation is checked before each observation starts; a failed
//! observation is recorded and the batch moves on.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::anomaly::AnomalyKind;
use crate::config::Configuration;
use crate::observation::{Observation, ObservationKind};
use crate::SynthError;

pub const DEFAULT_SEED: u64 = 0x5C2E_2024_0001_u64;
const OBSERVATION_SALT: u64 = 0x0B5E_0000_u64;

/// Requested number of observations per kind, in generation order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BatchPlan {
    entries: Vec<(ObservationKind, usize)>,
}

impl BatchPlan {
    /// `amounts.number_of_ok` ok runs plus every anomaly whose `generate`
    /// flag is set.
    pub fn from_config(config: &Configuration) -> Self {
        let mut plan = Self::default();
        plan.set(ObservationKind::Ok, config.amounts.number_of_ok);
        for kind in AnomalyKind::ALL {
            plan.set(ObservationKind::Anomaly(kind), kind.requested_amount(config));
        }
        plan
    }

    /// The mixed preview set: `amounts.number_of_ok_to_plot` ok runs plus
    /// `amount_to_plot` of every generated anomaly.
    pub fn preview_from_config(config: &Configuration) -> Self {
        let mut plan = Self::default();
        plan.set(ObservationKind::Ok, config.amounts.number_of_ok_to_plot);
        for kind in AnomalyKind::ALL {
            plan.set(ObservationKind::Anomaly(kind), kind.preview_amount(config));
        }
        plan
    }

    pub fn with(mut self, kind: ObservationKind, count: usize) -> Self {
        self.set(kind, count);
        self
    }

    pub fn set(&mut self, kind: ObservationKind, count: usize) {
        match self.entries.iter_mut().find(|(k, _)| *k == kind) {
            Some(entry) => entry.1 = count,
            None => self.entries.push((kind, count)),
        }
    }

    pub fn count(&self, kind: ObservationKind) -> usize {
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map_or(0, |(_, count)| *count)
    }

    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    /// Percentage of the batch taken by `kind`.
    pub fn share(&self, kind: ObservationKind) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.count(kind) as f64 / total as f64 * 100.0
    }

    pub fn entries(&self) -> &[(ObservationKind, usize)] {
        &self.entries
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.entries
            .iter()
            .flat_map(|&(kind, count)| std::iter::repeat(kind).take(count))
            .enumerate()
            .map(|(index, kind)| Job { index, kind })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Job {
    pub index: usize,
    pub kind: ObservationKind,
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub seed: u64,
    pub parallel: bool,
    /// Overrides the plan derived from the configuration.
    pub plan: Option<BatchPlan>,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            parallel: true,
            plan: None,
            cancel: None,
        }
    }
}

impl BatchOptions {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn with_plan(mut self, plan: BatchPlan) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

#[derive(Debug)]
pub struct BatchFailure {
    pub job: Job,
    pub error: SynthError,
}

#[derive(Debug)]
pub struct BatchResult {
    pub seed: u64,
    pub plan: BatchPlan,
    /// Built observations with their job index, in job order.
    pub observations: Vec<(usize, Observation)>,
    pub failures: Vec<BatchFailure>,
    /// Jobs that never started because the batch was cancelled.
    pub cancelled: Vec<Job>,
}

impl BatchResult {
    pub fn was_cancelled(&self) -> bool {
        !self.cancelled.is_empty()
    }
}

enum JobOutcome {
    Built(usize, Observation),
    Failed(BatchFailure),
    Cancelled(Job),
}

fn job_rng(seed: u64, index: usize) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed ^ OBSERVATION_SALT ^ index as u64)
}

fn run_job(config: &Configuration, options: &BatchOptions, job: Job) -> JobOutcome {
    if options.is_cancelled() {
        return JobOutcome::Cancelled(job);
    }
    let mut rng = job_rng(options.seed, job.index);
    match Observation::new(config, job.kind, &mut rng) {
        Ok(observation) => JobOutcome::Built(job.index, observation),
        Err(error) => {
            warn!(index = job.index, kind = %job.kind, %error, "observation failed");
            JobOutcome::Failed(BatchFailure { job, error })
        }
    }
}

/// Generates every observation the plan asks for.
///
/// Fails only when the configuration itself is invalid; per-observation
/// errors are collected in [`BatchResult::failures`].
pub fn run_batch(
    config: &Configuration,
    options: &BatchOptions,
) -> Result<BatchResult, SynthError> {
    config.validate()?;
    let plan = options
        .plan
        .clone()
        .unwrap_or_else(|| BatchPlan::from_config(config));
    let jobs = plan.jobs();
    info!(
        total = jobs.len(),
        seed = options.seed,
        parallel = options.parallel,
        "starting batch"
    );

    let outcomes: Vec<JobOutcome> = if options.parallel {
        jobs.par_iter()
            .map(|&job| run_job(config, options, job))
            .collect()
    } else {
        jobs.iter()
            .map(|&job| run_job(config, options, job))
            .collect()
    };

    let mut result = BatchResult {
        seed: options.seed,
        plan,
        observations: Vec::with_capacity(jobs.len()),
        failures: Vec::new(),
        cancelled: Vec::new(),
    };
    for outcome in outcomes {
        match outcome {
            JobOutcome::Built(index, observation) => {
                result.observations.push((index, observation))
            }
            JobOutcome::Failed(failure) => result.failures.push(failure),
            JobOutcome::Cancelled(job) => result.cancelled.push(job),
        }
    }

    info!(
        succeeded = result.observations.len(),
        failed = result.failures.len(),
        cancelled = result.cancelled.len(),
        "finished batch"
    );
    Ok(result)
}

/// Builds `count` observations of one kind for a quick look.
pub fn preview(
    config: &Configuration,
    kind: ObservationKind,
    count: usize,
    seed: u64,
) -> Result<Vec<Observation>, SynthError> {
    (0..count)
        .map(|index| Observation::new(config, kind, &mut job_rng(seed, index)))
        .collect()
}

/// Builds the configured mixed preview set in plan order.
///
/// Unlike a batch, the first failing observation aborts the preview.
pub fn preview_mixed(config: &Configuration, seed: u64) -> Result<Vec<Observation>, SynthError> {
    config.validate()?;
    BatchPlan::preview_from_config(config)
        .jobs()
        .into_iter()
        .map(|job| Observation::new(config, job.kind, &mut job_rng(seed, job.index)))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KindCounts {
    pub requested: usize,
    /// Percentage of the whole batch requested as this kind
    pub share: f64,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub index: usize,
    pub kind: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub seed: u64,
    pub requested: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub kinds: BTreeMap<String, KindCounts>,
    pub failures: Vec<FailureRecord>,
}

pub fn summarize_batch(result: &BatchResult) -> BatchSummary {
    let mut kinds: BTreeMap<String, KindCounts> = BTreeMap::new();
    for &(kind, count) in result.plan.entries() {
        let counts = kinds.entry(kind.to_string()).or_default();
        counts.requested += count;
        counts.share = result.plan.share(kind);
    }
    for (_, observation) in &result.observations {
        kinds.entry(observation.kind().to_string()).or_default().succeeded += 1;
    }
    for failure in &result.failures {
        kinds.entry(failure.job.kind.to_string()).or_default().failed += 1;
    }
    for job in &result.cancelled {
        kinds.entry(job.kind.to_string()).or_default().cancelled += 1;
    }

    BatchSummary {
        seed: result.seed,
        requested: result.plan.total(),
        succeeded: result.observations.len(),
        failed: result.failures.len(),
        cancelled: result.cancelled.len(),
        kinds,
        failures: result
            .failures
            .iter()
            .map(|failure| FailureRecord {
                index: failure.job.index,
                kind: failure.job.kind.to_string(),
                error: failure.error.to_string(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::{preview, preview_mixed, run_batch, summarize_batch, BatchOptions, BatchPlan};
    use crate::anomaly::AnomalyKind;
    use crate::config::Configuration;
    use crate::observation::ObservationKind;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn steady_config() -> Configuration {
        let mut cfg = Configuration::default();
        cfg.randomize_horizontal_offset.apply = false;
        cfg.amounts.number_of_ok = 12;
        cfg.anomalies_type_1.amount = 3;
        cfg.anomalies_type_2.amount = 4;
        cfg.anomalies_type_3.amount = 5;
        cfg.anomalies_type_4.amount = 6;
        cfg
    }

    #[test]
    fn plan_follows_amounts_and_generate_flags() {
        let mut cfg = steady_config();
        cfg.anomalies_type_2.generate = false;
        let plan = BatchPlan::from_config(&cfg);
        assert_eq!(plan.count(ObservationKind::Ok), 12);
        assert_eq!(
            plan.count(ObservationKind::Anomaly(AnomalyKind::FinalTighteningLeap)),
            0
        );
        assert_eq!(plan.total(), 12 + 3 + 5 + 6);
        assert_eq!(plan.jobs().len(), plan.total());
        assert!((plan.share(ObservationKind::Ok) - 12.0 / 26.0 * 100.0).abs() < 1e-12);
    }

    #[test]
    fn batch_counts_match_the_plan() {
        let cfg = steady_config();
        let result = run_batch(&cfg, &BatchOptions::default()).unwrap();
        let summary = summarize_batch(&result);
        assert_eq!(summary.requested, 30);
        assert_eq!(summary.succeeded, 30);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.kinds["anomaly_type_04"].succeeded, 6);
        assert_eq!(summary.kinds["ok"].requested, 12);
        assert!((summary.kinds["ok"].share - 40.0).abs() < 1e-12);
        assert!((summary.kinds["anomaly_type_01"].share - 10.0).abs() < 1e-12);
        let total: f64 = summary.kinds.values().map(|counts| counts.share).sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn preview_plan_follows_amounts_to_plot() {
        let mut cfg = steady_config();
        cfg.amounts.number_of_ok_to_plot = 4;
        cfg.anomalies_type_1.amount_to_plot = 1;
        cfg.anomalies_type_2.amount_to_plot = 2;
        cfg.anomalies_type_3.amount_to_plot = 0;
        cfg.anomalies_type_4.generate = false;
        let plan = BatchPlan::preview_from_config(&cfg);
        assert_eq!(plan.count(ObservationKind::Ok), 4);
        assert_eq!(plan.count(ObservationKind::Anomaly(AnomalyKind::HardRun)), 0);
        assert_eq!(plan.count(ObservationKind::Anomaly(AnomalyKind::SoftRun)), 0);
        assert_eq!(plan.total(), 7);
    }

    #[test]
    fn mixed_preview_holds_every_requested_kind_in_order() {
        let mut cfg = steady_config();
        cfg.randomize_vertical_offset.apply = false;
        cfg.amounts.number_of_ok_to_plot = 2;
        for amount in [
            &mut cfg.anomalies_type_1.amount_to_plot,
            &mut cfg.anomalies_type_2.amount_to_plot,
            &mut cfg.anomalies_type_3.amount_to_plot,
            &mut cfg.anomalies_type_4.amount_to_plot,
        ] {
            *amount = 1;
        }
        let observations = preview_mixed(&cfg, 5).unwrap();
        let kinds: Vec<String> = observations
            .iter()
            .map(|obs| obs.kind().to_string())
            .collect();
        assert_eq!(
            kinds,
            vec![
                "ok",
                "ok",
                "anomaly_type_01",
                "anomaly_type_02",
                "anomaly_type_03",
                "anomaly_type_04"
            ]
        );
        assert_eq!(preview_mixed(&cfg, 5).unwrap(), observations);
    }

    #[test]
    fn parallel_and_sequential_runs_agree() {
        let cfg = Configuration::default();
        let plan = BatchPlan::default()
            .with(ObservationKind::Ok, 8)
            .with(ObservationKind::Anomaly(AnomalyKind::HardRun), 8);
        let options = BatchOptions::default().with_seed(99).with_plan(plan);
        let parallel = run_batch(&cfg, &options).unwrap();
        let sequential = run_batch(&cfg, &options.clone().sequential()).unwrap();
        assert_eq!(parallel.observations, sequential.observations);
        assert_eq!(parallel.failures.len(), sequential.failures.len());
    }

    #[test]
    fn failures_are_counted_apart_from_successes() {
        let mut cfg = steady_config();
        cfg.anomalies_type_1.width = 500.0;
        let result = run_batch(&cfg, &BatchOptions::default().with_seed(4)).unwrap();
        let summary = summarize_batch(&result);
        assert_eq!(summary.failed, 3);
        assert_eq!(summary.succeeded, 27);
        assert_eq!(summary.kinds["anomaly_type_01"].failed, 3);
        assert!(result.failures.iter().all(|f| f.error.is_sampling_degenerate()));
        assert_eq!(summary.failures.len(), 3);
    }

    #[test]
    fn cancelled_batch_starts_nothing() {
        let cfg = steady_config();
        let flag = Arc::new(AtomicBool::new(true));
        let options = BatchOptions::default().with_cancel(flag);
        let result = run_batch(&cfg, &options).unwrap();
        assert!(result.was_cancelled());
        assert!(result.observations.is_empty());
        assert_eq!(summarize_batch(&result).cancelled, 30);
    }

    #[test]
    fn invalid_configuration_aborts_the_batch() {
        let mut cfg = steady_config();
        cfg.filter.sg_window_length = 10;
        assert!(run_batch(&cfg, &BatchOptions::default())
            .unwrap_err()
            .is_configuration());
    }

    #[test]
    fn preview_is_reproducible() {
        let cfg = steady_config();
        let kind = ObservationKind::Anomaly(AnomalyKind::SoftRun);
        let a = preview(&cfg, kind, 3, 17).unwrap();
        let b = preview(&cfg, kind, 3, 17).unwrap();
        assert_eq!(a, b);
        assert!(a.iter().all(|obs| obs.kind() == kind));
    }
}
