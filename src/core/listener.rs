use log::info;

use crate::{
    core::{job::JobExecution, step::StepExecution},
    error::BatchError,
};

/// Observation hooks around a job run.
///
/// Listeners receive execution snapshots and must not mutate engine state;
/// they exist for logging, metrics and monitoring.
pub trait JobListener: Send + Sync {
    fn before_job(&self, _execution: &JobExecution) {}
    fn after_job(&self, _execution: &JobExecution) {}
}

/// Observation hooks around a step execution and its chunk cycle.
///
/// The item-level hooks fire once per item, the chunk-level hooks once per
/// chunk write, and `on_error` once per failure occurrence (including
/// failures that end up retried or skipped). Every hook receives a snapshot
/// of the step's current counters.
pub trait StepListener: Send + Sync {
    fn before_step(&self, _execution: &StepExecution) {}
    fn after_step(&self, _execution: &StepExecution) {}
    fn before_read(&self, _execution: &StepExecution) {}
    fn after_read(&self, _execution: &StepExecution) {}
    fn before_process(&self, _execution: &StepExecution) {}
    fn after_process(&self, _execution: &StepExecution) {}
    fn before_chunk_write(&self, _execution: &StepExecution) {}
    fn after_chunk_write(&self, _execution: &StepExecution) {}
    fn on_error(&self, _execution: &StepExecution, _error: &BatchError) {}
}

/// Listener that logs step and job progress, including the per-category
/// fault counts aggregated on the execution.
#[derive(Default)]
pub struct LogListener;

impl JobListener for LogListener {
    fn before_job(&self, execution: &JobExecution) {
        info!("Job starting: {}", execution.name);
    }

    fn after_job(&self, execution: &JobExecution) {
        info!(
            "Job finished: {}, status: {:?}, steps: {}",
            execution.name,
            execution.status,
            execution.step_executions.len()
        );
    }
}

impl StepListener for LogListener {
    fn before_step(&self, execution: &StepExecution) {
        info!("Step starting: {}", execution.name);
    }

    fn after_step(&self, execution: &StepExecution) {
        info!(
            "Step finished: {}, status: {:?}, read: {}, written: {}, skipped: {}, faults: {}",
            execution.name,
            execution.status,
            execution.read_count,
            execution.write_count,
            execution.skip_count,
            execution.fault_counts.total()
        );
    }

    fn on_error(&self, execution: &StepExecution, error: &BatchError) {
        info!("Step {} fault: {}", execution.name, error);
    }
}
