mod common;

use std::sync::Mutex;

use anyhow::Result;

use batchline::{
    core::{
        job::{ExitPattern, Job, JobBuilder, JobExecution, JobStatus, Transition},
        listener::{JobListener, LogListener, StepListener},
        step::{Step, StepBuilder, StepExecution, StepStatus},
    },
    error::BatchError,
};

use common::{EmailValidationProcessor, MemoryWriter, User, VecItemReader};

#[derive(Default)]
struct CaptureListener {
    last: Mutex<Option<JobExecution>>,
}

impl JobListener for CaptureListener {
    fn after_job(&self, execution: &JobExecution) {
        *self.last.lock().unwrap() = Some(execution.clone());
    }
}

fn valid_users(start_id: u64, count: u64) -> Vec<User> {
    (start_id..start_id + count)
        .map(|id| User::new(id, &format!("user {}", id), &format!("u{}@mail.com", id), true))
        .collect()
}

#[test]
fn sequential_flow_runs_every_step_against_its_own_sink() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let ingest_reader = VecItemReader::new(valid_users(1, 5));
    let ingest_writer = MemoryWriter::new();
    let validator = EmailValidationProcessor;
    let ingest = StepBuilder::new("ingest")
        .chunk::<User, User>(2)
        .reader(&ingest_reader)
        .processor(&validator)
        .writer(&ingest_writer)
        .build()?;

    let report_reader = VecItemReader::new(valid_users(100, 3));
    let report_writer = MemoryWriter::new();
    let report = StepBuilder::new("report")
        .chunk::<User, User>(2)
        .reader(&report_reader)
        .writer(&report_writer)
        .pass_through()
        .build()?;

    let capture = CaptureListener::default();
    let log_listener = LogListener;
    let job = JobBuilder::new()
        .name("nightly-users")
        .start(&ingest)
        .next(&report)
        .listener(&capture)
        .listener(&log_listener)
        .build()?;

    let execution = job.run()?;

    assert_eq!(execution.status, JobStatus::Completed);
    assert_eq!(execution.step_executions.len(), 2);
    assert_eq!(ingest_writer.items().len(), 5);
    assert_eq!(report_writer.items().len(), 3);

    let captured = capture.last.lock().unwrap().clone().unwrap();
    assert_eq!(captured.status, JobStatus::Completed);

    Ok(())
}

#[test]
fn failed_first_step_short_circuits_the_parallel_branch() -> Result<()> {
    // every item fails validation and the budget is zero
    let broken_users = vec![
        User::new(1, "broken", "no-at-sign", true),
        User::new(2, "also broken", "still-wrong", true),
    ];
    let ingest_reader = VecItemReader::new(broken_users);
    let ingest_writer = MemoryWriter::new();
    let validator = EmailValidationProcessor;
    let ingest = StepBuilder::new("ingest")
        .chunk::<User, User>(2)
        .reader(&ingest_reader)
        .processor(&validator)
        .writer(&ingest_writer)
        .build()?;

    let left_reader = VecItemReader::new(valid_users(10, 2));
    let left_writer = MemoryWriter::new();
    let left = StepBuilder::new("load-left")
        .chunk::<User, User>(2)
        .reader(&left_reader)
        .writer(&left_writer)
        .pass_through()
        .build()?;

    let right_reader = VecItemReader::new(valid_users(20, 2));
    let right_writer = MemoryWriter::new();
    let right = StepBuilder::new("load-right")
        .chunk::<User, User>(2)
        .reader(&right_reader)
        .writer(&right_writer)
        .pass_through()
        .build()?;

    let capture = CaptureListener::default();
    let job = JobBuilder::new()
        .name("advanced")
        .start(&ingest)
        .on(ExitPattern::Status(StepStatus::Failed), Transition::Fail)
        .split("load", vec![&left, &right])
        .listener(&capture)
        .build()?;

    let result = job.run();

    assert!(result.is_err());
    // the fail edge stopped the flow before the split
    assert!(left_writer.items().is_empty());
    assert!(right_writer.items().is_empty());

    let captured = capture.last.lock().unwrap().clone().unwrap();
    assert_eq!(captured.status, JobStatus::Failed);
    assert_eq!(captured.step_executions.len(), 1);
    assert_eq!(captured.step_executions[0].status, StepStatus::Failed);

    Ok(())
}

#[test]
fn parallel_branch_loads_both_destinations() -> Result<()> {
    let ingest_reader = VecItemReader::new(valid_users(1, 3));
    let ingest_writer = MemoryWriter::new();
    let validator = EmailValidationProcessor;
    let ingest = StepBuilder::new("ingest")
        .chunk::<User, User>(5)
        .reader(&ingest_reader)
        .processor(&validator)
        .writer(&ingest_writer)
        .build()?;

    let left_reader = VecItemReader::new(valid_users(10, 4));
    let left_writer = MemoryWriter::new();
    let left = StepBuilder::new("load-left")
        .chunk::<User, User>(2)
        .reader(&left_reader)
        .writer(&left_writer)
        .pass_through()
        .workers(2)
        .build()?;

    let right_reader = VecItemReader::new(valid_users(20, 4));
    let right_writer = MemoryWriter::new();
    let right = StepBuilder::new("load-right")
        .chunk::<User, User>(2)
        .reader(&right_reader)
        .writer(&right_writer)
        .pass_through()
        .workers(2)
        .build()?;

    let job = JobBuilder::new()
        .name("advanced")
        .start(&ingest)
        .on(ExitPattern::Status(StepStatus::Failed), Transition::Fail)
        .split("load", vec![&left, &right])
        .build()?;

    let execution = job.run()?;

    assert_eq!(execution.status, JobStatus::Completed);
    assert_eq!(execution.step_executions.len(), 3);
    assert_eq!(left_writer.items().len(), 4);
    assert_eq!(right_writer.items().len(), 4);

    Ok(())
}

/// Step listener capturing each error the engine reports.
#[derive(Default)]
struct ErrorTally {
    errors: Mutex<Vec<String>>,
}

impl StepListener for ErrorTally {
    fn on_error(&self, _execution: &StepExecution, error: &BatchError) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}

#[test]
fn listeners_observe_each_failure_occurrence() -> Result<()> {
    let users = vec![
        User::new(1, "ok", "ok@mail.com", true),
        User::new(2, "broken", "no-at-sign", true),
    ];
    let reader = VecItemReader::new(users);
    let writer = MemoryWriter::new();
    let validator = EmailValidationProcessor;
    let tally = ErrorTally::default();

    let step = StepBuilder::new("observed")
        .chunk::<User, User>(2)
        .reader(&reader)
        .processor(&validator)
        .writer(&writer)
        .retry_limit(1)
        .skip_limit(1)
        .listener(&tally)
        .build()?;

    let mut execution = StepExecution::new("observed");
    step.execute(&mut execution)?;

    assert_eq!(execution.skip_count, 1);
    // initial failure plus one retry failure
    assert_eq!(tally.errors.lock().unwrap().len(), 2);

    Ok(())
}
