//! A flow with a conditional failure edge and a parallel branch: a
//! fault-tolerant ingest step guards the flow, then two load steps run
//! concurrently against different destinations.
//!
//! Run with: `cargo run --example conditional_flow --features "csv,json,logger"`

use std::env::temp_dir;

use serde::{Deserialize, Serialize};

use batchline::{
    CsvItemReaderBuilder, JsonItemWriterBuilder,
    core::{
        item::{ItemOutcome, ItemProcessor, ItemProcessorResult},
        job::{ExitPattern, Job, JobBuilder, Transition},
        listener::LogListener,
        step::{StepBuilder, StepStatus},
    },
    error::BatchError,
    item::logger::LoggerWriter,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Car {
    year: u16,
    make: String,
    model: String,
}

struct UpperCase;

impl ItemProcessor<Car, Car> for UpperCase {
    fn process(&self, item: &Car) -> ItemProcessorResult<Car> {
        let car = Car {
            year: item.year,
            make: item.make.to_uppercase(),
            model: item.model.to_uppercase(),
        };
        Ok(ItemOutcome::Forward(car))
    }
}

const CARS_CSV: &str = "year,make,model
1948,Porsche,356
1995,Peugeot,205
2021,Mazda,CX-30
1967,Ford,Mustang";

fn main() -> Result<(), BatchError> {
    env_logger::init();

    let ingest_reader = CsvItemReaderBuilder::new()
        .has_headers(true)
        .from_reader(CARS_CSV.as_bytes());
    let ingest_writer = JsonItemWriterBuilder::new().from_path(temp_dir().join("cars.json"));
    let upper_case = UpperCase;
    let ingest = StepBuilder::new("ingest-cars")
        .chunk::<Car, Car>(2)
        .reader(&ingest_reader)
        .processor(&upper_case)
        .writer(&ingest_writer)
        .retry_limit(1)
        .skip_limit(2)
        .build()?;

    let audit_reader = CsvItemReaderBuilder::new()
        .has_headers(true)
        .from_reader(CARS_CSV.as_bytes());
    let audit_writer = LoggerWriter;
    let audit = StepBuilder::new("audit-log")
        .chunk::<Car, Car>(2)
        .reader(&audit_reader)
        .writer(&audit_writer)
        .pass_through()
        .build()?;

    let archive_reader = CsvItemReaderBuilder::new()
        .has_headers(true)
        .from_reader(CARS_CSV.as_bytes());
    let archive_writer =
        JsonItemWriterBuilder::new().from_path(temp_dir().join("cars_archive.json"));
    let archive = StepBuilder::new("archive")
        .chunk::<Car, Car>(3)
        .reader(&archive_reader)
        .writer(&archive_writer)
        .pass_through()
        .workers(2)
        .build()?;

    let log_listener = LogListener;
    let job = JobBuilder::new()
        .name("car-flow")
        .start(&ingest)
        // a failed ingest terminates the job before the parallel branch
        .on(ExitPattern::Status(StepStatus::Failed), Transition::Fail)
        .split("load", vec![&audit, &archive])
        .listener(&log_listener)
        .build()?;

    let execution = job.run()?;

    println!(
        "job {} finished with status {:?} after {} steps",
        execution.name,
        execution.status,
        execution.step_executions.len()
    );

    Ok(())
}
