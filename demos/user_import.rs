//! Imports users from two sources at once, validates and transforms them,
//! and fans every chunk out to a CSV file and the log.
//!
//! Run with: `cargo run --example user_import --features "csv,logger"`

use std::{env::temp_dir, sync::Mutex};

use serde::{Deserialize, Serialize};

use batchline::{
    CsvItemReaderBuilder, CsvItemWriterBuilder,
    core::{
        item::{
            ItemOutcome, ItemProcessor, ItemProcessorResult, ItemReader, ItemReaderResult,
            ProcessorChainBuilder,
        },
        step::{Step, StepBuilder, StepExecution, StepStatus},
    },
    error::BatchError,
    item::{
        composite::{CompositeItemReaderBuilder, CompositeItemWriterBuilder},
        logger::LoggerWriter,
    },
};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct User {
    id: u64,
    name: String,
    email: String,
    active: bool,
}

/// Rejects users whose email has no '@'; handled by the skip budget.
struct EmailValidation;

impl ItemProcessor<User, User> for EmailValidation {
    fn process(&self, item: &User) -> ItemProcessorResult<User> {
        if !item.email.contains('@') {
            return Err(BatchError::Validation(format!(
                "invalid email: {}",
                item.email
            )));
        }
        Ok(ItemOutcome::Forward(item.clone()))
    }
}

struct NameTransform;

impl ItemProcessor<User, User> for NameTransform {
    fn process(&self, item: &User) -> ItemProcessorResult<User> {
        let mut user = item.clone();
        user.name = user.name.trim().to_uppercase();
        Ok(ItemOutcome::Forward(user))
    }
}

struct ActiveFilter;

impl ItemProcessor<User, User> for ActiveFilter {
    fn process(&self, item: &User) -> ItemProcessorResult<User> {
        if item.active {
            Ok(ItemOutcome::Forward(item.clone()))
        } else {
            Ok(ItemOutcome::Filtered)
        }
    }
}

/// Stand-in for a database cursor of active users.
struct ActiveUserTable {
    rows: Mutex<std::vec::IntoIter<User>>,
}

impl ItemReader<User> for ActiveUserTable {
    fn read(&self) -> ItemReaderResult<User> {
        Ok(self.rows.lock().unwrap().next())
    }
}

fn main() -> Result<(), BatchError> {
    env_logger::init();

    let csv = "id,name,email,active
1,john doe,john@mail.com,true
2,ana gomez,ana@mail.com,false
3,broken user,no-at-sign,true
4,lia wong,lia@mail.com,true";

    let csv_reader = CsvItemReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv.as_bytes());
    let db_reader = ActiveUserTable {
        rows: Mutex::new(
            vec![
                User {
                    id: 10,
                    name: "db user".to_string(),
                    email: "db@mail.com".to_string(),
                    active: true,
                },
            ]
            .into_iter(),
        ),
    };
    let reader = CompositeItemReaderBuilder::new()
        .delegate(&csv_reader)
        .delegate(&db_reader)
        .build();

    let validation = EmailValidation;
    let transform = NameTransform;
    let filter = ActiveFilter;
    let chain = ProcessorChainBuilder::new()
        .stage(&validation)
        .stage(&transform)
        .stage(&filter)
        .build()?;

    let file_writer = CsvItemWriterBuilder::new()
        .has_headers(true)
        .from_path(temp_dir().join("processed_users.csv"));
    let log_writer = LoggerWriter;
    let writer = CompositeItemWriterBuilder::new()
        .delegate(&file_writer)
        .delegate(&log_writer)
        .build();

    let step = StepBuilder::new("import-users")
        .chunk::<User, User>(5)
        .reader(&reader)
        .processor(&chain)
        .writer(&writer)
        .retry_limit(3)
        .skip_limit(5)
        .build()?;

    let mut execution = StepExecution::new("import-users");
    step.execute(&mut execution)?;

    assert_eq!(execution.status, StepStatus::Completed);
    assert_eq!(execution.read_count, 5);
    assert_eq!(execution.write_count, 3); // one skipped, one filtered
    assert_eq!(execution.skip_count, 1);
    assert_eq!(execution.filter_count, 1);

    println!(
        "imported {} users ({} skipped, {} filtered)",
        execution.write_count, execution.skip_count, execution.filter_count
    );

    Ok(())
}
