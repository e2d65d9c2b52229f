#![cfg_attr(docsrs, feature(doc_cfg))]

/*!
 # Batchline

 A chunk-oriented batch engine: items are pulled from a reader, run through
 a processing chain, buffered into bounded-size chunks and committed to a
 writer one chunk at a time, with configurable fault tolerance (retry and
 skip budgets) and chunk-level parallelism.

 ## Core Concepts

 - **Job:** the entire batch process, a flow of steps with conditional and
   parallel edges and one aggregate terminal status.
 - **Step:** an independent phase of a job; a chunk-oriented step runs one
   read/process/write cycle to completion or failure.
 - **ItemReader:** retrieval of input, one item at a time, until the source
   reports end of stream.
 - **ItemProcessor:** business logic applied to one item; an item can be
   transformed, filtered out, or failed.
 - **ItemWriter:** output of a step, one chunk of items at a time,
   committed atomically.
 - **FaultPolicy:** classifies a failure as retryable, skippable or fatal
   under per-step budgets.

 ## Features

 | **Feature** | **Description**                                          |
 |-------------|----------------------------------------------------------|
 | csv         | Enables the CSV `ItemReader` and `ItemWriter`            |
 | json        | Enables the JSON `ItemReader` and `ItemWriter`           |
 | logger      | Enables a log-backed `ItemWriter`, useful for debugging  |
 | full        | Enables all of the above                                 |

 ## Getting Started

```
use std::sync::Mutex;

use batchline::{
    core::{
        item::{
            ItemOutcome, ItemProcessor, ItemProcessorResult, ItemReader, ItemReaderResult,
            ItemWriter,
        },
        step::{Step, StepBuilder, StepExecution, StepStatus},
    },
    error::BatchError,
};

struct NumberReader {
    numbers: Mutex<std::vec::IntoIter<i64>>,
}

impl ItemReader<i64> for NumberReader {
    fn read(&self) -> ItemReaderResult<i64> {
        Ok(self.numbers.lock().unwrap().next())
    }
}

struct Doubler;

impl ItemProcessor<i64, i64> for Doubler {
    fn process(&self, item: &i64) -> ItemProcessorResult<i64> {
        Ok(ItemOutcome::Forward(item * 2))
    }
}

#[derive(Default)]
struct SinkWriter {
    written: Mutex<Vec<i64>>,
}

impl ItemWriter<i64> for SinkWriter {
    fn write(&self, items: &[i64]) -> Result<(), BatchError> {
        self.written.lock().unwrap().extend_from_slice(items);
        Ok(())
    }
}

fn main() -> Result<(), BatchError> {
    let reader = NumberReader {
        numbers: Mutex::new(vec![1, 2, 3, 4, 5].into_iter()),
    };
    let processor = Doubler;
    let writer = SinkWriter::default();

    let step = StepBuilder::new("double-numbers")
        .chunk::<i64, i64>(2) // commit interval
        .reader(&reader)
        .processor(&processor)
        .writer(&writer)
        .build()?;

    let mut execution = StepExecution::new("double-numbers");
    step.execute(&mut execution)?;

    assert_eq!(execution.status, StepStatus::Completed);
    assert_eq!(execution.read_count, 5);
    assert_eq!(execution.write_count, 5);
    assert_eq!(*writer.written.lock().unwrap(), vec![2, 4, 6, 8, 10]);

    Ok(())
}
```
 */

/// Core module for batch operations
pub mod core;

/// Error types for batch operations
pub mod error;

#[doc(inline)]
pub use error::*;

/// Set of item readers / writers (for example: csv reader and writer)
pub mod item;

#[cfg(feature = "csv")]
pub use item::csv::{csv_reader::CsvItemReaderBuilder, csv_writer::CsvItemWriterBuilder};

#[cfg(feature = "json")]
pub use item::json::{json_reader::JsonItemReaderBuilder, json_writer::JsonItemWriterBuilder};
