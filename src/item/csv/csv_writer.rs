use std::{
    fs::File,
    io::{self, Write},
    path::Path,
    result,
    sync::Mutex,
};

use csv::{Writer, WriterBuilder};
use serde::Serialize;

use crate::{
    core::{item::ItemWriter, lock},
    error::BatchError,
};

/// A CSV item writer that serializes structs with Serde, one row per item.
///
/// Rows of a chunk are serialized in order and the underlying writer is
/// flushed at the end of every `write` call, so a committed chunk is
/// durable before the engine moves on.
pub struct CsvItemWriter<W: Write> {
    wrapper: Mutex<Writer<W>>,
}

impl<W: Write + Send, T: Serialize> ItemWriter<T> for CsvItemWriter<W> {
    fn write(&self, items: &[T]) -> Result<(), BatchError> {
        let mut writer = lock(&self.wrapper);
        for item in items {
            writer
                .serialize(item)
                .map_err(|error| BatchError::ItemWriter(error.to_string()))?;
        }
        writer
            .flush()
            .map_err(|error| BatchError::ItemWriter(error.to_string()))
    }
}

impl<W: Write> CsvItemWriter<W> {
    /// Unwraps the underlying writer, flushing it first. Mostly useful in
    /// tests against an in-memory buffer.
    pub fn into_inner(self) -> result::Result<W, BatchError> {
        let writer = self
            .wrapper
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        writer
            .into_inner()
            .map_err(|error| BatchError::ItemWriter(error.to_string()))
    }
}

/// Builder for [`CsvItemWriter`].
///
/// # Examples
///
/// ```
/// # use std::error::Error;
/// # use batchline::{item::csv::csv_writer::CsvItemWriterBuilder, core::item::ItemWriter};
/// #[derive(serde::Serialize)]
/// struct Row<'a> {
///     city: &'a str,
///     country: &'a str,
///     #[serde(rename = "popcount")]
///     population: u64,
/// }
///
/// # fn main() { example().unwrap(); }
/// fn example() -> Result<(), Box<dyn Error>> {
///     let wtr = CsvItemWriterBuilder::new()
///         .has_headers(true)
///         .from_writer(vec![]);
///
///     wtr.write(&[
///         Row {
///             city: "Boston",
///             country: "United States",
///             population: 4628910,
///         },
///         Row {
///             city: "Concord",
///             country: "United States",
///             population: 42695,
///         },
///     ])?;
///
///     let data = String::from_utf8(wtr.into_inner()?)?;
///     assert_eq!(data, "\
/// city,country,popcount
/// Boston,United States,4628910
/// Concord,United States,42695
/// ");
///     Ok(())
/// }
/// ```
#[derive(Default)]
pub struct CsvItemWriterBuilder {
    delimiter: u8,
    has_headers: bool,
}

impl CsvItemWriterBuilder {
    pub fn new() -> CsvItemWriterBuilder {
        CsvItemWriterBuilder {
            delimiter: b',',
            has_headers: false,
        }
    }

    pub fn delimiter(mut self, delimiter: u8) -> CsvItemWriterBuilder {
        self.delimiter = delimiter;
        self
    }

    /// When enabled, a header row derived from the struct fields is written
    /// before the first record.
    pub fn has_headers(mut self, yes: bool) -> CsvItemWriterBuilder {
        self.has_headers = yes;
        self
    }

    /// Creates a `CsvItemWriter` writing to a file path.
    ///
    /// # Panics
    /// Panics if the file cannot be created; failing fast is appropriate
    /// for an initialization step.
    pub fn from_path<P: AsRef<Path>>(self, path: P) -> CsvItemWriter<File> {
        let wtr = WriterBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(self.has_headers)
            .from_path(path);

        CsvItemWriter {
            wrapper: Mutex::new(wtr.unwrap()),
        }
    }

    /// Creates a `CsvItemWriter` writing to any `Write` destination.
    pub fn from_writer<W: io::Write>(self, wtr: W) -> CsvItemWriter<W> {
        let wtr = WriterBuilder::new()
            .flexible(false)
            .delimiter(self.delimiter)
            .has_headers(self.has_headers)
            .from_writer(wtr);

        CsvItemWriter {
            wrapper: Mutex::new(wtr),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;
    use crate::core::item::ItemWriter;

    #[derive(serde::Serialize)]
    struct Row<'a> {
        city: &'a str,
        country: &'a str,
        #[serde(rename = "popcount")]
        population: u64,
    }

    #[test]
    fn chunk_rows_are_serialized_with_headers() -> Result<(), Box<dyn Error>> {
        let wtr = CsvItemWriterBuilder::new()
            .has_headers(true)
            .from_writer(vec![]);

        wtr.write(&[
            Row {
                city: "Boston",
                country: "United States",
                population: 4628910,
            },
            Row {
                city: "Concord",
                country: "United States",
                population: 42695,
            },
        ])?;

        let data = String::from_utf8(wtr.into_inner()?)?;
        assert_eq!(
            data,
            "city,country,popcount
Boston,United States,4628910
Concord,United States,42695
"
        );

        Ok(())
    }

    #[test]
    fn empty_chunk_is_a_no_op_commit() -> Result<(), Box<dyn Error>> {
        let wtr = CsvItemWriterBuilder::new()
            .has_headers(true)
            .from_writer(vec![]);

        wtr.write(&Vec::<Row>::new())?;

        let data = String::from_utf8(wtr.into_inner()?)?;
        assert_eq!(data, "");

        Ok(())
    }
}
