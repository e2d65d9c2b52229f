use csv::{ReaderBuilder, StringRecordsIntoIter, Terminator, Trim};
use serde::de::DeserializeOwned;
use std::{fs::File, io::Read, path::Path, sync::Mutex};

use crate::{
    core::{
        item::{ItemReader, ItemReaderResult},
        lock,
    },
    error::BatchError,
};

/// A CSV item reader that deserializes rows into Rust structs with Serde.
///
/// The record iterator sits behind a `Mutex` so one reader instance can be
/// drained by several step workers: each `read` call advances the position
/// exactly once and no two callers observe the same row.
///
/// # Examples
///
/// ```
/// use batchline::item::csv::csv_reader::CsvItemReaderBuilder;
/// use batchline::core::item::ItemReader;
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// struct Record {
///     name: String,
///     value: i32,
/// }
///
/// let data = "\
/// name,value
/// foo,123
/// bar,456
/// ";
///
/// let reader = CsvItemReaderBuilder::new()
///     .has_headers(true)
///     .from_reader(data.as_bytes());
///
/// let record: Record = reader.read().unwrap().unwrap();
/// assert_eq!(record.name, "foo");
/// assert_eq!(record.value, 123);
///
/// let record: Record = reader.read().unwrap().unwrap();
/// assert_eq!(record.name, "bar");
///
/// assert!(ItemReader::<Record>::read(&reader).unwrap().is_none());
/// ```
pub struct CsvItemReader<R> {
    records: Mutex<StringRecordsIntoIter<R>>,
}

impl<R: Read + Send, T: DeserializeOwned> ItemReader<T> for CsvItemReader<R> {
    /// Reads and deserializes the next row.
    ///
    /// # Returns
    /// - `Ok(Some(record))` if a row was read and deserialized
    /// - `Ok(None)` once the input is exhausted
    /// - `Err(BatchError::ItemReader)` on a parse or deserialization error;
    ///   the step treats this as a fatal source failure
    fn read(&self) -> ItemReaderResult<T> {
        match lock(&self.records).next() {
            Some(Ok(string_record)) => match string_record.deserialize(None) {
                Ok(record) => Ok(Some(record)),
                Err(error) => Err(BatchError::ItemReader(error.to_string())),
            },
            Some(Err(error)) => Err(BatchError::ItemReader(error.to_string())),
            None => Ok(None),
        }
    }
}

/// Builder for [`CsvItemReader`].
///
/// Defaults: comma delimiter, CRLF terminator, no headers, all fields
/// trimmed, strict (non-flexible) parsing.
#[derive(Default)]
pub struct CsvItemReaderBuilder {
    delimiter: u8,
    terminator: Terminator,
    has_headers: bool,
}

impl CsvItemReaderBuilder {
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            terminator: Terminator::CRLF,
            has_headers: false,
        }
    }

    /// Sets the field delimiter, for example `b';'` or `b'\t'`.
    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Sets the line terminator, for example `Terminator::Any(b'\n')`.
    pub fn terminator(mut self, terminator: Terminator) -> Self {
        self.terminator = terminator;
        self
    }

    /// When enabled, the first row is treated as headers and matched to
    /// struct field names during deserialization.
    pub fn has_headers(mut self, yes: bool) -> Self {
        self.has_headers = yes;
        self
    }

    /// Creates a `CsvItemReader` from any `Read` source.
    pub fn from_reader<R: Read>(self, rdr: R) -> CsvItemReader<R> {
        let rdr = ReaderBuilder::new()
            .trim(Trim::All)
            .delimiter(self.delimiter)
            .terminator(self.terminator)
            .has_headers(self.has_headers)
            .flexible(false)
            .from_reader(rdr);

        CsvItemReader {
            records: Mutex::new(rdr.into_records()),
        }
    }

    /// Creates a `CsvItemReader` from a file path.
    ///
    /// # Panics
    /// Panics if the file cannot be opened; failing fast is appropriate for
    /// an initialization step. Row-level errors are returned by `read`.
    pub fn from_path<P: AsRef<Path>>(self, path: P) -> CsvItemReader<File> {
        let rdr = ReaderBuilder::new()
            .trim(Trim::All)
            .delimiter(self.delimiter)
            .terminator(self.terminator)
            .has_headers(self.has_headers)
            .flexible(false)
            .from_path(path);

        CsvItemReader {
            records: Mutex::new(rdr.unwrap().into_records()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::core::item::ItemReader;

    #[derive(Debug, Deserialize, PartialEq)]
    struct City {
        city: String,
        country: String,
        pop: u64,
    }

    #[test]
    fn rows_are_deserialized_in_order() {
        let data = "city,country,pop
        Boston,United States,4628910
        Concord,United States,42695";

        let reader = CsvItemReaderBuilder::new()
            .has_headers(true)
            .delimiter(b',')
            .from_reader(data.as_bytes());

        let first: City = reader.read().unwrap().unwrap();
        assert_eq!(
            first,
            City {
                city: "Boston".to_string(),
                country: "United States".to_string(),
                pop: 4628910,
            }
        );

        let second: City = reader.read().unwrap().unwrap();
        assert_eq!(second.city, "Concord");

        assert!(ItemReader::<City>::read(&reader).unwrap().is_none());
    }

    #[test]
    fn malformed_row_is_a_reader_error() {
        let data = "city,country,pop
        Boston,United States,not-a-number";

        let reader = CsvItemReaderBuilder::new()
            .has_headers(true)
            .from_reader(data.as_bytes());

        let result: ItemReaderResult<City> = reader.read();

        assert!(matches!(result, Err(BatchError::ItemReader(_))));
    }
}
