use std::{fs::File, io::Read, path::Path, sync::Mutex};

use log::debug;
use serde::de::DeserializeOwned;

use crate::{
    core::{
        item::{ItemReader, ItemReaderResult},
        lock,
    },
    error::BatchError,
};

/// State of the source: the input is parsed on the first read and the
/// records are served from the buffered iterator afterwards.
enum JsonSource<R, T> {
    Pending(Option<R>),
    Ready(std::vec::IntoIter<T>),
}

/// A JSON item reader over an array-framed document (`[{...},{...}]`).
///
/// The whole array is deserialized on the first `read` call; a parse error
/// therefore surfaces as a reader error on that call, which the step treats
/// as a fatal source failure.
pub struct JsonItemReader<R, T> {
    source: Mutex<JsonSource<R, T>>,
}

impl<R: Read + Send, T: DeserializeOwned + Send> ItemReader<T> for JsonItemReader<R, T> {
    fn read(&self) -> ItemReaderResult<T> {
        let mut source = lock(&self.source);
        let next = match &mut *source {
            JsonSource::Ready(records) => records.next(),
            JsonSource::Pending(input) => {
                let input = input.take().ok_or_else(|| {
                    BatchError::ItemReader("json input already consumed".to_string())
                })?;
                let records: Vec<T> = serde_json::from_reader(input)
                    .map_err(|error| BatchError::ItemReader(error.to_string()))?;
                debug!("Buffered {} json records", records.len());
                let mut records = records.into_iter();
                let first = records.next();
                *source = JsonSource::Ready(records);
                first
            }
        };
        Ok(next)
    }
}

/// Builder for [`JsonItemReader`].
#[derive(Default)]
pub struct JsonItemReaderBuilder;

impl JsonItemReaderBuilder {
    pub fn new() -> JsonItemReaderBuilder {
        JsonItemReaderBuilder
    }

    /// Creates a `JsonItemReader` from any `Read` source.
    pub fn from_reader<R: Read, T>(self, rdr: R) -> JsonItemReader<R, T> {
        JsonItemReader {
            source: Mutex::new(JsonSource::Pending(Some(rdr))),
        }
    }

    /// Creates a `JsonItemReader` from a file path.
    ///
    /// # Panics
    /// Panics if the file cannot be opened; failing fast is appropriate for
    /// an initialization step. Parse errors are returned by `read`.
    pub fn from_path<P: AsRef<Path>, T>(self, path: P) -> JsonItemReader<File, T> {
        let file = File::open(path).expect("Unable to open file");
        JsonItemReader {
            source: Mutex::new(JsonSource::Pending(Some(file))),
        }
    }
}
