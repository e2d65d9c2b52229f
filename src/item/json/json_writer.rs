use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    sync::Mutex,
};

use serde::Serialize;

use crate::{
    core::{item::ItemWriter, lock},
    error::BatchError,
};

struct JsonStream<W> {
    out: W,
    first_item: bool,
}

/// A JSON item writer producing one array-framed document.
///
/// `open` writes the opening bracket, every `write` call appends the
/// chunk's items comma-separated and flushes, and `close` writes the
/// closing bracket. The output is durable per committed chunk.
pub struct JsonItemWriter<W> {
    stream: Mutex<JsonStream<W>>,
    pretty: bool,
}

impl<W: Write + Send, T: Serialize> ItemWriter<T> for JsonItemWriter<W> {
    fn open(&self) -> Result<(), BatchError> {
        let mut stream = lock(&self.stream);
        stream
            .out
            .write_all(b"[")
            .map_err(|error| BatchError::ItemWriter(error.to_string()))
    }

    fn write(&self, items: &[T]) -> Result<(), BatchError> {
        let mut stream = lock(&self.stream);
        for item in items {
            let json = if self.pretty {
                serde_json::to_vec_pretty(item)
            } else {
                serde_json::to_vec(item)
            }
            .map_err(|error| BatchError::ItemWriter(error.to_string()))?;

            if stream.first_item {
                stream.first_item = false;
            } else {
                stream
                    .out
                    .write_all(b",")
                    .map_err(|error| BatchError::ItemWriter(error.to_string()))?;
            }
            stream
                .out
                .write_all(&json)
                .map_err(|error| BatchError::ItemWriter(error.to_string()))?;
        }
        stream
            .out
            .flush()
            .map_err(|error| BatchError::ItemWriter(error.to_string()))
    }

    fn close(&self) -> Result<(), BatchError> {
        let mut stream = lock(&self.stream);
        stream
            .out
            .write_all(b"]\n")
            .and_then(|()| stream.out.flush())
            .map_err(|error| BatchError::ItemWriter(error.to_string()))
    }
}

impl<W: Write> JsonItemWriter<W> {
    /// Unwraps the underlying writer. Mostly useful in tests against an
    /// in-memory buffer.
    pub fn into_inner(self) -> W {
        let stream = self
            .stream
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        stream.out
    }
}

/// Builder for [`JsonItemWriter`].
#[derive(Default)]
pub struct JsonItemWriterBuilder {
    pretty: bool,
}

impl JsonItemWriterBuilder {
    pub fn new() -> JsonItemWriterBuilder {
        JsonItemWriterBuilder { pretty: false }
    }

    /// Serializes records with the pretty formatter.
    pub fn pretty(mut self, yes: bool) -> JsonItemWriterBuilder {
        self.pretty = yes;
        self
    }

    /// Creates a `JsonItemWriter` writing to a file path.
    ///
    /// # Panics
    /// Panics if the file cannot be created; failing fast is appropriate
    /// for an initialization step.
    pub fn from_path<P: AsRef<Path>>(self, path: P) -> JsonItemWriter<BufWriter<File>> {
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .expect("Unable to open file");

        JsonItemWriter {
            stream: Mutex::new(JsonStream {
                out: BufWriter::new(file),
                first_item: true,
            }),
            pretty: self.pretty,
        }
    }

    /// Creates a `JsonItemWriter` writing to any `Write` destination.
    pub fn from_writer<W: Write>(self, wtr: W) -> JsonItemWriter<W> {
        JsonItemWriter {
            stream: Mutex::new(JsonStream {
                out: wtr,
                first_item: true,
            }),
            pretty: self.pretty,
        }
    }
}
