use std::sync::Mutex;

use log::debug;

use crate::{
    core::{
        item::{ItemReader, ItemReaderResult},
        lock,
    },
    error::BatchError,
};

/// Position of the composite over its delegates.
struct Cursor {
    index: usize,
    opened: bool,
}

/// Multiplexes several readers into one logical stream.
///
/// Delegates are drained strictly in order: the first source is fully
/// exhausted before the second is touched, and nothing is buffered beyond
/// what one source's drain requires. A delegate is opened immediately
/// before its first read and closed immediately after its last, so earlier
/// sources are released even when a later source fails to open. Once every
/// delegate is drained the composite reports end of stream permanently.
///
/// A failing delegate open or read surfaces as a reader error; a sub-source
/// is never silently dropped.
pub struct CompositeItemReader<'a, I> {
    delegates: Vec<&'a dyn ItemReader<I>>,
    cursor: Mutex<Cursor>,
}

impl<I> ItemReader<I> for CompositeItemReader<'_, I> {
    fn read(&self) -> ItemReaderResult<I> {
        let mut cursor = lock(&self.cursor);
        loop {
            let Some(delegate) = self.delegates.get(cursor.index) else {
                return Ok(None);
            };

            if !cursor.opened {
                delegate.open()?;
                cursor.opened = true;
                debug!("Composite reader opened source {}", cursor.index);
            }

            match delegate.read()? {
                Some(item) => return Ok(Some(item)),
                None => {
                    delegate.close()?;
                    cursor.opened = false;
                    cursor.index += 1;
                    debug!("Composite reader advanced to source {}", cursor.index);
                }
            }
        }
    }

    /// Releases the delegate left open by an aborted drain; delegates that
    /// already finished were closed right after their last read.
    fn close(&self) -> Result<(), BatchError> {
        let mut cursor = lock(&self.cursor);
        if cursor.opened {
            if let Some(delegate) = self.delegates.get(cursor.index) {
                delegate.close()?;
            }
            cursor.opened = false;
        }
        Ok(())
    }
}

/// Builder for [`CompositeItemReader`]. Sources drain in the order they are
/// added.
#[derive(Default)]
pub struct CompositeItemReaderBuilder<'a, I> {
    delegates: Vec<&'a dyn ItemReader<I>>,
}

impl<'a, I> CompositeItemReaderBuilder<'a, I> {
    pub fn new() -> CompositeItemReaderBuilder<'a, I> {
        CompositeItemReaderBuilder {
            delegates: Vec::new(),
        }
    }

    pub fn delegate(mut self, reader: &'a dyn ItemReader<I>) -> CompositeItemReaderBuilder<'a, I> {
        self.delegates.push(reader);
        self
    }

    pub fn build(self) -> CompositeItemReader<'a, I> {
        CompositeItemReader {
            delegates: self.delegates,
            cursor: Mutex::new(Cursor {
                index: 0,
                opened: false,
            }),
        }
    }
}
