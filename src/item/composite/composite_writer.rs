use log::warn;

use crate::{core::item::ItemWriter, error::BatchError};

/// Fans one chunk out to several destinations.
///
/// The composite owns a fixed ordered set of delegates. A chunk is only
/// considered durably written after every delegate has acknowledged it:
/// `write` forwards the chunk to the delegates in order and reports the
/// first failure, aborting the whole chunk. The engine may then re-issue
/// the chunk to all delegates under its retry budget.
pub struct CompositeItemWriter<'a, O> {
    delegates: Vec<&'a dyn ItemWriter<O>>,
}

impl<O> ItemWriter<O> for CompositeItemWriter<'_, O> {
    fn open(&self) -> Result<(), BatchError> {
        for delegate in &self.delegates {
            delegate.open()?;
        }
        Ok(())
    }

    fn write(&self, items: &[O]) -> Result<(), BatchError> {
        for delegate in &self.delegates {
            delegate.write(items)?;
        }
        Ok(())
    }

    /// Attempts to close every delegate, reporting the first failure only
    /// after the others had their chance to release resources.
    fn close(&self) -> Result<(), BatchError> {
        let mut first_error = None;
        for delegate in &self.delegates {
            if let Err(close_error) = delegate.close() {
                warn!("Error closing delegate writer: {}", close_error);
                first_error.get_or_insert(close_error);
            }
        }
        match first_error {
            None => Ok(()),
            Some(close_error) => Err(close_error),
        }
    }
}

/// Builder for [`CompositeItemWriter`]. Delegates receive every chunk in
/// the order they are added.
#[derive(Default)]
pub struct CompositeItemWriterBuilder<'a, O> {
    delegates: Vec<&'a dyn ItemWriter<O>>,
}

impl<'a, O> CompositeItemWriterBuilder<'a, O> {
    pub fn new() -> CompositeItemWriterBuilder<'a, O> {
        CompositeItemWriterBuilder {
            delegates: Vec::new(),
        }
    }

    pub fn delegate(mut self, writer: &'a dyn ItemWriter<O>) -> CompositeItemWriterBuilder<'a, O> {
        self.delegates.push(writer);
        self
    }

    pub fn build(self) -> CompositeItemWriter<'a, O> {
        CompositeItemWriter {
            delegates: self.delegates,
        }
    }
}
