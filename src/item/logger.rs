use std::fmt::Debug;

use log::info;

use crate::{BatchError, core::item::ItemWriter};

/// Writer that logs every item of a chunk, useful for debugging pipelines
/// without a real destination.
#[derive(Default)]
pub struct LoggerWriter;

impl<T> ItemWriter<T> for LoggerWriter
where
    T: Debug,
{
    fn write(&self, items: &[T]) -> Result<(), BatchError> {
        for item in items {
            info!("Record:{:?}", item);
        }
        Ok(())
    }
}
