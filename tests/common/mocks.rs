//! Mock writer for fault-injection tests.
use mockall::mock;

use batchline::{core::item::ItemWriter, error::BatchError};

mock! {
    pub ChunkWriter {}
    impl ItemWriter<String> for ChunkWriter {
        fn open(&self) -> Result<(), BatchError>;
        fn write(&self, items: &[String]) -> Result<(), BatchError>;
        fn close(&self) -> Result<(), BatchError>;
    }
}
