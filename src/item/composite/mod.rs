pub mod composite_reader;
pub mod composite_writer;

pub use composite_reader::{CompositeItemReader, CompositeItemReaderBuilder};
pub use composite_writer::{CompositeItemWriter, CompositeItemWriterBuilder};
