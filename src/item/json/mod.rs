pub mod json_reader;
pub mod json_writer;
