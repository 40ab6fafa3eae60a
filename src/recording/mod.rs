//! Recording files: live CSV persistence, reading recordings back and the
//! per-patient folder catalog.

pub mod writer;
pub mod reader;
pub mod catalog;

pub use catalog::{RecordEntry, RecordingCatalog, RecordingPaths};
pub use reader::read_series;
pub use writer::{run_persistence_handler, CsvSampleWriter, SampleSink};
