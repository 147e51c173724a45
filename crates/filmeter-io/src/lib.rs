//! filmeter-io: Filesystem collaborators for filmeter.
//!
//! Reads objects stored as CSV pixel lists, iterates a directory of
//! them lazily, and writes the tab-separated results file. All
//! measurement logic lives in `filmeter-pipeline`.

pub mod batch;
pub mod load;
pub mod results;

pub use batch::{BatchCursor, BatchOptions, FailureKind, ObjectFailure, object_files};
pub use load::{LoadError, ObjectFiles};
pub use results::{ResultsError, ResultsWriter, results_path};
