//! Input/Output module
//!
//! CSV reading for the three input files:
//! - `csv_format` - Header requirements and raw-row conversion
//! - `sync_reader` - Streaming iterator reader
//! - `async_reader` - Batched csv-async reader

pub mod async_reader;
pub mod csv_format;
pub mod sync_reader;

pub use async_reader::AsyncReader;
pub use sync_reader::SyncReader;
