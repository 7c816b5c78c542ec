//! Collection index over GRIB2 files.
//!
//! Scanning a file yields one [`FileIndex`]: the metadata sections of every
//! record, the byte spans of their bitmap and data sections, and a table of
//! grid definitions keyed by [`GdsHash`]. A [`CollectionIndex`] merges file
//! indexes into one grid definition arena.
//!
//! [`Indexer`] keeps a JSON sidecar next to the collection and rescans only
//! files whose length or modification time changed. [`DataReader`] unpacks
//! indexed records without rescanning.

pub mod builder;
pub mod error;
pub mod hash;
pub mod indexer;
pub mod model;
pub mod persist;
pub mod reader;

pub use builder::{build_index, index_file};
pub use error::{IndexError, Result};
pub use hash::GdsHash;
pub use indexer::{IndexOptions, Indexer};
pub use model::{CollectionIndex, FileIndex, FileStats, IndexedRecord, SourceFile};
pub use reader::DataReader;
