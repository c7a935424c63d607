//! # Coverage store
//!
//! A single-file container holding one group per reference sequence. Every group carries the
//! same members:
//!
//! | member            | kind  | contents                                   |
//! |-------------------|-------|--------------------------------------------|
//! | `FullName`        | text  | the sequence name                          |
//! | `Length`          | int32 | number of bases                            |
//! | `UniqueReadCount` | int32 | primary alignments on the sequence         |
//! | `BaseDepth`       | array | per-base depth                             |
//! | `ClipEndCount`    | array | soft-clipped bases ending at each position |
//!
//! Arrays are split into fixed-size chunks, each compressed with zlib, so a reader only
//! inflates the chunks a range touches.
//!
//! ```no_run
//! use covmat_core::consts::BASE_DEPTH;
//! use covmat_store::CoverageReader;
//!
//! let mut reader = CoverageReader::open_path("sample.cvmx").unwrap();
//! reader.select_sequence("chr1").unwrap();
//! reader.select_array(BASE_DEPTH).unwrap();
//!
//! let mut window = vec![0u32; 100];
//! reader.read_range(1_000, &mut window).unwrap();
//! ```
//!
pub mod format;
pub mod reader;
pub mod writer;

pub mod consts {
    pub const MAGIC: &[u8; 4] = b"CVMX";
    pub const FORMAT_VERSION: u16 = 1;
    /// Maximum number of elements per compressed chunk.
    pub const CHUNK_SIZE: usize = 65536;
    pub const COMPRESSION_LEVEL: u32 = 5;
    pub const STORE_FILE_EXTENSION: &str = "cvmx";
}

// re-exports
pub use reader::{CoverageReader, ReaderState};
pub use writer::StoreWriter;
