//! # Core data model for `covmat`
//!
//! Everything the other `covmat` crates agree on lives here: the records that flow from an
//! alignment source into a coverage store ([models]), the error types each stage reports
//! ([errors]), and the two seams the matrix engine is written against ([traits]).
//!
//! Feature (GFF) parsing is here too since both the CLI and the aggregator consume it.
//!
//! ## Examples
//! ### Parse a feature line
//! ```rust
//! use covmat_core::models::FeatureRecord;
//!
//! let line = "chr1\tsrc\texon\t3\t7\t.\t+\t.\tID=e1;Name=first";
//! let feature: FeatureRecord = line.parse().unwrap();
//!
//! assert_eq!(feature.len(), 5);
//! assert_eq!(feature.attribute("Name"), Some("first"));
//! ```
//!
pub mod consts;
pub mod errors;
pub mod models;
pub mod traits;
pub mod utils;

pub use errors::*;
pub use traits::*;
