//! ZIP container engine.
//!
//! This module owns everything that knows the ZIP format, supporting both
//! standard archives and ZIP64 extensions on the read side.
//!
//! ## Architecture
//!
//! - [`structures`]: data structures for ZIP format elements (EOCD, central
//!   directory records, entry metadata)
//! - [`parser`]: low-level parsing of ZIP structures from a seekable stream
//! - [`writer`]: header emission for the write path
//! - [`archive`]: [`ZipArchive`], the stateful engine tying the above to one
//!   stream and implementing the handle interface the cursor layer consumes
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! The engine reads the EOCD first (from the end of the file), then the
//! Central Directory, which allows listing and navigating entries without
//! reading payloads, and, for remote sources, without fetching more than
//! the archive's tail.
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - ZIP64 extensions when reading archives > 4GB
//! - STORED (no compression) and DEFLATE methods, read and write
//! - Raw sessions that move compressed payload bytes verbatim
//!
//! ## Limitations
//!
//! - Encrypted entries are detected but cannot be decrypted
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods
//! - Writing produces non-ZIP64 archives only

mod archive;
mod parser;
mod structures;
mod writer;

pub use archive::{OpenMode, ZipArchive};
pub use structures::*;
pub use writer::WriteOptions;
