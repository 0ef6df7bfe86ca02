//! # zipnav
//!
//! Random-access ZIP navigation with resumable cursors.
//!
//! This library exposes a positional API over ZIP archives: a cursor that
//! moves between entries by index, name, or directory offset; read/write
//! sessions that track their progress inside the open entry; seeking within
//! stored (uncompressed) entries; and portable position tokens that let a
//! caller serialize where it was and resume later, even in another process.
//!
//! Archives can live on the local filesystem, in memory, or behind an HTTP
//! server; remote archives are navigated with Range requests, so listing
//! or pulling a single entry never downloads the whole file.
//!
//! ## Features
//!
//! - Enumerate, locate by name (optionally with a custom comparator), and
//!   jump directly to entries
//! - Capture/restore position tokens in 64-bit and legacy 32-bit forms
//! - STORED and DEFLATE entries, read and write, plus raw sessions over the
//!   compressed bytes
//! - Seek within stored entries (SET/CUR/END origins)
//! - ZIP64 archives on the read side
//!
//! ## Example
//!
//! ```no_run
//! use zipnav::{ArchiveCursor, HttpRangeReader, ZipArchive};
//!
//! fn main() -> anyhow::Result<()> {
//!     // Open a remote ZIP file over HTTP Range requests
//!     let reader = HttpRangeReader::new("https://example.com/archive.zip".to_string())?;
//!     let mut cursor = ArchiveCursor::new(ZipArchive::open_read(reader)?);
//!
//!     // Walk the entries
//!     let mut step = cursor.goto_first();
//!     loop {
//!         match step {
//!             Ok(()) => {}
//!             Err(e) if e.is_end_of_list() => break,
//!             Err(e) => return Err(e.into()),
//!         }
//!         println!("{}", cursor.metadata()?.file_name);
//!         step = cursor.goto_next();
//!     }
//!
//!     // Remember where we are, come back later
//!     let token = cursor.capture_position()?;
//!     cursor.goto_first()?;
//!     cursor.restore_position(token)?;
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod cursor;
pub mod error;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use cursor::{
    ArchiveCursor, ArchiveHandle, OpenInfo, Position, Position32, RawDescriptor, SeekOrigin,
};
pub use error::{Error, Result};
pub use io::{ArchiveStream, HttpRangeReader};
pub use zip::{CompressionMethod, EntryMetadata, OpenMode, WriteOptions, ZipArchive};
