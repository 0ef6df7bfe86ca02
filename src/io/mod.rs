mod http;
mod local;

pub use http::HttpRangeReader;
pub use local::{open_for_append, open_for_create, open_for_read};

use std::io::{Read, Seek, Write};

/// Capability set an archive engine needs from its byte source/sink.
///
/// The engine never opens or closes the stream itself; it is handed one at
/// construction and only reads, writes, and repositions through it. Local
/// files ([`std::fs::File`]) and in-memory buffers
/// (`std::io::Cursor<Vec<u8>>`) qualify as-is; [`HttpRangeReader`] provides
/// a read-only remote source over HTTP Range requests.
pub trait ArchiveStream: Read + Write + Seek + Send {}

impl<T: Read + Write + Seek + Send> ArchiveStream for T {}
