//! Entry navigation and resumable read/write cursors.
//!
//! This is the compatibility surface of the crate: a stable, positional API
//! over a handle-based archive engine. It reconciles two access models, a
//! logical, enumerable sequence of entries (the cursor's `entry_index`) and
//! a physical, offset-addressed directory (the handle's selection), and
//! keeps them consistent across linear scans, direct jumps, and partial
//! reads.
//!
//! ## Navigation entry points
//!
//! There are deliberately two, with different postconditions:
//!
//! - Counted traversal ([`ArchiveCursor::goto_first`] /
//!   [`ArchiveCursor::goto_next`]) and token restoration
//!   ([`ArchiveCursor::restore_position`]) keep index and selection in
//!   agreement.
//! - The raw-offset jump ([`ArchiveCursor::set_offset`]) is an expert entry
//!   point that repositions the handle but leaves `entry_index` stale until
//!   the next counted traversal. Unifying the two would silently change the
//!   historical behavior this surface preserves.
//!
//! ## Sessions and seeking
//!
//! Opening an entry starts a session: the stream position at open is
//! captured as the entry's data start, and a transfer counter accumulates
//! the bytes actually moved. For stored (uncompressed) entries the session
//! supports seeking, which repositions the raw stream relative to the data
//! start and rewrites the counter; compressed or encrypted payloads refuse
//! seeks since positions inside them are undefined.
//!
//! All operations are synchronous and blocking; a handle hosts exactly one
//! cursor and at most one open session, and concurrent use from several
//! threads needs external locking.

mod position;

pub use position::{Position, Position32};

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::zip::{CompressionMethod, EntryMetadata, WriteOptions};

/// The narrow interface the cursor layer consumes from an archive engine.
///
/// Navigation methods address entries physically, by central directory
/// offset; the cursor layers logical indexing on top. `goto_next` signals
/// exhaustion with [`Error::EndOfList`], which callers treat as loop
/// termination rather than failure.
pub trait ArchiveHandle {
    /// Select the first entry.
    fn goto_first(&mut self) -> Result<()>;
    /// Select the entry after the current one, or fail with
    /// [`Error::EndOfList`] leaving the selection unchanged.
    fn goto_next(&mut self) -> Result<()>;
    /// Select the entry whose directory record starts at the given offset.
    fn goto_offset(&mut self, directory_offset: u64) -> Result<()>;
    /// Directory offset of the selected entry.
    fn current_offset(&self) -> Result<u64>;
    /// Metadata of the selected entry.
    fn entry(&self) -> Result<EntryMetadata>;
    /// Begin streaming the selected entry's payload for reading.
    fn begin_read(&mut self, raw: bool, password: Option<&str>) -> Result<()>;
    /// Begin a new entry on the write path.
    fn begin_write(&mut self, options: &WriteOptions, raw: bool, password: Option<&str>)
    -> Result<()>;
    /// Read decoded payload bytes; `Ok(0)` signals end of entry.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
    /// Write payload bytes, returning how many were accepted.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;
    /// Finalize the open entry. A raw override supplies the size and
    /// checksum verbatim instead of values accumulated internally.
    fn end_entry(&mut self, raw_override: Option<RawDescriptor>) -> Result<()>;
    /// Current position of the underlying stream.
    fn stream_position(&mut self) -> Result<u64>;
    /// Reposition the underlying stream absolutely.
    fn stream_seek(&mut self, offset: u64) -> Result<u64>;
}

/// Caller-supplied size and checksum for closing a raw-mode entry, trusted
/// verbatim when the payload was compressed out-of-band.
#[derive(Debug, Clone, Copy)]
pub struct RawDescriptor {
    pub uncompressed_size: i64,
    pub crc32: u32,
}

/// Origin for intra-entry seeks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    /// Absolute offset from the entry's data start.
    Set,
    /// Relative to the bytes transferred so far.
    Cur,
    /// Relative to the end of the entry's (stored) data.
    End,
}

/// What a freshly opened read session reports about the entry.
#[derive(Debug, Clone, Copy)]
pub struct OpenInfo {
    pub method: CompressionMethod,
    /// Compression effort recorded by the archiver, mapped to a deflate
    /// level (6 when nothing was recorded).
    pub level: u32,
}

/// Transfer lengths must stay below the legacy 32-bit signed limit; anything
/// at or above it would be silently truncated by narrower layers.
const MAX_TRANSFER: usize = i32::MAX as usize;

fn check_transfer_len(len: usize) -> Result<()> {
    if len >= MAX_TRANSFER {
        return Err(Error::InvalidParameter("transfer length exceeds limit"));
    }
    Ok(())
}

/// A positional cursor over an archive handle.
///
/// Tracks the logical entry index alongside the handle's physical selection,
/// and per-session read/write progress for the currently open entry.
pub struct ArchiveCursor<H: ArchiveHandle> {
    handle: H,
    /// Logical ordinal of the selected entry. Kept in sync by counted
    /// traversal and token restoration; deliberately left stale by
    /// [`set_offset`](Self::set_offset).
    entry_index: u64,
    /// Stream position of the current entry's first payload byte, captured
    /// at session open.
    entry_start: u64,
    /// Bytes actually read or written in the current session.
    transferred: i64,
}

impl<H: ArchiveHandle> ArchiveCursor<H> {
    pub fn new(handle: H) -> Self {
        Self {
            handle,
            entry_index: 0,
            entry_start: 0,
            transferred: 0,
        }
    }

    /// Borrow the underlying handle.
    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// Mutably borrow the underlying handle.
    ///
    /// Repositioning its stream or selection behind the cursor's back voids
    /// the index/offset consistency this layer maintains.
    pub fn handle_mut(&mut self) -> &mut H {
        &mut self.handle
    }

    /// Consume the cursor, returning the handle.
    pub fn into_handle(self) -> H {
        self.handle
    }

    /// Logical ordinal of the selected entry.
    ///
    /// Meaningful after counted traversal or token restoration; stale after
    /// a raw [`set_offset`](Self::set_offset) jump.
    pub fn entry_index(&self) -> u64 {
        self.entry_index
    }

    /// Metadata of the selected entry.
    pub fn metadata(&self) -> Result<EntryMetadata> {
        self.handle.entry()
    }

    // ---- navigation ----

    /// Move to the first entry. On success the logical index resets to 0.
    pub fn goto_first(&mut self) -> Result<()> {
        self.handle.goto_first()?;
        self.entry_index = 0;
        Ok(())
    }

    /// Advance to the next entry.
    ///
    /// [`Error::EndOfList`] is the normal loop-termination signal and leaves
    /// the index (and the handle's selection) unchanged.
    pub fn goto_next(&mut self) -> Result<()> {
        self.handle.goto_next()?;
        self.entry_index += 1;
        trace!(index = self.entry_index, "advanced cursor");
        Ok(())
    }

    /// Find the first entry whose name equals `name` (exact byte-wise
    /// comparison), scanning from the start of the archive.
    pub fn locate_by_name(&mut self, name: &str) -> Result<()> {
        self.locate_by_name_with(name, |wanted, candidate| wanted == candidate)
    }

    /// Like [`locate_by_name`](Self::locate_by_name) with a caller-supplied
    /// comparator (e.g. case-insensitive matching).
    ///
    /// On a miss the cursor is put back where it was, both the logical
    /// index and the handle's selection, so a failed search has no visible
    /// side effect. A metadata read failure aborts the scan immediately and
    /// leaves the cursor position unspecified. The comparator is assumed to
    /// be deterministic; an inconsistent one is caller misuse.
    pub fn locate_by_name_with<F>(&mut self, name: &str, matches: F) -> Result<()>
    where
        F: Fn(&str, &str) -> bool,
    {
        let prev_index = self.entry_index;
        let prev_offset = self.handle.current_offset().ok();

        let mut scan_index = 0u64;
        let mut step = self.handle.goto_first();
        loop {
            match step {
                Ok(()) => {}
                Err(Error::EndOfList) => break,
                Err(e) => return Err(e),
            }
            let meta = self.handle.entry()?;
            if matches(name, &meta.file_name) {
                debug!(name, index = scan_index, "located entry");
                self.entry_index = scan_index;
                return Ok(());
            }
            scan_index += 1;
            step = self.handle.goto_next();
        }

        // Exhausted without a match: re-navigate to the pre-scan entry so
        // the handle is not left on an unrelated one.
        if let Some(offset) = prev_offset {
            self.handle.goto_offset(offset)?;
        }
        self.entry_index = prev_index;
        Err(Error::NotFound)
    }

    /// Directory offset of the selected entry.
    pub fn offset(&self) -> Result<u64> {
        self.handle.current_offset()
    }

    /// Legacy 32-bit offset query; fails with [`Error::OffsetOverflow`]
    /// instead of truncating.
    pub fn offset32(&self) -> Result<u32> {
        let offset = self.handle.current_offset()?;
        u32::try_from(offset).map_err(|_| Error::OffsetOverflow(offset))
    }

    /// Jump directly to a directory offset.
    ///
    /// Expert entry point: the logical index is *not* updated, and on
    /// failure the handle's selection is unspecified. Offsets recovered from
    /// a [`Position`] should go through
    /// [`restore_position`](Self::restore_position) instead, which keeps the
    /// index consistent.
    pub fn set_offset(&mut self, directory_offset: u64) -> Result<()> {
        self.handle.goto_offset(directory_offset)
    }

    /// Legacy 32-bit form of [`set_offset`](Self::set_offset).
    pub fn set_offset32(&mut self, directory_offset: u32) -> Result<()> {
        self.set_offset(directory_offset as u64)
    }

    // ---- position tokens ----

    /// Export the current position as a resumable token.
    ///
    /// Fails if no entry is selected.
    pub fn capture_position(&self) -> Result<Position> {
        Ok(Position {
            directory_offset: self.handle.current_offset()?,
            entry_index: self.entry_index,
        })
    }

    /// Legacy 32-bit capture; fails when the offset or index does not fit.
    pub fn capture_position32(&self) -> Result<Position32> {
        self.capture_position()?.narrow()
    }

    /// Resume navigation at a previously captured position.
    ///
    /// The token's index is trusted after the offset jump succeeds;
    /// recomputing it would require a full rescan. Restoring a token
    /// captured from a different archive generation yields an index that may
    /// not match the selection; that is an accepted risk of this surface.
    pub fn restore_position(&mut self, position: Position) -> Result<()> {
        self.handle.goto_offset(position.directory_offset)?;
        self.entry_index = position.entry_index;
        debug!(
            offset = position.directory_offset,
            index = position.entry_index,
            "restored cursor position"
        );
        Ok(())
    }

    /// Legacy 32-bit restore.
    pub fn restore_position32(&mut self, position: Position32) -> Result<()> {
        self.restore_position(position.into())
    }

    // ---- entry sessions ----

    /// Open the selected entry for reading.
    ///
    /// Reports the entry's compression method and recorded level. Fails with
    /// [`Error::PasswordRequired`] if the entry is encrypted and no password
    /// was supplied, or if no entry is selected or a session is already
    /// open.
    pub fn open_entry(&mut self, password: Option<&str>) -> Result<OpenInfo> {
        self.open_entry_raw(false, password)
    }

    /// Open the selected entry, optionally in raw mode (compressed payload
    /// bytes pass through undecoded).
    pub fn open_entry_raw(&mut self, raw: bool, password: Option<&str>) -> Result<OpenInfo> {
        self.handle.begin_read(raw, password)?;
        let meta = self.handle.entry()?;
        // Data start is wherever the open protocol left the stream
        self.entry_start = self.handle.stream_position()?;
        self.transferred = 0;
        Ok(OpenInfo {
            method: meta.compression_method,
            level: meta.level_hint(),
        })
    }

    /// Start writing a new entry.
    pub fn create_entry(&mut self, options: &WriteOptions) -> Result<()> {
        self.create_entry_raw(options, false, None)
    }

    /// Start writing a new entry, optionally raw (caller streams
    /// already-compressed bytes and supplies size/checksum at close).
    pub fn create_entry_raw(
        &mut self,
        options: &WriteOptions,
        raw: bool,
        password: Option<&str>,
    ) -> Result<()> {
        self.handle.begin_write(options, raw, password)?;
        self.entry_start = self.handle.stream_position()?;
        self.transferred = 0;
        Ok(())
    }

    /// Read from the open entry. `Ok(0)` signals end of entry.
    ///
    /// The buffer length must stay below the transfer-size limit; oversized
    /// requests fail without touching the transfer counter.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        check_transfer_len(buf.len())?;
        let n = self.handle.read(buf)?;
        self.transferred += n as i64;
        Ok(n)
    }

    /// Write to the open entry.
    ///
    /// The underlying stream is a reliable sink: a short write is reported
    /// as an error, not retried.
    pub fn write(&mut self, buf: &[u8]) -> Result<()> {
        check_transfer_len(buf.len())?;
        let n = self.handle.write(buf)?;
        self.transferred += n as i64;
        if n != buf.len() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "short write to archive entry",
            )));
        }
        Ok(())
    }

    /// Close the open entry, finalizing its metadata from the bytes
    /// actually streamed.
    pub fn close_entry(&mut self) -> Result<()> {
        self.handle.end_entry(None)
    }

    /// Close the open entry trusting the caller's uncompressed size and
    /// CRC-32 instead of internally accumulated values (raw path).
    pub fn close_entry_raw(&mut self, uncompressed_size: i64, crc32: u32) -> Result<()> {
        self.handle.end_entry(Some(RawDescriptor {
            uncompressed_size,
            crc32,
        }))
    }

    /// Bytes transferred in the current session (64-bit form).
    pub fn tell64(&self) -> i64 {
        self.transferred
    }

    /// Bytes transferred, narrowed to the legacy 32-bit width. Sessions past
    /// 2 GiB wrap here; use [`tell64`](Self::tell64) for the authoritative
    /// value.
    pub fn tell(&self) -> i32 {
        self.transferred as i32
    }

    /// Whether the session has consumed the entry's full logical size.
    ///
    /// This compares the transfer counter with the entry's uncompressed
    /// size; it is not a stream-level EOF probe.
    pub fn at_end_of_entry(&self) -> Result<bool> {
        let meta = self.handle.entry()?;
        Ok(self.transferred == meta.uncompressed_size as i64)
    }

    /// Reposition within the open entry's data.
    ///
    /// Only stored (uncompressed) entries support this: their payload bytes
    /// sit verbatim in the stream, so a position inside the entry is a
    /// well-defined stream position. The computed position must land in
    /// `[0, compressed_size]`; on success the transfer counter is rewritten
    /// to it.
    pub fn seek(&mut self, offset: i64, origin: SeekOrigin) -> Result<()> {
        let meta = self.handle.entry()?;
        if !meta.compression_method.is_stored() {
            return Err(Error::SeekOnCompressed);
        }

        let position = match origin {
            SeekOrigin::Set => offset,
            SeekOrigin::Cur => self.transferred + offset,
            SeekOrigin::End => meta.compressed_size as i64 + offset,
        };

        if position < 0 || position as u64 > meta.compressed_size {
            return Err(Error::SeekOutOfRange(position));
        }

        self.handle
            .stream_seek(self.entry_start + position as u64)?;
        self.transferred = position;
        trace!(position, "seeked within stored entry");
        Ok(())
    }
}
