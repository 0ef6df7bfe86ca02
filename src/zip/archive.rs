//! The ZIP archive engine.
//!
//! [`ZipArchive`] owns the underlying stream and the parsed central
//! directory, tracks which entry is currently selected, and runs at most one
//! entry read/write session at a time. It is the production implementation
//! of the [`ArchiveHandle`] seam consumed by
//! [`ArchiveCursor`](crate::cursor::ArchiveCursor); callers normally drive
//! it through that cursor rather than directly.
//!
//! The engine reads stored and DEFLATE entries (plus raw access to the
//! compressed bytes of anything), and writes stored and DEFLATE entries to
//! create/append-mode archives. Encrypted entries are detected but not
//! decrypted.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use std::io::SeekFrom;
use tracing::debug;

use crate::cursor::{ArchiveHandle, RawDescriptor};
use crate::error::{Error, Result};
use crate::io::ArchiveStream;

use super::parser;
use super::structures::{CompressionMethod, EntryMetadata};
use super::writer::{self, WriteOptions};

const IO_CHUNK: usize = 16 * 1024;

/// How the archive was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Existing archive, navigation and entry reads only.
    Read,
    /// Fresh archive, entry writes then [`ZipArchive::finalize`].
    Create,
    /// Existing archive; new entries overwrite the old central directory,
    /// which is rewritten on finalize.
    Append,
}

enum EntryIo {
    Idle,
    Read(ReadState),
    Write(WriteState),
}

struct ReadState {
    decoder: Decoder,
}

enum Decoder {
    /// Stored entries and raw sessions: bytes pass through untouched. The
    /// window is bounded by the end of the entry's data, computed from the
    /// live stream position so external repositioning stays consistent.
    Passthrough { data_end: u64 },
    Inflate {
        inflater: Box<Decompress>,
        in_buf: Vec<u8>,
        in_pos: usize,
        in_len: usize,
        compressed_remaining: u64,
        done: bool,
    },
}

struct WriteState {
    options: WriteOptions,
    raw: bool,
    lfh_offset: u64,
    crc: crc32fast::Hasher,
    uncompressed: u64,
    compressed: u64,
    deflater: Option<Box<Compress>>,
    out_buf: Vec<u8>,
}

/// A ZIP container bound to a stream.
pub struct ZipArchive<S: ArchiveStream> {
    stream: S,
    mode: OpenMode,
    entries: Vec<EntryMetadata>,
    selected: Option<usize>,
    io: EntryIo,
    /// Where the next local header (or, at finalize, the central directory)
    /// will be written. Meaningless in read mode.
    write_pos: u64,
}

impl<S: ArchiveStream> ZipArchive<S> {
    /// Open an existing archive for reading.
    ///
    /// Parses the central directory and selects the first entry (if any).
    pub fn open_read(mut stream: S) -> Result<Self> {
        let dir = parser::read_directory(&mut stream)?;
        debug!(entries = dir.entries.len(), "opened archive for reading");
        let selected = if dir.entries.is_empty() { None } else { Some(0) };
        Ok(Self {
            stream,
            mode: OpenMode::Read,
            entries: dir.entries,
            selected,
            io: EntryIo::Idle,
            write_pos: dir.cd_offset,
        })
    }

    /// Start a fresh archive on an empty stream.
    pub fn create(stream: S) -> Self {
        Self {
            stream,
            mode: OpenMode::Create,
            entries: Vec::new(),
            selected: None,
            io: EntryIo::Idle,
            write_pos: 0,
        }
    }

    /// Open an existing archive for appending entries.
    ///
    /// New entry data is written where the old central directory began; the
    /// directory is rewritten behind it on [`finalize`](Self::finalize).
    pub fn open_append(mut stream: S) -> Result<Self> {
        let dir = parser::read_directory(&mut stream)?;
        debug!(entries = dir.entries.len(), "opened archive for appending");
        let selected = if dir.entries.is_empty() { None } else { Some(0) };
        Ok(Self {
            stream,
            mode: OpenMode::Append,
            entries: dir.entries,
            selected,
            io: EntryIo::Idle,
            write_pos: dir.cd_offset,
        })
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Write the central directory and EOCD for everything added so far.
    ///
    /// After a successful finalize the archive flips to read mode with the
    /// first entry selected, so the fresh entries can be navigated without
    /// reopening.
    pub fn finalize(&mut self) -> Result<()> {
        if self.mode == OpenMode::Read {
            return Err(Error::InvalidParameter("archive not opened for writing"));
        }
        if !matches!(self.io, EntryIo::Idle) {
            return Err(Error::InvalidParameter("entry still open"));
        }

        let cd_offset = self.write_pos;
        self.stream.seek(SeekFrom::Start(cd_offset))?;
        for entry in &mut self.entries {
            entry.directory_offset = self.stream.stream_position()?;
            writer::write_cdfh(&mut self.stream, entry)?;
        }
        let cd_size = self.stream.stream_position()? - cd_offset;
        writer::write_eocd(&mut self.stream, self.entries.len() as u64, cd_offset, cd_size)?;
        self.stream.flush()?;

        debug!(
            entries = self.entries.len(),
            cd_offset, cd_size, "finalized archive"
        );
        self.mode = OpenMode::Read;
        self.selected = if self.entries.is_empty() { None } else { Some(0) };
        Ok(())
    }

    /// Borrow the underlying stream.
    pub fn stream(&self) -> &S {
        &self.stream
    }

    /// Mutably borrow the underlying stream.
    ///
    /// The caller must not reposition it while an entry session is open,
    /// except through the documented seek path for stored entries.
    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Consume the archive and hand back its stream without closing it.
    pub fn into_stream(self) -> S {
        self.stream
    }

    fn selected_entry(&self) -> Result<&EntryMetadata> {
        self.selected
            .map(|i| &self.entries[i])
            .ok_or(Error::InvalidParameter("no entry selected"))
    }

    fn read_passthrough(&mut self, data_end: u64, buf: &mut [u8]) -> Result<usize> {
        let pos = self.stream.stream_position()?;
        let remaining = data_end.saturating_sub(pos);
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = buf.len().min(remaining as usize);
        Ok(self.stream.read(&mut buf[..want])?)
    }
}

fn map_flate<E: std::fmt::Display>(e: E) -> Error {
    Error::Format(format!("deflate: {e}"))
}

impl<S: ArchiveStream> ArchiveHandle for ZipArchive<S> {
    fn goto_first(&mut self) -> Result<()> {
        if self.entries.is_empty() {
            return Err(Error::EndOfList);
        }
        self.selected = Some(0);
        Ok(())
    }

    fn goto_next(&mut self) -> Result<()> {
        let current = self
            .selected
            .ok_or(Error::InvalidParameter("no entry selected"))?;
        if current + 1 >= self.entries.len() {
            return Err(Error::EndOfList);
        }
        self.selected = Some(current + 1);
        Ok(())
    }

    fn goto_offset(&mut self, directory_offset: u64) -> Result<()> {
        // Directory records are parsed in file order, so their offsets are
        // strictly increasing.
        match self
            .entries
            .binary_search_by_key(&directory_offset, |e| e.directory_offset)
        {
            Ok(index) => {
                self.selected = Some(index);
                Ok(())
            }
            Err(_) => Err(Error::BadOffset(directory_offset)),
        }
    }

    fn current_offset(&self) -> Result<u64> {
        Ok(self.selected_entry()?.directory_offset)
    }

    fn entry(&self) -> Result<EntryMetadata> {
        self.selected_entry().cloned()
    }

    fn begin_read(&mut self, raw: bool, password: Option<&str>) -> Result<()> {
        if !matches!(self.io, EntryIo::Idle) {
            return Err(Error::InvalidParameter("entry already open"));
        }
        let meta = self.selected_entry()?.clone();

        if meta.is_encrypted() && !raw {
            return match password {
                None => Err(Error::PasswordRequired),
                Some(_) => Err(Error::EncryptionUnsupported),
            };
        }

        let data_offset = parser::data_offset(&mut self.stream, &meta)?;
        self.stream.seek(SeekFrom::Start(data_offset))?;

        let decoder = if raw || meta.compression_method.is_stored() {
            Decoder::Passthrough {
                data_end: data_offset + meta.compressed_size,
            }
        } else {
            match meta.compression_method {
                CompressionMethod::Deflate => Decoder::Inflate {
                    inflater: Box::new(Decompress::new(false)),
                    in_buf: vec![0u8; IO_CHUNK],
                    in_pos: 0,
                    in_len: 0,
                    compressed_remaining: meta.compressed_size,
                    done: false,
                },
                method => {
                    return Err(Error::Format(format!(
                        "unsupported compression method {}",
                        method.as_u16()
                    )));
                }
            }
        };

        debug!(entry = %meta.file_name, raw, "opened entry for reading");
        self.io = EntryIo::Read(ReadState { decoder });
        Ok(())
    }

    fn begin_write(&mut self, options: &WriteOptions, raw: bool, password: Option<&str>) -> Result<()> {
        if !matches!(self.io, EntryIo::Idle) {
            return Err(Error::InvalidParameter("entry already open"));
        }
        if self.mode == OpenMode::Read {
            return Err(Error::InvalidParameter("archive not opened for writing"));
        }
        if password.is_some() {
            return Err(Error::EncryptionUnsupported);
        }
        if !raw && matches!(options.method, CompressionMethod::Unknown(_)) {
            return Err(Error::Format(format!(
                "unsupported compression method {}",
                options.method.as_u16()
            )));
        }

        let lfh_offset = self.write_pos;
        self.stream.seek(SeekFrom::Start(lfh_offset))?;
        writer::write_lfh(&mut self.stream, options)?;

        let deflater = if !raw && options.method == CompressionMethod::Deflate {
            Some(Box::new(Compress::new(
                Compression::new(options.level.min(9)),
                false,
            )))
        } else {
            None
        };

        debug!(entry = %options.name, raw, method = options.method.as_u16(), "opened entry for writing");
        self.io = EntryIo::Write(WriteState {
            options: options.clone(),
            raw,
            lfh_offset,
            crc: crc32fast::Hasher::new(),
            uncompressed: 0,
            compressed: 0,
            deflater,
            out_buf: vec![0u8; IO_CHUNK],
        });
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match &mut self.io {
            EntryIo::Read(ReadState {
                decoder: Decoder::Passthrough { data_end },
            }) => {
                let data_end = *data_end;
                self.read_passthrough(data_end, buf)
            }
            EntryIo::Read(ReadState {
                decoder:
                    Decoder::Inflate {
                        inflater,
                        in_buf,
                        in_pos,
                        in_len,
                        compressed_remaining,
                        done,
                    },
            }) => {
                if *done || buf.is_empty() {
                    return Ok(0);
                }
                let mut produced = 0;
                while produced < buf.len() {
                    if *in_pos == *in_len {
                        if *compressed_remaining == 0 {
                            break;
                        }
                        let want = in_buf.len().min(*compressed_remaining as usize);
                        let n = self.stream.read(&mut in_buf[..want])?;
                        if n == 0 {
                            return Err(Error::Format("truncated deflate stream".into()));
                        }
                        *in_pos = 0;
                        *in_len = n;
                        *compressed_remaining -= n as u64;
                    }

                    let before_in = inflater.total_in();
                    let before_out = inflater.total_out();
                    let status = inflater
                        .decompress(
                            &in_buf[*in_pos..*in_len],
                            &mut buf[produced..],
                            FlushDecompress::None,
                        )
                        .map_err(map_flate)?;
                    *in_pos += (inflater.total_in() - before_in) as usize;
                    produced += (inflater.total_out() - before_out) as usize;

                    match status {
                        Status::StreamEnd => {
                            *done = true;
                            break;
                        }
                        Status::Ok | Status::BufError => {
                            if *in_pos == *in_len && *compressed_remaining == 0 {
                                break;
                            }
                        }
                    }
                }
                Ok(produced)
            }
            _ => Err(Error::InvalidParameter("no entry open for reading")),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let EntryIo::Write(state) = &mut self.io else {
            return Err(Error::InvalidParameter("no entry open for writing"));
        };

        match &mut state.deflater {
            None => {
                // Raw sessions count only compressed bytes; the caller
                // supplies size and checksum at close. Stored sessions
                // account for both sides as they go.
                let n = self.stream.write(buf)?;
                state.compressed += n as u64;
                if !state.raw {
                    state.crc.update(&buf[..n]);
                    state.uncompressed += n as u64;
                }
                Ok(n)
            }
            Some(deflater) => {
                let mut consumed = 0;
                while consumed < buf.len() {
                    let before_in = deflater.total_in();
                    let before_out = deflater.total_out();
                    deflater
                        .compress(&buf[consumed..], &mut state.out_buf, FlushCompress::None)
                        .map_err(map_flate)?;
                    consumed += (deflater.total_in() - before_in) as usize;
                    let out_len = (deflater.total_out() - before_out) as usize;
                    if out_len > 0 {
                        self.stream.write_all(&state.out_buf[..out_len])?;
                        state.compressed += out_len as u64;
                    }
                }
                state.crc.update(buf);
                state.uncompressed += buf.len() as u64;
                Ok(buf.len())
            }
        }
    }

    fn end_entry(&mut self, raw_override: Option<RawDescriptor>) -> Result<()> {
        match std::mem::replace(&mut self.io, EntryIo::Idle) {
            EntryIo::Read(_) => Ok(()),
            EntryIo::Write(mut state) => {
                if let Some(deflater) = &mut state.deflater {
                    loop {
                        let before_out = deflater.total_out();
                        let status = deflater
                            .compress(&[], &mut state.out_buf, FlushCompress::Finish)
                            .map_err(map_flate)?;
                        let out_len = (deflater.total_out() - before_out) as usize;
                        if out_len > 0 {
                            self.stream.write_all(&state.out_buf[..out_len])?;
                            state.compressed += out_len as u64;
                        }
                        if status == Status::StreamEnd {
                            break;
                        }
                    }
                }

                let (uncompressed, crc32) = match raw_override {
                    Some(desc) => {
                        if desc.uncompressed_size < 0 {
                            return Err(Error::InvalidParameter("negative uncompressed size"));
                        }
                        (desc.uncompressed_size as u64, desc.crc32)
                    }
                    None => (state.uncompressed, state.crc.finalize()),
                };

                writer::patch_lfh(
                    &mut self.stream,
                    state.lfh_offset,
                    crc32,
                    state.compressed,
                    uncompressed,
                )?;

                let end_pos = self.stream.stream_position()?;
                debug!(
                    entry = %state.options.name,
                    compressed = state.compressed,
                    uncompressed,
                    "closed written entry"
                );
                self.entries.push(EntryMetadata {
                    is_directory: state.options.name.ends_with('/'),
                    compression_method: state.options.method,
                    flags: state.options.flags(),
                    file_name: state.options.name,
                    compressed_size: state.compressed,
                    uncompressed_size: uncompressed,
                    crc32,
                    lfh_offset: state.lfh_offset,
                    // Assigned when the central directory is written
                    directory_offset: 0,
                    last_mod_time: state.options.last_mod_time,
                    last_mod_date: state.options.last_mod_date,
                });
                self.write_pos = end_pos;
                Ok(())
            }
            EntryIo::Idle => Err(Error::InvalidParameter("no entry open")),
        }
    }

    fn stream_position(&mut self) -> Result<u64> {
        Ok(self.stream.stream_position()?)
    }

    fn stream_seek(&mut self, offset: u64) -> Result<u64> {
        Ok(self.stream.seek(SeekFrom::Start(offset))?)
    }
}
