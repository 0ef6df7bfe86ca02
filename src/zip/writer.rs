//! Write-side header emission.
//!
//! Local file headers are written with placeholder checksum and sizes, then
//! patched once the entry is closed and the real values are known; the
//! streams this crate writes to are seekable, so no data descriptors are
//! needed. The central directory and EOCD are emitted in one pass when the
//! archive is finalized.
//!
//! ZIP64 is read-side only: entries or directories that would not fit the
//! 32-bit header fields are rejected when writing.

use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{Seek, SeekFrom, Write};

use crate::error::{Error, Result};

use super::structures::*;

/// Version fields written into new headers (2.0, MS-DOS attribute origin).
const VERSION_MADE_BY: u16 = 20;
const VERSION_NEEDED: u16 = 20;

/// Offset of the CRC field inside a local file header.
const LFH_CRC_POS: u64 = 14;

/// Parameters for a new entry on the write path.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub name: String,
    pub method: CompressionMethod,
    /// DEFLATE effort, 0-9. Recorded in the flag bits and used to drive the
    /// compressor; ignored for stored entries.
    pub level: u32,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
}

impl WriteOptions {
    /// DEFLATE entry at the conventional default effort.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method: CompressionMethod::Deflate,
            level: 6,
            last_mod_time: 0,
            last_mod_date: 0,
        }
    }

    /// Store the payload verbatim (no compression). Required for entries
    /// that should support intra-entry seeking later.
    pub fn stored(mut self) -> Self {
        self.method = CompressionMethod::Stored;
        self
    }

    pub fn level(mut self, level: u32) -> Self {
        self.level = level.min(9);
        self
    }

    pub fn modified(mut self, dos_time: u16, dos_date: u16) -> Self {
        self.last_mod_time = dos_time;
        self.last_mod_date = dos_date;
        self
    }

    /// Flag bits recording the compression effort, mirrored back as a level
    /// hint by readers.
    pub fn flags(&self) -> u16 {
        if self.method != CompressionMethod::Deflate {
            return 0;
        }
        match self.level {
            8 | 9 => FLAG_DEFLATE_MAX,
            2 => FLAG_DEFLATE_FAST,
            1 => FLAG_DEFLATE_SUPER_FAST,
            _ => 0,
        }
    }
}

fn narrow(value: u64, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::Format(format!("{what} too large for ZIP header")))
}

/// Emit a local file header with zeroed CRC/size fields.
///
/// Returns the offset of the first payload byte.
pub fn write_lfh<S: Write + Seek>(stream: &mut S, options: &WriteOptions) -> Result<u64> {
    if options.name.len() > u16::MAX as usize {
        return Err(Error::InvalidParameter("entry name too long"));
    }

    let lfh_offset = stream.stream_position()?;
    stream.write_all(LFH_SIGNATURE)?;
    stream.write_u16::<LittleEndian>(VERSION_NEEDED)?;
    stream.write_u16::<LittleEndian>(options.flags())?;
    stream.write_u16::<LittleEndian>(options.method.as_u16())?;
    stream.write_u16::<LittleEndian>(options.last_mod_time)?;
    stream.write_u16::<LittleEndian>(options.last_mod_date)?;
    stream.write_u32::<LittleEndian>(0)?; // crc, patched on close
    stream.write_u32::<LittleEndian>(0)?; // compressed size, patched
    stream.write_u32::<LittleEndian>(0)?; // uncompressed size, patched
    stream.write_u16::<LittleEndian>(options.name.len() as u16)?;
    stream.write_u16::<LittleEndian>(0)?; // extra field length
    stream.write_all(options.name.as_bytes())?;

    Ok(lfh_offset + LFH_SIZE as u64 + options.name.len() as u64)
}

/// Patch the checksum and size fields of an already-written local header,
/// restoring the stream position afterwards.
pub fn patch_lfh<S: Write + Seek>(
    stream: &mut S,
    lfh_offset: u64,
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
) -> Result<()> {
    let resume = stream.stream_position()?;

    stream.seek(SeekFrom::Start(lfh_offset + LFH_CRC_POS))?;
    stream.write_u32::<LittleEndian>(crc32)?;
    stream.write_u32::<LittleEndian>(narrow(compressed_size, "compressed size")?)?;
    stream.write_u32::<LittleEndian>(narrow(uncompressed_size, "uncompressed size")?)?;

    stream.seek(SeekFrom::Start(resume))?;
    Ok(())
}

/// Emit one central directory record for a finished entry.
pub fn write_cdfh<S: Write + Seek>(stream: &mut S, entry: &EntryMetadata) -> Result<()> {
    stream.write_all(CDFH_SIGNATURE)?;
    stream.write_u16::<LittleEndian>(VERSION_MADE_BY)?;
    stream.write_u16::<LittleEndian>(VERSION_NEEDED)?;
    stream.write_u16::<LittleEndian>(entry.flags)?;
    stream.write_u16::<LittleEndian>(entry.compression_method.as_u16())?;
    stream.write_u16::<LittleEndian>(entry.last_mod_time)?;
    stream.write_u16::<LittleEndian>(entry.last_mod_date)?;
    stream.write_u32::<LittleEndian>(entry.crc32)?;
    stream.write_u32::<LittleEndian>(narrow(entry.compressed_size, "compressed size")?)?;
    stream.write_u32::<LittleEndian>(narrow(entry.uncompressed_size, "uncompressed size")?)?;
    stream.write_u16::<LittleEndian>(entry.file_name.len() as u16)?;
    stream.write_u16::<LittleEndian>(0)?; // extra field length
    stream.write_u16::<LittleEndian>(0)?; // comment length
    stream.write_u16::<LittleEndian>(0)?; // disk number start
    stream.write_u16::<LittleEndian>(0)?; // internal attributes
    stream.write_u32::<LittleEndian>(0)?; // external attributes
    stream.write_u32::<LittleEndian>(narrow(entry.lfh_offset, "local header offset")?)?;
    stream.write_all(entry.file_name.as_bytes())?;
    Ok(())
}

/// Emit the end-of-central-directory record.
pub fn write_eocd<S: Write + Seek>(
    stream: &mut S,
    entry_count: u64,
    cd_offset: u64,
    cd_size: u64,
) -> Result<()> {
    let entries = u16::try_from(entry_count)
        .map_err(|_| Error::Format("too many entries for ZIP header".into()))?;

    stream.write_all(EndOfCentralDirectory::SIGNATURE)?;
    stream.write_u16::<LittleEndian>(0)?; // disk number
    stream.write_u16::<LittleEndian>(0)?; // disk with central directory
    stream.write_u16::<LittleEndian>(entries)?;
    stream.write_u16::<LittleEndian>(entries)?;
    stream.write_u32::<LittleEndian>(narrow(cd_size, "central directory size")?)?;
    stream.write_u32::<LittleEndian>(narrow(cd_offset, "central directory offset")?)?;
    stream.write_u16::<LittleEndian>(0)?; // comment length
    Ok(())
}
