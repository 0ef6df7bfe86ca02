//! Low-level ZIP directory parser.
//!
//! This module handles the binary parsing of ZIP file structures, reading
//! from any seekable stream.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. If ZIP64, read the ZIP64 EOCD for large file support
//! 3. Read the Central Directory to get metadata for all files
//! 4. For entry payloads, read each file's Local File Header to find where
//!    the data begins
//!
//! Every central directory record's own byte position is captured while
//! parsing, because direct jumps and position tokens address entries by
//! that offset.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read, Seek, SeekFrom};

use crate::error::{Error, Result};

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// The central directory of an archive, fully parsed.
pub struct ParsedDirectory {
    /// Entries in central directory order.
    pub entries: Vec<EntryMetadata>,
    /// Absolute offset of the first central directory record.
    pub cd_offset: u64,
    /// Total size of the central directory in bytes.
    pub cd_size: u64,
}

/// Parse the whole central directory from a seekable stream.
///
/// Reads the EOCD (following the ZIP64 locator when present), then fetches
/// and parses every central directory record. The stream position afterwards
/// is unspecified.
///
/// # Errors
///
/// Returns [`Error::Format`] if the stream is not a valid ZIP archive, or an
/// I/O error from the stream.
pub fn read_directory<S: Read + Seek>(stream: &mut S) -> Result<ParsedDirectory> {
    let size = stream.seek(SeekFrom::End(0))?;
    let (eocd, eocd_offset) = find_eocd(stream, size)?;

    let (cd_offset, cd_size, total_entries) = if eocd.is_zip64() {
        let eocd64 = read_zip64_eocd(stream, eocd_offset)?;
        (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries)
    } else {
        (
            eocd.cd_offset as u64,
            eocd.cd_size as u64,
            eocd.total_entries as u64,
        )
    };

    // One contiguous read of the directory, then parse in memory
    stream.seek(SeekFrom::Start(cd_offset))?;
    let mut cd_data = vec![0u8; cd_size as usize];
    stream.read_exact(&mut cd_data)?;

    let mut entries = Vec::with_capacity(total_entries as usize);
    let mut cursor = Cursor::new(cd_data.as_slice());

    for _ in 0..total_entries {
        let record_offset = cd_offset + cursor.position();
        let entry = parse_cdfh(&mut cursor, record_offset)?;
        entries.push(entry);
    }

    Ok(ParsedDirectory {
        entries,
        cd_offset,
        cd_size,
    })
}

/// Find and parse the End of Central Directory record.
///
/// The EOCD is located at the end of the ZIP file. Handles both the simple
/// case (no comment) and archives with comments by searching backwards for
/// the signature.
fn find_eocd<S: Read + Seek>(stream: &mut S, size: u64) -> Result<(EndOfCentralDirectory, u64)> {
    // First try the simple case where there's no comment; this avoids
    // reading extra data in the common case.
    if size >= EndOfCentralDirectory::SIZE as u64 {
        let offset = size - EndOfCentralDirectory::SIZE as u64;
        let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
        stream.seek(SeekFrom::Start(offset))?;
        stream.read_exact(&mut buf)?;

        if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && &buf[20..22] == b"\x00\x00" {
            let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
            return Ok((eocd, offset));
        }
    }

    // EOCD not at the expected location, so there may be a trailing comment.
    // Search backwards from the end of the file.
    let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE as u64).min(size);
    let search_start = size - search_size;

    let mut buf = vec![0u8; search_size as usize];
    stream.seek(SeekFrom::Start(search_start))?;
    stream.read_exact(&mut buf)?;

    // Search backwards for EOCD signature (PK\x05\x06)
    for i in (0..buf.len().saturating_sub(EndOfCentralDirectory::SIZE)).rev() {
        if &buf[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
            // Candidate found; the comment length field must account for
            // exactly the remaining bytes.
            let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;

            if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                let eocd =
                    EndOfCentralDirectory::from_bytes(&buf[i..i + EndOfCentralDirectory::SIZE])?;
                return Ok((eocd, search_start + i as u64));
            }
        }
    }

    Err(Error::Format("not a valid ZIP file".into()))
}

/// Read the ZIP64 End of Central Directory record.
///
/// Called when the regular EOCD indicates ZIP64 extensions are needed
/// (fields set to 0xFFFF or 0xFFFFFFFF).
fn read_zip64_eocd<S: Read + Seek>(stream: &mut S, eocd_offset: u64) -> Result<Zip64EOCD> {
    // The ZIP64 EOCD Locator sits immediately before the regular EOCD
    let locator_offset = eocd_offset
        .checked_sub(Zip64EOCDLocator::SIZE as u64)
        .ok_or_else(|| Error::Format("truncated ZIP64 archive".into()))?;
    let mut locator_buf = vec![0u8; Zip64EOCDLocator::SIZE];
    stream.seek(SeekFrom::Start(locator_offset))?;
    stream.read_exact(&mut locator_buf)?;

    let locator = Zip64EOCDLocator::from_bytes(&locator_buf)?;

    let mut eocd64_buf = vec![0u8; Zip64EOCD::MIN_SIZE];
    stream.seek(SeekFrom::Start(locator.eocd64_offset))?;
    stream.read_exact(&mut eocd64_buf)?;

    Zip64EOCD::from_bytes(&eocd64_buf)
}

/// Parse one Central Directory File Header.
///
/// `record_offset` is the absolute stream offset of this record; it is
/// stored on the entry as its directory offset.
fn parse_cdfh(cursor: &mut Cursor<&[u8]>, record_offset: u64) -> Result<EntryMetadata> {
    // Read and verify the signature (PK\x01\x02)
    let mut sig = [0u8; 4];
    cursor.read_exact(&mut sig)?;
    if sig != CDFH_SIGNATURE {
        return Err(Error::Format(
            "invalid central directory file header".into(),
        ));
    }

    let _version_made_by = cursor.read_u16::<LittleEndian>()?;
    let _version_needed = cursor.read_u16::<LittleEndian>()?;
    let flags = cursor.read_u16::<LittleEndian>()?;
    let compression_method = cursor.read_u16::<LittleEndian>()?;
    let last_mod_time = cursor.read_u16::<LittleEndian>()?;
    let last_mod_date = cursor.read_u16::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let mut uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let file_name_length = cursor.read_u16::<LittleEndian>()?;
    let extra_field_length = cursor.read_u16::<LittleEndian>()?;
    let file_comment_length = cursor.read_u16::<LittleEndian>()?;
    let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
    let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
    let _external_attrs = cursor.read_u32::<LittleEndian>()?;
    let mut lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

    let mut file_name_bytes = vec![0u8; file_name_length as usize];
    cursor.read_exact(&mut file_name_bytes)?;
    // Lossy conversion handles non-UTF8 filenames gracefully
    let file_name = String::from_utf8_lossy(&file_name_bytes).to_string();

    // Directory entries end with '/'
    let is_directory = file_name.ends_with('/');

    // Parse extra field for ZIP64 extended information (extra field ID 0x0001)
    let extra_field_end = cursor.position() + extra_field_length as u64;

    while cursor.position() + 4 <= extra_field_end {
        let header_id = cursor.read_u16::<LittleEndian>()?;
        let field_size = cursor.read_u16::<LittleEndian>()?;

        if header_id == 0x0001 {
            // ZIP64 fields are present only when the corresponding 32-bit
            // header field is saturated
            if uncompressed_size == 0xFFFFFFFF && cursor.position() + 8 <= extra_field_end {
                uncompressed_size = cursor.read_u64::<LittleEndian>()?;
            }
            if compressed_size == 0xFFFFFFFF && cursor.position() + 8 <= extra_field_end {
                compressed_size = cursor.read_u64::<LittleEndian>()?;
            }
            if lfh_offset == 0xFFFFFFFF && cursor.position() + 8 <= extra_field_end {
                lfh_offset = cursor.read_u64::<LittleEndian>()?;
            }
            // Skip any remaining ZIP64 fields (disk number start)
            let remaining = extra_field_end.saturating_sub(cursor.position());
            cursor.set_position(cursor.position() + remaining);
        } else {
            // Skip unknown extra fields
            cursor.set_position(cursor.position() + field_size as u64);
        }
    }

    cursor.set_position(extra_field_end);

    // Skip over the file comment (we don't use it)
    cursor.set_position(cursor.position() + file_comment_length as u64);

    Ok(EntryMetadata {
        file_name,
        compression_method: CompressionMethod::from_u16(compression_method),
        flags,
        compressed_size,
        uncompressed_size,
        crc32,
        lfh_offset,
        directory_offset: record_offset,
        last_mod_time,
        last_mod_date,
        is_directory,
    })
}

/// Compute where an entry's payload begins.
///
/// The Local File Header has variable-length fields (filename, extra field)
/// that may differ from the central directory record, so the LFH itself must
/// be consulted.
pub fn data_offset<S: Read + Seek>(stream: &mut S, entry: &EntryMetadata) -> Result<u64> {
    let mut lfh_buf = vec![0u8; LFH_SIZE];
    stream.seek(SeekFrom::Start(entry.lfh_offset))?;
    stream.read_exact(&mut lfh_buf)?;

    if &lfh_buf[0..4] != LFH_SIGNATURE {
        return Err(Error::Format("invalid local file header".into()));
    }

    // Variable field lengths sit at fixed positions in the LFH
    let mut cursor = Cursor::new(&lfh_buf);
    cursor.set_position(26);

    let file_name_length = cursor.read_u16::<LittleEndian>()? as u64;
    let extra_field_length = cursor.read_u16::<LittleEndian>()? as u64;

    // Data starts after: LFH (30 bytes) + filename + extra field
    Ok(entry.lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::Write;

    /// Hand-rolled single-entry stored archive, independent of the crate's
    /// own writer.
    fn stored_fixture(name: &str, payload: &[u8], comment: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let crc = crc32fast::hash(payload);

        // Local file header
        out.write_all(LFH_SIGNATURE).unwrap();
        out.write_u16::<LittleEndian>(20).unwrap(); // version needed
        out.write_u16::<LittleEndian>(0).unwrap(); // flags
        out.write_u16::<LittleEndian>(0).unwrap(); // method: stored
        out.write_u16::<LittleEndian>(0).unwrap(); // time
        out.write_u16::<LittleEndian>(0).unwrap(); // date
        out.write_u32::<LittleEndian>(crc).unwrap();
        out.write_u32::<LittleEndian>(payload.len() as u32).unwrap();
        out.write_u32::<LittleEndian>(payload.len() as u32).unwrap();
        out.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap(); // extra len
        out.write_all(name.as_bytes()).unwrap();
        out.write_all(payload).unwrap();

        let cd_offset = out.len() as u32;

        // Central directory record
        out.write_all(CDFH_SIGNATURE).unwrap();
        out.write_u16::<LittleEndian>(20).unwrap(); // made by
        out.write_u16::<LittleEndian>(20).unwrap(); // needed
        out.write_u16::<LittleEndian>(0).unwrap(); // flags
        out.write_u16::<LittleEndian>(0).unwrap(); // method
        out.write_u16::<LittleEndian>(0).unwrap(); // time
        out.write_u16::<LittleEndian>(0).unwrap(); // date
        out.write_u32::<LittleEndian>(crc).unwrap();
        out.write_u32::<LittleEndian>(payload.len() as u32).unwrap();
        out.write_u32::<LittleEndian>(payload.len() as u32).unwrap();
        out.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap(); // extra
        out.write_u16::<LittleEndian>(0).unwrap(); // comment
        out.write_u16::<LittleEndian>(0).unwrap(); // disk
        out.write_u16::<LittleEndian>(0).unwrap(); // internal attrs
        out.write_u32::<LittleEndian>(0).unwrap(); // external attrs
        out.write_u32::<LittleEndian>(0).unwrap(); // lfh offset
        out.write_all(name.as_bytes()).unwrap();

        let cd_size = out.len() as u32 - cd_offset;

        // EOCD
        out.write_all(EndOfCentralDirectory::SIGNATURE).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(1).unwrap();
        out.write_u16::<LittleEndian>(1).unwrap();
        out.write_u32::<LittleEndian>(cd_size).unwrap();
        out.write_u32::<LittleEndian>(cd_offset).unwrap();
        out.write_u16::<LittleEndian>(comment.len() as u16).unwrap();
        out.write_all(comment).unwrap();

        out
    }

    #[test]
    fn parses_single_stored_entry() {
        let bytes = stored_fixture("hello.txt", b"hello world", b"");
        let mut stream = Cursor::new(bytes);

        let dir = read_directory(&mut stream).unwrap();
        assert_eq!(dir.entries.len(), 1);

        let entry = &dir.entries[0];
        assert_eq!(entry.file_name, "hello.txt");
        assert_eq!(entry.compression_method, CompressionMethod::Stored);
        assert_eq!(entry.uncompressed_size, 11);
        assert_eq!(entry.directory_offset, dir.cd_offset);
        assert!(!entry.is_encrypted());

        let offset = data_offset(&mut stream, entry).unwrap();
        assert_eq!(offset, LFH_SIZE as u64 + "hello.txt".len() as u64);
    }

    #[test]
    fn finds_eocd_behind_comment() {
        let bytes = stored_fixture("a", b"x", b"trailing archive comment");
        let mut stream = Cursor::new(bytes);

        let dir = read_directory(&mut stream).unwrap();
        assert_eq!(dir.entries.len(), 1);
        assert_eq!(dir.entries[0].file_name, "a");
    }

    #[test]
    fn rejects_garbage() {
        let mut stream = Cursor::new(vec![0u8; 64]);
        assert!(matches!(
            read_directory(&mut stream),
            Err(Error::Format(_))
        ));
    }
}
