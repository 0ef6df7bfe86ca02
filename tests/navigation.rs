//! End-to-end cursor behavior over real archives.

use pretty_assertions::assert_eq;
use std::io::Cursor;

use zipnav::io::{open_for_append, open_for_create, open_for_read};
use zipnav::{
    ArchiveCursor, CompressionMethod, Error, SeekOrigin, WriteOptions, ZipArchive,
};

/// Build an in-memory archive through the cursor write API.
fn build_archive(entries: &[(&str, &[u8], bool)]) -> Vec<u8> {
    let mut cursor = ArchiveCursor::new(ZipArchive::create(Cursor::new(Vec::new())));
    for (name, payload, stored) in entries {
        let mut options = WriteOptions::new(*name);
        if *stored {
            options = options.stored();
        }
        cursor.create_entry(&options).unwrap();
        cursor.write(payload).unwrap();
        assert_eq!(cursor.tell64(), payload.len() as i64);
        cursor.close_entry().unwrap();
    }
    cursor.handle_mut().finalize().unwrap();
    cursor.into_handle().into_stream().into_inner()
}

fn open_cursor(bytes: Vec<u8>) -> ArchiveCursor<ZipArchive<Cursor<Vec<u8>>>> {
    ArchiveCursor::new(ZipArchive::open_read(Cursor::new(bytes)).unwrap())
}

fn read_to_end<H: zipnav::ArchiveHandle>(cursor: &mut ArchiveCursor<H>) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 4]; // small on purpose, to cross chunk boundaries
    loop {
        let n = cursor.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    out
}

#[test]
fn enumerate_locate_capture_restore() {
    // Three stored entries of 10, 0, and 5 bytes
    let bytes = build_archive(&[
        ("a.txt", b"aaaaaaaaaa", true),
        ("b.txt", b"", true),
        ("c.txt", b"ccccc", true),
    ]);
    let mut cursor = open_cursor(bytes);

    cursor.goto_first().unwrap();
    assert_eq!(cursor.entry_index(), 0);
    assert_eq!(cursor.metadata().unwrap().file_name, "a.txt");

    cursor.goto_next().unwrap();
    assert_eq!(cursor.entry_index(), 1);
    assert_eq!(cursor.metadata().unwrap().file_name, "b.txt");

    // Zero-byte entry is at its logical end right after open
    cursor.open_entry(None).unwrap();
    assert!(cursor.at_end_of_entry().unwrap());
    cursor.close_entry().unwrap();

    cursor.locate_by_name("c.txt").unwrap();
    assert_eq!(cursor.entry_index(), 2);
    let offset_c = cursor.offset().unwrap();

    let token = cursor.capture_position().unwrap();
    cursor.goto_first().unwrap();
    cursor.restore_position(token).unwrap();
    assert_eq!(cursor.entry_index(), 2);
    assert_eq!(cursor.offset().unwrap(), offset_c);
    assert_eq!(cursor.metadata().unwrap().file_name, "c.txt");
}

#[test]
fn advance_exactly_n_entries() {
    let bytes = build_archive(&[("1", b"x", true), ("2", b"y", true), ("3", b"z", true)]);
    let mut cursor = open_cursor(bytes);

    cursor.goto_first().unwrap();
    for expected in 1..3u64 {
        cursor.goto_next().unwrap();
        assert_eq!(cursor.entry_index(), expected);
    }
    assert!(cursor.goto_next().unwrap_err().is_end_of_list());
    assert_eq!(cursor.entry_index(), 2);
}

#[test]
fn locate_miss_has_no_side_effect() {
    let bytes = build_archive(&[("a.txt", b"a", true), ("b.txt", b"b", true)]);
    let mut cursor = open_cursor(bytes);

    cursor.goto_first().unwrap();
    cursor.goto_next().unwrap();
    let offset_before = cursor.offset().unwrap();

    assert!(matches!(
        cursor.locate_by_name("nope.txt"),
        Err(Error::NotFound)
    ));
    assert_eq!(cursor.entry_index(), 1);
    assert_eq!(cursor.offset().unwrap(), offset_before);
    assert_eq!(cursor.metadata().unwrap().file_name, "b.txt");
}

#[test]
fn stored_entry_seek_laws() {
    let payload = b"0123456789";
    let bytes = build_archive(&[("data.bin", payload, true)]);
    let mut cursor = open_cursor(bytes);

    let info = cursor.open_entry(None).unwrap();
    assert_eq!(info.method, CompressionMethod::Stored);

    // END + 0 puts the session at the entry boundary: nothing left to read
    cursor.seek(0, SeekOrigin::End).unwrap();
    assert_eq!(read_to_end(&mut cursor), b"");
    assert!(cursor.at_end_of_entry().unwrap());

    // SET + 0 rewinds; the full payload comes back byte for byte
    cursor.seek(0, SeekOrigin::Set).unwrap();
    assert_eq!(read_to_end(&mut cursor), payload);
    assert_eq!(cursor.tell64(), payload.len() as i64);

    // Mid-entry reposition
    cursor.seek(4, SeekOrigin::Set).unwrap();
    assert_eq!(read_to_end(&mut cursor), b"456789");
    cursor.seek(-6, SeekOrigin::Cur).unwrap();
    assert_eq!(cursor.tell64(), 4);
}

#[test]
fn seek_refused_on_deflate_entry() {
    let payload = b"compressible compressible compressible".repeat(8);
    let bytes = build_archive(&[("packed.txt", &payload, false)]);
    let mut cursor = open_cursor(bytes);

    let info = cursor.open_entry(None).unwrap();
    assert_eq!(info.method, CompressionMethod::Deflate);

    for origin in [SeekOrigin::Set, SeekOrigin::Cur, SeekOrigin::End] {
        assert!(matches!(
            cursor.seek(0, origin),
            Err(Error::SeekOnCompressed)
        ));
    }

    // The refused seeks changed nothing; the payload still reads back
    assert_eq!(read_to_end(&mut cursor), payload);
    assert!(cursor.at_end_of_entry().unwrap());
}

#[test]
fn deflate_round_trip_with_partial_reads() {
    let payload: Vec<u8> = (0..50_000u32).flat_map(|i| i.to_le_bytes()).collect();
    let bytes = build_archive(&[("big.bin", &payload, false)]);
    let mut cursor = open_cursor(bytes);

    let meta = cursor.metadata().unwrap();
    assert!(meta.compressed_size < meta.uncompressed_size);

    cursor.open_entry(None).unwrap();
    let mut first_half = vec![0u8; payload.len() / 2];
    let mut got = 0;
    while got < first_half.len() {
        let n = cursor.read(&mut first_half[got..]).unwrap();
        assert!(n > 0);
        got += n;
    }
    assert_eq!(cursor.tell64(), first_half.len() as i64);
    assert!(!cursor.at_end_of_entry().unwrap());

    let rest = read_to_end(&mut cursor);
    assert_eq!(first_half, payload[..first_half.len()]);
    assert_eq!(rest, payload[first_half.len()..]);
    assert!(cursor.at_end_of_entry().unwrap());
}

#[test]
fn token_survives_reopen() {
    let bytes = build_archive(&[
        ("one", b"1", true),
        ("two", b"2", true),
        ("three", b"3", true),
    ]);

    let token = {
        let mut cursor = open_cursor(bytes.clone());
        cursor.locate_by_name("two").unwrap();
        cursor.capture_position().unwrap()
    };

    // A fresh cursor over the same archive resumes where the old one was
    let mut cursor = open_cursor(bytes);
    cursor.restore_position(token).unwrap();
    assert_eq!(cursor.entry_index(), 1);
    assert_eq!(cursor.metadata().unwrap().file_name, "two");
}

#[test]
fn legacy_token_round_trip() {
    let bytes = build_archive(&[("a", b"a", true), ("b", b"b", true)]);
    let mut cursor = open_cursor(bytes);

    cursor.goto_next().unwrap();
    let narrow = cursor.capture_position32().unwrap();

    cursor.goto_first().unwrap();
    cursor.restore_position32(narrow).unwrap();
    assert_eq!(cursor.entry_index(), 1);
    assert_eq!(cursor.metadata().unwrap().file_name, "b");
}

#[test]
fn offset_jump_desynchronizes_index_until_counted_again() {
    let bytes = build_archive(&[("a", b"a", true), ("b", b"b", true), ("c", b"c", true)]);
    let mut cursor = open_cursor(bytes);

    cursor.goto_next().unwrap();
    let offset_b = cursor.offset().unwrap();
    cursor.goto_first().unwrap();

    // Raw jump moves the selection but not the index
    cursor.set_offset(offset_b).unwrap();
    assert_eq!(cursor.metadata().unwrap().file_name, "b");
    assert_eq!(cursor.entry_index(), 0);

    // A counted traversal resynchronizes both
    cursor.goto_first().unwrap();
    cursor.goto_next().unwrap();
    assert_eq!(cursor.metadata().unwrap().file_name, "b");
    assert_eq!(cursor.entry_index(), 1);
}

#[test]
fn on_disk_create_append_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("archive.zip");

    // Create with one entry
    let file = open_for_create(&path).unwrap();
    let mut cursor = ArchiveCursor::new(ZipArchive::create(file));
    cursor
        .create_entry(&WriteOptions::new("first.txt").stored())
        .unwrap();
    cursor.write(b"first payload").unwrap();
    cursor.close_entry().unwrap();
    cursor.handle_mut().finalize().unwrap();
    drop(cursor);

    // Append a second entry
    let file = open_for_append(&path).unwrap();
    let mut cursor = ArchiveCursor::new(ZipArchive::open_append(file).unwrap());
    cursor
        .create_entry(&WriteOptions::new("second.txt"))
        .unwrap();
    cursor.write(b"second payload").unwrap();
    cursor.close_entry().unwrap();
    cursor.handle_mut().finalize().unwrap();
    drop(cursor);

    // Read both back
    let file = open_for_read(&path).unwrap();
    let mut cursor = ArchiveCursor::new(ZipArchive::open_read(file).unwrap());
    cursor.goto_first().unwrap();
    cursor.open_entry(None).unwrap();
    assert_eq!(read_to_end(&mut cursor), b"first payload");
    cursor.close_entry().unwrap();

    cursor.locate_by_name("second.txt").unwrap();
    assert_eq!(cursor.entry_index(), 1);
    cursor.open_entry(None).unwrap();
    assert_eq!(read_to_end(&mut cursor), b"second payload");
    cursor.close_entry().unwrap();
}

#[test]
fn raw_write_then_raw_read_round_trip() {
    // Compress out-of-band, hand the engine the finished bytes
    let payload = b"raw mode payload, compressed elsewhere".repeat(4);
    let crc = crc32fast::hash(&payload);

    let mut deflater = flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::new(6));
    std::io::Write::write_all(&mut deflater, &payload).unwrap();
    let compressed = deflater.finish().unwrap();

    let mut cursor = ArchiveCursor::new(ZipArchive::create(Cursor::new(Vec::new())));
    cursor
        .create_entry_raw(&WriteOptions::new("raw.bin"), true, None)
        .unwrap();
    cursor.write(&compressed).unwrap();
    cursor
        .close_entry_raw(payload.len() as i64, crc)
        .unwrap();
    cursor.handle_mut().finalize().unwrap();
    let bytes = cursor.into_handle().into_stream().into_inner();

    let mut cursor = open_cursor(bytes);
    let meta = cursor.metadata().unwrap();
    assert_eq!(meta.crc32, crc);
    assert_eq!(meta.uncompressed_size, payload.len() as u64);
    assert_eq!(meta.compression_method, CompressionMethod::Deflate);

    // Normal read decodes it like any other deflate entry
    cursor.open_entry(None).unwrap();
    assert_eq!(read_to_end(&mut cursor), payload);

    // Raw read returns the compressed bytes untouched
    cursor.close_entry().unwrap();
    cursor.open_entry_raw(true, None).unwrap();
    assert_eq!(read_to_end(&mut cursor), compressed);
}
